use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::Row;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::{AdminUser, AuthUser};
use crate::models::{payment, seat, ticket_price, Booking, BookingSeat, Payment, TicketPrice};
use crate::services::qr;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/cancel", patch(cancel_booking))
        .route("/bookings/{id}", get(get_booking).delete(delete_booking))
        .route("/admin/bookings", get(admin_list_bookings))
}

/* ---------- helpers ---------- */

async fn booking_belongs_to_user(
    pool: &sqlx::PgPool,
    booking_id: i64,
    user_id: i64,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1 AND user_id = $2)")
        .bind(booking_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/* ---------- CHECKOUT ---------- */

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    showtime_id: i64,
    seats: Vec<String>,
    payment_method: String,
}

// POST /api/bookings
//
// Чекаут целиком: бронь + места + PENDING-платеж в одной транзакции.
// Двойную продажу места ловит уникальный индекс
// (showtime_id, seat_number) - проигравший запрос получает 409.
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.showtime_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "showtime_id должен быть > 0".to_string()));
    }
    if req.seats.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Не выбрано ни одного места".to_string()));
    }
    if !payment::is_supported_method(&req.payment_method) {
        return Err((StatusCode::BAD_REQUEST, "Неизвестный способ оплаты".to_string()));
    }

    // Дубликаты в самом запросе
    let unique: HashSet<&String> = req.seats.iter().collect();
    if unique.len() != req.seats.len() {
        return Err((StatusCode::BAD_REQUEST, "Места в запросе повторяются".to_string()));
    }

    // Все места должны существовать в схеме зала
    let invalid: Vec<&String> = req
        .seats
        .iter()
        .filter(|s| seat::class_of(s).is_none())
        .collect();
    if !invalid.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Мест нет в схеме зала: {}", invalid.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")),
        ));
    }

    let showtime: Option<(NaiveDate, NaiveTime, String, String)> = sqlx::query_as(
        r#"
        SELECT st.day, st.time, m.title, m.movie_type
        FROM showtimes st
        JOIN movies m ON m.id = st.movie_id
        WHERE st.id = $1
        "#,
    )
    .bind(req.showtime_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;

    let (day, time, movie_title, movie_type) =
        showtime.ok_or((StatusCode::NOT_FOUND, "Сеанс не найден".to_string()))?;

    if day.and_time(time) < chrono::Local::now().naive_local() {
        return Err((StatusCode::BAD_REQUEST, "Сеанс уже начался".to_string()));
    }

    // Цена каждого места по матрице цен
    let prices: Vec<TicketPrice> = sqlx::query_as(
        "SELECT id, seat_type, movie_type, price, day_type, start_time, end_time FROM ticket_prices",
    )
    .fetch_all(&state.db.pool)
    .await
    .unwrap_or_default();

    let priced: Vec<(String, seat::SeatClass, i64)> = req
        .seats
        .iter()
        .map(|s| {
            let class = seat::class_of(s).unwrap_or(seat::SeatClass::Standard);
            let price = ticket_price::resolve_price(&prices, class, &movie_type, day, time);
            (s.clone(), class, price)
        })
        .collect();
    let total_price: i64 = priced.iter().map(|(_, _, p)| p).sum();

    // Пре-проверка занятых мест ради внятного ответа
    let taken: Vec<String> = sqlx::query_scalar(
        "SELECT seat_number FROM booking_seats WHERE showtime_id = $1 AND seat_number = ANY($2)",
    )
    .bind(req.showtime_id)
    .bind(&req.seats)
    .fetch_all(&state.db.pool)
    .await
    .unwrap_or_default();

    if !taken.is_empty() {
        return Err((
            StatusCode::CONFLICT,
            format!("Места уже проданы: {}", taken.join(", ")),
        ));
    }

    // Начинаем транзакцию
    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка транзакции".to_string()))?;

    let booking_id = match sqlx::query_scalar::<_, i64>(
        "INSERT INTO bookings (user_id, showtime_id, total_seats, total_price)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(user.user_id)
    .bind(req.showtime_id)
    .bind(priced.len() as i32)
    .bind(total_price)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("create_booking sql error: {:?}", e);
            let _ = tx.rollback().await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать бронирование".to_string()));
        }
    };

    for (seat_number, class, price) in &priced {
        let res = sqlx::query(
            "INSERT INTO booking_seats (booking_id, showtime_id, seat_number, seat_type, price)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(booking_id)
        .bind(req.showtime_id)
        .bind(seat_number)
        .bind(class.as_str())
        .bind(price)
        .execute(&mut *tx)
        .await;

        match res {
            Ok(_) => {}
            // Гонка с параллельным чекаутом: место успели продать
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                let _ = tx.rollback().await;
                return Err((
                    StatusCode::CONFLICT,
                    format!("Места уже проданы: {}", seat_number),
                ));
            }
            Err(e) => {
                tracing::error!("create_booking seat insert error: {:?}", e);
                let _ = tx.rollback().await;
                return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось сохранить места".to_string()));
            }
        }
    }

    let transaction_id = format!("TXN-{}", Uuid::new_v4());

    if let Err(e) = sqlx::query(
        "INSERT INTO payments (booking_id, payment_method, payment_status, amount, transaction_id)
         VALUES ($1, $2, 'PENDING', $3, $4)",
    )
    .bind(booking_id)
    .bind(&req.payment_method)
    .bind(total_price)
    .bind(&transaction_id)
    .execute(&mut *tx)
    .await
    {
        tracing::error!("create_booking payment insert error: {:?}", e);
        let _ = tx.rollback().await;
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать платеж".to_string()));
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("create_booking commit error: {:?}", e);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Ошибка фиксации транзакции".to_string()));
    }

    state.cache.invalidate_sold_seats(req.showtime_id).await;

    let issued_at = chrono::Local::now().naive_local();
    let qr_payload = qr::build_payload(
        &state.config.payment.merchant_name,
        total_price,
        &movie_title,
        &req.seats,
        issued_at,
        &transaction_id,
        &state.config.payment.merchant_secret,
    );
    let expires_at = issued_at + chrono::Duration::minutes(state.config.payment.qr_ttl_minutes);

    tracing::info!(
        "Booking {} created: {} seats, total {} VND",
        booking_id,
        priced.len(),
        total_price
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "booking_id": booking_id,
            "total_seats": priced.len(),
            "total_price": total_price,
            "transaction_id": transaction_id,
            "qr_payload": qr_payload,
            "expires_at": expires_at
        })),
    ))
}

/* ---------- BOOKINGS ---------- */

#[derive(Debug, Serialize)]
struct BookingSeatView {
    seat_number: String,
    seat_type: String,
    price: i64,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    id: i64,
    showtime_id: i64,
    total_seats: i32,
    total_price: i64,
    payment_status: Option<String>,
    seats: Vec<BookingSeatView>,
}

// GET /api/bookings - брони текущего пользователя
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT b.id as bid, b.showtime_id as stid, b.total_seats, b.total_price,
               p.payment_status,
               s.seat_number, s.seat_type, s.price
        FROM bookings b
        LEFT JOIN payments p ON p.booking_id = b.id
        LEFT JOIN booking_seats s ON s.booking_id = b.id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC, s.seat_number
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("get_user_bookings sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить список бронирований".to_string())
    })?;

    let mut map: BTreeMap<i64, BookingResponse> = BTreeMap::new();
    for r in rows {
        let bid: i64 = r.get("bid");
        let entry = map.entry(bid).or_insert_with(|| BookingResponse {
            id: bid,
            showtime_id: r.get("stid"),
            total_seats: r.get("total_seats"),
            total_price: r.get("total_price"),
            payment_status: r.try_get("payment_status").ok(),
            seats: Vec::new(),
        });
        if let Ok(seat_number) = r.try_get::<String, _>("seat_number") {
            entry.seats.push(BookingSeatView {
                seat_number,
                seat_type: r.try_get("seat_type").unwrap_or_default(),
                price: r.try_get("price").unwrap_or_default(),
            });
        }
    }

    let resp: Vec<BookingResponse> = map.into_values().collect();
    Ok((StatusCode::OK, Json(resp)))
}

// GET /api/bookings/{id} - владелец или админ
async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Бронирование не найдено".to_string()))?;

    if booking.user_id != user.user_id && user.role_name != "admin" {
        return Err((StatusCode::FORBIDDEN, "Бронирование не принадлежит вам".to_string()));
    }

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE booking_id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await
        .unwrap_or(None);

    let seats = sqlx::query_as::<_, BookingSeat>(
        "SELECT * FROM booking_seats WHERE booking_id = $1 ORDER BY seat_number",
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await
    .unwrap_or_default();

    Ok((
        StatusCode::OK,
        Json(json!({
            "booking": booking,
            "payment": payment,
            "seats": seats
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    booking_id: i64,
}

// PATCH /api/bookings/cancel
//
// Отменить можно только неоплаченную бронь: места возвращаются
// в продажу, платеж помечается FAILED, сама бронь остается в истории.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.booking_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "booking_id должен быть > 0".to_string()));
    }

    // проверка владельца
    let belongs = booking_belongs_to_user(&state.db.pool, req.booking_id, user.user_id)
        .await
        .unwrap_or(false);
    if !belongs {
        return Err((StatusCode::FORBIDDEN, "Бронирование не найдено или не принадлежит вам".to_string()));
    }

    // заранее получим showtime_id для инвалидации кеша позже
    let showtime_id: i64 = sqlx::query_scalar("SELECT showtime_id FROM bookings WHERE id = $1")
        .bind(req.booking_id)
        .fetch_one(&state.db.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;

    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка транзакции".to_string()))?;

    // 1) Платеж должен быть PENDING
    let cancelled = sqlx::query(
        "UPDATE payments SET payment_status = 'FAILED'
         WHERE booking_id = $1 AND payment_status = 'PENDING'",
    )
    .bind(req.booking_id)
    .execute(&mut *tx)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if !cancelled {
        let _ = tx.rollback().await;
        return Err((StatusCode::CONFLICT, "Оплаченную бронь отменить нельзя".to_string()));
    }

    // 2) Освобождаем места
    let freed_result = sqlx::query_scalar::<_, String>(
        "DELETE FROM booking_seats WHERE booking_id = $1 RETURNING seat_number",
    )
    .bind(req.booking_id)
    .fetch_all(&mut *tx)
    .await;

    let freed = match freed_result {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("failed to free seats for booking {}: {:?}", req.booking_id, e);
            let _ = tx.rollback().await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось освободить места".to_string()));
        }
    };

    // 3) Коммитим
    if let Err(e) = tx.commit().await {
        tracing::error!("failed to commit cancel_booking tx for {}: {:?}", req.booking_id, e);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Ошибка фиксации транзакции".to_string()));
    }

    // 4) Инвалидируем кеш мест сеанса
    state.cache.invalidate_sold_seats(showtime_id).await;

    tracing::info!("Booking {} cancelled, {} seats released", req.booking_id, freed.len());

    Ok((StatusCode::OK, Json(json!({ "success": true, "message": "Бронь успешно отменена" }))))
}

// DELETE /api/bookings/{id} - только админ, удаляет бронь целиком
async fn delete_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let showtime_id: Option<i64> = sqlx::query_scalar("SELECT showtime_id FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;

    let showtime_id = showtime_id.ok_or((StatusCode::NOT_FOUND, "Бронирование не найдено".to_string()))?;

    // booking_seats и payments удаляются каскадом
    sqlx::query("DELETE FROM bookings WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("delete_booking sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось удалить бронирование".to_string())
        })?;

    state.cache.invalidate_sold_seats(showtime_id).await;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

/* ---------- ADMIN LIST ---------- */

#[derive(Debug, Deserialize)]
struct AdminBookingsQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

// GET /api/admin/bookings - список всех броней с контекстом
async fn admin_list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<AdminBookingsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 50);
    let offset = ((page - 1) * page_size) as i64;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(0);

    let rows = sqlx::query(
        r#"
        SELECT b.id, u.email, m.title, st.day, st.time,
               b.total_seats, b.total_price, p.payment_status, b.created_at
        FROM bookings b
        JOIN users u ON u.id = b.user_id
        JOIN showtimes st ON st.id = b.showtime_id
        JOIN movies m ON m.id = st.movie_id
        LEFT JOIN payments p ON p.booking_id = b.id
        ORDER BY b.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("admin_list_bookings sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить список бронирований".to_string())
    })?;

    let bookings: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|r| {
            json!({
                "id": r.get::<i64, _>("id"),
                "user_email": r.get::<String, _>("email"),
                "movie_title": r.get::<String, _>("title"),
                "day": r.get::<NaiveDate, _>("day"),
                "time": r.get::<NaiveTime, _>("time").format("%H:%M").to_string(),
                "total_seats": r.get::<i32, _>("total_seats"),
                "total_price": r.get::<i64, _>("total_price"),
                "payment_status": r.try_get::<String, _>("payment_status").ok(),
                "created_at": r.get::<chrono::NaiveDateTime, _>("created_at"),
            })
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "bookings": bookings,
            "total": total,
            "page": page,
            "pageSize": page_size
        })),
    ))
}
