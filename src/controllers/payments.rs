use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, Row};
use std::sync::Arc;

use crate::middleware::AuthUser;
use crate::models::Payment;
use crate::services::qr;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/confirm", patch(confirm_payment))
        .route("/payments/history", get(payment_history))
        .route("/bookings/{id}/payment-status", get(get_payment_status))
}

// --- Request/Response структуры ---

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub booking_id: i64,
    pub transaction_id: String,
    pub signature: String,
}

#[derive(Serialize)]
pub struct ApiError {
    success: bool,
    message: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

fn to_api_error(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            success: false,
            message: message.to_string(),
        }),
    )
}

// --- HTTP Handlers ---

/// PATCH /api/payments/confirm
///
/// Кнопка "Я оплатил": подпись из QR-кода подтверждает, что клиент
/// оплачивает именно эту сумму по именно этому заказу. Завершить
/// можно только PENDING-платеж.
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ConfirmPaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.booking_id <= 0 {
        return Err(to_api_error(StatusCode::BAD_REQUEST, "ID бронирования должен быть > 0"));
    }

    let payment_row = sqlx::query(
        r#"
        SELECT p.id, p.amount, p.transaction_id, p.payment_status,
               b.showtime_id, m.title
        FROM payments p
        JOIN bookings b ON b.id = p.booking_id
        JOIN showtimes st ON st.id = b.showtime_id
        JOIN movies m ON m.id = st.movie_id
        WHERE p.booking_id = $1 AND b.user_id = $2
        "#,
    )
    .bind(req.booking_id)
    .bind(user.user_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Ошибка БД при получении платежа: {:?}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Ошибка базы данных")
    })?
    .ok_or_else(|| to_api_error(StatusCode::NOT_FOUND, "Платеж для данного бронирования не найден"))?;

    let payment_id: i64 = payment_row.get("id");
    let amount: i64 = payment_row.get("amount");
    let transaction_id: String = payment_row.get("transaction_id");
    let payment_status: String = payment_row.get("payment_status");
    let movie_title: String = payment_row.get("title");

    if transaction_id != req.transaction_id {
        return Err(to_api_error(StatusCode::BAD_REQUEST, "Неверный идентификатор транзакции"));
    }

    if !qr::verify(amount, &transaction_id, &state.config.payment.merchant_secret, &req.signature) {
        return Err(to_api_error(StatusCode::BAD_REQUEST, "Неверная подпись платежа"));
    }

    if payment_status != "PENDING" {
        return Err(to_api_error(StatusCode::CONFLICT, "Платеж уже завершен или отменен"));
    }

    // Условие payment_status = 'PENDING' закрывает гонку с cleanup
    let completed = sqlx::query(
        "UPDATE payments SET payment_status = 'COMPLETED', payment_time = NOW()
         WHERE id = $1 AND payment_status = 'PENDING'",
    )
    .bind(payment_id)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if !completed {
        return Err(to_api_error(StatusCode::CONFLICT, "Платеж уже завершен или отменен"));
    }

    tracing::info!(
        "Платеж {} подтвержден для бронирования {}: сумма={}",
        transaction_id,
        req.booking_id,
        amount
    );

    // Письмо с билетами отправляем в фоне - подтверждение платежа
    // не должно зависеть от почтового шлюза
    let seats: Vec<String> = sqlx::query_scalar(
        "SELECT seat_number FROM booking_seats WHERE booking_id = $1 ORDER BY seat_number",
    )
    .bind(req.booking_id)
    .fetch_all(&state.db.pool)
    .await
    .unwrap_or_default();

    let email_client = state.email.clone();
    let to = user.email.clone();
    let merchant = state.config.payment.merchant_name.clone();
    let secret = state.config.payment.merchant_secret.clone();
    tokio::spawn(async move {
        let payload = qr::build_payload(
            &merchant,
            amount,
            &movie_title,
            &seats,
            chrono::Local::now().naive_local(),
            &transaction_id,
            &secret,
        );
        if let Err(e) = email_client
            .send_booking_confirmation(&to, &movie_title, &seats, amount, &payload)
            .await
        {
            tracing::warn!("Не удалось отправить подтверждение брони: {}", e);
        }
    });

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "booking_id": req.booking_id,
            "payment_status": "COMPLETED"
        })),
    ))
}

/// GET /api/payments/history - история платежей пользователя
pub async fn payment_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let rows = sqlx::query(
        r#"
        SELECT p.*, m.title, st.day, st.time
        FROM payments p
        JOIN bookings b ON b.id = p.booking_id
        JOIN showtimes st ON st.id = b.showtime_id
        JOIN movies m ON m.id = st.movie_id
        WHERE b.user_id = $1
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Ошибка БД при получении истории: {:?}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД")
    })?;

    let payments: Vec<serde_json::Value> = rows
        .into_iter()
        .filter_map(|r| {
            let payment = Payment::from_row(&r).ok()?;
            Some(json!({
                "payment": payment,
                "movie_title": r.get::<String, _>("title"),
                "day": r.get::<chrono::NaiveDate, _>("day"),
                "time": r.get::<chrono::NaiveTime, _>("time").format("%H:%M").to_string(),
            }))
        })
        .collect();

    Ok((StatusCode::OK, Json(json!({ "success": true, "payments": payments }))))
}

/// GET /api/bookings/{booking_id}/payment-status
pub async fn get_payment_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let status: Option<(String, String)> = sqlx::query_as(
        "SELECT p.payment_status, p.transaction_id FROM payments p
         JOIN bookings b ON b.id = p.booking_id
         WHERE p.booking_id = $1 AND b.user_id = $2
         ORDER BY p.created_at DESC LIMIT 1",
    )
    .bind(booking_id)
    .bind(user.user_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Ошибка БД при получении статуса: {}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД")
    })?;

    match status {
        Some((status, transaction_id)) => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "booking_id": booking_id,
                "payment_status": status,
                "transaction_id": transaction_id
            })),
        )),
        None => Err(to_api_error(StatusCode::NOT_FOUND, "Платеж для данного бронирования не найден")),
    }
}
