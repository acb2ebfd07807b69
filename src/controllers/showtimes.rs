use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::middleware::AdminUser;
use crate::models::{seat, ticket_price, Showtime, TicketPrice};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes", get(list_showtimes).post(create_showtime))
        .route("/showtimes/calendar", get(showtimes_calendar))
        .route(
            "/showtimes/{id}",
            axum::routing::patch(update_showtime).delete(delete_showtime),
        )
        .route("/showtimes/{id}/seats", get(get_showtime_seats))
}

/* ---------- helpers ---------- */

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

// Клиент шлет "18:30", БД отдает "18:30:00" - принимаем оба формата
fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

fn is_in_past(day: NaiveDate, time: NaiveTime, now: NaiveDateTime) -> bool {
    day.and_time(time) < now
}

async fn duplicate_exists(
    pool: &sqlx::PgPool,
    movie_id: i64,
    day: NaiveDate,
    time: NaiveTime,
    exclude_id: Option<i64>,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
           SELECT 1 FROM showtimes
           WHERE movie_id = $1 AND day = $2 AND time = $3 AND id <> COALESCE($4, -1)
         )",
    )
    .bind(movie_id)
    .bind(day)
    .bind(time)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Serialize)]
struct CalendarDay {
    day: NaiveDate,
    hours: Vec<String>,
}

// Группировка расписания в форму календаря: день -> часы по возрастанию
fn group_calendar(showtimes: &[Showtime]) -> Vec<CalendarDay> {
    let mut map: BTreeMap<NaiveDate, Vec<NaiveTime>> = BTreeMap::new();
    for st in showtimes {
        map.entry(st.day).or_default().push(st.time);
    }

    map.into_iter()
        .map(|(day, mut times)| {
            times.sort();
            CalendarDay {
                day,
                hours: times.iter().map(|t| t.format("%H:%M").to_string()).collect(),
            }
        })
        .collect()
}

/* ---------- SHOWTIMES ---------- */

#[derive(Debug, Deserialize)]
struct ShowtimesQuery {
    movie_id: Option<i64>,
    day: Option<String>,
}

// GET /api/showtimes
//
// Коллекция расписания целиком живет в кеше (вторая кешируемая
// коллекция наряду с каталогом фильмов), фильтры применяем в памяти.
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShowtimesQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let day = match params.day.as_deref() {
        Some(s) => Some(parse_day(s).ok_or((
            StatusCode::BAD_REQUEST,
            "day должен быть в формате YYYY-MM-DD".to_string(),
        ))?),
        None => None,
    };

    let showtimes: Vec<Showtime> = state
        .cache
        .get_showtimes()
        .await
        .into_iter()
        .filter(|st| params.movie_id.map_or(true, |m| st.movie_id == m))
        .filter(|st| day.map_or(true, |d| st.day == d))
        .collect();

    let count = showtimes.len();
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "showtimes": showtimes,
            "count": count
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct CalendarQuery {
    movie_id: i64,
}

// GET /api/showtimes/calendar?movie_id=
async fn showtimes_calendar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CalendarQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if params.movie_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "movie_id должен быть > 0".to_string()));
    }

    let showtimes: Vec<Showtime> = state
        .cache
        .get_showtimes()
        .await
        .into_iter()
        .filter(|st| st.movie_id == params.movie_id)
        .collect();

    Ok((StatusCode::OK, Json(json!({ "success": true, "days": group_calendar(&showtimes) }))))
}

#[derive(Debug, Deserialize)]
struct CreateShowtimeRequest {
    movie_id: i64,
    day: String,
    time: String,
}

// POST /api/showtimes - только админ
//
// Пре-проверка дубликата дает человеческое сообщение об ошибке,
// но последнее слово за уникальным индексом (movie_id, day, time).
async fn create_showtime(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateShowtimeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.movie_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "movie_id должен быть > 0".to_string()));
    }
    let day = parse_day(&req.day)
        .ok_or((StatusCode::BAD_REQUEST, "day должен быть в формате YYYY-MM-DD".to_string()))?;
    let time = parse_time(&req.time)
        .ok_or((StatusCode::BAD_REQUEST, "time должен быть в формате HH:MM".to_string()))?;

    let movie_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
        .bind(req.movie_id)
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(false);
    if !movie_exists {
        return Err((StatusCode::BAD_REQUEST, "Фильм не найден".to_string()));
    }

    if is_in_past(day, time, chrono::Local::now().naive_local()) {
        return Err((StatusCode::BAD_REQUEST, "Нельзя создать сеанс в прошлом".to_string()));
    }

    let duplicate = duplicate_exists(&state.db.pool, req.movie_id, day, time, None)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;
    if duplicate {
        return Err((
            StatusCode::CONFLICT,
            "Сеанс этого фильма на это время уже существует".to_string(),
        ));
    }

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO showtimes (movie_id, day, time) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(req.movie_id)
    .bind(day)
    .bind(time)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => {
            state.cache.invalidate_showtimes().await;
            Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
        }
        // Гонка двух одновременных POST: индекс отловил дубликат
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err((
            StatusCode::CONFLICT,
            "Сеанс этого фильма на это время уже существует".to_string(),
        )),
        Err(e) => {
            tracing::error!("create_showtime sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать сеанс".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateShowtimeRequest {
    movie_id: Option<i64>,
    day: Option<String>,
    time: Option<String>,
}

// PATCH /api/showtimes/{id} - только админ
async fn update_showtime(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateShowtimeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let current = sqlx::query_as::<_, Showtime>(
        "SELECT id, movie_id, day, time, created_at FROM showtimes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?
    .ok_or((StatusCode::NOT_FOUND, "Сеанс не найден".to_string()))?;

    let movie_id = req.movie_id.unwrap_or(current.movie_id);
    if movie_id != current.movie_id {
        let movie_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
            .bind(movie_id)
            .fetch_one(&state.db.pool)
            .await
            .unwrap_or(false);
        if !movie_exists {
            return Err((StatusCode::BAD_REQUEST, "Фильм не найден".to_string()));
        }
    }
    let day = match req.day.as_deref() {
        Some(s) => parse_day(s)
            .ok_or((StatusCode::BAD_REQUEST, "day должен быть в формате YYYY-MM-DD".to_string()))?,
        None => current.day,
    };
    let time = match req.time.as_deref() {
        Some(s) => parse_time(s)
            .ok_or((StatusCode::BAD_REQUEST, "time должен быть в формате HH:MM".to_string()))?,
        None => current.time,
    };

    if is_in_past(day, time, chrono::Local::now().naive_local()) {
        return Err((StatusCode::BAD_REQUEST, "Нельзя перенести сеанс в прошлое".to_string()));
    }

    let duplicate = duplicate_exists(&state.db.pool, movie_id, day, time, Some(id))
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;
    if duplicate {
        return Err((
            StatusCode::CONFLICT,
            "Сеанс этого фильма на это время уже существует".to_string(),
        ));
    }

    let res = sqlx::query("UPDATE showtimes SET movie_id = $2, day = $3, time = $4 WHERE id = $1")
        .bind(id)
        .bind(movie_id)
        .bind(day)
        .bind(time)
        .execute(&state.db.pool)
        .await;

    match res {
        Ok(_) => {
            state.cache.invalidate_showtimes().await;
            Ok((StatusCode::OK, Json(json!({ "success": true }))))
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err((
            StatusCode::CONFLICT,
            "Сеанс этого фильма на это время уже существует".to_string(),
        )),
        Err(e) => {
            tracing::error!("update_showtime sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить сеанс".to_string()))
        }
    }
}

// DELETE /api/showtimes/{id} - только админ
async fn delete_showtime(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let has_bookings = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM bookings WHERE showtime_id = $1)",
    )
    .bind(id)
    .fetch_one(&state.db.pool)
    .await
    .unwrap_or(false);

    if has_bookings {
        return Err((StatusCode::CONFLICT, "Нельзя удалить сеанс с бронированиями".to_string()));
    }

    let deleted = sqlx::query("DELETE FROM showtimes WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if deleted {
        state.cache.invalidate_showtimes().await;
        state.cache.invalidate_sold_seats(id).await;
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Сеанс не найден".to_string()))
    }
}

/* ---------- SEAT MAP ---------- */

#[derive(Debug, Serialize)]
struct SeatView {
    seat_number: String,
    seat_type: &'static str,
    price: i64,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SeatRowView {
    row: char,
    seats: Vec<SeatView>,
}

// GET /api/showtimes/{id}/seats
//
// Статичная схема зала, слитая с проданными местами сеанса и ценой
// каждого места.
async fn get_showtime_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let showtime: Option<(i64, NaiveDate, NaiveTime, i64, String, String)> = sqlx::query_as(
        r#"
        SELECT st.id, st.day, st.time, m.id, m.title, m.movie_type
        FROM showtimes st
        JOIN movies m ON m.id = st.movie_id
        WHERE st.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("get_showtime_seats sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string())
    })?;

    let (showtime_id, day, time, movie_id, movie_title, movie_type) =
        showtime.ok_or((StatusCode::NOT_FOUND, "Сеанс не найден".to_string()))?;

    let sold = state.cache.get_sold_seats(showtime_id).await;

    let prices: Vec<TicketPrice> = sqlx::query_as(
        "SELECT id, seat_type, movie_type, price, day_type, start_time, end_time FROM ticket_prices",
    )
    .fetch_all(&state.db.pool)
    .await
    .unwrap_or_default();

    let rows: Vec<SeatRowView> = seat::SEAT_LAYOUT
        .iter()
        .map(|row| SeatRowView {
            row: row.letter,
            seats: (1..=row.seats)
                .map(|n| {
                    let seat_number = format!("{}{}", row.letter, n);
                    let status = if sold.contains(&seat_number) { "SOLD" } else { "FREE" };
                    SeatView {
                        price: ticket_price::resolve_price(&prices, row.class, &movie_type, day, time),
                        seat_number,
                        seat_type: row.class.as_str(),
                        status,
                    }
                })
                .collect(),
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "showtime_id": showtime_id,
            "movie": { "id": movie_id, "title": movie_title, "type": movie_type },
            "day": day,
            "time": time.format("%H:%M").to_string(),
            "total_seats": seat::total_seats(),
            "sold_count": sold.len(),
            "rows": rows
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn st(id: i64, movie_id: i64, day: &str, time: &str) -> Showtime {
        Showtime {
            id,
            movie_id,
            day: parse_day(day).unwrap(),
            time: parse_time(time).unwrap(),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn parses_client_time_formats() {
        assert_eq!(parse_time("18:30"), NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(parse_time("18:30:00"), NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(parse_time("half past six"), None);
        assert_eq!(parse_day("2026-08-05"), NaiveDate::from_ymd_opt(2026, 8, 5));
        assert_eq!(parse_day("05.08.2026"), None);
    }

    #[test]
    fn past_screenings_are_detected() {
        let now = NaiveDate::from_ymd_opt(2026, 8, 5)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        assert!(is_in_past(day, NaiveTime::from_hms_opt(11, 59, 0).unwrap(), now));
        assert!(!is_in_past(day, NaiveTime::from_hms_opt(12, 0, 0).unwrap(), now));
        assert!(!is_in_past(day, NaiveTime::from_hms_opt(20, 0, 0).unwrap(), now));
    }

    #[test]
    fn calendar_groups_by_day_and_sorts_hours() {
        let showtimes = vec![
            st(1, 7, "2026-08-06", "20:00"),
            st(2, 7, "2026-08-05", "18:30"),
            st(3, 7, "2026-08-06", "09:15"),
        ];

        let days = group_calendar(&showtimes);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day, parse_day("2026-08-05").unwrap());
        assert_eq!(days[0].hours, vec!["18:30"]);
        assert_eq!(days[1].hours, vec!["09:15", "20:00"]);
    }
}
