use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::middleware::AdminUser;
use crate::models::movie::MOVIE_TYPES;
use crate::models::{SeatClass, TicketPrice};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ticket_prices", get(list_prices).post(create_price))
        .route(
            "/ticket_prices/{id}",
            axum::routing::patch(update_price).delete(delete_price),
        )
}

// Классы мест берем из схемы зала, а не дублируем строками
fn valid_seat_type(s: &str) -> bool {
    [SeatClass::Standard, SeatClass::Vip, SeatClass::Sweetbox]
        .iter()
        .any(|c| c.as_str() == s)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

// GET /api/ticket_prices
async fn list_prices(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let prices = sqlx::query_as::<_, TicketPrice>(
        "SELECT id, seat_type, movie_type, price, day_type, start_time, end_time
         FROM ticket_prices
         ORDER BY day_type, start_time, seat_type",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_prices sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить цены".to_string())
    })?;

    Ok((StatusCode::OK, Json(json!({ "success": true, "ticket_prices": prices }))))
}

#[derive(Debug, Deserialize)]
struct PricePayload {
    seat_type: String,
    movie_type: String,
    price: i64,
    day_type: i16,
    start_time: String,
    end_time: String,
}

fn validate_price_payload(req: &PricePayload) -> Result<(NaiveTime, NaiveTime), (StatusCode, String)> {
    if !valid_seat_type(&req.seat_type) {
        return Err((
            StatusCode::BAD_REQUEST,
            "seat_type должен быть STANDARD, VIP или SWEETBOX".to_string(),
        ));
    }
    if !MOVIE_TYPES.contains(&req.movie_type.as_str()) {
        return Err((StatusCode::BAD_REQUEST, "movie_type должен быть 2D или 3D".to_string()));
    }
    if req.price <= 0 {
        return Err((StatusCode::BAD_REQUEST, "Цена должна быть > 0".to_string()));
    }
    if req.day_type != 0 && req.day_type != 1 {
        return Err((StatusCode::BAD_REQUEST, "day_type должен быть 0 или 1".to_string()));
    }

    let start = parse_time(&req.start_time)
        .ok_or((StatusCode::BAD_REQUEST, "start_time должен быть в формате HH:MM".to_string()))?;
    let end = parse_time(&req.end_time)
        .ok_or((StatusCode::BAD_REQUEST, "end_time должен быть в формате HH:MM".to_string()))?;
    if start >= end {
        return Err((StatusCode::BAD_REQUEST, "start_time должен быть раньше end_time".to_string()));
    }

    Ok((start, end))
}

// POST /api/ticket_prices - только админ
async fn create_price(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<PricePayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (start, end) = validate_price_payload(&req)?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO ticket_prices (seat_type, movie_type, price, day_type, start_time, end_time)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(&req.seat_type)
    .bind(&req.movie_type)
    .bind(req.price)
    .bind(req.day_type)
    .bind(start)
    .bind(end)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_price sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать цену".to_string())
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

// PATCH /api/ticket_prices/{id} - только админ, запись заменяется целиком
async fn update_price(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<PricePayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (start, end) = validate_price_payload(&req)?;

    let updated = sqlx::query(
        "UPDATE ticket_prices
         SET seat_type = $2, movie_type = $3, price = $4, day_type = $5,
             start_time = $6, end_time = $7
         WHERE id = $1",
    )
    .bind(id)
    .bind(&req.seat_type)
    .bind(&req.movie_type)
    .bind(req.price)
    .bind(req.day_type)
    .bind(start)
    .bind(end)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .map_err(|e| {
        tracing::error!("update_price sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить цену".to_string())
    })?;

    if updated {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Цена не найдена".to_string()))
    }
}

// DELETE /api/ticket_prices/{id} - только админ
async fn delete_price(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = sqlx::query("DELETE FROM ticket_prices WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if deleted {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Цена не найдена".to_string()))
    }
}
