//! analytics.rs
//!
//! Статистика продаж для админской панели.
//!
//! - Детальная статистика мест и выручки по одному сеансу.
//! - Сводные счетчики по всей системе для дашборда.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;

use crate::middleware::AdminUser;
use crate::models::seat;
use crate::AppState;

/// Определяет маршруты, связанные с аналитикой.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analytics", get(get_showtime_analytics))
        .route("/analytics/summary", get(get_summary))
}

// --- Вспомогательные функции ---

/// Проверяет, существует ли сеанс с указанным ID.
async fn showtime_exists(pool: &sqlx::PgPool, showtime_id: i64) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM showtimes WHERE id = $1)")
        .bind(showtime_id)
        .fetch_one(pool)
        .await
}

// --- Управление аналитикой ---

/// GET /api/analytics?showtime_id=
///
/// Возвращает статистику продаж по сеансу: места из статичной схемы
/// зала, выручка и число броней по завершенным платежам.
#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    pub showtime_id: i64,
}

#[derive(Debug, Serialize)]
struct AnalyticsResponse {
    pub showtime_id: i64,
    pub total_seats: i64,
    pub sold_seats: i64,
    pub free_seats: i64,
    pub total_revenue: i64,
    pub bookings_count: i64,
    pub pending_bookings: i64,
}

async fn get_showtime_analytics(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if params.showtime_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "showtime_id должен быть > 0".to_string()));
    }

    let exists = showtime_exists(&state.db.pool, params.showtime_id)
        .await
        .map_err(|e| {
            tracing::error!("get_showtime_analytics: ошибка проверки сеанса {}: {:?}", params.showtime_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка проверки сеанса".to_string())
        })?;

    if !exists {
        return Err((StatusCode::NOT_FOUND, "Сеанс не найден".to_string()));
    }

    // Агрегаты с FILTER: одна выборка по booking_seats сеанса.
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(s.id) as sold_seats,
            COALESCE(SUM(s.price) FILTER (WHERE p.payment_status = 'COMPLETED'), 0)::BIGINT as total_revenue,
            COUNT(DISTINCT b.id) FILTER (WHERE p.payment_status = 'COMPLETED') as bookings_count,
            COUNT(DISTINCT b.id) FILTER (WHERE p.payment_status = 'PENDING') as pending_bookings
        FROM booking_seats s
        JOIN bookings b ON b.id = s.booking_id
        LEFT JOIN payments p ON p.booking_id = b.id
        WHERE s.showtime_id = $1
        "#,
    )
    .bind(params.showtime_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("get_showtime_analytics: sql ошибка для сеанса {}: {:?}", params.showtime_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить аналитику".to_string())
    })?;

    let sold_seats: i64 = row.get("sold_seats");
    let total_seats = seat::total_seats() as i64;

    let response = AnalyticsResponse {
        showtime_id: params.showtime_id,
        total_seats,
        sold_seats,
        free_seats: total_seats - sold_seats,
        total_revenue: row.get("total_revenue"),
        bookings_count: row.get("bookings_count"),
        pending_bookings: row.get("pending_bookings"),
    };

    tracing::info!(
        "Аналитика сеанса {}: продано {} из {}, выручка {}",
        params.showtime_id,
        response.sold_seats,
        response.total_seats,
        response.total_revenue
    );

    Ok((StatusCode::OK, Json(response)))
}

/// GET /api/analytics/summary - счетчики для дашборда
async fn get_summary(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let movies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(0);

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_name = 'user'")
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(0);

    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(0);

    let upcoming_showtimes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM showtimes WHERE day >= CURRENT_DATE")
            .fetch_one(&state.db.pool)
            .await
            .unwrap_or(0);

    let total_revenue: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE payment_status = 'COMPLETED'",
    )
    .fetch_one(&state.db.pool)
    .await
    .unwrap_or(0);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "movies": movies,
            "users": users,
            "bookings": bookings,
            "upcoming_showtimes": upcoming_showtimes,
            "total_revenue": total_revenue
        })),
    ))
}
