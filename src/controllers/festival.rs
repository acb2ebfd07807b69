use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::middleware::AdminUser;
use crate::models::FestivalEvent;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/festival", get(list_festival).post(create_festival))
        .route(
            "/festival/{id}",
            get(get_festival).patch(update_festival).delete(delete_festival),
        )
}

// GET /api/festival - свежие события первыми
async fn list_festival(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let events = sqlx::query_as::<_, FestivalEvent>(
        "SELECT id, name, date, image, description, created_at
         FROM festival_events
         ORDER BY date DESC NULLS LAST, created_at DESC",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_festival sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить события фестиваля".to_string())
    })?;

    Ok((StatusCode::OK, Json(json!({ "success": true, "events": events }))))
}

// GET /api/festival/{id}
async fn get_festival(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let event = sqlx::query_as::<_, FestivalEvent>(
        "SELECT id, name, date, image, description, created_at FROM festival_events WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;

    match event {
        Some(event) => Ok((StatusCode::OK, Json(event))),
        None => Err((StatusCode::NOT_FOUND, "Событие не найдено".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct FestivalPayload {
    name: Option<String>,
    date: Option<NaiveDateTime>,
    image: Option<String>,
    description: Option<String>,
}

// POST /api/festival - только админ
async fn create_festival(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<FestivalPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let name = req.name.as_deref().unwrap_or("").trim().to_string();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Название не может быть пустым".to_string()));
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO festival_events (name, date, image, description)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&name)
    .bind(req.date)
    .bind(req.image.unwrap_or_default())
    .bind(req.description.unwrap_or_default())
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_festival sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать событие".to_string())
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

// PATCH /api/festival/{id} - только админ
async fn update_festival(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<FestivalPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let updated = sqlx::query(
        "UPDATE festival_events
         SET name = COALESCE($2, name),
             date = COALESCE($3, date),
             image = COALESCE($4, image),
             description = COALESCE($5, description)
         WHERE id = $1",
    )
    .bind(id)
    .bind(req.name)
    .bind(req.date)
    .bind(req.image)
    .bind(req.description)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .map_err(|e| {
        tracing::error!("update_festival sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить событие".to_string())
    })?;

    if updated {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Событие не найдено".to_string()))
    }
}

// DELETE /api/festival/{id} - только админ
async fn delete_festival(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = sqlx::query("DELETE FROM festival_events WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if deleted {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Событие не найдено".to_string()))
    }
}
