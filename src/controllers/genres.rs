use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::middleware::AdminUser;
use crate::models::Genre;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/genres", get(list_genres).post(create_genre))
        .route("/genres/{id}", axum::routing::delete(delete_genre))
}

// GET /api/genres
async fn list_genres(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let genres = sqlx::query_as::<_, Genre>("SELECT id, genre_name FROM genres ORDER BY genre_name")
        .fetch_all(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("list_genres sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить жанры".to_string())
        })?;

    Ok((StatusCode::OK, Json(genres)))
}

#[derive(Debug, Deserialize)]
struct CreateGenreRequest {
    genre_name: String,
}

// POST /api/genres - только админ
async fn create_genre(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateGenreRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let name = req.genre_name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Название жанра не может быть пустым".to_string()));
    }

    let res = sqlx::query_scalar::<_, i64>("INSERT INTO genres (genre_name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(&state.db.pool)
        .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id })))),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err((StatusCode::CONFLICT, "Такой жанр уже существует".to_string()))
        }
        Err(e) => {
            tracing::error!("create_genre sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать жанр".to_string()))
        }
    }
}

// DELETE /api/genres/{id} - только админ
async fn delete_genre(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let in_use = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM movies WHERE genre_id = $1)")
        .bind(id)
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(false);

    if in_use {
        return Err((StatusCode::CONFLICT, "Жанр используется фильмами".to_string()));
    }

    let deleted = sqlx::query("DELETE FROM genres WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if deleted {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Жанр не найден".to_string()))
    }
}
