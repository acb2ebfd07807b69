use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{FromRow, Row};
use std::sync::Arc;

use crate::middleware::AuthUser;
use crate::models::Bookmark;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookmarks", get(list_bookmarks).post(add_bookmark))
        .route("/bookmarks/{movie_id}", axum::routing::delete(remove_bookmark))
}

// GET /api/bookmarks - закладки текущего пользователя с фильмами
async fn list_bookmarks(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT bm.*, m.title, m.image
        FROM bookmarks bm
        JOIN movies m ON m.id = bm.movie_id
        WHERE bm.user_id = $1
        ORDER BY bm.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_bookmarks sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить закладки".to_string())
    })?;

    let bookmarks: Vec<serde_json::Value> = rows
        .into_iter()
        .filter_map(|r| {
            let bookmark = Bookmark::from_row(&r).ok()?;
            Some(json!({
                "bookmark": bookmark,
                "title": r.get::<String, _>("title"),
                "image": r.get::<String, _>("image"),
            }))
        })
        .collect();

    Ok((StatusCode::OK, Json(json!({ "success": true, "bookmarks": bookmarks }))))
}

#[derive(Debug, Deserialize)]
struct AddBookmarkRequest {
    movie_id: i64,
}

// POST /api/bookmarks
async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<AddBookmarkRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.movie_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "movie_id должен быть > 0".to_string()));
    }

    let movie_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
        .bind(req.movie_id)
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(false);
    if !movie_exists {
        return Err((StatusCode::NOT_FOUND, "Фильм не найден".to_string()));
    }

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO bookmarks (user_id, movie_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(user.user_id)
    .bind(req.movie_id)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id })))),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err((StatusCode::CONFLICT, "Фильм уже в закладках".to_string()))
        }
        Err(e) => {
            tracing::error!("add_bookmark sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось добавить закладку".to_string()))
        }
    }
}

// DELETE /api/bookmarks/{movie_id}
async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(movie_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND movie_id = $2")
        .bind(user.user_id)
        .bind(movie_id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if deleted {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Закладка не найдена".to_string()))
    }
}
