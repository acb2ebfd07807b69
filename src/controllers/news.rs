use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::middleware::AdminUser;
use crate::models::News;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/news", get(list_news).post(create_news))
        .route(
            "/news/{id}",
            get(get_news).patch(update_news).delete(delete_news),
        )
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

// GET /api/news
async fn list_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 50);
    let offset = ((page - 1) * page_size) as i64;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(0);

    let news = sqlx::query_as::<_, News>(
        "SELECT id, title, content, image, created_at, updated_at
         FROM news ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_news sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить новости".to_string())
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "news": news, "total": total })),
    ))
}

// GET /api/news/{id}
async fn get_news(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let item = sqlx::query_as::<_, News>(
        "SELECT id, title, content, image, created_at, updated_at FROM news WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;

    match item {
        Some(item) => Ok((StatusCode::OK, Json(item))),
        None => Err((StatusCode::NOT_FOUND, "Новость не найдена".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct NewsPayload {
    title: Option<String>,
    content: Option<String>,
    image: Option<String>,
}

// POST /api/news - только админ
async fn create_news(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<NewsPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let title = req.title.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Заголовок не может быть пустым".to_string()));
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO news (title, content, image) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&title)
    .bind(req.content.unwrap_or_default())
    .bind(req.image)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_news sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать новость".to_string())
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

// PATCH /api/news/{id} - только админ
async fn update_news(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<NewsPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let updated = sqlx::query(
        "UPDATE news
         SET title = COALESCE($2, title),
             content = COALESCE($3, content),
             image = COALESCE($4, image),
             updated_at = NOW()
         WHERE id = $1",
    )
    .bind(id)
    .bind(req.title)
    .bind(req.content)
    .bind(req.image)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .map_err(|e| {
        tracing::error!("update_news sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить новость".to_string())
    })?;

    if updated {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Новость не найдена".to_string()))
    }
}

// DELETE /api/news/{id} - только админ
async fn delete_news(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = sqlx::query("DELETE FROM news WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if deleted {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Новость не найдена".to_string()))
    }
}
