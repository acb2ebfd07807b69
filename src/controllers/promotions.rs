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
use crate::models::Promotion;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/promotions", get(list_promotions).post(create_promotion))
        .route(
            "/promotions/{id}",
            get(get_promotion).patch(update_promotion).delete(delete_promotion),
        )
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

// GET /api/promotions
async fn list_promotions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 50);
    let offset = ((page - 1) * page_size) as i64;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM promotions")
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(0);

    let promotions = sqlx::query_as::<_, Promotion>(
        "SELECT id, title, image, content, created_at
         FROM promotions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_promotions sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить акции".to_string())
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "promotions": promotions, "total": total })),
    ))
}

// GET /api/promotions/{id}
async fn get_promotion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let item = sqlx::query_as::<_, Promotion>(
        "SELECT id, title, image, content, created_at FROM promotions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;

    match item {
        Some(item) => Ok((StatusCode::OK, Json(item))),
        None => Err((StatusCode::NOT_FOUND, "Акция не найдена".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct PromotionPayload {
    title: Option<String>,
    image: Option<String>,
    content: Option<String>,
}

// POST /api/promotions - только админ
async fn create_promotion(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<PromotionPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let title = req.title.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Заголовок не может быть пустым".to_string()));
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO promotions (title, image, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&title)
    .bind(req.image.unwrap_or_default())
    .bind(req.content.unwrap_or_default())
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_promotion sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать акцию".to_string())
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

// PATCH /api/promotions/{id} - только админ
async fn update_promotion(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<PromotionPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let updated = sqlx::query(
        "UPDATE promotions
         SET title = COALESCE($2, title),
             image = COALESCE($3, image),
             content = COALESCE($4, content)
         WHERE id = $1",
    )
    .bind(id)
    .bind(req.title)
    .bind(req.image)
    .bind(req.content)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .map_err(|e| {
        tracing::error!("update_promotion sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить акцию".to_string())
    })?;

    if updated {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Акция не найдена".to_string()))
    }
}

// DELETE /api/promotions/{id} - только админ
async fn delete_promotion(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = sqlx::query("DELETE FROM promotions WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if deleted {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err((StatusCode::NOT_FOUND, "Акция не найдена".to_string()))
    }
}
