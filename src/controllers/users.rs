use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::middleware::{AdminUser, AuthUser};
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/me", get(get_profile).patch(update_profile))
        .route("/users", get(admin_list_users))
        .route("/users/{id}/status", patch(admin_set_status))
        .route("/users/{id}", axum::routing::delete(admin_delete_user))
}

async fn load_user(state: &AppState, id: i64) -> Result<User, (StatusCode, String)> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Пользователь не найден".to_string()))
}

// GET /api/users/me
async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = load_user(&state, user.user_id).await?;
    Ok((StatusCode::OK, Json(profile)))
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    last_name: Option<String>,
    #[validate(length(max = 20))]
    phone: Option<String>,
    address: Option<String>,
    avatar: Option<String>,
    #[validate(length(min = 6, max = 72))]
    password: Option<String>,
}

// PATCH /api/users/me
async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let password_changed = req.password.is_some();
    let password_hash = match req.password {
        Some(p) => Some(
            bcrypt::hash(&p, bcrypt::DEFAULT_COST)
                .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка хеширования пароля".to_string()))?,
        ),
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            address = COALESCE($5, address),
            avatar = COALESCE($6, avatar),
            password_hash = COALESCE($7, password_hash),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user.user_id)
    .bind(req.first_name)
    .bind(req.last_name)
    .bind(req.phone)
    .bind(req.address)
    .bind(req.avatar)
    .bind(password_hash)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("update_profile sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить профиль".to_string())
    })?;

    // Смена пароля или имени делает кешированные сессии устаревшими
    let _ = state.cache.invalidate_user_auth(&user.email).await;
    if password_changed {
        tracing::info!("User {} changed password", user.email);
    }

    let profile = load_user(&state, user.user_id).await?;
    Ok((StatusCode::OK, Json(profile)))
}

/* ---------- ADMIN ---------- */

#[derive(Debug, Deserialize)]
struct UsersQuery {
    query: Option<String>,
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

// GET /api/users - только админ
async fn admin_list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<UsersQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 50);
    let offset = ((page - 1) * page_size) as i64;
    let pattern = format!("%{}%", params.query.unwrap_or_default());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users
         WHERE email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1",
    )
    .bind(&pattern)
    .fetch_one(&state.db.pool)
    .await
    .unwrap_or(0);

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users
         WHERE email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(&pattern)
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("admin_list_users sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить пользователей".to_string())
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "users": users,
            "total": total,
            "page": page,
            "pageSize": page_size
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct SetStatusRequest {
    status: String,
}

// PATCH /api/users/{id}/status - блокировка/разблокировка
async fn admin_set_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.status != "ACTIVE" && req.status != "INACTIVE" {
        return Err((StatusCode::BAD_REQUEST, "status должен быть ACTIVE или INACTIVE".to_string()));
    }

    let user = load_user(&state, id).await?;

    sqlx::query("UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(&req.status)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("admin_set_status sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить статус".to_string())
        })?;

    // Заблокированный пользователь не должен пройти по кешу авторизации
    if req.status == "INACTIVE" {
        let _ = state.cache.invalidate_user_auth(&user.email).await;
    }

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

// DELETE /api/users/{id} - только админ
async fn admin_delete_user(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if admin.0.user_id == id {
        return Err((StatusCode::BAD_REQUEST, "Нельзя удалить собственный аккаунт".to_string()));
    }

    let has_bookings = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM bookings WHERE user_id = $1)",
    )
    .bind(id)
    .fetch_one(&state.db.pool)
    .await
    .unwrap_or(false);

    if has_bookings {
        return Err((StatusCode::CONFLICT, "Нельзя удалить пользователя с бронированиями".to_string()));
    }

    let user = load_user(&state, id).await?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("admin_delete_user sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось удалить пользователя".to_string())
        })?;

    let _ = state.cache.invalidate_user_auth(&user.email).await;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
