use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role_name: String,
}

// Структура для результата из БД
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role_name: String,
}

// Basic Auth extractor. Проверка bcrypt дорогая, поэтому успешная
// авторизация кешируется в Redis по (email, sha256(password)).
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Проверяем что это Basic auth
        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Декодируем base64
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

        // Разделяем email:password
        let mut parts_iter = credentials.splitn(2, ':');
        let email = parts_iter.next().ok_or(StatusCode::UNAUTHORIZED)?;
        let password = parts_iter.next().ok_or(StatusCode::UNAUTHORIZED)?;

        let password_digest = format!("{:x}", Sha256::digest(password.as_bytes()));

        // Быстрый путь: кеш авторизации
        if let Ok(Some(cached)) = state.cache.get_cached_auth_user(email, &password_digest).await {
            if let Ok(user) = serde_json::from_str::<AuthUser>(&cached) {
                return Ok(user);
            }
        }

        // Медленный путь: БД + bcrypt
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, first_name, last_name, role_name
             FROM users
             WHERE email = $1 AND status = 'ACTIVE'",
        )
        .bind(email)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let user = row.ok_or(StatusCode::UNAUTHORIZED)?;

        if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let auth_user = AuthUser {
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role_name: user.role_name,
        };

        // Кешируем сессию на 15 минут
        if let Ok(data) = serde_json::to_string(&auth_user) {
            let _ = state
                .cache
                .cache_auth_user(email, &password_digest, &data, 900)
                .await;
        }

        // Обновляем last_logged_in (не чаще раза в 15 минут)
        if state.cache.should_update_last_login(auth_user.user_id).await {
            sqlx::query("UPDATE users SET last_logged_in = NOW() WHERE id = $1")
                .bind(auth_user.user_id)
                .execute(&state.db.pool)
                .await
                .ok(); // Игнорируем ошибку обновления
        }

        Ok(auth_user)
    }
}

/// Доступ только для администраторов.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role_name != "admin" {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(AdminUser(user))
    }
}
