use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

const MAX_OTP_ATTEMPTS: i64 = 5;

/// Шестизначный код подтверждения.
fn generate_otp() -> u32 {
    rand::rng().random_range(100_000..1_000_000)
}

// Ожидающая регистрация, живет в Redis до подтверждения OTP
#[derive(Debug, Serialize, Deserialize)]
struct PendingRegistration {
    otp: u32,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    password_hash: String,
}

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    first_name: String,
    #[validate(length(min = 1, max = 100))]
    last_name: String,
    #[validate(email)]
    email: String,
    #[validate(length(max = 20))]
    phone: Option<String>,
    #[validate(length(min = 6, max = 72))]
    password: String,
}

// POST /api/auth/register
//
// Аккаунт создается только после подтверждения OTP: до этого форма
// вместе с кодом лежит в Redis и умирает по TTL.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let email = req.email.trim().to_lowercase();

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.db.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;
    if exists {
        return Err((StatusCode::CONFLICT, "Пользователь с таким email уже существует".to_string()));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка хеширования пароля".to_string()))?;

    let otp = generate_otp();
    let pending = PendingRegistration {
        otp,
        first_name: req.first_name,
        last_name: req.last_name,
        email: email.clone(),
        phone: req.phone,
        password_hash,
    };

    let payload = serde_json::to_string(&pending)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка сериализации".to_string()))?;

    let ttl = state.config.email.otp_ttl_seconds;
    // SET NX: повторный запрос кода до истечения TTL отклоняется
    if !state.cache.store_pending_registration(&email, &payload, ttl).await {
        return Err((
            StatusCode::CONFLICT,
            "Код уже отправлен, проверьте почту или подождите".to_string(),
        ));
    }

    if let Err(e) = state.email.send_otp(&email, otp).await {
        tracing::error!("Не удалось отправить OTP на {}: {}", email, e);
        // Освобождаем ключ, чтобы пользователь мог повторить попытку
        state.cache.delete_pending_registration(&email).await;
        return Err((
            StatusCode::BAD_GATEWAY,
            "Не удалось отправить код подтверждения. Повторите попытку позже.".to_string(),
        ));
    }

    tracing::info!("Registration OTP sent to {}", email);

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Код подтверждения отправлен на почту",
            "expires_in": ttl
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct VerifyOtpRequest {
    email: String,
    otp: String,
}

// POST /api/auth/verify-otp
async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let email = req.email.trim().to_lowercase();

    if req.otp.len() != 6 || !req.otp.bytes().all(|b| b.is_ascii_digit()) {
        return Err((StatusCode::BAD_REQUEST, "OTP должен состоять из 6 цифр".to_string()));
    }

    let payload = state
        .cache
        .get_pending_registration(&email)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка кеша".to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Код истек или регистрация не найдена".to_string()))?;

    let pending: PendingRegistration = serde_json::from_str(&payload)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка десериализации".to_string()))?;

    let submitted: u32 = req.otp.parse().unwrap_or(0);
    if submitted != pending.otp {
        let attempts = state
            .cache
            .bump_otp_attempts(&email, state.config.email.otp_ttl_seconds)
            .await;
        if attempts >= MAX_OTP_ATTEMPTS {
            state.cache.delete_pending_registration(&email).await;
            state.cache.clear_otp_attempts(&email).await;
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                "Слишком много неверных попыток, запросите новый код".to_string(),
            ));
        }
        return Err((StatusCode::BAD_REQUEST, "Неверный код".to_string()));
    }

    // Код верный - создаем аккаунт
    let res = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (first_name, last_name, email, password_hash, phone)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&pending.first_name)
    .bind(&pending.last_name)
    .bind(&pending.email)
    .bind(&pending.password_hash)
    .bind(&pending.phone)
    .fetch_one(&state.db.pool)
    .await;

    state.cache.delete_pending_registration(&email).await;
    state.cache.clear_otp_attempts(&email).await;

    match res {
        Ok(user) => {
            tracing::info!("User {} registered", user.email);
            Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": user }))))
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err((StatusCode::CONFLICT, "Пользователь с таким email уже существует".to_string()))
        }
        Err(e) => {
            tracing::error!("verify_otp insert error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать аккаунт".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let email = req.email.trim().to_lowercase();

    let user = User::find_by_email(&email, &state.db)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?;

    let user = match user {
        Some(u) if u.verify_password(&req.password) => u,
        _ => return Err((StatusCode::UNAUTHORIZED, "Неверный email или пароль".to_string())),
    };

    if user.status != "ACTIVE" {
        return Err((StatusCode::FORBIDDEN, "Аккаунт заблокирован".to_string()));
    }

    sqlx::query("UPDATE users SET last_logged_in = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db.pool)
        .await
        .ok();

    Ok((StatusCode::OK, Json(json!({ "success": true, "user": user }))))
}

// POST /api/auth/logout - сбрасываем кешированные сессии
async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let _ = state.cache.invalidate_user_auth(&user.email).await;
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_always_six_digits() {
        for _ in 0..1000 {
            let otp = generate_otp();
            assert!((100_000..1_000_000).contains(&otp));
            assert_eq!(format!("{:06}", otp).len(), 6);
        }
    }
}
