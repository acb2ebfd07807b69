use crate::cache::CacheService;
use redis::AsyncCommands;
use tracing::info;

impl CacheService {
    /// Сохранить данные авторизованного пользователя в кеш
    pub async fn cache_auth_user(
        &self,
        email: &str,
        password_digest: &str,
        user_data: &str, // JSON сериализованный AuthUser
        ttl_seconds: u64,
    ) -> Result<(), redis::RedisError> {
        let key = format!("auth:{}:{}", email, password_digest);
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key, user_data, ttl_seconds).await
    }

    /// Получить данные пользователя из кеша авторизации
    pub async fn get_cached_auth_user(
        &self,
        email: &str,
        password_digest: &str,
    ) -> Result<Option<String>, redis::RedisError> {
        let key = format!("auth:{}:{}", email, password_digest);
        let mut conn = self.redis.conn.clone();
        conn.get(key).await
    }

    /// Инвалидировать все сессии пользователя по email (logout,
    /// смена пароля, блокировка из админки)
    pub async fn invalidate_user_auth(&self, email: &str) -> Result<(), redis::RedisError> {
        let pattern = format!("auth:{}:*", email);
        let mut conn = self.redis.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        info!("Invalidated auth sessions for user {}", email);
        Ok(())
    }

    /// Обновлять last_logged_in не чаще раза в 15 минут
    pub async fn should_update_last_login(&self, user_id: i64) -> bool {
        let key = format!("last_login_update:{}", user_id);
        let mut conn = self.redis.conn.clone();
        let result: Result<String, _> = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(900)
            .query_async(&mut conn)
            .await;
        result.is_ok()
    }

    // === Ожидающие регистрации (OTP) ===

    /// Положить ожидающую регистрацию под ключ otp:{email}.
    /// SET NX EX - атомарно, повторная регистрация того же email
    /// до истечения TTL отклоняется.
    pub async fn store_pending_registration(
        &self,
        email: &str,
        payload: &str,
        ttl_seconds: u64,
    ) -> bool {
        let key = format!("otp:{}", email);
        let mut conn = self.redis.conn.clone();
        let result: Result<String, _> = redis::cmd("SET")
            .arg(&key)
            .arg(payload)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await;
        result.is_ok()
    }

    pub async fn get_pending_registration(
        &self,
        email: &str,
    ) -> Result<Option<String>, redis::RedisError> {
        let key = format!("otp:{}", email);
        let mut conn = self.redis.conn.clone();
        conn.get(key).await
    }

    pub async fn delete_pending_registration(&self, email: &str) {
        let key = format!("otp:{}", email);
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(&key).await;
    }

    /// Счетчик неудачных попыток ввода OTP. Живет столько же,
    /// сколько сама регистрация.
    pub async fn bump_otp_attempts(&self, email: &str, ttl_seconds: u64) -> i64 {
        let key = format!("otp_attempts:{}", email);
        let mut conn = self.redis.conn.clone();
        let attempts: i64 = match conn.incr(&key, 1).await {
            Ok(n) => n,
            Err(_) => return 0,
        };
        let _: Result<(), _> = conn.expire(&key, ttl_seconds as i64).await;
        attempts
    }

    pub async fn clear_otp_attempts(&self, email: &str) {
        let key = format!("otp_attempts:{}", email);
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(&key).await;
    }
}
