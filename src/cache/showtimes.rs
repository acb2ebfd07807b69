use crate::cache::CacheService;
use crate::models::Showtime;
use redis::AsyncCommands;
use tracing::info;

impl CacheService {
    // Получить расписание сеансов
    pub async fn get_showtimes(&self) -> Vec<Showtime> {
        if let Ok(showtimes) = self.get_showtimes_from_cache().await {
            return showtimes;
        }

        if let Ok(showtimes) = self.load_showtimes_from_db().await {
            let _ = self.save_showtimes_to_cache(&showtimes).await;
            return showtimes;
        }

        vec![]
    }

    pub async fn invalidate_showtimes(&self) {
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del("showtimes").await;
        info!("Invalidated showtimes cache");
    }

    async fn load_showtimes_from_db(&self) -> Result<Vec<Showtime>, sqlx::Error> {
        sqlx::query_as::<_, Showtime>(
            "SELECT id, movie_id, day, time, created_at
             FROM showtimes
             ORDER BY day, time",
        )
        .fetch_all(&self.db.pool)
        .await
    }

    async fn get_showtimes_from_cache(&self) -> Result<Vec<Showtime>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get("showtimes").await?;
        let showtimes: Vec<Showtime> = serde_json::from_str(&data)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error")))?;
        Ok(showtimes)
    }

    async fn save_showtimes_to_cache(&self, showtimes: &[Showtime]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(showtimes)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error")))?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex("showtimes", data, 3600).await
    }
}
