use crate::cache::CacheService;
use redis::AsyncCommands;
use tracing::info;

impl CacheService {
    // Проданные места сеанса (номера вида "D7")
    pub async fn get_sold_seats(&self, showtime_id: i64) -> Vec<String> {
        if let Ok(seats) = self.get_sold_seats_from_cache(showtime_id).await {
            return seats;
        }

        if let Ok(seats) = self.load_sold_seats_from_db(showtime_id).await {
            let _ = self.save_sold_seats_to_cache(showtime_id, &seats).await;
            return seats;
        }

        vec![]
    }

    // Инвалидировать после чекаута, отмены или очистки
    pub async fn invalidate_sold_seats(&self, showtime_id: i64) {
        let key = format!("sold_seats:{}", showtime_id);
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(&key).await;
        info!("Invalidated sold seats cache for showtime {}", showtime_id);
    }

    async fn load_sold_seats_from_db(&self, showtime_id: i64) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT seat_number FROM booking_seats
             WHERE showtime_id = $1
             ORDER BY seat_number",
        )
        .bind(showtime_id)
        .fetch_all(&self.db.pool)
        .await
    }

    async fn get_sold_seats_from_cache(&self, showtime_id: i64) -> Result<Vec<String>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let key = format!("sold_seats:{}", showtime_id);
        let data: String = conn.get(key).await?;
        let seats: Vec<String> = serde_json::from_str(&data)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error")))?;
        Ok(seats)
    }

    async fn save_sold_seats_to_cache(
        &self,
        showtime_id: i64,
        seats: &[String],
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error")))?;
        let key = format!("sold_seats:{}", showtime_id);
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key, data, 86400).await // 24 часа
    }
}
