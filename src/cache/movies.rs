use crate::cache::CacheService;
use crate::models::Movie;
use redis::AsyncCommands;
use tracing::info;

impl CacheService {
    // Получить каталог фильмов
    pub async fn get_movies(&self) -> Vec<Movie> {
        // Сначала пробуем кеш
        if let Ok(movies) = self.get_movies_from_cache().await {
            return movies;
        }

        // Если кеш не работает - идем в БД
        if let Ok(movies) = self.load_movies_from_db().await {
            let _ = self.save_movies_to_cache(&movies).await;
            return movies;
        }

        vec![]
    }

    // Инвалидировать каталог после изменений из админки
    pub async fn invalidate_movies(&self) {
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del("movies").await;
        info!("Invalidated movies cache");
    }

    async fn load_movies_from_db(&self) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            "SELECT id, title, description, author, image, trailer, movie_type,
                    duration_minutes, release_date, genre_id, created_at, updated_at
             FROM movies
             ORDER BY release_date DESC, id",
        )
        .fetch_all(&self.db.pool)
        .await
    }

    async fn get_movies_from_cache(&self) -> Result<Vec<Movie>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get("movies").await?;
        let movies: Vec<Movie> = serde_json::from_str(&data)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error")))?;
        Ok(movies)
    }

    async fn save_movies_to_cache(&self, movies: &[Movie]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(movies)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error")))?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex("movies", data, 3600).await // 1 час
    }
}
