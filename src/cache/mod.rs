use crate::{database::Database, redis_client::RedisClient};
use tracing::info;

pub mod auth;
pub mod movies;
pub mod search;
pub mod seats;
pub mod showtimes;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database) -> Self {
        Self { redis, db }
    }

    // Прогрев кеша при старте: обе коллекции каталога
    pub async fn warmup_cache(&self) {
        info!("Starting cache warmup...");

        let movies = self.get_movies().await;
        info!("Loaded {} movies", movies.len());

        let showtimes = self.get_showtimes().await;
        info!("Loaded {} showtimes", showtimes.len());

        info!("Cache warmup done");
    }
}
