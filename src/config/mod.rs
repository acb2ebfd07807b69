use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub email: EmailConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки почтового шлюза (доставка OTP и подтверждений брони)
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub gateway_url: String,
    pub api_key: String,
    pub sender: String,
    pub otp_ttl_seconds: u64,
}

// Настройки оплаты по QR-коду
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub merchant_name: String,
    pub merchant_secret: String,
    // Сколько живет неподтвержденный платеж до авто-отмены
    pub qr_ttl_minutes: i64,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_system=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            email: EmailConfig {
                gateway_url: env::var("EMAIL_GATEWAY_URL").expect("EMAIL_GATEWAY_URL must be set"),
                api_key: env::var("EMAIL_API_KEY").expect("EMAIL_API_KEY must be set"),
                sender: env::var("EMAIL_SENDER")
                    .unwrap_or_else(|_| "tickets@cinema.local".to_string()),
                otp_ttl_seconds: env::var("OTP_TTL_SECONDS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .expect("OTP_TTL_SECONDS must be a valid number"),
            },
            payment: PaymentConfig {
                merchant_name: env::var("MERCHANT_NAME")
                    .unwrap_or_else(|_| "NATIONAL CINEMA CENTER".to_string()),
                merchant_secret: env::var("MERCHANT_SECRET").expect("MERCHANT_SECRET must be set"),
                qr_ttl_minutes: env::var("QR_TTL_MINUTES")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .expect("QR_TTL_MINUTES must be a valid number"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
        }
    }
}
