//! email.rs
//!
//! Сервисный слой для взаимодействия с внешним почтовым шлюзом
//! (доставка OTP-кодов при регистрации и подтверждений брони).
//!
//! Ключевые компоненты:
//! 1.  **CircuitBreaker**: Реализация паттерна "Автоматический выключатель"
//!     для обеспечения отказоустойчивости при работе с внешним API.
//!     Он предотвращает постоянные запросы к неработающему сервису.
//! 2.  **EmailClient**: Клиент, который инкапсулирует отправку запросов
//!     к шлюзу и обработку ответов. Все сетевые вызовы защищены
//!     с помощью `CircuitBreaker`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, EmailConfig};

/// Состояния "Автоматического выключателя" (Circuit Breaker).
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// **Closed**: Нормальный режим работы. Запросы к сервису разрешены.
    Closed,
    /// **Open**: Режим блокировки после множественных сбоев.
    Open,
    /// **HalfOpen**: После таймаута в состоянии Open разрешается один
    /// пробный запрос для проверки, восстановился ли сервис.
    HalfOpen,
}

/// Автоматический выключатель для контроля доступа к почтовому шлюзу.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Текущее состояние (Closed, Open, HalfOpen).
    state: std::sync::RwLock<CircuitState>,
    /// Счетчик последовательных сбоев.
    failure_count: AtomicU32,
    /// Unix-время последнего сбоя для расчета таймаута.
    last_failure_time: AtomicU64,
    /// Порог сбоев, после которого выключатель переходит в Open.
    failure_threshold: u32,
    /// Таймаут в состоянии Open до перехода в HalfOpen.
    timeout_duration: Duration,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            state: std::sync::RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure_time: AtomicU64::new(0),
            failure_threshold,
            timeout_duration: Duration::from_secs(timeout_seconds),
        }
    }

    /// Проверяет, можно ли выполнить следующий запрос к сервису.
    pub fn can_execute(&self) -> bool {
        let state = self.state.read().unwrap();

        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let last_failure = self.last_failure_time.load(Ordering::Relaxed);

                // Если с момента последнего сбоя прошло достаточно времени...
                if unix_now().saturating_sub(last_failure) >= self.timeout_duration.as_secs() {
                    // ...переходим в "полуоткрытое" состояние для тестового запроса.
                    drop(state); // Освобождаем блокировку чтения перед записью.
                    *self.state.write().unwrap() = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
            // В "полуоткрытом" состоянии разрешаем один пробный запрос.
            CircuitState::HalfOpen => true,
        }
    }

    /// Регистрирует успешное выполнение запроса.
    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();

        match *state {
            // Если тестовый запрос в HalfOpen прошел успешно, "замыкаем" цепь.
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!("Circuit breaker recovered - transitioning to Closed state");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Регистрирует неудачное выполнение запроса.
    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_time.store(unix_now(), Ordering::Relaxed);

        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::Closed => {
                if failure_count >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        failure_count, self.failure_threshold
                    );
                }
            }
            // Если тестовый запрос в HalfOpen провалился, возвращаемся в Open.
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    /// Возвращает текущее состояние выключателя для мониторинга.
    pub fn get_state(&self) -> CircuitState {
        self.state.read().unwrap().clone()
    }
}

/// Ошибки почтового шлюза.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("mail gateway temporarily unavailable (circuit breaker open)")]
    CircuitOpen,
    #[error("mail gateway error: {0}")]
    Gateway(#[from] reqwest::Error),
    #[error("mail gateway rejected the message: {0}")]
    Rejected(String),
}

// --- Модели данных для API почтового шлюза ---

#[derive(Debug, Serialize)]
struct SendMailRequest<'a> {
    #[serde(rename = "apiKey")]
    api_key: &'a str,
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMailResponse {
    success: bool,
    message: Option<String>,
}

/// Клиент почтового шлюза.
#[derive(Clone)]
pub struct EmailClient {
    gateway_url: String,
    api_key: String,
    sender: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl EmailClient {
    /// Создает и конфигурирует клиент на основе настроек приложения.
    pub fn from_config(email: &EmailConfig, breaker: &CircuitBreakerConfig) -> Self {
        let circuit_breaker = Arc::new(CircuitBreaker::new(
            breaker.failure_threshold,
            breaker.timeout_seconds,
        ));

        Self {
            gateway_url: email.gateway_url.clone(),
            api_key: email.api_key.clone(),
            sender: email.sender.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            circuit_breaker,
        }
    }

    /// Выполняет асинхронную операцию, пропуская её через Circuit Breaker.
    async fn execute_with_circuit_breaker<F>(&self, operation: F) -> Result<SendMailResponse, EmailError>
    where
        F: std::future::Future<Output = Result<SendMailResponse, reqwest::Error>>,
    {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking mail gateway request");
            return Err(EmailError::CircuitOpen);
        }

        match operation.await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                error!("Mail gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(EmailError::Gateway(e))
            }
        }
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let request = SendMailRequest {
            api_key: &self.api_key,
            from: &self.sender,
            to,
            subject,
            body,
        };

        let operation = async {
            self.http_client
                .post(format!("{}/send", self.gateway_url))
                .json(&request)
                .send()
                .await?
                .json::<SendMailResponse>()
                .await
        };

        let response = self.execute_with_circuit_breaker(operation).await?;
        if !response.success {
            let message = response.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(EmailError::Rejected(message));
        }
        Ok(())
    }

    /// Отправляет OTP-код для подтверждения регистрации.
    pub async fn send_otp(&self, to: &str, code: u32) -> Result<(), EmailError> {
        info!("Sending registration OTP to {}", to);
        let body = format!(
            "Your verification code is: {:06}\n\nThe code expires in 10 minutes.",
            code
        );
        self.send(to, "Registration verification code", &body).await
    }

    /// Отправляет подтверждение оплаченной брони вместе с QR-кодом.
    pub async fn send_booking_confirmation(
        &self,
        to: &str,
        movie_title: &str,
        seats: &[String],
        amount: i64,
        qr_payload: &str,
    ) -> Result<(), EmailError> {
        info!("Sending booking confirmation to {}", to);
        let body = format!(
            "Your booking is confirmed.\n\nMovie: {}\nSeats: {}\nTotal: {} VND\n\n{}",
            movie_title,
            seats.join(", "),
            amount,
            qr_payload
        );
        self.send(to, "Your cinema tickets", &body).await
    }

    /// Текущее состояние Circuit Breaker для мониторинга.
    pub fn circuit_breaker_status(&self) -> (CircuitState, u32) {
        (
            self.circuit_breaker.get_state(),
            self.circuit_breaker.failure_count.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, EmailConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(gateway_url: String) -> EmailClient {
        EmailClient::from_config(
            &EmailConfig {
                gateway_url,
                api_key: "test-key".to_string(),
                sender: "tickets@cinema.local".to_string(),
                otp_ttl_seconds: 600,
            },
            &CircuitBreakerConfig {
                failure_threshold: 3,
                timeout_seconds: 60,
            },
        )
    }

    #[test]
    fn breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(3, 60);
        assert!(breaker.can_execute());

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn breaker_half_opens_after_timeout_and_recovers() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);

        // таймаут 0 секунд - пробный запрос разрешен сразу
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
        assert!(breaker.can_execute());
    }

    #[test]
    fn failed_probe_reopens_the_breaker() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert!(breaker.can_execute()); // -> HalfOpen

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn sends_otp_through_the_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(server.uri());
        client.send_otp("user@example.com", 123456).await.unwrap();

        let (state, failures) = client.circuit_breaker_status();
        assert_eq!(state, CircuitState::Closed);
        assert_eq!(failures, 0);
    }

    #[tokio::test]
    async fn gateway_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "message": "quota exceeded"
            })))
            .mount(&server)
            .await;

        let client = client(server.uri());
        let err = client.send_otp("user@example.com", 123456).await.unwrap_err();
        assert!(matches!(err, EmailError::Rejected(m) if m == "quota exceeded"));
    }
}
