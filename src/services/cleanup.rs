use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

/// Фоновая очистка: просроченные PENDING-платежи и пустые брони.
pub struct CleanupService {
    state: Arc<AppState>,
}

impl CleanupService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Запускает полную очистку: платежи + пустые брони
    pub async fn run_full_cleanup(&self) {
        info!("🧹 Starting full cleanup process");

        let stats = self.get_cleanup_stats().await;
        if stats.total_items_to_cleanup() == 0 {
            info!("🧹 Nothing to clean up");
            return;
        }

        self.cleanup_expired_payments().await;
        self.cleanup_empty_bookings().await;

        info!("🧹 Full cleanup process completed");
    }

    /// Платежи, не подтвержденные за время жизни QR-кода: помечаем
    /// FAILED и возвращаем места в продажу. Сама бронь остается
    /// в истории пользователя.
    async fn cleanup_expired_payments(&self) {
        let ttl_minutes = self.state.config.payment.qr_ttl_minutes;

        let expired: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.id, b.id, b.showtime_id
            FROM payments p
            JOIN bookings b ON b.id = p.booking_id
            WHERE p.payment_status = 'PENDING'
              AND p.created_at < NOW() - make_interval(mins => $1)
            "#,
        )
        .bind(ttl_minutes as i32)
        .fetch_all(&self.state.db.pool)
        .await
        .unwrap_or_default();

        if expired.is_empty() {
            info!("💳 No expired payments to cleanup");
            return;
        }

        info!("💳 Found {} expired payments to cleanup", expired.len());

        for (payment_id, booking_id, showtime_id) in expired {
            self.expire_payment(payment_id, booking_id, showtime_id).await;
        }
    }

    /// Отмена одного просроченного платежа.
    async fn expire_payment(&self, payment_id: i64, booking_id: i64, showtime_id: i64) {
        let mut tx = match self.state.db.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!("Failed to start transaction for payment cleanup: {}", e);
                return;
            }
        };

        // Помечаем платеж как FAILED
        let _ = sqlx::query(
            "UPDATE payments SET payment_status = 'FAILED' WHERE id = $1 AND payment_status = 'PENDING'",
        )
        .bind(payment_id)
        .execute(&mut *tx)
        .await;

        // Освобождаем места брони
        let freed: Vec<String> = sqlx::query_scalar(
            "DELETE FROM booking_seats WHERE booking_id = $1 RETURNING seat_number",
        )
        .bind(booking_id)
        .fetch_all(&mut *tx)
        .await
        .unwrap_or_default();

        if tx.commit().await.is_ok() {
            self.state.cache.invalidate_sold_seats(showtime_id).await;
            info!(
                "💳 Expired payment {} cleaned up, {} seats released",
                payment_id,
                freed.len()
            );
        } else {
            error!("Failed to commit payment cleanup transaction for {}", payment_id);
        }
    }

    /// Осиротевшие брони старше 2 часов: ни мест, ни платежа.
    /// Отмененные брони сюда не попадают - у них остается FAILED-платеж.
    async fn cleanup_empty_bookings(&self) {
        let empty_bookings: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT b.id
            FROM bookings b
            LEFT JOIN booking_seats s ON s.booking_id = b.id
            LEFT JOIN payments p ON p.booking_id = b.id
            WHERE b.created_at < NOW() - interval '2 hours'
              AND s.id IS NULL
              AND p.id IS NULL
            "#,
        )
        .fetch_all(&self.state.db.pool)
        .await
        .unwrap_or_default();

        if empty_bookings.is_empty() {
            info!("🎫 No empty old bookings to cleanup");
            return;
        }

        info!("🎫 Found {} empty old bookings to cleanup", empty_bookings.len());

        for booking_id in empty_bookings {
            let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
                .bind(booking_id)
                .execute(&self.state.db.pool)
                .await;

            match result {
                Ok(affected) if affected.rows_affected() > 0 => {
                    info!("🎫 Deleted empty booking {}", booking_id);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("🎫 Failed to delete empty booking {}: {:?}", booking_id, e);
                }
            }
        }
    }

    /// Статистика для мониторинга и быстрый выход из run_full_cleanup.
    pub async fn get_cleanup_stats(&self) -> CleanupStats {
        let expired_payments: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments
             WHERE payment_status = 'PENDING'
               AND created_at < NOW() - make_interval(mins => $1)",
        )
        .bind(self.state.config.payment.qr_ttl_minutes as i32)
        .fetch_one(&self.state.db.pool)
        .await
        .unwrap_or(0);

        let empty_bookings: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM bookings b
            LEFT JOIN booking_seats s ON s.booking_id = b.id
            LEFT JOIN payments p ON p.booking_id = b.id
            WHERE b.created_at < NOW() - interval '2 hours'
              AND s.id IS NULL
              AND p.id IS NULL
            "#,
        )
        .fetch_one(&self.state.db.pool)
        .await
        .unwrap_or(0);

        CleanupStats {
            expired_payments,
            empty_bookings,
        }
    }
}

#[derive(Debug)]
pub struct CleanupStats {
    pub expired_payments: i64,
    pub empty_bookings: i64,
}

impl CleanupStats {
    pub fn total_items_to_cleanup(&self) -> i64 {
        self.expired_payments + self.empty_bookings
    }
}
