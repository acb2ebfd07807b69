//! Формирование полезной нагрузки QR-кода для оплаты переводом.
//!
//! Сервер не рисует картинку QR - он выдает текстовую нагрузку,
//! которую клиент кодирует сам. Нагрузка подписывается SHA-256
//! токеном от (amount, transaction_id, merchant_secret), и подпись
//! проверяется при подтверждении платежа.

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

/// Генерирует подпись платежа.
pub fn sign(amount: i64, transaction_id: &str, merchant_secret: &str) -> String {
    let token_string = format!("{}{}{}", amount, transaction_id, merchant_secret);
    let mut hasher = Sha256::new();
    hasher.update(token_string.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Проверяет подпись платежа.
pub fn verify(amount: i64, transaction_id: &str, merchant_secret: &str, signature: &str) -> bool {
    sign(amount, transaction_id, merchant_secret) == signature
}

/// Собирает текстовую нагрузку QR-кода.
pub fn build_payload(
    merchant_name: &str,
    amount: i64,
    movie_title: &str,
    seats: &[String],
    issued_at: NaiveDateTime,
    transaction_id: &str,
    merchant_secret: &str,
) -> String {
    let signature = sign(amount, transaction_id, merchant_secret);
    format!(
        "ACCOUNT: {}\nAMOUNT: {}\nMOVIE: {}\nSEATS: {}\nISSUED: {}\nORDER: {}\nSIG: {}",
        merchant_name,
        amount,
        movie_title,
        seats.join(", "),
        issued_at.format("%Y-%m-%dT%H:%M:%S"),
        transaction_id,
        signature,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn issued() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 5)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap()
    }

    #[test]
    fn signature_is_deterministic_and_verifies() {
        let sig = sign(230_000, "txn-1", "secret");
        assert_eq!(sig, sign(230_000, "txn-1", "secret"));
        assert_eq!(sig.len(), 64);
        assert!(verify(230_000, "txn-1", "secret", &sig));
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let sig = sign(230_000, "txn-1", "secret");
        assert!(!verify(230_001, "txn-1", "secret", &sig));
        assert!(!verify(230_000, "txn-2", "secret", &sig));
        assert!(!verify(230_000, "txn-1", "other", &sig));
    }

    #[test]
    fn payload_carries_order_details() {
        let seats = vec!["D7".to_string(), "D8".to_string()];
        let payload = build_payload(
            "NATIONAL CINEMA CENTER",
            110_000,
            "Inside Out 2",
            &seats,
            issued(),
            "txn-42",
            "secret",
        );

        assert!(payload.contains("ACCOUNT: NATIONAL CINEMA CENTER"));
        assert!(payload.contains("AMOUNT: 110000"));
        assert!(payload.contains("SEATS: D7, D8"));
        assert!(payload.contains("ISSUED: 2026-08-05T18:30:00"));
        assert!(payload.contains("ORDER: txn-42"));
        assert!(payload.contains(&format!("SIG: {}", sign(110_000, "txn-42", "secret"))));
    }
}
