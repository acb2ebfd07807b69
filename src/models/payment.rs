use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment record, paired 1:1 with a booking. PENDING until the buyer
/// confirms the QR transfer; the cleanup task fails it after the QR
/// TTL expires.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_time: Option<NaiveDateTime>,
    pub amount: i64,
    pub transaction_id: String,
    pub created_at: NaiveDateTime,
}

pub const PAYMENT_METHODS: [&str; 4] = ["VIETQR", "VNPAY", "VIETTEL_MONEY", "PAYOO"];

pub fn is_supported_method(method: &str) -> bool {
    PAYMENT_METHODS.contains(&method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods_only() {
        assert!(is_supported_method("VIETQR"));
        assert!(is_supported_method("PAYOO"));
        assert!(!is_supported_method("vietqr"));
        assert!(!is_supported_method("CASH"));
    }
}
