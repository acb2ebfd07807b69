use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub showtime_id: i64,
    pub total_seats: i32,
    pub total_price: i64,
    pub created_at: NaiveDateTime,
}

/// One sold seat of a booking. The unique (showtime_id, seat_number)
/// index on this table is what makes double-booking impossible.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingSeat {
    pub id: i64,
    pub booking_id: i64,
    pub showtime_id: i64,
    pub seat_number: String,
    pub seat_type: String,
    pub price: i64,
    pub created_at: NaiveDateTime,
}
