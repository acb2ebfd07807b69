use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One screening: a (movie, day, time) tuple.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub day: NaiveDate,
    pub time: NaiveTime,
    pub created_at: NaiveDateTime,
}
