use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub image: String,
    pub trailer: String,
    #[serde(rename = "type")]
    pub movie_type: String,
    pub duration_minutes: i32,
    pub release_date: NaiveDate,
    pub genre_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub genre_name: String,
}

pub const MOVIE_TYPES: [&str; 2] = ["2D", "3D"];
