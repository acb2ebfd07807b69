use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::seat::SeatClass;

/// One cell of the price matrix: seat class x movie format x day band
/// x time band. Prices are VND, no decimals.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TicketPrice {
    pub id: i64,
    pub seat_type: String,
    pub movie_type: String,
    pub price: i64,
    pub day_type: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Day band of the price matrix: 0 = Mon-Thu, 1 = Fri-Sun and
/// holidays. Holidays are not modeled, the weekday decides alone.
pub fn day_type_for(day: NaiveDate) -> i16 {
    match day.weekday() {
        Weekday::Fri | Weekday::Sat | Weekday::Sun => 1,
        _ => 0,
    }
}

/// Price of one seat for a screening. The first matrix row matching
/// seat class, movie format, day band and time band (start inclusive,
/// end exclusive) wins; with no match the class base price applies.
pub fn resolve_price(
    prices: &[TicketPrice],
    class: SeatClass,
    movie_type: &str,
    day: NaiveDate,
    time: NaiveTime,
) -> i64 {
    let day_type = day_type_for(day);
    prices
        .iter()
        .find(|p| {
            p.seat_type == class.as_str()
                && p.movie_type == movie_type
                && p.day_type == day_type
                && p.start_time <= time
                && time < p.end_time
        })
        .map(|p| p.price)
        .unwrap_or_else(|| class.base_price())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn row(seat: &str, movie: &str, price: i64, day_type: i16, from: NaiveTime, to: NaiveTime) -> TicketPrice {
        TicketPrice {
            id: 0,
            seat_type: seat.to_string(),
            movie_type: movie.to_string(),
            price,
            day_type,
            start_time: from,
            end_time: to,
        }
    }

    #[test]
    fn weekday_bands() {
        // 2026-08-05 is a Wednesday, 2026-08-07 a Friday
        assert_eq!(day_type_for(NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()), 0);
        assert_eq!(day_type_for(NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()), 1);
        assert_eq!(day_type_for(NaiveDate::from_ymd_opt(2026, 8, 9).unwrap()), 1);
    }

    #[test]
    fn falls_back_to_base_prices_without_matrix() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        assert_eq!(resolve_price(&[], SeatClass::Standard, "2D", day, t(18, 0)), 45_000);
        assert_eq!(resolve_price(&[], SeatClass::Vip, "2D", day, t(18, 0)), 55_000);
        assert_eq!(resolve_price(&[], SeatClass::Sweetbox, "3D", day, t(18, 0)), 130_000);
    }

    #[test]
    fn matrix_row_beats_base_price() {
        let wed = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        let fri = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let prices = vec![
            row("STANDARD", "2D", 50_000, 0, t(8, 0), t(12, 0)),
            row("STANDARD", "2D", 70_000, 1, t(8, 0), t(12, 0)),
        ];

        assert_eq!(resolve_price(&prices, SeatClass::Standard, "2D", wed, t(9, 30)), 50_000);
        assert_eq!(resolve_price(&prices, SeatClass::Standard, "2D", fri, t(9, 30)), 70_000);
        // outside the time band the base price applies
        assert_eq!(resolve_price(&prices, SeatClass::Standard, "2D", wed, t(14, 0)), 45_000);
        // different format never matches
        assert_eq!(resolve_price(&prices, SeatClass::Standard, "3D", wed, t(9, 30)), 45_000);
    }

    #[test]
    fn time_band_is_half_open() {
        let wed = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        let prices = vec![row("VIP", "2D", 60_000, 0, t(8, 0), t(12, 0))];

        assert_eq!(resolve_price(&prices, SeatClass::Vip, "2D", wed, t(8, 0)), 60_000);
        assert_eq!(resolve_price(&prices, SeatClass::Vip, "2D", wed, t(11, 59)), 60_000);
        assert_eq!(resolve_price(&prices, SeatClass::Vip, "2D", wed, t(12, 0)), 55_000);
    }
}
