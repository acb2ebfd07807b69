use serde::{Deserialize, Serialize};

/// Seat classes of the hall. SWEETBOX are the double seats in the
/// back row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    Standard,
    Vip,
    Sweetbox,
}

impl SeatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::Standard => "STANDARD",
            SeatClass::Vip => "VIP",
            SeatClass::Sweetbox => "SWEETBOX",
        }
    }

    /// Fallback price in VND when no ticket_prices row matches.
    pub fn base_price(&self) -> i64 {
        match self {
            SeatClass::Standard => 45_000,
            SeatClass::Vip => 55_000,
            SeatClass::Sweetbox => 130_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeatRow {
    pub letter: char,
    pub seats: u32,
    pub class: SeatClass,
}

/// Static layout of the screening hall: 11 rows, seat ids are
/// "<row><column>" ("D7"), columns start at 1. This module is the only
/// place the layout is defined; the availability view, checkout
/// validation and analytics capacity all derive from it.
pub const SEAT_LAYOUT: [SeatRow; 11] = [
    SeatRow { letter: 'A', seats: 14, class: SeatClass::Standard },
    SeatRow { letter: 'B', seats: 14, class: SeatClass::Standard },
    SeatRow { letter: 'C', seats: 14, class: SeatClass::Standard },
    SeatRow { letter: 'D', seats: 14, class: SeatClass::Vip },
    SeatRow { letter: 'E', seats: 14, class: SeatClass::Vip },
    SeatRow { letter: 'F', seats: 14, class: SeatClass::Vip },
    SeatRow { letter: 'G', seats: 14, class: SeatClass::Vip },
    SeatRow { letter: 'H', seats: 14, class: SeatClass::Vip },
    SeatRow { letter: 'I', seats: 14, class: SeatClass::Vip },
    SeatRow { letter: 'J', seats: 14, class: SeatClass::Standard },
    SeatRow { letter: 'K', seats: 12, class: SeatClass::Sweetbox },
];

pub fn total_seats() -> u32 {
    SEAT_LAYOUT.iter().map(|r| r.seats).sum()
}

fn row_of(letter: char) -> Option<&'static SeatRow> {
    SEAT_LAYOUT.iter().find(|r| r.letter == letter)
}

/// Split a seat id into its row letter and column number, validated
/// against the layout. Lowercase rows, column 0, leading zeros and
/// columns past the end of the row are all rejected.
pub fn parse_seat(seat: &str) -> Option<(char, u32)> {
    let mut chars = seat.chars();
    let letter = chars.next()?;
    let rest = chars.as_str();

    let row = row_of(letter)?;
    if rest.is_empty() || rest.starts_with('0') || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let number: u32 = rest.parse().ok()?;
    if number > row.seats {
        return None;
    }
    Some((letter, number))
}

/// Seat class of a seat id, or None when the id is not part of the
/// layout.
pub fn class_of(seat: &str) -> Option<SeatClass> {
    let (letter, _) = parse_seat(seat)?;
    row_of(letter).map(|r| r.class)
}

/// Every seat id of the hall, row by row.
pub fn all_seat_ids() -> Vec<String> {
    SEAT_LAYOUT
        .iter()
        .flat_map(|r| (1..=r.seats).map(move |n| format!("{}{}", r.letter, n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn layout_has_eleven_rows_and_152_seats() {
        assert_eq!(SEAT_LAYOUT.len(), 11);
        assert_eq!(total_seats(), 152);
        assert_eq!(all_seat_ids().len(), 152);
    }

    #[test]
    fn classifies_rows() {
        assert_eq!(class_of("A1"), Some(SeatClass::Standard));
        assert_eq!(class_of("J14"), Some(SeatClass::Standard));
        assert_eq!(class_of("D7"), Some(SeatClass::Vip));
        assert_eq!(class_of("I14"), Some(SeatClass::Vip));
        assert_eq!(class_of("K12"), Some(SeatClass::Sweetbox));
    }

    #[test]
    fn rejects_ids_outside_the_layout() {
        assert_eq!(parse_seat("K13"), None); // row K only has 12 seats
        assert_eq!(parse_seat("A0"), None);
        assert_eq!(parse_seat("A15"), None);
        assert_eq!(parse_seat("L1"), None);
        assert_eq!(parse_seat("a1"), None);
        assert_eq!(parse_seat("A01"), None);
        assert_eq!(parse_seat("A"), None);
        assert_eq!(parse_seat(""), None);
        assert_eq!(parse_seat("A1x"), None);
    }

    #[test]
    fn sweetbox_is_the_most_expensive_class() {
        assert!(SeatClass::Sweetbox.base_price() > SeatClass::Vip.base_price());
        assert!(SeatClass::Vip.base_price() > SeatClass::Standard.base_price());
    }

    proptest! {
        #[test]
        fn every_layout_seat_parses_back(row_idx in 0usize..11, col in 1u32..=14) {
            let row = &SEAT_LAYOUT[row_idx];
            let id = format!("{}{}", row.letter, col);
            if col <= row.seats {
                prop_assert_eq!(parse_seat(&id), Some((row.letter, col)));
                prop_assert_eq!(class_of(&id), Some(row.class));
            } else {
                prop_assert_eq!(parse_seat(&id), None);
            }
        }
    }
}
