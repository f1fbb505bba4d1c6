//! Pure sort and filter over an aggregated result set.

use serde::{Deserialize, Serialize};

use crate::SupplierQuote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    PriceLow,
    PriceHigh,
    Rating,
    Name,
}

/// Client-side view settings. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub sort: Option<SortBy>,
    /// Every listed amenity must be present.
    pub amenities: Vec<String>,
    /// Case-insensitive substring of the hotel name.
    pub text: Option<String>,
    pub board_types: Vec<String>,
}

/// Applies `filter` to `quotes`. Deterministic and side-effect free; ties
/// keep their aggregate order.
pub fn apply_view(quotes: &[SupplierQuote], filter: &FilterState) -> Vec<SupplierQuote> {
    let text = filter
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);

    let mut visible: Vec<SupplierQuote> = quotes
        .iter()
        .filter(|q| {
            filter.amenities.iter().all(|wanted| {
                q.amenities
                    .iter()
                    .any(|have| have.eq_ignore_ascii_case(wanted))
            })
        })
        .filter(|q| match &text {
            Some(t) => q.hotel_name.to_lowercase().contains(t),
            None => true,
        })
        .filter(|q| {
            filter.board_types.is_empty()
                || filter
                    .board_types
                    .iter()
                    .any(|b| b.eq_ignore_ascii_case(&q.board_type))
        })
        .cloned()
        .collect();

    match filter.sort {
        Some(SortBy::PriceLow) => visible.sort_by_key(|q| q.markup_price_per_night),
        Some(SortBy::PriceHigh) => {
            visible.sort_by(|a, b| b.markup_price_per_night.cmp(&a.markup_price_per_night))
        }
        Some(SortBy::Rating) => visible.sort_by(|a, b| b.rating.cmp(&a.rating)),
        Some(SortBy::Name) => visible.sort_by_key(|q| q.hotel_name.to_lowercase()),
        None => {}
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Occupancy;
    use common::{Currency, Money};

    fn quote(hotel: &str, price: i64, rating: u8, amenities: &[&str], board: &str) -> SupplierQuote {
        SupplierQuote {
            supplier_id: "s".to_string(),
            hotel_id: hotel.to_lowercase(),
            hotel_name: hotel.to_string(),
            room_id: "R".to_string(),
            option_id: "O".to_string(),
            currency: Currency::parse("AED").unwrap(),
            base_price_per_night: Money::from_minor(price / 2),
            markup_price_per_night: Money::from_minor(price),
            quantity: 1,
            cancellation_allowed: true,
            board_type: board.to_string(),
            occupancy: Occupancy::default(),
            rating,
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            tax: None,
        }
    }

    fn sample() -> Vec<SupplierQuote> {
        vec![
            quote("Marina Bay", 30_000, 4, &["pool", "wifi"], "BB"),
            quote("Atlantis", 90_000, 5, &["pool", "spa", "wifi"], "HB"),
            quote("Budget Inn", 12_000, 2, &["wifi"], "RO"),
            quote("Creek Side", 30_000, 3, &[], "BB"),
        ]
    }

    fn names(quotes: &[SupplierQuote]) -> Vec<&str> {
        quotes.iter().map(|q| q.hotel_name.as_str()).collect()
    }

    #[test]
    fn default_view_is_identity() {
        let quotes = sample();
        assert_eq!(apply_view(&quotes, &FilterState::default()), quotes);
    }

    #[test]
    fn price_low_is_stable_on_ties() {
        let filter = FilterState {
            sort: Some(SortBy::PriceLow),
            ..Default::default()
        };
        assert_eq!(
            names(&apply_view(&sample(), &filter)),
            vec!["Budget Inn", "Marina Bay", "Creek Side", "Atlantis"]
        );
    }

    #[test]
    fn price_high_and_rating_sort_descending() {
        let by_price = FilterState {
            sort: Some(SortBy::PriceHigh),
            ..Default::default()
        };
        assert_eq!(names(&apply_view(&sample(), &by_price))[0], "Atlantis");

        let by_rating = FilterState {
            sort: Some(SortBy::Rating),
            ..Default::default()
        };
        assert_eq!(
            names(&apply_view(&sample(), &by_rating)),
            vec!["Atlantis", "Marina Bay", "Creek Side", "Budget Inn"]
        );
    }

    #[test]
    fn name_sort_ignores_case() {
        let mut quotes = sample();
        quotes.push(quote("al Habtoor", 1, 1, &[], "RO"));
        let filter = FilterState {
            sort: Some(SortBy::Name),
            ..Default::default()
        };
        assert_eq!(names(&apply_view(&quotes, &filter))[0..2], ["al Habtoor", "Atlantis"]);
    }

    #[test]
    fn amenity_text_and_board_filters_combine() {
        let filter = FilterState {
            amenities: vec!["POOL".to_string()],
            text: Some("  marina ".to_string()),
            board_types: vec!["bb".to_string()],
            sort: None,
        };
        assert_eq!(names(&apply_view(&sample(), &filter)), vec!["Marina Bay"]);
    }

    #[test]
    fn view_does_not_mutate_input() {
        let quotes = sample();
        let filter = FilterState {
            sort: Some(SortBy::PriceHigh),
            amenities: vec!["spa".to_string()],
            ..Default::default()
        };
        let first = apply_view(&quotes, &filter);
        let second = apply_view(&quotes, &filter);
        assert_eq!(first, second);
        assert_eq!(quotes, sample());
    }
}
