//! Quote and search context types, plus the supplier wire format.

use chrono::NaiveDate;
use common::{Currency, Money};
use serde::{Deserialize, Serialize};

use crate::{SearchError, SupplierError};

/// Guest mix a quote was priced for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Occupancy {
    pub adults: u32,
    pub children: u32,
    #[serde(default)]
    pub child_ages: Vec<u32>,
}

/// A priced room option from one supplier. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierQuote {
    pub supplier_id: String,
    pub hotel_id: String,
    pub hotel_name: String,
    pub room_id: String,
    pub option_id: String,
    pub currency: Currency,
    pub base_price_per_night: Money,
    pub markup_price_per_night: Money,
    pub quantity: u32,
    pub cancellation_allowed: bool,
    pub board_type: String,
    pub occupancy: Occupancy,
    /// Star rating, 0 when unrated.
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub amenities: Vec<String>,
    /// Tax for the whole stay, when the supplier itemises it.
    #[serde(default)]
    pub tax: Option<Money>,
}

impl SupplierQuote {
    /// Key used for deduplication across and within suppliers.
    pub fn dedup_key(&self) -> (String, String) {
        (self.hotel_id.clone(), self.supplier_id.clone())
    }
}

/// Inclusive per-night price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub from: Money,
    pub to: Money,
}

impl PriceRange {
    pub fn contains(&self, price: Money) -> bool {
        price >= self.from && price <= self.to
    }
}

fn first_page() -> u32 {
    1
}

/// What the user searched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub rooms: u32,
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub child_ages: Vec<u32>,
    pub nationality: String,
    pub currency: Currency,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub price_range: Option<PriceRange>,
    /// Minimum star rating.
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default = "first_page")]
    pub page: u32,
}

impl SearchContext {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.destination.trim().is_empty() {
            return Err(SearchError::InvalidContext(
                "destination is required".to_string(),
            ));
        }
        if self.checkout <= self.checkin {
            return Err(SearchError::InvalidContext(
                "checkout must be after checkin".to_string(),
            ));
        }
        if self.rooms == 0 {
            return Err(SearchError::InvalidContext(
                "at least one room is required".to_string(),
            ));
        }
        if self.adults == 0 {
            return Err(SearchError::InvalidContext(
                "at least one adult is required".to_string(),
            ));
        }
        if self.child_ages.len() != self.children as usize {
            return Err(SearchError::InvalidContext(format!(
                "expected {} child ages, got {}",
                self.children,
                self.child_ages.len()
            )));
        }
        if let Some(range) = self.price_range
            && range.from > range.to
        {
            return Err(SearchError::InvalidContext(
                "price range is inverted".to_string(),
            ));
        }
        if self.page == 0 {
            return Err(SearchError::InvalidContext("pages start at 1".to_string()));
        }
        Ok(())
    }

    pub fn nights(&self) -> u32 {
        (self.checkout - self.checkin).num_days().max(0) as u32
    }

    /// Price and rating filter applied after aggregation, since suppliers
    /// may ignore the hints in the request.
    pub fn accepts(&self, quote: &SupplierQuote) -> bool {
        if let Some(range) = self.price_range
            && !range.contains(quote.markup_price_per_night)
        {
            return false;
        }
        if let Some(min) = self.rating
            && quote.rating < min
        {
            return false;
        }
        true
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }
}

/// Request body sent to every supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierSearchRequest {
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub rooms: u32,
    pub adults: u32,
    pub children: u32,
    pub child_ages: Vec<u32>,
    pub nationality: String,
    pub page: u32,
    pub price_from: Option<f64>,
    pub price_to: Option<f64>,
    pub rating: Option<u8>,
    pub currency: String,
    pub language: String,
}

impl From<&SearchContext> for SupplierSearchRequest {
    fn from(ctx: &SearchContext) -> Self {
        Self {
            destination: ctx.destination.clone(),
            checkin: ctx.checkin,
            checkout: ctx.checkout,
            rooms: ctx.rooms,
            adults: ctx.adults,
            children: ctx.children,
            child_ages: ctx.child_ages.clone(),
            nationality: ctx.nationality.clone(),
            page: ctx.page,
            price_from: ctx.price_range.map(|r| r.from.to_major()),
            price_to: ctx.price_range.map(|r| r.to.to_major()),
            rating: ctx.rating,
            currency: ctx.currency.to_string(),
            language: ctx.language.clone(),
        }
    }
}

/// Supplier response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct SupplierResponseWire {
    pub success: Vec<SupplierQuoteWire>,
}

/// A quote as suppliers send it: prices in decimal major units.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SupplierQuoteWire {
    pub hotel_id: String,
    #[serde(default)]
    pub hotel_name: String,
    pub room_id: String,
    pub option_id: String,
    pub currency: String,
    pub base_price_per_night: f64,
    pub markup_price_per_night: f64,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub cancellation_allowed: bool,
    #[serde(default)]
    pub board_type: String,
    #[serde(default)]
    pub occupancy: OccupancyWire,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub tax: Option<f64>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OccupancyWire {
    #[serde(default)]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub child_ages: Vec<u32>,
}

impl SupplierQuoteWire {
    pub fn into_quote(self, supplier_id: &str) -> Result<SupplierQuote, SupplierError> {
        let malformed = |message: String| SupplierError::Malformed {
            supplier_id: supplier_id.to_string(),
            message,
        };

        let currency = Currency::parse(&self.currency).map_err(|e| malformed(e.to_string()))?;
        let prices = [self.base_price_per_night, self.markup_price_per_night];
        if prices.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(malformed(format!(
                "invalid price for hotel {}",
                self.hotel_id
            )));
        }
        if self.quantity == 0 {
            return Err(malformed(format!(
                "zero quantity for hotel {}",
                self.hotel_id
            )));
        }

        Ok(SupplierQuote {
            supplier_id: supplier_id.to_string(),
            hotel_id: self.hotel_id,
            hotel_name: self.hotel_name,
            room_id: self.room_id,
            option_id: self.option_id,
            currency,
            base_price_per_night: Money::from_major(self.base_price_per_night),
            markup_price_per_night: Money::from_major(self.markup_price_per_night),
            quantity: self.quantity,
            cancellation_allowed: self.cancellation_allowed,
            board_type: self.board_type,
            occupancy: Occupancy {
                adults: self.occupancy.adults,
                children: self.occupancy.children,
                child_ages: self.occupancy.child_ages,
            },
            rating: self.rating.unwrap_or(0),
            amenities: self.amenities,
            tax: self.tax.map(Money::from_major),
        })
    }
}
