//! Value objects for the booking draft.

use chrono::NaiveDate;
use common::Money;
use search::{SearchContext, SupplierQuote};
use serde::{Deserialize, Serialize};

use super::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravellerType {
    Adult,
    Child,
}

/// A guest named on the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traveller {
    #[serde(rename = "type")]
    pub traveller_type: TravellerType,
    #[serde(default)]
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    /// Required for children.
    #[serde(default)]
    pub age: Option<u32>,
}

impl Traveller {
    pub fn adult(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            traveller_type: TravellerType::Adult,
            title: String::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            age: None,
        }
    }

    pub fn child(first_name: impl Into<String>, last_name: impl Into<String>, age: u32) -> Self {
        Self {
            traveller_type: TravellerType::Child,
            title: String::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            age: Some(age),
        }
    }
}

/// Longest stay a single booking may cover.
pub const MAX_NIGHTS: i64 = 365;

/// The dates and party a booking is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub rooms: u32,
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub child_ages: Vec<u32>,
    #[serde(default)]
    pub nationality: String,
}

impl Stay {
    pub fn nights(&self) -> u32 {
        (self.checkout - self.checkin).num_days().max(0) as u32
    }

    pub fn guest_count(&self) -> usize {
        (self.adults + self.children) as usize
    }

    pub fn validate(&self) -> Result<(), BookingError> {
        if self.checkout <= self.checkin {
            return Err(BookingError::InvalidPayload(
                "checkout must be after checkin".to_string(),
            ));
        }
        if (self.checkout - self.checkin).num_days() > MAX_NIGHTS {
            return Err(BookingError::InvalidPayload(format!(
                "a stay cannot exceed {MAX_NIGHTS} nights"
            )));
        }
        if self.rooms == 0 || self.adults == 0 {
            return Err(BookingError::InvalidPayload(
                "a stay needs at least one room and one adult".to_string(),
            ));
        }
        if self.child_ages.len() != self.children as usize {
            return Err(BookingError::InvalidPayload(format!(
                "expected {} child ages, got {}",
                self.children,
                self.child_ages.len()
            )));
        }
        Ok(())
    }
}

impl From<&SearchContext> for Stay {
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
        }
    }
}

/// Checks the traveller list against the stay's party.
///
/// The count must equal `adults + children`, the adult/child split must
/// match, children carry an age and every name is non-empty.
pub fn validate_travellers(stay: &Stay, travellers: &[Traveller]) -> Result<(), BookingError> {
    if travellers.len() != stay.guest_count() {
        return Err(BookingError::TravellerCount {
            expected: stay.guest_count(),
            actual: travellers.len(),
        });
    }

    let adults = travellers
        .iter()
        .filter(|t| t.traveller_type == TravellerType::Adult)
        .count();
    if adults != stay.adults as usize {
        return Err(BookingError::TravellerSplit {
            adults: stay.adults,
            children: stay.children,
        });
    }

    for (index, traveller) in travellers.iter().enumerate() {
        if traveller.first_name.trim().is_empty() || traveller.last_name.trim().is_empty() {
            return Err(BookingError::InvalidTraveller {
                index,
                reason: "first and last name are required".to_string(),
            });
        }
        if traveller.traveller_type == TravellerType::Child && traveller.age.is_none() {
            return Err(BookingError::InvalidTraveller {
                index,
                reason: "children need an age".to_string(),
            });
        }
    }

    Ok(())
}

/// Money breakdown for a booking, all in the quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Financials {
    pub price_original: Money,
    pub price_markup: Money,
    pub agent_fee: Money,
    pub net_profit: Money,
    pub tax: Money,
    pub subtotal: Money,
}

impl Financials {
    /// Derives the totals for a whole stay from a per-night quote.
    ///
    /// Fails with `InvalidPayload` when any total leaves the `i64` range.
    pub fn from_quote(
        quote: &SupplierQuote,
        nights: u32,
        agent_fee: Money,
    ) -> Result<Self, BookingError> {
        let stay_total = |per_night: Money| {
            per_night
                .checked_multiply(nights)
                .and_then(|total| total.checked_multiply(quote.quantity))
        };
        let out_of_range = || BookingError::InvalidPayload("price total out of range".to_string());

        let price_original = stay_total(quote.base_price_per_night).ok_or_else(out_of_range)?;
        let price_markup = stay_total(quote.markup_price_per_night).ok_or_else(out_of_range)?;
        let tax = quote.tax.unwrap_or_default();
        let net_profit = price_markup
            .checked_sub(price_original)
            .and_then(|margin| margin.checked_sub(agent_fee))
            .ok_or_else(out_of_range)?;
        let subtotal = price_markup.checked_sub(tax).ok_or_else(out_of_range)?;

        Ok(Self {
            price_original,
            price_markup,
            agent_fee,
            net_profit,
            tax,
            subtotal,
        })
    }

    /// The amount charged to the payer.
    pub fn charge_amount(&self) -> Money {
        self.price_markup
    }
}

/// Hotel facts captured at reservation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelSnapshot {
    pub hotel_id: String,
    pub hotel_name: String,
    pub supplier_id: String,
    pub rating: u8,
}

impl From<&SupplierQuote> for HotelSnapshot {
    fn from(quote: &SupplierQuote) -> Self {
        Self {
            hotel_id: quote.hotel_id.clone(),
            hotel_name: quote.hotel_name.clone(),
            supplier_id: quote.supplier_id.clone(),
            rating: quote.rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub email: String,
    #[serde(default)]
    pub user_id: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn financials_cover_whole_stay() {
        let mut q = quote();
        q.quantity = 2;

        let f = Financials::from_quote(&q, 3, Money::zero()).unwrap();

        assert_eq!(f.price_original.minor(), 40_000 * 3 * 2);
        assert_eq!(f.price_markup.minor(), 46_000 * 3 * 2);
        assert_eq!(f.tax, Money::zero());
        assert_eq!(f.subtotal, f.price_markup);
        assert_eq!(f.net_profit.minor(), 6_000 * 3 * 2);
    }

    #[test]
    fn agent_fee_reduces_net_profit() {
        let mut q = quote();
        q.tax = Some(Money::from_minor(5_000));

        let f = Financials::from_quote(&q, 1, Money::from_minor(1_000)).unwrap();

        assert_eq!(f.net_profit.minor(), 6_000 - 1_000);
        assert_eq!(f.subtotal.minor(), 46_000 - 5_000);
        assert_eq!(f.charge_amount().minor(), 46_000);
    }

    #[test]
    fn oversized_price_is_rejected_instead_of_wrapping() {
        let mut q = quote();
        q.base_price_per_night = Money::from_minor(i64::MAX / 2);
        q.markup_price_per_night = Money::from_minor(i64::MAX / 2);

        let err = Financials::from_quote(&q, 3, Money::zero()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidPayload(ref m) if m.contains("out of range")));
    }

    #[test]
    fn stay_length_is_bounded() {
        let mut s = stay();
        s.checkout = s.checkin + chrono::Duration::days(MAX_NIGHTS);
        assert!(s.validate().is_ok());

        s.checkout = s.checkin + chrono::Duration::days(MAX_NIGHTS + 1);
        assert!(matches!(s.validate(), Err(BookingError::InvalidPayload(_))));
    }

    #[test]
    fn traveller_count_must_match_party() {
        let mut travellers = travellers();
        travellers.pop();

        let err = validate_travellers(&stay(), &travellers).unwrap_err();
        assert!(matches!(
            err,
            BookingError::TravellerCount {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn traveller_split_must_match_party() {
        let travellers = vec![
            Traveller::adult("Layla", "Haddad"),
            Traveller::adult("Omar", "Haddad"),
            Traveller::adult("Sami", "Haddad"),
        ];
        assert!(matches!(
            validate_travellers(&stay(), &travellers),
            Err(BookingError::TravellerSplit { .. })
        ));
    }

    #[test]
    fn child_without_age_is_rejected() {
        let mut travellers = travellers();
        travellers[2].age = None;
        assert!(matches!(
            validate_travellers(&stay(), &travellers),
            Err(BookingError::InvalidTraveller { index: 2, .. })
        ));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut travellers = travellers();
        travellers[0].last_name = "  ".to_string();
        assert!(validate_travellers(&stay(), &travellers).is_err());
        assert!(validate_travellers(&stay(), &super::fixtures::travellers()).is_ok());
    }

    #[test]
    fn stay_from_search_context() {
        let stay = stay();
        assert_eq!(stay.nights(), 3);
        assert_eq!(stay.guest_count(), 3);
        assert!(stay.validate().is_ok());
    }
}
