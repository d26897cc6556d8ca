use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BookingError, BookingResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomOccupancy {
    pub adults: u8,
    #[serde(default)]
    pub children: u8,
    #[serde(default)]
    pub child_ages: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HotelSearchCriteria {
    pub city_code: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: Vec<RoomOccupancy>,
    pub nationality: String,
    pub currency: String,
    #[serde(default)]
    pub hotel_ids: Vec<String>,
    /// Supplier correlation id. Volatile: never part of a cache key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl HotelSearchCriteria {
    pub fn validate(&self) -> BookingResult<()> {
        if self.city_code.trim().is_empty() && self.hotel_ids.is_empty() {
            return Err(BookingError::ValidationError(
                "Either city_code or hotel_ids is required".to_string(),
            ));
        }
        if self.check_out <= self.check_in {
            return Err(BookingError::ValidationError(
                "check_out must be after check_in".to_string(),
            ));
        }
        if self.rooms.is_empty() {
            return Err(BookingError::ValidationError("At least one room is required".to_string()));
        }
        for (index, room) in self.rooms.iter().enumerate() {
            if room.adults == 0 {
                return Err(BookingError::ValidationError(
                    format!("Room {} needs at least one adult", index + 1),
                ));
            }
            if room.child_ages.len() != room.children as usize {
                return Err(BookingError::ValidationError(
                    format!("Room {} child_ages must list every child", index + 1),
                ));
            }
        }
        Ok(())
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn guest_count(&self) -> usize {
        self.rooms.iter().map(|r| r.adults as usize + r.children as usize).sum()
    }

    /// Same query restricted to one batch of hotel ids.
    pub fn with_hotel_ids(&self, hotel_ids: Vec<String>) -> Self {
        Self { hotel_ids, ..self.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutosuggestQuery {
    pub term: String,
}

impl AutosuggestQuery {
    pub fn validate(&self) -> BookingResult<()> {
        if self.term.trim().chars().count() < 2 {
            return Err(BookingError::ValidationError(
                "Autosuggest term needs at least two characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Lowercased, trimmed term so "Mumbai " and "mumbai" share a cache line.
    pub fn normalized(&self) -> Self {
        Self { term: self.term.trim().to_lowercase() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestion {
    pub code: String,
    pub name: String,
    pub kind: String,
    pub country: Option<String>,
}

/// One rate package exactly as the supplier returned it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatePackage {
    pub booking_key: String,
    pub room_type: String,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub base_rate: Option<Decimal>,
    pub room_rate: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub service_component: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    pub currency: String,
    #[serde(default)]
    pub refundable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hotel {
    pub hotel_id: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub star_rating: Option<u8>,
    #[serde(default)]
    pub address: Option<String>,
    pub packages: Vec<RatePackage>,
}

/// Structured price of one package for one agency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBreakdown {
    pub base_rate: Decimal,
    pub discount: Decimal,
    pub service_component: Decimal,
    pub tax: Decimal,
    pub markup_amount: Decimal,
    pub chargeable_rate: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricedPackage {
    #[serde(flatten)]
    pub package: RatePackage,
    pub pricing: PriceBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricedHotel {
    pub hotel_id: String,
    pub name: String,
    pub city: String,
    pub star_rating: Option<u8>,
    pub address: Option<String>,
    pub packages: Vec<PricedPackage>,
}

impl PricedHotel {
    pub fn from_hotel(hotel: &Hotel, packages: Vec<PricedPackage>) -> Self {
        Self {
            hotel_id: hotel.hotel_id.clone(),
            name: hotel.name.clone(),
            city: hotel.city.clone(),
            star_rating: hotel.star_rating,
            address: hotel.address.clone(),
            packages,
        }
    }
}

/// Splits `items` into consecutive batches of at most `size` elements.
///
/// A `size` of zero is treated as one batch holding everything.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![items.to_vec()];
    }
    items.chunks(size).map(|c| c.to_vec()).collect()
}
