use hotelbridge_core::search::{Hotel, PriceBreakdown, PricedHotel, PricedPackage, RatePackage};
use hotelbridge_core::{BookingError, BookingResult};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::markup::{MarkupRepository, MarkupRule};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PricingError {
    #[error("Invalid markup rule: {0}")]
    InvalidRule(String),

    #[error("Package {booking_key} prices to a negative total {total}")]
    NegativeTotal { booking_key: String, total: Decimal },
}

impl From<PricingError> for BookingError {
    fn from(err: PricingError) -> Self {
        BookingError::ValidationError(err.to_string())
    }
}

/// Prices one package under an optional rule. Inactive rules count as absent.
///
/// `chargeable_rate = ceil(base - discount + service_component + tax + markup)`
/// where `base` falls back to the room rate when the supplier sends no base.
pub fn price_package(package: &RatePackage, rule: Option<&MarkupRule>) -> Result<PriceBreakdown, PricingError> {
    let base = package.base_rate.unwrap_or(package.room_rate);

    let markup = match rule.filter(|r| r.is_active) {
        Some(rule) => {
            rule.validate()?;
            rule.markup_amount(base)
        }
        None => Decimal::ZERO,
    };

    let total = base - package.discount + package.service_component + package.tax + markup;
    if total < Decimal::ZERO {
        return Err(PricingError::NegativeTotal {
            booking_key: package.booking_key.clone(),
            total,
        });
    }

    Ok(PriceBreakdown {
        base_rate: base,
        discount: package.discount,
        service_component: package.service_component,
        tax: package.tax,
        markup_amount: markup.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity),
        chargeable_rate: total.ceil(),
        currency: package.currency.clone(),
    })
}

/// Per-agency pricing over a markup store.
pub struct PricingEngine {
    markups: Arc<dyn MarkupRepository>,
}

impl PricingEngine {
    pub fn new(markups: Arc<dyn MarkupRepository>) -> Self {
        Self { markups }
    }

    /// Strict pricing used at policy and hold time: any failure is an error.
    pub async fn apply_markup(&self, package: &RatePackage, agency_id: Uuid) -> BookingResult<PricedPackage> {
        let rule = self.markups.active_rule(agency_id).await?;
        let pricing = price_package(package, rule.as_ref())?;
        Ok(PricedPackage { package: package.clone(), pricing })
    }

    /// Display pricing for search results with one rule lookup.
    ///
    /// Never fails: a lookup or rule error leaves packages unmarked, and a
    /// package that cannot be priced at all is dropped.
    pub async fn price_hotels(&self, hotels: &[Hotel], agency_id: Uuid) -> Vec<PricedHotel> {
        let rule = match self.markups.active_rule(agency_id).await {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Markup lookup failed for agency {}, pricing without markup: {}", agency_id, e);
                None
            }
        };

        hotels
            .iter()
            .map(|hotel| {
                let packages = hotel
                    .packages
                    .iter()
                    .filter_map(|package| price_leniently(package, rule.as_ref(), agency_id))
                    .collect();
                PricedHotel::from_hotel(hotel, packages)
            })
            .collect()
    }
}

fn price_leniently(package: &RatePackage, rule: Option<&MarkupRule>, agency_id: Uuid) -> Option<PricedPackage> {
    let priced = price_package(package, rule).or_else(|e| {
        warn!(
            "Markup failed for agency {} on package {}, returning unmarked: {}",
            agency_id, package.booking_key, e
        );
        price_package(package, None)
    });

    match priced {
        Ok(pricing) => Some(PricedPackage { package: package.clone(), pricing }),
        Err(e) => {
            warn!("Dropping unpriceable package {}: {}", package.booking_key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::MarkupType;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedMarkups {
        rules: Mutex<HashMap<Uuid, MarkupRule>>,
        fail: bool,
    }

    #[async_trait]
    impl MarkupRepository for FixedMarkups {
        async fn active_rule(&self, agency_id: Uuid) -> BookingResult<Option<MarkupRule>> {
            if self.fail {
                return Err(BookingError::Storage("connection refused".to_string()));
            }
            Ok(self.rules.lock().unwrap().get(&agency_id).cloned())
        }

        async fn save_rule(&self, rule: &MarkupRule) -> BookingResult<()> {
            self.rules.lock().unwrap().insert(rule.agency_id, rule.clone());
            Ok(())
        }
    }

    fn package(base: Option<Decimal>, room_rate: Decimal) -> RatePackage {
        RatePackage {
            booking_key: "BK-1".to_string(),
            room_type: "Deluxe".to_string(),
            board: Some("Room only".to_string()),
            base_rate: base,
            room_rate,
            discount: dec!(0),
            service_component: dec!(0),
            tax: dec!(0),
            commission: dec!(0),
            currency: "INR".to_string(),
            refundable: true,
        }
    }

    fn hotel(packages: Vec<RatePackage>) -> Hotel {
        Hotel {
            hotel_id: "H1".to_string(),
            name: "Sea View".to_string(),
            city: "Mumbai".to_string(),
            star_rating: Some(4),
            address: None,
            packages,
        }
    }

    #[test]
    fn test_no_rule_is_identity() {
        let pricing = price_package(&package(Some(dec!(3499)), dec!(3600)), None).unwrap();
        assert_eq!(pricing.chargeable_rate, pricing.base_rate);
        assert_eq!(pricing.markup_amount, dec!(0));
    }

    #[test]
    fn test_missing_base_falls_back_to_room_rate() {
        let pricing = price_package(&package(None, dec!(3600)), None).unwrap();
        assert_eq!(pricing.base_rate, dec!(3600));
    }

    #[test]
    fn test_ceiling_rounding() {
        let agency = Uuid::new_v4();
        let rule = MarkupRule::percentage(agency, dec!(7.5)).unwrap();
        let mut pkg = package(Some(dec!(1001)), dec!(1001));
        pkg.tax = dec!(18.20);
        pkg.discount = dec!(50);
        pkg.service_component = dec!(10);

        // 1001 - 50 + 10 + 18.20 + 75.075 = 1054.275
        let pricing = price_package(&pkg, Some(&rule)).unwrap();
        assert_eq!(pricing.chargeable_rate, dec!(1055));
        assert_eq!(pricing.markup_amount, dec!(75.08));
    }

    #[test]
    fn test_inactive_rule_is_ignored() {
        let mut rule = MarkupRule::fixed(Uuid::new_v4(), dec!(500)).unwrap();
        rule.is_active = false;
        let pricing = price_package(&package(Some(dec!(2000)), dec!(2000)), Some(&rule)).unwrap();
        assert_eq!(pricing.chargeable_rate, dec!(2000));
    }

    #[test]
    fn test_corrupt_rule_and_negative_total_are_errors() {
        let rule = MarkupRule {
            agency_id: Uuid::new_v4(),
            markup_type: MarkupType::Percentage,
            value: dec!(250),
            is_active: true,
            updated_at: chrono::Utc::now(),
        };
        let pkg = package(Some(dec!(2000)), dec!(2000));
        assert!(matches!(price_package(&pkg, Some(&rule)), Err(PricingError::InvalidRule(_))));

        let mut cheap = package(Some(dec!(100)), dec!(100));
        cheap.discount = dec!(150);
        assert!(matches!(price_package(&cheap, None), Err(PricingError::NegativeTotal { .. })));
    }

    #[tokio::test]
    async fn test_search_pricing_survives_corrupt_rule() {
        let agency = Uuid::new_v4();
        let corrupt = MarkupRule {
            agency_id: agency,
            markup_type: MarkupType::Fixed,
            value: dec!(-10),
            is_active: true,
            updated_at: chrono::Utc::now(),
        };
        let engine = PricingEngine::new(Arc::new(FixedMarkups {
            rules: Mutex::new(HashMap::from([(agency, corrupt)])),
            fail: false,
        }));

        let priced = engine.price_hotels(&[hotel(vec![package(Some(dec!(2500)), dec!(2500))])], agency).await;
        assert_eq!(priced[0].packages.len(), 1);
        assert_eq!(priced[0].packages[0].pricing.chargeable_rate, dec!(2500));

        let strict = engine.apply_markup(&package(Some(dec!(2500)), dec!(2500)), agency).await;
        assert!(matches!(strict, Err(BookingError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_search_pricing_survives_lookup_failure() {
        let engine = PricingEngine::new(Arc::new(FixedMarkups {
            rules: Mutex::new(HashMap::new()),
            fail: true,
        }));
        let priced = engine
            .price_hotels(&[hotel(vec![package(Some(dec!(900)), dec!(900))])], Uuid::new_v4())
            .await;
        assert_eq!(priced[0].packages[0].pricing.chargeable_rate, dec!(900));
    }

    #[tokio::test]
    async fn test_display_and_hold_prices_agree() {
        let agency = Uuid::new_v4();
        let markups = Arc::new(FixedMarkups { rules: Mutex::new(HashMap::new()), fail: false });
        markups.save_rule(&MarkupRule::percentage(agency, dec!(10)).unwrap()).await.unwrap();
        let engine = PricingEngine::new(markups);

        let pkg = package(Some(dec!(4321.55)), dec!(4400));
        let displayed = engine.price_hotels(&[hotel(vec![pkg.clone()])], agency).await;
        let held = engine.apply_markup(&pkg, agency).await.unwrap();
        assert_eq!(displayed[0].packages[0].pricing, held.pricing);
        assert_eq!(held.pricing.chargeable_rate, dec!(4754));
    }
}
