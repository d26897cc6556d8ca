use futures_util::future::join_all;
use hotelbridge_catalog::PricingEngine;
use hotelbridge_core::identity::{resolve_agency, AgencyDirectory};
use hotelbridge_core::search::{chunk, AutosuggestQuery, Hotel, HotelSearchCriteria, PricedHotel, Suggestion};
use hotelbridge_core::supplier::SupplierClient;
use hotelbridge_core::{BookingResult, Principal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{cache_key, ResultCache, AUTOSUGGEST_NAMESPACE, SEARCH_NAMESPACE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hotels: Vec<PricedHotel>,
    pub from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub search_ttl: Duration,
    pub autosuggest_ttl: Duration,
    pub batch_size: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_ttl: Duration::from_secs(300),
            autosuggest_ttl: Duration::from_secs(7200),
            batch_size: hotelbridge_core::HOTEL_ID_BATCH_SIZE,
        }
    }
}

/// Cached, batched, per-agency priced hotel search.
///
/// The cache holds supplier hotels before markup; every read is priced for
/// the caller's agency.
pub struct SearchService {
    supplier: Arc<dyn SupplierClient>,
    pricing: Arc<PricingEngine>,
    directory: Arc<dyn AgencyDirectory>,
    cache: ResultCache,
    settings: SearchSettings,
}

impl SearchService {
    pub fn new(
        supplier: Arc<dyn SupplierClient>,
        pricing: Arc<PricingEngine>,
        directory: Arc<dyn AgencyDirectory>,
        cache: ResultCache,
        settings: SearchSettings,
    ) -> Self {
        Self { supplier, pricing, directory, cache, settings }
    }

    pub async fn search(&self, principal: &Principal, criteria: &HotelSearchCriteria) -> BookingResult<SearchResponse> {
        criteria.validate()?;
        let agency_id = resolve_agency(self.directory.as_ref(), principal).await?;
        let key = cache_key(SEARCH_NAMESPACE, criteria);

        if let Some(hotels) = self.cache.get::<Vec<Hotel>>(&key).await {
            let hotels = self.pricing.price_hotels(&hotels, agency_id).await;
            return Ok(SearchResponse { hotels, from_cache: true });
        }

        let (hotels, complete) = self.fetch(criteria).await?;
        if complete {
            self.cache.set(&key, &hotels, self.settings.search_ttl).await;
        }

        info!("Search {} returned {} hotel(s) for agency {}", criteria.city_code, hotels.len(), agency_id);
        let hotels = self.pricing.price_hotels(&hotels, agency_id).await;
        Ok(SearchResponse { hotels, from_cache: false })
    }

    /// One supplier call per batch of hotel ids, concurrently, merged in batch order.
    /// Partial results are returned but reported as incomplete so they are not cached.
    async fn fetch(&self, criteria: &HotelSearchCriteria) -> BookingResult<(Vec<Hotel>, bool)> {
        if criteria.hotel_ids.is_empty() {
            return Ok((self.supplier.search(criteria).await?, true));
        }

        let batches: Vec<HotelSearchCriteria> = chunk(&criteria.hotel_ids, self.settings.batch_size)
            .into_iter()
            .map(|ids| criteria.with_hotel_ids(ids))
            .collect();
        let results = join_all(batches.iter().map(|batch| self.supplier.search(batch))).await;

        let mut hotels = Vec::new();
        let mut first_error = None;
        let mut failed = 0;
        for result in results {
            match result {
                Ok(batch) => hotels.extend(batch),
                Err(e) => {
                    failed += 1;
                    warn!("Search batch failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if failed == batches.len() => Err(e),
            Some(_) => {
                warn!("{} of {} search batches failed, returning partial results", failed, batches.len());
                Ok((hotels, false))
            }
            None => Ok((hotels, true)),
        }
    }

    pub async fn autosuggest(&self, query: &AutosuggestQuery) -> BookingResult<Vec<Suggestion>> {
        query.validate()?;
        let query = query.normalized();
        let key = cache_key(AUTOSUGGEST_NAMESPACE, &query);

        if let Some(suggestions) = self.cache.get::<Vec<Suggestion>>(&key).await {
            return Ok(suggestions);
        }

        let suggestions = self.supplier.autosuggest(&query).await?;
        self.cache.set(&key, &suggestions, self.settings.autosuggest_ttl).await;
        Ok(suggestions)
    }
}
