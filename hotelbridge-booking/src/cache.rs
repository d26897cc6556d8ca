use hotelbridge_store::CacheBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Correlation ids that differ per call but never change the answer.
const VOLATILE_FIELDS: &[&str] = &["transaction_id", "trace_id"];

pub const SEARCH_NAMESPACE: &str = "search";
pub const AUTOSUGGEST_NAMESPACE: &str = "autosuggest";

/// Read-through result cache. Never authoritative and never fails a request:
/// backend errors and timeouts are logged and treated as misses.
#[derive(Clone)]
pub struct ResultCache {
    backend: Option<Arc<dyn CacheBackend>>,
    timeout: Duration,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self { backend: Some(backend), timeout }
    }

    /// Cache with no backend; every lookup misses.
    pub fn disabled() -> Self {
        Self { backend: None, timeout: Duration::ZERO }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;

        let raw = match timeout(self.timeout, backend.get(key)).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Ok(Err(e)) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
            Err(_) => {
                warn!("Cache read timed out for {} after {:?}", key, self.timeout);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Could not serialize cache entry {}: {}", key, e);
                return;
            }
        };

        match timeout(self.timeout, backend.set(key, &payload, ttl.as_secs())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Cache write failed for {}: {}", key, e),
            Err(_) => warn!("Cache write timed out for {} after {:?}", key, self.timeout),
        }
    }
}

/// `<namespace>:<sha256 of the canonical query>`.
///
/// Volatile fields are removed at every depth and object keys are sorted, so
/// two queries that differ only in correlation ids or field order share a key.
pub fn cache_key<Q: Serialize>(namespace: &str, query: &Q) -> String {
    let value = serde_json::to_value(query).unwrap_or(Value::Null);
    let canonical = canonicalize(value);
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    format!("{}:{}", namespace, hex::encode(digest))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .filter(|(k, _)| !VOLATILE_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            // Sorted regardless of serde_json's preserve_order feature.
            Value::Object(entries.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hotelbridge_store::{CacheError, InMemoryCache};
    use serde_json::json;

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl CacheBackend for SlowBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some("\"late\"".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[test]
    fn test_key_ignores_volatile_fields_and_order() {
        let a = json!({"city_code": "BOM", "rooms": [{"adults": 2}], "transaction_id": "t-1"});
        let b = json!({"rooms": [{"adults": 2, "trace_id": "x"}], "city_code": "BOM", "transaction_id": "t-2"});
        assert_eq!(cache_key(SEARCH_NAMESPACE, &a), cache_key(SEARCH_NAMESPACE, &b));

        let c = json!({"city_code": "DEL", "rooms": [{"adults": 2}]});
        assert_ne!(cache_key(SEARCH_NAMESPACE, &a), cache_key(SEARCH_NAMESPACE, &c));
        assert!(cache_key(AUTOSUGGEST_NAMESPACE, &a).starts_with("autosuggest:"));
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_backend() {
        let cache = ResultCache::new(Arc::new(InMemoryCache::new()), Duration::from_millis(100));
        cache.set("k", &vec![1, 2, 3], Duration::from_secs(60)).await;
        let hit: Option<Vec<i32>> = cache.get("k").await;
        assert_eq!(hit, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_backend_errors_are_misses() {
        let cache = ResultCache::new(Arc::new(BrokenBackend), Duration::from_millis(100));
        cache.set("k", &"v", Duration::from_secs(60)).await;
        let hit: Option<String> = cache.get("k").await;
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_slow_backend_is_a_miss() {
        let cache = ResultCache::new(Arc::new(SlowBackend), Duration::from_millis(20));
        let hit: Option<String> = cache.get("k").await;
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let backend = Arc::new(InMemoryCache::new());
        backend.set("k", "not json", 60).await.unwrap();
        let cache = ResultCache::new(backend, Duration::from_millis(100));
        let hit: Option<Vec<i32>> = cache.get("k").await;
        assert!(hit.is_none());
    }
}
