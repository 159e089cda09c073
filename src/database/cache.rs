use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long a cached listing page stays valid.
pub const OFFERS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Key holding the cached total count for the unfiltered listing.
pub const OFFERS_TOTAL_KEY: &str = "offers:total";

pub fn offers_page_key(page: i64, limit: i64) -> String {
    format!("offers:{}:{}", page, limit)
}

struct CacheEntry {
    stored_at: Instant,
    value: String,
}

/// In-process TTL cache for the public offer listing. Entries hold
/// serialized payloads keyed by page and limit; stale entries are
/// evicted lazily on read.
#[derive(Clone)]
pub struct ListingCache {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("listing cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: String) {
        let mut entries = self.entries.lock().expect("listing cache mutex poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                value,
            },
        );
    }
}
