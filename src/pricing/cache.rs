//! Short-lived price cache
//!
//! A read-mostly map of per-key slots. The map lock is only taken for
//! writing when a key is seen for the first time; each slot has its own
//! mutex so concurrent lookups of one key fetch once and share the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use super::oracle::DataUnavailable;

/// Default time a fetched price stays fresh
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(300);

/// Longest a failed lookup is remembered before the oracle is asked again
pub const FAILURE_RETRY: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Entry {
    /// Last successfully fetched value, kept past its TTL as a stale fallback
    value: Option<f64>,
    checked_at: Option<Instant>,
    failure: Option<DataUnavailable>,
}

impl Entry {
    fn cached(&self) -> Result<f64, DataUnavailable> {
        match (self.value, &self.failure) {
            (Some(value), _) => Ok(value),
            (None, Some(e)) => Err(e.clone()),
            (None, None) => Err(DataUnavailable::new("", "never fetched")),
        }
    }
}

type Slot = Arc<Mutex<Entry>>;

/// TTL cache in front of a price oracle
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    slots: RwLock<HashMap<String, Slot>>,
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_TTL)
    }
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Fresh cached value, or the result of `fetch`.
    ///
    /// When `fetch` fails and a stale value exists, the stale value is
    /// returned; only a key that was never fetched reports the failure.
    /// Failures are remembered for `min(ttl, FAILURE_RETRY)` so a dead
    /// oracle is not asked again on every lookup.
    pub fn get_or_fetch(
        &self,
        key: &str,
        fetch: impl FnOnce() -> Result<f64, DataUnavailable>,
    ) -> Result<f64, DataUnavailable> {
        let slot = self.slot(key);
        let mut entry = slot.lock();

        if let Some(checked_at) = entry.checked_at {
            let window = if entry.failure.is_some() {
                self.ttl.min(FAILURE_RETRY)
            } else {
                self.ttl
            };
            if checked_at.elapsed() < window {
                return entry.cached();
            }
        }

        entry.checked_at = Some(Instant::now());
        match fetch() {
            Ok(value) => {
                entry.value = Some(value);
                entry.failure = None;
                Ok(value)
            }
            Err(e) => {
                if let Some(stale) = entry.value {
                    log::warn!("{}; using last known price {:.3}", e, stale);
                }
                entry.failure = Some(e);
                entry.cached()
            }
        }
    }
}
