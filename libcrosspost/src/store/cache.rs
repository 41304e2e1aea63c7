//! Time-bounded cache for rarely changing store values
//!
//! The clock is injected so staleness can be driven deterministically in tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|n| *n).unwrap_or_else(|e| *e.into_inner())
    }
}

/// A single value that expires `ttl` after it was stored
pub struct TtlCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: Mutex<Option<(T, DateTime<Utc>)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: Mutex::new(None),
        }
    }

    /// The cached value if it has not expired yet
    pub fn get(&self) -> Option<T> {
        let entry = self.entry.lock().ok()?;
        let (value, stored_at) = entry.as_ref()?;
        let age = self
            .clock
            .now()
            .signed_duration_since(*stored_at)
            .to_std()
            .unwrap_or_default();
        (age < self.ttl).then(|| value.clone())
    }

    pub fn put(&self, value: T) {
        if let Ok(mut entry) = self.entry.lock() {
            *entry = Some((value, self.clock.now()));
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut entry) = self.entry.lock() {
            *entry = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_expires_after_ttl() {
        let clock = ManualClock::default();
        let cache = TtlCache::new(Duration::from_secs(300), Arc::new(clock.clone()));

        assert_eq!(cache.get(), None::<u32>);
        cache.put(7);
        assert_eq!(cache.get(), Some(7));

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get(), Some(7));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn test_put_refreshes_timestamp() {
        let clock = ManualClock::default();
        let cache = TtlCache::new(Duration::from_secs(60), Arc::new(clock.clone()));

        cache.put("a");
        clock.advance(Duration::from_secs(50));
        cache.put("b");
        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.get(), Some("b"));
    }

    #[test]
    fn test_invalidate() {
        let cache = TtlCache::new(Duration::from_secs(60), Arc::new(SystemClock));
        cache.put(1);
        cache.invalidate();
        assert_eq!(cache.get(), None);
    }
}
