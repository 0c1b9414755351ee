//! Response cache consulted before network I/O.
//!
//! Entries are keyed by the fully built call ([`RequestKey`]: method, URL and
//! body) and hold the raw response body. Only requests that opt in through
//! `Request::wants_cache` read or write the cache.
//!
//! # Expiry
//!
//! Each entry lives for the configured TTL, measured with an injected
//! [`Clock`]. A `None` or zero TTL keeps entries until [`ResponseCache::invalidate`]
//! or [`ResponseCache::clear`] is called. Expired entries are dropped on read.
//!
//! # Session
//!
//! A cache attached to a [`SessionSignal`] with [`ResponseCache::with_session`]
//! drops every entry once the session is invalidated, before the next read or
//! write. Without it, bodies fetched under the old session stay until expiry.

use crate::session::{SessionSignal, SessionSubscription};
use chrono::{DateTime, Utc};
use fetchkit_core::environment::{Clock, SystemClock};
use fetchkit_core::request::RequestKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
struct CachedResponse {
    body: Vec<u8>,
    stored_at: DateTime<Utc>,
}

/// Shared, thread-safe response cache. Clones share the same entries.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<RequestKey, CachedResponse>>>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    session: Option<Arc<Mutex<SessionSubscription>>>,
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Create a cache measuring expiry with the system clock.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache measuring expiry with `clock`.
    #[must_use]
    pub fn with_clock(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
            clock,
            session: None,
        }
    }

    /// Drop every entry whenever `signal` reports an invalidated session.
    #[must_use]
    pub fn with_session(mut self, signal: &SessionSignal) -> Self {
        self.session = Some(Arc::new(Mutex::new(signal.subscribe())));
        self
    }

    /// Configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Body stored for `key`, unless missing or expired.
    #[must_use]
    pub fn get(&self, key: &RequestKey) -> Option<Vec<u8>> {
        self.apply_invalidations();
        let now = self.clock.now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                None => return None,
                Some(entry) if !self.is_expired(entry, now) => return Some(entry.body.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(key)
            .is_some_and(|entry| self.is_expired(entry, now))
        {
            entries.remove(key);
        }
        None
    }

    /// Store `body` for `key`, replacing any previous entry.
    pub fn store(&self, key: RequestKey, body: Vec<u8>) {
        self.apply_invalidations();
        let entry = CachedResponse {
            body,
            stored_at: self.clock.now(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &RequestKey) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.apply_invalidations();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_invalidations(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let invalidated = session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_pending();
        if invalidated {
            self.clear();
            tracing::debug!("Response cache cleared after session invalidation");
        }
    }

    fn is_expired(&self, entry: &CachedResponse, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        // Negative elapsed time (clock moved backwards) counts as fresh.
        (now - entry.stored_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= ttl)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use fetchkit_core::request::{
        EmptyParameters, EmptyPathComponent, EmptyResponse, HttpMethod, Request,
    };
    use std::sync::Mutex;

    struct PingRequest(EmptyParameters);

    impl Request for PingRequest {
        type Response = EmptyResponse;
        type Parameters = EmptyParameters;
        type PathComponent = EmptyPathComponent;

        fn new(parameters: EmptyParameters, _path: EmptyPathComponent) -> Self {
            Self(parameters)
        }

        fn parameters(&self) -> &EmptyParameters {
            &self.0
        }

        fn base_url(&self) -> String {
            "https://api.example.com".to_string()
        }

        fn path(&self) -> String {
            "/ping".to_string()
        }

        fn method(&self) -> HttpMethod {
            HttpMethod::Get
        }
    }

    struct SteppingClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl SteppingClock {
        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn key() -> RequestKey {
        PingRequest::new(EmptyParameters::new(), EmptyPathComponent)
            .build()
            .unwrap()
            .key()
    }

    #[test]
    fn test_store_and_get() {
        let cache = ResponseCache::new(None);
        assert!(cache.get(&key()).is_none());

        cache.store(key(), b"{}".to_vec());
        assert_eq!(cache.get(&key()), Some(b"{}".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let clock = Arc::new(SteppingClock {
            now: Mutex::new(Utc::now()),
        });
        let cache = ResponseCache::with_clock(Some(Duration::from_secs(60)), clock.clone());
        cache.store(key(), b"{}".to_vec());

        clock.advance(Duration::from_secs(59));
        assert!(cache.get(&key()).is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&key()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let clock = Arc::new(SteppingClock {
            now: Mutex::new(Utc::now()),
        });
        let cache = ResponseCache::with_clock(Some(Duration::ZERO), clock.clone());
        assert_eq!(cache.ttl(), None);

        cache.store(key(), b"{}".to_vec());
        clock.advance(Duration::from_secs(3600));
        assert_eq!(cache.get(&key()), Some(b"{}".to_vec()));
    }

    #[test]
    fn test_sub_second_config_ttl_serves_fresh_entries() {
        let config = crate::config::ClientConfig::default()
            .with_cache_ttl(Some(Duration::from_millis(500)));
        let cache = ResponseCache::new(config.cache_ttl());

        cache.store(key(), b"{}".to_vec());
        assert_eq!(cache.get(&key()), Some(b"{}".to_vec()));
    }

    #[test]
    fn test_manual_invalidation() {
        let cache = ResponseCache::default();
        cache.store(key(), b"{}".to_vec());

        assert!(cache.invalidate(&key()));
        assert!(!cache.invalidate(&key()));

        cache.store(key(), b"{}".to_vec());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_session_invalidation_clears_entries() {
        let signal = SessionSignal::default();
        let cache = ResponseCache::new(None).with_session(&signal);
        cache.store(key(), b"{}".to_vec());
        assert_eq!(cache.get(&key()), Some(b"{}".to_vec()));

        signal.invalidate();
        assert!(cache.get(&key()).is_none());
        assert!(cache.is_empty());

        cache.store(key(), b"[]".to_vec());
        assert_eq!(cache.get(&key()), Some(b"[]".to_vec()));
    }

    #[test]
    fn test_unattached_cache_ignores_session() {
        let signal = SessionSignal::default();
        let cache = ResponseCache::new(None);
        cache.store(key(), b"{}".to_vec());

        signal.invalidate();
        assert!(cache.get(&key()).is_some());
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ResponseCache::default();
        let shared = cache.clone();
        cache.store(key(), b"[]".to_vec());
        assert_eq!(shared.get(&key()), Some(b"[]".to_vec()));
    }
}
