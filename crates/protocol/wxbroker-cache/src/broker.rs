//! Single-flight credential broker.
//!
//! Every API call needs an access token, and tokens are rate-limited at the
//! platform: fetching a fresh one invalidates the previous one for most
//! kinds. The broker therefore guarantees at most one fetch in flight per
//! scope key. Concurrent callers for the same key wait for the leader and
//! receive its outcome, success or failure.
//!
//! ```text
//! caller ─▶ cache hit? ──yes──▶ value
//!              │ no
//!              ▼
//!        flight for key? ──yes──▶ wait on leader ──▶ shared outcome
//!              │ no                     │ leader dropped
//!              ▼                        └──▶ start over
//!        lead: fetch ─▶ store ─▶ publish
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::CacheBackend;
use crate::clock::{Clock, SystemClock};
use crate::credential::{Credential, CredentialKind, FetchedCredential, ScopeKey, DEFAULT_NAMESPACE};
use crate::error::{CacheError, CacheResult};

type Outcome<E> = Option<Result<Credential, E>>;

struct Flight<E> {
    id: u64,
    outcome: watch::Receiver<Outcome<E>>,
}

enum Role<E> {
    Leader {
        id: u64,
        publish: watch::Sender<Outcome<E>>,
    },
    Follower(watch::Receiver<Outcome<E>>),
}

/// Credential cache with single-flight refresh.
///
/// `E` is the error type of the fetch callbacks. It must be cloneable so one
/// failure can be handed to every waiter, and must absorb [`CacheError`].
///
/// Share one broker per process behind an `Arc`.
pub struct CredentialBroker<E> {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    namespace: String,
    flights: Mutex<HashMap<String, Flight<E>>>,
    next_flight: AtomicU64,
}

impl<E> CredentialBroker<E>
where
    E: Clone + Send + Sync + From<CacheError> + std::fmt::Display + 'static,
{
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<dyn CacheBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            namespace: DEFAULT_NAMESPACE.to_string(),
            flights: Mutex::new(HashMap::new()),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Use `namespace` as the first segment of every cache key.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Build a scope key in this broker's namespace.
    pub fn scope(&self, tenant: impl Into<String>, kind: CredentialKind) -> ScopeKey {
        ScopeKey::with_namespace(self.namespace.clone(), tenant, kind)
    }

    /// Return the cached credential for `scope`, fetching it on a miss.
    ///
    /// A fetch error is returned unchanged and nothing is cached. While a
    /// fetch is running, other callers for the same scope wait for it instead
    /// of starting their own.
    pub async fn get_or_fetch<F, Fut>(&self, scope: &ScopeKey, fetch: F) -> Result<Credential, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedCredential, E>>,
    {
        let key = scope.to_string();

        let (id, publish) = loop {
            if let Some(credential) = self.lookup(&key)? {
                debug!(scope = %key, "Credential cache hit");
                return Ok(credential);
            }

            match self.join_or_lead(&key)? {
                Role::Leader { id, publish } => break (id, publish),
                Role::Follower(outcome) => {
                    debug!(scope = %key, "Waiting for in-flight credential fetch");
                    if let Some(outcome) = wait_for(outcome).await {
                        return outcome;
                    }
                    debug!(scope = %key, "Credential fetch abandoned, retrying");
                }
            }
        };

        // Declared after `publish` so the map entry goes first when the
        // leader is dropped mid-fetch.
        let _flight = FlightGuard {
            flights: &self.flights,
            key: &key,
            id,
        };

        let outcome = self.lead(scope, &key, fetch).await;
        publish.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Store a pushed credential (e.g. a verify ticket) without fetching.
    ///
    /// `ttl` is in seconds; `None` never expires.
    pub fn store(
        &self,
        kind: CredentialKind,
        tenant: &str,
        value: impl Into<String>,
        ttl: Option<u64>,
    ) -> CacheResult<Credential> {
        let scope = self.scope(tenant, kind);
        let credential = self.build(&scope, value.into(), ttl);
        self.write(&credential)?;
        info!(scope = %credential.scope_key, "Stored pushed credential");
        Ok(credential)
    }

    /// Read the cached credential without fetching.
    pub fn peek(&self, scope: &ScopeKey) -> CacheResult<Option<Credential>> {
        self.lookup(&scope.to_string())
    }

    /// Drop the cached credential, e.g. after the platform rejected it.
    pub fn invalidate(&self, scope: &ScopeKey) -> CacheResult<()> {
        let key = scope.to_string();
        self.backend.delete(&key)?;
        info!(scope = %key, "Invalidated credential");
        Ok(())
    }

    async fn lead<F, Fut>(&self, scope: &ScopeKey, key: &str, fetch: F) -> Result<Credential, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedCredential, E>>,
    {
        // A previous leader may have stored between our lookup and registration
        if let Some(credential) = self.lookup(key)? {
            return Ok(credential);
        }

        debug!(scope = %key, "Fetching credential");
        let fetched = match fetch().await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(scope = %key, error = %e, "Credential fetch failed");
                return Err(e);
            }
        };

        let credential = self.build(scope, fetched.value, fetched.ttl);
        if let Err(e) = self.write(&credential) {
            // The credential is still good for this round of callers
            warn!(scope = %key, error = %e, "Failed to cache credential");
        } else {
            info!(
                scope = %key,
                expires_at = ?credential.expires_at,
                "Refreshed credential"
            );
        }
        Ok(credential)
    }

    fn join_or_lead(&self, key: &str) -> CacheResult<Role<E>> {
        let mut flights = self
            .flights
            .lock()
            .map_err(|_| CacheError::lock_poisoned("flight map lock poisoned"))?;

        if let Some(flight) = flights.get(key) {
            // A closed channel belongs to a leader that is being torn down
            if flight.outcome.has_changed().is_ok() {
                return Ok(Role::Follower(flight.outcome.clone()));
            }
        }

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (publish, outcome) = watch::channel(None);
        flights.insert(key.to_string(), Flight { id, outcome });
        Ok(Role::Leader { id, publish })
    }

    fn lookup(&self, key: &str) -> CacheResult<Option<Credential>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };

        let credential: Credential = match serde_json::from_str(&raw) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(scope = %key, error = %e, "Discarding unreadable cache entry");
                return Ok(None);
            }
        };

        Ok(Some(credential).filter(|c| c.is_valid_at(self.clock.now())))
    }

    fn build(&self, scope: &ScopeKey, value: String, ttl: Option<u64>) -> Credential {
        Credential {
            kind: scope.kind(),
            scope_key: scope.to_string(),
            value,
            expires_at: ttl.map(|ttl| self.clock.now().saturating_add(ttl)),
        }
    }

    fn write(&self, credential: &Credential) -> CacheResult<()> {
        let encoded = serde_json::to_string(credential)?;
        let ttl = credential.remaining(self.clock.now());
        self.backend.set(&credential.scope_key, encoded, ttl)
    }
}

/// Wait for the leader's outcome. `None` if the leader went away without one.
async fn wait_for<E: Clone>(mut outcome: watch::Receiver<Outcome<E>>) -> Outcome<E> {
    loop {
        let current = outcome.borrow().clone();
        if current.is_some() {
            return current;
        }
        if outcome.changed().await.is_err() {
            return outcome.borrow().clone();
        }
    }
}

/// Removes the flight entry when the leader finishes or is dropped.
struct FlightGuard<'a, E> {
    flights: &'a Mutex<HashMap<String, Flight<E>>>,
    key: &'a str,
    id: u64,
}

impl<E> Drop for FlightGuard<'_, E> {
    fn drop(&mut self) {
        let mut flights = match self.flights.lock() {
            Ok(flights) => flights,
            Err(poisoned) => poisoned.into_inner(),
        };
        if flights.get(self.key).is_some_and(|f| f.id == self.id) {
            flights.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryCache;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<CacheError> for TestError {
        fn from(err: CacheError) -> Self {
            TestError(err.to_string())
        }
    }

    fn broker() -> CredentialBroker<TestError> {
        CredentialBroker::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let broker = broker();
        let scope = broker.scope("wx1", CredentialKind::SecretAppToken);

        let first = broker
            .get_or_fetch(&scope, || async { Ok(FetchedCredential::new("tok", 7200)) })
            .await
            .unwrap();
        assert_eq!(first.value, "tok");

        let second = broker
            .get_or_fetch(&scope, || async {
                Err(TestError("should not be called".into()))
            })
            .await
            .unwrap();
        assert_eq!(second.value, "tok");
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let broker = broker();
        let scope = broker.scope("wx1", CredentialKind::SecretAppToken);

        let err = broker
            .get_or_fetch(&scope, || async { Err(TestError("boom".into())) })
            .await
            .unwrap_err();
        assert_eq!(err, TestError("boom".into()));
        assert!(broker.peek(&scope).unwrap().is_none());
        assert!(broker.flights.lock().unwrap().is_empty());
    }

    #[test]
    fn test_namespace_applies_to_scope() {
        let broker = broker().with_namespace("tenant-a");
        let scope = broker.scope("wx1", CredentialKind::VerifyTicket);
        assert_eq!(scope.to_string(), "tenant-a:wx1:verify_ticket");
    }

    #[test]
    fn test_store_peek_invalidate() {
        let broker = broker();
        let stored = broker
            .store(CredentialKind::VerifyTicket, "wx1", "ticket@@@", None)
            .unwrap();
        assert_eq!(stored.expires_at, None);

        let scope = broker.scope("wx1", CredentialKind::VerifyTicket);
        assert_eq!(broker.peek(&scope).unwrap().unwrap().value, "ticket@@@");

        broker.invalidate(&scope).unwrap();
        assert!(broker.peek(&scope).unwrap().is_none());
    }
}
