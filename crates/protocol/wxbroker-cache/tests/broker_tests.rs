//! Single-flight and expiry tests for the credential broker

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use wxbroker_cache::{
    CacheBackend, CacheError, CredentialBroker, CredentialKind, FetchedCredential, MemoryCache,
};
use wxbroker_test_utils::ManualClock;

#[derive(Debug, Clone, PartialEq)]
struct FetchError(String);

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheError> for FetchError {
    fn from(err: CacheError) -> Self {
        FetchError(err.to_string())
    }
}

fn setup() -> (Arc<ManualClock>, Arc<MemoryCache>, CredentialBroker<FetchError>) {
    let clock = ManualClock::new(1_000);
    let backend = Arc::new(MemoryCache::with_clock(clock.clone()));
    let broker = CredentialBroker::with_clock(backend.clone(), clock.clone());
    (clock, backend, broker)
}

/// Concurrent misses on one scope trigger a single fetch
#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_fetch() {
    let (_clock, _backend, broker) = setup();
    let scope = broker.scope("wx1", CredentialKind::SecretAppToken);
    let fetches = AtomicUsize::new(0);

    let callers = (0..8).map(|_| {
        broker.get_or_fetch(&scope, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(FetchedCredential::new("token-1", 7200))
        })
    });
    let results = join_all(callers).await;

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap().value, "token-1");
    }
}

/// Waiters receive the leader's failure and the failure is not cached
#[tokio::test(start_paused = true)]
async fn shared_failure_is_not_cached() {
    let (_clock, _backend, broker) = setup();
    let scope = broker.scope("wx1", CredentialKind::ComponentAppToken);
    let fetches = AtomicUsize::new(0);

    let callers = (0..4).map(|_| {
        broker.get_or_fetch(&scope, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(FetchError("platform busy".into()))
        })
    });
    for result in join_all(callers).await {
        assert_eq!(result.unwrap_err(), FetchError("platform busy".into()));
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    let recovered = broker
        .get_or_fetch(&scope, || async { Ok(FetchedCredential::new("token-2", 7200)) })
        .await
        .unwrap();
    assert_eq!(recovered.value, "token-2");
}

/// Different scopes fetch independently
#[tokio::test(start_paused = true)]
async fn distinct_scopes_fetch_independently() {
    let (_clock, _backend, broker) = setup();
    let fetches = AtomicUsize::new(0);
    let scopes = [
        broker.scope("wx1", CredentialKind::SecretAppToken),
        broker.scope("wx2", CredentialKind::SecretAppToken),
        broker.scope("wx1", CredentialKind::AuthorizerAppToken),
    ];

    let callers = scopes.iter().map(|scope| {
        let fetches = &fetches;
        broker.get_or_fetch(scope, move || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(FetchedCredential::new(scope.to_string(), 7200))
        })
    });
    let results = join_all(callers).await;

    assert_eq!(fetches.load(Ordering::SeqCst), 3);
    assert_eq!(results[1].as_ref().unwrap().value, "wxbroker:wx2:secret_app_token");
}

/// A waiter takes over when the leader is cancelled mid-fetch
#[tokio::test(start_paused = true)]
async fn cancelled_leader_hands_over() {
    let (_clock, _backend, broker) = setup();
    let scope = broker.scope("wx1", CredentialKind::SecretAppToken);

    let leader = tokio::time::timeout(
        Duration::from_millis(10),
        broker.get_or_fetch(&scope, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(FetchedCredential::new("never", 7200))
        }),
    );
    let follower = broker.get_or_fetch(&scope, || async {
        Ok(FetchedCredential::new("from-follower", 7200))
    });

    let (leader, follower) = tokio::join!(leader, follower);
    assert!(leader.is_err());
    assert_eq!(follower.unwrap().value, "from-follower");
    assert_eq!(broker.peek(&scope).unwrap().unwrap().value, "from-follower");
}

/// Cached credentials expire at `stored + ttl`
#[tokio::test]
async fn credential_expires_after_ttl() {
    let (clock, _backend, broker) = setup();
    let scope = broker.scope("wx1", CredentialKind::SecretAppToken);
    let fetches = AtomicUsize::new(0);
    let fetch = || async {
        let n = fetches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FetchedCredential::new(format!("token-{}", n), 7200))
    };

    let first = broker.get_or_fetch(&scope, fetch).await.unwrap();
    assert_eq!(first.expires_at, Some(8_200));

    clock.advance(7_199);
    assert_eq!(broker.get_or_fetch(&scope, fetch).await.unwrap().value, "token-1");

    clock.advance(1);
    assert_eq!(broker.get_or_fetch(&scope, fetch).await.unwrap().value, "token-2");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

/// Pushed verify tickets never expire
#[tokio::test]
async fn verify_ticket_survives_clock() {
    let (clock, _backend, broker) = setup();
    broker
        .store(CredentialKind::VerifyTicket, "component", "ticket@@@xyz", None)
        .unwrap();

    clock.advance(365 * 24 * 3600);
    let scope = broker.scope("component", CredentialKind::VerifyTicket);
    assert_eq!(broker.peek(&scope).unwrap().unwrap().value, "ticket@@@xyz");
}

/// Unreadable cache entries are refetched
#[tokio::test]
async fn corrupt_entry_is_a_miss() {
    let (_clock, backend, broker) = setup();
    let scope = broker.scope("wx1", CredentialKind::SecretAppToken);
    backend.set(&scope.to_string(), "not json".into(), None).unwrap();

    let credential = broker
        .get_or_fetch(&scope, || async { Ok(FetchedCredential::new("fresh", 60)) })
        .await
        .unwrap();
    assert_eq!(credential.value, "fresh");
}

/// Invalidation forces the next call to fetch
#[tokio::test]
async fn invalidate_forces_refetch() {
    let (_clock, _backend, broker) = setup();
    let scope = broker.scope("wx1", CredentialKind::SecretAppToken);

    broker
        .get_or_fetch(&scope, || async { Ok(FetchedCredential::new("old", 7200)) })
        .await
        .unwrap();
    broker.invalidate(&scope).unwrap();

    let credential = broker
        .get_or_fetch(&scope, || async { Ok(FetchedCredential::new("new", 7200)) })
        .await
        .unwrap();
    assert_eq!(credential.value, "new");
}

/// Brokers with different namespaces do not see each other's entries
#[tokio::test]
async fn namespaces_share_backend_without_collision() {
    let clock = ManualClock::new(1_000);
    let backend = Arc::new(MemoryCache::with_clock(clock.clone()));
    let a: CredentialBroker<FetchError> =
        CredentialBroker::with_clock(backend.clone(), clock.clone()).with_namespace("a");
    let b: CredentialBroker<FetchError> =
        CredentialBroker::with_clock(backend.clone(), clock.clone()).with_namespace("b");

    a.store(CredentialKind::VerifyTicket, "wx1", "ticket-a", None).unwrap();
    assert!(b
        .peek(&b.scope("wx1", CredentialKind::VerifyTicket))
        .unwrap()
        .is_none());
    assert_eq!(backend.len(), 1);
}
