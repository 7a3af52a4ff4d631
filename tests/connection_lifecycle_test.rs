//! Connection Lifecycle Integration Tests

use founderlink::{
    config::GraphConfig,
    connection::{ConnectionManager, PairState},
    error::{ConflictKind, GraphError},
    metrics::Metrics,
    store::{MemoryUserStore, User, UserId, UserStore},
};
use std::sync::Arc;

struct Fixture {
    manager: ConnectionManager,
    store: Arc<MemoryUserStore>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryUserStore::new());
        let manager =
            ConnectionManager::new(store.clone(), &GraphConfig::default(), Arc::new(Metrics::new()));
        Self { manager, store }
    }

    async fn user(&self, name: &str) -> UserId {
        let user = User::new(
            UserId::new(),
            name.to_string(),
            format!("{}@example.com", name.to_lowercase()),
            None,
        );
        self.store.save(&user).await.unwrap();
        user.id
    }

    async fn get(&self, id: UserId) -> User {
        self.store.find_by_id(id).await.unwrap().unwrap()
    }

    /// No relation of any kind in either direction
    async fn assert_unrelated(&self, a: UserId, b: UserId) {
        let (ua, ub) = (self.get(a).await, self.get(b).await);
        for (user, other) in [(&ua, b), (&ub, a)] {
            assert!(!user.connections.contains(&other));
            assert!(!user.sent_requests.contains(&other));
            assert!(!user.pending_requests.contains(&other));
        }
    }

    /// At most one pair state holds, and both records agree on it
    async fn assert_exclusive(&self, a: UserId, b: UserId) {
        let (ua, ub) = (self.get(a).await, self.get(b).await);
        let pending_ab = ua.sent_requests.contains(&b);
        let pending_ba = ub.sent_requests.contains(&a);
        let connected = ua.connections.contains(&b);

        assert_eq!(pending_ab, ub.pending_requests.contains(&a));
        assert_eq!(pending_ba, ua.pending_requests.contains(&b));
        assert_eq!(connected, ub.connections.contains(&a));
        assert!([pending_ab, pending_ba, connected].iter().filter(|x| **x).count() <= 1);
    }

    async fn assert_no_self_relation(&self, id: UserId) {
        let user = self.get(id).await;
        assert!(!user.connections.contains(&id));
        assert!(!user.sent_requests.contains(&id));
        assert!(!user.pending_requests.contains(&id));
    }
}

#[tokio::test]
async fn test_send_then_accept() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;

    fx.manager.send_request(a, b).await.unwrap();

    let (ua, ub) = (fx.get(a).await, fx.get(b).await);
    assert!(ua.sent_requests.contains(&b));
    assert!(ub.pending_requests.contains(&a));
    assert!(!ua.connections.contains(&b) && !ub.connections.contains(&a));

    fx.manager.accept_request(b, a).await.unwrap();

    let (ua, ub) = (fx.get(a).await, fx.get(b).await);
    assert!(ua.connections.contains(&b) && ub.connections.contains(&a));
    assert!(ua.sent_requests.is_empty() && ua.pending_requests.is_empty());
    assert!(ub.sent_requests.is_empty() && ub.pending_requests.is_empty());

    let connections = fx.manager.list_connections(a).await.unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].name, "Bob");
    assert_eq!(connections[0].email, "bob@example.com");
}

#[tokio::test]
async fn test_send_then_reject() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;

    fx.manager.send_request(a, b).await.unwrap();
    fx.manager.reject_request(b, a).await.unwrap();

    fx.assert_unrelated(a, b).await;
    assert!(fx.manager.list_pending_sent(a).await.unwrap().is_empty());
    assert!(fx.manager.list_pending_received(b).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_then_request_again() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;

    fx.manager.send_request(a, b).await.unwrap();
    fx.manager.accept_request(b, a).await.unwrap();
    fx.manager.remove_connection(a, b).await.unwrap();

    fx.assert_unrelated(a, b).await;

    fx.manager.send_request(a, b).await.unwrap();
    assert_eq!(fx.manager.pair_status(a, b).await.unwrap(), PairState::PendingSent);
}

#[tokio::test]
async fn test_duplicate_request_conflicts() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;

    fx.manager.send_request(a, b).await.unwrap();
    let second = fx.manager.send_request(a, b).await;

    assert!(matches!(
        second,
        Err(GraphError::Conflict(ConflictKind::RequestAlreadySent))
    ));
    assert_eq!(fx.get(a).await.sent_requests.len(), 1);
}

#[tokio::test]
async fn test_request_to_connected_user_conflicts() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;

    fx.manager.send_request(a, b).await.unwrap();
    fx.manager.accept_request(b, a).await.unwrap();

    for (from, to) in [(a, b), (b, a)] {
        assert!(matches!(
            fx.manager.send_request(from, to).await,
            Err(GraphError::Conflict(ConflictKind::AlreadyConnected))
        ));
    }
}

#[tokio::test]
async fn test_self_request_is_invalid() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;

    assert!(matches!(
        fx.manager.send_request(a, a).await,
        Err(GraphError::InvalidOperation(_))
    ));
    assert!(matches!(
        fx.manager.accept_request(a, a).await,
        Err(GraphError::InvalidOperation(_))
    ));
    fx.assert_no_self_relation(a).await;
}

#[tokio::test]
async fn test_unknown_users_not_found() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let ghost = UserId::new();

    assert!(matches!(
        fx.manager.send_request(ghost, a).await,
        Err(GraphError::UserNotFound(id)) if id == ghost
    ));
    assert!(matches!(
        fx.manager.accept_request(a, ghost).await,
        Err(GraphError::UserNotFound(_))
    ));
    assert!(matches!(
        fx.manager.reject_request(a, ghost).await,
        Err(GraphError::UserNotFound(_))
    ));
    assert!(matches!(
        fx.manager.remove_connection(a, ghost).await,
        Err(GraphError::UserNotFound(_))
    ));
    assert!(matches!(
        fx.manager.list_pending_sent(ghost).await,
        Err(GraphError::UserNotFound(_))
    ));
}

#[tokio::test]
async fn test_reject_and_remove_are_idempotent() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;
    let (before_a, before_b) = (fx.get(a).await, fx.get(b).await);

    fx.manager.reject_request(a, b).await.unwrap();
    fx.manager.reject_request(a, b).await.unwrap();
    fx.manager.remove_connection(a, b).await.unwrap();
    fx.manager.remove_connection(b, a).await.unwrap();

    assert_eq!(fx.get(a).await, before_a);
    assert_eq!(fx.get(b).await, before_b);
}

#[tokio::test]
async fn test_accept_clears_crossing_requests() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;

    // Crossing requests can only come from racing writers; fake one.
    let mut ua = fx.get(a).await;
    let mut ub = fx.get(b).await;
    ua.sent_requests.insert(b);
    ua.pending_requests.insert(b);
    ub.sent_requests.insert(a);
    ub.pending_requests.insert(a);
    fx.store.save(&ua).await.unwrap();
    fx.store.save(&ub).await.unwrap();

    fx.manager.accept_request(a, b).await.unwrap();

    fx.assert_exclusive(a, b).await;
    assert_eq!(fx.manager.pair_status(a, b).await.unwrap(), PairState::Connected);
}

#[tokio::test]
async fn test_mutual_exclusion_over_operation_sequence() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;
    let c = fx.user("Cleo").await;

    fx.manager.send_request(a, b).await.unwrap();
    fx.assert_exclusive(a, b).await;
    let _ = fx.manager.send_request(b, a).await;
    fx.assert_exclusive(a, b).await;
    fx.manager.send_request(c, a).await.unwrap();
    fx.manager.accept_request(b, a).await.unwrap();
    fx.assert_exclusive(a, b).await;
    fx.manager.reject_request(a, c).await.unwrap();
    fx.assert_exclusive(a, c).await;
    fx.manager.send_request(b, c).await.unwrap();
    fx.manager.remove_connection(b, a).await.unwrap();
    fx.assert_exclusive(a, b).await;
    fx.assert_exclusive(b, c).await;

    for id in [a, b, c] {
        fx.assert_no_self_relation(id).await;
    }
}

#[tokio::test]
async fn test_listings_skip_deleted_users() {
    let fx = Fixture::new();
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;
    let c = fx.user("Cleo").await;

    fx.manager.send_request(b, a).await.unwrap();
    fx.manager.send_request(c, a).await.unwrap();
    fx.store.delete(b).await.unwrap();

    let pending = fx.manager.list_pending_received(a).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, c);
}

#[tokio::test]
async fn test_concurrent_duplicate_sends_leave_single_entries() {
    let fx = Arc::new(Fixture::new());
    let a = fx.user("Ada").await;
    let b = fx.user("Bob").await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move { fx.manager.send_request(a, b).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successes += 1,
            Err(GraphError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert!(successes >= 1);
    assert_eq!(fx.get(a).await.sent_requests.len(), 1);
    assert_eq!(fx.get(b).await.pending_requests.len(), 1);
}
