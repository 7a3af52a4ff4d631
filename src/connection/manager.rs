//! Connection Manager Implementation
//!
//! State machine over pairs of user records. Every transition loads both
//! users and checks all preconditions, then applies its change to the acting
//! user first and the counterpart second. Each change is an atomic update of
//! the latest stored record, so transitions on other pairs sharing a user
//! are never overwritten. There is no rollback: a failed second write leaves
//! a one-sided pair, which later calls tolerate and
//! [`ConnectionManager::repair_pair`] reconciles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::types::{apply_side, strip_self_relations, Operation, PairMarkers, PairState};
use crate::config::GraphConfig;
use crate::error::{ConflictKind, GraphError, GraphResult, StoreError};
use crate::metrics::Metrics;
use crate::store::{RelationSet, User, UserId, UserMutation, UserProfile, UserStore};

/// Which relation set a listing projects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelationKind {
    Connections,
    PendingReceived,
    PendingSent,
}

/// Manages the connection-request lifecycle between users
pub struct ConnectionManager {
    store: Arc<dyn UserStore>,
    metrics: Arc<Metrics>,
    strict_accept: bool,
    store_timeout: Duration,
}

impl ConnectionManager {
    /// Create a new ConnectionManager
    pub fn new(store: Arc<dyn UserStore>, config: &GraphConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            strict_accept: config.strict_accept,
            store_timeout: config.store_timeout,
        }
    }

    /// Send a connection request from `requester` to `target`
    #[instrument(skip_all, fields(requester = %requester, target = %target))]
    pub async fn send_request(&self, requester: UserId, target: UserId) -> GraphResult<()> {
        self.observe(Operation::SendRequest, async {
            if requester == target {
                return Err(GraphError::InvalidOperation(
                    "cannot send a connection request to yourself".to_string(),
                ));
            }

            let (sender, receiver) = self.load_pair(requester, target).await?;
            let markers = PairMarkers::observe(&sender, &receiver);

            if markers.any_connected() {
                return Err(GraphError::Conflict(ConflictKind::AlreadyConnected));
            }
            if markers.a_to_b_pending() {
                return Err(GraphError::Conflict(ConflictKind::RequestAlreadySent));
            }
            if markers.b_to_a_pending() {
                return Err(GraphError::Conflict(ConflictKind::RequestAlreadyReceived));
            }

            self.persist_pair(
                Operation::SendRequest,
                requester,
                Box::new(move |user: &mut User| user.sent_requests.insert(target)),
                target,
                Box::new(move |user: &mut User| user.pending_requests.insert(requester)),
            )
            .await?;

            info!("Connection request sent: {} -> {}", requester, target);
            Ok(())
        })
        .await
    }

    /// Accept the request `requester` sent to `accepter`.
    ///
    /// Unless strict accept is configured, a missing request does not block
    /// the connection. In strict mode a request recorded on either record
    /// counts, so a request whose mirrored write failed can still be accepted.
    #[instrument(skip_all, fields(accepter = %accepter, requester = %requester))]
    pub async fn accept_request(&self, accepter: UserId, requester: UserId) -> GraphResult<()> {
        self.observe(Operation::AcceptRequest, async {
            reject_self(accepter, requester, "accept a connection request from yourself")?;

            let (receiver, sender) = self.load_pair(accepter, requester).await?;
            let requested = PairMarkers::observe(&receiver, &sender).b_to_a_pending();

            if !requested {
                if self.strict_accept {
                    return Err(GraphError::RequestNotFound(requester));
                }
                debug!("Accepting without a request from {}", requester);
            }

            // Also clears a crossing request in the other direction.
            let (receiver_side, sender_side) = PairState::Connected.sides();
            self.persist_pair(
                Operation::AcceptRequest,
                accepter,
                Box::new(move |user: &mut User| apply_side(user, requester, receiver_side)),
                requester,
                Box::new(move |user: &mut User| apply_side(user, accepter, sender_side)),
            )
            .await?;

            info!("Connection accepted: {} <-> {}", accepter, requester);
            Ok(())
        })
        .await
    }

    /// Reject the request `requester` sent to `rejecter`. Idempotent.
    #[instrument(skip_all, fields(rejecter = %rejecter, requester = %requester))]
    pub async fn reject_request(&self, rejecter: UserId, requester: UserId) -> GraphResult<()> {
        self.observe(Operation::RejectRequest, async {
            reject_self(rejecter, requester, "reject a connection request from yourself")?;

            self.load_pair(rejecter, requester).await?;

            let (receiver_dirty, sender_dirty) = self
                .persist_pair(
                    Operation::RejectRequest,
                    rejecter,
                    Box::new(move |user: &mut User| user.pending_requests.remove(&requester)),
                    requester,
                    Box::new(move |user: &mut User| user.sent_requests.remove(&rejecter)),
                )
                .await?;

            if receiver_dirty || sender_dirty {
                info!("Connection request rejected: {} -> {}", requester, rejecter);
            } else {
                debug!("No pending request from {} to reject", requester);
            }
            Ok(())
        })
        .await
    }

    /// Remove the connection between `user` and `target`. Idempotent.
    #[instrument(skip_all, fields(user = %user, target = %target))]
    pub async fn remove_connection(&self, user: UserId, target: UserId) -> GraphResult<()> {
        self.observe(Operation::RemoveConnection, async {
            reject_self(user, target, "remove a connection with yourself")?;

            self.load_pair(user, target).await?;

            let (actor_dirty, counterpart_dirty) = self
                .persist_pair(
                    Operation::RemoveConnection,
                    user,
                    Box::new(move |record: &mut User| record.connections.remove(&target)),
                    target,
                    Box::new(move |record: &mut User| record.connections.remove(&user)),
                )
                .await?;

            if actor_dirty || counterpart_dirty {
                info!("Connection removed: {} <-> {}", user, target);
            } else {
                debug!("{} and {} were not connected", user, target);
            }
            Ok(())
        })
        .await
    }

    /// Profiles of everyone `user` is connected to
    #[instrument(skip(self))]
    pub async fn list_connections(&self, user: UserId) -> GraphResult<Vec<UserProfile>> {
        self.observe(
            Operation::ListConnections,
            self.resolve(user, RelationKind::Connections),
        )
        .await
    }

    /// Profiles of users with an open request to `user`
    #[instrument(skip(self))]
    pub async fn list_pending_received(&self, user: UserId) -> GraphResult<Vec<UserProfile>> {
        self.observe(
            Operation::ListPendingReceived,
            self.resolve(user, RelationKind::PendingReceived),
        )
        .await
    }

    /// Profiles of users `user` has an open request to
    #[instrument(skip(self))]
    pub async fn list_pending_sent(&self, user: UserId) -> GraphResult<Vec<UserProfile>> {
        self.observe(
            Operation::ListPendingSent,
            self.resolve(user, RelationKind::PendingSent),
        )
        .await
    }

    /// Relationship between `user` and `other`, as seen by `user`
    #[instrument(skip(self))]
    pub async fn pair_status(&self, user: UserId, other: UserId) -> GraphResult<PairState> {
        self.observe(Operation::PairStatus, async {
            reject_self(user, other, "query the relationship with yourself")?;

            let (viewer, counterpart) = self.load_pair(user, other).await?;
            Ok(PairMarkers::observe(&viewer, &counterpart).state())
        })
        .await
    }

    /// Reconcile a pair whose records disagree and return the resulting state.
    ///
    /// Self-relations found on either record are dropped as well.
    #[instrument(skip_all, fields(actor = %actor, other = %other))]
    pub async fn repair_pair(&self, actor: UserId, other: UserId) -> GraphResult<PairState> {
        self.observe(Operation::RepairPair, async {
            reject_self(actor, other, "repair a relationship with yourself")?;

            let (first, second) = self.load_pair(actor, other).await?;
            let markers = PairMarkers::observe(&first, &second);
            let target = markers.reconciled();
            let (first_side, second_side) = target.sides();

            let (first_dirty, second_dirty) = self
                .persist_pair(
                    Operation::RepairPair,
                    actor,
                    Box::new(move |user: &mut User| {
                        let stripped = strip_self_relations(user);
                        apply_side(user, other, first_side) | stripped
                    }),
                    other,
                    Box::new(move |user: &mut User| {
                        let stripped = strip_self_relations(user);
                        apply_side(user, actor, second_side) | stripped
                    }),
                )
                .await?;

            if first_dirty || second_dirty {
                warn!(
                    "Repaired pair {} / {}: {:?} -> {:?}",
                    actor,
                    other,
                    markers.state(),
                    target
                );
            }

            Ok(target)
        })
        .await
    }

    /// Run an operation and count its outcome
    async fn observe<T, F>(&self, operation: Operation, fut: F) -> GraphResult<T>
    where
        F: Future<Output = GraphResult<T>>,
    {
        let result = fut.await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => {
                debug!("{} failed: {}", operation.as_str(), e);
                e.kind().as_str()
            }
        };
        self.metrics.record_operation(operation.as_str(), outcome);
        result
    }

    async fn resolve(&self, user: UserId, kind: RelationKind) -> GraphResult<Vec<UserProfile>> {
        let record = self.load(user).await?;
        let ids: &RelationSet = match kind {
            RelationKind::Connections => &record.connections,
            RelationKind::PendingReceived => &record.pending_requests,
            RelationKind::PendingSent => &record.sent_requests,
        };

        let users = self
            .with_timeout(self.store.find_many(ids.as_slice()))
            .await?;

        if users.len() < ids.len() {
            debug!(
                "Skipped {} dangling ids in {:?} of {}",
                ids.len() - users.len(),
                kind,
                user
            );
        }

        Ok(users.iter().map(UserProfile::from).collect())
    }

    async fn load(&self, id: UserId) -> GraphResult<User> {
        self.with_timeout(self.store.find_by_id(id))
            .await?
            .ok_or(GraphError::UserNotFound(id))
    }

    async fn load_pair(&self, first: UserId, second: UserId) -> GraphResult<(User, User)> {
        let first = self.load(first).await?;
        let second = self.load(second).await?;
        Ok((first, second))
    }

    /// Apply the acting record's change, then the counterpart's.
    ///
    /// Changes that leave a record as it was are not written. Once the first
    /// change is applied the second is always attempted; its failure is
    /// reported, not rolled back. Returns which records were written.
    async fn persist_pair(
        &self,
        operation: Operation,
        first: UserId,
        first_change: UserMutation,
        second: UserId,
        second_change: UserMutation,
    ) -> GraphResult<(bool, bool)> {
        let first_written = self.apply(first, first_change).await?;

        match self.apply(second, second_change).await {
            Ok(second_written) => Ok((first_written, second_written)),
            Err(e) => {
                if first_written {
                    warn!(
                        "{}: mirrored write to {} failed after {} was saved, pair left one-sided: {}",
                        operation.as_str(),
                        second,
                        first,
                        e
                    );
                    self.metrics.record_one_sided_write();
                }
                Err(e)
            }
        }
    }

    async fn apply(&self, id: UserId, change: UserMutation) -> GraphResult<bool> {
        self.with_timeout(self.store.update(id, change))
            .await?
            .map(|updated| updated.changed)
            .ok_or(GraphError::UserNotFound(id))
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }
}

fn reject_self(actor: UserId, other: UserId, action: &str) -> GraphResult<()> {
    if actor == other {
        return Err(GraphError::InvalidOperation(format!("cannot {}", action)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;

    async fn setup(strict_accept: bool) -> (ConnectionManager, Arc<MemoryUserStore>, UserId, UserId) {
        let store = Arc::new(MemoryUserStore::new());
        let a = User::new(UserId::new(), "A".into(), "a@example.com".into(), None);
        let b = User::new(UserId::new(), "B".into(), "b@example.com".into(), None);
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        let config = GraphConfig {
            strict_accept,
            ..GraphConfig::default()
        };
        let manager = ConnectionManager::new(store.clone(), &config, Arc::new(Metrics::new()));
        (manager, store, a.id, b.id)
    }

    async fn get(store: &MemoryUserStore, id: UserId) -> User {
        store.find_by_id(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_send_request_writes_both_sides() {
        let (manager, store, a, b) = setup(false).await;

        manager.send_request(a, b).await.unwrap();

        assert!(get(&store, a).await.sent_requests.contains(&b));
        assert!(get(&store, b).await.pending_requests.contains(&a));
        assert_eq!(manager.pair_status(a, b).await.unwrap(), PairState::PendingSent);
    }

    #[tokio::test]
    async fn test_send_request_to_self() {
        let (manager, _store, a, _b) = setup(false).await;
        assert!(matches!(
            manager.send_request(a, a).await,
            Err(GraphError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_send_request_reverse_direction_conflicts() {
        let (manager, _store, a, b) = setup(false).await;
        manager.send_request(a, b).await.unwrap();

        assert!(matches!(
            manager.send_request(b, a).await,
            Err(GraphError::Conflict(ConflictKind::RequestAlreadyReceived))
        ));
    }

    #[tokio::test]
    async fn test_send_request_unknown_target() {
        let (manager, _store, a, _b) = setup(false).await;
        let ghost = UserId::new();
        assert!(matches!(
            manager.send_request(a, ghost).await,
            Err(GraphError::UserNotFound(id)) if id == ghost
        ));
    }

    #[tokio::test]
    async fn test_permissive_accept_without_request() {
        let (manager, store, a, b) = setup(false).await;

        manager.accept_request(a, b).await.unwrap();

        assert!(get(&store, a).await.connections.contains(&b));
        assert!(get(&store, b).await.connections.contains(&a));
    }

    #[tokio::test]
    async fn test_strict_accept_requires_pending_request() {
        let (manager, store, a, b) = setup(true).await;

        assert!(matches!(
            manager.accept_request(a, b).await,
            Err(GraphError::RequestNotFound(id)) if id == b
        ));
        assert!(get(&store, a).await.connections.is_empty());

        manager.send_request(b, a).await.unwrap();
        manager.accept_request(a, b).await.unwrap();
        assert_eq!(manager.pair_status(a, b).await.unwrap(), PairState::Connected);
    }

    #[tokio::test]
    async fn test_strict_accept_counts_request_on_either_record() {
        let (manager, store, a, b) = setup(true).await;
        let mut sender = get(&store, b).await;
        sender.sent_requests.insert(a);
        store.save(&sender).await.unwrap();

        manager.accept_request(a, b).await.unwrap();

        let (ua, ub) = (get(&store, a).await, get(&store, b).await);
        assert!(ua.connections.contains(&b) && ub.connections.contains(&a));
        assert!(ub.sent_requests.is_empty());
    }

    #[tokio::test]
    async fn test_reject_missing_request_is_noop() {
        let (manager, store, a, b) = setup(false).await;
        let before = get(&store, a).await;

        manager.reject_request(a, b).await.unwrap();

        assert_eq!(get(&store, a).await, before);
    }

    #[tokio::test]
    async fn test_repair_completes_one_sided_connection() {
        let (manager, store, a, b) = setup(false).await;
        let mut record = get(&store, a).await;
        record.connections.insert(b);
        store.save(&record).await.unwrap();

        assert_eq!(manager.pair_status(a, b).await.unwrap(), PairState::Inconsistent);
        assert_eq!(manager.repair_pair(b, a).await.unwrap(), PairState::Connected);
        assert_eq!(manager.pair_status(a, b).await.unwrap(), PairState::Connected);
    }

    #[tokio::test]
    async fn test_operations_are_counted() {
        let store = Arc::new(MemoryUserStore::new());
        let metrics = Arc::new(Metrics::new());
        let manager = ConnectionManager::new(store, &GraphConfig::default(), metrics.clone());

        let a = UserId::new();
        let _ = manager.send_request(a, a).await;
        let _ = manager.list_connections(a).await;

        assert_eq!(metrics.operation_count("send_request", "invalid_operation"), 1);
        assert_eq!(metrics.operation_count("list_connections", "not_found"), 1);
    }
}
