//! Connection Graph Types

use crate::store::{User, UserId};
use serde::{Deserialize, Serialize};

/// Graph operations, used for logging and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SendRequest,
    AcceptRequest,
    RejectRequest,
    RemoveConnection,
    ListConnections,
    ListPendingReceived,
    ListPendingSent,
    PairStatus,
    RepairPair,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SendRequest => "send_request",
            Operation::AcceptRequest => "accept_request",
            Operation::RejectRequest => "reject_request",
            Operation::RemoveConnection => "remove_connection",
            Operation::ListConnections => "list_connections",
            Operation::ListPendingReceived => "list_pending_received",
            Operation::ListPendingSent => "list_pending_sent",
            Operation::PairStatus => "pair_status",
            Operation::RepairPair => "repair_pair",
        }
    }
}

/// Logical relationship between two users, seen from the first one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    None,
    /// The viewer has an open request to the other user
    PendingSent,
    /// The other user has an open request to the viewer
    PendingReceived,
    Connected,
    /// The two records disagree, typically after a failed mirrored write
    Inconsistent,
}

/// Relation markers for an ordered pair `(a, b)` gathered from both records.
///
/// Each direction is tracked per record so one-sided state stays visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairMarkers {
    /// `b ∈ a.connections`
    pub a_connected: bool,
    /// `a ∈ b.connections`
    pub b_connected: bool,
    /// `b ∈ a.sentRequests`
    pub a_sent: bool,
    /// `a ∈ b.pendingRequests`
    pub b_received: bool,
    /// `a ∈ b.sentRequests`
    pub b_sent: bool,
    /// `b ∈ a.pendingRequests`
    pub a_received: bool,
}

impl PairMarkers {
    pub fn observe(a: &User, b: &User) -> Self {
        Self {
            a_connected: a.connections.contains(&b.id),
            b_connected: b.connections.contains(&a.id),
            a_sent: a.sent_requests.contains(&b.id),
            b_received: b.pending_requests.contains(&a.id),
            b_sent: b.sent_requests.contains(&a.id),
            a_received: a.pending_requests.contains(&b.id),
        }
    }

    pub fn any_connected(&self) -> bool {
        self.a_connected || self.b_connected
    }

    /// Request `a → b` recorded on either side
    pub fn a_to_b_pending(&self) -> bool {
        self.a_sent || self.b_received
    }

    /// Request `b → a` recorded on either side
    pub fn b_to_a_pending(&self) -> bool {
        self.b_sent || self.a_received
    }

    /// Pair state as both records agree on it, or `Inconsistent`
    pub fn state(&self) -> PairState {
        let from_a = side_state(self.a_connected, self.a_sent, self.a_received);
        let from_b = side_state(self.b_connected, self.b_received, self.b_sent);

        match (from_a, from_b) {
            (Some(a), Some(b)) if a == b => a,
            _ => PairState::Inconsistent,
        }
    }

    /// The state a one-sided pair should converge to.
    ///
    /// A connection recorded anywhere wins. Requests open in both directions
    /// mean both users asked, so they resolve to a connection too.
    pub fn reconciled(&self) -> PairState {
        let a_to_b = self.a_to_b_pending();
        let b_to_a = self.b_to_a_pending();

        if self.any_connected() || (a_to_b && b_to_a) {
            PairState::Connected
        } else if a_to_b {
            PairState::PendingSent
        } else if b_to_a {
            PairState::PendingReceived
        } else {
            PairState::None
        }
    }
}

/// State as recorded by one record, `None` if the record itself holds
/// more than one marker for the pair.
fn side_state(connected: bool, sent: bool, received: bool) -> Option<PairState> {
    match (connected, sent, received) {
        (false, false, false) => Some(PairState::None),
        (true, false, false) => Some(PairState::Connected),
        (false, true, false) => Some(PairState::PendingSent),
        (false, false, true) => Some(PairState::PendingReceived),
        _ => None,
    }
}

/// Markers one record holds towards its counterpart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideMarkers {
    pub connected: bool,
    pub sent: bool,
    pub received: bool,
}

impl PairState {
    /// Markers the `(a, b)` records hold when the pair is exactly in this state
    pub fn sides(self) -> (SideMarkers, SideMarkers) {
        let (connected, a_to_b, b_to_a) = match self {
            PairState::Connected => (true, false, false),
            PairState::PendingSent => (false, true, false),
            PairState::PendingReceived => (false, false, true),
            PairState::None | PairState::Inconsistent => (false, false, false),
        };

        (
            SideMarkers {
                connected,
                sent: a_to_b,
                received: b_to_a,
            },
            SideMarkers {
                connected,
                sent: b_to_a,
                received: a_to_b,
            },
        )
    }
}

/// Rewrite `user`'s relation sets so they hold exactly `side` towards `other`.
///
/// Returns whether anything changed.
pub fn apply_side(user: &mut User, other: UserId, side: SideMarkers) -> bool {
    let mut dirty = set_membership(&mut user.connections, other, side.connected);
    dirty |= set_membership(&mut user.sent_requests, other, side.sent);
    dirty |= set_membership(&mut user.pending_requests, other, side.received);
    dirty
}

/// Drop any relation a user holds with itself
pub fn strip_self_relations(user: &mut User) -> bool {
    let id = user.id;
    let mut dirty = user.connections.remove(&id);
    dirty |= user.sent_requests.remove(&id);
    dirty |= user.pending_requests.remove(&id);
    dirty
}

fn set_membership(set: &mut crate::store::RelationSet, id: UserId, present: bool) -> bool {
    if present {
        set.insert(id)
    } else {
        set.remove(&id)
    }
}
