//! Local client state
//!
//! [`ClientState`] holds the last fetched truth: the queue list, the active
//! queue and the caller's own entry in it. [`StateStore`] owns it behind a
//! `watch` channel so views can subscribe to every change; all mutation goes
//! through the store's methods.
//!
//! The queue list is always replaced wholesale by a fetch, never patched.
//! Each fetch takes a [`FetchTicket`]; only the most recently issued ticket
//! may apply its response, so a slow older response cannot overwrite a newer
//! one.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::models::{AuthStatus, EntryId, Queue, QueueId, User};

/// Where the session stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No successful auth check yet (or the server rejected the token)
    Unauthenticated,
    /// Authenticated, not waiting in any queue
    Idle,
    /// Authenticated and holding an entry in this queue
    InQueue(QueueId),
}

/// Snapshot of everything the client knows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    /// Whether the server accepted our credential
    pub authenticated: bool,
    /// The authenticated user, once known
    pub user: Option<User>,
    /// All queues, in server order
    pub queues: Vec<Queue>,
    /// Queue the user is viewing or waiting in
    pub active_queue_id: Option<QueueId>,
    /// Our own entry in the active queue
    pub my_entry_id: Option<EntryId>,
    /// Requests currently in flight
    pub in_flight: usize,
    /// Latest failure, cleared when the next request starts
    pub error: Option<String>,
    issued_fetch: u64,
    applied_fetch: u64,
}

impl ClientState {
    /// True while at least one request is running
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn active_queue(&self) -> Option<&Queue> {
        let id = self.active_queue_id.as_ref()?;
        self.queues.iter().find(|q| &q.id == id)
    }

    pub fn queue(&self, id: &QueueId) -> Option<&Queue> {
        self.queues.iter().find(|q| &q.id == id)
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.authenticated {
            return SessionPhase::Unauthenticated;
        }
        match (&self.active_queue_id, &self.my_entry_id) {
            (Some(queue_id), Some(_)) => SessionPhase::InQueue(queue_id.clone()),
            _ => SessionPhase::Idle,
        }
    }

    /// Our 1-based position in the active queue
    pub fn my_position(&self) -> Option<usize> {
        let entry = self.my_entry_id.as_ref()?;
        self.active_queue()?.position_of(entry)
    }

    /// Whether the user holds an entry in `queue`
    pub fn is_member_of(&self, queue: &Queue) -> bool {
        if let Some(ref user) = self.user {
            return queue.entry_of(&user.id).is_some();
        }
        self.active_queue_id.as_ref() == Some(&queue.id)
            && self
                .my_entry_id
                .as_ref()
                .is_some_and(|entry| queue.entry(entry).is_some())
    }

    /// Re-derive our own entry from the freshly fetched list
    ///
    /// Keeps `my_entry_id` set only while the user is a member of the
    /// active queue. The server may re-issue entry ids (skip, swap), so a
    /// known user is matched by user id. An active queue that is no longer
    /// listed is dropped.
    fn reconcile_membership(&mut self) {
        let Some(queue) = self.active_queue() else {
            self.active_queue_id = None;
            self.my_entry_id = None;
            return;
        };

        let entry = match (&self.user, &self.my_entry_id) {
            (Some(user), _) => queue.entry_of(&user.id).map(|m| m.entry_id.clone()),
            (None, Some(entry)) => queue.entry(entry).map(|m| m.entry_id.clone()),
            (None, None) => None,
        };
        self.my_entry_id = entry;
    }
}

/// Ticket taken by a fetch before it is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn seq(self) -> u64 {
        self.0
    }
}

/// Owned, observable client state
#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<ClientState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create an empty, unauthenticated store
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ClientState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> ClientState {
        self.tx.borrow().clone()
    }

    /// Read the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.tx.subscribe()
    }

    /// Mark a request as started; the guard marks it finished when dropped
    ///
    /// Also clears the previous error.
    pub fn begin_request(&self) -> BusyGuard {
        self.tx.send_modify(|state| {
            state.in_flight += 1;
            state.error = None;
        });
        BusyGuard {
            store: self.clone(),
        }
    }

    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|state| state.error = Some(message));
    }

    pub fn clear_error(&self) {
        self.tx.send_if_modified(|state| state.error.take().is_some());
    }

    /// The server rejected our credential
    pub fn mark_unauthenticated(&self) {
        self.tx.send_if_modified(|state| {
            let changed = state.authenticated || state.user.is_some();
            state.authenticated = false;
            state.user = None;
            changed
        });
    }

    pub fn set_auth(&self, status: AuthStatus) {
        self.tx.send_modify(|state| {
            state.authenticated = status.authenticated;
            if status.user.is_some() || !status.authenticated {
                state.user = status.user;
            }
        });
    }

    pub fn set_user(&self, user: User) {
        self.tx.send_modify(|state| {
            state.authenticated = true;
            state.user = Some(user);
        });
    }

    /// Take a ticket for the next queue list fetch
    pub fn begin_fetch(&self) -> FetchTicket {
        let mut ticket = FetchTicket(0);
        self.tx.send_if_modified(|state| {
            state.issued_fetch += 1;
            ticket = FetchTicket(state.issued_fetch);
            false
        });
        ticket
    }

    /// Replace the queue list if `ticket` is still the newest fetch
    ///
    /// Returns false when a newer fetch was issued meanwhile and the
    /// response was dropped.
    pub fn apply_queues(&self, ticket: FetchTicket, queues: Vec<Queue>) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|state| {
            if ticket.0 < state.issued_fetch {
                debug!(
                    "Dropping stale queue list (ticket {}, newest {})",
                    ticket.0, state.issued_fetch
                );
                return false;
            }
            state.queues = queues;
            state.applied_fetch = ticket.0;
            state.reconcile_membership();
            applied = true;
            true
        });
        applied
    }

    /// Make `queue_id` the active queue
    ///
    /// A recorded entry is kept only when it belongs to the same queue; the
    /// next applied fetch settles membership.
    pub fn set_active_queue(&self, queue_id: QueueId) {
        self.tx.send_modify(|state| {
            if state.active_queue_id.as_ref() != Some(&queue_id) {
                state.my_entry_id = None;
            }
            state.active_queue_id = Some(queue_id);
            if state.applied_fetch > 0 && state.active_queue().is_some() {
                state.reconcile_membership();
            }
        });
    }

    /// Record a successful join
    pub fn record_join(&self, queue_id: QueueId, entry_id: EntryId) {
        self.tx.send_modify(|state| {
            state.active_queue_id = Some(queue_id);
            state.my_entry_id = Some(entry_id);
        });
    }

    /// Forget the active queue and our entry in it
    pub fn clear_membership(&self) {
        self.tx.send_modify(|state| {
            state.active_queue_id = None;
            state.my_entry_id = None;
        });
    }

    /// Number of fetch tickets issued so far
    pub fn issued_fetches(&self) -> u64 {
        self.read(|state| state.issued_fetch)
    }
}

/// Marks one in-flight request; decrements the busy counter on drop
pub struct BusyGuard {
    store: StateStore,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.store
            .tx
            .send_modify(|state| state.in_flight = state.in_flight.saturating_sub(1));
    }
}
