//! Client sessions and the client registry.
//!
//! Mirrors the reference server's `ConnectionHandle`/`ConnectionRegistry`
//! split: a per-client handle carries the fields the loop needs to read or
//! mutate, registered in a concurrent map keyed by a monotonically
//! increasing id.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use rand::seq::IteratorRandom;
use tokio::sync::{mpsc, oneshot};

/// Stable identifier for a client connection.
pub type ClientId = u64;

/// Loop-visible state machine for a client session: `NEW` is implicit (a
/// session is inserted as `Active` on first dispatch), `Blocked` is
/// reserved for future blocking commands, `Exit`/`Error` mark sessions the
/// loop should tear down on its next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Blocked,
    Exit,
    Error,
}

/// Everything the event loop needs to know about one connected client.
///
/// Only the owning loop mutates `database_index`, `subscriptions`,
/// `last_activity_millis`, `state`, and `pipelined`; the connection task
/// only ever touches `push_rx` (its half of the push slot) and the
/// `exit_rx` it was handed at registration.
pub struct ClientSession {
    pub id: ClientId,
    pub state: SessionState,
    pub database_index: usize,
    pub subscriptions: HashSet<Bytes>,
    pub last_activity_millis: u64,
    pub pipelined: bool,
    push_tx: mpsc::Sender<Bytes>,
    exit_tx: Option<oneshot::Sender<()>>,
}

impl ClientSession {
    /// Pushes an encoded pub/sub frame to this client.
    ///
    /// Delivery is best-effort: if the push slot is full the message is
    /// dropped for this subscriber rather than blocking the loop.
    pub fn try_push(&self, frame: Bytes) -> bool {
        self.push_tx.try_send(frame).is_ok()
    }

    /// Signals the owning connection task to close the socket. A session
    /// can only be signalled once; later calls are no-ops.
    pub fn signal_exit(&mut self) {
        if let Some(tx) = self.exit_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The registry side of a freshly accepted connection: returned to the
/// connection task so it can receive pushes and its exit signal.
pub struct ConnectionHandles {
    pub push_rx: mpsc::Receiver<Bytes>,
    pub exit_rx: oneshot::Receiver<()>,
}

/// Tracks all live client sessions.
///
/// A `DashMap` gives lock-free concurrent lookups from connection tasks
/// (to check liveness) while the loop is the only writer of session
/// contents, matching the reference server's connection-registry pattern.
pub struct ClientRegistry {
    sessions: DashMap<ClientId, ClientSession>,
    next_id: AtomicU64,
    push_capacity: usize,
}

impl ClientRegistry {
    /// Creates an empty registry. `push_capacity` bounds each client's
    /// pub/sub push slot.
    #[must_use]
    pub fn new(push_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            push_capacity,
        }
    }

    /// Allocates a new client id and registers its session, returning the
    /// id plus the connection-side handles.
    pub fn register(&self, now_millis: u64) -> (ClientId, ConnectionHandles) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (push_tx, push_rx) = mpsc::channel(self.push_capacity);
        let (exit_tx, exit_rx) = oneshot::channel();
        let session = ClientSession {
            id,
            state: SessionState::Active,
            database_index: 0,
            subscriptions: HashSet::new(),
            last_activity_millis: now_millis,
            pipelined: false,
            push_tx,
            exit_tx: Some(exit_tx),
        };
        self.sessions.insert(id, session);
        (id, ConnectionHandles { push_rx, exit_rx })
    }

    /// Whether `id` is registered (`add_if_absent` is folded into
    /// [`register`](Self::register); this only reports membership).
    #[must_use]
    pub fn contains(&self, id: ClientId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Removes a session, signalling its connection task to exit.
    pub fn remove(&self, id: ClientId) {
        if let Some((_, mut session)) = self.sessions.remove(&id) {
            session.signal_exit();
        }
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of every currently registered client id, for teardown
    /// sweeps that need to remove everything still connected.
    #[must_use]
    pub fn ids(&self) -> Vec<ClientId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Runs `f` against the session for `id`, if present.
    pub fn with_session_mut<R>(&self, id: ClientId, f: impl FnOnce(&mut ClientSession) -> R) -> Option<R> {
        self.sessions.get_mut(&id).map(|mut entry| f(&mut entry))
    }

    /// Delivers `frame` to one client by id. Returns `false` if the client
    /// is unknown or its push slot is full (best-effort, lossy delivery).
    pub fn push_to(&self, id: ClientId, frame: Bytes) -> bool {
        self.sessions.get(&id).map(|s| s.try_push(frame)).unwrap_or(false)
    }

    /// `remove_long_not_used`: scans up to `cap` sessions, sampling `sample`
    /// of them per pass, and evicts any whose last-activity age exceeds
    /// `idle_millis`. Mirrors the reference storage engine's
    /// reservoir-sampling reaper, applied here to client idleness instead
    /// of key TTLs.
    pub fn remove_long_not_used(&self, sample: usize, cap: usize, idle_millis: u64, now_millis: u64) -> usize {
        let mut rng = rand::rng();
        let candidates: Vec<ClientId> = self
            .sessions
            .iter()
            .take(cap)
            .map(|entry| *entry.key())
            .choose_multiple(&mut rng, sample);

        let mut removed = 0;
        for id in candidates {
            let expired = self
                .sessions
                .get(&id)
                .map(|s| now_millis.saturating_sub(s.last_activity_millis) > idle_millis)
                .unwrap_or(false);
            if expired {
                self.remove(id);
                removed += 1;
            }
        }
        removed
    }

    /// Unsubscribes a client from every channel it was subscribed to, used
    /// on teardown.
    pub fn unsubscribe_all(&self, id: ClientId) {
        self.with_session_mut(id, |s| s.subscriptions.clear());
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared handle to the registry, cloned into each connection task.
pub type SharedClientRegistry = Arc<ClientRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_remove() {
        let registry = ClientRegistry::new(16);
        let (id, _handles) = registry.register(0);
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
        registry.remove(id);
        assert!(!registry.contains(id));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn push_to_delivers_and_reports_unknown() {
        let registry = ClientRegistry::new(16);
        let (a, _handles_a) = registry.register(0);
        assert!(registry.push_to(a, Bytes::from_static(b"hello")));
        assert!(!registry.push_to(999, Bytes::from_static(b"hello")));
    }

    #[test]
    fn remove_long_not_used_evicts_idle_only() {
        let registry = ClientRegistry::new(16);
        let (fresh, _h1) = registry.register(1000);
        let (stale, _h2) = registry.register(0);
        let removed = registry.remove_long_not_used(10, 10, 500, 1000);
        assert_eq!(removed, 1);
        assert!(registry.contains(fresh));
        assert!(!registry.contains(stale));
    }
}
