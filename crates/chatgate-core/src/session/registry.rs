//! Concurrent registry of sessions keyed by id.
//!
//! Every entry is a [`SessionSlot`] stamped with a generation number taken
//! from a registry-wide counter. A slot starts `Pending` (reserved, connection
//! not yet bound) and becomes `Live` once a connection is published into it.
//! Conditional operations (`finalize`, `replace_if_current`,
//! `remove_if_current`) compare generations, so work started for a slot that
//! was since removed or replaced can never write into its successor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use chatgate_types::session::{SessionState, SessionStatus};

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A live connection bound to a session id.
pub struct SessionHandle<T> {
    id: String,
    generation: u64,
    connection: T,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    reconnect_attempt: u32,
    connected_at: DateTime<Utc>,
}

impl<T> SessionHandle<T> {
    pub fn new(id: impl Into<String>, generation: u64, connection: T, reconnect_attempt: u32) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            id: id.into(),
            generation,
            connection,
            state,
            cancel: CancellationToken::new(),
            reconnect_attempt,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection(&self) -> &T {
        &self.connection
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions of this connection.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Consecutive failed reconnects that preceded this connection.
    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Ask the supervisor to close this connection and stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

impl<T> std::fmt::Debug for SessionHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SessionSlot
// ---------------------------------------------------------------------------

enum SlotState<T> {
    Pending,
    Live(Arc<SessionHandle<T>>),
    /// Removed before a connection was bound.
    Abandoned,
}

/// One generation of a registry entry.
pub struct SessionSlot<T> {
    generation: u64,
    state: watch::Sender<SlotState<T>>,
}

impl<T> SessionSlot<T> {
    fn new(generation: u64) -> Self {
        let (state, _) = watch::channel(SlotState::Pending);
        Self { generation, state }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The bound connection, if any.
    pub fn live(&self) -> Option<Arc<SessionHandle<T>>> {
        match &*self.state.borrow() {
            SlotState::Live(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    fn publish(&self, handle: Arc<SessionHandle<T>>) {
        self.state.send_replace(SlotState::Live(handle));
    }

    /// Wait until the slot is bound or abandoned. `None` if abandoned.
    pub async fn wait_ready(&self) -> Option<Arc<SessionHandle<T>>> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| !matches!(state, SlotState::Pending))
            .await
            .ok()?;
        match &*state {
            SlotState::Live(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Shut the slot down after it left the registry: a bound connection is
    /// cancelled, a pending one is marked abandoned and its waiters released.
    pub fn retire(&self) {
        self.state.send_modify(|state| {
            if let SlotState::Live(handle) = state {
                handle.cancel();
            } else {
                *state = SlotState::Abandoned;
            }
        });
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Outcome of [`SessionRegistry::reserve`].
pub enum Reservation<T> {
    /// A new pending slot was inserted for the caller to fill.
    Reserved(Arc<SessionSlot<T>>),
    /// The id was already taken by this slot.
    Existing(Arc<SessionSlot<T>>),
}

pub struct SessionRegistry<T> {
    entries: DashMap<String, Arc<SessionSlot<T>>>,
    next_generation: AtomicU64,
    /// Set once by `drain`; entries missing afterwards were not deleted.
    drained: AtomicBool,
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            next_generation: AtomicU64::new(1),
            drained: AtomicBool::new(false),
        }
    }
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_slot(&self) -> Arc<SessionSlot<T>> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        Arc::new(SessionSlot::new(generation))
    }

    /// Whether the id has an entry, reserved or live.
    pub fn exists(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Whether `id` is absent because it was removed, as opposed to the
    /// whole registry having been drained at shutdown.
    pub fn is_deleted(&self, id: &str) -> bool {
        !self.drained.load(Ordering::SeqCst) && !self.exists(id)
    }

    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle<T>>> {
        self.entries.get(id).and_then(|slot| slot.live())
    }

    pub fn slot(&self, id: &str) -> Option<Arc<SessionSlot<T>>> {
        self.entries.get(id).map(|slot| Arc::clone(&slot))
    }

    pub fn status(&self, id: &str) -> Option<SessionStatus> {
        let slot = self.slot(id)?;
        Some(match slot.live() {
            Some(handle) => handle.state().into(),
            None => SessionStatus::Reconnecting,
        })
    }

    /// Ids of all entries, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Atomically claim `id`, or return the slot that already holds it.
    pub fn reserve(&self, id: &str) -> Reservation<T> {
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(entry) => Reservation::Existing(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let slot = self.new_slot();
                entry.insert(Arc::clone(&slot));
                Reservation::Reserved(slot)
            }
        }
    }

    pub fn is_current(&self, id: &str, generation: u64) -> bool {
        self.entries
            .get(id)
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Bind `handle` to the entry if it still holds `generation`.
    ///
    /// The check and the publish happen under the entry's lock, so a
    /// concurrent removal either wins (and this returns `false`) or sees the
    /// live handle and cancels it.
    pub fn finalize(&self, id: &str, generation: u64, handle: Arc<SessionHandle<T>>) -> bool {
        match self.entries.get(id) {
            Some(slot) if slot.generation == generation => {
                slot.publish(handle);
                true
            }
            _ => false,
        }
    }

    /// Swap the entry holding `generation` for a fresh pending slot.
    pub fn replace_if_current(&self, id: &str, generation: u64) -> Option<Arc<SessionSlot<T>>> {
        let mut entry = self.entries.get_mut(id)?;
        if entry.generation != generation {
            return None;
        }
        let slot = self.new_slot();
        *entry = Arc::clone(&slot);
        Some(slot)
    }

    /// Remove the entry unconditionally. The caller retires the returned slot.
    pub fn remove(&self, id: &str) -> Option<Arc<SessionSlot<T>>> {
        self.entries.remove(id).map(|(_, slot)| slot)
    }

    pub fn remove_if_current(&self, id: &str, generation: u64) -> Option<Arc<SessionSlot<T>>> {
        self.entries
            .remove_if(id, |_, slot| slot.generation == generation)
            .map(|(_, slot)| slot)
    }

    /// Remove every entry. Entries gone after this are never treated as deleted.
    pub fn drain(&self) -> Vec<(String, Arc<SessionSlot<T>>)> {
        self.drained.store(true, Ordering::SeqCst);
        self.ids()
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect()
    }
}
