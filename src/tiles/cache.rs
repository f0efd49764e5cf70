//! Tile cache with request tracking and change notifications
//!
//! The cache is the single shared mutable resource between the viewport
//! resolver (lookups and new requests) and the fetch tasks (completions).
//! All state sits behind one mutex, so membership changes and pending-state
//! transitions are serialized.
//!
//! Requests move through `Queued -> InFlight -> (removed)`. At most
//! `max_in_flight` fetches run at once; the rest wait in FIFO order, which
//! preserves the issuance order chosen by the caller. Only queued requests
//! can be cancelled. A fetch that already started always runs to completion
//! and its tile is accepted even if nobody asked for it anymore.
//!
//! Each handle carries a request scope. Cancellation only withdraws the
//! calling scope's interest, and a request is dropped once no scope wants it.
//! Clones share their scope; [`TileCache::scoped`] opens a new one.

use crate::core::constants::DEFAULT_MAX_IN_FLIGHT;
use crate::core::geo::{TileAddress, TileKey};
use crate::prelude::{Arc, Condvar, HashMap, Mutex, VecDeque};
use crate::runtime::{AsyncSpawner, GlobalSpawner};
use std::sync::atomic::{AtomicU64, Ordering};
use crate::tiles::provider::FetchOperation;
use crate::{MapError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::FutureExt;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{MutexGuard, PoisonError};

#[cfg(feature = "debug")]
use log;

/// Opaque tile artifact as delivered by the fetcher
pub type TileData = Arc<Vec<u8>>;

/// Cache membership change, delivered to every subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileEvent {
    Added(TileKey),
    Removed(TileKey),
}

impl TileEvent {
    pub fn key(&self) -> TileKey {
        match self {
            Self::Added(key) | Self::Removed(key) => *key,
        }
    }
}

/// Lifecycle of a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Registered, waiting for a fetch slot
    Queued,
    /// Fetch is running
    InFlight,
    /// Fetch is running but the request was cancelled; the result is still kept
    Cancelled,
}

/// Result of [`TileCache::request_fetch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new request was registered
    Scheduled,
    /// A request for the same tile is already queued or running
    AlreadyPending,
    /// The tile is already cached; nothing to do
    AlreadyCached,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub failed: u64,
}

/// Receiving end of a cache subscription.
///
/// Dropping the subscription is enough to stop receiving events; the cache
/// prunes disconnected subscribers on the next event.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Receiver<TileEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn receiver(&self) -> &Receiver<TileEvent> {
        &self.receiver
    }

    /// All events received so far, without blocking.
    pub fn drain(&self) -> Vec<TileEvent> {
        self.receiver.try_iter().collect()
    }
}

struct Pending {
    status: RequestStatus,
    scopes: Vec<u64>,
}

impl Pending {
    /// Withdraw `scope`; returns true when nobody wants the request anymore.
    fn release(&mut self, scope: u64) -> bool {
        self.scopes.retain(|s| *s != scope);
        self.scopes.is_empty()
    }
}

struct CacheState {
    tiles: LruCache<TileKey, TileData>,
    capacity: Option<NonZeroUsize>,
    pending: HashMap<TileKey, Pending>,
    queue: VecDeque<(TileKey, FetchOperation)>,
    in_flight: usize,
    max_in_flight: usize,
    subscribers: Vec<(u64, Sender<TileEvent>)>,
    next_subscriber: u64,
    completed: u64,
    failed: u64,
}

impl CacheState {
    fn emit(&mut self, event: TileEvent) {
        self.subscribers.retain(|(_id, tx)| {
            let alive = tx.send(event).is_ok();
            #[cfg(feature = "debug")]
            if !alive {
                log::warn!("dropping disconnected tile cache subscriber {}", _id);
            }
            alive
        });
    }

    fn store(&mut self, key: TileKey, data: TileData) {
        if let Some(capacity) = self.capacity {
            if !self.tiles.contains(&key) && self.tiles.len() >= capacity.get() {
                if let Some(evicted) = self.tiles.peek_lru().map(|(k, _)| *k) {
                    self.emit(TileEvent::Removed(evicted));
                    self.tiles.pop(&evicted);
                }
            }
        }
        self.tiles.put(key, data);
        self.emit(TileEvent::Added(key));
    }

    /// Move queued requests into free fetch slots.
    fn dispatch(&mut self) -> Vec<(TileKey, FetchOperation)> {
        let mut started = Vec::new();
        while self.in_flight < self.max_in_flight {
            let Some((key, operation)) = self.queue.pop_front() else {
                break;
            };
            if let Some(pending) = self.pending.get_mut(&key) {
                pending.status = RequestStatus::InFlight;
            }
            self.in_flight += 1;
            started.push((key, operation));
        }
        started
    }

    /// Withdraw `scope` from queued requests, dropping those left unwanted.
    fn drop_queued(&mut self, scope: u64) -> usize {
        let before = self.queue.len();
        let pending = &mut self.pending;
        self.queue.retain(|(key, _operation)| {
            let unwanted = pending.get_mut(key).map_or(true, |p| p.release(scope));
            if unwanted {
                pending.remove(key);
            }
            !unwanted
        });
        before - self.queue.len()
    }
}

struct Shared {
    state: Mutex<CacheState>,
    drained: Condvar,
    spawner: Arc<dyn AsyncSpawner>,
    next_scope: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tile store populated by asynchronous fetches
///
/// Cloning is cheap and yields a handle to the same cache, in the same
/// request scope.
#[derive(Clone)]
pub struct TileCache {
    shared: Arc<Shared>,
    scope: u64,
}

impl TileCache {
    /// Unbounded cache running at most `max_in_flight` fetches at once
    pub fn new(max_in_flight: usize) -> Self {
        Self::with_options(max_in_flight, None, Arc::new(GlobalSpawner))
    }

    /// Cache that evicts least-recently used tiles beyond `capacity`
    pub fn with_capacity(max_in_flight: usize, capacity: usize) -> Self {
        Self::with_options(max_in_flight, Some(capacity), Arc::new(GlobalSpawner))
    }

    /// Fully specified cache. A zero `max_in_flight` is raised to one and a
    /// zero capacity means unbounded.
    pub fn with_options(
        max_in_flight: usize,
        capacity: Option<usize>,
        spawner: Arc<dyn AsyncSpawner>,
    ) -> Self {
        let state = CacheState {
            tiles: LruCache::unbounded(),
            capacity: capacity.and_then(NonZeroUsize::new),
            pending: HashMap::default(),
            queue: VecDeque::new(),
            in_flight: 0,
            max_in_flight: max_in_flight.max(1),
            subscribers: Vec::new(),
            next_subscriber: 0,
            completed: 0,
            failed: 0,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                drained: Condvar::new(),
                spawner,
                next_scope: AtomicU64::new(1),
            }),
            scope: 0,
        }
    }

    /// Handle to the same cache with a fresh request scope.
    ///
    /// Cancelling through the returned handle leaves requests made through
    /// other handles alone, unless they asked for the same tile and have
    /// since withdrawn too.
    pub fn scoped(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            scope: self.shared.next_scope.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn scope(&self) -> u64 {
        self.scope
    }

    /// Cached artifact for the tile containing `address`, if any.
    pub fn lookup(&self, address: impl Into<TileAddress>) -> Option<TileData> {
        let key = address.into().key();
        self.shared.lock().tiles.get(&key).cloned()
    }

    /// Whether the tile is cached, without touching its recency.
    pub fn contains(&self, address: impl Into<TileAddress>) -> bool {
        let key = address.into().key();
        self.shared.lock().tiles.contains(&key)
    }

    /// Whether a request for the tile is queued or running.
    pub fn is_pending(&self, address: impl Into<TileAddress>) -> bool {
        let key = address.into().key();
        self.shared.lock().pending.contains_key(&key)
    }

    pub fn request_status(&self, address: impl Into<TileAddress>) -> Option<RequestStatus> {
        let key = address.into().key();
        self.shared.lock().pending.get(&key).map(|p| p.status)
    }

    /// Register a fetch for the tile containing `address`.
    ///
    /// Idempotent: a tile that is cached or already pending is left alone and
    /// `operation` is dropped without being polled, so at most one fetch per
    /// tile is ever outstanding. Asking for a pending tile still records this
    /// handle's interest, which revives a cancelled running fetch.
    pub fn request_fetch(
        &self,
        address: impl Into<TileAddress>,
        operation: FetchOperation,
    ) -> RequestOutcome {
        let key = address.into().key();
        let started = {
            let mut state = self.shared.lock();
            if state.tiles.contains(&key) {
                return RequestOutcome::AlreadyCached;
            }
            if let Some(pending) = state.pending.get_mut(&key) {
                if !pending.scopes.contains(&self.scope) {
                    pending.scopes.push(self.scope);
                }
                if pending.status == RequestStatus::Cancelled {
                    pending.status = RequestStatus::InFlight;
                }
                return RequestOutcome::AlreadyPending;
            }
            state.pending.insert(
                key,
                Pending {
                    status: RequestStatus::Queued,
                    scopes: vec![self.scope],
                },
            );
            state.queue.push_back((key, operation));
            state.dispatch()
        };

        #[cfg(feature = "debug")]
        log::trace!("tile {} scheduled", key);

        self.start(started);
        RequestOutcome::Scheduled
    }

    /// Drop every request of this scope that has not started yet. Running
    /// fetches are unaffected. Returns the number of requests dropped.
    pub fn cancel_queued(&self) -> usize {
        let dropped = self.shared.lock().drop_queued(self.scope);

        #[cfg(feature = "debug")]
        if dropped > 0 {
            log::debug!("cancelled {} queued tile requests", dropped);
        }

        dropped
    }

    /// Drop this scope's queued requests and mark its running ones as
    /// cancelled once no other scope wants them.
    ///
    /// Running fetches still complete and their tiles are still stored; use
    /// [`TileCache::join_all`] to wait for them.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.shared.lock();
        let dropped = state.drop_queued(self.scope);
        for pending in state.pending.values_mut() {
            if pending.status == RequestStatus::InFlight && pending.release(self.scope) {
                pending.status = RequestStatus::Cancelled;
            }
        }

        #[cfg(feature = "debug")]
        log::debug!(
            "cancelled all tile requests ({} queued, {} in flight)",
            dropped,
            state.in_flight
        );

        dropped
    }

    /// Block until no fetch is running and nothing is queued, in any scope.
    /// Meant for teardown; never call it from a task that a pending fetch
    /// needs in order to make progress.
    pub fn join_all(&self) {
        let state = self.shared.lock();
        let _state = self
            .shared
            .drained
            .wait_while(state, |s| s.in_flight > 0 || !s.queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Store a tile directly, as if a fetch had just completed.
    pub fn insert(&self, address: impl Into<TileAddress>, data: Vec<u8>) {
        self.put(address, Arc::new(data));
    }

    pub fn put(&self, address: impl Into<TileAddress>, data: TileData) {
        let key = address.into().key();
        self.shared.lock().store(key, data);
    }

    /// Remove a tile, announcing the removal before the entry is erased.
    pub fn remove(&self, address: impl Into<TileAddress>) -> Option<TileData> {
        let key = address.into().key();
        let mut state = self.shared.lock();
        if !state.tiles.contains(&key) {
            return None;
        }
        state.emit(TileEvent::Removed(key));
        state.tiles.pop(&key)
    }

    /// Remove every tile, announcing each removal.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        let keys: Vec<TileKey> = state.tiles.iter().map(|(k, _)| *k).collect();
        for key in keys {
            state.emit(TileEvent::Removed(key));
            state.tiles.pop(&key);
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = unbounded();
        let mut state = self.shared.lock();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.push((id, tx));
        Subscription { id, receiver: rx }
    }

    /// Returns `false` if no subscriber with this id exists.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut state = self.shared.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        state.subscribers.len() != before
    }

    /// Get the current number of cached tiles
    pub fn len(&self) -> usize {
        self.shared.lock().tiles.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.shared.lock().capacity.map(NonZeroUsize::get)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock();
        CacheStats {
            cached: state.tiles.len(),
            queued: state.queue.len(),
            in_flight: state.in_flight,
            completed: state.completed,
            failed: state.failed,
        }
    }

    fn start(&self, started: Vec<(TileKey, FetchOperation)>) {
        for (key, operation) in started {
            let shared = self.shared.clone();
            let scope = self.scope;
            // Fire and forget: completion reports back through `finish`.
            let _handle = self.shared.spawner.spawn_boxed(Box::pin(async move {
                let result = match AssertUnwindSafe(operation).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(MapError::Fetch {
                        key,
                        reason: "fetch task panicked".to_string(),
                    }),
                };
                TileCache { shared, scope }.finish(key, result);
            }));
        }
    }

    fn finish(&self, key: TileKey, result: Result<Vec<u8>>) {
        let started = {
            let mut state = self.shared.lock();
            state.pending.remove(&key);
            state.in_flight = state.in_flight.saturating_sub(1);

            match result {
                Ok(data) => {
                    state.completed += 1;
                    state.store(key, Arc::new(data));
                }
                Err(_err) => {
                    state.failed += 1;
                    #[cfg(feature = "debug")]
                    log::debug!("tile {} fetch failed: {}", key, _err);
                }
            }

            let started = state.dispatch();
            if state.in_flight == 0 && state.queue.is_empty() {
                self.shared.drained.notify_all();
            }
            started
        };
        self.start(started);
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::spawners::ThreadSpawner;
    use futures::channel::oneshot;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cache(max_in_flight: usize) -> TileCache {
        TileCache::with_options(max_in_flight, None, Arc::new(ThreadSpawner))
    }

    /// Fetch that completes when the returned sender fires.
    fn gated() -> (oneshot::Sender<Result<Vec<u8>>>, FetchOperation) {
        let (tx, rx) = oneshot::channel();
        let operation: FetchOperation = Box::pin(async move {
            rx.await.unwrap_or_else(|_| {
                Err(MapError::Fetch {
                    key: TileKey::new(0, 0, 0),
                    reason: "gate dropped".to_string(),
                })
            })
        });
        (tx, operation)
    }

    fn ready(data: Vec<u8>) -> FetchOperation {
        Box::pin(async move { Ok::<_, MapError>(data) })
    }

    async fn explode() -> Result<Vec<u8>> {
        panic!("transport exploded")
    }

    fn wait_for(subscription: &Subscription, expected: TileEvent) -> bool {
        while let Ok(event) = subscription.receiver().recv_timeout(Duration::from_secs(2)) {
            if event == expected {
                return true;
            }
        }
        false
    }

    #[test]
    fn test_tile_cache_basic_operations() {
        let cache = cache(1);
        let key1 = TileKey::new(3, 1, 2);
        let key2 = TileKey::new(6, 4, 5);

        // Initially empty
        assert!(cache.is_empty());
        assert!(cache.lookup(key1).is_none());

        cache.insert(key1, vec![1, 2, 3]);
        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.lookup(key1).unwrap(), vec![1, 2, 3]);

        // Fractional addresses resolve to their containing tile.
        assert!(cache.lookup(TileAddress::new(2.9, 1.4, 3.0)).is_some());

        cache.insert(key2, vec![4, 5, 6]);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_request_is_idempotent() {
        let cache = cache(4);
        let key = TileKey::new(2, 1, 1);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut gates = Vec::new();
        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let calls = calls.clone();
            let (tx, operation) = gated();
            gates.push(tx);
            let counted: FetchOperation = Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                operation.await
            });
            outcomes.push(cache.request_fetch(key, counted));
        }

        assert_eq!(outcomes, vec![RequestOutcome::Scheduled, RequestOutcome::AlreadyPending]);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_pending(key));
    }

    #[test]
    fn test_cached_tile_is_not_requested() {
        let cache = cache(1);
        let key = TileKey::new(1, 0, 1);
        cache.insert(key, vec![9]);
        assert_eq!(cache.request_fetch(key, ready(vec![1])), RequestOutcome::AlreadyCached);
        assert!(!cache.is_pending(key));
    }

    #[test]
    fn test_successful_fetch_emits_added() {
        let cache = cache(2);
        let subscription = cache.subscribe();
        let key = TileKey::new(4, 3, 2);

        cache.request_fetch(key, ready(vec![7, 7]));
        assert!(wait_for(&subscription, TileEvent::Added(key)));
        assert_eq!(*cache.lookup(key).unwrap(), vec![7, 7]);
        assert!(!cache.is_pending(key));
        assert_eq!(cache.stats().completed, 1);
    }

    #[test]
    fn test_failed_fetch_clears_pending() {
        let cache = cache(1);
        let key = TileKey::new(4, 3, 2);
        let (tx, operation) = gated();
        cache.request_fetch(key, operation);
        tx.send(Err(MapError::Fetch {
            key,
            reason: "HTTP 404".to_string(),
        }))
        .unwrap();

        cache.join_all();
        assert!(!cache.is_pending(key));
        assert!(cache.lookup(key).is_none());
        assert_eq!(cache.stats().failed, 1);

        // A later request starts over.
        assert_eq!(cache.request_fetch(key, ready(vec![1])), RequestOutcome::Scheduled);
    }

    #[test]
    fn test_cancel_queued_leaves_in_flight() {
        let cache = cache(1);
        let running = TileKey::new(3, 0, 0);
        let waiting = TileKey::new(3, 1, 0);

        let (tx_running, op_running) = gated();
        let (_tx_waiting, op_waiting) = gated();
        cache.request_fetch(running, op_running);
        cache.request_fetch(waiting, op_waiting);

        assert_eq!(cache.request_status(running), Some(RequestStatus::InFlight));
        assert_eq!(cache.request_status(waiting), Some(RequestStatus::Queued));

        assert_eq!(cache.cancel_queued(), 1);
        assert!(!cache.is_pending(waiting));
        assert!(cache.is_pending(running));

        // The running fetch still lands.
        let subscription = cache.subscribe();
        tx_running.send(Ok(vec![1])).unwrap();
        assert!(wait_for(&subscription, TileEvent::Added(running)));
        assert!(cache.lookup(waiting).is_none());
    }

    #[test]
    fn test_cancel_all_then_join() {
        let cache = cache(1);
        let running = TileKey::new(5, 0, 0);
        let waiting = TileKey::new(5, 0, 1);
        let (tx, operation) = gated();
        cache.request_fetch(running, operation);
        cache.request_fetch(waiting, ready(vec![2]));

        assert_eq!(cache.cancel_all(), 1);
        assert_eq!(cache.request_status(running), Some(RequestStatus::Cancelled));
        // Cancelled-but-running still suppresses duplicates, and asking again
        // revives it.
        assert_eq!(
            cache.request_fetch(running, ready(vec![3])),
            RequestOutcome::AlreadyPending
        );
        assert_eq!(cache.request_status(running), Some(RequestStatus::InFlight));

        tx.send(Ok(vec![1])).unwrap();
        cache.join_all();
        assert_eq!(cache.stats().in_flight, 0);
        assert_eq!(*cache.lookup(running).unwrap(), vec![1]);
        assert!(cache.lookup(waiting).is_none());
    }

    #[test]
    fn test_remove_emits_before_erase() {
        let cache = cache(1);
        let key = TileKey::new(2, 2, 2);
        cache.insert(key, vec![1]);
        let subscription = cache.subscribe();

        assert!(cache.remove(key).is_some());
        assert_eq!(subscription.drain(), vec![TileEvent::Removed(key)]);
        assert!(cache.remove(key).is_none());
        assert!(subscription.drain().is_empty());
    }

    #[test]
    fn test_tile_cache_lru_eviction() {
        let cache = TileCache::with_options(1, Some(2), Arc::new(ThreadSpawner));
        let key1 = TileKey::new(1, 1, 1);
        let key2 = TileKey::new(2, 2, 2);
        let key3 = TileKey::new(3, 3, 3);
        let subscription = cache.subscribe();

        cache.insert(key1, vec![1]);
        cache.insert(key2, vec![2]);
        // Touch key1 so key2 becomes least recently used.
        assert!(cache.lookup(key1).is_some());
        cache.insert(key3, vec![3]);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(key1));
        assert!(!cache.contains(key2));
        assert_eq!(
            subscription.drain(),
            vec![
                TileEvent::Added(key1),
                TileEvent::Added(key2),
                TileEvent::Removed(key2),
                TileEvent::Added(key3),
            ]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let cache = cache(1);
        let subscription = cache.subscribe();
        assert!(cache.unsubscribe(subscription.id()));
        assert!(!cache.unsubscribe(subscription.id()));

        cache.insert(TileKey::new(0, 0, 0), vec![0]);
        assert!(subscription.drain().is_empty());
    }

    #[test]
    fn test_cancellation_is_scoped() {
        let cache = cache(1);
        let other = cache.scoped();
        assert_ne!(cache.scope(), other.scope());

        let running = TileKey::new(4, 0, 0);
        let waiting = TileKey::new(4, 1, 0);
        let (tx, operation) = gated();
        let (_held, queued) = gated();
        cache.request_fetch(running, operation);
        cache.request_fetch(waiting, queued);

        assert_eq!(other.cancel_all(), 0);
        assert_eq!(other.cancel_queued(), 0);
        assert_eq!(cache.request_status(running), Some(RequestStatus::InFlight));
        assert_eq!(cache.request_status(waiting), Some(RequestStatus::Queued));

        // A queued tile wanted by two scopes survives one of them cancelling.
        assert_eq!(other.request_fetch(waiting, ready(vec![0])), RequestOutcome::AlreadyPending);
        assert_eq!(cache.cancel_queued(), 0);
        assert!(cache.is_pending(waiting));
        assert_eq!(other.cancel_queued(), 1);
        assert!(!cache.is_pending(waiting));

        tx.send(Ok(vec![1])).unwrap();
        cache.join_all();
        assert!(cache.contains(running));
    }

    #[test]
    fn test_panicking_fetch_is_contained() {
        let cache = cache(1);
        let key = TileKey::new(1, 1, 0);
        cache.request_fetch(key, Box::pin(explode()));
        cache.join_all();
        assert!(!cache.is_pending(key));
        assert_eq!(cache.stats().failed, 1);
    }
}
