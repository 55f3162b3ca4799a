//! Pool of reusable, lockable resource handles.
//!
//! Each handle remembers the key it last served. `acquire(key)`:
//!
//! 1. If a handle is bound to `key`, wait for it. Two callers with the same
//!    key never hold handles at the same time.
//! 2. Otherwise take any idle handle and rebind it to `key`.
//! 3. Otherwise append a new handle and build its resource.
//!
//! The pool only grows. Releasing a handle leaves its key binding in place;
//! the binding is a hint that the next `acquire` re-checks.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use sf_core::LoadMetrics;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

type Factory<R> = Box<dyn Fn() -> StoreResult<R> + Send + Sync>;

struct Slot<R, K> {
    key: Option<K>,
    leased: bool,
    /// `None` while leased, or when construction failed.
    resource: Option<R>,
}

struct PoolState<R, K> {
    slots: Vec<Slot<R, K>>,
    closed: bool,
}

/// A growing pool of physical resources keyed by the entity they last served.
pub struct ResourceHandlePool<R, K> {
    factory: Factory<R>,
    state: Mutex<PoolState<R, K>>,
    freed: Condvar,
    acquire_timeout: Option<Duration>,
    metrics: Arc<LoadMetrics>,
}

/// An exclusively held resource. Dropping it returns the resource to the pool.
pub struct PooledHandle<'a, R, K> {
    pool: &'a ResourceHandlePool<R, K>,
    index: usize,
    key: K,
    /// Taken exactly once, in `drop`.
    resource: ManuallyDrop<R>,
}

impl<R, K> ResourceHandlePool<R, K>
where
    R: Send,
    K: Eq + Clone + std::fmt::Debug,
{
    pub fn new(
        factory: impl Fn() -> StoreResult<R> + Send + Sync + 'static,
        metrics: Arc<LoadMetrics>,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            state: Mutex::new(PoolState {
                slots: Vec::new(),
                closed: false,
            }),
            freed: Condvar::new(),
            acquire_timeout: None,
            metrics,
        }
    }

    /// Bound every wait inside `acquire`.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Take a handle bound to `key`, blocking while another caller holds it.
    pub fn acquire(&self, key: K) -> StoreResult<PooledHandle<'_, R, K>> {
        let started = Instant::now();
        let mut state = self.lock_state()?;
        loop {
            if state.closed {
                return Err(StoreError::PoolClosed);
            }

            if let Some(i) = state
                .slots
                .iter()
                .position(|s| s.key.as_ref() == Some(&key))
            {
                if !state.slots[i].leased {
                    return self.lease(state, i, key);
                }
                state = self.wait(state, started)?;
                continue;
            }

            if let Some(i) = state.slots.iter().position(|s| !s.leased) {
                state.slots[i].key = Some(key.clone());
                return self.lease(state, i, key);
            }

            state.slots.push(Slot {
                key: Some(key.clone()),
                leased: false,
                resource: None,
            });
            let i = state.slots.len() - 1;
            return self.lease(state, i, key);
        }
    }

    /// Return a handle. Equivalent to dropping it.
    pub fn release(&self, handle: PooledHandle<'_, R, K>) {
        drop(handle);
    }

    /// Number of handles ever created, including vacant ones.
    pub fn handle_count(&self) -> usize {
        self.state.lock().map(|s| s.slots.len()).unwrap_or(0)
    }

    /// Whether some handle is currently bound to `key`.
    pub fn is_bound(&self, key: &K) -> bool {
        self.state
            .lock()
            .map(|s| s.slots.iter().any(|slot| slot.key.as_ref() == Some(key)))
            .unwrap_or(false)
    }

    /// Drop every idle resource and refuse further acquires.
    ///
    /// Leased resources are dropped when their handles come back.
    /// Returns the number of resources dropped now.
    pub fn close(&self) -> StoreResult<usize> {
        let mut state = self.lock_state()?;
        state.closed = true;
        let dropped = state
            .slots
            .iter_mut()
            .filter_map(|s| s.resource.take())
            .count();
        self.freed.notify_all();
        debug!(dropped, "resource pool closed");
        Ok(dropped)
    }

    fn lock_state(&self) -> StoreResult<MutexGuard<'_, PoolState<R, K>>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn wait<'g>(
        &self,
        state: MutexGuard<'g, PoolState<R, K>>,
        started: Instant,
    ) -> StoreResult<MutexGuard<'g, PoolState<R, K>>> {
        match self.acquire_timeout {
            None => self
                .freed
                .wait(state)
                .map_err(|e| StoreError::Poisoned(e.to_string())),
            Some(limit) => {
                let remaining = limit.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(StoreError::Timeout {
                        what: "resource handle",
                        waited_ms: limit.as_millis() as u64,
                    });
                }
                let (state, _) = self
                    .freed
                    .wait_timeout(state, remaining)
                    .map_err(|e| StoreError::Poisoned(e.to_string()))?;
                Ok(state)
            }
        }
    }

    /// Mark slot `i` leased and hand out its resource, building it if absent.
    ///
    /// The resource is built after the bookkeeping lock is dropped.
    fn lease(
        &self,
        mut state: MutexGuard<'_, PoolState<R, K>>,
        i: usize,
        key: K,
    ) -> StoreResult<PooledHandle<'_, R, K>> {
        let slot = &mut state.slots[i];
        slot.leased = true;
        let existing = slot.resource.take();
        let slot_count = state.slots.len();
        drop(state);

        let resource = match existing {
            Some(r) => r,
            None => match (self.factory)() {
                Ok(r) => {
                    self.metrics.record_handle_created();
                    debug!(index = i, slots = slot_count, ?key, "created resource handle");
                    r
                }
                Err(err) => {
                    let mut state = self.lock_state()?;
                    let slot = &mut state.slots[i];
                    slot.leased = false;
                    slot.key = None;
                    self.freed.notify_all();
                    return Err(match err {
                        e @ StoreError::ResourceCreation { .. } => e,
                        other => StoreError::ResourceCreation {
                            what: "pooled resource".to_string(),
                            message: other.to_string(),
                        },
                    });
                }
            },
        };

        Ok(PooledHandle {
            pool: self,
            index: i,
            key,
            resource: ManuallyDrop::new(resource),
        })
    }
}

impl<R, K> PooledHandle<'_, R, K> {
    /// The key this handle is bound to while held.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Position of the handle within the pool.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<R, K> Deref for PooledHandle<'_, R, K> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<R, K> DerefMut for PooledHandle<'_, R, K> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}

impl<R, K> Drop for PooledHandle<'_, R, K> {
    fn drop(&mut self) {
        // SAFETY: `resource` is never touched again after this point.
        let resource = unsafe { ManuallyDrop::take(&mut self.resource) };
        self.pool.give_back(self.index, resource);
    }
}

impl<R, K> ResourceHandlePool<R, K> {
    fn give_back(&self, index: usize, resource: R) {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        let closed = state.closed;
        if let Some(slot) = state.slots.get_mut(index) {
            slot.leased = false;
            if !closed {
                slot.resource = Some(resource);
            }
        }
        self.freed.notify_all();
    }
}
