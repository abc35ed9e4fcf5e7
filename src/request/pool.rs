/*!
 * Request Pool
 * Bounded arena of send requests with generation-checked handles
 */

use super::request::Request;
use super::types::RequestHandle;
use crate::core::errors::{AmError, AmResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

enum Entry {
    Free,
    /// Parked between steps
    Stored(Box<Request>),
    /// Owned by a caller that is stepping it
    CheckedOut,
}

struct Slot {
    generation: u32,
    entry: Entry,
}

struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// Request arena
///
/// Slots are created on demand up to `capacity` and recycled through a free
/// list. A request is checked out while a thread steps it, so the pool lock
/// is never held across a transport call or a user callback.
pub struct RequestPool {
    inner: Mutex<Slots>,
    capacity: usize,
    in_use: AtomicUsize,
}

impl RequestPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
            }),
            capacity,
            in_use: AtomicUsize::new(0),
        }
    }

    /// Take a fresh request; `NoMemory` once `capacity` are in use
    pub fn get(&self) -> AmResult<RequestHandle> {
        let mut inner = self.inner.lock();
        let index = match inner.free.pop() {
            Some(index) => index,
            None if inner.slots.len() < self.capacity => {
                let index = u32::try_from(inner.slots.len())
                    .map_err(|_| AmError::NoMemory("request pool index overflow".into()))?;
                inner.slots.push(Slot {
                    generation: 0,
                    entry: Entry::Free,
                });
                index
            }
            None => {
                warn!(capacity = self.capacity, "Request pool exhausted");
                return Err(AmError::NoMemory(format!(
                    "all {} requests in use",
                    self.capacity
                )));
            }
        };

        let slot = &mut inner.slots[index as usize];
        let handle = RequestHandle {
            index,
            generation: slot.generation,
        };
        slot.entry = Entry::Stored(Box::new(Request::new(handle)));
        self.in_use.fetch_add(1, Ordering::Relaxed);
        trace!(req = %handle, "Request allocated");
        Ok(handle)
    }

    /// Take a parked request out for stepping
    ///
    /// `None` if the handle is stale or another thread has it.
    pub fn checkout(&self, handle: RequestHandle) -> Option<Box<Request>> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        match std::mem::replace(&mut slot.entry, Entry::CheckedOut) {
            Entry::Stored(req) => Some(req),
            other => {
                slot.entry = other;
                None
            }
        }
    }

    /// Park a request after stepping
    pub fn checkin(&self, req: Box<Request>) {
        let handle = req.handle();
        let mut inner = self.inner.lock();
        match inner.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => {
                slot.entry = Entry::Stored(req);
            }
            _ => warn!(req = %handle, "Check-in of unknown request ignored"),
        }
    }

    /// Return a request's slot to the pool and retire its handle
    pub fn release(&self, req: Box<Request>) {
        self.release_handle(req.handle());
    }

    pub(crate) fn release_handle(&self, handle: RequestHandle) {
        let mut inner = self.inner.lock();
        let released = match inner.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => {
                slot.generation = slot.generation.wrapping_add(1);
                slot.entry = Entry::Free;
                true
            }
            _ => false,
        };

        if released {
            inner.free.push(handle.index);
            self.in_use.fetch_sub(1, Ordering::Relaxed);
            trace!(req = %handle, "Request released");
        } else {
            warn!(req = %handle, "Release of stale request ignored");
        }
    }

    /// Whether `handle` still names an unreleased request
    pub fn is_live(&self, handle: RequestHandle) -> bool {
        let inner = self.inner.lock();
        inner
            .slots
            .get(handle.index as usize)
            .map_or(false, |slot| {
                slot.generation == handle.generation && !matches!(slot.entry, Entry::Free)
            })
    }

    /// Requests currently allocated
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
