//! Bounded, thread-safe FIFO queue with unique element keys
//!
//! Elements carry an identity through the [`Keyed`] trait. A second push
//! with a key already in the queue is either rejected or replaces the old
//! element at the tail, depending on the repeat policy. All operations are
//! O(1) except the blocking [`UniqueQueue::pop`].

use std::hash::Hash;

use hashlink::LinkedHashMap;
use parking_lot::{Condvar, Mutex};

use crate::error::{CallCenterError, CallCenterResult};

/// Identity extraction for queue elements
pub trait Keyed {
    type Key: Hash + Eq + Clone;

    fn key(&self) -> Self::Key;
}

/// Outcome of a push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended at the tail
    Inserted,
    /// Replaced an element with the same key; the new element took the tail
    Reassigned,
    /// Queue was at capacity
    Overload,
    /// Key already queued and the repeat policy rejects duplicates
    AlreadyInQueue,
}

struct Inner<T: Keyed> {
    // Insertion-ordered map doubles as FIFO order and key index.
    items: LinkedHashMap<T::Key, T>,
    max_size: usize,
    reject_repeated: bool,
}

/// Bounded deduplicating FIFO
///
/// One mutex guards the order, the key index, and the repeat policy; a
/// condition variable wakes poppers blocked on an empty queue.
pub struct UniqueQueue<T: Keyed> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T: Keyed> UniqueQueue<T> {
    /// New queue rejecting repeated keys by default
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: LinkedHashMap::new(),
                max_size,
                reject_repeated: true,
            }),
            ready: Condvar::new(),
        }
    }

    /// Admit an element, waking one blocked popper on success
    pub fn push(&self, item: T) -> PushOutcome {
        let mut inner = self.inner.lock();
        if inner.items.len() >= inner.max_size {
            return PushOutcome::Overload;
        }
        let key = item.key();
        let mut reassigned = false;
        if inner.items.contains_key(&key) {
            if inner.reject_repeated {
                return PushOutcome::AlreadyInQueue;
            }
            inner.items.remove(&key);
            reassigned = true;
        }
        inner.items.insert(key, item);
        self.ready.notify_one();
        if reassigned {
            PushOutcome::Reassigned
        } else {
            PushOutcome::Inserted
        }
    }

    /// Blocking pop of the head element
    pub fn pop(&self) -> T {
        let mut inner = self.inner.lock();
        loop {
            if let Some((_, item)) = inner.items.pop_front() {
                return item;
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Non-blocking pop; `None` when empty
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().items.pop_front().map(|(_, item)| item)
    }

    /// Head element by clone, without removing it
    pub fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.lock().items.front().map(|(_, item)| item.clone())
    }

    /// Remove the element with the given key, if queued
    pub fn erase(&self, key: &T::Key) -> bool {
        self.inner.lock().items.remove(key).is_some()
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.inner.lock().items.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Change the capacity bound
    ///
    /// Shrinking below the live size drops nothing: pushes keep failing with
    /// [`PushOutcome::Overload`] until the queue drains under the new bound.
    pub fn set_max_size(&self, max_size: usize) -> CallCenterResult<()> {
        if max_size < 1 {
            return Err(CallCenterError::InvalidParam(format!(
                "maxQueueSize: {max_size}"
            )));
        }
        self.inner.lock().max_size = max_size;
        Ok(())
    }

    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }

    pub fn set_reject_repeated(&self, reject_repeated: bool) {
        self.inner.lock().reject_repeated = reject_repeated;
    }

    pub fn reject_repeated(&self) -> bool {
        self.inner.lock().reject_repeated
    }
}
