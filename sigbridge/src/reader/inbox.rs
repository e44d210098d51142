use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Queue of decoded units shared by a reader thread and its logical handlers.
///
/// The reader pushes a unit and only then signals, so a handler woken by a
/// signal always finds at least that unit here. Once the reader stops, the
/// inbox is closed; units pushed before that stay available.
#[derive(Debug)]
pub struct Inbox<T> {
    inner: Arc<Shared<T>>,
}

#[derive(Debug)]
struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    closed: AtomicBool,
}

impl<T> Inbox<T> {
    /// Creates an empty, open inbox.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Appends a decoded unit.
    pub fn push(&self, item: T) {
        self.queue().push_back(item);
    }

    /// Takes the oldest unit, if any.
    pub fn pop(&self) -> Option<T> {
        self.queue().pop_front()
    }

    /// Takes every pending unit, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.queue().drain(..).collect()
    }

    /// Number of pending units.
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    /// Returns `true` if no unit is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the end of the stream.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once the reader has stopped producing.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// A poisoned lock only means a handler panicked mid-drain; the queue
    /// itself is still consistent.
    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Inbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Inbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
