//! Bounded queue of framed lines with an explicit overflow policy.
//!
//! The transport's background reader pushes every completed line in here;
//! blocking setup/console calls pop with a timeout.  The queue is the only
//! hand-off point between the two, which makes the backpressure rule a
//! directly testable policy instead of an implicit race:
//!
//! - The reader **never blocks**.  If consumers fall behind and the queue is
//!   full, `push` evicts the oldest unread line and returns it so the caller
//!   can log the drop.  Stalling the reader instead would let the device's
//!   own buffers overflow and desynchronise line framing.
//! - Consumers wait with an explicit timeout; there is no unbounded wait
//!   anywhere in the protocol stack.
//!
//! tokio's mpsc channel cannot evict from the send side, so this is a small
//! dedicated type built on a mutex-protected deque plus a [`Notify`] for
//! wakeups.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Default capacity used by the transport.  Generous for a human-paced
/// setup dialogue; small enough that a chattering device cannot hoard
/// memory.
pub const DEFAULT_CAPACITY: usize = 256;

/// Bounded FIFO of framed lines shared between the reader task and blocking
/// consumers.
#[derive(Debug)]
pub struct LineQueue {
    inner: Mutex<VecDeque<String>>,
    notify: Notify,
    capacity: usize,
}

impl LineQueue {
    /// Creates a queue bounded at `capacity` lines (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends a line, evicting and returning the oldest unread line when
    /// the queue is already full.  Never blocks.
    pub fn push(&self, line: String) -> Option<String> {
        let evicted = {
            let mut queue = self.inner.lock().expect("line queue lock poisoned");
            let evicted = if queue.len() >= self.capacity {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(line);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    /// Removes and returns the oldest line, waiting up to `timeout` for one
    /// to arrive.  Returns `None` on timeout.
    pub async fn pop(&self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for a wakeup before checking, so a push between the
            // check and the await cannot be missed.
            let notified = self.notify.notified();

            if let Some(line) = self.inner.lock().expect("line queue lock poisoned").pop_front()
            {
                return Some(line);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }

    /// Number of lines currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("line queue lock poisoned").len()
    }

    /// True when no lines are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns everything currently buffered, without waiting.
    pub fn drain(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("line queue lock poisoned")
            .drain(..)
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
