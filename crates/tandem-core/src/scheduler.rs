//! Single-shot delayed callbacks.
//!
//! A sans-IO timer table. Callers schedule a payload for `now + delay`, and
//! later hand the current time to [`Scheduler::expire`], which returns every
//! payload whose deadline has passed. The payload is the "callback": the
//! owner decides what firing means.
//!
//! # Invariants
//!
//! - A handle fires at most once.
//! - A cancelled handle never fires.
//! - Cancelling a fired or already-cancelled handle is a no-op.
//!
//! The scheduler does not limit how many timers are live. Policies such as
//! "one outstanding requeue" belong to the owner.

use std::{ops::Add, time::Duration};

/// Identifies a scheduled timer. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw handle value, for logging.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// A timer whose deadline passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<I, T> {
    /// Handle returned by `schedule`.
    pub handle: TimerHandle,
    /// Deadline the timer was scheduled for.
    pub due_at: I,
    /// Payload given to `schedule`.
    pub payload: T,
}

#[derive(Debug, Clone)]
struct Pending<I, T> {
    handle: TimerHandle,
    due_at: I,
    payload: T,
}

/// Timer table.
#[derive(Debug, Clone)]
pub struct Scheduler<I, T> {
    next_handle: u64,
    pending: Vec<Pending<I, T>>,
}

impl<I, T> Default for Scheduler<I, T> {
    fn default() -> Self {
        Self { next_handle: 0, pending: Vec::new() }
    }
}

impl<I, T> Scheduler<I, T>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `payload` to fire at `now + delay`.
    pub fn schedule(&mut self, now: I, delay: Duration, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Pending { handle, due_at: now + delay, payload });
        tracing::trace!(timer = handle.0, ?delay, "timer scheduled");
        handle
    }

    /// Cancel a timer. Returns `true` if it was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        let cancelled = self.pending.len() != before;
        if cancelled {
            tracing::trace!(timer = handle.0, "timer cancelled");
        }
        cancelled
    }

    /// Whether the handle is scheduled and has not fired.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|p| p.handle == handle)
    }

    /// Deadline of a pending timer.
    pub fn due_at(&self, handle: TimerHandle) -> Option<I> {
        self.pending.iter().find(|p| p.handle == handle).map(|p| p.due_at)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.pending.iter().map(|p| p.due_at).min()
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timer is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every timer due at or before `now`, earliest first.
    /// Timers with equal deadlines fire in scheduling order.
    pub fn expire(&mut self, now: I) -> Vec<Fired<I, T>> {
        let (due, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.due_at <= now);
        self.pending = rest;

        let mut fired: Vec<_> = due
            .into_iter()
            .map(|p| Fired { handle: p.handle, due_at: p.due_at, payload: p.payload })
            .collect();
        fired.sort_by_key(|f| (f.due_at, f.handle));
        fired
    }
}
