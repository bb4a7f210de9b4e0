//! Deadline and single-slot cache helpers shared by the samplers that talk
//! to slow peers.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Wall-clock budget for one blocking step
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn at(&self) -> Instant {
        self.started + self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

/// Outcome of [`wait_for`]
#[derive(Debug, PartialEq, Eq)]
pub enum Wait<T> {
    Signalled(T),
    TimedOut,
    /// Every sender is gone, nothing can arrive any more
    Closed,
}

/// Block until a value arrives on `signal` or `deadline` passes.
///
/// The deadline is re-checked on every wake, so extra or early wakeups can
/// never stretch the wait past its budget.
pub fn wait_for<T>(signal: &Receiver<T>, deadline: &Deadline) -> Wait<T> {
    loop {
        if deadline.expired() {
            return Wait::TimedOut;
        }
        match signal.recv_deadline(deadline.at()) {
            Ok(value) => return Wait::Signalled(value),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Wait::Closed,
        }
    }
}

/// Most recent value plus the moment it was stored
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    ttl: Duration,
    slot: Option<(T, Instant)>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The stored value if it is at most `ttl` old
    pub fn fresh(&self) -> Option<T> {
        self.fresh_at(Instant::now())
    }

    pub fn fresh_at(&self, now: Instant) -> Option<T> {
        match &self.slot {
            Some((value, stored)) if now.saturating_duration_since(*stored) <= self.ttl => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    pub fn store(&mut self, value: T) {
        self.store_at(value, Instant::now());
    }

    pub fn store_at(&mut self, value: T, at: Instant) {
        self.slot = Some((value, at));
    }

    pub fn stored_at(&self) -> Option<Instant> {
        self.slot.as_ref().map(|(_, at)| *at)
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}
