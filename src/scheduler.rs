//! Deferred work for the coordinator: watchdogs and settle retries.
//!
//! The coordinator never sleeps. It asks a [`Scheduler`] to hand a
//! [`TimerTask`] back after a delay and cancels it when the ticket settles
//! through another route. [`ManualScheduler`] drives the same contract from a
//! virtual clock so races between watchdogs and engine callbacks can be
//! replayed deterministically.

use crate::protocol::TicketId;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// Force-settle the ticket; the engine went silent.
    Watchdog(TicketId),
    /// Re-run settlement for a ticket whose engine never reported a start.
    RetrySettle(TicketId),
}

impl TimerTask {
    pub fn ticket(self) -> TicketId {
        match self {
            Self::Watchdog(ticket) | Self::RetrySettle(ticket) => ticket,
        }
    }
}

pub trait Scheduler {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId;
    /// Cancelling an unknown or already fired timer is a no-op.
    fn cancel(&mut self, id: TimerId);
}

#[derive(Debug, Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<(Duration, TimerId), TimerTask>,
}

/// Virtual-clock scheduler. Clones share one clock; keep a clone outside the
/// coordinator to pop due timers and feed them back.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    clock: Rc<RefCell<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.clock.borrow().now
    }

    pub fn pending_count(&self) -> usize {
        self.clock.borrow().pending.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.clock
            .borrow()
            .pending
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Remove the earliest timer due at or before `until`, moving the clock to
    /// its deadline.
    pub fn pop_due(&self, until: Duration) -> Option<(TimerId, TimerTask)> {
        let mut clock = self.clock.borrow_mut();
        let key = *clock.pending.keys().next()?;
        if key.0 > until {
            return None;
        }
        let task = clock.pending.remove(&key)?;
        clock.now = clock.now.max(key.0);
        Some((key.1, task))
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&self, now: Duration) {
        let mut clock = self.clock.borrow_mut();
        clock.now = clock.now.max(now);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        let mut clock = self.clock.borrow_mut();
        clock.next_id += 1;
        let id = TimerId(clock.next_id);
        let deadline = clock.now + delay;
        clock.pending.insert((deadline, id), task);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.clock
            .borrow_mut()
            .pending
            .retain(|(_, timer), _| *timer != id);
    }
}
