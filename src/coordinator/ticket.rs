use crate::protocol::{TabId, TicketId};
use crate::scheduler::{Scheduler, TimerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TicketKind {
    Chunk { index: usize },
    Quick { origin: Option<TabId> },
}

/// Bookkeeping for one utterance handed to the engine. A ticket is pending
/// for exactly as long as it occupies its slot in the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct UtteranceTicket {
    pub(super) id: TicketId,
    pub(super) kind: TicketKind,
    /// Set once the engine reports `start` or a word boundary.
    pub(super) started: bool,
    pub(super) retry_count: u32,
    pub(super) watchdog: Option<TimerId>,
    pub(super) retry: Option<TimerId>,
}

impl UtteranceTicket {
    pub(super) fn new(id: TicketId, kind: TicketKind) -> Self {
        Self {
            id,
            kind,
            started: false,
            retry_count: 0,
            watchdog: None,
            retry: None,
        }
    }

    pub(super) fn cancel_watchdog(&mut self, scheduler: &mut impl Scheduler) {
        if let Some(timer) = self.watchdog.take() {
            scheduler.cancel(timer);
        }
    }

    pub(super) fn cancel_timers(&mut self, scheduler: &mut impl Scheduler) {
        self.cancel_watchdog(scheduler);
        if let Some(timer) = self.retry.take() {
            scheduler.cancel(timer);
        }
    }
}

/// Which of the two ticket slots an event or timer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Slot {
    Chunk,
    Quick,
}
