//! Utterance dispatch and settlement.
//!
//! Every path that ends an utterance (engine events, the completion callback,
//! watchdogs, exhausted retries) funnels through `request_settle` or
//! `complete`, so a chunk advances exactly once however many signals arrive.

use super::Coordinator;
use super::session::PlaybackState;
use super::ticket::{Slot, TicketKind, UtteranceTicket};
use crate::engine::{SpeechEngine, UtteranceRequest};
use crate::error::EngineError;
use crate::messenger::Messenger;
use crate::protocol::{EngineEvent, EngineEventKind, Notification, TicketId};
use crate::scheduler::{Scheduler, TimerId, TimerTask};
use tracing::{debug, info, trace, warn};

enum SettleStep {
    Complete,
    AlreadyRetrying,
    Retry,
    GiveUp { retries: u32 },
}

impl<E, M, S> Coordinator<E, M, S>
where
    E: SpeechEngine,
    M: Messenger,
    S: Scheduler,
{
    /// Route one engine lifecycle event. Events for retired tickets are
    /// dropped here.
    pub fn on_engine_event(&mut self, event: EngineEvent) {
        let Some(slot) = self.slot_of(event.ticket) else {
            trace!(
                ticket = %event.ticket,
                kind = ?event.kind,
                "Ignoring event for retired ticket"
            );
            return;
        };

        match event.kind {
            EngineEventKind::Start | EngineEventKind::Word => {
                self.mark_started(slot);
                if event.kind == EngineEventKind::Start {
                    if slot == Slot::Quick {
                        self.notify_quick(Notification::QuickStart);
                    }
                } else if let Some(char_index) = event.char_index {
                    self.forward_word(slot, char_index, event.char_length.unwrap_or(0));
                }
            }
            EngineEventKind::End
            | EngineEventKind::Completed
            | EngineEventKind::Interrupted
            | EngineEventKind::Cancelled => self.request_settle(slot),
            EngineEventKind::Error => {
                warn!(
                    ticket = %event.ticket,
                    "Speech engine reported an error; settling utterance"
                );
                self.complete(slot);
            }
        }
    }

    /// Handle a fired timer. Honored only while the ticket is live and still
    /// holds this exact timer.
    pub fn on_timer(&mut self, id: TimerId, task: TimerTask) {
        let Some(slot) = self.slot_of(task.ticket()) else {
            trace!(timer = %id, ticket = %task.ticket(), "Ignoring timer for retired ticket");
            return;
        };

        let honored = match (self.ticket_mut(slot), task) {
            (Some(ticket), TimerTask::Watchdog(_)) if ticket.watchdog == Some(id) => {
                ticket.watchdog = None;
                true
            }
            (Some(ticket), TimerTask::RetrySettle(_)) if ticket.retry == Some(id) => {
                ticket.retry = None;
                true
            }
            _ => false,
        };
        if !honored {
            trace!(timer = %id, "Ignoring superseded timer");
            return;
        }

        match task {
            TimerTask::Watchdog(ticket) => {
                warn!(%ticket, "No engine activity before watchdog deadline; forcing advance");
                self.complete(slot);
            }
            TimerTask::RetrySettle(_) => self.request_settle(slot),
        }
    }

    /// Speak the chunk at `current_index`, skipping blank chunks and finishing
    /// the session when the index runs off the end.
    pub(super) fn dispatch_current(&mut self) {
        loop {
            let index = self.session.current_index;
            let Some(chunk) = self.session.chunks.get(index) else {
                self.finish_session();
                return;
            };
            if chunk.trim().is_empty() {
                debug!(index, "Skipping blank chunk");
                self.session.current_index += 1;
                continue;
            }
            let text = chunk.clone();

            self.retire_quick(true);
            let id = self.issue_ticket();
            self.broadcast(self.session.progress());

            let mut ticket = UtteranceTicket::new(id, TicketKind::Chunk { index });
            ticket.watchdog = Some(
                self.scheduler
                    .schedule(self.settings.watchdog_timeout, TimerTask::Watchdog(id)),
            );
            self.chunk_ticket = Some(ticket);

            debug!(index, ticket = %id, chars = text.chars().count(), "Dispatching chunk");
            let request =
                UtteranceRequest::new(id, text, self.session.rate, &self.session.voice);
            if let Err(err) = self.speak(request) {
                warn!(index, ticket = %id, "Engine refused chunk: {err}");
                self.request_settle(Slot::Chunk);
            }
            return;
        }
    }

    pub(super) fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError> {
        match self.engine.as_mut() {
            Some(engine) => engine.speak(request),
            None => Err(EngineError::Disconnected),
        }
    }

    /// A settle signal arrived. Utterances the engine never started are given
    /// a few short retries before being forced through.
    pub(super) fn request_settle(&mut self, slot: Slot) {
        let max_retries = self.settings.max_retries;
        let step = match self.ticket_mut(slot) {
            None => return,
            Some(ticket) if ticket.started => SettleStep::Complete,
            Some(ticket) if ticket.retry.is_some() => SettleStep::AlreadyRetrying,
            Some(ticket) if ticket.retry_count < max_retries => {
                ticket.retry_count += 1;
                SettleStep::Retry
            }
            Some(ticket) => SettleStep::GiveUp {
                retries: ticket.retry_count,
            },
        };

        match step {
            SettleStep::Complete => self.complete(slot),
            SettleStep::AlreadyRetrying => {}
            SettleStep::Retry => {
                let Some(ticket_id) = self.ticket_mut(slot).map(|ticket| ticket.id) else {
                    return;
                };
                let timer = self
                    .scheduler
                    .schedule(self.settings.retry_delay, TimerTask::RetrySettle(ticket_id));
                if let Some(ticket) = self.ticket_mut(slot) {
                    debug!(
                        ticket = %ticket_id,
                        attempt = ticket.retry_count,
                        "Settle before start; retrying"
                    );
                    ticket.retry = Some(timer);
                }
            }
            SettleStep::GiveUp { retries } => {
                warn!(retries, "Engine never started utterance; forcing advance");
                self.complete(slot);
            }
        }
    }

    /// Definitive settlement: retire the ticket and move on.
    pub(super) fn complete(&mut self, slot: Slot) {
        let Some(mut ticket) = self.take_ticket(slot) else {
            return;
        };
        ticket.cancel_timers(&mut self.scheduler);
        match ticket.kind {
            TicketKind::Chunk { index } => self.complete_chunk(index),
            TicketKind::Quick { origin } => {
                debug!(ticket = %ticket.id, "Quick speak finished");
                self.notify_tab(origin, Notification::QuickEnd);
            }
        }
    }

    fn complete_chunk(&mut self, index: usize) {
        let next = index + 1;
        self.session.current_index = next;
        if next >= self.session.chunks.len() {
            self.finish_session();
        } else if self.session.state == PlaybackState::Playing {
            self.dispatch_current();
        } else {
            self.broadcast(self.session.progress());
        }
    }

    fn finish_session(&mut self) {
        let total = self.session.chunks.len();
        self.session.current_index = total;
        self.broadcast(self.session.progress());
        self.broadcast(Notification::Finished);
        self.session.current_index = 0;
        self.session.state = PlaybackState::Idle;
        info!(total, "Reading session finished");
    }

    fn mark_started(&mut self, slot: Slot) {
        let rearm = slot == Slot::Quick || self.session.state == PlaybackState::Playing;
        let timeout = self.settings.watchdog_timeout;
        let Some(ticket) = self.ticket_mut(slot) else {
            return;
        };
        ticket.started = true;
        if !rearm {
            return;
        }
        let id = ticket.id;
        let previous = ticket.watchdog.take();
        if let Some(timer) = previous {
            self.scheduler.cancel(timer);
        }
        let timer = self.scheduler.schedule(timeout, TimerTask::Watchdog(id));
        if let Some(ticket) = self.ticket_mut(slot) {
            ticket.watchdog = Some(timer);
        }
    }

    fn forward_word(&mut self, slot: Slot, char_index: usize, char_length: usize) {
        let Some(kind) = self.ticket_mut(slot).map(|ticket| ticket.kind) else {
            return;
        };
        match kind {
            TicketKind::Chunk { index } => {
                let owner = self.session.owner_tab;
                self.notify_tab(
                    owner,
                    Notification::Word {
                        chunk_index: index,
                        char_index,
                        char_length,
                    },
                );
            }
            TicketKind::Quick { origin } => self.notify_tab(
                origin,
                Notification::QuickWord {
                    char_index,
                    char_length,
                },
            ),
        }
    }

    fn notify_quick(&mut self, notification: Notification) {
        let origin = match self.quick_ticket.as_ref().map(|ticket| ticket.kind) {
            Some(TicketKind::Quick { origin }) => origin,
            _ => None,
        };
        self.notify_tab(origin, notification);
    }

    /// Drop the live chunk ticket without advancing.
    pub(super) fn retire_chunk(&mut self) -> bool {
        match self.chunk_ticket.take() {
            Some(mut ticket) => {
                ticket.cancel_timers(&mut self.scheduler);
                trace!(ticket = %ticket.id, "Retired chunk ticket");
                true
            }
            None => false,
        }
    }

    /// Drop the live quick ticket, telling its page to clean up when asked.
    pub(super) fn retire_quick(&mut self, notify: bool) -> Option<TicketKind> {
        let mut ticket = self.quick_ticket.take()?;
        ticket.cancel_timers(&mut self.scheduler);
        trace!(ticket = %ticket.id, "Retired quick ticket");
        if notify {
            if let TicketKind::Quick { origin } = ticket.kind {
                self.notify_tab(origin, Notification::QuickEnd);
            }
        }
        Some(ticket.kind)
    }

    pub(super) fn issue_ticket(&mut self) -> TicketId {
        self.next_ticket = self.next_ticket.wrapping_add(1);
        TicketId(self.next_ticket)
    }

    fn slot_of(&self, id: TicketId) -> Option<Slot> {
        if self.chunk_ticket.as_ref().is_some_and(|ticket| ticket.id == id) {
            Some(Slot::Chunk)
        } else if self.quick_ticket.as_ref().is_some_and(|ticket| ticket.id == id) {
            Some(Slot::Quick)
        } else {
            None
        }
    }

    fn ticket_mut(&mut self, slot: Slot) -> Option<&mut UtteranceTicket> {
        match slot {
            Slot::Chunk => self.chunk_ticket.as_mut(),
            Slot::Quick => self.quick_ticket.as_mut(),
        }
    }

    fn take_ticket(&mut self, slot: Slot) -> Option<UtteranceTicket> {
        match slot {
            Slot::Chunk => self.chunk_ticket.take(),
            Slot::Quick => self.quick_ticket.take(),
        }
    }
}
