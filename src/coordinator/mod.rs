//! The reading coordinator: sole owner of the playback session.
//!
//! Commands arrive through [`Coordinator::handle`] and each yields exactly one
//! [`Reply`]. Engine events and fired timers come back through
//! `on_engine_event` / `on_timer`. Nothing here blocks or sleeps; deferred work
//! goes through the [`Scheduler`].

mod dispatch;
mod session;
mod ticket;

pub use session::{PlaybackSession, PlaybackState};

use crate::engine::{SpeechEngine, UtteranceRequest};
use crate::error::CoordinatorError;
use crate::messenger::Messenger;
use crate::protocol::{Command, Notification, Reply, TabId, Target};
use crate::scheduler::{Scheduler, TimerTask};
use std::time::Duration;
use ticket::{Slot, TicketKind, UtteranceTicket};
use tracing::{debug, info, warn};

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Inactivity window after which a silent utterance is forced through.
    pub watchdog_timeout: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub default_rate: f32,
    pub default_voice: String,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        crate::config::AppConfig::default().coordinator_settings()
    }
}

pub struct Coordinator<E, M, S> {
    settings: CoordinatorSettings,
    engine: Option<E>,
    messenger: M,
    scheduler: S,
    session: PlaybackSession,
    chunk_ticket: Option<UtteranceTicket>,
    quick_ticket: Option<UtteranceTicket>,
    next_ticket: u64,
}

impl<E, M, S> Coordinator<E, M, S>
where
    E: SpeechEngine,
    M: Messenger,
    S: Scheduler,
{
    pub fn new(
        settings: CoordinatorSettings,
        engine: Option<E>,
        messenger: M,
        scheduler: S,
    ) -> Self {
        if engine.is_none() {
            warn!("Speech engine unavailable; speak requests will be rejected");
        }
        let session = PlaybackSession::new(
            settings.default_rate.clamp(MIN_RATE, MAX_RATE),
            settings.default_voice.clone(),
        );
        Self {
            settings,
            engine,
            messenger,
            scheduler,
            session,
            chunk_ticket: None,
            quick_ticket: None,
            next_ticket: 0,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    /// Apply one command from `origin` (`None` for extension views such as
    /// the popup). Rejections leave the session untouched.
    pub fn handle(&mut self, origin: Option<TabId>, command: Command) -> Reply {
        let action = command.action();
        debug!(action, origin = ?origin, "Handling command");
        let result = match command {
            Command::SpeakAdHoc { text, rate, voice } => self
                .speak_ad_hoc(origin, text, rate, voice)
                .map(|()| Reply::ok()),
            Command::StartSession {
                chunks,
                rate,
                voice,
            } => self
                .start_session(origin, chunks, rate, voice)
                .map(Reply::started),
            Command::Pause => {
                self.pause();
                Ok(Reply::ok())
            }
            Command::Resume => {
                self.resume();
                Ok(Reply::ok())
            }
            Command::Stop => {
                self.stop();
                Ok(Reply::ok())
            }
            Command::Seek { index } => self.seek(index).map(|()| Reply::ok()),
            Command::SetRate { rate } => self.set_rate(rate).map(|()| Reply::ok()),
            Command::SetVoice { voice } => {
                self.set_voice(voice);
                Ok(Reply::ok())
            }
        };

        result.unwrap_or_else(|err| {
            warn!(action, code = err.code(), "Rejected command: {err}");
            Reply::from(&err)
        })
    }

    /// Speak a one-off text for `origin`. A playing session is paused in
    /// place so it can be resumed afterwards.
    pub fn speak_ad_hoc(
        &mut self,
        origin: Option<TabId>,
        text: String,
        rate: Option<f32>,
        voice: Option<String>,
    ) -> Result<(), CoordinatorError> {
        if text.trim().is_empty() {
            return Err(CoordinatorError::InvalidInput(
                "nothing to speak".to_string(),
            ));
        }
        let rate = match rate {
            Some(rate) => validate_rate(rate)?,
            None => self.session.rate,
        };
        let voice = voice.unwrap_or_else(|| self.session.voice.clone());
        if self.engine.is_none() {
            return Err(CoordinatorError::EngineUnavailable);
        }

        if let Some(TicketKind::Quick { origin: previous }) = self.retire_quick(false) {
            if previous != origin {
                self.notify_tab(previous, Notification::QuickEnd);
            }
        }
        if self.retire_chunk() && self.session.state == PlaybackState::Playing {
            self.session.state = PlaybackState::Paused;
            info!(
                index = self.session.current_index,
                "Quick speak preempted reading session; pausing"
            );
            self.broadcast(self.session.progress());
        }
        self.stop_engine();

        let id = self.issue_ticket();
        let mut ticket = UtteranceTicket::new(id, TicketKind::Quick { origin });
        ticket.watchdog = Some(
            self.scheduler
                .schedule(self.settings.watchdog_timeout, TimerTask::Watchdog(id)),
        );
        self.quick_ticket = Some(ticket);

        debug!(ticket = %id, chars = text.chars().count(), "Speaking quick text");
        if let Err(err) = self.speak(UtteranceRequest::new(id, text, rate, &voice)) {
            warn!(ticket = %id, "Engine refused quick text: {err}");
            self.request_settle(Slot::Quick);
        }
        Ok(())
    }

    /// Replace any session with `chunks` and start speaking chunk 0. Returns
    /// the chunk count.
    pub fn start_session(
        &mut self,
        origin: Option<TabId>,
        chunks: Vec<String>,
        rate: Option<f32>,
        voice: Option<String>,
    ) -> Result<usize, CoordinatorError> {
        if chunks.is_empty() {
            return Err(CoordinatorError::InvalidInput(
                "no text chunks to read".to_string(),
            ));
        }
        let rate = rate.map(validate_rate).transpose()?;
        if self.engine.is_none() {
            return Err(CoordinatorError::EngineUnavailable);
        }

        self.retire_chunk();
        self.retire_quick(true);
        self.stop_engine();

        if let Some(rate) = rate {
            self.session.rate = rate;
        }
        if let Some(voice) = voice {
            self.session.voice = voice;
        }
        let total = chunks.len();
        self.session.begin(chunks, origin);
        info!(total, owner = ?origin, "Starting reading session");
        self.dispatch_current();
        Ok(total)
    }

    pub fn pause(&mut self) {
        if self.session.state != PlaybackState::Playing {
            debug!(state = ?self.session.state, "Pause ignored; nothing is playing");
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
        }
        self.session.state = PlaybackState::Paused;
        if let Some(ticket) = self.chunk_ticket.as_mut() {
            ticket.cancel_watchdog(&mut self.scheduler);
        }
        info!(index = self.session.current_index, "Paused reading session");
        self.broadcast(self.session.progress());
    }

    pub fn resume(&mut self) {
        if self.session.state != PlaybackState::Paused {
            debug!(state = ?self.session.state, "Resume ignored; nothing is paused");
            return;
        }
        self.session.state = PlaybackState::Playing;
        info!(index = self.session.current_index, "Resuming reading session");

        let Some(ticket) = self.chunk_ticket.as_mut() else {
            self.dispatch_current();
            return;
        };
        let id = ticket.id;
        ticket.cancel_watchdog(&mut self.scheduler);
        let timer = self
            .scheduler
            .schedule(self.settings.watchdog_timeout, TimerTask::Watchdog(id));
        ticket.watchdog = Some(timer);
        if let Some(engine) = self.engine.as_mut() {
            engine.resume();
        }
        self.broadcast(self.session.progress());
    }

    pub fn stop(&mut self) {
        self.retire_chunk();
        self.retire_quick(true);
        self.stop_engine();
        self.session.state = PlaybackState::Idle;
        self.session.current_index = 0;
        info!("Stopped reading session");
        self.broadcast(self.session.progress());
        self.broadcast(Notification::Finished);
        self.session.owner_tab = None;
    }

    pub fn seek(&mut self, index: usize) -> Result<(), CoordinatorError> {
        let len = self.session.chunks.len();
        if index >= len {
            return Err(CoordinatorError::OutOfRange { index, len });
        }
        info!(index, state = ?self.session.state, "Seeking");

        match self.session.state {
            PlaybackState::Playing => {
                self.retire_chunk();
                self.stop_engine();
                self.session.current_index = index;
                self.dispatch_current();
            }
            PlaybackState::Paused | PlaybackState::Idle => {
                if self.retire_chunk() {
                    self.stop_engine();
                }
                self.session.current_index = index;
                self.broadcast(self.session.progress());
            }
        }
        Ok(())
    }

    /// Takes effect from the next dispatched utterance.
    pub fn set_rate(&mut self, rate: f32) -> Result<(), CoordinatorError> {
        self.session.rate = validate_rate(rate)?;
        info!(rate = self.session.rate, "Updated speech rate");
        Ok(())
    }

    pub fn set_voice(&mut self, voice: String) {
        info!(voice = %voice, "Updated speech voice");
        self.session.voice = voice;
    }

    fn stop_engine(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
    }

    /// Session-wide notification: every extension view plus the owner tab.
    fn broadcast(&mut self, notification: Notification) {
        self.deliver(Target::Extension, &notification);
        if let Some(owner) = self.session.owner_tab {
            self.deliver(Target::Tab(owner), &notification);
        }
    }

    fn notify_tab(&mut self, tab: Option<TabId>, notification: Notification) {
        if let Some(tab) = tab {
            self.deliver(Target::Tab(tab), &notification);
        }
    }

    fn deliver(&mut self, target: Target, notification: &Notification) {
        if let Err(err) = self.messenger.deliver(target, notification) {
            debug!(%target, action = notification.action(), "Dropped notification: {err}");
        }
    }
}

fn validate_rate(rate: f32) -> Result<f32, CoordinatorError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(CoordinatorError::InvalidInput(format!(
            "rate must be a positive number, got {rate}"
        )));
    }
    Ok(rate.clamp(MIN_RATE, MAX_RATE))
}
