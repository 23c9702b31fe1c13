//! Popup remote control.
//!
//! The control surface mirrors coordinator state for display only. Every
//! gesture returns the request to send; replies and notifications update what
//! the popup renders.

use crate::coordinator::PlaybackState;
use crate::protocol::{Command, Notification, Reply};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

/// Requests the popup sends to the page client of the active tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export)]
pub enum PageRequest {
    StartReader {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        rate: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        voice: Option<String>,
    },
    Seek {
        index: usize,
    },
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    ToPage(PageRequest),
    ToCoordinator(Command),
}

pub const STATUS_INITIALIZING: &str = "Initializing...";
pub const STATUS_STOPPED: &str = "Stopped";
pub const STATUS_FINISHED: &str = "Finished reading";
pub const STATUS_NO_TAB: &str = "Error: No active tab found";
pub const STATUS_PAGE_UNREACHABLE: &str = "Error: Could not start reading on this page";
const DEFAULT_START_ERROR: &str = "Could not start reading";

#[derive(Debug, Clone, PartialEq)]
pub struct ControlSurface {
    state: PlaybackState,
    current_index: usize,
    total_chunks: usize,
    rate: f32,
    voice: String,
    status: String,
    /// Set by our own stop so the trailing progress/finished pair does not
    /// overwrite the "Stopped" status.
    stopping: bool,
}

impl Default for ControlSurface {
    fn default() -> Self {
        Self::new(1.0, String::new())
    }
}

impl ControlSurface {
    pub fn new(rate: f32, voice: String) -> Self {
        Self {
            state: PlaybackState::Idle,
            current_index: 0,
            total_chunks: 0,
            rate,
            voice,
            status: String::new(),
            stopping: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        self.current_index as f64 / self.total_chunks as f64 * 100.0
    }

    /// Idle: ask the page to start reading. Paused: resume. Playing: nothing.
    pub fn play(&mut self) -> Option<ControlRequest> {
        match self.state {
            PlaybackState::Idle => {
                self.status = STATUS_INITIALIZING.to_string();
                self.stopping = false;
                let voice = (!self.voice.is_empty()).then(|| self.voice.clone());
                Some(ControlRequest::ToPage(PageRequest::StartReader {
                    rate: Some(self.rate),
                    voice,
                }))
            }
            PlaybackState::Paused => {
                self.state = PlaybackState::Playing;
                self.render_position();
                Some(ControlRequest::ToCoordinator(Command::Resume))
            }
            PlaybackState::Playing => None,
        }
    }

    /// `None` means the page never answered, typically because no page client
    /// runs in the tab.
    pub fn on_start_reply(&mut self, reply: Option<Reply>) {
        let Some(reply) = reply else {
            self.status = STATUS_PAGE_UNREACHABLE.to_string();
            return;
        };
        if !reply.success {
            let reason = reply.error.as_deref().unwrap_or(DEFAULT_START_ERROR);
            self.status = format!("Error: {reason}");
            return;
        }
        self.state = PlaybackState::Playing;
        self.current_index = 0;
        self.total_chunks = reply.total_chunks.unwrap_or(0);
        self.render_position();
    }

    pub fn on_no_active_tab(&mut self) {
        self.status = STATUS_NO_TAB.to_string();
    }

    pub fn pause(&mut self) -> Option<ControlRequest> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        self.state = PlaybackState::Paused;
        Some(ControlRequest::ToCoordinator(Command::Pause))
    }

    /// Stop goes through the page so its highlights are cleared too.
    pub fn stop(&mut self) -> ControlRequest {
        self.state = PlaybackState::Idle;
        self.current_index = 0;
        self.status = STATUS_STOPPED.to_string();
        self.stopping = true;
        ControlRequest::ToPage(PageRequest::Stop)
    }

    /// The page relays the seek after moving its highlight.
    pub fn seek(&mut self, index: usize) -> ControlRequest {
        ControlRequest::ToPage(PageRequest::Seek { index })
    }

    pub fn set_rate(&mut self, rate: f32) -> ControlRequest {
        self.rate = rate;
        ControlRequest::ToCoordinator(Command::SetRate { rate })
    }

    pub fn set_voice(&mut self, voice: String) -> ControlRequest {
        self.voice = voice.clone();
        ControlRequest::ToCoordinator(Command::SetVoice { voice })
    }

    pub fn on_notification(&mut self, notification: &Notification) {
        match *notification {
            Notification::Progress {
                current_index,
                total_chunks,
            } => {
                self.current_index = current_index;
                self.total_chunks = total_chunks;
                if self.stopping {
                    return;
                }
                if self.state == PlaybackState::Idle && current_index < total_chunks {
                    self.state = PlaybackState::Playing;
                }
                if self.state == PlaybackState::Playing {
                    self.render_position();
                }
            }
            Notification::Finished => {
                self.state = PlaybackState::Idle;
                self.current_index = 0;
                if !std::mem::take(&mut self.stopping) {
                    self.status = STATUS_FINISHED.to_string();
                }
            }
            _ => debug!(action = notification.action(), "Ignoring page-only notification"),
        }
    }

    fn render_position(&mut self) {
        if self.current_index < self.total_chunks {
            self.status = format!(
                "Reading chunk {} of {}...",
                self.current_index + 1,
                self.total_chunks
            );
        }
    }
}
