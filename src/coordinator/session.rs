use crate::protocol::{Notification, TabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// The one live reading session. Only the coordinator writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub(super) chunks: Vec<String>,
    pub(super) current_index: usize,
    pub(super) state: PlaybackState,
    pub(super) rate: f32,
    pub(super) voice: String,
    pub(super) owner_tab: Option<TabId>,
}

impl PlaybackSession {
    pub(super) fn new(rate: f32, voice: String) -> Self {
        Self {
            chunks: Vec::new(),
            current_index: 0,
            state: PlaybackState::Idle,
            rate,
            voice,
            owner_tab: None,
        }
    }

    /// Replace the chunk list and rewind. Rate and voice carry over.
    pub(super) fn begin(&mut self, chunks: Vec<String>, owner_tab: Option<TabId>) {
        self.chunks = chunks;
        self.current_index = 0;
        self.state = PlaybackState::Playing;
        self.owner_tab = owner_tab;
    }

    pub(super) fn progress(&self) -> Notification {
        Notification::Progress {
            current_index: self.current_index,
            total_chunks: self.chunks.len(),
        }
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn owner_tab(&self) -> Option<TabId> {
        self.owner_tab
    }
}
