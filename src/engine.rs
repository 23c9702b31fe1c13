//! Speech engine seam. The engine itself (the browser's `chrome.tts`) lives
//! outside this crate; the coordinator only sees this trait.

use crate::error::EngineError;
use crate::protocol::TicketId;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Everything the engine needs to speak one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UtteranceRequest {
    pub ticket: TicketId,
    pub text: String,
    pub rate: f32,
    /// `None` selects the engine default voice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub voice_name: Option<String>,
}

impl UtteranceRequest {
    pub fn new(ticket: TicketId, text: String, rate: f32, voice: &str) -> Self {
        Self {
            ticket,
            text,
            rate,
            voice_name: (!voice.is_empty()).then(|| voice.to_string()),
        }
    }
}

/// Single-utterance engine. `speak` replaces whatever is currently spoken;
/// lifecycle events for the utterance arrive later tagged with its ticket.
pub trait SpeechEngine {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
}
