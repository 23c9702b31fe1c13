//! Message vocabulary exchanged between the page client, the popup and the
//! coordinator. Every type here crosses the extension boundary as JSON and is
//! exported to TypeScript.

use crate::error::CoordinatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Browser tab hosting a page client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab:{}", self.0)
    }
}

/// Identity of one speak request handed to the engine. Engine events echo it
/// back so events for retired utterances can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct TicketId(#[ts(type = "number")] pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Requests accepted by the coordinator. The sending tab travels alongside the
/// command, not inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export)]
pub enum Command {
    SpeakAdHoc {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        rate: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        voice: Option<String>,
    },
    StartSession {
        chunks: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        rate: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        voice: Option<String>,
    },
    Pause,
    Resume,
    Stop,
    Seek {
        index: usize,
    },
    SetRate {
        rate: f32,
    },
    SetVoice {
        voice: String,
    },
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Self::SpeakAdHoc { .. } => "speak_ad_hoc",
            Self::StartSession { .. } => "start_session",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Seek { .. } => "seek",
            Self::SetRate { .. } => "set_rate",
            Self::SetVoice { .. } => "set_voice",
        }
    }
}

/// The single response every command receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub total_chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: true,
            total_chunks: None,
            code: None,
            error: None,
        }
    }

    pub fn started(total_chunks: usize) -> Self {
        Self {
            total_chunks: Some(total_chunks),
            ..Self::ok()
        }
    }

    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            total_chunks: None,
            code: Some(code.to_string()),
            error: Some(message.into()),
        }
    }
}

impl From<&CoordinatorError> for Reply {
    fn from(err: &CoordinatorError) -> Self {
        Self::rejected(err.code(), err.to_string())
    }
}

/// Unsolicited messages pushed by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export)]
pub enum Notification {
    /// Emitted before the chunk at `current_index` is spoken.
    #[serde(rename_all = "camelCase")]
    Progress {
        current_index: usize,
        total_chunks: usize,
    },
    Finished,
    /// Word boundary inside the chunk currently spoken by the session.
    #[serde(rename_all = "camelCase")]
    Word {
        chunk_index: usize,
        char_index: usize,
        char_length: usize,
    },
    QuickStart,
    #[serde(rename_all = "camelCase")]
    QuickWord {
        char_index: usize,
        char_length: usize,
    },
    QuickEnd,
}

impl Notification {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Finished => "finished",
            Self::Word { .. } => "word",
            Self::QuickStart => "quick_start",
            Self::QuickWord { .. } => "quick_word",
            Self::QuickEnd => "quick_end",
        }
    }
}

/// Where a notification is delivered: every extension view (popups), or one
/// specific document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Target {
    Extension,
    Tab(TabId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extension => write!(f, "extension"),
            Self::Tab(tab) => write!(f, "{tab}"),
        }
    }
}

/// Lifecycle signal from the speech engine. `Completed` is the per-call
/// completion callback; the others mirror the engine's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EngineEventKind {
    Start,
    Word,
    End,
    Interrupted,
    Cancelled,
    Error,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EngineEvent {
    pub ticket: TicketId,
    #[serde(rename = "type")]
    pub kind: EngineEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub char_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub char_length: Option<usize>,
}

impl EngineEvent {
    pub fn new(ticket: TicketId, kind: EngineEventKind) -> Self {
        Self {
            ticket,
            kind,
            char_index: None,
            char_length: None,
        }
    }

    pub fn word(ticket: TicketId, char_index: usize, char_length: usize) -> Self {
        Self {
            ticket,
            kind: EngineEventKind::Word,
            char_index: Some(char_index),
            char_length: Some(char_length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_action_tags() {
        let command: Command =
            serde_json::from_str(r#"{"action":"start_session","chunks":["A.","B."]}"#).unwrap();
        assert_eq!(
            command,
            Command::StartSession {
                chunks: vec!["A.".to_string(), "B.".to_string()],
                rate: None,
                voice: None,
            }
        );
        assert_eq!(command.action(), "start_session");

        let seek: Command = serde_json::from_str(r#"{"action":"seek","index":3}"#).unwrap();
        assert_eq!(seek, Command::Seek { index: 3 });
    }

    #[test]
    fn unknown_actions_are_rejected() {
        let parsed = serde_json::from_str::<Command>(r#"{"action":"tts_explode"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn replies_omit_absent_fields() {
        assert_eq!(
            serde_json::to_string(&Reply::ok()).unwrap(),
            r#"{"success":true}"#
        );
        assert_eq!(
            serde_json::to_string(&Reply::started(4)).unwrap(),
            r#"{"success":true,"totalChunks":4}"#
        );
        let rejected = Reply::from(&CoordinatorError::OutOfRange { index: 9, len: 2 });
        assert!(!rejected.success);
        assert_eq!(rejected.code.as_deref(), Some("out_of_range"));
    }

    #[test]
    fn notifications_use_camel_case_payloads() {
        let json = serde_json::to_string(&Notification::Progress {
            current_index: 2,
            total_chunks: 5,
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"progress","currentIndex":2,"totalChunks":5}"#);
        assert_eq!(
            serde_json::to_string(&Notification::Finished).unwrap(),
            r#"{"action":"finished"}"#
        );
    }

    #[test]
    fn engine_events_parse_type_field() {
        let event: EngineEvent = serde_json::from_str(
            r#"{"ticket":7,"type":"word","charIndex":4,"charLength":5}"#,
        )
        .unwrap();
        assert_eq!(event, EngineEvent::word(TicketId(7), 4, 5));
    }

    #[test]
    fn targets_serialize_compactly() {
        assert_eq!(
            serde_json::to_string(&Target::Extension).unwrap(),
            r#""extension""#
        );
        assert_eq!(
            serde_json::to_string(&Target::Tab(TabId(12))).unwrap(),
            r#"{"tab":12}"#
        );
    }
}
