//! Page client: the per-document half of reader mode.
//!
//! Everything here is pure. [`PageDocument`] snapshots a document's visible
//! text, the chunker and highlight planners work on that snapshot, and
//! [`PageClient`] turns coordinator notifications and user gestures into
//! [`PageEffect`]s that a thin DOM adapter applies.

pub mod chunking;
pub mod client;
pub mod extract;
pub mod highlight;
pub mod quick_speak;

pub use chunking::split_into_chunks;
pub use client::{PageClient, PageEffect, Selection, UnderlineHost};
pub use extract::{PageDocument, TextNode};
pub use highlight::{HighlightTarget, NodeRange, UnderlinePlan, UnderlineStrategy};
pub use quick_speak::{BubblePosition, QuickSpeakBubble, Rect};

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    /// Sentences longer than this are split on whitespace.
    pub chunk_max_chars: usize,
    /// Leading characters of a chunk used to locate it in the document.
    pub highlight_prefix_chars: usize,
    pub bubble_idle: Duration,
    pub bubble_leave: Duration,
}

impl Default for PageSettings {
    fn default() -> Self {
        crate::config::AppConfig::default().page_settings()
    }
}
