//! Highlight planning. Offsets are UTF-16 code units, the unit used by the
//! speech engine's boundary events and by DOM ranges.

use super::extract::{TextNode, normalize_text};

/// Where a chunk was found in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightTarget {
    /// Index into [`PageDocument::text_nodes`](super::PageDocument::text_nodes).
    pub node: usize,
    /// Start of the chunk inside the node's raw text, when the prefix matched
    /// verbatim. `None` for whitespace-insensitive matches.
    pub offset: Option<usize>,
}

/// Find the first text node containing the chunk's leading `prefix_chars`
/// characters.
pub fn highlight_target(
    nodes: &[TextNode],
    chunk: &str,
    prefix_chars: usize,
) -> Option<HighlightTarget> {
    let prefix: String = chunk.chars().take(prefix_chars).collect();
    let normalized_prefix = normalize_text(&prefix);
    if normalized_prefix.is_empty() {
        return None;
    }

    nodes.iter().enumerate().find_map(|(position, node)| {
        if let Some(byte) = node.text.find(prefix.as_str()) {
            return Some(HighlightTarget {
                node: position,
                offset: Some(utf16_len(&node.text[..byte])),
            });
        }
        normalize_text(&node.text)
            .contains(normalized_prefix.as_str())
            .then_some(HighlightTarget {
                node: position,
                offset: None,
            })
    })
}

/// Part of one text node covered by an underline, as a half-open UTF-16
/// range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRange {
    pub node: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderlineStrategy {
    /// A single node is touched: wrap the range in place.
    Surround,
    /// The range spans nodes: extract the contents and reinsert them wrapped.
    ExtractAndReinsert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnderlinePlan {
    pub runs: Vec<NodeRange>,
}

impl UnderlinePlan {
    pub fn strategy(&self) -> UnderlineStrategy {
        if self.runs.len() == 1 {
            UnderlineStrategy::Surround
        } else {
            UnderlineStrategy::ExtractAndReinsert
        }
    }
}

/// Plan an underline of `[start, start + length)` across consecutive text
/// segments. The range is clamped into the text and is at least one unit long.
/// Returns `None` when there is no text.
pub fn underline_ranges<S: AsRef<str>>(
    segments: &[S],
    start: usize,
    length: usize,
) -> Option<UnderlinePlan> {
    let lengths: Vec<usize> = segments
        .iter()
        .map(|segment| utf16_len(segment.as_ref()))
        .collect();
    let total: usize = lengths.iter().sum();
    if total == 0 {
        return None;
    }

    let start = start.min(total - 1);
    let end = start + length.max(1).min(total - start);

    let mut runs = Vec::new();
    let mut node_start = 0;
    for (node, len) in lengths.into_iter().enumerate() {
        let node_end = node_start + len;
        if node_end > start && node_start < end {
            let overlap_start = start.saturating_sub(node_start);
            let overlap_end = len.min(end - node_start);
            if overlap_start < overlap_end {
                runs.push(NodeRange {
                    node,
                    start: overlap_start,
                    end: overlap_end,
                });
            }
        }
        node_start = node_end;
    }

    (!runs.is_empty()).then_some(UnderlinePlan { runs })
}

pub(crate) fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}
