use super::PageSettings;
use super::chunking::split_into_chunks;
use super::extract::{PageDocument, TextNode};
use super::highlight::{
    HighlightTarget, UnderlinePlan, highlight_target, underline_ranges, utf16_len,
};
use super::quick_speak::{BubblePosition, QuickSpeakBubble, Rect};
use crate::protocol::{Command, Notification, Reply};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where an underline lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderlineHost {
    /// Inside the chunk highlight anchored at this text node. Runs use
    /// document node indices.
    Node(usize),
    /// Inside the quick-speak selection wrapper; runs index its segments.
    QuickWrapper,
}

/// DOM work requested by the page client. Node indices refer to
/// [`PageDocument::text_nodes`].
#[derive(Debug, Clone, PartialEq)]
pub enum PageEffect {
    /// Mark the node's parent element as the chunk being read.
    HighlightNode { node: usize },
    ClearNodeHighlight { node: usize },
    ScrollNodeIntoView { node: usize },
    /// Wrap the live selection in a highlight span.
    WrapSelection,
    UnwrapQuickWrapper,
    Underline {
        host: UnderlineHost,
        plan: UnderlinePlan,
    },
    ClearUnderline { host: UnderlineHost },
    Send(Command),
    ShowBubble(BubblePosition),
    HideBubble,
}

/// A released text selection, split into the text nodes it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub segments: Vec<String>,
    pub rect: Rect,
    pub scroll_y: f64,
}

impl Selection {
    pub fn text(&self) -> String {
        self.segments.concat().trim().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChunkHighlight {
    chunk: usize,
    target: HighlightTarget,
}

/// Reader-mode state for one document. Holds at most one chunk highlight, one
/// quick-speak wrapper and one word underline.
#[derive(Debug, Clone)]
pub struct PageClient {
    settings: PageSettings,
    document: PageDocument,
    chunks: Vec<String>,
    current_index: usize,
    chunk_highlight: Option<ChunkHighlight>,
    quick_wrapper: Option<Vec<String>>,
    last_selection: Option<Vec<String>>,
    underline: Option<UnderlineHost>,
    bubble: QuickSpeakBubble,
}

impl PageClient {
    pub fn new(settings: PageSettings, document: PageDocument) -> Self {
        let bubble = QuickSpeakBubble::new(settings.bubble_idle, settings.bubble_leave);
        Self {
            settings,
            document,
            chunks: Vec::new(),
            current_index: 0,
            chunk_highlight: None,
            quick_wrapper: None,
            last_selection: None,
            underline: None,
            bubble,
        }
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn highlighted_chunk(&self) -> Option<usize> {
        self.chunk_highlight.map(|highlight| highlight.chunk)
    }

    pub fn bubble(&self) -> &QuickSpeakBubble {
        &self.bubble
    }

    pub fn has_quick_wrapper(&self) -> bool {
        self.quick_wrapper.is_some()
    }

    /// Extract, chunk and hand the text to the coordinator. The first chunk is
    /// highlighted right away.
    pub fn start_reader(
        &mut self,
        rate: Option<f32>,
        voice: Option<String>,
        effects: &mut Vec<PageEffect>,
    ) -> Reply {
        let text = self.document.extract_text();
        if text.trim().is_empty() {
            warn!("No text found to read");
            return Reply::rejected("no_text", "No text to read");
        }

        let chunks = split_into_chunks(&text, self.settings.chunk_max_chars);
        let total = chunks.len();
        info!(total, "Reader initialized");
        self.chunks = chunks.clone();
        self.current_index = 0;
        self.highlight_chunk(0, effects);
        effects.push(PageEffect::Send(Command::StartSession {
            chunks,
            rate,
            voice,
        }));
        Reply::started(total)
    }

    pub fn on_notification(&mut self, notification: &Notification, effects: &mut Vec<PageEffect>) {
        match *notification {
            Notification::Progress { current_index, .. } => {
                self.current_index = current_index;
                self.highlight_chunk(current_index, effects);
            }
            Notification::Finished => {
                self.clear_chunk_highlight(effects);
                self.current_index = 0;
            }
            Notification::Word {
                chunk_index,
                char_index,
                char_length,
            } => self.underline_session_word(chunk_index, char_index, char_length, effects),
            Notification::QuickStart => {
                if self.quick_wrapper.is_none() {
                    if let Some(segments) = self.last_selection.clone() {
                        effects.push(PageEffect::WrapSelection);
                        self.quick_wrapper = Some(segments);
                    }
                }
                if self.underline == Some(UnderlineHost::QuickWrapper) {
                    self.clear_underline(effects);
                }
            }
            Notification::QuickWord {
                char_index,
                char_length,
            } => {
                let Some(segments) = self.quick_wrapper.as_ref() else {
                    return;
                };
                let Some(plan) = underline_ranges(segments, char_index, char_length) else {
                    return;
                };
                self.replace_underline(UnderlineHost::QuickWrapper, plan, effects);
            }
            Notification::QuickEnd => self.clear_quick_highlight(effects),
        }
    }

    pub fn request_pause(&mut self, effects: &mut Vec<PageEffect>) -> Reply {
        effects.push(PageEffect::Send(Command::Pause));
        Reply::ok()
    }

    pub fn request_resume(&mut self, effects: &mut Vec<PageEffect>) -> Reply {
        effects.push(PageEffect::Send(Command::Resume));
        Reply::ok()
    }

    /// Relay a stop and drop every highlight on the page.
    pub fn request_stop(&mut self, effects: &mut Vec<PageEffect>) -> Reply {
        effects.push(PageEffect::Send(Command::Stop));
        self.clear_chunk_highlight(effects);
        self.clear_quick_highlight(effects);
        Reply::ok()
    }

    /// Relay a seek, moving the highlight before the coordinator confirms.
    pub fn request_seek(&mut self, index: usize, effects: &mut Vec<PageEffect>) -> Reply {
        self.current_index = index;
        self.highlight_chunk(index, effects);
        effects.push(PageEffect::Send(Command::Seek { index }));
        Reply::ok()
    }

    pub fn request_set_rate(&mut self, rate: f32, effects: &mut Vec<PageEffect>) -> Reply {
        effects.push(PageEffect::Send(Command::SetRate { rate }));
        Reply::ok()
    }

    pub fn request_set_voice(&mut self, voice: String, effects: &mut Vec<PageEffect>) -> Reply {
        effects.push(PageEffect::Send(Command::SetVoice { voice }));
        Reply::ok()
    }

    /// Mouse released. A non-empty selection gets wrapped and offered for
    /// quick speak; an empty one dismisses the bubble.
    pub fn selection_released(
        &mut self,
        selection: Option<Selection>,
        now: Duration,
        effects: &mut Vec<PageEffect>,
    ) {
        let Some(selection) = selection.filter(|selection| !selection.text().is_empty()) else {
            if self.bubble.dismiss() {
                effects.push(PageEffect::HideBubble);
                self.clear_quick_highlight(effects);
            }
            return;
        };

        self.clear_quick_highlight(effects);
        let text = selection.text();
        debug!(chars = text.chars().count(), "Offering quick speak");
        effects.push(PageEffect::WrapSelection);
        self.quick_wrapper = Some(selection.segments.clone());
        self.last_selection = Some(selection.segments);
        let position = self
            .bubble
            .show(text, selection.rect, selection.scroll_y, now);
        effects.push(PageEffect::ShowBubble(position));
    }

    pub fn bubble_hover(&mut self, entered: bool, now: Duration) {
        if entered {
            self.bubble.hover_enter();
        } else {
            self.bubble.hover_leave(now);
        }
    }

    /// The wrapper stays so word events can underline inside it.
    pub fn bubble_activated(&mut self, effects: &mut Vec<PageEffect>) {
        if let Some(text) = self.bubble.activate() {
            effects.push(PageEffect::HideBubble);
            effects.push(PageEffect::Send(Command::SpeakAdHoc {
                text,
                rate: None,
                voice: None,
            }));
        }
    }

    pub fn click_elsewhere(&mut self, effects: &mut Vec<PageEffect>) {
        if !self.bubble.is_visible() && self.quick_wrapper.is_some() {
            self.clear_quick_highlight(effects);
        }
    }

    pub fn tick(&mut self, now: Duration, effects: &mut Vec<PageEffect>) {
        if self.bubble.tick(now) {
            effects.push(PageEffect::HideBubble);
            self.clear_quick_highlight(effects);
        }
    }

    fn highlight_chunk(&mut self, index: usize, effects: &mut Vec<PageEffect>) {
        self.clear_chunk_highlight(effects);
        let Some(chunk) = self.chunks.get(index) else {
            return;
        };
        let Some(target) = highlight_target(
            self.document.text_nodes(),
            chunk,
            self.settings.highlight_prefix_chars,
        ) else {
            debug!(index, "Chunk not found in document; no highlight");
            return;
        };
        effects.push(PageEffect::HighlightNode { node: target.node });
        effects.push(PageEffect::ScrollNodeIntoView { node: target.node });
        self.chunk_highlight = Some(ChunkHighlight {
            chunk: index,
            target,
        });
    }

    fn clear_chunk_highlight(&mut self, effects: &mut Vec<PageEffect>) {
        if matches!(self.underline, Some(UnderlineHost::Node(_))) {
            self.clear_underline(effects);
        }
        if let Some(highlight) = self.chunk_highlight.take() {
            effects.push(PageEffect::ClearNodeHighlight {
                node: highlight.target.node,
            });
        }
    }

    /// Underline a word of the chunk being read. The chunk may continue past
    /// its anchor node (inline markup), so the plan covers the anchor and the
    /// nodes after it in the same block. Offsets past that text are ignored.
    fn underline_session_word(
        &mut self,
        chunk_index: usize,
        char_index: usize,
        char_length: usize,
        effects: &mut Vec<PageEffect>,
    ) {
        let Some(highlight) = self.chunk_highlight.filter(|h| h.chunk == chunk_index) else {
            return;
        };
        let Some(start) = highlight
            .target
            .offset
            .and_then(|offset| offset.checked_add(char_index))
        else {
            return;
        };
        let anchor = highlight.target.node;
        let Some(block) = self.document.text_nodes().get(anchor).map(|node| node.block) else {
            return;
        };
        let run: Vec<&TextNode> = self.document.text_nodes()[anchor..]
            .iter()
            .take_while(|node| node.block == block)
            .collect();
        let run_len: usize = run.iter().map(|node| utf16_len(&node.text)).sum();
        if start >= run_len {
            debug!(chunk_index, char_index, "Word boundary outside the highlighted text");
            return;
        }
        let Some(mut plan) = underline_ranges(&run, start, char_length) else {
            return;
        };
        for range in &mut plan.runs {
            range.node += anchor;
        }
        self.replace_underline(UnderlineHost::Node(anchor), plan, effects);
    }

    fn replace_underline(
        &mut self,
        host: UnderlineHost,
        plan: UnderlinePlan,
        effects: &mut Vec<PageEffect>,
    ) {
        self.clear_underline(effects);
        effects.push(PageEffect::Underline { host, plan });
        self.underline = Some(host);
    }

    fn clear_underline(&mut self, effects: &mut Vec<PageEffect>) {
        if let Some(host) = self.underline.take() {
            effects.push(PageEffect::ClearUnderline { host });
        }
    }

    fn clear_quick_highlight(&mut self, effects: &mut Vec<PageEffect>) {
        if self.underline == Some(UnderlineHost::QuickWrapper) {
            self.clear_underline(effects);
        }
        if self.quick_wrapper.take().is_some() {
            effects.push(PageEffect::UnwrapQuickWrapper);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::highlight::NodeRange;

    const PAGE: &str = "<html><body>\
        <p>The first sentence. The second sentence!</p>\
        <p>A final paragraph</p>\
        </body></html>";

    fn client() -> PageClient {
        PageClient::new(PageSettings::default(), PageDocument::parse(PAGE))
    }

    fn selection(segments: &[&str]) -> Selection {
        Selection {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            rect: Rect {
                left: 10.0,
                top: 100.0,
                width: 20.0,
                height: 12.0,
            },
            scroll_y: 0.0,
        }
    }

    #[test]
    fn start_reader_chunks_highlights_and_sends() {
        let mut client = client();
        let mut effects = Vec::new();
        let reply = client.start_reader(Some(1.5), None, &mut effects);

        assert_eq!(reply, Reply::started(3));
        assert_eq!(
            client.chunks(),
            ["The first sentence.", "The second sentence!", "A final paragraph"]
        );
        assert_eq!(
            effects,
            vec![
                PageEffect::HighlightNode { node: 0 },
                PageEffect::ScrollNodeIntoView { node: 0 },
                PageEffect::Send(Command::StartSession {
                    chunks: client.chunks().to_vec(),
                    rate: Some(1.5),
                    voice: None,
                }),
            ]
        );
    }

    #[test]
    fn blank_page_reports_no_text() {
        let mut client = PageClient::new(
            PageSettings::default(),
            PageDocument::parse("<body><script>x()</script></body>"),
        );
        let mut effects = Vec::new();
        let reply = client.start_reader(None, None, &mut effects);
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("No text to read"));
        assert!(effects.is_empty());
    }

    #[test]
    fn progress_moves_the_highlight() {
        let mut client = client();
        let mut effects = Vec::new();
        client.start_reader(None, None, &mut effects);
        effects.clear();

        client.on_notification(
            &Notification::Progress {
                current_index: 2,
                total_chunks: 3,
            },
            &mut effects,
        );
        assert_eq!(
            effects,
            vec![
                PageEffect::ClearNodeHighlight { node: 0 },
                PageEffect::HighlightNode { node: 1 },
                PageEffect::ScrollNodeIntoView { node: 1 },
            ]
        );
        assert_eq!(client.highlighted_chunk(), Some(2));

        effects.clear();
        client.on_notification(
            &Notification::Progress {
                current_index: 3,
                total_chunks: 3,
            },
            &mut effects,
        );
        assert_eq!(effects, vec![PageEffect::ClearNodeHighlight { node: 1 }]);
        assert_eq!(client.highlighted_chunk(), None);
    }

    #[test]
    fn session_words_follow_the_chunk_into_inline_markup() {
        let page = "<html><body>\
            <p>This is a fairly long opening sentence fragment that keeps <b>going</b> on.</p>\
            <p>Next paragraph.</p>\
            </body></html>";
        let mut client = PageClient::new(PageSettings::default(), PageDocument::parse(page));
        let mut effects = Vec::new();
        client.start_reader(None, None, &mut effects);
        effects.clear();

        client.on_notification(
            &Notification::Word {
                chunk_index: 0,
                char_index: 59,
                char_length: 5,
            },
            &mut effects,
        );
        assert_eq!(
            effects,
            vec![PageEffect::Underline {
                host: UnderlineHost::Node(0),
                plan: UnderlinePlan {
                    runs: vec![NodeRange {
                        node: 1,
                        start: 0,
                        end: 5
                    }]
                },
            }]
        );

        effects.clear();
        client.on_notification(
            &Notification::Word {
                chunk_index: 0,
                char_index: 68,
                char_length: 4,
            },
            &mut effects,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn out_of_range_word_offsets_are_ignored() {
        let mut client = client();
        let mut effects = Vec::new();
        client.start_reader(None, None, &mut effects);
        client.on_notification(
            &Notification::Progress {
                current_index: 1,
                total_chunks: 3,
            },
            &mut effects,
        );
        effects.clear();

        for char_index in [usize::MAX, usize::MAX - 20, 40] {
            client.on_notification(
                &Notification::Word {
                    chunk_index: 1,
                    char_index,
                    char_length: 1,
                },
                &mut effects,
            );
        }
        assert!(effects.is_empty());
    }

    #[test]
    fn session_words_underline_inside_the_chunk() {
        let mut client = client();
        let mut effects = Vec::new();
        client.start_reader(None, None, &mut effects);
        client.on_notification(
            &Notification::Progress {
                current_index: 1,
                total_chunks: 3,
            },
            &mut effects,
        );
        effects.clear();

        client.on_notification(
            &Notification::Word {
                chunk_index: 1,
                char_index: 4,
                char_length: 6,
            },
            &mut effects,
        );
        assert_eq!(
            effects,
            vec![PageEffect::Underline {
                host: UnderlineHost::Node(0),
                plan: UnderlinePlan {
                    runs: vec![NodeRange {
                        node: 0,
                        start: 24,
                        end: 30
                    }]
                },
            }]
        );

        effects.clear();
        client.on_notification(
            &Notification::Word {
                chunk_index: 0,
                char_index: 0,
                char_length: 3,
            },
            &mut effects,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn quick_speak_flow_wraps_underlines_and_unwraps() {
        let mut client = client();
        let mut effects = Vec::new();
        client.selection_released(
            Some(selection(&["first ", "sentence"])),
            Duration::ZERO,
            &mut effects,
        );
        assert_eq!(
            effects,
            vec![
                PageEffect::WrapSelection,
                PageEffect::ShowBubble(BubblePosition { x: 20.0, y: 50.0 }),
            ]
        );

        effects.clear();
        client.bubble_activated(&mut effects);
        assert_eq!(
            effects,
            vec![
                PageEffect::HideBubble,
                PageEffect::Send(Command::SpeakAdHoc {
                    text: "first sentence".into(),
                    rate: None,
                    voice: None,
                }),
            ]
        );

        effects.clear();
        client.on_notification(&Notification::QuickStart, &mut effects);
        client.on_notification(
            &Notification::QuickWord {
                char_index: 4,
                char_length: 4,
            },
            &mut effects,
        );
        client.on_notification(&Notification::QuickEnd, &mut effects);
        assert_eq!(
            effects,
            vec![
                PageEffect::Underline {
                    host: UnderlineHost::QuickWrapper,
                    plan: UnderlinePlan {
                        runs: vec![
                            NodeRange {
                                node: 0,
                                start: 4,
                                end: 6
                            },
                            NodeRange {
                                node: 1,
                                start: 0,
                                end: 2
                            },
                        ]
                    },
                },
                PageEffect::ClearUnderline {
                    host: UnderlineHost::QuickWrapper
                },
                PageEffect::UnwrapQuickWrapper,
            ]
        );
        assert!(!client.has_quick_wrapper());
    }

    #[test]
    fn empty_selection_dismisses_bubble_and_wrapper() {
        let mut client = client();
        let mut effects = Vec::new();
        client.selection_released(Some(selection(&["word"])), Duration::ZERO, &mut effects);
        effects.clear();

        client.selection_released(Some(selection(&["  "])), Duration::ZERO, &mut effects);
        assert_eq!(
            effects,
            vec![PageEffect::HideBubble, PageEffect::UnwrapQuickWrapper]
        );
        assert!(!client.bubble().is_visible());
    }

    #[test]
    fn idle_bubble_times_out() {
        let mut client = client();
        let mut effects = Vec::new();
        client.selection_released(Some(selection(&["word"])), Duration::ZERO, &mut effects);
        client.bubble_hover(true, Duration::from_secs(1));
        client.bubble_hover(false, Duration::from_secs(2));
        effects.clear();

        client.tick(Duration::from_millis(4_999), &mut effects);
        assert!(effects.is_empty());
        client.tick(Duration::from_secs(5), &mut effects);
        assert_eq!(
            effects,
            vec![PageEffect::HideBubble, PageEffect::UnwrapQuickWrapper]
        );
    }

    #[test]
    fn click_elsewhere_clears_orphaned_wrapper() {
        let mut client = client();
        let mut effects = Vec::new();
        client.selection_released(Some(selection(&["word"])), Duration::ZERO, &mut effects);
        client.click_elsewhere(&mut effects);
        assert!(client.has_quick_wrapper());

        client.bubble_activated(&mut effects);
        effects.clear();
        client.click_elsewhere(&mut effects);
        assert_eq!(effects, vec![PageEffect::UnwrapQuickWrapper]);
    }

    #[test]
    fn stop_relays_and_clears_everything() {
        let mut client = client();
        let mut effects = Vec::new();
        client.start_reader(None, None, &mut effects);
        client.selection_released(Some(selection(&["word"])), Duration::ZERO, &mut effects);
        effects.clear();

        assert_eq!(client.request_stop(&mut effects), Reply::ok());
        assert_eq!(
            effects,
            vec![
                PageEffect::Send(Command::Stop),
                PageEffect::ClearNodeHighlight { node: 0 },
                PageEffect::UnwrapQuickWrapper,
            ]
        );
    }

    #[test]
    fn seek_highlights_before_relaying() {
        let mut client = client();
        let mut effects = Vec::new();
        client.start_reader(None, None, &mut effects);
        effects.clear();

        client.request_seek(2, &mut effects);
        assert_eq!(client.current_index(), 2);
        assert_eq!(
            effects.last(),
            Some(&PageEffect::Send(Command::Seek { index: 2 }))
        );
        assert!(effects.contains(&PageEffect::HighlightNode { node: 1 }));
    }
}
