//! Visible-text snapshot of an HTML document.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use unicode_normalization::UnicodeNormalization;

static RE_HIDDEN_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap()
});

const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

/// One visible, non-blank text node, numbered in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub index: usize,
    /// Raw node text, as the DOM holds it.
    pub text: String,
    pub parent_tag: String,
    /// Nodes between the same pair of line breaks share a block number.
    pub block: usize,
}

impl AsRef<str> for TextNode {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDocument {
    nodes: Vec<TextNode>,
    visible_text: String,
    selection: Option<String>,
}

impl PageDocument {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut collector = Collector::default();
        collector.walk(document.root_element());
        collector.finish()
    }

    /// Attach the user's current selection.
    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    pub fn text_nodes(&self) -> &[TextNode] {
        &self.nodes
    }

    /// Visible text with block elements on separate lines, horizontal
    /// whitespace collapsed and NFC applied.
    pub fn visible_text(&self) -> &str {
        &self.visible_text
    }

    /// The text reader mode speaks: a non-blank selection wins over the page.
    pub fn extract_text(&self) -> String {
        match self.selection.as_deref().map(str::trim) {
            Some(selection) if !selection.is_empty() => selection.nfc().collect(),
            _ => self.visible_text.clone(),
        }
    }
}

/// Collapse whitespace runs to single spaces and apply NFC.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .nfc()
        .collect()
}

#[derive(Default)]
struct Collector {
    nodes: Vec<TextNode>,
    lines: Vec<String>,
    line: String,
    block: usize,
}

impl Collector {
    fn walk(&mut self, element: ElementRef<'_>) {
        let tag = element.value().name();
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.push_text(text, tag);
            } else if let Some(child) = ElementRef::wrap(child) {
                if is_hidden(child) {
                    continue;
                }
                let name = child.value().name();
                if name == "br" {
                    self.break_line();
                    continue;
                }
                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    self.break_line();
                }
                self.walk(child);
                if is_block {
                    self.break_line();
                }
            }
        }
    }

    fn push_text(&mut self, text: &str, parent_tag: &str) {
        if text.trim().is_empty() {
            if !self.line.is_empty() {
                self.line.push(' ');
            }
            return;
        }
        self.nodes.push(TextNode {
            index: self.nodes.len(),
            text: text.to_string(),
            parent_tag: parent_tag.to_string(),
            block: self.block,
        });
        self.line.push_str(text);
    }

    fn break_line(&mut self) {
        let line = normalize_text(&self.line);
        if !line.is_empty() {
            self.lines.push(line);
        }
        self.line.clear();
        self.block += 1;
    }

    fn finish(mut self) -> PageDocument {
        self.break_line();
        PageDocument {
            nodes: self.nodes,
            visible_text: self.lines.join("\n"),
            selection: None,
        }
    }
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    SKIPPED_TAGS.contains(&value.name())
        || value.attr("hidden").is_some()
        || value
            .attr("aria-hidden")
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"))
        || value
            .attr("style")
            .is_some_and(|style| RE_HIDDEN_STYLE.is_match(style))
}
