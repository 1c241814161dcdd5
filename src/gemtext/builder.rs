//! Fluent construction of Gemtext documents.

use crate::protocol::LINE_TERMINATOR;

use super::{FENCE, Line};

/// Accumulates Gemtext lines and serializes them with [`get`](Self::get).
///
/// Every mutator returns `&mut Self` so calls can be chained.
///
/// # Examples
///
/// ```
/// use rmini::gemtext::Builder;
///
/// let mut builder = Builder::new();
/// builder
///     .add_header1_line("Gemtext")
///     .add_text_line("Text Lines")
///     .add_unordered_list(["Item 1", "Item 2"]);
///
/// assert_eq!(builder.get(), "# Gemtext\r\nText Lines\r\n* Item 1\r\n* Item 2");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    lines: Vec<String>,
}

impl Builder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plain text line, verbatim.
    pub fn add_text_line(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.to_owned());
        self
    }

    /// Appends a link line: `=> <url>` or `=> <url> <label>`.
    ///
    /// An empty label is treated as no label.
    pub fn add_link_line(&mut self, url: &str, label: Option<&str>) -> &mut Self {
        match label.filter(|l| !l.is_empty()) {
            Some(label) => self.lines.push(format!("=> {url} {label}")),
            None => self.lines.push(format!("=> {url}")),
        }
        self
    }

    /// Wraps `body` in a pair of fence markers.
    ///
    /// The body is not scanned: a line inside it that starts with a fence
    /// marker will end the block early when the document is parsed.
    pub fn add_preformatted(&mut self, body: &str) -> &mut Self {
        self.add_preformatted_with_alt("", body)
    }

    /// Like [`add_preformatted`](Self::add_preformatted), with alt text after the opening fence.
    pub fn add_preformatted_with_alt(&mut self, alt_text: &str, body: &str) -> &mut Self {
        self.lines.push(format!("{FENCE}{alt_text}"));
        self.lines.push(body.to_owned());
        self.lines.push(FENCE.to_owned());
        self
    }

    pub fn add_header1_line(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("# {text}"));
        self
    }

    pub fn add_header2_line(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("## {text}"));
        self
    }

    pub fn add_header3_line(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("### {text}"));
        self
    }

    /// Appends one `* item` line per item, in order.
    pub fn add_unordered_list<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in items {
            self.lines.push(format!("* {}", item.as_ref()));
        }
        self
    }

    pub fn add_quote_line(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("> {text}"));
        self
    }

    /// Appends an already-classified [`Line`].
    pub fn add_line(&mut self, line: Line) -> &mut Self {
        match line {
            Line::Text { text } => self.add_text_line(&text),
            Line::Link { destination, label } => {
                self.add_link_line(&destination, label.as_deref())
            }
            Line::Preformatted { alt_text, body } => self.add_preformatted_with_alt(&alt_text, &body),
            Line::Header1 { text } => self.add_header1_line(&text),
            Line::Header2 { text } => self.add_header2_line(&text),
            Line::Header3 { text } => self.add_header3_line(&text),
            Line::ListItem { text } => self.add_unordered_list([text]),
            Line::Quote { text } => self.add_quote_line(&text),
        }
    }

    /// Number of wire lines accumulated so far.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Serializes the accumulated lines, joined by CRLF.
    ///
    /// Does not consume or reset the builder.
    pub fn get(&self) -> String {
        self.lines.join(LINE_TERMINATOR)
    }
}
