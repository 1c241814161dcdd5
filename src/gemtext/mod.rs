//! Gemtext: the line-oriented document format carried in Gemini response bodies.
//!
//! A document is an ordered sequence of [`Line`]s. [`Builder`] assembles lines
//! into wire text; [`parse`] classifies raw text back into lines.
//!
//! | Prefix  | Line kind                    |
//! |---------|------------------------------|
//! | ```` ``` ```` | preformatted block toggle (rest of line is alt text) |
//! | `###`   | [`Line::Header3`]            |
//! | `##`    | [`Line::Header2`]            |
//! | `#`     | [`Line::Header1`]            |
//! | `=>`    | [`Line::Link`]               |
//! | `*`     | [`Line::ListItem`]           |
//! | `>`     | [`Line::Quote`]              |
//! | other   | [`Line::Text`]               |
//!
//! # Examples
//!
//! ```
//! use rmini::gemtext::{self, Builder, Line};
//!
//! let source = Builder::new()
//!     .add_header1_line("Hello")
//!     .add_link_line("gemini://example.com/", Some("Example"))
//!     .get();
//!
//! let lines = gemtext::parse(&source).unwrap();
//! assert_eq!(lines[0], Line::Header1 { text: "Hello".into() });
//! ```

use serde::{Deserialize, Serialize};

pub mod builder;
pub mod parser;

pub use builder::Builder;
pub use parser::{FormatError, parse};

/// Marker that opens and closes a preformatted block.
pub const FENCE: &str = "```";

/// One semantic line of a Gemtext document.
///
/// Preformatted blocks are a single `Line` even though they span several
/// lines of wire text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Line {
    /// Plain text, kept verbatim (including empty lines).
    Text { text: String },
    /// A hyperlink with an optional human-readable label.
    Link {
        destination: String,
        label: Option<String>,
    },
    /// A preformatted block; `body` keeps its inner lines joined by CRLF.
    Preformatted { alt_text: String, body: String },
    Header1 { text: String },
    Header2 { text: String },
    Header3 { text: String },
    /// An item of an unordered list.
    ListItem { text: String },
    Quote { text: String },
}

impl Line {
    /// Returns the textual content of the line.
    ///
    /// For links this is the label when present, otherwise the destination;
    /// for preformatted blocks it is the body.
    pub fn text(&self) -> &str {
        match self {
            Self::Link {
                destination,
                label,
            } => label.as_deref().unwrap_or(destination),
            Self::Preformatted { body, .. } => body,
            Self::Text { text }
            | Self::Header1 { text }
            | Self::Header2 { text }
            | Self::Header3 { text }
            | Self::ListItem { text }
            | Self::Quote { text } => text,
        }
    }

    /// Returns `true` for the three header levels.
    pub fn is_header(&self) -> bool {
        matches!(
            self,
            Self::Header1 { .. } | Self::Header2 { .. } | Self::Header3 { .. }
        )
    }
}

/// Serializes parsed lines back into Gemtext wire text.
pub fn render(lines: &[Line]) -> String {
    let mut builder = Builder::new();
    for line in lines {
        builder.add_line(line.clone());
    }
    builder.get()
}
