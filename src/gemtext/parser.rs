//! Gemtext parsing: classify raw text into [`Line`]s.

use thiserror::Error;

use crate::protocol::LINE_TERMINATOR;

use super::{FENCE, Line};

/// Errors produced while parsing Gemtext.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A `=>` line with nothing after the marker.
    #[error("missing destination for link line {line}")]
    MissingDestination { line: usize },

    /// The document ended inside a preformatted block.
    #[error("unclosed preformatting block opened on line {line}")]
    UnclosedPreformatted { line: usize },
}

// State of an open preformatted block.
struct Block {
    opened_at: usize,
    alt_text: String,
    body: Vec<String>,
}

/// Parses `source` into an ordered list of [`Line`]s.
///
/// Lines are split on CRLF only; a bare `\n` stays part of its line. Prefixes are
/// matched longest first, so `### x` is always a level-3 header. Inside a
/// preformatted block every line is taken verbatim until the closing fence.
///
/// An empty source yields an empty document.
///
/// # Errors
///
/// - [`FormatError::MissingDestination`]: a link line has no destination.
/// - [`FormatError::UnclosedPreformatted`]: the input ended inside a block;
///   no partial block is returned.
///
/// # Examples
///
/// ```
/// use rmini::gemtext::{parse, Line};
///
/// let lines = parse("```alt\r\nbody\r\n```").unwrap();
/// assert_eq!(
///     lines,
///     vec![Line::Preformatted { alt_text: "alt".into(), body: "body".into() }]
/// );
/// ```
pub fn parse(source: &str) -> Result<Vec<Line>, FormatError> {
    let mut lines = Vec::new();
    if source.is_empty() {
        return Ok(lines);
    }

    let mut block: Option<Block> = None;

    for (index, raw) in source.split(LINE_TERMINATOR).enumerate() {
        let number = index + 1;

        match block.take() {
            Some(mut open) if !raw.starts_with(FENCE) => {
                open.body.push(raw.to_owned());
                block = Some(open);
                continue;
            }
            Some(open) => {
                lines.push(Line::Preformatted {
                    alt_text: open.alt_text,
                    body: open.body.join(LINE_TERMINATOR),
                });
                continue;
            }
            None => {}
        }

        if let Some(alt) = raw.strip_prefix(FENCE) {
            block = Some(Block {
                opened_at: number,
                alt_text: alt.to_owned(),
                body: Vec::new(),
            });
            continue;
        }

        lines.push(classify(raw, number)?);
    }

    match block {
        Some(open) => Err(FormatError::UnclosedPreformatted {
            line: open.opened_at,
        }),
        None => Ok(lines),
    }
}

// Classify a line outside a preformatted block. Longer prefixes are tested
// first so that "###" never reads as a level-1 header.
fn classify(raw: &str, number: usize) -> Result<Line, FormatError> {
    if let Some(rest) = raw.strip_prefix("###") {
        return Ok(Line::Header3 {
            text: trim(rest).to_owned(),
        });
    }
    if let Some(rest) = raw.strip_prefix("##") {
        return Ok(Line::Header2 {
            text: trim(rest).to_owned(),
        });
    }
    if let Some(rest) = raw.strip_prefix('#') {
        return Ok(Line::Header1 {
            text: trim(rest).to_owned(),
        });
    }
    if let Some(rest) = raw.strip_prefix("=>") {
        return parse_link(rest, number);
    }
    if let Some(rest) = raw.strip_prefix('*') {
        return Ok(Line::ListItem {
            text: trim(rest).to_owned(),
        });
    }
    if let Some(rest) = raw.strip_prefix('>') {
        return Ok(Line::Quote {
            text: trim(rest).to_owned(),
        });
    }
    Ok(Line::Text {
        text: raw.to_owned(),
    })
}

// The destination may follow the marker directly: `=>dest` is a link.
fn parse_link(rest: &str, number: usize) -> Result<Line, FormatError> {
    let rest = rest.trim_start();
    let destination = rest
        .split_whitespace()
        .next()
        .ok_or(FormatError::MissingDestination { line: number })?;

    let label = trim(&rest[destination.len()..]);
    Ok(Line::Link {
        destination: destination.to_owned(),
        label: (!label.is_empty()).then(|| label.to_owned()),
    })
}

fn trim(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Line {
        Line::Text { text: s.into() }
    }

    #[test]
    fn plain_text() {
        let lines = parse("Text Line 1\r\nText Line 2").unwrap();
        assert_eq!(lines, vec![text("Text Line 1"), text("Text Line 2")]);
    }

    #[test]
    fn empty_lines_are_text() {
        let lines = parse("a\r\n\r\nb").unwrap();
        assert_eq!(lines, vec![text("a"), text(""), text("b")]);
    }

    #[test]
    fn empty_source_is_empty_document() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn bare_newline_stays_in_its_line() {
        assert_eq!(parse("a\nb").unwrap(), vec![text("a\nb")]);
        assert_eq!(
            parse("```\r\nfn main() {\n}\r\n```").unwrap(),
            vec![Line::Preformatted {
                alt_text: "".into(),
                body: "fn main() {\n}".into(),
            }]
        );
    }

    #[test]
    fn alt_text_is_kept_verbatim() {
        assert_eq!(
            parse("``` rust \r\nx\r\n```").unwrap(),
            vec![Line::Preformatted {
                alt_text: " rust ".into(),
                body: "x".into(),
            }]
        );
    }

    #[test]
    fn link_destination_may_touch_marker() {
        assert_eq!(
            parse("=>gemini://example.com Example").unwrap(),
            vec![Line::Link {
                destination: "gemini://example.com".into(),
                label: Some("Example".into()),
            }]
        );
    }

    #[test]
    fn links() {
        let source = "=> gemini://example.com\r\n=> gemini://example.com Example link\r\n=>    gemini://example.com \tWeird Spacing";
        let lines = parse(source).unwrap();
        assert_eq!(
            lines,
            vec![
                Line::Link {
                    destination: "gemini://example.com".into(),
                    label: None,
                },
                Line::Link {
                    destination: "gemini://example.com".into(),
                    label: Some("Example link".into()),
                },
                Line::Link {
                    destination: "gemini://example.com".into(),
                    label: Some("Weird Spacing".into()),
                },
            ]
        );
    }

    #[test]
    fn link_label_keeps_inner_spacing() {
        let lines = parse("=>   dest   label text").unwrap();
        assert_eq!(
            lines,
            vec![Line::Link {
                destination: "dest".into(),
                label: Some("label text".into()),
            }]
        );
    }

    #[test]
    fn link_without_destination_is_error() {
        assert_eq!(
            parse("ok\r\n=>   "),
            Err(FormatError::MissingDestination { line: 2 })
        );
        assert_eq!(
            parse("=>"),
            Err(FormatError::MissingDestination { line: 1 })
        );
    }

    #[test]
    fn preformatted_blocks() {
        let source = "```\r\ntext\r\nline2\r\n```\r\n```alt-text\r\nbody\r\n```";
        let lines = parse(source).unwrap();
        assert_eq!(
            lines,
            vec![
                Line::Preformatted {
                    alt_text: "".into(),
                    body: "text\r\nline2".into(),
                },
                Line::Preformatted {
                    alt_text: "alt-text".into(),
                    body: "body".into(),
                },
            ]
        );
    }

    #[test]
    fn preformatted_body_is_not_classified() {
        let source = "```\r\n# not a header\r\n=> not a link\r\n* nor a list\r\n```";
        let lines = parse(source).unwrap();
        assert_eq!(
            lines,
            vec![Line::Preformatted {
                alt_text: "".into(),
                body: "# not a header\r\n=> not a link\r\n* nor a list".into(),
            }]
        );
    }

    #[test]
    fn unclosed_block_is_error() {
        assert_eq!(
            parse("intro\r\n```alt\r\nbody"),
            Err(FormatError::UnclosedPreformatted { line: 2 })
        );
    }

    #[test]
    fn headers_match_longest_prefix() {
        let lines = parse("# Header 1\r\n## Header 2\r\n### Header 3").unwrap();
        assert_eq!(
            lines,
            vec![
                Line::Header1 {
                    text: "Header 1".into()
                },
                Line::Header2 {
                    text: "Header 2".into()
                },
                Line::Header3 {
                    text: "Header 3".into()
                },
            ]
        );
    }

    #[test]
    fn header_without_space() {
        assert_eq!(
            parse("###x").unwrap(),
            vec![Line::Header3 { text: "x".into() }]
        );
    }

    #[test]
    fn list_items() {
        let lines = parse("* Item 1\r\n* Item 2").unwrap();
        assert_eq!(
            lines,
            vec![
                Line::ListItem {
                    text: "Item 1".into()
                },
                Line::ListItem {
                    text: "Item 2".into()
                },
            ]
        );
    }

    #[test]
    fn quotes() {
        let lines = parse("> Quotation 1\r\n>\tQuotation 2 ").unwrap();
        assert_eq!(
            lines,
            vec![
                Line::Quote {
                    text: "Quotation 1".into()
                },
                Line::Quote {
                    text: "Quotation 2".into()
                },
            ]
        );
    }
}
