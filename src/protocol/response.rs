//! Response framing: `<status> <meta>\r\n` followed by an optional body.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{CRLF, StatusCode, find_crlf};
use crate::gemtext::{self, FormatError, Line};

/// Errors that can occur while decoding a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response has no terminated status line")]
    MissingHeader,

    #[error("status line is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("invalid status code {0:?}")]
    InvalidStatus(String),

    #[error("response is not gemtext (status {status}, meta {meta:?})")]
    NotGemtext { status: u8, meta: String },

    #[error("invalid gemtext body: {0}")]
    Format(#[from] FormatError),
}

/// Serializes a complete response into a buffer ready for the wire.
///
/// The body is written verbatim after the status line; pass an empty slice
/// for statuses that carry none.
///
/// # Examples
///
/// ```
/// use rmini::protocol::response::encode;
///
/// let bytes = encode(20, "text/gemini", b"# Hi");
/// assert_eq!(&bytes[..], b"20 text/gemini\r\n# Hi");
/// ```
pub fn encode(status: u8, meta: &str, body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(8 + meta.len() + body.len());
    buf.put(format!("{status} {meta}").as_bytes());
    buf.put(CRLF);
    buf.put(body);
    buf
}

/// A response received by the client.
///
/// Immutable once decoded.
#[derive(Debug, Clone)]
pub struct Response {
    status: u8,
    meta: String,
    body: Bytes,
}

impl Response {
    /// Decodes a complete response read up to end-of-stream.
    ///
    /// The status line is split on whitespace: the first token is the
    /// two-digit status, the remaining tokens joined by single spaces form the
    /// meta field. Everything after the first CRLF is the body.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::MissingHeader`]: no CRLF in the response.
    /// - [`ResponseError::InvalidUtf8`]: the status line is not UTF-8.
    /// - [`ResponseError::InvalidStatus`]: the status is not a two-digit number.
    pub fn parse(raw: Bytes) -> Result<Self, ResponseError> {
        let end = find_crlf(&raw).ok_or(ResponseError::MissingHeader)?;
        let header = std::str::from_utf8(&raw[..end])?;

        let mut tokens = header.split_whitespace();
        let code = tokens.next().unwrap_or_default();
        let status = match code.parse::<u8>() {
            Ok(status) if code.len() == 2 => status,
            _ => return Err(ResponseError::InvalidStatus(code.to_owned())),
        };
        let meta = tokens.collect::<Vec<_>>().join(" ");

        Ok(Self {
            status,
            meta,
            body: raw.slice(end + CRLF.len()..),
        })
    }

    /// Numeric status code.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// The status as a known [`StatusCode`], if it is one.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u8(self.status)
    }

    /// MIME type on success, prompt on input, error message otherwise.
    pub fn meta(&self) -> &str {
        &self.meta
    }

    /// Returns `true` for `2x` statuses.
    pub fn is_success(&self) -> bool {
        self.status / 10 == 2
    }

    /// MIME type of the body, for successful responses.
    pub fn mime(&self) -> Option<&str> {
        self.is_success().then_some(self.meta.as_str())
    }

    /// Raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Parses a `text/gemini` body into lines.
    ///
    /// # Errors
    ///
    /// [`ResponseError::NotGemtext`] when the response is not a gemtext
    /// success; otherwise UTF-8 or format errors from the body.
    pub fn gemtext(&self) -> Result<Vec<Line>, ResponseError> {
        let is_gemtext = self
            .mime()
            .and_then(|m| m.split(';').next())
            .is_some_and(|m| m.trim() == super::GEMTEXT_MIME);
        if !is_gemtext {
            return Err(ResponseError::NotGemtext {
                status: self.status,
                meta: self.meta.clone(),
            });
        }
        Ok(gemtext::parse(self.text()?)?)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}
