//! Gemini/Titan wire protocol types and framing.
//!
//! This module provides the protocol primitives shared by the server and the
//! client: [`Scheme`], [`StatusCode`], request-line parsing
//! ([`request`]) and status-line framing ([`response`]).

use std::fmt;

pub mod request;
pub mod response;

pub use request::{RequestLineError, RequestTarget, UploadParams};
pub use response::{Response, ResponseError};

/// Line terminator used by requests, status lines, and Gemtext.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Byte form of [`LINE_TERMINATOR`].
pub const CRLF: &[u8] = b"\r\n";

/// Longest request URI accepted, excluding the terminator.
pub const MAX_REQUEST_LINE: usize = 1024;

/// Well-known Gemini port.
pub const DEFAULT_PORT: u16 = 1965;

/// MIME type of Gemtext bodies, and the default upload MIME type.
pub const GEMTEXT_MIME: &str = "text/gemini";

/// URI schemes understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain read-only requests.
    Gemini,
    /// Uploads: request line parameters followed by a fixed-length body.
    Titan,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Titan => "titan",
        }
    }

    /// Returns the scheme for a URI scheme string, if supported.
    pub fn from_uri_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "gemini" => Some(Self::Gemini),
            "titan" => Some(Self::Titan),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Gemini response status code.
///
/// Handlers may also respond with raw numeric codes; this enum names the ones
/// defined by the protocol.
///
/// # Examples
///
/// ```
/// use rmini::protocol::StatusCode;
///
/// let status = StatusCode::NotFound;
/// assert_eq!(status.as_u8(), 51);
/// assert_eq!(status.canonical_meta(), "Not Found");
/// assert_eq!(StatusCode::from_u8(20), Some(StatusCode::Success));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    // 1x Input
    Input = 10,
    SensitiveInput = 11,

    // 2x Success
    Success = 20,

    // 3x Redirect
    RedirectTemporary = 30,
    RedirectPermanent = 31,

    // 4x Temporary failure
    TemporaryFailure = 40,
    ServerUnavailable = 41,
    CgiError = 42,
    ProxyError = 43,
    SlowDown = 44,

    // 5x Permanent failure
    PermanentFailure = 50,
    NotFound = 51,
    Gone = 52,
    ProxyRequestRefused = 53,
    BadRequest = 59,

    // 6x Client certificates
    CertificateRequired = 60,
    CertificateNotAuthorized = 61,
    CertificateNotValid = 62,
}

impl StatusCode {
    /// Returns the numeric status code.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a numeric code to a known status.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            10 => Self::Input,
            11 => Self::SensitiveInput,
            20 => Self::Success,
            30 => Self::RedirectTemporary,
            31 => Self::RedirectPermanent,
            40 => Self::TemporaryFailure,
            41 => Self::ServerUnavailable,
            42 => Self::CgiError,
            43 => Self::ProxyError,
            44 => Self::SlowDown,
            50 => Self::PermanentFailure,
            51 => Self::NotFound,
            52 => Self::Gone,
            53 => Self::ProxyRequestRefused,
            59 => Self::BadRequest,
            60 => Self::CertificateRequired,
            61 => Self::CertificateNotAuthorized,
            62 => Self::CertificateNotValid,
            _ => return None,
        })
    }

    /// Default meta text for error statuses.
    pub fn canonical_meta(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::SensitiveInput => "Sensitive Input",
            Self::Success => GEMTEXT_MIME,
            Self::RedirectTemporary => "Redirect",
            Self::RedirectPermanent => "Moved Permanently",
            Self::TemporaryFailure => "Temporary Failure",
            Self::ServerUnavailable => "Server Unavailable",
            Self::CgiError => "CGI Error",
            Self::ProxyError => "Proxy Error",
            Self::SlowDown => "Slow Down",
            Self::PermanentFailure => "Permanent Failure",
            Self::NotFound => "Not Found",
            Self::Gone => "Gone",
            Self::ProxyRequestRefused => "Proxy Request Refused",
            Self::BadRequest => "Bad Request",
            Self::CertificateRequired => "Certificate Required",
            Self::CertificateNotAuthorized => "Certificate Not Authorized",
            Self::CertificateNotValid => "Certificate Not Valid",
        }
    }

    /// `1x`: the meta field is a prompt and no body follows.
    pub fn is_input(self) -> bool {
        self.as_u8() / 10 == 1
    }

    /// `2x`: the meta field is a MIME type and a body follows.
    pub fn is_success(self) -> bool {
        self.as_u8() / 10 == 2
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u8(), self.canonical_meta())
    }
}

impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> u8 {
        code.as_u8()
    }
}

/// Returns the index of the first CRLF in `buf`, if any.
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}
