//! Request-line parsing for the Gemini and Titan schemes.

use std::collections::HashMap;
use std::str;

use thiserror::Error;
use url::Url;

use super::{GEMTEXT_MIME, Scheme, StatusCode};

/// Errors that can occur while reading or parsing a request line.
///
/// Every variant is answered with a `59` status; [`meta`](Self::meta) gives the
/// text written on the wire.
#[derive(Debug, Error)]
pub enum RequestLineError {
    #[error("request line exceeds {max} bytes")]
    TooLong { max: usize },

    #[error("connection closed before the request line was complete")]
    Closed,

    #[error("failed to read request: {0}")]
    Read(#[source] std::io::Error),

    #[error("request line is not valid UTF-8")]
    InvalidUtf8(#[from] str::Utf8Error),

    #[error("invalid request URI {uri:?}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("malformed upload parameter {0:?}")]
    MalformedParameter(String),

    #[error("missing size parameter")]
    MissingSize,

    #[error("size parameter {0:?} is not a number")]
    InvalidSize(String),
}

impl RequestLineError {
    /// Status code written for this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::BadRequest
    }

    /// Meta text written after the status code.
    pub fn meta(&self) -> &'static str {
        match self {
            Self::UnsupportedScheme(_) => "Only gemini and titan URIs are supported",
            Self::MalformedParameter(_) => "Malformed parameter",
            Self::MissingSize => "Missing size parameter",
            Self::InvalidSize(_) => "Size must be a number",
            Self::TooLong { .. }
            | Self::Closed
            | Self::Read(_)
            | Self::InvalidUtf8(_)
            | Self::InvalidUri { .. } => "Bad Request",
        }
    }
}

/// Parameters appended to a Titan upload path as `;key=value` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParams {
    /// Credential supplied by the client; empty when absent.
    pub token: String,
    /// MIME type of the body; `text/gemini` when absent.
    pub mime: String,
    /// Exact length of the body that follows the request line.
    pub size: usize,
}

impl UploadParams {
    /// Creates parameters for a body of `size` bytes, defaulting an empty
    /// `mime` to `text/gemini`.
    pub fn new(size: usize, mime: &str, token: &str) -> Self {
        let mime = if mime.is_empty() { GEMTEXT_MIME } else { mime };
        Self {
            token: token.to_owned(),
            mime: mime.to_owned(),
            size,
        }
    }

    /// Parses the `;`-separated tail of an upload path (without the leading path).
    ///
    /// # Errors
    ///
    /// - [`RequestLineError::MalformedParameter`]: a parameter is not exactly `key=value`.
    /// - [`RequestLineError::MissingSize`]: no `size` parameter.
    /// - [`RequestLineError::InvalidSize`]: `size` is not a non-negative integer.
    pub fn parse<'a>(raw: impl IntoIterator<Item = &'a str>) -> Result<Self, RequestLineError> {
        let mut params = HashMap::new();
        for pair in raw {
            let mut parts = pair.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => {
                    params.insert(key, value);
                }
                _ => return Err(RequestLineError::MalformedParameter(pair.to_owned())),
            }
        }

        let size = params.get("size").ok_or(RequestLineError::MissingSize)?;
        let size = size
            .parse()
            .map_err(|_| RequestLineError::InvalidSize((*size).to_owned()))?;

        Ok(Self::new(
            size,
            params.get("mime").copied().unwrap_or_default(),
            params.get("token").copied().unwrap_or_default(),
        ))
    }

    /// Encodes the parameters as a path suffix: `;size=N;mime=M[;token=T]`.
    pub fn to_path_suffix(&self) -> String {
        let mut suffix = format!(";size={};mime={}", self.size, self.mime);
        if !self.token.is_empty() {
            suffix.push_str(";token=");
            suffix.push_str(&self.token);
        }
        suffix
    }
}

/// A parsed request line.
#[derive(Debug, Clone)]
pub enum RequestTarget {
    Gemini {
        uri: Url,
    },
    Titan {
        uri: Url,
        /// The path with upload parameters stripped.
        path: String,
        params: UploadParams,
    },
}

impl RequestTarget {
    /// Parses a request line (without its terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestLineError::InvalidUtf8`] / [`RequestLineError::InvalidUri`]: not an absolute URI.
    /// - [`RequestLineError::UnsupportedScheme`]: neither `gemini` nor `titan`.
    /// - Upload parameter errors, see [`UploadParams::parse`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rmini::protocol::RequestTarget;
    ///
    /// let target = RequestTarget::parse(b"titan://host/upload;size=5;token=t").unwrap();
    /// assert_eq!(target.path(), "/upload");
    /// ```
    pub fn parse(line: &[u8]) -> Result<Self, RequestLineError> {
        let line = str::from_utf8(line)?;
        let uri = Url::parse(line).map_err(|source| RequestLineError::InvalidUri {
            uri: line.to_owned(),
            source,
        })?;

        match Scheme::from_uri_scheme(uri.scheme()) {
            Some(Scheme::Gemini) => Ok(Self::Gemini { uri }),
            Some(Scheme::Titan) => {
                let mut segments = uri.path().split(';');
                let path = normalize_path(segments.next().unwrap_or_default()).to_owned();
                let params = UploadParams::parse(segments)?;
                Ok(Self::Titan { uri, path, params })
            }
            None => Err(RequestLineError::UnsupportedScheme(uri.scheme().to_owned())),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Gemini { .. } => Scheme::Gemini,
            Self::Titan { .. } => Scheme::Titan,
        }
    }

    pub fn uri(&self) -> &Url {
        match self {
            Self::Gemini { uri } | Self::Titan { uri, .. } => uri,
        }
    }

    /// The path used for routing; an empty path routes as `/`.
    pub fn path(&self) -> &str {
        match self {
            Self::Gemini { uri } => normalize_path(uri.path()),
            Self::Titan { path, .. } => path,
        }
    }
}

fn normalize_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_request() {
        let target = RequestTarget::parse(b"gemini://localhost/foo?bar=1").unwrap();
        assert_eq!(target.scheme(), Scheme::Gemini);
        assert_eq!(target.path(), "/foo");
        assert_eq!(target.uri().query(), Some("bar=1"));
    }

    #[test]
    fn empty_path_routes_as_root() {
        let target = RequestTarget::parse(b"gemini://localhost").unwrap();
        assert_eq!(target.path(), "/");
    }

    #[test]
    fn titan_request_with_all_params() {
        let target =
            RequestTarget::parse(b"titan://localhost/upload;token=T;mime=text/plain;size=12")
                .unwrap();
        match target {
            RequestTarget::Titan { path, params, .. } => {
                assert_eq!(path, "/upload");
                assert_eq!(params.token, "T");
                assert_eq!(params.mime, "text/plain");
                assert_eq!(params.size, 12);
            }
            other => panic!("expected titan target, got {other:?}"),
        }
    }

    #[test]
    fn titan_defaults() {
        match RequestTarget::parse(b"titan://localhost/upload;size=0").unwrap() {
            RequestTarget::Titan { params, .. } => {
                assert_eq!(params.token, "");
                assert_eq!(params.mime, "text/gemini");
                assert_eq!(params.size, 0);
            }
            other => panic!("expected titan target, got {other:?}"),
        }
    }

    #[test]
    fn titan_missing_size() {
        let err = RequestTarget::parse(b"titan://localhost/upload;mime=text/plain").unwrap_err();
        assert!(matches!(err, RequestLineError::MissingSize));
        assert_eq!(err.meta(), "Missing size parameter");
    }

    #[test]
    fn titan_non_numeric_size() {
        let err = RequestTarget::parse(b"titan://localhost/upload;size=five").unwrap_err();
        assert!(matches!(err, RequestLineError::InvalidSize(ref s) if s == "five"));
        assert_eq!(err.meta(), "Size must be a number");
    }

    #[test]
    fn titan_negative_size_is_not_a_number() {
        let err = RequestTarget::parse(b"titan://localhost/upload;size=-1").unwrap_err();
        assert!(matches!(err, RequestLineError::InvalidSize(_)));
    }

    #[test]
    fn titan_malformed_parameter() {
        for line in [
            &b"titan://localhost/upload;size"[..],
            b"titan://localhost/upload;size=1=2",
        ] {
            let err = RequestTarget::parse(line).unwrap_err();
            assert!(matches!(err, RequestLineError::MalformedParameter(_)));
            assert_eq!(err.meta(), "Malformed parameter");
        }
    }

    #[test]
    fn unsupported_scheme() {
        let err = RequestTarget::parse(b"http://x/").unwrap_err();
        assert!(matches!(err, RequestLineError::UnsupportedScheme(ref s) if s == "http"));
        assert_eq!(err.status(), StatusCode::BadRequest);
    }

    #[test]
    fn relative_reference_is_invalid() {
        let err = RequestTarget::parse(b"/just/a/path").unwrap_err();
        assert!(matches!(err, RequestLineError::InvalidUri { .. }));
        assert_eq!(err.meta(), "Bad Request");
    }

    #[test]
    fn invalid_utf8() {
        let err = RequestTarget::parse(b"gemini://\xff/").unwrap_err();
        assert!(matches!(err, RequestLineError::InvalidUtf8(_)));
    }

    #[test]
    fn upload_suffix_encoding() {
        assert_eq!(
            UploadParams::new(5, "", "").to_path_suffix(),
            ";size=5;mime=text/gemini"
        );
        assert_eq!(
            UploadParams::new(3, "text/plain", "secret").to_path_suffix(),
            ";size=3;mime=text/plain;token=secret"
        );
    }
}
