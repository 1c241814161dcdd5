//! Requests handed to route handlers, and the response operations they expose.

use std::fmt;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rustls::pki_types::CertificateDer;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::connection::BoxConnection;
use crate::context::Params;
use crate::protocol::{GEMTEXT_MIME, StatusCode, response};
use crate::router::Routable;

/// Errors returned by the `respond_*` family.
#[derive(Debug, Error)]
pub enum RespondError {
    /// A response was already written for this request. Nothing was sent.
    #[error("already responded")]
    AlreadyResponded,

    #[error("failed to write response: {0}")]
    Io(#[from] std::io::Error),

    /// The file backing a response could not be read. Nothing was sent.
    #[error("failed to read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A Gemini request bound to its connection.
///
/// Exactly one response may be written. Every `respond_*` call after the
/// first fails with [`RespondError::AlreadyResponded`] without touching the
/// connection. Writing a response closes the write side of the stream.
pub struct Request {
    uri: Url,
    path: String,
    params: Params,
    peer_addr: Option<SocketAddr>,
    conn: BoxConnection,
    terminated: bool,
}

impl Request {
    pub(crate) fn new(
        uri: Url,
        path: String,
        peer_addr: Option<SocketAddr>,
        conn: BoxConnection,
    ) -> Self {
        Self {
            uri,
            path,
            params: Params::new(),
            peer_addr,
            conn,
            terminated: false,
        }
    }

    /// The full request URI, including any query.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The path the request was routed on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string (without `?`), typically the answer to an input prompt.
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// A path parameter captured by the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Certificates the client presented during the handshake; empty when none.
    pub fn client_certificates(&self) -> &[CertificateDer<'static>] {
        self.conn.peer_certificates().unwrap_or_default()
    }

    /// Returns `true` once a response has been written.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Writes `<status> <meta>\r\n` followed by `body`, then closes the stream.
    ///
    /// # Errors
    ///
    /// - [`RespondError::AlreadyResponded`]: a response was already written.
    /// - [`RespondError::Io`]: the write failed; the request still counts as answered.
    pub async fn respond(
        &mut self,
        status: u8,
        meta: &str,
        body: &[u8],
    ) -> Result<(), RespondError> {
        if self.terminated {
            return Err(RespondError::AlreadyResponded);
        }
        self.terminated = true;

        let frame = response::encode(status, meta, body);
        self.conn.write_all(&frame).await?;
        self.conn.flush().await?;
        if let Err(e) = self.conn.shutdown().await {
            debug!(error = %e, "shutdown after response failed");
        }

        debug!(status, path = %self.path, bytes = frame.len(), "response written");
        Ok(())
    }

    /// Responds `20 text/gemini` with `body`.
    pub async fn respond_success(&mut self, body: impl AsRef<[u8]>) -> Result<(), RespondError> {
        self.respond(StatusCode::Success.as_u8(), GEMTEXT_MIME, body.as_ref())
            .await
    }

    /// Responds `20` with a body of another MIME type.
    pub async fn respond_success_with_mime(
        &mut self,
        mime: &str,
        body: impl AsRef<[u8]>,
    ) -> Result<(), RespondError> {
        self.respond(StatusCode::Success.as_u8(), mime, body.as_ref())
            .await
    }

    /// Responds `20 text/gemini` with the contents of a file.
    ///
    /// # Errors
    ///
    /// [`RespondError::File`] if the file cannot be read; no response is written
    /// and the request may still be answered.
    pub async fn respond_gemtext_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), RespondError> {
        if self.terminated {
            return Err(RespondError::AlreadyResponded);
        }
        let path = path.as_ref();
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| RespondError::File {
                path: path.to_owned(),
                source,
            })?;
        self.respond_success(body).await
    }

    /// Responds `10` asking the client for input.
    pub async fn respond_input(&mut self, prompt: &str) -> Result<(), RespondError> {
        self.respond(StatusCode::Input.as_u8(), prompt, &[]).await
    }

    /// Responds `11` asking for input that clients should not echo.
    pub async fn respond_sensitive_input(&mut self, prompt: &str) -> Result<(), RespondError> {
        self.respond(StatusCode::SensitiveInput.as_u8(), prompt, &[])
            .await
    }

    /// Responds with an arbitrary status and message and no body.
    ///
    /// Like every other response, this terminates the request.
    pub async fn respond_error(
        &mut self,
        code: u8,
        message: &str,
    ) -> Result<(), RespondError> {
        self.respond(code, message, &[]).await
    }
}

impl Routable for Request {
    fn set_params(&mut self, params: Params) {
        self.params = params;
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("uri", &self.uri.as_str())
            .field("path", &self.path)
            .field("params", &self.params)
            .field("peer_addr", &self.peer_addr)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

/// A Titan upload: a [`Request`] plus the uploaded body and its parameters.
///
/// Dereferences to [`Request`] for routing data and responses.
#[derive(Debug)]
pub struct UploadRequest {
    request: Request,
    token: String,
    mime: String,
    body: Bytes,
}

impl UploadRequest {
    pub(crate) fn new(request: Request, token: String, mime: String, body: Bytes) -> Self {
        Self {
            request,
            token,
            mime,
            body,
        }
    }

    /// Credential supplied with the upload; empty when absent.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// MIME type declared for the body.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// The uploaded bytes, exactly as many as the declared size.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes a JSON upload body.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.body)
    }
}

impl Deref for UploadRequest {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.request
    }
}

impl DerefMut for UploadRequest {
    fn deref_mut(&mut self) -> &mut Request {
        &mut self.request
    }
}

impl Routable for UploadRequest {
    fn set_params(&mut self, params: Params) {
        self.request.set_params(params);
    }
}
