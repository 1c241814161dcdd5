//! Async Gemini/Titan server using Tokio and rustls.
//!
//! Accepts TLS connections and serves exactly one request per connection:
//! read the request line, route it, hand a [`Request`] to the handler, close.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::config::ServerSettings;
use crate::protocol::{
    CRLF, MAX_REQUEST_LINE, RequestLineError, RequestTarget, StatusCode, find_crlf, response,
};
use crate::router::RouterConfig;
use crate::tls::{self, TlsError};

pub mod connection;
pub mod request;

pub use connection::{BoxConnection, Connection};
pub use request::{RespondError, Request, UploadRequest};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
}

/// Initial read buffer capacity per connection; one maximal request line.
const INITIAL_BUF_SIZE: usize = MAX_REQUEST_LINE + 2;

/// Stops a running [`Server`] from accepting new connections.
///
/// Connections already accepted run to completion.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Signal the server to stop. Takes effect even if called before
    /// [`Server::run`] starts waiting.
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

/// The rmini Gemini server.
///
/// Binds a TCP address, terminates TLS, and serves requests from a
/// [`RouterConfig`] that is fixed once [`run`](Self::run) is called.
///
/// # Examples
///
/// ```rust,no_run
/// use rmini::router::RouterConfig;
/// use rmini::server::{Request, Server};
/// use rmini::tls;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let certs = tls::load_certs("cert.pem".as_ref())?;
///     let key = tls::load_private_key("key.pem".as_ref())?;
///     let server = Server::bind("0.0.0.0:1965", tls::server_config(certs, key)?).await?;
///
///     let mut routes = RouterConfig::new();
///     routes.route("/", |mut req: Request| async move {
///         req.respond_success("# Hello!").await
///     })?;
///     server.run(routes).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(
        addr: impl AsRef<str>,
        tls_config: Arc<rustls::ServerConfig>,
    ) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(tls_config),
            local_addr,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Loads the certificate and key named in `settings` and binds its address.
    ///
    /// # Errors
    ///
    /// [`ServerError::Tls`] for unreadable or invalid PEM files, otherwise as [`bind`](Self::bind).
    pub async fn from_settings(settings: &ServerSettings) -> Result<Self, ServerError> {
        let certs = tls::load_certs(&settings.cert_path)?;
        let key = tls::load_private_key(&settings.key_path)?;
        Self::bind(&settings.bind_address, tls::server_config(certs, key)?).await
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a handle that stops [`run`](Self::run).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: Arc::clone(&self.shutdown),
        }
    }

    /// Starts accepting connections and serving them from `routes`.
    ///
    /// Each connection runs in its own Tokio task. When the shutdown handle
    /// fires, the listener is closed and this method waits for in-flight
    /// connections to finish before returning.
    ///
    /// # Errors
    ///
    /// Currently never fails once bound; accept errors are logged and skipped.
    pub async fn run(self, routes: RouterConfig) -> Result<(), ServerError> {
        let Server {
            listener,
            acceptor,
            local_addr,
            shutdown,
        } = self;
        let routes = Arc::new(routes);
        let mut tasks = JoinSet::new();

        info!(address = %local_addr, "rmini listening");

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!(address = %local_addr, "shutdown requested, no longer accepting");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    debug!(peer = %peer_addr, "connection accepted");
                    let acceptor = acceptor.clone();
                    let routes = Arc::clone(&routes);

                    tasks.spawn(async move {
                        let stream = match acceptor.accept(stream).await {
                            Ok(stream) => stream,
                            Err(e) => {
                                warn!(peer = %peer_addr, error = %e, "TLS handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = serve_connection(stream, Some(peer_addr), &routes).await {
                            warn!(peer = %peer_addr, error = %e, "connection closed with error");
                        }
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "connection task failed");
                    }
                }
            }
        }

        drop(listener);
        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(in_flight, "waiting for in-flight connections");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "connection task failed");
            }
        }
        info!(address = %local_addr, "rmini stopped");
        Ok(())
    }
}

/// Serves a single request over an established connection.
///
/// Reads one CRLF-terminated request line (at most 1024 bytes before the
/// terminator), parses it, and dispatches it:
///
/// - `gemini://`: routed on the URI path against the Gemini table.
/// - `titan://`: upload parameters are split off the path, exactly `size`
///   body bytes are read, then the path is routed against the Titan table.
///
/// Framing and parameter errors are answered with `59`, unknown paths with
/// `51`; in both cases no handler runs. The connection is closed when this
/// returns.
///
/// # Errors
///
/// Only I/O errors while writing an engine-generated status are returned;
/// handler errors are logged.
pub async fn serve_connection<C: Connection>(
    conn: C,
    peer_addr: Option<SocketAddr>,
    routes: &RouterConfig,
) -> Result<(), std::io::Error> {
    let mut conn: BoxConnection = Box::new(conn);
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let target = match read_request_line(&mut conn, &mut buf).await {
        Ok(line) => RequestTarget::parse(&line),
        Err(e) => Err(e),
    };
    let target = match target {
        Ok(target) => target,
        Err(e) => {
            warn!(peer = ?peer_addr, error = %e, "rejecting request");
            return reject(&mut conn, e.status(), e.meta()).await;
        }
    };

    let path = target.path().to_owned();
    match target {
        RequestTarget::Gemini { uri } => {
            let resolved = match routes.gemini().resolve(&path) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(peer = ?peer_addr, error = %e, "route not found");
                    return reject(&mut conn, StatusCode::NotFound, "Not Found").await;
                }
            };

            info!(peer = ?peer_addr, scheme = "gemini", uri = %uri, "request received");
            let request = Request::new(uri, path, peer_addr, conn);
            if let Err(e) = resolved.dispatch(request).await {
                warn!(peer = ?peer_addr, error = %e, "handler failed");
            }
        }
        RequestTarget::Titan { uri, params, .. } => {
            let body = match read_body(&mut conn, buf, params.size).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(peer = ?peer_addr, error = %e, size = params.size, "failed to read upload body");
                    return reject(&mut conn, StatusCode::BadRequest, "Bad Request").await;
                }
            };

            let resolved = match routes.titan().resolve(&path) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(peer = ?peer_addr, error = %e, "upload route not found");
                    return reject(&mut conn, StatusCode::NotFound, "Not Found").await;
                }
            };

            info!(
                peer = ?peer_addr,
                scheme = "titan",
                uri = %uri,
                size = params.size,
                mime = %params.mime,
                "upload received"
            );
            let request = Request::new(uri, path, peer_addr, conn);
            let upload = UploadRequest::new(request, params.token, params.mime, body);
            if let Err(e) = resolved.dispatch(upload).await {
                warn!(peer = ?peer_addr, error = %e, "upload handler failed");
            }
        }
    }

    Ok(())
}

// Fill `buf` until it holds a CRLF within the first MAX_REQUEST_LINE + 2
// bytes. Returns the line without its terminator and leaves any bytes read
// past it in `buf`.
async fn read_request_line(
    conn: &mut BoxConnection,
    buf: &mut BytesMut,
) -> Result<Bytes, RequestLineError> {
    let limit = MAX_REQUEST_LINE + CRLF.len();
    loop {
        let window = &buf[..buf.len().min(limit)];
        if let Some(end) = find_crlf(window) {
            let line = buf.split_to(end).freeze();
            buf.advance(CRLF.len());
            return Ok(line);
        }
        if buf.len() >= limit {
            return Err(RequestLineError::TooLong {
                max: MAX_REQUEST_LINE,
            });
        }

        let bytes_read = conn.read_buf(buf).await.map_err(RequestLineError::Read)?;
        if bytes_read == 0 {
            return Err(RequestLineError::Closed);
        }
    }
}

// Read exactly `size` body bytes, starting with whatever followed the
// request line in `buf`. Bytes beyond `size` are discarded.
async fn read_body(
    conn: &mut BoxConnection,
    mut buf: BytesMut,
    size: usize,
) -> Result<Bytes, std::io::Error> {
    if buf.len() >= size {
        buf.truncate(size);
        return Ok(buf.freeze());
    }

    let mut body = buf.to_vec();
    let remaining = (size - body.len()) as u64;
    (&mut *conn).take(remaining).read_to_end(&mut body).await?;
    if body.len() < size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("upload body ended after {} of {size} bytes", body.len()),
        ));
    }
    Ok(Bytes::from(body))
}

// Write an engine-generated status with no body and close the stream.
async fn reject(
    conn: &mut BoxConnection,
    status: StatusCode,
    meta: &str,
) -> Result<(), std::io::Error> {
    let frame = response::encode(status.as_u8(), meta, &[]);
    conn.write_all(&frame).await?;
    conn.flush().await?;
    if let Err(e) = conn.shutdown().await {
        debug!(error = %e, "shutdown after rejection failed");
    }
    Ok(())
}
