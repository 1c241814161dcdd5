//! Gemini and Titan client.
//!
//! One request per connection: write the request line (and upload body),
//! read until the server closes, decode the [`Response`].

use std::net::IpAddr;
use std::sync::Arc;

use bytes::BytesMut;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::{Host, Url};

use crate::protocol::{CRLF, DEFAULT_PORT, Response, ResponseError, Scheme, UploadParams};
use crate::tls::{self, TlsError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("malformed response header: {0}")]
    MalformedHeader(ResponseError),

    #[error("invalid status code {0:?}")]
    InvalidStatus(String),
}

impl From<ResponseError> for ClientError {
    fn from(e: ResponseError) -> Self {
        match e {
            ResponseError::InvalidStatus(code) => Self::InvalidStatus(code),
            other => Self::MalformedHeader(other),
        }
    }
}

/// A reusable client holding its TLS configuration.
///
/// Server certificates are not verified against any authority; callers that
/// want trust-on-first-use pinning can inspect certificates themselves.
///
/// # Examples
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), rmini::client::ClientError> {
/// let client = rmini::Client::new()?;
/// let response = client.request("gemini://localhost/").await?;
/// println!("{} {}", response.status(), response.meta());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    connector: TlsConnector,
    port: u16,
}

impl Client {
    /// A client without a client certificate, connecting to port 1965 unless
    /// the address names another.
    pub fn new() -> Result<Self, ClientError> {
        Ok(Self::from_config(tls::client_config(None)?))
    }

    /// A client that presents `certs` as its identity.
    pub fn with_identity(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, ClientError> {
        Ok(Self::from_config(tls::client_config(Some((certs, key)))?))
    }

    fn from_config(config: Arc<rustls::ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
            port: DEFAULT_PORT,
        }
    }

    /// Port used when the address carries none.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sends a request for `address` and reads the whole response.
    pub async fn request(&self, address: &str) -> Result<Response, ClientError> {
        let url = parse_address(address)?;
        self.exchange(&url, &[]).await
    }

    /// Uploads `body` to a Titan `address`.
    ///
    /// The request line is the address with `;size=<len>;mime=<mime>` and,
    /// when `token` is non-empty, `;token=<token>` appended to its path. An
    /// empty `mime` is sent as `text/gemini`.
    pub async fn upload(
        &self,
        address: &str,
        body: &[u8],
        token: &str,
        mime: &str,
    ) -> Result<Response, ClientError> {
        let mut url = parse_address(address)?;
        let params = UploadParams::new(body.len(), mime, token);
        let path = match url.path() {
            "" => "/".to_owned(),
            path => path.to_owned(),
        };
        url.set_path(&format!("{path}{}", params.to_path_suffix()));
        self.exchange(&url, body).await
    }

    async fn exchange(&self, url: &Url, body: &[u8]) -> Result<Response, ClientError> {
        let port = url.port().unwrap_or(self.port);
        let (server_name, tcp) = match url.host() {
            Some(Host::Domain(domain)) => {
                let name = ServerName::try_from(domain.to_owned())
                    .map_err(|e| invalid(url.as_str(), e))?;
                (name, TcpStream::connect((domain, port)).await?)
            }
            Some(Host::Ipv4(ip)) => connect_ip(IpAddr::V4(ip), port).await?,
            Some(Host::Ipv6(ip)) => connect_ip(IpAddr::V6(ip), port).await?,
            None => return Err(invalid(url.as_str(), "missing host")),
        };

        debug!(address = %url, port, "connecting");
        let mut stream = self.connector.connect(server_name, tcp).await?;

        let line = url.as_str();
        let mut request = BytesMut::with_capacity(line.len() + CRLF.len() + body.len());
        request.extend_from_slice(line.as_bytes());
        request.extend_from_slice(CRLF);
        request.extend_from_slice(body);
        stream.write_all(&request).await?;
        stream.flush().await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        debug!(address = %url, bytes = raw.len(), "response received");

        Ok(Response::parse(raw.into())?)
    }
}

async fn connect_ip(
    ip: IpAddr,
    port: u16,
) -> Result<(ServerName<'static>, TcpStream), std::io::Error> {
    let tcp = TcpStream::connect((ip, port)).await?;
    Ok((ServerName::IpAddress(ip.into()), tcp))
}

fn parse_address(address: &str) -> Result<Url, ClientError> {
    let url = Url::parse(address).map_err(|e| invalid(address, e))?;
    if Scheme::from_uri_scheme(url.scheme()).is_none() {
        return Err(invalid(address, "only gemini and titan URIs are supported"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(address, "missing host"));
    }
    Ok(url)
}

fn invalid(address: &str, reason: impl ToString) -> ClientError {
    ClientError::InvalidAddress {
        address: address.to_owned(),
        reason: reason.to_string(),
    }
}

/// Sends a single request with a default [`Client`].
pub async fn request(address: &str) -> Result<Response, ClientError> {
    Client::new()?.request(address).await
}

/// Sends a single Titan upload with a default [`Client`].
pub async fn upload_request(
    address: &str,
    body: &[u8],
    token: &str,
    mime: &str,
) -> Result<Response, ClientError> {
    Client::new()?.upload(address, body, token, mime).await
}
