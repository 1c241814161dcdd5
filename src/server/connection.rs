//! The byte stream a request is served over.

use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// An established, ordered, reliable byte stream carrying one request.
///
/// Implemented for server-side TLS streams, which expose the client's
/// certificate chain, and for plain streams used in tests and behind TLS
/// terminating proxies.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Certificates presented by the client, leaf first.
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        None
    }
}

impl<IO> Connection for tokio_rustls::server::TlsStream<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.get_ref().1.peer_certificates()
    }
}

impl Connection for TcpStream {}

impl Connection for DuplexStream {}

/// Type-erased connection owned by a request.
pub type BoxConnection = Box<dyn Connection>;
