//! # rmini
//!
//! An async Gemini server and client with Titan uploads and a Gemtext codec.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rmini::gemtext::Builder;
//! use rmini::{Request, RouterConfig, Server, tls};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let certs = tls::load_certs("cert.pem".as_ref())?;
//!     let key = tls::load_private_key("key.pem".as_ref())?;
//!     let server = Server::bind("127.0.0.1:1965", tls::server_config(certs, key)?).await?;
//!
//!     let mut routes = RouterConfig::new();
//!     routes.route("/", |mut req: Request| async move {
//!         let mut page = Builder::new();
//!         page.add_header1_line("Hello, World!");
//!         req.respond_success(page.get()).await
//!     })?;
//!
//!     server.run(routes).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod gemtext;
pub mod protocol;
pub mod router;
pub mod server;
pub mod tls;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use client::{Client, ClientError};
pub use config::ServerSettings;
pub use gemtext::{Builder, Line};
pub use protocol::{Response, StatusCode};
pub use router::RouterConfig;
pub use server::{Request, Server, ServerError, UploadRequest};
