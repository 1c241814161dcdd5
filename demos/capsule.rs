//! A small capsule exercising every response kind.
//!
//! ```text
//! cargo run --example capsule -- [settings.toml]
//! ```
//!
//! Without a settings file the capsule listens on 127.0.0.1:1965 using the
//! test fixture certificate. Press Ctrl-C to stop.

use std::path::Path;

use rmini::gemtext::Builder;
use rmini::{Request, RouterConfig, Server, ServerSettings, StatusCode, UploadRequest};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rmini=debug,capsule=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => ServerSettings::load(Path::new(&path))?,
        None => {
            let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
            let mut settings =
                ServerSettings::new(fixtures.join("cert.pem"), fixtures.join("key.pem"));
            settings.bind_address = "127.0.0.1:1965".into();
            settings
        }
    };

    let server = Server::from_settings(&settings).await?;
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    server.run(routes()?).await?;
    Ok(())
}

fn routes() -> Result<RouterConfig, rmini::router::RouteError> {
    let index = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/index.gmi");
    let mut routes = RouterConfig::new();

    routes
        .route("/", move |mut req: Request| {
            let index = index.clone();
            async move { req.respond_gemtext_file(index).await }
        })?
        .route("/gemtext", |mut req: Request| async move {
            let mut page = Builder::new();
            page.add_header1_line("Gemtext")
                .add_header2_line("Level 2")
                .add_header3_line("Builder")
                .add_text_line("Text Lines")
                .add_preformatted("Oh cool, code!")
                .add_link_line("gemini://localhost/", Some("Go Home"))
                .add_text_line("")
                .add_quote_line("Please stop making up stuff I said")
                .add_text_line("- Sun Tzu, Art of War")
                .add_unordered_list(["Item 1", "Item 2", "Item 3"]);
            req.respond_success(page.get()).await
        })?
        .route("/secure", |mut req: Request| async move {
            if req.client_certificates().is_empty() {
                return req
                    .respond_error(StatusCode::CertificateRequired.into(), "Cert required")
                    .await;
            }
            req.respond_success("# Secure page\r\nWelcome!").await
        })?
        .route("/dynamic/:dynamic", |mut req: Request| async move {
            let value = req.param("dynamic").unwrap_or_default().to_owned();
            req.respond_success(format!("# Dynamic\r\nYou asked for {value}"))
                .await
        })?
        .route("/name", |mut req: Request| async move {
            match req.query().map(str::to_owned) {
                Some(name) => req.respond_success(format!("# Hello, {name}!")).await,
                None => req.respond_input("What is your name?").await,
            }
        })?;

    routes.upload_route("/upload/:name", |mut req: UploadRequest| async move {
        let name = req.param("name").unwrap_or_default().to_owned();
        let reply = format!(
            "# Received {name}\r\n{} bytes of {}",
            req.body().len(),
            req.mime()
        );
        req.respond_success(reply).await
    })?;

    Ok(routes)
}
