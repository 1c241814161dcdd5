//! Request routing: map request paths to handlers.
//!
//! This module provides [`Router`], which resolves a path to a handler and the
//! named parameters captured from it. Two route styles are supported:
//!
//! | Route                 | Example match          | Captured params           |
//! |-----------------------|------------------------|---------------------------|
//! | `/about`              | `/about`               | *(none)*                  |
//! | `/users/:id`          | `/users/42`            | `id → "42"`               |
//! | `/posts/:year/:slug`  | `/posts/2024/hello`    | `year → "2024"`, `slug → "hello"` |
//!
//! Static routes are looked up exactly and always win. Pattern routes are
//! tried afterwards in registration order; the first match wins. A
//! placeholder captures any non-empty run of characters, as few as possible
//! while still matching the whole path.
//!
//! [`RouterConfig`] bundles the Gemini and Titan tables a server is built
//! with. Registration must finish before the server starts; the tables are
//! only read while serving.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::context::Params;
use crate::server::request::{Request, RespondError, UploadRequest};

/// What a handler resolves to. Returning the error from a failed respond call
/// lets handlers use `?`; the server logs it.
pub type HandlerResult = Result<(), RespondError>;

/// Boxed future returned by [`Handler::call`].
pub type BoxFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A route's capability: handle one request of type `R`.
///
/// Closures are registered through [`Router::route`]; implement this trait
/// directly to register handler objects with [`Router::route_handler`].
///
/// # Examples
///
/// ```rust,no_run
/// use rmini::router::{BoxFuture, Handler};
/// use rmini::server::Request;
///
/// struct Greeting(&'static str);
///
/// impl Handler<Request> for Greeting {
///     fn call(&self, mut request: Request) -> BoxFuture {
///         let text = self.0;
///         Box::pin(async move { request.respond_success(text).await })
///     }
/// }
/// ```
pub trait Handler<R>: Send + Sync + 'static {
    fn call(&self, request: R) -> BoxFuture;
}

/// Adapts an async closure into a [`Handler`].
pub struct HandlerFn<F>(pub F);

impl<R, F, Fut> Handler<R> for HandlerFn<F>
where
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: R) -> BoxFuture {
        Box::pin((self.0)(request))
    }
}

/// Requests that can receive the parameters captured by the router.
pub trait Routable {
    fn set_params(&mut self, params: Params);
}

/// Errors produced by route registration and resolution.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no route for {path}")]
    NotFound { path: String },

    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled route pattern such as `/users/:id`.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Returns `true` if any `/`-separated segment of `path` starts with `:`.
    pub fn has_placeholder(path: &str) -> bool {
        path.split('/').any(|segment| segment.starts_with(':'))
    }

    /// Compile `pattern` into an anchored matcher with one named group per
    /// placeholder segment. Literal segments are matched exactly.
    ///
    /// # Errors
    ///
    /// Fails when a placeholder name is empty, repeated, or not a valid group name.
    pub fn compile(pattern: &str) -> Result<Self, RouteError> {
        let mut expr = String::with_capacity(pattern.len() * 2);
        expr.push('^');
        for (i, segment) in pattern.split('/').enumerate() {
            if i > 0 {
                expr.push('/');
            }
            match segment.strip_prefix(':') {
                Some(name) => expr.push_str(&format!("(?P<{name}>.+?)")),
                None => expr.push_str(&regex::escape(segment)),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match the whole of `path`, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        Some(
            self.regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|m| (name.to_owned(), m.as_str().to_owned()))
                })
                .collect(),
        )
    }
}

// A pattern route, kept in registration order.
struct PatternRoute<R> {
    pattern: Pattern,
    handler: Box<dyn Handler<R>>,
}

/// The outcome of a successful [`Router::resolve`].
pub struct Resolved<'a, R> {
    handler: &'a dyn Handler<R>,
    params: Params,
}

impl<R: Routable + 'static> Resolved<'_, R> {
    /// Parameters captured from the path; empty for static routes.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Hand `request` to the handler after setting its parameters.
    pub fn dispatch(self, mut request: R) -> BoxFuture {
        request.set_params(self.params);
        self.handler.call(request)
    }
}

/// Path router for one request type.
///
/// # Examples
///
/// ```rust,no_run
/// use rmini::router::Router;
/// use rmini::server::Request;
///
/// let mut router: Router<Request> = Router::new();
/// router
///     .route("/", |mut req: Request| async move { req.respond_success("# Home").await })
///     .unwrap();
/// router
///     .route("/users/:id", |mut req: Request| async move {
///         let id = req.param("id").unwrap_or("unknown").to_owned();
///         req.respond_success(id).await
///     })
///     .unwrap();
/// ```
pub struct Router<R> {
    statics: HashMap<String, Box<dyn Handler<R>>>,
    patterns: Vec<PatternRoute<R>>,
}

impl<R> Default for Router<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Router<R> {
    /// Create a new, empty `Router`.
    pub fn new() -> Self {
        Self {
            statics: HashMap::new(),
            patterns: Vec::new(),
        }
    }

    /// Register an async closure for `path`.
    ///
    /// Paths with a `:name` segment become pattern routes; all others are static.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] if a pattern cannot be compiled.
    pub fn route<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route_handler(path, HandlerFn(handler))
    }

    /// Register a [`Handler`] object for `path`, classified like [`route`](Self::route).
    pub fn route_handler(
        &mut self,
        path: &str,
        handler: impl Handler<R>,
    ) -> Result<&mut Self, RouteError> {
        if Pattern::has_placeholder(path) {
            self.add_pattern(path, handler)
        } else {
            Ok(self.add_static(path, handler))
        }
    }

    /// Register an exact-match route. Re-registering a path replaces its handler.
    pub fn add_static(&mut self, path: &str, handler: impl Handler<R>) -> &mut Self {
        self.statics.insert(path.to_owned(), Box::new(handler));
        self
    }

    /// Register a pattern route, compiled once here.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] if the pattern cannot be compiled.
    pub fn add_pattern(
        &mut self,
        path: &str,
        handler: impl Handler<R>,
    ) -> Result<&mut Self, RouteError> {
        let pattern = Pattern::compile(path)?;
        self.patterns.push(PatternRoute {
            pattern,
            handler: Box::new(handler),
        });
        Ok(self)
    }

    /// Number of registered routes, static and pattern.
    pub fn len(&self) -> usize {
        self.statics.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statics.is_empty() && self.patterns.is_empty()
    }

    /// Resolve `path` to a handler and its parameters.
    ///
    /// Static routes are checked first; pattern routes follow in registration
    /// order. Never mutates the tables.
    ///
    /// # Errors
    ///
    /// [`RouteError::NotFound`] when nothing matches.
    pub fn resolve(&self, path: &str) -> Result<Resolved<'_, R>, RouteError> {
        if let Some(handler) = self.statics.get(path) {
            debug!(path, "static route matched");
            return Ok(Resolved {
                handler: handler.as_ref(),
                params: Params::new(),
            });
        }

        for route in &self.patterns {
            if let Some(params) = route.pattern.matches(path) {
                debug!(path, pattern = route.pattern.as_str(), "pattern route matched");
                return Ok(Resolved {
                    handler: route.handler.as_ref(),
                    params,
                });
            }
        }

        Err(RouteError::NotFound {
            path: path.to_owned(),
        })
    }
}

/// The route tables a server serves from: one for `gemini://` requests and a
/// disjoint one for `titan://` uploads.
///
/// # Examples
///
/// ```rust,no_run
/// use rmini::router::RouterConfig;
/// use rmini::server::{Request, UploadRequest};
///
/// # fn build() -> Result<RouterConfig, rmini::router::RouteError> {
/// let mut routes = RouterConfig::new();
/// routes.route("/", |mut req: Request| async move { req.respond_success("# Hi").await })?;
/// routes.upload_route("/notes/:name", |mut req: UploadRequest| async move {
///     let size = req.body().len();
///     req.respond_success(format!("stored {size} bytes")).await
/// })?;
/// # Ok(routes)
/// # }
/// ```
#[derive(Default)]
pub struct RouterConfig {
    gemini: Router<Request>,
    titan: Router<UploadRequest>,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Gemini route, see [`Router::route`].
    pub fn route<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.gemini.route(path, handler)?;
        Ok(self)
    }

    /// Register a Titan upload route, see [`Router::route`].
    pub fn upload_route<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(UploadRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.titan.route(path, handler)?;
        Ok(self)
    }

    pub fn gemini(&self) -> &Router<Request> {
        &self.gemini
    }

    pub fn gemini_mut(&mut self) -> &mut Router<Request> {
        &mut self.gemini
    }

    pub fn titan(&self) -> &Router<UploadRequest> {
        &self.titan
    }

    pub fn titan_mut(&mut self) -> &mut Router<UploadRequest> {
        &mut self.titan
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    // Minimal request type recording which handler ran and with what params.
    type Seen = Arc<Mutex<Option<(&'static str, Params)>>>;

    struct Probe {
        params: Params,
        seen: Seen,
    }

    impl Probe {
        fn new() -> (Self, Seen) {
            let seen = Seen::default();
            (
                Self {
                    params: Params::new(),
                    seen: Arc::clone(&seen),
                },
                seen,
            )
        }
    }

    impl Routable for Probe {
        fn set_params(&mut self, params: Params) {
            self.params = params;
        }
    }

    fn tagged(tag: &'static str) -> impl Fn(Probe) -> std::future::Ready<HandlerResult> {
        move |probe: Probe| {
            *probe.seen.lock().unwrap() = Some((tag, probe.params));
            std::future::ready(Ok(()))
        }
    }

    async fn run(router: &Router<Probe>, path: &str) -> Option<(&'static str, Params)> {
        let (probe, seen) = Probe::new();
        let resolved = router.resolve(path).ok()?;
        resolved.dispatch(probe).await.unwrap();
        let outcome = seen.lock().unwrap().take();
        outcome
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    // ── Pattern ───────────────────────────────────────────────────────────────

    #[test]
    fn placeholder_detection() {
        assert!(Pattern::has_placeholder("/users/:id"));
        assert!(Pattern::has_placeholder("/:x"));
        assert!(!Pattern::has_placeholder("/users"));
        assert!(!Pattern::has_placeholder("/time/12:30"));
    }

    #[test]
    fn pattern_extracts_single_param() {
        let pat = Pattern::compile("/users/:id").unwrap();
        assert_eq!(pat.matches("/users/42"), Some(params(&[("id", "42")])));
    }

    #[test]
    fn pattern_extracts_multiple_params() {
        let pat = Pattern::compile("/users/:id/posts/:post_id").unwrap();
        assert_eq!(
            pat.matches("/users/7/posts/99"),
            Some(params(&[("id", "7"), ("post_id", "99")]))
        );
    }

    #[test]
    fn pattern_is_anchored() {
        let pat = Pattern::compile("/users/:id").unwrap();
        assert!(pat.matches("/users").is_none());
        assert!(pat.matches("/users/").is_none());
        assert!(pat.matches("/api/users/1").is_none());
    }

    #[test]
    fn pattern_literal_segments_are_escaped() {
        let pat = Pattern::compile("/a.b/:x").unwrap();
        assert!(pat.matches("/a.b/1").is_some());
        assert!(pat.matches("/aXb/1").is_none());
    }

    #[test]
    fn pattern_placeholder_spans_to_next_literal() {
        let pat = Pattern::compile("/files/:name/raw").unwrap();
        assert_eq!(
            pat.matches("/files/a/b/raw"),
            Some(params(&[("name", "a/b")]))
        );
    }

    #[test]
    fn pattern_rejects_empty_placeholder_name() {
        assert!(matches!(
            Pattern::compile("/users/:"),
            Err(RouteError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn pattern_rejects_duplicate_names() {
        assert!(Pattern::compile("/:a/:a").is_err());
    }

    // ── Router ────────────────────────────────────────────────────────────────

    #[test]
    fn router_starts_empty() {
        let router: Router<Probe> = Router::default();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn router_counts_both_kinds() {
        let mut router = Router::new();
        router.route("/a", tagged("a")).unwrap();
        router.route("/:x", tagged("x")).unwrap();
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn router_unregistered_path_is_not_found() {
        let mut router = Router::new();
        router.route("/hello", tagged("hello")).unwrap();
        assert!(matches!(
            router.resolve("/world"),
            Err(RouteError::NotFound { path }) if path == "/world"
        ));
    }

    #[tokio::test]
    async fn static_route_beats_pattern() {
        let mut router = Router::new();
        router.route("/:x", tagged("pattern")).unwrap();
        router.route("/a", tagged("static")).unwrap();

        assert_eq!(run(&router, "/a").await, Some(("static", Params::new())));
        assert_eq!(
            run(&router, "/b").await,
            Some(("pattern", params(&[("x", "b")])))
        );
    }

    #[tokio::test]
    async fn first_registered_pattern_wins() {
        let mut router = Router::new();
        router.route("/:first", tagged("first")).unwrap();
        router.route("/:second", tagged("second")).unwrap();

        assert_eq!(
            run(&router, "/z").await,
            Some(("first", params(&[("first", "z")])))
        );
    }

    #[tokio::test]
    async fn resolve_does_not_leak_params_between_calls() {
        let mut router = Router::new();
        router.route("/u/:id", tagged("user")).unwrap();

        let first = router.resolve("/u/1").unwrap();
        let second = router.resolve("/u/2").unwrap();
        assert_eq!(first.params().get("id"), Some("1"));
        assert_eq!(second.params().get("id"), Some("2"));
    }

    #[tokio::test]
    async fn handler_objects_can_be_registered() {
        struct Named;

        impl Handler<Probe> for Named {
            fn call(&self, probe: Probe) -> BoxFuture {
                *probe.seen.lock().unwrap() = Some(("object", probe.params));
                Box::pin(async { Ok(()) })
            }
        }

        let mut router = Router::new();
        router.route_handler("/obj/:id", Named).unwrap();
        assert_eq!(
            run(&router, "/obj/9").await,
            Some(("object", params(&[("id", "9")])))
        );
    }

    #[test]
    fn router_config_tables_are_disjoint() {
        let mut routes = RouterConfig::new();
        routes
            .route("/read", |_req: Request| async { Ok(()) })
            .unwrap();
        routes
            .upload_route("/write", |_req: UploadRequest| async { Ok(()) })
            .unwrap();

        assert!(routes.gemini().resolve("/read").is_ok());
        assert!(routes.gemini().resolve("/write").is_err());
        assert!(routes.titan().resolve("/write").is_ok());
        assert!(routes.titan().resolve("/read").is_err());
    }
}
