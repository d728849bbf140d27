//! Router that de-multiplexes and authenticates GitHub webhooks.
//!
//! Each registered [`Route`] binds an `X-GitHub-Event` value to a handler and
//! the secret used to verify `X-Hub-Signature`. The router itself is a
//! [`tower::Service`], so it can be mounted anywhere in an axum app:
//!
//! ```no_run
//! use hookshot::web::{ping, Router};
//!
//! let mut hooks = Router::new("1234");
//! hooks.handle_fn("ping", ping);
//!
//! let app: axum::Router = axum::Router::new().route_service("/webhooks", hooks);
//! ```

use std::{
    collections::HashMap,
    convert::Infallible,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
};

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    handler::Handler,
    http::{HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use futures::future::BoxFuture;
use tower::{util::BoxCloneService, Service, ServiceExt};
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::web::handlers;
use crate::web::signature::{constant_time_compare, signature_header_value};
use crate::web::{HEADER_CALCULATED_SIGNATURE, HEADER_EVENT, HEADER_SIGNATURE};
use crate::Config;

/// Largest body buffered for verification. GitHub caps payloads at 25 MB.
pub const DEFAULT_BODY_LIMIT: usize = 25 * 1024 * 1024;

// =============================================================================
// Handlers
// =============================================================================

/// Anything that can turn a request into a response.
///
/// Wraps a boxed, clonable [`Service`]. The mutex only guards the clone taken
/// at the start of each call, so concurrent deliveries never wait on each
/// other while a handler runs.
pub struct WebhookHandler {
    service: Mutex<BoxCloneService<Request, Response, Infallible>>,
}

impl WebhookHandler {
    /// Wrap a tower service.
    pub fn new<S>(service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        Self {
            service: Mutex::new(BoxCloneService::new(service)),
        }
    }

    /// Wrap an axum handler function, e.g. `async fn(HeaderMap, Bytes) -> impl IntoResponse`.
    pub fn from_fn<H, T>(handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::new(handler.with_state(()))
    }

    async fn call(&self, req: Request) -> Response {
        let service = self
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match service.oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl fmt::Debug for WebhookHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookHandler").finish_non_exhaustive()
    }
}

// =============================================================================
// Routes
// =============================================================================

/// The handler registered for one GitHub event.
pub struct Route {
    event: String,
    secret: String,
    handler: WebhookHandler,
}

impl Route {
    /// The `X-GitHub-Event` value this route answers.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Secret used to verify `X-Hub-Signature` for this route.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("event", &self.event)
            .field("has_secret", &!self.secret.is_empty())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Router
// =============================================================================

/// De-multiplexes GitHub webhooks by `X-GitHub-Event`.
///
/// Routes are registered during startup through `&mut self`. Clones share the
/// route table; registering on a router that has already been cloned copies
/// the table, so clones that are serving keep their snapshot.
#[derive(Clone)]
pub struct Router {
    secret: String,
    routes: Arc<HashMap<String, Arc<Route>>>,
    not_found: Arc<WebhookHandler>,
    unauthorized: Arc<WebhookHandler>,
    body_limit: usize,
    set_calculated_signature_header: bool,
}

impl Router {
    /// Create a router whose routes verify signatures with `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            routes: Arc::new(HashMap::new()),
            not_found: Arc::new(WebhookHandler::from_fn(handlers::not_found)),
            unauthorized: Arc::new(WebhookHandler::from_fn(handlers::unauthorized)),
            body_limit: DEFAULT_BODY_LIMIT,
            set_calculated_signature_header: false,
        }
    }

    /// Create a router from the secret, body limit, and debug flag in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.secret.clone())
            .with_body_limit(config.max_body_bytes)
            .set_calculated_signature_header(config.set_calculated_signature_header)
    }

    /// Replace the handler used when no route matches the event.
    pub fn not_found_handler<S>(mut self, service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        self.not_found = Arc::new(WebhookHandler::new(service));
        self
    }

    /// Replace the handler used when the signature does not match.
    pub fn unauthorized_handler<S>(mut self, service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        self.unauthorized = Arc::new(WebhookHandler::new(service));
        self
    }

    /// Limit the size of bodies buffered for verification.
    ///
    /// Bodies over the limit count as a failed read and are rejected as unauthorized.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Echo the calculated signature in an `X-Calculated-Signature` response header.
    ///
    /// Only enable this for debugging: it tells any caller the valid signature
    /// for the body they sent.
    pub fn set_calculated_signature_header(mut self, enabled: bool) -> Self {
        self.set_calculated_signature_header = enabled;
        self
    }

    /// The secret captured by routes registered from now on.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Change the secret for future registrations. Existing routes keep theirs.
    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = secret.into();
    }

    /// Map a GitHub event to a service, replacing any previous route for it.
    pub fn handle<S>(&mut self, event: impl Into<String>, service: S) -> Arc<Route>
    where
        S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        let secret = self.secret.clone();
        self.insert(event.into(), secret, WebhookHandler::new(service))
    }

    /// Map a GitHub event to an axum handler function.
    pub fn handle_fn<H, T>(&mut self, event: impl Into<String>, handler: H) -> Arc<Route>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let secret = self.secret.clone();
        self.insert(event.into(), secret, WebhookHandler::from_fn(handler))
    }

    /// Map a GitHub event to a service verified with its own secret.
    pub fn handle_with_secret<S>(
        &mut self,
        event: impl Into<String>,
        secret: impl Into<String>,
        service: S,
    ) -> Arc<Route>
    where
        S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        self.insert(event.into(), secret.into(), WebhookHandler::new(service))
    }

    fn insert(&mut self, event: String, secret: String, handler: WebhookHandler) -> Arc<Route> {
        let route = Arc::new(Route {
            event: event.clone(),
            secret,
            handler,
        });

        if Arc::make_mut(&mut self.routes)
            .insert(event, Arc::clone(&route))
            .is_some()
        {
            debug!(event = %route.event, "webhook_route_replaced");
        }

        route
    }

    /// The route registered for `event`, if any.
    pub fn route(&self, event: &str) -> Option<Arc<Route>> {
        self.routes.get(event).cloned()
    }

    /// Registered events, sorted.
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        events.sort_unstable();
        events
    }

    /// Resolve one delivery to not found, unauthorized, or the route handler.
    pub async fn dispatch(&self, req: Request) -> Response {
        let event = req
            .headers()
            .get(HEADER_EVENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let Some(route) = self.routes.get(&event).cloned() else {
            let err = DispatchError::RouteNotFound { event };
            warn!(error = %err, status = err.status_code().as_u16(), "webhook_route_not_found");
            return self.not_found.call(req).await;
        };

        let (parts, body) = req.into_parts();
        let body = match to_bytes(body, self.body_limit).await {
            Ok(body) => body,
            Err(e) => {
                let err = DispatchError::from(e);
                warn!(
                    event = %route.event,
                    error = %err,
                    status = err.status_code().as_u16(),
                    "webhook_body_read_failed"
                );
                let req = Request::from_parts(parts, Body::empty());
                return self.unauthorized.call(req).await;
            }
        };

        let verification = Verification::check(&parts.headers, &body, &route.secret);

        // The transport stream is spent; handlers read the buffered copy.
        let req = Request::from_parts(parts, Body::from(body));

        let mut response = match &verification {
            Verification::Mismatch { .. } => {
                let err = DispatchError::SignatureMismatch {
                    event: route.event.clone(),
                };
                warn!(error = %err, status = err.status_code().as_u16(), "webhook_signature_mismatch");
                self.unauthorized.call(req).await
            }
            Verification::Unsigned | Verification::Match { .. } => {
                debug!(
                    event = %route.event,
                    signed = verification.expected().is_some(),
                    "webhook_dispatch"
                );
                route.handler.call(req).await
            }
        };

        if self.set_calculated_signature_header {
            if let Some(value) = verification
                .expected()
                .and_then(|expected| HeaderValue::from_str(expected).ok())
            {
                response.headers_mut().insert(
                    HeaderName::from_static(HEADER_CALCULATED_SIGNATURE),
                    value,
                );
            }
        }

        response
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("events", &self.events())
            .field("body_limit", &self.body_limit)
            .field(
                "set_calculated_signature_header",
                &self.set_calculated_signature_header,
            )
            .finish_non_exhaustive()
    }
}

impl Service<Request> for Router {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.dispatch(req).await) })
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Outcome of checking `X-Hub-Signature` against the buffered body.
#[derive(Debug, PartialEq, Eq)]
enum Verification {
    /// No signature header: authorized unconditionally.
    Unsigned,
    Match { expected: String },
    Mismatch { expected: String },
}

impl Verification {
    /// An empty secret is still used as the key; it never skips the check.
    fn check(headers: &HeaderMap, body: &[u8], secret: &str) -> Self {
        let Some(provided) = headers.get(HEADER_SIGNATURE) else {
            return Verification::Unsigned;
        };

        let expected = signature_header_value(body, secret);
        if constant_time_compare(expected.as_bytes(), provided.as_bytes()) {
            Verification::Match { expected }
        } else {
            Verification::Mismatch { expected }
        }
    }

    fn expected(&self) -> Option<&str> {
        match self {
            Verification::Unsigned => None,
            Verification::Match { expected } | Verification::Mismatch { expected } => {
                Some(expected)
            }
        }
    }
}
