//! Hookshot - a router that de-multiplexes and authenticates GitHub webhooks.
//!
//! Deliveries are routed by their `X-GitHub-Event` header. Before a route's
//! handler runs, the `X-Hub-Signature` header is checked against an
//! HMAC-SHA1 of the raw body keyed with the route's secret.
//!
//! ## Outcomes
//!
//! ```text
//! unknown event          → 404
//! signature mismatch     → 403
//! unsigned or verified   → route handler
//! ```

pub mod config;
pub mod error;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::DispatchError;
pub use web::{sign, Route, Router, WebhookHandler};
