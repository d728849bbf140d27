//! Web module for de-multiplexing and authenticating GitHub webhooks.
//!
//! This module provides:
//! - HMAC-SHA1 signing and verification of delivery bodies
//! - A router that maps `X-GitHub-Event` values to handlers
//! - Default collaborators and the handlers the binary registers
//!
//! ## Dispatch Flow
//!
//! ```text
//! Request → event lookup → (404) | buffer body → verify signature → (403) | route handler
//! ```

pub mod handlers;
pub mod router;
pub mod signature;

/// Header carrying the type of event.
pub const HEADER_EVENT: &str = "X-GitHub-Event";

/// Header carrying the signature of the request body.
pub const HEADER_SIGNATURE: &str = "X-Hub-Signature";

/// Header carrying the unique delivery id.
pub const HEADER_DELIVERY: &str = "X-GitHub-Delivery";

/// Response header set with the calculated signature when enabled on the router.
pub const HEADER_CALCULATED_SIGNATURE: &str = "x-calculated-signature";

pub use handlers::{
    accept_event, health, not_found, ping, unauthorized, EventReceipt, HealthResponse,
    NOT_FOUND_MESSAGE, UNAUTHORIZED_MESSAGE,
};
pub use router::{Route, Router, WebhookHandler, DEFAULT_BODY_LIMIT};
pub use signature::{sign, signature_header_value, verify, SIGNATURE_PREFIX};
