//! Configuration module for environment variable parsing.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::web::DEFAULT_BODY_LIMIT;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Path the webhook router is mounted at
    pub webhook_path: String,

    /// Shared secret GitHub signs deliveries with
    pub secret: String,

    /// Largest request body buffered for signature verification
    pub max_body_bytes: usize,

    /// Echo the calculated signature in responses (debugging only)
    pub set_calculated_signature_header: bool,

    /// Events to accept; `ping` always answers `Pong`
    pub events: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            webhook_path: "/webhooks".to_string(),
            secret: String::new(),
            max_body_bytes: DEFAULT_BODY_LIMIT,
            set_calculated_signature_header: false,
            events: vec!["ping".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_var("PORT", defaults.port),

            webhook_path: env::var("WEBHOOK_PATH")
                .ok()
                .filter(|p| p.starts_with('/'))
                .unwrap_or(defaults.webhook_path),

            secret: env::var("WEBHOOK_SECRET").unwrap_or(defaults.secret),

            max_body_bytes: parse_var("WEBHOOK_MAX_BODY_BYTES", defaults.max_body_bytes),

            set_calculated_signature_header: parse_bool(
                "WEBHOOK_SET_CALCULATED_SIGNATURE",
                defaults.set_calculated_signature_header,
            ),

            events: parse_csv("WEBHOOK_EVENTS").unwrap_or(defaults.events),
        }
    }
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a boolean flag such as "true", "1", "yes" or "off".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid flag, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
