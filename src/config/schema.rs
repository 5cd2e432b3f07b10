//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions, matched in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Blanket CORS middleware, applied before route lookup.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Route configuration: one path-prefix mount onto a fixed upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match (literal compare, first match wins).
    pub prefix: String,

    /// Upstream target URL (http, https, ws or wss scheme).
    pub target: String,

    /// Rewrite the outbound `Host`/`Origin` headers to the target.
    #[serde(default = "default_true")]
    pub change_origin: bool,

    /// Verify the upstream TLS certificate. Opt-out is per route only.
    #[serde(default = "default_true")]
    pub secure: bool,

    /// Relay WebSocket upgrade requests on this route.
    #[serde(default)]
    pub ws: bool,

    /// Anchored prefix substitutions, first matching rule wins.
    #[serde(default)]
    pub path_rewrite: Vec<RewriteRuleConfig>,

    /// Header transformations applied to the outbound request.
    #[serde(default)]
    pub header_hooks: Vec<HeaderHookConfig>,
}

fn default_true() -> bool {
    true
}

/// A single path rewrite rule.
///
/// `pattern` is a start-anchored literal prefix; a leading `^` is accepted
/// and ignored so rules read like the familiar `"^/dapi" -> "/api"` form.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewriteRuleConfig {
    pub pattern: String,
    pub replacement: String,
}

/// A header transformation applied to the outbound request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HeaderHookConfig {
    /// Delete the named header before forwarding.
    Remove { name: String },
    /// Set (overwrite) the named header before forwarding.
    Set { name: String, value: String },
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout towards upstreams, in seconds.
    pub connect_secs: u64,

    /// Total request timeout in seconds. No timeout when absent.
    pub request_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: None,
        }
    }
}

/// Blanket CORS middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Echo `Access-Control-Allow-*` headers and short-circuit OPTIONS
    /// preflights with 204 before route lookup.
    pub enabled: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_defaults() {
        let route: RouteConfig = toml::from_str(
            r#"
            name = "api"
            prefix = "/api"
            target = "http://127.0.0.1:3002"
            "#,
        )
        .unwrap();

        assert!(route.change_origin);
        assert!(route.secure);
        assert!(!route.ws);
        assert!(route.path_rewrite.is_empty());
        assert!(route.header_hooks.is_empty());
    }

    #[test]
    fn header_hooks_parse_tagged() {
        let route: RouteConfig = toml::from_str(
            r#"
            name = "api"
            prefix = "/api"
            target = "http://127.0.0.1:3002"
            header_hooks = [
                { action = "remove", name = "origin" },
                { action = "set", name = "x-forwarded-proto", value = "https" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(route.header_hooks.len(), 2);
        assert!(matches!(
            &route.header_hooks[0],
            HeaderHookConfig::Remove { name } if name == "origin"
        ));
        assert!(matches!(
            &route.header_hooks[1],
            HeaderHookConfig::Set { name, value } if name == "x-forwarded-proto" && value == "https"
        ));
    }

    #[test]
    fn no_request_timeout_by_default() {
        let config = ProxyConfig::default();
        assert_eq!(config.timeouts.request_secs, None);
        assert_eq!(config.timeouts.connect_secs, 5);
    }
}
