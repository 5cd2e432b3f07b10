//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check targets parse and use a supported scheme
//! - Detect dead routes (exact duplicate prefixes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Overlapping prefixes are allowed: declaration order decides, and
//!   shadowing a longer prefix with an earlier shorter one is legitimate
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::{HeaderHookConfig, ProxyConfig};

const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

/// A single semantic configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener bind address {address:?} is not a valid socket address")]
    InvalidBindAddress { address: String },

    #[error("route #{index} has an empty name")]
    EmptyRouteName { index: usize },

    #[error("route name {name:?} is declared more than once")]
    DuplicateRouteName { name: String },

    #[error("route {route:?}: prefix {prefix:?} must start with '/'")]
    InvalidPrefix { route: String, prefix: String },

    #[error("route {route:?}: target {target:?} is not a valid URL: {reason}")]
    InvalidTarget {
        route: String,
        target: String,
        reason: String,
    },

    #[error("route {route:?}: target scheme {scheme:?} is not one of http/https/ws/wss")]
    UnsupportedScheme { route: String, scheme: String },

    #[error("route {route:?}: target {target:?} has no host")]
    MissingTargetHost { route: String, target: String },

    #[error("route {route:?}: rewrite pattern must be a non-empty path prefix")]
    InvalidRewritePattern { route: String, pattern: String },

    #[error("route {route:?}: rewrite replacement {replacement:?} must be empty or start with '/'")]
    InvalidRewriteReplacement { route: String, replacement: String },

    #[error("route {route:?}: {name:?} is not a valid header name")]
    InvalidHeaderName { route: String, name: String },

    #[error("route {route:?}: value for header {name:?} is not a valid header value")]
    InvalidHeaderValue { route: String, name: String },

    #[error("route {route:?}: prefix {prefix:?} already mounted by route {earlier:?}, this route can never match")]
    DeadRoute {
        route: String,
        earlier: String,
        prefix: String,
    },
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::InvalidBindAddress {
            address: config.listener.bind_address.clone(),
        });
    }

    let mut seen_names: HashSet<&str> = HashSet::new();
    let mut seen_prefixes: Vec<(&str, &str)> = Vec::new();

    for (index, route) in config.routes.iter().enumerate() {
        if route.name.is_empty() {
            errors.push(ValidationError::EmptyRouteName { index });
        } else if !seen_names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName {
                name: route.name.clone(),
            });
        }

        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                route: route.name.clone(),
                prefix: route.prefix.clone(),
            });
        }

        if let Some((_, earlier)) = seen_prefixes
            .iter()
            .find(|(prefix, _)| *prefix == route.prefix)
        {
            errors.push(ValidationError::DeadRoute {
                route: route.name.clone(),
                earlier: earlier.to_string(),
                prefix: route.prefix.clone(),
            });
        } else {
            seen_prefixes.push((route.prefix.as_str(), route.name.as_str()));
        }

        match Url::parse(&route.target) {
            Ok(url) => {
                if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
                    errors.push(ValidationError::UnsupportedScheme {
                        route: route.name.clone(),
                        scheme: url.scheme().to_string(),
                    });
                } else if url.host_str().is_none() {
                    errors.push(ValidationError::MissingTargetHost {
                        route: route.name.clone(),
                        target: route.target.clone(),
                    });
                }
            }
            Err(e) => {
                errors.push(ValidationError::InvalidTarget {
                    route: route.name.clone(),
                    target: route.target.clone(),
                    reason: e.to_string(),
                });
            }
        }

        for rule in &route.path_rewrite {
            let pattern = rule.pattern.strip_prefix('^').unwrap_or(&rule.pattern);
            if !pattern.starts_with('/') {
                errors.push(ValidationError::InvalidRewritePattern {
                    route: route.name.clone(),
                    pattern: rule.pattern.clone(),
                });
            }
            if !rule.replacement.is_empty() && !rule.replacement.starts_with('/') {
                errors.push(ValidationError::InvalidRewriteReplacement {
                    route: route.name.clone(),
                    replacement: rule.replacement.clone(),
                });
            }
        }

        for hook in &route.header_hooks {
            let (name, value) = match hook {
                HeaderHookConfig::Remove { name } => (name, None),
                HeaderHookConfig::Set { name, value } => (name, Some(value)),
            };
            if name.parse::<HeaderName>().is_err() {
                errors.push(ValidationError::InvalidHeaderName {
                    route: route.name.clone(),
                    name: name.clone(),
                });
            }
            if let Some(value) = value {
                if value.parse::<HeaderValue>().is_err() {
                    errors.push(ValidationError::InvalidHeaderValue {
                        route: route.name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render a list of validation errors as a single line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RewriteRuleConfig, RouteConfig};

    fn route(name: &str, prefix: &str, target: &str) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            prefix: prefix.to_string(),
            target: target.to_string(),
            change_origin: true,
            secure: true,
            ws: false,
            path_rewrite: Vec::new(),
            header_hooks: Vec::new(),
        }
    }

    #[test]
    fn valid_config_passes() {
        let mut config = ProxyConfig::default();
        config.routes.push(route("api", "/api", "http://127.0.0.1:3002"));
        config.routes.push(route("mqtt", "/mqtt", "ws://127.0.0.1:8083"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.routes.push(route("bad", "api", "ftp://127.0.0.1"));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidBindAddress {
            address: "not-an-address".to_string()
        }));
        assert!(errors.contains(&ValidationError::InvalidPrefix {
            route: "bad".to_string(),
            prefix: "api".to_string()
        }));
        assert!(errors.contains(&ValidationError::UnsupportedScheme {
            route: "bad".to_string(),
            scheme: "ftp".to_string()
        }));
    }

    #[test]
    fn overlapping_prefixes_allowed_duplicates_rejected() {
        let mut config = ProxyConfig::default();
        config.routes.push(route("api", "/api", "http://127.0.0.1:3002"));
        config.routes.push(route("api-v2", "/api/v2", "http://127.0.0.1:3003"));
        assert!(validate_config(&config).is_ok());

        config.routes.push(route("api-dup", "/api", "http://127.0.0.1:3004"));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DeadRoute {
                route: "api-dup".to_string(),
                earlier: "api".to_string(),
                prefix: "/api".to_string(),
            }]
        );
    }

    #[test]
    fn rewrite_rules_checked() {
        let mut config = ProxyConfig::default();
        let mut r = route("dapi", "/dapi", "http://127.0.0.1:3000");
        r.path_rewrite.push(RewriteRuleConfig {
            pattern: "^dapi".to_string(),
            replacement: "api".to_string(),
        });
        config.routes.push(r);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn header_hooks_checked() {
        let mut config = ProxyConfig::default();
        let mut r = route("api", "/api", "http://127.0.0.1:3002");
        r.header_hooks.push(HeaderHookConfig::Set {
            name: "bad header".to_string(),
            value: "x".to_string(),
        });
        config.routes.push(r);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidHeaderName {
                route: "api".to_string(),
                name: "bad header".to_string(),
            }]
        );
    }
}
