//! Per-route header policy.
//!
//! # Responsibilities
//! - Rewrite `Host`/`Origin` to the upstream for change_origin routes
//! - Apply configured header hooks (remove/set) in declaration order
//! - Strip hop-by-hop headers that must not cross the proxy
//!
//! # Design Decisions
//! - Hooks run after the origin rewrite, so a hook can still strip or
//!   override what the rewrite produced
//! - The WebSocket variant never touches the handshake-critical headers

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::HeaderHookConfig;
use crate::routing::table::Route;

/// Headers that are connection-local and never forwarded.
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// A compiled header hook.
#[derive(Debug, Clone)]
pub enum HeaderHook {
    Remove { name: HeaderName },
    Set { name: HeaderName, value: HeaderValue },
}

/// Error type for hook compilation.
#[derive(Debug, Error)]
#[error("invalid header hook for {name:?}: {reason}")]
pub struct InvalidHeaderHook {
    pub name: String,
    pub reason: String,
}

impl HeaderHook {
    /// Compile a hook config, validating the header name and value.
    pub fn compile(config: &HeaderHookConfig) -> Result<Self, InvalidHeaderHook> {
        match config {
            HeaderHookConfig::Remove { name } => {
                let name = name.parse().map_err(|_| InvalidHeaderHook {
                    name: name.clone(),
                    reason: "not a valid header name".to_string(),
                })?;
                Ok(HeaderHook::Remove { name })
            }
            HeaderHookConfig::Set { name, value } => {
                let header_name: HeaderName = name.parse().map_err(|_| InvalidHeaderHook {
                    name: name.clone(),
                    reason: "not a valid header name".to_string(),
                })?;
                let value = value.parse().map_err(|_| InvalidHeaderHook {
                    name: name.clone(),
                    reason: "not a valid header value".to_string(),
                })?;
                Ok(HeaderHook::Set {
                    name: header_name,
                    value,
                })
            }
        }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        match self {
            HeaderHook::Remove { name } => {
                headers.remove(name);
            }
            HeaderHook::Set { name, value } => {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Apply the full header policy to an outbound HTTP request.
pub fn apply(headers: &mut HeaderMap, route: &Route) {
    strip_hop_by_hop(headers);

    if route.change_origin {
        headers.insert(header::HOST, route.host_header.clone());
        if headers.contains_key(header::ORIGIN) {
            headers.insert(header::ORIGIN, route.origin.clone());
        }
    }

    for hook in &route.hooks {
        hook.apply(headers);
    }
}

/// Apply the header policy to a WebSocket handshake request.
///
/// `Host`, `Connection`, `Upgrade` and the `Sec-WebSocket-*` family are
/// owned by the handshake and protected from hooks.
pub fn apply_ws(headers: &mut HeaderMap, route: &Route) {
    if route.change_origin && headers.contains_key(header::ORIGIN) {
        headers.insert(header::ORIGIN, route.origin.clone());
    }

    for hook in &route.hooks {
        let name = match hook {
            HeaderHook::Remove { name } => name,
            HeaderHook::Set { name, .. } => name,
        };
        if is_handshake_header(name) {
            continue;
        }
        hook.apply(headers);
    }
}

/// True for headers the WebSocket handshake owns.
pub fn is_handshake_header(name: &HeaderName) -> bool {
    name == header::HOST
        || name == header::CONNECTION
        || name == header::UPGRADE
        || name.as_str().starts_with("sec-websocket-")
}

/// Remove hop-by-hop headers, including those named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| name.trim().parse().ok())
        .collect();
    for name in named {
        headers.remove(name);
    }

    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}
