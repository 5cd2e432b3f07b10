//! Route table: ordered prefix mounts, first match wins.
//!
//! # Responsibilities
//! - Compile route configs into immutable runtime routes
//! - Look up the matching route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) declaration-order scan; no trie needed for a handful of mounts
//! - Explicit `None` rather than a silent default route

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::HeaderValue;
use axum::http::uri::{Authority, Scheme};
use thiserror::Error;
use url::Url;

use crate::config::schema::{RouteConfig, TimeoutConfig};
use crate::routing::rewrite::RewriteRule;
use crate::upstream::dispatch::{build_client, UpstreamClient};
use crate::upstream::headers::HeaderHook;
use crate::upstream::tls::{self, TlsInitError};

/// Error type for route compilation.
#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("route {route:?}: invalid target URL {target:?}: {source}")]
    InvalidTarget {
        route: String,
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("route {route:?}: target {target:?} has no host")]
    MissingHost { route: String, target: String },

    #[error("route {route:?}: unsupported target scheme {scheme:?}")]
    UnsupportedScheme { route: String, scheme: String },

    #[error("route {route:?}: target authority is invalid: {source}")]
    InvalidAuthority {
        route: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("route {route:?}: invalid header hook: {reason}")]
    InvalidHeaderHook { route: String, reason: String },

    #[error(transparent)]
    Tls(#[from] TlsInitError),
}

/// A compiled route: one prefix mount onto a fixed upstream.
///
/// Everything derivable from the config is computed once here so the
/// per-request path only does a prefix compare and header clones.
#[derive(Debug, Clone)]
pub struct Route {
    /// Route identifier for logging/metrics.
    pub name: String,
    /// Literal path prefix this route is mounted on.
    pub prefix: String,
    /// Parsed target URL as configured.
    pub target: Url,
    /// Target authority (`host[:port]`, port only when explicit).
    pub authority: Authority,
    /// Outbound URI scheme (ws/wss are normalized to http/https).
    pub scheme: Scheme,
    /// Precomputed `Host` header value for change_origin routes.
    pub host_header: HeaderValue,
    /// Precomputed `Origin` header value for change_origin routes.
    pub origin: HeaderValue,
    pub change_origin: bool,
    pub secure: bool,
    pub ws: bool,
    pub rewrites: Vec<RewriteRule>,
    pub hooks: Vec<HeaderHook>,
    /// TLS client config matching this route's `secure` flag; also used
    /// for wss upstream handshakes.
    pub tls: Arc<rustls::ClientConfig>,
    /// Pooled HTTP client owned by this route, isolating its upstream
    /// pool from every other route.
    pub client: UpstreamClient,
}

impl Route {
    fn compile(
        config: &RouteConfig,
        timeouts: &TimeoutConfig,
        secure_tls: &Arc<rustls::ClientConfig>,
        insecure_tls: &Arc<rustls::ClientConfig>,
    ) -> Result<Self, RouteTableError> {
        let target =
            Url::parse(&config.target).map_err(|source| RouteTableError::InvalidTarget {
                route: config.name.clone(),
                target: config.target.clone(),
                source,
            })?;

        let host = target
            .host_str()
            .ok_or_else(|| RouteTableError::MissingHost {
                route: config.name.clone(),
                target: config.target.clone(),
            })?;

        let authority_str = match target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let (scheme, origin_scheme) = match target.scheme() {
            "http" | "ws" => (Scheme::HTTP, "http"),
            "https" | "wss" => (Scheme::HTTPS, "https"),
            other => {
                return Err(RouteTableError::UnsupportedScheme {
                    route: config.name.clone(),
                    scheme: other.to_string(),
                })
            }
        };

        let authority = Authority::from_str(&authority_str).map_err(|source| {
            RouteTableError::InvalidAuthority {
                route: config.name.clone(),
                source,
            }
        })?;

        // Authority chars are a subset of valid header chars, so these
        // conversions only fail on a bug upstream of validation.
        let host_header = HeaderValue::from_str(&authority_str).map_err(|e| {
            RouteTableError::InvalidHeaderHook {
                route: config.name.clone(),
                reason: e.to_string(),
            }
        })?;
        let origin = HeaderValue::from_str(&format!("{origin_scheme}://{authority_str}"))
            .map_err(|e| RouteTableError::InvalidHeaderHook {
                route: config.name.clone(),
                reason: e.to_string(),
            })?;

        let rewrites = config
            .path_rewrite
            .iter()
            .map(|rule| RewriteRule::new(&rule.pattern, &rule.replacement))
            .collect();

        let hooks = config
            .header_hooks
            .iter()
            .map(HeaderHook::compile)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RouteTableError::InvalidHeaderHook {
                route: config.name.clone(),
                reason: e.to_string(),
            })?;

        let tls = if config.secure {
            secure_tls.clone()
        } else {
            insecure_tls.clone()
        };

        let client = build_client(&tls, Duration::from_secs(timeouts.connect_secs));

        Ok(Self {
            name: config.name.clone(),
            prefix: config.prefix.clone(),
            target,
            authority,
            scheme,
            host_header,
            origin,
            change_origin: config.change_origin,
            secure: config.secure,
            ws: config.ws,
            rewrites,
            hooks,
            tls,
            client,
        })
    }
}

/// Immutable, ordered route table shared by all request tasks.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile the configured routes into a runtime table.
    ///
    /// The two TLS client configs (verifying and trust-all) are built once
    /// and shared by every route with the matching `secure` flag.
    pub fn from_config(
        routes: &[RouteConfig],
        timeouts: &TimeoutConfig,
    ) -> Result<Self, RouteTableError> {
        let secure_tls = Arc::new(tls::verifying_client_config()?);
        let insecure_tls = Arc::new(tls::trust_all_client_config()?);

        let routes = routes
            .iter()
            .map(|config| Route::compile(config, timeouts, &secure_tls, &insecure_tls))
            .collect::<Result<Vec<_>, _>>()?;

        if routes.is_empty() {
            tracing::warn!("Route table is empty, all requests will get 404");
        }

        Ok(Self { routes })
    }

    /// Return the first route whose prefix the path starts with.
    pub fn matched(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| path.starts_with(&r.prefix))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
