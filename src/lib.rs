//! Prefix-mount reverse proxy library.
//!
//! Routes inbound requests to fixed upstream hosts by path prefix,
//! optionally rewriting the prefix, adjusting `Host`/`Origin` headers,
//! relaxing upstream TLS verification per route, and relaying WebSocket
//! upgrades.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use upstream::ProxyError;
