//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route + rewritten path
//!     → headers.rs (Host/Origin policy, hooks, hop-by-hop strip)
//!     → dispatch.rs (pooled client, streamed request/response)
//!       or
//!     → websocket.rs (upstream handshake, duplex frame relay)
//! ```
//!
//! # Design Decisions
//! - Failures are local to one exchange and mapped to responses here
//! - No retries: a dev proxy should surface upstream failures, not mask them
//! - A client that disconnects mid-exchange is not an error; the handler
//!   task is dropped and the upstream side goes with it

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub mod dispatch;
pub mod headers;
pub mod tls;
pub mod websocket;

/// Per-exchange proxy failure taxonomy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no route matches the request path")]
    NoRouteMatch,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("upstream TLS verification failed: {0}")]
    UpstreamTls(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("upstream rejected WebSocket upgrade with status {status}")]
    UpgradeRejected { status: StatusCode, body: Vec<u8> },

    #[error("malformed WebSocket upgrade request")]
    InvalidUpgrade,

    #[error("failed to build upstream request: {0}")]
    UpstreamRequest(#[from] axum::http::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::NoRouteMatch => {
                (StatusCode::NOT_FOUND, "No matching route found").into_response()
            }
            ProxyError::UpstreamUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response()
            }
            ProxyError::UpstreamTls(_) => {
                (StatusCode::BAD_GATEWAY, "Upstream TLS verification failed").into_response()
            }
            // The upstream's refusal is relayed verbatim.
            ProxyError::UpgradeRejected { status, body } => {
                let mut response = Response::new(Body::from(body));
                *response.status_mut() = status;
                response
            }
            ProxyError::InvalidUpgrade => {
                (StatusCode::BAD_REQUEST, "Malformed upgrade request").into_response()
            }
            ProxyError::UpstreamRequest(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build upstream request")
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            ProxyError::NoRouteMatch.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProxyError::UpstreamUnavailable("refused".into())
                .into_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::UpstreamTls("bad cert".into())
                .into_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn upgrade_rejection_is_relayed_verbatim() {
        let response = ProxyError::UpgradeRejected {
            status: StatusCode::FORBIDDEN,
            body: b"denied".to_vec(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
