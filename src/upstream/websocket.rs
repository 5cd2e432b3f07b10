//! WebSocket upgrade relay.
//!
//! # State Machine
//! ```text
//! Idle → Handshaking → Relaying → Closed
//! ```
//! The upstream handshake completes before the client upgrade is
//! accepted, so an upstream refusal can be relayed verbatim. Once both
//! sides are upgraded, two copy loops relay frames until either
//! direction closes or errors, which tears down both.
//!
//! # Design Decisions
//! - Frame-level forwarding, no message buffering
//! - Ping/pong and close frames are relayed like any other frame
//! - Routes with `ws = false` never reach this module; their upgrade
//!   requests are forwarded as plain HTTP

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::{Message, Role};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, WebSocketStream};

use crate::routing::table::Route;
use crate::upstream::dispatch::source_chain_has_tls_error;
use crate::upstream::headers;
use crate::upstream::ProxyError;

/// True if the request asks to upgrade the connection to a WebSocket.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    connection_upgrade && websocket
}

/// Handshake against the upstream, then complete the client upgrade and
/// relay frames both ways until either side closes.
pub async fn relay(
    mut request: Request<Body>,
    route: &Route,
    rewritten_path: &str,
) -> Result<Response, ProxyError> {
    let key = request
        .headers()
        .get(header::SEC_WEBSOCKET_KEY)
        .ok_or(ProxyError::InvalidUpgrade)?
        .clone();

    // Handshaking: upstream first, so a refusal can be relayed verbatim.
    let ws_scheme = match route.target.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    let query = request
        .uri()
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    let url = format!("{ws_scheme}://{}{rewritten_path}{query}", route.authority);

    let mut upstream_request = url
        .as_str()
        .into_client_request()
        .map_err(classify_ws_error)?;
    copy_handshake_headers(request.headers(), upstream_request.headers_mut());
    headers::apply_ws(upstream_request.headers_mut(), route);

    let connector = Connector::Rustls(route.tls.clone());
    let (upstream, upstream_response) =
        connect_async_tls_with_config(upstream_request, None, false, Some(connector))
            .await
            .map_err(classify_ws_error)?;

    // Upstream accepted: take over the client connection.
    let on_upgrade = hyper::upgrade::on(&mut request);
    let accept = derive_accept_key(key.as_bytes());
    let route_name = route.name.clone();

    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let client = WebSocketStream::from_raw_socket(
                    TokioIo::new(upgraded),
                    Role::Server,
                    None,
                )
                .await;
                relay_frames(client, upstream, &route_name).await;
            }
            Err(e) => {
                tracing::debug!(route = %route_name, error = %e, "Client upgrade failed");
            }
        }
    });

    let mut response = axum::http::Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_ACCEPT, accept);
    if let Some(protocol) = upstream_response.headers().get(header::SEC_WEBSOCKET_PROTOCOL) {
        response = response.header(header::SEC_WEBSOCKET_PROTOCOL, protocol.clone());
    }
    Ok(response.body(Body::empty())?)
}

/// Copy inbound headers onto the upstream handshake request, leaving out
/// everything the handshake itself owns. The negotiated subprotocol
/// header is the one `Sec-WebSocket-*` header that passes through.
fn copy_handshake_headers(inbound: &HeaderMap, outbound: &mut HeaderMap) {
    for (name, value) in inbound {
        if excluded_from_handshake(name) {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
}

fn excluded_from_handshake(name: &HeaderName) -> bool {
    if name == header::SEC_WEBSOCKET_PROTOCOL {
        return false;
    }
    headers::is_handshake_header(name)
        || name == header::TE
        || name == header::TRAILER
        || name == header::TRANSFER_ENCODING
        || name == header::PROXY_AUTHENTICATE
        || name == header::PROXY_AUTHORIZATION
        || name.as_str() == "keep-alive"
}

/// Two copy loops joined by a select: either direction ending (close or
/// error) cancels the other and drops both sockets.
async fn relay_frames<C, U>(client: WebSocketStream<C>, upstream: WebSocketStream<U>, route: &str)
where
    C: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    U: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(message) = client_rx.next().await {
            let message = match message {
                Ok(m) => m,
                Err(_) => break,
            };
            let closing = matches!(message, Message::Close(_));
            if upstream_tx.send(message).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
    };

    let upstream_to_client = async {
        while let Some(message) = upstream_rx.next().await {
            let message = match message {
                Ok(m) => m,
                Err(_) => break,
            };
            let closing = matches!(message, Message::Close(_));
            if client_tx.send(message).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }

    // Best-effort close of whichever halves are still open; dropping the
    // streams afterwards releases the sockets unconditionally.
    let _ = client_tx.close().await;
    let _ = upstream_tx.close().await;
    tracing::debug!(route = %route, "WebSocket relay closed");
}

/// Map a handshake failure onto the proxy taxonomy.
fn classify_ws_error(err: tokio_tungstenite::tungstenite::Error) -> ProxyError {
    use tokio_tungstenite::tungstenite::Error;

    match err {
        Error::Http(response) => {
            let (parts, body) = response.into_parts();
            ProxyError::UpgradeRejected {
                status: parts.status,
                body: body.unwrap_or_default(),
            }
        }
        Error::Tls(e) => ProxyError::UpstreamTls(Box::new(e)),
        Error::Io(e) if source_chain_has_tls_error(&e) => ProxyError::UpstreamTls(Box::new(e)),
        other => ProxyError::UpstreamUnavailable(Box::new(other)),
    }
}
