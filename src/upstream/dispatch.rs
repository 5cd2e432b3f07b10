//! Upstream HTTP dispatch.
//!
//! # Responsibilities
//! - Build the outbound request (rewritten path, policy-applied headers)
//! - Stream the request body up and the response body back, unbuffered
//! - Classify connection and TLS failures, without retrying
//!
//! # Design Decisions
//! - One pooled client per route: pool exhaustion on one upstream can
//!   never block another route's traffic
//! - TLS failures are surfaced distinctly and never downgraded

use std::time::Duration;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::uri::Uri;
use axum::http::Request;
use axum::response::Response;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::routing::table::Route;
use crate::upstream::headers;
use crate::upstream::ProxyError;

/// Pooled HTTP client used for one route's upstream.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build a pooled client around the given TLS config.
pub fn build_client(tls: &rustls::ClientConfig, connect_timeout: Duration) -> UpstreamClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(connect_timeout));

    let https = HttpsConnectorBuilder::new()
        .with_tls_config(tls.clone())
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

/// Forward a request to the route's upstream and stream the response back.
pub async fn forward(
    mut parts: Parts,
    body: Body,
    route: &Route,
    rewritten_path: &str,
) -> Result<Response, ProxyError> {
    headers::apply(&mut parts.headers, route);

    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{rewritten_path}?{query}"),
        None => rewritten_path.to_string(),
    };
    let uri = Uri::builder()
        .scheme(route.scheme.clone())
        .authority(route.authority.clone())
        .path_and_query(path_and_query)
        .build()?;

    let mut request = Request::builder().method(parts.method).uri(uri);
    if let Some(headers) = request.headers_mut() {
        *headers = parts.headers;
    }
    let request = request.body(body)?;

    tracing::trace!(
        route = %route.name,
        target = %route.authority,
        "Dispatching to upstream"
    );

    match route.client.request(request).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            headers::strip_hop_by_hop(&mut parts.headers);
            Ok(Response::from_parts(parts, Body::new(body)))
        }
        Err(e) => Err(classify_client_error(e)),
    }
}

/// Map a client error onto the proxy taxonomy.
///
/// rustls failures surface deep in the source chain; anything else that
/// kept the exchange from completing counts as an unavailable upstream.
fn classify_client_error(err: hyper_util::client::legacy::Error) -> ProxyError {
    if source_chain_has_tls_error(&err) {
        ProxyError::UpstreamTls(Box::new(err))
    } else {
        ProxyError::UpstreamUnavailable(Box::new(err))
    }
}

pub(crate) fn source_chain_has_tls_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_errors_detected_in_source_chain() {
        let tls = rustls::Error::InvalidCertificate(rustls::CertificateError::BadSignature);
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, tls);
        assert!(source_chain_has_tls_error(&io));

        let plain = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!source_chain_has_tls_error(&plain));
    }
}
