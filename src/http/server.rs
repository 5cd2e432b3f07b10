//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID, optional timeout, CORS)
//! - Look up the matched route and rewrite the path
//! - Hand the exchange to the upstream dispatcher or WebSocket relay
//! - Observability (metrics, correlation IDs)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::middleware::cors::cors_middleware;
use crate::http::request::{self, RequestIdLayer};
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::routing::table::RouteTableError;
use crate::routing::{rewrite_path, RouteTable};
use crate::upstream::{dispatch, websocket, ProxyError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouteTable>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Compile the route table and build the middleware stack.
    pub fn new(config: ProxyConfig) -> Result<Self, RouteTableError> {
        let table = Arc::new(RouteTable::from_config(&config.routes, &config.timeouts)?);
        let state = AppState { table };
        let router = Self::build_router(&config, state);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// CORS sits closest to the handler so it still runs before route
    /// lookup but after the request ID is assigned; the timeout layer is
    /// only present when configured.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state);

        if config.cors.enabled {
            router = router.layer(axum::middleware::from_fn(cors_middleware));
        }
        if let Some(secs) = config.timeouts.request_secs {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(secs)));
        }

        router
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(signals::shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler: route lookup, path rewrite, then dispatch.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request::request_id(&request).to_string();
    let path = request.uri().path().to_string();
    let method = request.method().to_string();

    let Some(route) = state.table.matched(&path) else {
        tracing::warn!(request_id = %request_id, path = %path, "No route matched");
        metrics::record_request(&method, 404, "none", start);
        return ProxyError::NoRouteMatch.into_response();
    };

    let rewritten = rewrite_path(&path, &route.rewrites);

    tracing::debug!(
        request_id = %request_id,
        peer = %peer,
        method = %method,
        path = %path,
        rewritten = %rewritten,
        route = %route.name,
        target = %route.target,
        "Proxying request"
    );

    let result = if route.ws && websocket::is_upgrade_request(request.headers()) {
        websocket::relay(request, route, &rewritten).await
    } else {
        let (parts, body) = request.into_parts();
        dispatch::forward(parts, body, route, &rewritten).await
    };

    match result {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), &route.name, start);
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                route = %route.name,
                error = %e,
                "Proxy exchange failed"
            );
            let response = e.into_response();
            metrics::record_request(&method, response.status().as_u16(), &route.name, start);
            response
        }
    }
}
