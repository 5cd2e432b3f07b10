//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → middleware/cors.rs (preflight short-circuit, before routing)
//!     → request.rs (request ID injection)
//!     → [route table lookup + upstream dispatch]
//!     → response streamed to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestIdLayer, X_REQUEST_ID};
pub use server::HttpServer;
