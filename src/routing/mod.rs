//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → table.rs (ordered prefix scan, first match wins)
//!     → rewrite.rs (anchored prefix substitution)
//!     → Return: matched Route + rewritten path, or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → parse targets, compile hooks, build per-upstream clients
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Declaration order is the match order; no priorities, no regex
//! - One pooled HTTP client per route so upstream pools stay isolated

pub mod rewrite;
pub mod table;

pub use rewrite::{rewrite_path, RewriteRule};
pub use table::{Route, RouteTable};
