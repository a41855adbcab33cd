//! # api-adapters
//!
//! The HTTP surface of rusty-social. Request payloads and the metrics
//! registry are framework-neutral; everything that touches axum is behind
//! the `web-axum` feature.

pub mod metrics;
pub mod payloads;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
mod router;
#[cfg(feature = "web-axum")]
mod state;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use router::router;
#[cfg(feature = "web-axum")]
pub use state::AppState;
