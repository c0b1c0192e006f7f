//! Axum HTTP server, routing and middleware.
//!
//! # Responsibilities
//! - Wrap the assembled handler in the CORS, tracing and timeout layers.
//! - Bind the listener on `start` and release it on `stop`.

pub mod http;
pub mod middleware;
pub mod router;

pub use http::{HttpServer, ServerError};
