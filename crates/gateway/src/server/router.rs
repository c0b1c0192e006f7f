//! Axum router construction.

use std::{sync::Arc, time::Duration};

use axum::{extract::Request, middleware::from_fn, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::middleware;
use crate::strategy::Handler;

/// Build the application [`Router`]: every path and method goes to `handler`.
///
/// Layer order, outermost first: CORS, tracing, timeout. CORS sits outside
/// the timeout so a timed-out request still carries the headers.
pub fn build(handler: Arc<dyn Handler>, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(move |req: Request| {
            let handler = Arc::clone(&handler);
            async move { handler.handle(req).await }
        })
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::cors))
}
