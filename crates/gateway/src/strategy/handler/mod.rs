//! Built-in handlers: `api`, `event`, `http`, `rpc` and `web`.
//!
//! Every handler routes the request, picks the first node of the route and
//! forwards over HTTP/1.1. Failures are answered with a JSON
//! [`ErrorResponse`](common::protocol::ErrorResponse) carrying the status of
//! the matching [`GatewayError`].

pub mod api;
pub mod event;
pub mod proxy;
pub mod rpc;

pub use api::ApiHandler;
pub use event::EventHandler;
pub use proxy::ProxyHandler;
pub use rpc::RpcHandler;

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common::{protocol::Pairs, GatewayError};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use super::{router::RegistryRouter, HandlerOptions, Route, Router, RouterOptions};

/// Largest request or upstream body a handler will buffer.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Header naming the target service on forwarded RPC and API calls.
pub const SERVICE_HEADER: &str = "micro-service";
/// Header naming the target RPC method on forwarded RPC and API calls.
pub const ENDPOINT_HEADER: &str = "micro-endpoint";
/// Header naming the topic of a forwarded event.
pub const TOPIC_HEADER: &str = "micro-topic";

pub(crate) type UpstreamClient = Client<HttpConnector, Body>;

pub(crate) fn upstream_client() -> UpstreamClient {
    Client::builder(TokioExecutor::new()).build_http()
}

/// Take the router out of `opts`, defaulting to `registry`.
pub(crate) fn owned_router(opts: HandlerOptions) -> Box<dyn Router> {
    opts.router
        .unwrap_or_else(|| Box::new(RegistryRouter::new(RouterOptions::default())))
}

/// Render a [`GatewayError`] as a JSON response.
pub fn error_response(err: &GatewayError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_body())).into_response()
}

/// First node of the route; no balancing is attempted.
pub(crate) fn first_node(route: &Route) -> Result<&str, GatewayError> {
    route
        .nodes
        .first()
        .map(String::as_str)
        .ok_or_else(|| GatewayError::Unavailable(format!("no nodes for {}", route.service)))
}

/// Absolute `http://` URI for `path_and_query` on `node`.
pub(crate) fn upstream_uri(node: &str, path_and_query: &str) -> Result<Uri, GatewayError> {
    let base = node.trim_end_matches('/');
    let uri = if base.starts_with("http://") {
        format!("{base}{path_and_query}")
    } else {
        format!("http://{base}{path_and_query}")
    };
    uri.parse()
        .map_err(|e| GatewayError::Internal(format!("invalid upstream uri {uri}: {e}")))
}

/// Send `req` upstream and hand the response back as an axum response.
pub(crate) async fn send(
    client: &UpstreamClient,
    req: axum::http::Request<Body>,
) -> Result<Response, GatewayError> {
    let uri = req.uri().clone();
    let resp: hyper::Response<Incoming> = client
        .request(req)
        .await
        .map_err(|e| GatewayError::BadGateway(format!("{uri}: {e}")))?;
    Ok(resp.map(Body::new))
}

pub(crate) async fn read_body(body: Body) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| GatewayError::BadRequest(format!("unreadable body: {e}")))
}

/// Copy every textual header into `pairs`.
pub(crate) fn header_pairs(headers: &HeaderMap, pairs: &mut Pairs) {
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            common::protocol::push_pair(pairs, name.as_str(), value);
        }
    }
}
