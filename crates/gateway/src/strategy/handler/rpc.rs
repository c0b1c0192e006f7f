//! `rpc` handler: forward the request body as an RPC call to the routed node.
//!
//! The call is a `POST /` carrying `Micro-Service` and `Micro-Endpoint`
//! headers. `GET` requests send their query parameters as a JSON object.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::{Query, Request},
    http::{header::CONTENT_TYPE, HeaderValue, Method, Uri},
    response::Response,
};
use common::GatewayError;
use tracing::{debug, warn};

use super::{
    error_response, first_node, owned_router, read_body, send, upstream_client, upstream_uri,
    UpstreamClient, ENDPOINT_HEADER, SERVICE_HEADER,
};
use crate::strategy::{Handler, HandlerOptions, Router};

/// Query parameters as a JSON object body.
fn query_payload(uri: &Uri) -> Result<Bytes, GatewayError> {
    let Query(params) = Query::<BTreeMap<String, String>>::try_from_uri(uri)
        .map_err(|e| GatewayError::BadRequest(format!("invalid query string: {e}")))?;
    serde_json::to_vec(&params)
        .map(Bytes::from)
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

pub struct RpcHandler {
    router: Box<dyn Router>,
    client: UpstreamClient,
}

impl RpcHandler {
    pub fn new(opts: HandlerOptions) -> Self {
        Self {
            router: owned_router(opts),
            client: upstream_client(),
        }
    }

    async fn call(&self, req: Request) -> Result<Response, GatewayError> {
        let (parts, body) = req.into_parts();
        let route = self.router.route(&parts)?;
        let node = first_node(&route)?;

        let payload = if parts.method == Method::GET {
            query_payload(&parts.uri)?
        } else {
            read_body(body).await?
        };
        let content_type = match parts.headers.get(CONTENT_TYPE) {
            Some(ct) if parts.method != Method::GET => ct.clone(),
            _ => HeaderValue::from_static("application/json"),
        };

        debug!(service = %route.service, endpoint = %route.method, %node, "rpc call");
        let upstream = axum::http::Request::builder()
            .method(Method::POST)
            .uri(upstream_uri(node, "/")?)
            .header(CONTENT_TYPE, content_type)
            .header(SERVICE_HEADER, route.service.as_str())
            .header(ENDPOINT_HEADER, route.method.as_str())
            .body(Body::from(payload))
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        send(&self.client, upstream).await
    }
}

#[async_trait]
impl Handler for RpcHandler {
    fn kind(&self) -> &str {
        "rpc"
    }

    fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    async fn handle(&self, req: Request) -> Response {
        match self.call(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(handler = "rpc", error = %e, "request failed");
                error_response(&e)
            }
        }
    }
}
