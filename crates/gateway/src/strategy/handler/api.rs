//! `api` handler: wrap the whole HTTP request in an [`ApiRequest`] envelope.
//!
//! The upstream node answers with an [`ApiResponse`] envelope, which is
//! unwrapped into the reply. Non-2xx upstream answers pass through untouched.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Query, Request},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, StatusCode},
    response::Response,
};
use common::{
    protocol::{push_pair, ApiRequest, ApiResponse},
    GatewayError,
};
use tracing::warn;

use super::{
    error_response, first_node, header_pairs, owned_router, read_body, send, upstream_client,
    upstream_uri, UpstreamClient, ENDPOINT_HEADER, SERVICE_HEADER,
};
use crate::strategy::{Handler, HandlerOptions, Router};

pub struct ApiHandler {
    router: Box<dyn Router>,
    client: UpstreamClient,
}

impl ApiHandler {
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
        let body = read_body(body).await?;

        let mut envelope = ApiRequest {
            method: parts.method.to_string(),
            path: parts.uri.path().to_owned(),
            url: parts.uri.to_string(),
            ..Default::default()
        }
        .with_body(&body);
        header_pairs(&parts.headers, &mut envelope.header);
        if let Ok(Query(query)) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) {
            for (key, value) in query {
                push_pair(&mut envelope.get, &key, value);
            }
        }

        let payload =
            serde_json::to_vec(&envelope).map_err(|e| GatewayError::Internal(e.to_string()))?;
        let upstream = axum::http::Request::builder()
            .method(Method::POST)
            .uri(upstream_uri(node, "/")?)
            .header(CONTENT_TYPE, "application/json")
            .header(SERVICE_HEADER, route.service.as_str())
            .header(ENDPOINT_HEADER, route.method.as_str())
            .body(Body::from(payload))
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        let resp = send(&self.client, upstream).await?;
        if !resp.status().is_success() {
            return Ok(resp);
        }
        let raw = read_body(resp.into_body()).await?;
        let reply: ApiResponse = serde_json::from_slice(&raw)
            .map_err(|e| GatewayError::BadGateway(format!("invalid api response: {e}")))?;
        unwrap_reply(reply)
    }
}

/// Turn an [`ApiResponse`] envelope into an HTTP response.
fn unwrap_reply(reply: ApiResponse) -> Result<Response, GatewayError> {
    let status = StatusCode::from_u16(reply.status_code).map_err(|_| {
        GatewayError::BadGateway(format!("invalid upstream status {}", reply.status_code))
    })?;
    let mut resp = Response::new(Body::from(reply.body));
    *resp.status_mut() = status;
    for pair in reply.header.values() {
        let Ok(name) = HeaderName::from_bytes(pair.key.as_bytes()) else {
            continue;
        };
        for value in &pair.values {
            if let Ok(value) = HeaderValue::from_str(value) {
                resp.headers_mut().append(name.clone(), value);
            }
        }
    }
    Ok(resp)
}

#[async_trait]
impl Handler for ApiHandler {
    fn kind(&self) -> &str {
        "api"
    }

    fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    async fn handle(&self, req: Request) -> Response {
        match self.call(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(handler = "api", error = %e, "request failed");
                error_response(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::handler::testing::{options_for, spawn_upstream};
    use axum::{routing::post, Json, Router as AxumRouter};
    use common::protocol::{Pair, Pairs};

    /// Upstream that reflects the envelope it received back to the caller.
    async fn reflect(Json(req): Json<ApiRequest>) -> Json<ApiResponse> {
        let mut header = Pairs::new();
        header.insert(
            "x-seen-method".into(),
            Pair {
                key: "x-seen-method".into(),
                values: vec![req.method.clone()],
            },
        );
        Json(ApiResponse {
            status_code: 201,
            header,
            body: format!(
                "{} {} {} {}",
                req.path, req.get["q"].values[0], req.header["x-user-id"].values[0], req.body
            ),
        })
    }

    #[tokio::test]
    async fn envelope_round_trip() {
        let node = spawn_upstream(AxumRouter::new().route("/", post(reflect))).await;
        let handler = ApiHandler::new(options_for(Some(node)));

        let req = axum::http::Request::builder()
            .method("PATCH")
            .uri("/greeter/hello?q=search")
            .header("x-user-id", "42")
            .body(Body::from("payload"))
            .unwrap();
        let resp = handler.handle(req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()["x-seen-method"], "PATCH");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"/greeter/hello search 42 payload");
    }

    #[tokio::test]
    async fn upstream_error_passes_through() {
        let node = spawn_upstream(
            AxumRouter::new().route("/", post(|| async { StatusCode::IM_A_TEAPOT })),
        )
        .await;
        let handler = ApiHandler::new(options_for(Some(node)));
        let req = axum::http::Request::builder()
            .uri("/greeter/hello")
            .body(Body::empty())
            .unwrap();
        assert_eq!(handler.handle(req).await.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn malformed_envelope_is_502() {
        let node =
            spawn_upstream(AxumRouter::new().route("/", post(|| async { "not json" }))).await;
        let handler = ApiHandler::new(options_for(Some(node)));
        let req = axum::http::Request::builder()
            .uri("/greeter/hello")
            .body(Body::empty())
            .unwrap();
        assert_eq!(handler.handle(req).await.status(), StatusCode::BAD_GATEWAY);
    }
}
