//! `http` and `web` handlers: plain reverse proxy to the routed node.

use async_trait::async_trait;
use axum::{extract::Request, http::header::UPGRADE, response::Response};
use common::GatewayError;
use tracing::warn;

use super::{
    error_response, first_node, owned_router, send, upstream_client, upstream_uri, UpstreamClient,
};
use crate::strategy::{Handler, HandlerOptions, Router};

/// Reverse proxy preserving method, path, query, headers and body.
///
/// The `web` flavour refuses websocket upgrades, which are not proxied.
pub struct ProxyHandler {
    kind: &'static str,
    refuse_upgrades: bool,
    router: Box<dyn Router>,
    client: UpstreamClient,
}

impl ProxyHandler {
    /// The `http` handler.
    pub fn http(opts: HandlerOptions) -> Self {
        Self {
            kind: "http",
            refuse_upgrades: false,
            router: owned_router(opts),
            client: upstream_client(),
        }
    }

    /// The `web` handler.
    pub fn web(opts: HandlerOptions) -> Self {
        Self {
            kind: "web",
            refuse_upgrades: true,
            ..Self::http(opts)
        }
    }

    async fn forward(&self, req: Request) -> Result<Response, GatewayError> {
        if self.refuse_upgrades && req.headers().contains_key(UPGRADE) {
            return Err(GatewayError::NotImplemented(
                "websocket upgrades are not proxied".into(),
            ));
        }

        let (mut parts, body) = req.into_parts();
        let route = self.router.route(&parts)?;
        let node = first_node(&route)?;
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        parts.uri = upstream_uri(node, path_and_query)?;

        send(&self.client, Request::from_parts(parts, body)).await
    }
}

#[async_trait]
impl Handler for ProxyHandler {
    fn kind(&self) -> &str {
        self.kind
    }

    fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    async fn handle(&self, req: Request) -> Response {
        match self.forward(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(handler = self.kind, error = %e, "request failed");
                error_response(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::handler::testing::{options_for, spawn_upstream};
    use axum::{body::Body, http::StatusCode, Router as AxumRouter};

    async fn echo(req: Request) -> String {
        format!(
            "{} {}",
            req.method(),
            req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("")
        )
    }

    #[tokio::test]
    async fn http_proxies_path_and_query() {
        let node = spawn_upstream(AxumRouter::new().fallback(echo)).await;
        let handler = ProxyHandler::http(options_for(Some(node)));

        let req = axum::http::Request::builder()
            .method("PUT")
            .uri("/greeter/hello?name=alice")
            .body(Body::empty())
            .unwrap();
        let resp = handler.handle(req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"PUT /greeter/hello?name=alice");
    }

    #[tokio::test]
    async fn unknown_service_is_404() {
        let handler = ProxyHandler::http(options_for(None));
        let req = axum::http::Request::builder()
            .uri("/greeter/hello")
            .body(Body::empty())
            .unwrap();
        assert_eq!(handler.handle(req).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn web_refuses_websocket_upgrade() {
        let handler = ProxyHandler::web(options_for(None));
        assert_eq!(handler.kind(), "web");
        let req = axum::http::Request::builder()
            .uri("/greeter/socket")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        assert_eq!(handler.handle(req).await.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
