//! `event` handler: publish the request as an [`Event`] to the routed node.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
};
use common::{protocol::Event, GatewayError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    error_response, first_node, header_pairs, owned_router, read_body, send, upstream_client,
    upstream_uri, UpstreamClient, TOPIC_HEADER,
};
use crate::strategy::{Handler, HandlerOptions, Route, Router};

/// `service.Method`, or just the service when no method was derived.
fn topic(route: &Route) -> String {
    if route.method.is_empty() {
        route.service.clone()
    } else {
        format!("{}.{}", route.service, route.method)
    }
}

pub struct EventHandler {
    router: Box<dyn Router>,
    client: UpstreamClient,
}

impl EventHandler {
    pub fn new(opts: HandlerOptions) -> Self {
        Self {
            router: owned_router(opts),
            client: upstream_client(),
        }
    }

    async fn publish(&self, req: Request) -> Result<Response, GatewayError> {
        let (parts, body) = req.into_parts();
        let route = self.router.route(&parts)?;
        let node = first_node(&route)?;
        let data = read_body(body).await?;

        let mut event = Event {
            id: Uuid::new_v4().to_string(),
            topic: topic(&route),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            header: Default::default(),
            data: String::from_utf8_lossy(&data).into_owned(),
        };
        header_pairs(&parts.headers, &mut event.header);

        debug!(id = %event.id, topic = %event.topic, %node, "publishing event");
        let payload =
            serde_json::to_vec(&event).map_err(|e| GatewayError::Internal(e.to_string()))?;
        let upstream = axum::http::Request::builder()
            .method(Method::POST)
            .uri(upstream_uri(node, "/")?)
            .header(CONTENT_TYPE, "application/json")
            .header(TOPIC_HEADER, event.topic.as_str())
            .body(Body::from(payload))
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        let resp = send(&self.client, upstream).await?;
        if !resp.status().is_success() {
            return Err(GatewayError::BadGateway(format!(
                "event {} rejected with status {}",
                event.id,
                resp.status()
            )));
        }
        Ok(StatusCode::OK.into_response())
    }
}

#[async_trait]
impl Handler for EventHandler {
    fn kind(&self) -> &str {
        "event"
    }

    fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    async fn handle(&self, req: Request) -> Response {
        match self.publish(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(handler = "event", error = %e, "request failed");
                error_response(&e)
            }
        }
    }
}
