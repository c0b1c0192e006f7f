//! Pluggable strategy contracts: resolvers, routers and handlers.
//!
//! Every strategy is built by a factory from an options struct
//! (`new(options) -> instance`). Ownership is linear: a [`Handler`] owns its
//! [`Router`], which owns its [`Resolver`]. The `router`/`resolver` accessors
//! exist so an assembled pipeline can be inspected layer by layer.
//!
//! # Built-in strategies
//!
//! | Axis     | Names                                   | Default    |
//! |----------|-----------------------------------------|------------|
//! | resolver | `grpc`, `host`, `path`, `vpath`         | `vpath`    |
//! | router   | `registry`, `static`                    | `registry` |
//! | handler  | `api`, `event`, `http`, `rpc`, `web`    | `rpc`      |

pub mod catalog;
pub mod handler;
pub mod resolver;
pub mod router;

pub use catalog::ServiceCatalog;
pub use router::StaticRoute;

use async_trait::async_trait;
use axum::{extract::Request, http::request::Parts, response::Response};
use common::GatewayError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// The service endpoint a request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Fully qualified service name, e.g. `go.micro.v1.greeter`.
    pub name: String,
    /// HTTP method of the request.
    pub method: String,
    pub host: String,
    pub path: String,
}

impl Endpoint {
    /// Build an endpoint named `name` from the request head.
    pub fn from_parts(name: impl Into<String>, req: &Parts) -> Self {
        Self {
            name: name.into(),
            method: req.method.to_string(),
            host: request_host(req).to_owned(),
            path: req.uri.path().to_owned(),
        }
    }
}

/// The `Host` header, falling back to the URI authority.
pub(crate) fn request_host(req: &Parts) -> &str {
    req.headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri.authority().map(|a| a.as_str()))
        .unwrap_or_default()
}

/// A namespace prepended to every resolved name, independent of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticNamespace(String);

impl StaticNamespace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Options a resolver is constructed with.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Handler protocol the resolver resolves addresses for (e.g. `"rpc"`).
    pub handler: Option<String>,
    pub namespace: Option<StaticNamespace>,
}

impl ResolverOptions {
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_namespace(mut self, namespace: StaticNamespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// The configured namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_ref().map(StaticNamespace::as_str)
    }
}

/// Errors produced while resolving a request to an endpoint.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The request path carries no service name.
    #[error("unknown name for path {0:?}")]
    UnknownName(String),
}

/// Maps a request onto a service [`Endpoint`].
pub trait Resolver: Send + Sync {
    /// Registry name of the strategy (e.g. `"vpath"`).
    fn kind(&self) -> &str;

    fn options(&self) -> &ResolverOptions;

    fn resolve(&self, req: &Parts) -> Result<Endpoint, ResolveError>;
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Where a request should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub service: String,
    /// RPC method on the service, e.g. `Greeter.Hello`.
    pub method: String,
    pub endpoint: Endpoint,
    /// Node addresses (`host:port`) serving the service.
    pub nodes: Vec<String>,
}

/// Options a router is constructed with.
#[derive(Default)]
pub struct RouterOptions {
    /// The resolver the router owns. Routers fall back to `vpath` when unset.
    pub resolver: Option<Box<dyn Resolver>>,
    pub catalog: ServiceCatalog,
    /// Rules used by the `static` router.
    pub static_routes: Vec<StaticRoute>,
}

impl RouterOptions {
    pub fn with_resolver(mut self, resolver: Box<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_catalog(mut self, catalog: ServiceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_static_routes(mut self, routes: Vec<StaticRoute>) -> Self {
        self.static_routes = routes;
        self
    }
}

/// Errors produced while routing a request.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// No static rule matches the request.
    #[error("no route for {method} {path}")]
    NoRoute { method: String, path: String },

    /// The resolved service is not present in the catalog.
    #[error("service {0} is not registered")]
    UnknownService(String),
}

impl From<RouteError> for GatewayError {
    fn from(err: RouteError) -> Self {
        GatewayError::NotFound(err.to_string())
    }
}

/// Maps a request onto a [`Route`].
pub trait Router: Send + Sync {
    /// Registry name of the strategy (e.g. `"registry"`).
    fn kind(&self) -> &str;

    /// The resolver this router owns.
    fn resolver(&self) -> &dyn Resolver;

    fn route(&self, req: &Parts) -> Result<Route, RouteError>;
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Options a handler is constructed with.
#[derive(Default)]
pub struct HandlerOptions {
    /// The router the handler owns. Handlers fall back to `registry` when unset.
    pub router: Option<Box<dyn Router>>,
}

impl HandlerOptions {
    pub fn with_router(mut self, router: Box<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }
}

/// Serves a request end to end: route it, forward it, answer.
///
/// Handlers never fail outward; errors are rendered into the response.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Registry name of the strategy (e.g. `"rpc"`).
    fn kind(&self) -> &str;

    /// The router this handler owns.
    fn router(&self) -> &dyn Router;

    async fn handle(&self, req: Request) -> Response;
}
