//! Built-in routers: `registry` and `static`.

use axum::http::request::Parts;
use serde::Deserialize;
use tracing::debug;

use super::resolver::{is_version, VpathResolver};
use super::{
    Endpoint, ResolverOptions, Resolver, Route, RouteError, Router, RouterOptions,
    ServiceCatalog,
};

/// Take the resolver out of `opts`, defaulting to `vpath`.
fn owned_resolver(opts: &mut RouterOptions) -> Box<dyn Resolver> {
    opts.resolver
        .take()
        .unwrap_or_else(|| Box::new(VpathResolver::new(ResolverOptions::default())))
}

/// Derive the RPC method from a request path.
///
/// - `/foo/bar` → `Foo.Bar`
/// - `/v1/foo/bar` → `Bar`
/// - `/a/b/c/d` → `C.D`
pub(crate) fn rpc_method(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let tail = match parts.len() {
        0..=2 => &parts[..],
        3 if is_version(parts[0]) => &parts[2..],
        n => &parts[n - 2..],
    };
    tail.iter().map(|p| camel(p)).collect::<Vec<_>>().join(".")
}

/// `say-hello` → `SayHello`.
fn camel(segment: &str) -> String {
    segment
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// registry
// ---------------------------------------------------------------------------

/// Routes to the resolved service name, looking its nodes up in the catalog.
pub struct RegistryRouter {
    resolver: Box<dyn Resolver>,
    catalog: ServiceCatalog,
}

impl RegistryRouter {
    pub fn new(mut opts: RouterOptions) -> Self {
        Self {
            resolver: owned_resolver(&mut opts),
            catalog: opts.catalog,
        }
    }
}

impl Router for RegistryRouter {
    fn kind(&self) -> &str {
        "registry"
    }

    fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    fn route(&self, req: &Parts) -> Result<Route, RouteError> {
        let endpoint = self.resolver.resolve(req)?;
        let nodes = self
            .catalog
            .nodes(&endpoint.name)
            .map_err(|_| RouteError::UnknownService(endpoint.name.clone()))?;
        debug!(service = %endpoint.name, nodes = nodes.len(), "routed via registry");
        Ok(Route {
            service: endpoint.name.clone(),
            method: rpc_method(&endpoint.path),
            endpoint,
            nodes,
        })
    }
}

// ---------------------------------------------------------------------------
// static
// ---------------------------------------------------------------------------

/// One rule of the `static` router.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticRoute {
    /// Path prefix the request must start with.
    pub path: String,
    /// HTTP method to match; any method when unset.
    #[serde(default)]
    pub method: Option<String>,
    pub service: String,
    /// RPC method to call; derived from the path when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl StaticRoute {
    fn matches(&self, req: &Parts) -> bool {
        let method_ok = self
            .method
            .as_deref()
            .map_or(true, |m| m.eq_ignore_ascii_case(req.method.as_str()));
        method_ok && req.uri.path().starts_with(&self.path)
    }
}

/// Routes by an explicit, ordered rule table. The first matching rule wins.
///
/// Matching happens on the raw request; the owned resolver is not consulted.
pub struct StaticRouter {
    resolver: Box<dyn Resolver>,
    catalog: ServiceCatalog,
    routes: Vec<StaticRoute>,
}

impl StaticRouter {
    pub fn new(mut opts: RouterOptions) -> Self {
        Self {
            resolver: owned_resolver(&mut opts),
            catalog: opts.catalog,
            routes: opts.static_routes,
        }
    }
}

impl Router for StaticRouter {
    fn kind(&self) -> &str {
        "static"
    }

    fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    fn route(&self, req: &Parts) -> Result<Route, RouteError> {
        let rule = self
            .routes
            .iter()
            .find(|r| r.matches(req))
            .ok_or_else(|| RouteError::NoRoute {
                method: req.method.to_string(),
                path: req.uri.path().to_owned(),
            })?;

        // A rule without catalogued nodes still routes; the handler answers 503.
        let nodes = self.catalog.nodes(&rule.service).unwrap_or_default();
        Ok(Route {
            service: rule.service.clone(),
            method: rule
                .endpoint
                .clone()
                .unwrap_or_else(|| rpc_method(req.uri.path())),
            endpoint: Endpoint::from_parts(rule.service.as_str(), req),
            nodes,
        })
    }
}
