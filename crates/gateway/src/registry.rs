//! [`StrategyRegistry`]: name → factory mappings for the three pluggable axes.
//!
//! The registry is an ordinary value. It is built once at process start
//! (usually via [`StrategyRegistry::with_defaults`]), optionally extended by the
//! embedding application, and then read by [`crate::selection::resolve`].

use std::{collections::HashMap, fmt, sync::Arc};

use crate::strategy::{
    handler::{ApiHandler, EventHandler, ProxyHandler, RpcHandler},
    resolver::{GrpcResolver, HostResolver, PathResolver, VpathResolver},
    router::{RegistryRouter, StaticRouter},
    Handler, HandlerOptions, Resolver, ResolverOptions, Router, RouterOptions,
};

/// Builds a resolver from its options.
pub type ResolverFactory = Arc<dyn Fn(ResolverOptions) -> Box<dyn Resolver> + Send + Sync>;
/// Builds a router from its options.
pub type RouterFactory = Arc<dyn Fn(RouterOptions) -> Box<dyn Router> + Send + Sync>;
/// Builds a handler from its options.
pub type HandlerFactory = Arc<dyn Fn(HandlerOptions) -> Box<dyn Handler> + Send + Sync>;

/// Router used when no router kind is configured.
pub const DEFAULT_ROUTER: &str = "registry";
/// Resolver used when no resolver kind is configured.
pub const DEFAULT_RESOLVER: &str = "vpath";
/// Handler used when no handler kind is configured.
pub const DEFAULT_HANDLER: &str = "rpc";

/// One of the three pluggable strategy axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Router,
    Resolver,
    Handler,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Router => "router",
            Axis::Resolver => "resolver",
            Axis::Handler => "handler",
        })
    }
}

/// The fixed `registry` router factory.
pub fn default_router() -> RouterFactory {
    Arc::new(|opts: RouterOptions| -> Box<dyn Router> {
        Box::new(RegistryRouter::new(opts))
    })
}

/// The fixed `vpath` resolver factory.
pub fn default_resolver() -> ResolverFactory {
    Arc::new(|opts: ResolverOptions| -> Box<dyn Resolver> {
        Box::new(VpathResolver::new(opts))
    })
}

/// The fixed `rpc` handler factory.
pub fn default_handler() -> HandlerFactory {
    Arc::new(|opts: HandlerOptions| -> Box<dyn Handler> {
        Box::new(RpcHandler::new(opts))
    })
}

/// Three independent `name → factory` mappings.
///
/// Registering a name that already exists on an axis replaces its factory.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    routers: HashMap<String, RouterFactory>,
    resolvers: HashMap<String, ResolverFactory>,
    handlers: HashMap<String, HandlerFactory>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register_router("registry", |o| Box::new(RegistryRouter::new(o)))
            .register_router("static", |o| Box::new(StaticRouter::new(o)))
            .register_resolver("grpc", |o| Box::new(GrpcResolver::new(o)))
            .register_resolver("host", |o| Box::new(HostResolver::new(o)))
            .register_resolver("path", |o| Box::new(PathResolver::new(o)))
            .register_resolver("vpath", |o| Box::new(VpathResolver::new(o)))
            .register_handler("api", |o| Box::new(ApiHandler::new(o)))
            .register_handler("event", |o| Box::new(EventHandler::new(o)))
            .register_handler("http", |o| Box::new(ProxyHandler::http(o)))
            .register_handler("rpc", |o| Box::new(RpcHandler::new(o)))
            .register_handler("web", |o| Box::new(ProxyHandler::web(o)));
        registry
    }

    pub fn register_router<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(RouterOptions) -> Box<dyn Router> + Send + Sync + 'static,
    {
        self.routers.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn register_resolver<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(ResolverOptions) -> Box<dyn Resolver> + Send + Sync + 'static,
    {
        self.resolvers.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn register_handler<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(HandlerOptions) -> Box<dyn Handler> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn router(&self, name: &str) -> Option<RouterFactory> {
        self.routers.get(name).cloned()
    }

    pub fn resolver(&self, name: &str) -> Option<ResolverFactory> {
        self.resolvers.get(name).cloned()
    }

    pub fn handler(&self, name: &str) -> Option<HandlerFactory> {
        self.handlers.get(name).cloned()
    }

    /// Returns `true` if `name` is registered on `axis`.
    pub fn contains(&self, axis: Axis, name: &str) -> bool {
        match axis {
            Axis::Router => self.routers.contains_key(name),
            Axis::Resolver => self.resolvers.contains_key(name),
            Axis::Handler => self.handlers.contains_key(name),
        }
    }

    /// Registered names on `axis`, sorted.
    pub fn names(&self, axis: Axis) -> Vec<&str> {
        let mut names: Vec<&str> = match axis {
            Axis::Router => self.routers.keys().map(String::as_str).collect(),
            Axis::Resolver => self.resolvers.keys().map(String::as_str).collect(),
            Axis::Handler => self.handlers.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("routers", &self.names(Axis::Router))
            .field("resolvers", &self.names(Axis::Resolver))
            .field("handlers", &self.names(Axis::Handler))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_builtin() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(registry.names(Axis::Router), vec!["registry", "static"]);
        assert_eq!(
            registry.names(Axis::Resolver),
            vec!["grpc", "host", "path", "vpath"]
        );
        assert_eq!(
            registry.names(Axis::Handler),
            vec!["api", "event", "http", "rpc", "web"]
        );
    }

    #[test]
    fn default_names_are_registered() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.contains(Axis::Router, DEFAULT_ROUTER));
        assert!(registry.contains(Axis::Resolver, DEFAULT_RESOLVER));
        assert!(registry.contains(Axis::Handler, DEFAULT_HANDLER));
    }

    #[test]
    fn axes_are_independent() {
        let mut registry = StrategyRegistry::new();
        registry.register_resolver("custom", |o| Box::new(HostResolver::new(o)));
        assert!(registry.contains(Axis::Resolver, "custom"));
        assert!(!registry.contains(Axis::Router, "custom"));
        assert!(!registry.contains(Axis::Handler, "custom"));
        assert!(registry.router("custom").is_none());
    }

    #[test]
    fn register_overwrites() {
        let mut registry = StrategyRegistry::with_defaults();
        registry.register_resolver("vpath", |o| Box::new(HostResolver::new(o)));
        let factory = registry.resolver("vpath").unwrap();
        assert_eq!(factory(ResolverOptions::default()).kind(), "host");
        assert_eq!(registry.names(Axis::Resolver).len(), 4);
    }

    #[test]
    fn fixed_defaults_build_expected_kinds() {
        assert_eq!(default_resolver()(ResolverOptions::default()).kind(), "vpath");
        assert_eq!(default_router()(RouterOptions::default()).kind(), "registry");
        assert_eq!(default_handler()(HandlerOptions::default()).kind(), "rpc");
    }

    #[test]
    fn debug_lists_names() {
        let dbg = format!("{:?}", StrategyRegistry::with_defaults());
        assert!(dbg.contains("vpath"));
        assert!(dbg.contains("registry"));
    }
}
