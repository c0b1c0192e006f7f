//! Configuration resolver: turn configured kind names into factories.
//!
//! Lookup order is router, handler, resolver. The first unknown name aborts
//! selection, so a bad router is reported even when the handler is also bad.
//! The resolver comes last because it receives the handler kind and the
//! static namespace as construction options.

use std::{fmt, time::Duration};

use thiserror::Error;
use tracing::{debug, error};

use crate::config::Config;
use crate::registry::{
    default_handler, default_resolver, default_router, Axis, HandlerFactory, ResolverFactory,
    RouterFactory, StrategyRegistry, DEFAULT_HANDLER, DEFAULT_RESOLVER, DEFAULT_ROUTER,
};
use crate::strategy::{
    HandlerOptions, ResolverOptions, RouterOptions, ServiceCatalog, StaticNamespace,
};

/// Errors produced while selecting strategies.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// A configured kind is not registered on its axis.
    #[error("{axis} {name} is not found (available: {})", .available.join(", "))]
    Unknown {
        axis: Axis,
        name: String,
        available: Vec<String>,
    },
}

/// Settings the HTTP server is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Listen address exactly as configured.
    pub address: String,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

/// Everything needed to assemble a pipeline: one factory and one options
/// value per axis, plus the server settings.
pub struct Blueprint {
    pub new_resolver: ResolverFactory,
    pub new_router: RouterFactory,
    pub new_handler: HandlerFactory,
    pub resolver_opts: ResolverOptions,
    pub router_opts: RouterOptions,
    pub handler_opts: HandlerOptions,
    /// Effective kind names, `(router, resolver, handler)`.
    pub kinds: (String, String, String),
    pub server: ServerSettings,
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("router", &self.kinds.0)
            .field("resolver", &self.kinds.1)
            .field("handler", &self.kinds.2)
            .field("resolver_opts", &self.resolver_opts)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

fn unknown(registry: &StrategyRegistry, axis: Axis, name: &str) -> SelectionError {
    let err = SelectionError::Unknown {
        axis,
        name: name.to_owned(),
        available: registry.names(axis).into_iter().map(str::to_owned).collect(),
    };
    error!(%axis, kind = name, "strategy selection failed");
    err
}

/// The registered name, or `default` when `configured` is empty.
fn effective<'a>(configured: &'a str, default: &'a str) -> &'a str {
    if configured.is_empty() {
        default
    } else {
        configured
    }
}

/// Select one factory per axis for `cfg`.
///
/// An empty kind name selects the built-in default without consulting the
/// registry, so an empty registry still yields a working blueprint.
///
/// # Errors
///
/// Returns [`SelectionError::Unknown`] for the first configured name that is
/// not registered, checked in the order router, handler, resolver.
pub fn resolve(cfg: &Config, registry: &StrategyRegistry) -> Result<Blueprint, SelectionError> {
    let new_router = if cfg.router.is_empty() {
        default_router()
    } else {
        registry
            .router(&cfg.router)
            .ok_or_else(|| unknown(registry, Axis::Router, &cfg.router))?
    };

    let mut resolver_opts = ResolverOptions::default();

    let new_handler = if cfg.handler.is_empty() {
        default_handler()
    } else {
        let factory = registry
            .handler(&cfg.handler)
            .ok_or_else(|| unknown(registry, Axis::Handler, &cfg.handler))?;
        resolver_opts = resolver_opts.with_handler(cfg.handler.as_str());
        factory
    };

    let new_resolver = if cfg.resolver.is_empty() {
        default_resolver()
    } else {
        registry
            .resolver(&cfg.resolver)
            .ok_or_else(|| unknown(registry, Axis::Resolver, &cfg.resolver))?
    };

    if !cfg.namespace.is_empty() {
        resolver_opts = resolver_opts.with_namespace(StaticNamespace::new(cfg.namespace.as_str()));
    }

    let catalog = ServiceCatalog::from_map(cfg.services.clone());
    let router_opts = RouterOptions::default()
        .with_catalog(catalog)
        .with_static_routes(cfg.static_routes.clone());

    let kinds = (
        effective(&cfg.router, DEFAULT_ROUTER).to_owned(),
        effective(&cfg.resolver, DEFAULT_RESOLVER).to_owned(),
        effective(&cfg.handler, DEFAULT_HANDLER).to_owned(),
    );
    debug!(
        router = %kinds.0,
        resolver = %kinds.1,
        handler = %kinds.2,
        namespace = %cfg.namespace,
        "strategies selected"
    );

    Ok(Blueprint {
        new_resolver,
        new_router,
        new_handler,
        resolver_opts,
        router_opts,
        handler_opts: HandlerOptions::default(),
        kinds,
        server: ServerSettings {
            address: cfg.server_address.clone(),
            request_timeout: cfg.request_timeout(),
            shutdown_grace: cfg.shutdown_grace(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{handler::ProxyHandler, resolver::HostResolver, router::StaticRouter};

    fn cfg(router: &str, resolver: &str, handler: &str) -> Config {
        Config {
            router: router.into(),
            resolver: resolver.into(),
            handler: handler.into(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_select_builtins() {
        let bp = resolve(&Config::default(), &StrategyRegistry::with_defaults()).unwrap();
        assert_eq!(
            bp.kinds,
            ("registry".into(), "vpath".into(), "rpc".into())
        );
        assert_eq!(bp.server.address, ":8080");
        assert_eq!((bp.new_resolver)(bp.resolver_opts.clone()).kind(), "vpath");
    }

    #[test]
    fn router_error_wins_over_handler_error() {
        let err = resolve(
            &cfg("nope", "vpath", "bogus"),
            &StrategyRegistry::with_defaults(),
        )
        .unwrap_err();
        let SelectionError::Unknown { axis, name, .. } = &err;
        assert_eq!(*axis, Axis::Router);
        assert_eq!(name, "nope");
        assert!(err.to_string().starts_with("router nope is not found"));
    }

    #[test]
    fn handler_error_wins_over_resolver_error() {
        let err = resolve(
            &cfg("registry", "bogus", "bogus"),
            &StrategyRegistry::with_defaults(),
        )
        .unwrap_err();
        let SelectionError::Unknown { axis, .. } = err;
        assert_eq!(axis, Axis::Handler);
    }

    #[test]
    fn unknown_resolver_lists_available() {
        let err = resolve(
            &cfg("registry", "bogus", "rpc"),
            &StrategyRegistry::with_defaults(),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("resolver bogus"));
        assert!(msg.contains("grpc, host, path, vpath"));
    }

    #[test]
    fn empty_kinds_use_defaults_without_registry() {
        let bp = resolve(&cfg("", "", ""), &StrategyRegistry::new()).unwrap();
        assert_eq!(
            bp.kinds,
            ("registry".into(), "vpath".into(), "rpc".into())
        );
        assert_eq!((bp.new_router)(RouterOptions::default()).kind(), "registry");
        assert_eq!((bp.new_handler)(HandlerOptions::default()).kind(), "rpc");
        assert!(bp.resolver_opts.handler.is_none());
    }

    #[test]
    fn handler_and_namespace_reach_the_resolver() {
        let config = Config {
            namespace: "foo".into(),
            ..cfg("registry", "vpath", "api")
        };
        let bp = resolve(&config, &StrategyRegistry::with_defaults()).unwrap();
        assert_eq!(bp.resolver_opts.handler.as_deref(), Some("api"));
        assert_eq!(bp.resolver_opts.namespace(), Some("foo"));

        let resolver = (bp.new_resolver)(bp.resolver_opts.clone());
        assert_eq!(resolver.options().namespace(), Some("foo"));
    }

    #[test]
    fn empty_namespace_is_not_set() {
        let config = Config {
            namespace: String::new(),
            ..Config::default()
        };
        let bp = resolve(&config, &StrategyRegistry::with_defaults()).unwrap();
        assert!(bp.resolver_opts.namespace.is_none());
    }

    #[test]
    fn custom_registry_entries_are_selected() {
        let mut registry = StrategyRegistry::new();
        registry
            .register_router("static", |o| Box::new(StaticRouter::new(o)))
            .register_resolver("host", |o| Box::new(HostResolver::new(o)))
            .register_handler("web", |o| Box::new(ProxyHandler::web(o)));
        let config = Config {
            namespace: "acme".into(),
            ..cfg("static", "host", "web")
        };
        let bp = resolve(&config, &registry).unwrap();
        assert_eq!(bp.kinds, ("static".into(), "host".into(), "web".into()));
        assert_eq!(bp.resolver_opts.namespace(), Some("acme"));
        assert_eq!(bp.resolver_opts.handler.as_deref(), Some("web"));
    }

    #[test]
    fn services_feed_the_router_catalog() {
        let mut config = Config::default();
        config
            .services
            .insert("go.micro.greeter".into(), vec!["127.0.0.1:9000".into()]);
        let bp = resolve(&config, &StrategyRegistry::with_defaults()).unwrap();
        assert_eq!(
            bp.router_opts.catalog.nodes("go.micro.greeter").unwrap(),
            vec!["127.0.0.1:9000".to_string()]
        );
    }
}
