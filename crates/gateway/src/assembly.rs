//! Pipeline assembler: resolver → router → handler → CORS → server.
//!
//! Assembly is synchronous and opens no sockets. The listener is only bound
//! when the resulting [`HttpServer`] is started.

use std::{fmt, net::Ipv6Addr, str::FromStr, sync::Arc};

use thiserror::Error;
use tracing::info;

use crate::selection::{Blueprint, ServerSettings};
use crate::server::{router, HttpServer};
use crate::strategy::Handler;

/// Errors produced while parsing a listen address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0:?} has no port")]
    MissingPort(String),

    #[error("address {0:?} has an invalid port")]
    InvalidPort(String),

    #[error("address {0:?} has an invalid host")]
    InvalidHost(String),
}

/// Errors produced while assembling a pipeline.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// A parsed `host:port` listen address.
///
/// An empty host (`:8080`) means the IPv6 wildcard `[::]`, which also accepts
/// IPv4 clients where the OS maps them onto IPv6 sockets (the Linux default).
/// When IPv6 is unavailable the server falls back to `0.0.0.0`. IPv6 hosts
/// are written in brackets (`[::1]:8080`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindAddress {
    pub host: String,
    pub port: u16,
}

fn valid_hostname(host: &str) -> bool {
    host.split('.').all(|label| {
        !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

impl FromStr for BindAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_owned()))?;
        if port.is_empty() {
            return Err(AddressError::MissingPort(s.to_owned()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(s.to_owned()))?;

        let host = if host.is_empty() {
            "::".to_owned()
        } else if let Some(inner) = host.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| AddressError::InvalidHost(s.to_owned()))?;
            inner
                .parse::<Ipv6Addr>()
                .map_err(|_| AddressError::InvalidHost(s.to_owned()))?;
            inner.to_owned()
        } else if valid_hostname(host) {
            host.to_owned()
        } else {
            return Err(AddressError::InvalidHost(s.to_owned()));
        };

        Ok(Self { host, port })
    }
}

impl BindAddress {
    /// Whether this is the IPv6 wildcard `[::]`.
    pub fn is_unspecified_v6(&self) -> bool {
        self.host
            .parse::<Ipv6Addr>()
            .is_ok_and(|ip| ip.is_unspecified())
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// An assembled request pipeline, ready to be bound.
pub struct Pipeline {
    address: BindAddress,
    handler: Arc<dyn Handler>,
    settings: ServerSettings,
}

impl Pipeline {
    /// The innermost-to-outermost chain starts here: handler → router → resolver.
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    pub fn address(&self) -> &BindAddress {
        &self.address
    }

    /// The handler wrapped in the CORS, tracing and timeout layers.
    pub fn app(&self) -> axum::Router {
        router::build(Arc::clone(&self.handler), self.settings.request_timeout)
    }

    pub fn into_server(self) -> HttpServer {
        let app = self.app();
        HttpServer::new(self.address, app, self.settings.shutdown_grace)
    }
}

/// Build the pipeline described by `bp`.
///
/// # Errors
///
/// Returns [`AssemblyError::Address`] if the configured address is malformed.
pub fn assemble(bp: Blueprint) -> Result<Pipeline, AssemblyError> {
    let address: BindAddress = bp.server.address.parse()?;

    let resolver = (bp.new_resolver)(bp.resolver_opts);
    let router = (bp.new_router)(bp.router_opts.with_resolver(resolver));
    let handler = (bp.new_handler)(bp.handler_opts.with_router(router));

    info!(
        handler = handler.kind(),
        router = handler.router().kind(),
        resolver = handler.router().resolver().kind(),
        namespace = handler.router().resolver().options().namespace().unwrap_or_default(),
        %address,
        "pipeline assembled"
    );

    Ok(Pipeline {
        address,
        handler: Arc::from(handler),
        settings: bp.server,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::{
        body::Body,
        extract::Request,
        http::{Method, StatusCode},
        response::{IntoResponse, Response},
    };
    use axum_test::TestServer;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::registry::StrategyRegistry;
    use crate::selection;
    use crate::strategy::{handler::owned_router, HandlerOptions, Router};

    const CORS_HEADERS: [&str; 5] = [
        "access-control-allow-origin",
        "access-control-allow-headers",
        "access-control-allow-methods",
        "access-control-expose-headers",
        "access-control-allow-credentials",
    ];

    /// Handler stub that counts invocations.
    struct CountingHandler {
        router: Box<dyn Router>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for CountingHandler {
        fn kind(&self) -> &str {
            "counting"
        }

        fn router(&self) -> &dyn Router {
            self.router.as_ref()
        }

        async fn handle(&self, _req: Request) -> Response {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (StatusCode::OK, "handled").into_response()
        }
    }

    fn counting_pipeline() -> (Pipeline, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut registry = StrategyRegistry::with_defaults();
        registry.register_handler("counting", move |opts: HandlerOptions| {
            Box::new(CountingHandler {
                router: owned_router(opts),
                calls: Arc::clone(&seen),
            }) as Box<dyn Handler>
        });
        let cfg = Config {
            handler: "counting".into(),
            ..Config::default()
        };
        let bp = selection::resolve(&cfg, &registry).unwrap();
        (assemble(bp).unwrap(), calls)
    }

    #[tokio::test]
    async fn options_short_circuits_with_cors_headers() {
        let (pipeline, calls) = counting_pipeline();
        let req = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/greeter/hello")
            .body(Body::empty())
            .unwrap();
        let resp = pipeline.app().oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        for name in CORS_HEADERS {
            assert!(resp.headers().contains_key(name), "missing {name}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_reaches_handler_once_with_cors_headers() {
        let (pipeline, calls) = counting_pipeline();
        let server = TestServer::new(pipeline.app()).unwrap();

        let resp = server.get("/greeter/hello").await;
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(resp.text(), "handled");
        for name in CORS_HEADERS {
            assert!(resp.headers().contains_key(name), "missing {name}");
        }
        assert_eq!(resp.header("access-control-allow-origin"), "*");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn static_host_web_pipeline_carries_namespace() {
        let cfg = Config {
            router: "static".into(),
            resolver: "host".into(),
            handler: "web".into(),
            namespace: "acme".into(),
            ..Config::default()
        };
        let bp = selection::resolve(&cfg, &StrategyRegistry::with_defaults()).unwrap();
        let pipeline = assemble(bp).unwrap();

        let handler = pipeline.handler();
        assert_eq!(handler.kind(), "web");
        assert_eq!(handler.router().kind(), "static");
        assert_eq!(handler.router().resolver().kind(), "host");
        assert_eq!(
            handler.router().resolver().options().namespace(),
            Some("acme")
        );
        assert_eq!(
            handler.router().resolver().options().handler.as_deref(),
            Some("web")
        );
    }

    #[test]
    fn malformed_address_is_an_error() {
        let cfg = Config {
            server_address: "localhost".into(),
            ..Config::default()
        };
        let bp = selection::resolve(&cfg, &StrategyRegistry::with_defaults()).unwrap();
        assert!(matches!(
            assemble(bp),
            Err(AssemblyError::Address(AddressError::MissingPort(_)))
        ));
    }

    #[test]
    fn bind_address_forms() {
        assert_eq!(
            ":8080".parse::<BindAddress>().unwrap(),
            BindAddress {
                host: "::".into(),
                port: 8080
            }
        );
        assert_eq!(
            "[::1]:9000".parse::<BindAddress>().unwrap(),
            BindAddress {
                host: "::1".into(),
                port: 9000
            }
        );
        assert_eq!("localhost:0".parse::<BindAddress>().unwrap().port, 0);
        assert_eq!(
            "[::1]:9000".parse::<BindAddress>().unwrap().to_string(),
            "[::1]:9000"
        );
        assert_eq!(
            ":8080".parse::<BindAddress>().unwrap().to_string(),
            "[::]:8080"
        );
        assert!(":8080".parse::<BindAddress>().unwrap().is_unspecified_v6());
        assert!(!"[::1]:9000".parse::<BindAddress>().unwrap().is_unspecified_v6());
        assert!(!"0.0.0.0:80".parse::<BindAddress>().unwrap().is_unspecified_v6());
    }

    #[test]
    fn bind_address_rejects_garbage() {
        assert!(matches!(
            "127.0.0.1:".parse::<BindAddress>(),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            "127.0.0.1:http".parse::<BindAddress>(),
            Err(AddressError::InvalidPort(_))
        ));
        assert!(matches!(
            "127.0.0.1:70000".parse::<BindAddress>(),
            Err(AddressError::InvalidPort(_))
        ));
        assert!(matches!(
            "::1:8080".parse::<BindAddress>(),
            Err(AddressError::InvalidHost(_))
        ));
        assert!(matches!(
            "[zz]:8080".parse::<BindAddress>(),
            Err(AddressError::InvalidHost(_))
        ));
        assert!(matches!(
            "bad host:8080".parse::<BindAddress>(),
            Err(AddressError::InvalidHost(_))
        ));
    }
}
