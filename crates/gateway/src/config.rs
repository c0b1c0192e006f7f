//! Configuration loading and validation for the gateway.
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults;
//! 2. an optional TOML file (`--config <path>`);
//! 3. `MICRO_API_*` environment variables;
//! 4. explicit command-line flags.

use std::{collections::HashMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::Deserialize;

use crate::cli::Cli;
use crate::strategy::StaticRoute;

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "MICRO_API";

/// Tables whose keys are data, read straight from the TOML file.
///
/// The `config` crate lowercases map keys, which would rename services such
/// as `go.micro.Greeter`.
#[derive(Debug, Default, Deserialize)]
struct KeyedTables {
    #[serde(default)]
    services: Option<HashMap<String, Vec<String>>>,
}

fn read_services(path: &Path) -> Result<Option<HashMap<String, Vec<String>>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let tables: KeyedTables =
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(tables.services)
}

/// Validated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to (`host:port`, `:port` binds all interfaces).
    #[serde(default = "default_server_address")]
    pub server_address: String,

    /// Static namespace handed to the resolver. Empty disables namespacing.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Router kind. Empty selects the built-in default.
    #[serde(default = "default_router")]
    pub router: String,

    /// Resolver kind. Empty selects the built-in default.
    #[serde(default = "default_resolver")]
    pub resolver: String,

    /// Handler kind. Empty selects the built-in default.
    #[serde(default = "default_handler")]
    pub handler: String,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP/gRPC endpoint for span export. Spans are not exported when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Per-request timeout applied in front of the handler.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long a stop waits for in-flight requests before abandoning them.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// Service name → node addresses, used by the built-in routers.
    #[serde(default)]
    pub services: HashMap<String, Vec<String>>,

    /// Ordered rule table of the `static` router.
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
}

fn default_server_address() -> String {
    ":8080".into()
}
fn default_namespace() -> String {
    "go.micro".into()
}
fn default_router() -> String {
    crate::registry::DEFAULT_ROUTER.into()
}
fn default_resolver() -> String {
    crate::registry::DEFAULT_RESOLVER.into()
}
fn default_handler() -> String {
    crate::registry::DEFAULT_HANDLER.into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_shutdown_grace() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            namespace: default_namespace(),
            router: default_router(),
            resolver: default_resolver(),
            handler: default_handler(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
            request_timeout_secs: default_request_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
            services: HashMap::new(),
            static_routes: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate configuration for the parsed command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, a value cannot be
    /// parsed, or validation fails.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = &cli.config {
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));

        for (key, value) in cli.overrides() {
            builder = builder
                .set_override(key, value)
                .with_context(|| format!("invalid value for --{key}"))?;
        }

        let cfg = builder
            .build()
            .context("failed to build gateway configuration")?;

        let mut c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise gateway configuration")?;

        if let Some(path) = &cli.config {
            if let Some(services) = read_services(path)? {
                c.services = services;
            }
        }

        c.validate()?;
        Ok(c)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.server_address.trim().is_empty() {
            anyhow::bail!("server_address is required and must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }
        for (service, nodes) in &self.services {
            if nodes.iter().any(|n| n.trim().is_empty()) {
                anyhow::bail!("service {service} lists an empty node address");
            }
        }
        for route in &self.static_routes {
            if route.service.trim().is_empty() {
                anyhow::bail!("static route {:?} has no service", route.path);
            }
        }
        Ok(())
    }
}
