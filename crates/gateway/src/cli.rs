//! Command line and process embedding.
//!
//! [`Cmd`] is what a binary embeds: it owns the process name, version,
//! description and the [`StrategyRegistry`], and [`Cmd::run`] drives the
//! whole startup sequence.

use std::{ffi::OsString, path::PathBuf};

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, FromArgMatches, Parser};
use tracing::info;

use crate::{
    assembly::{self, Pipeline},
    config::Config,
    lifecycle::Lifecycle,
    registry::StrategyRegistry,
    selection,
    shutdown::ShutdownSignal,
    strategy::ServiceCatalog,
    telemetry,
};

/// Default process description.
pub const DEFAULT_DESCRIPTION: &str = "a micro-api gateway service";

/// Command-line flags. Unset flags leave lower-precedence sources in charge.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "micro-api")]
pub struct Cli {
    /// Set the api address to bind to [default: :8080]
    #[arg(long = "server_address", value_name = "ADDR")]
    pub server_address: Option<String>,

    /// Set the namespace used by the api resolver [default: go.micro]
    #[arg(long, value_name = "NS")]
    pub namespace: Option<String>,

    /// Set the router [default: registry]
    #[arg(long, value_name = "KIND")]
    pub router: Option<String>,

    /// Set the resolver [default: vpath]
    #[arg(long, value_name = "KIND")]
    pub resolver: Option<String>,

    /// Set the handler [default: rpc]
    #[arg(long, value_name = "KIND")]
    pub handler: Option<String>,

    /// Log level, overridden by RUST_LOG [default: info]
    #[arg(long = "log_level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Config keys set explicitly on the command line.
    pub fn overrides(&self) -> Vec<(&'static str, String)> {
        [
            ("server_address", &self.server_address),
            ("namespace", &self.namespace),
            ("router", &self.router),
            ("resolver", &self.resolver),
            ("handler", &self.handler),
            ("log_level", &self.log_level),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

/// The embeddable gateway command.
#[derive(Debug)]
pub struct Cmd {
    name: String,
    version: String,
    description: String,
    registry: StrategyRegistry,
    catalog: ServiceCatalog,
}

impl Default for Cmd {
    fn default() -> Self {
        Self::new()
    }
}

impl Cmd {
    /// A command with every built-in strategy registered.
    pub fn new() -> Self {
        Self {
            name: "micro-api".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: DEFAULT_DESCRIPTION.into(),
            registry: StrategyRegistry::with_defaults(),
            catalog: ServiceCatalog::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reported version. An empty version hides `--version`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Register extra strategies before [`Cmd::run`].
    pub fn registry_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.registry
    }

    /// The service catalog the built-in routers read.
    ///
    /// The handle stays shared with the running pipeline, so nodes registered
    /// or replaced through it take effect on the next request. Services from
    /// the configuration are added to it during startup.
    pub fn catalog(&self) -> ServiceCatalog {
        self.catalog.clone()
    }

    /// Select strategies for `cfg` and assemble the pipeline around this
    /// command's catalog. Opens no sockets.
    ///
    /// # Errors
    ///
    /// Unknown strategy kinds and malformed listen addresses.
    pub fn assemble(&self, cfg: &Config) -> Result<Pipeline> {
        let mut blueprint = selection::resolve(cfg, &self.registry)?;
        for (name, nodes) in &cfg.services {
            self.catalog.register(name, nodes.clone());
        }
        blueprint.router_opts.catalog = self.catalog.clone();
        Ok(assembly::assemble(blueprint)?)
    }

    /// The clap command with this process's name, description and version.
    pub fn command(&self) -> clap::Command {
        let cmd = Cli::command()
            .name(self.name.clone())
            .about(self.description.clone());
        if self.version.is_empty() {
            cmd
        } else {
            cmd.version(self.version.clone())
        }
    }

    /// Parse `args`. Returns `None` when help or version was printed instead.
    ///
    /// # Errors
    ///
    /// Returns the clap error for unknown flags or malformed values.
    pub fn parse_from<I, T>(&self, args: I) -> Result<Option<Cli>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.command().try_get_matches_from(args) {
            Ok(matches) => Ok(Some(Cli::from_arg_matches(&matches)?)),
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.print()?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse, configure, assemble and serve until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Any configuration, selection, assembly or lifecycle failure. Nothing is
    /// bound when configuration or selection fails.
    pub async fn run<I, T>(self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        // -------------------------------------------------------------------
        // 1. Flags and configuration
        // -------------------------------------------------------------------
        let Some(cli) = self.parse_from(args)? else {
            return Ok(());
        };
        // Telemetry is not yet up; errors here surface through `main`.
        let cfg = Config::load(&cli).context("configuration invalid")?;

        // -------------------------------------------------------------------
        // 2. Telemetry
        // -------------------------------------------------------------------
        telemetry::init(&cfg.log_level, cfg.otel_exporter_otlp_endpoint.as_deref())?;
        info!(
            name = %self.name,
            version = %self.version,
            address = %cfg.server_address,
            "{} starting",
            self.description
        );

        // -------------------------------------------------------------------
        // 3. Strategy selection and assembly
        // -------------------------------------------------------------------
        let pipeline = self.assemble(&cfg)?;

        // -------------------------------------------------------------------
        // 4. Serve until signalled
        // -------------------------------------------------------------------
        let shutdown =
            ShutdownSignal::with_os_signals().context("failed to register signal handlers")?;
        let result = Lifecycle::new(pipeline.into_server())
            .run(shutdown.recv())
            .await;

        telemetry::shutdown();
        result?;
        Ok(())
    }
}
