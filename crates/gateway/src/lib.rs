//! `micro-api`: an HTTP API gateway assembled from pluggable strategies.
//!
//! Startup wires three named strategies together:
//! a resolver (request → service name) owned by a router (→ service nodes)
//! owned by a handler (→ forwarded call). The handler is wrapped in CORS
//! middleware and served until a termination signal arrives.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! micro_api::Cmd::new()
//!     .name("edge")
//!     .run(std::env::args_os())
//!     .await
//! # }
//! ```

pub mod assembly;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod registry;
pub mod selection;
pub mod server;
pub mod shutdown;
pub mod strategy;
pub mod telemetry;

pub use assembly::{assemble, BindAddress, Pipeline};
pub use cli::{Cli, Cmd};
pub use config::Config;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use registry::StrategyRegistry;
pub use shutdown::ShutdownSignal;
