//! `micro-api` binary entry point.
//!
//! Startup sequence (see [`micro_api::Cmd::run`]):
//! 1. Parse flags and load [`micro_api::Config`].
//! 2. Initialise telemetry.
//! 3. Select the router, handler and resolver from the strategy registry.
//! 4. Assemble the pipeline and serve until SIGTERM or SIGINT.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    micro_api::Cmd::new().run(std::env::args_os()).await
}
