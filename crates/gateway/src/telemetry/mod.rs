//! Logging and tracing setup.
//!
//! Logs are JSON lines on stdout. Spans are additionally exported over
//! OTLP/gRPC when an endpoint is configured.
//!
//! # Telemetry invariants
//!
//! - Request bodies never appear in any span attribute or log field.
//! - Log level is configurable via `--log_level` / `MICRO_API_LOG_LEVEL`
//!   (default: `info`); `RUST_LOG` takes precedence.

pub mod init;

pub use init::{init, shutdown};
