//! Wire types and errors shared by the `micro-api` gateway and its strategies.

pub mod error;
pub mod protocol;

pub use error::GatewayError;
