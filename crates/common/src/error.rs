//! Error taxonomy for request-time failures inside the gateway strategies.

use thiserror::Error;

use crate::protocol::ErrorResponse;

/// Request-time gateway error.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`GatewayError::BadRequest`] → 400
/// - [`GatewayError::NotFound`] → 404
/// - [`GatewayError::Internal`] → 500
/// - [`GatewayError::NotImplemented`] → 501
/// - [`GatewayError::BadGateway`] → 502
/// - [`GatewayError::Unavailable`] → 503
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request could not be interpreted (unreadable body, malformed path).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No service or route matches the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request uses a feature the selected handler does not support.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The upstream node failed or answered with something unusable.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// The routed service has no node to forward to.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::BadRequest(_) => 400,
            GatewayError::NotFound(_) => 404,
            GatewayError::Internal(_) => 500,
            GatewayError::NotImplemented(_) => 501,
            GatewayError::BadGateway(_) => 502,
            GatewayError::Unavailable(_) => 503,
        }
    }

    /// Short machine-readable code used in [`ErrorResponse::code`].
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Internal(_) => "internal_error",
            GatewayError::NotImplemented(_) => "not_implemented",
            GatewayError::BadGateway(_) => "bad_gateway",
            GatewayError::Unavailable(_) => "service_unavailable",
        }
    }

    /// Render the error as the JSON body sent to callers.
    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.to_string())
    }
}
