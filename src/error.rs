// Ingress-facing error types. Internal engine refusals (state-machine
// transitions, validator rejections) are plain return values, never errors
// — see state_machine.rs and validator.rs. This enum only covers failures
// that must surface as an HTTP response.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("validation failed")]
    ValidationFailed {
        errors: Vec<String>,
        warnings: Vec<String>,
    },

    #[error("signal not found: {0}")]
    NotFound(String),

    #[error("upstream price fetch failed: {0}")]
    UpstreamPriceFetch(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}
