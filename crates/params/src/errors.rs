//! Errors for the sidechain parameters.

use fedchain_primitives::errors::PolicyError;
use thiserror::Error;

/// Error while interpreting the configured parameter set.
#[derive(Debug, Clone, Error)]
pub enum ParamsError {
    /// One of the configured policy scripts could not be parsed into a policy.
    #[error("invalid policy script in params: {0}")]
    InvalidScript(#[from] PolicyError),
}
