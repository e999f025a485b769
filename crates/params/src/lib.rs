//! This crate contains the consensus-critical parameters that dictate the behavior of the
//! sidechain node in a way that ensures that all nodes can come to a consensus on the state of
//! the chain.

pub mod default;
pub mod errors;
pub mod types;

pub use types::Params;
