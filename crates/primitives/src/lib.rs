//! This crate contains general types, traits and pure functions that need to be shared across
//! multiple crates.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace.

pub mod block;
pub mod errors;
pub mod policy;
pub mod signer_table;
pub mod types;
