//! Test fixtures shared across the workspace: deterministic keys and a mock parent chain that
//! produces real txout proofs.

pub mod keys;
pub mod parent_chain;

pub mod prelude {
    pub use crate::{keys::*, parent_chain::*};
}
