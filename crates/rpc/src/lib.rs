//! RPC interface of the federation node.
//!
//! The RPCs are decomposed into groups the way bitcoin RPCs are categorized into various
//! [groups](https://developer.bitcoin.org/reference/rpc/index.html): node control, block
//! signing, and peg handling.

pub mod traits;
pub mod types;

pub use traits::*;
pub use types::*;
