//! Peg-in admission: SPV proof verification against the parent chain and reorg-safe confirmation
//! tracking for accepted claims.
//!
//! [`verifier`] is stateless and pure; [`ledger`] owns per-claim confirmation state and is driven
//! by the best chain exposed by `fedchain-consensus`.

pub mod claim;
pub mod errors;
pub mod ledger;
pub mod verifier;

pub use claim::PeginClaim;
pub use ledger::{ClaimState, PeginLedger};
pub use verifier::{verify, ParentChainView, Verdict};
