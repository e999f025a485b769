//! Federated block finality: signature collection, the per-height finalization state machine and
//! the sidechain chain-state with reorg handling.
//!
//! Nothing in this crate performs any networking. The coordinating node drives the state machine
//! with synchronously collected signatures; see `fedchain-node-core`.

pub mod chain;
pub mod errors;
pub mod finalizer;
pub mod sig_collector;

pub use chain::{ChainEvent, ChainState};
pub use finalizer::{proposer, BlockFinalizer, FinalizerState};
pub use sig_collector::{sign_block_hash, BlockSignature, CombineResult, SignatureCollector};
