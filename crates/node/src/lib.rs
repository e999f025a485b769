//! The federation node: the command surface over chain state, peg-in ledger and peg wallet,
//! plus the synchronous coordinator that drives per-height block production.

pub mod coordinator;
pub mod errors;
pub mod node;
pub mod wallet;

pub use coordinator::{await_height, collect_signatures, produce_block, BlockSigner, RoundOptions};
pub use errors::NodeError;
pub use node::{CombinedBlock, DecodedTransaction, Node, TransactionInfo};
pub use wallet::{PegWallet, PeginAddressInfo};
