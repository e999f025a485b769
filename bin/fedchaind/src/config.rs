//! The node-local configuration.

use fedchain_primitives::types::SignerIdx;
use serde::{Deserialize, Serialize};

/// The configuration values that dictate the behavior of this node.
///
/// These values are not consensus-critical: differences in what values are set by individual
/// federation members will not cause the chain to halt. The consensus-critical values live in
/// the shared params file instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// The RPC server addr for the node.
    pub rpc_addr: String,

    /// This node's slot in the block-signing policy.
    pub signer_idx: SignerIdx,

    /// Hex-encoded secret key matching the policy key at `signer_idx`.
    pub signing_key: String,

    /// The number of tokio worker threads.
    pub num_threads: Option<usize>,
}
