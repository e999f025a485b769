//! Types for the RPC server.

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

/// Result of `combineblocksigs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCombinedBlock {
    /// Whether the signing threshold has been reached.
    pub complete: bool,

    /// The block hex, with the combined witness attached iff `complete`.
    pub hex: String,
}

/// Result of `getpeginaddress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPeginAddress {
    /// The parent-chain address the depositor sends funds to.
    pub mainchain_address: String,

    /// Hex encoding of the claim script to present back in `claimpegin`.
    pub claim_script: String,
}

/// Result of `gettransaction` for a peg-in claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTransactionInfo {
    /// The claim's sidechain txid.
    pub txid: Txid,

    /// Best-chain confirmations of the claim.
    pub confirmations: u32,

    /// Claimed amount in satoshis.
    pub amount_sats: u64,

    /// The claim in its hex wire format.
    pub hex: String,
}

/// Result of `decoderawtransaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDecodedTransaction {
    /// The transaction's sidechain txid.
    pub txid: Txid,

    /// Decoded inputs.
    pub vin: Vec<RpcVin>,
}

/// One decoded input with its peg provenance fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcVin {
    /// Whether this input claims pegged funds from the parent chain.
    pub is_pegin: bool,

    /// Peg provenance: parent txid, claim script, raw deposit tx, txout proof.
    pub pegin_witness: Vec<String>,
}
