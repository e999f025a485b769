//! Types for the sidechain parameters.

use bitcoin::{Network, ScriptBuf};
use fedchain_primitives::policy::ScriptPolicy;
use serde::{Deserialize, Serialize};

use crate::{default, errors::ParamsError};

/// The consensus-critical parameters that dictate the behavior of the sidechain node.
///
/// These parameters are configurable but note that differences in how these are configured among
/// the federation members will prevent the chain from reaching consensus at all: a node with a
/// different `signblockscript` rejects every block the rest of the federation finalizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// The parent-chain network against which peg-in proofs are validated.
    pub network: Network,

    /// The k-of-n block-signing script that substitutes for proof-of-work.
    pub signblockscript: ScriptBuf,

    /// The federation script that locks pegged funds on the parent chain.
    pub fedpegscript: ScriptBuf,

    /// Whether peg-in claims are validated at all.
    ///
    /// Disabled on networks that do not run a parent chain (e.g. the block-signing tests of the
    /// original system).
    #[serde(default = "default_validatepegin")]
    pub validatepegin: bool,

    /// The number of parent-chain confirmations required before a claim enters the mempool.
    #[serde(default = "default_pegin_depth")]
    pub peginconfirmationdepth: u32,

    /// Offset on top of [`Self::peginconfirmationdepth`] before a claim counts as wallet-safe.
    #[serde(default = "default_safe_offset")]
    pub peginsafedepthoffset: u32,
}

impl Params {
    /// Parses the block-signing policy out of `signblockscript`.
    pub fn block_policy(&self) -> Result<ScriptPolicy, ParamsError> {
        Ok(ScriptPolicy::from_script(&self.signblockscript)?)
    }

    /// Parses the federation peg policy out of `fedpegscript`.
    pub fn fedpeg_policy(&self) -> Result<ScriptPolicy, ParamsError> {
        Ok(ScriptPolicy::from_script(&self.fedpegscript)?)
    }

    /// The depth at which a confirming claim is treated as settled.
    pub fn safe_depth(&self) -> u32 {
        self.peginconfirmationdepth + self.peginsafedepthoffset
    }
}

fn default_validatepegin() -> bool {
    default::VALIDATE_PEGIN
}

fn default_pegin_depth() -> u32 {
    default::PEGIN_CONFIRMATION_DEPTH
}

fn default_safe_offset() -> u32 {
    default::PEGIN_SAFE_DEPTH_OFFSET
}
