use std::collections::BTreeMap;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use crate::types::SignerIdx;

/// The ordered registry of federation block signers.
///
/// Maps signer indices to their secp256k1 keys and back, and remembers which index is "us" (the
/// point-of-view signer). Constructed once at startup from the consensus parameters and shared
/// read-only by every component that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerTable {
    pov: SignerIdx,
    idx_key: BTreeMap<SignerIdx, PublicKey>,
    key_idx: BTreeMap<PublicKey, SignerIdx>,
}

impl SignerTable {
    /// Builds the table from `(index, key)` entries.
    ///
    /// Returns [`None`] if any index or key appears twice, or if `pov` is not one of the entries.
    pub fn new(entries: Vec<(SignerIdx, PublicKey)>, pov: SignerIdx) -> Option<Self> {
        let mut idx_key = BTreeMap::new();
        let mut key_idx = BTreeMap::new();
        for (idx, key) in entries {
            if idx_key.insert(idx, key).is_some() || key_idx.insert(key, idx).is_some() {
                // This means we have a duplicate value which indicates a problem.
                return None;
            }
        }

        // NOTE: do not remove this without removing the unwraps in pov_key.
        if !idx_key.contains_key(&pov) {
            return None;
        }

        Some(SignerTable {
            pov,
            idx_key,
            key_idx,
        })
    }

    pub fn pov_idx(&self) -> SignerIdx {
        self.pov
    }

    pub fn pov_key(&self) -> PublicKey {
        // NOTE: unwrap is safe because we assert this key is in the map in the constructor.
        *self.idx_key.get(&self.pov).unwrap()
    }

    /// The number of signers in the federation.
    pub fn cardinality(&self) -> usize {
        self.idx_key.len()
    }
}
