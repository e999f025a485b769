//! The peg wallet: claim-script issuance and deposit-address derivation.
//!
//! This is deliberately not a full wallet. It mints fresh claim scripts, remembers which ones it
//! issued, and recognizes deposits that pay them. Spending the pegged funds is out of scope; the
//! claim secrets are retained so a future spend path has them.

use bitcoin::{CompressedPublicKey, Network, Script, ScriptBuf, Transaction};
use fedchain_pegin::verifier::{deposit_address, deposit_script_pubkey};
use rand::rngs::StdRng;
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What `getpeginaddress` hands to the depositor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeginAddressInfo {
    /// The parent-chain address the depositor sends funds to.
    pub mainchain_address: String,

    /// The claim script the depositor must present back in `claimpegin`.
    pub claim_script: ScriptBuf,
}

#[derive(Debug)]
struct IssuedClaim {
    secret: SecretKey,
    claim_script: ScriptBuf,
}

/// Issues claim scripts and recognizes deposits paying them.
#[derive(Debug)]
pub struct PegWallet {
    network: Network,
    fedpeg_script: ScriptBuf,
    rng: StdRng,
    issued: Vec<IssuedClaim>,
}

impl PegWallet {
    /// A fresh wallet with no issued claims.
    ///
    /// The randomness source is injected so tests can seed it; production callers construct it
    /// from entropy.
    pub fn new(fedpeg_script: ScriptBuf, network: Network, rng: StdRng) -> Self {
        Self {
            network,
            fedpeg_script,
            rng,
            issued: Vec::new(),
        }
    }

    /// Mints a fresh claim script and derives the deposit address committed to it.
    ///
    /// The claim script is a standard P2WPKH script over a freshly generated key, so the claimed
    /// funds land on an output only this wallet can eventually spend.
    pub fn new_pegin_address(&mut self) -> PeginAddressInfo {
        let secret = SecretKey::new(&mut self.rng);
        let pubkey = PublicKey::from_secret_key(SECP256K1, &secret);
        let claim_script = ScriptBuf::new_p2wpkh(&CompressedPublicKey(pubkey).wpubkey_hash());

        let address = deposit_address(&self.fedpeg_script, &claim_script, self.network);
        debug!(%address, "issued peg-in address");

        self.issued.push(IssuedClaim {
            secret,
            claim_script: claim_script.clone(),
        });

        PeginAddressInfo {
            mainchain_address: address.to_string(),
            claim_script,
        }
    }

    /// Finds the issued claim script (if any) whose deposit script pubkey an output of `tx` pays.
    pub fn find_claim_script(&self, tx: &Transaction) -> Option<ScriptBuf> {
        self.issued
            .iter()
            .find(|issued| {
                let spk = deposit_script_pubkey(&self.fedpeg_script, &issued.claim_script);
                tx.output.iter().any(|out| out.script_pubkey == spk)
            })
            .map(|issued| issued.claim_script.clone())
    }

    /// The secret key behind an issued claim script, for the eventual spend of claimed funds.
    pub fn claim_key(&self, claim_script: &Script) -> Option<&SecretKey> {
        self.issued
            .iter()
            .find(|issued| issued.claim_script.as_script() == claim_script)
            .map(|issued| &issued.secret)
    }

    /// Number of claim scripts issued so far.
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}
