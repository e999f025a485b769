//! The k-of-n multisignature policy that substitutes for proof-of-work.
//!
//! Two instances of [`ScriptPolicy`] exist in a running node: the block-signing policy
//! (`signblockscript`) and the federation peg policy (`fedpegscript`). They are never
//! interchangeable; the peg-in verifier compares claim scripts byte-exactly.

use std::collections::BTreeMap;

use bitcoin::{
    opcodes::all::OP_CHECKMULTISIG,
    script::{Builder, Instruction},
    ScriptBuf,
};
use secp256k1::{ecdsa, Message, PublicKey, SECP256K1};

use crate::{errors::PolicyError, types::SignerIdx};

/// The maximum number of keys expressible with a single `OP_PUSHNUM` opcode.
pub const MAX_POLICY_KEYS: usize = 16;

/// An immutable k-of-n multisignature policy over an ordered set of public keys.
///
/// Key order is consensus-relevant: it fixes both the script encoding and the witness ordering
/// produced by signature combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPolicy {
    pubkeys: Vec<PublicKey>,
    threshold: u32,
}

impl ScriptPolicy {
    /// Constructs the policy, enforcing `1 <= m <= n` and the script-encodable key count.
    pub fn new(pubkeys: Vec<PublicKey>, threshold: u32) -> Result<Self, PolicyError> {
        let total = pubkeys.len() as u32;
        if threshold < 1 || threshold > total || pubkeys.len() > MAX_POLICY_KEYS {
            return Err(PolicyError::InvalidPolicy { threshold, total });
        }

        Ok(Self { pubkeys, threshold })
    }

    /// The required number of signers (`m`).
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// The total number of keys (`n`).
    pub fn total(&self) -> u32 {
        self.pubkeys.len() as u32
    }

    /// The policy keys in script order.
    pub fn pubkeys(&self) -> &[PublicKey] {
        &self.pubkeys
    }

    /// The key at the given signer index, if the index is within the policy.
    pub fn key_at(&self, idx: SignerIdx) -> Option<&PublicKey> {
        self.pubkeys.get(idx as usize)
    }

    /// Encodes the policy as an `OP_m <keys> OP_n OP_CHECKMULTISIG` script.
    pub fn to_script(&self) -> ScriptBuf {
        let mut builder = Builder::new().push_int(self.threshold as i64);
        for key in &self.pubkeys {
            builder = builder.push_slice(key.serialize());
        }
        builder
            .push_int(self.pubkeys.len() as i64)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script()
    }

    /// Parses a policy back out of a bare multisig script.
    pub fn from_script(script: &ScriptBuf) -> Result<Self, PolicyError> {
        let mut instructions = script
            .instructions()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PolicyError::MalformedScript)?;

        if instructions.len() < 4 {
            return Err(PolicyError::MalformedScript);
        }

        let Some(Instruction::Op(op)) = instructions.last() else {
            return Err(PolicyError::MalformedScript);
        };
        if *op != OP_CHECKMULTISIG {
            return Err(PolicyError::MalformedScript);
        }
        instructions.pop();

        let total = instructions
            .pop()
            .and_then(pushnum)
            .ok_or(PolicyError::MalformedScript)?;
        let threshold = pushnum(instructions.remove(0)).ok_or(PolicyError::MalformedScript)?;

        let mut pubkeys = Vec::with_capacity(instructions.len());
        for inst in instructions {
            let Instruction::PushBytes(bytes) = inst else {
                return Err(PolicyError::MalformedScript);
            };
            let key = PublicKey::from_slice(bytes.as_bytes())
                .map_err(|e| PolicyError::MalformedKey(e.to_string()))?;
            pubkeys.push(key);
        }

        if pubkeys.len() as u32 != total {
            return Err(PolicyError::MalformedScript);
        }

        Self::new(pubkeys, threshold)
    }

    /// Verifies a combined witness the way `OP_CHECKMULTISIG` does: signatures and keys are both
    /// consumed in order, each signature advancing through the remaining keys until one verifies.
    ///
    /// Returns `true` iff at least `m` signatures matched. Used at submission time to re-verify a
    /// reportedly complete witness independently of any collector bookkeeping.
    pub fn validate_witness(&self, block_hash: &[u8; 32], witness: &[Vec<u8>]) -> bool {
        let msg = Message::from_digest(*block_hash);
        let mut keys = self.pubkeys.iter();
        let mut matched = 0u32;

        for der in witness {
            let Ok(sig) = ecdsa::Signature::from_der(der) else {
                continue;
            };
            for key in keys.by_ref() {
                if SECP256K1.verify_ecdsa(&msg, &sig, key).is_ok() {
                    matched += 1;
                    break;
                }
            }
        }

        matched >= self.threshold
    }

    /// Returns `true` iff at least `m` of the supplied signatures verify against the policy key
    /// at their claimed index for the given 32-byte block hash commitment.
    ///
    /// This is pure and deliberately independent of any collector bookkeeping so submission can
    /// re-verify a reportedly complete witness.
    pub fn validate(
        &self,
        block_hash: &[u8; 32],
        sigs: &BTreeMap<SignerIdx, ecdsa::Signature>,
    ) -> bool {
        let msg = Message::from_digest(*block_hash);
        let valid = sigs
            .iter()
            .filter(|(idx, sig)| {
                self.key_at(**idx)
                    .is_some_and(|key| SECP256K1.verify_ecdsa(&msg, sig, key).is_ok())
            })
            .count();

        valid as u32 >= self.threshold
    }
}

fn pushnum(inst: Instruction<'_>) -> Option<u32> {
    match inst {
        Instruction::Op(op) => {
            let raw = op.to_u8();
            // OP_PUSHNUM_1 through OP_PUSHNUM_16.
            (0x51..=0x60).contains(&raw).then(|| (raw - 0x50) as u32)
        }
        _ => None,
    }
}
