//! Peg-in claim verification against proofs built from a structurally real parent chain.

use bitcoin::ScriptBuf;
use fedchain_pegin::verifier::{deposit_script_pubkey, verify, ParentChainView, Verdict};
use fedchain_primitives::policy::ScriptPolicy;
use fedchain_test_utils::{keys::seeded_keypairs, parent_chain::MockParentChain};

fn fedpeg_script() -> ScriptBuf {
    let keys = seeded_keypairs(1, 0xbeef);
    ScriptPolicy::new(vec![keys[0].1], 1).unwrap().to_script()
}

fn claim_script() -> ScriptBuf {
    ScriptBuf::from_bytes(vec![0x00, 0x14, 0x11, 0x22, 0x33])
}

#[test]
fn accepts_a_buried_deposit() {
    let fedpeg = fedpeg_script();
    let claim = claim_script();
    let mut parent = MockParentChain::new();

    let spk = deposit_script_pubkey(&fedpeg, &claim);
    let (txid, raw) = parent.deposit(&spk, 50_000);
    parent.mine(10);

    let proof = parent.txout_proof(&txid);
    let verdict = verify(&raw, &proof, &claim, &fedpeg, &parent.view(), 10);
    assert_eq!(verdict, Verdict::Accepted { confirmations: 10 });
}

#[test]
fn shallow_deposit_is_retryable() {
    let fedpeg = fedpeg_script();
    let claim = claim_script();
    let mut parent = MockParentChain::new();

    let spk = deposit_script_pubkey(&fedpeg, &claim);
    let (txid, raw) = parent.deposit(&spk, 50_000);
    parent.mine(5);

    let proof = parent.txout_proof(&txid);
    let verdict = verify(&raw, &proof, &claim, &fedpeg, &parent.view(), 10);
    assert_eq!(
        verdict,
        Verdict::InsufficientConfirmations {
            got: 5,
            required: 10
        }
    );

    // The same inputs verify to Accepted once the chain catches up: pure re-evaluation.
    parent.mine(5);
    let verdict = verify(&raw, &proof, &claim, &fedpeg, &parent.view(), 10);
    assert_eq!(verdict, Verdict::Accepted { confirmations: 10 });
}

#[test]
fn wrong_claim_script_is_a_mismatch() {
    let fedpeg = fedpeg_script();
    let claim = claim_script();
    let mut parent = MockParentChain::new();

    let spk = deposit_script_pubkey(&fedpeg, &claim);
    let (txid, raw) = parent.deposit(&spk, 50_000);
    parent.mine(12);
    let proof = parent.txout_proof(&txid);

    let other = ScriptBuf::from_bytes(vec![0x00, 0x14, 0x99]);
    let verdict = verify(&raw, &proof, &other, &fedpeg, &parent.view(), 10);
    assert_eq!(verdict, Verdict::ClaimScriptMismatch);
}

#[test]
fn garbage_inputs_are_proof_invalid() {
    let fedpeg = fedpeg_script();
    let claim = claim_script();
    let mut parent = MockParentChain::new();

    let spk = deposit_script_pubkey(&fedpeg, &claim);
    let (txid, raw) = parent.deposit(&spk, 50_000);
    parent.mine(12);
    let proof = parent.txout_proof(&txid);
    let view = parent.view();

    // Malformed raw tx.
    assert_eq!(
        verify(b"junk", &proof, &claim, &fedpeg, &view, 10),
        Verdict::ProofInvalid
    );
    // Malformed proof.
    assert_eq!(
        verify(&raw, b"junk", &claim, &fedpeg, &view, 10),
        Verdict::ProofInvalid
    );
    // Proof for a different transaction.
    let (_, other_raw) = parent.deposit(&spk, 1_000);
    assert_eq!(
        verify(&other_raw, &proof, &claim, &fedpeg, &view, 10),
        Verdict::ProofInvalid
    );
}

#[test]
fn proof_under_an_untrusted_header_is_invalid() {
    let fedpeg = fedpeg_script();
    let claim = claim_script();
    let mut parent = MockParentChain::new();

    let spk = deposit_script_pubkey(&fedpeg, &claim);
    let (txid, raw) = parent.deposit(&spk, 50_000);
    parent.mine(12);
    let proof = parent.txout_proof(&txid);

    // A fresh view that never accepted the containing header.
    let view = ParentChainView::new();
    assert_eq!(
        verify(&raw, &proof, &claim, &fedpeg, &view, 10),
        Verdict::ProofInvalid
    );
}
