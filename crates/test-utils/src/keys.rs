//! Deterministic key generation for tests.
//!
//! Production key material comes from OS randomness; tests inject a seed so every run derives
//! the same federation.

use rand::{rngs::StdRng, SeedableRng};
use secp256k1::{PublicKey, Secp256k1, SecretKey};

/// Derives `n` keypairs from a fixed seed.
pub fn seeded_keypairs(n: usize, seed: u64) -> Vec<(SecretKey, PublicKey)> {
    let secp = Secp256k1::new();
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n)
        .map(|_| {
            let sk = SecretKey::new(&mut rng);
            (sk, PublicKey::from_secret_key(&secp, &sk))
        })
        .collect()
}
