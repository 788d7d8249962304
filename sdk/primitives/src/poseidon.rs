//! Poseidon hash
//!
//! Field: BLS12-381 Fr (255 bits)
//! Rate: 2, Capacity: 1
//! Rounds: 8 full, 57 partial, alpha = 5
//!
//! The circuit hashes with the same parameters, so every off-circuit hash here
//! (trie nodes, addresses, transfer messages, signature challenges) must go
//! through `poseidon_hash`.

use std::sync::LazyLock;

use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};

use crate::field::Fr;

static POSEIDON: LazyLock<PoseidonConfig<Fr>> = LazyLock::new(poseidon_config);

/// Poseidon parameters for the rollup
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits: u64 = 255;
    let rate: usize = 2;
    let capacity: usize = 1;
    let full_rounds: u64 = 8;
    let partial_rounds: u64 = 57;
    let alpha: u64 = 5;
    let skip_matrices: u64 = 0;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        rate,
        full_rounds,
        partial_rounds,
        skip_matrices,
    );

    PoseidonConfig::new(
        full_rounds as usize,
        partial_rounds as usize,
        alpha,
        mds,
        ark,
        rate,
        capacity,
    )
}

/// Absorb `inputs` in order and squeeze one element
pub fn poseidon_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(&POSEIDON);
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = Fr::from(123u64);
        let b = Fr::from(456u64);
        assert_eq!(poseidon_hash(&[a, b]), poseidon_hash(&[a, b]));
    }

    #[test]
    fn test_order_matters() {
        let a = Fr::from(123u64);
        let b = Fr::from(456u64);
        assert_ne!(poseidon_hash(&[a, b]), poseidon_hash(&[b, a]));
    }

    #[test]
    fn test_arity_matters() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        assert_ne!(poseidon_hash(&[a, b]), poseidon_hash(&[a, b, Fr::from(1u64)]));
    }
}
