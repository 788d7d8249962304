//! Rollup Accounts
//!
//! EdDSA over Jubjub (the twisted Edwards curve embedded in BLS12-381) with a
//! Poseidon challenge, so signatures can be checked inside the batch circuit.
//!
//! ```text
//! Account:    a (private scalar),  A = a·G
//! Address:    Poseidon(A.x, A.y)
//! Sign(m):    r = KDF(a, m),  R = r·G
//!             c = Poseidon(R.x, R.y, A.x, A.y, m)  (mod l)
//!             s = r + c·a
//! Verify:     s·G == R + c·A
//! ```
//!
//! Curve coordinates live in the BLS12-381 scalar field, which is the field
//! every other rollup value lives in.

use std::fmt;

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bls12_381::{EdwardsAffine, Fr as Scalar};
use ark_ff::{BigInteger, PrimeField, Zero};
use ark_std::{UniformRand, rand::Rng};
use rollup_primitives::{FieldError, Fr, fr_to_bytes, fr_to_hex, poseidon_hash, serde_fr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NONCE_CONTEXT: &str = "nft-rollup 2026-01 eddsa signing nonce";
const SEED_CONTEXT: &str = "nft-rollup 2026-01 account seed";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("point is not on the curve")]
    NotOnCurve,

    #[error("point is not in the prime-order subgroup")]
    WrongSubgroup,

    #[error("public key is the identity")]
    Identity,

    #[error("signature scalar is not canonical")]
    NonCanonicalScalar,

    #[error(transparent)]
    Field(#[from] FieldError),
}

fn scalar_to_bytes(s: &Scalar) -> [u8; 32] {
    let bytes = s.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

/// Reduce a base-field element into the scalar field
fn to_scalar(f: &Fr) -> Scalar {
    Scalar::from_le_bytes_mod_order(&fr_to_bytes(f))
}

/// Lift a scalar into the base field. Exact: the subgroup order is below the
/// base-field modulus.
fn scalar_to_field(s: &Scalar) -> Fr {
    Fr::from_le_bytes_mod_order(&scalar_to_bytes(s))
}

fn challenge(r: &EdwardsAffine, public: &EdwardsAffine, msg: Fr) -> Scalar {
    to_scalar(&poseidon_hash(&[r.x, r.y, public.x, public.y, msg]))
}

// ============================================================================
// Address
// ============================================================================

/// Poseidon commitment to a public key; the owner value stored in the
/// ownership trie. Zero is reserved as the null address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(#[serde(with = "serde_fr")] Fr);

impl Address {
    pub fn null() -> Self {
        Self(Fr::zero())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_field(f: Fr) -> Self {
        Self(f)
    }

    pub fn to_field(&self) -> Fr {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fr_to_hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", fr_to_hex(&self.0))
    }
}

// ============================================================================
// Public key
// ============================================================================

/// A validated Jubjub point in the prime-order subgroup
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PointRepr", into = "PointRepr")]
pub struct PublicKey(EdwardsAffine);

#[derive(Serialize, Deserialize)]
struct PointRepr {
    #[serde(with = "serde_fr")]
    x: Fr,
    #[serde(with = "serde_fr")]
    y: Fr,
}

impl TryFrom<PointRepr> for PublicKey {
    type Error = KeyError;

    fn try_from(p: PointRepr) -> Result<Self, Self::Error> {
        Self::from_coordinates(p.x, p.y)
    }
}

impl From<PublicKey> for PointRepr {
    fn from(pk: PublicKey) -> Self {
        Self {
            x: pk.x(),
            y: pk.y(),
        }
    }
}

impl PublicKey {
    /// Rebuild a key from raw coordinates, rejecting anything a signer could
    /// not have produced.
    pub fn from_coordinates(x: Fr, y: Fr) -> Result<Self, KeyError> {
        let point = EdwardsAffine::new_unchecked(x, y);
        if !point.is_on_curve() {
            return Err(KeyError::NotOnCurve);
        }
        if !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(KeyError::WrongSubgroup);
        }
        if point.is_zero() {
            return Err(KeyError::Identity);
        }
        Ok(Self(point))
    }

    pub fn x(&self) -> Fr {
        self.0.x
    }

    pub fn y(&self) -> Fr {
        self.0.y
    }

    pub fn address(&self) -> Address {
        Address(poseidon_hash(&[self.0.x, self.0.y]))
    }

    pub fn verify(&self, msg: Fr, sig: &Signature) -> bool {
        let c = challenge(&sig.r, &self.0, msg);
        let lhs = EdwardsAffine::generator() * sig.s;
        let rhs = sig.r.into_group() + self.0 * c;
        lhs == rhs
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("x", &fr_to_hex(&self.0.x))
            .field("y", &fr_to_hex(&self.0.y))
            .finish()
    }
}

// ============================================================================
// Signature
// ============================================================================

/// EdDSA signature `(R, s)`
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignatureRepr", into = "SignatureRepr")]
pub struct Signature {
    r: EdwardsAffine,
    s: Scalar,
}

#[derive(Serialize, Deserialize)]
struct SignatureRepr {
    #[serde(with = "serde_fr")]
    r8x: Fr,
    #[serde(with = "serde_fr")]
    r8y: Fr,
    #[serde(with = "serde_fr")]
    s: Fr,
}

impl TryFrom<SignatureRepr> for Signature {
    type Error = KeyError;

    fn try_from(r: SignatureRepr) -> Result<Self, Self::Error> {
        Self::from_fields(r.r8x, r.r8y, r.s)
    }
}

impl From<Signature> for SignatureRepr {
    fn from(sig: Signature) -> Self {
        let [r8x, r8y, s] = sig.to_fields();
        Self { r8x, r8y, s }
    }
}

impl Signature {
    /// Decode `(R.x, R.y, s)` as carried in public inputs
    pub fn from_fields(rx: Fr, ry: Fr, s: Fr) -> Result<Self, KeyError> {
        let r = EdwardsAffine::new_unchecked(rx, ry);
        if !r.is_on_curve() {
            return Err(KeyError::NotOnCurve);
        }
        let bytes = fr_to_bytes(&s);
        let s = Scalar::from_le_bytes_mod_order(&bytes);
        if scalar_to_bytes(&s) != bytes {
            return Err(KeyError::NonCanonicalScalar);
        }
        Ok(Self { r, s })
    }

    /// `[R.x, R.y, s]`
    pub fn to_fields(&self) -> [Fr; 3] {
        [self.r.x, self.r.y, scalar_to_field(&self.s)]
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [rx, ry, s] = self.to_fields();
        f.debug_struct("Signature")
            .field("r8x", &fr_to_hex(&rx))
            .field("r8y", &fr_to_hex(&ry))
            .field("s", &fr_to_hex(&s))
            .finish()
    }
}

// ============================================================================
// Account
// ============================================================================

/// A signing identity.
/// NEVER expose the private scalar.
#[derive(Clone)]
pub struct Account {
    private_scalar: Scalar,
    public_key: PublicKey,
}

impl Account {
    fn from_scalar(private_scalar: Scalar) -> Self {
        let public_key = PublicKey((EdwardsAffine::generator() * private_scalar).into_affine());
        Self {
            private_scalar,
            public_key,
        }
    }

    /// Fresh random account
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut scalar = Scalar::rand(rng);
        while scalar.is_zero() {
            scalar = Scalar::rand(rng);
        }
        Self::from_scalar(scalar)
    }

    /// Reproducible account from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(SEED_CONTEXT);
        hasher.update(seed);
        let mut counter = 0u32;
        loop {
            let mut wide = [0u8; 64];
            let mut round = hasher.clone();
            round.update(&counter.to_le_bytes());
            round.finalize_xof().fill(&mut wide);
            let scalar = Scalar::from_le_bytes_mod_order(&wide);
            if !scalar.is_zero() {
                return Self::from_scalar(scalar);
            }
            counter += 1;
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn address(&self) -> Address {
        self.public_key.address()
    }

    /// Sign a field message. Deterministic: the nonce is derived from the
    /// private scalar and the message.
    pub fn sign(&self, msg: Fr) -> Signature {
        let mut hasher = blake3::Hasher::new_derive_key(NONCE_CONTEXT);
        hasher.update(&scalar_to_bytes(&self.private_scalar));
        hasher.update(&fr_to_bytes(&msg));
        let mut wide = [0u8; 64];
        hasher.finalize_xof().fill(&mut wide);
        let nonce = Scalar::from_le_bytes_mod_order(&wide);

        let r = (EdwardsAffine::generator() * nonce).into_affine();
        let c = challenge(&r, &self.public_key.0, msg);
        let s = nonce + c * self.private_scalar;
        Signature { r, s }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_sign_verify() {
        let mut rng = StdRng::seed_from_u64(7);
        let account = Account::random(&mut rng);
        let msg = Fr::from(42u64);
        let sig = account.sign(msg);
        assert!(account.public_key().verify(msg, &sig));
        assert!(!account.public_key().verify(Fr::from(43u64), &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let mut rng = StdRng::seed_from_u64(8);
        let a = Account::random(&mut rng);
        let b = Account::random(&mut rng);
        let sig = a.sign(Fr::from(1u64));
        assert!(!b.public_key().verify(Fr::from(1u64), &sig));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let account = Account::from_seed(&[3u8; 32]);
        let msg = Fr::from(9u64);
        assert_eq!(account.sign(msg), account.sign(msg));
        assert_ne!(account.sign(msg), account.sign(Fr::from(10u64)));
    }

    #[test]
    fn test_from_seed_is_reproducible() {
        let a = Account::from_seed(&[1u8; 32]);
        let b = Account::from_seed(&[1u8; 32]);
        let c = Account::from_seed(&[2u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
        assert!(!a.address().is_null());
    }

    #[test]
    fn test_signature_field_round_trip() {
        let account = Account::from_seed(&[5u8; 32]);
        let msg = Fr::from(77u64);
        let sig = account.sign(msg);
        let [rx, ry, s] = sig.to_fields();
        let decoded = Signature::from_fields(rx, ry, s).unwrap();
        assert_eq!(decoded, sig);
        assert!(account.public_key().verify(msg, &decoded));
    }

    #[test]
    fn test_tampered_s_fails() {
        let account = Account::from_seed(&[6u8; 32]);
        let msg = Fr::from(77u64);
        let [rx, ry, s] = account.sign(msg).to_fields();
        let forged = Signature::from_fields(rx, ry, s + Fr::from(1u64)).unwrap();
        assert!(!account.public_key().verify(msg, &forged));
    }

    #[test]
    fn test_non_canonical_scalar_rejected() {
        let account = Account::from_seed(&[6u8; 32]);
        let [rx, ry, _] = account.sign(Fr::from(1u64)).to_fields();
        // -1 in the base field is far above the subgroup order
        let err = Signature::from_fields(rx, ry, -Fr::from(1u64)).unwrap_err();
        assert_eq!(err, KeyError::NonCanonicalScalar);
    }

    #[test]
    fn test_public_key_validation() {
        let account = Account::from_seed(&[4u8; 32]);
        let pk = account.public_key();
        assert_eq!(PublicKey::from_coordinates(pk.x(), pk.y()).unwrap(), pk);

        assert_eq!(
            PublicKey::from_coordinates(Fr::from(1u64), Fr::from(1u64)).unwrap_err(),
            KeyError::NotOnCurve
        );
        // (0, 1) is the identity on a twisted Edwards curve
        assert_eq!(
            PublicKey::from_coordinates(Fr::zero(), Fr::from(1u64)).unwrap_err(),
            KeyError::Identity
        );
    }

    #[test]
    fn test_address_is_poseidon_of_coordinates() {
        let account = Account::from_seed(&[11u8; 32]);
        let pk = account.public_key();
        assert_eq!(account.address().to_field(), poseidon_hash(&[pk.x(), pk.y()]));
    }

    #[test]
    fn test_serde_round_trip() {
        let account = Account::from_seed(&[12u8; 32]);
        let sig = account.sign(Fr::from(5u64));

        let json = serde_json::to_string(&account.public_key()).unwrap();
        let pk: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, account.public_key());

        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);

        let json = serde_json::to_string(&account.address()).unwrap();
        let addr: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, account.address());
    }

    #[test]
    fn test_debug_hides_private_scalar() {
        let account = Account::from_seed(&[13u8; 32]);
        let dbg = format!("{:?}", account);
        assert!(dbg.contains("address"));
        assert!(!dbg.contains("private"));
    }
}
