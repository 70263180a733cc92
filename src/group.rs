//! Prime-order group abstraction
//!
//! The proof engine is parameterized over a cyclic group `G` of prime order
//! `q` with two fixed, independent generators `g` and `h`. Everything the
//! engine needs is captured by the [`Group`] trait: scalar arithmetic mod
//! `q`, scalar multiplication, group addition, and a canonical byte encoding
//! for elements and scalars.
//!
//! Two concrete configurations are provided:
//!
//! - [`P256Group`]: NIST P-256. `g` is the standard base point and `h` is
//!   derived by hash-to-curve with a fixed domain-separation tag, so no
//!   discrete-log relation between the two is known. Elements encode as
//!   uncompressed SEC1 (65 bytes), scalars as 32-byte big-endian.
//! - [`Schnorr1024Group`]: the RFC 5114 1024-bit MODP group with a 160-bit
//!   prime-order subgroup. The group operation is multiplication mod `p`;
//!   exponents live mod `q`. Elements encode as 128-byte big-endian,
//!   scalars as 20-byte big-endian.
//!
//! ## Invariants
//!
//! - Encodings are canonical and stable: two elements are equal iff their
//!   encoded bytes match, and `decode` rejects any byte string that is not
//!   the canonical form of a group member (wrong length, wrong SEC1 tag,
//!   off-curve point, value outside the subgroup, the identity).
//! - `generator_h` validates group membership before returning; a failure
//!   here is a configuration error and callers must refuse to start.
//! - Comparisons of protocol-relevant elements go through [`Group::ct_eq`],
//!   which is constant-time over the canonical bytes.

#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::sync::OnceLock;

use elliptic_curve::{
    bigint::U256,
    group::Group as _,
    hash2curve::{ExpandMsgXmd, GroupDigest},
    ops::Reduce,
    sec1::{FromEncodedPoint, ToEncodedPoint},
    Field, PrimeField,
};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use p256::{AffinePoint, EncodedPoint, FieldBytes, NistP256, ProjectivePoint};
use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Errors surfaced by group decoding and setup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GroupError {
    /// The byte string has the wrong length for this group's encoding.
    #[error("encoding has wrong length: got {got}, expected {expected}")]
    Length {
        /// Length of the rejected input.
        got: usize,
        /// Length the encoding requires.
        expected: usize,
    },
    /// The byte string is well-sized but not a canonical encoding.
    #[error("bytes are not a canonical encoding: {0}")]
    Encoding(&'static str),
    /// The decoded value is not a member of the prime-order group.
    #[error("value is not in the prime-order group")]
    NotInGroup,
    /// The scalar bytes denote a value outside `[0, q)`.
    #[error("scalar bytes out of range")]
    ScalarRange,
    /// The second generator `h` could not be derived or validated.
    #[error("second generator is invalid: {0}")]
    Generator(&'static str),
}

/// A prime-order cyclic group with two independent generators.
///
/// All methods are static: a `Group` is a configuration tag, not a value.
/// The shape follows the ciphersuite traits used by Schnorr-style protocol
/// crates, so swapping the concrete group never touches the engine.
pub trait Group: Copy + Clone + Debug + Send + Sync + 'static {
    /// An integer mod `q`, the group order.
    type Scalar: Clone + PartialEq + Debug + Send + Sync;
    /// A group member.
    type Element: Clone + PartialEq + Debug + Send + Sync;

    /// Human-readable configuration name (logged at startup).
    const NAME: &'static str;
    /// Fixed width of an encoded scalar in bytes.
    const SCALAR_LEN: usize;
    /// Fixed width of an encoded element in bytes.
    const ELEMENT_LEN: usize;

    /// The second generator `h`, validated for group membership.
    ///
    /// The derivation is deterministic, so both parties agree on `h`
    /// without exchanging it. An error is fatal configuration breakage.
    fn generator_h() -> Result<Self::Element, GroupError>;

    /// `g * s` for the primary generator `g`.
    fn mul_base(s: &Self::Scalar) -> Self::Element;
    /// `p * s`.
    fn mul(p: &Self::Element, s: &Self::Scalar) -> Self::Element;
    /// The group operation.
    fn add(a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Canonical encoding of an element.
    fn encode(p: &Self::Element) -> Vec<u8>;
    /// Strict inverse of [`Group::encode`].
    fn decode(bytes: &[u8]) -> Result<Self::Element, GroupError>;

    /// Fixed-width big-endian encoding of a scalar.
    fn scalar_encode(s: &Self::Scalar) -> Vec<u8>;
    /// Strict inverse of [`Group::scalar_encode`]; rejects values >= `q`.
    fn scalar_decode(bytes: &[u8]) -> Result<Self::Scalar, GroupError>;

    /// Interpret big-endian bytes as an integer and reduce it mod `q`.
    ///
    /// Callers pass at most a SHA-256 digest's width; used for hash
    /// outputs and wire challenges.
    fn scalar_reduce(bytes: &[u8]) -> Self::Scalar;

    /// `(a + b) mod q`.
    fn scalar_add(a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar;
    /// `(a * b) mod q`.
    fn scalar_mul(a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar;
    /// Whether `s == 0`.
    fn scalar_is_zero(s: &Self::Scalar) -> bool;

    /// Sample a scalar uniformly from `[1, q-1]`, resampling on zero.
    fn random_scalar<R: CryptoRngCore>(rng: &mut R) -> Self::Scalar;

    /// Constant-time element equality over canonical bytes.
    fn ct_eq(a: &Self::Element, b: &Self::Element) -> bool {
        bool::from(Self::encode(a).as_slice().ct_eq(Self::encode(b).as_slice()))
    }
}

// ============================================================================
// NIST P-256
// ============================================================================

/// Domain-separation tag for deriving the second generator on P-256.
const P256_H_DST: &[u8] = b"zkpauth-v1:P256_XMD:SHA-256_SSWU_RO_:generator-h";
/// Input message for the derivation; any fixed public string works, the
/// hash-to-curve construction is what removes the known dlog relation.
const P256_H_SEED: &[u8] = b"zkpauth second base point";

static P256_H: OnceLock<ProjectivePoint> = OnceLock::new();

/// NIST P-256 with SEC1 uncompressed encodings.
#[derive(Copy, Clone, Debug)]
pub struct P256Group;

impl Group for P256Group {
    type Scalar = p256::Scalar;
    type Element = ProjectivePoint;

    const NAME: &'static str = "p256";
    const SCALAR_LEN: usize = 32;
    const ELEMENT_LEN: usize = 65;

    fn generator_h() -> Result<Self::Element, GroupError> {
        if let Some(h) = P256_H.get() {
            return Ok(*h);
        }
        let h = NistP256::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[P256_H_SEED], &[P256_H_DST])
            .map_err(|_| GroupError::Generator("hash-to-curve failed"))?;
        if bool::from(h.is_identity()) {
            return Err(GroupError::Generator("derived point is the identity"));
        }
        Ok(*P256_H.get_or_init(|| h))
    }

    fn mul_base(s: &Self::Scalar) -> Self::Element {
        ProjectivePoint::GENERATOR * s
    }

    fn mul(p: &Self::Element, s: &Self::Scalar) -> Self::Element {
        *p * s
    }

    fn add(a: &Self::Element, b: &Self::Element) -> Self::Element {
        *a + *b
    }

    fn encode(p: &Self::Element) -> Vec<u8> {
        p.to_affine().to_encoded_point(false).as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self::Element, GroupError> {
        if bytes.len() != Self::ELEMENT_LEN {
            return Err(GroupError::Length { got: bytes.len(), expected: Self::ELEMENT_LEN });
        }
        // Uncompressed SEC1 only; this also excludes the identity encoding.
        if bytes[0] != 0x04 {
            return Err(GroupError::Encoding("expected uncompressed SEC1 tag"));
        }
        let enc = EncodedPoint::from_bytes(bytes)
            .map_err(|_| GroupError::Encoding("malformed SEC1 point"))?;
        let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&enc).into();
        let affine = affine.ok_or(GroupError::NotInGroup)?;
        Ok(ProjectivePoint::from(affine))
    }

    fn scalar_encode(s: &Self::Scalar) -> Vec<u8> {
        s.to_repr().to_vec()
    }

    fn scalar_decode(bytes: &[u8]) -> Result<Self::Scalar, GroupError> {
        if bytes.len() != Self::SCALAR_LEN {
            return Err(GroupError::Length { got: bytes.len(), expected: Self::SCALAR_LEN });
        }
        let repr = FieldBytes::clone_from_slice(bytes);
        let s: Option<p256::Scalar> = p256::Scalar::from_repr(repr).into();
        s.ok_or(GroupError::ScalarRange)
    }

    fn scalar_reduce(bytes: &[u8]) -> Self::Scalar {
        debug_assert!(bytes.len() <= 32, "reduce input wider than a SHA-256 digest");
        let mut wide = [0u8; 32];
        let take = bytes.len().min(32);
        wide[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
        <p256::Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(&wide))
    }

    fn scalar_add(a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar {
        a + b
    }

    fn scalar_mul(a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar {
        a * b
    }

    fn scalar_is_zero(s: &Self::Scalar) -> bool {
        bool::from(s.is_zero())
    }

    fn random_scalar<R: CryptoRngCore>(rng: &mut R) -> Self::Scalar {
        loop {
            let s = p256::Scalar::random(&mut *rng);
            if !bool::from(s.is_zero()) {
                return s;
            }
        }
    }
}

// ============================================================================
// RFC 5114 1024-bit MODP group, 160-bit prime-order subgroup
// ============================================================================

const MODP_P_HEX: &str = "B10B8F96A080E01DDE92DE5EAE5D54EC52C99FBCFB06A3C69A6A9DCA52D23B61\
                          6073E28675A23D189838EF1E2EE652C013ECB4AEA9061123\
                          24975C3CD49B83BFACCBDD7D90C4BD7098488E9C219A73724EFFD6FAE5644738\
                          FAA31A4FF55BCCC0A151AF5F0DC8B4BD45BF37DF365C1A65E68CFDA76D4DA708\
                          DF1FB2BC2E4A4371";
const MODP_G_HEX: &str = "A4D1CBD5C3FD34126765A442EFB99905F8104DD258AC507FD6406CFF14266D31\
                          266FEA1E5C41564B777E690F5504F213160217B4B01B886A\
                          5E91547F9E2749F4D7FBD7D3B9A92EE1909D0D2263F80A76A6A24C087A091F53\
                          1DBF0A0169B6A28AD662A4D18E73AFA32D779D5918D08BC8858F4DCEF97C2A24\
                          855E6EEB22B3B2E5";
const MODP_Q_HEX: &str = "F518AA8781A8DF278ABA4E7D64B7CB9D49462353";

/// Seed for deriving the independent second generator `h` mod p.
const MODP_H_SEED: &[u8] = b"zkpauth-v1 modp generator h";

struct ModpParams {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    /// `(p - 1) / q`; raising to this power projects into the subgroup.
    cofactor: BigUint,
}

static MODP_PARAMS: OnceLock<ModpParams> = OnceLock::new();
static MODP_H: OnceLock<BigUint> = OnceLock::new();

fn modp_params() -> &'static ModpParams {
    MODP_PARAMS.get_or_init(|| {
        let p = BigUint::parse_bytes(MODP_P_HEX.as_bytes(), 16).expect("static prime constant");
        let q = BigUint::parse_bytes(MODP_Q_HEX.as_bytes(), 16).expect("static order constant");
        let g = BigUint::parse_bytes(MODP_G_HEX.as_bytes(), 16).expect("static generator constant");
        let cofactor = (&p - 1u32) / &q;
        ModpParams { p, q, g, cofactor }
    })
}

/// The RFC 5114 1024-bit Schnorr group (group 22).
#[derive(Copy, Clone, Debug)]
pub struct Schnorr1024Group;

impl Schnorr1024Group {
    fn derive_h(params: &ModpParams) -> Result<BigUint, GroupError> {
        // Hash a counter stream into a 1024-bit candidate, then project it
        // into the q-order subgroup. Retry until the projection is not 1.
        for ctr in 0u32..64 {
            let mut candidate = Vec::with_capacity(128);
            for block in 0u32..4 {
                let mut hasher = Sha256::new();
                hasher.update(MODP_H_SEED);
                hasher.update(ctr.to_be_bytes());
                hasher.update(block.to_be_bytes());
                candidate.extend_from_slice(&hasher.finalize());
            }
            let t = BigUint::from_bytes_be(&candidate) % &params.p;
            if t <= BigUint::one() {
                continue;
            }
            let h = t.modpow(&params.cofactor, &params.p);
            if !h.is_one() {
                return Ok(h);
            }
        }
        Err(GroupError::Generator("derivation did not converge"))
    }
}

impl Group for Schnorr1024Group {
    type Scalar = BigUint;
    type Element = BigUint;

    const NAME: &'static str = "modp-1024-160";
    const SCALAR_LEN: usize = 20;
    const ELEMENT_LEN: usize = 128;

    fn generator_h() -> Result<Self::Element, GroupError> {
        if let Some(h) = MODP_H.get() {
            return Ok(h.clone());
        }
        let h = Self::derive_h(modp_params())?;
        Ok(MODP_H.get_or_init(|| h).clone())
    }

    fn mul_base(s: &Self::Scalar) -> Self::Element {
        let params = modp_params();
        params.g.modpow(s, &params.p)
    }

    fn mul(p: &Self::Element, s: &Self::Scalar) -> Self::Element {
        p.modpow(s, &modp_params().p)
    }

    fn add(a: &Self::Element, b: &Self::Element) -> Self::Element {
        (a * b) % &modp_params().p
    }

    fn encode(p: &Self::Element) -> Vec<u8> {
        let mut out = vec![0u8; Self::ELEMENT_LEN];
        let raw = p.to_bytes_be();
        out[Self::ELEMENT_LEN - raw.len()..].copy_from_slice(&raw);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self::Element, GroupError> {
        if bytes.len() != Self::ELEMENT_LEN {
            return Err(GroupError::Length { got: bytes.len(), expected: Self::ELEMENT_LEN });
        }
        let params = modp_params();
        let v = BigUint::from_bytes_be(bytes);
        if v.is_zero() || v >= params.p {
            return Err(GroupError::Encoding("value outside [1, p-1]"));
        }
        // 1 is the identity and not an admissible commitment.
        if v.is_one() {
            return Err(GroupError::NotInGroup);
        }
        if !v.modpow(&params.q, &params.p).is_one() {
            return Err(GroupError::NotInGroup);
        }
        Ok(v)
    }

    fn scalar_encode(s: &Self::Scalar) -> Vec<u8> {
        let mut out = vec![0u8; Self::SCALAR_LEN];
        let raw = s.to_bytes_be();
        out[Self::SCALAR_LEN - raw.len()..].copy_from_slice(&raw);
        out
    }

    fn scalar_decode(bytes: &[u8]) -> Result<Self::Scalar, GroupError> {
        if bytes.len() != Self::SCALAR_LEN {
            return Err(GroupError::Length { got: bytes.len(), expected: Self::SCALAR_LEN });
        }
        let v = BigUint::from_bytes_be(bytes);
        if v >= modp_params().q {
            return Err(GroupError::ScalarRange);
        }
        Ok(v)
    }

    fn scalar_reduce(bytes: &[u8]) -> Self::Scalar {
        BigUint::from_bytes_be(bytes) % &modp_params().q
    }

    fn scalar_add(a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar {
        (a + b) % &modp_params().q
    }

    fn scalar_mul(a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar {
        (a * b) % &modp_params().q
    }

    fn scalar_is_zero(s: &Self::Scalar) -> bool {
        s.is_zero()
    }

    fn random_scalar<R: CryptoRngCore>(rng: &mut R) -> Self::Scalar {
        let q = &modp_params().q;
        loop {
            let s = rng.gen_biguint_below(q);
            if !s.is_zero() {
                return s;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn element_roundtrip<G: Group>() {
        let s = G::random_scalar(&mut OsRng);
        let p = G::mul_base(&s);
        let enc = G::encode(&p);
        assert_eq!(enc.len(), G::ELEMENT_LEN);
        let back = G::decode(&enc).unwrap();
        assert!(G::ct_eq(&p, &back));
    }

    fn scalar_roundtrip<G: Group>() {
        let s = G::random_scalar(&mut OsRng);
        let enc = G::scalar_encode(&s);
        assert_eq!(enc.len(), G::SCALAR_LEN);
        assert_eq!(G::scalar_decode(&enc).unwrap(), s);
    }

    fn h_is_independent<G: Group>() {
        let h = G::generator_h().unwrap();
        // h must be a decodable group member distinct from g.
        let enc = G::encode(&h);
        assert!(G::decode(&enc).is_ok());
        let one = G::scalar_reduce(&[1]);
        let g = G::mul_base(&one);
        assert!(!G::ct_eq(&g, &h));
    }

    fn decode_rejects_garbage<G: Group>() {
        assert!(matches!(G::decode(&[]), Err(GroupError::Length { .. })));
        let junk = vec![0u8; G::ELEMENT_LEN];
        assert!(G::decode(&junk).is_err());
        let mut almost = G::encode(&G::mul_base(&G::random_scalar(&mut OsRng)));
        almost.pop();
        assert!(G::decode(&almost).is_err());
    }

    fn reduce_matches_decode<G: Group>() {
        // A one-byte big-endian integer reduces to the same scalar the
        // fixed-width decoder produces.
        let mut wide = vec![0u8; G::SCALAR_LEN];
        wide[G::SCALAR_LEN - 1] = 7;
        assert_eq!(G::scalar_reduce(&[7]), G::scalar_decode(&wide).unwrap());
    }

    #[test]
    fn p256_element_roundtrip() {
        element_roundtrip::<P256Group>();
    }

    #[test]
    fn p256_scalar_roundtrip() {
        scalar_roundtrip::<P256Group>();
    }

    #[test]
    fn p256_h_is_independent() {
        h_is_independent::<P256Group>();
    }

    #[test]
    fn p256_decode_rejects_garbage() {
        decode_rejects_garbage::<P256Group>();
    }

    #[test]
    fn p256_decode_rejects_compressed_points() {
        let s = P256Group::random_scalar(&mut OsRng);
        let p = P256Group::mul_base(&s);
        let compressed = p.to_affine().to_encoded_point(true);
        assert!(P256Group::decode(compressed.as_bytes()).is_err());
    }

    #[test]
    fn p256_reduce_matches_decode() {
        reduce_matches_decode::<P256Group>();
    }

    #[test]
    fn modp_element_roundtrip() {
        element_roundtrip::<Schnorr1024Group>();
    }

    #[test]
    fn modp_scalar_roundtrip() {
        scalar_roundtrip::<Schnorr1024Group>();
    }

    #[test]
    fn modp_h_is_independent() {
        h_is_independent::<Schnorr1024Group>();
    }

    #[test]
    fn modp_decode_rejects_garbage() {
        decode_rejects_garbage::<Schnorr1024Group>();
    }

    #[test]
    fn modp_decode_rejects_non_subgroup_values() {
        // 2 generates the full (Z/pZ)* here, not the q-order subgroup.
        let mut enc = vec![0u8; Schnorr1024Group::ELEMENT_LEN];
        enc[Schnorr1024Group::ELEMENT_LEN - 1] = 2;
        assert_eq!(Schnorr1024Group::decode(&enc), Err(GroupError::NotInGroup));
    }

    #[test]
    fn modp_reduce_matches_decode() {
        reduce_matches_decode::<Schnorr1024Group>();
    }

    #[test]
    fn modp_generators_are_subgroup_members() {
        let params = modp_params();
        assert!(params.g.modpow(&params.q, &params.p).is_one());
        let h = Schnorr1024Group::generator_h().unwrap();
        assert!(h.modpow(&params.q, &params.p).is_one());
    }
}
