//! Chaum–Pedersen discrete-log-equality engine
//!
//! The prover holds a secret scalar `x` and has registered the public
//! commitments `y1 = g*x`, `y2 = h*x`. A login run is the classic
//! three-message sigma protocol:
//!
//! 1. the prover samples a fresh nonce `r` and sends `r1 = g*r`, `r2 = h*r`;
//! 2. the verifier derives the challenge `c = SHA-256(r1 || r2) mod q`;
//! 3. the prover answers `s = (r + c*x) mod q`.
//!
//! The verifier accepts iff `g*s == r1 + c*y1` and `h*s == r2 + c*y2`.
//! With an honest `s` both sides expand to `g*(r + c*x)`, so honest runs
//! always verify; forging `s` without `x` breaks the discrete log of the
//! group. The challenge derivation is deterministic, so both parties can
//! recompute it from the wire bytes alone; both sides of a deployment must
//! use the same group configuration and the same response equation.
//!
//! Everything in this module is a pure function over its inputs plus the
//! caller-supplied RNG. Nothing blocks, nothing touches global state, and
//! concurrent invocation is safe.

#![forbid(unsafe_code)]

use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};

use crate::group::{Group, GroupError};

/// Errors surfaced by the proof engine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A scalar input violated its precondition (zero or out of range).
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A group element failed to decode or validate.
    #[error(transparent)]
    Group(#[from] GroupError),
}

/// The ephemeral secret sampled by [`prover_commitment`].
///
/// A nonce can only be spent by moving it into [`solve_challenge`], which
/// enforces the use-exactly-once discipline at the type level.
pub struct Nonce<G: Group>(G::Scalar);

/// The prover's first message plus its secret nonce.
pub struct ProverCommitment<G: Group> {
    /// Canonical bytes of `g*r`.
    pub r1: Vec<u8>,
    /// Canonical bytes of `h*r`.
    pub r2: Vec<u8>,
    /// The secret `r`; consumed when the challenge is answered.
    pub nonce: Nonce<G>,
}

/// Compute the registration commitments `(g*x, h*x)` as canonical bytes.
///
/// Fails with `InvalidInput` when `x == 0` (a zero secret would make both
/// commitments the identity and the proof vacuous).
pub fn public_commitments<G: Group>(x: &G::Scalar) -> Result<(Vec<u8>, Vec<u8>), ProtocolError> {
    if G::scalar_is_zero(x) {
        return Err(ProtocolError::InvalidInput("secret scalar is zero"));
    }
    let h = G::generator_h()?;
    let y1 = G::mul_base(x);
    let y2 = G::mul(&h, x);
    Ok((G::encode(&y1), G::encode(&y2)))
}

/// Sample a fresh nonce `r` from `[1, q-1]` and commit to it.
///
/// The commitments travel to the verifier; the nonce stays with the caller
/// and must never be used for a second run.
pub fn prover_commitment<G: Group, R: CryptoRngCore>(
    rng: &mut R,
) -> Result<ProverCommitment<G>, ProtocolError> {
    let h = G::generator_h()?;
    let r = G::random_scalar(rng);
    let r1 = G::mul_base(&r);
    let r2 = G::mul(&h, &r);
    Ok(ProverCommitment { r1: G::encode(&r1), r2: G::encode(&r2), nonce: Nonce(r) })
}

/// Derive the challenge `c = SHA-256(r1 || r2) mod q` from the wire bytes
/// of the prover commitments, big-endian.
///
/// The reduction lands on zero only with negligible probability; if it
/// does, the digest is re-derived over `r1 || r2 || counter` until a
/// nonzero scalar comes out, so the returned challenge is never zero.
pub fn challenge<G: Group>(r1: &[u8], r2: &[u8]) -> G::Scalar {
    let mut hasher = Sha256::new();
    hasher.update(r1);
    hasher.update(r2);
    let c = G::scalar_reduce(&hasher.finalize());
    if !G::scalar_is_zero(&c) {
        return c;
    }
    let mut ctr = 1u64;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(r1);
        hasher.update(r2);
        hasher.update(ctr.to_be_bytes());
        let c = G::scalar_reduce(&hasher.finalize());
        if !G::scalar_is_zero(&c) {
            return c;
        }
        ctr += 1;
    }
}

/// Answer a challenge: `s = (r + c*x) mod q`, consuming the nonce.
///
/// Fails with `InvalidInput` when `x == 0` or `r == 0`.
pub fn solve_challenge<G: Group>(
    x: &G::Scalar,
    nonce: Nonce<G>,
    c: &G::Scalar,
) -> Result<G::Scalar, ProtocolError> {
    if G::scalar_is_zero(x) {
        return Err(ProtocolError::InvalidInput("secret scalar is zero"));
    }
    let Nonce(r) = nonce;
    if G::scalar_is_zero(&r) {
        return Err(ProtocolError::InvalidInput("nonce is zero"));
    }
    Ok(G::scalar_add(&r, &G::scalar_mul(c, x)))
}

/// The verification predicate.
///
/// Decodes all four elements strictly (any malformed or out-of-group input
/// rejects) and checks `g*s == r1 + c*y1` and `h*s == r2 + c*y2` with
/// constant-time element comparisons.
pub fn verify<G: Group>(
    y1: &[u8],
    y2: &[u8],
    r1: &[u8],
    r2: &[u8],
    s: &G::Scalar,
    c: &G::Scalar,
) -> bool {
    let (Ok(y1), Ok(y2), Ok(r1), Ok(r2)) =
        (G::decode(y1), G::decode(y2), G::decode(r1), G::decode(r2))
    else {
        return false;
    };
    let Ok(h) = G::generator_h() else {
        return false;
    };
    let lhs1 = G::mul_base(s);
    let rhs1 = G::add(&r1, &G::mul(&y1, c));
    let lhs2 = G::mul(&h, s);
    let rhs2 = G::add(&r2, &G::mul(&y2, c));
    G::ct_eq(&lhs1, &rhs1) & G::ct_eq(&lhs2, &rhs2)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{P256Group, Schnorr1024Group};
    use rand::rngs::OsRng;

    fn honest_run<G: Group>() -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>, G::Scalar, G::Scalar) {
        let x = G::random_scalar(&mut OsRng);
        let (y1, y2) = public_commitments::<G>(&x).unwrap();
        let commit = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let c = challenge::<G>(&commit.r1, &commit.r2);
        let s = solve_challenge::<G>(&x, commit.nonce, &c).unwrap();
        (y1, y2, commit.r1, commit.r2, s, c)
    }

    fn honest_transcript_verifies<G: Group>() {
        let (y1, y2, r1, r2, s, c) = honest_run::<G>();
        assert!(verify::<G>(&y1, &y2, &r1, &r2, &s, &c));
    }

    fn tampering_breaks_verification<G: Group>() {
        let (y1, y2, r1, r2, s, c) = honest_run::<G>();

        // Flip a byte in each commitment in turn.
        for idx in [&y1, &y2, &r1, &r2].into_iter().enumerate() {
            let (which, orig) = idx;
            let mut bent = orig.clone();
            *bent.last_mut().unwrap() ^= 1;
            let inputs: Vec<&[u8]> = (0..4)
                .map(|i| {
                    if i == which {
                        bent.as_slice()
                    } else {
                        [&y1, &y2, &r1, &r2][i].as_slice()
                    }
                })
                .collect();
            assert!(
                !verify::<G>(inputs[0], inputs[1], inputs[2], inputs[3], &s, &c),
                "tampered element {which} still verified"
            );
        }

        // Perturb the scalars.
        let one = G::scalar_reduce(&[1]);
        let s_bad = G::scalar_add(&s, &one);
        assert!(!verify::<G>(&y1, &y2, &r1, &r2, &s_bad, &c));
        let c_bad = G::scalar_add(&c, &one);
        assert!(!verify::<G>(&y1, &y2, &r1, &r2, &s, &c_bad));
    }

    fn wrong_secret_fails<G: Group>() {
        // The transcript is self-consistent for x', but the registered
        // commitments belong to x.
        let x = G::random_scalar(&mut OsRng);
        let x_wrong = G::random_scalar(&mut OsRng);
        let (y1, y2) = public_commitments::<G>(&x).unwrap();
        let commit = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let c = challenge::<G>(&commit.r1, &commit.r2);
        let s = solve_challenge::<G>(&x_wrong, commit.nonce, &c).unwrap();
        assert!(!verify::<G>(&y1, &y2, &commit.r1, &commit.r2, &s, &c));
    }

    #[test]
    fn p256_honest_transcript_verifies() {
        honest_transcript_verifies::<P256Group>();
    }

    #[test]
    fn p256_tampering_breaks_verification() {
        tampering_breaks_verification::<P256Group>();
    }

    #[test]
    fn p256_wrong_secret_fails() {
        wrong_secret_fails::<P256Group>();
    }

    #[test]
    fn modp_honest_transcript_verifies() {
        honest_transcript_verifies::<Schnorr1024Group>();
    }

    #[test]
    fn modp_tampering_breaks_verification() {
        tampering_breaks_verification::<Schnorr1024Group>();
    }

    #[test]
    fn modp_wrong_secret_fails() {
        wrong_secret_fails::<Schnorr1024Group>();
    }

    #[test]
    fn challenge_is_deterministic_and_nonzero() {
        let commit = prover_commitment::<P256Group, _>(&mut OsRng).unwrap();
        let a = challenge::<P256Group>(&commit.r1, &commit.r2);
        let b = challenge::<P256Group>(&commit.r1, &commit.r2);
        assert_eq!(a, b);
        assert!(!P256Group::scalar_is_zero(&a));

        // The derivation is exactly SHA-256 over the concatenated bytes.
        let mut hasher = Sha256::new();
        hasher.update(&commit.r1);
        hasher.update(&commit.r2);
        let manual = P256Group::scalar_reduce(&hasher.finalize());
        assert_eq!(a, manual);
    }

    #[test]
    fn challenge_order_matters() {
        let commit = prover_commitment::<P256Group, _>(&mut OsRng).unwrap();
        let ab = challenge::<P256Group>(&commit.r1, &commit.r2);
        let ba = challenge::<P256Group>(&commit.r2, &commit.r1);
        assert_ne!(ab, ba);
    }

    #[test]
    fn zero_secret_is_rejected() {
        let zero = P256Group::scalar_reduce(&[0]);
        assert_eq!(
            public_commitments::<P256Group>(&zero),
            Err(ProtocolError::InvalidInput("secret scalar is zero"))
        );
        let commit = prover_commitment::<P256Group, _>(&mut OsRng).unwrap();
        let c = challenge::<P256Group>(&commit.r1, &commit.r2);
        assert!(solve_challenge::<P256Group>(&zero, commit.nonce, &c).is_err());
    }

    #[test]
    fn verify_rejects_undecodable_inputs() {
        let (y1, y2, r1, r2, s, c) = honest_run::<P256Group>();
        assert!(!verify::<P256Group>(&[], &y2, &r1, &r2, &s, &c));
        let junk = vec![0u8; P256Group::ELEMENT_LEN];
        assert!(!verify::<P256Group>(&junk, &y2, &r1, &r2, &s, &c));
        assert!(!verify::<P256Group>(&y1, &y2, &r1, &junk, &s, &c));
    }
}
