//! Crate root: public surface, canonical aliases, and protocol-wide invariants
//!
//! `zkpauth` is a zero-knowledge password authentication system built on the
//! Chaum–Pedersen proof of discrete-log equality across two bases. A client
//! (the prover) convinces a server (the verifier) that it knows the secret
//! scalar `x` behind the registered commitments `y1 = g*x`, `y2 = h*x`
//! without ever sending `x`, in three messages: commitment, challenge,
//! response.
//!
//! ## Invariants
//!
//! - **Group discipline.** All protocol values live in a prime-order group
//!   with two independent generators; the engine is generic over the
//!   [`group::Group`] trait and the shipped binaries pin [`DefaultGroup`]
//!   (NIST P-256). Encodings are canonical: equality of elements is
//!   equality of their encoded bytes, and decoding rejects anything that is
//!   not a group member. We **forbid unsafe** throughout the crate.
//! - **Challenge derivation.** Both sides derive `c = SHA-256(r1 || r2)
//!   mod q` from the wire bytes of the prover commitments, so transcripts
//!   are deterministic given the commitments and `c` is never zero.
//! - **One challenge per user.** The verifier holds at most one
//!   outstanding challenge per user; a newer challenge displaces the older
//!   one, and an answer consumes the challenge whatever the outcome.
//! - **Masked denials.** At the public boundary every denial reads the
//!   same; the precise reason survives only in server-side logs.
//!
//! The wire protocol is three request/response operations; see
//! [`transport`] for the shapes and [`config`] for the deployment knobs.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

use rand::{rngs::OsRng, RngCore};

/// Prime-order group abstraction (P-256 and RFC 5114 mod-p variants).
pub mod group;
/// The Chaum–Pedersen commit/challenge/response engine.
pub mod protocol;
/// Prover- and verifier-side user stores.
pub mod store;
/// Verifier session engine (register / challenge / verify).
pub mod verifier;
/// Prover session engine (register / login orchestration).
pub mod prover;
/// Typed transport boundary, wire shapes, HTTP and in-process carriers.
pub mod transport;
/// Environment-based process configuration.
pub mod config;

// ============================================================================
// Canonical aliases and root-level re-exports
// ============================================================================

/// The group configuration the shipped binaries speak on the wire.
///
/// Changing this alias changes the wire contract; prover and verifier must
/// be built against the same choice.
pub type DefaultGroup = group::P256Group;

pub use crate::group::{Group, GroupError};
pub use crate::protocol::ProtocolError;
pub use crate::prover::{ProverEngine, ProverError};
pub use crate::store::{MemoryProverStore, MemoryVerifierStore, ProverStore, VerifierStore};
pub use crate::transport::{AuthTransport, HttpTransport, TransportError};
pub use crate::verifier::{AuthError, VerifierEngine};

/// Probe the OS entropy source once, eagerly.
///
/// Both binaries call this before serving: secrets and nonces are drawn
/// from [`rand::rngs::OsRng`] for the life of the process, and a machine
/// that cannot produce randomness must refuse to start rather than limp.
pub fn ensure_entropy() -> anyhow::Result<()> {
    let mut probe = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut probe)
        .map_err(|e| anyhow::anyhow!("OS entropy source unavailable: {e}"))
}
