//! Verifier session engine
//!
//! Owns the server-side state machine across the three operations:
//!
//! - `register` creates a user record holding the public commitments;
//! - `create_challenge` stores the prover commitments, derives the
//!   challenge, and hands back an opaque authentication id;
//! - `verify_answer` resolves the id, consumes the outstanding challenge,
//!   and checks the response.
//!
//! Per user there is at most one outstanding challenge: a later
//! `create_challenge` overwrites the earlier triple and invalidates the
//! earlier authentication id. A challenge is consumed by the first
//! `verify_answer` that reaches it, whatever the outcome, so a transcript
//! can never be replayed against the same challenge.
//!
//! The authentication id returned to the wire is a random 128-bit token
//! rather than the user name, so the wire never echoes the identity back.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::RwLock;

use rand::{rngs::OsRng, RngCore};

use crate::group::{Group, GroupError};
use crate::protocol;
use crate::store::{StoreError, VerifierStore};

/// The error taxonomy of the authentication core.
///
/// `UnknownUser`, `NotChallenged`, `UnknownSession` and `AuthFailed` stay
/// distinguishable here for logging; the public boundary collapses them
/// into one generic denial (see [`AuthError::public_kind`]).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed or out-of-range input; nothing was mutated.
    #[error(transparent)]
    InvalidInput(#[from] GroupError),
    /// No record for the user.
    #[error("unknown user")]
    UnknownUser,
    /// Registration hit an existing record.
    #[error("user already registered")]
    AlreadyExists,
    /// An answer arrived while no challenge was outstanding.
    #[error("no outstanding challenge")]
    NotChallenged,
    /// The authentication id is unknown or no longer current.
    #[error("unknown or expired authentication id")]
    UnknownSession,
    /// The verification equation does not hold.
    #[error("verification failed")]
    AuthFailed,
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists => AuthError::AlreadyExists,
            StoreError::UnknownUser => AuthError::UnknownUser,
            StoreError::NotChallenged => AuthError::NotChallenged,
        }
    }
}

/// How an [`AuthError`] surfaces at the public boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PublicErrorKind {
    /// Malformed request; safe to describe.
    BadRequest,
    /// Generic denial; the precise reason stays server-side.
    Denied,
    /// Duplicate registration.
    Conflict,
}

impl AuthError {
    /// Collapse the taxonomy for the wire. User-enumeration relevant
    /// variants all map to `Denied` with one shared message.
    pub fn public_kind(&self) -> PublicErrorKind {
        match self {
            AuthError::InvalidInput(_) => PublicErrorKind::BadRequest,
            AuthError::AlreadyExists => PublicErrorKind::Conflict,
            AuthError::UnknownUser
            | AuthError::NotChallenged
            | AuthError::UnknownSession
            | AuthError::AuthFailed => PublicErrorKind::Denied,
        }
    }
}

/// The one message every denial shows to the outside.
pub const DENIED_MESSAGE: &str = "authentication failed";

/// Hex token with `n` bytes of OS entropy.
///
/// The RNG is probed at process start ([`crate::ensure_entropy`]); a
/// failure to draw randomness afterwards aborts rather than degrades.
fn random_token(n: usize) -> String {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

#[derive(Default)]
struct AuthIndex {
    by_id: HashMap<String, String>,
    by_user: HashMap<String, String>,
}

impl AuthIndex {
    /// Register `auth_id` as the only current id for `user`.
    fn put(&mut self, auth_id: String, user: String) {
        if let Some(stale) = self.by_user.insert(user.clone(), auth_id.clone()) {
            self.by_id.remove(&stale);
        }
        self.by_id.insert(auth_id, user);
    }

    /// Resolve and consume an id.
    fn take(&mut self, auth_id: &str) -> Option<String> {
        let user = self.by_id.remove(auth_id)?;
        if self.by_user.get(&user).is_some_and(|id| id.as_str() == auth_id) {
            self.by_user.remove(&user);
        }
        Some(user)
    }
}

/// The verifier-side engine, generic over the group and the record store.
pub struct VerifierEngine<G: Group, S: VerifierStore<G>> {
    store: S,
    index: RwLock<AuthIndex>,
    _group: PhantomData<G>,
}

impl<G: Group, S: VerifierStore<G>> VerifierEngine<G, S> {
    /// Wrap a record store.
    pub fn new(store: S) -> Self {
        Self { store, index: RwLock::new(AuthIndex::default()), _group: PhantomData }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create the record for `user` from the registered commitments.
    ///
    /// Both commitments must decode as group members; a duplicate user
    /// fails with `AlreadyExists` and leaves the existing record intact.
    pub fn register(&self, user: &str, y1: &[u8], y2: &[u8]) -> Result<(), AuthError> {
        G::decode(y1)?;
        G::decode(y2)?;
        self.store.add_user(user, y1.to_vec(), y2.to_vec())?;
        Ok(())
    }

    /// Store the prover commitments, derive the challenge, and issue an
    /// authentication id for the answer leg.
    ///
    /// A second call for the same user overwrites the first challenge and
    /// invalidates its authentication id.
    pub fn create_challenge(
        &self,
        user: &str,
        r1: &[u8],
        r2: &[u8],
    ) -> Result<(String, Vec<u8>), AuthError> {
        G::decode(r1)?;
        G::decode(r2)?;
        let c = protocol::challenge::<G>(r1, r2);
        let c_bytes = G::scalar_encode(&c);
        self.store.upsert_challenge(user, r1.to_vec(), r2.to_vec(), c)?;

        let auth_id = random_token(16);
        let mut index = self.index.write().expect("auth index lock poisoned");
        index.put(auth_id.clone(), user.to_owned());
        Ok((auth_id, c_bytes))
    }

    /// Check an answer against the outstanding challenge.
    ///
    /// The challenge is consumed on every outcome except a malformed `s`
    /// (which mutates nothing). Success yields a fresh session identifier
    /// with 256 bits of entropy.
    pub fn verify_answer(&self, auth_id: &str, s: &[u8]) -> Result<String, AuthError> {
        let s = G::scalar_decode(s)?;

        let user = {
            let mut index = self.index.write().expect("auth index lock poisoned");
            index.take(auth_id).ok_or(AuthError::UnknownSession)?
        };
        let taken = self.store.take_challenge(&user)?;

        let ok = protocol::verify::<G>(&taken.y1, &taken.y2, &taken.r1, &taken.r2, &s, &taken.c);
        if ok {
            Ok(random_token(32))
        } else {
            Err(AuthError::AuthFailed)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::P256Group;
    use crate::protocol::{prover_commitment, public_commitments, solve_challenge};
    use crate::store::{ChallengeState, MemoryVerifierStore};
    use rand::rngs::OsRng;

    type G = P256Group;
    type Engine = VerifierEngine<G, MemoryVerifierStore<G>>;

    fn engine() -> Engine {
        VerifierEngine::new(MemoryVerifierStore::new())
    }

    fn registered(engine: &Engine, user: &str) -> <G as Group>::Scalar {
        let x = G::random_scalar(&mut OsRng);
        let (y1, y2) = public_commitments::<G>(&x).unwrap();
        engine.register(user, &y1, &y2).unwrap();
        x
    }

    /// Drive one full login round against the engine.
    fn login(engine: &Engine, user: &str, x: &<G as Group>::Scalar) -> Result<String, AuthError> {
        let commit = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let (auth_id, c_bytes) = engine.create_challenge(user, &commit.r1, &commit.r2)?;
        let c = G::scalar_reduce(&c_bytes);
        let s = solve_challenge::<G>(x, commit.nonce, &c).unwrap();
        engine.verify_answer(&auth_id, &G::scalar_encode(&s))
    }

    #[test]
    fn happy_path_yields_session_id() {
        let engine = engine();
        let x = registered(&engine, "alice");
        let session = login(&engine, "alice", &x).unwrap();
        assert_eq!(session.len(), 64);
        assert!(session.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn registration_creates_quiescent_record() {
        let engine = engine();
        registered(&engine, "alice");
        let record = engine.store().get_user("alice").unwrap();
        assert!(matches!(record.state, ChallengeState::Registered));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let engine = engine();
        registered(&engine, "alice");
        let before = engine.store().get_user("alice").unwrap();

        let x2 = G::random_scalar(&mut OsRng);
        let (y1, y2) = public_commitments::<G>(&x2).unwrap();
        assert_eq!(engine.register("alice", &y1, &y2), Err(AuthError::AlreadyExists));

        // Stored commitments are untouched.
        let after = engine.store().get_user("alice").unwrap();
        assert_eq!(before.y1, after.y1);
        assert_eq!(before.y2, after.y2);
    }

    #[test]
    fn register_rejects_malformed_commitments() {
        let engine = engine();
        let x = G::random_scalar(&mut OsRng);
        let (y1, _) = public_commitments::<G>(&x).unwrap();
        assert!(matches!(
            engine.register("alice", &y1, &[0u8; 65]),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(!engine.store().check_user("alice"));
    }

    #[test]
    fn challenge_for_unknown_user_fails() {
        let engine = engine();
        let commit = prover_commitment::<G, _>(&mut OsRng).unwrap();
        assert_eq!(
            engine.create_challenge("bob", &commit.r1, &commit.r2),
            Err(AuthError::UnknownUser)
        );
    }

    #[test]
    fn wrong_secret_is_denied() {
        let engine = engine();
        registered(&engine, "alice");
        let wrong = G::random_scalar(&mut OsRng);
        assert_eq!(login(&engine, "alice", &wrong), Err(AuthError::AuthFailed));
    }

    #[test]
    fn tampered_answer_is_denied() {
        let engine = engine();
        let x = registered(&engine, "alice");
        let commit = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let (auth_id, c_bytes) = engine.create_challenge("alice", &commit.r1, &commit.r2).unwrap();
        let c = G::scalar_reduce(&c_bytes);
        let s = solve_challenge::<G>(&x, commit.nonce, &c).unwrap();
        let mut s_bytes = G::scalar_encode(&s);
        s_bytes[G::SCALAR_LEN - 1] ^= 1;
        let got = engine.verify_answer(&auth_id, &s_bytes);
        assert!(matches!(got, Err(AuthError::AuthFailed) | Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn malformed_answer_does_not_consume_the_challenge() {
        let engine = engine();
        let x = registered(&engine, "alice");
        let commit = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let (auth_id, c_bytes) = engine.create_challenge("alice", &commit.r1, &commit.r2).unwrap();

        assert!(matches!(
            engine.verify_answer(&auth_id, b"short"),
            Err(AuthError::InvalidInput(_))
        ));

        // The challenge is still live and the honest answer still lands.
        let c = G::scalar_reduce(&c_bytes);
        let s = solve_challenge::<G>(&x, commit.nonce, &c).unwrap();
        engine.verify_answer(&auth_id, &G::scalar_encode(&s)).unwrap();
    }

    #[test]
    fn answer_cannot_be_replayed() {
        let engine = engine();
        let x = registered(&engine, "alice");
        let commit = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let (auth_id, c_bytes) = engine.create_challenge("alice", &commit.r1, &commit.r2).unwrap();
        let c = G::scalar_reduce(&c_bytes);
        let s = solve_challenge::<G>(&x, commit.nonce, &c).unwrap();
        let s_bytes = G::scalar_encode(&s);

        engine.verify_answer(&auth_id, &s_bytes).unwrap();
        assert_eq!(engine.verify_answer(&auth_id, &s_bytes), Err(AuthError::UnknownSession));
    }

    #[test]
    fn newer_challenge_invalidates_the_older_one() {
        let engine = engine();
        let x = registered(&engine, "alice");

        let first = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let (id1, c1_bytes) = engine.create_challenge("alice", &first.r1, &first.r2).unwrap();

        let second = prover_commitment::<G, _>(&mut OsRng).unwrap();
        let (id2, c2_bytes) = engine.create_challenge("alice", &second.r1, &second.r2).unwrap();
        assert_ne!(id1, id2);

        // The first login run lost its challenge.
        let c1 = G::scalar_reduce(&c1_bytes);
        let s1 = solve_challenge::<G>(&x, first.nonce, &c1).unwrap();
        assert_eq!(
            engine.verify_answer(&id1, &G::scalar_encode(&s1)),
            Err(AuthError::UnknownSession)
        );

        // The second one still completes.
        let c2 = G::scalar_reduce(&c2_bytes);
        let s2 = solve_challenge::<G>(&x, second.nonce, &c2).unwrap();
        engine.verify_answer(&id2, &G::scalar_encode(&s2)).unwrap();
    }

    #[test]
    fn denial_variants_share_the_public_kind() {
        for err in [
            AuthError::UnknownUser,
            AuthError::NotChallenged,
            AuthError::UnknownSession,
            AuthError::AuthFailed,
        ] {
            assert_eq!(err.public_kind(), PublicErrorKind::Denied);
        }
        assert_eq!(
            AuthError::InvalidInput(GroupError::ScalarRange).public_kind(),
            PublicErrorKind::BadRequest
        );
        assert_eq!(AuthError::AlreadyExists.public_kind(), PublicErrorKind::Conflict);
    }
}
