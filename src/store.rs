//! User stores
//!
//! Two narrow key/value abstractions, both keyed by user name:
//!
//! - [`ProverStore`]: the client-side credential store, mapping a user to
//!   the derived secret bytes persisted at registration.
//! - [`VerifierStore`]: the server-side record store, mapping a user to the
//!   registered commitments plus the per-session challenge state.
//!
//! The verifier-side challenge state is a tagged variant rather than a bag
//! of optional fields, and the trait exposes compound operations
//! (`upsert_challenge`, `take_challenge`) instead of check-then-update
//! pairs, so a caller can never observe a torn `(r1, r2, c)` triple.
//!
//! The in-memory implementations guard a `HashMap` with a single `RwLock`
//! per store. Swapping in a durable backend only requires honoring the
//! same atomicity contracts.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::RwLock;

use zeroize::Zeroizing;

use crate::group::Group;

/// Store lookup and insertion failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// Insertion hit an existing record.
    #[error("user already exists")]
    AlreadyExists,
    /// Lookup found no record.
    #[error("user does not exist")]
    UnknownUser,
    /// The record exists but holds no outstanding challenge.
    #[error("no outstanding challenge for user")]
    NotChallenged,
}

/// Per-user challenge state on the verifier side.
///
/// `Registered` is the rest state; `Challenged` holds the triple written by
/// the most recent challenge creation. At most one challenge is outstanding
/// per user, so issuing a new one overwrites the variant wholesale.
#[derive(Clone, Debug)]
pub enum ChallengeState<G: Group> {
    /// No challenge outstanding.
    Registered,
    /// A challenge is outstanding and awaiting an answer.
    Challenged {
        /// Canonical bytes of the prover commitment `g*r`.
        r1: Vec<u8>,
        /// Canonical bytes of the prover commitment `h*r`.
        r2: Vec<u8>,
        /// The challenge scalar derived from the commitments.
        c: G::Scalar,
    },
}

/// The verifier's record for one registered user.
#[derive(Clone, Debug)]
pub struct VerifierRecord<G: Group> {
    /// Canonical bytes of the registered commitment `g*x`.
    pub y1: Vec<u8>,
    /// Canonical bytes of the registered commitment `h*x`.
    pub y2: Vec<u8>,
    /// Challenge state; starts out `Registered`.
    pub state: ChallengeState<G>,
}

/// A consistent snapshot of an outstanding challenge, removed from the
/// record as it is read.
pub struct TakenChallenge<G: Group> {
    /// Registered commitment bytes.
    pub y1: Vec<u8>,
    /// Registered commitment bytes.
    pub y2: Vec<u8>,
    /// Prover commitment bytes stored with the challenge.
    pub r1: Vec<u8>,
    /// Prover commitment bytes stored with the challenge.
    pub r2: Vec<u8>,
    /// The stored challenge scalar.
    pub c: G::Scalar,
}

/// Client-side credential store.
pub trait ProverStore: Send + Sync {
    /// Persist the secret bytes for a new user.
    fn add_user(&self, user: &str, secret: &[u8]) -> Result<(), StoreError>;
    /// Fetch the secret bytes for a user.
    fn get_user(&self, user: &str) -> Result<Zeroizing<Vec<u8>>, StoreError>;
}

/// Server-side record store.
pub trait VerifierStore<G: Group>: Send + Sync {
    /// Create the record for a new user in the `Registered` state.
    fn add_user(&self, user: &str, y1: Vec<u8>, y2: Vec<u8>) -> Result<(), StoreError>;

    /// Atomically replace the user's challenge state with the given triple.
    ///
    /// Concurrent calls for the same user serialize; the last writer wins
    /// and earlier triples are discarded.
    fn upsert_challenge(
        &self,
        user: &str,
        r1: Vec<u8>,
        r2: Vec<u8>,
        c: G::Scalar,
    ) -> Result<(), StoreError>;

    /// Atomically read the outstanding challenge together with the
    /// registered commitments and reset the state to `Registered`.
    fn take_challenge(&self, user: &str) -> Result<TakenChallenge<G>, StoreError>;

    /// Snapshot the full record.
    fn get_user(&self, user: &str) -> Result<VerifierRecord<G>, StoreError>;

    /// Whether a record exists.
    fn check_user(&self, user: &str) -> bool;
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Process-local [`ProverStore`].
#[derive(Default)]
pub struct MemoryProverStore {
    users: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryProverStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProverStore for MemoryProverStore {
    fn add_user(&self, user: &str, secret: &[u8]) -> Result<(), StoreError> {
        let mut users = self.users.write().expect("prover store lock poisoned");
        if users.contains_key(user) {
            return Err(StoreError::AlreadyExists);
        }
        users.insert(user.to_owned(), Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn get_user(&self, user: &str) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        let users = self.users.read().expect("prover store lock poisoned");
        users.get(user).cloned().ok_or(StoreError::UnknownUser)
    }
}

/// Process-local [`VerifierStore`].
pub struct MemoryVerifierStore<G: Group> {
    users: RwLock<HashMap<String, VerifierRecord<G>>>,
}

impl<G: Group> Default for MemoryVerifierStore<G> {
    fn default() -> Self {
        Self { users: RwLock::new(HashMap::new()) }
    }
}

impl<G: Group> MemoryVerifierStore<G> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<G: Group> VerifierStore<G> for MemoryVerifierStore<G> {
    fn add_user(&self, user: &str, y1: Vec<u8>, y2: Vec<u8>) -> Result<(), StoreError> {
        let mut users = self.users.write().expect("verifier store lock poisoned");
        if users.contains_key(user) {
            return Err(StoreError::AlreadyExists);
        }
        users.insert(user.to_owned(), VerifierRecord { y1, y2, state: ChallengeState::Registered });
        Ok(())
    }

    fn upsert_challenge(
        &self,
        user: &str,
        r1: Vec<u8>,
        r2: Vec<u8>,
        c: G::Scalar,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().expect("verifier store lock poisoned");
        let record = users.get_mut(user).ok_or(StoreError::UnknownUser)?;
        record.state = ChallengeState::Challenged { r1, r2, c };
        Ok(())
    }

    fn take_challenge(&self, user: &str) -> Result<TakenChallenge<G>, StoreError> {
        let mut users = self.users.write().expect("verifier store lock poisoned");
        let record = users.get_mut(user).ok_or(StoreError::UnknownUser)?;
        match std::mem::replace(&mut record.state, ChallengeState::Registered) {
            ChallengeState::Registered => Err(StoreError::NotChallenged),
            ChallengeState::Challenged { r1, r2, c } => Ok(TakenChallenge {
                y1: record.y1.clone(),
                y2: record.y2.clone(),
                r1,
                r2,
                c,
            }),
        }
    }

    fn get_user(&self, user: &str) -> Result<VerifierRecord<G>, StoreError> {
        let users = self.users.read().expect("verifier store lock poisoned");
        users.get(user).cloned().ok_or(StoreError::UnknownUser)
    }

    fn check_user(&self, user: &str) -> bool {
        let users = self.users.read().expect("verifier store lock poisoned");
        users.contains_key(user)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::P256Group;
    use std::sync::Arc;

    type Store = MemoryVerifierStore<P256Group>;

    fn scalar(n: u8) -> <P256Group as Group>::Scalar {
        P256Group::scalar_reduce(&[n])
    }

    #[test]
    fn prover_store_add_and_get() {
        let store = MemoryProverStore::new();
        store.add_user("alice", b"secret").unwrap();
        assert_eq!(store.get_user("alice").unwrap().as_slice(), b"secret");
        assert_eq!(store.add_user("alice", b"other"), Err(StoreError::AlreadyExists));
        assert!(matches!(store.get_user("bob"), Err(StoreError::UnknownUser)));
        // The original secret survives the rejected second insert.
        assert_eq!(store.get_user("alice").unwrap().as_slice(), b"secret");
    }

    #[test]
    fn verifier_store_lifecycle() {
        let store = Store::new();
        store.add_user("alice", vec![1], vec![2]).unwrap();
        assert!(store.check_user("alice"));
        assert!(!store.check_user("bob"));
        assert_eq!(store.add_user("alice", vec![9], vec![9]), Err(StoreError::AlreadyExists));

        // Fresh records hold no challenge.
        assert!(matches!(store.take_challenge("alice"), Err(StoreError::NotChallenged)));
        assert!(matches!(store.take_challenge("bob"), Err(StoreError::UnknownUser)));

        store.upsert_challenge("alice", vec![3], vec![4], scalar(5)).unwrap();
        let taken = store.take_challenge("alice").unwrap();
        assert_eq!((taken.y1, taken.y2), (vec![1], vec![2]));
        assert_eq!((taken.r1, taken.r2), (vec![3], vec![4]));
        assert_eq!(taken.c, scalar(5));

        // Taking consumes the challenge.
        assert!(matches!(store.take_challenge("alice"), Err(StoreError::NotChallenged)));
    }

    #[test]
    fn upsert_overwrites_prior_challenge() {
        let store = Store::new();
        store.add_user("alice", vec![1], vec![2]).unwrap();
        store.upsert_challenge("alice", vec![3], vec![4], scalar(5)).unwrap();
        store.upsert_challenge("alice", vec![6], vec![7], scalar(8)).unwrap();
        let taken = store.take_challenge("alice").unwrap();
        assert_eq!((taken.r1, taken.r2), (vec![6], vec![7]));
        assert_eq!(taken.c, scalar(8));
    }

    #[test]
    fn upsert_requires_registration() {
        let store = Store::new();
        assert_eq!(
            store.upsert_challenge("ghost", vec![1], vec![2], scalar(3)),
            Err(StoreError::UnknownUser)
        );
    }

    #[test]
    fn concurrent_upserts_leave_one_winner() {
        let store = Arc::new(Store::new());
        store.add_user("alice", vec![0], vec![0]).unwrap();

        let handles: Vec<_> = (1u8..=8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.upsert_challenge("alice", vec![i], vec![i], scalar(i)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly one triple survives, and it is one of the written ones.
        let record = store.get_user("alice").unwrap();
        match record.state {
            ChallengeState::Challenged { r1, r2, c } => {
                let i = r1[0];
                assert!((1..=8).contains(&i));
                assert_eq!(r2, vec![i]);
                assert_eq!(c, scalar(i));
            }
            ChallengeState::Registered => panic!("challenge lost"),
        }
    }
}
