//! Prover session engine
//!
//! Orchestrates the client side of the protocol: registration derives the
//! secret scalar from the password and publishes the commitments; login
//! drives the three-message exchange against the transport boundary.
//!
//! The password maps to the secret as `x = SHA-256(password) mod q`, so
//! arbitrary password strings are accepted. The mapping lives entirely on
//! this side of the wire; registration and login share it, which is the
//! only agreement the protocol needs. Locally persisted state is written
//! only after the verifier has accepted the registration.

#![forbid(unsafe_code)]

use std::marker::PhantomData;

use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::group::{Group, GroupError};
use crate::protocol::{self, ProtocolError};
use crate::store::{ProverStore, StoreError};
use crate::transport::{AuthTransport, TransportError};

/// Failures surfaced by the prover engine.
#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    /// A credential for this user is already stored locally.
    #[error("user already registered")]
    AlreadyExists,
    /// No locally stored credential for this user.
    #[error("unknown user")]
    UnknownUser,
    /// The locally stored credential fails to decode.
    #[error("stored credential is corrupt: {0}")]
    BadCredential(#[from] GroupError),
    /// The proof engine rejected an input.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The verifier or the wire failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<StoreError> for ProverError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists => ProverError::AlreadyExists,
            // The credential store has no challenge state; treat anything
            // else as a missing user.
            StoreError::UnknownUser | StoreError::NotChallenged => ProverError::UnknownUser,
        }
    }
}

/// Derive the secret scalar from a password: `SHA-256(password) mod q`.
///
/// The zero scalar (probability ~2^-128 per group) is rejected downstream
/// by the proof engine rather than silently remapped here.
pub fn password_scalar<G: Group>(password: &str) -> G::Scalar {
    G::scalar_reduce(&Sha256::digest(password.as_bytes()))
}

/// The client-side engine, generic over transport and credential store.
pub struct ProverEngine<G: Group, T: AuthTransport, S: ProverStore> {
    transport: T,
    store: S,
    _group: PhantomData<G>,
}

impl<G: Group, T: AuthTransport, S: ProverStore> ProverEngine<G, T, S> {
    /// Wrap a transport and a credential store.
    pub fn new(transport: T, store: S) -> Self {
        Self { transport, store, _group: PhantomData }
    }

    /// Derive the secret from the password, publish the commitments, and
    /// persist the credential once the verifier has accepted it.
    pub async fn register(&self, user: &str, password: &str) -> Result<(), ProverError> {
        let x = password_scalar::<G>(password);
        let (y1, y2) = protocol::public_commitments::<G>(&x)?;
        self.transport.register(user, &y1, &y2).await?;
        self.store.add_user(user, &G::scalar_encode(&x))?;
        Ok(())
    }

    /// Run one login round; returns the session identifier on success.
    ///
    /// The commitment nonce is consumed by the response computation and
    /// never survives the call, so no two runs can share it.
    pub async fn login(&self, user: &str) -> Result<String, ProverError> {
        let secret = self.store.get_user(user)?;
        let x = G::scalar_decode(&secret)?;

        let commit = protocol::prover_commitment::<G, _>(&mut OsRng)?;
        let resp = self.transport.request_challenge(user, &commit.r1, &commit.r2).await?;

        if resp.c.len() > G::SCALAR_LEN {
            return Err(ProtocolError::InvalidInput("challenge wider than the group order").into());
        }
        let c = G::scalar_reduce(&resp.c);
        let s = protocol::solve_challenge::<G>(&x, commit.nonce, &c)?;

        let session = self.transport.submit_answer(&resp.auth_id, &G::scalar_encode(&s)).await?;
        Ok(session)
    }
}

// ============================================================================
// Tests
// ============================================================================
