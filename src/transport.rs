//! Typed transport boundary
//!
//! The prover core talks to the verifier through [`AuthTransport`]: three
//! request/response operations carrying canonical byte encodings. Any
//! framing that preserves the message shapes satisfies the boundary; two
//! carriers are provided:
//!
//! - [`HttpTransport`]: JSON over HTTP with hex-armored byte fields and a
//!   short per-call deadline, matching the routes served by the verifier
//!   binary.
//! - [`DirectTransport`]: an in-process adapter around a
//!   [`VerifierEngine`], used by the end-to-end tests.
//!
//! Both carriers behave like the public boundary: the verifier's internal
//! denial reasons are collapsed into one generic message before they reach
//! the prover.

#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::group::Group;
use crate::store::VerifierStore;
use crate::verifier::{AuthError, PublicErrorKind, VerifierEngine, DENIED_MESSAGE};

/// Route served by the verifier for registrations.
pub const REGISTER_PATH: &str = "/v1/register";
/// Route served by the verifier for challenge creation.
pub const CHALLENGE_PATH: &str = "/v1/challenge";
/// Route served by the verifier for answer verification.
pub const VERIFY_PATH: &str = "/v1/verify";

/// Transport-level failures seen by the prover.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The verifier refused the request; the message is already masked.
    #[error("verifier rejected the request: {message}")]
    Rejected {
        /// Public-boundary message.
        message: String,
    },
    /// I/O, timeout, or a server-side fault; the caller may retry.
    #[error("transport failure: {0}")]
    Transient(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Transient(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Registration request: user name plus both public commitments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// User name; the registration key.
    pub user: String,
    /// Canonical bytes of `g*x`.
    #[serde(with = "hex::serde")]
    pub y1: Vec<u8>,
    /// Canonical bytes of `h*x`.
    #[serde(with = "hex::serde")]
    pub y2: Vec<u8>,
}

/// Registration response carries no payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterResponse {}

/// Challenge request: user name plus both prover commitments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// User name whose record the challenge binds to.
    pub user: String,
    /// Canonical bytes of `g*r`.
    #[serde(with = "hex::serde")]
    pub r1: Vec<u8>,
    /// Canonical bytes of `h*r`.
    #[serde(with = "hex::serde")]
    pub r2: Vec<u8>,
}

/// Challenge response: an opaque id and the challenge scalar bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Opaque id for the answer leg; not derived from the user name.
    pub auth_id: String,
    /// Fixed-width big-endian challenge scalar.
    #[serde(with = "hex::serde")]
    pub c: Vec<u8>,
}

/// Answer request: the opaque id and the response scalar bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// Id returned by the challenge leg.
    pub auth_id: String,
    /// Fixed-width big-endian response scalar.
    #[serde(with = "hex::serde")]
    pub s: Vec<u8>,
}

/// Answer response: the session identifier issued on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    /// Opaque session token.
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// The boundary
// ---------------------------------------------------------------------------

/// The three-operation message boundary between prover and verifier.
pub trait AuthTransport: Send + Sync {
    /// Register the public commitments for a new user.
    fn register(
        &self,
        user: &str,
        y1: &[u8],
        y2: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Submit prover commitments; returns the auth id and challenge bytes.
    fn request_challenge(
        &self,
        user: &str,
        r1: &[u8],
        r2: &[u8],
    ) -> impl Future<Output = Result<ChallengeResponse, TransportError>> + Send;

    /// Submit the response scalar; returns the session identifier.
    fn submit_answer(
        &self,
        auth_id: &str,
        s: &[u8],
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Collapse an engine error the way the public boundary does.
fn mask(err: AuthError) -> TransportError {
    let message = match err.public_kind() {
        PublicErrorKind::BadRequest => "invalid request",
        PublicErrorKind::Conflict => "user already registered",
        PublicErrorKind::Denied => DENIED_MESSAGE,
    };
    TransportError::Rejected { message: message.to_owned() }
}

// ---------------------------------------------------------------------------
// HTTP carrier
// ---------------------------------------------------------------------------

/// JSON-over-HTTP client for the verifier's RPC routes.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client for `base_url` with a per-call deadline.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Transient(e.to_string()))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { base_url, client })
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, TransportError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(TransportError::Transient(format!("{url}: {status}")));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TransportError::Rejected { message });
        }
        Ok(resp.json().await?)
    }
}

impl AuthTransport for HttpTransport {
    async fn register(&self, user: &str, y1: &[u8], y2: &[u8]) -> Result<(), TransportError> {
        let req =
            RegisterRequest { user: user.to_owned(), y1: y1.to_vec(), y2: y2.to_vec() };
        let _: RegisterResponse = self.post(REGISTER_PATH, &req).await?;
        Ok(())
    }

    async fn request_challenge(
        &self,
        user: &str,
        r1: &[u8],
        r2: &[u8],
    ) -> Result<ChallengeResponse, TransportError> {
        let req =
            ChallengeRequest { user: user.to_owned(), r1: r1.to_vec(), r2: r2.to_vec() };
        self.post(CHALLENGE_PATH, &req).await
    }

    async fn submit_answer(&self, auth_id: &str, s: &[u8]) -> Result<String, TransportError> {
        let req = AnswerRequest { auth_id: auth_id.to_owned(), s: s.to_vec() };
        let resp: AnswerResponse = self.post(VERIFY_PATH, &req).await?;
        Ok(resp.session_id)
    }
}

// ---------------------------------------------------------------------------
// In-process carrier
// ---------------------------------------------------------------------------

/// Adapter that satisfies the boundary directly against a local engine.
pub struct DirectTransport<G: Group, S: VerifierStore<G>> {
    engine: Arc<VerifierEngine<G, S>>,
}

impl<G: Group, S: VerifierStore<G>> DirectTransport<G, S> {
    /// Wrap a shared engine.
    pub fn new(engine: Arc<VerifierEngine<G, S>>) -> Self {
        Self { engine }
    }
}

impl<G: Group, S: VerifierStore<G>> AuthTransport for DirectTransport<G, S> {
    async fn register(&self, user: &str, y1: &[u8], y2: &[u8]) -> Result<(), TransportError> {
        self.engine.register(user, y1, y2).map_err(mask)
    }

    async fn request_challenge(
        &self,
        user: &str,
        r1: &[u8],
        r2: &[u8],
    ) -> Result<ChallengeResponse, TransportError> {
        let (auth_id, c) = self.engine.create_challenge(user, r1, r2).map_err(mask)?;
        Ok(ChallengeResponse { auth_id, c })
    }

    async fn submit_answer(&self, auth_id: &str, s: &[u8]) -> Result<String, TransportError> {
        self.engine.verify_answer(auth_id, s).map_err(mask)
    }
}

// ============================================================================
// Tests
// ============================================================================
