//! Verifier RPC server
//!
//! Serves the three authentication operations over JSON/HTTP:
//!
//! - `POST /v1/register`  { user, y1, y2 }      -> {}
//! - `POST /v1/challenge` { user, r1, r2 }      -> { auth_id, c }
//! - `POST /v1/verify`    { auth_id, s }        -> { session_id }
//!
//! Denials are masked at this boundary: unknown user, missing challenge,
//! stale auth id, and a failing proof all answer 401 with the same body.
//! The distinguishing reason is logged server-side only.

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use zkpauth::{
    config::VerifierConfig,
    ensure_entropy,
    transport::{
        AnswerRequest, AnswerResponse, ChallengeRequest, ChallengeResponse, RegisterRequest,
        RegisterResponse, CHALLENGE_PATH, REGISTER_PATH, VERIFY_PATH,
    },
    verifier::{AuthError, PublicErrorKind, DENIED_MESSAGE},
    DefaultGroup, Group, MemoryVerifierStore, VerifierEngine,
};

type Engine = VerifierEngine<DefaultGroup, MemoryVerifierStore<DefaultGroup>>;

/// Map an engine error onto the public wire, losing the internal reason.
fn reply(err: &AuthError) -> (StatusCode, String) {
    match err.public_kind() {
        PublicErrorKind::BadRequest => (StatusCode::BAD_REQUEST, "invalid request".into()),
        PublicErrorKind::Conflict => (StatusCode::CONFLICT, "user already registered".into()),
        PublicErrorKind::Denied => (StatusCode::UNAUTHORIZED, DENIED_MESSAGE.into()),
    }
}

async fn rpc_register(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, (StatusCode, String)> {
    engine.register(&req.user, &req.y1, &req.y2).map_err(|e| {
        warn!(user = %req.user, error = %e, "registration refused");
        reply(&e)
    })?;
    info!(user = %req.user, "user registered");
    Ok(Json(RegisterResponse::default()))
}

async fn rpc_challenge(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, (StatusCode, String)> {
    let (auth_id, c) = engine.create_challenge(&req.user, &req.r1, &req.r2).map_err(|e| {
        warn!(user = %req.user, error = %e, "challenge refused");
        reply(&e)
    })?;
    info!(user = %req.user, auth_id = %auth_id, "challenge issued");
    Ok(Json(ChallengeResponse { auth_id, c }))
}

async fn rpc_verify(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, (StatusCode, String)> {
    let session_id = engine.verify_answer(&req.auth_id, &req.s).map_err(|e| {
        warn!(auth_id = %req.auth_id, error = %e, "answer refused");
        reply(&e)
    })?;
    info!(auth_id = %req.auth_id, "login verified");
    Ok(Json(AnswerResponse { session_id }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "verifier=info,tower_http=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    ensure_entropy()?;
    // The second generator is part of the wire contract; refuse to serve
    // with a broken group configuration.
    DefaultGroup::generator_h().context("group configuration is invalid")?;

    let cfg = VerifierConfig::from_env()?;
    let engine = Arc::new(Engine::new(MemoryVerifierStore::new()));

    let app = Router::new()
        .route(REGISTER_PATH, post(rpc_register))
        .route(CHALLENGE_PATH, post(rpc_challenge))
        .route(VERIFY_PATH, post(rpc_verify))
        .with_state(engine)
        .layer(TraceLayer::new_for_http());

    info!(addr = %cfg.listen_addr, group = DefaultGroup::NAME, "verifier listening");
    let listener = TcpListener::bind(cfg.listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
