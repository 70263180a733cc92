//! Prover process: end-user HTTP front-end plus verifier RPC client
//!
//! Accepts registration and login requests from end users and drives the
//! proof exchange against the verifier:
//!
//! - `POST /register` { userName, password } -> 201 on success, 400 on
//!   malformed input or failure
//! - `POST /login`    { userName }           -> { sessionID } or 400
//!
//! The password never leaves this process; only the derived commitments
//! and proof scalars travel to the verifier.

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use zkpauth::{
    config::ProverConfig, ensure_entropy, DefaultGroup, Group, HttpTransport, MemoryProverStore,
    ProverEngine,
};

type Engine = ProverEngine<DefaultGroup, HttpTransport, MemoryProverStore>;

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RegisterBody {
    user_name: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct LoginBody {
    user_name: String,
}

#[derive(Serialize)]
struct LoginReply {
    #[serde(rename = "sessionID")]
    session_id: String,
}

async fn register_user(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<RegisterBody>,
) -> Result<StatusCode, StatusCode> {
    engine.register(&body.user_name, &body.password).await.map_err(|e| {
        warn!(user = %body.user_name, error = %e, "registration failed");
        StatusCode::BAD_REQUEST
    })?;
    info!(user = %body.user_name, "registered");
    Ok(StatusCode::CREATED)
}

async fn login_user(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginReply>, StatusCode> {
    let session_id = engine.login(&body.user_name).await.map_err(|e| {
        warn!(user = %body.user_name, error = %e, "login failed");
        StatusCode::BAD_REQUEST
    })?;
    info!(user = %body.user_name, "login succeeded");
    Ok(Json(LoginReply { session_id }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "prover=info,tower_http=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    ensure_entropy()?;
    DefaultGroup::generator_h().context("group configuration is invalid")?;

    let cfg = ProverConfig::from_env()?;
    let transport = HttpTransport::new(cfg.verifier_url.clone(), cfg.rpc_timeout)
        .context("building verifier client")?;
    let engine = Arc::new(Engine::new(transport, MemoryProverStore::new()));

    let app = Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .with_state(engine)
        .layer(TraceLayer::new_for_http());

    info!(
        addr = %cfg.listen_addr,
        verifier = %cfg.verifier_url,
        group = DefaultGroup::NAME,
        "prover front-end listening"
    );
    let listener = TcpListener::bind(cfg.listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
