//! Process configuration
//!
//! Both binaries are configured from the environment at startup, with
//! working defaults for a local two-process setup. There is no dynamic
//! reconfiguration; a malformed value is a startup error.
//!
//! | Variable                   | Meaning                         | Default                 |
//! |----------------------------|---------------------------------|-------------------------|
//! | `ZKPAUTH_VERIFIER_ADDR`    | verifier RPC listen address     | `127.0.0.1:9090`        |
//! | `ZKPAUTH_VERIFIER_URL`     | prover's RPC target             | `http://127.0.0.1:9090` |
//! | `ZKPAUTH_HTTP_ADDR`        | prover front-end listen address | `127.0.0.1:8080`        |
//! | `ZKPAUTH_RPC_TIMEOUT_SECS` | per-call RPC deadline           | `5`                     |

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

/// Configuration for the verifier process.
#[derive(Clone, Debug)]
pub struct VerifierConfig {
    /// RPC listen address.
    pub listen_addr: SocketAddr,
}

impl VerifierConfig {
    /// Load from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self { listen_addr: addr_var("ZKPAUTH_VERIFIER_ADDR", "127.0.0.1:9090")? })
    }
}

/// Configuration for the prover process.
#[derive(Clone, Debug)]
pub struct ProverConfig {
    /// Front-end listen address.
    pub listen_addr: SocketAddr,
    /// Base URL of the verifier's RPC routes.
    pub verifier_url: String,
    /// Deadline applied to every RPC call.
    pub rpc_timeout: Duration,
}

impl ProverConfig {
    /// Load from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = addr_var("ZKPAUTH_HTTP_ADDR", "127.0.0.1:8080")?;
        let verifier_url = std::env::var("ZKPAUTH_VERIFIER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9090".to_owned());
        let timeout_secs: u64 = match std::env::var("ZKPAUTH_RPC_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("ZKPAUTH_RPC_TIMEOUT_SECS is not a number: {raw}"))?,
            Err(_) => 5,
        };
        Ok(Self { listen_addr, verifier_url, rpc_timeout: Duration::from_secs(timeout_secs) })
    }
}

fn addr_var(name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_owned());
    raw.parse().with_context(|| format!("{name} is not a socket address: {raw}"))
}
