// src/observability.rs
//! Tracing bootstrap
//!
//! Hosts that want the agent's logs call [`init_tracing`] once during
//! startup. Hosts with their own subscriber skip this entirely; the agent
//! only ever emits through the `tracing` facade.

use crate::utils::errors::{AgentError, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber; the debug flag picks the default level
///
/// `RUST_LOG` wins over the flag when set. Fails when a global subscriber
/// is already installed.
pub fn init_tracing(debug: bool) -> Result<()> {
    let default_filter = if debug { "pagepulse=debug" } else { "pagepulse=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| AgentError::ConfigFailed(format!("tracing init failed: {}", e)))
}
