// src/config/store.rs
//! Write-once configuration store
//!
//! `initialize` merges defaults, optional remote config, and caller options
//! into a frozen [`ResolvedConfig`]. At most one initialization succeeds per
//! store; later attempts fail and leave the first configuration intact.
//!
//! Reads go through [`ConfigStore::read`], which distinguishes "defaults,
//! not yet initialized" from "configured" so call sites decide whether to
//! log — uninitialized reads are expected before setup and a hard error
//! nowhere.

use crate::config::options::{AgentOptions, ResolvedConfig};
use crate::config::remote::fetch_remote_toggles;
use crate::utils::errors::{AgentError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of a configuration read
pub enum ConfigRead {
    /// The store was initialized; values are frozen
    Configured(Arc<ResolvedConfig>),

    /// The store was not initialized; values are the built-in defaults
    Defaults(Arc<ResolvedConfig>),
}

impl ConfigRead {
    /// The configuration values regardless of provenance
    pub fn config(&self) -> &Arc<ResolvedConfig> {
        match self {
            ConfigRead::Configured(config) => config,
            ConfigRead::Defaults(config) => config,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, ConfigRead::Configured(_))
    }
}

/// Process-visible configuration store, write-once-then-frozen
pub struct ConfigStore {
    frozen: RwLock<Option<Arc<ResolvedConfig>>>,
    defaults: Arc<ResolvedConfig>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            frozen: RwLock::new(None),
            defaults: Arc::new(ResolvedConfig::defaults()),
        }
    }

    /// Merge, validate, and freeze the configuration
    ///
    /// Fails without state change when already initialized, when the
    /// endpoint is empty, or when the site id is empty. Remote-config
    /// failures are tolerated: the remote-controlled fields fall back to
    /// their defaults.
    pub async fn initialize(&self, options: AgentOptions) -> Result<()> {
        if self.is_initialized() {
            warn!("Configuration already initialized; ignoring");
            return Err(AgentError::ConfigFailed(
                "already initialized".to_string(),
            ));
        }

        if options.endpoint.trim().is_empty() {
            return Err(AgentError::ConfigFailed("endpoint is empty".to_string()));
        }
        if options.site_id.trim().is_empty() {
            return Err(AgentError::ConfigFailed("site id is empty".to_string()));
        }

        let remote = if options.use_remote_config {
            let endpoint = options.endpoint.trim().trim_end_matches('/');
            fetch_remote_toggles(
                endpoint,
                options.site_id.trim(),
                Duration::from_millis(options.remote_config_timeout_ms),
            )
            .await
        } else {
            None
        };

        let resolved = Arc::new(ResolvedConfig::resolve(&options, remote.as_ref()));

        let mut frozen = self.frozen.write();
        if frozen.is_some() {
            warn!("Configuration already initialized; ignoring");
            return Err(AgentError::ConfigFailed(
                "already initialized".to_string(),
            ));
        }

        info!(
            site_id = %resolved.site_id,
            endpoint = %resolved.endpoint,
            "Configuration initialized"
        );
        *frozen = Some(resolved);
        Ok(())
    }

    /// Read the frozen configuration, or the defaults before initialization
    pub fn read(&self) -> ConfigRead {
        match self.frozen.read().as_ref() {
            Some(config) => ConfigRead::Configured(Arc::clone(config)),
            None => ConfigRead::Defaults(Arc::clone(&self.defaults)),
        }
    }

    /// The debug flag; defaults silently before initialization
    pub fn debug(&self) -> bool {
        self.read().config().debug
    }

    pub fn is_initialized(&self) -> bool {
        self.frozen.read().is_some()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
