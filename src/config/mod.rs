// src/config/mod.rs
//! Configuration merge and freeze
//!
//! Configuration is merged from three layers and then frozen:
//!
//! - **Built-in defaults**: documented constants in `options`
//! - **Remote config**: one time-bounded GET of per-site toggles
//! - **Caller options**: explicit choices, which always win
//!
//! # Precedence
//!
//! ```text
//! caller option  >  remote value  >  built-in default
//! ```
//!
//! Reads before a successful `initialize` return the defaults; the accessor
//! reports which case applies so call sites decide whether to log.

pub mod options;
pub mod remote;
pub mod store;

// Re-export commonly used types
pub use options::{AgentOptions, RemoteToggles, ReplayConfig, ReplayOptions, ResolvedConfig};
pub use store::{ConfigRead, ConfigStore};
