// src/listeners/mod.rs
//! Page-level observers
//!
//! - **Navigation**: canonical observer abstraction the host provides
//! - **Debounce**: trailing-edge collapse of rapid navigation triggers
//! - **Registry**: install/uninstall lifecycle and the initial pageview

pub mod debounce;
pub mod navigation;
pub mod registry;

// Re-export commonly used types
pub use debounce::Debouncer;
pub use navigation::{NavigationEvent, NavigationHub, NavigationKind, NavigationObserver};
pub use registry::ListenerRegistry;
