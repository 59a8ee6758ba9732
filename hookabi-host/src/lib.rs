//! Reference host for hookabi guests: rule config, guest loading, hook relay.

pub mod config;
pub mod error;
pub mod guest;
pub mod runtime;

pub use config::{load, ConfigError};
pub use error::HostError;
pub use guest::{ExportedGuest, Guest, InProcessGuest};
pub use runtime::PluginHost;
