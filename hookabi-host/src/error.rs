//! Host-side errors.

use hookabi_core::{BuildError, DecodeError, EncodeError};

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("guest has no entry point `{0}`")]
    UnknownEntryPoint(String),
    /// Guest returned a non-zero status; `message` is its error signal.
    #[error("`{entry_point}` failed with status {status}: {message}")]
    Failed {
        entry_point: String,
        status: i32,
        message: String,
    },
    #[error("could not encode call input: {0}")]
    Encode(#[from] EncodeError),
    #[error("guest reply does not decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("guest broke the ABI: {0}")]
    Abi(String),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HostError {
    /// Text to relay to whoever asked for the action: the guest's own message when it rejected.
    pub fn user_message(&self) -> String {
        match self {
            HostError::Failed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
