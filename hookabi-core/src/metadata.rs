//! Static self-description returned by the `metadata` entry point.

use serde::{Deserialize, Serialize};

use crate::codec::{self, Payload};
use crate::error::CallError;
use crate::registry::EntryPoint;

pub const PLUGIN_NAME: &str = "Test Plugin";
pub const PLUGIN_URL: &str = "https://example.com";
pub const PLUGIN_DESCRIPTION: &str = "Plugin to test Lemmy feature";

/// What the host shows when it lists active plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub name: String,
    pub url: String,
    pub description: String,
}

impl MetadataRecord {
    pub fn current() -> Self {
        Self {
            name: PLUGIN_NAME.to_string(),
            url: PLUGIN_URL.to_string(),
            description: PLUGIN_DESCRIPTION.to_string(),
        }
    }
}

/// Entry point that ignores its input and always answers with [`MetadataRecord::current`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Metadata;

impl EntryPoint for Metadata {
    fn handle(&self, _input: &[u8]) -> Result<Payload, CallError> {
        Ok(codec::encode(&MetadataRecord::current())?)
    }
}
