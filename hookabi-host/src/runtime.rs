//! Host-side hook relay: hand an action to the guest before or after it happens.

use hookabi_core::plugin::METADATA;
use hookabi_core::{decode, encode, MetadataRecord, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span};

use crate::error::HostError;
use crate::guest::Guest;

pub struct PluginHost<G> {
    guest: G,
}

impl<G: Guest> PluginHost<G> {
    pub fn new(guest: G) -> Self {
        Self { guest }
    }

    pub fn guest(&self) -> &G {
        &self.guest
    }

    /// Run a before-hook. The guest's output replaces `form`; a guest that does not
    /// export `name` leaves it unchanged. A rejection aborts the action with
    /// [`HostError::Failed`].
    pub fn hook_before<T>(&self, name: &str, form: T) -> Result<T, HostError>
    where
        T: Serialize + DeserializeOwned,
    {
        let _span = info_span!("hook_before", entry_point = name).entered();
        if !self.guest.function_exists(name) {
            debug!("not exported, passing through");
            return Ok(form);
        }
        let input = encode(&form)?;
        let output = self.guest.call(name, input)?;
        Ok(decode(&output)?)
    }

    /// Run an after-hook. Any output is discarded; only failure is reported.
    pub fn hook_after<T>(&self, name: &str, value: &T) -> Result<(), HostError>
    where
        T: Serialize + ?Sized,
    {
        let _span = info_span!("hook_after", entry_point = name).entered();
        if !self.guest.function_exists(name) {
            debug!("not exported, skipping");
            return Ok(());
        }
        self.guest.call(name, encode(value)?)?;
        Ok(())
    }

    /// The guest's self-description, or `None` if it exports no `metadata`.
    pub fn metadata(&self) -> Result<Option<MetadataRecord>, HostError> {
        if !self.guest.function_exists(METADATA) {
            return Ok(None);
        }
        let out = self.guest.call(METADATA, Vec::new())?;
        Ok(Some(decode(&out)?))
    }

    /// Raw call for hosts that handle encoding themselves.
    pub fn call_raw(&self, name: &str, input: Payload) -> Result<Payload, HostError> {
        self.guest.call(name, input)
    }
}
