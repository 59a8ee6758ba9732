//! Entry point registry: name -> handler table, plus the call boundary that
//! turns every handler result into exactly one channel write.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, field, info_span, warn};

use crate::channel::{CallContext, GuestChannel, Outcome, STATUS_FAILURE, STATUS_OK};
use crate::codec::Payload;
use crate::error::{CallError, RegistryError};

/// A named guest function: input payload in, output payload or error out.
pub trait EntryPoint: Send + Sync {
    fn handle(&self, input: &[u8]) -> Result<Payload, CallError>;
}

impl<F> EntryPoint for F
where
    F: Fn(&[u8]) -> Result<Payload, CallError> + Send + Sync,
{
    fn handle(&self, input: &[u8]) -> Result<Payload, CallError> {
        self(input)
    }
}

/// Table of entry points, built once at startup and read-only afterwards.
#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<String, Box<dyn EntryPoint>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry point under `name`. Names are unique.
    pub fn register<E>(&mut self, name: impl Into<String>, entry: E) -> Result<(), RegistryError>
    where
        E: EntryPoint + 'static,
    {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(entry_point = %name, "registered");
        self.entries.insert(name, Box::new(entry));
        Ok(())
    }

    pub fn function_exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run entry point `name` against `channel`. Returns the status code.
    ///
    /// On 0 the output slot holds the reply; on non-zero the error signal does.
    /// Handler failures and panics never escape: they become status 1.
    pub fn invoke(
        &self,
        name: &str,
        channel: &mut dyn GuestChannel,
    ) -> Result<i32, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownEntryPoint(name.to_string()))?;
        let span = info_span!("entry_point", entry_point = name, call_id = field::Empty);
        if let Some(id) = channel.call_id() {
            span.record("call_id", field::display(id));
        }
        let _enter = span.enter();

        let result = channel.read_input().map_err(CallError::from).and_then(|input| {
            panic::catch_unwind(AssertUnwindSafe(|| entry.handle(&input)))
                .unwrap_or(Err(CallError::Panicked))
        });

        let status = match result.and_then(|out| Ok(channel.write_output(out)?)) {
            Ok(()) => STATUS_OK,
            Err(e) => {
                let message = e.signal_message();
                warn!(error = %e, "call failed");
                if let Err(ce) = channel.set_error(message) {
                    warn!(error = %ce, "could not set error signal");
                }
                STATUS_FAILURE
            }
        };
        debug!(status, "call finished");
        Ok(status)
    }

    /// Host convenience: open a fresh call with `input`, invoke, and collect the outcome.
    pub fn call(&self, name: &str, input: Payload) -> Result<Outcome, RegistryError> {
        let mut ctx = CallContext::with_input(input);
        let status = self.invoke(name, &mut ctx)?;
        Ok(ctx.finish(status).unwrap_or_else(|e| Outcome::Failed {
            status: STATUS_FAILURE,
            message: e.to_string(),
        }))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
