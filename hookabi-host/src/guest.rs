//! Ways to reach a guest: linked in process, or through its exported C ABI.

use hookabi_core::ffi;
use hookabi_core::{build_registry, GuestConfig, Outcome, Payload, Registry, RegistryError, ENTRY_POINTS};
use tracing::{debug, warn};

use crate::error::HostError;

/// A loaded guest the host can call into.
pub trait Guest {
    fn function_exists(&self, name: &str) -> bool;

    /// Exported entry point names.
    fn entry_points(&self) -> Vec<String>;

    /// Run `name` on `input`. Status 0 yields the output payload; anything else
    /// yields [`HostError::Failed`] carrying the guest's error signal.
    fn call(&self, name: &str, input: Payload) -> Result<Payload, HostError>;
}

impl<G: Guest + ?Sized> Guest for Box<G> {
    fn function_exists(&self, name: &str) -> bool {
        (**self).function_exists(name)
    }

    fn entry_points(&self) -> Vec<String> {
        (**self).entry_points()
    }

    fn call(&self, name: &str, input: Payload) -> Result<Payload, HostError> {
        (**self).call(name, input)
    }
}

/// Guest whose registry lives in this process.
#[derive(Debug)]
pub struct InProcessGuest {
    registry: Registry,
}

impl InProcessGuest {
    pub fn new(config: &GuestConfig) -> Result<Self, HostError> {
        Ok(Self {
            registry: build_registry(config)?,
        })
    }

    pub fn from_registry(registry: Registry) -> Self {
        Self { registry }
    }
}

impl Guest for InProcessGuest {
    fn function_exists(&self, name: &str) -> bool {
        self.registry.function_exists(name)
    }

    fn entry_points(&self) -> Vec<String> {
        self.registry.names().map(str::to_string).collect()
    }

    fn call(&self, name: &str, input: Payload) -> Result<Payload, HostError> {
        match self.registry.call(name, input) {
            Ok(Outcome::Output(out)) => Ok(out),
            Ok(Outcome::Failed { status, message }) => Err(HostError::Failed {
                entry_point: name.to_string(),
                status,
                message,
            }),
            Err(RegistryError::UnknownEntryPoint(n)) => Err(HostError::UnknownEntryPoint(n)),
            Err(e) => Err(HostError::Abi(e.to_string())),
        }
    }
}

/// Guest driven only through the `hookabi_*` C symbols, the way a foreign host
/// would after loading the `cdylib`. Always runs the built-in rules.
///
/// The C ABI keeps call state per thread, so each `call` completes on the calling thread.
#[derive(Debug)]
pub struct ExportedGuest {
    _private: (),
}

impl ExportedGuest {
    /// Fails if the guest speaks a different ABI version.
    pub fn open() -> Result<Self, HostError> {
        let version = ffi::hookabi_abi_version();
        if version != ffi::ABI_VERSION {
            return Err(HostError::Abi(format!(
                "guest ABI version {version}, host expects {}",
                ffi::ABI_VERSION
            )));
        }
        debug!(version, "guest ABI opened");
        Ok(Self { _private: () })
    }

    fn read_output() -> Result<Payload, HostError> {
        let len = ffi::hookabi_output_len();
        if len < 0 {
            return Err(HostError::Abi("status 0 without an output payload".into()));
        }
        let mut buf = vec![0u8; len as usize];
        let n = ffi::hookabi_output_read(buf.as_mut_ptr(), buf.len());
        if n != len {
            return Err(HostError::Abi(format!("output read returned {n}, expected {len}")));
        }
        Ok(buf)
    }

    fn read_error(status: i32) -> Result<String, HostError> {
        let len = ffi::hookabi_error_len();
        if len < 0 {
            return Err(HostError::Abi(format!("status {status} without an error signal")));
        }
        let mut buf = vec![0u8; len as usize];
        let n = ffi::hookabi_error_read(buf.as_mut_ptr(), buf.len());
        if n != len {
            return Err(HostError::Abi(format!("error read returned {n}, expected {len}")));
        }
        String::from_utf8(buf).map_err(|_| HostError::Abi("error signal is not UTF-8".into()))
    }
}

impl Guest for ExportedGuest {
    fn function_exists(&self, name: &str) -> bool {
        ffi::hookabi_function_exists(name.as_ptr(), name.len()) == 1
    }

    fn entry_points(&self) -> Vec<String> {
        ENTRY_POINTS
            .iter()
            .filter(|n| self.function_exists(n))
            .map(|n| n.to_string())
            .collect()
    }

    fn call(&self, name: &str, input: Payload) -> Result<Payload, HostError> {
        if !self.function_exists(name) {
            return Err(HostError::UnknownEntryPoint(name.to_string()));
        }
        if ffi::hookabi_input_set(input.as_ptr(), input.len()) != 0 {
            return Err(HostError::Abi("input was not accepted".into()));
        }
        let status = ffi::hookabi_call(name.as_ptr(), name.len());
        match status {
            0 => Self::read_output(),
            s if s < 0 => Err(HostError::Abi(format!("call returned {s}"))),
            s => {
                let message = Self::read_error(s)?;
                warn!(entry_point = name, status = s, %message, "guest call failed");
                Err(HostError::Failed {
                    entry_point: name.to_string(),
                    status: s,
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookabi_core::plugin::{CREATE_LOCAL_POST, METADATA};

    fn guests() -> Vec<Box<dyn Guest>> {
        vec![
            Box::new(InProcessGuest::new(&GuestConfig::default()).unwrap()),
            Box::new(ExportedGuest::open().unwrap()),
        ]
    }

    #[test]
    fn both_guests_agree() {
        for g in guests() {
            assert_eq!(g.entry_points().len(), ENTRY_POINTS.len());
            assert_eq!(
                g.call(CREATE_LOCAL_POST, br#"{"name":"foo"}"#.to_vec()).unwrap(),
                br#"{"name":"bar"}"#.to_vec()
            );
            match g.call(CREATE_LOCAL_POST, br#"{"name":"blocked"}"#.to_vec()) {
                Err(HostError::Failed { status, message, .. }) => {
                    assert_eq!(status, 1);
                    assert_eq!(message, "blocked");
                }
                other => panic!("expected failure, got {other:?}"),
            }
            assert!(g.call(METADATA, Vec::new()).is_ok());
        }
    }

    #[test]
    fn unknown_name_is_reported() {
        for g in guests() {
            assert!(!g.function_exists("nope"));
            assert!(matches!(
                g.call("nope", b"{}".to_vec()),
                Err(HostError::UnknownEntryPoint(n)) if n == "nope"
            ));
        }
    }
}
