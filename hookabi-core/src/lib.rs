//! Guest side of the hookabi plugin boundary.
//! Host-driven: no I/O; the host stages a payload, calls an entry point by name,
//! and reads back either an output payload or an error signal.

pub mod channel;
pub mod codec;
pub mod error;
pub mod forms;
pub mod hook;
pub mod metadata;
pub mod plugin;
pub mod registry;
pub mod rules;

// C ABI exports for foreign hosts.
pub mod ffi;

pub use channel::{CallContext, GuestChannel, Outcome, STATUS_FAILURE, STATUS_OK};
pub use codec::{decode, encode, DynamicForm, Field, Payload};
pub use error::{BuildError, CallError, ChannelError, DecodeError, EncodeError, RegistryError, RuleError};
pub use forms::{Activity, CommentForm, Open, PostForm};
pub use hook::{Hook, HookKind, HookOutcome, HookState};
pub use metadata::{Metadata, MetadataRecord};
pub use plugin::{build_registry, default_registry, GuestConfig, HookRules, ENTRY_POINTS};
pub use registry::{EntryPoint, Registry};
pub use rules::{Action, Condition, HookSubject, Rule, RuleSet};
