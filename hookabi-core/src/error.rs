//! Error taxonomy for the guest side of the boundary.
//!
//! Everything that can go wrong while answering a call ends up as a
//! [`CallError`], which the registry turns into a non-zero status plus an
//! error signal.

/// Input payload is not well-formed JSON or does not fit the target shape.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("malformed payload at line {line} column {column}: {source}")]
    Syntax {
        line: usize,
        column: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload does not match expected shape at line {line} column {column}: {source}")]
    Shape {
        line: usize,
        column: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload ended early: {0}")]
    Truncated(#[source] serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        use serde_json::error::Category;
        let (line, column) = (e.line(), e.column());
        match e.classify() {
            Category::Eof => DecodeError::Truncated(e),
            Category::Data => DecodeError::Shape {
                line,
                column,
                source: e,
            },
            Category::Syntax | Category::Io => DecodeError::Syntax {
                line,
                column,
                source: e,
            },
        }
    }
}

/// Output value could not be serialized.
#[derive(Debug, thiserror::Error)]
#[error("encode error: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);

/// Transfer channel discipline violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("input slot is empty or was already read")]
    InputConsumed,
    #[error("output slot was already written")]
    OutputAlreadyWritten,
    #[error("error signal was already set")]
    ErrorAlreadySet,
    #[error("output and error signal are mutually exclusive")]
    Conflict,
    #[error("status 0 returned without an output payload")]
    MissingOutput,
    #[error("status {0} returned without an error signal")]
    MissingError(i32),
    #[error("output slot is empty or was already read")]
    OutputConsumed,
}

/// Entry point lookup and registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no entry point named `{0}`")]
    UnknownEntryPoint(String),
    #[error("entry point `{0}` registered twice")]
    Duplicate(String),
}

/// Invalid hook rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule {index} rewrites a field but `{hook}` is an after hook")]
    RewriteInAfterHook { hook: String, index: usize },
    #[error("rule {index} references unknown field `{field}`")]
    UnknownField { index: usize, field: String },
    #[error("rule {index} rewrites without a target field and its condition names none")]
    NoTargetField { index: usize },
    #[error("rule {index} rejects with an empty message")]
    EmptyMessage { index: usize },
    #[error("rules given for `{0}`, which is not a hook")]
    NotAHook(String),
}

/// Registry could not be assembled from configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("hook `{hook}`: {source}")]
    Rule {
        hook: String,
        #[source]
        source: RuleError,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Why an entry point failed. Converted to a non-zero status at the registry boundary.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Hook predicate vetoed the action. Message is relayed verbatim.
    #[error("{0}")]
    Rejected(String),
    /// A matched rewrite rule found a non-text value in its target field.
    #[error("rule {rule} cannot rewrite `{field}`: value is not text")]
    RewriteRefused { rule: String, field: String },
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("entry point panicked")]
    Panicked,
}

impl CallError {
    /// Message placed in the error signal. Encode failures get a generic text.
    pub fn signal_message(&self) -> String {
        match self {
            CallError::Encode(_) => "failed to encode output".to_string(),
            CallError::Rejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
