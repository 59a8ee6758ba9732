//! Transfer channel: per-call input slot, output slot and error signal.
//!
//! The host fills the input slot, the guest drains it, the guest fills exactly
//! one of output or error, the host drains that. Slots hand the bytes over by
//! value; nothing is shared between the two sides.

use tracing::debug;
use uuid::Uuid;

use crate::codec::Payload;
use crate::error::ChannelError;

/// Status returned by an entry point that wrote its output.
pub const STATUS_OK: i32 = 0;
/// Status returned by an entry point that set an error signal.
pub const STATUS_FAILURE: i32 = 1;

/// Guest view of the channel.
pub trait GuestChannel {
    /// Take the input payload. Succeeds once per call.
    fn read_input(&mut self) -> Result<Payload, ChannelError>;
    /// Hand the output payload to the host. Succeeds once per call.
    fn write_output(&mut self, payload: Payload) -> Result<(), ChannelError>;
    /// Set the error signal. Mutually exclusive with `write_output`.
    fn set_error(&mut self, message: String) -> Result<(), ChannelError>;
    /// Identifier of the call this channel serves, if it has one.
    fn call_id(&self) -> Option<Uuid> {
        None
    }
}

#[derive(Debug)]
enum Reply {
    Empty,
    Output(Payload),
    Error(String),
    Taken,
}

/// How a finished call turned out, as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Output(Payload),
    Failed { status: i32, message: String },
}

/// State of one invocation. Build a fresh one per call; never reuse.
#[derive(Debug)]
pub struct CallContext {
    call_id: Uuid,
    input: Option<Payload>,
    reply: Reply,
}

impl CallContext {
    /// Host side `write_input`: open a call with its input payload.
    pub fn with_input(input: Payload) -> Self {
        let call_id = Uuid::new_v4();
        debug!(%call_id, len = input.len(), "input staged");
        Self {
            call_id,
            input: Some(input),
            reply: Reply::Empty,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    /// Length of a pending output payload, if one is waiting.
    pub fn output_len(&self) -> Option<usize> {
        match &self.reply {
            Reply::Output(p) => Some(p.len()),
            _ => None,
        }
    }

    /// Host side `read_output`. Succeeds once, and only if the guest wrote output.
    pub fn read_output(&mut self) -> Result<Payload, ChannelError> {
        match std::mem::replace(&mut self.reply, Reply::Taken) {
            Reply::Output(p) => {
                debug!(call_id = %self.call_id, len = p.len(), "output delivered");
                Ok(p)
            }
            other => {
                self.reply = other;
                Err(ChannelError::OutputConsumed)
            }
        }
    }

    /// Error signal, if the guest set one.
    pub fn error(&self) -> Option<&str> {
        match &self.reply {
            Reply::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Close the call: check the status against what the guest wrote.
    pub fn finish(mut self, status: i32) -> Result<Outcome, ChannelError> {
        match (status, std::mem::replace(&mut self.reply, Reply::Taken)) {
            (STATUS_OK, Reply::Output(p)) => Ok(Outcome::Output(p)),
            (STATUS_OK, Reply::Error(_)) => Err(ChannelError::Conflict),
            (STATUS_OK, _) => Err(ChannelError::MissingOutput),
            (status, Reply::Error(message)) => Ok(Outcome::Failed { status, message }),
            (_, Reply::Output(_)) => Err(ChannelError::Conflict),
            (status, _) => Err(ChannelError::MissingError(status)),
        }
    }
}

impl GuestChannel for CallContext {
    fn call_id(&self) -> Option<Uuid> {
        Some(self.call_id)
    }

    fn read_input(&mut self) -> Result<Payload, ChannelError> {
        let input = self.input.take().ok_or(ChannelError::InputConsumed)?;
        debug!(call_id = %self.call_id, len = input.len(), "input read");
        Ok(input)
    }

    fn write_output(&mut self, payload: Payload) -> Result<(), ChannelError> {
        match self.reply {
            Reply::Empty => {
                debug!(call_id = %self.call_id, len = payload.len(), "output written");
                self.reply = Reply::Output(payload);
                Ok(())
            }
            Reply::Error(_) => Err(ChannelError::Conflict),
            Reply::Output(_) | Reply::Taken => Err(ChannelError::OutputAlreadyWritten),
        }
    }

    fn set_error(&mut self, message: String) -> Result<(), ChannelError> {
        match self.reply {
            Reply::Empty => {
                debug!(call_id = %self.call_id, %message, "error signal set");
                self.reply = Reply::Error(message);
                Ok(())
            }
            Reply::Error(_) => Err(ChannelError::ErrorAlreadySet),
            Reply::Output(_) | Reply::Taken => Err(ChannelError::Conflict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_reads_once() {
        let mut ctx = CallContext::with_input(b"{}".to_vec());
        assert_eq!(ctx.read_input().unwrap(), b"{}".to_vec());
        assert_eq!(ctx.read_input(), Err(ChannelError::InputConsumed));
    }

    #[test]
    fn output_writes_once_and_reads_once() {
        let mut ctx = CallContext::with_input(vec![]);
        ctx.write_output(b"1".to_vec()).unwrap();
        assert_eq!(
            ctx.write_output(b"2".to_vec()),
            Err(ChannelError::OutputAlreadyWritten)
        );
        assert_eq!(ctx.output_len(), Some(1));
        assert_eq!(ctx.read_output().unwrap(), b"1".to_vec());
        assert_eq!(ctx.read_output(), Err(ChannelError::OutputConsumed));
        assert_eq!(
            ctx.write_output(b"3".to_vec()),
            Err(ChannelError::OutputAlreadyWritten)
        );
    }

    #[test]
    fn output_and_error_are_exclusive() {
        let mut ctx = CallContext::with_input(vec![]);
        ctx.set_error("nope".into()).unwrap();
        assert_eq!(ctx.write_output(b"1".to_vec()), Err(ChannelError::Conflict));
        assert_eq!(
            ctx.set_error("again".into()),
            Err(ChannelError::ErrorAlreadySet)
        );
        assert_eq!(ctx.error(), Some("nope"));
        assert_eq!(ctx.read_output(), Err(ChannelError::OutputConsumed));

        let mut ctx = CallContext::with_input(vec![]);
        ctx.write_output(b"1".to_vec()).unwrap();
        assert_eq!(ctx.set_error("late".into()), Err(ChannelError::Conflict));
    }

    #[test]
    fn finish_checks_status_against_reply() {
        let mut ok = CallContext::with_input(vec![]);
        ok.write_output(b"x".to_vec()).unwrap();
        assert_eq!(ok.finish(STATUS_OK), Ok(Outcome::Output(b"x".to_vec())));

        let mut failed = CallContext::with_input(vec![]);
        failed.set_error("blocked".into()).unwrap();
        assert_eq!(
            failed.finish(STATUS_FAILURE),
            Ok(Outcome::Failed {
                status: STATUS_FAILURE,
                message: "blocked".into()
            })
        );

        let silent = CallContext::with_input(vec![]);
        assert_eq!(silent.finish(STATUS_OK), Err(ChannelError::MissingOutput));
        let silent = CallContext::with_input(vec![]);
        assert_eq!(silent.finish(7), Err(ChannelError::MissingError(7)));

        let mut mixed = CallContext::with_input(vec![]);
        mixed.write_output(b"x".to_vec()).unwrap();
        assert_eq!(mixed.finish(STATUS_FAILURE), Err(ChannelError::Conflict));
    }

    #[test]
    fn every_call_gets_its_own_id() {
        let a = CallContext::with_input(vec![]);
        let b = CallContext::with_input(vec![]);
        assert_ne!(a.call_id(), b.call_id());
    }
}
