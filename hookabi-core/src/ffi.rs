//! C ABI for hosts that load the guest as a `cdylib`/`staticlib`.
//!
//! Call sequence, per invocation and per thread:
//! 1. `hookabi_input_set` stages the input payload (opens a fresh call).
//! 2. an entry point symbol (e.g. `create_local_post`) or `hookabi_call` runs it.
//! 3. on status 0: `hookabi_output_len` + `hookabi_output_read`;
//!    otherwise: `hookabi_error_len` + `hookabi_error_read`.
//!
//! Negative return values from the channel primitives mean ABI misuse
//! (null pointer, empty slot, buffer too small), never a guest failure.

use std::cell::RefCell;
use std::slice;
use std::sync::OnceLock;

use tracing::{error, warn};

use crate::channel::{CallContext, GuestChannel, STATUS_FAILURE};
use crate::plugin;
use crate::registry::Registry;

/// Version of this C ABI. Bumped when a symbol or its meaning changes.
pub const ABI_VERSION: u32 = 1;

/// Null pointer, bad UTF-8 or empty slot.
pub const ERR_INVALID: i64 = -1;
/// Caller buffer cannot hold the payload; nothing was consumed.
pub const ERR_BUFFER_TOO_SMALL: i64 = -2;

static REGISTRY: OnceLock<Result<Registry, String>> = OnceLock::new();

thread_local! {
    /// Input staged for the next call on this thread.
    static PENDING: RefCell<Option<CallContext>> = const { RefCell::new(None) };
    /// Context of the last finished call on this thread, kept until the host reads it.
    static LAST: RefCell<Option<CallContext>> = const { RefCell::new(None) };
}

fn registry() -> &'static Result<Registry, String> {
    REGISTRY.get_or_init(|| plugin::default_registry().map_err(|e| e.to_string()))
}

/// Run `name` on the staged input (or an empty one) and park the context for reading.
fn dispatch(name: &str) -> i32 {
    let mut ctx = PENDING
        .with(|p| p.borrow_mut().take())
        .unwrap_or_else(|| CallContext::with_input(Vec::new()));
    let status = match registry() {
        Ok(r) => match r.invoke(name, &mut ctx) {
            Ok(status) => status,
            Err(e) => fail(&mut ctx, e.to_string()),
        },
        Err(e) => {
            error!(error = %e, "guest registry unavailable");
            fail(&mut ctx, format!("guest registry unavailable: {e}"))
        }
    };
    LAST.with(|l| *l.borrow_mut() = Some(ctx));
    status
}

fn fail(ctx: &mut CallContext, message: String) -> i32 {
    warn!(%message, "call refused");
    if let Err(e) = ctx.set_error(message) {
        warn!(error = %e, "could not set error signal");
    }
    STATUS_FAILURE
}

fn name_from_raw<'a>(name: *const u8, name_len: usize) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    let bytes = unsafe { slice::from_raw_parts(name, name_len) };
    std::str::from_utf8(bytes).ok()
}

/// Returns the ABI version. Hosts check this before anything else.
#[no_mangle]
pub extern "C" fn hookabi_abi_version() -> u32 {
    ABI_VERSION
}

/// Stage `len` bytes at `ptr` as the next call's input. Discards any unread reply
/// of the previous call. `ptr` may be null only when `len` is 0. Returns 0 or -1.
#[no_mangle]
pub extern "C" fn hookabi_input_set(ptr: *const u8, len: usize) -> i32 {
    let input = if len == 0 {
        Vec::new()
    } else if ptr.is_null() {
        return ERR_INVALID as i32;
    } else {
        unsafe { slice::from_raw_parts(ptr, len) }.to_vec()
    };
    LAST.with(|l| *l.borrow_mut() = None);
    PENDING.with(|p| *p.borrow_mut() = Some(CallContext::with_input(input)));
    0
}

/// Invoke an entry point by name. Unknown names fail with status 1 and an error signal.
/// Returns -1 if `name` is null or not UTF-8.
#[no_mangle]
pub extern "C" fn hookabi_call(name: *const u8, name_len: usize) -> i32 {
    match name_from_raw(name, name_len) {
        Some(n) => dispatch(n),
        None => ERR_INVALID as i32,
    }
}

/// 1 if the entry point exists, 0 if not, -1 on a bad name or unavailable registry.
#[no_mangle]
pub extern "C" fn hookabi_function_exists(name: *const u8, name_len: usize) -> i32 {
    match (name_from_raw(name, name_len), registry()) {
        (Some(n), Ok(r)) => r.function_exists(n) as i32,
        _ => ERR_INVALID as i32,
    }
}

/// Length of the pending output, or -1 if there is none.
#[no_mangle]
pub extern "C" fn hookabi_output_len() -> i64 {
    LAST.with(|l| {
        l.borrow()
            .as_ref()
            .and_then(CallContext::output_len)
            .map_or(ERR_INVALID, |n| n as i64)
    })
}

/// Copy the pending output into `buf` and release it. Returns bytes written,
/// -1 if there is no output or `buf` is null, -2 if `buf_len` is too small.
#[no_mangle]
pub extern "C" fn hookabi_output_read(buf: *mut u8, buf_len: usize) -> i64 {
    if buf.is_null() {
        return ERR_INVALID;
    }
    LAST.with(|l| {
        let mut last = l.borrow_mut();
        let Some(ctx) = last.as_mut() else {
            return ERR_INVALID;
        };
        match ctx.output_len() {
            None => return ERR_INVALID,
            Some(n) if n > buf_len => return ERR_BUFFER_TOO_SMALL,
            Some(_) => {}
        }
        match ctx.read_output() {
            Ok(out) => {
                unsafe {
                    buf.copy_from_nonoverlapping(out.as_ptr(), out.len());
                }
                out.len() as i64
            }
            Err(_) => ERR_INVALID,
        }
    })
}

/// Length in bytes of the error signal, or -1 if none was set.
#[no_mangle]
pub extern "C" fn hookabi_error_len() -> i64 {
    LAST.with(|l| {
        l.borrow()
            .as_ref()
            .and_then(CallContext::error)
            .map_or(ERR_INVALID, |m| m.len() as i64)
    })
}

/// Copy the UTF-8 error message into `buf`. Returns bytes written, -1 if no
/// error is set or `buf` is null, -2 if `buf_len` is too small.
#[no_mangle]
pub extern "C" fn hookabi_error_read(buf: *mut u8, buf_len: usize) -> i64 {
    if buf.is_null() {
        return ERR_INVALID;
    }
    LAST.with(|l| {
        let last = l.borrow();
        let Some(msg) = last.as_ref().and_then(CallContext::error) else {
            return ERR_INVALID;
        };
        if msg.len() > buf_len {
            return ERR_BUFFER_TOO_SMALL;
        }
        unsafe {
            buf.copy_from_nonoverlapping(msg.as_ptr(), msg.len());
        }
        msg.len() as i64
    })
}

/// One `#[no_mangle]` symbol per entry point, each dispatching by its own name.
macro_rules! export_entry_points {
    ($($symbol:ident => $name:path),+ $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($symbol), "` entry point.")]
            #[no_mangle]
            pub extern "C" fn $symbol() -> i32 {
                dispatch($name)
            }
        )+
    };
}

export_entry_points! {
    metadata => plugin::METADATA,
    create_local_post => plugin::CREATE_LOCAL_POST,
    api_before_create_post => plugin::API_BEFORE_CREATE_POST,
    before_create_local_post => plugin::BEFORE_CREATE_LOCAL_POST,
    after_create_local_post => plugin::AFTER_CREATE_LOCAL_POST,
    after_update_local_post => plugin::AFTER_UPDATE_LOCAL_POST,
    local_comment_before_create => plugin::LOCAL_COMMENT_BEFORE_CREATE,
    local_comment_after_create => plugin::LOCAL_COMMENT_AFTER_CREATE,
    before_receive_federated_post => plugin::BEFORE_RECEIVE_FEDERATED_POST,
    after_receive_federated_post => plugin::AFTER_RECEIVE_FEDERATED_POST,
    before_receive_federated_comment => plugin::BEFORE_RECEIVE_FEDERATED_COMMENT,
    after_receive_federated_comment => plugin::AFTER_RECEIVE_FEDERATED_COMMENT,
    activity_received => plugin::ACTIVITY_RECEIVED,
}
