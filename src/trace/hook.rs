#![allow(unsafe_code)] // sqlite3_trace_v2 ffi

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_int, c_uint, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use rusqlite::{Connection, ffi};

use super::event::{DbErrorCode, TraceInfo};
use crate::error::SqliteTraceError;
use crate::mask::TraceMask;

/// Callback receiving every event selected by the connection's mask.
pub type TraceCallback = Box<dyn FnMut(&TraceInfo<'_>)>;

/// State handed to SQLite as the trace context pointer.
pub(crate) struct TraceHook {
    callback: TraceCallback,
    want_expanded_sql: bool,
}

impl TraceHook {
    pub(crate) fn new(callback: TraceCallback, want_expanded_sql: bool) -> Box<Self> {
        Box::new(Self {
            callback,
            want_expanded_sql,
        })
    }
}

/// Point the connection's `sqlite3_trace_v2` hook at `hook`.
///
/// The caller keeps `hook` alive (and at the same address) until the
/// connection is closed or [`unregister`] is called.
pub(crate) fn register(
    conn: &Connection,
    mask: TraceMask,
    hook: &mut TraceHook,
) -> Result<(), SqliteTraceError> {
    let ctx = ptr::from_mut(hook).cast::<c_void>();
    let rc = unsafe {
        ffi::sqlite3_trace_v2(conn.handle(), mask.bits(), Some(trace_trampoline), ctx)
    };
    if rc == ffi::SQLITE_OK {
        tracing::debug!(mask = mask.bits(), "trace hook registered");
        Ok(())
    } else {
        Err(SqliteTraceError::TraceHookError(rc))
    }
}

pub(crate) fn unregister(conn: &Connection) {
    unsafe {
        ffi::sqlite3_trace_v2(conn.handle(), 0, None, ptr::null_mut());
    }
}

/// C trampoline for `sqlite3_trace_v2`.
///
/// # Safety
///
/// `ctx` must point to the live `TraceHook` passed to [`register`]. For
/// statement events `p` is the `sqlite3_stmt`; for close events it is the
/// `sqlite3` connection. `x` is the statement text (STMT) or a pointer to
/// the elapsed nanoseconds (PROFILE).
unsafe extern "C" fn trace_trampoline(
    code: c_uint,
    ctx: *mut c_void,
    p: *mut c_void,
    x: *mut c_void,
) -> c_int {
    if ctx.is_null() {
        return 0;
    }

    let result = catch_unwind(AssertUnwindSafe(|| {
        let hook = unsafe { &mut *ctx.cast::<TraceHook>() };
        let event = TraceMask::from_bits(code);
        let info = if event == TraceMask::CLOSE {
            TraceInfo {
                event,
                conn_handle: p as usize,
                stmt_handle: 0,
                stmt_or_trigger: Cow::Borrowed(""),
                expanded_sql: None,
                run_time_ns: 0,
                db_error: None,
            }
        } else {
            let stmt = p.cast::<ffi::sqlite3_stmt>();
            let db = unsafe { ffi::sqlite3_db_handle(stmt) };
            let stmt_or_trigger = if event == TraceMask::STMT {
                unsafe { text(x.cast::<c_char>()) }
            } else {
                unsafe { text(ffi::sqlite3_sql(stmt)) }
            };
            let run_time_ns = if event == TraceMask::PROFILE && !x.is_null() {
                unsafe { *x.cast::<i64>() }
            } else {
                0
            };
            let expanded_sql = if hook.want_expanded_sql {
                unsafe { expanded_sql(stmt) }
            } else {
                None
            };
            let db_error = if db.is_null() {
                None
            } else {
                let (code, extended) =
                    unsafe { (ffi::sqlite3_errcode(db), ffi::sqlite3_extended_errcode(db)) };
                DbErrorCode::from_codes(code, extended)
            };
            TraceInfo {
                event,
                conn_handle: db as usize,
                stmt_handle: stmt as usize,
                stmt_or_trigger,
                expanded_sql,
                run_time_ns,
                db_error,
            }
        };
        (hook.callback)(&info);
    }));

    if result.is_err() {
        tracing::error!(event = code, "panic in trace callback");
    }
    0
}

unsafe fn text<'a>(raw: *const c_char) -> Cow<'a, str> {
    if raw.is_null() {
        Cow::Borrowed("")
    } else {
        unsafe { CStr::from_ptr(raw) }.to_string_lossy()
    }
}

unsafe fn expanded_sql(stmt: *mut ffi::sqlite3_stmt) -> Option<String> {
    let raw = unsafe { ffi::sqlite3_expanded_sql(stmt) };
    if raw.is_null() {
        return None;
    }
    let expanded = unsafe { CStr::from_ptr(raw) }
        .to_string_lossy()
        .into_owned();
    unsafe { ffi::sqlite3_free(raw.cast::<c_void>()) };
    Some(expanded)
}
