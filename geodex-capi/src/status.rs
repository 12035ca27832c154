//! Status codes, the per-thread last error and the panic boundary.

use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use geodex::{IndexError, OpenError, QueryError};
use log::error;
use thiserror::Error;

/// The call succeeded.
pub const GEODEX_OK: i32 = 0;
/// A required pointer was NULL or a string was not UTF-8.
pub const GEODEX_ERROR_INVALID_ARGUMENT: i32 = -1;
/// The dataset file does not exist.
pub const GEODEX_ERROR_NOT_FOUND: i32 = -2;
/// The dataset exists but could not be opened as a geodex dataset.
pub const GEODEX_ERROR_OPEN: i32 = -3;
/// The bounding box was inverted or not finite.
pub const GEODEX_ERROR_INVALID_BBOX: i32 = -4;
/// The store rejected the filter or failed while reading.
pub const GEODEX_ERROR_QUERY: i32 = -5;
/// A record, tag or vertex index was out of range.
pub const GEODEX_ERROR_INDEX: i32 = -6;
/// A result could not be represented as a C string or JSON document.
pub const GEODEX_ERROR_ENCODING: i32 = -7;
/// The library panicked; the message describes where.
pub const GEODEX_ERROR_PANIC: i32 = -8;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Failure of one C ABI call, carried until it becomes a status code.
#[derive(Debug, Error)]
pub(crate) enum CallError {
    #[error("{0} must not be NULL")]
    NullArgument(&'static str),
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("{field} {index} is out of range for a record with {count}")]
    MemberIndex {
        field: &'static str,
        index: usize,
        count: usize,
    },
    #[error("result contains a string with an interior NUL byte")]
    InteriorNul,
    #[error("failed to encode result as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CallError {
    pub(crate) const fn status(&self) -> i32 {
        match self {
            Self::NullArgument(_) | Self::InvalidUtf8(_) => GEODEX_ERROR_INVALID_ARGUMENT,
            Self::Open(OpenError::NotFound { .. }) => GEODEX_ERROR_NOT_FOUND,
            Self::Open(_) => GEODEX_ERROR_OPEN,
            Self::Query(QueryError::InvalidBoundingBox(_)) => GEODEX_ERROR_INVALID_BBOX,
            Self::Query(_) => GEODEX_ERROR_QUERY,
            Self::Index(_) | Self::MemberIndex { .. } => GEODEX_ERROR_INDEX,
            Self::InteriorNul | Self::Json(_) => GEODEX_ERROR_ENCODING,
        }
    }
}

fn set_last_error(message: &str) {
    let stored = CString::new(message.replace('\0', " ")).ok();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = stored);
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Run `operation` behind the panic boundary and turn its outcome into a
/// status code, recording the message of any failure.
pub(crate) fn guard<F>(operation: &str, body: F) -> i32
where
    F: FnOnce() -> Result<(), CallError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => {
            clear_last_error();
            GEODEX_OK
        }
        Ok(Err(err)) => {
            let message = err.to_string();
            error!("{operation} failed: {message}");
            set_last_error(&message);
            err.status()
        }
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|text| (*text).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            error!("{operation} panicked: {detail}");
            set_last_error(&format!("panic in {operation}: {detail}"));
            GEODEX_ERROR_PANIC
        }
    }
}

/// Message describing the most recent failure on the calling thread.
///
/// Returns NULL when the last call on this thread succeeded. The pointer
/// stays valid until the next geodex call on the same thread; do not free it.
#[unsafe(no_mangle)]
pub extern "C" fn geodex_last_error_message() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |message| message.as_ptr())
    })
}
