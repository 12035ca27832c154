//! C ABI for geodex.
//!
//! The functions here mirror the boundary surface of the `geodex` crate so a
//! host runtime can open a dataset, run queries and read flattened results
//! in-process.
//!
//! Conventions:
//! - Every fallible call returns one of the `GEODEX_*` status codes and
//!   writes its product through an out-pointer. On failure the out-pointer is
//!   set to NULL and [`geodex_last_error_message`] describes the error.
//! - Handles are opaque. Stores are released with [`geodex_store_close`] and
//!   result sets with [`geodex_result_free`]; result sets stay valid after
//!   their store is closed.
//! - Strings reachable from a [`GeodexFeature`] or [`geodex_result_tag`] are
//!   owned by the result set. Strings returned as `char *` are owned by the
//!   caller and released with [`geodex_free_string`].
//! - A store handle must not be used from two threads at once.
//!
//! ```c
//! GeodexStore *store = NULL;
//! if (geodex_store_open("london.geodex", &store) != GEODEX_OK) {
//!     fprintf(stderr, "%s\n", geodex_last_error_message());
//!     return 1;
//! }
//! GeodexResult *cafes = NULL;
//! geodex_query_amenities(store, "cafe", -0.2, 51.5, 0.0, 51.6, &cafes);
//! for (size_t i = 0; i < geodex_result_count(cafes); i++) {
//!     GeodexFeature feature;
//!     geodex_result_get(cafes, i, &feature);
//!     printf("%s\n", feature.name);
//! }
//! geodex_result_free(cafes);
//! geodex_store_close(store);
//! ```

use std::ffi::{CStr, CString, c_char};

mod result;
mod status;
mod store;

pub use result::{
    GEODEX_KIND_NODE, GEODEX_KIND_RELATION, GEODEX_KIND_WAY, GeodexFeature, GeodexNode,
    GeodexResult, geodex_result_count, geodex_result_free, geodex_result_get,
    geodex_result_node, geodex_result_tag, geodex_result_to_json,
};
pub use status::{
    GEODEX_ERROR_ENCODING, GEODEX_ERROR_INDEX, GEODEX_ERROR_INVALID_ARGUMENT,
    GEODEX_ERROR_INVALID_BBOX, GEODEX_ERROR_NOT_FOUND, GEODEX_ERROR_OPEN, GEODEX_ERROR_PANIC,
    GEODEX_ERROR_QUERY, GEODEX_OK, geodex_last_error_message,
};
pub use store::{
    GeodexStore, geodex_query, geodex_query_amenities, geodex_store_close, geodex_store_open,
};

use status::CallError;

const VERSION: &CStr = match CStr::from_bytes_with_nul(
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes(),
) {
    Ok(version) => version,
    Err(_) => c"unknown",
};

/// Library version, for example `"0.1.0"`.
///
/// The pointer is valid for the lifetime of the program; do not free it.
#[unsafe(no_mangle)]
pub extern "C" fn geodex_version() -> *const c_char {
    VERSION.as_ptr()
}

/// Release a string returned by this library.
///
/// # Safety
/// `string` must be NULL or a pointer returned as `char *` by a geodex
/// function, and must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_free_string(string: *mut c_char) {
    if !string.is_null() {
        // SAFETY: the pointer came from `CString::into_raw` in this library.
        drop(unsafe { CString::from_raw(string) });
    }
}

/// Borrow a caller string as UTF-8.
///
/// # Safety
/// `ptr` must be NULL or point to a NUL-terminated string that outlives `'a`.
unsafe fn borrow_str<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str, CallError> {
    if ptr.is_null() {
        return Err(CallError::NullArgument(name));
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| CallError::InvalidUtf8(name))
}

/// Clear an out-pointer so that failed calls leave NULL behind.
///
/// # Safety
/// `out` must be NULL or valid for writes.
unsafe fn reset_out<T>(out: *mut *mut T, name: &'static str) -> Result<(), CallError> {
    if out.is_null() {
        return Err(CallError::NullArgument(name));
    }
    // SAFETY: checked non-null; writable per the caller contract.
    unsafe { out.write(std::ptr::null_mut()) };
    Ok(())
}
