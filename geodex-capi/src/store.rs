//! Store handles and the query entry points.

use std::ffi::c_char;

use geodex::{GeoDex, ResultSet};

use crate::result::GeodexResult;
use crate::status::{CallError, guard};
use crate::{borrow_str, reset_out};

/// Opaque handle owning one open dataset.
#[derive(Debug)]
pub struct GeodexStore {
    dataset: GeoDex,
}

/// Open the dataset at `path`.
///
/// # Returns
/// * `GEODEX_OK` with `*out_store` set to a new handle
/// * `GEODEX_ERROR_NOT_FOUND` when the file does not exist
/// * `GEODEX_ERROR_OPEN` when the file is not a usable dataset
/// * `GEODEX_ERROR_INVALID_ARGUMENT` for NULL or non-UTF-8 arguments
///
/// # Safety
/// * `path` must be NULL or a NUL-terminated string
/// * `out_store` must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_store_open(
    path: *const c_char,
    out_store: *mut *mut GeodexStore,
) -> i32 {
    guard("geodex_store_open", || {
        // SAFETY: forwarded caller contract.
        unsafe { reset_out(out_store, "out_store") }?;
        // SAFETY: forwarded caller contract.
        let path = unsafe { borrow_str(path, "path") }?;
        let dataset = geodex::create_store(path)?;
        let handle = Box::into_raw(Box::new(GeodexStore { dataset }));
        // SAFETY: `reset_out` checked the pointer.
        unsafe { out_store.write(handle) };
        Ok(())
    })
}

/// Close a store handle. Result sets obtained from it remain valid.
///
/// # Safety
/// `store` must be NULL or a handle from [`geodex_store_open`] that has not
/// been closed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_store_close(store: *mut GeodexStore) {
    if !store.is_null() {
        // SAFETY: the handle came from `Box::into_raw` in `geodex_store_open`.
        drop(unsafe { Box::from_raw(store) });
    }
}

/// Query nodes and areas tagged `amenity=<amenity>` inside a bounding box.
///
/// # Returns
/// * `GEODEX_OK` with `*out_result` set to a new result set
/// * `GEODEX_ERROR_INVALID_BBOX` for inverted or non-finite boxes
/// * `GEODEX_ERROR_QUERY` when the store fails
/// * `GEODEX_ERROR_ENCODING` when a record holds an interior NUL byte
///
/// # Safety
/// * `store` must be NULL or a live handle
/// * `amenity` must be NULL or a NUL-terminated string
/// * `out_result` must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_query_amenities(
    store: *const GeodexStore,
    amenity: *const c_char,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    out_result: *mut *mut GeodexResult,
) -> i32 {
    guard("geodex_query_amenities", || {
        // SAFETY: forwarded caller contract.
        unsafe { reset_out(out_result, "out_result") }?;
        // SAFETY: forwarded caller contract.
        let store = unsafe { store.as_ref() }.ok_or(CallError::NullArgument("store"))?;
        // SAFETY: forwarded caller contract.
        let amenity = unsafe { borrow_str(amenity, "amenity") }?;
        let results =
            geodex::query_amenities(&store.dataset, amenity, west, south, east, north)?;
        // SAFETY: `reset_out` checked the pointer.
        unsafe { publish(out_result, results) }
    })
}

/// Query features matching a raw filter expression inside a bounding box.
///
/// Returns the same codes as [`geodex_query_amenities`]; a malformed filter
/// yields `GEODEX_ERROR_QUERY`.
///
/// # Safety
/// * `store` must be NULL or a live handle
/// * `filter` must be NULL or a NUL-terminated string
/// * `out_result` must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_query(
    store: *const GeodexStore,
    filter: *const c_char,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    out_result: *mut *mut GeodexResult,
) -> i32 {
    guard("geodex_query", || {
        // SAFETY: forwarded caller contract.
        unsafe { reset_out(out_result, "out_result") }?;
        // SAFETY: forwarded caller contract.
        let store = unsafe { store.as_ref() }.ok_or(CallError::NullArgument("store"))?;
        // SAFETY: forwarded caller contract.
        let filter = unsafe { borrow_str(filter, "filter") }?;
        let results = geodex::query_raw(&store.dataset, filter, west, south, east, north)?;
        // SAFETY: `reset_out` checked the pointer.
        unsafe { publish(out_result, results) }
    })
}

/// Box `results` and hand the handle to the caller.
///
/// # Safety
/// `out_result` must be non-null and valid for writes.
unsafe fn publish(out_result: *mut *mut GeodexResult, results: ResultSet) -> Result<(), CallError> {
    let handle = Box::into_raw(Box::new(GeodexResult::new(results)?));
    // SAFETY: guaranteed by the caller.
    unsafe { out_result.write(handle) };
    Ok(())
}
