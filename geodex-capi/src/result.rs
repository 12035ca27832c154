//! Result set handles and their flattened record views.

use std::ffi::{CString, c_char};

use geodex::{FeatureRecord, ResultSet};

use crate::status::{CallError, guard};

/// `GeodexFeature::kind` value for nodes.
pub const GEODEX_KIND_NODE: i32 = 0;
/// `GeodexFeature::kind` value for ways.
pub const GEODEX_KIND_WAY: i32 = 1;
/// `GeodexFeature::kind` value for relations.
pub const GEODEX_KIND_RELATION: i32 = 2;

/// Flat view of one record.
///
/// `name` points into the owning result set and is never NULL; features
/// without a name expose an empty string.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GeodexFeature {
    /// Identifier, unique per kind.
    pub id: i64,
    /// One of the `GEODEX_KIND_*` constants.
    pub kind: i32,
    /// Representative longitude.
    pub lon: f64,
    /// Representative latitude.
    pub lat: f64,
    /// Value of the `name` tag.
    pub name: *const c_char,
    /// Number of tags, for [`geodex_result_tag`].
    pub tag_count: usize,
    /// Number of way vertices, for [`geodex_result_node`].
    pub node_count: usize,
}

/// One way vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodexNode {
    /// Node identifier.
    pub id: i64,
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
}

#[derive(Debug)]
struct RecordStrings {
    name: CString,
    tags: Vec<(CString, CString)>,
}

impl RecordStrings {
    fn new(record: &FeatureRecord) -> Result<Self, CallError> {
        let c_string = |text: &str| CString::new(text).map_err(|_| CallError::InteriorNul);
        let tags = record
            .tags
            .iter()
            .map(|(key, value)| Ok((c_string(key.as_str())?, c_string(value.as_str())?)))
            .collect::<Result<_, CallError>>()?;
        Ok(Self {
            name: c_string(record.name.as_str())?,
            tags,
        })
    }
}

/// Opaque handle owning a materialised result set and the C strings that
/// views into it point at.
#[derive(Debug)]
pub struct GeodexResult {
    results: ResultSet,
    strings: Vec<RecordStrings>,
}

impl GeodexResult {
    pub(crate) fn new(results: ResultSet) -> Result<Self, CallError> {
        let strings = results
            .iter()
            .map(RecordStrings::new)
            .collect::<Result<_, _>>()?;
        Ok(Self { results, strings })
    }

    fn record(&self, index: usize) -> Result<(&FeatureRecord, &RecordStrings), CallError> {
        let record = self.results.get(index)?;
        let strings = self.strings.get(index).ok_or(CallError::MemberIndex {
            field: "record",
            index,
            count: self.strings.len(),
        })?;
        Ok((record, strings))
    }
}

/// Number of records in a result set; 0 for NULL.
///
/// # Safety
/// `result` must be NULL or a live result handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_result_count(result: *const GeodexResult) -> usize {
    // SAFETY: forwarded caller contract.
    unsafe { result.as_ref() }.map_or(0, |result| geodex::count(&result.results))
}

/// Read record `index` into `*out_feature`.
///
/// # Returns
/// * `GEODEX_OK` on success
/// * `GEODEX_ERROR_INDEX` when `index >= geodex_result_count(result)`
///
/// # Safety
/// * `result` must be NULL or a live result handle
/// * `out_feature` must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_result_get(
    result: *const GeodexResult,
    index: usize,
    out_feature: *mut GeodexFeature,
) -> i32 {
    guard("geodex_result_get", || {
        // SAFETY: forwarded caller contract.
        let handle = unsafe { result.as_ref() }.ok_or(CallError::NullArgument("result"))?;
        if out_feature.is_null() {
            return Err(CallError::NullArgument("out_feature"));
        }
        let (record, strings) = handle.record(index)?;
        let feature = GeodexFeature {
            id: record.id,
            kind: i32::from(record.kind.code()),
            lon: record.lon,
            lat: record.lat,
            name: strings.name.as_ptr(),
            tag_count: strings.tags.len(),
            node_count: record.nodes.len(),
        };
        // SAFETY: checked non-null; writable per the caller contract.
        unsafe { out_feature.write(feature) };
        Ok(())
    })
}

/// Read tag `tag_index` of record `index`.
///
/// Both strings are owned by the result set.
///
/// # Safety
/// * `result` must be NULL or a live result handle
/// * `out_key` and `out_value` must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_result_tag(
    result: *const GeodexResult,
    index: usize,
    tag_index: usize,
    out_key: *mut *const c_char,
    out_value: *mut *const c_char,
) -> i32 {
    guard("geodex_result_tag", || {
        // SAFETY: forwarded caller contract.
        let handle = unsafe { result.as_ref() }.ok_or(CallError::NullArgument("result"))?;
        if out_key.is_null() {
            return Err(CallError::NullArgument("out_key"));
        }
        if out_value.is_null() {
            return Err(CallError::NullArgument("out_value"));
        }
        let (_, strings) = handle.record(index)?;
        let (key, value) = strings.tags.get(tag_index).ok_or(CallError::MemberIndex {
            field: "tag",
            index: tag_index,
            count: strings.tags.len(),
        })?;
        // SAFETY: both checked non-null; writable per the caller contract.
        unsafe {
            out_key.write(key.as_ptr());
            out_value.write(value.as_ptr());
        }
        Ok(())
    })
}

/// Read vertex `node_index` of the way at record `index`.
///
/// Records other than ways have no vertices.
///
/// # Safety
/// * `result` must be NULL or a live result handle
/// * `out_node` must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_result_node(
    result: *const GeodexResult,
    index: usize,
    node_index: usize,
    out_node: *mut GeodexNode,
) -> i32 {
    guard("geodex_result_node", || {
        // SAFETY: forwarded caller contract.
        let handle = unsafe { result.as_ref() }.ok_or(CallError::NullArgument("result"))?;
        if out_node.is_null() {
            return Err(CallError::NullArgument("out_node"));
        }
        let (record, _) = handle.record(index)?;
        let vertex = record.nodes.get(node_index).ok_or(CallError::MemberIndex {
            field: "vertex",
            index: node_index,
            count: record.nodes.len(),
        })?;
        let node = GeodexNode {
            id: vertex.id,
            lon: vertex.lon,
            lat: vertex.lat,
        };
        // SAFETY: checked non-null; writable per the caller contract.
        unsafe { out_node.write(node) };
        Ok(())
    })
}

/// Serialise every record as a JSON array into `*out_json`.
///
/// Release the string with [`crate::geodex_free_string`].
///
/// # Safety
/// * `result` must be NULL or a live result handle
/// * `out_json` must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_result_to_json(
    result: *const GeodexResult,
    out_json: *mut *mut c_char,
) -> i32 {
    guard("geodex_result_to_json", || {
        // SAFETY: forwarded caller contract.
        unsafe { crate::reset_out(out_json, "out_json") }?;
        // SAFETY: forwarded caller contract.
        let handle = unsafe { result.as_ref() }.ok_or(CallError::NullArgument("result"))?;
        let json = serde_json::to_string(&geodex::to_list(&handle.results))?;
        let json = CString::new(json).map_err(|_| CallError::InteriorNul)?;
        // SAFETY: `reset_out` checked the pointer.
        unsafe { out_json.write(json.into_raw()) };
        Ok(())
    })
}

/// Release a result set and every string it owns.
///
/// # Safety
/// `result` must be NULL or a live result handle, and must not be used
/// afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geodex_result_free(result: *mut GeodexResult) {
    if !result.is_null() {
        // SAFETY: the handle came from `Box::into_raw` in a query function.
        drop(unsafe { Box::from_raw(result) });
    }
}
