//! Round trips through the exported C functions.

use std::ffi::{CStr, CString, c_char};
use std::ptr;

use geodex_capi::*;
use geodex_core::test_support::write_sample_dataset;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const LONDON: (f64, f64, f64, f64) = (-0.2, 51.5, 0.0, 51.6);

struct OpenStore {
    _dir: TempDir,
    store: *mut GeodexStore,
}

impl Drop for OpenStore {
    fn drop(&mut self) {
        // SAFETY: the handle is either NULL or came from `geodex_store_open`.
        unsafe { geodex_store_close(self.store) };
    }
}

#[fixture]
fn open_store() -> OpenStore {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("sample.geodex");
    write_sample_dataset(&path).expect("write sample dataset");
    let c_path = CString::new(path.to_str().expect("utf-8 path")).expect("no NUL");
    let mut store = ptr::null_mut();
    // SAFETY: valid C string and out-pointer.
    let status = unsafe { geodex_store_open(c_path.as_ptr(), &mut store) };
    assert_eq!(status, GEODEX_OK, "{:?}", last_error());
    assert!(!store.is_null());
    OpenStore { _dir: dir, store }
}

fn last_error() -> Option<String> {
    let message = geodex_last_error_message();
    (!message.is_null()).then(|| {
        // SAFETY: non-null messages are NUL-terminated and owned by the library.
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    })
}

fn text(ptr: *const c_char) -> String {
    // SAFETY: the pointer comes from a live result set.
    unsafe { CStr::from_ptr(ptr) }.to_str().expect("utf-8").to_owned()
}

fn query(store: &OpenStore, filter: &str, bbox: (f64, f64, f64, f64)) -> (i32, *mut GeodexResult) {
    let filter = CString::new(filter).expect("no NUL");
    let mut result = ptr::null_mut();
    let (west, south, east, north) = bbox;
    // SAFETY: live store handle, valid C string and out-pointer.
    let status = unsafe {
        geodex_query(store.store, filter.as_ptr(), west, south, east, north, &mut result)
    };
    (status, result)
}

fn feature(result: *const GeodexResult, index: usize) -> (i32, GeodexFeature) {
    let mut feature = GeodexFeature {
        id: 0,
        kind: -1,
        lon: 0.0,
        lat: 0.0,
        name: ptr::null(),
        tag_count: 0,
        node_count: 0,
    };
    // SAFETY: live result handle and out-pointer.
    let status = unsafe { geodex_result_get(result, index, &mut feature) };
    (status, feature)
}

#[rstest]
fn amenity_query_reads_three_cafes(open_store: OpenStore) {
    let amenity = CString::new("cafe").expect("no NUL");
    let mut result = ptr::null_mut();
    let (west, south, east, north) = LONDON;
    // SAFETY: live store handle, valid C string and out-pointer.
    let status = unsafe {
        geodex_query_amenities(
            open_store.store,
            amenity.as_ptr(),
            west,
            south,
            east,
            north,
            &mut result,
        )
    };
    assert_eq!(status, GEODEX_OK);
    // SAFETY: live result handle.
    assert_eq!(unsafe { geodex_result_count(result) }, 3);

    let names: Vec<String> = (0..3)
        .map(|index| {
            let (status, feature) = feature(result, index);
            assert_eq!(status, GEODEX_OK);
            assert_eq!(feature.kind, GEODEX_KIND_NODE);
            text(feature.name)
        })
        .collect();
    assert_eq!(names, vec!["Fika", "Kaffeine", ""]);

    let (status, first) = feature(result, 0);
    assert_eq!(status, GEODEX_OK);
    let mut key = ptr::null();
    let mut value = ptr::null();
    let tags: Vec<(String, String)> = (0..first.tag_count)
        .map(|tag_index| {
            // SAFETY: live result handle and out-pointers.
            let status = unsafe { geodex_result_tag(result, 0, tag_index, &mut key, &mut value) };
            assert_eq!(status, GEODEX_OK);
            (text(key), text(value))
        })
        .collect();
    assert!(tags.contains(&("amenity".to_owned(), "cafe".to_owned())));

    let (status, _) = feature(result, 3);
    assert_eq!(status, GEODEX_ERROR_INDEX);
    assert!(last_error().is_some_and(|message| message.contains("out of range")));

    // SAFETY: the handle is freed exactly once.
    unsafe { geodex_result_free(result) };
}

#[rstest]
fn way_vertices_are_readable_after_the_store_closes(mut open_store: OpenStore) {
    let (status, result) = query(&open_store, "w[highway]", LONDON);
    assert_eq!(status, GEODEX_OK);
    // SAFETY: closing once; the fixture's drop then sees NULL.
    unsafe { geodex_store_close(open_store.store) };
    open_store.store = ptr::null_mut();

    let (status, road) = feature(result, 0);
    assert_eq!(status, GEODEX_OK);
    assert_eq!(road.kind, GEODEX_KIND_WAY);
    let ids: Vec<i64> = (0..road.node_count)
        .map(|node_index| {
            let mut node = GeodexNode {
                id: 0,
                lon: 0.0,
                lat: 0.0,
            };
            // SAFETY: live result handle and out-pointer.
            let status = unsafe { geodex_result_node(result, 0, node_index, &mut node) };
            assert_eq!(status, GEODEX_OK);
            node.id
        })
        .collect();
    assert_eq!(ids, vec![100, 101, 102]);

    // SAFETY: the handle is freed exactly once.
    unsafe { geodex_result_free(result) };
}

#[rstest]
fn results_serialise_to_json(open_store: OpenStore) {
    let (status, result) = query(&open_store, "n[amenity=cafe]", LONDON);
    assert_eq!(status, GEODEX_OK);
    let mut json = ptr::null_mut();
    // SAFETY: live result handle and out-pointer.
    let status = unsafe { geodex_result_to_json(result, &mut json) };
    assert_eq!(status, GEODEX_OK);

    let parsed: serde_json::Value = serde_json::from_str(&text(json)).expect("valid JSON");
    let records = parsed.as_array().expect("JSON array");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["name"], "Fika");

    // SAFETY: each pointer is freed exactly once.
    unsafe {
        geodex_free_string(json);
        geodex_result_free(result);
    }
}

#[rstest]
#[case::malformed_filter("na[amenity=cafe", LONDON, GEODEX_ERROR_QUERY)]
#[case::inverted_box("*", (0.0, 51.5, -0.2, 51.6), GEODEX_ERROR_INVALID_BBOX)]
#[case::non_finite_box("*", (f64::NAN, 51.5, 0.0, 51.6), GEODEX_ERROR_INVALID_BBOX)]
fn failed_queries_report_status_and_leave_null(
    open_store: OpenStore,
    #[case] filter: &str,
    #[case] bbox: (f64, f64, f64, f64),
    #[case] expected: i32,
) {
    let (status, result) = query(&open_store, filter, bbox);
    assert_eq!(status, expected);
    assert!(result.is_null());
    assert!(last_error().is_some());
}

#[rstest]
fn opening_a_missing_dataset_reports_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.geodex");
    let c_path = CString::new(path.to_str().expect("utf-8 path")).expect("no NUL");
    let mut store = ptr::null_mut();
    // SAFETY: valid C string and out-pointer.
    let status = unsafe { geodex_store_open(c_path.as_ptr(), &mut store) };
    assert_eq!(status, GEODEX_ERROR_NOT_FOUND);
    assert!(store.is_null());
    assert!(last_error().is_some_and(|message| message.contains("does not exist")));
}

#[rstest]
fn null_arguments_are_rejected() {
    let mut store = ptr::null_mut();
    // SAFETY: NULL inputs are part of the contract.
    let status = unsafe { geodex_store_open(ptr::null(), &mut store) };
    assert_eq!(status, GEODEX_ERROR_INVALID_ARGUMENT);
    // SAFETY: as above.
    assert_eq!(unsafe { geodex_result_count(ptr::null()) }, 0);
    // SAFETY: as above.
    unsafe {
        geodex_result_free(ptr::null_mut());
        geodex_store_close(ptr::null_mut());
    }
}
