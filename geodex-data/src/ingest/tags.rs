//! Tag utilities for feature extraction.
//!
//! Elements are kept when they carry at least one descriptive tag. Editor
//! bookkeeping such as `created_by` or `source` does not make an element a
//! feature on its own.
use geodex_core::Tags;

pub(super) fn has_descriptive_tag<'a, T>(tags: T) -> bool
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter().any(|(key, _)| is_descriptive_key(key))
}

/// Collect tags in element order, keeping duplicate keys.
pub(super) fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

fn is_descriptive_key(key: &str) -> bool {
    !matches!(key, "created_by" | "source" | "note" | "fixme" | "FIXME")
        && !key.starts_with("source:")
}
