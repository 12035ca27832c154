//! Filter expressions understood by the bundled stores.
//!
//! A query is one or more comma-separated selectors. Each selector names the
//! feature types it accepts and a list of tag clauses that must all hold:
//!
//! ```text
//! na[amenity=restaurant,cafe]     nodes and areas tagged as either amenity
//! w[highway][!access]             non-area ways with a highway tag and no access tag
//! a[building], n[shop]            either selector may match
//! *[name='St. Mary\'s']           any feature with that exact name
//! ```
//!
//! Type letters are `n` (nodes), `w` (ways that are not areas), `a` (areas:
//! closed ways and multipolygon or boundary relations) and `r` (other
//! relations); `*` accepts everything. `[k]` holds when `k` is present with a
//! value other than `no`, `[!k]` is its negation, `[k=v1,v2]` holds when the
//! value is listed, and `[k!=v1,v2]` holds when it is absent or unlisted.

use std::str::FromStr;

use thiserror::Error;

use crate::FeatureKind;

mod parser;

/// Error reported for malformed filter expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter {expression:?} at offset {position}: expected {expected}")]
pub struct FilterSyntaxError {
    /// Expression as supplied.
    pub expression: String,
    /// Byte offset of the offending character.
    pub position: usize,
    /// Description of what the parser was looking for.
    pub expected: &'static str,
}

/// A parsed filter expression.
///
/// # Examples
/// ```
/// use geodex_core::{FeatureKind, Filter};
///
/// let filter: Filter = "na[amenity=cafe]".parse().unwrap();
/// let tags = vec![("amenity".to_string(), "cafe".to_string())];
/// assert!(filter.matches(FeatureKind::Node, false, &tags));
/// assert!(!filter.matches(FeatureKind::Way, false, &tags));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    selectors: Vec<Selector>,
}

/// Feature types accepted by a selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSet {
    /// Accept nodes.
    pub nodes: bool,
    /// Accept ways that are not areas.
    pub ways: bool,
    /// Accept areas.
    pub areas: bool,
    /// Accept relations that are not areas.
    pub relations: bool,
}

impl KindSet {
    /// Accept every feature type.
    pub const ALL: Self = Self {
        nodes: true,
        ways: true,
        areas: true,
        relations: true,
    };

    /// Whether a feature of `kind` with the given area classification passes.
    #[must_use]
    pub const fn accepts(self, kind: FeatureKind, is_area: bool) -> bool {
        match kind {
            FeatureKind::Node => self.nodes,
            FeatureKind::Way | FeatureKind::Relation if is_area => self.areas,
            FeatureKind::Way => self.ways,
            FeatureKind::Relation => self.relations,
        }
    }
}

/// Single bracketed tag predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagClause {
    /// `[key]`
    Present(String),
    /// `[!key]`
    Absent(String),
    /// `[key=a,b]`
    OneOf {
        /// Tag key.
        key: String,
        /// Accepted values.
        values: Vec<String>,
    },
    /// `[key!=a,b]`
    NoneOf {
        /// Tag key.
        key: String,
        /// Rejected values.
        values: Vec<String>,
    },
}

impl TagClause {
    fn holds(&self, tags: &[(String, String)]) -> bool {
        match self {
            Self::Present(key) => is_set(lookup(tags, key)),
            Self::Absent(key) => !is_set(lookup(tags, key)),
            Self::OneOf { key, values } => {
                lookup(tags, key).is_some_and(|value| values.iter().any(|v| v == value))
            }
            Self::NoneOf { key, values } => {
                lookup(tags, key).is_none_or(|value| values.iter().all(|v| v != value))
            }
        }
    }
}

/// One type-restricted conjunction of tag clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Accepted feature types.
    pub kinds: KindSet,
    /// Clauses that must all hold.
    pub clauses: Vec<TagClause>,
}

impl Filter {
    /// Parse a filter expression.
    pub fn parse(expression: &str) -> Result<Self, FilterSyntaxError> {
        parser::parse(expression)
    }

    /// Selectors in source order.
    #[must_use]
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Whether any selector accepts the feature type, ignoring tags.
    ///
    /// Stores use this to skip loading tags for features that cannot match.
    #[must_use]
    pub fn accepts_kind(&self, kind: FeatureKind, is_area: bool) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.kinds.accepts(kind, is_area))
    }

    /// Whether a feature with these properties satisfies the filter.
    #[must_use]
    pub fn matches(&self, kind: FeatureKind, is_area: bool, tags: &[(String, String)]) -> bool {
        self.selectors.iter().any(|selector| {
            selector.kinds.accepts(kind, is_area)
                && selector.clauses.iter().all(|clause| clause.holds(tags))
        })
    }
}

impl FromStr for Filter {
    type Err = FilterSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Quote `value` as a filter string literal.
///
/// Backslashes and single quotes are escaped, so the literal always parses
/// back to `value` and never alters the surrounding expression.
///
/// # Examples
/// ```
/// use geodex_core::filter::quote;
///
/// assert_eq!(quote("cafe"), "'cafe'");
/// assert_eq!(quote("o'neill"), r"'o\'neill'");
/// ```
#[must_use]
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    quoted
}

/// Filter selecting nodes and areas tagged `amenity` with exactly `amenity`.
#[must_use]
pub fn amenity_filter(amenity: &str) -> String {
    format!("na[amenity={}]", quote(amenity))
}

fn lookup<'a>(tags: &'a [(String, String)], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| v != "no")
}
