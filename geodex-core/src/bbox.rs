//! Query bounding boxes.

use std::{fmt, str::FromStr};

use geo::{Coord, Rect};
use thiserror::Error;

/// Axis-aligned box in WGS84 degrees, ordered west, south, east, north.
///
/// Regions crossing the antimeridian are not modelled; split them into two
/// boxes and query each.
///
/// # Examples
/// ```
/// use geodex_core::BoundingBox;
///
/// let london: BoundingBox = "-0.2,51.5,0.0,51.6".parse().unwrap();
/// assert_eq!(london, BoundingBox::new(-0.2, 51.5, 0.0, 51.6));
/// assert!(london.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

/// Reasons a [`BoundingBox`] is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BoundingBoxError {
    /// A coordinate was NaN or infinite.
    #[error("bounding box coordinates must be finite")]
    NonFinite,
    /// `west` lies east of `east`.
    #[error("bounding box west {west} lies east of east {east}")]
    InvertedLongitude {
        /// Western edge as supplied.
        west: f64,
        /// Eastern edge as supplied.
        east: f64,
    },
    /// `south` lies north of `north`.
    #[error("bounding box south {south} lies north of north {north}")]
    InvertedLatitude {
        /// Southern edge as supplied.
        south: f64,
        /// Northern edge as supplied.
        north: f64,
    },
}

impl BoundingBox {
    /// Create a bounding box from its four edges.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Square box of `radius` degrees around a centre point.
    #[must_use]
    pub fn from_center(lon: f64, lat: f64, radius: f64) -> Self {
        Self::new(lon - radius, lat - radius, lon + radius, lat + radius)
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.west.min(other.west),
            self.south.min(other.south),
            self.east.max(other.east),
            self.north.max(other.north),
        )
    }

    /// Check that the edges are finite and not inverted.
    ///
    /// Zero-width and zero-height boxes are accepted; they select features
    /// touching a line or a point.
    pub fn validate(&self) -> Result<(), BoundingBoxError> {
        let edges = [self.west, self.south, self.east, self.north];
        if edges.iter().any(|edge| !edge.is_finite()) {
            return Err(BoundingBoxError::NonFinite);
        }
        if self.west > self.east {
            return Err(BoundingBoxError::InvertedLongitude {
                west: self.west,
                east: self.east,
            });
        }
        if self.south > self.north {
            return Err(BoundingBoxError::InvertedLatitude {
                south: self.south,
                north: self.north,
            });
        }
        Ok(())
    }

    /// Validated conversion to a `geo` rectangle (`x = longitude`).
    pub fn to_rect(&self) -> Result<Rect<f64>, BoundingBoxError> {
        self.validate()?;
        Ok(Rect::new(
            Coord {
                x: self.west,
                y: self.south,
            },
            Coord {
                x: self.east,
                y: self.north,
            },
        ))
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

/// Error returned when parsing a `west,south,east,north` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseBoundingBoxError {
    /// The input did not contain exactly four comma-separated values.
    #[error("expected four comma-separated coordinates (west,south,east,north), found {0}")]
    WrongArity(usize),
    /// A component was not a decimal number.
    #[error("invalid coordinate {value:?}")]
    InvalidCoordinate {
        /// Offending component.
        value: String,
    },
}

impl FromStr for BoundingBox {
    type Err = ParseBoundingBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [west, south, east, north] = parts.as_slice() else {
            return Err(ParseBoundingBoxError::WrongArity(parts.len()));
        };
        let parse = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|_| ParseBoundingBoxError::InvalidCoordinate {
                    value: value.to_owned(),
                })
        };
        Ok(Self::new(
            parse(*west)?,
            parse(*south)?,
            parse(*east)?,
            parse(*north)?,
        ))
    }
}
