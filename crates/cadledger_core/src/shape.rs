//! Geometric payload carried by entities.
//!
//! The engine treats [`ShapeData`] as opaque: it copies it into snapshots and
//! hands it to the kernel, nothing more. The affine [`Transform`] lives here
//! because both the kernel and the topology domain apply it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Tolerance used when comparing coordinates.
pub const EPSILON: f64 = 1e-9;

/// A point (or vector) in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Point3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Point3 {
    /// The origin.
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Euclidean length.
    #[must_use]
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns the unit vector, or `None` for a zero vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        if n < EPSILON {
            None
        } else {
            Some(self * (1.0 / n))
        }
    }

    /// Compares two points within [`EPSILON`].
    #[must_use]
    pub fn approx_eq(self, other: Self) -> bool {
        (self - other).norm() < EPSILON
    }

    /// Linear interpolation between `self` and `other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

impl Add for Point3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Geometric data of one entity: its defining points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeData {
    /// Defining points, in construction order.
    pub points: Vec<Point3>,
}

impl ShapeData {
    /// Creates shape data from points.
    #[must_use]
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    /// Shape of a single point.
    #[must_use]
    pub fn point(p: Point3) -> Self {
        Self { points: vec![p] }
    }

    /// Returns true if the shape has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns true if `p` is one of the defining points.
    #[must_use]
    pub fn contains(&self, p: Point3) -> bool {
        self.points.iter().any(|q| q.approx_eq(p))
    }

    /// Appends points not already present.
    pub fn merge(&mut self, other: &ShapeData) {
        for p in &other.points {
            if !self.contains(*p) {
                self.points.push(*p);
            }
        }
    }

    /// Returns a transformed copy.
    #[must_use]
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            points: self.points.iter().map(|p| transform.apply(*p)).collect(),
        }
    }
}

/// A plane given by a point and a normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// A point on the plane.
    pub origin: Point3,
    /// Plane normal (need not be unit length).
    pub normal: Point3,
}

impl Plane {
    /// Signed distance from `p` to the plane, or `None` for a degenerate normal.
    #[must_use]
    pub fn signed_distance(&self, p: Point3) -> Option<f64> {
        self.normal.normalized().map(|n| (p - self.origin).dot(n))
    }
}

/// Affine transformation applied to whole entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Translation by a vector.
    Translate {
        /// Translation vector.
        vector: Point3,
    },
    /// Rotation around an axis, angle in degrees.
    Rotate {
        /// A point on the axis.
        origin: Point3,
        /// Axis direction.
        axis: Point3,
        /// Angle in degrees, right-hand rule.
        degrees: f64,
    },
    /// Uniform scaling about a center.
    Scale {
        /// Fixed point of the scaling.
        center: Point3,
        /// Scale factor, must be non-zero.
        factor: f64,
    },
    /// Reflection through a plane.
    Mirror {
        /// Mirror plane.
        plane: Plane,
    },
}

impl Transform {
    /// Short operation name used in traces.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Translate { .. } => "translate",
            Self::Rotate { .. } => "rotate",
            Self::Scale { .. } => "scale",
            Self::Mirror { .. } => "mirror",
        }
    }

    /// Returns an error message if the transform is degenerate.
    #[must_use]
    pub fn degeneracy(&self) -> Option<&'static str> {
        match self {
            Self::Rotate { axis, .. } if axis.normalized().is_none() => Some("zero rotation axis"),
            Self::Scale { factor, .. } if factor.abs() < EPSILON => Some("zero scale factor"),
            Self::Mirror { plane } if plane.normal.normalized().is_none() => {
                Some("zero mirror normal")
            }
            _ => None,
        }
    }

    /// Applies the transform to a point. Degenerate transforms leave it unchanged.
    #[must_use]
    pub fn apply(&self, p: Point3) -> Point3 {
        match *self {
            Self::Translate { vector } => p + vector,
            Self::Rotate {
                origin,
                axis,
                degrees,
            } => {
                let Some(k) = axis.normalized() else {
                    return p;
                };
                let v = p - origin;
                let (sin, cos) = degrees.to_radians().sin_cos();
                // Rodrigues' rotation formula
                let rotated = v * cos + k.cross(v) * sin + k * (k.dot(v) * (1.0 - cos));
                origin + rotated
            }
            Self::Scale { center, factor } => center + (p - center) * factor,
            Self::Mirror { plane } => match (plane.normal.normalized(), plane.signed_distance(p)) {
                (Some(n), Some(d)) => p - n * (2.0 * d),
                _ => p,
            },
        }
    }
}
