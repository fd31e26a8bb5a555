//! Core type definitions for cadledger.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The two entity domains kept mutually consistent by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Geometric entities (vertices, curves, surfaces, volumes).
    Geometry,
    /// Topological entities built on top of the geometry.
    Topology,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geometry => f.write_str("geometry"),
            Self::Topology => f.write_str("topology"),
        }
    }
}

/// Topological dimension of an entity, 0 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dimension(u8);

impl Dimension {
    /// Points.
    pub const D0: Self = Self(0);
    /// Curves and edges.
    pub const D1: Self = Self(1);
    /// Surfaces and faces.
    pub const D2: Self = Self(2);
    /// Volumes and blocks.
    pub const D3: Self = Self(3);

    /// All dimensions in ascending order.
    pub const ALL: [Self; 4] = [Self::D0, Self::D1, Self::D2, Self::D3];

    /// Creates a dimension, rejecting anything above 3.
    pub fn new(value: u8) -> CoreResult<Self> {
        if value <= 3 {
            Ok(Self(value))
        } else {
            Err(CoreError::invariant(format!("unexpected dimension {value}")))
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns the value as a collection index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the next dimension up, if any.
    #[must_use]
    pub const fn up(self) -> Option<Self> {
        if self.0 < 3 {
            Some(Self(self.0 + 1))
        } else {
            None
        }
    }

    /// Returns the next dimension down, if any.
    #[must_use]
    pub const fn down(self) -> Option<Self> {
        if self.0 > 0 {
            Some(Self(self.0 - 1))
        } else {
            None
        }
    }
}

impl TryFrom<u8> for Dimension {
    type Error = CoreError;

    fn try_from(value: u8) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a submitted command.
///
/// Command IDs are monotonically increasing within a session and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub u64);

impl CommandId {
    /// Creates a new command ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd:{}", self.0)
    }
}

/// Identifier of an editing session, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_bounds() {
        assert!(Dimension::new(3).is_ok());
        let err = Dimension::new(4).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn dimension_neighbours() {
        assert_eq!(Dimension::D0.up(), Some(Dimension::D1));
        assert_eq!(Dimension::D3.up(), None);
        assert_eq!(Dimension::D0.down(), None);
        assert_eq!(Dimension::D2.down(), Some(Dimension::D1));
    }

    #[test]
    fn command_id_display() {
        assert_eq!(format!("{}", CommandId::new(42)), "cmd:42");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
