//! Road and phase identifiers.
//!
//! The four approach roads are partitioned into two fixed phase groups:
//! A = {north, south}, B = {east, west}. The partition never changes.

use serde::{Deserialize, Deserializer, Serialize};

/// One approach road of an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadId {
    /// Northern approach
    North,
    /// Southern approach
    South,
    /// Eastern approach
    East,
    /// Western approach
    West,
}

impl RoadId {
    /// All roads in canonical enumeration order.
    ///
    /// This order is load-bearing: the emergency tier scans it and the
    /// first ambulance-bearing road decides the emergency phase.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Returns the phase group this road belongs to.
    #[must_use]
    pub const fn group(self) -> PhaseGroup {
        match self {
            Self::North | Self::South => PhaseGroup::A,
            Self::East | Self::West => PhaseGroup::B,
        }
    }

    /// Returns the lowercase road name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

impl std::fmt::Display for RoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoadId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Self::North),
            "south" => Ok(Self::South),
            "east" => Ok(Self::East),
            "west" => Ok(Self::West),
            other => Err(format!(
                "unknown road '{other}' (expected north, south, east or west)"
            )),
        }
    }
}

/// A pair of opposing roads that are green together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseGroup {
    /// North/south
    A,
    /// East/west
    B,
}

impl PhaseGroup {
    /// Both groups, A first. Ties between groups resolve to the first entry.
    pub const BOTH: [Self; 2] = [Self::A, Self::B];

    /// Returns the two roads of this group.
    #[must_use]
    pub const fn roads(self) -> [RoadId; 2] {
        match self {
            Self::A => [RoadId::North, RoadId::South],
            Self::B => [RoadId::East, RoadId::West],
        }
    }

    /// Returns `true` if `road` belongs to this group.
    #[must_use]
    pub const fn contains(self, road: RoadId) -> bool {
        matches!(
            (self, road.group()),
            (Self::A, PhaseGroup::A) | (Self::B, PhaseGroup::B)
        )
    }

    /// Returns the opposing group.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl std::fmt::Display for PhaseGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// Identifier of a controlled intersection.
///
/// Opaque string in general; the built-in route agent additionally
/// interprets numeric ids as positions along a corridor.
///
/// Deserializes from a string or an unsigned integer, so unquoted YAML
/// keys like `1:` work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IntersectionId(pub String);

impl<'de> Deserialize<'de> for IntersectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

impl IntersectionId {
    /// Creates a new `IntersectionId`.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the id as a corridor position, if it is numeric.
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }
}

impl std::fmt::Display for IntersectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IntersectionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for IntersectionId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}
