//! Grid coordinates and the eight movement directions.
//!
//! The world is a square grid indexed by `(x, y)`, with `y` growing
//! southward. A step is encoded as a single digit `code = (dy + 1) * 3 +
//! (dx + 1)`, so `4` (no move) is never a valid [`Direction`].

use serde::{Deserialize, Serialize};

/// A tile position on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Column, growing eastward.
    pub x: i32,
    /// Row, growing southward.
    pub y: i32,
}

impl Coord {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring coordinate one step in `direction`.
    ///
    /// Returns `None` only when the step would overflow `i32`.
    pub fn step(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.offset();
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }

    /// Chebyshev (king-move) distance to `other`.
    pub const fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }

    /// The direction leading from `self` to an adjacent `other`.
    ///
    /// Returns `None` when the two coordinates are equal or not adjacent.
    pub fn direction_to(self, other: Self) -> Option<Direction> {
        let dx = other.x.checked_sub(self.x)?;
        let dy = other.y.checked_sub(self.y)?;
        Direction::from_offset(dx, dy)
    }
}

impl core::fmt::Display for Coord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the eight king-move directions.
///
/// Serialized as its single-digit step code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Direction {
    /// dx = -1, dy = -1.
    NorthWest,
    /// dx = 0, dy = -1.
    North,
    /// dx = +1, dy = -1.
    NorthEast,
    /// dx = -1, dy = 0.
    West,
    /// dx = +1, dy = 0.
    East,
    /// dx = -1, dy = +1.
    SouthWest,
    /// dx = 0, dy = +1.
    South,
    /// dx = +1, dy = +1.
    SouthEast,
}

impl Direction {
    /// All directions in ascending step-code order.
    pub const ALL: [Self; 8] = [
        Self::NorthWest,
        Self::North,
        Self::NorthEast,
        Self::West,
        Self::East,
        Self::SouthWest,
        Self::South,
        Self::SouthEast,
    ];

    /// The `(dx, dy)` offset of one step.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::NorthWest => (-1, -1),
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::West => (-1, 0),
            Self::East => (1, 0),
            Self::SouthWest => (-1, 1),
            Self::South => (0, 1),
            Self::SouthEast => (1, 1),
        }
    }

    /// The single-digit step code, `(dy + 1) * 3 + (dx + 1)`.
    pub const fn code(self) -> u8 {
        match self {
            Self::NorthWest => 0,
            Self::North => 1,
            Self::NorthEast => 2,
            Self::West => 3,
            Self::East => 5,
            Self::SouthWest => 6,
            Self::South => 7,
            Self::SouthEast => 8,
        }
    }

    /// Decode a step code. `4` and anything above `8` are rejected.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NorthWest),
            1 => Some(Self::North),
            2 => Some(Self::NorthEast),
            3 => Some(Self::West),
            5 => Some(Self::East),
            6 => Some(Self::SouthWest),
            7 => Some(Self::South),
            8 => Some(Self::SouthEast),
            _ => None,
        }
    }

    /// The direction for a unit offset, if any.
    pub const fn from_offset(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (-1, -1) => Some(Self::NorthWest),
            (0, -1) => Some(Self::North),
            (1, -1) => Some(Self::NorthEast),
            (-1, 0) => Some(Self::West),
            (1, 0) => Some(Self::East),
            (-1, 1) => Some(Self::SouthWest),
            (0, 1) => Some(Self::South),
            (1, 1) => Some(Self::SouthEast),
            _ => None,
        }
    }

    /// Whether the step moves along both axes.
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthWest | Self::NorthEast | Self::SouthWest | Self::SouthEast
        )
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> Self {
        direction.code()
    }
}

impl TryFrom<u8> for Direction {
    type Error = InvalidDirectionCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(InvalidDirectionCode(code))
    }
}

/// A step code that does not name a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDirectionCode(pub u8);

impl core::fmt::Display for InvalidDirectionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid direction code {}", self.0)
    }
}

impl std::error::Error for InvalidDirectionCode {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_offsets() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.offset();
            let expected = (dy + 1) * 3 + (dx + 1);
            assert_eq!(i32::from(direction.code()), expected);
            assert_eq!(Direction::from_code(direction.code()), Some(direction));
        }
    }

    #[test]
    fn no_move_code_is_rejected() {
        assert!(Direction::from_code(4).is_none());
        assert!(Direction::from_code(9).is_none());
        assert!(serde_json::from_str::<Direction>("4").is_err());
    }

    #[test]
    fn step_and_direction_to_agree() {
        let origin = Coord::new(3, 3);
        for direction in Direction::ALL {
            let next = origin.step(direction).unwrap();
            assert_eq!(origin.direction_to(next), Some(direction));
            assert_eq!(origin.chebyshev_distance(next), 1);
        }
        assert!(origin.direction_to(origin).is_none());
        assert!(origin.direction_to(Coord::new(5, 3)).is_none());
    }

    #[test]
    fn step_at_edge_of_range_is_none() {
        let edge = Coord::new(i32::MAX, 0);
        assert!(edge.step(Direction::East).is_none());
    }
}
