//! Per-page rotation state

use crate::error::PageEditError;
use crate::types::PageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A quarter-turn rotation, clockwise, in {0, 90, 180, 270}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }

    /// Normalize any multiple of 90 (negative included) to a rotation.
    pub fn from_degrees(degrees: i64) -> Result<Self, PageEditError> {
        if degrees % 90 != 0 {
            return Err(PageEditError::InvalidRotation(degrees));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::None,
            90 => Rotation::Quarter,
            180 => Rotation::Half,
            _ => Rotation::ThreeQuarter,
        })
    }

    pub fn is_none(self) -> bool {
        self == Rotation::None
    }

    /// Compose two rotations
    pub fn add(self, other: Rotation) -> Rotation {
        let total = i64::from(self.degrees()) + i64::from(other.degrees());
        // Both operands are multiples of 90, so this cannot fail
        Rotation::from_degrees(total).unwrap_or_default()
    }

    fn turn(self, direction: RotationDirection) -> Rotation {
        let total = i64::from(self.degrees()) + direction.degrees();
        Rotation::from_degrees(total).unwrap_or_default()
    }
}

impl TryFrom<i64> for Rotation {
    type Error = PageEditError;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for i64 {
    fn from(rotation: Rotation) -> Self {
        i64::from(rotation.degrees())
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Direction of a single rotate step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationDirection {
    /// +90 degrees
    Clockwise,
    /// -90 degrees
    CounterClockwise,
}

impl RotationDirection {
    pub fn degrees(self) -> i64 {
        match self {
            RotationDirection::Clockwise => 90,
            RotationDirection::CounterClockwise => -90,
        }
    }

    /// Accepts exactly +90 or -90
    pub fn from_degrees(degrees: i64) -> Result<Self, PageEditError> {
        match degrees {
            90 => Ok(RotationDirection::Clockwise),
            -90 => Ok(RotationDirection::CounterClockwise),
            other => Err(PageEditError::InvalidRotation(other)),
        }
    }
}

/// Rotation per page identity. Pages at 0 degrees have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationTracker {
    angles: BTreeMap<PageId, Rotation>,
}

impl RotationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a page one step; returns the new rotation.
    pub fn rotate(&mut self, id: PageId, direction: RotationDirection) -> Rotation {
        let rotation = self.get(id).turn(direction);
        self.set(id, rotation);
        rotation
    }

    pub fn get(&self, id: PageId) -> Rotation {
        self.angles.get(&id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, id: PageId, rotation: Rotation) {
        if rotation.is_none() {
            self.angles.remove(&id);
        } else {
            self.angles.insert(id, rotation);
        }
    }

    pub fn clear(&mut self) {
        self.angles.clear();
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PageId, Rotation)> + '_ {
        self.angles.iter().map(|(id, rotation)| (*id, *rotation))
    }
}

impl FromIterator<(PageId, Rotation)> for RotationTracker {
    fn from_iter<T: IntoIterator<Item = (PageId, Rotation)>>(iter: T) -> Self {
        let mut tracker = RotationTracker::new();
        for (id, rotation) in iter {
            tracker.set(id, rotation);
        }
        tracker
    }
}
