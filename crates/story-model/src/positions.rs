//! Piece keys and the free-form ("live") position map.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::FracPoint;

/// One movable overlay piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PieceKey {
    Brand,
    Title,
    Subtitle,
    CardVolume,
    CardTempo,
    CardKcal,
}

impl PieceKey {
    pub const ALL: [PieceKey; 6] = [
        PieceKey::Brand,
        PieceKey::Title,
        PieceKey::Subtitle,
        PieceKey::CardVolume,
        PieceKey::CardTempo,
        PieceKey::CardKcal,
    ];

    /// The three stat cards, left to right.
    pub const CARDS: [PieceKey; 3] = [PieceKey::CardVolume, PieceKey::CardTempo, PieceKey::CardKcal];

    pub fn as_str(self) -> &'static str {
        match self {
            PieceKey::Brand => "brand",
            PieceKey::Title => "title",
            PieceKey::Subtitle => "subtitle",
            PieceKey::CardVolume => "cardVolume",
            PieceKey::CardTempo => "cardTempo",
            PieceKey::CardKcal => "cardKcal",
        }
    }

    /// Default top-left corner in the live layout.
    ///
    /// Mirrors the bottom-row arrangement so switching to live starts from a
    /// familiar picture.
    pub fn default_position(self) -> FracPoint {
        match self {
            PieceKey::Brand => FracPoint::new(0.083, 0.54),
            PieceKey::Title => FracPoint::new(0.083, 0.58),
            PieceKey::Subtitle => FracPoint::new(0.083, 0.67),
            PieceKey::CardVolume => FracPoint::new(0.083, 0.70),
            PieceKey::CardTempo => FracPoint::new(0.369, 0.70),
            PieceKey::CardKcal => FracPoint::new(0.654, 0.70),
        }
    }
}

impl fmt::Display for PieceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractional top-left corner of every piece in the live layout.
///
/// Always holds an entry for every [`PieceKey`]; missing keys in serialized
/// input are filled from the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<PieceKey, FracPoint>", into = "BTreeMap<PieceKey, FracPoint>")]
pub struct LivePositions {
    points: BTreeMap<PieceKey, FracPoint>,
}

impl LivePositions {
    pub fn get(&self, key: PieceKey) -> FracPoint {
        self.points
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_position())
    }

    pub fn set(&mut self, key: PieceKey, point: FracPoint) {
        self.points.insert(key, point);
    }

    /// Restore the documented default map.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = (PieceKey, FracPoint)> + '_ {
        PieceKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }
}

impl Default for LivePositions {
    fn default() -> Self {
        Self {
            points: PieceKey::ALL
                .into_iter()
                .map(|key| (key, key.default_position()))
                .collect(),
        }
    }
}

impl From<BTreeMap<PieceKey, FracPoint>> for LivePositions {
    fn from(map: BTreeMap<PieceKey, FracPoint>) -> Self {
        let mut positions = Self::default();
        for (key, point) in map {
            positions.set(key, point);
        }
        positions
    }
}

impl From<LivePositions> for BTreeMap<PieceKey, FracPoint> {
    fn from(positions: LivePositions) -> Self {
        positions.points
    }
}
