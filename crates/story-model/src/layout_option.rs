//! The static layout catalogue.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::positions::LivePositions;

/// Identifier of a catalogue layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutId {
    #[default]
    BottomRow,
    RightStack,
    LeftStack,
    TopRow,
    Live,
}

/// A catalogue entry as shown in the layout picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutOption {
    pub id: LayoutId,
    pub label: &'static str,
}

/// The fixed catalogue, in picker order.
pub const LAYOUT_OPTIONS: [LayoutOption; 5] = [
    LayoutOption {
        id: LayoutId::BottomRow,
        label: "Normal",
    },
    LayoutOption {
        id: LayoutId::RightStack,
        label: "Direita",
    },
    LayoutOption {
        id: LayoutId::LeftStack,
        label: "Esquerda",
    },
    LayoutOption {
        id: LayoutId::TopRow,
        label: "Topo",
    },
    LayoutOption {
        id: LayoutId::Live,
        label: "LIVE",
    },
];

impl LayoutId {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutId::BottomRow => "bottom-row",
            LayoutId::RightStack => "right-stack",
            LayoutId::LeftStack => "left-stack",
            LayoutId::TopRow => "top-row",
            LayoutId::Live => "live",
        }
    }

    /// Parse a layout id. Unknown values degrade to `bottom-row`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bottom-row" => LayoutId::BottomRow,
            "right-stack" => LayoutId::RightStack,
            "left-stack" => LayoutId::LeftStack,
            "top-row" => LayoutId::TopRow,
            "live" => LayoutId::Live,
            other => {
                tracing::debug!(layout = other, "Unknown layout id, using bottom-row");
                LayoutId::BottomRow
            }
        }
    }

    pub fn label(self) -> &'static str {
        LAYOUT_OPTIONS
            .iter()
            .find(|option| option.id == self)
            .map(|option| option.label)
            .unwrap_or("Normal")
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved layout choice. The live variant carries its positions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Layout {
    #[default]
    BottomRow,
    RightStack,
    LeftStack,
    TopRow,
    Live(LivePositions),
}

impl Layout {
    /// Build a layout from a raw id. Unknown ids become [`Layout::BottomRow`];
    /// `positions` is only used by the live layout.
    pub fn from_id(raw: &str, positions: &LivePositions) -> Self {
        Self::from_layout_id(LayoutId::parse_lenient(raw), positions)
    }

    pub fn from_layout_id(id: LayoutId, positions: &LivePositions) -> Self {
        match id {
            LayoutId::BottomRow => Layout::BottomRow,
            LayoutId::RightStack => Layout::RightStack,
            LayoutId::LeftStack => Layout::LeftStack,
            LayoutId::TopRow => Layout::TopRow,
            LayoutId::Live => Layout::Live(positions.clone()),
        }
    }

    pub fn id(&self) -> LayoutId {
        match self {
            Layout::BottomRow => LayoutId::BottomRow,
            Layout::RightStack => LayoutId::RightStack,
            Layout::LeftStack => LayoutId::LeftStack,
            Layout::TopRow => LayoutId::TopRow,
            Layout::Live(_) => LayoutId::Live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_matches_picker() {
        let ids: Vec<&str> = LAYOUT_OPTIONS.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(
            ids,
            ["bottom-row", "right-stack", "left-stack", "top-row", "live"]
        );
        let labels: Vec<&str> = LAYOUT_OPTIONS.iter().map(|o| o.label).collect();
        assert_eq!(labels, ["Normal", "Direita", "Esquerda", "Topo", "LIVE"]);
    }

    #[test]
    fn test_unknown_id_degrades_to_bottom_row() {
        let positions = LivePositions::default();
        assert_eq!(Layout::from_id("diagonal", &positions), Layout::BottomRow);
        assert_eq!(Layout::from_id("", &positions), Layout::BottomRow);
        assert_eq!(Layout::from_id(" TOP-ROW ", &positions), Layout::TopRow);
    }

    #[test]
    fn test_live_carries_positions() {
        let positions = LivePositions::default();
        let layout = Layout::from_id("live", &positions);
        assert_eq!(layout.id(), LayoutId::Live);
        assert!(matches!(layout, Layout::Live(p) if p == positions));
    }

    #[test]
    fn test_id_round_trips_through_serde() {
        let json = serde_json::to_string(&LayoutId::RightStack).unwrap();
        assert_eq!(json, "\"right-stack\"");
        let id: LayoutId = serde_json::from_str("\"left-stack\"").unwrap();
        assert_eq!(id, LayoutId::LeftStack);
    }
}
