//! JSON bodies of the TV's JointSpace ambilight endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Rgb, SourceTopology, ZoneSnapshot};

/// `GET ambilight/topology`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyResponse {
    #[serde(default)]
    pub layers: u32,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub top: usize,
    #[serde(default)]
    pub right: usize,
    #[serde(default)]
    pub bottom: usize,
}

impl From<TopologyResponse> for SourceTopology {
    fn from(value: TopologyResponse) -> Self {
        Self {
            left: value.left,
            top: value.top,
            right: value.right,
            bottom: value.bottom,
        }
    }
}

/// `GET ambilight/processed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedResponse {
    pub layer1: LayerColors,
}

/// Zone colors keyed by their numeric position on each side ("0", "1", ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerColors {
    #[serde(default)]
    pub left: BTreeMap<u32, Rgb>,
    #[serde(default)]
    pub top: BTreeMap<u32, Rgb>,
    #[serde(default)]
    pub right: BTreeMap<u32, Rgb>,
    #[serde(default)]
    pub bottom: BTreeMap<u32, Rgb>,
}

impl From<LayerColors> for ZoneSnapshot {
    fn from(value: LayerColors) -> Self {
        Self {
            left: value.left.into_values().collect(),
            top: value.top.into_values().collect(),
            right: value.right.into_values().collect(),
            bottom: value.bottom.into_values().collect(),
        }
    }
}

/// `GET ambilight/mode` response and `POST ambilight/mode` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbilightMode {
    pub current: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

impl AmbilightMode {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            available: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
