//! Dashboard states, their layouts, and the serialized path unit
//!
//! Layout objects are opaque to the engine apart from the four keys that a
//! parent widget may override (margin, outer margin, background, autofill).
//! Every other key is carried through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::StateParams;

/// Layout slot names used by the platform
pub const MAIN_LAYOUT: &str = "main";
pub const RIGHT_LAYOUT: &str = "right";

/// Grid settings of one layout slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_margin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fill_height: Option<bool>,
    /// Everything else (columns, widgets, row height...) passes through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Defaults a parent widget pushes onto an embedded state's layouts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOverrides {
    #[serde(default)]
    pub margin: Option<u32>,
    #[serde(default)]
    pub outer_margin: Option<bool>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub auto_fill_height: Option<bool>,
}

impl LayoutOverrides {
    pub fn is_empty(&self) -> bool {
        self.margin.is_none()
            && self.outer_margin.is_none()
            && self.background_color.is_none()
            && self.auto_fill_height.is_none()
    }

    /// Overwrite the layout's settings in place
    pub fn apply(&self, layout: &mut GridLayout) {
        if let Some(margin) = self.margin {
            layout.margin = Some(margin);
        }
        if let Some(outer) = self.outer_margin {
            layout.outer_margin = Some(outer);
        }
        if let Some(color) = &self.background_color {
            layout.background_color = Some(color.clone());
        }
        if let Some(autofill) = self.auto_fill_height {
            layout.auto_fill_height = Some(autofill);
        }
    }
}

/// Named dashboard view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// Filled from the states map key when absent in the document
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub layouts: BTreeMap<String, GridLayout>,
}

impl DashboardState {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            root: false,
            layouts: BTreeMap::from([(MAIN_LAYOUT.to_string(), GridLayout::default())]),
        }
    }

    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn apply_overrides(&mut self, overrides: &LayoutOverrides) {
        for layout in self.layouts.values_mut() {
            overrides.apply(layout);
        }
    }
}

/// One element of a navigation path: `{ id?, params }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateObject {
    /// `None` stands for the root state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub params: StateParams,
}

impl StateObject {
    pub fn new(id: impl Into<String>, params: StateParams) -> Self {
        Self {
            id: Some(id.into()),
            params,
        }
    }
}

/// Activation status of a declared state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateStatus {
    Inactive,
    Activating,
    Active,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn layout_keeps_unknown_keys() {
        let layout: GridLayout = serde_json::from_value(json!({
            "margin": 10,
            "columns": 24,
            "widgets": {"w1": {"sizeX": 4}}
        }))
        .unwrap();
        assert_eq!(layout.margin, Some(10));
        assert_eq!(layout.extra.get("columns"), Some(&json!(24)));

        let back = serde_json::to_value(&layout).unwrap();
        assert_eq!(back["widgets"]["w1"]["sizeX"], 4);
    }

    #[test]
    fn overrides_touch_every_layout() {
        let mut state = DashboardState::new("detail", "Detail");
        state
            .layouts
            .insert(RIGHT_LAYOUT.to_string(), GridLayout::default());

        state.apply_overrides(&LayoutOverrides {
            margin: Some(0),
            background_color: Some("#fff".into()),
            ..Default::default()
        });

        for layout in state.layouts.values() {
            assert_eq!(layout.margin, Some(0));
            assert_eq!(layout.background_color.as_deref(), Some("#fff"));
            assert_eq!(layout.outer_margin, None);
        }
    }

    #[test]
    fn state_object_without_id_means_root() {
        let obj: StateObject = serde_json::from_value(json!({"params": {}})).unwrap();
        assert_eq!(obj.id, None);
        assert!(obj.params.is_empty());
    }
}
