//! State parameters - the bindings visible to widgets in the active state
//!
//! `StateParams` is an owned tree: cloning it is a deep copy, so a child state
//! never observes mutations made by its parent (and vice versa).
//!
//! Wire format is plain JSON. An object made of exactly `entityType` + `id`
//! is an entity reference; any other object is a nested parameter group
//! (`params[name] = { entityId, entityName }`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::entity::EntityId;

/// Well-known parameter keys
pub const ENTITY_ID: &str = "entityId";
pub const ENTITY_NAME: &str = "entityName";
pub const ENTITY_LABEL: &str = "entityLabel";

/// Tagged union of parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Entity(EntityId),
    Group(StateParams),
}

impl ParamValue {
    pub fn as_entity(&self) -> Option<&EntityId> {
        match self {
            ParamValue::Entity(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&StateParams> {
        match self {
            ParamValue::Group(g) => Some(g),
            _ => None,
        }
    }
}

impl From<EntityId> for ParamValue {
    fn from(id: EntityId) -> Self {
        ParamValue::Entity(id)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n.into())
    }
}

impl From<StateParams> for ParamValue {
    fn from(group: StateParams) -> Self {
        ParamValue::Group(group)
    }
}

/// Parameter name → value bindings of one state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateParams {
    values: BTreeMap<String, ParamValue>,
}

impl StateParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Top-level `entityId` binding
    pub fn entity_id(&self) -> Option<&EntityId> {
        self.get(ENTITY_ID).and_then(ParamValue::as_entity)
    }

    pub fn entity_name(&self) -> Option<&str> {
        self.get(ENTITY_NAME).and_then(ParamValue::as_text)
    }

    pub fn entity_label(&self) -> Option<&str> {
        self.get(ENTITY_LABEL).and_then(ParamValue::as_text)
    }

    /// The params group an entity parameter name points at.
    ///
    /// With a name only `params[name]` counts (`None` when that group is
    /// missing); without one the top-level params are used.
    pub fn entity_scope(&self, param_name: Option<&str>) -> Option<&StateParams> {
        match param_name {
            Some(name) => self.get(name).and_then(ParamValue::as_group),
            None => Some(self),
        }
    }

    /// Entity bound to `param_name` (or the top-level `entityId`)
    pub fn entity_id_for(&self, param_name: Option<&str>) -> Option<&EntityId> {
        self.entity_scope(param_name)?.entity_id()
    }

    /// Copy the named params from `source` when they are not already set here
    pub fn inherit_from(&mut self, source: &StateParams, names: &[String]) {
        for name in names {
            if self.contains(name) {
                continue;
            }
            if let Some(value) = source.get(name) {
                self.values.insert(name.clone(), value.clone());
            }
        }
    }

    /// Overwrite the named params with `source`'s values (or drop them when
    /// `source` no longer has them)
    pub fn sync_from(&mut self, source: &StateParams, names: &[String]) {
        for name in names {
            match source.get(name) {
                Some(value) => {
                    self.values.insert(name.clone(), value.clone());
                }
                None => {
                    self.values.remove(name);
                }
            }
        }
    }
}

impl FromIterator<(String, ParamValue)> for StateParams {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
