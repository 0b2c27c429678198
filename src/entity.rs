//! Entity identity crossing the engine boundary
//!
//! `{ entityType, id }` is passed through untouched: the engine compares ids
//! but never interprets the entity type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Generic entity reference (`{ "entityType": "DEVICE", "id": "..." }`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntityId {
    pub entity_type: String,
    pub id: String,
}

impl EntityId {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// Anything that carries an entity identity (table rows, widget items)
pub trait Identified {
    fn entity_id(&self) -> &EntityId;
}

impl Identified for EntityId {
    fn entity_id(&self) -> &EntityId {
        self
    }
}
