//! Entity aliases and their resolution against the active state
//!
//! An alias is a named entity filter declared once per dashboard. Widgets
//! reference aliases by name; the controller turns an alias into concrete
//! entity ids using the params of the currently active state.
//!
//! Lookups of undeclared aliases are errors for the caller, while
//! [`AliasController::resolve_entities`] reports every failure as data so a
//! single misconfigured widget only renders its own placeholder.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::EntityId;
use crate::error::{DashError, Result};
use crate::params::{ParamValue, StateParams};

/// Filter types understood by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterKind {
    #[serde(rename_all = "camelCase")]
    SingleEntity { single_entity: EntityId },

    #[serde(rename_all = "camelCase")]
    EntityList {
        entity_type: String,
        entity_list: Vec<String>,
    },

    /// Entity bound to a state param (the dashboard "state entity")
    #[serde(rename_all = "camelCase")]
    StateEntity {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state_entity_param_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_state_entity: Option<EntityId>,
    },

    /// Server-side name search
    #[serde(rename_all = "camelCase")]
    EntityName {
        entity_type: String,
        entity_name_filter: String,
    },

    /// Server-side relation query rooted at a fixed or state entity
    #[serde(rename_all = "camelCase")]
    RelationsQuery {
        #[serde(default)]
        root_state_entity: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state_entity_param_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_state_entity: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        root_entity: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_level: Option<u32>,
    },
}

/// Alias filter: kind plus the "resolve multiple entities" flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasFilter {
    #[serde(default)]
    pub resolve_multiple: bool,
    #[serde(flatten)]
    pub kind: FilterKind,
}

/// Named reusable entity filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAlias {
    /// Filled from the aliases map key when absent in the document
    #[serde(default)]
    pub id: String,
    pub alias: String,
    pub filter: AliasFilter,
}

impl EntityAlias {
    /// Check the filter carries what its type needs
    pub fn validate(&self) -> Result<()> {
        let incomplete = |reason: &str| DashError::InvalidAliasFilter {
            alias: self.alias.clone(),
            reason: reason.to_string(),
        };
        match &self.filter.kind {
            FilterKind::SingleEntity { single_entity } if single_entity.id.is_empty() => {
                Err(incomplete("singleEntity has an empty id"))
            }
            FilterKind::EntityList { entity_list, .. } if entity_list.is_empty() => {
                Err(incomplete("entityList is empty"))
            }
            FilterKind::EntityName {
                entity_name_filter, ..
            } if entity_name_filter.trim().is_empty() => Err(incomplete("entityNameFilter is empty")),
            FilterKind::RelationsQuery {
                root_state_entity: false,
                root_entity: None,
                ..
            } => Err(incomplete("relationsQuery needs rootEntity or rootStateEntity")),
            _ => Ok(()),
        }
    }
}

/// Outcome of resolving an alias for a widget
#[derive(Debug, Clone, PartialEq)]
pub enum AliasResolution {
    /// Concrete entities, in declaration order
    Entities(Vec<EntityId>),
    /// Server-side filter; `root` is the resolved query root when it depends on state
    Query {
        filter: AliasFilter,
        root: Option<EntityId>,
    },
    /// Misconfiguration; the widget shows a placeholder
    Unresolved { alias: String, reason: String },
}

impl AliasResolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, AliasResolution::Unresolved { .. })
    }

    pub fn entities(&self) -> &[EntityId] {
        match self {
            AliasResolution::Entities(ids) => ids,
            _ => &[],
        }
    }
}

/// Source of the currently active state params
pub trait StateParamsSource: Send + Sync {
    fn state_params(&self) -> StateParams;
}

impl StateParamsSource for StateParams {
    fn state_params(&self) -> StateParams {
        self.clone()
    }
}

/// Value bound to `name` in `params`, if the active state ever set it
pub fn state_param<'a>(name: &str, params: &'a StateParams) -> Option<&'a ParamValue> {
    params.get(name)
}

/// Alias table + resolver scoped to one dashboard
#[derive(Clone)]
pub struct AliasController {
    aliases: Arc<BTreeMap<String, EntityAlias>>,
    by_name: Arc<FxHashMap<String, String>>,
    params: Arc<dyn StateParamsSource>,
}

impl AliasController {
    /// `aliases` is keyed by alias id
    pub fn new(mut aliases: BTreeMap<String, EntityAlias>, params: Arc<dyn StateParamsSource>) -> Self {
        for (id, alias) in aliases.iter_mut() {
            if alias.id.is_empty() {
                alias.id = id.clone();
            }
        }
        let by_name = aliases
            .values()
            .map(|a| (a.alias.clone(), a.id.clone()))
            .collect();
        Self {
            aliases: Arc::new(aliases),
            by_name: Arc::new(by_name),
            params,
        }
    }

    /// Read-only snapshot of the alias table
    pub fn get_entity_aliases(&self) -> Arc<BTreeMap<String, EntityAlias>> {
        Arc::clone(&self.aliases)
    }

    /// Look up by alias name, then by alias id
    pub fn get_alias(&self, name_or_id: &str) -> Option<&EntityAlias> {
        self.by_name
            .get(name_or_id)
            .and_then(|id| self.aliases.get(id))
            .or_else(|| self.aliases.get(name_or_id))
    }

    pub fn resolve_alias(&self, name: &str) -> Result<&AliasFilter> {
        self.get_alias(name)
            .map(|a| &a.filter)
            .ok_or_else(|| DashError::UnknownAlias {
                alias: name.to_string(),
            })
    }

    /// Value of a state param in the active state
    pub fn current_state_param(&self, name: &str) -> Option<ParamValue> {
        state_param(name, &self.params.state_params()).cloned()
    }

    /// Resolve an alias against the active state params
    pub fn resolve_entities(&self, name: &str) -> AliasResolution {
        self.resolve_entities_with(name, &self.params.state_params())
    }

    /// Resolve an alias against explicit params
    pub fn resolve_entities_with(&self, name: &str, params: &StateParams) -> AliasResolution {
        let Some(alias) = self.get_alias(name) else {
            warn!(alias = name, "unknown entity alias");
            return AliasResolution::Unresolved {
                alias: name.to_string(),
                reason: "alias is not declared".to_string(),
            };
        };

        let resolution = resolve_filter(alias, params);
        debug!(alias = %alias.alias, resolved = resolution.is_resolved(), "alias resolved");
        resolution
    }
}

fn state_entity(
    params: &StateParams,
    param_name: Option<&str>,
    default: Option<&EntityId>,
) -> Option<EntityId> {
    params.entity_id_for(param_name).or(default).cloned()
}

fn resolve_filter(alias: &EntityAlias, params: &StateParams) -> AliasResolution {
    let unresolved = |reason: String| {
        warn!(alias = %alias.alias, %reason, "alias unresolved");
        AliasResolution::Unresolved {
            alias: alias.alias.clone(),
            reason,
        }
    };
    let filter = &alias.filter;

    match &filter.kind {
        FilterKind::SingleEntity { single_entity } => {
            AliasResolution::Entities(vec![single_entity.clone()])
        }
        FilterKind::EntityList {
            entity_type,
            entity_list,
        } => {
            if entity_list.is_empty() {
                return unresolved("entity list is empty".to_string());
            }
            let take = if filter.resolve_multiple { entity_list.len() } else { 1 };
            AliasResolution::Entities(
                entity_list
                    .iter()
                    .take(take)
                    .map(|id| EntityId::new(entity_type.clone(), id.clone()))
                    .collect(),
            )
        }
        FilterKind::StateEntity {
            state_entity_param_name,
            default_state_entity,
        } => match state_entity(
            params,
            state_entity_param_name.as_deref(),
            default_state_entity.as_ref(),
        ) {
            Some(id) => AliasResolution::Entities(vec![id]),
            None => unresolved(match state_entity_param_name {
                Some(name) => format!("state param '{name}' has no entity"),
                None => "state has no entity".to_string(),
            }),
        },
        FilterKind::EntityName { .. } => AliasResolution::Query {
            filter: filter.clone(),
            root: None,
        },
        FilterKind::RelationsQuery {
            root_state_entity,
            state_entity_param_name,
            default_state_entity,
            root_entity,
            ..
        } => {
            let root = if *root_state_entity {
                state_entity(
                    params,
                    state_entity_param_name.as_deref(),
                    default_state_entity.as_ref(),
                )
            } else {
                root_entity.clone()
            };
            match root {
                Some(root) => AliasResolution::Query {
                    filter: filter.clone(),
                    root: Some(root),
                },
                None => unresolved("relation query has no root entity".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ENTITY_ID;
    use serde_json::json;

    fn aliases() -> BTreeMap<String, EntityAlias> {
        let list: Vec<EntityAlias> = serde_json::from_value(json!([
            {
                "id": "a1",
                "alias": "Thermostat",
                "filter": {
                    "type": "singleEntity",
                    "singleEntity": {"entityType": "DEVICE", "id": "t1"}
                }
            },
            {
                "id": "a2",
                "alias": "Selected device",
                "filter": {
                    "type": "stateEntity",
                    "stateEntityParamName": "device",
                    "defaultStateEntity": {"entityType": "DEVICE", "id": "fallback"}
                }
            },
            {
                "id": "a3",
                "alias": "Pumps",
                "filter": {
                    "type": "entityList",
                    "resolveMultiple": true,
                    "entityType": "DEVICE",
                    "entityList": ["p1", "p2"]
                }
            },
            {
                "id": "a4",
                "alias": "Children",
                "filter": {
                    "type": "relationsQuery",
                    "rootStateEntity": true,
                    "direction": "FROM",
                    "maxLevel": 1
                }
            },
            {
                "id": "a5",
                "alias": "First pump",
                "filter": {
                    "type": "entityList",
                    "entityType": "DEVICE",
                    "entityList": ["p1", "p2"]
                }
            }
        ]))
        .unwrap();
        list.into_iter().map(|a| (a.id.clone(), a)).collect()
    }

    fn controller(params: StateParams) -> AliasController {
        AliasController::new(aliases(), Arc::new(params))
    }

    #[test]
    fn resolve_alias_by_name_and_id() {
        let ctrl = controller(StateParams::new());
        assert!(matches!(
            ctrl.resolve_alias("Thermostat").unwrap().kind,
            FilterKind::SingleEntity { .. }
        ));
        assert!(ctrl.resolve_alias("a3").is_ok());
    }

    #[test]
    fn unknown_alias_is_an_error_for_lookups() {
        let ctrl = controller(StateParams::new());
        let err = ctrl.resolve_alias("Nope").unwrap_err();
        assert!(err.to_string().contains("DASH-030"));
    }

    #[test]
    fn unknown_alias_is_reported_for_widgets() {
        let ctrl = controller(StateParams::new());
        let resolution = ctrl.resolve_entities("Nope");
        assert!(!resolution.is_resolved());
        assert!(resolution.entities().is_empty());
    }

    #[test]
    fn state_entity_reads_named_param() {
        let params = StateParams::new().with(
            "device",
            StateParams::new().with(ENTITY_ID, EntityId::new("DEVICE", "d7")),
        );
        let ctrl = controller(params);
        assert_eq!(
            ctrl.resolve_entities("Selected device").entities(),
            &[EntityId::new("DEVICE", "d7")]
        );
    }

    #[test]
    fn state_entity_falls_back_to_default() {
        let ctrl = controller(StateParams::new());
        assert_eq!(
            ctrl.resolve_entities("Selected device").entities(),
            &[EntityId::new("DEVICE", "fallback")]
        );
    }

    #[test]
    fn named_state_entity_ignores_top_level_entity() {
        let params = StateParams::new().with(ENTITY_ID, EntityId::new("ASSET", "building"));
        let ctrl = controller(params);
        assert_eq!(
            ctrl.resolve_entities("Selected device").entities(),
            &[EntityId::new("DEVICE", "fallback")]
        );
    }

    #[test]
    fn entity_list_honours_resolve_multiple() {
        let ctrl = controller(StateParams::new());
        assert_eq!(ctrl.resolve_entities("Pumps").entities().len(), 2);
        assert_eq!(
            ctrl.resolve_entities("First pump").entities(),
            &[EntityId::new("DEVICE", "p1")]
        );
    }

    #[test]
    fn relation_query_needs_a_root() {
        let ctrl = controller(StateParams::new());
        assert!(!ctrl.resolve_entities("Children").is_resolved());

        let params = StateParams::new().with(ENTITY_ID, EntityId::new("ASSET", "b1"));
        match controller(params).resolve_entities("Children") {
            AliasResolution::Query { root, .. } => {
                assert_eq!(root, Some(EntityId::new("ASSET", "b1")))
            }
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[test]
    fn state_param_substitution() {
        let params = StateParams::new().with("deviceId", "d1");
        assert_eq!(
            state_param("deviceId", &params).and_then(ParamValue::as_text),
            Some("d1")
        );
        assert!(state_param("unset", &params).is_none());

        let ctrl = controller(params);
        assert_eq!(ctrl.current_state_param("deviceId"), Some(ParamValue::from("d1")));
    }

    #[test]
    fn validate_flags_incomplete_filters() {
        let mut alias = aliases().remove("a3").unwrap();
        assert!(alias.validate().is_ok());
        alias.filter.kind = FilterKind::EntityList {
            entity_type: "DEVICE".into(),
            entity_list: vec![],
        };
        assert!(alias.validate().is_err());
    }

    #[test]
    fn snapshot_is_shared() {
        let ctrl = controller(StateParams::new());
        let a = ctrl.get_entity_aliases();
        let b = ctrl.clone().get_entity_aliases();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 5);
    }
}
