//! Dashboard documents and engine settings
//!
//! A dashboard document declares the states and entity aliases of one
//! dashboard (YAML or JSON, chosen by file extension). Engine settings tune
//! channel sizes and data source defaults.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`DASHSTATE_PAGE_SIZE`, `DASHSTATE_RELOAD_POLICY`)
//! 2. `engine:` section of the document / settings file
//! 3. Defaults

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alias::EntityAlias;
use crate::data_source::ReloadPolicy;
use crate::error::{DashError, Result};
use crate::state::DashboardState;
use crate::state_controller::DEFAULT_CHANGE_CAPACITY;

static STATE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-]*$").expect("valid regex"));

pub const ENV_PAGE_SIZE: &str = "DASHSTATE_PAGE_SIZE";
pub const ENV_RELOAD_POLICY: &str = "DASHSTATE_RELOAD_POLICY";

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Buffered state change notifications per dashboard
    pub state_change_capacity: usize,
    /// Page size used by `DashboardContext::page_link`
    pub default_page_size: usize,
    pub reload_policy: ReloadPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            state_change_capacity: DEFAULT_CHANGE_CAPACITY,
            default_page_size: 10,
            reload_policy: ReloadPolicy::default(),
        }
    }
}

impl EngineSettings {
    /// Load a standalone settings file (YAML)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| DashError::ConfigError {
            reason: format!("Failed to parse settings file: {}", e),
        })
    }

    /// Environment variables take precedence over file values
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(ENV_PAGE_SIZE).ok().as_deref(),
            std::env::var(ENV_RELOAD_POLICY).ok().as_deref(),
        )
    }

    fn with_overrides(mut self, page_size: Option<&str>, reload_policy: Option<&str>) -> Result<Self> {
        if let Some(size) = page_size.filter(|s| !s.is_empty()) {
            self.default_page_size = size.parse().map_err(|_| DashError::ConfigError {
                reason: format!("{ENV_PAGE_SIZE} must be a positive integer, got '{size}'"),
            })?;
        }
        if let Some(policy) = reload_policy.filter(|s| !s.is_empty()) {
            self.reload_policy = match policy {
                "lastCompletionWins" | "last-completion" => ReloadPolicy::LastCompletionWins,
                "latestRequestWins" | "latest-request" => ReloadPolicy::LatestRequestWins,
                other => {
                    return Err(DashError::ConfigError {
                        reason: format!("unknown reload policy '{other}'"),
                    })
                }
            };
        }
        if self.default_page_size == 0 {
            return Err(DashError::ConfigError {
                reason: "defaultPageSize must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

/// One dashboard's declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub states: BTreeMap<String, DashboardState>,
    /// Keyed by alias id
    #[serde(default)]
    pub entity_aliases: BTreeMap<String, EntityAlias>,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl DashboardConfig {
    /// Parse a `.json` or YAML document and fill ids from map keys
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        debug!(path = %path.display(), states = config.states.len(), "dashboard loaded");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config.normalized())
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        for (id, state) in self.states.iter_mut() {
            if state.id.is_empty() {
                state.id = id.clone();
            }
        }
        for (id, alias) in self.entity_aliases.iter_mut() {
            if alias.id.is_empty() {
                alias.id = id.clone();
            }
        }
        self
    }

    /// Id of the state flagged `root`
    pub fn root_state_id(&self) -> Option<&str> {
        self.states
            .values()
            .find(|s| s.root)
            .map(|s| s.id.as_str())
    }

    /// Structural checks: state ids, exactly one root, unique complete aliases
    pub fn validate(&self) -> Result<()> {
        for (id, state) in &self.states {
            if !STATE_ID_RE.is_match(id) {
                return Err(DashError::InvalidStateId {
                    state_id: id.clone(),
                });
            }
            if state.id != *id {
                return Err(DashError::ConfigError {
                    reason: format!("state '{}' is declared under key '{}'", state.id, id),
                });
            }
        }

        match self.states.values().filter(|s| s.root).count() {
            0 => return Err(DashError::NoRootState),
            1 => {}
            count => return Err(DashError::MultipleRootStates { count }),
        }

        let mut names = FxHashSet::default();
        for alias in self.entity_aliases.values() {
            if !names.insert(alias.alias.as_str()) {
                return Err(DashError::DuplicateAlias {
                    alias: alias.alias.clone(),
                });
            }
            alias.validate()?;
        }
        Ok(())
    }
}
