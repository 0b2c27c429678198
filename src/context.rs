//! Widget-facing dashboard context
//!
//! Widgets receive a [`DashboardContext`] explicitly instead of reaching for
//! an ambient "current dashboard". It bundles the state stack, the alias
//! resolver reading from that stack, and the engine settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::alias::{AliasController, AliasFilter, AliasResolution, EntityAlias};
use crate::config::{DashboardConfig, EngineSettings};
use crate::data_source::{EntitiesDataSource, PageFetcher};
use crate::entity::Identified;
use crate::error::Result;
use crate::page::PageLink;
use crate::params::StateParams;
use crate::state_controller::{StateChange, StateController, SyncOptions};
use crate::value_state::{StateMatchRule, ValueStateMapper};

#[derive(Clone)]
pub struct DashboardContext {
    states: StateController,
    aliases: AliasController,
    settings: EngineSettings,
}

impl std::fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardContext")
            .field("states", &self.states)
            .field("aliases", &self.aliases.get_entity_aliases().len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl DashboardContext {
    /// Validate the document and build its controllers
    pub fn from_config(config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        let settings = config.engine.clone().with_env()?;
        let states = StateController::with_capacity(config.states, settings.state_change_capacity)?;
        debug!(title = %config.title, root = states.root_state_id(), "dashboard context ready");
        Ok(Self::with_controller(states, config.entity_aliases, settings))
    }

    /// Context over an existing state stack
    pub fn with_controller(
        states: StateController,
        aliases: BTreeMap<String, EntityAlias>,
        settings: EngineSettings,
    ) -> Self {
        let aliases = AliasController::new(aliases, Arc::new(states.clone()));
        Self {
            states,
            aliases,
            settings,
        }
    }

    /// Context for a dashboard embedded in this one's current state
    pub fn nested(&self, config: DashboardConfig, options: SyncOptions) -> Result<Self> {
        config.validate()?;
        let states = StateController::nested(&self.states, config.states, options)?;
        Ok(Self::with_controller(
            states,
            config.entity_aliases,
            self.settings.clone(),
        ))
    }

    pub fn state_controller(&self) -> &StateController {
        &self.states
    }

    pub fn alias_controller(&self) -> &AliasController {
        &self.aliases
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn get_state_params(&self) -> StateParams {
        self.states.get_state_params()
    }

    pub fn get_entity_aliases(&self) -> Arc<BTreeMap<String, EntityAlias>> {
        self.aliases.get_entity_aliases()
    }

    pub fn state_changed(&self) -> broadcast::Receiver<StateChange> {
        self.states.state_changed()
    }

    pub fn resolve_alias(&self, name: &str) -> Result<&AliasFilter> {
        self.aliases.resolve_alias(name)
    }

    pub fn resolve_entities(&self, name: &str) -> AliasResolution {
        self.aliases.resolve_entities(name)
    }

    /// First page request sized by the engine settings
    pub fn page_link(&self) -> PageLink {
        PageLink::new(self.settings.default_page_size)
    }

    /// Data source honouring the configured reload policy
    pub fn data_source<T>(&self, fetcher: impl PageFetcher<T> + 'static) -> EntitiesDataSource<T>
    where
        T: Identified + Clone + Send + Sync + 'static,
    {
        EntitiesDataSource::new(fetcher).with_reload_policy(self.settings.reload_policy)
    }

    pub fn value_mapper(&self, rules: &[StateMatchRule]) -> ValueStateMapper {
        ValueStateMapper::new(rules)
    }
}
