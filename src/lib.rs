//! dashstate - dashboard navigation and widget data engine
//!
//! Four cooperating pieces behind an IoT dashboard:
//! - [`StateController`]: stack of named states with params, serialisable
//!   to a navigation token
//! - [`AliasController`]: named entity filters resolved against the active
//!   state params
//! - [`EntitiesDataSource`]: paged, selectable table source over an injected
//!   fetcher
//! - [`ValueStateMapper`]: raw telemetry value to discrete state and label

pub mod alias;
pub mod config;
pub mod context;
pub mod data_source;
pub mod entity;
pub mod error;
pub mod page;
pub mod params;
pub mod state;
pub mod state_controller;
pub mod token;
pub mod value_state;

pub use alias::{AliasController, AliasFilter, AliasResolution, EntityAlias, FilterKind};
pub use config::{DashboardConfig, EngineSettings};
pub use context::DashboardContext;
pub use data_source::{fetch_fn, EntitiesDataSource, PageFetcher, ReloadPolicy};
pub use entity::{EntityId, Identified};
pub use error::{DashError, FixSuggestion};
pub use page::{Direction, PageData, PageLink, PageMeta, SortOrder};
pub use params::{ParamValue, StateParams};
pub use state::{DashboardState, GridLayout, LayoutOverrides, StateObject, StateStatus};
pub use state_controller::{
    ActivateOptions, Activation, DecodeOutcome, StateChange, StateController, SyncOptions,
};
pub use value_state::{StateMatchRule, ValueStateMapper};
