//! Dashboard state stack
//!
//! The controller owns the declared states of one dashboard and the active
//! path through them (root first, leaf last). Every completed transition is
//! published on a broadcast channel together with a full snapshot of the new
//! path, so listeners never see a half-applied update.
//!
//! Embedded dashboards get their own controller via [`StateController::nested`]
//! and follow a declared subset of the parent's params.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alias::StateParamsSource;
use crate::entity::EntityId;
use crate::error::{DashError, Result};
use crate::params::{ParamValue, StateParams};
use crate::state::{DashboardState, LayoutOverrides, StateObject, StateStatus};
use crate::token;

/// Default buffer of the state change channel
pub const DEFAULT_CHANGE_CAPACITY: usize = 64;

/// Param naming the group whose entity fills `${entityName}` in state names
pub const TARGET_ENTITY_PARAM: &str = "targetEntityParamName";

static NAME_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(entityName|entityLabel)\}").expect("valid regex"));

/// Options of a single transition
#[derive(Debug, Clone, Default)]
pub struct ActivateOptions {
    /// Params copied from the parent state when not given explicitly
    pub inherit: Vec<String>,
    /// Defaults applied in place to every layout of the target state
    pub overrides: Option<LayoutOverrides>,
}

impl ActivateOptions {
    pub fn inherit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inherit: names.into_iter().map(Into::into).collect(),
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: LayoutOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Result of [`StateController::activate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The state is now the leaf at `index`
    Activated { state_id: String, index: usize },
    /// No such state; render the "state not found" placeholder
    NotFound { state_id: String },
}

impl Activation {
    pub fn is_activated(&self) -> bool {
        matches!(self, Activation::Activated { .. })
    }
}

/// Result of [`StateController::decode`]
///
/// Replay always starts from the root state: a token whose first element is
/// some other state restores as `[root, that state, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The whole path was replayed
    Restored { depth: usize },
    /// Replay stopped at a state the dashboard does not declare
    Partial { missing: String, depth: usize },
    /// The token was unusable; the root state is shown
    Fallback { reason: String },
}

/// Notification fired once per completed transition
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub state_id: String,
    pub params: StateParams,
    pub path: Vec<StateObject>,
}

/// Nested dashboard synchronization settings
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// State shown by the embedded dashboard (its root when `None`)
    pub state_id: Option<String>,
    /// Param names followed from the parent's active params
    pub sync_params: Vec<String>,
    pub overrides: Option<LayoutOverrides>,
}

struct Stack {
    path: Vec<StateObject>,
    statuses: FxHashMap<String, StateStatus>,
    not_found: Option<String>,
    /// Leaf most recently navigated away from
    last_left: Option<StateObject>,
}

impl Stack {
    fn leaf(&self) -> &StateObject {
        // The path always holds at least the root
        &self.path[self.path.len() - 1]
    }

    fn leaf_id(&self) -> &str {
        self.leaf().id.as_deref().unwrap_or_default()
    }

    fn position(&self, state_id: &str) -> Option<usize> {
        self.path.iter().position(|s| s.id.as_deref() == Some(state_id))
    }

    fn refresh_statuses(&mut self) {
        let active: Vec<String> = self.path.iter().filter_map(|s| s.id.clone()).collect();
        for (id, status) in self.statuses.iter_mut() {
            *status = if active.contains(id) {
                StateStatus::Active
            } else {
                StateStatus::Inactive
            };
        }
    }

    fn change(&self) -> StateChange {
        StateChange {
            state_id: self.leaf_id().to_string(),
            params: self.leaf().params.clone(),
            path: self.path.clone(),
        }
    }
}

struct Inner {
    states: RwLock<BTreeMap<String, DashboardState>>,
    root_id: String,
    stack: Mutex<Stack>,
    changes: broadcast::Sender<StateChange>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.sync_task.get_mut().take() {
            task.abort();
        }
    }
}

/// State stack of one dashboard instance
#[derive(Clone)]
pub struct StateController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateController")
            .field("root", &self.inner.root_id)
            .field("path", &self.path_ids())
            .finish()
    }
}

/// Root is the state flagged `root`, else the first declared state
fn find_root(states: &BTreeMap<String, DashboardState>) -> Option<String> {
    states
        .values()
        .find(|s| s.root)
        .map(|s| s.id.clone())
        .or_else(|| states.keys().next().cloned())
}

impl StateController {
    pub fn new(states: BTreeMap<String, DashboardState>) -> Result<Self> {
        Self::with_capacity(states, DEFAULT_CHANGE_CAPACITY)
    }

    pub fn with_capacity(mut states: BTreeMap<String, DashboardState>, capacity: usize) -> Result<Self> {
        for (id, state) in states.iter_mut() {
            if state.id.is_empty() {
                state.id = id.clone();
            }
        }
        let root_id = find_root(&states).ok_or(DashError::NoRootState)?;

        let mut statuses: FxHashMap<String, StateStatus> = states
            .keys()
            .map(|id| (id.clone(), StateStatus::Inactive))
            .collect();
        statuses.insert(root_id.clone(), StateStatus::Active);

        let (changes, _) = broadcast::channel(capacity.max(1));
        Ok(Self {
            inner: Arc::new(Inner {
                states: RwLock::new(states),
                stack: Mutex::new(Stack {
                    path: vec![StateObject::new(root_id.clone(), StateParams::new())],
                    statuses,
                    not_found: None,
                    last_left: None,
                }),
                root_id,
                changes,
                sync_task: Mutex::new(None),
            }),
        })
    }

    // ═══════════════════════════════════════════
    // TRANSITIONS
    // ═══════════════════════════════════════════

    /// Make `state_id` the active leaf.
    ///
    /// A state already on the path becomes the leaf again (deeper states are
    /// dropped); any other state is pushed below the current leaf.
    pub fn activate(&self, state_id: &str, params: StateParams, options: ActivateOptions) -> Activation {
        let change = {
            let mut stack = self.inner.stack.lock();

            if !self.inner.states.read().contains_key(state_id) {
                warn!(state_id, "activate: state does not exist");
                stack.not_found = Some(state_id.to_string());
                return Activation::NotFound {
                    state_id: state_id.to_string(),
                };
            }
            stack
                .statuses
                .insert(state_id.to_string(), StateStatus::Activating);

            let position = stack.position(state_id);
            let mut params = params;
            if !options.inherit.is_empty() {
                let parent = match position {
                    Some(0) => None,
                    Some(i) => stack.path.get(i - 1),
                    None => Some(stack.leaf()),
                };
                if let Some(parent) = parent {
                    params.inherit_from(&parent.params, &options.inherit);
                }
            }

            if let Some(overrides) = options.overrides.as_ref().filter(|o| !o.is_empty()) {
                if let Some(state) = self.inner.states.write().get_mut(state_id) {
                    state.apply_overrides(overrides);
                }
            }

            let previous = stack.leaf().clone();
            match position {
                Some(i) => {
                    stack.path.truncate(i + 1);
                    stack.path[i].params = params;
                }
                None => stack.path.push(StateObject::new(state_id, params)),
            }
            let previous_id = previous.id.as_deref().unwrap_or_default();
            if previous_id != state_id && stack.position(previous_id).is_none() {
                stack.last_left = Some(previous);
            }

            stack.not_found = None;
            stack.refresh_statuses();
            debug!(state_id, depth = stack.path.len(), "state activated");
            stack.change()
        };

        let index = change.path.len() - 1;
        self.notify(change);
        Activation::Activated {
            state_id: state_id.to_string(),
            index,
        }
    }

    /// `activate` with default options
    pub fn open_state(&self, state_id: &str, params: StateParams) -> Activation {
        self.activate(state_id, params, ActivateOptions::default())
    }

    /// Replace the leaf (same state when `state_id` is `None`)
    pub fn update_state(&self, state_id: Option<&str>, params: StateParams) -> Activation {
        let change = {
            let mut stack = self.inner.stack.lock();
            let target = state_id.unwrap_or(stack.leaf_id()).to_string();
            if !self.inner.states.read().contains_key(&target) {
                warn!(state_id = %target, "update: state does not exist");
                stack.not_found = Some(target.clone());
                return Activation::NotFound { state_id: target };
            }

            let last = stack.path.len() - 1;
            stack.path[last] = StateObject::new(target, params);
            stack.not_found = None;
            stack.refresh_statuses();
            stack.change()
        };

        let index = change.path.len() - 1;
        let state_id = change.state_id.clone();
        self.notify(change);
        Activation::Activated { state_id, index }
    }

    /// Go back to the state at `index` of the path
    pub fn navigate_prev_state(&self, index: usize) -> bool {
        let change = {
            let mut stack = self.inner.stack.lock();
            if index + 1 >= stack.path.len() {
                return false;
            }
            let left = stack.leaf().clone();
            stack.path.truncate(index + 1);
            stack.last_left = Some(left);
            stack.refresh_statuses();
            stack.change()
        };
        self.notify(change);
        true
    }

    /// Back to the root state with empty params
    pub fn reset_state(&self) {
        let change = {
            let mut stack = self.inner.stack.lock();
            self.reset_locked(&mut stack);
            stack.change()
        };
        self.notify(change);
    }

    fn reset_locked(&self, stack: &mut Stack) {
        if stack.path.len() > 1 || stack.leaf_id() != self.inner.root_id {
            stack.last_left = Some(stack.leaf().clone());
        }
        stack.path = vec![StateObject::new(self.inner.root_id.clone(), StateParams::new())];
        stack.not_found = None;
        stack.refresh_statuses();
    }

    /// Re-open the leaf most recently navigated away from
    pub fn resume_last(&self) -> Option<Activation> {
        let last = self.inner.stack.lock().last_left.clone()?;
        let id = last.id?;
        Some(self.open_state(&id, last.params))
    }

    fn notify(&self, change: StateChange) {
        // No receivers is fine
        let _ = self.inner.changes.send(change);
    }

    // ═══════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════

    pub fn root_state_id(&self) -> &str {
        &self.inner.root_id
    }

    pub fn get_state_id(&self) -> String {
        self.inner.stack.lock().leaf_id().to_string()
    }

    /// Params of the active leaf (deep copy)
    pub fn get_state_params(&self) -> StateParams {
        self.inner.stack.lock().leaf().params.clone()
    }

    pub fn get_state_params_by_state_id(&self, state_id: &str) -> Option<StateParams> {
        let stack = self.inner.stack.lock();
        stack.position(state_id).map(|i| stack.path[i].params.clone())
    }

    pub fn get_state_index(&self) -> usize {
        self.inner.stack.lock().path.len() - 1
    }

    pub fn get_state_id_at_index(&self, index: usize) -> Option<String> {
        self.inner
            .stack
            .lock()
            .path
            .get(index)
            .and_then(|s| s.id.clone())
    }

    /// Entity bound in the leaf params (`param_name` group or top level)
    pub fn get_entity_id(&self, param_name: Option<&str>) -> Option<EntityId> {
        self.inner
            .stack
            .lock()
            .leaf()
            .params
            .entity_id_for(param_name)
            .cloned()
    }

    /// Root-to-leaf path (deep copy)
    pub fn path(&self) -> Vec<StateObject> {
        self.inner.stack.lock().path.clone()
    }

    pub fn path_ids(&self) -> Vec<String> {
        self.inner
            .stack
            .lock()
            .path
            .iter()
            .filter_map(|s| s.id.clone())
            .collect()
    }

    /// `None` for undeclared states
    pub fn status(&self, state_id: &str) -> Option<StateStatus> {
        self.inner.stack.lock().statuses.get(state_id).copied()
    }

    /// Id of the last state that could not be activated
    pub fn state_not_found(&self) -> Option<String> {
        self.inner.stack.lock().not_found.clone()
    }

    pub fn state(&self, state_id: &str) -> Option<DashboardState> {
        self.inner.states.read().get(state_id).cloned()
    }

    pub fn state_ids(&self) -> Vec<String> {
        self.inner.states.read().keys().cloned().collect()
    }

    /// Display name of the state at `index`, with `${entityName}` and
    /// `${entityLabel}` filled from its params
    pub fn state_name(&self, index: usize) -> Option<String> {
        let object = self.inner.stack.lock().path.get(index)?.clone();
        let id = object.id.as_deref()?;
        let name = self.inner.states.read().get(id).map(|s| s.name.clone())?;

        let target = object
            .params
            .get(TARGET_ENTITY_PARAM)
            .and_then(ParamValue::as_text);
        let scope = object.params.entity_scope(target);
        let replaced = NAME_PLACEHOLDER.replace_all(&name, |caps: &Captures| {
            let value = scope.and_then(|scope| match &caps[1] {
                "entityName" => scope.entity_name(),
                _ => scope.entity_label().or(scope.entity_name()),
            });
            value.unwrap_or_default().to_string()
        });
        Some(replaced.into_owned())
    }

    /// Subscribe to completed transitions
    pub fn state_changed(&self) -> broadcast::Receiver<StateChange> {
        self.inner.changes.subscribe()
    }

    // ═══════════════════════════════════════════
    // NAVIGATION TOKENS
    // ═══════════════════════════════════════════

    /// Token for the current root-to-leaf path
    pub fn encode(&self) -> Result<String> {
        token::encode_path(&self.path())
    }

    /// Token escaped for use in a URL query
    pub fn encode_uri(&self) -> Result<String> {
        self.encode().map(|t| token::to_uri_component(&t))
    }

    /// Replay a token's path, root first. Unusable tokens show the root state.
    ///
    /// Elements are activated in order on top of a fresh root, so a leading
    /// non-root element is pushed below the root rather than replacing it.
    pub fn decode(&self, token: &str) -> DecodeOutcome {
        let objects = match token::decode_path(token) {
            Ok(objects) if !objects.is_empty() => objects,
            Ok(_) => return self.fallback("token holds an empty path".to_string()),
            Err(e) => return self.fallback(e.to_string()),
        };

        {
            let mut stack = self.inner.stack.lock();
            self.reset_locked(&mut stack);
        }

        for (depth, object) in objects.into_iter().enumerate() {
            let id = object.id.unwrap_or_else(|| self.inner.root_id.clone());
            if let Activation::NotFound { state_id } =
                self.activate(&id, object.params, ActivateOptions::default())
            {
                return DecodeOutcome::Partial {
                    missing: state_id,
                    depth,
                };
            }
        }
        DecodeOutcome::Restored {
            depth: self.get_state_index() + 1,
        }
    }

    fn fallback(&self, reason: String) -> DecodeOutcome {
        warn!(%reason, "navigation token rejected, showing root state");
        self.reset_state();
        DecodeOutcome::Fallback { reason }
    }

    // ═══════════════════════════════════════════
    // NESTED DASHBOARDS
    // ═══════════════════════════════════════════

    /// Controller for a dashboard embedded in `parent`'s current state.
    ///
    /// Synced params are seeded from the parent now; under a tokio runtime a
    /// listener re-applies them after every parent transition until the
    /// returned controller is dropped or [`detach`](Self::detach)ed.
    pub fn nested(
        parent: &StateController,
        states: BTreeMap<String, DashboardState>,
        options: SyncOptions,
    ) -> Result<Self> {
        let child = Self::new(states)?;
        let receiver = parent.state_changed();

        let target = options
            .state_id
            .clone()
            .unwrap_or_else(|| child.inner.root_id.clone());
        let mut params = StateParams::new();
        params.sync_from(&parent.get_state_params(), &options.sync_params);
        child.activate(
            &target,
            params,
            ActivateOptions {
                inherit: Vec::new(),
                overrides: options.overrides.clone(),
            },
        );

        if options.sync_params.is_empty() {
            return Ok(child);
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(&child.inner);
                let task = handle.spawn(follow_parent(receiver, weak, options));
                *child.inner.sync_task.lock() = Some(task);
                info!(target_state = %target, "nested dashboard synced with parent");
            }
            Err(_) => warn!("no tokio runtime, nested dashboard will not follow its parent"),
        }
        Ok(child)
    }

    /// Pull the synced params from `parent` once
    pub fn sync_from_parent(&self, parent_params: &StateParams, options: &SyncOptions) -> Activation {
        let target = options.state_id.clone().unwrap_or_else(|| self.get_state_id());
        let mut params = self
            .get_state_params_by_state_id(&target)
            .unwrap_or_default();
        params.sync_from(parent_params, &options.sync_params);
        self.activate(
            &target,
            params,
            ActivateOptions {
                inherit: Vec::new(),
                overrides: options.overrides.clone(),
            },
        )
    }

    /// Stop following the parent dashboard
    pub fn detach(&self) {
        if let Some(task) = self.inner.sync_task.lock().take() {
            task.abort();
            debug!("nested dashboard detached from parent");
        }
    }

    pub fn is_synced(&self) -> bool {
        self.inner
            .sync_task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

async fn follow_parent(
    mut receiver: broadcast::Receiver<StateChange>,
    child: Weak<Inner>,
    options: SyncOptions,
) {
    loop {
        match receiver.recv().await {
            Ok(change) => {
                let Some(inner) = child.upgrade() else {
                    break;
                };
                let controller = StateController { inner };
                controller.sync_from_parent(&change.params, &options);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "nested dashboard lagged behind parent");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

impl StateParamsSource for StateController {
    fn state_params(&self) -> StateParams {
        self.get_state_params()
    }
}
