//! End-to-end dashboard scenarios through the public API

use std::sync::Arc;
use std::time::Duration;

use dashstate::params::{ENTITY_ID, ENTITY_NAME};
use dashstate::{
    fetch_fn, ActivateOptions, AliasResolution, DashError, DashboardConfig, DashboardContext,
    DecodeOutcome, EntityId, Identified, PageData, PageLink, StateMatchRule, StateParams,
    SyncOptions,
};
use serde_json::json;

const PLANT: &str = r#"
title: Plant
states:
  default:
    name: Plant
    root: true
  boiler:
    name: "Boiler ${entityName}"
  sensor:
    name: "${entityName}"
entityAliases:
  current:
    alias: Current boiler
    filter:
      type: stateEntity
"#;

const EMBEDDED: &str = r#"
states:
  summary:
    name: Summary
    root: true
entityAliases:
  focus:
    alias: Focus
    filter:
      type: stateEntity
"#;

#[derive(Debug, Clone, PartialEq)]
struct Boiler {
    id: EntityId,
    online: bool,
}

impl Identified for Boiler {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }
}

fn plant() -> DashboardContext {
    DashboardContext::from_config(DashboardConfig::from_yaml(PLANT).unwrap()).unwrap()
}

fn boiler_params(id: &str, name: &str) -> StateParams {
    StateParams::new()
        .with(ENTITY_ID, EntityId::new("DEVICE", id))
        .with(ENTITY_NAME, name)
}

#[test]
fn drill_down_share_and_restore() {
    let ctx = plant();
    let states = ctx.state_controller();

    states.activate("boiler", boiler_params("b1", "North"), ActivateOptions::default());
    states.activate(
        "sensor",
        StateParams::new().with(ENTITY_NAME, "Flow"),
        ActivateOptions::inherit([ENTITY_ID]),
    );
    assert_eq!(states.path_ids(), vec!["default", "boiler", "sensor"]);
    assert_eq!(states.state_name(1).as_deref(), Some("Boiler North"));
    assert_eq!(
        states.get_entity_id(None),
        Some(EntityId::new("DEVICE", "b1"))
    );

    let token = states.encode().unwrap();

    let restored = plant();
    assert_eq!(
        restored.state_controller().decode(&token),
        DecodeOutcome::Restored { depth: 3 }
    );
    assert_eq!(restored.state_controller().path(), states.path());
    assert_eq!(
        restored.resolve_entities("Current boiler"),
        AliasResolution::Entities(vec![EntityId::new("DEVICE", "b1")])
    );
}

#[test]
fn breadcrumb_navigation_pops_states() {
    let ctx = plant();
    let states = ctx.state_controller();
    states.activate("boiler", boiler_params("b1", "North"), ActivateOptions::default());
    states.activate("sensor", StateParams::new(), ActivateOptions::default());

    assert!(states.navigate_prev_state(0));
    assert_eq!(states.get_state_id(), "default");
    assert_eq!(
        ctx.resolve_entities("Current boiler"),
        AliasResolution::Unresolved {
            alias: "Current boiler".into(),
            reason: "state has no entity".into(),
        }
    );
}

#[test]
fn unknown_state_keeps_path_and_errors_stay_data() {
    let ctx = plant();
    let states = ctx.state_controller();
    let before = states.path();

    assert!(!states
        .activate("nowhere", StateParams::new(), ActivateOptions::default())
        .is_activated());
    assert_eq!(states.path(), before);
    assert_eq!(states.state_not_found().as_deref(), Some("nowhere"));
    assert!(matches!(
        ctx.resolve_alias("nowhere"),
        Err(DashError::UnknownAlias { .. })
    ));
}

#[tokio::test]
async fn state_change_events_carry_params() {
    let ctx = plant();
    let mut changes = ctx.state_changed();

    ctx.state_controller()
        .activate("boiler", boiler_params("b9", "South"), ActivateOptions::default());

    let change = changes.recv().await.unwrap();
    assert_eq!(change.state_id, "boiler");
    assert_eq!(
        change.params.entity_id(),
        Some(&EntityId::new("DEVICE", "b9"))
    );
    assert_eq!(change.path.len(), 2);
}

#[tokio::test]
async fn embedded_dashboard_follows_parent_entity() {
    let parent = plant();
    let child = parent
        .nested(
            DashboardConfig::from_yaml(EMBEDDED).unwrap(),
            SyncOptions {
                state_id: None,
                sync_params: vec![ENTITY_ID.to_string()],
                overrides: None,
            },
        )
        .unwrap();
    assert!(!child.resolve_entities("Focus").is_resolved());

    parent
        .state_controller()
        .activate("boiler", boiler_params("b3", "East"), ActivateOptions::default());

    let synced = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if child.resolve_entities("Focus").is_resolved() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(synced.is_ok());
    assert_eq!(
        child.resolve_entities("Focus").entities(),
        &[EntityId::new("DEVICE", "b3")]
    );
    assert_eq!(child.state_controller().get_state_id(), "summary");
}

#[tokio::test]
async fn boiler_table_with_selection_and_states() {
    let ctx = plant();
    let fleet: Arc<Vec<Boiler>> = Arc::new(
        (0..7)
            .map(|n| Boiler {
                id: EntityId::new("DEVICE", format!("b{n}")),
                online: n % 3 != 0,
            })
            .collect(),
    );

    let source = ctx
        .data_source(fetch_fn(move |link: PageLink| {
            let fleet = Arc::clone(&fleet);
            async move {
                Ok::<_, DashError>(link.filter_data(
                    fleet.as_slice(),
                    |b: &Boiler| b.id.id.clone(),
                    |a: &Boiler, b: &Boiler, _: &str| a.id.id.cmp(&b.id.id),
                ))
            }
        }))
        .with_selectable(|b: &Boiler| b.online);

    let page: PageData<Boiler> = source.load_entities(ctx.page_link()).await;
    assert_eq!(page.data.len(), 7);
    assert!(!source.loading());

    source.master_toggle();
    assert_eq!(source.selected_count(), 4);
    assert!(source.is_all_selected());

    let first = source.items()[1].clone();
    assert!(source.toggle_current_entity(&first));
    assert!(source.is_current_entity(&first));

    source.load_entities(ctx.page_link().with_text_search("b1")).await;
    assert_eq!(source.selected_count(), 0);
    assert_eq!(source.total(), 1);

    let mapper = ctx.value_mapper(&[
        StateMatchRule::constant(0.0, "Offline", false),
        StateMatchRule::constant(1.0, "Online", true),
    ]);
    let labels: Vec<String> = source
        .items()
        .iter()
        .map(|b| mapper.tooltip(&json!(b.online), None, None))
        .collect();
    assert_eq!(labels, vec!["Online"]);

    source.disconnect();
    source.disconnect();
}
