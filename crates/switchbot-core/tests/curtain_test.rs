#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::{MockGateway, bot, curtain, curtain_status, grouped_curtain};
use switchbot_core::entity::setup_curtains;
use switchbot_core::{
    CommandName, CoordinatorConfig, CoreError, CoverFeature, CoverState, CurtainEntity, DeviceId,
    DeviceInfo, DeviceType, Gateway, GatewayError, RefreshCoordinator,
};

async fn setup(mock: &Arc<MockGateway>) -> (RefreshCoordinator, Vec<Arc<CurtainEntity>>) {
    let coordinator = RefreshCoordinator::new(
        Arc::clone(mock) as Arc<dyn Gateway>,
        CoordinatorConfig::default(),
    );
    coordinator.first_refresh().await.unwrap();
    let curtains = setup_curtains(&coordinator);
    (coordinator, curtains)
}

async fn single_curtain(
    slide_position: u8,
) -> (Arc<MockGateway>, RefreshCoordinator, Arc<CurtainEntity>) {
    let mock = MockGateway::new();
    mock.add_device(curtain("C1"), curtain_status(slide_position, false));
    let (coordinator, mut curtains) = setup(&mock).await;
    let entity = curtains.pop().unwrap();
    (mock, coordinator, entity)
}

fn c1() -> DeviceId {
    DeviceId::from("C1")
}

// ── Selection ───────────────────────────────────────────────────────

#[tokio::test]
async fn selects_group_masters_and_ungrouped_calibrated_curtains() {
    let mock = MockGateway::new();
    mock.add_device(grouped_curtain("G-master", true), curtain_status(0, false));
    mock.add_device(grouped_curtain("G-slave", false), curtain_status(0, false));
    mock.add_device(curtain("Solo"), curtain_status(0, false));
    let mut uncalibrated = curtain("Raw");
    uncalibrated.calibrated = false;
    mock.add_device(uncalibrated, curtain_status(0, false));
    let mut offline = curtain("Offline");
    offline.cloud_enabled = false;
    mock.add_device(offline, curtain_status(0, false));
    mock.add_device(bot("B1"), serde_json::json!({}));

    let (coordinator, curtains) = setup(&mock).await;
    let ids: Vec<&str> = curtains.iter().map(|c| c.unique_id().as_str()).collect();

    assert_eq!(ids, vec!["G-master", "Solo"]);
    assert_eq!(coordinator.listener_count(), 2);
}

#[tokio::test]
async fn no_snapshot_means_no_entities() {
    let mock = MockGateway::new();
    mock.add_device(curtain("C1"), curtain_status(0, false));
    let coordinator = RefreshCoordinator::new(
        Arc::clone(&mock) as Arc<dyn Gateway>,
        CoordinatorConfig::default(),
    );

    assert!(setup_curtains(&coordinator).is_empty());
}

// ── Derived state ───────────────────────────────────────────────────

#[tokio::test]
async fn initial_state_is_derived_from_snapshot() {
    let (_mock, _coordinator, entity) = single_curtain(0).await;

    assert_eq!(
        entity.state(),
        CoverState {
            current_position: Some(100),
            is_closed: Some(false),
            is_opening: false,
            is_closing: false,
            is_moving: false,
            available: true,
        }
    );
    assert_eq!(
        entity.supported_features(),
        &[
            CoverFeature::Open,
            CoverFeature::Close,
            CoverFeature::SetPosition
        ]
    );
}

#[tokio::test]
async fn closed_curtain_reports_closed() {
    let (_mock, _coordinator, entity) = single_curtain(100).await;

    let state = entity.state();
    assert_eq!(state.current_position, Some(0));
    assert_eq!(state.is_closed, Some(true));
}

#[tokio::test]
async fn missing_position_leaves_state_unknown() {
    let mock = MockGateway::new();
    mock.add_device(curtain("C1"), serde_json::json!({ "battery": 80 }));
    let (_coordinator, curtains) = setup(&mock).await;

    let state = curtains[0].state();
    assert_eq!(state.current_position, None);
    assert_eq!(state.is_closed, None);
    assert!(!state.is_moving);
}

#[tokio::test]
async fn device_registry_info_names_the_vendor() {
    let (_mock, _coordinator, entity) = single_curtain(0).await;
    let info = entity.device_info();

    assert_eq!(
        info.identifiers,
        ("switchbot_cloud".to_owned(), "C1".to_owned())
    );
    assert_eq!(info.manufacturer, "SwitchBot");
    assert_eq!(info.model, "Curtain");
    assert_eq!(info.name, "Curtain C1");
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn open_sends_full_open_and_sets_opening() {
    let (mock, _coordinator, entity) = single_curtain(100).await;
    let mut updates = entity.state_updates();

    entity.open().await.unwrap();

    let commands = mock.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].0, c1());
    assert_eq!(commands[0].1.name, CommandName::SetPosition);
    assert_eq!(commands[0].1.parameter.as_deref(), Some("0,ff,0"));
    assert!(entity.state().is_opening);
    assert!(updates.has_changed().unwrap());
}

#[tokio::test]
async fn close_sends_full_close_and_sets_closing() {
    let (mock, _coordinator, entity) = single_curtain(0).await;

    entity.close().await.unwrap();

    assert_eq!(mock.commands()[0].1.parameter.as_deref(), Some("0,ff,100"));
    assert!(entity.state().is_closing);
    assert!(!entity.state().is_opening);
}

#[tokio::test]
async fn reversing_direction_clears_the_other_flag() {
    let (_mock, _coordinator, entity) = single_curtain(50).await;

    entity.close().await.unwrap();
    entity.open().await.unwrap();
    let state = entity.state();
    assert!(state.is_opening);
    assert!(!state.is_closing);

    entity.close().await.unwrap();
    let state = entity.state();
    assert!(state.is_closing);
    assert!(!state.is_opening);
}

#[tokio::test]
async fn set_position_inverts_target_without_optimistic_flag() {
    let (mock, _coordinator, entity) = single_curtain(0).await;

    entity.set_position(30).await.unwrap();

    assert_eq!(mock.commands()[0].1.parameter.as_deref(), Some("0,ff,70"));
    let state = entity.state();
    assert!(!state.is_opening);
    assert!(!state.is_closing);
}

#[tokio::test]
async fn set_position_rejects_out_of_range_target() {
    let (mock, _coordinator, entity) = single_curtain(0).await;

    let err = entity.set_position(150).await.unwrap_err();

    assert_eq!(err, CoreError::InvalidPosition { position: 150 });
    assert!(mock.commands().is_empty());
}

#[tokio::test]
async fn failed_command_reports_error_without_repoll() {
    let (mock, coordinator, entity) = single_curtain(100).await;
    mock.fail_commands(Some(GatewayError::transport("HTTP 500")));

    let err = entity.open().await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::CommandFailed { ref device_id, ref command, .. }
            if *device_id == c1() && command == "set_position"
    ));
    assert!(!entity.state().is_opening);
    assert_eq!(coordinator.listener_count(), 1);
    assert_eq!(mock.list_calls(), 1);
}

#[tokio::test]
async fn rejected_credentials_on_command_surface_as_auth_failure() {
    let (mock, coordinator, entity) = single_curtain(100).await;
    mock.fail_commands(Some(GatewayError::auth("token expired")));

    let err = entity.close().await.unwrap_err();

    assert!(err.is_auth_failure());
    assert!(!entity.state().is_closing);
    // The coordinator is untouched until its own refresh sees the rejection.
    assert!(coordinator.last_update_success());
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn opening_flag_clears_when_motion_stops() {
    let (mock, coordinator, entity) = single_curtain(100).await;
    entity.open().await.unwrap();

    mock.set_status(&c1(), curtain_status(40, true));
    coordinator.refresh().await.unwrap();
    let moving = entity.state();
    assert!(moving.is_opening);
    assert!(moving.is_moving);
    assert_eq!(moving.current_position, Some(60));

    mock.set_status(&c1(), curtain_status(0, false));
    coordinator.refresh().await.unwrap();
    let settled = entity.state();
    assert!(!settled.is_opening);
    assert!(!settled.is_moving);
    assert_eq!(settled.current_position, Some(100));
}

#[tokio::test]
async fn closing_flag_clears_on_first_still_snapshot() {
    let (mock, coordinator, entity) = single_curtain(0).await;
    entity.close().await.unwrap();

    // Cloud had not caught up with the command yet.
    mock.set_status(&c1(), curtain_status(0, false));
    coordinator.refresh().await.unwrap();

    assert!(!entity.state().is_closing);
}

#[tokio::test]
async fn missing_device_marks_unavailable_and_keeps_last_state() {
    let (mock, coordinator, entity) = single_curtain(60).await;

    mock.remove_device("C1");
    coordinator.refresh().await.unwrap();

    let state = entity.state();
    assert!(!state.available);
    assert_eq!(state.current_position, Some(40));
    assert_eq!(entity.device().id(), &c1());

    mock.add_device(curtain("C1"), curtain_status(20, false));
    coordinator.refresh().await.unwrap();
    let back = entity.state();
    assert!(back.available);
    assert_eq!(back.current_position, Some(80));
}

#[tokio::test]
async fn renamed_device_updates_entity_name() {
    let (mock, coordinator, entity) = single_curtain(0).await;

    mock.remove_device("C1");
    mock.add_device(
        {
            let mut info = DeviceInfo::new("C1", "Living room", DeviceType::Curtain);
            info.calibrated = true;
            info
        },
        curtain_status(0, false),
    );
    coordinator.refresh().await.unwrap();

    assert_eq!(entity.name(), "Living room");
}

#[tokio::test]
async fn removed_entity_stops_receiving_snapshots() {
    let (mock, coordinator, entity) = single_curtain(100).await;

    entity.remove();
    entity.remove();
    assert_eq!(coordinator.listener_count(), 0);

    mock.set_status(&c1(), curtain_status(0, false));
    coordinator.refresh().await.unwrap();
    assert_eq!(entity.state().current_position, Some(0));
}
