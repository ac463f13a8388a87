//! End-to-end tests of the coordination state machine against mock
//! collaborators: the session port, the remote input provider, the device
//! inventory, and the pointer port.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use input_flow_bridge::mock::{MockBehavior, MockRemoteInput, MockRemoteInputHandle};
use input_flow_bridge::{OperationKind, RemoteInputBridge};
use input_flow_daemon::event::CoordinationEvent;
use input_flow_daemon::hotarea::MouseLocationTracker;
use input_flow_daemon::mock::{MockInventory, MockPointer};
use input_flow_daemon::{CoordinationError, StateMachine};
use input_flow_protocol::mock::{MockSession, MockSessionHandle, SessionCall};
use input_flow_types::{Command, CoordinationState, DeviceHandleId, DeviceId, InputDeviceId};

const LOCAL: &str = "local";
const PEER_A: &str = "peer-a";
const PEER_B: &str = "peer-b";
const MOUSE: InputDeviceId = InputDeviceId(1);

struct Fixture {
    sm: StateMachine,
    session: MockSessionHandle,
    provider: MockRemoteInputHandle,
    inventory: MockInventory,
    pointer: MockPointer,
    events: mpsc::UnboundedReceiver<CoordinationEvent>,
}

fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let session = MockSession::new();
    let session_handle = session.handle();
    let provider = MockRemoteInput::new();
    let provider_handle = provider.handle();
    let inventory = MockInventory::new();
    inventory.add_device(MOUSE, "local-mouse", LOCAL);
    let pointer = MockPointer::new();
    let location = Arc::new(MouseLocationTracker::new(2000, 1000));
    location.update(1980, 400);

    let sm = StateMachine::new(
        DeviceId::new(LOCAL),
        Arc::new(session),
        RemoteInputBridge::new(Arc::new(provider)),
        Arc::new(inventory.clone()),
        Arc::new(pointer.clone()),
        location,
    );
    let events = sm.subscribe();
    Fixture {
        sm,
        session: session_handle,
        provider: provider_handle,
        inventory,
        pointer,
        events,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within the polling window");
}

async fn wait_for_state(sm: &StateMachine, state: CoordinationState) {
    let sm = sm.clone();
    wait_until(move || sm.current_state() == state).await;
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<CoordinationEvent>) -> CoordinationEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no event within the timeout")
        .expect("event channel closed")
}

fn provider_kinds(provider: &MockRemoteInputHandle) -> Vec<OperationKind> {
    provider.calls().iter().map(|c| c.kind).collect()
}

/// Feed an inbound activation until the machine is IN toward `peer`, with
/// the peer's peripheral as the active start device.
async fn drive_to_in(fx: &mut Fixture, peer: &str) {
    fx.inventory.add_device(InputDeviceId(9), "remote-mouse", peer);
    let peer_id = DeviceId::new(peer);
    fx.sm.handle_command(
        peer_id.clone(),
        Command::Start {
            local_device_id: peer_id.clone(),
            session_id: 1,
            button_pressed: false,
        },
    );
    fx.sm.handle_command(
        peer_id,
        Command::StartResult {
            result: true,
            start_dhid: DeviceHandleId::new("remote-mouse"),
            pointer_x_percent: 30,
            pointer_y_percent: 40,
            session_id: 1,
        },
    );
    wait_for_state(&fx.sm, CoordinationState::In).await;
}

async fn drive_to_out(fx: &mut Fixture, peer: &str) {
    fx.sm
        .activate_coordination(&DeviceId::new(peer), MOUSE)
        .await
        .unwrap();
    wait_for_state(&fx.sm, CoordinationState::Out).await;
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn activation_from_free_reaches_out() {
    let mut fx = fixture();
    let peer = DeviceId::new(PEER_A);

    fx.sm.activate_coordination(&peer, MOUSE).await.unwrap();
    wait_for_state(&fx.sm, CoordinationState::Out).await;

    assert_eq!(
        provider_kinds(&fx.provider),
        vec![OperationKind::Prepare, OperationKind::Start]
    );
    let calls = fx.provider.calls();
    assert_eq!(calls[1].remote, peer);
    assert_eq!(calls[1].origin, DeviceId::new(LOCAL));
    assert_eq!(calls[1].dhids, vec![DeviceHandleId::new("local-mouse")]);

    assert!(fx.session.is_open(&peer));
    assert!(fx
        .session
        .calls()
        .contains(&SessionCall::Start(peer.clone(), false)));
    let commands = fx.session.commands_to(&peer);
    assert!(matches!(
        commands[0],
        Command::StartResult {
            result: true,
            pointer_x_percent: 99,
            pointer_y_percent: 40,
            ..
        }
    ));

    assert_eq!(fx.sm.remote_device(), Some(peer.clone()));
    assert_eq!(fx.sm.start_dhid(), Some(DeviceHandleId::new("local-mouse")));
    assert_eq!(
        fx.sm.prepared_pair(),
        Some((peer, DeviceId::new(LOCAL)))
    );
    assert!(!fx.pointer.is_visible());
    assert!(fx.pointer.filter_installed());
    assert!(!fx.sm.is_starting());
}

#[tokio::test]
async fn activation_rejects_bad_parameters() {
    let fx = fixture();

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(""), MOUSE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::ParameterError));

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(LOCAL), MOUSE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::ParameterError));

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(PEER_A), InputDeviceId(42))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::NoDevice));
}

#[tokio::test]
async fn disabled_crossing_switch_denies_activation() {
    let fx = fixture();
    fx.inventory.set_crossing_switch(PEER_A, false);

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(PEER_A), MOUSE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::NotAllowed));
    assert!(!fx.sm.is_starting());
    assert!(fx.session.calls().is_empty());
}

#[tokio::test]
async fn concurrent_activation_is_rejected() {
    let fx = fixture();
    fx.provider
        .set_behavior(OperationKind::Prepare, MockBehavior::Hold);

    fx.sm
        .activate_coordination(&DeviceId::new(PEER_A), MOUSE)
        .await
        .unwrap();
    assert!(fx.sm.is_starting());

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(PEER_B), MOUSE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::InTransition));

    let provider = fx.provider.clone();
    wait_until(move || {
        provider
            .calls()
            .iter()
            .any(|c| c.kind == OperationKind::Prepare)
    })
    .await;
    fx.provider.resolve_held(OperationKind::Prepare, true);
    wait_for_state(&fx.sm, CoordinationState::Out).await;
}

#[tokio::test]
async fn activation_while_out_is_rejected() {
    let mut fx = fixture();
    drive_to_out(&mut fx, PEER_A).await;

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(PEER_B), MOUSE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::ParameterError));
    assert_eq!(fx.sm.current_state(), CoordinationState::Out);
    assert!(!fx.sm.is_starting());
}

#[tokio::test]
async fn session_open_failure_maps_to_timeout() {
    let fx = fixture();
    fx.session.fail_open(true);

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(PEER_A), MOUSE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::SessionTimeout));
    assert!(!fx.sm.is_starting());
    assert_eq!(fx.sm.current_state(), CoordinationState::Free);
}

#[tokio::test]
async fn failed_capability_start_reports_failure_and_stays_free() {
    let mut fx = fixture();
    fx.provider
        .set_behavior(OperationKind::Start, MockBehavior::CompleteWith(false));
    let peer = DeviceId::new(PEER_A);

    fx.sm.activate_coordination(&peer, MOUSE).await.unwrap();
    loop {
        if let CoordinationEvent::ActivateResult { success, .. } = next_event(&mut fx.events).await
        {
            assert!(!success);
            break;
        }
    }

    assert_eq!(fx.sm.current_state(), CoordinationState::Free);
    assert!(!fx.sm.is_starting());
    let commands = fx.session.commands_to(&peer);
    assert!(matches!(
        commands[0],
        Command::StartResult { result: false, .. }
    ));
}

#[tokio::test]
async fn button_down_activation_announces_pressed_button() {
    let fx = fixture();
    fx.sm.set_button_down(true);
    let peer = DeviceId::new(PEER_A);

    fx.sm.activate_coordination(&peer, MOUSE).await.unwrap();
    let sm = fx.sm.clone();
    wait_until(move || sm.current_state() == CoordinationState::Out).await;

    assert!(fx.session.calls().contains(&SessionCall::Start(peer, true)));
}

// ---------------------------------------------------------------------------
// Round trip and deactivation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_round_trip_returns_to_free() {
    let mut fx = fixture();
    let peer = DeviceId::new(PEER_A);
    drive_to_out(&mut fx, PEER_A).await;

    fx.sm.deactivate_coordination(false).await.unwrap();
    wait_for_state(&fx.sm, CoordinationState::Free).await;

    assert!(provider_kinds(&fx.provider).contains(&OperationKind::Stop));
    let commands = fx.session.commands_to(&peer);
    assert!(commands
        .iter()
        .any(|c| matches!(c, Command::Stop { unchained: false, .. })));
    assert!(commands
        .iter()
        .any(|c| matches!(c, Command::StopResult { result: true, .. })));

    // Plain stop keeps the prepared pair but closes the session
    assert!(fx.sm.prepared_pair().is_some());
    assert!(fx.session.calls().contains(&SessionCall::Close(peer)));
    assert!(fx.sm.remote_device().is_none());
    assert!(fx.sm.start_dhid().is_none());
    assert!(!fx.sm.is_stopping());
    assert!(fx.pointer.is_visible());
    assert_eq!(fx.pointer.location(), Some((50, 50)));
    assert!(!fx.pointer.filter_installed());
}

#[tokio::test]
async fn concurrent_deactivation_is_rejected() {
    let mut fx = fixture();
    drive_to_out(&mut fx, PEER_A).await;
    fx.provider
        .set_behavior(OperationKind::Stop, MockBehavior::Hold);

    fx.sm.deactivate_coordination(false).await.unwrap();
    assert!(fx.sm.is_stopping());

    let err = fx.sm.deactivate_coordination(false).await.unwrap_err();
    assert!(matches!(err, CoordinationError::InTransition));

    let provider = fx.provider.clone();
    wait_until(move || {
        provider
            .calls()
            .iter()
            .any(|c| c.kind == OperationKind::Stop)
    })
    .await;
    fx.provider.resolve_held(OperationKind::Stop, true);
    wait_for_state(&fx.sm, CoordinationState::Free).await;
}

#[tokio::test]
async fn activation_is_rejected_while_deactivation_is_in_flight() {
    let mut fx = fixture();
    drive_to_out(&mut fx, PEER_A).await;
    fx.provider
        .set_behavior(OperationKind::Stop, MockBehavior::Hold);

    fx.sm.deactivate_coordination(false).await.unwrap();
    assert!(fx.sm.is_stopping());

    let err = fx
        .sm
        .activate_coordination(&DeviceId::new(PEER_A), MOUSE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::InTransition));
    assert!(!(fx.sm.is_starting() && fx.sm.is_stopping()));

    let provider = fx.provider.clone();
    wait_until(move || {
        provider
            .calls()
            .iter()
            .any(|c| c.kind == OperationKind::Stop)
    })
    .await;
    fx.provider.resolve_held(OperationKind::Stop, true);
    wait_for_state(&fx.sm, CoordinationState::Free).await;
    assert!(!fx.sm.is_starting());
    assert!(!fx.sm.is_stopping());
}

#[tokio::test]
async fn deactivation_is_rejected_while_activation_is_in_flight() {
    let fx = fixture();
    fx.provider
        .set_behavior(OperationKind::Prepare, MockBehavior::Hold);

    fx.sm
        .activate_coordination(&DeviceId::new(PEER_A), MOUSE)
        .await
        .unwrap();
    assert!(fx.sm.is_starting());

    let err = fx.sm.deactivate_coordination(false).await.unwrap_err();
    assert!(matches!(err, CoordinationError::InTransition));
    assert!(!(fx.sm.is_starting() && fx.sm.is_stopping()));

    let provider = fx.provider.clone();
    wait_until(move || {
        provider
            .calls()
            .iter()
            .any(|c| c.kind == OperationKind::Prepare)
    })
    .await;
    fx.provider.resolve_held(OperationKind::Prepare, true);
    wait_for_state(&fx.sm, CoordinationState::Out).await;
    assert!(!fx.sm.is_starting());
    assert!(!fx.sm.is_stopping());
}

#[tokio::test]
async fn plain_deactivation_from_free_is_a_no_op() {
    let fx = fixture();
    fx.sm.deactivate_coordination(false).await.unwrap();
    assert!(!fx.sm.is_stopping());
    assert!(fx.session.calls().is_empty());
}

#[tokio::test]
async fn unchain_from_free_tears_down_prepared_pair() {
    let mut fx = fixture();
    let peer = DeviceId::new(PEER_A);
    drive_to_out(&mut fx, PEER_A).await;
    fx.sm.deactivate_coordination(false).await.unwrap();
    wait_for_state(&fx.sm, CoordinationState::Free).await;
    assert!(fx.sm.prepared_pair().is_some());

    fx.sm.deactivate_coordination(true).await.unwrap();
    let sm = fx.sm.clone();
    wait_until(move || sm.prepared_pair().is_none()).await;

    assert!(provider_kinds(&fx.provider).contains(&OperationKind::Unprepare));
    let commands = fx.session.commands_to(&peer);
    assert!(commands
        .iter()
        .any(|c| matches!(c, Command::Stop { unchained: true, .. })));
    assert!(commands.iter().any(|c| matches!(
        c,
        Command::UnchainResult { result: true, .. }
    )));
    let sm = fx.sm.clone();
    wait_until(move || !sm.is_stopping()).await;
}

#[tokio::test]
async fn unchain_while_out_skips_session_close() {
    let mut fx = fixture();
    let peer = DeviceId::new(PEER_A);
    drive_to_out(&mut fx, PEER_A).await;

    fx.sm.deactivate_coordination(true).await.unwrap();
    wait_for_state(&fx.sm, CoordinationState::Free).await;
    let sm = fx.sm.clone();
    wait_until(move || sm.prepared_pair().is_none()).await;

    let commands = fx.session.commands_to(&peer);
    assert!(commands.iter().any(|c| matches!(
        c,
        Command::UnchainResult { result: true, .. }
    )));
    // Unchain leaves session closure to the capability teardown
    assert!(!fx.session.calls().contains(&SessionCall::Close(peer)));
}

// ---------------------------------------------------------------------------
// Inbound flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inbound_start_result_mirrors_pointer_and_enters_in() {
    let mut fx = fixture();
    drive_to_in(&mut fx, PEER_A).await;

    assert_eq!(fx.sm.current_state(), CoordinationState::In);
    assert_eq!(fx.sm.remote_device(), Some(DeviceId::new(PEER_A)));
    assert_eq!(fx.sm.start_dhid(), Some(DeviceHandleId::new("remote-mouse")));
    // Crossing point mirrored onto the opposite edge
    assert_eq!(fx.pointer.location(), Some((70, 40)));
    assert!(fx.pointer.filter_installed());
}

#[tokio::test]
async fn inbound_start_with_button_pressed_acknowledges_filter() {
    let fx = fixture();
    let peer = DeviceId::new(PEER_A);

    fx.sm.handle_command(
        peer.clone(),
        Command::Start {
            local_device_id: peer.clone(),
            session_id: 1,
            button_pressed: true,
        },
    );
    let session = fx.session.clone();
    let watched = peer.clone();
    wait_until(move || {
        session
            .commands_to(&watched)
            .iter()
            .any(|c| matches!(c, Command::FilterAdded))
    })
    .await;
    assert!(fx.pointer.filter_installed());
}

#[tokio::test]
async fn inbound_stop_while_in_returns_to_free() {
    let mut fx = fixture();
    let peer = DeviceId::new(PEER_A);
    drive_to_in(&mut fx, PEER_A).await;

    fx.sm.handle_command(
        peer.clone(),
        Command::Stop {
            unchained: false,
            session_id: 1,
        },
    );
    wait_for_state(&fx.sm, CoordinationState::Free).await;

    assert!(provider_kinds(&fx.provider).contains(&OperationKind::Stop));
    assert!(fx
        .session
        .commands_to(&peer)
        .iter()
        .any(|c| matches!(c, Command::StopResult { result: true, .. })));
    assert!(fx.pointer.is_visible());
}

#[tokio::test]
async fn stale_stop_result_is_dropped() {
    let mut fx = fixture();
    drive_to_out(&mut fx, PEER_A).await;
    while fx.events.try_recv().is_ok() {}

    fx.sm.handle_command(
        DeviceId::new(PEER_A),
        Command::StopResult {
            result: true,
            session_id: 1,
        },
    );
    sleep(Duration::from_millis(50)).await;

    assert_eq!(fx.sm.current_state(), CoordinationState::Out);
    assert!(fx.events.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Come-back and relay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn come_back_toward_origin_stops_remote_input() {
    let mut fx = fixture();
    let peer = DeviceId::new(PEER_A);
    drive_to_in(&mut fx, PEER_A).await;

    fx.sm.activate_coordination(&peer, MOUSE).await.unwrap();
    wait_for_state(&fx.sm, CoordinationState::Free).await;

    let calls = fx.provider.calls();
    let stop = calls
        .iter()
        .find(|c| c.kind == OperationKind::Stop)
        .expect("no stop issued");
    assert_eq!(stop.remote, peer);
    assert_eq!(stop.origin, DeviceId::new(LOCAL));
    assert_eq!(stop.dhids, vec![DeviceHandleId::new("remote-mouse")]);

    assert!(fx
        .session
        .commands_to(&peer)
        .iter()
        .any(|c| matches!(c, Command::StartResult { result: true, .. })));
    assert!(fx.sm.remote_device().is_none());
    assert!(!fx.sm.is_starting());
}

#[tokio::test]
async fn relay_hands_flow_to_third_device() {
    let mut fx = fixture();
    let old_source = DeviceId::new(PEER_A);
    let third = DeviceId::new(PEER_B);
    drive_to_in(&mut fx, PEER_A).await;

    fx.sm.activate_coordination(&third, MOUSE).await.unwrap();
    wait_for_state(&fx.sm, CoordinationState::Free).await;

    let kinds = provider_kinds(&fx.provider);
    assert_eq!(
        kinds,
        vec![
            OperationKind::Prepare,
            OperationKind::Start,
            OperationKind::Stop
        ]
    );
    let calls = fx.provider.calls();
    assert_eq!(calls[0].remote, third);
    assert_eq!(calls[2].remote, old_source);

    assert!(fx
        .session
        .commands_to(&third)
        .iter()
        .any(|c| matches!(c, Command::StartResult { result: true, .. })));
    let to_old: Vec<Command> = fx.session.commands_to(&old_source);
    let other = to_old.iter().find_map(|c| match c {
        Command::StopOtherResult {
            other_device_id, ..
        } => Some(other_device_id.clone()),
        _ => None,
    });
    assert_eq!(other, Some(third));
}

// ---------------------------------------------------------------------------
// Reset and hot-plug
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_is_idempotent() {
    let mut fx = fixture();
    let peer = DeviceId::new(PEER_A);
    drive_to_out(&mut fx, PEER_A).await;
    while fx.events.try_recv().is_ok() {}

    fx.sm.reset(peer.clone());
    wait_for_state(&fx.sm, CoordinationState::Free).await;
    assert!(fx.sm.prepared_pair().is_none());
    assert!(fx.pointer.is_visible());

    let mut saw_session_lost = false;
    while let Ok(event) = fx.events.try_recv() {
        if matches!(event, CoordinationEvent::SessionLost { .. }) {
            saw_session_lost = true;
        }
    }
    assert!(saw_session_lost);

    fx.sm.reset(peer);
    sleep(Duration::from_millis(50)).await;
    assert!(fx.events.try_recv().is_err());
}

#[tokio::test]
async fn reset_for_unrelated_device_is_ignored() {
    let mut fx = fixture();
    drive_to_out(&mut fx, PEER_A).await;

    fx.sm.reset(DeviceId::new(PEER_B));
    sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.sm.current_state(), CoordinationState::Out);
}

#[tokio::test]
async fn keyboard_online_joins_live_outbound_flow() {
    let mut fx = fixture();
    drive_to_out(&mut fx, PEER_A).await;
    let before = fx.provider.calls().len();

    fx.sm.on_keyboard_online(DeviceHandleId::new("late-kb"));
    let provider = fx.provider.clone();
    wait_until(move || provider.calls().len() > before).await;

    let calls = fx.provider.calls();
    let last = calls.last().unwrap();
    assert_eq!(last.kind, OperationKind::Start);
    assert_eq!(last.dhids, vec![DeviceHandleId::new("late-kb")]);
}

#[tokio::test]
async fn keyboard_online_while_free_is_ignored() {
    let fx = fixture();
    fx.sm.on_keyboard_online(DeviceHandleId::new("late-kb"));
    sleep(Duration::from_millis(50)).await;
    assert!(fx.provider.calls().is_empty());
}

#[tokio::test]
async fn start_pointer_offline_resets_outbound_flow() {
    let mut fx = fixture();
    drive_to_out(&mut fx, PEER_A).await;

    fx.sm.on_pointer_offline(DeviceHandleId::new("local-mouse"));
    wait_for_state(&fx.sm, CoordinationState::Free).await;
    assert!(fx.sm.prepared_pair().is_none());
    assert!(fx.pointer.is_visible());
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn crossing_switch_query_answers_on_query_channel() {
    let fx = fixture();
    let mut queries = fx.sm.subscribe_queries();
    fx.inventory.set_crossing_switch(PEER_A, false);

    fx.sm
        .get_coordination_state(&DeviceId::new(PEER_A))
        .unwrap();
    let answer = queries.try_recv().unwrap();
    assert_eq!(answer.device, DeviceId::new(PEER_A));
    assert!(!answer.enabled);

    let err = fx
        .sm
        .get_coordination_state(&DeviceId::new(""))
        .unwrap_err();
    assert!(matches!(err, CoordinationError::ParameterError));
}
