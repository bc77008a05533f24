//! Tests for Router module

use super::*;
use crate::obs::testing::FakeMixer;
use crate::obs::{MixerEvent, RemoteError, RemoteInput};
use crate::strip::StripState;
use crate::xtouch::surface::testing::{recording_surface, RecordingSink};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SELECT: u8 = 24;
const MUTE: u8 = 16;

fn make_test_catalog() -> InputCatalog {
    let mut catalog = InputCatalog::new();
    for (uuid, name) in [("u-desk", "Desktop"), ("u-mic", "Mic"), ("u-music", "Music")] {
        let mut input = RemoteInput::new(uuid, name);
        input.volume_db = 0.0;
        catalog.insert(input);
    }
    catalog
}

fn make_router(strip_count: u8) -> (Router, Arc<RecordingSink>) {
    let (surface, sink) = recording_surface();
    (Router::new(strip_count, surface, make_test_catalog()), sink)
}

fn press(router: &mut Router, strip: u8, bank_offset: u8) -> Option<crate::obs::Request> {
    router.handle_midi(&[0x90, bank_offset + strip, 127], Instant::now())
}

fn turn(router: &mut Router, strip: u8, clockwise: bool) {
    let raw = if clockwise { 1 } else { 65 };
    router.handle_midi(&[0xB0, 16 + strip, raw], Instant::now());
}

/// Open the menu on `strip` and pick the candidate at `cursor` (0 = CANCEL, 1 = RESET)
fn pick(router: &mut Router, strip: u8, cursor: usize) {
    press(router, strip, SELECT);
    for _ in 0..cursor {
        turn(router, strip, true);
    }
    press(router, strip, SELECT);
}

fn layout_with(bindings: &[Option<&str>]) -> LayoutSnapshot {
    LayoutSnapshot::new(
        bindings
            .iter()
            .map(|uuid| StripConfig {
                input_uuid: uuid.map(str::to_string),
                lcd_color: 2,
            })
            .collect(),
    )
}

#[test]
fn test_new_router_renders_idle_strips() {
    let (router, sink) = make_router(2);

    let frames = sink.take();
    assert!(frames.contains(&vec![0xE0, 0x01, 0x00]));
    assert!(frames.contains(&vec![0xE1, 0x01, 0x00]));
    assert!(frames.contains(&vec![0x90, 1 + SELECT, 0]));
    assert_eq!(router.strip(1).unwrap().state(), &StripState::Idle);
}

#[test]
fn test_select_press_opens_menu() {
    let (mut router, _sink) = make_router(8);

    assert!(router.handle_midi(&[0x90, 24, 127], Instant::now()).is_none());
    assert!(router.strip(0).unwrap().is_config());
}

#[test]
fn test_binding_through_menu() {
    let (mut router, _sink) = make_router(8);

    // CANCEL, RESET, Desktop, Mic, Music
    pick(&mut router, 0, 3);

    assert_eq!(router.strip(0).unwrap().bound_uuid(), Some("u-mic"));
    assert_eq!(router.owner_of("u-mic"), Some(0));
}

#[test]
fn test_binding_is_exclusive() {
    let (mut router, _sink) = make_router(8);

    pick(&mut router, 0, 3);
    pick(&mut router, 1, 3);

    assert_eq!(router.strip(0).unwrap().state(), &StripState::Idle);
    assert_eq!(router.strip(1).unwrap().bound_uuid(), Some("u-mic"));
    assert_eq!(router.owner_of("u-mic"), Some(1));
}

#[test]
fn test_only_one_menu_open() {
    let (mut router, _sink) = make_router(8);
    pick(&mut router, 0, 2);

    press(&mut router, 0, SELECT);
    assert!(router.strip(0).unwrap().is_config());
    // The open menu does not own the input
    assert_eq!(router.owner_of("u-desk"), None);

    press(&mut router, 3, SELECT);
    assert!(!router.strip(0).unwrap().is_config());
    assert_eq!(router.strip(0).unwrap().bound_uuid(), Some("u-desk"));
    assert_eq!(router.owner_of("u-desk"), Some(0));
    assert!(router.strip(3).unwrap().is_config());
}

#[test]
fn test_cancel_restores_binding_and_colour() {
    let (mut router, _sink) = make_router(8);
    router.apply_layout(&layout_with(&[Some("u-music")]));
    let before = router.strip(0).unwrap().state().clone();

    press(&mut router, 0, SELECT);
    // Colour menu, change colour, back to source menu on CANCEL
    press(&mut router, 0, 32);
    turn(&mut router, 0, false);
    press(&mut router, 0, 32);
    press(&mut router, 0, SELECT);

    assert_eq!(router.strip(0).unwrap().state(), &before);
    assert_eq!(router.owner_of("u-music"), Some(0));
}

#[test]
fn test_reset_unbinds_and_zeroes_hardware() {
    let (mut router, sink) = make_router(8);
    router.apply_layout(&layout_with(&[None, Some("u-mic")]));
    sink.take();

    pick(&mut router, 1, 1);

    assert_eq!(router.strip(1).unwrap().state(), &StripState::Idle);
    assert_eq!(router.owner_of("u-mic"), None);

    let frames = sink.take();
    assert_eq!(frames.last(), Some(&vec![0xE1, 0x01, 0x00]));
    assert!(frames.contains(&vec![0x90, 1 + MUTE, 0]));
    assert!(frames.contains(&vec![0xB0, 49, 0]));
}

#[test]
fn test_out_of_range_strip_is_discarded() {
    let (mut router, sink) = make_router(4);
    sink.take();

    assert!(router.handle_midi(&[0xE5, 1, 100], Instant::now()).is_none());
    assert!(router.handle_midi(&[0x90, 6 + SELECT, 127], Instant::now()).is_none());
    assert!(router.handle_midi(&[0xA0, 1, 1], Instant::now()).is_none());
    assert!(router.handle_midi(&[0xB0, 16, 50], Instant::now()).is_none());
    assert!(sink.take().is_empty());
}

#[test]
fn test_active_actions_produce_requests() {
    let (mut router, _sink) = make_router(8);
    router.apply_layout(&layout_with(&[Some("u-mic")]));

    let mute = press(&mut router, 0, MUTE).unwrap();
    assert_eq!(mute.request_type, "SetInputMute");
    assert_eq!(mute.params, json!({"inputUuid": "u-mic", "inputMuted": true}));

    let volume = router.handle_midi(&[0xE0, 1, 0], Instant::now()).unwrap();
    assert_eq!(volume.params["inputVolumeDb"], -100.0);

    // Clockwise is raw < 50
    let balance = router.handle_midi(&[0xB0, 16, 3], Instant::now()).unwrap();
    assert_eq!(balance.params["inputAudioBalance"], 0.6);
}

#[test]
fn test_fader_debounce_defers_remote_volume() {
    let (mut router, sink) = make_router(8);
    router.apply_layout(&layout_with(&[Some("u-mic")]));
    sink.take();

    let t0 = Instant::now();
    router.handle_midi(&[0xE0, 1, 64], t0);

    // Remote echo inside the window: no motor movement
    router.handle_remote(
        &MixerEvent::VolumeChanged { uuid: "u-mic".into(), volume_db: -20.0 },
        t0 + Duration::from_millis(100),
    );
    router.reconcile(t0 + Duration::from_millis(500));
    router.handle_remote(
        &MixerEvent::VolumeChanged { uuid: "u-mic".into(), volume_db: 0.0 },
        t0 + Duration::from_millis(700),
    );
    router.reconcile(t0 + Duration::from_millis(799));
    assert!(sink.fader_frames().is_empty());

    // Window closes: exactly one render with the latest volume
    router.reconcile(t0 + Duration::from_millis(800));
    router.reconcile(t0 + Duration::from_millis(850));
    router.reconcile(t0 + Duration::from_millis(2000));
    assert_eq!(sink.fader_frames(), vec![vec![0xE0, 0x01, 98]]);
}

#[test]
fn test_remote_volume_moves_untouched_fader() {
    let (mut router, sink) = make_router(8);
    router.apply_layout(&layout_with(&[Some("u-mic")]));
    sink.take();

    router.handle_remote(
        &MixerEvent::VolumeChanged { uuid: "u-mic".into(), volume_db: 10.0 },
        Instant::now(),
    );
    assert_eq!(sink.fader_frames(), vec![vec![0xE0, 0x01, 127]]);
}

#[test]
fn test_events_for_unbound_inputs_only_update_replica() {
    let (mut router, sink) = make_router(8);
    sink.take();

    router.handle_remote(
        &MixerEvent::MuteChanged { uuid: "u-music".into(), muted: true },
        Instant::now(),
    );

    assert!(sink.take().is_empty());
    assert!(router.catalog().get("u-music").unwrap().muted);
}

#[test]
fn test_removed_input_releases_strip() {
    let (mut router, _sink) = make_router(8);
    router.apply_layout(&layout_with(&[None, None, Some("u-desk")]));

    router.handle_remote(&MixerEvent::Removed { uuid: "u-desk".into() }, Instant::now());

    assert_eq!(router.strip(2).unwrap().state(), &StripState::Idle);
    assert_eq!(router.owner_of("u-desk"), None);
    assert!(!router.catalog().contains("u-desk"));
    assert_eq!(router.layout().strips[2].input_uuid, None);
}

#[test]
fn test_meters_only_for_bound_inputs() {
    let (mut router, sink) = make_router(8);
    router.apply_layout(&layout_with(&[None, Some("u-mic")]));
    sink.take();

    router.handle_remote(
        &MixerEvent::VolumeMeters(vec![
            crate::obs::MeterReading { uuid: "u-mic".into(), levels: vec![vec![0.5, 1.0, 1.0]] },
            crate::obs::MeterReading { uuid: "u-music".into(), levels: vec![vec![0.5, 1.0, 1.0]] },
            crate::obs::MeterReading { uuid: "u-mic".into(), levels: vec![vec![0.0, 0.0, 0.0]] },
        ]),
        Instant::now(),
    );

    // 0 dB on strip 1 is level 14; silence sends nothing
    assert_eq!(sink.take(), vec![vec![0xD0, 16 + 14, 0]]);
}

#[test]
fn test_apply_layout_skips_unknown_inputs() {
    let (mut router, _sink) = make_router(4);
    router.apply_layout(&layout_with(&[
        Some("u-mic"),
        Some("u-gone"),
        None,
        Some("u-music"),
        Some("u-desk"),
    ]));

    assert_eq!(router.owner_of("u-mic"), Some(0));
    assert_eq!(router.strip(1).unwrap().state(), &StripState::Idle);
    assert_eq!(router.owner_of("u-music"), Some(3));
    assert_eq!(router.owner_of("u-desk"), None);
}

#[test]
fn test_apply_layout_out_of_range_colour_falls_back() {
    let (mut router, _sink) = make_router(8);
    let mut layout = layout_with(&[Some("u-mic"), Some("u-music")]);
    layout.strips[0].lcd_color = 0;
    layout.strips[1].lcd_color = 42;

    router.apply_layout(&layout);

    let layout = router.layout();
    assert_eq!(layout.strips[0].input_uuid.as_deref(), Some("u-mic"));
    assert_eq!(layout.strips[0].lcd_color, IDLE_LCD_COLOR);
    assert_eq!(layout.strips[1].lcd_color, IDLE_LCD_COLOR);
}

#[test]
fn test_apply_layout_duplicate_binding_keeps_last() {
    let (mut router, _sink) = make_router(8);
    router.apply_layout(&layout_with(&[Some("u-mic"), Some("u-mic")]));

    assert_eq!(router.strip(0).unwrap().state(), &StripState::Idle);
    assert_eq!(router.owner_of("u-mic"), Some(1));
}

#[test]
fn test_replace_catalog_releases_vanished_bindings() {
    let (mut router, _sink) = make_router(8);
    router.apply_layout(&layout_with(&[Some("u-mic"), Some("u-music")]));

    let mut catalog = InputCatalog::new();
    catalog.insert(RemoteInput::new("u-music", "Music"));
    router.replace_catalog(catalog);

    assert_eq!(router.owner_of("u-mic"), None);
    assert_eq!(router.strip(0).unwrap().state(), &StripState::Idle);
    assert_eq!(router.owner_of("u-music"), Some(1));
}

#[test]
fn test_input_removed_while_hydrating_is_not_added() {
    let (mut router, _sink) = make_router(8);
    let now = Instant::now();

    router.handle_remote(&MixerEvent::Created { uuid: "u-new".into(), name: "Guest".into() }, now);
    router.handle_remote(&MixerEvent::Removed { uuid: "u-new".into() }, now);
    router.input_hydrated(RemoteInput::new("u-new", "Guest"));

    assert!(!router.catalog().contains("u-new"));
    router.apply_layout(&layout_with(&[Some("u-new")]));
    assert_eq!(router.strip(0).unwrap().bound_uuid(), None);
}

#[test]
fn test_rename_while_hydrating_keeps_new_name() {
    let (mut router, _sink) = make_router(8);
    let now = Instant::now();

    router.handle_remote(&MixerEvent::Created { uuid: "u-new".into(), name: "Guest".into() }, now);
    router.handle_remote(&MixerEvent::NameChanged { uuid: "u-new".into(), name: "Host".into() }, now);
    router.input_hydrated(RemoteInput::new("u-new", "Guest"));

    assert_eq!(router.catalog().get("u-new").unwrap().name, "Host");
}

#[test]
fn test_layout_reports_menu_origin() {
    let (mut router, _sink) = make_router(8);
    router.apply_layout(&layout_with(&[Some("u-mic")]));

    press(&mut router, 0, SELECT);
    let layout = router.layout();
    assert_eq!(layout.strips[0].input_uuid.as_deref(), Some("u-mic"));
    assert_eq!(layout.strips.len(), 8);
}

#[tokio::test]
async fn test_actor_sends_calls_and_tears_down() {
    let (surface, sink) = recording_surface();
    let router = Router::new(8, surface, make_test_catalog());
    let mixer = FakeMixer::new();
    let handle = RouterActor::spawn(router, mixer.clone());

    handle.apply_layout(layout_with(&[Some("u-mic")]));
    handle.midi_in(vec![0x90, MUTE, 127], Instant::now());

    let layout = handle.shutdown().await.unwrap();
    assert_eq!(layout.strips[0].input_uuid.as_deref(), Some("u-mic"));

    let calls = mixer.take_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request_type, "SetInputMute");

    // Neutral surface at the end
    let frames = sink.take();
    assert_eq!(frames.last(), Some(&vec![0xE7, 0x01, 0x00]));

    // Stopped actor
    assert!(handle.snapshot().await.is_none());
}

#[tokio::test]
async fn test_subscribed_events_reach_router() {
    let (surface, sink) = recording_surface();
    let router = Router::new(8, surface, make_test_catalog());
    let mixer = FakeMixer::new();
    let handle = RouterActor::spawn(router, mixer.clone());
    subscribe_events(mixer.as_ref(), &handle);

    handle.apply_layout(layout_with(&[Some("u-mic")]));
    handle.snapshot().await.unwrap();
    sink.take();

    mixer.emit("InputMuteStateChanged", json!({"inputUuid": "u-mic", "inputMuted": true}));
    handle.snapshot().await.unwrap();

    assert!(sink.take().contains(&vec![0x90, MUTE, 127]));
    handle.shutdown().await;
}

#[tokio::test]
async fn test_created_input_is_hydrated() {
    let (surface, _sink) = recording_surface();
    let router = Router::new(8, surface, InputCatalog::new());
    let mixer = FakeMixer::new();
    mixer.respond("GetInputVolume", "u-new", Ok(json!({"inputVolumeDb": -3.0})));
    let handle = RouterActor::spawn(router, mixer.clone());
    subscribe_events(mixer.as_ref(), &handle);

    mixer.emit("InputCreated", json!({"inputName": "Guest", "inputUuid": "u-new"}));
    handle.snapshot().await.unwrap();
    // Let the hydration task complete and be folded in
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.apply_layout(layout_with(&[Some("u-new")]));
    let layout = handle.snapshot().await.unwrap();
    assert_eq!(layout.strips[0].input_uuid.as_deref(), Some("u-new"));
    assert_eq!(layout.strips[0].lcd_color, 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_created_then_removed_input_stays_unknown() {
    let (surface, _sink) = recording_surface();
    let router = Router::new(8, surface, InputCatalog::new());
    let mixer = FakeMixer::new();
    mixer.respond("GetInputVolume", "u-new", Ok(json!({"inputVolumeDb": -3.0})));
    let handle = RouterActor::spawn(router, mixer.clone());
    subscribe_events(mixer.as_ref(), &handle);

    mixer.emit("InputCreated", json!({"inputName": "Guest", "inputUuid": "u-new"}));
    mixer.emit("InputRemoved", json!({"inputName": "Guest", "inputUuid": "u-new"}));
    handle.snapshot().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.apply_layout(layout_with(&[Some("u-new")]));
    let layout = handle.snapshot().await.unwrap();
    assert_eq!(layout.strips[0].input_uuid, None);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_failed_call_leaves_strip_untouched() {
    let (surface, sink) = recording_surface();
    let router = Router::new(8, surface, make_test_catalog());
    let mixer = FakeMixer::new();
    mixer.respond("SetInputMute", "u-mic", Err(RemoteError::NotConnected));
    let handle = RouterActor::spawn(router, mixer.clone());

    handle.apply_layout(layout_with(&[Some("u-mic")]));
    handle.snapshot().await.unwrap();
    sink.take();

    handle.midi_in(vec![0x90, MUTE, 127], Instant::now());
    handle.snapshot().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Actor still answers and the strip keeps its binding
    let layout = handle.snapshot().await.unwrap();
    assert_eq!(layout.strips[0].input_uuid.as_deref(), Some("u-mic"));
    assert_eq!(layout.strips[0].lcd_color, 2);

    let calls = mixer.take_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request_type, "SetInputMute");

    // No MUTE LED: the replica still says unmuted
    assert!(!sink.take().contains(&vec![0x90, MUTE, 127]));

    // A second press asks for the same mute again
    handle.midi_in(vec![0x90, MUTE, 127], Instant::now());
    handle.snapshot().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mixer.take_calls()[0].params["inputMuted"], true);

    handle.shutdown().await;
}
