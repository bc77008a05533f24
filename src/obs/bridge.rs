//! Translation between the JSON shapes of [`RemoteMixer`](super::RemoteMixer)
//! and the typed obws API
//!
//! Requests keep their obs-websocket names and parameters (`inputUuid`,
//! `inputVolumeDb`, ...) and are routed to the matching `client.inputs()`
//! method. Events are turned back into obs-websocket `eventData` objects so
//! that the handlers see the same payloads whatever the transport.

use obws::events::Event;
use obws::requests::inputs::{InputId, Volume};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::{MonitorType, RemoteError, RemoteResult};

/// Run one request against a connected client
pub(super) async fn dispatch(
    client: &obws::Client,
    request_type: &str,
    params: &Value,
) -> RemoteResult<Value> {
    let inputs = client.inputs();
    let failed = |e: obws::Error| call_failed(request_type, e);

    if request_type == "GetInputList" {
        let listed = inputs.list(None).await.map_err(failed)?;
        let listed: Vec<Value> = listed
            .into_iter()
            .map(|input| json!({ "inputName": input.id.name, "inputUuid": input.id.uuid.to_string() }))
            .collect();
        return Ok(json!({ "inputs": listed }));
    }

    let uuid = input_uuid(request_type, params)?;
    match request_type {
        "GetInputVolume" => {
            let volume = inputs.volume(InputId::Uuid(uuid)).await.map_err(failed)?;
            Ok(json!({ "inputVolumeDb": volume.db, "inputVolumeMul": volume.mul }))
        }
        "GetInputMute" => {
            let muted = inputs.muted(InputId::Uuid(uuid)).await.map_err(failed)?;
            Ok(json!({ "inputMuted": muted }))
        }
        "GetInputAudioBalance" => {
            let balance = inputs.audio_balance(InputId::Uuid(uuid)).await.map_err(failed)?;
            Ok(json!({ "inputAudioBalance": balance }))
        }
        "GetInputAudioMonitorType" => {
            let monitor_type = inputs
                .audio_monitor_type(InputId::Uuid(uuid))
                .await
                .map_err(failed)?;
            Ok(json!({ "monitorType": from_obws_monitor_type(monitor_type) }))
        }
        "GetInputAudioTracks" => {
            let tracks = inputs.audio_tracks(InputId::Uuid(uuid)).await.map_err(failed)?;
            Ok(json!({ "inputAudioTracks": tracks_by_number(tracks.iter().copied()) }))
        }
        "SetInputVolume" => {
            let db: f64 = param(request_type, params, "inputVolumeDb")?;
            inputs
                .set_volume(InputId::Uuid(uuid), Volume::Db(db as f32))
                .await
                .map_err(failed)?;
            Ok(Value::Null)
        }
        "SetInputMute" => {
            let muted: bool = param(request_type, params, "inputMuted")?;
            inputs
                .set_muted(InputId::Uuid(uuid), muted)
                .await
                .map_err(failed)?;
            Ok(Value::Null)
        }
        "SetInputAudioBalance" => {
            let balance: f64 = param(request_type, params, "inputAudioBalance")?;
            inputs
                .set_audio_balance(InputId::Uuid(uuid), balance as f32)
                .await
                .map_err(failed)?;
            Ok(Value::Null)
        }
        "SetInputAudioMonitorType" => {
            let monitor_type: MonitorType = param(request_type, params, "monitorType")?;
            inputs
                .set_audio_monitor_type(InputId::Uuid(uuid), to_obws_monitor_type(monitor_type))
                .await
                .map_err(failed)?;
            Ok(Value::Null)
        }
        "SetInputAudioTracks" => {
            let tracks: HashMap<String, bool> = param(request_type, params, "inputAudioTracks")?;
            inputs
                .set_audio_tracks(InputId::Uuid(uuid), tracks_by_position(&tracks))
                .await
                .map_err(failed)?;
            Ok(Value::Null)
        }
        other => Err(RemoteError::Unsupported(other.to_string())),
    }
}

/// Event type and obs-websocket `eventData` of an input event
///
/// Returns `None` for events the application does not consume.
pub(super) fn event_payload(event: Event) -> Option<(&'static str, Value)> {
    let payload = match event {
        Event::InputVolumeMeters { inputs } => {
            let inputs: Vec<Value> = inputs
                .into_iter()
                .map(|meter| {
                    json!({
                        "inputName": meter.id.name,
                        "inputUuid": meter.id.uuid.to_string(),
                        "inputLevelsMul": meter.levels,
                    })
                })
                .collect();
            ("InputVolumeMeters", json!({ "inputs": inputs }))
        }
        Event::InputAudioBalanceChanged { id, audio_balance } => (
            "InputAudioBalanceChanged",
            json!({
                "inputName": id.name,
                "inputUuid": id.uuid.to_string(),
                "inputAudioBalance": audio_balance,
            }),
        ),
        Event::InputAudioTracksChanged { id, tracks: audio_tracks } => (
            "InputAudioTracksChanged",
            json!({
                "inputName": id.name,
                "inputUuid": id.uuid.to_string(),
                "inputAudioTracks": tracks_by_number(audio_tracks.iter().copied()),
            }),
        ),
        Event::InputAudioMonitorTypeChanged { id, monitor_type } => (
            "InputAudioMonitorTypeChanged",
            json!({
                "inputName": id.name,
                "inputUuid": id.uuid.to_string(),
                "monitorType": from_obws_monitor_type(monitor_type),
            }),
        ),
        Event::InputMuteStateChanged { id, muted } => (
            "InputMuteStateChanged",
            json!({
                "inputName": id.name,
                "inputUuid": id.uuid.to_string(),
                "inputMuted": muted,
            }),
        ),
        Event::InputVolumeChanged { id, mul, db } => (
            "InputVolumeChanged",
            json!({
                "inputName": id.name,
                "inputUuid": id.uuid.to_string(),
                "inputVolumeDb": db,
                "inputVolumeMul": mul,
            }),
        ),
        Event::InputNameChanged { uuid, new_name, .. } => (
            "InputNameChanged",
            json!({ "inputName": new_name, "inputUuid": uuid.to_string() }),
        ),
        Event::InputRemoved { id } => (
            "InputRemoved",
            json!({ "inputName": id.name, "inputUuid": id.uuid.to_string() }),
        ),
        Event::InputCreated { id, .. } => (
            "InputCreated",
            json!({ "inputName": id.name, "inputUuid": id.uuid.to_string() }),
        ),
        _ => return None,
    };
    Some(payload)
}

fn call_failed(request_type: &str, error: obws::Error) -> RemoteError {
    match error {
        obws::Error::Api { code, message } => RemoteError::CallFailed {
            request_type: request_type.to_string(),
            status: code as u16,
            comment: message.unwrap_or_default(),
        },
        other => RemoteError::Obws(other.to_string()),
    }
}

fn input_uuid(request_type: &str, params: &Value) -> RemoteResult<Uuid> {
    let raw = params
        .get("inputUuid")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::InvalidParams(format!("{request_type} needs an inputUuid")))?;
    Uuid::parse_str(raw).map_err(|e| {
        RemoteError::InvalidParams(format!("{request_type}: bad inputUuid '{raw}': {e}"))
    })
}

fn param<T: DeserializeOwned>(request_type: &str, params: &Value, key: &str) -> RemoteResult<T> {
    let value = params
        .get(key)
        .cloned()
        .ok_or_else(|| RemoteError::InvalidParams(format!("{request_type} needs {key}")))?;
    serde_json::from_value(value)
        .map_err(|e| RemoteError::InvalidParams(format!("{request_type}: bad {key}: {e}")))
}

/// Positional track flags keyed "1".."6"
fn tracks_by_number(tracks: impl Iterator<Item = bool>) -> Map<String, Value> {
    tracks
        .enumerate()
        .map(|(i, enabled)| ((i + 1).to_string(), Value::Bool(enabled)))
        .collect()
}

/// Tracks keyed "1".."6" as the positional form obws sends; missing keys are left unchanged
fn tracks_by_position(tracks: &HashMap<String, bool>) -> [Option<bool>; 6] {
    let mut positional = [None; 6];
    for (i, slot) in positional.iter_mut().enumerate() {
        *slot = tracks.get(&(i + 1).to_string()).copied();
    }
    positional
}

fn from_obws_monitor_type(monitor_type: obws::common::MonitorType) -> MonitorType {
    match monitor_type {
        obws::common::MonitorType::None => MonitorType::None,
        obws::common::MonitorType::MonitorOnly => MonitorType::MonitorOnly,
        obws::common::MonitorType::MonitorAndOutput => MonitorType::MonitorAndOutput,
    }
}

fn to_obws_monitor_type(monitor_type: MonitorType) -> obws::common::MonitorType {
    match monitor_type {
        MonitorType::None => obws::common::MonitorType::None,
        MonitorType::MonitorOnly => obws::common::MonitorType::MonitorOnly,
        MonitorType::MonitorAndOutput => obws::common::MonitorType::MonitorAndOutput,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::MixerEvent;

    const UUID: &str = "6c3a1f0e-2b4d-4e8a-9f10-1a2b3c4d5e6f";

    fn obws_event(event_type: &str, data: Value) -> Event {
        serde_json::from_value(json!({ "eventType": event_type, "eventData": data })).unwrap()
    }

    #[test]
    fn test_mute_event_keeps_obs_websocket_shape() {
        let event = obws_event(
            "InputMuteStateChanged",
            json!({ "inputName": "Mic", "inputUuid": UUID, "inputMuted": true }),
        );

        let (event_type, data) = event_payload(event).unwrap();
        assert_eq!(event_type, "InputMuteStateChanged");

        let decoded = MixerEvent::decode(event_type, data).unwrap();
        assert_eq!(
            decoded,
            Some(MixerEvent::MuteChanged {
                uuid: UUID.to_string(),
                muted: true
            })
        );
    }

    #[test]
    fn test_rename_event_carries_new_name() {
        let event = obws_event(
            "InputNameChanged",
            json!({ "inputUuid": UUID, "oldInputName": "Mic", "inputName": "Voice" }),
        );

        let (event_type, data) = event_payload(event).unwrap();
        assert_eq!(
            MixerEvent::decode(event_type, data).unwrap(),
            Some(MixerEvent::NameChanged {
                uuid: UUID.to_string(),
                name: "Voice".to_string()
            })
        );
    }

    #[test]
    fn test_unrelated_events_are_dropped() {
        let event = obws_event("CurrentProgramSceneChanged", json!({
            "sceneName": "Main",
            "sceneUuid": UUID,
        }));
        assert!(event_payload(event).is_none());
    }

    #[test]
    fn test_tracks_convert_both_ways() {
        let numbered = tracks_by_number([true, false, true, false, false, false].into_iter());
        assert_eq!(numbered["1"], true);
        assert_eq!(numbered["2"], false);
        assert_eq!(numbered.len(), 6);

        let mut partial = HashMap::new();
        partial.insert("2".to_string(), true);
        assert_eq!(
            tracks_by_position(&partial),
            [None, Some(true), None, None, None, None]
        );
    }

    #[test]
    fn test_requests_need_a_valid_input_uuid() {
        assert!(matches!(
            input_uuid("SetInputMute", &json!({ "inputMuted": true })),
            Err(RemoteError::InvalidParams(_))
        ));
        assert!(matches!(
            input_uuid("SetInputMute", &json!({ "inputUuid": "mic" })),
            Err(RemoteError::InvalidParams(_))
        ));
        assert_eq!(
            input_uuid("SetInputMute", &json!({ "inputUuid": UUID })).unwrap(),
            Uuid::parse_str(UUID).unwrap()
        );
    }

    #[test]
    fn test_params_are_typed() {
        let params = json!({ "inputUuid": UUID, "monitorType": "OBS_MONITORING_TYPE_MONITOR_ONLY" });
        let monitor_type: MonitorType = param("SetInputAudioMonitorType", &params, "monitorType").unwrap();
        assert_eq!(monitor_type, MonitorType::MonitorOnly);

        let missing: RemoteResult<f64> = param("SetInputVolume", &params, "inputVolumeDb");
        assert!(matches!(missing, Err(RemoteError::InvalidParams(_))));
    }
}
