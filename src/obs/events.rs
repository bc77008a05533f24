//! Typed view of the OBS input events the router consumes

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::inputs::MonitorType;

/// Event types the application subscribes to
pub const SUBSCRIBED_EVENTS: [&str; 9] = [
    "InputVolumeMeters",
    "InputAudioBalanceChanged",
    "InputAudioTracksChanged",
    "InputAudioMonitorTypeChanged",
    "InputMuteStateChanged",
    "InputVolumeChanged",
    "InputNameChanged",
    "InputRemoved",
    "InputCreated",
];

/// Meter levels of one input, one `[magnitude, peak, input_peak]` triple per channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    #[serde(rename = "inputUuid")]
    pub uuid: String,
    #[serde(rename = "inputLevelsMul", default)]
    pub levels: Vec<Vec<f64>>,
}

/// Remote-origin change notification
#[derive(Debug, Clone, PartialEq)]
pub enum MixerEvent {
    VolumeMeters(Vec<MeterReading>),
    BalanceChanged { uuid: String, balance: f64 },
    TracksChanged { uuid: String, tracks: HashMap<String, bool> },
    MonitorTypeChanged { uuid: String, monitor_type: MonitorType },
    MuteChanged { uuid: String, muted: bool },
    VolumeChanged { uuid: String, volume_db: f64 },
    NameChanged { uuid: String, name: String },
    Removed { uuid: String },
    Created { uuid: String, name: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meters {
    inputs: Vec<MeterReading>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Balance {
    input_uuid: String,
    input_audio_balance: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tracks {
    input_uuid: String,
    input_audio_tracks: HashMap<String, bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Monitor {
    input_uuid: String,
    monitor_type: MonitorType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Mute {
    input_uuid: String,
    input_muted: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    input_uuid: String,
    input_volume_db: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Named {
    input_uuid: String,
    #[serde(default)]
    input_name: String,
}

impl MixerEvent {
    /// Decode the `eventData` of an event
    ///
    /// Returns `Ok(None)` for event types the router does not use.
    pub fn decode(event_type: &str, data: Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match event_type {
            "InputVolumeMeters" => {
                let m: Meters = serde_json::from_value(data)?;
                MixerEvent::VolumeMeters(m.inputs)
            }
            "InputAudioBalanceChanged" => {
                let b: Balance = serde_json::from_value(data)?;
                MixerEvent::BalanceChanged {
                    uuid: b.input_uuid,
                    balance: b.input_audio_balance,
                }
            }
            "InputAudioTracksChanged" => {
                let t: Tracks = serde_json::from_value(data)?;
                MixerEvent::TracksChanged {
                    uuid: t.input_uuid,
                    tracks: t.input_audio_tracks,
                }
            }
            "InputAudioMonitorTypeChanged" => {
                let m: Monitor = serde_json::from_value(data)?;
                MixerEvent::MonitorTypeChanged {
                    uuid: m.input_uuid,
                    monitor_type: m.monitor_type,
                }
            }
            "InputMuteStateChanged" => {
                let m: Mute = serde_json::from_value(data)?;
                MixerEvent::MuteChanged {
                    uuid: m.input_uuid,
                    muted: m.input_muted,
                }
            }
            "InputVolumeChanged" => {
                let v: Volume = serde_json::from_value(data)?;
                MixerEvent::VolumeChanged {
                    uuid: v.input_uuid,
                    volume_db: v.input_volume_db,
                }
            }
            "InputNameChanged" => {
                let n: Named = serde_json::from_value(data)?;
                MixerEvent::NameChanged {
                    uuid: n.input_uuid,
                    name: n.input_name,
                }
            }
            "InputRemoved" => {
                let n: Named = serde_json::from_value(data)?;
                MixerEvent::Removed { uuid: n.input_uuid }
            }
            "InputCreated" => {
                let n: Named = serde_json::from_value(data)?;
                MixerEvent::Created {
                    uuid: n.input_uuid,
                    name: n.input_name,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Input the event is about (meters carry several)
    pub fn uuid(&self) -> Option<&str> {
        match self {
            MixerEvent::VolumeMeters(_) => None,
            MixerEvent::BalanceChanged { uuid, .. }
            | MixerEvent::TracksChanged { uuid, .. }
            | MixerEvent::MonitorTypeChanged { uuid, .. }
            | MixerEvent::MuteChanged { uuid, .. }
            | MixerEvent::VolumeChanged { uuid, .. }
            | MixerEvent::NameChanged { uuid, .. }
            | MixerEvent::Removed { uuid }
            | MixerEvent::Created { uuid, .. } => Some(uuid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_volume_changed() {
        let event = MixerEvent::decode(
            "InputVolumeChanged",
            json!({"inputName": "Mic", "inputUuid": "u1", "inputVolumeMul": 0.5, "inputVolumeDb": -6.02}),
        )
        .unwrap();
        assert_eq!(
            event,
            Some(MixerEvent::VolumeChanged {
                uuid: "u1".into(),
                volume_db: -6.02
            })
        );
    }

    #[test]
    fn test_decode_meters() {
        let event = MixerEvent::decode(
            "InputVolumeMeters",
            json!({"inputs": [
                {"inputName": "Mic", "inputUuid": "u1", "inputLevelsMul": [[0.1, 0.5, 0.5], [0.1, 0.25, 0.25]]},
                {"inputName": "Idle", "inputUuid": "u2", "inputLevelsMul": []}
            ]}),
        )
        .unwrap()
        .unwrap();

        let MixerEvent::VolumeMeters(inputs) = event else {
            panic!("expected meters");
        };
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].levels[1][1], 0.25);
        assert!(inputs[1].levels.is_empty());
    }

    #[test]
    fn test_decode_monitor_type() {
        let event = MixerEvent::decode(
            "InputAudioMonitorTypeChanged",
            json!({"inputUuid": "u1", "monitorType": "OBS_MONITORING_TYPE_MONITOR_AND_OUTPUT"}),
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            event,
            MixerEvent::MonitorTypeChanged {
                uuid: "u1".into(),
                monitor_type: MonitorType::MonitorAndOutput
            }
        );
        assert_eq!(event.uuid(), Some("u1"));
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        assert_eq!(MixerEvent::decode("SceneCreated", json!({})).unwrap(), None);
    }

    #[test]
    fn test_malformed_event_is_an_error() {
        assert!(MixerEvent::decode("InputMuteStateChanged", json!({"inputUuid": "u1"})).is_err());
    }
}
