//! Read replica of the OBS inputs
//!
//! The router owns one [`InputCatalog`] and mutates it only inside its
//! processing loop. Strips never own inputs, they reference them by uuid.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{MixerEvent, RemoteMixer, RemoteResult, Request};
use crate::xtouch::fader_curve::SILENCE_DB;

/// Audio monitoring mode of an input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorType {
    #[default]
    #[serde(rename = "OBS_MONITORING_TYPE_NONE")]
    None,
    #[serde(rename = "OBS_MONITORING_TYPE_MONITOR_ONLY")]
    MonitorOnly,
    #[serde(rename = "OBS_MONITORING_TYPE_MONITOR_AND_OUTPUT")]
    MonitorAndOutput,
}

/// Cached state of one OBS input
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteInput {
    pub uuid: String,
    pub name: String,
    pub supports_audio: bool,
    pub volume_db: f64,
    pub muted: bool,
    /// Stereo balance, 0.0 (left) to 1.0 (right)
    pub balance: f64,
    pub monitor_type: MonitorType,
    /// Track routing, keyed "1".."6"
    pub tracks: HashMap<String, bool>,
}

impl RemoteInput {
    /// Input with neutral audio state
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            supports_audio: true,
            volume_db: SILENCE_DB,
            muted: false,
            balance: 0.5,
            monitor_type: MonitorType::None,
            tracks: HashMap::new(),
        }
    }

    pub fn track(&self, track: &str) -> bool {
        self.tracks.get(track).copied().unwrap_or(false)
    }
}

/// All known inputs, keyed by uuid
#[derive(Debug, Clone, Default)]
pub struct InputCatalog {
    inputs: HashMap<String, RemoteInput>,
}

impl InputCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn get(&self, uuid: &str) -> Option<&RemoteInput> {
        self.inputs.get(uuid)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.inputs.contains_key(uuid)
    }

    pub fn insert(&mut self, input: RemoteInput) {
        self.inputs.insert(input.uuid.clone(), input);
    }

    pub fn remove(&mut self, uuid: &str) -> Option<RemoteInput> {
        self.inputs.remove(uuid)
    }

    /// Audio-capable inputs sorted by display name
    pub fn audio_inputs(&self) -> Vec<&RemoteInput> {
        let mut inputs: Vec<&RemoteInput> =
            self.inputs.values().filter(|i| i.supports_audio).collect();
        inputs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uuid.cmp(&b.uuid)));
        inputs
    }

    /// Fold a remote event into the replica
    ///
    /// `Created` is not handled here: the new input is hydrated first and
    /// inserted with [`insert`](Self::insert).
    pub fn apply(&mut self, event: &MixerEvent) {
        match event {
            MixerEvent::BalanceChanged { uuid, balance } => {
                if let Some(input) = self.inputs.get_mut(uuid) {
                    input.balance = *balance;
                }
            }
            MixerEvent::TracksChanged { uuid, tracks } => {
                if let Some(input) = self.inputs.get_mut(uuid) {
                    input.tracks.extend(tracks.iter().map(|(k, v)| (k.clone(), *v)));
                }
            }
            MixerEvent::MonitorTypeChanged { uuid, monitor_type } => {
                if let Some(input) = self.inputs.get_mut(uuid) {
                    input.monitor_type = *monitor_type;
                }
            }
            MixerEvent::MuteChanged { uuid, muted } => {
                if let Some(input) = self.inputs.get_mut(uuid) {
                    input.muted = *muted;
                }
            }
            MixerEvent::VolumeChanged { uuid, volume_db } => {
                if let Some(input) = self.inputs.get_mut(uuid) {
                    input.volume_db = *volume_db;
                }
            }
            MixerEvent::NameChanged { uuid, name } => {
                if let Some(input) = self.inputs.get_mut(uuid) {
                    input.name = name.clone();
                }
            }
            MixerEvent::Removed { uuid } => {
                self.inputs.remove(uuid);
            }
            MixerEvent::VolumeMeters(_) | MixerEvent::Created { .. } => {}
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedInput {
    input_name: String,
    input_uuid: String,
}

#[derive(Deserialize)]
struct InputList {
    inputs: Vec<ListedInput>,
}

fn field<T: serde::de::DeserializeOwned>(result: &RemoteResult<Value>, key: &str) -> Option<T> {
    let value = result.as_ref().ok()?.get(key)?;
    serde_json::from_value(value.clone()).ok()
}

/// Fetch the full audio state of one input in a single batch
pub async fn hydrate_input(
    mixer: &dyn RemoteMixer,
    uuid: &str,
    name: &str,
) -> RemoteResult<RemoteInput> {
    let requests = [
        "GetInputVolume",
        "GetInputMute",
        "GetInputAudioBalance",
        "GetInputAudioMonitorType",
        "GetInputAudioTracks",
    ]
    .iter()
    .map(|request_type| Request::get_for_input(request_type, uuid))
    .collect();

    let results = mixer.call_batch(requests).await?;
    let mut input = RemoteInput::new(uuid, name);

    let Some(volume) = results.first() else {
        input.supports_audio = false;
        return Ok(input);
    };
    if let Err(e) = volume {
        debug!("Input '{}' has no audio ({})", name, e);
        input.supports_audio = false;
        return Ok(input);
    }

    let empty = Ok(Value::Null);
    let result = |i: usize| results.get(i).unwrap_or(&empty);

    if let Some(db) = field(result(0), "inputVolumeDb") {
        input.volume_db = db;
    }
    if let Some(muted) = field(result(1), "inputMuted") {
        input.muted = muted;
    }
    if let Some(balance) = field(result(2), "inputAudioBalance") {
        input.balance = balance;
    }
    if let Some(monitor_type) = field(result(3), "monitorType") {
        input.monitor_type = monitor_type;
    }
    if let Some(tracks) = field(result(4), "inputAudioTracks") {
        input.tracks = tracks;
    }

    Ok(input)
}

/// Build a fresh catalog from `GetInputList` plus one batch per input
pub async fn hydrate_catalog(mixer: &dyn RemoteMixer) -> RemoteResult<InputCatalog> {
    let data = mixer.call("GetInputList", Value::Object(Default::default())).await?;
    let list: InputList = serde_json::from_value(data)?;

    let mut catalog = InputCatalog::new();
    for listed in list.inputs {
        let input = hydrate_input(mixer, &listed.input_uuid, &listed.input_name).await?;
        catalog.insert(input);
    }

    info!(
        "Hydrated {} OBS inputs ({} with audio)",
        catalog.len(),
        catalog.audio_inputs().len()
    );
    Ok(catalog)
}
