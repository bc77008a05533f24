//! Remote mixer facade (OBS Studio via obs-websocket v5)
//!
//! Everything the router knows about the remote side goes through the
//! [`RemoteMixer`] trait: single calls, batched calls and event
//! subscriptions. [`ObsClient`] is the production implementation, built on
//! obws; tests script their own.

mod bridge;
mod client;
pub mod events;
pub mod inputs;

pub use client::ObsClient;
pub use events::{MeterReading, MixerEvent, SUBSCRIBED_EVENTS};
pub use inputs::{hydrate_catalog, hydrate_input, InputCatalog, MonitorType, RemoteInput};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Errors surfaced by the remote facade
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The remote answered with a non-ok request status
    #[error("{request_type} failed with status {status}: {comment}")]
    CallFailed {
        request_type: String,
        status: u16,
        comment: String,
    },

    #[error("not connected to OBS")]
    NotConnected,

    #[error("cannot connect to OBS: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid request parameters: {0}")]
    InvalidParams(String),

    #[error("unsupported request {0}")]
    Unsupported(String),

    #[error("OBS client error: {0}")]
    Obws(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Callback invoked with the `eventData` of a subscribed event
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Callback invoked on every connection state change
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Connection status reported by the facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: usize },
}

/// One request of a call or batch
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_type: String,
    pub params: Value,
}

impl Request {
    pub fn new(request_type: impl Into<String>, params: Value) -> Self {
        Self {
            request_type: request_type.into(),
            params,
        }
    }

    pub fn set_input_volume(uuid: &str, volume_db: f64) -> Self {
        Self::new(
            "SetInputVolume",
            json!({ "inputUuid": uuid, "inputVolumeDb": volume_db }),
        )
    }

    pub fn set_input_mute(uuid: &str, muted: bool) -> Self {
        Self::new(
            "SetInputMute",
            json!({ "inputUuid": uuid, "inputMuted": muted }),
        )
    }

    pub fn set_input_audio_balance(uuid: &str, balance: f64) -> Self {
        Self::new(
            "SetInputAudioBalance",
            json!({ "inputUuid": uuid, "inputAudioBalance": balance }),
        )
    }

    pub fn set_input_audio_monitor_type(uuid: &str, monitor_type: MonitorType) -> Self {
        Self::new(
            "SetInputAudioMonitorType",
            json!({ "inputUuid": uuid, "monitorType": monitor_type }),
        )
    }

    pub fn set_input_audio_tracks(uuid: &str, tracks: HashMap<String, bool>) -> Self {
        Self::new(
            "SetInputAudioTracks",
            json!({ "inputUuid": uuid, "inputAudioTracks": tracks }),
        )
    }

    /// Read request addressed to a single input
    pub fn get_for_input(request_type: &str, uuid: &str) -> Self {
        Self::new(request_type, json!({ "inputUuid": uuid }))
    }
}

/// Contract of the remote mixing application
#[async_trait]
pub trait RemoteMixer: Send + Sync {
    /// Send one request and wait for its response data
    async fn call(&self, request_type: &str, params: Value) -> RemoteResult<Value>;

    /// Send several requests at once; one result per request, in order
    async fn call_batch(&self, requests: Vec<Request>) -> RemoteResult<Vec<RemoteResult<Value>>>;

    /// Register a handler for one event type
    fn subscribe(&self, event_type: &str, handler: EventHandler);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Scripted mixer: records calls, answers from a response table
    #[derive(Default)]
    pub struct FakeMixer {
        pub calls: Mutex<Vec<Request>>,
        pub responses: Mutex<HashMap<(String, String), RemoteResult<Value>>>,
        pub handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
    }

    impl FakeMixer {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Script the answer for `request_type` on `uuid` (empty uuid for list calls)
        pub fn respond(&self, request_type: &str, uuid: &str, result: RemoteResult<Value>) {
            self.responses
                .lock()
                .insert((request_type.to_string(), uuid.to_string()), result);
        }

        pub fn take_calls(&self) -> Vec<Request> {
            std::mem::take(&mut *self.calls.lock())
        }

        /// Deliver an event to the registered handlers
        pub fn emit(&self, event_type: &str, data: Value) {
            let handlers = self
                .handlers
                .lock()
                .get(event_type)
                .cloned()
                .unwrap_or_default();
            for handler in handlers {
                handler(data.clone());
            }
        }

        fn answer(&self, request: &Request) -> RemoteResult<Value> {
            let uuid = request
                .params
                .get("inputUuid")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let key = (request.request_type.clone(), uuid);
            match self.responses.lock().get(&key) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(e)) => Err(RemoteError::CallFailed {
                    request_type: request.request_type.clone(),
                    status: 600,
                    comment: e.to_string(),
                }),
                None => Ok(Value::Null),
            }
        }
    }

    #[async_trait]
    impl RemoteMixer for FakeMixer {
        async fn call(&self, request_type: &str, params: Value) -> RemoteResult<Value> {
            let request = Request::new(request_type, params);
            let result = self.answer(&request);
            self.calls.lock().push(request);
            result
        }

        async fn call_batch(
            &self,
            requests: Vec<Request>,
        ) -> RemoteResult<Vec<RemoteResult<Value>>> {
            let results = requests.iter().map(|r| self.answer(r)).collect();
            self.calls.lock().extend(requests);
            Ok(results)
        }

        fn subscribe(&self, event_type: &str, handler: EventHandler) {
            self.handlers
                .lock()
                .entry(event_type.to_string())
                .or_default()
                .push(handler);
        }
    }
}
