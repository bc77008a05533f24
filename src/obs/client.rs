//! OBS connection on top of obws
//!
//! The obws client lives behind an async `RwLock`; requests hold a read
//! guard, connect and disconnect swap it. One listener task drains the
//! event stream into the subscribed handlers. The stream ending means the
//! connection is gone, which schedules a reconnect with a linear backoff.

use async_trait::async_trait;
use obws::requests::EventSubscription;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::bridge;
use super::{
    ConnectionStatus, EventHandler, RemoteError, RemoteMixer, RemoteResult, Request, StatusCallback,
};
use crate::config::ObsConfig;

/// Upper bound of the reconnect delay
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// obs-websocket client implementing [`RemoteMixer`]
pub struct ObsClient {
    host: String,
    port: u16,
    password: Option<String>,
    request_timeout: Duration,

    client: tokio::sync::RwLock<Option<obws::Client>>,
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
    status_callbacks: RwLock<Vec<StatusCallback>>,
    listener: Mutex<Option<JoinHandle<()>>>,

    reconnect_count: Mutex<usize>,
    shutdown_flag: AtomicBool,
}

impl ObsClient {
    pub fn new(config: &ObsConfig) -> Arc<Self> {
        Arc::new(Self {
            host: config.host.clone(),
            port: config.port,
            password: config.password.clone(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            client: tokio::sync::RwLock::new(None),
            handlers: RwLock::new(HashMap::new()),
            status_callbacks: RwLock::new(Vec::new()),
            listener: Mutex::new(None),
            reconnect_count: Mutex::new(0),
            shutdown_flag: AtomicBool::new(false),
        })
    }

    /// Register a callback for connection status changes
    pub fn on_status(&self, callback: StatusCallback) {
        self.status_callbacks.write().push(callback);
    }

    pub async fn is_connected(&self) -> bool {
        self.client.read().await.is_some()
    }

    fn emit_status(&self, status: ConnectionStatus) {
        let callbacks = self.status_callbacks.read().clone();
        for callback in callbacks {
            callback(status.clone());
        }
    }

    /// Connect, subscribe to input events and start the event listener
    pub async fn connect(self: &Arc<Self>) -> RemoteResult<()> {
        info!("🎬 Connecting to OBS at {}:{}", self.host, self.port);

        let client = obws::Client::connect(self.host.clone(), self.port, self.password.clone())
            .await
            .map_err(|e| RemoteError::Connect(e.to_string()))?;

        // Meters are a high-volume subscription, off by default
        if let Err(e) = client
            .reidentify(EventSubscription::INPUTS | EventSubscription::INPUT_VOLUME_METERS)
            .await
        {
            warn!("OBS refused the input event subscription: {}", e);
        }

        let events = client
            .events()
            .map_err(|e| RemoteError::Connect(e.to_string()))?;

        *self.client.write().await = Some(client);
        *self.reconnect_count.lock() = 0;

        self.spawn_event_listener(events);

        self.emit_status(ConnectionStatus::Connected);
        info!("✅ OBS WebSocket connected");
        Ok(())
    }

    /// Connect, or keep retrying in the background if OBS is not up yet
    pub async fn start(self: &Arc<Self>) {
        if let Err(e) = self.connect().await {
            warn!("⚠️  OBS not reachable at {}:{}: {}", self.host, self.port, e);
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.schedule_reconnect().await;
            });
        }
    }

    /// Close the connection for good; no reconnect is attempted
    pub async fn disconnect(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);

        // Dropping the client closes the socket and ends the event stream
        self.client.write().await.take();

        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            if tokio::time::timeout(Duration::from_secs(1), listener).await.is_err() {
                debug!("OBS event listener did not finish in time");
            }
        }

        self.emit_status(ConnectionStatus::Disconnected);
        info!("OBS connection closed");
    }

    fn spawn_event_listener(
        self: &Arc<Self>,
        events: impl tokio_stream::Stream<Item = obws::events::Event> + Send + 'static,
    ) {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            use tokio_stream::StreamExt;

            tokio::pin!(events);
            while let Some(event) = events.next().await {
                if this.shutdown_flag.load(Ordering::SeqCst) {
                    break;
                }
                if let Some((event_type, data)) = bridge::event_payload(event) {
                    this.dispatch_event(event_type, data);
                }
            }

            this.on_connection_lost().await;
        });

        if let Some(previous) = self.listener.lock().replace(task) {
            previous.abort();
        }
    }

    async fn on_connection_lost(self: Arc<Self>) {
        if self.shutdown_flag.load(Ordering::SeqCst) {
            debug!("OBS event listener shutting down");
            return;
        }

        self.client.write().await.take();
        warn!("🔌 OBS event stream closed, connection lost");
        self.emit_status(ConnectionStatus::Disconnected);

        tokio::spawn(async move {
            self.schedule_reconnect().await;
        });
    }

    /// Retry with a linear backoff until connected or shut down
    async fn schedule_reconnect(self: Arc<Self>) {
        loop {
            if self.shutdown_flag.load(Ordering::SeqCst) {
                return;
            }

            let retry_count = {
                let mut count = self.reconnect_count.lock();
                *count += 1;
                *count
            };

            let delay_ms = std::cmp::min(MAX_RECONNECT_DELAY_MS, 1000 * retry_count as u64);
            debug!("⏳ OBS reconnect #{} in {}ms", retry_count, delay_ms);
            self.emit_status(ConnectionStatus::Reconnecting {
                attempt: retry_count,
            });

            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            if self.shutdown_flag.load(Ordering::SeqCst) {
                return;
            }

            match self.connect().await {
                Ok(()) => {
                    info!("✅ OBS reconnection successful");
                    return;
                }
                Err(e) => debug!("OBS reconnect #{} failed: {}", retry_count, e),
            }
        }
    }

    fn dispatch_event(&self, event_type: &str, data: Value) {
        let handlers = self
            .handlers
            .read()
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            trace!("Unhandled OBS event {}", event_type);
            return;
        }

        for handler in handlers {
            handler(data.clone());
        }
    }

    async fn timed(&self, client: &obws::Client, request: &Request) -> RemoteResult<Value> {
        tokio::time::timeout(
            self.request_timeout,
            bridge::dispatch(client, &request.request_type, &request.params),
        )
        .await
        .unwrap_or(Err(RemoteError::Timeout))
    }
}

#[async_trait]
impl RemoteMixer for ObsClient {
    async fn call(&self, request_type: &str, params: Value) -> RemoteResult<Value> {
        trace!("→ OBS {}", request_type);
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(RemoteError::NotConnected)?;
        self.timed(client, &Request::new(request_type, params)).await
    }

    /// Requests run one after the other on the same connection
    async fn call_batch(&self, requests: Vec<Request>) -> RemoteResult<Vec<RemoteResult<Value>>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        trace!("→ OBS batch of {}", requests.len());
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(RemoteError::NotConnected)?;

        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            results.push(self.timed(client, request).await);
        }
        Ok(results)
    }

    fn subscribe(&self, event_type: &str, handler: EventHandler) {
        self.handlers
            .write()
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}
