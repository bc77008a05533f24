//! Router actor
//!
//! All state-mutating work goes through one task: surface messages, OBS
//! events, replica updates and the reconciliation tick. Remote calls are
//! spawned into a [`JoinSet`] so a slow OBS answer never blocks the next
//! message; the binding they act on is already settled when they start.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use super::Router;
use crate::obs::{
    hydrate_input, InputCatalog, MixerEvent, RemoteInput, RemoteMixer, Request, SUBSCRIBED_EVENTS,
};
use crate::state::LayoutSnapshot;

/// Cadence of the fader reconciliation pass
pub const RECONCILE_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound for in-flight calls to finish during shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands processed by the router actor
#[derive(Debug)]
pub enum RouterCommand {
    /// Raw surface message and when it arrived
    Midi { data: Vec<u8>, at: Instant },
    /// Decoded OBS event
    Remote(MixerEvent),
    /// Replace the replica (after a reconnect)
    ReplaceCatalog(InputCatalog),
    /// Apply a persisted layout
    ApplyLayout(LayoutSnapshot),
    /// Query the current layout
    Snapshot(oneshot::Sender<LayoutSnapshot>),
    /// Drain, capture the final layout, zero the surface and stop
    Shutdown(oneshot::Sender<LayoutSnapshot>),
}

/// Handle for interacting with the router actor
#[derive(Clone)]
pub struct RouterHandle {
    cmd_tx: mpsc::UnboundedSender<RouterCommand>,
}

impl RouterHandle {
    /// Forward a surface message (fire-and-forget)
    pub fn midi_in(&self, data: Vec<u8>, at: Instant) {
        let _ = self.cmd_tx.send(RouterCommand::Midi { data, at });
    }

    /// Forward an OBS event (fire-and-forget)
    pub fn remote_event(&self, event: MixerEvent) {
        let _ = self.cmd_tx.send(RouterCommand::Remote(event));
    }

    pub fn replace_catalog(&self, catalog: InputCatalog) {
        let _ = self.cmd_tx.send(RouterCommand::ReplaceCatalog(catalog));
    }

    pub fn apply_layout(&self, layout: LayoutSnapshot) {
        let _ = self.cmd_tx.send(RouterCommand::ApplyLayout(layout));
    }

    /// Current layout, `None` once the actor has stopped
    pub async fn snapshot(&self) -> Option<LayoutSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(RouterCommand::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    /// Stop the actor and return the final layout
    pub async fn shutdown(&self) -> Option<LayoutSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(RouterCommand::Shutdown(tx)).ok()?;
        rx.await.ok()
    }
}

/// Outcome of a background remote task
enum Finished {
    Call,
    Hydrated(RemoteInput),
    HydrationFailed(String),
}

/// Task owning the [`Router`]
pub struct RouterActor {
    router: Router,
    mixer: Arc<dyn RemoteMixer>,
    command_rx: mpsc::UnboundedReceiver<RouterCommand>,
    in_flight: JoinSet<Finished>,
}

impl RouterActor {
    /// Spawn the actor and return its handle
    pub fn spawn(router: Router, mixer: Arc<dyn RemoteMixer>) -> RouterHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();

        let actor = RouterActor {
            router,
            mixer,
            command_rx,
            in_flight: JoinSet::new(),
        };
        tokio::spawn(actor.run());

        info!("Router actor spawned");
        RouterHandle { cmd_tx }
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(RouterCommand::Shutdown(reply)) => {
                        let layout = self.stop().await;
                        let _ = reply.send(layout);
                        return;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("All router handles dropped");
                        self.stop().await;
                        return;
                    }
                },
                _ = ticker.tick() => {
                    self.router.reconcile(Instant::now());
                }
                Some(done) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.finish(done);
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: RouterCommand) {
        match cmd {
            RouterCommand::Midi { data, at } => {
                if let Some(request) = self.router.handle_midi(&data, at) {
                    self.spawn_call(request);
                }
            }
            RouterCommand::Remote(event) => {
                if let MixerEvent::Created { uuid, name } = &event {
                    self.spawn_hydration(uuid.clone(), name.clone());
                }
                self.router.handle_remote(&event, Instant::now());
            }
            RouterCommand::ReplaceCatalog(catalog) => self.router.replace_catalog(catalog),
            RouterCommand::ApplyLayout(layout) => self.router.apply_layout(&layout),
            RouterCommand::Snapshot(reply) => {
                let _ = reply.send(self.router.layout());
            }
            RouterCommand::Shutdown(_) => {}
        }
    }

    fn spawn_call(&mut self, request: Request) {
        let mixer = Arc::clone(&self.mixer);
        trace!("→ OBS {}", request.request_type);
        self.in_flight.spawn(async move {
            if let Err(e) = mixer.call(&request.request_type, request.params).await {
                warn!("{} failed: {}", request.request_type, e);
            }
            Finished::Call
        });
    }

    fn spawn_hydration(&mut self, uuid: String, name: String) {
        let mixer = Arc::clone(&self.mixer);
        self.in_flight.spawn(async move {
            match hydrate_input(mixer.as_ref(), &uuid, &name).await {
                Ok(input) => Finished::Hydrated(input),
                Err(e) => {
                    warn!("Failed to hydrate new input '{}': {}", name, e);
                    Finished::HydrationFailed(uuid)
                }
            }
        });
    }

    fn finish(&mut self, done: Result<Finished, tokio::task::JoinError>) {
        match done {
            Ok(Finished::Hydrated(input)) => self.router.input_hydrated(input),
            Ok(Finished::HydrationFailed(uuid)) => self.router.hydration_failed(&uuid),
            Ok(Finished::Call) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("Remote task panicked: {}", e),
        }
    }

    /// Drain queued work, let calls finish, then zero the surface
    async fn stop(&mut self) -> LayoutSnapshot {
        info!("Router shutting down");

        while let Ok(cmd) = self.command_rx.try_recv() {
            match cmd {
                RouterCommand::Shutdown(reply) => {
                    let _ = reply.send(self.router.layout());
                }
                cmd => self.handle_command(cmd),
            }
        }

        let drain = async {
            while let Some(done) = self.in_flight.join_next().await {
                self.finish(done);
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("Abandoning {} in-flight OBS calls", self.in_flight.len());
            self.in_flight.abort_all();
        }

        let layout = self.router.layout();
        self.router.teardown();
        layout
    }
}

/// Route every subscribed OBS event into the router
pub fn subscribe_events(mixer: &dyn RemoteMixer, handle: &RouterHandle) {
    for event_type in SUBSCRIBED_EVENTS {
        let handle = handle.clone();
        mixer.subscribe(
            event_type,
            Arc::new(move |data| match MixerEvent::decode(event_type, data) {
                Ok(Some(event)) => handle.remote_event(event),
                Ok(None) => {}
                Err(e) => warn!("Malformed {} event: {}", event_type, e),
            }),
        );
    }
}
