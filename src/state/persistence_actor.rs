//! Persistence Actor for debounced layout snapshots using sled
//!
//! Saves are held in memory and only written once no newer snapshot has
//! arrived for the debounce window (default: 500ms). A burst of colour or
//! binding edits therefore ends up as a single write of the last layout.
//!
//! # Example
//!
//! ```ignore
//! use xtouch_obs_mixer::state::PersistenceActor;
//!
//! let handle = PersistenceActor::spawn("./data/state.sled", 500)?;
//! handle.save_snapshot(snapshot).await?;
//! handle.flush().await?;
//! handle.shutdown().await;
//! ```

use super::persistence::LayoutSnapshot;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

/// Default debounce window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Key used to store the snapshot in sled
const SNAPSHOT_KEY: &[u8] = b"layout_snapshot";

/// Commands sent to the persistence actor
#[derive(Debug)]
pub enum PersistenceCommand {
    /// Save a layout snapshot (debounced)
    Save(LayoutSnapshot),
    /// Load the current snapshot
    Load(oneshot::Sender<Option<LayoutSnapshot>>),
    /// Force flush any pending snapshot
    Flush(oneshot::Sender<Result<()>>),
    /// Flush, then stop
    Shutdown(Option<oneshot::Sender<()>>),
}

/// Persistence actor that manages debounced writes to sled database
pub struct PersistenceActor {
    db: sled::Db,
    command_rx: mpsc::Receiver<PersistenceCommand>,
    /// Pending snapshot awaiting flush
    pending_snapshot: Option<LayoutSnapshot>,
    /// Timestamp of last save request
    last_write_ts: Instant,
    debounce_ms: u64,
    /// Total number of writes performed
    write_count: u64,
}

/// Handle to communicate with the persistence actor
///
/// This handle is cheap to clone and can be shared across tasks.
#[derive(Clone)]
pub struct PersistenceActorHandle {
    cmd_tx: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceActor {
    /// Open the sled database at `db_path` and spawn the actor
    ///
    /// `debounce_ms` of 0 writes every snapshot immediately.
    pub fn spawn(db_path: impl AsRef<Path>, debounce_ms: u64) -> Result<PersistenceActorHandle> {
        let db_path = db_path.as_ref();
        let db = sled::open(db_path)
            .with_context(|| format!("Failed to open sled database at: {}", db_path.display()))?;

        info!("Persistence actor opened database at: {}", db_path.display());

        let (cmd_tx, command_rx) = mpsc::channel(100);

        let actor = PersistenceActor {
            db,
            command_rx,
            pending_snapshot: None,
            last_write_ts: Instant::now(),
            debounce_ms,
            write_count: 0,
        };

        tokio::spawn(actor.run());

        Ok(PersistenceActorHandle { cmd_tx })
    }

    async fn run(mut self) {
        info!("Persistence actor started (debounce: {}ms)", self.debounce_ms);

        let tick_interval = if self.debounce_ms > 0 { self.debounce_ms } else { 1000 };
        let mut ticker = tokio::time::interval(Duration::from_millis(tick_interval));

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        // Every handle dropped
                        if let Err(e) = self.flush_pending_snapshot().await {
                            warn!("Final layout flush failed: {:#}", e);
                        }
                        return;
                    };
                    match cmd {
                        PersistenceCommand::Save(snapshot) => {
                            trace!("Received save command, queuing snapshot");
                            self.pending_snapshot = Some(snapshot);
                            self.last_write_ts = Instant::now();

                            if self.debounce_ms == 0 {
                                self.flush_pending_snapshot().await;
                            }
                        }
                        PersistenceCommand::Load(response_tx) => {
                            let _ = response_tx.send(self.load_snapshot());
                        }
                        PersistenceCommand::Flush(response_tx) => {
                            let result = self.flush_pending_snapshot().await;
                            let _ = response_tx.send(result);
                        }
                        PersistenceCommand::Shutdown(done) => {
                            info!("Persistence actor shutting down, flushing pending snapshot");
                            if let Err(e) = self.flush_pending_snapshot().await {
                                warn!("Final layout flush failed: {:#}", e);
                            }
                            info!(
                                "Persistence actor shutdown complete (total writes: {})",
                                self.write_count
                            );
                            if let Some(done) = done {
                                let _ = done.send(());
                            }
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if self.pending_snapshot.is_some() && self.debounce_ms > 0 {
                        let elapsed = self.last_write_ts.elapsed();
                        if elapsed >= Duration::from_millis(self.debounce_ms) {
                            trace!("Debounce window expired ({:?}), flushing pending snapshot", elapsed);
                            if let Err(e) = self.flush_pending_snapshot().await {
                                error!("{:#}", e);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Write the pending snapshot, if any
    async fn flush_pending_snapshot(&mut self) -> Result<()> {
        let Some(snapshot) = self.pending_snapshot.take() else {
            trace!("No pending snapshot to flush");
            return Ok(());
        };

        let json = serde_json::to_vec(&snapshot).context("Failed to serialize snapshot")?;

        let db = self.db.clone();
        let write_result = tokio::task::spawn_blocking(move || {
            db.insert(SNAPSHOT_KEY, json)?;
            db.flush()?;
            Ok::<_, sled::Error>(())
        })
        .await
        .context("Snapshot write task panicked")?;

        match write_result {
            Ok(()) => {
                self.write_count += 1;
                trace!("Snapshot flushed to sled (write #{})", self.write_count);
                Ok(())
            }
            Err(e) => {
                // Keep it so the next flush retries
                self.pending_snapshot.get_or_insert(snapshot);
                Err(e).context("Failed to write snapshot to sled")
            }
        }
    }

    /// Load a snapshot from the database
    ///
    /// Returns `None` if no snapshot exists or deserialization fails.
    fn load_snapshot(&self) -> Option<LayoutSnapshot> {
        match self.db.get(SNAPSHOT_KEY) {
            Ok(Some(data)) => match serde_json::from_slice::<LayoutSnapshot>(&data) {
                Ok(snapshot) => {
                    debug!(
                        "Loaded layout (version: {}, timestamp: {}, {} strips)",
                        snapshot.version,
                        snapshot.timestamp,
                        snapshot.strips.len()
                    );
                    Some(snapshot)
                }
                Err(e) => {
                    warn!("Failed to deserialize layout snapshot: {}", e);
                    None
                }
            },
            Ok(None) => {
                debug!("No layout snapshot found in database");
                None
            }
            Err(e) => {
                error!("Failed to read layout snapshot from sled: {}", e);
                None
            }
        }
    }
}

impl PersistenceActorHandle {
    /// Queue a snapshot (debounced, last write wins)
    pub async fn save_snapshot(&self, snapshot: LayoutSnapshot) -> Result<()> {
        self.cmd_tx
            .send(PersistenceCommand::Save(snapshot))
            .await
            .context("Failed to send save command: actor shut down")
    }

    /// Queue a snapshot without waiting for channel capacity
    pub fn try_save_snapshot(&self, snapshot: LayoutSnapshot) {
        if let Err(e) = self.cmd_tx.try_send(PersistenceCommand::Save(snapshot)) {
            warn!("Layout snapshot dropped: {}", e);
        }
    }

    /// Load the most recently persisted snapshot (pending saves are not visible)
    pub async fn load_snapshot(&self) -> Result<Option<LayoutSnapshot>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(PersistenceCommand::Load(tx))
            .await
            .context("Failed to send load command: actor shut down")?;

        rx.await.context("Failed to receive load response")
    }

    /// Force flush any pending snapshot to disk immediately
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(PersistenceCommand::Flush(tx))
            .await
            .context("Failed to send flush command: actor shut down")?;

        rx.await.context("Failed to receive flush response")?
    }

    /// Flush and stop the actor, waiting until it is done
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(PersistenceCommand::Shutdown(Some(tx))).await.is_ok() {
            let _ = rx.await;
        }
    }
}
