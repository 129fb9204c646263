//! # Lock Reconciler
//!
//! Background task that settles this station's lock entries against the
//! store, so `waiting-unlocked` entries disappear once the edits they wait
//! for have landed.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Lock Reconciler                                 │
//! │                                                                         │
//! │  ReconcilerHandle ──(mpsc 256)──┐                                       │
//! │    reconcile_now()              │                                       │
//! │    force_release(station)       ▼                                       │
//! │    shutdown()            ┌──────────────┐                               │
//! │                          │  run loop    │◄── interval tick (30s)        │
//! │                          │  select!     │                               │
//! │                          └──────┬───────┘                               │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │              LockCoordinator::update_all_locked_orders(station)         │
//! │              LockCoordinator::remove_all_locked_orders(station)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On start the reconciler clears locks left from a previous run: the main
//! station clears the whole table, any other station only its own entries.
//!
//! A failed pass is logged and retried on the next tick. Nothing here
//! expires a lock on its own: a crashed station's `locked` entries stay
//! until someone force-releases that station.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::StationConfig;
use crate::error::{StationError, StationResult};
use crate::lock::LockCoordinator;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub station_id: String,
    pub is_main: bool,
    pub interval: Duration,
    /// Clear stale locks before the first pass.
    pub release_on_start: bool,
    /// Drop every lock of this station when shutting down.
    pub release_on_shutdown: bool,
}

impl ReconcilerConfig {
    pub fn from_station(config: &StationConfig) -> Self {
        Self {
            station_id: config.station.id.clone(),
            is_main: config.station.is_main,
            interval: config.locking.reconcile_interval(),
            release_on_start: config.locking.release_on_start,
            release_on_shutdown: config.locking.release_on_shutdown,
        }
    }
}

#[derive(Debug)]
enum ReconcilerCommand {
    ReconcileNow {
        reply: oneshot::Sender<StationResult<bool>>,
    },
    /// Clears another station's locks, or all of them with `None`.
    ForceReleaseStation {
        station_id: Option<String>,
        reply: oneshot::Sender<StationResult<bool>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle for controlling a running reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerHandle {
    cmd_tx: mpsc::Sender<ReconcilerCommand>,
}

impl ReconcilerHandle {
    /// Runs a pass now. Returns whether the lock document changed.
    pub async fn reconcile_now(&self) -> StationResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(ReconcilerCommand::ReconcileNow { reply }).await?;
        rx.await.map_err(|_| StationError::Shutdown)?
    }

    /// Drops the locks of a station that went away. `None` clears the
    /// whole table.
    pub async fn force_release(&self, station_id: Option<&str>) -> StationResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(ReconcilerCommand::ForceReleaseStation {
            station_id: station_id.map(str::to_string),
            reply,
        })
        .await?;
        rx.await.map_err(|_| StationError::Shutdown)?
    }

    /// Stops the task and waits for its last write.
    pub async fn shutdown(&self) -> StationResult<()> {
        let (done, rx) = oneshot::channel();
        self.send(ReconcilerCommand::Shutdown { done }).await?;
        rx.await.map_err(|_| StationError::Shutdown)
    }

    async fn send(&self, cmd: ReconcilerCommand) -> StationResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| StationError::Shutdown)
    }
}

pub struct Reconciler {
    locks: LockCoordinator,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(locks: LockCoordinator, config: ReconcilerConfig) -> Self {
        Self { locks, config }
    }

    /// Spawns the loop and returns its handle and task.
    pub fn start(self) -> (ReconcilerHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let task = tokio::spawn(async move {
            self.run(cmd_rx).await;
        });
        (ReconcilerHandle { cmd_tx }, task)
    }

    async fn run(self, mut cmd_rx: mpsc::Receiver<ReconcilerCommand>) {
        info!(
            station = %self.config.station_id,
            interval_secs = self.config.interval.as_secs(),
            "Lock reconciler started"
        );
        self.clear_stale().await;
        // first pass one interval after start
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ReconcilerCommand::ReconcileNow { reply }) => {
                            let _ = reply.send(self.pass().await);
                        }
                        Some(ReconcilerCommand::ForceReleaseStation { station_id, reply }) => {
                            let result = self
                                .locks
                                .remove_all_locked_orders(station_id.as_deref())
                                .await;
                            let _ = reply.send(result);
                        }
                        Some(ReconcilerCommand::Shutdown { done }) => {
                            self.stop().await;
                            let _ = done.send(());
                            break;
                        }
                        None => {
                            // every handle dropped
                            self.stop().await;
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.pass().await {
                        error!(error = %e, "Lock reconcile pass failed");
                    }
                }
            }
        }
        info!(station = %self.config.station_id, "Lock reconciler stopped");
    }

    async fn pass(&self) -> StationResult<bool> {
        let changed = self
            .locks
            .update_all_locked_orders(&self.config.station_id)
            .await?;
        debug!(changed, "Lock reconcile pass");
        Ok(changed)
    }

    async fn clear_stale(&self) {
        if !self.config.release_on_start {
            return;
        }
        let scope = (!self.config.is_main).then_some(self.config.station_id.as_str());
        match self.locks.remove_all_locked_orders(scope).await {
            Ok(changed) => info!(
                changed,
                all_stations = self.config.is_main,
                "Cleared locks from previous run"
            ),
            Err(e) => error!(error = %e, "Failed to clear locks on start"),
        }
    }

    async fn stop(&self) {
        if !self.config.release_on_shutdown {
            return;
        }
        match self
            .locks
            .remove_all_locked_orders(Some(&self.config.station_id))
            .await
        {
            Ok(changed) => debug!(changed, "Released station locks on shutdown"),
            Err(e) => error!(error = %e, "Failed to release station locks on shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockStatus, OrderRev};
    use serde_json::json;
    use std::sync::Arc;
    use tally_core::context::{EmployeeRef, SessionContext, StationRef};
    use tally_db::{DocumentStore, MemoryStore, Revision};

    fn ctx(station: &str) -> SessionContext {
        let mut ctx = SessionContext::default();
        ctx.station = StationRef::new(station, station.to_uppercase());
        ctx.employee = EmployeeRef::new("e1", "Ana");
        ctx
    }

    fn config(release_on_shutdown: bool) -> ReconcilerConfig {
        ReconcilerConfig {
            station_id: "st-a".into(),
            is_main: false,
            interval: Duration::from_secs(30),
            release_on_start: false,
            release_on_shutdown,
        }
    }

    async fn lock_both_stations(locks: &LockCoordinator) {
        let rev = Revision::from_stored("1-a");
        locks
            .acquire(&ctx("st-a"), &[OrderRev::new("o1", rev.clone())])
            .await
            .unwrap();
        locks
            .acquire(&ctx("st-b"), &[OrderRev::new("o2", rev)])
            .await
            .unwrap();
    }

    /// Order at rev 1 with a waiting-unlocked entry at rev 2.
    async fn waiting(store: &Arc<MemoryStore>, locks: &LockCoordinator) -> Revision {
        let r1 = store.put("o1", json!({}), None).await.unwrap();
        locks
            .acquire(&ctx("st-a"), &[OrderRev::new("o1", r1.clone())])
            .await
            .unwrap();
        locks
            .release("st-a", &[OrderRev::new("o1", r1.next())])
            .await
            .unwrap();
        assert_eq!(
            locks.table().await.unwrap()["o1"].status,
            LockStatus::WaitingUnlocked
        );
        r1
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_settles_waiting_entry() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockCoordinator::new(store.clone(), "s1");
        let r1 = waiting(&store, &locks).await;

        let (handle, task) = Reconciler::new(locks.clone(), config(false)).start();
        store.put("o1", json!({"n": 2}), Some(&r1)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(locks.table().await.unwrap().is_empty());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_now() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockCoordinator::new(store.clone(), "s1");
        let r1 = waiting(&store, &locks).await;
        let (handle, _task) = Reconciler::new(locks.clone(), config(false)).start();

        assert!(!handle.reconcile_now().await.unwrap());
        store.put("o1", json!({"n": 2}), Some(&r1)).await.unwrap();
        assert!(handle.reconcile_now().await.unwrap());
        assert!(locks.table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_force_release_other_station() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockCoordinator::new(store.clone(), "s1");
        let rev = Revision::from_stored("1-a");
        locks
            .acquire(&ctx("st-b"), &[OrderRev::new("o9", rev)])
            .await
            .unwrap();
        let (handle, _task) = Reconciler::new(locks.clone(), config(false)).start();

        assert!(handle.force_release(Some("st-b")).await.unwrap());
        assert!(locks.table().await.unwrap().is_empty());
        assert!(!handle.force_release(None).await.unwrap());
    }

    #[test]
    fn test_config_from_station() {
        let mut station = StationConfig::default();
        station.station.id = "st-main".into();
        station.station.is_main = true;
        station.locking.reconcile_interval_secs = 5;

        let config = ReconcilerConfig::from_station(&station);
        assert_eq!(config.station_id, "st-main");
        assert!(config.is_main);
        assert!(config.release_on_start);
        assert_eq!(config.interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_start_clears_own_locks() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockCoordinator::new(store.clone(), "s1");
        lock_both_stations(&locks).await;

        let mut config = config(false);
        config.release_on_start = true;
        let (handle, _task) = Reconciler::new(locks.clone(), config).start();
        // replies come after the start-up clear
        handle.reconcile_now().await.unwrap();

        let table = locks.table().await.unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["o2"]);
    }

    #[tokio::test]
    async fn test_main_station_start_clears_every_lock() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockCoordinator::new(store.clone(), "s1");
        lock_both_stations(&locks).await;

        let config = ReconcilerConfig {
            is_main: true,
            release_on_start: true,
            ..config(false)
        };
        let (handle, _task) = Reconciler::new(locks.clone(), config).start();
        handle.reconcile_now().await.unwrap();

        assert!(locks.table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_releases_own_locks() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockCoordinator::new(store.clone(), "s1");
        lock_both_stations(&locks).await;

        let (handle, task) = Reconciler::new(locks.clone(), config(true)).start();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let table = locks.table().await.unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["o2"]);
        assert!(matches!(
            handle.reconcile_now().await,
            Err(StationError::Shutdown)
        ));
    }
}
