use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use ambilight_integration::ZoneColorSource;
use chrono::Utc;
use color_mapping::ColorMapper;
use shared::{
    domain::{LedColor, SyncMode, SyncState, SyncStats, ZoneSnapshot},
    error::{LifecycleError, SyncError},
};
use tokio::{
    sync::{watch, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{error, info, trace, warn};
use wled_integration::{
    encode_color, encode_frame, LedSink, WledProtocol, DEFAULT_TIMEOUT_MULTIPLIER,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between the end of one tick and the start of the next.
    pub poll_interval: Duration,
    pub mapper: ColorMapper,
    pub protocol: WledProtocol,
    pub timeout_multiplier: u8,
    /// Average mode repeats its color once per LED instead of sending a
    /// single pixel.
    pub average_fill: bool,
}

impl SyncConfig {
    pub fn new(mapper: ColorMapper) -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            mapper,
            protocol: WledProtocol::default(),
            timeout_multiplier: DEFAULT_TIMEOUT_MULTIPLIER,
            average_fill: false,
        }
    }
}

struct Worker {
    mode: SyncMode,
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<(), SyncError>>,
}

#[derive(Default)]
struct Lifecycle {
    worker: Option<Worker>,
    destroyed: bool,
}

struct EngineShared {
    source: Arc<dyn ZoneColorSource>,
    sink: Arc<dyn LedSink>,
    mapper: ColorMapper,
    protocol: WledProtocol,
    timeout_multiplier: u8,
    average_fill: bool,
    poll_interval: Duration,
    stats: RwLock<SyncStats>,
    state: RwLock<SyncState>,
    // Held for the whole fetch/map/send sequence.
    tick_guard: Mutex<()>,
}

/// Polls a zone color source and streams the result to an LED sink.
///
/// At most one polling task exists per engine. Per-tick fetch and transmit
/// failures are counted in [`SyncStats::errors`] and logged; they never stop
/// the loop. Zone data that does not fit the LED topology halts the loop and
/// is returned from the next [`SyncEngine::stop`] or [`SyncEngine::destroy`].
pub struct SyncEngine {
    shared: Arc<EngineShared>,
    lifecycle: Mutex<Lifecycle>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn ZoneColorSource>,
        sink: Arc<dyn LedSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                source,
                sink,
                mapper: config.mapper,
                protocol: config.protocol,
                timeout_multiplier: config.timeout_multiplier,
                average_fill: config.average_fill,
                poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
                stats: RwLock::new(SyncStats::default()),
                state: RwLock::new(SyncState::Stopped),
                tick_guard: Mutex::new(()),
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// Starts polling in `mode`, replacing any loop that is already running.
    pub async fn start(&self, mode: SyncMode) -> Result<(), LifecycleError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.destroyed {
            return Err(LifecycleError::Destroyed);
        }

        if let Some(previous) = lifecycle.worker.take() {
            info!(from = %previous.mode, to = %mode, "sync: restarting loop");
            if let Err(err) = halt(previous).await {
                warn!(%err, "sync: replaced loop had halted on an error");
            }
        }

        let (cancel, cancelled) = watch::channel(false);
        *self.shared.state.write().await = SyncState::Running(mode);
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move { shared.run(mode, cancelled).await });
        lifecycle.worker = Some(Worker { mode, cancel, task });

        info!(
            %mode,
            poll_interval_ms = self.shared.poll_interval.as_millis() as u64,
            "sync: started"
        );
        Ok(())
    }

    /// Stops the loop once its current tick is done. No-op when stopped.
    /// Returns the error that halted the loop, if it halted on its own.
    pub async fn stop(&self) -> Result<(), SyncError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(worker) = lifecycle.worker.take() else {
            return Ok(());
        };
        let result = halt(worker).await;
        *self.shared.state.write().await = SyncState::Stopped;
        info!("sync: stopped");
        result
    }

    /// Stops the loop and releases the sink. The engine cannot be restarted.
    pub async fn destroy(&self) -> Result<(), SyncError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.destroyed {
            return Err(LifecycleError::Destroyed.into());
        }
        lifecycle.destroyed = true;

        let result = match lifecycle.worker.take() {
            Some(worker) => halt(worker).await,
            None => Ok(()),
        };
        *self.shared.state.write().await = SyncState::Stopped;
        self.shared.sink.close().await;
        info!("sync: destroyed");
        result
    }

    /// Runs a single fetch/map/send outside the loop and reports its outcome.
    /// Statistics are updated the same way a loop tick updates them.
    pub async fn sync_once(&self, mode: SyncMode) -> Result<(), SyncError> {
        if self.lifecycle.lock().await.destroyed {
            return Err(LifecycleError::Destroyed.into());
        }
        self.shared.tick(mode, None).await
    }

    pub async fn stats(&self) -> SyncStats {
        self.shared.stats.read().await.clone()
    }

    pub async fn reset_stats(&self) {
        *self.shared.stats.write().await = SyncStats::default();
    }

    /// A loop whose task has already ended reports `Stopped`, even if it
    /// never got to record that itself.
    pub async fn state(&self) -> SyncState {
        let lifecycle = self.lifecycle.lock().await;
        let finished = lifecycle
            .worker
            .as_ref()
            .is_some_and(|worker| worker.task.is_finished());
        drop(lifecycle);
        if finished {
            return SyncState::Stopped;
        }
        *self.shared.state.read().await
    }
}

async fn halt(worker: Worker) -> Result<(), SyncError> {
    let _ = worker.cancel.send(true);
    match worker.task.await {
        Ok(result) => result,
        Err(err) => {
            error!(%err, "sync: loop task aborted");
            Err(LifecycleError::Aborted.into())
        }
    }
}

fn is_cancelled(cancelled: Option<&watch::Receiver<bool>>) -> bool {
    cancelled.is_some_and(|rx| *rx.borrow())
}

impl EngineShared {
    async fn run(
        self: Arc<Self>,
        mode: SyncMode,
        mut cancelled: watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        loop {
            if is_cancelled(Some(&cancelled)) {
                break;
            }

            match self.tick(mode, Some(&cancelled)).await {
                Err(err @ (SyncError::InvalidInput(_) | SyncError::Lifecycle(_))) => {
                    *self.state.write().await = SyncState::Stopped;
                    error!(%err, %mode, "sync: loop halted");
                    return Err(err);
                }
                Ok(()) | Err(_) => {}
            }

            if is_cancelled(Some(&cancelled)) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancelled.changed() => break,
            }
        }
        trace!(%mode, "sync: loop exited");
        Ok(())
    }

    async fn tick(
        &self,
        mode: SyncMode,
        cancelled: Option<&watch::Receiver<bool>>,
    ) -> Result<(), SyncError> {
        let _guard = self.tick_guard.lock().await;
        let started = Instant::now();

        let snapshot = match self.source.colors().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.stats.write().await.record_error();
                warn!(%err, "sync: fetching zone colors failed");
                return Err(err.into());
            }
        };
        if is_cancelled(cancelled) {
            trace!("sync: cancelled after fetch, dropping snapshot");
            return Ok(());
        }

        let payload = match self.encode(mode, &snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                self.stats.write().await.record_error();
                return Err(err);
            }
        };

        if let Err(err) = self.sink.transmit(&payload).await {
            self.stats.write().await.record_error();
            warn!(%err, "sync: transmitting frame failed");
            return Err(err);
        }

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats
            .write()
            .await
            .record_update(latency_ms, Utc::now());
        trace!(%mode, latency_ms, bytes = payload.len(), "sync: frame delivered");
        Ok(())
    }

    fn encode(&self, mode: SyncMode, snapshot: &ZoneSnapshot) -> Result<Vec<u8>, SyncError> {
        match mode {
            SyncMode::Average => {
                let color = LedColor::scaled(
                    snapshot.average(),
                    self.mapper.brightness(),
                    self.mapper.white(),
                );
                if self.average_fill {
                    let pixels = vec![color; self.mapper.topology().led_count()];
                    Ok(encode_frame(&pixels, self.protocol, self.timeout_multiplier))
                } else {
                    Ok(encode_color(color, self.protocol, self.timeout_multiplier))
                }
            }
            SyncMode::Direct => {
                let frame = self.mapper.map(snapshot)?;
                Ok(encode_frame(
                    frame.pixels(),
                    self.protocol,
                    self.timeout_multiplier,
                ))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
