//! Session lifecycle orchestration: start, stop, and reader task tracking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use hostwatch_core::MetricKind;
use hostwatch_core::config::{Config, HostEntry, map_home_dir};

use crate::delivery::DeliverySink;
use crate::messaging::ChatTarget;
use crate::transport::{Channel, Transport};

use super::reader::{ReaderContext, spawn_reader};
use super::registry::SessionRegistry;
use super::types::{SessionKey, StartOutcome, StopOutcome};

/// Orchestrates monitoring sessions end to end.
///
/// Start claims the key, opens the channel through the injected transport,
/// and spawns the session's reader task. Stop closes the channel and releases
/// the key without waiting for the reader; the reader notices the closed
/// channel on its next poll and runs its own cleanup.
pub struct SessionController {
    config: Config,
    transport: Arc<dyn Transport>,
    registry: Arc<SessionRegistry>,
    sink: Arc<DeliverySink>,
    /// Reader task handles, kept so callers can await completion.
    /// Finished handles are reaped on each start.
    readers: Mutex<HashMap<SessionKey, JoinHandle<()>>>,
    /// Monotone stamp distinguishing reincarnations of the same key.
    epoch_counter: AtomicU64,
}

impl SessionController {
    pub fn new(config: Config, transport: Arc<dyn Transport>, sink: Arc<DeliverySink>) -> Self {
        Self {
            config,
            transport,
            registry: Arc::new(SessionRegistry::new()),
            sink,
            readers: Mutex::new(HashMap::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    /// The shared session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Start a monitoring session for `key`, delivering output to `target`.
    ///
    /// Safe to call repeatedly: a second start for a live key reports
    /// [`StartOutcome::AlreadyActive`] without touching the transport.
    pub async fn start(&self, key: SessionKey, target: ChatTarget) -> StartOutcome {
        let Some(host) = self.config.find_host(&key.host).cloned() else {
            return StartOutcome::PreconditionFailed {
                reason: format!("host not configured: {}", key.host),
            };
        };

        if !self.registry.try_register(&key).await {
            return StartOutcome::AlreadyActive;
        }

        let command = remote_command(&self.config, &host, key.metric);
        let channel = match self.open_channel(&host, &command).await {
            Ok(channel) => channel,
            Err(detail) => {
                self.registry.unregister(&key).await;
                warn!(%key, detail, "Session start failed");
                return StartOutcome::ConnectionError { detail };
            }
        };

        let epoch = self.epoch_counter.fetch_add(1, Ordering::AcqRel) + 1;
        self.registry.attach(&key, Arc::clone(&channel)).await;

        let handle = spawn_reader(ReaderContext {
            key: key.clone(),
            epoch,
            channel,
            target,
            registry: Arc::clone(&self.registry),
            sink: Arc::clone(&self.sink),
            poll_interval: self.config.monitor.poll_interval(),
            read_chunk_bytes: self.config.monitor.read_chunk_bytes,
        });
        {
            let mut readers = self.readers.lock().await;
            readers.retain(|_, reader| !reader.is_finished());
            readers.insert(key.clone(), handle);
        }

        info!(%key, host = %host.addr, "Monitoring session started");
        StartOutcome::Activated
    }

    /// Stop the session for `key`, closing its channel and releasing the key.
    pub async fn stop(&self, key: &SessionKey) -> StopOutcome {
        let Some(channel) = self.registry.channel(key).await else {
            return StopOutcome::NotActive;
        };
        channel.close().await;
        self.registry.unregister(key).await;
        info!(%key, "Monitoring session stopped");
        StopOutcome::Stopped
    }

    /// Await the reader task for `key`, if one was spawned and not yet reaped.
    pub async fn wait_for_reader(&self, key: &SessionKey) {
        let handle = self.readers.lock().await.remove(key);
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(%key, error = %e, "Reader task failed");
        }
    }

    /// Keys with a registered session.
    pub async fn active_sessions(&self) -> Vec<SessionKey> {
        self.registry.keys().await
    }

    /// Drop finished reader handles and count those still running.
    pub async fn reader_count(&self) -> usize {
        let mut readers = self.readers.lock().await;
        readers.retain(|_, reader| !reader.is_finished());
        readers.len()
    }

    async fn open_channel(
        &self,
        host: &HostEntry,
        command: &str,
    ) -> Result<Arc<dyn Channel>, String> {
        let connection = self
            .transport
            .open(host, self.config.monitor.connect_timeout())
            .await
            .map_err(|e| e.to_string())?;
        let channel = connection.exec(command).await.map_err(|e| e.to_string())?;
        Ok(Arc::from(channel))
    }
}

/// Remote command line starting the collector for `metric` on `host`.
fn remote_command(config: &Config, host: &HostEntry, metric: MetricKind) -> String {
    let dir = map_home_dir(&config.monitor.scripts_dir, &host.user);
    format!("bash {}", dir.join(metric.script_name()).display())
}
