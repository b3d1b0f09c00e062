//! Scripted test doubles for the transport and messaging seams.
//!
//! Available to integration tests through the `test-utils` feature.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use hostwatch_core::config::{Config, HostEntry, MonitorConfig};

use crate::messaging::{ChatTarget, DeliveryError, MessageFormat, MessageId, Messenger};
use crate::transport::{Channel, Connection, Transport, TransportError};

/// What a [`ScriptedChannel`] does once its chunks are drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainBehavior {
    /// Report process exit.
    Exit,
    /// Stay open with nothing to read.
    Idle,
    /// Fail the next read.
    Error,
}

/// Channel double replaying a scripted sequence of output chunks.
pub struct ScriptedChannel {
    chunks: Mutex<VecDeque<Vec<u8>>>,
    on_drained: DrainBehavior,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl ScriptedChannel {
    fn with_behavior(chunks: Vec<Vec<u8>>, on_drained: DrainBehavior) -> Arc<Self> {
        Arc::new(Self {
            chunks: Mutex::new(chunks.into()),
            on_drained,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        })
    }

    fn encode(chunks: &[&str]) -> Vec<Vec<u8>> {
        chunks.iter().map(|c| c.as_bytes().to_vec()).collect()
    }

    /// Channel whose remote process exits after every chunk is read.
    pub fn exiting(chunks: &[&str]) -> Arc<Self> {
        Self::with_behavior(Self::encode(chunks), DrainBehavior::Exit)
    }

    /// Channel that keeps running idle after its chunks are read.
    pub fn long_running(chunks: &[&str]) -> Arc<Self> {
        Self::with_behavior(Self::encode(chunks), DrainBehavior::Idle)
    }

    /// Channel whose read fails once its chunks are drained.
    pub fn failing_after(chunks: &[&str]) -> Arc<Self> {
        Self::with_behavior(Self::encode(chunks), DrainBehavior::Error)
    }

    /// Channel replaying raw byte chunks, then exiting.
    pub fn exiting_bytes(chunks: Vec<Vec<u8>>) -> Arc<Self> {
        Self::with_behavior(chunks, DrainBehavior::Exit)
    }

    /// How many times the channel was closed.
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn poll_readable(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        !self.chunks.lock().await.is_empty() || self.on_drained == DrainBehavior::Error
    }

    async fn read(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ReadFailed {
                reason: "channel closed".to_string(),
            });
        }
        let mut chunks = self.chunks.lock().await;
        match chunks.pop_front() {
            Some(mut chunk) => {
                if chunk.len() > max_bytes {
                    let rest = chunk.split_off(max_bytes);
                    chunks.push_front(rest);
                }
                Ok(chunk)
            }
            None if self.on_drained == DrainBehavior::Error => Err(TransportError::ReadFailed {
                reason: "remote stream interrupted".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn process_exited(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return true;
        }
        self.on_drained == DrainBehavior::Exit && self.chunks.lock().await.is_empty()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

enum ScriptedOutcome {
    Channel(Arc<ScriptedChannel>),
    OpenFailure(String),
    ExecFailure(String),
}

/// Transport double handing out scripted outcomes in queue order.
///
/// Tests keep their own [`Arc`] handle on each queued channel to script and
/// inspect it while the session owns the other handle.
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            commands: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Queue a channel for the next open.
    pub async fn push_channel(&self, channel: Arc<ScriptedChannel>) {
        self.outcomes
            .lock()
            .await
            .push_back(ScriptedOutcome::Channel(channel));
    }

    /// Make the next open fail.
    pub async fn push_open_failure(&self, reason: &str) {
        self.outcomes
            .lock()
            .await
            .push_back(ScriptedOutcome::OpenFailure(reason.to_string()));
    }

    /// Make the next open succeed but its exec fail.
    pub async fn push_exec_failure(&self, reason: &str) {
        self.outcomes
            .lock()
            .await
            .push_back(ScriptedOutcome::ExecFailure(reason.to_string()));
    }

    /// Commands started over this transport, in order.
    pub async fn exec_commands(&self) -> Vec<String> {
        self.commands.lock().await.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(
        &self,
        host: &HostEntry,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let connection = |next| ScriptedConnection {
            next,
            commands: Arc::clone(&self.commands),
        };
        match self.outcomes.lock().await.pop_front() {
            Some(ScriptedOutcome::Channel(channel)) => Ok(Box::new(connection(Ok(channel)))),
            Some(ScriptedOutcome::ExecFailure(reason)) => Ok(Box::new(connection(Err(reason)))),
            Some(ScriptedOutcome::OpenFailure(reason)) => Err(TransportError::OpenFailed {
                host: host.addr.clone(),
                reason,
            }),
            None => Err(TransportError::OpenFailed {
                host: host.addr.clone(),
                reason: "no scripted outcome queued".to_string(),
            }),
        }
    }
}

struct ScriptedConnection {
    next: Result<Arc<ScriptedChannel>, String>,
    commands: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn exec(self: Box<Self>, command: &str) -> Result<Box<dyn Channel>, TransportError> {
        self.commands.lock().await.push(command.to_string());
        match self.next {
            Ok(channel) => Ok(Box::new(SharedChannel(channel))),
            Err(reason) => Err(TransportError::ExecFailed { reason }),
        }
    }
}

/// Forwards the channel trait to a shared [`ScriptedChannel`].
struct SharedChannel(Arc<ScriptedChannel>);

#[async_trait]
impl Channel for SharedChannel {
    async fn poll_readable(&self) -> bool {
        self.0.poll_readable().await
    }

    async fn read(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        self.0.read(max_bytes).await
    }

    async fn process_exited(&self) -> bool {
        self.0.process_exited().await
    }

    async fn close(&self) {
        self.0.close().await;
    }
}

/// One recorded messenger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerCall {
    Send {
        target: i64,
        message_id: i64,
        text: String,
    },
    Delete {
        target: i64,
        message_id: i64,
    },
}

/// Releases a send held by [`RecordingMessenger::hold_next_send`].
pub struct SendGate(Arc<Semaphore>);

impl SendGate {
    /// Let the held send continue.
    pub fn release(self) {
        self.0.add_permits(1);
    }
}

/// Messenger double recording successful sends and deletes in order.
///
/// Message ids count up from 1. Either direction can be made to fail;
/// failed calls are not recorded. A single send can be frozen in flight
/// with [`Self::hold_next_send`].
pub struct RecordingMessenger {
    calls: Mutex<Vec<MessengerCall>>,
    next_id: AtomicI64,
    sends_fail: AtomicBool,
    deletes_fail: AtomicBool,
    send_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            sends_fail: AtomicBool::new(false),
            deletes_fail: AtomicBool::new(false),
            send_gate: Mutex::new(None),
        })
    }

    /// Hold the next send until the returned gate is released. Sends
    /// arriving after that one pass through unheld.
    pub async fn hold_next_send(&self) -> SendGate {
        let gate = Arc::new(Semaphore::new(0));
        *self.send_gate.lock().await = Some(Arc::clone(&gate));
        SendGate(gate)
    }

    /// Fail every send until [`Self::recover`].
    pub fn fail_sends(&self) {
        self.sends_fail.store(true, Ordering::SeqCst);
    }

    /// Fail every delete until [`Self::recover`].
    pub fn fail_deletes(&self) {
        self.deletes_fail.store(true, Ordering::SeqCst);
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        self.sends_fail.store(false, Ordering::SeqCst);
        self.deletes_fail.store(false, Ordering::SeqCst);
    }

    /// All recorded calls, in order.
    pub async fn calls(&self) -> Vec<MessengerCall> {
        self.calls.lock().await.clone()
    }

    /// Texts of recorded sends, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                MessengerCall::Send { text, .. } => Some(text.clone()),
                MessengerCall::Delete { .. } => None,
            })
            .collect()
    }

    pub async fn send_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| matches!(call, MessengerCall::Send { .. }))
            .count()
    }

    pub async fn delete_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| matches!(call, MessengerCall::Delete { .. }))
            .count()
    }

    /// Messages sent and not deleted afterwards.
    pub async fn live_message_count(&self) -> usize {
        let mut live = HashSet::new();
        for call in self.calls.lock().await.iter() {
            match call {
                MessengerCall::Send { message_id, .. } => {
                    live.insert(*message_id);
                }
                MessengerCall::Delete { message_id, .. } => {
                    live.remove(message_id);
                }
            }
        }
        live.len()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(
        &self,
        target: ChatTarget,
        text: &str,
        _format: MessageFormat,
    ) -> Result<MessageId, DeliveryError> {
        let gate = self.send_gate.lock().await.take();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        if self.sends_fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::SendFailed {
                reason: "scripted send failure".to_string(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(MessengerCall::Send {
            target: target.0,
            message_id: id,
            text: text.to_string(),
        });
        Ok(MessageId(id))
    }

    async fn delete(
        &self,
        target: ChatTarget,
        message_id: MessageId,
    ) -> Result<(), DeliveryError> {
        if self.deletes_fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::DeleteFailed {
                message_id: message_id.0,
                reason: "scripted delete failure".to_string(),
            });
        }
        self.calls.lock().await.push(MessengerCall::Delete {
            target: target.0,
            message_id: message_id.0,
        });
        Ok(())
    }
}

/// Config with one host and a 1ms poll so idle readers spin fast in tests.
pub fn config_with_host(name: &str, addr: &str, user: &str) -> Config {
    Config {
        monitor: MonitorConfig {
            poll_interval_ms: 1,
            ..MonitorConfig::default()
        },
        hosts: vec![HostEntry {
            name: name.to_string(),
            addr: addr.to_string(),
            user: user.to_string(),
        }],
        ..Config::default()
    }
}
