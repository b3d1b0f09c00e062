//! Delivery sink: one live status message per session key.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use hostwatch_core::ReportBlock;
use hostwatch_core::config::DeliveryConfig;

use crate::messaging::{ChatTarget, MessageFormat, MessageId, Messenger};
use crate::session::SessionKey;

use super::render::render_block;

/// Last message shown for a key, with the epoch of the session that sent it.
#[derive(Debug, Clone, Copy)]
struct DeliveryRecord {
    message_id: MessageId,
    epoch: u64,
}

/// Relays report blocks to the messaging surface, replacing the previous
/// status message so each key shows at most one live message.
///
/// Send and delete failures are contained here: they are logged and the
/// session keeps streaming. Calls stamped with an epoch older than the
/// recorded one come from a replaced session and are ignored, and any
/// message such a call manages to send anyway is deleted.
pub struct DeliverySink {
    messenger: Arc<dyn Messenger>,
    records: RwLock<HashMap<SessionKey, DeliveryRecord>>,
    config: DeliveryConfig,
}

impl DeliverySink {
    pub fn new(messenger: Arc<dyn Messenger>, config: DeliveryConfig) -> Self {
        Self {
            messenger,
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Deliver one report block for `key`.
    ///
    /// Deletes the previously shown message first (best-effort), then sends
    /// the new one and records its id.
    pub async fn deliver(
        &self,
        key: &SessionKey,
        epoch: u64,
        target: ChatTarget,
        block: &ReportBlock,
    ) {
        let previous = {
            let records = self.records.read().await;
            match records.get(key) {
                Some(record) if record.epoch > epoch => {
                    debug!(%key, epoch, "Ignoring delivery from a replaced session");
                    return;
                }
                Some(record) => Some(record.message_id),
                None => None,
            }
        };

        if let Some(message_id) = previous
            && let Err(e) = self.messenger.delete(target, message_id).await
        {
            debug!(%key, %message_id, error = %e, "Could not delete previous status message");
        }

        let text = render_block(key, block, self.config.max_message_chars);
        match self.messenger.send(target, &text, MessageFormat::Html).await {
            Ok(message_id) => {
                // Re-check: a successor session may have recorded meanwhile.
                // Any id that ends up without a record must still be deleted.
                let orphaned = {
                    let mut records = self.records.write().await;
                    match records.get(key) {
                        Some(record) if record.epoch > epoch => Some(message_id),
                        _ => records
                            .insert(key.clone(), DeliveryRecord { message_id, epoch })
                            .filter(|old| Some(old.message_id) != previous)
                            .map(|old| old.message_id),
                    }
                };
                if let Some(message_id) = orphaned
                    && let Err(e) = self.messenger.delete(target, message_id).await
                {
                    debug!(%key, %message_id, error = %e, "Could not delete unrecorded status message");
                }
            }
            Err(e) => {
                warn!(%key, error = %e, "Failed to send status message");
                // The previous message is gone; drop the record that names it.
                let mut records = self.records.write().await;
                match records.get(key) {
                    Some(record) if record.epoch > epoch => {}
                    _ => {
                        records.remove(key);
                    }
                }
            }
        }
    }

    /// Delete the last message for `key` and forget it. Idempotent.
    pub async fn cleanup(&self, key: &SessionKey, epoch: u64, target: ChatTarget) {
        let last = {
            let mut records = self.records.write().await;
            match records.get(key) {
                Some(record) if record.epoch > epoch => {
                    debug!(%key, epoch, "Ignoring cleanup from a replaced session");
                    None
                }
                Some(record) => {
                    let message_id = record.message_id;
                    records.remove(key);
                    Some(message_id)
                }
                None => None,
            }
        };

        if let Some(message_id) = last
            && let Err(e) = self.messenger.delete(target, message_id).await
        {
            debug!(%key, %message_id, error = %e, "Could not delete final status message");
        }
    }

    /// Whether a delivery record exists for `key`.
    pub async fn has_record(&self, key: &SessionKey) -> bool {
        self.records.read().await.contains_key(key)
    }

    /// Number of tracked records.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}
