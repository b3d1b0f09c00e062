//! Per-session reader task.
//!
//! Polls the remote channel, assembles sentinel-delimited report blocks, and
//! forwards each one to the delivery sink in order. Whatever ends the loop,
//! the exit path releases the registry key and cleans up the last status
//! message, so a failed stream can never leave a stale session behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hostwatch_core::BlockAssembler;

use crate::delivery::DeliverySink;
use crate::messaging::ChatTarget;
use crate::transport::Channel;

use super::registry::SessionRegistry;
use super::types::SessionKey;

/// Everything a reader task needs, captured at spawn time.
pub(crate) struct ReaderContext {
    pub key: SessionKey,
    /// Stamp distinguishing this session from earlier holders of the key.
    pub epoch: u64,
    pub channel: Arc<dyn Channel>,
    pub target: ChatTarget,
    pub registry: Arc<SessionRegistry>,
    pub sink: Arc<DeliverySink>,
    pub poll_interval: Duration,
    pub read_chunk_bytes: usize,
}

/// Spawn the reader loop for one session.
pub(crate) fn spawn_reader(ctx: ReaderContext) -> JoinHandle<()> {
    let ReaderContext {
        key,
        epoch,
        channel,
        target,
        registry,
        sink,
        poll_interval,
        read_chunk_bytes,
    } = ctx;

    tokio::spawn(async move {
        let mut assembler = BlockAssembler::new();
        let mut blocks_delivered = 0u64;

        let exited_cleanly = loop {
            if channel.poll_readable().await {
                let chunk = match channel.read(read_chunk_bytes).await {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(%key, error = %e, "Channel read failed, ending session");
                        break false;
                    }
                };
                if !chunk.is_empty() {
                    let text = match String::from_utf8(chunk) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(%key, error = %e, "Channel emitted invalid UTF-8, ending session");
                            break false;
                        }
                    };
                    for block in assembler.push_chunk(&text) {
                        sink.deliver(&key, epoch, target, &block).await;
                        blocks_delivered += 1;
                    }
                    continue;
                }
                // Readable but empty: the stream is done, fall through to the
                // exit check.
            }
            if channel.process_exited().await {
                break true;
            }
            tokio::time::sleep(poll_interval).await;
        };

        if exited_cleanly {
            // The command ended; flush lines after the last sentinel so no
            // output is lost.
            if let Some(block) = assembler.finish() {
                sink.deliver(&key, epoch, target, &block).await;
                blocks_delivered += 1;
            }
        } else if assembler.pending_lines() > 0 {
            debug!(
                %key,
                pending = assembler.pending_lines(),
                "Discarding buffered lines after stream error"
            );
        }

        registry.unregister_if(&key, &channel).await;
        sink.cleanup(&key, epoch, target).await;
        info!(%key, blocks_delivered, "Reader finished");
    })
}
