#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the monitoring session lifecycle.
//!
//! Tests the full flow: controller → registry → reader task → delivery sink,
//! over scripted transport channels and a recording messenger.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hostwatch_core::config::Config;
use hostwatch_core::{BLOCK_SENTINEL, MetricKind};

use hostwatch_monitor::messaging::{ChatTarget, Messenger};
use hostwatch_monitor::testing::{
    MessengerCall, RecordingMessenger, ScriptedChannel, ScriptedTransport, config_with_host,
};
use hostwatch_monitor::transport::Transport;
use hostwatch_monitor::{DeliverySink, SessionController, SessionKey, StartOutcome, StopOutcome};

const TARGET: ChatTarget = ChatTarget(7);

struct Harness {
    controller: SessionController,
    transport: Arc<ScriptedTransport>,
    messenger: Arc<RecordingMessenger>,
    sink: Arc<DeliverySink>,
}

fn harness_with(config: Config) -> Harness {
    let transport = ScriptedTransport::new();
    let messenger = RecordingMessenger::new();
    let sink = Arc::new(DeliverySink::new(
        Arc::clone(&messenger) as Arc<dyn Messenger>,
        config.delivery.clone(),
    ));
    let controller = SessionController::new(
        config,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&sink),
    );
    Harness {
        controller,
        transport,
        messenger,
        sink,
    }
}

fn harness() -> Harness {
    harness_with(config_with_host("srv1", "10.0.0.5", "monitor"))
}

fn key(metric: MetricKind) -> SessionKey {
    SessionKey::new(metric, 42, "srv1")
}

/// Readers deliver asynchronously; poll until `count` sends landed.
async fn wait_for_sends(messenger: &RecordingMessenger, count: usize) {
    for _ in 0..500 {
        if messenger.send_count().await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(messenger.send_count().await, count, "sends never arrived");
}

// =========================================================================
// Session admission
// =========================================================================

#[tokio::test]
async fn concurrent_starts_admit_exactly_one_session() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::long_running(&[]))
        .await;
    h.transport
        .push_channel(ScriptedChannel::long_running(&[]))
        .await;

    let (a, b) = tokio::join!(
        h.controller.start(key(MetricKind::Ram), TARGET),
        h.controller.start(key(MetricKind::Ram), TARGET),
    );

    let outcomes = [a, b];
    let activated = outcomes
        .iter()
        .filter(|o| matches!(o, StartOutcome::Activated))
        .count();
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, StartOutcome::AlreadyActive))
        .count();
    assert_eq!(activated, 1);
    assert_eq!(rejected, 1);
    assert_eq!(
        h.controller.active_sessions().await,
        vec![key(MetricKind::Ram)]
    );
}

#[tokio::test]
async fn second_start_for_a_live_key_is_already_active() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::long_running(&[]))
        .await;

    assert!(matches!(
        h.controller.start(key(MetricKind::Ram), TARGET).await,
        StartOutcome::Activated
    ));
    assert!(matches!(
        h.controller.start(key(MetricKind::Ram), TARGET).await,
        StartOutcome::AlreadyActive
    ));

    // The same user may watch another metric on the same host.
    h.transport
        .push_channel(ScriptedChannel::long_running(&[]))
        .await;
    assert!(matches!(
        h.controller.start(key(MetricKind::Cpu), TARGET).await,
        StartOutcome::Activated
    ));
    assert_eq!(h.controller.active_sessions().await.len(), 2);
}

#[tokio::test]
async fn unknown_host_is_rejected_before_any_transport_work() {
    let h = harness();

    let outcome = h
        .controller
        .start(SessionKey::new(MetricKind::Ram, 42, "ghost"), TARGET)
        .await;
    assert!(matches!(outcome, StartOutcome::PreconditionFailed { .. }));
    assert!(h.transport.exec_commands().await.is_empty());
    assert!(h.controller.registry().is_empty().await);
}

#[tokio::test]
async fn stop_without_a_session_reports_not_active() {
    let h = harness();

    assert!(matches!(
        h.controller.stop(&key(MetricKind::Ram)).await,
        StopOutcome::NotActive
    ));
    assert!(h.messenger.calls().await.is_empty());
    assert!(h.controller.registry().is_empty().await);
}

// =========================================================================
// Streaming and delivery
// =========================================================================

#[tokio::test]
async fn streams_blocks_in_order_replacing_the_previous_message() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::exiting(&[
            "cpu load\n1.0 0.8\n===END_MONITOR_BLOCK===\nmem\n",
            "512MiB free\n===END_MONITOR_BLOCK===\ntail without terminator",
        ]))
        .await;

    let k = key(MetricKind::Ram);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    h.controller.wait_for_reader(&k).await;

    let texts = h.messenger.sent_texts().await;
    assert_eq!(texts.len(), 3);
    assert!(texts[0].starts_with("<b>🔔 [srv1] RAM monitor</b>\n<pre>"));
    assert!(texts[0].contains("1.0 0.8"));
    assert!(texts[1].contains("512MiB free"));
    assert!(texts[2].contains("tail without terminator"));
    // Completed blocks carry the sentinel line; the end-of-stream flush does not.
    assert!(texts[0].contains(BLOCK_SENTINEL));
    assert!(!texts[2].contains(BLOCK_SENTINEL));

    // Each send replaces the previous message; cleanup removes the last one.
    let calls = h.messenger.calls().await;
    assert!(matches!(calls[0], MessengerCall::Send { message_id: 1, .. }));
    assert!(matches!(calls[1], MessengerCall::Delete { message_id: 1, .. }));
    assert!(matches!(calls[2], MessengerCall::Send { message_id: 2, .. }));
    assert!(matches!(calls[3], MessengerCall::Delete { message_id: 2, .. }));
    assert!(matches!(calls[4], MessengerCall::Send { message_id: 3, .. }));
    assert!(matches!(calls[5], MessengerCall::Delete { message_id: 3, .. }));
    assert_eq!(h.messenger.live_message_count().await, 0);

    assert!(!h.sink.has_record(&k).await);
    assert!(h.controller.registry().is_empty().await);
}

#[tokio::test]
async fn cpu_session_runs_the_cpu_collector_script() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::exiting(&[
            "load avg: 0.42\n===END_MONITOR_BLOCK===\n",
            "load avg: 0.57\n===END_MONITOR_BLOCK===\n",
        ]))
        .await;

    let k = key(MetricKind::Cpu);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    h.controller.wait_for_reader(&k).await;

    assert_eq!(
        h.transport.exec_commands().await,
        vec!["bash /opt/hostwatch/scripts/cpu_monitor.sh"]
    );
    let texts = h.messenger.sent_texts().await;
    assert_eq!(texts.len(), 2);
    assert!(texts[1].starts_with("<b>🔔 [srv1] CPU monitor</b>"));
    // One delete replacing the first message, one from cleanup.
    assert_eq!(h.messenger.delete_count().await, 2);
    assert_eq!(h.messenger.live_message_count().await, 0);
}

#[tokio::test]
async fn a_session_with_no_output_sends_nothing() {
    let h = harness();
    h.transport.push_channel(ScriptedChannel::exiting(&[])).await;

    let k = key(MetricKind::Ram);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    h.controller.wait_for_reader(&k).await;

    assert!(h.messenger.calls().await.is_empty());
    assert!(h.controller.registry().is_empty().await);
}

#[tokio::test]
async fn undecodable_output_aborts_the_session_without_a_final_flush() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::exiting_bytes(vec![
            b"partial line ".to_vec(),
            vec![0xFF, 0xFE],
        ]))
        .await;

    let k = key(MetricKind::Ram);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    h.controller.wait_for_reader(&k).await;

    // The buffered fragment is discarded, not delivered.
    assert!(h.messenger.calls().await.is_empty());
    assert!(h.controller.registry().is_empty().await);
    assert!(!h.sink.has_record(&k).await);
}

#[tokio::test]
async fn read_failure_stops_the_session_after_delivered_blocks() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::failing_after(&[
            "mem 71%\n===END_MONITOR_BLOCK===\n",
        ]))
        .await;

    let k = key(MetricKind::Ram);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    h.controller.wait_for_reader(&k).await;

    // One block was shown, then cleaned up when the stream broke.
    assert_eq!(h.messenger.send_count().await, 1);
    assert_eq!(h.messenger.delete_count().await, 1);
    assert_eq!(h.messenger.live_message_count().await, 0);
    assert!(h.controller.registry().is_empty().await);
}

// =========================================================================
// Stop and restart
// =========================================================================

#[tokio::test]
async fn stop_closes_the_channel_and_deletes_the_status_message() {
    let h = harness();
    let channel = ScriptedChannel::long_running(&["cpu 0.42\n===END_MONITOR_BLOCK===\n"]);
    h.transport.push_channel(Arc::clone(&channel)).await;

    let k = key(MetricKind::Cpu);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    wait_for_sends(&h.messenger, 1).await;

    assert!(matches!(h.controller.stop(&k).await, StopOutcome::Stopped));
    assert_eq!(channel.close_count(), 1);
    h.controller.wait_for_reader(&k).await;

    assert_eq!(h.messenger.send_count().await, 1);
    assert_eq!(h.messenger.delete_count().await, 1);
    assert_eq!(h.messenger.live_message_count().await, 0);
    assert!(h.controller.registry().is_empty().await);

    // Stopping again is a no-op.
    assert!(matches!(
        h.controller.stop(&k).await,
        StopOutcome::NotActive
    ));
    assert_eq!(h.messenger.delete_count().await, 1);
}

#[tokio::test]
async fn a_full_session_round_trip_leaves_no_live_messages() {
    let h = harness();
    let channel = ScriptedChannel::long_running(&[
        "load avg: 0.42\n===END_MONITOR_BLOCK===\n",
        "load avg: 0.57\n===END_MONITOR_BLOCK===\n",
    ]);
    h.transport.push_channel(Arc::clone(&channel)).await;

    let k = key(MetricKind::Cpu);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    wait_for_sends(&h.messenger, 2).await;

    assert!(matches!(h.controller.stop(&k).await, StopOutcome::Stopped));
    h.controller.wait_for_reader(&k).await;

    // The replacement delete lands between the sends; cleanup deletes the last.
    let calls = h.messenger.calls().await;
    assert_eq!(calls.len(), 4);
    assert!(matches!(calls[0], MessengerCall::Send { message_id: 1, .. }));
    assert!(matches!(calls[1], MessengerCall::Delete { message_id: 1, .. }));
    assert!(matches!(calls[2], MessengerCall::Send { message_id: 2, .. }));
    assert!(matches!(calls[3], MessengerCall::Delete { message_id: 2, .. }));
    assert_eq!(h.messenger.live_message_count().await, 0);

    assert_eq!(channel.close_count(), 1);
    assert!(!h.sink.has_record(&k).await);
    assert!(h.controller.registry().is_empty().await);
}

#[tokio::test]
async fn a_stopped_key_can_be_started_again() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::long_running(&[]))
        .await;
    h.transport
        .push_channel(ScriptedChannel::exiting(&[
            "back up\n===END_MONITOR_BLOCK===\n",
        ]))
        .await;

    let k = key(MetricKind::Ram);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    assert!(matches!(h.controller.stop(&k).await, StopOutcome::Stopped));
    h.controller.wait_for_reader(&k).await;

    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    h.controller.wait_for_reader(&k).await;

    assert_eq!(h.messenger.send_count().await, 1);
    assert_eq!(h.messenger.live_message_count().await, 0);
    assert!(h.controller.registry().is_empty().await);
}

#[tokio::test]
async fn finished_reader_handles_are_reaped() {
    let h = harness();
    h.transport
        .push_channel(ScriptedChannel::exiting(&[
            "ram 1\n===END_MONITOR_BLOCK===\n",
        ]))
        .await;
    h.transport
        .push_channel(ScriptedChannel::exiting(&[
            "cpu 1\n===END_MONITOR_BLOCK===\n",
        ]))
        .await;

    assert!(matches!(
        h.controller.start(key(MetricKind::Ram), TARGET).await,
        StartOutcome::Activated
    ));
    assert!(matches!(
        h.controller.start(key(MetricKind::Cpu), TARGET).await,
        StartOutcome::Activated
    ));

    // Both readers exit on their own; their handles must not linger.
    for _ in 0..500 {
        if h.controller.reader_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(h.controller.reader_count().await, 0);
}

// =========================================================================
// Transport failures and the remote command
// =========================================================================

#[tokio::test]
async fn failed_connect_releases_the_key_for_retry() {
    let h = harness();
    h.transport.push_open_failure("connection refused").await;

    let k = key(MetricKind::Ram);
    let outcome = h.controller.start(k.clone(), TARGET).await;
    assert!(matches!(
        &outcome,
        StartOutcome::ConnectionError { detail } if detail.contains("connection refused")
    ));
    assert!(h.controller.registry().is_empty().await);
    assert!(h.messenger.calls().await.is_empty());

    // The key is free again.
    h.transport
        .push_channel(ScriptedChannel::long_running(&[]))
        .await;
    assert!(matches!(
        h.controller.start(k, TARGET).await,
        StartOutcome::Activated
    ));
}

#[tokio::test]
async fn failed_exec_releases_the_key() {
    let h = harness();
    h.transport.push_exec_failure("bash: not found").await;

    let outcome = h.controller.start(key(MetricKind::Ram), TARGET).await;
    assert!(matches!(
        &outcome,
        StartOutcome::ConnectionError { detail } if detail.contains("bash: not found")
    ));
    assert_eq!(h.transport.exec_commands().await.len(), 1);
    assert!(h.controller.registry().is_empty().await);
}

#[tokio::test]
async fn scripts_under_home_are_mapped_to_the_host_user() {
    let mut config = config_with_host("srv1", "10.0.0.5", "monitor");
    config.monitor.scripts_dir = PathBuf::from("/home/deploy/hostwatch/scripts");
    let h = harness_with(config);
    h.transport.push_channel(ScriptedChannel::exiting(&[])).await;

    let k = key(MetricKind::Ram);
    assert!(matches!(
        h.controller.start(k.clone(), TARGET).await,
        StartOutcome::Activated
    ));
    h.controller.wait_for_reader(&k).await;

    assert_eq!(
        h.transport.exec_commands().await,
        vec!["bash /home/monitor/hostwatch/scripts/ram_monitor.sh"]
    );
}
