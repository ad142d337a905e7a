//! End-to-end behaviour of the parameter server through its event loop.
//!
//! Bus traffic is simulated with an in-memory channel feeding
//! [`run_event_loop`] and a [`RecordingPublisher`] capturing snapshots.
//! Timer-driven tests run on paused tokio time.

#![allow(clippy::unwrap_used)]

use std::io::Write as _;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver};
use param_core::{
    DEFAULT_PUBLISH_PERIOD, EventLoopStats, ParameterServer, RecordingPublisher, ServerEvent,
    run_event_loop,
};
use param_store::ParamStore;
use param_types::{ChannelNames, ParamSet, SequenceNumber, ServerId, SetEntry};

const PARAMS: &str = r"
a: 0
b: 0
arm:
  joints: [1, 2, 3]
  limits:
    max_speed: 2.5
";

fn server(id: i64) -> ParameterServer {
    ParameterServer::with_identity(
        ParamStore::parse(PARAMS).unwrap(),
        ChannelNames::default(),
        ServerId(id),
    )
}

fn set(entries: &[(&str, &str)]) -> ServerEvent {
    let entries = entries.iter().map(|(k, v)| SetEntry::new(*k, *v));
    ServerEvent::SetReceived(ParamSet::now(entries.collect()))
}

fn shutdown_after(millis: u64) -> tokio::time::Sleep {
    tokio::time::sleep(Duration::from_millis(millis))
}

/// Run the loop with the default period until `stop_ms` has elapsed.
async fn drive(
    server: &mut ParameterServer,
    events: UnboundedReceiver<ServerEvent>,
    publisher: &mut RecordingPublisher,
    stop_ms: u64,
) -> EventLoopStats {
    let stop = shutdown_after(stop_ms);
    run_event_loop(server, events, publisher, DEFAULT_PUBLISH_PERIOD, stop)
        .await
        .unwrap()
}

fn sequences(publisher: &RecordingPublisher) -> Vec<u32> {
    let updates = publisher.updates();
    updates.iter().map(|u| u.sequence_number.get()).collect()
}

#[tokio::test]
async fn published_snapshot_matches_file_on_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(PARAMS.as_bytes()).unwrap();

    let channels = ChannelNames::default();
    let mut server = ParameterServer::load(file.path(), channels).unwrap();
    let mut publisher = RecordingPublisher::new();
    assert!(server.publish(&mut publisher).await.unwrap());

    let updates = publisher.updates();
    let first = updates.first().unwrap();
    let published = ParamStore::parse(&first.params).unwrap();
    assert_eq!(published, ParamStore::from_file(file.path()).unwrap());
}

#[tokio::test(start_paused = true)]
async fn set_request_with_bad_key_publishes_only_accepted_entries() {
    let mut server = server(1);
    let mut publisher = RecordingPublisher::new();
    let (tx, rx) = mpsc::unbounded();
    let entries = [("a", "1"), ("badkey", "x"), ("b", "2")];
    tx.unbounded_send(set(&entries)).unwrap();
    drop(tx);

    let stats = drive(&mut server, rx, &mut publisher, 1_000).await;

    assert_eq!(stats.sets, 1);
    assert_eq!(stats.publishes, 2);
    assert_eq!(stats.timer_ticks, 0);
    assert_eq!(server.sequence(), SequenceNumber(2));
    assert_eq!(sequences(&publisher), [1, 2]);
}

#[tokio::test(start_paused = true)]
async fn request_publishes_current_sequence_unchanged() {
    let mut server = server(1);
    let mut publisher = RecordingPublisher::new();
    let (tx, rx) = mpsc::unbounded();
    let entries = [("a", "1"), ("b", "2"), ("arm.limits.max_speed", "3.0")];
    tx.unbounded_send(set(&entries)).unwrap();
    tx.unbounded_send(ServerEvent::RequestReceived).unwrap();
    tx.unbounded_send(ServerEvent::RequestReceived).unwrap();
    drop(tx);

    let stats = drive(&mut server, rx, &mut publisher, 1_000).await;

    assert_eq!(stats.requests, 2);
    assert_eq!(sequences(&publisher), [1, 2, 3, 3, 3]);
    assert_eq!(server.sequence(), SequenceNumber(3));
}

#[tokio::test(start_paused = true)]
async fn timer_republishes_every_period_without_changing_sequence() {
    let mut server = server(1);
    let mut publisher = RecordingPublisher::new();
    let (_tx, rx) = mpsc::unbounded::<ServerEvent>();

    let stats = drive(&mut server, rx, &mut publisher, 16_000).await;

    assert_eq!(stats.timer_ticks, 3);
    assert_eq!(sequences(&publisher), [0, 0, 0]);
    let updates = publisher.updates();
    let stamps: Vec<_> = updates.iter().map(|u| u.captured_at).collect();
    assert!(stamps.is_sorted_by(|a, b| a < b));
}

#[tokio::test(start_paused = true)]
async fn no_publish_before_first_period_elapses() {
    let mut server = server(1);
    let mut publisher = RecordingPublisher::new();
    let (_tx, rx) = mpsc::unbounded::<ServerEvent>();

    let stats = drive(&mut server, rx, &mut publisher, 4_000).await;

    assert_eq!(stats, EventLoopStats::default());
    assert!(publisher.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn closed_event_stream_leaves_timer_running() {
    let mut server = server(1);
    let mut publisher = RecordingPublisher::new();
    let (tx, rx) = mpsc::unbounded::<ServerEvent>();
    drop(tx);

    let period = Duration::from_secs(1);
    let stop = shutdown_after(2_500);
    let stats = run_event_loop(&mut server, rx, &mut publisher, period, stop)
        .await
        .unwrap();

    assert_eq!(stats.timer_ticks, 2);
}

#[tokio::test]
async fn two_servers_detect_each_other_without_changing_state() {
    let mut alpha = server(1);
    let mut beta = server(2);
    let mut alpha_out = RecordingPublisher::new();
    let mut beta_out = RecordingPublisher::new();

    for _ in 0..3 {
        alpha.on_timer_tick(&mut alpha_out).await.unwrap();
        beta.on_timer_tick(&mut beta_out).await.unwrap();
    }

    for (_, update) in beta_out.take() {
        let report = alpha
            .handle(ServerEvent::UpdateReceived(update), &mut alpha_out)
            .await
            .unwrap();
        assert_eq!(report.foreign_server, Some(ServerId(2)));
        assert_eq!(report.published, 0);
    }
    for (_, update) in alpha_out.take() {
        let report = beta
            .handle(ServerEvent::UpdateReceived(update), &mut beta_out)
            .await
            .unwrap();
        assert_eq!(report.foreign_server, Some(ServerId(1)));
    }

    assert_eq!(alpha.sequence(), SequenceNumber::ZERO);
    assert_eq!(beta.sequence(), SequenceNumber::ZERO);
    assert_eq!(alpha.store(), beta.store());
    assert!(alpha_out.published().is_empty());
    assert!(beta_out.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn own_updates_echoed_back_are_ignored() {
    let mut server = server(1);
    let mut publisher = RecordingPublisher::new();
    let own = server.snapshot().unwrap();
    let (tx, rx) = mpsc::unbounded();
    let echo = ServerEvent::UpdateReceived(own);
    tx.unbounded_send(echo).unwrap();
    drop(tx);

    let stats = drive(&mut server, rx, &mut publisher, 1_000).await;

    assert_eq!(stats.updates, 1);
    assert_eq!(stats.conflicts, 0);
}

#[tokio::test]
async fn prefixed_server_publishes_on_prefixed_channel() {
    let mut server = ParameterServer::with_identity(
        ParamStore::parse(PARAMS).unwrap(),
        ChannelNames::with_prefix("robotA"),
        ServerId(1),
    );
    let mut publisher = RecordingPublisher::new();
    server.on_request_received(&mut publisher).await.unwrap();

    let (channel, _) = publisher.published().first().unwrap();
    assert_eq!(channel, "robotAPARAM_UPDATE");
}

#[tokio::test]
async fn list_entries_follow_shape_rules() {
    let mut server = server(1);
    let mut publisher = RecordingPublisher::new();
    let entries = [
        ("arm.joints", "7"),
        ("arm.joints", "[4, 5]"),
        ("arm.limits", "1"),
    ];
    let report = server.handle(set(&entries), &mut publisher).await.unwrap();

    assert_eq!(report.applied, ["arm.joints"]);
    assert_eq!(report.rejected, ["arm.joints", "arm.limits"]);
    assert_eq!(server.sequence(), SequenceNumber(1));
}
