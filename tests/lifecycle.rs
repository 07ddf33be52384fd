mod support;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use task_stream::{ConnectionState, StreamClient, StreamConfig, StreamError};
use tokio::time::sleep;

use support::{client, fast_config, Recorder, ScriptedQuery, ScriptedTransport};

#[tokio::test(start_paused = true)]
async fn start_twice_is_rejected_without_side_effects() {
    let transport = ScriptedTransport::default();
    let _connection = transport.accept();
    let query = ScriptedQuery::default();
    let mut client = client(fast_config(), &transport, &query);
    let mut recorder = Recorder::attach(&client);

    client.start().expect("first start should succeed");
    assert_eq!(client.state(), ConnectionState::Connecting);

    assert_matches!(
        client.start(),
        Err(StreamError::InvalidState {
            operation: "start",
            state: ConnectionState::Connecting,
        })
    );

    recorder.wait_for_state(ConnectionState::Connected).await;
    assert_eq!(transport.open_count(), 1);

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected_at_start() {
    let transport = ScriptedTransport::default();
    let query = ScriptedQuery::default();
    let mut client = client(StreamConfig::default().with_batch_size(0), &transport, &query);

    assert_matches!(client.start(), Err(StreamError::InvalidConfig(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_discards_in_flight_recovery() {
    let transport = ScriptedTransport::default();
    let connection = transport.accept();
    let query = ScriptedQuery::with_history(1..=10);
    let release = query.gate();
    let mut client = client(fast_config(), &transport, &query);
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    connection.events(&[1, 3]);
    assert_eq!(recorder.next_events(2).await, vec![1, 3]);
    assert_eq!(query.calls(), vec![(1, 1)]);

    client.stop().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(
        recorder.drain_states().last(),
        Some(&(ConnectionState::Disconnected, ConnectionState::Connected))
    );

    let _ = release.send(());
    connection.event(4);
    sleep(Duration::from_secs(5)).await;

    assert!(recorder.is_quiet());
    assert_eq!(client.stats().gaps_recovered, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_reconnect() {
    let transport = ScriptedTransport::default();
    let query = ScriptedQuery::default();
    let mut client = client(
        fast_config()
            .with_reconnect_delay(Duration::from_secs(10))
            .with_max_reconnect_delay(Duration::from_secs(60)),
        &transport,
        &query,
    );
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    recorder.wait_for_state(ConnectionState::Reconnecting).await;

    client.stop().await;
    recorder.drain_states();

    sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.open_count(), 1);
    assert!(recorder.is_quiet());
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_allows_a_fresh_session() {
    let transport = ScriptedTransport::default();
    let first = transport.accept();
    let second = transport.accept();
    let query = ScriptedQuery::default();
    let mut client = client(fast_config(), &transport, &query);
    let mut recorder = Recorder::attach(&client);

    client.stop().await;
    assert!(recorder.is_quiet());

    client.start().expect("client should start");
    first.events(&[1, 2]);
    assert_eq!(recorder.next_events(2).await, vec![1, 2]);

    client.stop().await;
    client.stop().await;
    assert!(!client.is_running());
    assert_eq!(
        recorder
            .drain_states()
            .iter()
            .filter(|(current, _)| *current == ConnectionState::Disconnected)
            .count(),
        1
    );

    client.start().expect("client should restart after stop");
    second.event(1);
    assert_eq!(recorder.next_events(1).await, vec![1]);
    assert_eq!(transport.requests()[1].since_seq, 0);

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn error_state_must_be_stopped_before_restarting() {
    let transport = ScriptedTransport::default();
    let query = ScriptedQuery::default();
    let mut client = client(
        fast_config().with_max_reconnect_attempts(0),
        &transport,
        &query,
    );
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    recorder.wait_for_state(ConnectionState::Error).await;

    assert_matches!(
        client.start(),
        Err(StreamError::InvalidState {
            state: ConnectionState::Error,
            ..
        })
    );

    client.stop().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn start_outside_a_runtime_is_rejected() {
    let transport = ScriptedTransport::default();
    let query = ScriptedQuery::default();
    let mut client = StreamClient::new(
        "task-1",
        StreamConfig::default(),
        Arc::new(transport.clone()),
        Arc::new(query),
    );

    assert_matches!(client.start(), Err(StreamError::Runtime(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(transport.open_count(), 0);
}
