mod support;

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use task_stream::{ConnectionState, StreamError};
use tokio::time::{sleep, Instant};

use support::{client, fast_config, Recorder, ScriptedQuery, ScriptedTransport};

fn assert_spacing(opened_at: &[Instant], expected_ms: &[u64]) {
    let spacing: Vec<Duration> = opened_at
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect();
    assert_eq!(spacing.len(), expected_ms.len(), "unexpected open count");

    for (actual, expected) in spacing.iter().zip(expected_ms) {
        let expected = Duration::from_millis(*expected);
        assert!(
            *actual >= expected && *actual < expected + Duration::from_millis(10),
            "reconnect waited {actual:?}, expected {expected:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_end_in_a_single_error_transition() {
    let transport = ScriptedTransport::default();
    for _ in 0..4 {
        transport.refuse("executor unavailable");
    }
    let query = ScriptedQuery::default();
    let mut client = client(
        fast_config().with_max_reconnect_attempts(3),
        &transport,
        &query,
    );
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    let states = recorder.wait_for_state(ConnectionState::Error).await;

    assert_eq!(transport.open_count(), 4);
    assert_spacing(&transport.opened_at(), &[100, 200, 400]);
    assert_eq!(
        states
            .iter()
            .filter(|(current, _)| *current == ConnectionState::Reconnecting)
            .count(),
        3
    );
    assert_eq!(
        states.last(),
        Some(&(ConnectionState::Error, ConnectionState::Connecting))
    );
    assert_matches!(
        recorder.next_error().await,
        StreamError::ReconnectExhausted { attempts: 3, .. }
    );
    assert_eq!(client.stats().reconnects, 3);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.open_count(), 4);
    assert_eq!(client.state(), ConnectionState::Error);
    assert!(recorder.drain_states().is_empty());

    client.stop().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn backoff_is_capped_at_max_delay() {
    let transport = ScriptedTransport::default();
    for _ in 0..7 {
        transport.refuse("executor unavailable");
    }
    let query = ScriptedQuery::default();
    let mut client = client(
        fast_config()
            .with_max_reconnect_attempts(6)
            .with_max_reconnect_delay(Duration::from_millis(500)),
        &transport,
        &query,
    );
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    recorder.wait_for_state(ConnectionState::Error).await;

    assert_spacing(&transport.opened_at(), &[100, 200, 400, 500, 500, 500]);

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn successful_reconnect_resets_backoff_and_resumes_from_last_seq() {
    let transport = ScriptedTransport::default();
    let first = transport.accept();
    transport.refuse("blip");
    let second = transport.accept();
    let third = transport.accept();
    let query = ScriptedQuery::default();
    let mut client = client(fast_config(), &transport, &query);
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    first.events(&[1, 2]);
    assert_eq!(recorder.next_events(2).await, vec![1, 2]);
    first.fail("connection reset by peer");

    recorder.wait_for_state(ConnectionState::Connected).await;
    recorder.wait_for_state(ConnectionState::Connected).await;
    second.events(&[2, 3]);
    assert_eq!(recorder.next_events(1).await, vec![3]);
    second.close();

    recorder.wait_for_state(ConnectionState::Connected).await;
    third.event(4);
    assert_eq!(recorder.next_events(1).await, vec![4]);

    assert_spacing(&transport.opened_at(), &[100, 200, 100]);
    let resume_points: Vec<u64> = transport
        .requests()
        .iter()
        .map(|request| request.since_seq)
        .collect();
    assert_eq!(resume_points, vec![0, 2, 2, 3]);
    assert_eq!(client.stats().reconnects, 3);
    assert_eq!(client.stats().errors, 0);

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn disabled_auto_reconnect_errors_on_first_drop() {
    let transport = ScriptedTransport::default();
    let connection = transport.accept();
    let query = ScriptedQuery::default();
    let mut client = client(fast_config().with_auto_reconnect(false), &transport, &query);
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    recorder.wait_for_state(ConnectionState::Connected).await;
    connection.close();

    assert_eq!(
        recorder.wait_for_state(ConnectionState::Error).await,
        vec![(ConnectionState::Error, ConnectionState::Connected)]
    );
    assert_matches!(recorder.next_error().await, StreamError::Transport(_));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), 1);

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn server_requested_reconnect_resumes_without_backoff() {
    let transport = ScriptedTransport::default();
    let first = transport.accept();
    let second = transport.accept();
    let query = ScriptedQuery::default();
    let mut client = client(fast_config(), &transport, &query);
    let mut recorder = Recorder::attach(&client);

    client.start().expect("client should start");
    first.events(&[1, 2, 3]);
    first.raw(r#"{"type":"reconnect","reason":"rolling deploy","last_seq":2}"#);
    second.events(&[3, 4]);

    assert_eq!(recorder.next_events(4).await, vec![1, 2, 3, 4]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].since_seq, 2);
    assert_spacing(&transport.opened_at(), &[0]);

    let stats = client.stats();
    assert_eq!(stats.reconnects, 1);
    assert_eq!(stats.duplicates_dropped, 1);

    client.stop().await;
}
