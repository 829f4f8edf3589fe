//! End-to-end tests of the publish loop: link, session, sampler and
//! scheduler wired to mock adapters, driven tick by tick.

use crate::mock_hw::{MockBroker, MockClock, MockLink, MockSensors, RecordingSink};

use envnode::app::events::AppEvent;
use envnode::app::link::LinkState;
use envnode::app::ports::{Clock, QoS};
use envnode::app::session::SessionState;
use envnode::config::NodeConfig;
use envnode::error::{ConnectReturnCode, SensorError, SessionError};
use envnode::scheduler::{PublishScheduler, TickOutcome};

const READING: &str = "iot/env/room1/reading";
const STATUS: &str = "iot/env/room1/reading/status";

type Node = PublishScheduler<MockLink, MockBroker, MockSensors, MockClock>;

fn node_at(now: u32) -> Node {
    node_with(MockLink::reachable(), MockBroker::default(), now)
}

fn node_with(link: MockLink, broker: MockBroker, now: u32) -> Node {
    PublishScheduler::new(
        &NodeConfig::default(),
        "esp32-envnode-01-EFBEADDE",
        link,
        broker,
        MockSensors::default(),
        MockClock::at(now),
    )
}

/// Tick, then yield `step_ms`, until `duration_ms` of clock time has passed.
/// Returns the clock value at every published tick.
fn run(node: &mut Node, sink: &mut RecordingSink, duration_ms: u32, step_ms: u32) -> Vec<u32> {
    let start = node.clock().now_ms();
    let mut published = Vec::new();
    while node.clock().now_ms().wrapping_sub(start) <= duration_ms {
        let now = node.clock().now_ms();
        if node.tick(sink) == TickOutcome::Published {
            published.push(now);
        }
        node.clock_mut().delay_ms(step_ms);
    }
    published
}

fn broker(node: &Node) -> &MockBroker {
    node.session().transport()
}

// ── Cadence ───────────────────────────────────────────────────

#[test]
fn first_publish_one_interval_after_start() {
    let mut node = node_at(0);
    let mut sink = RecordingSink::default();
    let published = run(&mut node, &mut sink, 10_000, 10);

    assert_eq!(published, vec![2_000, 4_000, 6_000, 8_000, 10_000]);
    assert_eq!(node.stats().published, 5);
}

#[test]
fn cadence_survives_clock_wraparound() {
    let start = u32::MAX - 3_000;
    let mut node = node_at(start);
    let mut sink = RecordingSink::default();
    let published = run(&mut node, &mut sink, 10_000, 10);

    assert_eq!(published.len(), 5);
    for pair in published.windows(2) {
        let gap = pair[1].wrapping_sub(pair[0]);
        assert!((2_000..2_010).contains(&gap), "gap {gap} ms");
    }
    // Second reading lands after the wrap.
    assert!(published[1] < start);
}

// ── Presence ──────────────────────────────────────────────────

#[test]
fn online_precedes_readings_and_will_is_registered() {
    let mut node = node_at(0);
    let mut sink = RecordingSink::default();
    run(&mut node, &mut sink, 4_000, 10);

    let b = broker(&node);
    assert_eq!(b.last_client_id, "esp32-envnode-01-EFBEADDE");
    assert_eq!(b.last_username, None);
    let will = b.will.as_ref().unwrap();
    assert_eq!(will.topic, STATUS);
    assert_eq!(will.payload, b"offline");
    assert_eq!(will.qos, QoS::AtLeastOnce);
    assert!(will.retain);

    let first = &b.log[0];
    assert_eq!(first.topic, STATUS);
    assert_eq!(first.payload, b"online");
    assert_eq!(first.qos, QoS::AtLeastOnce);
    assert!(first.retain);

    let readings = b.on_topic(READING);
    assert_eq!(readings.len(), 2);
    assert!(readings.iter().all(|m| m.qos == QoS::AtMostOnce && !m.retain));
    assert_eq!(b.on_topic(STATUS).len(), 1);
}

#[test]
fn unclean_drop_leaves_offline_then_reconnect_reannounces() {
    let mut node = node_at(0);
    let mut sink = RecordingSink::default();
    run(&mut node, &mut sink, 2_000, 10);
    assert_eq!(broker(&node).on_topic(READING).len(), 1);

    node.session_mut().transport_mut().drop_unclean();
    assert_eq!(broker(&node).retained.get(STATUS).map(Vec::as_slice), Some(&b"offline"[..]));

    run(&mut node, &mut sink, 2_000, 10);

    let b = broker(&node);
    assert_eq!(b.connects, 2);
    assert_eq!(b.retained.get(STATUS).map(Vec::as_slice), Some(&b"online"[..]));

    // Per session: exactly one "online", and it precedes that session's readings.
    let status: Vec<_> = b.on_topic(STATUS).iter().map(|m| m.payload.clone()).collect();
    assert_eq!(status, vec![b"online".to_vec(), b"offline".to_vec(), b"online".to_vec()]);
    let second_online = b
        .log
        .iter()
        .rposition(|m| m.topic == STATUS && m.payload == b"online")
        .unwrap();
    let offline = b.log.iter().position(|m| m.payload == b"offline").unwrap();
    assert!(b.log[offline..second_online].iter().all(|m| m.topic != READING));
    assert_eq!(b.log.last().unwrap().topic, READING);

    assert_eq!(node.stats().sessions_established, 2);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SessionEstablished { .. })), 2);
}

#[test]
fn transport_side_reconnect_reannounces_before_next_reading() {
    let mut node = node_at(0);
    let mut sink = RecordingSink::default();
    run(&mut node, &mut sink, 2_000, 10);

    let b = node.session_mut().transport_mut();
    b.drop_unclean();
    b.reconnect_on_its_own();

    run(&mut node, &mut sink, 2_000, 10);

    let b = broker(&node);
    assert_eq!(b.connects, 1);
    assert_eq!(b.retained.get(STATUS).map(Vec::as_slice), Some(&b"online"[..]));
    let offline = b.log.iter().position(|m| m.payload == b"offline").unwrap();
    let next = &b.log[offline + 1];
    assert_eq!((next.topic.as_str(), next.payload.as_slice()), (STATUS, &b"online"[..]));
    assert_eq!(b.log.last().unwrap().topic, READING);
    assert_eq!(node.stats().sessions_established, 2);
}

#[test]
fn readings_wait_for_presence_announcement() {
    let mut node = node_at(0);
    let mut sink = RecordingSink::default();
    node.session_mut().transport_mut().fail_publishes = 1_000;

    node.tick(&mut sink);
    assert_eq!(node.session().state(), SessionState::Connected);
    assert!(node.session().presence_pending());

    node.clock_mut().delay_ms(2_000);
    assert_eq!(node.tick(&mut sink), TickOutcome::Dropped);
    assert!(sink.events.contains(&AppEvent::PublishFailed {
        seq: 1,
        reason: SessionError::PresencePending,
    }));
    assert!(broker(&node).log.is_empty());

    node.session_mut().transport_mut().fail_publishes = 0;
    node.clock_mut().delay_ms(2_000);
    assert_eq!(node.tick(&mut sink), TickOutcome::Published);

    let topics: Vec<_> = broker(&node).log.iter().map(|m| m.topic.as_str()).collect();
    assert_eq!(topics, vec![STATUS, READING]);
}

// ── Failure handling ──────────────────────────────────────────

#[test]
fn refused_session_is_bounded_and_readings_are_not_queued() {
    let b = MockBroker {
        refuse_next: u32::MAX,
        refuse_with: Some(ConnectReturnCode::NotAuthorized),
        ..MockBroker::default()
    };
    let mut node = node_with(MockLink::reachable(), b, 0);
    let mut sink = RecordingSink::default();

    // Three attempts, two 1 s gaps, no trailing delay. The retries carry
    // the clock to the interval boundary, so the sample is dropped.
    assert_eq!(node.tick(&mut sink), TickOutcome::Dropped);
    assert_eq!(broker(&node).connects, 3);
    assert_eq!(node.clock().slept, 2_000);
    assert_eq!(node.session().state(), SessionState::Disconnected);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::PublishFailed {
            reason: SessionError::NotConnected,
            ..
        }
    )));

    node.session_mut().transport_mut().refuse_next = 0;
    node.clock_mut().delay_ms(2_000);
    assert_eq!(node.tick(&mut sink), TickOutcome::Published);

    let b = broker(&node);
    assert_eq!(b.on_topic(READING).len(), 1);
    assert_eq!(node.stats().publish_failures, 1);
}

#[test]
fn no_session_attempt_while_link_down() {
    let mut node = node_with(MockLink::out_of_range(), MockBroker::default(), 0);
    let mut sink = RecordingSink::default();

    node.tick(&mut sink);
    assert_eq!(node.link().state(), LinkState::Disconnected);
    assert_eq!(node.clock().slept, 20_000);
    assert_eq!(broker(&node).connects, 0);

    node.link_mut().driver_mut().reachable = true;
    node.tick(&mut sink);
    assert_eq!(node.link().state(), LinkState::Connected);
    assert_eq!(node.session().state(), SessionState::Connected);
    assert!(sink.events.contains(&AppEvent::LinkChanged {
        from: LinkState::Disconnected,
        to: LinkState::Connected,
    }));
    assert!(sink.events.contains(&AppEvent::SessionChanged {
        from: SessionState::Disconnected,
        to: SessionState::Connected,
    }));
}

// ── Payload ───────────────────────────────────────────────────

#[test]
fn climate_fault_omits_both_climate_keys() {
    let mut node = node_at(0);
    let mut sink = RecordingSink::default();
    node.sampler_mut().sensors_mut().climate = Err(SensorError::Checksum);
    node.sampler_mut().sensors_mut().motion = true;
    run(&mut node, &mut sink, 2_000, 10);

    let msg = broker(&node).on_topic(READING)[0].clone();
    let json: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
    let obj = json.as_object().unwrap();
    assert!(!obj.contains_key("temperature_c"));
    assert!(!obj.contains_key("humidity_pct"));
    assert_eq!(obj["motion"], true);
    assert_eq!(obj["node_id"], "esp32-envnode-01");
    assert_eq!(obj["rssi_dbm"], -58);

    assert_eq!(node.stats().sensor_faults, 1);
    assert!(sink.events.contains(&AppEvent::SensorFault(SensorError::Checksum)));
}

#[test]
fn full_reading_fields() {
    let mut node = node_at(0);
    let mut sink = RecordingSink::default();
    node.sampler_mut().sensors_mut().soil_raw = 1_200;
    run(&mut node, &mut sink, 2_000, 10);

    let msg = broker(&node).on_topic(READING)[0].clone();
    let json: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
    assert_eq!(json["temperature_c"], 22.5);
    assert_eq!(json["humidity_pct"], 41.0);
    assert_eq!(json["soil_moisture_pct"], 100.0);
    assert_eq!(json["firmware"], "esp32-fw-0.1.0");
}
