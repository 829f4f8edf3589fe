//! Session manager against the mock broker: connect options, command
//! routing, and the blocking bounds of a reconnect pass.

use crate::mock_hw::{MockBroker, MockClock};

use envnode::app::ports::InboundHandler;
use envnode::app::session::{SessionManager, SessionSettings, SessionState};
use envnode::config::NodeConfig;
use envnode::error::{ConnectReturnCode, SessionError};

#[derive(Default)]
struct Commands {
    seen: Vec<(String, Vec<u8>)>,
}

impl InboundHandler for Commands {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self.seen.push((topic.into(), payload.to_vec()));
    }
}

fn config_with_credentials() -> NodeConfig {
    NodeConfig::default()
        .with_overrides(|k| match k {
            "ENVNODE_MQTT_USER" => Some("envnode"),
            "ENVNODE_MQTT_PASS" => Some("s3cret"),
            "ENVNODE_BASE_TOPIC" => Some("iot/env/lab/reading"),
            _ => None,
        })
        .unwrap()
}

#[test]
fn credentials_and_keep_alive_reach_the_broker() {
    let config = config_with_credentials();
    let settings = SessionSettings::from_config(&config, "lab-1");
    let mut s = SessionManager::new(MockBroker::default(), settings);
    let mut clock = MockClock::at(0);

    s.ensure_connected(true, 3, 1_000, &mut clock).unwrap();

    let b = s.transport();
    assert_eq!(b.last_client_id, "lab-1");
    assert_eq!(b.last_username.as_deref(), Some("envnode"));
    assert_eq!(b.last_keep_alive_secs, 15);
    assert_eq!(b.will.as_ref().unwrap().topic, "iot/env/lab/reading/status");
    assert_eq!(clock.slept, 0);
}

#[test]
fn commands_are_subscribed_per_session_and_routed() {
    let mut config = NodeConfig::default();
    config.subscribe_commands = true;
    let settings = SessionSettings::from_config(&config, "node");
    let mut s = SessionManager::with_handler(MockBroker::default(), settings, Commands::default());
    let mut clock = MockClock::at(0);

    s.ensure_connected(true, 1, 0, &mut clock).unwrap();
    s.transport_mut()
        .inbox
        .push_back(("iot/env/room1/reading/cmd".into(), b"{\"op\":\"noop\"}".to_vec()));
    s.service();
    assert_eq!(s.handler().seen.len(), 1);
    assert_eq!(s.handler().seen[0].1, b"{\"op\":\"noop\"}");

    s.transport_mut().drop_unclean();
    s.ensure_connected(true, 1, 0, &mut clock).unwrap();
    assert_eq!(
        s.transport().subscriptions,
        vec!["iot/env/room1/reading/cmd".to_string(); 2]
    );
}

#[test]
fn single_attempt_has_no_delay() {
    let broker = MockBroker {
        refuse_next: 1,
        refuse_with: Some(ConnectReturnCode::BadCredentials),
        ..MockBroker::default()
    };
    let settings = SessionSettings::from_config(&NodeConfig::default(), "node");
    let mut s = SessionManager::new(broker, settings);
    let mut clock = MockClock::at(0);

    assert_eq!(
        s.ensure_connected(true, 1, 5_000, &mut clock),
        Err(SessionError::Refused(ConnectReturnCode::BadCredentials))
    );
    assert_eq!(clock.slept, 0);
    assert_eq!(s.state(), SessionState::Disconnected);
}

#[test]
fn adopts_transport_that_reconnected_on_its_own() {
    let settings = SessionSettings::from_config(&NodeConfig::default(), "node");
    let mut s = SessionManager::new(MockBroker::default(), settings);
    let mut clock = MockClock::at(0);
    s.ensure_connected(true, 3, 1_000, &mut clock).unwrap();

    // Transport flaps down and back up between two ticks.
    s.transport_mut().connected = false;
    s.service();
    assert_eq!(s.state(), SessionState::Disconnected);
    s.transport_mut().connected = true;

    s.ensure_connected(true, 3, 1_000, &mut clock).unwrap();
    assert_eq!(s.transport().connects, 1);
    assert_eq!(s.sessions_established(), 2);
    let onlines = s.transport().log.iter().filter(|m| m.payload == b"online").count();
    assert_eq!(onlines, 2);
}

#[test]
fn unseen_drop_and_reconnect_reannounces_presence() {
    let settings = SessionSettings::from_config(&NodeConfig::default(), "node");
    let mut s = SessionManager::new(MockBroker::default(), settings);
    let mut clock = MockClock::at(0);
    s.ensure_connected(true, 3, 1_000, &mut clock).unwrap();

    // Will fires and the transport is back before the manager looks again.
    s.transport_mut().drop_unclean();
    s.transport_mut().reconnect_on_its_own();
    assert_eq!(
        s.transport().retained.get("iot/env/room1/reading/status").map(Vec::as_slice),
        Some(&b"offline"[..])
    );

    s.ensure_connected(true, 3, 1_000, &mut clock).unwrap();
    s.service();

    let b = s.transport();
    assert_eq!(b.connects, 1);
    assert_eq!(
        b.retained.get("iot/env/room1/reading/status").map(Vec::as_slice),
        Some(&b"online"[..])
    );
    let status: Vec<_> = b.log.iter().map(|m| m.payload.clone()).collect();
    assert_eq!(status, vec![b"online".to_vec(), b"offline".to_vec(), b"online".to_vec()]);
    assert_eq!(s.sessions_established(), 2);
}
