//! End-to-end session tests over loopback UDP: a real server session on an
//! ephemeral port, raw client endpoints on the other side.

use std::time::{Duration, Instant};

use glam::Vec3;

use skirmish::entity::{Character, MatchState};
use skirmish::net::{CharacterInput, Message, UdpEndpoint};
use skirmish::{MATCH_STATE_ID, character_id};
use skirmish_server::{ServerConfig, ServerSession};

fn start_session(peer_timeout: Duration) -> ServerSession {
    let mut config = ServerConfig {
        bind_addr: "127.0.0.1".parse().unwrap(),
        port: 0,
        ..Default::default()
    };
    config.session.peer_timeout = peer_timeout;
    ServerSession::new(config).unwrap()
}

fn foot_input(tick: u32) -> Message {
    Message::CharacterInput(CharacterInput {
        tick,
        move_y: 1.0,
        ..Default::default()
    })
}

/// Run server ticks and drain the client until `pred` matches a received
/// message or the deadline passes.
fn pump_until<F>(
    session: &mut ServerSession,
    client: &mut UdpEndpoint,
    mut pred: F,
) -> Option<Message>
where
    F: FnMut(&Message) -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(500);
    while Instant::now() < deadline {
        session.process_network().unwrap();
        session.step();
        for (message, _) in client.poll().unwrap() {
            if pred(&message) {
                return Some(message);
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn first_packet_yields_welcome_and_character_snapshot() {
    let mut session = start_session(Duration::from_secs(5));
    let server_addr = session.local_addr();
    let mut client = UdpEndpoint::bind("127.0.0.1:0").unwrap();

    client.send_to(&foot_input(1), server_addr).unwrap();
    let welcome = pump_until(&mut session, &mut client, |m| {
        matches!(m, Message::Welcome { .. })
    })
    .expect("no welcome received");
    let Message::Welcome { peer_id } = welcome else {
        unreachable!()
    };
    assert_ne!(peer_id, 0);

    // The broadcast must include this peer's character under its derived ID.
    let own_id = character_id(peer_id);
    let snapshot = pump_until(&mut session, &mut client, |m| {
        matches!(m, Message::EntitySnapshots(entries)
            if entries.iter().any(|e| e.entity_id == own_id))
    });
    assert!(snapshot.is_some(), "no snapshot carried the character");
}

#[test]
fn late_reordered_input_never_reverts_server_state() {
    let mut session = start_session(Duration::from_secs(5));
    let server_addr = session.local_addr();
    let mut client = UdpEndpoint::bind("127.0.0.1:0").unwrap();

    client.send_to(&foot_input(10), server_addr).unwrap();
    let welcome = pump_until(&mut session, &mut client, |m| {
        matches!(m, Message::Welcome { .. })
    })
    .expect("no welcome received");
    let Message::Welcome { peer_id } = welcome else {
        unreachable!()
    };

    // Tick 11 is lost; 12 arrives, then the stale 10 shows up again.
    client.send_to(&foot_input(12), server_addr).unwrap();
    let own_id = character_id(peer_id);
    pump_until(&mut session, &mut client, |m| {
        matches!(m, Message::EntitySnapshots(entries)
            if entries.iter().any(|e| e.entity_id == own_id))
    })
    .expect("no snapshot after tick 12");
    client.send_to(&foot_input(10), server_addr).unwrap();

    // Every snapshot from here on must still carry input tick 12.
    let snapshot = pump_until(&mut session, &mut client, |m| {
        matches!(m, Message::EntitySnapshots(entries)
            if entries.iter().any(|e| e.entity_id == own_id))
    })
    .expect("no snapshot after the stale resend");
    let Message::EntitySnapshots(entries) = snapshot else {
        unreachable!()
    };
    let entry = entries.iter().find(|e| e.entity_id == own_id).unwrap();
    let mut proxy = skirmish::entity::Entity::Character(Character::new(own_id, Vec3::ZERO));
    proxy.apply_snapshot(&entry.data).unwrap();
    assert_eq!(proxy.as_character().unwrap().last_input_tick, 12);
}

#[test]
fn silent_peer_is_evicted_and_announced() {
    let mut session = start_session(Duration::from_millis(50));
    let server_addr = session.local_addr();
    let mut quiet = UdpEndpoint::bind("127.0.0.1:0").unwrap();
    let mut chatty = UdpEndpoint::bind("127.0.0.1:0").unwrap();

    quiet.send_to(&foot_input(1), server_addr).unwrap();
    let welcome = pump_until(&mut session, &mut quiet, |m| {
        matches!(m, Message::Welcome { .. })
    })
    .expect("quiet client got no welcome");
    let Message::Welcome { peer_id: quiet_id } = welcome else {
        unreachable!()
    };

    chatty.send_to(&foot_input(1), server_addr).unwrap();
    pump_until(&mut session, &mut chatty, |m| {
        matches!(m, Message::Welcome { .. })
    })
    .expect("chatty client got no welcome");

    // Quiet goes dark; chatty keeps the session alive and must be told both
    // that the peer left and that its character despawned.
    let quiet_character = character_id(quiet_id);
    let mut saw_remove = false;
    let mut saw_despawn = false;
    let mut keepalive_tick = 2;
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline && !(saw_remove && saw_despawn) {
        chatty
            .send_to(&foot_input(keepalive_tick), server_addr)
            .unwrap();
        keepalive_tick += 1;

        session.process_network().unwrap();
        session.step();
        for (message, _) in chatty.poll().unwrap() {
            match message {
                Message::RemovePeer { peer_id } if peer_id == quiet_id => saw_remove = true,
                Message::Despawn { entity_id } if entity_id == quiet_character => {
                    saw_despawn = true
                }
                _ => {}
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(saw_remove, "eviction was never announced");
    assert!(saw_despawn, "evicted character was never despawned");
    assert!(session.peers().get(quiet_id).is_none());
}

#[test]
fn late_joiner_receives_already_flushed_match_state() {
    let mut config = ServerConfig {
        bind_addr: "127.0.0.1".parse().unwrap(),
        port: 0,
        mode_name: "koth".into(),
        ..Default::default()
    };
    // Disable the periodic refresh so only the admission path can deliver the
    // already-flushed mode name.
    config.session.full_snapshot_interval = 0;
    let mut session = ServerSession::new(config).unwrap();
    let server_addr = session.local_addr();

    // Applies every match-state entry in `message` to `proxy`.
    fn absorb_match_state(proxy: &mut MatchState, message: &Message) -> bool {
        let Message::EntitySnapshots(entries) = message else {
            return false;
        };
        let mut applied = false;
        for entry in entries.iter().filter(|e| e.entity_id == MATCH_STATE_ID) {
            proxy
                .apply_snapshot(&mut skirmish::net::ByteReader::new(&entry.data))
                .unwrap();
            applied = true;
        }
        applied
    }

    // First client joins and drains until the mode name is flushed to it.
    let mut first = UdpEndpoint::bind("127.0.0.1:0").unwrap();
    let mut first_view = MatchState::default();
    first.send_to(&foot_input(1), server_addr).unwrap();
    pump_until(&mut session, &mut first, |m| {
        absorb_match_state(&mut first_view, m)
    })
    .expect("first client saw no match state");
    assert_eq!(first_view.mode_name(), "koth");

    // The mode name is now clean server-side. A second client joining after
    // that flush must still learn it.
    let mut second = UdpEndpoint::bind("127.0.0.1:0").unwrap();
    let mut second_view = MatchState::default();
    second.send_to(&foot_input(1), server_addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(500);
    while Instant::now() < deadline && second_view.mode_name() != "koth" {
        session.process_network().unwrap();
        session.step();
        for (message, _) in second.poll().unwrap() {
            absorb_match_state(&mut second_view, &message);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(second_view.mode_name(), "koth");
}

#[test]
fn scoreboard_is_broadcast_periodically() {
    let mut session = start_session(Duration::from_secs(5));
    let server_addr = session.local_addr();
    let mut client = UdpEndpoint::bind("127.0.0.1:0").unwrap();

    client.send_to(&foot_input(1), server_addr).unwrap();
    let scoreboard = pump_until(&mut session, &mut client, |m| {
        matches!(m, Message::Scoreboard(_))
    })
    .expect("no scoreboard within the window");
    let Message::Scoreboard(rows) = scoreboard else {
        unreachable!()
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kills, 0);
}

#[test]
fn unknown_sender_count_is_bounded_by_max_peers() {
    let mut config = ServerConfig {
        bind_addr: "127.0.0.1".parse().unwrap(),
        port: 0,
        max_peers: 2,
        ..Default::default()
    };
    config.session.peer_timeout = Duration::from_secs(5);
    let mut session = ServerSession::new(config).unwrap();
    let server_addr = session.local_addr();

    let mut clients: Vec<UdpEndpoint> = (0..3)
        .map(|_| UdpEndpoint::bind("127.0.0.1:0").unwrap())
        .collect();
    for client in &mut clients {
        client.send_to(&foot_input(1), server_addr).unwrap();
    }

    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        session.process_network().unwrap();
        session.step();
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(session.peers().len(), 2);
}
