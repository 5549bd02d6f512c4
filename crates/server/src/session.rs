use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use glam::{Quat, Vec3};

use skirmish::entity::{Character, CharacterFlags, Entity, MatchPhase, MatchState, Vehicle};
use skirmish::net::{ByteWriter, MAX_PACKET_SIZE, Message, ScoreRow, SnapshotEntry, UdpEndpoint};
use skirmish::{FixedTimestep, MATCH_STATE_ID, Registry, character_id, vehicle_id};

use crate::config::ServerConfig;
use crate::peer::{Control, Peer, PeerTable};

/// The authoritative session: one UDP endpoint, one entity registry, one
/// fixed-rate tick loop.
pub struct ServerSession {
    endpoint: UdpEndpoint,
    peers: PeerTable,
    registry: Registry,
    timestep: FixedTimestep,
    tick: u32,
    config: ServerConfig,
}

impl ServerSession {
    pub fn new(config: ServerConfig) -> io::Result<Self> {
        let endpoint = UdpEndpoint::bind((config.bind_addr, config.port))?;
        let timestep = FixedTimestep::new(config.session.tick_rate);

        let mut registry = Registry::new();
        registry.insert(Entity::Match(MatchState::new(
            &config.mode_name,
            config.round_seconds,
        )));
        for index in 0..config.vehicle_count {
            let spawn = Vec3::new(-12.0 + 8.0 * index as f32, 0.0, 15.0);
            registry.insert(Entity::Vehicle(Vehicle::new(
                vehicle_id(index),
                spawn,
                Quat::IDENTITY,
            )));
        }

        log::info!(
            "session up on {} ({} Hz, {} vehicles)",
            endpoint.local_addr(),
            config.session.tick_rate,
            config.vehicle_count
        );

        Ok(Self {
            endpoint,
            peers: PeerTable::new(),
            registry,
            timestep,
            tick: 0,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn run(&mut self) -> io::Result<()> {
        let mut last = Instant::now();
        loop {
            let now = Instant::now();
            self.timestep.accumulate((now - last).as_secs_f32());
            last = now;

            self.process_network()?;
            while self.timestep.consume_tick() {
                self.step();
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Drain every queued datagram. There is no handshake message; the first
    /// decodable datagram from a new address is the handshake.
    pub fn process_network(&mut self) -> io::Result<()> {
        for (message, addr) in self.endpoint.poll()? {
            self.handle_message(message, addr);
        }
        Ok(())
    }

    fn handle_message(&mut self, message: Message, addr: SocketAddr) {
        if !self.peers.contains_addr(&addr) {
            if self.peers.len() >= self.config.max_peers {
                log::warn!("rejecting {addr}: session full ({} peers)", self.peers.len());
                return;
            }
            self.admit_peer(addr);
        }

        let Some(peer) = self.peers.get_by_addr_mut(&addr) else {
            return;
        };
        peer.touch();

        match message {
            Message::CharacterInput(input) => {
                peer.accept_character_input(input);
            }
            Message::VehicleInput(input) => {
                // Input only steers the vehicle this peer actually occupies.
                let driving = matches!(peer.control, Control::Driving(id) if id == input.vehicle_id);
                if driving {
                    peer.accept_vehicle_input(input);
                } else {
                    log::debug!(
                        "peer {} sent input for vehicle {:#x} it does not drive",
                        peer.peer_id,
                        input.vehicle_id
                    );
                }
            }
            // Server-bound traffic is inputs only; anything else from a
            // client still counts as liveness but carries no state.
            _ => {}
        }
    }

    fn admit_peer(&mut self, addr: SocketAddr) {
        let peer_id = self.peers.insert(addr).peer_id;
        let entity_id = character_id(peer_id);
        self.registry.insert(Entity::Character(Character::new(
            entity_id,
            Self::character_spawn(peer_id),
        )));

        if let Err(err) = self.endpoint.send_to(&Message::Welcome { peer_id }, addr) {
            log::warn!("welcome to {addr} failed: {err}");
        }
        log::info!("peer {peer_id} joined from {addr}, character {entity_id:#x}");

        // The send caches are shared across receivers, so on-change state that
        // was flushed before this peer existed would otherwise never reach it.
        // Force the next broadcast to carry the full world.
        self.registry.mark_all_dirty();

        if self.peers.len() == 1 {
            if let Some(state) = self
                .registry
                .get_mut(MATCH_STATE_ID)
                .and_then(Entity::as_match_mut)
            {
                state.set_phase(MatchPhase::Active);
            }
        }
    }

    fn character_spawn(peer_id: u32) -> Vec3 {
        // Spread joiners along a line so they do not stack.
        Vec3::new(((peer_id % 8) as f32) * 3.0 - 12.0, 0.0, 0.0)
    }

    /// One authoritative tick. Order matters: inputs are applied before
    /// simulation, removals commit before the broadcast that announces them,
    /// and the snapshot batch is always the last word of the tick.
    pub fn step(&mut self) {
        self.tick += 1;
        let dt = self.timestep.dt();

        for peer_id in self.peers.ids() {
            self.step_peer(peer_id, dt);
        }

        for (_, entity) in self.registry.iter_mut() {
            if let Some(vehicle) = entity.as_vehicle_mut() {
                if vehicle.occupant().is_none() {
                    vehicle.simulate_idle(&self.config.vehicle, dt);
                }
            }
        }
        if let Some(state) = self
            .registry
            .get_mut(MATCH_STATE_ID)
            .and_then(Entity::as_match_mut)
        {
            state.tick(dt);
        }

        self.evict_idle_peers();

        for entity_id in self.registry.commit_removals() {
            self.broadcast(&Message::Despawn { entity_id });
        }

        let refresh = self.config.session.full_snapshot_interval;
        if refresh != 0 && self.tick % refresh == 0 {
            self.registry.mark_all_dirty();
        }

        self.broadcast_snapshots();

        let scoreboard = self.config.session.scoreboard_interval;
        if scoreboard != 0 && self.tick % scoreboard == 0 {
            self.broadcast_scoreboard();
        }
    }

    fn step_peer(&mut self, peer_id: u32, dt: f32) {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return;
        };
        let interact = peer.take_interact_edge();
        let control = peer.control;

        match control {
            Control::OnFoot => {
                let input = *peer.character_input();
                if let Some(character) = self
                    .registry
                    .get_mut(character_id(peer_id))
                    .and_then(Entity::as_character_mut)
                {
                    character.simulate(&input, &self.config.character, dt);
                }
                if interact {
                    self.try_enter_vehicle(peer_id);
                }
            }
            Control::Driving(vehicle_id) => {
                if interact {
                    self.exit_vehicle(peer_id, vehicle_id);
                    return;
                }
                let input = *peer.vehicle_input();
                if let Some(vehicle) = self
                    .registry
                    .get_mut(vehicle_id)
                    .and_then(Entity::as_vehicle_mut)
                {
                    vehicle.simulate(&input, &self.config.vehicle, dt);
                }
            }
        }
    }

    /// Board the nearest unoccupied vehicle in range. Occupancy, the hidden
    /// flag and the control target all flip in the same tick, so no snapshot
    /// shows the handoff half-done.
    fn try_enter_vehicle(&mut self, peer_id: u32) {
        let Some(position) = self
            .registry
            .get(character_id(peer_id))
            .and_then(Entity::as_character)
            .map(Character::position)
        else {
            return;
        };

        let mut nearest: Option<(u32, f32)> = None;
        for (entity_id, entity) in self.registry.iter() {
            let Some(vehicle) = entity.as_vehicle() else {
                continue;
            };
            if vehicle.occupant().is_some() {
                continue;
            }
            let distance = vehicle.position().distance(position);
            if distance <= self.config.vehicle.enter_radius
                && nearest.is_none_or(|(_, best)| distance < best)
            {
                nearest = Some((entity_id, distance));
            }
        }
        let Some((vehicle_id, _)) = nearest else {
            return;
        };

        if let Some(vehicle) = self
            .registry
            .get_mut(vehicle_id)
            .and_then(Entity::as_vehicle_mut)
        {
            vehicle.set_occupant(Some(peer_id));
        }
        if let Some(character) = self
            .registry
            .get_mut(character_id(peer_id))
            .and_then(Entity::as_character_mut)
        {
            character.set_flag(CharacterFlags::IN_VEHICLE, true);
            character.set_velocity(Vec3::ZERO);
        }
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.control = Control::Driving(vehicle_id);
        }
        log::info!("peer {peer_id} entered vehicle {vehicle_id:#x}");
    }

    fn exit_vehicle(&mut self, peer_id: u32, vehicle_id: u32) {
        let exit_position = self
            .registry
            .get(vehicle_id)
            .and_then(Entity::as_vehicle)
            .map(|v| {
                let mut p = v.position() + v.rotation() * Vec3::X * 2.0;
                p.y = 0.0;
                p
            });

        if let Some(vehicle) = self
            .registry
            .get_mut(vehicle_id)
            .and_then(Entity::as_vehicle_mut)
        {
            vehicle.set_occupant(None);
        }
        if let Some(character) = self
            .registry
            .get_mut(character_id(peer_id))
            .and_then(Entity::as_character_mut)
        {
            character.set_flag(CharacterFlags::IN_VEHICLE, false);
            character.set_velocity(Vec3::ZERO);
            if let Some(position) = exit_position {
                character.set_position(position);
            }
        }
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.control = Control::OnFoot;
        }
        log::info!("peer {peer_id} exited vehicle {vehicle_id:#x}");
    }

    fn evict_idle_peers(&mut self) {
        let evicted: Vec<Peer> = self
            .peers
            .evict_timed_out(self.config.session.peer_timeout);

        for peer in evicted {
            if let Control::Driving(vehicle_id) = peer.control {
                if let Some(vehicle) = self
                    .registry
                    .get_mut(vehicle_id)
                    .and_then(Entity::as_vehicle_mut)
                {
                    vehicle.set_occupant(None);
                }
            }
            self.registry.despawn(character_id(peer.peer_id));
            log::info!("peer {} timed out, removing", peer.peer_id);
            self.broadcast(&Message::RemovePeer {
                peer_id: peer.peer_id,
            });
        }
    }

    /// Serialize every entity once and fan the batch out to all peers,
    /// splitting whenever a batch would cross the MTU.
    fn broadcast_snapshots(&mut self) {
        if self.peers.is_empty() {
            // Nobody listening: leave dirty state unconsumed so the next
            // joiner's first snapshot carries it.
            return;
        }

        // Tag + count, then per entry ID + length prefix.
        const HEADER_BYTES: usize = 1 + 2;
        const ENTRY_OVERHEAD: usize = 4 + 2;

        let mut packets = Vec::new();
        let mut batch: Vec<SnapshotEntry> = Vec::new();
        let mut batch_bytes = HEADER_BYTES;

        for (entity_id, entity) in self.registry.iter_mut() {
            let mut w = ByteWriter::with_capacity(entity.snapshot_size_hint());
            entity.write_snapshot(&mut w);
            let data = w.into_vec();

            let entry_bytes = ENTRY_OVERHEAD + data.len();
            if batch_bytes + entry_bytes > MAX_PACKET_SIZE && !batch.is_empty() {
                packets.push(Message::EntitySnapshots(std::mem::take(&mut batch)));
                batch_bytes = HEADER_BYTES;
            }
            batch_bytes += entry_bytes;
            batch.push(SnapshotEntry { entity_id, data });
        }
        if !batch.is_empty() {
            packets.push(Message::EntitySnapshots(batch));
        }

        for packet in packets {
            self.broadcast(&packet);
        }
    }

    fn broadcast_scoreboard(&mut self) {
        let rows: Vec<ScoreRow> = self
            .peers
            .iter()
            .map(|p| ScoreRow {
                peer_id: p.peer_id,
                kills: p.kills,
                deaths: p.deaths,
            })
            .collect();
        if !rows.is_empty() {
            self.broadcast(&Message::Scoreboard(rows));
        }
    }

    /// Send failures are logged and skipped; one unreachable peer must not
    /// stall the tick.
    fn broadcast(&mut self, message: &Message) {
        let addrs: Vec<SocketAddr> = self.peers.iter().map(|p| p.addr).collect();
        for addr in addrs {
            if let Err(err) = self.endpoint.send_to(message, addr) {
                log::warn!("send to {addr} failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish::net::CharacterInput;
    use skirmish::{CHARACTER_ID_BASE, VEHICLE_ID_BASE};

    fn test_session(max_peers: usize) -> ServerSession {
        let config = ServerConfig {
            bind_addr: "127.0.0.1".parse().unwrap(),
            port: 0,
            max_peers,
            vehicle_count: 2,
            ..Default::default()
        };
        ServerSession::new(config).unwrap()
    }

    fn client_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn input_at(tick: u32) -> Message {
        Message::CharacterInput(CharacterInput {
            tick,
            move_y: 1.0,
            ..Default::default()
        })
    }

    #[test]
    fn first_datagram_admits_peer_and_spawns_character() {
        let mut session = test_session(16);
        session.handle_message(input_at(1), client_addr(40001));

        assert_eq!(session.peers().len(), 1);
        let peer = session.peers().iter().next().unwrap();
        assert_ne!(peer.peer_id, 0);
        assert!(session.registry().contains(CHARACTER_ID_BASE + peer.peer_id));
    }

    #[test]
    fn full_session_rejects_new_addresses() {
        let mut session = test_session(1);
        session.handle_message(input_at(1), client_addr(40002));
        session.handle_message(input_at(1), client_addr(40003));

        assert_eq!(session.peers().len(), 1);
    }

    #[test]
    fn world_contains_match_state_and_vehicles_at_startup() {
        let session = test_session(16);
        assert!(session.registry().contains(MATCH_STATE_ID));
        assert!(session.registry().contains(VEHICLE_ID_BASE));
        assert!(session.registry().contains(VEHICLE_ID_BASE + 1));
    }

    #[test]
    fn stale_input_does_not_roll_back_newer_state() {
        let mut session = test_session(16);
        let addr = client_addr(40004);
        session.handle_message(input_at(10), addr);
        // 11 lost in flight, 12 arrives, then 10 shows up late.
        session.handle_message(input_at(12), addr);
        session.handle_message(input_at(10), addr);

        let peer = session.peers().iter().next().unwrap();
        assert_eq!(peer.character_input_tick(), 12);
    }

    #[test]
    fn vehicle_input_for_unoccupied_vehicle_is_ignored() {
        let mut session = test_session(16);
        let addr = client_addr(40005);
        session.handle_message(input_at(1), addr);
        session.handle_message(
            Message::VehicleInput(skirmish::net::VehicleInput {
                tick: 2,
                vehicle_id: VEHICLE_ID_BASE,
                throttle: 1.0,
                ..Default::default()
            }),
            addr,
        );

        let peer = session.peers().iter().next().unwrap();
        assert_eq!(peer.vehicle_input_tick(), 0);
        assert_eq!(peer.control, Control::OnFoot);
    }

    #[test]
    fn interact_near_vehicle_transfers_control_atomically() {
        let mut session = test_session(16);
        let addr = client_addr(40006);

        // Join, then walk state doesn't matter: teleport the character next
        // to vehicle 0 and press interact.
        session.handle_message(input_at(1), addr);
        let peer_id = session.peers().iter().next().unwrap().peer_id;
        let vehicle_spawn = session
            .registry()
            .get(VEHICLE_ID_BASE)
            .unwrap()
            .as_vehicle()
            .unwrap()
            .position();
        session
            .registry
            .get_mut(character_id(peer_id))
            .unwrap()
            .as_character_mut()
            .unwrap()
            .set_position(vehicle_spawn + Vec3::new(1.0, 0.0, 0.0));

        let mut input = CharacterInput {
            tick: 2,
            ..Default::default()
        };
        input.interact = true;
        session.handle_message(Message::CharacterInput(input), addr);
        session.step();

        let peer = session.peers().get(peer_id).unwrap();
        assert_eq!(peer.control, Control::Driving(VEHICLE_ID_BASE));
        let vehicle = session
            .registry()
            .get(VEHICLE_ID_BASE)
            .unwrap()
            .as_vehicle()
            .unwrap();
        assert_eq!(vehicle.occupant(), Some(peer_id));
        let character = session
            .registry()
            .get(character_id(peer_id))
            .unwrap()
            .as_character()
            .unwrap();
        assert!(character.in_vehicle());
    }

    #[test]
    fn interact_while_driving_returns_control_on_foot() {
        let mut session = test_session(16);
        let addr = client_addr(40007);

        session.handle_message(input_at(1), addr);
        let peer_id = session.peers().iter().next().unwrap().peer_id;
        let vehicle_spawn = session
            .registry()
            .get(VEHICLE_ID_BASE)
            .unwrap()
            .as_vehicle()
            .unwrap()
            .position();
        session
            .registry
            .get_mut(character_id(peer_id))
            .unwrap()
            .as_character_mut()
            .unwrap()
            .set_position(vehicle_spawn);

        let mut enter = CharacterInput {
            tick: 2,
            ..Default::default()
        };
        enter.interact = true;
        session.handle_message(Message::CharacterInput(enter), addr);
        session.step();
        assert_eq!(
            session.peers().get(peer_id).unwrap().control,
            Control::Driving(VEHICLE_ID_BASE)
        );

        // Release, then press again on the vehicle channel.
        session.handle_message(
            Message::VehicleInput(skirmish::net::VehicleInput {
                tick: 3,
                vehicle_id: VEHICLE_ID_BASE,
                ..Default::default()
            }),
            addr,
        );
        session.step();
        session.handle_message(
            Message::VehicleInput(skirmish::net::VehicleInput {
                tick: 4,
                vehicle_id: VEHICLE_ID_BASE,
                interact: true,
                ..Default::default()
            }),
            addr,
        );
        session.step();

        let peer = session.peers().get(peer_id).unwrap();
        assert_eq!(peer.control, Control::OnFoot);
        let vehicle = session
            .registry()
            .get(VEHICLE_ID_BASE)
            .unwrap()
            .as_vehicle()
            .unwrap();
        assert_eq!(vehicle.occupant(), None);
        assert!(
            !session
                .registry()
                .get(character_id(peer_id))
                .unwrap()
                .as_character()
                .unwrap()
                .in_vehicle()
        );
    }

    #[test]
    fn zero_broadcast_intervals_disable_the_broadcasts() {
        let mut config = ServerConfig {
            bind_addr: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..Default::default()
        };
        config.session.scoreboard_interval = 0;
        config.session.full_snapshot_interval = 0;
        let mut session = ServerSession::new(config).unwrap();

        session.handle_message(input_at(1), client_addr(40009));
        for _ in 0..64 {
            session.step();
        }
        assert_eq!(session.peers().len(), 1);
    }

    #[test]
    fn timed_out_peer_is_fully_removed() {
        let mut config = ServerConfig {
            bind_addr: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..Default::default()
        };
        config.session.peer_timeout = Duration::ZERO;
        let mut session = ServerSession::new(config).unwrap();

        session.handle_message(input_at(1), client_addr(40008));
        let peer_id = session.peers().iter().next().unwrap().peer_id;
        std::thread::sleep(Duration::from_millis(5));
        session.step();

        assert!(session.peers().get(peer_id).is_none());
        assert!(!session.registry().contains(character_id(peer_id)));
    }
}
