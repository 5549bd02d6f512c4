use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::io;
use std::net::SocketAddr;

use glam::Vec3;

use skirmish::entity::{Character, CharacterFlags, Entity};
use skirmish::net::{
    ByteReader, CharacterInput, Message, ScoreRow, SnapshotEntry, UdpEndpoint, VehicleInput,
};
use skirmish::character_id;

use crate::config::ClientConfig;
use crate::prediction::{PredictionSample, ReconciliationController};
use crate::spawner::spawn_proxy;

#[derive(Debug, Clone, Copy, Default)]
pub struct InputFrame {
    pub move_x: f32,
    pub move_y: f32,
    pub jump: bool,
    pub sprint: bool,
    pub primary_fire: bool,
    pub primary_fire_just_pressed: bool,
    pub reload: bool,
    pub interact: bool,
    pub view_yaw: f32,
    pub view_pitch: f32,
    pub throttle: f32,
    pub steer: f32,
    pub brake: bool,
    pub handbrake: bool,
    pub respawn_requested: bool,
}

impl InputFrame {
    fn character_input(&self, tick: u32) -> CharacterInput {
        CharacterInput {
            tick,
            move_x: self.move_x,
            move_y: self.move_y,
            jump: self.jump,
            primary_fire: self.primary_fire,
            primary_fire_just_pressed: self.primary_fire_just_pressed,
            reload: self.reload,
            interact: self.interact,
            sprint: self.sprint,
            view_yaw: self.view_yaw,
            view_pitch: self.view_pitch,
        }
    }

    fn vehicle_input(&self, tick: u32, vehicle_id: u32) -> VehicleInput {
        VehicleInput {
            tick,
            vehicle_id,
            throttle: self.throttle,
            steer: self.steer,
            handbrake: self.handbrake,
            brake: self.brake,
            respawn_requested: self.respawn_requested,
            interact: self.interact,
        }
    }
}

/// The client half of the session: predicts the locally-controlled entity and
/// mirrors everything else. Until the Welcome arrives there is no local
/// entity; input is sent anyway, because the first datagram is what prompts
/// the server to admit us.
pub struct ClientSession {
    endpoint: UdpEndpoint,
    server_addr: SocketAddr,
    config: ClientConfig,
    dt: f32,
    tick: u32,
    peer_id: Option<u32>,
    own_character_id: Option<u32>,
    predicted: Option<Character>,
    /// Persistent authoritative copy of our character, so snapshots with
    /// omitted on-change fields resolve against the last server state.
    shadow: Option<Character>,
    /// Vehicle we currently drive, derived from replicated occupancy.
    driving: Option<u32>,
    proxies: HashMap<u32, Entity>,
    reconciler: ReconciliationController,
    scoreboard: Vec<ScoreRow>,
}

impl ClientSession {
    pub fn connect(config: ClientConfig) -> io::Result<Self> {
        let endpoint = UdpEndpoint::bind("0.0.0.0:0")?;
        let reconciler = ReconciliationController::new(config.reconcile.clone());
        let dt = 1.0 / config.tick_rate as f32;
        log::info!("client {} -> {}", endpoint.local_addr(), config.server_addr);

        Ok(Self {
            endpoint,
            server_addr: config.server_addr,
            config,
            dt,
            tick: 0,
            peer_id: None,
            own_character_id: None,
            predicted: None,
            shadow: None,
            driving: None,
            proxies: HashMap::new(),
            reconciler,
            scoreboard: Vec::new(),
        })
    }

    pub fn peer_id(&self) -> Option<u32> {
        self.peer_id
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn driving(&self) -> Option<u32> {
        self.driving
    }

    pub fn predicted_character(&self) -> Option<&Character> {
        self.predicted.as_ref()
    }

    pub fn proxy(&self, entity_id: u32) -> Option<&Entity> {
        self.proxies.get(&entity_id)
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn scoreboard(&self) -> &[ScoreRow] {
        &self.scoreboard
    }

    /// One local tick: predict under this frame's input and send it.
    pub fn step(&mut self, frame: &InputFrame) {
        self.tick += 1;

        if let Some(vehicle_id) = self.driving {
            let input = frame.vehicle_input(self.tick, vehicle_id);
            if let Some(vehicle) = self
                .proxies
                .get_mut(&vehicle_id)
                .and_then(Entity::as_vehicle_mut)
            {
                vehicle.simulate(&input, &self.config.vehicle, self.dt);
                vehicle.converge(&self.config.reconcile);
            }
            self.send(&Message::VehicleInput(input));
        } else {
            let input = frame.character_input(self.tick);
            if let Some(predicted) = &mut self.predicted {
                predicted.simulate(&input, &self.config.character, self.dt);
                self.reconciler.record(PredictionSample {
                    tick: self.tick,
                    position: predicted.position(),
                    velocity: predicted.velocity(),
                    yaw: predicted.yaw(),
                });
            }
            self.send(&Message::CharacterInput(input));
        }
    }

    fn send(&mut self, message: &Message) {
        if let Err(err) = self.endpoint.send_to(message, self.server_addr) {
            log::warn!("send to {} failed: {err}", self.server_addr);
        }
    }

    pub fn process_network(&mut self) -> io::Result<()> {
        for (message, addr) in self.endpoint.poll()? {
            if addr != self.server_addr {
                continue;
            }
            self.handle_message(message);
        }
        Ok(())
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Welcome { peer_id } => self.on_welcome(peer_id),
            Message::EntitySnapshots(entries) => {
                for entry in entries {
                    self.apply_entry(&entry);
                }
                self.refresh_driving();
            }
            Message::Despawn { entity_id } => {
                self.proxies.remove(&entity_id);
            }
            Message::RemovePeer { peer_id } => {
                self.proxies.remove(&character_id(peer_id));
            }
            Message::Scoreboard(rows) => {
                self.scoreboard = rows;
            }
            // Input tags never travel server -> client.
            Message::CharacterInput(_) | Message::VehicleInput(_) => {}
        }
    }

    fn on_welcome(&mut self, peer_id: u32) {
        if self.peer_id == Some(peer_id) {
            return;
        }
        let own = character_id(peer_id);
        log::info!("assigned peer id {peer_id}, own entity {own:#x}");
        self.peer_id = Some(peer_id);
        self.own_character_id = Some(own);
        self.predicted = Some(Character::new(own, Vec3::ZERO));
        self.shadow = Some(Character::new(own, Vec3::ZERO));
        // A snapshot may have raced the welcome and spawned us as a proxy.
        self.proxies.remove(&own);
    }

    fn apply_entry(&mut self, entry: &SnapshotEntry) {
        if self.own_character_id == Some(entry.entity_id) {
            self.apply_own_character(entry);
            return;
        }

        if self.driving == Some(entry.entity_id) {
            // Our own simulated vehicle: the convergence blend chases the
            // decoded target, never a direct overwrite.
            if let Some(vehicle) = self
                .proxies
                .get_mut(&entry.entity_id)
                .and_then(Entity::as_vehicle_mut)
            {
                match vehicle.decode_snapshot(&entry.data) {
                    Ok(snapshot) => {
                        vehicle.receive_authoritative(&snapshot, &self.config.reconcile)
                    }
                    Err(err) => {
                        log::debug!("bad snapshot for vehicle {:#x}: {err}", entry.entity_id)
                    }
                }
            }
            return;
        }

        let entity = match self.proxies.entry(entry.entity_id) {
            MapEntry::Occupied(occupied) => occupied.into_mut(),
            MapEntry::Vacant(vacant) => match spawn_proxy(entry.entity_id) {
                Some(proxy) => vacant.insert(proxy),
                None => return,
            },
        };
        if let Err(err) = entity.apply_snapshot(&entry.data) {
            log::debug!("bad snapshot for {:#x}: {err}", entry.entity_id);
        }
    }

    fn apply_own_character(&mut self, entry: &SnapshotEntry) {
        let (Some(shadow), Some(predicted)) = (self.shadow.as_mut(), self.predicted.as_mut())
        else {
            return;
        };
        if let Err(err) = shadow.apply_snapshot(&mut ByteReader::new(&entry.data)) {
            log::debug!("bad snapshot for own character: {err}");
            return;
        }

        // Vehicle membership is server-decided; the prediction must stop
        // integrating the body the moment the server parks it.
        predicted.set_flag(
            CharacterFlags::IN_VEHICLE,
            shadow.flags().contains(CharacterFlags::IN_VEHICLE),
        );

        let outcome = self.reconciler.reconcile(predicted, shadow);
        log::trace!("reconcile tick {}: {outcome:?}", shadow.last_input_tick);
    }

    fn refresh_driving(&mut self) {
        let Some(peer_id) = self.peer_id else {
            return;
        };
        let was = self.driving;
        self.driving = self.proxies.iter().find_map(|(&id, entity)| {
            entity
                .as_vehicle()
                .filter(|v| v.occupant() == Some(peer_id))
                .map(|_| id)
        });
        if was != self.driving {
            match self.driving {
                Some(id) => log::info!("now driving vehicle {id:#x}"),
                None => log::info!("back on foot"),
            }
        }
    }
}
