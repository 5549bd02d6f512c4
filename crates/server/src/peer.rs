use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use skirmish::{CharacterInput, VehicleInput};

/// Which entity a peer's input is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    #[default]
    OnFoot,
    Driving(u32),
}

/// Per-connection state: the latest accepted input per control channel and
/// the tick it was sampled at.
#[derive(Debug)]
pub struct Peer {
    pub peer_id: u32,
    pub addr: SocketAddr,
    pub last_seen: Instant,
    pub control: Control,
    pub kills: u16,
    pub deaths: u16,
    character_input: CharacterInput,
    character_input_tick: u32,
    vehicle_input: VehicleInput,
    vehicle_input_tick: u32,
    prev_interact: bool,
}

impl Peer {
    fn new(peer_id: u32, addr: SocketAddr) -> Self {
        Self {
            peer_id,
            addr,
            last_seen: Instant::now(),
            control: Control::OnFoot,
            kills: 0,
            deaths: 0,
            character_input: CharacterInput::default(),
            character_input_tick: 0,
            vehicle_input: VehicleInput::default(),
            vehicle_input_tick: 0,
            prev_interact: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Strictly older ticks are discarded so a reordered packet cannot undo
    /// a newer one; equal ticks re-accept.
    pub fn accept_character_input(&mut self, input: CharacterInput) -> bool {
        if input.tick < self.character_input_tick {
            return false;
        }
        self.character_input_tick = input.tick;
        self.character_input = input;
        true
    }

    pub fn accept_vehicle_input(&mut self, input: VehicleInput) -> bool {
        if input.tick < self.vehicle_input_tick {
            return false;
        }
        self.vehicle_input_tick = input.tick;
        self.vehicle_input = input;
        true
    }

    pub fn character_input(&self) -> &CharacterInput {
        &self.character_input
    }

    pub fn character_input_tick(&self) -> u32 {
        self.character_input_tick
    }

    pub fn vehicle_input(&self) -> &VehicleInput {
        &self.vehicle_input
    }

    pub fn vehicle_input_tick(&self) -> u32 {
        self.vehicle_input_tick
    }

    /// Rising edge of the interact intent on the active channel.
    pub fn take_interact_edge(&mut self) -> bool {
        let interact = match self.control {
            Control::OnFoot => self.character_input.interact,
            Control::Driving(_) => self.vehicle_input.interact,
        };
        let edge = interact && !self.prev_interact;
        self.prev_interact = interact;
        edge
    }
}

/// All connected peers, addressable by ID and by source address.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<u32, Peer>,
    by_addr: HashMap<SocketAddr, u32>,
    next_peer_id: u32,
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            by_addr: HashMap::new(),
            next_peer_id: 1,
        }
    }

    /// Peer IDs start at 1 and are never reused within a session.
    pub fn insert(&mut self, addr: SocketAddr) -> &mut Peer {
        let peer_id = self.next_peer_id;
        self.next_peer_id += 1;

        self.by_addr.insert(addr, peer_id);
        self.peers.entry(peer_id).or_insert_with(|| Peer::new(peer_id, addr))
    }

    pub fn get(&self, peer_id: u32) -> Option<&Peer> {
        self.peers.get(&peer_id)
    }

    pub fn get_mut(&mut self, peer_id: u32) -> Option<&mut Peer> {
        self.peers.get_mut(&peer_id)
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut Peer> {
        self.by_addr
            .get(addr)
            .copied()
            .and_then(|id| self.peers.get_mut(&id))
    }

    pub fn contains_addr(&self, addr: &SocketAddr) -> bool {
        self.by_addr.contains_key(addr)
    }

    pub fn remove(&mut self, peer_id: u32) -> Option<Peer> {
        let peer = self.peers.remove(&peer_id)?;
        self.by_addr.remove(&peer.addr);
        Some(peer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.values_mut()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn evict_timed_out(&mut self, timeout: Duration) -> Vec<Peer> {
        let timed_out: Vec<u32> = self
            .peers
            .values()
            .filter(|p| p.is_timed_out(timeout))
            .map(|p| p.peer_id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }
}
