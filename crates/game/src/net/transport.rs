use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::protocol::{MAX_PACKET_SIZE, Message};

#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_discarded: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Non-blocking datagram endpoint. Datagrams are fire-and-forget: there is no
/// sequencing, ack or retry layer; every tick's broadcast supersedes the last.
pub struct UdpEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: TransportStats,
    recv_buffer: [u8; MAX_PACKET_SIZE],
}

impl UdpEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: TransportStats::default(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    pub fn send_to(&mut self, message: &Message, addr: SocketAddr) -> io::Result<usize> {
        let data = message.encode();
        if data.len() > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "packet exceeds MTU",
            ));
        }

        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(bytes)
    }

    /// Drain every currently-queued datagram. Truncated or mis-tagged packets
    /// are counted and dropped; they never abort the poll.
    pub fn poll(&mut self) -> io::Result<Vec<(Message, SocketAddr)>> {
        let mut messages = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => match Message::decode(&self.recv_buffer[..size]) {
                    Ok(message) => {
                        self.stats.packets_received += 1;
                        self.stats.bytes_received += size as u64;
                        messages.push((message, addr));
                    }
                    Err(err) => {
                        self.stats.packets_discarded += 1;
                        log::debug!("discarding {size}-byte datagram from {addr}: {err}");
                    }
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        Ok(messages)
    }
}
