pub mod config;
pub mod peer;
pub mod session;

pub use config::ServerConfig;
pub use peer::{Control, Peer, PeerTable};
pub use session::ServerSession;
