pub mod config;
pub mod prediction;
pub mod session;
pub mod spawner;

pub use config::ClientConfig;
pub use prediction::{Correction, PredictionSample, ReconciliationController};
pub use session::{ClientSession, InputFrame};
pub use spawner::spawn_proxy;
