pub mod config;
pub mod congestion_controller;
pub mod error;
pub mod proto;
mod session;
pub mod stats;
mod task;

pub use config::Config;
pub use congestion_controller::{udt::UDT, CongestionController, LossReport, Phase, SeqNo};
pub use session::{SentSequence, Session};
pub use task::{spawn, CongestionEvent, ControllerHandle, Pacing};
