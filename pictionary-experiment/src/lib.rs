pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod message;
pub mod planner;
pub mod protocol;
pub mod session;
pub mod store;

pub use config::ExperimentConfig;
pub use controller::PhaseController;
pub use error::{ExperimentError, Result};
pub use export::{ExportRow, write_csv};
pub use message::{ClientMessage, InitState, Outbox, Recipient, ServerMessage};
pub use planner::{PhasePlan, TrialPlanner};
pub use protocol::RendezvousProtocol;
pub use session::Session;
pub use store::{GroupState, Member, PhaseRecord};
