pub mod catalog;
pub mod participant;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use catalog::StimulusCatalog;
pub use participant::{Demographics, GroupId, ParticipantId};
pub use phase::{Page, PhaseSpec};
pub use stimulus::{Concept, Stimulus};
pub use trial::{Drawing, Response, Role, Trial, TrialState};
