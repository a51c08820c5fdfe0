use pictionary_core::{GroupId, ParticipantId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("group needs exactly 2 participants, got {0}")]
    InvalidGroupSize(usize),

    #[error("cannot pair an odd number of participants ({0})")]
    OddParticipantCount(usize),

    #[error("no trial {index} in phase {phase} of group {group}")]
    MissingTrial {
        group: GroupId,
        phase: u32,
        index: usize,
    },

    #[error("phase {0} is not in the catalog")]
    UnknownPhase(u32),

    #[error("phase {phase} has not been started for group {group}")]
    PhaseNotStarted { group: GroupId, phase: u32 },

    #[error("participant {0} is not in any group")]
    UnknownParticipant(ParticipantId),

    #[error("participant id {0} is reserved or already grouped")]
    InvalidParticipant(ParticipantId),

    #[error("group {group} was aborted: {reason}")]
    GroupAborted { group: GroupId, reason: String },

    #[error("malformed drawing payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ExperimentError {
    /// Invariant violations. The group's state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExperimentError::InvalidGroupSize(_)
                | ExperimentError::OddParticipantCount(_)
                | ExperimentError::MissingTrial { .. }
        )
    }
}

pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;
