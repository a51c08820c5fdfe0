use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;
use crate::stimulus::Concept;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Drawer,
    Responder,
}

impl Role {
    pub fn flip(self) -> Self {
        match self {
            Role::Drawer => Role::Responder,
            Role::Responder => Role::Drawer,
        }
    }
}

/// Progress of a single trial, derived from its records and the ready flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrialState {
    Planned,
    DrawingInProgress,
    DrawingDone,
    ResponseInProgress,
    ResponseDone,
    AwaitingBothReady,
    Advanced,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    /// Decoded SVG bytes
    pub svg: Vec<u8>,
    pub completed: bool,
    /// Epoch seconds of the drawer's first `init`
    pub started_at: Option<f64>,
    pub elapsed: f64,
}

impl Drawing {
    /// Recompute elapsed time against `now`. No-op once completed or before
    /// the timer started; never moves backwards.
    pub fn touch(&mut self, now: f64) {
        if self.completed {
            return;
        }
        if let Some(start) = self.started_at {
            self.elapsed = self.elapsed.max(now - start);
        }
    }

    /// Starts the timer if it is not running yet
    pub fn start(&mut self, now: f64) {
        if self.started_at.is_none() && !self.completed {
            self.started_at = Some(now);
        }
    }

    /// The payload as text, if it is valid UTF-8
    pub fn svg_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.svg).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub selected: Option<String>,
    pub correct: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// 1-based within the group's phase
    pub index: usize,
    pub stim: String,
    pub concepts: Vec<Concept>,
    pub drawer: ParticipantId,
    pub responder: ParticipantId,
    pub completed: bool,
    pub drawing: Drawing,
    pub response: Response,
}

impl Trial {
    pub fn new(
        index: usize,
        stim: String,
        concepts: Vec<Concept>,
        drawer: ParticipantId,
        responder: ParticipantId,
    ) -> Self {
        Self {
            index,
            stim,
            concepts,
            drawer,
            responder,
            completed: false,
            drawing: Drawing::default(),
            response: Response::default(),
        }
    }

    pub fn role_of(&self, participant: ParticipantId) -> Option<Role> {
        if participant == self.drawer {
            Some(Role::Drawer)
        } else if participant == self.responder {
            Some(Role::Responder)
        } else {
            None
        }
    }

    /// Concept labels in order, e.g. `["1st person", "past"]`
    pub fn concept_labels(&self) -> Vec<&'static str> {
        self.concepts.iter().map(Concept::label).collect()
    }

    /// Both halves acknowledged; `continue` becomes valid.
    pub fn halves_done(&self) -> bool {
        self.drawing.completed && self.response.completed
    }

    pub fn state(&self, any_ready: bool) -> TrialState {
        if self.completed {
            TrialState::Advanced
        } else if self.response.completed {
            if any_ready {
                TrialState::AwaitingBothReady
            } else {
                TrialState::ResponseDone
            }
        } else if self.response.selected.is_some() {
            TrialState::ResponseInProgress
        } else if self.drawing.completed {
            TrialState::DrawingDone
        } else if self.drawing.started_at.is_some() {
            TrialState::DrawingInProgress
        } else {
            TrialState::Planned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial() -> Trial {
        Trial::new(
            1,
            "I kick the ball".into(),
            vec![Concept::FirstPerson],
            ParticipantId(1),
            ParticipantId(2),
        )
    }

    #[test]
    fn roles_resolve_per_trial() {
        let t = trial();
        assert_eq!(t.role_of(ParticipantId(1)), Some(Role::Drawer));
        assert_eq!(t.role_of(ParticipantId(2)), Some(Role::Responder));
        assert_eq!(t.role_of(ParticipantId(3)), None);
        assert_eq!(t.concept_labels(), vec!["1st person"]);
        assert_eq!(Role::Drawer.flip(), Role::Responder);
    }

    #[test]
    fn elapsed_never_decreases_and_freezes() {
        let mut d = Drawing::default();
        d.touch(50.0);
        assert_eq!(d.elapsed, 0.0);

        d.start(100.0);
        d.start(120.0);
        assert_eq!(d.started_at, Some(100.0));

        d.touch(105.0);
        assert_eq!(d.elapsed, 5.0);
        // clock stepped backwards
        d.touch(103.0);
        assert_eq!(d.elapsed, 5.0);

        d.touch(110.0);
        d.completed = true;
        d.touch(200.0);
        assert_eq!(d.elapsed, 10.0);
    }

    #[test]
    fn derived_state_follows_records() {
        let mut t = trial();
        assert_eq!(t.state(false), TrialState::Planned);
        t.drawing.start(1.0);
        assert_eq!(t.state(false), TrialState::DrawingInProgress);
        t.drawing.completed = true;
        assert_eq!(t.state(false), TrialState::DrawingDone);
        t.response.selected = Some("I see the bird".into());
        assert_eq!(t.state(false), TrialState::ResponseInProgress);
        t.response.completed = true;
        assert_eq!(t.state(false), TrialState::ResponseDone);
        assert_eq!(t.state(true), TrialState::AwaitingBothReady);
        t.completed = true;
        assert_eq!(t.state(false), TrialState::Advanced);
    }
}
