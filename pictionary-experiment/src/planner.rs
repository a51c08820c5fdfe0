use pictionary_core::{ParticipantId, PhaseSpec, Role, Trial};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::{ExperimentError, Result};

/// Output of planning one phase for one pair
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    pub trials: Vec<Trial>,
    /// Shuffled prompts joined by `"; "`, kept for export
    pub stim_order: String,
}

pub struct TrialPlanner;

impl TrialPlanner {
    /// Repeats every stimulus `phase.repeat` times, shuffles, and deals
    /// roles: trial 1's drawer is a coin flip, each following trial swaps.
    pub fn plan_phase<R: Rng>(
        phase: &PhaseSpec,
        pair: &[ParticipantId],
        rng: &mut R,
    ) -> Result<PhasePlan> {
        let [first, second] = pair else {
            return Err(ExperimentError::InvalidGroupSize(pair.len()));
        };

        let mut deck: Vec<_> = phase
            .stimuli
            .iter()
            .flat_map(|s| std::iter::repeat_n(s, phase.repeat))
            .collect();
        deck.shuffle(rng);

        let mut first_role = if rng.random_bool(0.5) {
            Role::Drawer
        } else {
            Role::Responder
        };

        let mut trials = Vec::with_capacity(deck.len());
        for (i, stimulus) in deck.iter().enumerate() {
            let (drawer, responder) = match first_role {
                Role::Drawer => (*first, *second),
                Role::Responder => (*second, *first),
            };
            trials.push(Trial::new(
                i + 1,
                stimulus.prompt.clone(),
                stimulus.concepts.clone(),
                drawer,
                responder,
            ));
            first_role = first_role.flip();
        }

        let stim_order = deck
            .iter()
            .map(|s| s.prompt.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        debug!(
            phase = phase.number,
            trials = trials.len(),
            "planned phase"
        );

        Ok(PhasePlan { trials, stim_order })
    }
}
