use pictionary_core::{StimulusCatalog, Trial};

use crate::error::{ExperimentError, Result};
use crate::store::{GroupState, PhaseRecord};

/// Phase and experiment completion queries for the page layer.
pub struct PhaseController;

impl PhaseController {
    pub fn is_phase_complete(record: &PhaseRecord) -> bool {
        record.current_trial_index > record.trial_count()
    }

    pub fn record(group: &GroupState, phase: u32) -> Result<&PhaseRecord> {
        group
            .phase(phase)
            .ok_or(ExperimentError::PhaseNotStarted {
                group: group.id,
                phase,
            })
    }

    /// The trial under the group's cursor. A missing trial means the planner
    /// and the cursor disagree, which is fatal.
    pub fn current_trial(group: &GroupState, phase: u32) -> Result<&Trial> {
        let record = Self::record(group, phase)?;
        record
            .trial(record.current_trial_index)
            .ok_or(ExperimentError::MissingTrial {
                group: group.id,
                phase,
                index: record.current_trial_index,
            })
    }

    pub fn current_trial_mut(group: &mut GroupState, phase: u32) -> Result<&mut Trial> {
        let id = group.id;
        let record = group
            .phase_mut(phase)
            .ok_or(ExperimentError::PhaseNotStarted { group: id, phase })?;
        let index = record.current_trial_index;
        record
            .trial_mut(index)
            .ok_or(ExperimentError::MissingTrial {
                group: id,
                phase,
                index,
            })
    }

    /// The last catalog phase has been played through.
    pub fn is_experiment_complete(group: &GroupState, catalog: &StimulusCatalog) -> bool {
        group
            .phase(catalog.phase_count())
            .is_some_and(Self::is_phase_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::TrialPlanner;
    use pictionary_core::{GroupId, ParticipantId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn group_with_phase(catalog: &StimulusCatalog, phase: u32) -> GroupState {
        let pair = [ParticipantId(1), ParticipantId(2)];
        let mut group = GroupState::new(GroupId(1), pair);
        let plan = TrialPlanner::plan_phase(
            catalog.phase(phase).unwrap(),
            &pair,
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap();
        group.insert_phase(PhaseRecord::from_plan(phase, plan));
        group
    }

    #[test]
    fn phase_completes_past_the_last_trial() {
        let catalog = StimulusCatalog::standard();
        let mut group = group_with_phase(&catalog, 1);
        let record = group.phase_mut(1).unwrap();
        assert!(!PhaseController::is_phase_complete(record));
        record.current_trial_index = record.trial_count();
        assert!(!PhaseController::is_phase_complete(record));
        record.current_trial_index += 1;
        assert!(PhaseController::is_phase_complete(record));
    }

    #[test]
    fn current_trial_follows_cursor() {
        let catalog = StimulusCatalog::standard();
        let mut group = group_with_phase(&catalog, 1);
        assert_eq!(PhaseController::current_trial(&group, 1).unwrap().index, 1);
        group.phase_mut(1).unwrap().current_trial_index = 4;
        assert_eq!(PhaseController::current_trial(&group, 1).unwrap().index, 4);
    }

    #[test]
    fn missing_trial_is_fatal() {
        let catalog = StimulusCatalog::standard();
        let mut group = group_with_phase(&catalog, 1);
        group.phase_mut(1).unwrap().trials.remove(0);
        let err = PhaseController::current_trial(&group, 1).unwrap_err();
        assert!(err.is_fatal());

        let err = PhaseController::current_trial(&group, 2).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn wiped_trials_do_not_complete_the_phase() {
        let catalog = StimulusCatalog::standard();
        let mut group = group_with_phase(&catalog, 1);
        group.phase_mut(1).unwrap().trials.clear();
        assert!(!PhaseController::is_phase_complete(group.phase(1).unwrap()));
        assert!(PhaseController::current_trial(&group, 1).unwrap_err().is_fatal());
    }

    #[test]
    fn experiment_completes_with_last_phase() {
        let catalog = StimulusCatalog::standard();
        let mut group = group_with_phase(&catalog, 1);
        group.phase_mut(1).unwrap().current_trial_index = 100;
        assert!(!PhaseController::is_experiment_complete(&group, &catalog));

        let last = catalog.phase_count();
        let plan = TrialPlanner::plan_phase(
            catalog.phase(last).unwrap(),
            &group.member_ids(),
            &mut StdRng::seed_from_u64(2),
        )
        .unwrap();
        let mut record = PhaseRecord::from_plan(last, plan);
        record.current_trial_index = record.trial_count() + 1;
        group.insert_phase(record);
        assert!(PhaseController::is_experiment_complete(&group, &catalog));
    }
}
