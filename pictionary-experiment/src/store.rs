use pictionary_core::{Demographics, GroupId, Page, ParticipantId, Trial};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::planner::PhasePlan;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub id: ParticipantId,
    pub page: Page,
    /// Rendezvous flag for the trial currently on screen
    pub ready: bool,
    pub demographics: Option<Demographics>,
}

impl Member {
    fn new(id: ParticipantId) -> Self {
        Self {
            id,
            page: Page::default(),
            ready: false,
            demographics: None,
        }
    }
}

/// Trial records of one group in one phase, plus the group's cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub phase: u32,
    pub stim_order: String,
    /// 1-based; one past the last trial once the phase is done
    pub current_trial_index: usize,
    /// Fixed when the phase is planned; `trials` must keep this many records
    pub planned: usize,
    pub trials: Vec<Trial>,
}

impl PhaseRecord {
    pub fn from_plan(phase: u32, plan: PhasePlan) -> Self {
        Self {
            phase,
            stim_order: plan.stim_order,
            current_trial_index: 1,
            planned: plan.trials.len(),
            trials: plan.trials,
        }
    }

    pub fn trial_count(&self) -> usize {
        self.planned
    }

    pub fn trial(&self, index: usize) -> Option<&Trial> {
        self.trials.iter().find(|t| t.index == index)
    }

    pub fn trial_mut(&mut self, index: usize) -> Option<&mut Trial> {
        self.trials.iter_mut().find(|t| t.index == index)
    }
}

/// Everything the live handler may touch for one pair. Always accessed
/// under the group's lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupState {
    pub id: GroupId,
    pub members: [Member; 2],
    pub phases: BTreeMap<u32, PhaseRecord>,
    /// Set when an invariant violation was hit; the group takes no more input
    pub aborted: Option<String>,
}

impl GroupState {
    pub fn new(id: GroupId, pair: [ParticipantId; 2]) -> Self {
        Self {
            id,
            members: pair.map(Member::new),
            phases: BTreeMap::new(),
            aborted: None,
        }
    }

    pub fn member_ids(&self) -> [ParticipantId; 2] {
        [self.members[0].id, self.members[1].id]
    }

    pub fn member(&self, id: ParticipantId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn member_mut(&mut self, id: ParticipantId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    pub fn partner(&self, id: ParticipantId) -> Option<&Member> {
        self.member(id)?;
        self.members.iter().find(|m| m.id != id)
    }

    pub fn reset_ready(&mut self) {
        for m in &mut self.members {
            m.ready = false;
        }
    }

    pub fn phase(&self, phase: u32) -> Option<&PhaseRecord> {
        self.phases.get(&phase)
    }

    pub fn phase_mut(&mut self, phase: u32) -> Option<&mut PhaseRecord> {
        self.phases.get_mut(&phase)
    }

    pub fn insert_phase(&mut self, record: PhaseRecord) {
        self.phases.insert(record.phase, record);
    }
}
