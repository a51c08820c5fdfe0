//! Groups, pages and per-group serialization.
//!
//! Each group sits behind its own mutex so the two members' live messages
//! are applied one at a time, while different groups run in parallel.
//! Lock order is always registry → group → rng.

use parking_lot::{Mutex, RwLock};
use pictionary_core::{Demographics, GroupId, Page, ParticipantId, StimulusCatalog};
use pictionary_timing::{Clock, SystemClock};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{ExperimentConfig, PLAYERS_PER_GROUP};
use crate::controller::PhaseController;
use crate::error::{ExperimentError, Result};
use crate::export::ExportRow;
use crate::message::{ClientMessage, Outbox};
use crate::planner::TrialPlanner;
use crate::protocol::RendezvousProtocol;
use crate::store::{GroupState, PhaseRecord};

type GroupHandle = Arc<Mutex<GroupState>>;

pub struct Session<C: Clock = SystemClock> {
    protocol: RendezvousProtocol<C>,
    catalog: Arc<StimulusCatalog>,
    groups: RwLock<HashMap<GroupId, GroupHandle>>,
    membership: RwLock<HashMap<ParticipantId, GroupId>>,
    rng: Mutex<StdRng>,
}

impl<C: Clock> Session<C> {
    pub fn new(config: ExperimentConfig, catalog: StimulusCatalog, clock: C) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(catalog);
        Ok(Self {
            protocol: RendezvousProtocol::new(config, Arc::clone(&catalog), clock),
            catalog,
            groups: RwLock::new(HashMap::new()),
            membership: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Reproducible pairing and trial order
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        self.protocol.config()
    }

    pub fn catalog(&self) -> &StimulusCatalog {
        &self.catalog
    }

    pub fn clock(&self) -> &C {
        self.protocol.clock()
    }

    /// Randomly pairs `participants` and plans phase 1 for every new pair.
    /// Id 0 is reserved for the broadcast key.
    pub fn form_groups(&self, participants: &[ParticipantId]) -> Result<Vec<GroupId>> {
        if participants.len() % PLAYERS_PER_GROUP != 0 {
            return Err(ExperimentError::OddParticipantCount(participants.len()));
        }

        let mut membership = self.membership.write();
        let mut seen = std::collections::HashSet::new();
        for &id in participants {
            if id.0 == 0 || membership.contains_key(&id) || !seen.insert(id) {
                return Err(ExperimentError::InvalidParticipant(id));
            }
        }

        let mut shuffled = participants.to_vec();
        shuffled.shuffle(&mut *self.rng.lock());

        let mut groups = self.groups.write();
        let mut formed = Vec::with_capacity(shuffled.len() / PLAYERS_PER_GROUP);
        for pair in shuffled.chunks_exact(PLAYERS_PER_GROUP) {
            let id = GroupId(groups.len() as u32 + 1);
            let mut state = GroupState::new(id, [pair[0], pair[1]]);
            for member in pair {
                self.enter_phase(&mut state, *member, 1)?;
                membership.insert(*member, id);
            }
            info!(group = %id, a = %pair[0], b = %pair[1], "group formed");
            groups.insert(id, Arc::new(Mutex::new(state)));
            formed.push(id);
        }
        Ok(formed)
    }

    pub fn group_of(&self, participant: ParticipantId) -> Result<GroupId> {
        self.membership
            .read()
            .get(&participant)
            .copied()
            .ok_or(ExperimentError::UnknownParticipant(participant))
    }

    fn handle_for(&self, participant: ParticipantId) -> Result<GroupHandle> {
        let group = self.group_of(participant)?;
        self.groups
            .read()
            .get(&group)
            .cloned()
            .ok_or(ExperimentError::UnknownParticipant(participant))
    }

    /// Applies one live message under the group's lock. A fatal error
    /// aborts the group; later messages are refused.
    pub fn live(&self, participant: ParticipantId, message: ClientMessage) -> Result<Outbox> {
        let handle = self.handle_for(participant)?;
        let mut group = handle.lock();
        if let Some(reason) = &group.aborted {
            return Err(ExperimentError::GroupAborted {
                group: group.id,
                reason: reason.clone(),
            });
        }

        match self.protocol.handle(&mut group, participant, message) {
            Err(e) if e.is_fatal() => {
                error!(group = %group.id, error = %e, "aborting group");
                group.aborted = Some(e.to_string());
                Err(e)
            }
            other => other,
        }
    }

    /// JSON in, recipient-keyed JSON out. Unparseable input is dropped.
    pub fn live_json(&self, participant: ParticipantId, raw: &str) -> Result<Value> {
        let message = match serde_json::from_str::<ClientMessage>(raw) {
            Ok(message) => message,
            Err(e) => {
                debug!(participant = %participant, error = %e, "unparseable live message");
                return Ok(Outbox::new().to_json());
            }
        };
        Ok(self.live(participant, message)?.to_json())
    }

    pub fn page(&self, participant: ParticipantId) -> Result<Page> {
        let handle = self.handle_for(participant)?;
        let group = handle.lock();
        group
            .member(participant)
            .map(|m| m.page)
            .ok_or(ExperimentError::UnknownParticipant(participant))
    }

    /// Whether the participant's current page still has something to do.
    pub fn is_displayed(&self, participant: ParticipantId) -> Result<bool> {
        let handle = self.handle_for(participant)?;
        let group = handle.lock();
        let member = group
            .member(participant)
            .ok_or(ExperimentError::UnknownParticipant(participant))?;
        Ok(match member.page {
            Page::Drawing { phase } => !group
                .phase(phase)
                .is_some_and(PhaseController::is_phase_complete),
            Page::Survey => member.demographics.is_none(),
            Page::Finished => true,
        })
    }

    /// Moves to the next page once the current one is done; otherwise the
    /// participant stays where it is.
    pub fn advance_page(&self, participant: ParticipantId) -> Result<Page> {
        let handle = self.handle_for(participant)?;
        let mut group = handle.lock();
        let member = group
            .member(participant)
            .ok_or(ExperimentError::UnknownParticipant(participant))?;
        let current = member.page;

        let done = match current {
            Page::Drawing { phase } => PhaseController::is_phase_complete(
                PhaseController::record(&group, phase)?,
            ),
            Page::Survey => member.demographics.is_some(),
            Page::Finished => false,
        };
        if !done {
            debug!(participant = %participant, ?current, "page not finished");
            return Ok(current);
        }

        let Some(next) = current.next(self.catalog.phase_count()) else {
            return Ok(current);
        };
        match next {
            Page::Drawing { phase } => self.enter_phase(&mut group, participant, phase)?,
            _ => {
                if let Some(m) = group.member_mut(participant) {
                    m.page = next;
                }
            }
        }
        info!(participant = %participant, ?next, "page advanced");
        Ok(next)
    }

    /// Page reload: the participant's pending `continue` is forgotten.
    pub fn reload_page(&self, participant: ParticipantId) -> Result<()> {
        let handle = self.handle_for(participant)?;
        let mut group = handle.lock();
        let member = group
            .member_mut(participant)
            .ok_or(ExperimentError::UnknownParticipant(participant))?;
        member.ready = false;
        Ok(())
    }

    pub fn submit_survey(
        &self,
        participant: ParticipantId,
        demographics: Demographics,
    ) -> Result<Page> {
        let handle = self.handle_for(participant)?;
        let mut group = handle.lock();
        let member = group
            .member_mut(participant)
            .ok_or(ExperimentError::UnknownParticipant(participant))?;
        if member.page != Page::Survey {
            debug!(participant = %participant, page = ?member.page, "survey submitted off the survey page");
            return Ok(member.page);
        }
        member.demographics = Some(demographics);
        member.page = Page::Finished;
        Ok(member.page)
    }

    /// Plans `phase` on the first member's entry and resets the entering
    /// member's ready flag.
    fn enter_phase(
        &self,
        group: &mut GroupState,
        participant: ParticipantId,
        phase: u32,
    ) -> Result<()> {
        let spec = self
            .catalog
            .phase(phase)
            .ok_or(ExperimentError::UnknownPhase(phase))?;
        if group.phase(phase).is_none() {
            let plan =
                TrialPlanner::plan_phase(spec, &group.member_ids(), &mut *self.rng.lock())?;
            info!(group = %group.id, phase, trials = plan.trials.len(), "phase planned");
            group.insert_phase(PhaseRecord::from_plan(phase, plan));
        }
        let member = group
            .member_mut(participant)
            .ok_or(ExperimentError::UnknownParticipant(participant))?;
        member.page = Page::Drawing { phase };
        member.ready = false;
        Ok(())
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<_> = self.groups.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn group_snapshot(&self, group: GroupId) -> Option<GroupState> {
        let handle = self.groups.read().get(&group).cloned()?;
        let state = handle.lock().clone();
        Some(state)
    }

    pub fn is_experiment_complete(&self, group: GroupId) -> bool {
        self.group_snapshot(group)
            .is_some_and(|g| PhaseController::is_experiment_complete(&g, &self.catalog))
    }

    /// One row per planned trial across every group
    pub fn export_rows(&self) -> Vec<ExportRow> {
        let session_id = &self.config().session_id;
        self.group_ids()
            .into_iter()
            .filter_map(|id| self.group_snapshot(id))
            .flat_map(|group| ExportRow::from_group(session_id, &group))
            .collect()
    }
}
