//! Live event handler shared by both members of a group.
//!
//! Every call runs under the group's lock, so a single invocation sees and
//! commits a consistent view of the trial records and both ready flags. The
//! two members' messages still interleave arbitrarily, and either side may
//! re-send `init` at any point, so each branch is idempotent.

use pictionary_core::{ParticipantId, Role, StimulusCatalog};
use pictionary_timing::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::{decode_drawing, encode_drawing};
use crate::config::ExperimentConfig;
use crate::controller::PhaseController;
use crate::error::{ExperimentError, Result};
use crate::message::{ClientMessage, InitState, Outbox, ServerMessage};
use crate::store::GroupState;

pub struct RendezvousProtocol<C: Clock> {
    config: ExperimentConfig,
    catalog: Arc<StimulusCatalog>,
    clock: C,
}

impl<C: Clock> RendezvousProtocol<C> {
    pub fn new(config: ExperimentConfig, catalog: Arc<StimulusCatalog>, clock: C) -> Self {
        Self {
            config,
            catalog,
            clock,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StimulusCatalog {
        &self.catalog
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Applies one message from `sender` and returns the replies.
    ///
    /// Wrong-role, stale and unknown messages produce an empty outbox. Only
    /// a malformed drawing payload or a broken invariant is an error.
    pub fn handle(
        &self,
        group: &mut GroupState,
        sender: ParticipantId,
        message: ClientMessage,
    ) -> Result<Outbox> {
        let member = group
            .member(sender)
            .ok_or(ExperimentError::UnknownParticipant(sender))?;
        let Some(phase) = member.page.phase() else {
            debug!(participant = %sender, event = message.name(), "not on a drawing page");
            return Ok(Outbox::new());
        };

        let record = PhaseController::record(group, phase)?;
        if PhaseController::is_phase_complete(record)
            || PhaseController::current_trial(group, phase)?.completed
        {
            let mut out = Outbox::new();
            out.send(sender, self.continue_signal(group, phase));
            return Ok(out);
        }

        let trial = PhaseController::current_trial(group, phase)?;
        let Some(role) = trial.role_of(sender) else {
            debug!(participant = %sender, trial = trial.index, "sender has no role in trial");
            return Ok(Outbox::new());
        };

        let now = self.clock.now();
        match (message, role) {
            (ClientMessage::Init, role) => self.on_init(group, phase, sender, role, now),
            (ClientMessage::Update { drawing }, Role::Drawer) => {
                self.on_update(group, phase, &drawing, now)
            }
            (ClientMessage::DrawingComplete { drawing }, Role::Drawer) => {
                self.on_drawing_complete(group, phase, &drawing, now)
            }
            (ClientMessage::StimulusSelected { stim }, Role::Responder) => {
                self.on_stimulus_selected(group, phase, stim)
            }
            (ClientMessage::ResponseComplete { response }, Role::Responder) => {
                self.on_response_complete(group, phase, response)
            }
            (ClientMessage::Continue, _) => self.on_continue(group, phase, sender),
            (ClientMessage::GetRemainingTime, Role::Drawer) => {
                self.on_remaining_time(group, phase, sender, now)
            }
            (message, role) => {
                debug!(
                    participant = %sender,
                    event = message.name(),
                    ?role,
                    "ignored message"
                );
                Ok(Outbox::new())
            }
        }
    }

    fn continue_signal(&self, group: &GroupState, phase: u32) -> ServerMessage {
        let phase_complete = group
            .phase(phase)
            .is_some_and(PhaseController::is_phase_complete);
        ServerMessage::Continue {
            phase_complete,
            experiment_complete: PhaseController::is_experiment_complete(group, &self.catalog),
        }
    }

    fn time_remaining(&self, elapsed: f64) -> f64 {
        (self.config.drawing_time_secs - elapsed).max(0.0)
    }

    fn on_init(
        &self,
        group: &mut GroupState,
        phase: u32,
        sender: ParticipantId,
        role: Role,
        now: f64,
    ) -> Result<Outbox> {
        let spec = self
            .catalog
            .phase(phase)
            .ok_or(ExperimentError::UnknownPhase(phase))?;
        let ready = group.member(sender).is_some_and(|m| m.ready);
        let trial_count = PhaseController::record(group, phase)?.trial_count();

        let trial = PhaseController::current_trial_mut(group, phase)?;
        let drawer = role == Role::Drawer;
        if drawer {
            trial.drawing.start(now);
            trial.drawing.touch(now);
        }

        let response_completed = trial.response.completed;
        // the responder sees the drawing only once it is handed over
        let show_drawing = drawer || trial.drawing.completed || self.config.live_draw;
        let state = InitState {
            drawer,
            phase,
            trial: trial.index,
            trial_count,
            drawing: if show_drawing {
                encode_drawing(&trial.drawing.svg)
            } else {
                String::new()
            },
            drawing_completed: trial.drawing.completed,
            response: if drawer && !response_completed {
                None
            } else {
                trial.response.selected.clone()
            },
            response_completed,
            correct: response_completed.then_some(trial.response.correct),
            stims: spec.prompts(),
            stim: (drawer || response_completed).then(|| trial.stim.clone()),
            ready,
            elapsed: trial.drawing.elapsed,
            time_remaining: self.time_remaining(trial.drawing.elapsed),
            live_draw: self.config.live_draw,
            blur: self.config.blur,
        };

        let mut out = Outbox::new();
        out.send(sender, ServerMessage::Init(state));
        Ok(out)
    }

    fn on_update(
        &self,
        group: &mut GroupState,
        phase: u32,
        drawing: &str,
        now: f64,
    ) -> Result<Outbox> {
        let trial = PhaseController::current_trial_mut(group, phase)?;
        if trial.drawing.completed {
            debug!(trial = trial.index, "update after drawing completed");
            return Ok(Outbox::new());
        }
        let svg = decode_drawing(drawing).inspect_err(|e| {
            warn!(trial = trial.index, error = %e, "dropping malformed drawing update");
        })?;
        trial.drawing.touch(now);
        trial.drawing.svg = svg;
        Ok(Outbox::new())
    }

    fn on_drawing_complete(
        &self,
        group: &mut GroupState,
        phase: u32,
        drawing: &str,
        now: f64,
    ) -> Result<Outbox> {
        let group_id = group.id;
        let trial = PhaseController::current_trial_mut(group, phase)?;
        if trial.drawing.completed {
            debug!(trial = trial.index, "duplicate drawing_complete");
            return Ok(Outbox::new());
        }
        let svg = decode_drawing(drawing).inspect_err(|e| {
            warn!(trial = trial.index, error = %e, "rejecting malformed final drawing");
        })?;

        trial.drawing.touch(now);
        trial.drawing.svg = svg;
        trial.drawing.completed = true;
        info!(
            group = %group_id,
            phase,
            trial = trial.index,
            elapsed = trial.drawing.elapsed,
            "drawing completed"
        );

        let mut out = Outbox::new();
        out.send(
            trial.responder,
            ServerMessage::DrawingComplete {
                drawing: encode_drawing(&trial.drawing.svg),
                drawer: false,
            },
        );
        Ok(out)
    }

    fn on_stimulus_selected(
        &self,
        group: &mut GroupState,
        phase: u32,
        stim: String,
    ) -> Result<Outbox> {
        if !self.is_candidate(phase, &stim) {
            debug!(%stim, "selection outside the candidate list");
            return Ok(Outbox::new());
        }
        let trial = PhaseController::current_trial_mut(group, phase)?;
        if !trial.drawing.completed || trial.response.completed {
            debug!(trial = trial.index, "selection outside the response window");
            return Ok(Outbox::new());
        }
        trial.response.selected = Some(stim);
        Ok(Outbox::new())
    }

    fn on_response_complete(
        &self,
        group: &mut GroupState,
        phase: u32,
        response: String,
    ) -> Result<Outbox> {
        if !self.is_candidate(phase, &response) {
            debug!(%response, "response outside the candidate list");
            return Ok(Outbox::new());
        }
        let group_id = group.id;
        let trial = PhaseController::current_trial_mut(group, phase)?;
        if !trial.drawing.completed || trial.response.completed {
            debug!(trial = trial.index, "response outside the response window");
            return Ok(Outbox::new());
        }

        let correct = response == trial.stim;
        trial.response.selected = Some(response.clone());
        trial.response.correct = correct;
        trial.response.completed = true;
        info!(group = %group_id, phase, trial = trial.index, correct, "response committed");

        let mut out = Outbox::new();
        out.broadcast(ServerMessage::ShowResponse {
            response,
            correct,
            stim: trial.stim.clone(),
        });
        Ok(out)
    }

    /// The both-ready gate.
    fn on_continue(
        &self,
        group: &mut GroupState,
        phase: u32,
        sender: ParticipantId,
    ) -> Result<Outbox> {
        let trial = PhaseController::current_trial(group, phase)?;
        if !trial.halves_done() {
            debug!(trial = trial.index, "continue before both halves completed");
            return Ok(Outbox::new());
        }
        let index = trial.index;

        let partner_ready = group.partner(sender).is_some_and(|m| m.ready);
        if let Some(member) = group.member_mut(sender) {
            member.ready = true;
        }

        let mut out = Outbox::new();
        if !partner_ready {
            out.send(sender, ServerMessage::ContinueWait);
            return Ok(out);
        }

        let group_id = group.id;
        let record = group
            .phase_mut(phase)
            .ok_or(ExperimentError::PhaseNotStarted {
                group: group_id,
                phase,
            })?;
        record.current_trial_index += 1;
        let trial = record
            .trial_mut(index)
            .ok_or(ExperimentError::MissingTrial {
                group: group_id,
                phase,
                index,
            })?;
        trial.completed = true;
        group.reset_ready();
        info!(group = %group_id, phase, trial = index, "trial advanced");

        out.broadcast(self.continue_signal(group, phase));
        Ok(out)
    }

    fn on_remaining_time(
        &self,
        group: &mut GroupState,
        phase: u32,
        sender: ParticipantId,
        now: f64,
    ) -> Result<Outbox> {
        let trial = PhaseController::current_trial_mut(group, phase)?;
        trial.drawing.touch(now);
        let elapsed = trial.drawing.elapsed;

        let mut out = Outbox::new();
        out.send(
            sender,
            ServerMessage::RemainingTime {
                elapsed,
                time_remaining: self.time_remaining(elapsed),
            },
        );
        Ok(out)
    }

    fn is_candidate(&self, phase: u32, prompt: &str) -> bool {
        self.catalog
            .phase(phase)
            .is_some_and(|p| p.contains_prompt(prompt))
    }
}
