#![allow(dead_code)]

use pictionary_core::{GroupId, ParticipantId, StimulusCatalog};
use pictionary_experiment::codec::encode_drawing;
use pictionary_experiment::{ClientMessage, ExperimentConfig, PhaseController, Session};
use pictionary_timing::ManualClock;

pub const SVG: &[u8] = b"<svg><circle cx=\"5\" cy=\"5\" r=\"4\"/></svg>";

pub fn session(seed: u64) -> Session<ManualClock> {
    Session::new(
        ExperimentConfig::default(),
        StimulusCatalog::standard(),
        ManualClock::default(),
    )
    .unwrap()
    .with_seed(seed)
}

pub fn pair(session: &Session<ManualClock>) -> (GroupId, ParticipantId, ParticipantId) {
    let ids = [ParticipantId(1), ParticipantId(2)];
    let group = session.form_groups(&ids).unwrap()[0];
    (group, ids[0], ids[1])
}

/// (drawer, responder, stim) of the group's current trial in `phase`
pub fn current(session: &Session<ManualClock>, group: GroupId, phase: u32) -> (ParticipantId, ParticipantId, String) {
    let snapshot = session.group_snapshot(group).unwrap();
    let trial = PhaseController::current_trial(&snapshot, phase).unwrap();
    (trial.drawer, trial.responder, trial.stim.clone())
}

/// Drawer draws and finishes, responder answers correctly. No `continue`.
pub fn finish_halves(session: &Session<ManualClock>, group: GroupId, phase: u32) {
    let (drawer, responder, stim) = current(session, group, phase);
    session.live(drawer, ClientMessage::Init).unwrap();
    session.clock().advance(3.0);
    session
        .live(drawer, ClientMessage::Update { drawing: encode_drawing(b"<svg>") })
        .unwrap();
    session
        .live(drawer, ClientMessage::DrawingComplete { drawing: encode_drawing(SVG) })
        .unwrap();
    session
        .live(responder, ClientMessage::ResponseComplete { response: stim })
        .unwrap();
}

/// Plays every remaining trial of `phase` to completion.
pub fn play_phase(session: &Session<ManualClock>, group: GroupId, phase: u32) {
    loop {
        let snapshot = session.group_snapshot(group).unwrap();
        if PhaseController::is_phase_complete(snapshot.phase(phase).unwrap()) {
            break;
        }
        finish_halves(session, group, phase);
        let [a, b] = snapshot.member_ids();
        session.live(a, ClientMessage::Continue).unwrap();
        session.live(b, ClientMessage::Continue).unwrap();
    }
}
