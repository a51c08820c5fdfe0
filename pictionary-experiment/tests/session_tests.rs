mod common;

use common::*;
use pictionary_core::{Demographics, Page, ParticipantId};
use pictionary_experiment::{ClientMessage, ExperimentError, Recipient, ServerMessage};
use serde_json::json;
use std::sync::Barrier;

#[test]
fn odd_participant_counts_cannot_be_paired() {
    let session = session(1);
    let err = session
        .form_groups(&[ParticipantId(1), ParticipantId(2), ParticipantId(3)])
        .unwrap_err();
    assert!(matches!(err, ExperimentError::OddParticipantCount(3)));
    assert!(session.group_ids().is_empty());
}

#[test]
fn reserved_and_duplicate_ids_are_rejected() {
    let session = session(1);
    assert!(matches!(
        session.form_groups(&[ParticipantId(0), ParticipantId(1)]),
        Err(ExperimentError::InvalidParticipant(ParticipantId(0)))
    ));
    assert!(session.form_groups(&[ParticipantId(4), ParticipantId(4)]).is_err());

    session.form_groups(&[ParticipantId(1), ParticipantId(2)]).unwrap();
    assert!(session.form_groups(&[ParticipantId(2), ParticipantId(3)]).is_err());
}

#[test]
fn pairs_cover_every_participant_once() {
    let session = session(9);
    let ids: Vec<_> = (1..=8).map(ParticipantId).collect();
    let groups = session.form_groups(&ids).unwrap();
    assert_eq!(groups.len(), 4);

    let mut seen: Vec<_> = groups
        .iter()
        .flat_map(|g| session.group_snapshot(*g).unwrap().member_ids())
        .collect();
    seen.sort();
    assert_eq!(seen, ids);
    for id in &ids {
        assert_eq!(session.page(*id).unwrap(), Page::Drawing { phase: 1 });
    }
}

#[test]
fn live_json_speaks_the_wire_format() {
    let session = session(3);
    let (group, _, _) = pair(&session);
    let (drawer, responder, _) = current(&session, group, 1);

    let reply = session
        .live_json(
            drawer,
            &json!({"event": "drawing_complete", "drawing": "PHN2Zy8+"}).to_string(),
        )
        .unwrap();
    assert_eq!(
        reply,
        json!({ responder.to_string(): {"event": "drawing_complete", "drawing": "PHN2Zy8+", "drawer": false} })
    );

    assert_eq!(session.live_json(drawer, "not json").unwrap(), json!({}));
    assert_eq!(session.live_json(drawer, r#"{"event": "wave"}"#).unwrap(), json!({}));
    assert!(matches!(
        session.live_json(ParticipantId(77), r#"{"event": "init"}"#),
        Err(ExperimentError::UnknownParticipant(_))
    ));
}

#[test]
fn cannot_leave_a_phase_early() {
    let session = session(4);
    let (group, a, _) = pair(&session);
    assert!(session.is_displayed(a).unwrap());
    assert_eq!(session.advance_page(a).unwrap(), Page::Drawing { phase: 1 });

    finish_halves(&session, group, 1);
    assert_eq!(session.advance_page(a).unwrap(), Page::Drawing { phase: 1 });
}

#[test]
fn next_phase_is_planned_once_for_the_pair() {
    let session = session(5);
    let (group, a, b) = pair(&session);
    play_phase(&session, group, 1);
    assert!(!session.is_displayed(a).unwrap());

    assert_eq!(session.advance_page(a).unwrap(), Page::Drawing { phase: 2 });
    let planned = session.group_snapshot(group).unwrap().phase(2).unwrap().clone();
    assert_eq!(planned.current_trial_index, 1);

    assert_eq!(session.advance_page(b).unwrap(), Page::Drawing { phase: 2 });
    let after = session.group_snapshot(group).unwrap();
    assert_eq!(after.phase(2).unwrap(), &planned);
}

#[test]
fn reload_clears_a_pending_continue() {
    let session = session(6);
    let (group, a, b) = pair(&session);
    finish_halves(&session, group, 1);

    session.live(a, ClientMessage::Continue).unwrap();
    session.reload_page(a).unwrap();
    let out = session.live(b, ClientMessage::Continue).unwrap();
    assert_eq!(
        out.into_iter().collect::<Vec<_>>(),
        vec![(Recipient::Participant(b), ServerMessage::ContinueWait)]
    );

    let out = session.live(a, ClientMessage::Continue).unwrap();
    assert!(out.messages_for(a).iter().any(|m| matches!(m, ServerMessage::Continue { .. })));
    let snapshot = session.group_snapshot(group).unwrap();
    assert_eq!(snapshot.phase(1).unwrap().current_trial_index, 2);
}

#[test]
fn concurrent_continues_advance_exactly_once() {
    let session = session(7);
    let (group, a, b) = pair(&session);
    let total = session.group_snapshot(group).unwrap().phase(1).unwrap().trial_count();

    for expected in 1..=total {
        finish_halves(&session, group, 1);
        let barrier = Barrier::new(2);
        let outboxes: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = [a, b]
                .into_iter()
                .map(|who| {
                    let session = &session;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        session.live(who, ClientMessage::Continue).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let broadcasts = outboxes
            .iter()
            .flat_map(|o| o.iter())
            .filter(|(to, m)| *to == Recipient::Broadcast && matches!(m, ServerMessage::Continue { .. }))
            .count();
        let waits = outboxes
            .iter()
            .flat_map(|o| o.iter())
            .filter(|(_, m)| *m == ServerMessage::ContinueWait)
            .count();
        assert_eq!((broadcasts, waits), (1, 1));

        let snapshot = session.group_snapshot(group).unwrap();
        let record = snapshot.phase(1).unwrap();
        assert_eq!(record.current_trial_index, expected + 1);
        assert!(record.trial(expected).unwrap().completed);
        assert!(snapshot.members.iter().all(|m| !m.ready));
    }
}

#[test]
fn groups_progress_independently() {
    let session = session(8);
    let ids: Vec<_> = (1..=4).map(ParticipantId).collect();
    let groups = session.form_groups(&ids).unwrap();

    play_phase(&session, groups[0], 1);
    let first = session.group_snapshot(groups[0]).unwrap();
    let second = session.group_snapshot(groups[1]).unwrap();
    assert!(first.phase(1).unwrap().current_trial_index > first.phase(1).unwrap().trial_count());
    assert_eq!(second.phase(1).unwrap().current_trial_index, 1);
}

#[test]
fn full_run_reaches_survey_and_exports_every_trial() {
    let session = session(10);
    let (group, a, b) = pair(&session);

    for phase in 1..=session.catalog().phase_count() {
        play_phase(&session, group, phase);
        let next_a = session.advance_page(a).unwrap();
        let next_b = session.advance_page(b).unwrap();
        assert_eq!(next_a, next_b);
    }
    assert!(session.is_experiment_complete(group));
    assert_eq!(session.page(a).unwrap(), Page::Survey);

    // survey cannot be skipped
    assert_eq!(session.advance_page(a).unwrap(), Page::Survey);
    let answers = Demographics {
        age: Some(27),
        gender: Some("female".into()),
        native_language: Some("Hungarian".into()),
    };
    assert_eq!(session.submit_survey(a, answers.clone()).unwrap(), Page::Finished);
    assert_eq!(session.submit_survey(a, Demographics::default()).unwrap(), Page::Finished);

    let rows = session.export_rows();
    let expected: usize = session.catalog().phases().iter().map(|p| p.trial_count()).sum();
    assert_eq!(rows.len(), expected);
    assert!(rows.iter().all(|r| r.correct && r.response_completed && r.drawing_completed));
    assert!(rows.iter().all(|r| r.drawing_duration >= 3.0));
    assert!(rows.iter().filter(|r| r.drawer_id == a).all(|r| r.drawer == answers));
    assert!(rows.iter().filter(|r| r.responder_id == b).all(|r| r.responder == Demographics::default()));

    let mut buf = Vec::new();
    pictionary_experiment::write_csv(&rows, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), expected + 1);
}
