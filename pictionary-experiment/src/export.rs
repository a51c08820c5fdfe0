use pictionary_core::{Demographics, GroupId, ParticipantId};
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};
use tracing::warn;

use crate::codec::encode_drawing;
use crate::store::GroupState;

pub const HEADER: [&str; 21] = [
    "session_id",
    "group_id",
    "drawer_id",
    "responder_id",
    "phase",
    "trial",
    "stimulus",
    "concepts",
    "response",
    "correct",
    "response_completed",
    "drawing_completed",
    "drawing_duration",
    "drawing",
    "stim_order",
    "drawer_age",
    "drawer_gender",
    "drawer_native_language",
    "responder_age",
    "responder_gender",
    "responder_native_language",
];

/// One exported trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub session_id: String,
    pub group_id: GroupId,
    pub drawer_id: ParticipantId,
    pub responder_id: ParticipantId,
    pub phase: u32,
    pub trial: usize,
    pub stimulus: String,
    pub concepts: String,
    pub response: String,
    pub correct: bool,
    pub response_completed: bool,
    pub drawing_completed: bool,
    pub drawing_duration: f64,
    pub drawing: String,
    pub stim_order: String,
    pub drawer: Demographics,
    pub responder: Demographics,
}

impl ExportRow {
    pub fn from_group(session_id: &str, group: &GroupState) -> Vec<Self> {
        let demographics = |id: ParticipantId| {
            group
                .member(id)
                .and_then(|m| m.demographics.clone())
                .unwrap_or_default()
        };

        group
            .phases
            .values()
            .flat_map(|record| record.trials.iter().map(move |t| (record, t)))
            .map(|(record, t)| ExportRow {
                session_id: session_id.to_string(),
                group_id: group.id,
                drawer_id: t.drawer,
                responder_id: t.responder,
                phase: record.phase,
                trial: t.index,
                stimulus: t.stim.clone(),
                concepts: t.concept_labels().join("|"),
                response: t.response.selected.clone().unwrap_or_default(),
                correct: t.response.correct,
                response_completed: t.response.completed,
                drawing_completed: t.drawing.completed,
                drawing_duration: t.drawing.elapsed,
                drawing: match t.drawing.svg_text() {
                    Some(text) => text.to_string(),
                    None => {
                        warn!(
                            group = %group.id,
                            phase = record.phase,
                            trial = t.index,
                            "drawing is not UTF-8, exporting base64"
                        );
                        encode_drawing(&t.drawing.svg)
                    }
                },
                stim_order: record.stim_order.clone(),
                drawer: demographics(t.drawer),
                responder: demographics(t.responder),
            })
            .collect()
    }

    fn fields(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let age = |d: &Demographics| d.age.map(|a| a.to_string()).unwrap_or_default();
        vec![
            self.session_id.clone(),
            self.group_id.to_string(),
            self.drawer_id.to_string(),
            self.responder_id.to_string(),
            self.phase.to_string(),
            self.trial.to_string(),
            self.stimulus.clone(),
            self.concepts.clone(),
            self.response.clone(),
            self.correct.to_string(),
            self.response_completed.to_string(),
            self.drawing_completed.to_string(),
            format!("{:.3}", self.drawing_duration),
            self.drawing.clone(),
            self.stim_order.clone(),
            age(&self.drawer),
            opt(&self.drawer.gender),
            opt(&self.drawer.native_language),
            age(&self.responder),
            opt(&self.responder.gender),
            opt(&self.responder.native_language),
        ]
    }
}

fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_line<W: Write>(out: &mut W, fields: impl IntoIterator<Item = impl AsRef<str>>) -> io::Result<()> {
    let line = fields
        .into_iter()
        .map(|f| quote(f.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "{line}")
}

/// Header plus one comma-delimited line per row
pub fn write_csv<W: Write>(rows: &[ExportRow], mut out: W) -> io::Result<()> {
    write_line(&mut out, HEADER)?;
    for row in rows {
        write_line(&mut out, row.fields())?;
    }
    out.flush()
}
