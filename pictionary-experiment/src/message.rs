//! Live channel envelopes.
//!
//! Inbound messages are `{"event": ..., <fields>}`. Replies are keyed by
//! recipient: `"0"` reaches every member of the group, any other key is a
//! participant id.

use pictionary_core::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    Init,
    Update { drawing: String },
    DrawingComplete { drawing: String },
    StimulusSelected { stim: String },
    ResponseComplete { response: String },
    Continue,
    GetRemainingTime,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Init => "init",
            ClientMessage::Update { .. } => "update",
            ClientMessage::DrawingComplete { .. } => "drawing_complete",
            ClientMessage::StimulusSelected { .. } => "stimulus_selected",
            ClientMessage::ResponseComplete { .. } => "response_complete",
            ClientMessage::Continue => "continue",
            ClientMessage::GetRemainingTime => "get_remaining_time",
            ClientMessage::Unknown => "unknown",
        }
    }
}

/// Everything a (re)connecting client needs to rebuild its view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitState {
    pub drawer: bool,
    pub phase: u32,
    pub trial: usize,
    pub trial_count: usize,
    /// base64
    pub drawing: String,
    pub drawing_completed: bool,
    pub response: Option<String>,
    pub response_completed: bool,
    pub correct: Option<bool>,
    pub stims: Vec<String>,
    /// Withheld from the responder until it has committed an answer
    pub stim: Option<String>,
    pub ready: bool,
    pub elapsed: f64,
    pub time_remaining: f64,
    pub live_draw: bool,
    pub blur: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    Init(InitState),
    DrawingComplete {
        drawing: String,
        drawer: bool,
    },
    ShowResponse {
        response: String,
        correct: bool,
        stim: String,
    },
    Continue {
        phase_complete: bool,
        experiment_complete: bool,
    },
    ContinueWait,
    RemainingTime {
        elapsed: f64,
        time_remaining: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Recipient {
    Broadcast,
    Participant(ParticipantId),
}

impl Recipient {
    pub fn key(&self) -> String {
        match self {
            Recipient::Broadcast => "0".to_string(),
            Recipient::Participant(id) => id.to_string(),
        }
    }

    pub fn reaches(&self, participant: ParticipantId) -> bool {
        match self {
            Recipient::Broadcast => true,
            Recipient::Participant(id) => *id == participant,
        }
    }
}

/// Replies produced by one inbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    entries: Vec<(Recipient, ServerMessage)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: ParticipantId, message: ServerMessage) {
        self.entries.push((Recipient::Participant(to), message));
    }

    pub fn broadcast(&mut self, message: ServerMessage) {
        self.entries.push((Recipient::Broadcast, message));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Recipient, ServerMessage)> {
        self.entries.iter()
    }

    /// Messages delivered to `participant`, broadcasts included.
    pub fn messages_for(&self, participant: ParticipantId) -> Vec<&ServerMessage> {
        self.entries
            .iter()
            .filter(|(to, _)| to.reaches(participant))
            .map(|(_, m)| m)
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (to, message) in &self.entries {
            let value = serde_json::to_value(message).unwrap_or(Value::Null);
            map.insert(to.key(), value);
        }
        Value::Object(map)
    }
}

impl IntoIterator for Outbox {
    type Item = (Recipient, ServerMessage);
    type IntoIter = std::vec::IntoIter<(Recipient, ServerMessage)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
