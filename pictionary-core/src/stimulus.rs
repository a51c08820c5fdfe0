use serde::{Deserialize, Serialize};
use std::fmt;

/// Linguistic feature a stimulus sentence encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    FirstPerson,
    SecondPerson,
    Present,
    Past,
    Obligation,
    Possibility,
    Simple,
    Perfect,
}

impl Concept {
    pub fn label(&self) -> &'static str {
        match self {
            Concept::FirstPerson => "1st person",
            Concept::SecondPerson => "2nd person",
            Concept::Present => "present",
            Concept::Past => "past",
            Concept::Obligation => "obligation",
            Concept::Possibility => "possibility",
            Concept::Simple => "simple",
            Concept::Perfect => "perfect",
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A prompt sentence plus the concepts it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stimulus {
    pub prompt: String,
    pub concepts: Vec<Concept>,
}

impl Stimulus {
    pub fn new(prompt: impl Into<String>, concepts: &[Concept]) -> Self {
        Self {
            prompt: prompt.into(),
            concepts: concepts.to_vec(),
        }
    }
}
