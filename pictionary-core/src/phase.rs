use serde::{Deserialize, Serialize};

use crate::stimulus::Stimulus;

/// One ordered stage of the experiment: its stimulus set and how many
/// times each stimulus is repeated before shuffling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// 1-based phase number
    pub number: u32,
    pub stimuli: Vec<Stimulus>,
    pub repeat: usize,
}

impl PhaseSpec {
    pub fn trial_count(&self) -> usize {
        self.stimuli.len() * self.repeat
    }

    /// Candidate prompts offered to the responder, in catalog order
    pub fn prompts(&self) -> Vec<String> {
        self.stimuli.iter().map(|s| s.prompt.clone()).collect()
    }

    pub fn contains_prompt(&self, prompt: &str) -> bool {
        self.stimuli.iter().any(|s| s.prompt == prompt)
    }
}

/// Pages a participant walks through
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum Page {
    Drawing { phase: u32 },
    Survey,
    Finished,
}

impl Default for Page {
    fn default() -> Self {
        Page::Drawing { phase: 1 }
    }
}

impl Page {
    /// Pages that host the live drawing/guessing channel
    pub fn is_live(&self) -> bool {
        matches!(self, Page::Drawing { .. })
    }

    pub fn phase(&self) -> Option<u32> {
        match self {
            Page::Drawing { phase } => Some(*phase),
            _ => None,
        }
    }

    pub fn next(&self, phase_count: u32) -> Option<Self> {
        use Page::*;
        Some(match self {
            Drawing { phase } if *phase < phase_count => Drawing { phase: phase + 1 },
            Drawing { .. } => Survey,
            Survey => Finished,
            Finished => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sequence_walks_phases_then_survey() {
        let mut page = Page::default();
        let mut seen = vec![page];
        while let Some(next) = page.next(3) {
            seen.push(next);
            page = next;
        }
        assert_eq!(
            seen,
            vec![
                Page::Drawing { phase: 1 },
                Page::Drawing { phase: 2 },
                Page::Drawing { phase: 3 },
                Page::Survey,
                Page::Finished,
            ]
        );
        assert!(Page::Drawing { phase: 2 }.is_live());
        assert!(!Page::Survey.is_live());
    }
}
