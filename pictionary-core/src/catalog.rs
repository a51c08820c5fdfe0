use crate::phase::PhaseSpec;
use crate::stimulus::{Concept, Stimulus};

use Concept::*;

/// Fixed, ordered table of phases. Built once at process start and never
/// reloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusCatalog {
    phases: Vec<PhaseSpec>,
}

impl StimulusCatalog {
    /// Phases must be numbered 1..=n in order.
    pub fn new(phases: Vec<PhaseSpec>) -> Self {
        debug_assert!(
            phases
                .iter()
                .enumerate()
                .all(|(i, p)| p.number as usize == i + 1)
        );
        Self { phases }
    }

    pub fn phase(&self, number: u32) -> Option<&PhaseSpec> {
        number
            .checked_sub(1)
            .and_then(|i| self.phases.get(i as usize))
    }

    pub fn phase_count(&self) -> u32 {
        self.phases.len() as u32
    }

    pub fn is_last_phase(&self, number: u32) -> bool {
        number == self.phase_count()
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    /// The three-phase pronoun / tense / modality table.
    pub fn standard() -> Self {
        Self::new(vec![
            PhaseSpec {
                number: 1,
                stimuli: pronoun_set(),
                repeat: 2,
            },
            PhaseSpec {
                number: 2,
                stimuli: tense_set(),
                repeat: 1,
            },
            PhaseSpec {
                number: 3,
                stimuli: modality_set(),
                repeat: 1,
            },
        ])
    }
}

const VERBS_PRESENT: [&str; 3] = ["eat the ice cream", "kick the ball", "see the bird"];
const VERBS_PAST: [&str; 3] = ["ate the ice cream", "kicked the ball", "saw the bird"];
const VERBS_PERFECT: [&str; 3] = ["have eaten the ice cream", "have kicked the ball", "have seen the bird"];

fn block(subject: &str, predicates: &[&str], concepts: &[Concept]) -> Vec<Stimulus> {
    predicates
        .iter()
        .map(|p| Stimulus::new(format!("{subject} {p}"), concepts))
        .collect()
}

fn pronoun_set() -> Vec<Stimulus> {
    let mut out = block("I", &VERBS_PRESENT, &[FirstPerson]);
    out.extend(block("You", &VERBS_PRESENT, &[SecondPerson]));
    out
}

fn tense_set() -> Vec<Stimulus> {
    let mut out = block("I", &VERBS_PRESENT, &[FirstPerson, Present]);
    out.extend(block("I", &VERBS_PAST, &[FirstPerson, Past]));
    out.extend(block("You", &VERBS_PRESENT, &[SecondPerson, Present]));
    out.extend(block("You", &VERBS_PAST, &[SecondPerson, Past]));
    out
}

fn modality_set() -> Vec<Stimulus> {
    let mut out = Vec::with_capacity(24);
    for (modal, modality) in [("should", Obligation), ("could", Possibility)] {
        for (subject, person) in [("I", FirstPerson), ("You", SecondPerson)] {
            out.extend(block(
                &format!("{subject} {modal}"),
                &VERBS_PRESENT,
                &[person, Present, modality, Simple],
            ));
        }
        for (subject, person) in [("I", FirstPerson), ("You", SecondPerson)] {
            out.extend(block(
                &format!("{subject} {modal}"),
                &VERBS_PERFECT,
                &[person, Past, modality, Perfect],
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_shape() {
        let catalog = StimulusCatalog::standard();
        assert_eq!(catalog.phase_count(), 3);
        assert_eq!(catalog.phase(1).map(|p| p.stimuli.len()), Some(6));
        assert_eq!(catalog.phase(2).map(|p| p.stimuli.len()), Some(12));
        assert_eq!(catalog.phase(3).map(|p| p.stimuli.len()), Some(24));
        assert!(catalog.phase(0).is_none());
        assert!(catalog.phase(4).is_none());
        assert!(catalog.is_last_phase(3));
    }

    #[test]
    fn prompts_and_tags_line_up() {
        let catalog = StimulusCatalog::standard();
        let p1 = catalog.phase(1).unwrap();
        assert_eq!(p1.stimuli[0].prompt, "I eat the ice cream");
        assert_eq!(p1.stimuli[3].prompt, "You eat the ice cream");
        assert_eq!(p1.stimuli[3].concepts, vec![SecondPerson]);

        let p3 = catalog.phase(3).unwrap();
        let perfect = p3
            .stimuli
            .iter()
            .find(|s| s.prompt == "You could have seen the bird")
            .unwrap();
        assert_eq!(perfect.concepts, vec![SecondPerson, Past, Possibility, Perfect]);
    }
}
