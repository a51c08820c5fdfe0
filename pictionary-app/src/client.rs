use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use pictionary_core::{Demographics, Page, ParticipantId};
use pictionary_experiment::codec::encode_drawing;
use pictionary_experiment::{ClientMessage, PhaseController, ServerMessage};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::app::Router;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);
const STROKE_COLOR: &str = "#cb1212";
const STROKE_WIDTH: u32 = 15;

/// A scripted participant speaking the live protocol.
pub struct SimulatedClient {
    id: ParticipantId,
    router: Arc<Router>,
    inbox: Receiver<ServerMessage>,
    accuracy: f64,
    rng: StdRng,
    stims: Vec<String>,
    drew: bool,
    answered: bool,
    continued: bool,
}

impl SimulatedClient {
    pub fn new(
        id: ParticipantId,
        router: Arc<Router>,
        inbox: Receiver<ServerMessage>,
        accuracy: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            id,
            router,
            inbox,
            accuracy,
            rng,
            stims: Vec::new(),
            drew: false,
            answered: false,
            continued: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let router = Arc::clone(&self.router);
        let session = router.session();
        loop {
            match session.page(self.id)? {
                Page::Drawing { phase } => {
                    self.play_phase(phase)?;
                    session.advance_page(self.id)?;
                }
                Page::Survey => {
                    let answers = self.demographics();
                    session.submit_survey(self.id, answers)?;
                }
                Page::Finished => return Ok(()),
            }
        }
    }

    fn send(&self, message: ClientMessage) -> Result<()> {
        self.router.send(self.id, &message)
    }

    fn reset_trial(&mut self) {
        self.drew = false;
        self.answered = false;
        self.continued = false;
    }

    fn play_phase(&mut self, phase: u32) -> Result<()> {
        debug!(participant = %self.id, phase, "entering phase");
        self.reset_trial();
        self.send(ClientMessage::Init)?;

        loop {
            let message = self
                .inbox
                .recv_timeout(RECV_TIMEOUT)
                .with_context(|| format!("participant {} waiting in phase {phase}", self.id))?;
            trace!(participant = %self.id, ?message, "received");

            match message {
                ServerMessage::Init(state) => {
                    self.stims = state.stims;
                    if state.drawer {
                        if !state.drawing_completed {
                            self.draw()?;
                        }
                    } else if state.drawing_completed && !state.response_completed {
                        self.answer(phase)?;
                    }
                    if state.response_completed && !state.ready {
                        self.proceed()?;
                    }
                }
                ServerMessage::DrawingComplete { .. } => self.answer(phase)?,
                ServerMessage::ShowResponse { .. } => self.proceed()?,
                ServerMessage::ContinueWait => {}
                ServerMessage::Continue { phase_complete, .. } => {
                    if phase_complete {
                        return Ok(());
                    }
                    self.reset_trial();
                    self.send(ClientMessage::Init)?;
                }
                ServerMessage::RemainingTime { time_remaining, .. } => {
                    trace!(participant = %self.id, time_remaining, "drawing budget");
                }
            }
        }
    }

    fn draw(&mut self) -> Result<()> {
        if self.drew {
            return Ok(());
        }
        self.drew = true;

        let partial = self.sketch(2);
        self.send(ClientMessage::Update {
            drawing: encode_drawing(partial.as_bytes()),
        })?;
        self.send(ClientMessage::GetRemainingTime)?;
        let full = self.sketch(6);
        self.send(ClientMessage::DrawingComplete {
            drawing: encode_drawing(full.as_bytes()),
        })
    }

    /// Picks the right prompt with probability `accuracy`, otherwise any
    /// candidate. Changes its mind once before committing.
    fn answer(&mut self, phase: u32) -> Result<()> {
        if self.answered {
            return Ok(());
        }
        self.answered = true;

        let router = Arc::clone(&self.router);
        let session = router.session();
        let group = session.group_of(self.id)?;
        let snapshot = session
            .group_snapshot(group)
            .with_context(|| format!("group {group} vanished"))?;
        let truth = PhaseController::current_trial(&snapshot, phase)?.stim.clone();

        if let Some(first) = self.stims.choose(&mut self.rng).cloned() {
            self.send(ClientMessage::StimulusSelected { stim: first })?;
        }
        let response = if self.rng.random_bool(self.accuracy) {
            truth
        } else {
            self.stims.choose(&mut self.rng).cloned().unwrap_or(truth)
        };
        self.send(ClientMessage::ResponseComplete { response })
    }

    fn proceed(&mut self) -> Result<()> {
        if self.continued {
            return Ok(());
        }
        self.continued = true;
        self.send(ClientMessage::Continue)
    }

    fn sketch(&mut self, points: usize) -> String {
        let mut d = format!(
            "M{} {}",
            self.rng.random_range(0..400),
            self.rng.random_range(0..300)
        );
        for _ in 1..points {
            d.push_str(&format!(
                " L{} {}",
                self.rng.random_range(0..400),
                self.rng.random_range(0..300)
            ));
        }
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><path d=\"{d}\" fill=\"none\" \
             stroke=\"{STROKE_COLOR}\" stroke-width=\"{STROKE_WIDTH}\" stroke-linecap=\"round\" \
             data-is-user=\"true\"/></svg>"
        )
    }

    fn demographics(&mut self) -> Demographics {
        const GENDERS: [&str; 3] = ["female", "male", "non-binary"];
        Demographics {
            age: Some(self.rng.random_range(18..65)),
            gender: GENDERS.choose(&mut self.rng).map(|g| g.to_string()),
            native_language: Some("English".to_string()),
        }
    }
}
