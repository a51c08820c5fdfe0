use anyhow::{Context, Result, bail};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use pictionary_core::{GroupId, ParticipantId, StimulusCatalog};
use pictionary_experiment::{ClientMessage, ExperimentConfig, ServerMessage, Session, write_csv};
use pictionary_timing::SystemClock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::SimulatedClient;
use crate::{Cli, Command};

/// Delivers replies from the session to the simulated clients' inboxes,
/// fanning broadcasts out to both members of the sender's group.
///
/// A pair shares one delivery lock held from `live` until every reply is
/// queued, so each inbox sees replies in the order the group applied them.
pub struct Router {
    session: Arc<Session<SystemClock>>,
    inboxes: HashMap<ParticipantId, Sender<ServerMessage>>,
    pairs: HashMap<ParticipantId, Pair>,
}

struct Pair {
    members: [ParticipantId; 2],
    delivery: Arc<Mutex<()>>,
}

impl Router {
    pub fn session(&self) -> &Session<SystemClock> {
        &self.session
    }

    pub fn send(&self, from: ParticipantId, message: &ClientMessage) -> Result<()> {
        let pair = self
            .pairs
            .get(&from)
            .with_context(|| format!("participant {from} has no pair"))?;
        let _delivery = pair.delivery.lock();

        let raw = serde_json::to_string(message)?;
        let reply = self
            .session
            .live_json(from, &raw)
            .with_context(|| format!("participant {from} sent {}", message.name()))?;

        let Value::Object(entries) = reply else {
            bail!("reply is not a recipient map");
        };
        for (key, value) in entries {
            let message: ServerMessage = serde_json::from_value(value)?;
            let recipients: Vec<ParticipantId> = if key == "0" {
                pair.members.to_vec()
            } else {
                vec![ParticipantId(key.parse().context("recipient key")?)]
            };
            for to in recipients {
                if let Some(inbox) = self.inboxes.get(&to) {
                    // receiver gone means that client already finished
                    let _ = inbox.send(message.clone());
                }
            }
        }
        Ok(())
    }
}

pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    pub fn run(self) -> Result<()> {
        match self.cli.command {
            Command::Presets => {
                let presets = ExperimentConfig::presets();
                println!("{}", serde_json::to_string_pretty(&presets)?);
                Ok(())
            }
            Command::Simulate {
                groups,
                seed,
                preset,
                config,
                accuracy,
                out,
            } => {
                let config = match config {
                    Some(path) => ExperimentConfig::from_json_file(&path)
                        .with_context(|| format!("loading {}", path.display()))?,
                    None => ExperimentConfig::preset(&preset)?,
                };
                if !(0.0..=1.0).contains(&accuracy) {
                    bail!("accuracy must be within 0..=1, got {accuracy}");
                }
                simulate(config, groups, seed, accuracy, out)
            }
        }
    }
}

fn simulate(
    config: ExperimentConfig,
    group_count: u32,
    seed: Option<u64>,
    accuracy: f64,
    out: Option<PathBuf>,
) -> Result<()> {
    info!(
        config = %config.name,
        groups = group_count,
        drawing_time = config.drawing_time_secs,
        "starting simulation"
    );

    let mut session = Session::new(config, StimulusCatalog::standard(), SystemClock)?;
    if let Some(seed) = seed {
        session = session.with_seed(seed);
    }
    let session = Arc::new(session);

    let participants: Vec<_> = (1..=group_count * 2).map(ParticipantId).collect();
    let groups = session.form_groups(&participants)?;

    let mut pairs = HashMap::new();
    for group in &groups {
        let snapshot = session
            .group_snapshot(*group)
            .with_context(|| format!("group {group} vanished"))?;
        let members = snapshot.member_ids();
        let delivery = Arc::new(Mutex::new(()));
        for id in members {
            pairs.insert(
                id,
                Pair {
                    members,
                    delivery: Arc::clone(&delivery),
                },
            );
        }
    }

    let mut inboxes = HashMap::new();
    let mut receivers = Vec::new();
    for id in &participants {
        let (tx, rx) = channel::unbounded();
        inboxes.insert(*id, tx);
        receivers.push((*id, rx));
    }
    let router = Arc::new(Router {
        session: Arc::clone(&session),
        inboxes,
        pairs,
    });

    let results: Vec<Result<()>> = std::thread::scope(|s| {
        let handles: Vec<_> = receivers
            .into_iter()
            .map(|(id, rx)| {
                let router = Arc::clone(&router);
                let client_seed = seed.map(|base| base ^ u64::from(id.0));
                s.spawn(move || SimulatedClient::new(id, router, rx, accuracy, client_seed).run())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("client thread panicked")))
            })
            .collect()
    });
    for result in results {
        if let Err(e) = result {
            warn!(error = %e, "client failed");
            return Err(e);
        }
    }

    report(&session, &groups);

    let rows = session.export_rows();
    match out {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(&rows, BufWriter::new(file))?;
            info!(rows = rows.len(), path = %path.display(), "export written");
        }
        None => write_csv(&rows, io::stdout().lock())?,
    }
    Ok(())
}

fn report(session: &Session<SystemClock>, groups: &[GroupId]) {
    for group in groups {
        let Some(snapshot) = session.group_snapshot(*group) else {
            continue;
        };
        let trials: Vec<_> = snapshot.phases.values().flat_map(|r| r.trials.iter()).collect();
        let correct = trials.iter().filter(|t| t.response.correct).count();
        info!(
            group = %group,
            trials = trials.len(),
            correct,
            complete = session.is_experiment_complete(*group),
            "group finished"
        );
    }
}
