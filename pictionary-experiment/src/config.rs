use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ExperimentError, Result};

/// Fixed by the experiment design; groups are always pairs.
pub const PLAYERS_PER_GROUP: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub name: String,
    pub session_id: String,
    /// Advisory drawing budget shown to the client as a countdown. The server
    /// never cuts a trial short when it runs out.
    pub drawing_time_secs: f64,
    /// Presentation flags forwarded to clients in `init`.
    pub live_draw: bool,
    pub blur: bool,
    pub players_per_group: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "pictionary_wait_for_complete".to_string(),
            session_id: "local".to_string(),
            drawing_time_secs: 60.0,
            live_draw: false,
            blur: false,
            players_per_group: PLAYERS_PER_GROUP,
        }
    }
}

impl ExperimentConfig {
    /// Named session configurations
    pub fn presets() -> Vec<Self> {
        let base = Self::default();
        vec![
            Self {
                name: "pictionary_live_drawing".into(),
                live_draw: true,
                blur: true,
                ..base.clone()
            },
            Self {
                name: "pictionary_live_drawing_no_blur".into(),
                live_draw: true,
                blur: false,
                ..base.clone()
            },
            base,
        ]
    }

    pub fn preset(name: &str) -> Result<Self> {
        Self::presets()
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ExperimentError::Config(format!("unknown preset `{name}`")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.players_per_group != PLAYERS_PER_GROUP {
            return Err(ExperimentError::Config(format!(
                "players_per_group must be {PLAYERS_PER_GROUP}, got {}",
                self.players_per_group
            )));
        }
        if !(self.drawing_time_secs.is_finite() && self.drawing_time_secs > 0.0) {
            return Err(ExperimentError::Config(format!(
                "drawing_time_secs must be positive, got {}",
                self.drawing_time_secs
            )));
        }
        Ok(())
    }
}
