use crate::{
    classify::ClassifierTable,
    clock::{BASE_TICK_RATE, DEFAULT_SPEED},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "rewind.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewindConfig {
    /// Root of the autosave directory and explicit saves.
    #[serde(default = "default_save_dir")]
    pub save_dir:   PathBuf,
    /// Ticks per second at speed 1.0.
    #[serde(default = "default_tick_rate")]
    pub tick_rate:  f64,
    #[serde(default = "default_speed")]
    pub speed:      f64,
    #[serde(default)]
    pub classifier: ClassifierTable,
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("replays")
}

fn default_tick_rate() -> f64 {
    BASE_TICK_RATE
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            save_dir:   default_save_dir(),
            tick_rate:  default_tick_rate(),
            speed:      default_speed(),
            classifier: ClassifierTable::default(),
        }
    }
}

impl RewindConfig {
    /// Load `<data_dir>/rewind.json`. A relative `save_dir` is resolved
    /// against `data_dir`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/{CONFIG_FILE}");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: RewindConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if config.save_dir.is_relative() {
            config.save_dir = PathBuf::from(data_dir).join(&config.save_dir);
        }
        Ok(config)
    }

    /// Defaults with a fresh save directory under the system temp dir.
    pub fn default_test() -> Self {
        Self {
            save_dir: std::env::temp_dir().join(format!("rewind-test-{}", uuid::Uuid::new_v4())),
            ..Self::default()
        }
    }

    pub fn with_classifier(mut self, classifier: ClassifierTable) -> Self {
        self.classifier = classifier;
        self
    }
}
