use crate::communication::EventSink;
use crate::control_system::coordinator::{CoordinatorSettings, FaultPolicy};
use crate::control_system::fixture::Fixture;
use crate::control_system::intersection::Intersection;
use crate::control_system::safety_watcher::WatcherPolicy;
use crate::global_variables::{
    AMBER_TO_GREEN_MS, AMBER_TO_RED_MS, DEFAULT_FIXTURE_COUNT, DEFAULT_OVERRIDE_DURATION_MS,
    DEFAULT_OVERRIDE_FIXTURE, DEFAULT_PEDESTRIAN_DURATION_MS, DEFAULT_VEHICLE_DURATION_MS,
    HAZARD_FLASH_MS, RED_HOLD_MS, WATCHER_POLL_MS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("an intersection needs at least one fixture")]
    NoFixtures,
    #[error("{name} must be greater than zero")]
    InvalidDuration { name: String },
}

/// Fixed holds of the cycle plus the watcher and flasher cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleTiming {
    pub amber_to_green_ms: u64,
    pub amber_to_red_ms: u64,
    pub red_hold_ms: u64,
    pub watcher_poll_ms: u64,
    pub hazard_flash_ms: u64,
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self {
            amber_to_green_ms: AMBER_TO_GREEN_MS,
            amber_to_red_ms: AMBER_TO_RED_MS,
            red_hold_ms: RED_HOLD_MS,
            watcher_poll_ms: WATCHER_POLL_MS,
            hazard_flash_ms: HAZARD_FLASH_MS,
        }
    }
}

impl CycleTiming {
    pub fn amber_to_green(&self) -> Duration {
        Duration::from_millis(self.amber_to_green_ms)
    }

    pub fn amber_to_red(&self) -> Duration {
        Duration::from_millis(self.amber_to_red_ms)
    }

    pub fn red_hold(&self) -> Duration {
        Duration::from_millis(self.red_hold_ms)
    }

    pub fn watcher_poll(&self) -> Duration {
        Duration::from_millis(self.watcher_poll_ms)
    }

    pub fn hazard_flash(&self) -> Duration {
        Duration::from_millis(self.hazard_flash_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("timing.amber_to_green_ms", self.amber_to_green_ms),
            ("timing.amber_to_red_ms", self.amber_to_red_ms),
            ("timing.red_hold_ms", self.red_hold_ms),
            ("timing.watcher_poll_ms", self.watcher_poll_ms),
            ("timing.hazard_flash_ms", self.hazard_flash_ms),
        ];
        for (name, value) in fields {
            require_positive(name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Green hold for this fixture only, replacing the shared vehicle duration.
    pub allow_duration_ms: Option<u64>,
}

/// Everything needed to assemble and run one intersection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    pub vehicle_duration_ms: u64,
    pub pedestrian_duration_ms: u64,
    pub fixtures: Vec<FixtureConfig>,
    pub timing: CycleTiming,
    pub watcher_policy: WatcherPolicy,
    pub fault_policy: FaultPolicy,
    /// CSV file the status stream is appended to, if any.
    pub event_log: Option<PathBuf>,
}

impl Default for IntersectionConfig {
    // Four arms, the third one holding green for a minute.
    fn default() -> Self {
        let fixtures = (0..DEFAULT_FIXTURE_COUNT)
            .map(|i| FixtureConfig {
                allow_duration_ms: (i == DEFAULT_OVERRIDE_FIXTURE)
                    .then_some(DEFAULT_OVERRIDE_DURATION_MS),
            })
            .collect();
        Self {
            vehicle_duration_ms: DEFAULT_VEHICLE_DURATION_MS,
            pedestrian_duration_ms: DEFAULT_PEDESTRIAN_DURATION_MS,
            fixtures,
            timing: CycleTiming::default(),
            watcher_policy: WatcherPolicy::default(),
            fault_policy: FaultPolicy::default(),
            event_log: None,
        }
    }
}

impl IntersectionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fixtures.is_empty() {
            return Err(ConfigError::NoFixtures);
        }
        require_positive("vehicle_duration_ms", self.vehicle_duration_ms)?;
        require_positive("pedestrian_duration_ms", self.pedestrian_duration_ms)?;
        for (i, fixture) in self.fixtures.iter().enumerate() {
            if let Some(ms) = fixture.allow_duration_ms {
                require_positive(&format!("fixtures[{}].allow_duration_ms", i), ms)?;
            }
        }
        self.timing.validate()
    }

    /// Builds the fixtures in configured order, all reporting to `sink`.
    pub fn build_intersection(&self, sink: Arc<dyn EventSink>) -> Arc<Intersection> {
        let fixtures = self
            .fixtures
            .iter()
            .enumerate()
            .map(|(i, f)| {
                Fixture::new(
                    i,
                    f.allow_duration_ms.map(Duration::from_millis),
                    Arc::clone(&sink),
                )
            })
            .collect();
        Arc::new(Intersection::new(fixtures))
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            timing: self.timing,
            watcher_policy: self.watcher_policy,
            fault_policy: self.fault_policy,
        }
    }
}

fn require_positive(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidDuration {
            name: name.to_string(),
        });
    }
    Ok(())
}
