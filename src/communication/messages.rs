use crate::control_system::fixture::FixtureError;
use crate::devices::{LightColor, LightEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

/// Operating mode of the intersection as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Constructed, `start` not called yet.
    Idle,
    Alternating,
    Hazard,
}

/// Everything the controller reports to the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StatusEvent {
    /// A fixture is about to be serviced (cycle) or flashed (hazard).
    FixtureTurn { index: usize },
    Light {
        fixture: usize,
        color: LightColor,
        on: bool,
    },
    Hazard { lit_fixtures: usize },
    ModeChanged { mode: Mode },
    CycleFault { fixture: usize, message: String },
}

impl StatusEvent {
    pub fn light(fixture: usize, event: LightEvent) -> Self {
        StatusEvent::Light {
            fixture,
            color: event.color,
            on: event.on,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StatusEvent::FixtureTurn { .. } => "fixture_turn",
            StatusEvent::Light { .. } => "light",
            StatusEvent::Hazard { .. } => "hazard",
            StatusEvent::ModeChanged { .. } => "mode_changed",
            StatusEvent::CycleFault { .. } => "cycle_fault",
        }
    }

    pub fn fixture(&self) -> Option<usize> {
        match self {
            StatusEvent::FixtureTurn { index } => Some(*index),
            StatusEvent::Light { fixture, .. } | StatusEvent::CycleFault { fixture, .. } => {
                Some(*fixture)
            }
            StatusEvent::Hazard { .. } | StatusEvent::ModeChanged { .. } => None,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::FixtureTurn { index } => write!(f, "{}: ", index),
            StatusEvent::Light { color, on, .. } => fmt::Display::fmt(
                &LightEvent {
                    color: *color,
                    on: *on,
                },
                f,
            ),
            StatusEvent::Hazard { .. } => f.write_str("HAZARD!"),
            StatusEvent::ModeChanged { mode } => write!(f, "Mode changed to {:?}", mode),
            StatusEvent::CycleFault { fixture, message } => write!(f, "{}: {}", fixture, message),
        }
    }
}

/// Requests handled by the coordinator actor. Every mode transition goes
/// through this channel; the actor alone owns the task handles.
#[derive(Debug)]
pub enum ModeCommand {
    Start {
        vehicle_duration: Duration,
        pedestrian_duration: Duration,
    },
    /// Sent by a safety watcher started in `epoch`.
    Conflict { epoch: u64, lit_fixtures: usize },
    /// Sent when the alternating cycle of `epoch` returns.
    CycleEnded {
        epoch: u64,
        result: Result<(), FixtureError>,
    },
    Shutdown { done: oneshot::Sender<()> },
}
