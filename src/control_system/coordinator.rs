use crate::communication::{EventSink, Mode, ModeCommand, StatusEvent};
use crate::config::CycleTiming;
use crate::control_system::alternating_cycle::run_alternating_cycle;
use crate::control_system::fixture::{Fixture, FixtureError};
use crate::control_system::hazard_flasher::{enter_hazard, run_hazard_flasher};
use crate::control_system::intersection::Intersection;
use crate::control_system::safety_watcher::{run_safety_watcher, WatcherPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{name} must be greater than zero")]
    InvalidDuration { name: &'static str },
    #[error("coordinator has stopped")]
    Stopped,
}

/// What to do when a fixture refuses a transition in the middle of a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Report the fault and leave the cycle stopped.
    #[default]
    Halt,
    EscalateToHazard,
    /// Start a fresh cycle with the last durations.
    RestartCycle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub timing: CycleTiming,
    pub watcher_policy: WatcherPolicy,
    pub fault_policy: FaultPolicy,
}

/// Handle to the coordinator of one intersection.
///
/// Mode transitions are sent to a single actor task which owns the alternating
/// cycle, the safety watcher and the hazard flasher. Dropping the handle stops
/// all of them.
pub struct IntersectionCoordinator {
    intersection: Arc<Intersection>,
    commands: mpsc::UnboundedSender<ModeCommand>,
    mode: watch::Receiver<Mode>,
    actor: JoinHandle<()>,
}

impl IntersectionCoordinator {
    /// Spawns the actor on the current tokio runtime.
    pub fn spawn(
        intersection: Arc<Intersection>,
        settings: CoordinatorSettings,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (mode_tx, mode) = watch::channel(Mode::Idle);
        let actor = CoordinatorActor {
            intersection: Arc::clone(&intersection),
            settings,
            sink,
            commands: commands.clone(),
            mode: mode_tx,
            epoch: 0,
            last_start: None,
            cycle: None,
            watcher: None,
            hazard: None,
        };
        let actor = tokio::spawn(actor.run(rx));

        Self {
            intersection,
            commands,
            mode,
            actor,
        }
    }

    /// Starts (or resumes) the alternating cycle without waiting for it.
    pub fn start(
        &self,
        vehicle_duration_ms: u64,
        pedestrian_duration_ms: u64,
    ) -> Result<(), CoordinatorError> {
        if vehicle_duration_ms == 0 {
            return Err(CoordinatorError::InvalidDuration {
                name: "vehicle_duration_ms",
            });
        }
        if pedestrian_duration_ms == 0 {
            return Err(CoordinatorError::InvalidDuration {
                name: "pedestrian_duration_ms",
            });
        }
        self.commands
            .send(ModeCommand::Start {
                vehicle_duration: Duration::from_millis(vehicle_duration_ms),
                pedestrian_duration: Duration::from_millis(pedestrian_duration_ms),
            })
            .map_err(|_| CoordinatorError::Stopped)
    }

    pub fn reset_all_lights(&self) {
        self.intersection.reset_all_lights();
    }

    pub fn mode(&self) -> Mode {
        *self.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.mode.clone()
    }

    pub fn intersection(&self) -> &Arc<Intersection> {
        &self.intersection
    }

    pub fn fixture(&self, index: usize) -> Option<&Arc<Fixture>> {
        self.intersection.fixture(index)
    }

    /// Cancels every running activity and waits for the actor to finish.
    pub async fn shutdown(self) -> Result<(), CoordinatorError> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(ModeCommand::Shutdown { done })
            .map_err(|_| CoordinatorError::Stopped)?;
        finished.await.map_err(|_| CoordinatorError::Stopped)
    }
}

impl Drop for IntersectionCoordinator {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

struct CoordinatorActor {
    intersection: Arc<Intersection>,
    settings: CoordinatorSettings,
    sink: Arc<dyn EventSink>,
    commands: mpsc::UnboundedSender<ModeCommand>,
    mode: watch::Sender<Mode>,
    // Bumped on every start; older watcher and cycle messages are ignored.
    epoch: u64,
    last_start: Option<(Duration, Duration)>,
    cycle: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
    hazard: Option<JoinHandle<()>>,
}

impl CoordinatorActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ModeCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                ModeCommand::Start {
                    vehicle_duration,
                    pedestrian_duration,
                } => self.start_alternating(vehicle_duration, pedestrian_duration).await,
                ModeCommand::Conflict {
                    epoch,
                    lit_fixtures,
                } => {
                    if epoch != self.epoch {
                        log::debug!("Ignoring conflict from stale watcher (epoch {})", epoch);
                        continue;
                    }
                    log::warn!(
                        "Conflict on {} fixtures, switching to hazard mode",
                        lit_fixtures
                    );
                    self.start_hazard().await;
                }
                ModeCommand::CycleEnded { epoch, result } => {
                    // A cycle already cancelled by a hazard entry may still
                    // have reported in.
                    if epoch != self.epoch
                        || self.cycle.is_none()
                        || *self.mode.borrow() == Mode::Hazard
                    {
                        log::debug!("Ignoring end of inactive cycle (epoch {})", epoch);
                        continue;
                    }
                    self.cycle = None;
                    self.handle_cycle_end(result).await;
                }
                ModeCommand::Shutdown { done } => {
                    self.cancel_all().await;
                    let _ = done.send(());
                    break;
                }
            }
        }
    }

    async fn start_alternating(&mut self, vehicle_duration: Duration, pedestrian_duration: Duration) {
        cancel(&mut self.hazard, "hazard flasher").await;
        cancel(&mut self.cycle, "alternating cycle").await;
        cancel(&mut self.watcher, "safety watcher").await;

        self.epoch += 1;
        self.last_start = Some((vehicle_duration, pedestrian_duration));
        self.intersection.reset_all_lights();
        self.intersection.set_operating(true);
        log::info!(
            "Starting alternating cycle (epoch {}, vehicle {:?}, pedestrian {:?})",
            self.epoch,
            vehicle_duration,
            pedestrian_duration
        );

        self.watcher = Some(tokio::spawn(run_safety_watcher(
            Arc::clone(&self.intersection),
            self.settings.timing.watcher_poll(),
            self.settings.watcher_policy,
            self.epoch,
            Arc::clone(&self.sink),
            self.commands.clone(),
        )));

        let cycle = run_alternating_cycle(
            Arc::clone(&self.intersection),
            vehicle_duration,
            self.settings.timing,
            Arc::clone(&self.sink),
        );
        let commands = self.commands.clone();
        let epoch = self.epoch;
        self.cycle = Some(tokio::spawn(async move {
            let result = cycle.await;
            let _ = commands.send(ModeCommand::CycleEnded { epoch, result });
        }));

        self.set_mode(Mode::Alternating);
    }

    async fn start_hazard(&mut self) {
        cancel(&mut self.cycle, "alternating cycle").await;
        cancel(&mut self.hazard, "hazard flasher").await;

        enter_hazard(&self.intersection);
        self.hazard = Some(tokio::spawn(run_hazard_flasher(
            Arc::clone(&self.intersection),
            self.settings.timing.hazard_flash(),
            Arc::clone(&self.sink),
        )));

        self.set_mode(Mode::Hazard);
    }

    async fn handle_cycle_end(&mut self, result: Result<(), FixtureError>) {
        let error = match result {
            Ok(()) => {
                log::info!("Alternating cycle finished");
                return;
            }
            Err(error) => error,
        };

        log::error!("Alternating cycle fault: {}", error);
        let FixtureError::NotOperating { fixture } = &error;
        self.sink.emit(StatusEvent::CycleFault {
            fixture: *fixture,
            message: error.to_string(),
        });

        // A conflict the watcher may already have reported wins over a restart.
        if self.intersection.has_conflict() {
            log::warn!("Conflict present at cycle fault, switching to hazard mode");
            self.start_hazard().await;
            return;
        }

        match self.settings.fault_policy {
            FaultPolicy::Halt => {}
            FaultPolicy::EscalateToHazard => self.start_hazard().await,
            FaultPolicy::RestartCycle => {
                if let Some((vehicle, pedestrian)) = self.last_start {
                    self.start_alternating(vehicle, pedestrian).await;
                }
            }
        }
    }

    async fn cancel_all(&mut self) {
        cancel(&mut self.cycle, "alternating cycle").await;
        cancel(&mut self.watcher, "safety watcher").await;
        cancel(&mut self.hazard, "hazard flasher").await;
    }

    fn set_mode(&self, mode: Mode) {
        if *self.mode.borrow() == mode {
            return;
        }
        self.mode.send_replace(mode);
        log::info!("Mode changed to {:?}", mode);
        self.sink.emit(StatusEvent::ModeChanged { mode });
    }
}

impl Drop for CoordinatorActor {
    fn drop(&mut self) {
        for handle in [&self.cycle, &self.watcher, &self.hazard].into_iter().flatten() {
            handle.abort();
        }
    }
}

// Cancelling something already cancelled or finished is a no-op. Waits until
// the task is gone so it cannot touch the lamps afterwards.
async fn cancel(slot: &mut Option<JoinHandle<()>>, name: &str) {
    let Some(handle) = slot.take() else {
        return;
    };
    if handle.is_finished() {
        log::debug!("{} already finished", name);
    } else {
        handle.abort();
    }
    match handle.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => log::debug!("Cancelled {}", name),
        Err(e) => log::warn!("{} ended abnormally: {}", name, e),
    }
}
