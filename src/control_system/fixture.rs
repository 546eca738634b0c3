use crate::communication::{EventSink, StatusEvent};
use crate::devices::{LightColor, LightDevice, LightEvent};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("traffic lights of fixture {fixture} are off")]
    NotOperating { fixture: usize },
}

/// The three lamps of one fixture.
#[derive(Debug, Clone)]
struct Lamps {
    green: LightDevice,
    yellow: LightDevice,
    red: LightDevice,
}

impl Lamps {
    fn get(&self, color: LightColor) -> &LightDevice {
        match color {
            LightColor::Green => &self.green,
            LightColor::Yellow => &self.yellow,
            LightColor::Red => &self.red,
        }
    }

    fn get_mut(&mut self, color: LightColor) -> &mut LightDevice {
        match color {
            LightColor::Green => &mut self.green,
            LightColor::Yellow => &mut self.yellow,
            LightColor::Red => &mut self.red,
        }
    }
}

/// Point-in-time view of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSnapshot {
    pub green: bool,
    pub yellow: bool,
    pub red: bool,
    pub operating: bool,
}

impl FixtureSnapshot {
    /// Green or yellow showing, i.e. traffic is released on this arm.
    pub fn is_lit(&self) -> bool {
        self.green || self.yellow
    }
}

/// One arm of the intersection: a green, a yellow and a red lamp plus an
/// optional green hold that replaces the shared vehicle duration.
///
/// Lamp state sits behind a mutex that is never held across a timed hold, so
/// the watcher always sees the state between two switching steps.
pub struct Fixture {
    index: usize,
    allow_duration: Option<Duration>,
    lamps: Mutex<Lamps>,
    is_operating: AtomicBool,
    sink: Arc<dyn EventSink>,
}

impl Fixture {
    pub fn new(index: usize, allow_duration: Option<Duration>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            index,
            allow_duration,
            lamps: Mutex::new(Lamps {
                green: LightDevice::new(LightColor::Green),
                yellow: LightDevice::new(LightColor::Yellow),
                red: LightDevice::new(LightColor::Red),
            }),
            is_operating: AtomicBool::new(false),
            sink,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn allow_duration(&self) -> Option<Duration> {
        self.allow_duration
    }

    /// The green hold for this arm: its own override, else the shared default.
    pub fn green_hold(&self, vehicle_duration: Duration) -> Duration {
        self.allow_duration.unwrap_or(vehicle_duration)
    }

    pub fn is_operating(&self) -> bool {
        self.is_operating.load(Ordering::SeqCst)
    }

    pub fn set_operating(&self, operating: bool) {
        self.is_operating.store(operating, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> FixtureSnapshot {
        let lamps = self.lamps();
        FixtureSnapshot {
            green: lamps.green.is_on(),
            yellow: lamps.yellow.is_on(),
            red: lamps.red.is_on(),
            operating: self.is_operating(),
        }
    }

    pub fn is_lit(&self) -> bool {
        let lamps = self.lamps();
        lamps.green.is_on() || lamps.yellow.is_on()
    }

    pub fn is_on(&self, color: LightColor) -> bool {
        self.lamps().get(color).is_on()
    }

    /// Amber phase, then green: yellow on, hold, yellow and red off, green on.
    pub async fn change_to_green(&self, amber: Duration) -> Result<(), FixtureError> {
        self.ensure_operating()?;

        self.switch(&[(LightColor::Yellow, true)]);
        sleep(amber).await;
        self.switch(&[
            (LightColor::Yellow, false),
            (LightColor::Red, false),
            (LightColor::Green, true),
        ]);
        Ok(())
    }

    /// Green off and amber phase, then red.
    pub async fn change_to_red(&self, amber: Duration) -> Result<(), FixtureError> {
        self.ensure_operating()?;

        self.switch(&[(LightColor::Green, false), (LightColor::Yellow, true)]);
        sleep(amber).await;
        self.switch(&[(LightColor::Yellow, false), (LightColor::Red, true)]);
        Ok(())
    }

    pub fn turn_all_off(&self) {
        self.switch(&[
            (LightColor::Yellow, false),
            (LightColor::Red, false),
            (LightColor::Green, false),
        ]);
    }

    pub fn turn_all_on(&self) {
        self.switch(&[
            (LightColor::Yellow, true),
            (LightColor::Red, true),
            (LightColor::Green, true),
        ]);
    }

    /// Switches a single lamp directly, bypassing the transition sequences.
    pub fn set_light(&self, color: LightColor, on: bool) {
        self.switch(&[(color, on)]);
    }

    pub fn toggle_light(&self, color: LightColor) {
        let mut lamps = self.lamps();
        let event = lamps.get_mut(color).toggle();
        self.publish(&[event]);
    }

    fn ensure_operating(&self) -> Result<(), FixtureError> {
        if self.is_operating() {
            Ok(())
        } else {
            Err(FixtureError::NotOperating {
                fixture: self.index,
            })
        }
    }

    // Steps are applied and reported under one lock, so the event order
    // always matches the order the lamps changed in.
    fn switch(&self, steps: &[(LightColor, bool)]) {
        let mut lamps = self.lamps();
        let events: Vec<LightEvent> = steps
            .iter()
            .map(|&(color, on)| lamps.get_mut(color).set(on))
            .collect();
        self.publish(&events);
    }

    fn publish(&self, events: &[LightEvent]) {
        for event in events {
            self.sink.emit(StatusEvent::light(self.index, *event));
        }
    }

    fn lamps(&self) -> MutexGuard<'_, Lamps> {
        self.lamps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("index", &self.index)
            .field("allow_duration", &self.allow_duration)
            .field("state", &self.snapshot())
            .finish()
    }
}
