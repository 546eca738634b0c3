use crate::communication::{EventSink, StatusEvent};
use crate::control_system::intersection::Intersection;
use crate::devices::LightColor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

// Leaves alternating mode: every fixture de-energised and disarmed.
pub fn enter_hazard(intersection: &Intersection) {
    intersection.set_operating(false);
    for fixture in intersection.fixtures() {
        fixture.set_operating(false);
        fixture.turn_all_off();
    }
}

/// One flash pass: in fixture order, green and yellow off, red toggled.
pub fn flash_once(intersection: &Intersection, sink: &dyn EventSink) {
    for fixture in intersection.fixtures() {
        sink.emit(StatusEvent::FixtureTurn {
            index: fixture.index(),
        });
        fixture.set_light(LightColor::Green, false);
        fixture.set_light(LightColor::Yellow, false);
        fixture.toggle_light(LightColor::Red);
    }
}

/// Flashes the reds every `interval` until the intersection is operating
/// again. It never restarts the alternating cycle itself.
pub async fn run_hazard_flasher(
    intersection: Arc<Intersection>,
    interval: Duration,
    sink: Arc<dyn EventSink>,
) {
    while !intersection.is_operating() {
        flash_once(&intersection, sink.as_ref());
        sleep(interval).await;
    }
    log::info!("[Hazard] Intersection operating again, flasher stopped");
}
