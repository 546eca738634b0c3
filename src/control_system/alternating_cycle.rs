use crate::communication::{EventSink, StatusEvent};
use crate::config::CycleTiming;
use crate::control_system::fixture::FixtureError;
use crate::control_system::intersection::Intersection;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Services the fixtures strictly in list order, one full green-then-red
/// sequence each, for as long as the intersection is operating.
///
/// A fixture that is not operating ends the cycle with its error; the
/// coordinator decides what happens next.
pub async fn run_alternating_cycle(
    intersection: Arc<Intersection>,
    vehicle_duration: Duration,
    timing: CycleTiming,
    sink: Arc<dyn EventSink>,
) -> Result<(), FixtureError> {
    while intersection.is_operating() {
        for fixture in intersection.fixtures() {
            sink.emit(StatusEvent::FixtureTurn {
                index: fixture.index(),
            });

            fixture.change_to_green(timing.amber_to_green()).await?;
            sleep(fixture.green_hold(vehicle_duration)).await;
            fixture.change_to_red(timing.amber_to_red()).await?;
            sleep(timing.red_hold()).await;
        }
    }
    Ok(())
}
