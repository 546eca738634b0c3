pub mod alternating_cycle;
pub mod coordinator;
pub mod fixture;
pub mod hazard_flasher;
pub mod intersection;
pub mod safety_watcher;

pub use coordinator::{CoordinatorError, CoordinatorSettings, FaultPolicy, IntersectionCoordinator};
pub use fixture::{Fixture, FixtureError, FixtureSnapshot};
pub use intersection::Intersection;
pub use safety_watcher::WatcherPolicy;
