// Timed holds of the alternating cycle (milliseconds)
pub const AMBER_TO_GREEN_MS: u64 = 2000;
pub const AMBER_TO_RED_MS: u64 = 5000;
pub const RED_HOLD_MS: u64 = 5000;

// Safety watcher and hazard flasher cadence (milliseconds)
pub const WATCHER_POLL_MS: u64 = 100;
pub const HAZARD_FLASH_MS: u64 = 2000;

// Default four-way intersection
pub const DEFAULT_VEHICLE_DURATION_MS: u64 = 30000;
pub const DEFAULT_PEDESTRIAN_DURATION_MS: u64 = 60000;
pub const DEFAULT_FIXTURE_COUNT: usize = 4;
pub const DEFAULT_OVERRIDE_FIXTURE: usize = 2;
pub const DEFAULT_OVERRIDE_DURATION_MS: u64 = 60000;

// More than this many fixtures showing green or yellow at once is a hazard.
pub const MAX_LIT_FIXTURES: usize = 1;
