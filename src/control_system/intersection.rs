use crate::control_system::fixture::{Fixture, FixtureSnapshot};
use crate::global_variables::MAX_LIT_FIXTURES;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared state of a four-way (or n-way) intersection.
///
/// Fixture order is the round-robin order of the alternating cycle and the
/// flash order of hazard mode.
#[derive(Debug)]
pub struct Intersection {
    fixtures: Vec<Arc<Fixture>>,
    /// True while the alternating cycle is the active mode.
    is_operating: AtomicBool,
    /// Reserved, no behaviour depends on it yet.
    pedestrian_crossing_allowed: AtomicBool,
}

impl Intersection {
    pub fn new(fixtures: Vec<Fixture>) -> Self {
        Self {
            fixtures: fixtures.into_iter().map(Arc::new).collect(),
            is_operating: AtomicBool::new(false),
            pedestrian_crossing_allowed: AtomicBool::new(false),
        }
    }

    pub fn fixtures(&self) -> &[Arc<Fixture>] {
        &self.fixtures
    }

    pub fn fixture(&self, index: usize) -> Option<&Arc<Fixture>> {
        self.fixtures.get(index)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn is_operating(&self) -> bool {
        self.is_operating.load(Ordering::SeqCst)
    }

    pub fn set_operating(&self, operating: bool) {
        self.is_operating.store(operating, Ordering::SeqCst);
    }

    pub fn pedestrian_crossing_allowed(&self) -> bool {
        self.pedestrian_crossing_allowed.load(Ordering::SeqCst)
    }

    pub fn set_pedestrian_crossing_allowed(&self, allowed: bool) {
        self.pedestrian_crossing_allowed
            .store(allowed, Ordering::SeqCst);
    }

    /// Turns every fixture fully off and re-arms it for transitions.
    pub fn reset_all_lights(&self) {
        for fixture in &self.fixtures {
            fixture.turn_all_off();
            fixture.set_operating(true);
        }
    }

    // Number of fixtures currently showing green or yellow.
    pub fn lit_fixture_count(&self) -> usize {
        self.fixtures.iter().filter(|f| f.is_lit()).count()
    }

    pub fn has_conflict(&self) -> bool {
        self.lit_fixture_count() > MAX_LIT_FIXTURES
    }

    pub fn snapshots(&self) -> Vec<FixtureSnapshot> {
        self.fixtures.iter().map(|f| f.snapshot()).collect()
    }
}
