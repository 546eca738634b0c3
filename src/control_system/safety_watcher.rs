use crate::communication::{EventSink, ModeCommand, StatusEvent};
use crate::control_system::intersection::Intersection;
use crate::global_variables::MAX_LIT_FIXTURES;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;

/// What the watcher does after its first escalation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherPolicy {
    /// Escalate once, then stop until the next alternating start.
    #[default]
    OneShot,
    /// Keep polling through hazard mode and escalate on every new conflict.
    Continuous,
}

/// Polls the intersection for more than one lit fixture and reports a
/// conflict to the coordinator.
///
/// The check runs immediately and then once per `poll`, so a conflict is
/// seen within one poll interval of its start. Under `Continuous` a conflict
/// is reported on its rising edge only.
pub async fn run_safety_watcher(
    intersection: Arc<Intersection>,
    poll: Duration,
    policy: WatcherPolicy,
    epoch: u64,
    sink: Arc<dyn EventSink>,
    commands: UnboundedSender<ModeCommand>,
) {
    let mut in_conflict = false;
    loop {
        let lit_fixtures = intersection.lit_fixture_count();
        if lit_fixtures > MAX_LIT_FIXTURES {
            if !in_conflict {
                log::warn!(
                    "[Watcher] {} fixtures show green or yellow at once",
                    lit_fixtures
                );
                sink.emit(StatusEvent::Hazard { lit_fixtures });
                if commands
                    .send(ModeCommand::Conflict {
                        epoch,
                        lit_fixtures,
                    })
                    .is_err()
                {
                    log::debug!("[Watcher] Coordinator gone, stopping");
                    return;
                }
                if policy == WatcherPolicy::OneShot {
                    return;
                }
                in_conflict = true;
            }
        } else {
            in_conflict = false;
        }

        sleep(poll).await;
    }
}
