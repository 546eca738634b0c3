// End-to-end runs of the coordinator on a virtual clock.

use intersection_controller::communication::{ChannelSink, EventSink, Mode, StatusEvent};
use intersection_controller::config::IntersectionConfig;
use intersection_controller::control_system::IntersectionCoordinator;
use intersection_controller::devices::LightColor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Instant};

type Events = UnboundedReceiver<(Instant, StatusEvent)>;

fn four_way() -> (IntersectionCoordinator, Events) {
    let config = IntersectionConfig::default();
    let (sink, rx) = ChannelSink::new();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let intersection = config.build_intersection(Arc::clone(&sink));
    let coordinator =
        IntersectionCoordinator::spawn(intersection, config.coordinator_settings(), sink);
    (coordinator, rx)
}

// Collects events up to and including the first one matching `stop`.
async fn collect_until(
    rx: &mut Events,
    mut stop: impl FnMut(&StatusEvent) -> bool,
) -> Vec<(Instant, StatusEvent)> {
    let mut seen = Vec::new();
    timeout(Duration::from_secs(3600), async {
        while let Some((at, event)) = rx.recv().await {
            let done = stop(&event);
            seen.push((at, event));
            if done {
                break;
            }
        }
    })
    .await
    .expect("event never arrived");
    seen
}

fn is_light(event: &StatusEvent, fixture: usize, color: LightColor, on: bool) -> bool {
    *event
        == StatusEvent::Light {
            fixture,
            color,
            on,
        }
}

#[tokio::test(start_paused = true)]
async fn one_pass_services_fixtures_in_order_with_override() {
    let (coordinator, mut rx) = four_way();
    coordinator.start(30000, 60000).unwrap();

    let mut turns_seen = 0;
    let events = collect_until(&mut rx, |event| {
        if matches!(event, StatusEvent::FixtureTurn { .. }) {
            turns_seen += 1;
        }
        turns_seen == 5
    })
    .await;

    let order: Vec<usize> = events
        .iter()
        .filter_map(|(_, e)| match e {
            StatusEvent::FixtureTurn { index } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec![0, 1, 2, 3, 0]);

    for fixture in 0..4 {
        let green_on = events
            .iter()
            .find(|(_, e)| is_light(e, fixture, LightColor::Green, true))
            .map(|(at, _)| *at)
            .unwrap();
        let green_off = events
            .iter()
            .find(|(at, e)| *at > green_on && is_light(e, fixture, LightColor::Green, false))
            .map(|(at, _)| *at)
            .unwrap();
        let held = green_off - green_on;
        let expected = if fixture == 2 { 60000 } else { 30000 };
        assert!(
            held >= Duration::from_millis(expected) && held < Duration::from_millis(expected + 50),
            "fixture {} held green for {:?}",
            fixture,
            held
        );
    }

    // Never more than one fixture on green or yellow.
    let mut lit = [[false; 2]; 4];
    for (_, event) in &events {
        if let StatusEvent::Light { fixture, color, on } = event {
            match color {
                LightColor::Green => lit[*fixture][0] = *on,
                LightColor::Yellow => lit[*fixture][1] = *on,
                LightColor::Red => {}
            }
        }
        let count = lit.iter().filter(|l| l[0] || l[1]).count();
        assert!(count <= 1, "{} fixtures lit after {:?}", count, event);
    }
    assert!(!events
        .iter()
        .any(|(_, e)| matches!(e, StatusEvent::Hazard { .. })));
    assert_eq!(coordinator.mode(), Mode::Alternating);
}

#[tokio::test(start_paused = true)]
async fn forced_green_triggers_hazard_within_one_poll() {
    let (coordinator, mut rx) = four_way();
    let mut mode = coordinator.subscribe_mode();
    coordinator.start(30000, 60000).unwrap();

    collect_until(&mut rx, |e| is_light(e, 0, LightColor::Green, true)).await;
    tokio::time::sleep(Duration::from_millis(1234)).await;

    let forced_at = Instant::now();
    coordinator
        .fixture(1)
        .unwrap()
        .set_light(LightColor::Green, true);

    let events = collect_until(&mut rx, |e| matches!(e, StatusEvent::Hazard { .. })).await;
    let (hazard_at, hazard) = events.last().unwrap();
    assert_eq!(*hazard, StatusEvent::Hazard { lit_fixtures: 2 });
    assert_eq!(hazard.to_string(), "HAZARD!");
    assert!(*hazard_at - forced_at <= Duration::from_millis(100));

    mode.wait_for(|m| *m == Mode::Hazard).await.unwrap();
    assert!(!coordinator.intersection().is_operating());

    // The cycle is gone: nothing turns green or yellow any more.
    let later = collect_until(&mut rx, {
        let mut passes = 0;
        move |e| {
            if *e == (StatusEvent::FixtureTurn { index: 3 }) {
                passes += 1;
            }
            passes == 3
        }
    })
    .await;
    assert!(!later.iter().any(|(_, e)| matches!(
        e,
        StatusEvent::Light {
            color: LightColor::Green | LightColor::Yellow,
            on: true,
            ..
        }
    )));
    assert!(coordinator
        .intersection()
        .snapshots()
        .iter()
        .all(|s| !s.is_lit()));
}

#[tokio::test(start_paused = true)]
async fn hazard_flashes_reds_in_order() {
    let (coordinator, mut rx) = four_way();
    coordinator.start(30000, 60000).unwrap();
    collect_until(&mut rx, |e| is_light(e, 0, LightColor::Green, true)).await;
    coordinator
        .fixture(3)
        .unwrap()
        .set_light(LightColor::Yellow, true);
    collect_until(&mut rx, |e| {
        *e == (StatusEvent::ModeChanged { mode: Mode::Hazard })
    })
    .await;

    // Three flash passes: each red toggles once per pass, in fixture order.
    let mut red_toggles = 0;
    let events = collect_until(&mut rx, |e| {
        if matches!(
            e,
            StatusEvent::Light {
                color: LightColor::Red,
                ..
            }
        ) {
            red_toggles += 1;
        }
        red_toggles == 12
    })
    .await;

    let reds: Vec<(usize, bool)> = events
        .iter()
        .filter_map(|(_, e)| match e {
            StatusEvent::Light {
                fixture,
                color: LightColor::Red,
                on,
            } => Some((*fixture, *on)),
            _ => None,
        })
        .collect();
    let expected: Vec<(usize, bool)> = [true, false, true]
        .iter()
        .flat_map(|&on| (0..4).map(move |f| (f, on)))
        .collect();
    assert_eq!(reds, expected);

    let turns: Vec<usize> = events
        .iter()
        .filter_map(|(_, e)| match e {
            StatusEvent::FixtureTurn { index } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(turns, vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]);

    // Passes are two seconds apart.
    let first = events.first().unwrap().0;
    let last = events.last().unwrap().0;
    assert!(last - first >= Duration::from_millis(4000));
    assert!(coordinator
        .intersection()
        .snapshots()
        .iter()
        .all(|s| !s.is_lit() && !s.operating));
}

#[tokio::test(start_paused = true)]
async fn resume_resets_every_fixture_before_first_transition() {
    let (coordinator, mut rx) = four_way();
    let mut mode = coordinator.subscribe_mode();
    coordinator.start(30000, 60000).unwrap();
    collect_until(&mut rx, |e| is_light(e, 0, LightColor::Green, true)).await;
    coordinator
        .fixture(2)
        .unwrap()
        .set_light(LightColor::Green, true);
    mode.wait_for(|m| *m == Mode::Hazard).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5000)).await;

    coordinator.start(30000, 60000).unwrap();
    mode.wait_for(|m| *m == Mode::Alternating).await.unwrap();
    // The flasher also announces fixture 0, so wait for the cycle's turn.
    let mut resumed = false;
    let events = collect_until(&mut rx, |e| {
        if *e
            == (StatusEvent::ModeChanged {
                mode: Mode::Alternating,
            })
        {
            resumed = true;
        }
        resumed && *e == (StatusEvent::FixtureTurn { index: 0 })
    })
    .await;

    let switched = events
        .iter()
        .rposition(|(_, e)| {
            *e == (StatusEvent::ModeChanged {
                mode: Mode::Alternating,
            })
        })
        .unwrap();
    assert!(switched >= 12);
    let reset: Vec<&StatusEvent> = events[switched - 12..switched]
        .iter()
        .map(|(_, e)| e)
        .collect();
    for (i, event) in reset.iter().enumerate() {
        match event {
            StatusEvent::Light { fixture, on, .. } => {
                assert_eq!(*fixture, i / 3);
                assert!(!on);
            }
            other => panic!("unexpected {:?} during reset", other),
        }
    }
    assert!(!events[switched..]
        .iter()
        .any(|(_, e)| matches!(e, StatusEvent::Light { .. })));

    assert!(coordinator.intersection().is_operating());
    // Fixture 0 may already be in its amber phase; the rest are still dark.
    let states = coordinator.intersection().snapshots();
    assert!(states.iter().all(|s| s.operating));
    assert!(!states[0].green && !states[0].red);
    assert!(states[1..].iter().all(|s| !s.green && !s.yellow && !s.red));

    // Back to normal sequencing.
    collect_until(&mut rx, |e| is_light(e, 0, LightColor::Green, true)).await;
    assert_eq!(coordinator.mode(), Mode::Alternating);
}

#[tokio::test(start_paused = true)]
async fn one_shot_watcher_ignores_second_hazard() {
    let (coordinator, mut rx) = four_way();
    coordinator.start(30000, 60000).unwrap();
    collect_until(&mut rx, |e| is_light(e, 0, LightColor::Green, true)).await;
    coordinator
        .fixture(1)
        .unwrap()
        .set_light(LightColor::Green, true);
    collect_until(&mut rx, |e| matches!(e, StatusEvent::Hazard { .. })).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    coordinator
        .fixture(0)
        .unwrap()
        .set_light(LightColor::Green, true);
    coordinator
        .fixture(1)
        .unwrap()
        .set_light(LightColor::Green, true);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut hazards = 0;
    while let Ok((_, event)) = rx.try_recv() {
        if matches!(event, StatusEvent::Hazard { .. }) {
            hazards += 1;
        }
    }
    assert_eq!(hazards, 0);
}

#[tokio::test(start_paused = true)]
async fn continuous_watcher_reenters_hazard() {
    let config = IntersectionConfig::from_json(r#"{"watcher_policy": "continuous"}"#).unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let intersection = config.build_intersection(Arc::clone(&sink));
    let coordinator =
        IntersectionCoordinator::spawn(intersection, config.coordinator_settings(), sink);
    coordinator.start(30000, 60000).unwrap();

    collect_until(&mut rx, |e| is_light(e, 0, LightColor::Green, true)).await;
    coordinator
        .fixture(1)
        .unwrap()
        .set_light(LightColor::Green, true);
    collect_until(&mut rx, |e| matches!(e, StatusEvent::Hazard { .. })).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let forced_at = Instant::now();
    coordinator
        .fixture(2)
        .unwrap()
        .set_light(LightColor::Green, true);
    coordinator
        .fixture(3)
        .unwrap()
        .set_light(LightColor::Yellow, true);
    let events = collect_until(&mut rx, |e| matches!(e, StatusEvent::Hazard { .. })).await;
    assert!(events.last().unwrap().0 - forced_at <= Duration::from_millis(100));

    // Re-entry forces the lamps off again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(coordinator.mode(), Mode::Hazard);
    assert_eq!(coordinator.intersection().lit_fixture_count(), 0);
}
