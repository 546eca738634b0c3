// intersection_main.rs
use intersection_controller::communication::{ConsoleSink, CsvEventLog, EventSink, FanOutSink};
use intersection_controller::config::IntersectionConfig;
use intersection_controller::control_system::IntersectionCoordinator;
use intersection_controller::devices::LightColor;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match IntersectionConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                return;
            }
        },
        None => IntersectionConfig::default(),
    };

    let mut sink = FanOutSink::new().with(Arc::new(ConsoleSink));
    if let Some(path) = &config.event_log {
        println!("Logging events to {}", path.display());
        sink = sink.with(Arc::new(CsvEventLog::new(path)));
    }
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    let intersection = config.build_intersection(Arc::clone(&sink));
    let coordinator =
        IntersectionCoordinator::spawn(intersection, config.coordinator_settings(), sink);

    if let Err(e) = coordinator.start(config.vehicle_duration_ms, config.pedestrian_duration_ms) {
        eprintln!("Start error: {}", e);
        return;
    }

    run_cli(&coordinator, &config).await;

    if let Err(e) = coordinator.shutdown().await {
        eprintln!("Shutdown error: {}", e);
    }
}

// Admin console. An empty line forces fixture 1's green on, which the
// safety watcher should turn into hazard mode.
async fn run_cli(coordinator: &IntersectionCoordinator, config: &IntersectionConfig) {
    println!("Commands: [enter] | interfere <i> | resume | reset | status | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        };
        let mut words = line.split_whitespace();
        match words.next() {
            None => interfere(coordinator, 1),
            Some("interfere") => {
                let index = words.next().and_then(|w| w.parse().ok()).unwrap_or(1);
                interfere(coordinator, index);
            }
            Some("resume") => {
                if let Err(e) =
                    coordinator.start(config.vehicle_duration_ms, config.pedestrian_duration_ms)
                {
                    eprintln!("Resume error: {}", e);
                }
            }
            Some("reset") => coordinator.reset_all_lights(),
            Some("status") => {
                println!("Mode: {:?}", coordinator.mode());
                for (i, state) in coordinator.intersection().snapshots().iter().enumerate() {
                    println!("{}: {:?}", i, state);
                }
            }
            Some("quit") => {
                println!("Exiting.");
                break;
            }
            Some(other) => println!("Unknown command '{}'", other),
        }
    }
}

fn interfere(coordinator: &IntersectionCoordinator, index: usize) {
    match coordinator.fixture(index) {
        Some(fixture) => fixture.set_light(LightColor::Green, true),
        None => println!("No fixture {}", index),
    }
}
