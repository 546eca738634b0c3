use crate::communication::messages::StatusEvent;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Receives the status stream of fixtures and coordinator.
///
/// Fixtures call `emit` while holding their lamp lock, so light events arrive
/// in the order the lamps changed. An implementation must not call back into
/// a fixture.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

/// Prints every event to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: StatusEvent) {
        println!("{}", event);
    }
}

/// Forwards events, stamped with the tokio clock, over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(Instant, StatusEvent)>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Instant, StatusEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: StatusEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send((Instant::now(), event));
    }
}

/// Sends each event to every inner sink in order.
#[derive(Default, Clone)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanOutSink {
    fn emit(&self, event: StatusEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: u64,
    pub fixture: Option<usize>,
    pub kind: String,
    pub detail: String,
}

impl EventRecord {
    pub fn from_event(event: &StatusEvent) -> Self {
        Self {
            timestamp: current_timestamp(),
            fixture: event.fixture(),
            kind: event.kind().to_string(),
            detail: event.to_string().trim_end().to_string(),
        }
    }
}

/// Appends every event as a row of a CSV file.
#[derive(Debug)]
pub struct CsvEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for CsvEventLog {
    fn emit(&self, event: StatusEvent) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let record = EventRecord::from_event(&event);
        if let Err(e) = log_to_csv(&self.path, &record) {
            log::warn!("Error logging event to {}: {}", self.path.display(), e);
        }
    }
}

// Generic helper to log a record to a CSV file.
fn log_to_csv<T: Serialize>(path: &Path, record: &T) -> Result<(), Box<dyn Error>> {
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

/// Reads back every record of a CSV event log.
pub fn read_event_log(path: &Path) -> Result<Vec<EventRecord>, Box<dyn Error>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
