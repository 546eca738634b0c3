pub mod messages;
pub mod sinks;

pub use messages::{Mode, ModeCommand, StatusEvent};
pub use sinks::{ChannelSink, ConsoleSink, CsvEventLog, EventSink, FanOutSink};
