//! Event logging and recording.
//!
//! - [`JsonlEventRecorder`]: appends operation events to a JSONL file
//! - [`TracingEventSink`]: mirrors operation events to `tracing`
//! - [`RecordingEventSink`]: records every event, then forwards it

mod jsonl_recorder;
mod recording_sink;
mod tracing_sink;

pub use jsonl_recorder::JsonlEventRecorder;
pub use recording_sink::RecordingEventSink;
pub use tracing_sink::TracingEventSink;
