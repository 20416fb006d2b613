pub mod clock;
pub mod config;
pub mod event_sink;
pub mod jitter;
pub mod log;

pub use clock::{Clock, SystemClock};
pub use config::{Config, LlmConfig, LlmProvider, StorageConfig, WorkerConfig};
pub use event_sink::{EventSink, Fields, LogEventSink};
pub use jitter::{backoff_ms, Jitter, SystemJitter};
pub use log::{make_log, LogFormat};

#[cfg(any(test, feature = "testing"))]
pub use clock::FakeClock;
#[cfg(any(test, feature = "testing"))]
pub use event_sink::RecordingEventSink;
#[cfg(any(test, feature = "testing"))]
pub use jitter::FixedJitter;
