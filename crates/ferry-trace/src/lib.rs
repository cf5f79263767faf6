//! Logging for Ferry CI.
//!
//! Installs the process-wide `tracing` subscriber and provides spans that
//! carry build, stage and agent attributes.

pub mod logging;
pub mod spans;

pub use logging::{LogFormat, LoggingConfig, LoggingError, init_logging};
pub use spans::{agent_span, build_span, stage_span};
