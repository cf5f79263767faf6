//! Build scheduling for the Ferry CI coordinator.
//!
//! [`store::BuildStore`] owns builds, agents and their assignments;
//! [`scheduler::Scheduler`] pairs pending builds with idle agents after every
//! state change; [`monitor::LivenessMonitor`] probes agents in the background.

pub mod monitor;
pub mod scheduler;
pub mod store;

pub use monitor::{LivenessMonitor, MonitorConfig};
pub use scheduler::{MatchSummary, Scheduler, SchedulerConfig};
pub use store::{ABANDONED_MESSAGE, BuildStore, Offer, Registration, RegistrationPolicy};
