/// Monitoring engine module - checks targets and records the outcome
///
/// This module is responsible for:
/// - Fetching HTTP/HTTPS targets
/// - Classifying each check into connection and content events
/// - Scheduling fixed-interval rounds over the target set
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use checker::{CheckError, Checker, HttpChecker};
pub use executor::{CheckExecutor, CheckOutcome};
pub use scheduler::PollScheduler;
pub use types::{ConnectionStatus, ContentStatus, Event, EventKind, EventStatus, Target};
