//! Website monitoring core: checks HTTP targets on a fixed interval, records
//! every outcome in an append-only event log and answers "what is the latest
//! status of each target".

pub mod config;
pub mod database;
pub mod monitoring;
pub mod pool;
pub mod status;

pub use config::{Config, ConfigError, RawConfig};
pub use database::{EventLog, EventStore, LatestPair, StoreError};
pub use monitoring::{CheckExecutor, PollScheduler, Target};
pub use status::{Snapshot, StatusService, TargetStatus};
