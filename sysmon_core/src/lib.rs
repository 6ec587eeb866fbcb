//! Live view engine for the sysmon console.
//!
//! A [`sampler`] keeps a [`state::SnapshotStore`] filled with the current
//! process table while a [`supervisor::Supervisor`] reads operator selections
//! and runs at most one view worker at a time.

pub mod config;
pub mod connections;
pub mod console;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod network_view;
pub mod probe;
pub mod process_view;
pub mod sampler;
pub mod scan;
pub mod state;
pub mod supervisor;
pub mod types;

pub use config::MonitorConfig;
pub use console::Console;
pub use error::{Error, Result};
pub use monitor::{start_network_monitor, start_process_monitor, MonitorHandle};
pub use types::{Endpoint, Entity, Snapshot};
