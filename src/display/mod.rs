//! Display formatting for terminal output
//!
//! Plain, column-aligned tables for listings and short run reports.

pub mod run;
pub mod snapshot;
pub mod volume;

pub use run::{format_history, format_run_summary};
pub use snapshot::format_snapshot_list;
pub use volume::format_volume_list;
