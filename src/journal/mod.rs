//! Run journal
//!
//! A JSON Lines history of backup runs, written next to the log file. The
//! journal is advisory: a failed write never interrupts a backup.

mod entry;
mod writer;

pub use entry::{EventKind, RunEvent};
pub use writer::RunJournal;
