//! Host preparation for services running under Docker user namespace remapping
//!
//! `HostPreparer` sets up subordinate ids, the shared group, mirrored users,
//! per-service datasets and directory ownership. Account and subordinate id
//! changes use the same converge step as datasets, so a prepared host is left
//! untouched by a second run.

pub mod accounts;
pub mod prepare;
pub mod subids;

pub use accounts::AccountManager;
pub use prepare::{set_group_inheritance, HostPreparer, PreparationReport};
