//! Service groups stopped and started around a snapshot
//!
//! The backup pipeline only needs the `ServiceGroupController` bracket;
//! `ComposeController` is the Docker Compose implementation used on real hosts.

pub mod compose;

pub use compose::ComposeController;

use crate::error::SnapvaultResult;

/// Stop / start a set of independently discovered workload groups
///
/// Both operations are idempotent: nothing to stop or start is a success.
pub trait ServiceGroupController {
    fn stop_all(&self) -> SnapvaultResult<()>;
    fn start_all(&self) -> SnapvaultResult<()>;
}
