//! Check → execute → verify for stateful resources
//!
//! Datasets, snapshots and repositories are all mutated the same way: query
//! the current state, act only if needed, then query again and refuse to
//! trust an exit status that the re-query contradicts. `converge` is that
//! shape written once.

use tracing::{error, info};

use crate::error::{SnapvaultError, SnapvaultResult};

/// Desired state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    fn holds(self, exists: bool) -> bool {
        match self {
            Presence::Present => exists,
            Presence::Absent => !exists,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Presence::Present => "present",
            Presence::Absent => "absent",
        }
    }
}

/// What to do when the desired state already holds before mutating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlreadySatisfied {
    /// Idempotent: succeed without acting
    Skip,
    /// Non-idempotent: report `AlreadyExists`
    Fail,
}

/// A requested state change for one identified resource
#[derive(Debug, Clone)]
pub struct Transition<'a> {
    pub resource: &'static str,
    pub identifier: &'a str,
    pub target: Presence,
    pub if_satisfied: AlreadySatisfied,
}

impl<'a> Transition<'a> {
    /// Idempotent creation
    pub fn ensure_present(resource: &'static str, identifier: &'a str) -> Self {
        Self {
            resource,
            identifier,
            target: Presence::Present,
            if_satisfied: AlreadySatisfied::Skip,
        }
    }

    /// Creation that must not find the resource already there
    pub fn create_new(resource: &'static str, identifier: &'a str) -> Self {
        Self {
            resource,
            identifier,
            target: Presence::Present,
            if_satisfied: AlreadySatisfied::Fail,
        }
    }

    /// Idempotent destruction
    pub fn ensure_absent(resource: &'static str, identifier: &'a str) -> Self {
        Self {
            resource,
            identifier,
            target: Presence::Absent,
            if_satisfied: AlreadySatisfied::Skip,
        }
    }
}

/// What `converge` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The resource was already in the desired state
    Unchanged,
    /// The mutation ran and was verified
    Applied,
}

impl Outcome {
    pub fn applied(self) -> bool {
        self == Outcome::Applied
    }
}

/// Drive a resource to `transition.target`
///
/// `exists` reports whether the resource currently exists. `mutate` performs
/// the change and is called at most once. After it returns `Ok`, `exists` is
/// repeated; if the resource is still not in the desired state the result is
/// `PostconditionViolation`. Errors from either closure propagate unchanged.
pub fn converge<P, M>(transition: &Transition<'_>, mut exists: P, mutate: M) -> SnapvaultResult<Outcome>
where
    P: FnMut() -> SnapvaultResult<bool>,
    M: FnOnce() -> SnapvaultResult<()>,
{
    let Transition {
        resource,
        identifier,
        target,
        if_satisfied,
    } = *transition;

    if target.holds(exists()?) {
        return match if_satisfied {
            AlreadySatisfied::Skip => {
                info!(
                    "{} '{}' is already {}. No action taken.",
                    resource,
                    identifier,
                    target.describe()
                );
                Ok(Outcome::Unchanged)
            }
            AlreadySatisfied::Fail => Err(SnapvaultError::already_exists(resource, identifier)),
        };
    }

    mutate()?;

    info!("Verifying {} '{}' is {}...", resource, identifier, target.describe());
    if !target.holds(exists()?) {
        error!(
            "Verification failed! {} '{}' is not {} after the command reported success.",
            resource,
            identifier,
            target.describe()
        );
        return Err(SnapvaultError::PostconditionViolation {
            resource,
            identifier: identifier.to_string(),
            expected: target.describe(),
        });
    }

    info!(
        "Successfully verified {} '{}' is {}.",
        resource,
        identifier,
        target.describe()
    );
    Ok(Outcome::Applied)
}
