//! Local users and groups
//!
//! Existence is read with `getent`, where exit code 2 means "no such entry".
//! Every change goes through `converge`, so re-running is a no-op and a
//! command that reports success without effect is caught.

use tracing::debug;

use crate::error::SnapvaultResult;
use crate::lifecycle::{converge, Outcome, Transition};
use crate::process::{self, CommandRunner, CommandSpec};

/// `getent` exit code for a key that is not in the database
const GETENT_NOT_FOUND: i32 = 2;

pub struct AccountManager<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> AccountManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn user_exists(&self, name: &str) -> SnapvaultResult<bool> {
        let spec = CommandSpec::new("getent").args(["passwd", name]);
        process::query_exists(self.runner, &spec, GETENT_NOT_FOUND)
    }

    pub fn group_exists(&self, name: &str) -> SnapvaultResult<bool> {
        let spec = CommandSpec::new("getent").args(["group", name]);
        process::query_exists(self.runner, &spec, GETENT_NOT_FOUND)
    }

    /// Whether `user` lists `group` among its groups (`id -nG`)
    pub fn is_member(&self, user: &str, group: &str) -> SnapvaultResult<bool> {
        let output = process::execute(self.runner, &CommandSpec::new("id").args(["-nG", user]))?;
        let member = output.stdout.split_whitespace().any(|g| g == group);
        debug!("User '{}' in group '{}': {}", user, group, member);
        Ok(member)
    }

    pub fn ensure_group(&self, name: &str) -> SnapvaultResult<Outcome> {
        converge(
            &Transition::ensure_present("Group", name),
            || self.group_exists(name),
            || process::execute(self.runner, &CommandSpec::new("groupadd").arg(name)).map(|_| ()),
        )
    }

    /// Add `user` to the supplementary `group`
    pub fn ensure_member(&self, user: &str, group: &str) -> SnapvaultResult<Outcome> {
        let membership = format!("{}:{}", user, group);
        converge(
            &Transition::ensure_present("Group membership", &membership),
            || self.is_member(user, group),
            || {
                let spec = CommandSpec::new("usermod").args(["-aG", group, user]);
                process::execute(self.runner, &spec).map(|_| ())
            },
        )
    }

    /// A home-less system user with a fixed uid and primary group
    pub fn ensure_system_user(&self, name: &str, uid: u32, group: &str) -> SnapvaultResult<Outcome> {
        converge(
            &Transition::ensure_present("User", name),
            || self.user_exists(name),
            || {
                let spec = CommandSpec::new("useradd")
                    .args(["--system", "--no-create-home", "--uid"])
                    .arg(uid.to_string())
                    .args(["--gid", group, name]);
                process::execute(self.runner, &spec).map(|_| ())
            },
        )
    }
}
