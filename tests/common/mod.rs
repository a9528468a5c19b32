//! In-memory host for integration tests
//!
//! `SimHost` answers `zfs`, `borg`, `docker`, `chown` and account management
//! invocations from simple in-memory state and doubles as the service group controller, so a
//! single ordered event log shows how a run interleaved its steps.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use snapvault::config::Settings;
use snapvault::error::{SnapvaultError, SnapvaultResult};
use snapvault::process::{CommandOutput, CommandRunner, CommandSpec, LineStream};
use snapvault::services::ServiceGroupController;
use tempfile::TempDir;

pub const PARENT: &str = "pool/svcs";
pub const REPO_BASE: &str = "/backup/borg";
pub const PREFIX: &str = "lab";

#[derive(Debug, Default, Clone)]
pub struct Repo {
    pub archives: Vec<String>,
    pub key: String,
    pub checks: usize,
    pub prunes: usize,
}

#[derive(Default)]
struct State {
    /// dataset name -> mount point (None when unmounted)
    datasets: BTreeMap<String, Option<PathBuf>>,
    /// `dataset@tag` in creation order
    snapshots: Vec<String>,
    repos: HashMap<String, Repo>,
    /// Archive sources handed to `borg create`, per repository
    sources: HashMap<String, Vec<String>>,
    events: Vec<String>,
    /// user name -> uid
    users: BTreeMap<String, u32>,
    groups: BTreeSet<String>,
    /// user name -> supplementary groups
    memberships: HashMap<String, BTreeSet<String>>,

    fail_snapshot: bool,
    fail_create_for: HashSet<String>,
    fail_check_for: HashSet<String>,
    ignore_dataset_create: bool,
    ignore_init: bool,
    corrupt_key_export: bool,
    fail_service_start: bool,
}

#[derive(Default)]
pub struct SimHost {
    state: RefCell<State>,
}

fn ok(stdout: impl Into<String>) -> CommandOutput {
    CommandOutput::ok(stdout)
}

fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput::failed(code, stderr)
}

impl SimHost {
    /// Parent dataset (unmounted) with one mounted child per name
    pub fn with_volumes(names: &[&str]) -> Self {
        let host = Self::default();
        {
            let mut state = host.state.borrow_mut();
            state.datasets.insert(PARENT.to_string(), None);
            for name in names {
                state.datasets.insert(
                    format!("{}/{}", PARENT, name),
                    Some(PathBuf::from(format!("/srv/{}", name))),
                );
            }
        }
        host
    }

    pub fn fail_snapshots(&self) {
        self.state.borrow_mut().fail_snapshot = true;
    }

    /// Make `borg create` fail for one volume's repository
    pub fn fail_archive_for(&self, volume: &str) {
        let location = repo_location(volume);
        self.state.borrow_mut().fail_create_for.insert(location);
    }

    pub fn fail_check_for(&self, volume: &str) {
        let location = repo_location(volume);
        self.state.borrow_mut().fail_check_for.insert(location);
    }

    /// `zfs create` reports success without creating anything
    pub fn ignore_dataset_create(&self) {
        self.state.borrow_mut().ignore_dataset_create = true;
    }

    /// `borg init` reports success without creating anything
    pub fn ignore_init(&self) {
        self.state.borrow_mut().ignore_init = true;
    }

    /// `start_all` reports an error after being recorded
    pub fn fail_service_start(&self) {
        self.state.borrow_mut().fail_service_start = true;
    }

    pub fn corrupt_key_export(&self) {
        self.state.borrow_mut().corrupt_key_export = true;
    }

    pub fn add_repo(&self, location: &str, archives: &[&str]) {
        self.state.borrow_mut().repos.insert(
            location.to_string(),
            Repo {
                archives: archives.iter().map(|a| a.to_string()).collect(),
                key: format!("KEY[{}]", location),
                ..Repo::default()
            },
        );
    }

    pub fn repo(&self, location: &str) -> Option<Repo> {
        self.state.borrow().repos.get(location).cloned()
    }

    pub fn repo_locations(&self) -> BTreeSet<String> {
        self.state.borrow().repos.keys().cloned().collect()
    }

    pub fn sources(&self, location: &str) -> Vec<String> {
        self.state.borrow().sources.get(location).cloned().unwrap_or_default()
    }

    pub fn snapshot_exists(&self, full_name: &str) -> bool {
        self.state.borrow().snapshots.iter().any(|s| s == full_name)
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.state.borrow().snapshots.clone()
    }

    pub fn dataset_exists(&self, name: &str) -> bool {
        self.state.borrow().datasets.contains_key(name)
    }

    pub fn add_user(&self, name: &str, uid: u32) {
        self.state.borrow_mut().users.insert(name.to_string(), uid);
    }

    pub fn user_uid(&self, name: &str) -> Option<u32> {
        self.state.borrow().users.get(name).copied()
    }

    pub fn group_exists(&self, name: &str) -> bool {
        self.state.borrow().groups.contains(name)
    }

    pub fn is_member(&self, user: &str, group: &str) -> bool {
        self.state
            .borrow()
            .memberships
            .get(user)
            .map_or(false, |groups| groups.contains(group))
    }

    pub fn events(&self) -> Vec<String> {
        self.state.borrow().events.clone()
    }

    pub fn count_events(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn log(&self, event: String) {
        self.state.borrow_mut().events.push(event);
    }

    fn dispatch(&self, spec: &CommandSpec) -> CommandOutput {
        let args: Vec<&str> = spec.get_args().iter().map(String::as_str).collect();
        self.log(format!("{} {}", spec.program(), args.join(" ")));
        match spec.program() {
            "zfs" => self.zfs(&args),
            "borg" => self.borg(spec, &args),
            "docker" | "chown" => ok(""),
            "getent" | "id" | "groupadd" | "usermod" | "useradd" => self.accounts(&args),
            other => fail(127, &format!("{}: command not found", other)),
        }
    }

    fn zfs(&self, args: &[&str]) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        match args {
            ["list", "-H", "-t", "filesystem", name] => {
                if state.datasets.contains_key(*name) {
                    ok(format!("{}\t-\n", name))
                } else {
                    fail(1, "dataset does not exist")
                }
            }
            ["list", "-H", "-t", "snapshot", name] => {
                if state.snapshots.iter().any(|s| s == name) {
                    ok(format!("{}\n", name))
                } else {
                    fail(1, "dataset does not exist")
                }
            }
            ["create", rest @ ..] => {
                let name = rest.last().copied().unwrap_or_default();
                if !state.ignore_dataset_create {
                    let mount = PathBuf::from("/srv").join(name.rsplit('/').next().unwrap_or(name));
                    state.datasets.insert(name.to_string(), Some(mount));
                }
                ok("")
            }
            ["snapshot", rest @ ..] => {
                if state.fail_snapshot {
                    return fail(2, "cannot create snapshot: out of space");
                }
                let recursive = rest.contains(&"-r");
                let target = rest.last().copied().unwrap_or_default();
                let Some((dataset, tag)) = target.split_once('@') else {
                    return fail(2, "invalid snapshot name");
                };
                if state.snapshots.iter().any(|s| s == target) {
                    return fail(1, "snapshot already exists");
                }
                let covered: Vec<String> = state
                    .datasets
                    .keys()
                    .filter(|d| *d == dataset || (recursive && d.starts_with(&format!("{}/", dataset))))
                    .cloned()
                    .collect();
                for d in covered {
                    state.snapshots.push(format!("{}@{}", d, tag));
                }
                ok("")
            }
            ["destroy", rest @ ..] => {
                let recursive = rest.contains(&"-r");
                let target = rest.last().copied().unwrap_or_default();
                let Some((dataset, tag)) = target.split_once('@') else {
                    return fail(2, "invalid snapshot name");
                };
                let child_prefix = format!("{}/", dataset);
                let suffix = format!("@{}", tag);
                state.snapshots.retain(|s| {
                    let Some(d) = s.strip_suffix(&suffix) else {
                        return true;
                    };
                    !(d == dataset || (recursive && d.starts_with(&child_prefix)))
                });
                ok("")
            }
            ["list", "-r", "-t", "filesystem", "-o", "name,mountpoint", "-H", parent] => {
                let child_prefix = format!("{}/", parent);
                let out: String = state
                    .datasets
                    .iter()
                    .filter(|(d, _)| d.as_str() == *parent || d.starts_with(&child_prefix))
                    .map(|(d, m)| match m {
                        Some(path) => format!("{}\t{}\n", d, path.display()),
                        None => format!("{}\t-\n", d),
                    })
                    .collect();
                ok(out)
            }
            ["list", "-t", "snapshot", "-r", "-o", "name,used,creation", "-s", "creation", "-H", target] => {
                let child_prefix = format!("{}/", target);
                let out: String = state
                    .snapshots
                    .iter()
                    .filter(|s| {
                        let d = s.split('@').next().unwrap_or_default();
                        d == *target || d.starts_with(&child_prefix)
                    })
                    .map(|s| format!("{}\t0B\tMon Jan  6 03:00 2025\n", s))
                    .collect();
                ok(out)
            }
            _ => fail(2, "unsupported zfs invocation"),
        }
    }

    fn borg(&self, spec: &CommandSpec, args: &[&str]) -> CommandOutput {
        let location = spec.env_var("BORG_REPO").unwrap_or_default().to_string();
        let key_file = spec.env_var("BORG_KEY_FILE").map(PathBuf::from);
        let mut state = self.state.borrow_mut();

        if args.first() == Some(&"init") {
            if state.repos.contains_key(&location) {
                return fail(2, "A repository already exists at this location");
            }
            if !state.ignore_init {
                state.repos.insert(
                    location.clone(),
                    Repo {
                        key: format!("KEY[{}]", location),
                        ..Repo::default()
                    },
                );
            }
            return ok("");
        }

        let corrupt_key = state.corrupt_key_export;
        let fail_create = state.fail_create_for.contains(&location);
        let fail_check = state.fail_check_for.contains(&location);

        let Some(repo) = state.repos.get_mut(&location) else {
            return fail(2, "Repository does not exist");
        };

        match args {
            ["info"] => ok("Repository ID: 0000"),
            ["create", .., name, source] => {
                if fail_create {
                    return fail(2, "Failed to create/acquire the lock");
                }
                let Some(name) = name.strip_prefix("::") else {
                    return fail(2, "missing archive name");
                };
                repo.archives.push(name.to_string());
                let source = source.to_string();
                state.sources.entry(location).or_default().push(source);
                ok("")
            }
            ["prune", ..] => {
                repo.prunes += 1;
                ok("")
            }
            ["check", ..] => {
                if fail_check {
                    return fail(1, "Index object count mismatch");
                }
                repo.checks += 1;
                ok("")
            }
            ["key", "export", "--paper", _, path] => {
                let content = if corrupt_key {
                    "not a key".to_string()
                } else {
                    repo.key.clone()
                };
                match fs::write(path, content) {
                    Ok(()) => ok(""),
                    Err(e) => fail(2, &e.to_string()),
                }
            }
            ["list", ..] => {
                if let Some(path) = key_file {
                    match fs::read_to_string(&path) {
                        Ok(content) if content == repo.key => {}
                        _ => return fail(2, "passphrase supplied does not match key file"),
                    }
                }
                ok(repo.archives.iter().map(|a| format!("{}\n", a)).collect::<String>())
            }
            ["extract", ..] | ["delete", ..] => ok(""),
            _ => fail(2, "unsupported borg invocation"),
        }
    }
}

impl SimHost {
    fn accounts(&self, args: &[&str]) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        match args {
            ["passwd", name] => match state.users.get(*name) {
                Some(uid) => ok(format!("{}:x:{}:{}::/:/usr/sbin/nologin\n", name, uid, uid)),
                None => fail(2, ""),
            },
            ["group", name] => {
                if state.groups.contains(*name) {
                    ok(format!("{}:x:2000:\n", name))
                } else {
                    fail(2, "")
                }
            }
            ["-nG", user] => {
                if !state.users.contains_key(*user) {
                    return fail(1, &format!("id: '{}': no such user", user));
                }
                let mut groups = vec![user.to_string()];
                if let Some(extra) = state.memberships.get(*user) {
                    groups.extend(extra.iter().cloned());
                }
                ok(format!("{}\n", groups.join(" ")))
            }
            ["-aG", group, user] => {
                if !state.groups.contains(*group) {
                    return fail(6, &format!("usermod: group '{}' does not exist", group));
                }
                state
                    .memberships
                    .entry(user.to_string())
                    .or_default()
                    .insert(group.to_string());
                ok("")
            }
            ["--system", "--no-create-home", "--uid", uid, "--gid", _group, name] => {
                match uid.parse::<u32>() {
                    Ok(uid) => {
                        state.users.insert(name.to_string(), uid);
                        ok("")
                    }
                    Err(_) => fail(3, "useradd: invalid user ID"),
                }
            }
            [name] => {
                state.groups.insert(name.to_string());
                ok("")
            }
            _ => fail(2, "unsupported account invocation"),
        }
    }
}

impl CommandRunner for SimHost {
    fn run(&self, spec: &CommandSpec) -> SnapvaultResult<CommandOutput> {
        Ok(self.dispatch(spec))
    }

    fn stream(&self, spec: &CommandSpec) -> SnapvaultResult<LineStream<'_>> {
        let output = self.dispatch(spec);
        let mut items: Vec<SnapvaultResult<String>> =
            output.stdout.lines().map(|l| Ok(l.to_string())).collect();
        if !output.success() {
            items.push(Err(SnapvaultError::CommandFailed {
                command: spec.to_string(),
                exit_code: output.exit_code,
                stdout: String::new(),
                stderr: output.stderr,
            }));
        }
        Ok(Box::new(items.into_iter()))
    }
}

impl ServiceGroupController for SimHost {
    fn stop_all(&self) -> SnapvaultResult<()> {
        self.log("services stop".to_string());
        Ok(())
    }

    fn start_all(&self) -> SnapvaultResult<()> {
        self.log("services start".to_string());
        if self.state.borrow().fail_service_start {
            return Err(SnapvaultError::CommandFailed {
                command: "docker compose start".to_string(),
                exit_code: 17,
                stdout: String::new(),
                stderr: "container failed to start".to_string(),
            });
        }
        Ok(())
    }
}

/// Repository location of a child volume of `PARENT`
pub fn repo_location(volume: &str) -> String {
    format!("{}/{}", REPO_BASE, format!("{}/{}", PARENT, volume).replace('/', "_"))
}

/// Settings pointing at the simulated host, with real temp dirs for files
pub fn settings(dir: &TempDir) -> Settings {
    Settings::from_map(&base_map(dir)).expect("test settings are complete")
}

/// `settings` plus a storage layout rooted at `<dir>/srv`
pub fn storage_settings(dir: &TempDir) -> Settings {
    let root = dir.path();
    let mut map = base_map(dir);
    map.extend(
        [
            ("ZFS_BASE_MOUNTPOINT", root.join("srv").display().to_string()),
            ("DOCKER_USER", "dockremap".to_string()),
            ("SHARED_GROUP", "svcshare".to_string()),
            ("REMAPPED_ROOT_UID", "100000".to_string()),
            ("REMAPPED_POSTGRES_UID", "100999".to_string()),
            ("REMAPPED_APP_UID", "101000".to_string()),
            (
                "SERVICE_VOLUME_PATHS_AND_OWNERS",
                "nextcloud/db:REMAPPED_POSTGRES_UID\nnextcloud/html:REMAPPED_APP_UID\ngitea/data:REMAPPED_ROOT_UID".to_string(),
            ),
            ("SUBUID_FILE", root.join("subuid").display().to_string()),
            ("SUBGID_FILE", root.join("subgid").display().to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v)),
    );
    Settings::from_map(&map).expect("test storage settings are complete")
}

/// One service group with a compose file under the settings' services dir
pub fn add_compose_service(dir: &TempDir, name: &str) -> PathBuf {
    let service = dir.path().join("services").join(name);
    fs::create_dir_all(&service).unwrap();
    let file = service.join("docker-compose.yml");
    fs::write(&file, "services:\n  app:\n    image: busybox\n").unwrap();
    file
}

fn base_map(dir: &TempDir) -> HashMap<String, String> {
    let root: &Path = dir.path();
    [
        ("BORG_REPO_BASE_PATH", REPO_BASE.to_string()),
        ("BORG_PASSPHRASE", "correct horse".to_string()),
        ("BORG_RSH", "ssh -i /root/.ssh/id_ed25519".to_string()),
        ("ARCHIVE_PREFIX", PREFIX.to_string()),
        ("BORG_PRUNE_POLICY", "--keep-daily=7 --keep-weekly=4".to_string()),
        ("ZFS_PARENT_DATASET", PARENT.to_string()),
        ("BORG_COMPRESSION", "zstd,10".to_string()),
        ("BORG_EXCLUDES_FILE", root.join("excludes.txt").display().to_string()),
        ("ADMIN_USER", "admin".to_string()),
        ("BORG_KEYS_DIR", root.join("keys").display().to_string()),
        ("SERVICES_DIR", root.join("services").display().to_string()),
        ("SNAPVAULT_LOG_DIR", root.join("logs").display().to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
