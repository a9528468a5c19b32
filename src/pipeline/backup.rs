//! One end-to-end backup cycle
//!
//! Services are stopped only for the instant it takes to create one recursive
//! snapshot, then restarted whatever the snapshot outcome. Every mounted
//! volume is archived from that snapshot into its own repository, then every
//! repository is checked in a second pass. The snapshot is destroyed only
//! when both passes succeed; on any later failure it is left for inspection.

use tracing::{error, info};
use uuid::Uuid;

use super::state::{Phase, RunState};
use crate::borg::{archive_name, repository_location, ArchiveRepository, Credentials};
use crate::config::Settings;
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::journal::{EventKind, RunEvent, RunJournal};
use crate::process::CommandRunner;
use crate::services::ServiceGroupController;
use crate::zfs::{generate_run_tag, LogicalVolume, SnapshotId, VolumeManager};

pub struct BackupPipeline<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a Settings,
    credentials: Credentials,
    volumes: VolumeManager<'a>,
    services: &'a dyn ServiceGroupController,
    journal: Option<&'a RunJournal>,
    run_id: Uuid,
    state: RunState,
}

impl<'a> BackupPipeline<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        settings: &'a Settings,
        services: &'a dyn ServiceGroupController,
    ) -> SnapvaultResult<Self> {
        let tag = generate_run_tag();
        info!("Generated unique snapshot tag: {}", tag);
        Ok(Self {
            runner,
            settings,
            credentials: Credentials::from_settings(settings)?,
            volumes: VolumeManager::new(runner, &settings.tools.zfs, &settings.parent_dataset)?,
            services,
            journal: None,
            run_id: Uuid::new_v4(),
            state: RunState::new(tag),
        })
    }

    /// Record milestones in `journal`
    pub fn with_journal(mut self, journal: &'a RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Use a fixed run tag instead of a generated one
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.state = RunState::new(tag);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn snapshot_id(&self) -> SnapshotId {
        SnapshotId::new(self.volumes.parent(), &self.state.tag)
    }

    fn record(&self, event: RunEvent) {
        if let Some(journal) = self.journal {
            journal.record(&event);
        }
    }

    fn event(&self, kind: EventKind) -> RunEvent {
        RunEvent::new(self.run_id, kind, &self.state.tag)
    }

    /// Run the whole cycle
    ///
    /// Errors are returned unchanged. When the snapshot outlives a failed run,
    /// its identity is logged and `state().snapshot_created` stays true.
    pub fn run(&mut self) -> SnapvaultResult<()> {
        info!("====== Orchestrated Backup Process Starting ======");
        self.record(self.event(EventKind::RunStarted));

        let result = self.execute();
        match &result {
            Ok(()) => {
                info!("====== Orchestrated Backup Process Finished Successfully ======");
                self.record(self.event(EventKind::RunSucceeded));
            }
            Err(e) => {
                error!("--- BACKUP FINISHED WITH AN UNRECOVERABLE ERROR ---");
                error!("Error details: {}", e);
                let mut event = self.event(EventKind::RunFailed).with_detail(e.to_string());
                if let Some(failure) = &self.state.failure {
                    error!("Failed during {} of volume '{}'.", failure.phase, failure.volume);
                    event = event.with_volume(&failure.volume);
                }
                if self.state.snapshot_created {
                    let snapshot = self.snapshot_id().to_string();
                    error!(
                        "The temporary snapshot '{}' has been LEFT for manual inspection due to the failure.",
                        snapshot
                    );
                    event = event.with_retained_snapshot(snapshot);
                }
                self.record(event);
            }
        }
        result
    }

    fn execute(&mut self) -> SnapvaultResult<()> {
        self.snapshot_with_services_stopped()?;

        info!("--> Step 3: Discovering datasets and running Borg backups.");
        let volumes = self.volumes.volumes().collect_all()?;
        if volumes.is_empty() {
            return Err(SnapvaultError::NoVolumesFound {
                parent: self.settings.parent_dataset.clone(),
            });
        }
        info!("Discovered {} mounted datasets to process.", volumes.len());

        for (i, volume) in volumes.iter().enumerate() {
            info!("Processing dataset {} of {}: {}", i + 1, volumes.len(), volume.name);
            if let Err(e) = self.archive_volume(volume) {
                error!("Error occurred while processing dataset '{}': {}", volume.name, e);
                self.state.fail(&volume.name, Phase::Archive);
                return Err(e);
            }
            self.state.archived.push(volume.name.clone());
            self.record(self.event(EventKind::VolumeArchived).with_volume(&volume.name));
        }

        for (i, volume) in volumes.iter().enumerate() {
            info!("Checking repository {} of {}: {}", i + 1, volumes.len(), volume.name);
            if let Err(e) = self.repository(&volume.name).check_repository(false) {
                self.state.fail(&volume.name, Phase::Check);
                return Err(e);
            }
            self.state.checked.push(volume.name.clone());
            self.record(self.event(EventKind::VolumeChecked).with_volume(&volume.name));
        }
        info!("Successfully processed all {} datasets.", volumes.len());

        info!("--> Step 4: All backups successful. Cleaning up ZFS snapshot.");
        self.volumes.destroy_snapshot(&self.state.tag, None, true)?;
        self.state.snapshot_created = false;
        self.record(self.event(EventKind::SnapshotDestroyed));
        Ok(())
    }

    /// Stop services, snapshot, and always bring services back
    fn snapshot_with_services_stopped(&mut self) -> SnapvaultResult<()> {
        info!("--> Step 1: Stopping all services for data consistency.");
        if let Err(e) = self.services.stop_all() {
            // Some groups may already be down.
            error!("Failed to stop services: {}", e);
            self.restart_services_after_failure();
            return Err(e);
        }

        info!("--> Step 2: Creating recursive ZFS snapshot for all datasets.");
        let snapshot = self.volumes.create_snapshot(Some(&self.state.tag), None, true);
        if let Ok(id) = &snapshot {
            self.state.snapshot_created = true;
            self.record(self.event(EventKind::SnapshotCreated).with_detail(id.to_string()));
        }

        info!("--> Bringing services back online.");
        let restarted = self.services.start_all();

        match (snapshot, restarted) {
            (Ok(_), Ok(())) => Ok(()),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restart_err)) => {
                error!("Failed to restart services: {}", restart_err);
                Err(e)
            }
        }
    }

    fn restart_services_after_failure(&self) {
        info!("--> Bringing services back online.");
        if let Err(e) = self.services.start_all() {
            error!("Failed to restart services: {}", e);
        }
    }

    fn repository(&self, volume_name: &str) -> ArchiveRepository<'a> {
        ArchiveRepository::new(
            self.runner,
            &self.settings.tools.borg,
            repository_location(&self.settings.repo_base_path, volume_name),
            self.credentials.clone(),
        )
    }

    fn archive_volume(&self, volume: &LogicalVolume) -> SnapvaultResult<()> {
        info!("--- Processing dataset: {} ---", volume.name);
        let repository = self.repository(&volume.name);
        let source = volume.snapshot_path(&self.state.tag);
        let name = archive_name(&self.settings.archive_prefix, &self.state.tag);

        info!(
            "Backing up dataset '{}' to repository at: {}",
            volume.name,
            repository.location()
        );
        info!("Snapshot data path: {}", source.display());

        repository.initialize_if_needed()?;
        repository.create_archive(
            &name,
            &source,
            &self.settings.compression,
            &self.settings.excludes_file,
        )?;
        repository.prune_archives(&self.settings.prune_policy)?;

        info!("--- Successfully finished processing dataset: {} ---", volume.name);
        Ok(())
    }
}
