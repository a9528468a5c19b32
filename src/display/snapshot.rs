//! Snapshot display formatting
//!
//! Snapshots are listed oldest first, in the order ZFS returns them.

use crate::zfs::Snapshot;

/// Format snapshots as a table
pub fn format_snapshot_list(snapshots: &[Snapshot]) -> String {
    if snapshots.is_empty() {
        return "No snapshots found.".to_string();
    }

    let name_width = snapshots
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let used_width = snapshots
        .iter()
        .map(|s| s.used.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:>used_width$}  {}\n",
        "Name",
        "Used",
        "Created",
        name_width = name_width,
        used_width = used_width,
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:->used_width$}  {:-<7}\n",
        "",
        "",
        "",
        name_width = name_width,
        used_width = used_width,
    ));

    for snapshot in snapshots {
        output.push_str(&format!(
            "{:<name_width$}  {:>used_width$}  {}\n",
            snapshot.name,
            snapshot.used,
            snapshot.creation,
            name_width = name_width,
            used_width = used_width,
        ));
    }

    output
}
