//! Parsers for `zfs list -H` output

use tracing::debug;

use super::models::{LogicalVolume, Snapshot};
use crate::process::ParsedLine;

/// Mount point values that mean "not mounted anywhere"
const INACTIVE_MOUNTPOINTS: &[&str] = &["-", "none", "legacy"];

/// Parse one `name<TAB>mountpoint` line
pub fn parse_volume_line(line: &str) -> ParsedLine<LogicalVolume> {
    let line = line.trim();
    let (name, mount_point) = line
        .split_once('\t')
        .ok_or_else(|| "expected two tab-separated fields".to_string())?;
    if mount_point.contains('\t') {
        return Err("expected two tab-separated fields".to_string());
    }

    let (name, mount_point) = (name.trim(), mount_point.trim());
    if name.is_empty() {
        return Err("empty dataset name".to_string());
    }
    if INACTIVE_MOUNTPOINTS.contains(&mount_point) {
        debug!("Skipping unmounted dataset: {}", name);
        return Ok(None);
    }

    Ok(Some(LogicalVolume::new(name, mount_point)))
}

/// Parse one `name<TAB>used<TAB>creation` line
pub fn parse_snapshot_line(line: &str) -> ParsedLine<Snapshot> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut fields = line.split('\t');
    let name = fields.next().unwrap_or_default().trim();
    let (Some(used), Some(creation), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err("expected three tab-separated fields".to_string());
    };

    if !name.contains('@') {
        return Err(format!("'{}' is not a snapshot name", name));
    }
    if used.trim().is_empty() || creation.trim().is_empty() {
        return Err("empty 'used' or 'creation' column".to_string());
    }

    Ok(Some(Snapshot {
        name: name.to_string(),
        used: used.trim().to_string(),
        creation: creation.trim().to_string(),
    }))
}
