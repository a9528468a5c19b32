//! Volume display formatting

use crate::zfs::LogicalVolume;

/// Format mounted volumes as a table
pub fn format_volume_list(volumes: &[LogicalVolume]) -> String {
    if volumes.is_empty() {
        return "No mounted datasets found.".to_string();
    }

    let name_width = volumes
        .iter()
        .map(|v| v.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {}\n",
        "Name",
        "Mount Point",
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:-<11}\n",
        "",
        "",
        name_width = name_width,
    ));

    for volume in volumes {
        output.push_str(&format!(
            "{:<name_width$}  {}\n",
            volume.name,
            volume.mount_point.display(),
            name_width = name_width,
        ));
    }

    output.push_str(&format!("\n{} dataset(s)\n", volumes.len()));
    output
}
