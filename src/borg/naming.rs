//! Deterministic names for repositories, archives and key files

use crate::zfs::models::timestamp_now;

/// Volume name with path separators flattened (`pool/svcs/a` -> `pool_svcs_a`)
pub fn sanitize_volume_name(volume_name: &str) -> String {
    volume_name.trim_matches('/').replace('/', "_")
}

/// `<base>/<sanitized volume name>`
pub fn repository_location(base: &str, volume_name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), sanitize_volume_name(volume_name))
}

/// `<prefix>_<tag>_<timestamp>`
pub fn archive_name_at(prefix: &str, tag: &str, timestamp: &str) -> String {
    format!("{}_{}_{}", prefix, tag, timestamp)
}

/// Archive name stamped with the current local time
pub fn archive_name(prefix: &str, tag: &str) -> String {
    archive_name_at(prefix, tag, &timestamp_now())
}

/// File name of an exported recovery key
pub fn key_file_name(volume_name: &str) -> String {
    format!("{}.key", sanitize_volume_name(volume_name))
}
