//! Checksum calculation for migration files

use crate::migration::MigrationError;
use md5::{Digest, Md5};
use std::fs;
use std::path::Path;

/// Calculate the MD5 checksum of a migration file
///
/// The hash covers the raw bytes on disk, before any template rendering, so
/// drift detection does not depend on the template variables in effect.
///
/// # Returns
///
/// Returns the 32-character lower-case hexadecimal digest
///
/// # Errors
///
/// Returns `MigrationError::Io` if the file cannot be read
pub fn calculate_checksum(migration_file_path: &Path) -> Result<String, MigrationError> {
    let content = fs::read(migration_file_path)
        .map_err(|e| MigrationError::io(migration_file_path, e))?;
    Ok(checksum_bytes(&content))
}

/// MD5 of `content` as lower-case hex
pub fn checksum_bytes(content: &[u8]) -> String {
    format!("{:x}", Md5::digest(content))
}

/// Whether a recorded checksum still matches the file on disk
pub fn checksums_match(stored_checksum: &str, current_checksum: &str) -> bool {
    stored_checksum.eq_ignore_ascii_case(current_checksum)
}
