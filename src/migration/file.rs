//! Migration file discovery and descriptors

use crate::migration::checksum::{calculate_checksum, checksum_bytes};
use crate::migration::MigrationError;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension every migration, seed and callback script must carry
pub const SCRIPT_EXTENSION: &str = ".sql";

/// Immutable description of one migration file, taken at discovery time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDescriptor {
    /// File name including extension; the ledger key
    pub name: String,

    /// Human-readable label derived from the name
    pub description: String,

    /// Path to the migration file
    pub path: PathBuf,

    /// MD5 of the raw file content
    pub checksum: String,
}

impl MigrationDescriptor {
    /// Build a descriptor for the file at `path`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidFilename` if the file name does not end
    /// in `.sql`, or `MigrationError::Io` if the file cannot be read.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, MigrationError> {
        let path = path.into();
        let name = script_name(&path)?;
        if !name.ends_with(SCRIPT_EXTENSION) {
            return Err(MigrationError::InvalidFilename(name));
        }

        let description = describe(&name);
        let checksum = calculate_checksum(&path)?;

        Ok(Self {
            name,
            description,
            path,
            checksum,
        })
    }

    /// Read the script text, verifying it still matches the discovered checksum
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::ModifiedDuringRun` if the file changed since
    /// discovery, or `MigrationError::Io` if it cannot be read as UTF-8.
    pub fn read_verified_sql(&self) -> Result<String, MigrationError> {
        let bytes = fs::read(&self.path).map_err(|e| MigrationError::io(&self.path, e))?;
        let actual = checksum_bytes(&bytes);
        if actual != self.checksum {
            return Err(MigrationError::ModifiedDuringRun {
                script: self.name.clone(),
                expected: self.checksum.clone(),
                actual,
            });
        }
        decode_utf8(&self.path, bytes)
    }
}

/// Description derived from a script name: extension dropped, `_` → space
///
/// # Example
/// - `v0.1.0_create_users.sql` → `v0.1.0 create users`
pub fn describe(name: &str) -> String {
    name.strip_suffix(SCRIPT_EXTENSION)
        .unwrap_or(name)
        .replace('_', " ")
}

/// File name of `path` as UTF-8
pub(crate) fn script_name(path: &Path) -> Result<String, MigrationError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| MigrationError::InvalidFilename(path.display().to_string()))
}

/// Read a script as UTF-8 text
pub(crate) fn read_script(path: &Path) -> Result<String, MigrationError> {
    let bytes = fs::read(path).map_err(|e| MigrationError::io(path, e))?;
    decode_utf8(path, bytes)
}

fn decode_utf8(path: &Path, bytes: Vec<u8>) -> Result<String, MigrationError> {
    String::from_utf8(bytes).map_err(|e| {
        MigrationError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// List the `*.sql` files directly inside `dir`
///
/// Files are ordered by byte-wise comparison of their names; this order is
/// the only ordering authority for migrations, seeds and callbacks.
///
/// # Errors
///
/// Returns `MigrationError::DirectoryNotFound` if `dir` is missing or not a
/// directory, and `MigrationError::InvalidFilename` for a `*.sql` file whose
/// name is not valid UTF-8.
pub fn discover_scripts(dir: &Path) -> Result<Vec<PathBuf>, MigrationError> {
    if !dir.is_dir() {
        return Err(MigrationError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut scripts = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))? {
        let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_sql = path
            .file_name()
            .is_some_and(|n| n.as_encoded_bytes().ends_with(SCRIPT_EXTENSION.as_bytes()));
        if is_sql {
            // A script whose name is not UTF-8 cannot be ledgered.
            script_name(&path)?;
            scripts.push(path);
        }
    }

    // `Path` ordering is component-wise; compare the raw names instead.
    scripts.sort_by(|a, b| {
        let a = a.file_name().map(|n| n.as_encoded_bytes()).unwrap_or_default();
        let b = b.file_name().map(|n| n.as_encoded_bytes()).unwrap_or_default();
        a.cmp(b)
    });

    Ok(scripts)
}

/// Discover all migration files in a directory, in application order
///
/// # Errors
///
/// Returns errors if the directory is missing, a file name is invalid, or a
/// checksum cannot be computed.
pub fn discover_migrations(migrations_dir: &Path) -> Result<Vec<MigrationDescriptor>, MigrationError> {
    discover_scripts(migrations_dir)?
        .into_iter()
        .map(MigrationDescriptor::from_path)
        .collect()
}
