//! On-disk store documents
//!
//! Both the raw and the filtered store are single pretty-printed JSON
//! documents. Every update is a read-merge-write of the whole document: the
//! file is reloaded, the key path is created if needed, the leaf is updated,
//! and the document is written to a sibling temporary file that is renamed over
//! the existing file. Only one process may write a given document at a time; there
//! is no locking.

pub mod filtered;
pub mod raw;

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PersistenceError, PersistenceResult};
use crate::trial::{Distribution, TrialDescriptor};

pub use filtered::{BucketSummary, FilteredStore, MetricSummary, StageSummary};
pub use raw::RawStore;

/// Coordinate of one slot in the raw and filtered stores
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bucket {
    pub store: String,
    pub workload: String,
    pub distribution: Distribution,
    pub threads: u32,
}

impl Bucket {
    pub fn new(
        store: impl Into<String>,
        workload: impl Into<String>,
        distribution: Distribution,
        threads: u32,
    ) -> Self {
        Self {
            store: store.into(),
            workload: workload.into(),
            distribution,
            threads,
        }
    }
}

impl From<&TrialDescriptor> for Bucket {
    fn from(trial: &TrialDescriptor) -> Self {
        Bucket::new(
            trial.store(),
            trial.workload(),
            trial.distribution(),
            trial.threads(),
        )
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.store, self.workload, self.distribution, self.threads
        )
    }
}

/// Load a document, treating a missing (or blank) file as an empty one.
/// A file that exists but cannot be read or parsed is an error.
pub(crate) fn load_document<T>(path: &Path) -> PersistenceResult<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} does not exist yet, starting from an empty document", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!("{} is empty, starting from an empty document", path.display());
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a document the way it is stored on disk
pub(crate) fn to_pretty_json<T: Serialize>(document: &T) -> PersistenceResult<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Replace the document at `path`, creating parent directories as needed
pub(crate) fn save_document<T: Serialize>(path: &Path, document: &T) -> PersistenceResult<()> {
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let content = to_pretty_json(document)?;
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, content).map_err(write_err)?;
    fs::rename(&temp_path, path).map_err(write_err)?;

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_document() {
        let dir = TempDir::new().unwrap();
        let doc: BTreeMap<String, u32> = load_document(&dir.path().join("absent.json")).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw_data.json");
        fs::write(&path, "{\"rwl_db\": [").unwrap();

        let err = load_document::<BTreeMap<String, u32>>(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file
        let err = load_document::<BTreeMap<String, u32>>(dir.path()).unwrap_err();
        assert!(matches!(err, PersistenceError::Read { .. }));
    }

    #[test]
    fn test_save_creates_parents_and_indents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("filtered_data.json");
        let doc: BTreeMap<String, u32> = [("b".to_string(), 2), ("a".to_string(), 1)].into();

        save_document(&path, &doc).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n    \"a\": 1,\n    \"b\": 2\n}\n");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        assert_eq!(
            temp_path_for(Path::new("../raw_data.json")),
            PathBuf::from("../raw_data.json.tmp")
        );
    }
}
