use std::fs;
use std::path::{Path, PathBuf};

use abc_core::{AbcError, ErrorInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn io_error(code: &str, err: impl ToString, path: &Path) -> AbcError {
    AbcError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Accepted parameter vectors with their distances, row aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplePayload {
    /// Parameter vectors.
    pub params: Vec<Vec<f64>>,
    /// Distance of each parameter vector.
    pub distances: Vec<f64>,
}

impl SamplePayload {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true when no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Named scalar snapshot such as an epsilon value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarPayload {
    /// Stored value.
    pub value: f64,
}

/// Directory of JSON snapshots written during a run.
///
/// Every artefact is one self-contained pretty-printed JSON file; paths handed
/// to the store are relative to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtefactStore {
    root: PathBuf,
}

impl ArtefactStore {
    /// Opens (and creates when missing) the artefact directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AbcError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| io_error("artefact-mkdir", err, &root))?;
        Ok(Self { root })
    }

    /// Absolute location of a relative artefact path.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Serialises `value` to `relative` and returns the relative path.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
    ) -> Result<PathBuf, AbcError> {
        let relative = relative.as_ref().to_path_buf();
        let path = self.path(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error("artefact-mkdir", err, parent))?;
        }
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io_error("artefact-serialize", err, &path))?;
        fs::write(&path, json).map_err(|err| io_error("artefact-write", err, &path))?;
        Ok(relative)
    }

    /// Reads an artefact previously written with [`ArtefactStore::write_json`].
    pub fn read_json<T: DeserializeOwned>(&self, relative: impl AsRef<Path>) -> Result<T, AbcError> {
        read_json_file(&self.path(relative))
    }
}

/// Parses a JSON artefact at an arbitrary path.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, AbcError> {
    let contents = fs::read_to_string(path).map_err(|err| io_error("artefact-read", err, path))?;
    serde_json::from_str(&contents).map_err(|err| io_error("artefact-parse", err, path))
}
