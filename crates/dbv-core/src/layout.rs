//! Discovery of the on-disk change layout.
//!
//! The changes root holds one directory per version (`v0`, `v1`, ...). Each
//! version directory holds change scripts named `dbc<N>_<name>.sql`, applied
//! in ascending `<N>` order.

use crate::error::{CoreError, CoreResult};
use crate::version::Version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File prefix of a change script
pub const SCRIPT_PREFIX: &str = "dbc";

/// One change script file inside a version directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    /// Numeric ordering id parsed from the file name
    pub id: u32,
    /// Full file name, used as the script's ledger name
    pub name: String,
    /// Absolute or config-relative path to the file
    pub path: PathBuf,
}

impl ScriptFile {
    /// Parse a `dbc<N>_<name>.sql` file name (case-insensitive).
    ///
    /// Returns the numeric id, or `None` when the name does not match.
    pub fn parse_id(file_name: &str) -> Option<u32> {
        static SCRIPT_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = SCRIPT_RE
            .get_or_init(|| regex::Regex::new(r"(?i)^dbc(\d+)_(.+)\.sql$").expect("valid regex"));
        let caps = re.captures(file_name)?;
        caps[1].parse::<u32>().ok()
    }

    /// Read the script's SQL text
    pub fn read(&self) -> CoreResult<String> {
        std::fs::read_to_string(&self.path).map_err(|e| CoreError::IoWithPath {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

/// The changes root directory
#[derive(Debug, Clone)]
pub struct ChangeLayout {
    root: PathBuf,
}

impl ChangeLayout {
    /// Create a layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The changes root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the scripts of `version`
    pub fn version_dir(&self, version: Version) -> PathBuf {
        self.root.join(version.dir_name())
    }

    /// All version directories present on disk, ascending.
    ///
    /// Every non-hidden directory under the root must be named `v<N>`; plain
    /// files at the root are ignored.
    pub fn versions(&self) -> CoreResult<Vec<Version>> {
        if !self.root.is_dir() {
            return Err(CoreError::ChangesDirNotFound {
                path: self.root.display().to_string(),
            });
        }

        let mut versions = Vec::new();
        for entry in read_dir(&self.root)? {
            let (name, path) = entry;
            if name.starts_with('.') || !path.is_dir() {
                continue;
            }
            let version =
                Version::from_dir_name(&name).ok_or_else(|| CoreError::InvalidVersionDir {
                    name: name.clone(),
                    path: self.root.display().to_string(),
                })?;
            versions.push(version);
        }
        versions.sort();
        Ok(versions)
    }

    /// Highest version directory on disk, or version 0 when there is none
    pub fn highest_possible_version(&self) -> CoreResult<Version> {
        Ok(self.versions()?.last().copied().unwrap_or(Version::ZERO))
    }

    /// Change scripts of `version` ordered by id.
    ///
    /// A version directory that does not exist is an empty version. Hidden
    /// files and subdirectories are ignored.
    pub fn scripts(&self, version: Version) -> CoreResult<Vec<ScriptFile>> {
        let dir = self.version_dir(version);
        if !dir.is_dir() {
            log::debug!("No directory for {version} at {}", dir.display());
            return Ok(Vec::new());
        }

        let mut by_id: BTreeMap<u32, ScriptFile> = BTreeMap::new();
        for (name, path) in read_dir(&dir)? {
            if name.starts_with('.') || path.is_dir() {
                continue;
            }
            let id = ScriptFile::parse_id(&name).ok_or_else(|| CoreError::InvalidScriptName {
                name: name.clone(),
                path: dir.display().to_string(),
            })?;
            if let Some(existing) = by_id.get(&id) {
                return Err(CoreError::DuplicateScriptId {
                    version: version.to_string(),
                    id,
                    first: existing.name.clone(),
                    second: name,
                });
            }
            by_id.insert(id, ScriptFile { id, name, path });
        }
        Ok(by_id.into_values().collect())
    }
}

/// List `(file_name, path)` pairs of a directory, sorted by name so that
/// error reporting is deterministic.
fn read_dir(dir: &Path) -> CoreResult<Vec<(String, PathBuf)>> {
    let io_err = |e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path()));
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
