//! Version numbers and their directory names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Directory prefix of a version directory (`v0`, `v1`, ...)
pub const VERSION_PREFIX: &str = "v";

/// A schema version number.
///
/// Versions are dense non-negative integers. Version 0 holds the scripts that
/// create dbv's own bookkeeping tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u32);

impl Version {
    /// The bootstrap version
    pub const ZERO: Version = Version(0);

    /// Create a version from its number
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// The numeric value
    pub const fn number(self) -> u32 {
        self.0
    }

    /// Whether this is the bootstrap version
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Directory name on disk, e.g. `v3`
    pub fn dir_name(self) -> String {
        format!("{VERSION_PREFIX}{}", self.0)
    }

    /// Parse a directory name of the form `v<N>`.
    ///
    /// Returns `None` for anything else, including `v` without digits and
    /// numbers that overflow `u32`.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        static DIR_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = DIR_RE.get_or_init(|| regex::Regex::new(r"^v(\d+)$").expect("valid regex"));
        let caps = re.captures(name)?;
        caps[1].parse::<u32>().ok().map(Self)
    }

    /// Versions from `self + 1` up to and including `target`, ascending
    pub fn forward_to(self, target: Version) -> impl DoubleEndedIterator<Item = Version> {
        (self.0.saturating_add(1)..=target.0).map(Version)
    }

    /// Versions from `self` down to `target + 1`, descending
    pub fn backward_to(self, target: Version) -> impl Iterator<Item = Version> {
        (target.0.saturating_add(1)..=self.0).rev().map(Version)
    }
}

impl From<u32> for Version {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{VERSION_PREFIX}{}", self.0)
    }
}
