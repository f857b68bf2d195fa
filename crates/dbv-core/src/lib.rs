//! dbv-core - Core library for dbv
//!
//! This crate provides the types shared by every dbv component: version
//! numbers, discovery of the on-disk change layout, deploy modes, the
//! `dbv.yml` configuration and content fingerprints.

pub mod checksum;
pub mod config;
pub mod error;
pub mod layout;
pub mod mode;
pub mod version;

pub use checksum::compute_checksum;
pub use config::{ChangesConfig, Config, DatabaseConfig, SnapshotConfig};
pub use error::{CoreError, CoreResult};
pub use layout::{ChangeLayout, ScriptFile};
pub use mode::DeployMode;
pub use version::Version;
