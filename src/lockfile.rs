//! Lockfile management (smm-lock.json)
//!
//! The lockfile records the exact version of every installed item, manifest
//! and transitive alike, together with each item's declared dependency
//! constraints. Manifest membership is not serialized; it is re-derived from
//! the manifest when the lockfile is loaded.

use crate::semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Lockfile file name
pub const LOCKFILE_FILE_NAME: &str = "smm-lock.json";

/// Errors that can occur during lockfile operations
#[derive(Debug, Error)]
pub enum LockfileError {
    /// Failed to read or write the lockfile
    #[error("Failed to read lockfile: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse JSON
    #[error("Failed to parse lockfile: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Validation error
    #[error("Invalid lockfile: {0}")]
    ValidationError(String),
}

/// A locked item: exact version plus its declared dependency constraints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockedMod {
    /// Exact installed version
    pub version: Version,

    /// Direct dependencies (item id to constraint expression)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

/// Lockfile: a mapping from item id to its locked state.
///
/// Serialized as a flat JSON object; key order is not significant but output
/// is sorted for deterministic files.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Lockfile {
    mods: BTreeMap<String, LockedMod>,
}

impl Lockfile {
    /// Create a new empty lockfile
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a lockfile from a file
    pub fn from_file(path: &Path) -> Result<Self, LockfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a lockfile from a string
    pub fn from_str(content: &str) -> Result<Self, LockfileError> {
        let lockfile: Lockfile = serde_json::from_str(content)?;
        lockfile.validate()?;
        Ok(lockfile)
    }

    /// Validate the lockfile
    pub fn validate(&self) -> Result<(), LockfileError> {
        for (id, locked) in &self.mods {
            if id.is_empty() {
                return Err(LockfileError::ValidationError(
                    "Item id cannot be empty".to_string(),
                ));
            }

            for (dep_id, constraint) in &locked.dependencies {
                if dep_id.is_empty() || constraint.trim().is_empty() {
                    return Err(LockfileError::ValidationError(format!(
                        "Item '{}' has a malformed dependency entry",
                        id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Write the lockfile to a file
    pub fn to_file(&self, path: &Path) -> Result<(), LockfileError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Add or replace a locked item
    pub fn insert(&mut self, id: String, locked: LockedMod) {
        self.mods.insert(id, locked);
    }

    /// Get a locked item by id
    pub fn get(&self, id: &str) -> Option<&LockedMod> {
        self.mods.get(id)
    }

    /// Check whether an id is present
    pub fn contains(&self, id: &str) -> bool {
        self.mods.contains_key(id)
    }

    /// Iterate over locked items in id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &LockedMod)> {
        self.mods.iter()
    }

    /// All item ids in order
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.mods.keys()
    }

    /// Number of locked items
    pub fn len(&self) -> usize {
        self.mods.len()
    }

    /// Check whether the lockfile is empty
    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

/// The install/uninstall delta between two lockfiles.
///
/// Callers are expected to process `uninstall` before `install`; an item
/// whose version changed appears in both lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockfileDiff {
    /// Items to install, mapped to their new version
    pub install: BTreeMap<String, Version>,

    /// Items to remove (absent from the new lockfile, or changing version)
    pub uninstall: Vec<String>,
}

impl LockfileDiff {
    /// True when the two lockfiles agreed
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.uninstall.is_empty()
    }
}

/// Compute the install/uninstall diff between two lockfiles
pub fn diff(old: &Lockfile, new: &Lockfile) -> LockfileDiff {
    let mut result = LockfileDiff::default();

    for (id, locked) in &old.mods {
        match new.get(id) {
            Some(replacement) if replacement.version == locked.version => {}
            _ => result.uninstall.push(id.clone()),
        }
    }

    for (id, locked) in &new.mods {
        match old.get(id) {
            Some(previous) if previous.version == locked.version => {}
            _ => {
                result.install.insert(id.clone(), locked.version.clone());
            }
        }
    }

    result
}
