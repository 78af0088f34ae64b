//! Manifest parsing (smm.toml)
//!
//! The manifest is the user-edited list of mods the user explicitly wants
//! installed, each pinned by a version constraint, together with the game
//! version the installation targets.

use crate::semver::{Range, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Manifest file name
pub const MANIFEST_FILE_NAME: &str = "smm.toml";

/// Errors that can occur during manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read or write the manifest file
    #[error("Failed to read manifest file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid manifest: {0}")]
    ValidationError(String),
}

/// User manifest (smm.toml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Installed game version (as reported by the game, e.g. "109000")
    pub game_version: String,

    /// Desired mods (item id to version constraint)
    #[serde(default)]
    pub mods: BTreeMap<String, String>,
}

impl Manifest {
    /// Create a manifest for a game version with no mods
    pub fn new(game_version: impl Into<String>) -> Self {
        Self {
            game_version: game_version.into(),
            mods: BTreeMap::new(),
        }
    }

    /// Parse a manifest from a file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a manifest from a string
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest
    pub fn validate(&self) -> Result<(), ManifestError> {
        if Version::coerce(&self.game_version).is_none() {
            return Err(ManifestError::ValidationError(format!(
                "Invalid game version: '{}'",
                self.game_version
            )));
        }

        for (id, constraint) in &self.mods {
            if id.is_empty() {
                return Err(ManifestError::ValidationError(
                    "Mod id cannot be empty".to_string(),
                ));
            }

            if !is_valid_item_id(id) {
                return Err(ManifestError::ValidationError(format!(
                    "Invalid mod id: '{}'. Must contain only alphanumeric characters, hyphens, and underscores",
                    id
                )));
            }

            Range::parse(constraint).map_err(|e| {
                ManifestError::ValidationError(format!(
                    "Invalid constraint for '{}': {}",
                    id, e
                ))
            })?;
        }

        Ok(())
    }

    /// Write the manifest to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ManifestError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ManifestError::ValidationError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Add or replace a mod entry
    pub fn add_mod(&mut self, id: &str, constraint: &str) -> Result<(), ManifestError> {
        if !is_valid_item_id(id) {
            return Err(ManifestError::ValidationError(format!(
                "Invalid mod id: '{}'",
                id
            )));
        }

        Range::parse(constraint).map_err(|e| {
            ManifestError::ValidationError(format!("Invalid constraint for '{}': {}", id, e))
        })?;

        self.mods.insert(id.to_string(), constraint.to_string());
        Ok(())
    }

    /// Remove a mod entry; returns the removed constraint if present
    pub fn remove_mod(&mut self, id: &str) -> Option<String> {
        self.mods.remove(id)
    }

    /// Check whether a mod is pinned by the manifest
    pub fn has_mod(&self, id: &str) -> bool {
        self.mods.contains_key(id)
    }

    /// The constraint pinned for a mod, if any
    pub fn constraint_of(&self, id: &str) -> Option<&str> {
        self.mods.get(id).map(String::as_str)
    }
}

/// Check an item id: alphanumeric plus hyphens and underscores
fn is_valid_item_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let toml = r#"
game_version = "109000"

[mods]
AreaActions = "^1.6.0"
RefinedPower = ">=2.0.0 <3.0.0"
"#;

        let manifest = Manifest::from_str(toml).unwrap();
        assert_eq!(manifest.game_version, "109000");
        assert_eq!(manifest.mods.len(), 2);
        assert_eq!(manifest.constraint_of("AreaActions"), Some("^1.6.0"));
    }

    #[test]
    fn test_manifest_without_mods() {
        let toml = r#"game_version = "109000""#;
        let manifest = Manifest::from_str(toml).unwrap();
        assert!(manifest.mods.is_empty());
    }

    #[test]
    fn test_invalid_game_version() {
        let toml = r#"game_version = "latest""#;
        assert!(Manifest::from_str(toml).is_err());
    }

    #[test]
    fn test_invalid_constraint() {
        let toml = r#"
game_version = "109000"

[mods]
AreaActions = "newest"
"#;
        assert!(Manifest::from_str(toml).is_err());
    }

    #[test]
    fn test_add_and_remove_mod() {
        let mut manifest = Manifest::new("109000");

        manifest.add_mod("AreaActions", "^1.6.0").unwrap();
        assert!(manifest.has_mod("AreaActions"));

        assert!(manifest.add_mod("bad id", "^1.0.0").is_err());
        assert!(manifest.add_mod("AreaActions", "oops").is_err());

        assert_eq!(manifest.remove_mod("AreaActions"), Some("^1.6.0".to_string()));
        assert!(!manifest.has_mod("AreaActions"));
        assert_eq!(manifest.remove_mod("AreaActions"), None);
    }

    #[test]
    fn test_roundtrip() {
        let mut manifest = Manifest::new("109000");
        manifest.add_mod("AreaActions", "^1.6.0").unwrap();
        manifest.add_mod("SML", ">=2.0.0").unwrap();

        let toml = toml::to_string_pretty(&manifest).unwrap();
        let parsed = Manifest::from_str(&toml).unwrap();
        assert_eq!(manifest, parsed);
    }
}
