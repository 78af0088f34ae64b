//! On-disk mod cache
//!
//! Stores downloaded `.smod` archives and their extracted contents under
//! `~/.smm/cache/`, and serves each mod version's `data.json` metadata to
//! the resolver. Downloads happen only on cache miss.

use crate::catalog::ModMeta;
use crate::semver::Version;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default download endpoint base
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://api.ficsit.app/v2";

/// Errors that can occur during mod cache operations
#[derive(Debug, Error)]
pub enum ModCacheError {
    /// Cache directory could not be determined or created
    #[error("Failed to initialize mod cache: {0}")]
    InitError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Metadata parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Archive extraction failed
    #[error("Failed to extract archive: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// No such mod version available for download
    #[error("Mod not found: {id}@{version}")]
    NotFound { id: String, version: String },

    /// Download failed with a non-success status
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// The archive's data.json names a different mod
    #[error("Archive metadata mismatch: expected {expected}, got {actual}")]
    MetadataMismatch { expected: String, actual: String },

    /// The archive carries no data.json
    #[error("Archive has no data.json: {0}")]
    MissingMetadata(String),
}

/// Metadata access for cached mods.
///
/// `get_metadata` downloads and unzips the mod archive on a cache miss.
pub trait ModCache {
    fn get_metadata(&self, id: &str, version: &Version) -> Result<ModMeta, ModCacheError>;
}

/// Disk-backed mod cache.
///
/// Directory structure:
/// ```text
/// ~/.smm/cache/
/// ├── downloads/
/// │   └── <id>_<version>.smod
/// ├── <id>/
/// │   └── <version>/
/// │       ├── data.json
/// │       ├── archive.sha256
/// │       └── ... extracted archive contents
/// └── tmp/
/// ```
pub struct DiskModCache {
    root: PathBuf,
    download_base: String,
    client: Client,
}

impl DiskModCache {
    /// Create a cache rooted at `~/.smm/cache/`
    pub fn new() -> Result<Self, ModCacheError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ModCacheError::InitError("could not determine home directory".to_string()))?;

        Self::with_root(home.join(".smm").join("cache"))
    }

    /// Create a cache rooted at a custom directory
    pub fn with_root(root: PathBuf) -> Result<Self, ModCacheError> {
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join("tmp"))?;
        fs::create_dir_all(root.join("downloads"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("smm/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            root,
            download_base: DEFAULT_DOWNLOAD_BASE.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Override the download endpoint base
    pub fn with_download_base(mut self, base: &str) -> Self {
        self.download_base = base.trim_end_matches('/').to_string();
        self
    }

    /// The cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one extracted mod version
    fn version_dir(&self, id: &str, version: &Version) -> PathBuf {
        self.root.join(id).join(version.to_string())
    }

    /// Read and check the cached data.json for a mod version
    fn read_metadata(&self, id: &str, path: &Path) -> Result<ModMeta, ModCacheError> {
        let content = fs::read_to_string(path)?;
        let meta: ModMeta = serde_json::from_str(&content)?;

        if meta.mod_id != id {
            return Err(ModCacheError::MetadataMismatch {
                expected: id.to_string(),
                actual: meta.mod_id,
            });
        }

        Ok(meta)
    }

    /// Download the archive for a mod version and extract it into the cache
    fn download_and_extract(&self, id: &str, version: &Version) -> Result<(), ModCacheError> {
        let url = format!(
            "{}/mod/{}/versions/{}/download",
            self.download_base, id, version
        );

        tracing::debug!(id, %version, "downloading mod archive");

        let response = self.client.get(&url).send()?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ModCacheError::NotFound {
                id: id.to_string(),
                version: version.to_string(),
            });
        }

        if !response.status().is_success() {
            return Err(ModCacheError::DownloadError(format!(
                "status {} for {}",
                response.status(),
                url
            )));
        }

        let bytes = response.bytes()?.to_vec();
        let checksum = hex::encode(Sha256::digest(&bytes));

        // Write the archive to tmp first, then move it into downloads/
        let archive_name = format!("{}_{}.smod", id, version);
        let tmp_path = self.root.join("tmp").join(&archive_name);
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, self.root.join("downloads").join(&archive_name))?;

        let dest = self.version_dir(id, version);
        fs::create_dir_all(&dest)?;
        extract_zip(&bytes, &dest)?;
        fs::write(dest.join("archive.sha256"), &checksum)?;

        if !dest.join("data.json").exists() {
            return Err(ModCacheError::MissingMetadata(format!("{}@{}", id, version)));
        }

        Ok(())
    }
}

impl ModCache for DiskModCache {
    fn get_metadata(&self, id: &str, version: &Version) -> Result<ModMeta, ModCacheError> {
        let meta_path = self.version_dir(id, version).join("data.json");

        if !meta_path.exists() {
            self.download_and_extract(id, version)?;
        }

        self.read_metadata(id, &meta_path)
    }
}

/// Extract a zip archive from memory into a directory.
///
/// Only file entries are written; their parent directories are created on
/// demand, so bare directory entries need no handling of their own. Entries
/// whose names would escape the destination are skipped.
fn extract_zip(bytes: &[u8], dest: &Path) -> Result<(), ModCacheError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(name = entry.name(), "skipping unsafe archive entry");
            continue;
        };

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        io::copy(&mut entry, &mut fs::File::create(&target)?)?;
    }

    Ok(())
}
