//! Satisfactory Mod Manager Library
//!
//! This crate provides the dependency resolution and lockfile engine for a
//! Satisfactory mod manager, including:
//! - Semver parsing and constraint matching
//! - Manifest parsing (smm.toml)
//! - Lockfile management and install/uninstall diffing (smm-lock.json)
//! - The resolution graph and its invariants
//! - Constraint validation with backtracking over catalog candidates
//! - The ficsit.app catalog client and the on-disk mod cache

pub mod catalog;
pub mod graph;
pub mod lockfile;
pub mod manager;
pub mod manifest;
pub mod modcache;
pub mod resolver;
pub mod semver;

/// The mod loader's reserved item id. Its versions live in the catalog but
/// its dependency set is synthesized from the game version each release
/// declares.
pub const LOADER_ID: &str = "SML";

/// The game's reserved item id. It appears only as a pinned node inserted
/// from the manifest's game version; it is never resolved.
pub const GAME_ID: &str = "SatisfactoryGame";

pub use catalog::{Catalog, CatalogError, FicsitCatalog, LoaderInfo, ModMeta};
pub use graph::{Node, ResolutionGraph};
pub use lockfile::{diff, LockedMod, Lockfile, LockfileDiff, LockfileError};
pub use manager::{ManagerError, ModManager};
pub use manifest::{Manifest, ManifestError};
pub use modcache::{DiskModCache, ModCache, ModCacheError};
pub use resolver::{CancelToken, ResolveError, Resolver};
pub use semver::{Comparator, Range, SemverError, Version};
