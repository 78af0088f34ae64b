//! Manifest operations
//!
//! Orchestrates user actions over the manifest and lockfile: install,
//! uninstall, update, and sync. Each operation rebuilds the resolution graph
//! from the prior lockfile, re-derives manifest flags, runs a full
//! validation pass, and commits the new manifest and lockfile only on
//! success, so any failure leaves the prior state untouched.

use crate::catalog::Catalog;
use crate::graph::{Node, ResolutionGraph};
use crate::lockfile::{diff, Lockfile, LockfileDiff};
use crate::manifest::{Manifest, ManifestError};
use crate::modcache::ModCache;
use crate::resolver::{CancelToken, ResolveError, Resolver};
use crate::semver::{Range, SemverError, Version};
use crate::GAME_ID;
use thiserror::Error;

/// Errors that can occur during manifest operations
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Resolution failed; the prior lockfile is kept
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Malformed constraint expression
    #[error(transparent)]
    Semver(#[from] SemverError),

    /// The item is not a manifest entry
    #[error("Not installed: {0}")]
    NotInstalled(String),

    /// No published version satisfies the requested constraint
    #[error("No version of {id} matches {constraint}")]
    NoMatchingVersion { id: String, constraint: String },

    /// The manifest's game version could not be understood
    #[error("Invalid game version: '{0}'")]
    InvalidGameVersion(String),
}

/// Drives manifest operations against a catalog and mod cache
pub struct ModManager<C: Catalog, M: ModCache> {
    catalog: C,
    mod_cache: M,
    manifest: Manifest,
    lockfile: Lockfile,
    cancel: Option<CancelToken>,
}

impl<C: Catalog, M: ModCache> ModManager<C, M> {
    /// Create a manager over an existing manifest and lockfile
    pub fn new(catalog: C, mod_cache: M, manifest: Manifest, lockfile: Lockfile) -> Self {
        Self {
            catalog,
            mod_cache,
            manifest,
            lockfile,
            cancel: None,
        }
    }

    /// Attach a cancellation token passed through to every resolution pass
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The current manifest
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The current lockfile
    pub fn lockfile(&self) -> &Lockfile {
        &self.lockfile
    }

    fn resolver(&self) -> Resolver<'_, C, M> {
        let resolver = Resolver::new(&self.catalog, &self.mod_cache);
        match &self.cancel {
            Some(token) => resolver.with_cancel_token(token.clone()),
            None => resolver,
        }
    }

    /// The version the manifest pins the game at
    fn pinned_game_version(&self) -> Result<Version, ManagerError> {
        Version::coerce(&self.manifest.game_version)
            .ok_or_else(|| ManagerError::InvalidGameVersion(self.manifest.game_version.clone()))
    }

    /// Build the working graph for a trial manifest: load the prior
    /// lockfile, pin the game node, and re-derive manifest flags.
    fn working_graph(&self, manifest: &Manifest) -> Result<ResolutionGraph, ManagerError> {
        let mut graph = ResolutionGraph::from_lockfile(&self.lockfile);

        let game_version = self.pinned_game_version()?;
        let game_stale = graph
            .get(GAME_ID)
            .is_some_and(|node| node.version != game_version);
        if game_stale {
            graph.remove(GAME_ID);
        }
        graph.add(Node::new(GAME_ID, game_version));

        let manifest_ids: Vec<&str> = manifest
            .mods
            .keys()
            .map(String::as_str)
            .chain(std::iter::once(GAME_ID))
            .collect();
        graph.mark_manifest(manifest_ids);

        Ok(graph)
    }

    /// Pick the newest catalog version matching a constraint
    fn newest_matching(&self, id: &str, range: &Range) -> Result<Version, ManagerError> {
        let mut candidates = self
            .catalog
            .list_matching_versions(id, std::slice::from_ref(range))
            .map_err(ResolveError::from)?;
        candidates.sort();

        candidates.pop().ok_or_else(|| ManagerError::NoMatchingVersion {
            id: id.to_string(),
            constraint: range.to_string(),
        })
    }

    /// Validate, clean up, and commit a trial state; returns the diff
    /// against the prior lockfile
    fn commit(
        &mut self,
        manifest: Manifest,
        mut graph: ResolutionGraph,
    ) -> Result<LockfileDiff, ManagerError> {
        self.resolver().validate_all(&mut graph)?;
        graph.cleanup();

        let new_lockfile = graph.to_lockfile();
        let delta = diff(&self.lockfile, &new_lockfile);

        self.manifest = manifest;
        self.lockfile = new_lockfile;

        Ok(delta)
    }

    /// Install a mod (or the loader) under a version constraint.
    ///
    /// Pins the constraint in the manifest, pre-inserts the newest matching
    /// version as a manifest node, and revalidates the whole graph.
    pub fn install(&mut self, id: &str, constraint: &str) -> Result<LockfileDiff, ManagerError> {
        if id == GAME_ID {
            return Err(ManagerError::Resolve(ResolveError::InvalidLockfileOperation(
                format!("{GAME_ID} is pinned by the manifest's game version, not installed"),
            )));
        }

        let range = Range::parse(constraint)?;

        let mut manifest = self.manifest.clone();
        manifest.add_mod(id, constraint)?;

        let mut graph = self.working_graph(&manifest)?;

        let satisfied = graph
            .get(id)
            .is_some_and(|node| range.matches(&node.version));
        if !satisfied {
            graph.remove(id);
            let version = self.newest_matching(id, &range)?;
            let node = self.resolver().get_item_data(id, &version)?.in_manifest();
            graph.add(node);
        }

        self.commit(manifest, graph)
    }

    /// Remove a mod from the manifest.
    ///
    /// The node itself survives when other installed mods still depend on
    /// it; otherwise cleanup collects it along with anything it orphaned.
    pub fn uninstall(&mut self, id: &str) -> Result<LockfileDiff, ManagerError> {
        if !self.manifest.has_mod(id) {
            return Err(ManagerError::NotInstalled(id.to_string()));
        }

        let mut manifest = self.manifest.clone();
        manifest.remove_mod(id);

        let mut graph = self.working_graph(&manifest)?;
        // Collect the removed entry and anything it orphans before the
        // validation pass.
        graph.cleanup();
        self.commit(manifest, graph)
    }

    /// Re-resolve a manifest mod to the newest version its constraint allows
    pub fn update(&mut self, id: &str) -> Result<LockfileDiff, ManagerError> {
        let constraint = self
            .manifest
            .constraint_of(id)
            .ok_or_else(|| ManagerError::NotInstalled(id.to_string()))?
            .to_string();

        let range = Range::parse(&constraint)?;
        let manifest = self.manifest.clone();
        let mut graph = self.working_graph(&manifest)?;

        graph.remove(id);
        let version = self.newest_matching(id, &range)?;
        let node = self.resolver().get_item_data(id, &version)?.in_manifest();
        graph.add(node);

        self.commit(manifest, graph)
    }

    /// Bring the lockfile in line with the manifest: resolve manifest
    /// entries the lockfile lacks (or holds at versions outside their
    /// constraints) and drop entries nothing requires anymore.
    pub fn sync(&mut self) -> Result<LockfileDiff, ManagerError> {
        let manifest = self.manifest.clone();
        let mut graph = self.working_graph(&manifest)?;

        for (id, constraint) in &manifest.mods {
            let range = Range::parse(constraint)?;
            let satisfied = graph
                .get(id)
                .is_some_and(|node| range.matches(&node.version));
            if satisfied {
                continue;
            }

            graph.remove(id);
            let version = self.newest_matching(id, &range)?;
            let node = self.resolver().get_item_data(id, &version)?.in_manifest();
            graph.add(node);
        }

        self.commit(manifest, graph)
    }
}
