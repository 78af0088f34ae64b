//! Dependency validation and backtracking
//!
//! Drives the resolution graph to a state where every declared dependency
//! constraint is satisfied by an installed node, querying the catalog for
//! candidate versions and recursing with local backtracking. The resolver
//! never replaces or removes manifest-pinned nodes; a conflict with a pinned
//! node is a hard failure no alternative candidate can fix.

use crate::catalog::{Catalog, CatalogError};
use crate::graph::{Node, ResolutionGraph};
use crate::modcache::{ModCache, ModCacheError};
use crate::semver::{Range, SemverError, Version};
use crate::{GAME_ID, LOADER_ID};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The catalog knows no such item (or item version)
    #[error("Mod not found: {id}{}", .version.as_ref().map(|v| format!("@{v}")).unwrap_or_default())]
    ModNotFound {
        id: String,
        version: Option<String>,
    },

    /// An illegal operation on the graph; indicates a logic bug in the caller
    #[error("Invalid lockfile operation: {0}")]
    InvalidLockfileOperation(String),

    /// A required dependency version conflicts with a manifest-pinned node
    #[error("{depender}@{depender_version} requires {dep_id} {constraint}, but {dep_id}@{dep_version} is pinned by the manifest; adjust {dep_id} manually")]
    DependencyManifestMismatch {
        dep_id: String,
        dep_version: Version,
        depender: String,
        depender_version: Version,
        constraint: String,
    },

    /// No catalog version satisfies the conjoined constraints
    #[error("No compatible version of {dep_id} found (required by {depender})")]
    UnsolvableDependency { dep_id: String, depender: String },

    /// Caller-requested abort
    #[error("Operation cancelled")]
    Cancelled,

    /// An item declared an unusable version field
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Malformed constraint expression
    #[error(transparent)]
    Constraint(#[from] SemverError),

    /// Catalog failure (network, API); surfaced unwrapped and unretried
    #[error(transparent)]
    Catalog(CatalogError),

    /// Mod cache failure (download, archive); surfaced unwrapped and unretried
    #[error(transparent)]
    ModCache(ModCacheError),
}

impl From<CatalogError> for ResolveError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound { id, version } => ResolveError::ModNotFound { id, version },
            other => ResolveError::Catalog(other),
        }
    }
}

impl From<ModCacheError> for ResolveError {
    fn from(err: ModCacheError) -> Self {
        match err {
            ModCacheError::NotFound { id, version } => ResolveError::ModNotFound {
                id,
                version: Some(version),
            },
            other => ResolveError::ModCache(other),
        }
    }
}

impl ResolveError {
    /// Errors a candidate trial must not swallow: a manifest conflict cannot
    /// be fixed by another candidate, and cancellation must stop the search.
    fn aborts_candidate_loop(&self) -> bool {
        matches!(
            self,
            ResolveError::DependencyManifestMismatch { .. } | ResolveError::Cancelled
        )
    }
}

/// Caller-supplied cancellation token.
///
/// Checked at entry to each `validate` and before each catalog call; on
/// cancel the resolver aborts and the graph is left in the partial state
/// reached (callers discard it).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Dependency resolver over an injected catalog and mod cache
pub struct Resolver<'a, C: Catalog, M: ModCache> {
    catalog: &'a C,
    mod_cache: &'a M,
    cancel: Option<CancelToken>,
}

impl<'a, C: Catalog, M: ModCache> Resolver<'a, C, M> {
    /// Create a resolver
    pub fn new(catalog: &'a C, mod_cache: &'a M) -> Self {
        Self {
            catalog,
            mod_cache,
            cancel: None,
        }
    }

    /// Attach a cancellation token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self) -> Result<(), ResolveError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ResolveError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Materialize the node for an (id, version) pair.
    ///
    /// The loader's dependency set is synthesized from the game version its
    /// release declares; the game itself is never resolved. For ordinary
    /// mods the metadata comes from the mod cache, and a declared
    /// `sml_version` is merged into the dependency map as a minimum loader
    /// constraint.
    pub fn get_item_data(&self, id: &str, version: &Version) -> Result<Node, ResolveError> {
        self.check_cancelled()?;

        if id == GAME_ID {
            return Err(ResolveError::InvalidLockfileOperation(format!(
                "cannot resolve {GAME_ID}: the game version is pinned by the caller"
            )));
        }

        if id == LOADER_ID {
            let info = self.catalog.get_loader_info(version)?.ok_or_else(|| {
                ResolveError::ModNotFound {
                    id: id.to_string(),
                    version: Some(version.to_string()),
                }
            })?;

            let game = Version::coerce(&info.game_version).ok_or_else(|| {
                ResolveError::InvalidMetadata(format!(
                    "loader {} declares unusable game version '{}'",
                    info.version, info.game_version
                ))
            })?;

            return Ok(
                Node::new(LOADER_ID, info.version).with_dependency(GAME_ID, format!(">={game}"))
            );
        }

        let meta = self.mod_cache.get_metadata(id, version)?;

        let mut node = Node::new(id, version.clone());
        node.dependencies = meta.dependencies;

        if let Some(raw) = meta.sml_version {
            let loader = Version::coerce(&raw).ok_or_else(|| {
                ResolveError::InvalidMetadata(format!(
                    "{id}@{version} declares unusable loader version '{raw}'"
                ))
            })?;
            node.dependencies
                .insert(LOADER_ID.to_string(), format!(">={loader}"));
        }

        Ok(node)
    }

    /// Validate every node currently in the graph.
    ///
    /// Iterates a snapshot of the ids present at call time; ids removed by
    /// earlier validations are skipped, and nodes inserted during validation
    /// were already validated recursively at insertion. On an already-valid
    /// graph this is a no-op beyond memoized catalog traffic.
    pub fn validate_all(&self, graph: &mut ResolutionGraph) -> Result<(), ResolveError> {
        let ids: Vec<String> = graph.ids().cloned().collect();
        for id in ids {
            self.validate(graph, &id)?;
        }
        Ok(())
    }

    /// Validate one node's dependencies, mutating the graph as needed.
    ///
    /// For each dependency, in ascending id order: an existing satisfying
    /// node is accepted; an incompatible manifest-pinned node is a hard
    /// failure; otherwise the stale node is removed, every constraint on the
    /// dependency id across the graph is conjoined, and catalog candidates
    /// are trialled newest-first with recursive validation. A failed
    /// candidate removes only its own subtree; already-accepted siblings are
    /// not re-examined (best-effort local backtracking, not a complete
    /// solver). When every candidate fails the prior node is restored and
    /// the dependency reported unsolvable.
    pub fn validate(&self, graph: &mut ResolutionGraph, id: &str) -> Result<(), ResolveError> {
        self.check_cancelled()?;

        // The node may have been removed by an earlier validation pass.
        let (depender_version, deps) = match graph.get(id) {
            Some(node) => (node.version.clone(), node.dependencies.clone()),
            None => return Ok(()),
        };

        for (dep_id, constraint) in deps {
            let range = Range::parse(&constraint)?;

            if let Some(existing) = graph.get(&dep_id) {
                if range.matches(&existing.version) {
                    continue;
                }

                if existing.is_in_manifest {
                    return Err(ResolveError::DependencyManifestMismatch {
                        dep_version: existing.version.clone(),
                        dep_id,
                        depender: id.to_string(),
                        depender_version,
                        constraint,
                    });
                }
            }

            let previous = graph.remove(&dep_id);

            // Conjoin every constraint the graph still places on this id;
            // the depender's own constraint is included because it is still
            // in the graph.
            let mut constraints = Vec::new();
            for node in graph.nodes() {
                if let Some(c) = node.dependencies.get(&dep_id) {
                    constraints.push(Range::parse(c)?);
                }
            }

            let mut candidates = self.matching_versions(&dep_id, &constraints)?;
            candidates.sort();

            let mut resolved = false;
            while let Some(candidate) = candidates.pop() {
                let child = match self.get_item_data(&dep_id, &candidate) {
                    Ok(child) => child,
                    Err(err) if err.aborts_candidate_loop() => return Err(err),
                    Err(err) => {
                        tracing::debug!(id = %dep_id, version = %candidate, error = %err, "skipping candidate");
                        continue;
                    }
                };

                graph.add(child);

                match self.validate(graph, &dep_id) {
                    Ok(()) => {
                        resolved = true;
                        break;
                    }
                    Err(err) if err.aborts_candidate_loop() => return Err(err),
                    Err(err) => {
                        tracing::debug!(id = %dep_id, version = %candidate, error = %err, "candidate rejected");
                        graph.remove(&dep_id);
                    }
                }
            }

            if !resolved {
                if let Some(previous) = previous {
                    graph.add(previous);
                }
                return Err(ResolveError::UnsolvableDependency {
                    dep_id,
                    depender: id.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Catalog versions of an id satisfying a constraint set
    fn matching_versions(
        &self,
        id: &str,
        constraints: &[Range],
    ) -> Result<Vec<Version>, ResolveError> {
        self.check_cancelled()?;
        Ok(self.catalog.list_matching_versions(id, constraints)?)
    }
}
