//! Mod catalog interface and ficsit.app client
//!
//! The resolver consumes the catalog only through the [`Catalog`] trait:
//! enumerate the versions of an item matching a constraint set, fetch one
//! version's dependency metadata, and list loader releases. `FicsitCatalog`
//! implements the trait against the ficsit.app GraphQL API with a
//! process-wide memo cache so repeated validation passes stay off the
//! network.

use crate::semver::{Range, Version};
use crate::LOADER_ID;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default GraphQL endpoint
pub const DEFAULT_API_URL: &str = "https://api.ficsit.app/v2/query";

/// How long memoized catalog responses stay fresh
pub const CATALOG_CACHE_TTL: Duration = Duration::from_secs(300);

/// Errors that can occur during catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog knows no such item (or item version)
    #[error("Mod not found: {id}{}", .version.as_ref().map(|v| format!("@{v}")).unwrap_or_default())]
    NotFound {
        id: String,
        version: Option<String>,
    },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The API reported an error or returned a non-success status
    #[error("Catalog API error: {0}")]
    ApiError(String),

    /// The API response did not have the expected shape
    #[error("Unexpected catalog response: {0}")]
    InvalidResponse(String),
}

/// Dependency metadata for one (item, version)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModMeta {
    /// The item the metadata describes; must equal the requested id
    pub mod_id: String,

    /// The described version
    pub version: Version,

    /// Declared dependencies (item id to constraint expression)
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// Declared loader constraint, when the mod targets a specific loader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sml_version: Option<String>,
}

/// One loader release: its version and the minimum game version it targets
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderInfo {
    /// Loader version
    pub version: Version,

    /// Declared game version; may be a bare build number ("109000")
    pub game_version: String,
}

/// Read access to the mod catalog.
///
/// `list_matching_versions` returns versions in no particular order (the
/// resolver sorts); it returns an empty list when no version matches the
/// constraints, and fails with [`CatalogError::NotFound`] only when the id
/// has no published versions at all.
pub trait Catalog {
    fn list_matching_versions(
        &self,
        id: &str,
        constraints: &[Range],
    ) -> Result<Vec<Version>, CatalogError>;

    fn get_mod_metadata(&self, id: &str, version: &Version) -> Result<ModMeta, CatalogError>;

    fn list_loader_versions(&self) -> Result<Vec<LoaderInfo>, CatalogError>;

    fn get_loader_info(&self, version: &Version) -> Result<Option<LoaderInfo>, CatalogError>;
}

const MOD_VERSIONS_QUERY: &str = r#"
query ModVersions($modReference: ModReference!) {
  getModByReference(modReference: $modReference) {
    versions(filter: { limit: 100 }) {
      version
    }
  }
}
"#;

const MOD_VERSION_META_QUERY: &str = r#"
query ModVersionMeta($modReference: ModReference!, $version: String!) {
  getModByReference(modReference: $modReference) {
    version(version: $version) {
      version
      sml_version
      dependencies {
        mod_id
        condition
      }
    }
  }
}
"#;

const SML_VERSIONS_QUERY: &str = r#"
query SmlVersions {
  getSMLVersions(filter: { limit: 100 }) {
    sml_versions {
      version
      satisfactory_version
    }
  }
}
"#;

/// ficsit.app catalog client.
///
/// Responses are memoized per request key with a 5-minute TTL; the cache is
/// owned entirely by this implementation, so tests inject an in-memory
/// [`Catalog`] instead of disabling it.
pub struct FicsitCatalog {
    client: Client,
    endpoint: String,
    ttl: Duration,
    memo: Mutex<HashMap<String, (Instant, Value)>>,
}

impl FicsitCatalog {
    /// Create a client for the default endpoint
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_endpoint(DEFAULT_API_URL)
    }

    /// Create a client for a custom endpoint
    pub fn with_endpoint(endpoint: &str) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("smm/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            ttl: CATALOG_CACHE_TTL,
            memo: Mutex::new(HashMap::new()),
        })
    }

    /// Override the memo TTL (zero disables memoization)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Run a GraphQL query, memoized by `key`
    fn query(&self, key: &str, query: &str, variables: Value) -> Result<Value, CatalogError> {
        if let Ok(memo) = self.memo.lock() {
            if let Some((stored_at, data)) = memo.get(key) {
                if stored_at.elapsed() < self.ttl {
                    tracing::debug!(key, "catalog cache hit");
                    return Ok(data.clone());
                }
            }
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()?;

        if !response.status().is_success() {
            return Err(CatalogError::ApiError(format!(
                "catalog returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json()?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if let Some(first) = errors.first() {
                let message = first
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(CatalogError::ApiError(message.to_string()));
            }
        }

        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| CatalogError::InvalidResponse("missing data field".to_string()))?;

        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(key.to_string(), (Instant::now(), data.clone()));
        }

        Ok(data)
    }

    /// All published versions of a mod
    fn mod_versions(&self, id: &str) -> Result<Vec<Version>, CatalogError> {
        let data = self.query(
            &format!("mod_versions:{id}"),
            MOD_VERSIONS_QUERY,
            json!({ "modReference": id }),
        )?;

        mod_versions_from(id, &data)
    }
}

impl Catalog for FicsitCatalog {
    fn list_matching_versions(
        &self,
        id: &str,
        constraints: &[Range],
    ) -> Result<Vec<Version>, CatalogError> {
        let published = if id == LOADER_ID {
            self.list_loader_versions()?
                .into_iter()
                .map(|l| l.version)
                .collect()
        } else {
            self.mod_versions(id)?
        };

        Ok(published
            .into_iter()
            .filter(|v| Range::matches_all(v, constraints))
            .collect())
    }

    fn get_mod_metadata(&self, id: &str, version: &Version) -> Result<ModMeta, CatalogError> {
        let data = self.query(
            &format!("mod_meta:{id}:{version}"),
            MOD_VERSION_META_QUERY,
            json!({ "modReference": id, "version": version.to_string() }),
        )?;

        mod_meta_from(id, version, &data)
    }

    fn list_loader_versions(&self) -> Result<Vec<LoaderInfo>, CatalogError> {
        let data = self.query("sml_versions", SML_VERSIONS_QUERY, json!({}))?;
        loader_infos_from(&data)
    }

    fn get_loader_info(&self, version: &Version) -> Result<Option<LoaderInfo>, CatalogError> {
        Ok(self
            .list_loader_versions()?
            .into_iter()
            .find(|l| l.version == *version))
    }
}

/// Extract the published version list from a ModVersions response
fn mod_versions_from(id: &str, data: &Value) -> Result<Vec<Version>, CatalogError> {
    let entry = data.get("getModByReference");
    let entry = match entry {
        Some(v) if !v.is_null() => v,
        _ => {
            return Err(CatalogError::NotFound {
                id: id.to_string(),
                version: None,
            })
        }
    };

    let mut versions = Vec::new();
    if let Some(list) = entry.get("versions").and_then(Value::as_array) {
        for item in list {
            let Some(raw) = item.get("version").and_then(Value::as_str) else {
                continue;
            };
            match Version::parse(raw) {
                Ok(v) => versions.push(v),
                Err(_) => tracing::warn!(id, version = raw, "skipping unparseable version"),
            }
        }
    }

    if versions.is_empty() {
        return Err(CatalogError::NotFound {
            id: id.to_string(),
            version: None,
        });
    }

    Ok(versions)
}

/// Build a [`ModMeta`] from a ModVersionMeta response
fn mod_meta_from(id: &str, version: &Version, data: &Value) -> Result<ModMeta, CatalogError> {
    let entry = data.get("getModByReference");
    let entry = match entry {
        Some(v) if !v.is_null() => v,
        _ => {
            return Err(CatalogError::NotFound {
                id: id.to_string(),
                version: None,
            })
        }
    };

    let ver = entry.get("version");
    let ver = match ver {
        Some(v) if !v.is_null() => v,
        _ => {
            return Err(CatalogError::NotFound {
                id: id.to_string(),
                version: Some(version.to_string()),
            })
        }
    };

    let mut dependencies = BTreeMap::new();
    if let Some(deps) = ver.get("dependencies").and_then(Value::as_array) {
        for dep in deps {
            let (Some(mod_id), Some(condition)) = (
                dep.get("mod_id").and_then(Value::as_str),
                dep.get("condition").and_then(Value::as_str),
            ) else {
                return Err(CatalogError::InvalidResponse(format!(
                    "malformed dependency entry for {id}@{version}"
                )));
            };
            dependencies.insert(mod_id.to_string(), condition.to_string());
        }
    }

    let sml_version = ver
        .get("sml_version")
        .and_then(Value::as_str)
        .map(String::from);

    Ok(ModMeta {
        mod_id: id.to_string(),
        version: version.clone(),
        dependencies,
        sml_version,
    })
}

/// Extract loader releases from a SmlVersions response
fn loader_infos_from(data: &Value) -> Result<Vec<LoaderInfo>, CatalogError> {
    let list = data
        .pointer("/getSMLVersions/sml_versions")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            CatalogError::InvalidResponse("missing sml_versions field".to_string())
        })?;

    let mut infos = Vec::new();
    for item in list {
        let Some(raw) = item.get("version").and_then(Value::as_str) else {
            continue;
        };
        let version = match Version::parse(raw) {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(version = raw, "skipping unparseable loader version");
                continue;
            }
        };

        let game_version = match item.get("satisfactory_version") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(CatalogError::InvalidResponse(format!(
                    "loader {raw} has no game version"
                )))
            }
        };

        infos.push(LoaderInfo {
            version,
            game_version,
        });
    }

    if infos.is_empty() {
        return Err(CatalogError::NotFound {
            id: LOADER_ID.to_string(),
            version: None,
        });
    }

    Ok(infos)
}
