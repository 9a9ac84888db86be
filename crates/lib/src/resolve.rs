//! Target resolution.
//!
//! Known targets and named groups are declared once, centrally, in a
//! `targets.toml` manifest inside the definitions directory:
//!
//! ```toml
//! targets = ["almalinux9", "debian12", "ubuntu24"]
//!
//! [groups]
//! debian-family = ["debian12", "ubuntu24"]
//! ```
//!
//! The group alias `all` is always available and expands to every declared
//! target in declaration order. Resolution expands groups, deduplicates
//! while preserving first-seen order, and locates each target's definition
//! file before anything is scheduled.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::BuildRequest;
use crate::target::Target;

/// Built-in group alias expanding to every declared target.
pub const GROUP_ALL: &str = "all";

/// Manifest file name, looked up inside the definitions directory.
pub const MANIFEST_FILE: &str = "targets.toml";

/// File extension of definition files.
pub const DEFINITION_EXT: &str = "def";

/// Fatal resolution errors. These abort the run before any scheduling.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// No `targets.toml` in the definitions directory.
  #[error("target manifest not found: {0}")]
  ManifestNotFound(PathBuf),

  /// Manifest exists but could not be read.
  #[error("failed to read target manifest {path}: {source}")]
  ManifestRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Manifest exists but is not valid TOML.
  #[error("failed to parse target manifest {path}: {source}")]
  ManifestParse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  /// Requested name is neither a declared target nor a group.
  #[error("unknown target: {0}")]
  InvalidTarget(String),

  /// Target is declared but its definition file is missing.
  #[error("definition not found for target {name}: expected {path}")]
  TargetNotFound { name: String, path: PathBuf },

  /// A group references a name that is not a declared target.
  #[error("group {group} references undeclared target {name}")]
  InvalidGroup { group: String, name: String },

  /// A group shadows the built-in alias or a target name.
  #[error("group name {0} conflicts with an existing target or alias")]
  GroupNameConflict(String),
}

#[derive(Debug, Deserialize)]
struct ManifestFileData {
  targets: Vec<String>,
  #[serde(default)]
  groups: BTreeMap<String, Vec<String>>,
}

/// Declared targets and group aliases, loaded from `targets.toml`.
#[derive(Debug, Clone)]
pub struct TargetManifest {
  targets: Vec<String>,
  groups: BTreeMap<String, Vec<String>>,
}

impl TargetManifest {
  /// Load and validate the manifest from a definitions directory.
  pub fn load(defs_dir: &Path) -> Result<Self, ResolveError> {
    let path = defs_dir.join(MANIFEST_FILE);
    if !path.exists() {
      return Err(ResolveError::ManifestNotFound(path));
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| ResolveError::ManifestRead {
      path: path.clone(),
      source,
    })?;
    let data: ManifestFileData =
      toml::from_str(&raw).map_err(|source| ResolveError::ManifestParse { path, source })?;

    let manifest = Self {
      targets: data.targets,
      groups: data.groups,
    };
    manifest.check()?;

    debug!(
      targets = manifest.targets.len(),
      groups = manifest.groups.len(),
      "loaded target manifest"
    );
    Ok(manifest)
  }

  fn check(&self) -> Result<(), ResolveError> {
    let declared: HashSet<&str> = self.targets.iter().map(String::as_str).collect();
    for (group, members) in &self.groups {
      if group == GROUP_ALL || declared.contains(group.as_str()) {
        return Err(ResolveError::GroupNameConflict(group.clone()));
      }
      for member in members {
        if !declared.contains(member.as_str()) {
          return Err(ResolveError::InvalidGroup {
            group: group.clone(),
            name: member.clone(),
          });
        }
      }
    }
    Ok(())
  }

  /// Declared target names, in declaration order.
  pub fn targets(&self) -> &[String] {
    &self.targets
  }

  /// Declared group aliases (excluding the built-in `all`).
  pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
    self.groups.iter().map(|(name, members)| (name.as_str(), members.as_slice()))
  }

  /// Expand a group alias to its member target names, if `name` is one.
  ///
  /// This is the single place group expansion is defined.
  fn expand(&self, name: &str) -> Option<&[String]> {
    if name == GROUP_ALL {
      return Some(&self.targets);
    }
    self.groups.get(name).map(Vec::as_slice)
  }

  fn is_target(&self, name: &str) -> bool {
    self.targets.iter().any(|t| t == name)
  }
}

/// Resolve requested names into a deduplicated, ordered list of targets.
///
/// An empty request means the `all` alias. Every resolved target has its
/// definition file checked here, so a request that cannot be fully
/// resolved never starts any work.
pub fn resolve(
  requested: &[String],
  manifest: &TargetManifest,
  request: &BuildRequest,
) -> Result<Vec<Target>, ResolveError> {
  let all = [GROUP_ALL.to_string()];
  let requested: &[String] = if requested.is_empty() { &all } else { requested };

  // Expand groups, then dedup preserving first-seen order.
  let mut names: Vec<&str> = Vec::new();
  let mut seen: HashSet<&str> = HashSet::new();
  for name in requested {
    let expanded: Vec<&str> = match manifest.expand(name) {
      Some(members) => members.iter().map(String::as_str).collect(),
      None if manifest.is_target(name) => vec![name.as_str()],
      None => return Err(ResolveError::InvalidTarget(name.clone())),
    };
    for name in expanded {
      if seen.insert(name) {
        names.push(name);
      }
    }
  }

  let mut targets = Vec::with_capacity(names.len());
  for name in names {
    let definition = request.defs_dir.join(format!("{}.{}", name, DEFINITION_EXT));
    if !definition.exists() {
      return Err(ResolveError::TargetNotFound {
        name: name.to_string(),
        path: definition,
      });
    }
    let output = request.output_dir.join(format!("{}.sif", name));
    targets.push(Target::new(name, definition, output));
  }

  debug!(count = targets.len(), "resolved targets");
  Ok(targets)
}
