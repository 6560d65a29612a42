// src/buildpack/store.rs

//! Descriptor loading from a content-addressed buildpack layout
//!
//! Buildpacks live at `<root>/<id>/<version>/buildpack.toml` with the
//! detect executable at `<root>/<id>/<version>/bin/detect`. Privileged
//! (stack) buildpacks live under a separate root; the caller picks the
//! store matching the reference's privilege flag.

use crate::buildpack::{BuildpackDescriptor, BuildpackGroup};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    #[serde(default)]
    api: String,
    buildpack: InfoSection,
    #[serde(default)]
    order: Vec<BuildpackGroup>,
}

#[derive(Debug, Deserialize)]
struct InfoSection {
    id: String,
    version: String,
    name: String,
    #[serde(default, rename = "clear-env")]
    clear_env: bool,
}

/// Read-only view over one buildpack root directory
#[derive(Debug, Clone)]
pub struct BuildpackStore {
    root: PathBuf,
}

impl BuildpackStore {
    /// Open a store rooted at `root`
    ///
    /// The root is canonicalized so descriptor paths (and the
    /// `CNB_BUILDPACK_DIR` passed to detect) are absolute.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `(id, version)` to its descriptor
    pub fn lookup(&self, id: &str, version: &str) -> Result<BuildpackDescriptor> {
        let dir = self.root.join(id).join(version);
        let descriptor_path = dir.join("buildpack.toml");

        let raw = match fs::read_to_string(&descriptor_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::BuildpackNotFound {
                    id: id.to_string(),
                    version: version.to_string(),
                    root: self.root.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let file: DescriptorFile =
            toml::from_str(&raw).map_err(|e| Error::MalformedDescriptor {
                path: descriptor_path.clone(),
                reason: e.to_string(),
            })?;

        Ok(BuildpackDescriptor {
            api: file.api,
            id: file.buildpack.id,
            version: file.buildpack.version,
            name: file.buildpack.name,
            clear_env: file.buildpack.clear_env,
            privileged: false,
            order: file.order,
            path: dir,
        })
    }
}
