// src/buildpack/mod.rs

//! Buildpack references, groups, orders, and descriptors
//!
//! A `Buildpack` is a reference by `(id, version)` as it appears
//! inside orders and groups. Descriptors are what those references
//! resolve to on disk; a descriptor that carries its own order is a
//! meta-buildpack and is expanded inline during detection.

mod store;

pub use store::BuildpackStore;

use crate::api::BuildpackApi;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

fn is_false(b: &bool) -> bool {
    !b
}

/// A buildpack reference inside an order or group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Buildpack {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub privileged: bool,
}

impl Buildpack {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Copy with the API string filled in from a descriptor
    pub fn with_api(&self, api: &str) -> Self {
        Self {
            api: api.to_string(),
            ..self.clone()
        }
    }

    /// Copy with the optional flag cleared, as emitted in results
    pub fn no_opt(&self) -> Self {
        Self {
            optional: false,
            ..self.clone()
        }
    }

    /// Copy reduced to provider identity: id, version, and privilege
    pub fn as_provider(&self) -> Self {
        Self {
            id: self.id.clone(),
            version: self.version.clone(),
            privileged: self.privileged,
            ..Default::default()
        }
    }
}

impl fmt::Display for Buildpack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// An ordered set of buildpack references tried together
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BuildpackGroup {
    #[serde(default)]
    pub group: Vec<Buildpack>,
}

impl BuildpackGroup {
    pub fn new(group: Vec<Buildpack>) -> Self {
        Self { group }
    }
}

/// An ordered sequence of candidate groups
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuildpackOrder(pub Vec<BuildpackGroup>);

impl BuildpackOrder {
    pub fn groups(&self) -> &[BuildpackGroup] {
        &self.0
    }
}

/// On-disk order file: `[[order]]` tables of `[[order.group]]` refs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderToml {
    #[serde(default)]
    pub order: Vec<BuildpackGroup>,
}

impl From<OrderToml> for BuildpackOrder {
    fn from(file: OrderToml) -> Self {
        BuildpackOrder(file.order)
    }
}

/// A buildpack descriptor resolved from disk
#[derive(Debug, Clone, PartialEq)]
pub struct BuildpackDescriptor {
    pub api: String,
    pub id: String,
    pub version: String,
    pub name: String,
    pub clear_env: bool,
    /// Whether this descriptor was resolved as a stack buildpack.
    /// Carried from the reference, not from the descriptor file.
    pub privileged: bool,
    /// Non-empty for meta-buildpacks
    pub order: Vec<BuildpackGroup>,
    /// Absolute buildpack directory
    pub path: PathBuf,
}

impl BuildpackDescriptor {
    /// Whether this descriptor carries its own order
    pub fn is_meta(&self) -> bool {
        !self.order.is_empty()
    }

    /// The normalization gate for this buildpack's API generation
    pub fn buildpack_api(&self) -> BuildpackApi {
        BuildpackApi::parse(&self.api)
    }

    /// Whether detect runs against the cleared environment
    ///
    /// Selected by the `.clear` version suffix or an explicit
    /// `clear-env = true` in the descriptor.
    pub fn clears_env(&self) -> bool {
        self.clear_env || self.version.ends_with(".clear")
    }
}

impl fmt::Display for BuildpackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}
