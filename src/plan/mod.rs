// src/plan/mod.rs

//! Build plan types
//!
//! Detect output is parsed into a primary set of plan sections plus
//! zero or more alternates (the `or` list). Resolution picks exactly
//! one alternate per participating buildpack and materializes the
//! chosen provider/requirer bindings as build plan entries.

pub mod parser;

use crate::buildpack::Buildpack;
use serde::{Deserialize, Serialize};

fn is_false(b: &bool) -> bool {
    !b
}

/// A capability offered by a buildpack's detect output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Provide {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub mixin: bool,
    /// Stack-only wildcard matching any residual mixin requirement
    #[serde(default, skip_serializing_if = "is_false")]
    pub any: bool,
}

impl Provide {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A dependency demanded by a buildpack's detect output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Require {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub mixin: bool,
    #[serde(default, skip_serializing_if = "toml::value::Table::is_empty")]
    pub metadata: toml::value::Table,
}

impl Require {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Copy with the stage prefix stripped from the name
    pub fn named(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }
}

/// One provides/requires shape emitted by detect
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanSections {
    pub provides: Vec<Provide>,
    pub requires: Vec<Require>,
}

/// The full detect emission: a primary shape plus ordered alternates
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanOptions {
    pub sections: PlanSections,
    pub alternates: Vec<PlanSections>,
}

impl PlanOptions {
    /// Number of selectable shapes (primary first, then alternates)
    pub fn option_count(&self) -> usize {
        1 + self.alternates.len()
    }

    /// Shape at `index`, primary being index zero
    pub fn option(&self, index: usize) -> &PlanSections {
        if index == 0 {
            &self.sections
        } else {
            &self.alternates[index - 1]
        }
    }
}

/// The build or run stage of the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Run,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Run => "run",
        }
    }
}

/// Split an optional `build:`/`run:` stage prefix off a name
///
/// Returns the stage (None meaning both stages) and the base name.
pub fn split_stage(name: &str) -> (Option<Stage>, &str) {
    if let Some(base) = name.strip_prefix("build:") {
        (Some(Stage::Build), base)
    } else if let Some(base) = name.strip_prefix("run:") {
        (Some(Stage::Run), base)
    } else {
        (None, name)
    }
}

/// One resolved dependency: every provider and every matching require
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BuildPlanEntry {
    pub providers: Vec<Buildpack>,
    pub requires: Vec<Require>,
}

/// The materialized plan for one stage
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BuildPlan {
    pub entries: Vec<BuildPlanEntry>,
}
