// src/plan/parser.rs

//! Plan document parsing and normalization
//!
//! The detect contract writes a TOML document with zero or more
//! `[[provides]]`, `[[requires]]`, and `[[or]]` tables. Parsing
//! applies per-API-generation reconciliation of `version` against
//! `metadata.version` and rejects emissions a buildpack of the given
//! privilege class is not allowed to make. A failure in any alternate
//! fails the whole document.

use crate::api::BuildpackApi;
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::plan::{PlanOptions, PlanSections, Provide, Require};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    provides: Vec<Provide>,
    #[serde(default)]
    requires: Vec<RawRequire>,
    #[serde(default, rename = "or")]
    alternates: Vec<RawSections>,
}

#[derive(Debug, Deserialize)]
struct RawSections {
    #[serde(default)]
    provides: Vec<Provide>,
    #[serde(default)]
    requires: Vec<RawRequire>,
}

#[derive(Debug, Deserialize)]
struct RawRequire {
    name: String,
    #[serde(default)]
    mixin: bool,
    version: Option<String>,
    #[serde(default)]
    metadata: toml::value::Table,
}

/// Identity and class of the emitting buildpack, for validation and
/// message formatting
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub id: &'a str,
    pub version: &'a str,
    pub api: BuildpackApi,
    pub privileged: bool,
}

/// Parse and normalize a detect plan document
pub fn parse_plan(
    content: &str,
    ctx: &PlanContext<'_>,
    logger: &dyn Logger,
) -> Result<PlanOptions> {
    let raw: RawPlan = toml::from_str(content).map_err(|e| Error::buildpack(e.to_string()))?;

    let sections = normalize_sections(raw.provides, raw.requires, ctx, logger)?;
    let mut alternates = Vec::with_capacity(raw.alternates.len());
    for alt in raw.alternates {
        alternates.push(normalize_sections(alt.provides, alt.requires, ctx, logger)?);
    }

    Ok(PlanOptions {
        sections,
        alternates,
    })
}

fn normalize_sections(
    provides: Vec<Provide>,
    requires: Vec<RawRequire>,
    ctx: &PlanContext<'_>,
    logger: &dyn Logger,
) -> Result<PlanSections> {
    if ctx.privileged && !requires.is_empty() {
        return Err(Error::buildpack(format!(
            "priviledged buildpack {} has defined \"requires\", which is not allowed.",
            ctx.id
        )));
    }
    if !ctx.privileged {
        for provide in &provides {
            if provide.mixin {
                return Err(Error::buildpack(format!(
                    "buildpack {}@{} has defined \"provide\" with \"mixin = true\", which is not allowed.",
                    ctx.id, ctx.version
                )));
            }
            if provide.any {
                return Err(Error::buildpack(format!(
                    "buildpack {}@{} has defined \"provide\" with \"any = true\", which is not allowed.",
                    ctx.id, ctx.version
                )));
            }
        }
    }

    let mut normalized = Vec::with_capacity(requires.len());
    for require in requires {
        normalized.push(normalize_require(require, ctx, logger)?);
    }

    Ok(PlanSections {
        provides,
        requires: normalized,
    })
}

/// Reconcile a requirement's top-level `version` with
/// `metadata.version` under the emitting buildpack's API rules
fn normalize_require(
    raw: RawRequire,
    ctx: &PlanContext<'_>,
    logger: &dyn Logger,
) -> Result<Require> {
    let mut metadata = raw.metadata;

    if let Some(version) = raw.version {
        let value = toml::Value::String(version);
        match ctx.api {
            BuildpackApi::V0_2 => {
                if let Some(existing) = metadata.get("version") {
                    if *existing != value {
                        return Err(Error::buildpack(format!(
                            "buildpack {} has a \"version\" key that does not match \"metadata.version\"",
                            ctx.id
                        )));
                    }
                }
                metadata.insert("version".to_string(), value);
            }
            BuildpackApi::V0_3 => {
                if metadata.contains_key("version") {
                    return Err(Error::buildpack(format!(
                        "buildpack {} has a \"version\" key and a \"metadata.version\" which cannot be specified together. \"metadata.version\" should be used instead",
                        ctx.id
                    )));
                }
                logger.warn(&format!(
                    "Warning: buildpack {} has a \"version\" key. This key is deprecated in build plan requirements in buildpack API 0.3. \"metadata.version\" should be used instead",
                    ctx.id
                ));
                metadata.insert("version".to_string(), value);
            }
        }
    }

    Ok(Require {
        name: raw.name,
        mixin: raw.mixin,
        metadata,
    })
}
