// src/detect/mod.rs

//! Detection orchestration
//!
//! Drives the order walk: flat candidate groups come out of the
//! expander, each group runs per-buildpack detect and plan
//! resolution, and the first group that resolves wins. A buildpack
//! failing in an unexpected way stops the walk; a group merely
//! failing detection moves the walk to the next candidate.

pub mod expand;
pub mod resolve;
pub mod runner;

pub use runner::{DetectRun, CODE_DETECT_FAIL, CODE_DETECT_PASS};

use crate::buildpack::{
    Buildpack, BuildpackDescriptor, BuildpackGroup, BuildpackOrder, BuildpackStore,
};
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::plan::BuildPlan;
use expand::GroupExpansion;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything detection needs; no global state
#[derive(Clone)]
pub struct DetectConfig {
    /// Environment passed to detect by default
    pub full_env: Vec<(String, String)>,
    /// Environment passed to detect for clear-env buildpacks
    pub clear_env: Vec<(String, String)>,
    /// Application directory; detect's working directory
    pub app_dir: PathBuf,
    /// Platform inputs root, passed as detect's first argument
    pub platform_dir: PathBuf,
    /// Root of regular buildpack descriptors
    pub buildpacks_dir: PathBuf,
    /// Root of privileged (stack) buildpack descriptors
    pub stack_buildpacks_dir: PathBuf,
    /// Sink for the detection log protocol
    pub logger: Arc<dyn Logger>,
    /// Cooperative cancellation, checked between groups and between
    /// per-buildpack detect runs; an in-flight child always finishes
    pub cancel: Arc<AtomicBool>,
}

impl DetectConfig {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// The chosen groups and materialized plans for a passing group
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectResult {
    pub build_group: BuildpackGroup,
    pub build_privileged_group: BuildpackGroup,
    pub run_group: BuildpackGroup,
    pub build_plan: BuildPlan,
    pub run_plan: BuildPlan,
}

/// Descriptor roots for regular and stack buildpacks
pub(crate) struct Stores {
    app: BuildpackStore,
    stack: BuildpackStore,
}

impl Stores {
    pub(crate) fn open(config: &DetectConfig) -> Result<Self> {
        Self::from_dirs(&config.buildpacks_dir, &config.stack_buildpacks_dir)
    }

    pub(crate) fn from_dirs(buildpacks_dir: &Path, stack_buildpacks_dir: &Path) -> Result<Self> {
        Ok(Self {
            app: BuildpackStore::new(buildpacks_dir)?,
            stack: BuildpackStore::new(stack_buildpacks_dir)?,
        })
    }

    /// Resolve a reference against the root its privilege selects
    pub(crate) fn descriptor_for(&self, bp: &Buildpack) -> Result<BuildpackDescriptor> {
        let store = if bp.privileged { &self.stack } else { &self.app };
        let mut descriptor = store.lookup(&bp.id, &bp.version)?;
        descriptor.privileged = bp.privileged;
        Ok(descriptor)
    }
}

impl BuildpackOrder {
    /// Detect against every candidate group in order
    ///
    /// Returns the first group that resolves. `Error::Buildpack` (a
    /// non-optional buildpack failed unexpectedly) stops the walk
    /// immediately; `Error::FailedDetection` moves on to the next
    /// candidate and is surfaced only once every candidate has failed.
    pub fn detect(&self, config: &DetectConfig) -> Result<DetectResult> {
        let stores = Stores::open(config)?;
        let mut last_err = None;

        for group in GroupExpansion::new(self, &stores) {
            config.check_cancelled()?;
            let group = group?;
            match resolve::detect_group(&group, config, &stores) {
                Ok(result) => return Ok(result),
                Err(e) if e.is_failed_detection() => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(Error::FailedDetection))
    }

    /// Flatten this order against the given descriptor roots without
    /// running detect
    pub fn expanded_groups(
        &self,
        buildpacks_dir: &Path,
        stack_buildpacks_dir: &Path,
    ) -> Result<Vec<BuildpackGroup>> {
        let stores = Stores::from_dirs(buildpacks_dir, stack_buildpacks_dir)?;
        GroupExpansion::new(self, &stores).collect()
    }
}
