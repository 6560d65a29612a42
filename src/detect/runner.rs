// src/detect/runner.rs

//! Detect process execution
//!
//! Runs one buildpack's `bin/detect <platform_dir> <plan_path>`
//! synchronously with captured stdio and a composed environment, then
//! reads back the emitted plan file. Exit code 0 is a pass, 100 is a
//! skip, anything else is an unexpected buildpack failure. Runner and
//! plan-validation failures are reported as code -1 with a message on
//! the run rather than as process-level errors, so the resolver can
//! treat them uniformly.

use crate::buildpack::BuildpackDescriptor;
use crate::detect::DetectConfig;
use crate::plan::parser::{parse_plan, PlanContext};
use crate::plan::PlanOptions;
use std::fs::{self, File};
use std::process::Command;
use tempfile::TempDir;

/// Detect exit code meaning "this buildpack applies"
pub const CODE_DETECT_PASS: i32 = 0;
/// Detect exit code meaning "this buildpack does not apply"
pub const CODE_DETECT_FAIL: i32 = 100;

/// The outcome of one detect invocation
#[derive(Debug, Clone, Default)]
pub struct DetectRun {
    /// Process exit code; -1 for runner or validation failures
    pub code: i32,
    /// Captured stdout
    pub output: Vec<u8>,
    /// Captured stderr
    pub stderr: Vec<u8>,
    /// Parsed plan; empty unless the run passed
    pub plan: PlanOptions,
    /// Runner or validation failure message
    pub err: Option<String>,
}

impl DetectRun {
    fn runner_err(message: String) -> Self {
        Self {
            code: -1,
            err: Some(message),
            ..Default::default()
        }
    }

    /// Stdout and stderr combined in capture order
    pub fn combined_output(&self) -> Vec<u8> {
        let mut combined = self.output.clone();
        combined.extend_from_slice(&self.stderr);
        combined
    }
}

impl BuildpackDescriptor {
    /// Run this buildpack's detect executable
    pub fn detect(&self, config: &DetectConfig) -> DetectRun {
        let plan_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                return DetectRun::runner_err(format!(
                    "failed to create plan directory for {}: {}",
                    self, e
                ))
            }
        };
        let plan_path = plan_dir.path().join("plan.toml");
        if let Err(e) = File::create(&plan_path) {
            return DetectRun::runner_err(format!(
                "failed to create plan file for {}: {}",
                self, e
            ));
        }

        let env = if self.clears_env() {
            &config.clear_env
        } else {
            &config.full_env
        };

        let output = Command::new(self.path.join("bin").join("detect"))
            .arg(&config.platform_dir)
            .arg(&plan_path)
            .current_dir(&config.app_dir)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("CNB_BUILDPACK_DIR", &self.path)
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return DetectRun::runner_err(format!("failed to run detect for {}: {}", self, e))
            }
        };

        let code = match output.status.code() {
            Some(code) => code,
            None => {
                return DetectRun {
                    code: -1,
                    output: output.stdout,
                    stderr: output.stderr,
                    plan: PlanOptions::default(),
                    err: Some(format!("detect for {} terminated by signal", self)),
                }
            }
        };

        let mut run = DetectRun {
            code,
            output: output.stdout,
            stderr: output.stderr,
            plan: PlanOptions::default(),
            err: None,
        };

        // Only a passing run publishes a plan; validation failures
        // demote the pass to a runner error.
        if run.code == CODE_DETECT_PASS {
            match self.read_plan(&plan_path, config) {
                Ok(plan) => run.plan = plan,
                Err(message) => {
                    run.code = -1;
                    run.err = Some(message);
                }
            }
        }

        run
    }

    fn read_plan(
        &self,
        plan_path: &std::path::Path,
        config: &DetectConfig,
    ) -> std::result::Result<PlanOptions, String> {
        let content = fs::read_to_string(plan_path)
            .map_err(|e| format!("failed to read plan for {}: {}", self, e))?;

        let ctx = PlanContext {
            id: &self.id,
            version: &self.version,
            api: self.buildpack_api(),
            privileged: self.privileged,
        };

        parse_plan(&content, &ctx, config.logger.as_ref()).map_err(|e| e.to_string())
    }
}
