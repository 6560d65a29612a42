// tests/common/mod.rs

//! Shared test fixtures for detection integration tests.
//!
//! Builds a scratch workspace holding an app directory, a platform
//! directory, and a `by-id` buildpack tree whose detect scripts are
//! driven by files in the app directory:
//!
//! - `detect-status-<id>-<version>` (falling back to `detect-status`)
//!   controls the exit code, defaulting to 0
//! - `detect-plan-<id>-<version>.toml` is copied to the plan path
//! - each run records `ENV_TYPE` and `CNB_BUILDPACK_DIR` into
//!   `detect-env-*` files for assertions

use kiln::{Buildpack, BuildpackGroup, BuildpackOrder, BuildPlanEntry, DetectConfig, LogLevel, MemoryLogger};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

pub struct DetectHarness {
    tmp: TempDir,
    logger: Arc<MemoryLogger>,
}

impl DetectHarness {
    pub fn new() -> Self {
        Self::with_log_level(LogLevel::Debug)
    }

    pub fn with_log_level(level: LogLevel) -> Self {
        let tmp = TempDir::new().unwrap();
        let harness = Self {
            tmp,
            logger: Arc::new(MemoryLogger::with_level(level)),
        };
        fs::create_dir_all(harness.app_dir()).unwrap();
        fs::create_dir_all(harness.platform_dir().join("env")).unwrap();
        harness.populate_buildpacks();
        harness
    }

    pub fn app_dir(&self) -> PathBuf {
        self.tmp.path().join("app")
    }

    pub fn platform_dir(&self) -> PathBuf {
        self.tmp.path().join("platform")
    }

    pub fn buildpacks_dir(&self) -> PathBuf {
        self.tmp.path().join("by-id")
    }

    pub fn config(&self) -> DetectConfig {
        let mut full_env: Vec<(String, String)> = std::env::vars().collect();
        full_env.push(("ENV_TYPE".to_string(), "full".to_string()));
        let mut clear_env: Vec<(String, String)> = std::env::vars().collect();
        clear_env.push(("ENV_TYPE".to_string(), "clear".to_string()));

        DetectConfig {
            full_env,
            clear_env,
            app_dir: self.app_dir(),
            platform_dir: self.platform_dir(),
            buildpacks_dir: self.buildpacks_dir(),
            stack_buildpacks_dir: self.buildpacks_dir(),
            logger: self.logger.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn logs(&self) -> String {
        self.logger.messages()
    }

    /// Overwrite app files with the given contents
    pub fn set_app_file(&self, data: &str, names: &[&str]) {
        for name in names {
            fs::write(self.app_dir().join(name), data).unwrap();
        }
    }

    /// Append to app files, creating them as needed
    pub fn append_app_file(&self, data: &str, names: &[&str]) {
        for name in names {
            let path = self.app_dir().join(name);
            let mut content = fs::read_to_string(&path).unwrap_or_default();
            content.push_str(data);
            fs::write(&path, content).unwrap();
        }
    }

    pub fn read_app_file(&self, name: &str) -> String {
        fs::read_to_string(self.app_dir().join(name)).unwrap()
    }

    fn populate_buildpacks(&self) {
        // Leaf buildpacks with noisy detect scripts
        for (id, version, api) in [
            ("A", "v1", "0.3"),
            ("A", "v1.clear", "0.3"),
            ("B", "v1", "0.2"),
            ("B", "v2", "0.2"),
            ("C", "v1", "0.2"),
            ("C", "v2", "0.2"),
            ("D", "v1", "0.2"),
            ("D", "v2", "0.2"),
        ] {
            self.write_buildpack(id, version, api, true);
        }

        // Stack buildpacks detect silently
        self.write_buildpack("X", "1.0.0", "0.3", false);
        self.write_buildpack("Y", "1.0.0", "0.3", false);

        // Meta-buildpacks carry an order instead of a detect script
        self.write_meta(
            "E",
            "v1",
            r#"
[[order]]
group = [
  { id = "A", version = "v1" },
  { id = "F", version = "v1" },
]

[[order]]
group = [
  { id = "A", version = "v1" },
  { id = "B", version = "v1" },
]

[[order]]
group = [
  { id = "A", version = "v1" },
  { id = "D", version = "v1" },
  { id = "B", version = "v1" },
]
"#,
        );
        self.write_meta(
            "F",
            "v1",
            r#"
[[order]]
group = [
  { id = "C", version = "v1" },
  { id = "B", version = "v1" },
]

[[order]]
group = [{ id = "B", version = "v2" }]

[[order]]
group = [
  { id = "C", version = "v2" },
  { id = "D", version = "v2" },
  { id = "B", version = "v1" },
]
"#,
        );
    }

    fn write_buildpack(&self, id: &str, version: &str, api: &str, noisy: bool) {
        let dir = self.buildpacks_dir().join(id).join(version);
        fs::create_dir_all(dir.join("bin")).unwrap();
        fs::write(
            dir.join("buildpack.toml"),
            format!(
                "api = \"{api}\"\n\n[buildpack]\nid = \"{id}\"\nversion = \"{version}\"\nname = \"Buildpack {id}\"\n"
            ),
        )
        .unwrap();

        let echo = if noisy {
            format!("echo \"detect out: {id}@{version}\"\necho \"detect err: {id}@{version}\" >&2\n")
        } else {
            String::new()
        };
        let script = format!(
            "#!/bin/sh\n\
             {echo}\
             printf \"%s\" \"$ENV_TYPE\" > \"detect-env-type-{id}-{version}\"\n\
             printf \"%s\" \"$CNB_BUILDPACK_DIR\" > \"detect-env-cnb-buildpack-dir-{id}-{version}\"\n\
             if [ -f \"detect-plan-{id}-{version}.toml\" ]; then\n\
             \x20\x20cat \"detect-plan-{id}-{version}.toml\" > \"$2\"\n\
             fi\n\
             if [ -f \"detect-status-{id}-{version}\" ]; then\n\
             \x20\x20exit \"$(cat \"detect-status-{id}-{version}\")\"\n\
             fi\n\
             if [ -f \"detect-status\" ]; then\n\
             \x20\x20exit \"$(cat \"detect-status\")\"\n\
             fi\n\
             exit 0\n"
        );
        let script_path = dir.join("bin").join("detect");
        fs::write(&script_path, script).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
    }

    fn write_meta(&self, id: &str, version: &str, order: &str) {
        let dir = self.buildpacks_dir().join(id).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("buildpack.toml"),
            format!(
                "api = \"0.3\"\n\n[buildpack]\nid = \"{id}\"\nversion = \"{version}\"\nname = \"Buildpack {id}\"\n{order}"
            ),
        )
        .unwrap();
    }
}

pub fn order(groups: Vec<Vec<Buildpack>>) -> BuildpackOrder {
    BuildpackOrder(groups.into_iter().map(BuildpackGroup::new).collect())
}

pub fn bp(id: &str, version: &str) -> Buildpack {
    Buildpack::new(id, version)
}

pub fn bp_opt(id: &str, version: &str) -> Buildpack {
    Buildpack {
        optional: true,
        ..Buildpack::new(id, version)
    }
}

pub fn bp_priv(id: &str, version: &str) -> Buildpack {
    Buildpack {
        privileged: true,
        ..Buildpack::new(id, version)
    }
}

pub fn bp_priv_opt(id: &str, version: &str) -> Buildpack {
    Buildpack {
        privileged: true,
        optional: true,
        ..Buildpack::new(id, version)
    }
}

pub fn bp_api(id: &str, version: &str, api: &str) -> Buildpack {
    Buildpack {
        api: api.to_string(),
        ..Buildpack::new(id, version)
    }
}

pub fn bp_priv_api(id: &str, version: &str, api: &str) -> Buildpack {
    Buildpack {
        privileged: true,
        api: api.to_string(),
        ..Buildpack::new(id, version)
    }
}

/// Order-insensitive entry comparison with exact multiplicity
pub fn has_entries(actual: &[BuildPlanEntry], expected: &[BuildPlanEntry]) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    actual.iter().all(|e| expected.contains(e))
}

/// Absolute path of a fixture buildpack directory, as detect sees it
pub fn abs_buildpack_dir(root: &Path, id: &str, version: &str) -> PathBuf {
    fs::canonicalize(root).unwrap().join(id).join(version)
}
