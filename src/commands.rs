// src/commands.rs
//! Command handlers for the kiln CLI

use anyhow::{Context, Result};
use kiln::{
    Buildpack, BuildpackOrder, DetectConfig, DetectResult, OrderToml, TracingLogger,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Environment variables preserved for clear-env buildpacks
const CLEAR_ENV_KEEP: &[&str] = &["PATH", "HOME"];

#[derive(Serialize)]
struct GroupFile {
    group: Vec<Buildpack>,
    #[serde(rename = "privileged-group", skip_serializing_if = "Vec::is_empty")]
    privileged_group: Vec<Buildpack>,
    #[serde(rename = "run-group", skip_serializing_if = "Vec::is_empty")]
    run_group: Vec<Buildpack>,
}

fn read_order(path: &str) -> Result<BuildpackOrder> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading order file {}", path))?;
    let file: OrderToml =
        toml::from_str(&raw).with_context(|| format!("parsing order file {}", path))?;
    Ok(file.into())
}

fn build_config(
    app: &str,
    platform: &str,
    buildpacks: &str,
    stack_buildpacks: Option<&str>,
) -> DetectConfig {
    let full_env: Vec<(String, String)> = std::env::vars().collect();
    let clear_env: Vec<(String, String)> = full_env
        .iter()
        .filter(|(k, _)| CLEAR_ENV_KEEP.contains(&k.as_str()))
        .cloned()
        .collect();

    DetectConfig {
        full_env,
        clear_env,
        app_dir: PathBuf::from(app),
        platform_dir: PathBuf::from(platform),
        buildpacks_dir: PathBuf::from(buildpacks),
        stack_buildpacks_dir: PathBuf::from(stack_buildpacks.unwrap_or(buildpacks)),
        logger: Arc::new(TracingLogger::new()),
        cancel: Arc::new(AtomicBool::new(false)),
    }
}

fn write_result(result: &DetectResult, group_path: &str, plan_path: &str) -> Result<()> {
    let group_file = GroupFile {
        group: result.build_group.group.clone(),
        privileged_group: result.build_privileged_group.group.clone(),
        run_group: result.run_group.group.clone(),
    };
    let group_doc = toml::to_string(&group_file).context("serializing group")?;
    fs::write(group_path, group_doc).with_context(|| format!("writing {}", group_path))?;

    let plan_doc = toml::to_string(&result.build_plan).context("serializing plan")?;
    fs::write(plan_path, plan_doc).with_context(|| format!("writing {}", plan_path))?;
    Ok(())
}

/// Run detection against an order and write the chosen group and plan
pub fn cmd_detect(
    order: &str,
    app: &str,
    platform: &str,
    buildpacks: &str,
    stack_buildpacks: Option<&str>,
    group: &str,
    plan: &str,
) -> Result<()> {
    let order = read_order(order)?;
    let config = build_config(app, platform, buildpacks, stack_buildpacks);

    let result = order.detect(&config)?;

    for bp in &result.build_privileged_group.group {
        info!("selected stack buildpack {} {}", bp.id, bp.version);
    }
    for bp in &result.build_group.group {
        info!("selected buildpack {} {}", bp.id, bp.version);
    }

    write_result(&result, group, plan)?;
    Ok(())
}

/// Print the flattened groups of an order without running detect
pub fn cmd_expand(order: &str, buildpacks: &str, stack_buildpacks: Option<&str>) -> Result<()> {
    let order = read_order(order)?;
    let groups = order.expanded_groups(
        Path::new(buildpacks),
        Path::new(stack_buildpacks.unwrap_or(buildpacks)),
    )?;

    for (i, group) in groups.iter().enumerate() {
        println!("group {}:", i + 1);
        for bp in &group.group {
            let mut flags = String::new();
            if bp.optional {
                flags.push_str(" (optional)");
            }
            if bp.privileged {
                flags.push_str(" (privileged)");
            }
            println!("  {} {}{}", bp.id, bp.version, flags);
        }
    }
    Ok(())
}
