// src/detect/resolve.rs

//! Plan resolution for one candidate group
//!
//! Detection of a group runs in three phases. Per-buildpack detect
//! runs classify every member as pass/skip/error and log the captured
//! output. The solver then walks the Cartesian product of each
//! passing buildpack's alternate plans with a mixed-radix counter
//! (the observable "try #N"), validating each assignment against the
//! provides/requires graph and the mixin stage rules, greedily
//! dropping optional contributors whose demands cannot be met. The
//! first assignment that validates is materialized into the chosen
//! groups and the build/run plans.
//!
//! Two rules shape the search order:
//! - a buildpack's `optional` flag only takes effect on its final
//!   alternate; earlier alternates fail the try so the counter
//!   advances through them
//! - stack buildpacks are never dropped for unused mixin provides;
//!   they are simply left unbound and omitted from the stage groups

use crate::buildpack::{Buildpack, BuildpackGroup};
use crate::detect::{DetectConfig, DetectResult, Stores, CODE_DETECT_FAIL, CODE_DETECT_PASS};
use crate::error::{Error, Result};
use crate::logging::{LogLevel, Logger};
use crate::plan::{
    split_stage, BuildPlan, BuildPlanEntry, PlanOptions, PlanSections, Require, Stage,
};
use std::collections::HashSet;

type BuildpackKey = (String, String);

fn key(bp: &Buildpack) -> BuildpackKey {
    (bp.id.clone(), bp.version.clone())
}

/// One buildpack that passed detect, with its selectable plan shapes
struct TrialSource {
    bp: Buildpack,
    options: PlanOptions,
}

/// One buildpack pinned to one plan shape within a try
#[derive(Clone)]
struct TrialOption {
    bp: Buildpack,
    sections: PlanSections,
}

/// Detect and resolve a single flat group
pub(crate) fn detect_group(
    group: &BuildpackGroup,
    config: &DetectConfig,
    stores: &Stores,
) -> Result<DetectResult> {
    let mut done = Vec::with_capacity(group.group.len());
    for bp in &group.group {
        config.check_cancelled()?;
        let descriptor = stores.descriptor_for(bp)?;
        let bp = bp.with_api(&descriptor.api);
        let run = descriptor.detect(config);
        done.push((bp, run));
    }

    let logger = config.logger.as_ref();

    // Captured output first, then the results section. Pass and skip
    // output stays at debug; unexpected codes surface at info.
    for (bp, run) in &done {
        let level = if run.code == CODE_DETECT_PASS || run.code == CODE_DETECT_FAIL {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        let combined = run.combined_output();
        let text = String::from_utf8_lossy(&combined);
        let text = text.trim_end();
        if !text.is_empty() {
            logger.log(level, &format!("======== Output: {} ========\n{}", bp, text));
        }
        if let Some(err) = &run.err {
            logger.log(level, &format!("======== Error: {} ========\n{}", bp, err));
        }
    }

    logger.debug("======== Results ========");

    let mut detected = true;
    let mut buildpack_err: Option<String> = None;
    let mut sources = Vec::new();

    for (bp, run) in &done {
        match run.code {
            CODE_DETECT_PASS => {
                logger.debug(&format!("pass: {}", bp));
                sources.push(TrialSource {
                    bp: bp.clone(),
                    options: run.plan.clone(),
                });
            }
            CODE_DETECT_FAIL => {
                if bp.optional {
                    logger.debug(&format!("skip: {}", bp));
                } else {
                    logger.debug(&format!("fail: {}", bp));
                }
                detected = detected && bp.optional;
            }
            code => {
                match &run.err {
                    Some(err) => {
                        logger.info(&format!("err:  {}", bp));
                        buildpack_err.get_or_insert_with(|| err.clone());
                    }
                    None => {
                        logger.info(&format!("err:  {} ({})", bp, code));
                        buildpack_err.get_or_insert_with(|| {
                            format!("detect for {} failed with exit code {}", bp, code)
                        });
                    }
                }
                detected = detected && bp.optional;
            }
        }
    }

    if !detected {
        if let Some(message) = buildpack_err {
            return Err(Error::Buildpack(message));
        }
        return Err(Error::FailedDetection);
    }

    // A surviving set with no regular buildpacks cannot form a build
    // group; fail before entering the solver.
    if !sources.is_empty() && sources.iter().all(|s| s.bp.privileged) {
        return Err(Error::FailedDetection);
    }

    Solver {
        logger,
        group_len: done.len(),
        try_index: 0,
    }
    .run_trials(&sources)
}

struct Solver<'a> {
    logger: &'a dyn Logger,
    group_len: usize,
    try_index: usize,
}

impl Solver<'_> {
    fn run_trials(mut self, sources: &[TrialSource]) -> Result<DetectResult> {
        let mut prefix = Vec::with_capacity(sources.len());
        self.trials_from(sources, &mut prefix)
    }

    /// Depth-first walk of the alternate-plan product: the first group
    /// member varies slowest, each member's primary plan before its
    /// alternates. Returns the first passing assignment; the last
    /// failure escapes once the product is exhausted.
    fn trials_from(
        &mut self,
        rest: &[TrialSource],
        prefix: &mut Vec<TrialOption>,
    ) -> Result<DetectResult> {
        let Some((head, tail)) = rest.split_first() else {
            return self.evaluate(prefix.clone());
        };

        let mut last_err = None;
        for i in 0..head.options.option_count() {
            let final_option = i + 1 == head.options.option_count();
            prefix.push(TrialOption {
                bp: Buildpack {
                    optional: head.bp.optional && final_option,
                    ..head.bp.clone()
                },
                sections: head.options.option(i).clone(),
            });
            let attempt = self.trials_from(tail, prefix);
            prefix.pop();
            match attempt {
                Ok(result) => return Ok(result),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or(Error::FailedDetection))
    }

    /// Validate one assignment, relaxing optional contributors, and
    /// materialize it on success
    fn evaluate(&mut self, mut trial: Vec<TrialOption>) -> Result<DetectResult> {
        self.try_index += 1;
        self.logger
            .debug(&format!("Resolving plan... (try #{})", self.try_index));

        let (dep_map, mixins) = loop {
            let dep_map = DepMap::new(&trial);
            let mixins = MixinResolver::new(&trial);
            let mut retry = false;

            let mut unmet = dep_map.unmet_requires();
            unmet.extend(mixins.unmet_requires());
            for (name, bp) in unmet {
                retry = true;
                if !bp.optional {
                    self.logger.debug(&format!("fail: {} requires {}", bp, name));
                    return Err(Error::FailedDetection);
                }
                self.logger.debug(&format!("skip: {} requires {}", bp, name));
                remove_buildpack(&mut trial, &bp);
            }

            for (name, bp) in dep_map.unmet_provides() {
                retry = true;
                if !bp.optional {
                    self.logger
                        .debug(&format!("fail: {} provides unused {}", bp, name));
                    return Err(Error::FailedDetection);
                }
                self.logger
                    .debug(&format!("skip: {} provides unused {}", bp, name));
                remove_buildpack(&mut trial, &bp);
            }

            if !retry {
                break (dep_map, mixins);
            }
        };

        if trial.is_empty() {
            self.logger.debug("fail: no viable buildpacks in group");
            return Err(Error::FailedDetection);
        }

        let binding = mixins.bind(&dep_map, &trial);

        for option in &trial {
            if option.bp.privileged && !binding.build_bound.contains(&key(&option.bp)) {
                self.logger
                    .debug(&format!("skip: {} not required", option.bp));
            }
        }
        for option in &trial {
            if option.bp.privileged && !binding.run_bound.contains(&key(&option.bp)) {
                self.logger
                    .debug(&format!("skip: {}[run] not required", option.bp));
            }
        }

        let build_group: Vec<Buildpack> = trial
            .iter()
            .filter(|o| !o.bp.privileged)
            .map(|o| o.bp.no_opt())
            .collect();
        let build_privileged_group: Vec<Buildpack> = trial
            .iter()
            .filter(|o| o.bp.privileged && binding.build_bound.contains(&key(&o.bp)))
            .map(|o| o.bp.no_opt())
            .collect();
        let run_group: Vec<Buildpack> = trial
            .iter()
            .filter(|o| o.bp.privileged && binding.run_bound.contains(&key(&o.bp)))
            .map(|o| o.bp.no_opt())
            .collect();

        let participating = build_group.len() + build_privileged_group.len();
        if participating != self.group_len {
            self.logger.debug(&format!(
                "{} of {} buildpacks participating",
                participating, self.group_len
            ));
        }

        for option in &trial {
            if !option.bp.privileged || binding.build_bound.contains(&key(&option.bp)) {
                self.logger
                    .debug(&format!("{} {}", option.bp.id, option.bp.version));
            }
        }

        let mut build_entries: Vec<BuildPlanEntry> = dep_map
            .consumed_entries()
            .map(|entry| BuildPlanEntry {
                providers: entry.providers.iter().map(|p| p.as_provider()).collect(),
                requires: entry.requires.clone(),
            })
            .collect();
        build_entries.extend(binding.build_entries);

        Ok(DetectResult {
            build_group: BuildpackGroup::new(build_group),
            build_privileged_group: BuildpackGroup::new(build_privileged_group),
            run_group: BuildpackGroup::new(run_group),
            build_plan: BuildPlan {
                entries: build_entries,
            },
            run_plan: BuildPlan {
                entries: binding.run_entries,
            },
        })
    }
}

fn remove_buildpack(trial: &mut Vec<TrialOption>, bp: &Buildpack) {
    trial.retain(|o| !(o.bp.id == bp.id && o.bp.version == bp.version));
}

/// Positional provides/requires bookkeeping for non-mixin names
///
/// A provide stays pending until a later require consumes it; every
/// pending provide for a name is consumed at once. A require that
/// finds no provider at or before its position is unmet, as is any
/// provide still pending once the whole trial has been walked. Stage
/// prefixes on non-mixin names are informational: stripped for
/// keying, preserved on the stored requires.
#[derive(Default)]
struct DepMap {
    entries: Vec<DepEntry>,
}

#[derive(Default)]
struct DepEntry {
    name: String,
    providers: Vec<Buildpack>,
    requires: Vec<Require>,
    early_requires: Vec<Buildpack>,
    extra_provides: Vec<Buildpack>,
}

impl DepMap {
    fn new(trial: &[TrialOption]) -> Self {
        let mut map = DepMap::default();
        for option in trial {
            for provide in &option.sections.provides {
                if provide.mixin || provide.any {
                    continue;
                }
                map.provide(&option.bp, split_stage(&provide.name).1);
            }
            for require in &option.sections.requires {
                if require.mixin {
                    continue;
                }
                map.require(&option.bp, require);
            }
        }
        map
    }

    fn entry_mut(&mut self, name: &str) -> &mut DepEntry {
        if let Some(i) = self.entries.iter().position(|e| e.name == name) {
            return &mut self.entries[i];
        }
        self.entries.push(DepEntry {
            name: name.to_string(),
            ..Default::default()
        });
        self.entries.last_mut().unwrap()
    }

    fn provide(&mut self, bp: &Buildpack, name: &str) {
        self.entry_mut(name).extra_provides.push(bp.clone());
    }

    fn require(&mut self, bp: &Buildpack, require: &Require) {
        let name = split_stage(&require.name).1.to_string();
        let entry = self.entry_mut(&name);
        let pending = std::mem::take(&mut entry.extra_provides);
        entry.providers.extend(pending);
        if entry.providers.is_empty() {
            entry.early_requires.push(bp.clone());
        } else {
            entry.requires.push(require.clone());
        }
    }

    fn unmet_requires(&self) -> Vec<(String, Buildpack)> {
        let mut unmet = Vec::new();
        for entry in &self.entries {
            for bp in &entry.early_requires {
                unmet.push((entry.name.clone(), bp.clone()));
            }
        }
        unmet
    }

    fn unmet_provides(&self) -> Vec<(String, Buildpack)> {
        let mut unmet = Vec::new();
        for entry in &self.entries {
            for bp in &entry.extra_provides {
                unmet.push((entry.name.clone(), bp.clone()));
            }
        }
        unmet
    }

    fn consumed_entries(&self) -> impl Iterator<Item = &DepEntry> {
        self.entries.iter().filter(|e| !e.requires.is_empty())
    }
}

/// Mixin coverage and stage binding for the stack set
struct MixinResolver {
    named: Vec<NamedMixin>,
    wildcards: Vec<Buildpack>,
    requires: Vec<MixinRequire>,
}

struct NamedMixin {
    bp: Buildpack,
    stage: Option<Stage>,
    base: String,
}

struct MixinRequire {
    bp: Buildpack,
    require: Require,
    base: String,
    stages: Vec<Stage>,
}

impl MixinResolver {
    fn new(trial: &[TrialOption]) -> Self {
        let mut named = Vec::new();
        let mut wildcards: Vec<Buildpack> = Vec::new();
        let mut requires = Vec::new();

        for option in trial {
            if option.bp.privileged {
                for provide in &option.sections.provides {
                    if provide.any {
                        if !wildcards.iter().any(|w| key(w) == key(&option.bp)) {
                            wildcards.push(option.bp.clone());
                        }
                    } else if provide.mixin {
                        let (stage, base) = split_stage(&provide.name);
                        named.push(NamedMixin {
                            bp: option.bp.clone(),
                            stage,
                            base: base.to_string(),
                        });
                    }
                }
            } else {
                for require in &option.sections.requires {
                    if !require.mixin {
                        continue;
                    }
                    let (stage, base) = split_stage(&require.name);
                    let stages = match stage {
                        Some(stage) => vec![stage],
                        None => vec![Stage::Build, Stage::Run],
                    };
                    requires.push(MixinRequire {
                        bp: option.bp.clone(),
                        require: require.clone(),
                        base: base.to_string(),
                        stages,
                    });
                }
            }
        }

        Self {
            named,
            wildcards,
            requires,
        }
    }

    fn covered(&self, base: &str, stage: Stage) -> bool {
        self.named
            .iter()
            .any(|n| n.base == base && (n.stage.is_none() || n.stage == Some(stage)))
            || !self.wildcards.is_empty()
    }

    /// Named matchers for a mixin at a stage, or the wildcards when
    /// no named provider covers it
    fn providers_for(&self, base: &str, stage: Stage) -> Vec<Buildpack> {
        let mut providers: Vec<Buildpack> = Vec::new();
        for n in &self.named {
            if n.base == base && (n.stage.is_none() || n.stage == Some(stage)) {
                if !providers.iter().any(|p| key(p) == key(&n.bp)) {
                    providers.push(n.bp.clone());
                }
            }
        }
        if providers.is_empty() {
            providers = self.wildcards.clone();
        }
        providers
    }

    /// Mixin requires with at least one uncovered stage
    fn unmet_requires(&self) -> Vec<(String, Buildpack)> {
        let mut unmet = Vec::new();
        for require in &self.requires {
            if require
                .stages
                .iter()
                .any(|stage| !self.covered(&require.base, *stage))
            {
                unmet.push((require.base.clone(), require.bp.clone()));
            }
        }
        unmet
    }

    /// Stage binding over a validated trial
    fn bind(&self, dep_map: &DepMap, trial: &[TrialOption]) -> StackBinding {
        let mut binding = StackBinding::default();
        let mut build_entries: Vec<(String, BuildPlanEntry)> = Vec::new();
        let mut run_entries: Vec<(String, BuildPlanEntry)> = Vec::new();

        for require in &self.requires {
            for stage in &require.stages {
                let providers = self.providers_for(&require.base, *stage);
                let (bound, entries) = match stage {
                    Stage::Build => (&mut binding.build_bound, &mut build_entries),
                    Stage::Run => (&mut binding.run_bound, &mut run_entries),
                };
                for provider in &providers {
                    bound.insert(key(provider));
                }
                if let Some(i) = entries.iter().position(|(base, _)| base == &require.base) {
                    entries[i].1.requires.push(require.require.named(&require.base));
                } else {
                    entries.push((
                        require.base.clone(),
                        BuildPlanEntry {
                            providers: providers.iter().map(|p| p.as_provider()).collect(),
                            requires: vec![require.require.named(&require.base)],
                        },
                    ));
                }
            }
        }

        // A consumed non-mixin provide binds its stack provider to the
        // build stage.
        for entry in dep_map.consumed_entries() {
            for provider in &entry.providers {
                if provider.privileged {
                    binding.build_bound.insert(key(provider));
                }
            }
        }

        // A stack buildpack that emits no provides at all applies
        // unconditionally to both stages.
        for option in trial {
            if option.bp.privileged && option.sections.provides.is_empty() {
                binding.build_bound.insert(key(&option.bp));
                binding.run_bound.insert(key(&option.bp));
            }
        }

        binding.build_entries = build_entries.into_iter().map(|(_, e)| e).collect();
        binding.run_entries = run_entries.into_iter().map(|(_, e)| e).collect();
        binding
    }
}

#[derive(Default)]
struct StackBinding {
    build_bound: HashSet<BuildpackKey>,
    run_bound: HashSet<BuildpackKey>,
    build_entries: Vec<BuildPlanEntry>,
    run_entries: Vec<BuildPlanEntry>,
}
