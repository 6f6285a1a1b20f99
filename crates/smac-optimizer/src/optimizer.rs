//! The optimizer instance: owns a working directory and drives `minimize`.

use serde::{Deserialize, Serialize};
use smac_types::{ConfigMap, SmacError, SmacResult};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::incumbent::{self, Incumbent};
use crate::job::{JobDescriptor, JobTemplate, Objective, ResourceLimits, RunReport, ToolLocation};
use crate::launcher::{JobRunner, SmacProcessRunner};
use crate::pool::RunPool;
use crate::scenario::{Clauses, ScenarioLayout, ScenarioWriter, SmacOptions};
use crate::seeds::{RunSeeds, SeedSpec};
use crate::space::ParameterSpace;
use crate::trajectory;

/// Extra seconds granted past the total budget before a run is killed.
pub const KILL_GRACE_S: u64 = 30;

/// Construction-time settings of an optimizer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub deterministic: bool,
    /// Total wall-clock budget per run in seconds. 0 means unlimited.
    pub t_limit_total_s: u64,
    /// Memory ceiling of the external optimizer itself.
    pub mem_limit_smac_mb: Option<u64>,
    /// Created under the system temp directory when absent.
    pub working_directory: Option<PathBuf>,
    /// Keep the working directory after the optimizer is closed.
    pub persistent_files: bool,
    pub debug: bool,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            deterministic: true,
            t_limit_total_s: 0,
            mem_limit_smac_mb: None,
            working_directory: None,
            persistent_files: false,
            debug: false,
        }
    }
}

impl OptimizerSettings {
    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn with_time_limit(mut self, seconds: u64) -> Self {
        self.t_limit_total_s = seconds;
        self
    }

    pub fn with_memory_limit(mut self, mb: u64) -> Self {
        self.mem_limit_smac_mb = Some(mb);
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_persistent_files(mut self, persistent: bool) -> Self {
        self.persistent_files = persistent;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> SmacResult<()> {
        if self.mem_limit_smac_mb == Some(0) {
            return Err(SmacError::invalid_argument(
                "the optimizer's memory limit has to be either absent (no limit) or positive",
            ));
        }
        Ok(())
    }
}

/// One `minimize` call's inputs, apart from the objective.
#[derive(Debug, Clone)]
pub struct MinimizeRequest {
    pub max_evaluations: u64,
    pub space: ParameterSpace,
    pub clauses: Clauses,
    pub num_instances: Option<usize>,
    pub seed: SeedSpec,
    pub num_procs: usize,
    pub num_runs: usize,
    pub function_limits: ResourceLimits,
}

impl MinimizeRequest {
    pub fn new(max_evaluations: u64, space: ParameterSpace) -> Self {
        Self {
            max_evaluations,
            space,
            clauses: Clauses::default(),
            num_instances: None,
            seed: SeedSpec::Auto,
            num_procs: 1,
            num_runs: 1,
            function_limits: ResourceLimits::unlimited(),
        }
    }

    pub fn with_conditional_clauses(mut self, clauses: Vec<String>) -> Self {
        self.clauses.conditional = clauses;
        self
    }

    pub fn with_forbidden_clauses(mut self, clauses: Vec<String>) -> Self {
        self.clauses.forbidden = clauses;
        self
    }

    pub fn with_instances(mut self, n: usize) -> Self {
        self.num_instances = Some(n);
        self
    }

    pub fn with_seed(mut self, seed: impl Into<SeedSpec>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_procs(mut self, n: usize) -> Self {
        self.num_procs = n;
        self
    }

    pub fn with_runs(mut self, n: usize) -> Self {
        self.num_runs = n;
        self
    }

    pub fn with_function_limits(mut self, limits: ResourceLimits) -> Self {
        self.function_limits = limits;
        self
    }

    fn validate(&self) -> SmacResult<()> {
        if self.max_evaluations == 0 {
            return Err(SmacError::invalid_argument("the evaluation budget must be positive"));
        }
        if self.num_procs == 0 {
            return Err(SmacError::invalid_argument("the number of processes must be positive"));
        }
        if self.num_runs == 0 {
            return Err(SmacError::invalid_argument("the number of runs must be positive"));
        }
        if self.num_instances == Some(0) {
            return Err(SmacError::invalid_argument("the number of instances must be positive"));
        }
        Ok(())
    }
}

/// Outcome of a successful `minimize` call.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeOutcome {
    pub cost: f64,
    pub config: ConfigMap,
    pub report: RunReport,
}

/// Owns a working directory for its whole life; removes it on close or drop
/// unless persistent files were requested.
pub struct SmacOptimizer {
    settings: OptimizerSettings,
    layout: ScenarioLayout,
    options: SmacOptions,
    tool: ToolLocation,
    runner: Arc<dyn JobRunner>,
    closed: bool,
}

impl SmacOptimizer {
    pub fn new(settings: OptimizerSettings) -> SmacResult<Self> {
        settings.validate()?;

        let working_dir = match &settings.working_directory {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join(format!("smac-{}", Uuid::new_v4())),
        };
        let layout = ScenarioLayout::new(&working_dir);
        layout.ensure_dirs()?;
        info!("Optimizer working directory: {}", working_dir.display());

        let options = default_options(&settings, &layout);
        Ok(Self {
            settings,
            layout,
            options,
            tool: ToolLocation::default(),
            runner: Arc::new(SmacProcessRunner::new()),
            closed: false,
        })
    }

    pub fn with_tool(mut self, tool: ToolLocation) -> Self {
        self.tool = tool;
        self
    }

    /// Replace how jobs are executed, e.g. with an in-process evaluation bridge.
    pub fn with_runner(mut self, runner: Arc<dyn JobRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn working_directory(&self) -> &Path {
        &self.layout.working_dir
    }

    pub fn layout(&self) -> &ScenarioLayout {
        &self.layout
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    pub fn options(&self) -> &SmacOptions {
        &self.options
    }

    /// Override or add any scenario option.
    pub fn set_option(&mut self, name: impl Into<String>, value: impl Display) {
        self.options.insert(name.into(), value.to_string());
    }

    /// Best cost and decoded configuration over all runs.
    pub async fn minimize(
        &mut self,
        objective: Arc<dyn Objective>,
        request: MinimizeRequest,
    ) -> SmacResult<(f64, ConfigMap)> {
        let outcome = self.minimize_with_report(objective, request).await?;
        Ok((outcome.cost, outcome.config))
    }

    /// Like [`minimize`](Self::minimize), also returning the per-run report.
    pub async fn minimize_with_report(
        &mut self,
        objective: Arc<dyn Objective>,
        request: MinimizeRequest,
    ) -> SmacResult<MinimizeOutcome> {
        request.validate()?;
        let seeds = RunSeeds::plan(&request.seed, request.num_runs)?;

        self.set_option("runcount-limit", request.max_evaluations);
        let paths = ScenarioWriter::new(&self.layout).write(
            &self.options,
            &request.space.pcs_text,
            &request.clauses,
            request.num_instances,
        )?;

        let template = JobTemplate {
            scenario_file: paths.scenario_file.clone(),
            out_dir: self.layout.out_dir.clone(),
            scenario_name: paths.scenario_name(),
            objective,
            decoders: Arc::new(request.space.decoders),
            function_limits: request.function_limits,
            tool_limits: self.tool_limits(),
            tool: self.tool.clone(),
            deterministic: self.settings.deterministic,
            num_instances: request.num_instances,
            debug: self.settings.debug,
        };
        let jobs = JobDescriptor::build_all(&template, &seeds);
        for job in &jobs {
            trajectory::clear_trajectory(&job.out_dir, &job.scenario_name, job.seed)?;
        }

        info!(
            "Minimizing with {} runs, {} evaluations each",
            seeds.len(),
            request.max_evaluations
        );
        let report = RunPool::new(Arc::clone(&self.runner))
            .execute(jobs, request.num_procs)
            .await?;

        let incumbents: Vec<Incumbent> = seeds
            .iter()
            .filter_map(|seed| {
                trajectory::read_incumbent(&template.out_dir, &template.scenario_name, seed)
            })
            .collect();
        debug!("{} of {} runs left a usable trajectory", incumbents.len(), seeds.len());

        let (cost, config) = incumbent::select(incumbents, seeds.len(), &template.decoders)?;

        Ok(MinimizeOutcome {
            cost,
            config,
            report,
        })
    }

    /// Tear down explicitly, surfacing any error from removing the directory.
    pub fn close(mut self) -> SmacResult<()> {
        self.closed = true;
        self.remove_working_directory()
    }

    fn tool_limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_mb: self.settings.mem_limit_smac_mb,
            time_s: (self.settings.t_limit_total_s > 0)
                .then(|| self.settings.t_limit_total_s + KILL_GRACE_S),
        }
    }

    fn remove_working_directory(&self) -> SmacResult<()> {
        if self.settings.persistent_files {
            info!("Keeping working directory {}", self.layout.working_dir.display());
            return Ok(());
        }
        match fs::remove_dir_all(&self.layout.working_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SmacOptimizer {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.remove_working_directory() {
            warn!(
                "Failed to remove working directory {}: {}",
                self.layout.working_dir.display(),
                e
            );
        }
    }
}

/// Scenario defaults; any SMAC option can be added on top via `set_option`.
fn default_options(settings: &OptimizerSettings, layout: &ScenarioLayout) -> SmacOptions {
    let paths = layout.paths();
    let path = |p: &Path| p.display().to_string();

    let mut options = SmacOptions::new();
    let mut set = |name: &str, value: String| {
        options.insert(name.to_string(), value);
    };

    set("algo-exec", "echo 0".into());
    set("run-obj", "QUALITY".into());
    set("algo-deterministic", settings.deterministic.to_string());
    set("validation", (!settings.deterministic).to_string());
    set("cutoff_time", "3600".into());
    set("intensification-percentage", "0.5".into());
    set("num-pca", "7".into());
    set("rf-full-tree-bootstrap", "false".into());
    set("rf-ignore-conditionality", "false".into());
    set("rf-num-trees", "10".into());
    set("skip-features", "true".into());
    set("pcs-file", path(&paths.pcs_file));
    set("instances", path(&paths.instance_file));
    set("test-instances", path(&paths.instance_file));
    set("algo-exec-dir", path(&layout.working_dir));
    set("output-dir", path(&layout.out_dir));
    set(
        "console-log-level",
        if settings.debug { "INFO" } else { "OFF" }.into(),
    );
    set("abort-on-first-run-crash", "false".into());
    if settings.t_limit_total_s > 0 {
        set("wallclock-limit", settings.t_limit_total_s.to_string());
    }

    options
}
