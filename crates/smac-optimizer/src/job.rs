//! Per-run job descriptors and the records workers hand back to the pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smac_types::{ConfigMap, DecoderMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::seeds::RunSeeds;
use crate::trajectory::trajectory_path;

/// Unique job identifier.
pub type JobId = Uuid;

/// The user's function under optimization. Lower is better.
pub trait Objective: Send + Sync {
    fn evaluate(&self, config: &ConfigMap, instance: Option<usize>) -> f64;
}

impl<F> Objective for F
where
    F: Fn(&ConfigMap) -> f64 + Send + Sync,
{
    fn evaluate(&self, config: &ConfigMap, _instance: Option<usize>) -> f64 {
        self(config)
    }
}

/// Memory and wall-clock ceilings. `None` means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: Option<u64>,
    pub time_s: Option<u64>,
}

impl ResourceLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_memory_mb(mut self, mb: u64) -> Self {
        self.memory_mb = Some(mb);
        self
    }

    pub fn with_time_s(mut self, seconds: u64) -> Self {
        self.time_s = Some(seconds);
        self
    }
}

pub const SMAC_MAIN_CLASS: &str = "ca.ubc.cs.beta.smac.executors.SMACExecutor";

/// Where the external optimizer lives and how to start it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolLocation {
    /// Run the main class on a JVM with the given classpath.
    Jvm {
        java: PathBuf,
        classpath: String,
        main_class: String,
    },
    /// Run a launcher script or binary directly.
    Executable(PathBuf),
}

impl ToolLocation {
    pub fn jvm(classpath: impl Into<String>) -> Self {
        Self::Jvm {
            java: PathBuf::from("java"),
            classpath: classpath.into(),
            main_class: SMAC_MAIN_CLASS.to_string(),
        }
    }

    pub fn executable(path: impl Into<PathBuf>) -> Self {
        Self::Executable(path.into())
    }
}

impl Default for ToolLocation {
    fn default() -> Self {
        Self::Executable(PathBuf::from("smac"))
    }
}

/// Fields shared by every job of one `minimize` call.
#[derive(Clone)]
pub struct JobTemplate {
    pub scenario_file: PathBuf,
    pub out_dir: PathBuf,
    pub scenario_name: String,
    pub objective: Arc<dyn Objective>,
    pub decoders: Arc<DecoderMap>,
    pub function_limits: ResourceLimits,
    pub tool_limits: ResourceLimits,
    pub tool: ToolLocation,
    pub deterministic: bool,
    pub num_instances: Option<usize>,
    pub debug: bool,
}

/// Everything one worker needs for one run. Immutable once dispatched.
#[derive(Clone)]
pub struct JobDescriptor {
    pub id: JobId,
    pub seed: u64,
    pub scenario_file: PathBuf,
    pub out_dir: PathBuf,
    pub scenario_name: String,
    pub objective: Arc<dyn Objective>,
    pub decoders: Arc<DecoderMap>,
    /// Limits on each objective evaluation.
    pub function_limits: ResourceLimits,
    /// Limits on the external optimizer process itself.
    pub tool_limits: ResourceLimits,
    pub tool: ToolLocation,
    pub deterministic: bool,
    pub num_instances: Option<usize>,
    pub debug: bool,
}

impl JobDescriptor {
    /// One descriptor per seed, in seed order.
    pub fn build_all(template: &JobTemplate, seeds: &RunSeeds) -> Vec<JobDescriptor> {
        seeds
            .iter()
            .map(|seed| JobDescriptor {
                id: Uuid::new_v4(),
                seed,
                scenario_file: template.scenario_file.clone(),
                out_dir: template.out_dir.clone(),
                scenario_name: template.scenario_name.clone(),
                objective: Arc::clone(&template.objective),
                decoders: Arc::clone(&template.decoders),
                function_limits: template.function_limits,
                tool_limits: template.tool_limits,
                tool: template.tool.clone(),
                deterministic: template.deterministic,
                num_instances: template.num_instances,
                debug: template.debug,
            })
            .collect()
    }

    /// Where this run's trajectory is expected to appear.
    pub fn trajectory_path(&self) -> PathBuf {
        trajectory_path(&self.out_dir, &self.scenario_name, self.seed)
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("id", &self.id)
            .field("seed", &self.seed)
            .field("scenario_file", &self.scenario_file)
            .field("out_dir", &self.out_dir)
            .field("decoders", &self.decoders.len())
            .field("function_limits", &self.function_limits)
            .field("tool_limits", &self.tool_limits)
            .field("tool", &self.tool)
            .field("deterministic", &self.deterministic)
            .field("num_instances", &self.num_instances)
            .finish_non_exhaustive()
    }
}

/// Why a single job did not finish cleanly. Never escapes the pool.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("failed to start the optimizer: {message}")]
    Spawn { message: String },
    #[error("optimizer exited unsuccessfully (code {code:?})")]
    ExitStatus { code: Option<i32> },
    #[error("optimizer exceeded its wall-clock limit of {seconds} s and was killed")]
    TimedOut { seconds: u64 },
    #[error("worker panicked: {message}")]
    Panicked { message: String },
    #[error("runner error: {message}")]
    Runner { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Lifecycle of one job as observed by the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub seed: u64,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(id: JobId, seed: u64) -> Self {
        Self {
            id,
            seed,
            status: JobStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_succeeded(&mut self) {
        self.status = JobStatus::Succeeded;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: &JobError) {
        self.status = JobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.to_string());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

/// Terminal records of every dispatched job, in dispatch order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub records: Vec<JobRecord>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.count(JobStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    pub fn record_for_seed(&self, seed: u64) -> Option<&JobRecord> {
        self.records.iter().find(|r| r.seed == seed)
    }

    fn count(&self, status: JobStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::SeedSpec;
    use smac_types::ValueDecoder;

    fn sample_template() -> JobTemplate {
        let mut decoders = DecoderMap::new();
        decoders.insert("x".into(), ValueDecoder::Int);
        JobTemplate {
            scenario_file: PathBuf::from("/wd/scenario.dat"),
            out_dir: PathBuf::from("/wd/out"),
            scenario_name: "scenario".into(),
            objective: Arc::new(|_: &ConfigMap| 0.0),
            decoders: Arc::new(decoders),
            function_limits: ResourceLimits::unlimited().with_time_s(5),
            tool_limits: ResourceLimits::unlimited().with_memory_mb(1024),
            tool: ToolLocation::jvm("/opt/smac/lib/*"),
            deterministic: true,
            num_instances: None,
            debug: false,
        }
    }

    #[test]
    fn one_descriptor_per_seed() {
        let template = sample_template();
        let seeds = RunSeeds::plan(&SeedSpec::Single(3), 3).unwrap();
        let jobs = JobDescriptor::build_all(&template, &seeds);

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs.iter().map(|j| j.seed).collect::<Vec<_>>(), vec![3, 4, 5]);
        for job in &jobs {
            assert_eq!(job.scenario_file, template.scenario_file);
            assert!(Arc::ptr_eq(&job.decoders, &template.decoders));
            assert_eq!(job.function_limits.time_s, Some(5));
            assert_eq!(job.tool_limits.memory_mb, Some(1024));
        }
        assert_ne!(jobs[0].id, jobs[1].id);
        assert_eq!(
            jobs[1].trajectory_path(),
            PathBuf::from("/wd/out/scenario/traj-run-4.txt")
        );
    }

    #[test]
    fn closures_are_objectives() {
        let f = |config: &ConfigMap| config.len() as f64;
        let objective: Arc<dyn Objective> = Arc::new(f);
        assert_eq!(objective.evaluate(&ConfigMap::new(), None), 0.0);
    }

    #[test]
    fn job_record_lifecycle() {
        let mut record = JobRecord::new(Uuid::new_v4(), 7);
        assert_eq!(record.status, JobStatus::Pending);
        assert!(!record.is_terminal());

        record.mark_running();
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.started_at.is_some());

        record.mark_failed(&JobError::TimedOut { seconds: 2 });
        assert!(record.is_terminal());
        assert!(record.error.as_deref().unwrap().contains("wall-clock"));
        assert!(record.duration_seconds().is_some());
    }

    #[test]
    fn report_counts() {
        let mut ok = JobRecord::new(Uuid::new_v4(), 0);
        ok.mark_running();
        ok.mark_succeeded();
        let mut bad = JobRecord::new(Uuid::new_v4(), 1);
        bad.mark_failed(&JobError::ExitStatus { code: Some(1) });

        let report = RunReport {
            records: vec![ok, bad],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.record_for_seed(1).unwrap().status, JobStatus::Failed);
    }
}
