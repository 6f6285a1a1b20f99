//! # smac-optimizer
//!
//! Multi-run orchestration for the SMAC configurator.
//!
//! Plans one seed per run, writes the shared scenario files, dispatches the
//! runs onto a bounded worker pool with per-run failure isolation, then
//! reads every run's trajectory back and decodes the best incumbent.

mod incumbent;
mod job;
mod launcher;
mod optimizer;
mod pool;
mod scenario;
mod seeds;
mod space;
mod trajectory;

pub use incumbent::{decode_config, select, Incumbent};
pub use job::{
    JobDescriptor, JobError, JobId, JobRecord, JobStatus, JobTemplate, Objective, ResourceLimits,
    RunReport, ToolLocation, SMAC_MAIN_CLASS,
};
pub use launcher::{JobRunner, SmacProcessRunner};
pub use optimizer::{
    MinimizeOutcome, MinimizeRequest, OptimizerSettings, SmacOptimizer, KILL_GRACE_S,
};
pub use pool::RunPool;
pub use scenario::{
    Clauses, ScenarioLayout, ScenarioPaths, ScenarioWriter, SmacOptions, INSTANCE_FILE, PCS_FILE,
    SCENARIO_FILE,
};
pub use seeds::{RunSeeds, SeedSpec};
pub use space::{ParameterDef, ParameterKind, ParameterSpace, SearchSpace};
pub use trajectory::{read_incumbent, read_records, trajectory_path, TrajectoryRecord};

pub use smac_types::{ConfigMap, DecoderMap, ParameterValue, SmacError, SmacResult, ValueDecoder};
