use async_trait::async_trait;
use smac_optimizer::{
    ConfigMap, JobDescriptor, JobError, JobRunner, JobStatus, MinimizeRequest, Objective,
    OptimizerSettings, ParameterValue, SearchSpace, SeedSpec, SmacError, SmacOptimizer,
};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Writes a canned trajectory per seed; seeds without an entry write nothing.
struct ScriptedRunner {
    rows: HashMap<u64, String>,
    failing: Vec<u64>,
}

#[async_trait]
impl JobRunner for ScriptedRunner {
    async fn run(&self, job: JobDescriptor) -> Result<(), JobError> {
        if self.failing.contains(&job.seed) {
            return Err(JobError::ExitStatus { code: Some(1) });
        }
        if let Some(rows) = self.rows.get(&job.seed) {
            let path = job.trajectory_path();
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rows).unwrap();
        }
        Ok(())
    }
}

/// Evaluates the objective in-process at `x = seed` and logs it as the incumbent.
struct EvaluatingRunner;

#[async_trait]
impl JobRunner for EvaluatingRunner {
    async fn run(&self, job: JobDescriptor) -> Result<(), JobError> {
        let mut config = ConfigMap::new();
        config.insert("x".into(), ParameterValue::Int(job.seed as i64));
        let cost = job.objective.evaluate(&config, job.num_instances);

        let path = job.trajectory_path();
        fs::create_dir_all(path.parent().unwrap()).map_err(|e| JobError::Runner {
            message: e.to_string(),
        })?;
        fs::write(path, format!("0.0, {cost}, 0.0, 1, 0.0, x='{}'\n", job.seed)).map_err(|e| {
            JobError::Runner {
                message: e.to_string(),
            }
        })
    }
}

/// Succeeds once, then every later run crashes before writing anything.
#[derive(Default)]
struct SucceedsOnceRunner {
    used: AtomicBool,
}

#[async_trait]
impl JobRunner for SucceedsOnceRunner {
    async fn run(&self, job: JobDescriptor) -> Result<(), JobError> {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(JobError::ExitStatus { code: Some(1) });
        }
        let path = job.trajectory_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "0, 1.0, 0, 1, 0, x='3'\n").unwrap();
        Ok(())
    }
}

fn space() -> SearchSpace {
    SearchSpace::new()
        .add_int("x", 0, 10, 5)
        .add_choice("mode", ["fast", "slow"], "fast")
}

fn objective() -> Arc<dyn Objective> {
    Arc::new(|config: &ConfigMap| {
        let x = config["x"].as_f64().unwrap_or(0.0);
        (x - 4.0).powi(2)
    })
}

#[tokio::test]
async fn best_run_wins_and_missing_runs_are_skipped() {
    let temp_dir = tempdir().unwrap();
    let runner = ScriptedRunner {
        rows: HashMap::from([
            (10, "0, 7.5, 0, 1, 0, x='1', mode='slow'\n1, 4.1, 1, 2, 0, x='3', mode='slow'\n".to_string()),
            (11, "0, 2.0, 0, 1, 0, x='4', mode='fast'\n".to_string()),
        ]),
        failing: vec![12],
    };
    let mut optimizer = SmacOptimizer::new(
        OptimizerSettings::default()
            .with_working_directory(temp_dir.path().join("wd"))
            .with_persistent_files(true),
    )
    .unwrap()
    .with_runner(Arc::new(runner));

    let request = MinimizeRequest::new(25, space().encode().unwrap())
        .with_seed(10u64)
        .with_runs(3)
        .with_procs(2)
        .with_forbidden_clauses(vec!["{x=0, mode=slow}".into()]);

    let outcome = optimizer.minimize_with_report(objective(), request).await.unwrap();
    assert_eq!(outcome.cost, 2.0);
    assert_eq!(outcome.config["x"], ParameterValue::Int(4));
    assert_eq!(outcome.config["mode"], ParameterValue::Str("fast".into()));
    assert_eq!(outcome.report.record_for_seed(12).unwrap().status, JobStatus::Failed);

    let wd = optimizer.working_directory().to_path_buf();
    let scenario = fs::read_to_string(wd.join("scenario.dat")).unwrap();
    assert!(scenario.lines().any(|l| l == "runcount-limit 25"));
    let pcs = fs::read_to_string(wd.join("parameters.pcs")).unwrap();
    assert!(pcs.ends_with("{x=0, mode=slow}"));

    optimizer.close().unwrap();
    assert!(wd.is_dir());
}

#[tokio::test]
async fn every_run_failing_is_no_usable_result() {
    let runner = ScriptedRunner {
        rows: HashMap::from([(1, String::new())]),
        failing: vec![0],
    };
    let mut optimizer = SmacOptimizer::new(OptimizerSettings::default())
        .unwrap()
        .with_runner(Arc::new(runner));

    let err = optimizer
        .minimize(
            objective(),
            MinimizeRequest::new(10, space().encode().unwrap()).with_runs(3),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SmacError::NoUsableResult { runs: 3 }));
}

#[tokio::test]
async fn unknown_parameter_in_winner_fails() {
    let runner = ScriptedRunner {
        rows: HashMap::from([(0, "0, 1.0, 0, 1, 0, y='2'\n".to_string())]),
        failing: Vec::new(),
    };
    let mut optimizer = SmacOptimizer::new(OptimizerSettings::default())
        .unwrap()
        .with_runner(Arc::new(runner));

    let err = optimizer
        .minimize(objective(), MinimizeRequest::new(10, space().encode().unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, SmacError::UnknownParameter { ref name } if name == "y"));
}

#[tokio::test]
async fn objective_handle_reaches_the_runner() {
    let mut optimizer = SmacOptimizer::new(OptimizerSettings::default())
        .unwrap()
        .with_runner(Arc::new(EvaluatingRunner));

    let request = MinimizeRequest::new(5, space().encode().unwrap())
        .with_seed(SeedSpec::List(vec![7, 2, 4, 6]))
        .with_runs(4)
        .with_procs(4);

    let (cost, config) = optimizer.minimize(objective(), request).await.unwrap();
    assert_eq!(cost, 0.0);
    assert_eq!(config["x"], ParameterValue::Int(4));

    // The optimizer can be reused; only the evaluation budget changes.
    let request = MinimizeRequest::new(9, space().encode().unwrap()).with_seed(7u64);
    let (cost, _) = optimizer.minimize(objective(), request).await.unwrap();
    assert_eq!(cost, 9.0);
    assert_eq!(optimizer.options()["runcount-limit"], "9");
}

#[tokio::test]
async fn earlier_trajectories_do_not_answer_a_later_call() {
    let mut optimizer = SmacOptimizer::new(OptimizerSettings::default())
        .unwrap()
        .with_runner(Arc::new(SucceedsOnceRunner::default()));

    let (cost, config) = optimizer
        .minimize(objective(), MinimizeRequest::new(5, space().encode().unwrap()))
        .await
        .unwrap();
    assert_eq!(cost, 1.0);
    assert_eq!(config["x"], ParameterValue::Int(3));

    let err = optimizer
        .minimize(objective(), MinimizeRequest::new(5, space().encode().unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, SmacError::NoUsableResult { runs: 1 }));
}

#[tokio::test]
async fn persisted_trajectories_from_an_earlier_session_are_cleared() {
    let temp_dir = tempdir().unwrap();
    let wd = temp_dir.path().join("wd");
    let stale = wd.join("out").join("scenario").join("traj-run-0.txt");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "0, 0.5, 0, 1, 0, gone='1'\n").unwrap();

    let runner = ScriptedRunner {
        rows: HashMap::new(),
        failing: vec![0],
    };
    let mut optimizer = SmacOptimizer::new(OptimizerSettings::default().with_working_directory(&wd))
        .unwrap()
        .with_runner(Arc::new(runner));

    let err = optimizer
        .minimize(objective(), MinimizeRequest::new(5, space().encode().unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, SmacError::NoUsableResult { runs: 1 }));
    assert!(!stale.exists());
}
