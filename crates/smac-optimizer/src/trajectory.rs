//! Reading a run's trajectory log back from the output directory.

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use smac_types::SmacResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::incumbent::Incumbent;

const COST_FIELD: usize = 1;
const FIRST_CONFIG_FIELD: usize = 5;

/// `<out_dir>/<scenario_name>/traj-run-<seed>.txt`
pub fn trajectory_path(out_dir: &Path, scenario_name: &str, seed: u64) -> PathBuf {
    out_dir
        .join(scenario_name)
        .join(format!("traj-run-{seed}.txt"))
}

/// Delete a trajectory left by an earlier call so it cannot pass for a new result.
pub fn clear_trajectory(out_dir: &Path, scenario_name: &str, seed: u64) -> SmacResult<()> {
    let path = trajectory_path(out_dir, scenario_name, seed);
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!("Removed stale trajectory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// One incumbent update in a trajectory log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub cpu_time_s: f64,
    pub cost: f64,
    pub wallclock_s: f64,
    pub incumbent_id: String,
    pub configurator_time_s: f64,
    pub fragments: Vec<String>,
}

impl TrajectoryRecord {
    fn from_record(record: &StringRecord) -> Option<Self> {
        let number = |i: usize| record.get(i)?.trim().parse::<f64>().ok();
        Some(Self {
            cpu_time_s: number(0)?,
            cost: number(COST_FIELD)?,
            wallclock_s: number(2)?,
            incumbent_id: record.get(3)?.trim().to_string(),
            configurator_time_s: number(4)?,
            fragments: fragments(record),
        })
    }
}

fn fragments(record: &StringRecord) -> Vec<String> {
    record
        .iter()
        .skip(FIRST_CONFIG_FIELD)
        .map(|field| field.trim_matches(' ').to_string())
        .collect()
}

fn read_rows(path: &Path) -> Option<Vec<StringRecord>> {
    let mut reader = match ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            warn!("No trajectory at {}: {}", path.display(), e);
            return None;
        }
    };

    let mut rows = Vec::new();
    for row in reader.records() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("Malformed trajectory {}: {}", path.display(), e);
                return None;
            }
        }
    }
    Some(rows)
}

/// The final incumbent of one run, or `None` if the run left nothing usable.
pub fn read_incumbent(out_dir: &Path, scenario_name: &str, seed: u64) -> Option<Incumbent> {
    let path = trajectory_path(out_dir, scenario_name, seed);
    let rows = read_rows(&path)?;

    let Some(last) = rows.last() else {
        warn!("Empty trajectory: {}", path.display());
        return None;
    };

    let cost = match last.get(COST_FIELD).map(|f| f.trim().parse::<f64>()) {
        Some(Ok(cost)) => cost,
        _ => {
            warn!("Unreadable cost in last row of {}", path.display());
            return None;
        }
    };

    debug!("Run {} finished with cost {}", seed, cost);
    Some(Incumbent {
        seed,
        cost,
        fragments: fragments(last),
    })
}

/// Every data row of a trajectory. Header and other unparsable rows are skipped.
pub fn read_records(out_dir: &Path, scenario_name: &str, seed: u64) -> Option<Vec<TrajectoryRecord>> {
    let path = trajectory_path(out_dir, scenario_name, seed);
    let rows = read_rows(&path)?;
    Some(rows.iter().filter_map(TrajectoryRecord::from_record).collect())
}
