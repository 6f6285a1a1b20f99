//! Materializes the files every SMAC run reads: constraint, instance and scenario files.

use serde::{Deserialize, Serialize};
use smac_types::{SmacError, SmacResult};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PCS_FILE: &str = "parameters.pcs";
pub const INSTANCE_FILE: &str = "instances.dat";
pub const SCENARIO_FILE: &str = "scenario.dat";

/// Scenario options, name to rendered value. Serialized in sorted order.
pub type SmacOptions = BTreeMap<String, String>;

/// Directory layout of one optimizer working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioLayout {
    pub working_dir: PathBuf,
    pub exec_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl ScenarioLayout {
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        Self {
            exec_dir: working_dir.join("exec"),
            out_dir: working_dir.join("out"),
            working_dir,
        }
    }

    pub fn paths(&self) -> ScenarioPaths {
        ScenarioPaths {
            pcs_file: self.working_dir.join(PCS_FILE),
            instance_file: self.working_dir.join(INSTANCE_FILE),
            scenario_file: self.working_dir.join(SCENARIO_FILE),
        }
    }

    /// Create the working, exec and output directories. Existing ones are fine.
    pub fn ensure_dirs(&self) -> SmacResult<()> {
        for dir in [&self.working_dir, &self.exec_dir, &self.out_dir] {
            match fs::create_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Locations of the three files a run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioPaths {
    pub pcs_file: PathBuf,
    pub instance_file: PathBuf,
    pub scenario_file: PathBuf,
}

impl ScenarioPaths {
    /// Name of the per-scenario output subdirectory: the scenario file name without extension.
    pub fn scenario_name(&self) -> String {
        self.scenario_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scenario".to_string())
    }

    /// Fails with `SetupIncomplete` unless all three files are on disk.
    pub fn verify(&self) -> SmacResult<()> {
        let missing: Vec<PathBuf> = [&self.scenario_file, &self.pcs_file, &self.instance_file]
            .into_iter()
            .filter(|p| !p.exists())
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SmacError::SetupIncomplete { missing })
        }
    }
}

/// Everything that goes into the constraint file besides the rendered space.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Clauses {
    pub conditional: Vec<String>,
    pub forbidden: Vec<String>,
}

/// Writes scenario files into a [`ScenarioLayout`].
#[derive(Debug)]
pub struct ScenarioWriter<'a> {
    layout: &'a ScenarioLayout,
}

impl<'a> ScenarioWriter<'a> {
    pub fn new(layout: &'a ScenarioLayout) -> Self {
        Self { layout }
    }

    pub fn write(
        &self,
        options: &SmacOptions,
        pcs_text: &str,
        clauses: &Clauses,
        instance_count: Option<usize>,
    ) -> SmacResult<ScenarioPaths> {
        if instance_count == Some(0) {
            return Err(SmacError::invalid_argument("the number of instances must be positive"));
        }

        self.layout.ensure_dirs()?;
        let paths = self.layout.paths();

        let pcs: Vec<&str> = std::iter::once(pcs_text)
            .chain(clauses.conditional.iter().map(String::as_str))
            .chain(clauses.forbidden.iter().map(String::as_str))
            .collect();
        fs::write(&paths.pcs_file, pcs.join("\n"))?;
        debug!("Wrote constraint file: {}", paths.pcs_file.display());

        let instances: String = (0..instance_count.unwrap_or(1))
            .map(|i| format!("id_{i}\n"))
            .collect();
        fs::write(&paths.instance_file, instances)?;
        debug!("Wrote instance file: {}", paths.instance_file.display());

        let scenario: String = options
            .iter()
            .map(|(name, value)| format!("{name} {value}\n"))
            .collect();
        fs::write(&paths.scenario_file, scenario)?;
        debug!(
            "Wrote scenario file with {} options: {}",
            options.len(),
            paths.scenario_file.display()
        );

        paths.verify()?;
        Ok(paths)
    }
}
