//! Seed planning: one run identifier per requested run.

use serde::{Deserialize, Serialize};
use smac_types::{SmacError, SmacResult};

/// How the caller asked for seeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum SeedSpec {
    #[default]
    Auto,
    Single(u64),
    List(Vec<u64>),
}

impl From<u64> for SeedSpec {
    fn from(seed: u64) -> Self {
        Self::Single(seed)
    }
}

impl From<Vec<u64>> for SeedSpec {
    fn from(seeds: Vec<u64>) -> Self {
        Self::List(seeds)
    }
}

impl From<Option<u64>> for SeedSpec {
    fn from(seed: Option<u64>) -> Self {
        seed.map_or(Self::Auto, Self::Single)
    }
}

impl TryFrom<&serde_json::Value> for SeedSpec {
    type Error = SmacError;

    fn try_from(value: &serde_json::Value) -> SmacResult<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Self::Auto),
            Value::Number(n) => n
                .as_u64()
                .map(Self::Single)
                .ok_or_else(|| SmacError::invalid_seed_spec(format!("seed {n} is not a non-negative integer"))),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64().ok_or_else(|| {
                        SmacError::invalid_seed_spec(format!("seed {item} is not a non-negative integer"))
                    })
                })
                .collect::<SmacResult<Vec<_>>>()
                .map(Self::List),
            other => Err(SmacError::invalid_seed_spec(format!(
                "the seed could not be processed: {other}"
            ))),
        }
    }
}

/// Canonical, validated seed sequence. Its length always equals the run count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSeeds(Vec<u64>);

impl RunSeeds {
    pub fn plan(spec: &SeedSpec, run_count: usize) -> SmacResult<Self> {
        if run_count == 0 {
            return Err(SmacError::invalid_argument("the number of runs must be positive"));
        }

        let seeds = match spec {
            SeedSpec::Auto => (0..run_count as u64).collect(),
            SeedSpec::Single(seed) if run_count == 1 => vec![*seed],
            SeedSpec::Single(seed) => {
                let end = seed.checked_add(run_count as u64).ok_or_else(|| {
                    SmacError::invalid_seed_spec(format!("seed {seed} overflows for {run_count} runs"))
                })?;
                (*seed..end).collect()
            }
            SeedSpec::List(seeds) => {
                if seeds.len() != run_count {
                    return Err(SmacError::invalid_seed_spec(format!(
                        "you have to specify a seed for every run: got {} seeds for {} runs",
                        seeds.len(),
                        run_count
                    )));
                }
                seeds.clone()
            }
        };

        Ok(Self(seeds))
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }
}
