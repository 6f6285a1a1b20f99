//! Picking the global incumbent across runs and decoding its configuration.

use serde::{Deserialize, Serialize};
use smac_types::{ConfigMap, DecoderMap, SmacError, SmacResult};
use tracing::info;

const QUOTES: &[char] = &['\'', '"'];

/// Final incumbent of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incumbent {
    pub seed: u64,
    pub cost: f64,
    /// Raw `name=value` fragments as written by the optimizer.
    pub fragments: Vec<String>,
}

/// Lowest cost wins; on exact ties the earliest candidate is kept.
///
/// `runs` is how many runs were dispatched, reported when none of them left a candidate.
pub fn select(
    mut incumbents: Vec<Incumbent>,
    runs: usize,
    decoders: &DecoderMap,
) -> SmacResult<(f64, ConfigMap)> {
    if incumbents.is_empty() {
        return Err(SmacError::NoUsableResult { runs });
    }

    incumbents.sort_by(|a, b| a.cost.total_cmp(&b.cost));
    let best = &incumbents[0];
    info!(
        "Global incumbent from run {} with cost {} ({} candidates)",
        best.seed,
        best.cost,
        incumbents.len()
    );

    let config = decode_config(&best.fragments, decoders)?;
    Ok((best.cost, config))
}

/// Decode `name=value` fragments through the registered decoders.
pub fn decode_config(fragments: &[String], decoders: &DecoderMap) -> SmacResult<ConfigMap> {
    let mut config = ConfigMap::new();

    for fragment in fragments {
        let Some((name, value)) = fragment.split_once('=') else {
            return Err(SmacError::InvalidValue {
                name: fragment.clone(),
                value: String::new(),
                message: "fragment has no '='".to_string(),
            });
        };
        let name = name.trim().trim_matches(QUOTES);
        let value = value.trim().trim_matches(QUOTES);

        let decoder = decoders
            .get(name)
            .ok_or_else(|| SmacError::UnknownParameter {
                name: name.to_string(),
            })?;
        config.insert(name.to_string(), decoder.decode(name, value)?);
    }

    Ok(config)
}
