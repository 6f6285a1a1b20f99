//! Search space definitions and their rendering into SMAC `.pcs` syntax.

use serde::{Deserialize, Serialize};
use smac_types::{DecoderMap, SmacError, SmacResult, ValueDecoder};

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name as it appears in the pcs file and the trajectories.
    pub name: String,
    /// The kind of search range.
    pub kind: ParameterKind,
}

/// Describes the domain of a parameter and its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    /// Continuous range [low, high].
    FloatRange { low: f64, high: f64, default: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64, default: i64 },
    /// Continuous range searched on a log scale.
    LogUniform { low: f64, high: f64, default: f64 },
    /// Integer range searched on a log scale.
    LogInt { low: i64, high: i64, default: i64 },
    /// Categorical choices.
    Choice { values: Vec<String>, default: String },
    /// Boolean switch, rendered as a `{True, False}` categorical.
    Flag { default: bool },
}

/// Rendered constraint-file text plus the decoder for every parameter it names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSpace {
    pub pcs_text: String,
    pub decoders: DecoderMap,
}

impl ParameterSpace {
    /// Wrap text produced by an external encoder.
    pub fn new(pcs_text: impl Into<String>, decoders: DecoderMap) -> Self {
        Self {
            pcs_text: pcs_text.into(),
            decoders,
        }
    }
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64, default: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high, default },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64, default: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high, default },
        });
        self
    }

    pub fn add_log_uniform(
        mut self,
        name: impl Into<String>,
        low: f64,
        high: f64,
        default: f64,
    ) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high, default },
        });
        self
    }

    pub fn add_log_int(mut self, name: impl Into<String>, low: i64, high: i64, default: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogInt { low, high, default },
        });
        self
    }

    pub fn add_choice<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
        default: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Choice {
                values: values.into_iter().map(Into::into).collect(),
                default: default.into(),
            },
        });
        self
    }

    pub fn add_flag(mut self, name: impl Into<String>, default: bool) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Flag { default },
        });
        self
    }

    /// Render the pcs text and collect one decoder per parameter.
    pub fn encode(&self) -> SmacResult<ParameterSpace> {
        let mut lines = Vec::with_capacity(self.parameters.len());
        let mut decoders = DecoderMap::with_capacity(self.parameters.len());

        for param in &self.parameters {
            if param.name.is_empty() || param.name.contains(|c: char| c.is_whitespace() || c == '=') {
                return Err(SmacError::invalid_argument(format!(
                    "parameter name {:?} must be non-empty without whitespace or '='",
                    param.name
                )));
            }
            if decoders.contains_key(&param.name) {
                return Err(SmacError::invalid_argument(format!(
                    "parameter {} is defined twice",
                    param.name
                )));
            }

            let (line, decoder) = render(param)?;
            lines.push(line);
            decoders.insert(param.name.clone(), decoder);
        }

        Ok(ParameterSpace {
            pcs_text: lines.join("\n"),
            decoders,
        })
    }
}

fn render(param: &ParameterDef) -> SmacResult<(String, ValueDecoder)> {
    let name = &param.name;
    let out_of_range = |default: String| {
        SmacError::invalid_argument(format!("default {default} of {name} lies outside its range"))
    };

    match &param.kind {
        ParameterKind::FloatRange { low, high, default } => {
            check_bounds(name, *low, *high, false)?;
            if default < low || default > high {
                return Err(out_of_range(default.to_string()));
            }
            Ok((format!("{name} [{low:?}, {high:?}] [{default:?}]"), ValueDecoder::Float))
        }
        ParameterKind::LogUniform { low, high, default } => {
            check_bounds(name, *low, *high, true)?;
            if default < low || default > high {
                return Err(out_of_range(default.to_string()));
            }
            Ok((format!("{name} [{low:?}, {high:?}] [{default:?}]l"), ValueDecoder::Float))
        }
        ParameterKind::IntRange { low, high, default } => {
            check_bounds(name, *low as f64, *high as f64, false)?;
            if default < low || default > high {
                return Err(out_of_range(default.to_string()));
            }
            Ok((format!("{name} [{low}, {high}] [{default}]i"), ValueDecoder::Int))
        }
        ParameterKind::LogInt { low, high, default } => {
            check_bounds(name, *low as f64, *high as f64, true)?;
            if default < low || default > high {
                return Err(out_of_range(default.to_string()));
            }
            Ok((format!("{name} [{low}, {high}] [{default}]il"), ValueDecoder::Int))
        }
        ParameterKind::Choice { values, default } => {
            if values.is_empty() {
                return Err(SmacError::invalid_argument(format!("{name} has no choices")));
            }
            if !values.contains(default) {
                return Err(out_of_range(default.clone()));
            }
            Ok((
                format!("{name} {{{}}} [{default}]", values.join(", ")),
                ValueDecoder::Categorical(values.clone()),
            ))
        }
        ParameterKind::Flag { default } => {
            let default = if *default { "True" } else { "False" };
            Ok((format!("{name} {{True, False}} [{default}]"), ValueDecoder::Bool))
        }
    }
}

fn check_bounds(name: &str, low: f64, high: f64, log_scale: bool) -> SmacResult<()> {
    if !(low.is_finite() && high.is_finite()) || low > high {
        return Err(SmacError::invalid_argument(format!(
            "{name} has an empty or non-finite range [{low}, {high}]"
        )));
    }
    if log_scale && low <= 0.0 {
        return Err(SmacError::invalid_argument(format!(
            "{name} is log-scaled and needs a positive lower bound"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_kind() {
        let space = SearchSpace::new()
            .add_int("depth", 5, 15, 10)
            .add_float("fraction", 0.5, 1.0, 0.75)
            .add_log_uniform("lr", 1e-4, 1.0, 0.01)
            .add_log_int("trees", 1, 1000, 10)
            .add_choice("optimizer", ["sgd", "adam"], "adam")
            .add_flag("shuffle", true);

        let encoded = space.encode().unwrap();
        let lines: Vec<&str> = encoded.pcs_text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "depth [5, 15] [10]i",
                "fraction [0.5, 1.0] [0.75]",
                "lr [0.0001, 1.0] [0.01]l",
                "trees [1, 1000] [10]il",
                "optimizer {sgd, adam} [adam]",
                "shuffle {True, False} [True]",
            ]
        );

        assert_eq!(encoded.decoders.len(), 6);
        assert_eq!(encoded.decoders["depth"], ValueDecoder::Int);
        assert_eq!(encoded.decoders["lr"], ValueDecoder::Float);
        assert_eq!(encoded.decoders["shuffle"], ValueDecoder::Bool);
    }

    #[test]
    fn rejects_default_outside_range() {
        let err = SearchSpace::new().add_int("x", 0, 5, 9).encode().unwrap_err();
        assert!(matches!(err, SmacError::InvalidArgument(_)));

        let err = SearchSpace::new()
            .add_choice("c", ["a", "b"], "z")
            .encode()
            .unwrap_err();
        assert!(matches!(err, SmacError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_non_positive_log_bounds() {
        let err = SearchSpace::new()
            .add_log_uniform("lr", 0.0, 1.0, 0.5)
            .encode()
            .unwrap_err();
        assert!(matches!(err, SmacError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_duplicate_and_malformed_names() {
        let dup = SearchSpace::new().add_flag("a", true).add_flag("a", false);
        assert!(dup.encode().is_err());

        let bad = SearchSpace::new().add_flag("a=b", true);
        assert!(bad.encode().is_err());
    }

    #[test]
    fn search_space_from_json() {
        let json = r#"{
            "parameters": [
                {"name": "x", "kind": {"type": "int_range", "low": 1, "high": 3, "default": 2}},
                {"name": "mode", "kind": {"type": "choice", "values": ["a", "b"], "default": "a"}}
            ]
        }"#;
        let space: SearchSpace = serde_json::from_str(json).unwrap();
        let encoded = space.encode().unwrap();
        assert_eq!(encoded.pcs_text, "x [1, 3] [2]i\nmode {a, b} [a]");
    }
}
