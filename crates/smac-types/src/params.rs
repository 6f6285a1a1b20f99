//! Decoded parameter values and the per-parameter decoders that produce them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::errors::{SmacError, SmacResult};

/// A concrete parameter value decoded from the external tool's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Decoded configuration: parameter name to native value.
pub type ConfigMap = BTreeMap<String, ParameterValue>;

/// Registered decoders keyed by parameter name.
pub type DecoderMap = HashMap<String, ValueDecoder>;

/// Converts a textual token from a trajectory back into a native value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueDecoder {
    Int,
    Float,
    Bool,
    /// Categorical string; an empty choice list accepts any token.
    Categorical(Vec<String>),
}

impl ValueDecoder {
    pub fn decode(&self, name: &str, token: &str) -> SmacResult<ParameterValue> {
        let token = token.trim();
        let invalid = |message: &str| SmacError::InvalidValue {
            name: name.to_string(),
            value: token.to_string(),
            message: message.to_string(),
        };

        match self {
            Self::Int => {
                if let Ok(v) = token.parse::<i64>() {
                    return Ok(ParameterValue::Int(v));
                }
                // Integral floats such as "3.0" show up for log-scaled integers.
                match token.parse::<f64>() {
                    Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(ParameterValue::Int(v as i64)),
                    _ => Err(invalid("expected an integer")),
                }
            }
            Self::Float => token
                .parse::<f64>()
                .map(ParameterValue::Float)
                .map_err(|_| invalid("expected a float")),
            Self::Bool => match token {
                "True" | "true" | "1" => Ok(ParameterValue::Bool(true)),
                "False" | "false" | "0" => Ok(ParameterValue::Bool(false)),
                _ => Err(invalid("expected True or False")),
            },
            Self::Categorical(choices) => {
                if choices.is_empty() || choices.iter().any(|c| c == token) {
                    Ok(ParameterValue::Str(token.to_string()))
                } else {
                    Err(invalid("not one of the declared choices"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_decoder_accepts_integral_floats() {
        assert_eq!(ValueDecoder::Int.decode("x", "3").unwrap(), ParameterValue::Int(3));
        assert_eq!(ValueDecoder::Int.decode("x", " 12.0").unwrap(), ParameterValue::Int(12));
        assert!(ValueDecoder::Int.decode("x", "1.5").is_err());
    }

    #[test]
    fn float_decoder() {
        assert_eq!(
            ValueDecoder::Float.decode("lr", "0.25").unwrap(),
            ParameterValue::Float(0.25)
        );
        let err = ValueDecoder::Float.decode("lr", "abc").unwrap_err();
        assert!(matches!(err, SmacError::InvalidValue { ref name, .. } if name == "lr"));
    }

    #[test]
    fn bool_decoder_matches_pcs_spelling() {
        assert_eq!(ValueDecoder::Bool.decode("b", "True").unwrap(), ParameterValue::Bool(true));
        assert_eq!(ValueDecoder::Bool.decode("b", "False").unwrap(), ParameterValue::Bool(false));
        assert!(ValueDecoder::Bool.decode("b", "yes").is_err());
    }

    #[test]
    fn categorical_decoder_checks_choices() {
        let decoder = ValueDecoder::Categorical(vec!["sgd".into(), "adam".into()]);
        assert_eq!(
            decoder.decode("opt", "adam").unwrap(),
            ParameterValue::Str("adam".into())
        );
        assert!(decoder.decode("opt", "rmsprop").is_err());

        let open = ValueDecoder::Categorical(Vec::new());
        assert_eq!(open.decode("opt", "x").unwrap(), ParameterValue::Str("x".into()));
    }

    #[test]
    fn display_uses_pcs_bool_spelling() {
        assert_eq!(ParameterValue::Bool(true).to_string(), "True");
        assert_eq!(ParameterValue::Int(7).to_string(), "7");
    }

    #[test]
    fn config_map_serializes_untagged() {
        let mut config = ConfigMap::new();
        config.insert("a".into(), ParameterValue::Int(1));
        config.insert("b".into(), ParameterValue::Str("x".into()));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"a":1,"b":"x"}"#);
    }
}
