//! Analyzer estimates and analyzable properties

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value reported by an analyzer
///
/// Serialized untagged: a JSON number for numeric properties, a JSON string
/// for categorical ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EstimateValue {
    Number(f64),
    Label(String),
}

impl EstimateValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EstimateValue::Number(n) => Some(*n),
            EstimateValue::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            EstimateValue::Number(_) => None,
            EstimateValue::Label(label) => Some(label),
        }
    }
}

impl fmt::Display for EstimateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateValue::Number(n) => write!(f, "{}", n),
            EstimateValue::Label(label) => write!(f, "{}", label),
        }
    }
}

/// One analyzer's opinion about one property of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: EstimateValue,
    /// Analyzer's own certainty, 0.0-1.0
    pub self_confidence: f64,
    /// Which analyzer produced this estimate
    pub source_id: String,
}

impl Estimate {
    pub fn numeric(value: f64, self_confidence: f64, source_id: impl Into<String>) -> Self {
        Self {
            value: EstimateValue::Number(value),
            self_confidence,
            source_id: source_id.into(),
        }
    }

    pub fn label(
        value: impl Into<String>,
        self_confidence: f64,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            value: EstimateValue::Label(value.into()),
            self_confidence,
            source_id: source_id.into(),
        }
    }
}

/// Whether a property is reconciled numerically or by vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Numeric,
    Categorical,
}

/// Properties the analyzers can estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Beats per minute
    Tempo,
    /// Integrated loudness in LUFS (usually negative)
    Loudness,
    /// Musical key, e.g. "A minor"
    Key,
    Genre,
    Mood,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Tempo,
        Property::Loudness,
        Property::Key,
        Property::Genre,
        Property::Mood,
    ];

    pub fn value_kind(self) -> ValueKind {
        match self {
            Property::Tempo | Property::Loudness => ValueKind::Numeric,
            Property::Key | Property::Genre | Property::Mood => ValueKind::Categorical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Property::Tempo => "tempo",
            Property::Loudness => "loudness",
            Property::Key => "key",
            Property::Genre => "genre",
            Property::Mood => "mood",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown property name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown property: {0}")]
pub struct UnknownProperty(pub String);

impl FromStr for Property {
    type Err = UnknownProperty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownProperty(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_json_shape() {
        let estimate: Estimate =
            serde_json::from_str(r#"{"value":128,"self_confidence":0.8,"source_id":"a"}"#)
                .unwrap();
        assert_eq!(estimate.value, EstimateValue::Number(128.0));

        let estimate: Estimate =
            serde_json::from_str(r#"{"value":"house","self_confidence":0.6,"source_id":"b"}"#)
                .unwrap();
        assert_eq!(estimate.value.as_label(), Some("house"));
    }

    #[test]
    fn test_property_parse() {
        assert_eq!("tempo".parse::<Property>().unwrap(), Property::Tempo);
        assert_eq!("Genre".parse::<Property>().unwrap(), Property::Genre);
        assert!("bpm".parse::<Property>().is_err());
    }

    #[test]
    fn test_property_kinds() {
        assert_eq!(Property::Tempo.value_kind(), ValueKind::Numeric);
        assert_eq!(Property::Loudness.value_kind(), ValueKind::Numeric);
        assert_eq!(Property::Key.value_kind(), ValueKind::Categorical);
        assert_eq!(Property::Mood.value_kind(), ValueKind::Categorical);
    }
}
