//! Closed enumerations used throughout the rule model.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Rule severity. Serialized as the integers `1` (high), `2` (medium) and
/// `3` (low), matching the rule catalog and configuration formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub fn as_u8(self) -> u8 {
        match self {
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            1 => Some(Severity::High),
            2 => Some(Severity::Medium),
            3 => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        value
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .and_then(Severity::from_u8)
            .ok_or_else(|| {
                serde::de::Error::custom(format!(
                    "severity must be 1 (high), 2 (medium) or 3 (low), got {}",
                    value
                ))
            })
    }
}

/// Which variant of the expression tree produced an evaluation node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpressionKind {
    Leaf,
    AllOf,
    AnyOf,
}
