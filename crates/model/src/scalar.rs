//! Scalar and data-payload value types.
//!
//! Element configuration strings, derived values, and service-call data all
//! share one scalar shape: string, number, or boolean. Service payloads may
//! additionally carry lists of scalars.

use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Scalar
// ──────────────────────────────────────────────

/// A single configuration or state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Loose boolean coercion used for rendered confirmation policies,
    /// auto-fill flags, and navigation replace flags.
    ///
    /// Falsey: `false`, `0`, the empty string, and the strings
    /// `"false"`, `"no"`, `"off"` (case-insensitive).
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => *n != 0.0,
            Scalar::Text(s) => {
                !s.is_empty() && !matches!(s.to_lowercase().as_str(), "false" | "no" | "off")
            }
        }
    }

    /// Numeric view of the scalar, parsing text if necessary.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Bool(_) => None,
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Convert a JSON value to a scalar. Arrays, objects, and null have no
    /// scalar form and yield `None`.
    pub fn from_json(v: &serde_json::Value) -> Option<Scalar> {
        match v {
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Scalar::Number),
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            // Whole numbers print without a fractional part.
            Scalar::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                write!(f, "{}", *n as i64)
            }
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}
