//! Gesture-derived interaction kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a user gesture, as produced by the surrounding
/// gesture-recognition widgets. Each kind maps to at most one configured
/// action through [`ElementConfig::resolve`](crate::ElementConfig::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Tap,
    Hold,
    DoubleTap,
    MultiTap,
    MultiHold,
    MultiDoubleTap,
    MomentaryStart,
    MomentaryEnd,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Tap => "tap",
            InteractionKind::Hold => "hold",
            InteractionKind::DoubleTap => "double_tap",
            InteractionKind::MultiTap => "multi_tap",
            InteractionKind::MultiHold => "multi_hold",
            InteractionKind::MultiDoubleTap => "multi_double_tap",
            InteractionKind::MomentaryStart => "momentary_start",
            InteractionKind::MomentaryEnd => "momentary_end",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tap" => Ok(InteractionKind::Tap),
            "hold" => Ok(InteractionKind::Hold),
            "double_tap" => Ok(InteractionKind::DoubleTap),
            "multi_tap" => Ok(InteractionKind::MultiTap),
            "multi_hold" => Ok(InteractionKind::MultiHold),
            "multi_double_tap" => Ok(InteractionKind::MultiDoubleTap),
            "momentary_start" => Ok(InteractionKind::MomentaryStart),
            "momentary_end" => Ok(InteractionKind::MomentaryEnd),
            other => Err(format!("unknown interaction kind: {}", other)),
        }
    }
}
