//! Element configuration and the action-resolver fallback chain.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::interaction::InteractionKind;
use crate::scalar::Scalar;

// ──────────────────────────────────────────────
// ElementConfig
// ──────────────────────────────────────────────

/// Configuration for a single panel element: one optional action per
/// gesture slot, plus value-derivation and haptic settings.
///
/// Unknown keys are preserved in `extra` so the template `config` snapshot
/// exposes exactly what the user configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_tap_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_tap_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_hold_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_double_tap_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentary_start_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentary_end_action: Option<Action>,

    /// Attribute the derived value reads, default `state`. May be a
    /// template expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_attribute: Option<String>,

    /// Haptic feedback gate: absent means enabled. May be a template
    /// expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haptics: Option<Scalar>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ElementConfig {
    /// Select the action definition for an interaction kind.
    ///
    /// Fallback chains, first defined value wins:
    ///
    /// | kind | order |
    /// |---|---|
    /// | momentary_start | momentary_start_action only |
    /// | momentary_end | momentary_end_action only |
    /// | multi_hold | multi_hold → hold → multi_tap → tap |
    /// | multi_double_tap | multi_double_tap → double_tap → multi_tap → tap |
    /// | multi_tap | multi_tap → tap |
    /// | hold | hold → tap |
    /// | double_tap | double_tap → tap |
    /// | tap | tap |
    ///
    /// `None` means no action is configured for the gesture and the
    /// dispatch is a no-op.
    pub fn resolve(&self, kind: InteractionKind) -> Option<&Action> {
        match kind {
            InteractionKind::MomentaryStart => self.momentary_start_action.as_ref(),
            InteractionKind::MomentaryEnd => self.momentary_end_action.as_ref(),
            InteractionKind::MultiHold => self
                .multi_hold_action
                .as_ref()
                .or(self.hold_action.as_ref())
                .or(self.multi_tap_action.as_ref())
                .or(self.tap_action.as_ref()),
            InteractionKind::MultiDoubleTap => self
                .multi_double_tap_action
                .as_ref()
                .or(self.double_tap_action.as_ref())
                .or(self.multi_tap_action.as_ref())
                .or(self.tap_action.as_ref()),
            InteractionKind::MultiTap => self.multi_tap_action.as_ref().or(self.tap_action.as_ref()),
            InteractionKind::Hold => self.hold_action.as_ref().or(self.tap_action.as_ref()),
            InteractionKind::DoubleTap => {
                self.double_tap_action.as_ref().or(self.tap_action.as_ref())
            }
            InteractionKind::Tap => self.tap_action.as_ref(),
        }
    }
}

// ──────────────────────────────────────────────
// Bindings
// ──────────────────────────────────────────────

/// Runtime context injected by the surrounding card: the bound remote and
/// media-player entities, the auto-fill flag, and the current user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    /// Remote entity id, possibly templated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Media player entity id, possibly templated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_player_id: Option<String>,
    /// Whether call-service actions without an explicit target get a
    /// default entity injected. May be a template expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofill_entity_id: Option<Scalar>,
    /// Current user id, compared against confirmation exemptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}
