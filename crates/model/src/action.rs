//! Action definitions: the configured description of an effect to perform
//! for a given gesture.
//!
//! An [`Action`] is the kind-tagged payload (`action: call-service`,
//! `action: navigate`, ...) plus the cross-cutting confirmation policy.
//! The dispatcher matches exhaustively on [`ActionKind`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scalar::Scalar;

// ──────────────────────────────────────────────
// Payload values
// ──────────────────────────────────────────────

/// A service-call data value: a scalar or a list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Single(Scalar),
    List(Vec<Scalar>),
}

impl DataValue {
    /// The single scalar, if this is not a list.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            DataValue::Single(s) => Some(s),
            DataValue::List(_) => None,
        }
    }

    /// Text view of a single-scalar value, used when an entity id is
    /// expected.
    pub fn as_text(&self) -> Option<String> {
        self.as_scalar().map(|s| s.to_string())
    }
}

impl From<Scalar> for DataValue {
    fn from(s: Scalar) -> Self {
        DataValue::Single(s)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::Single(Scalar::Text(s.to_string()))
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::Single(Scalar::Text(s))
    }
}

/// Free-form service-call data payload.
pub type DataMap = BTreeMap<String, DataValue>;

// ──────────────────────────────────────────────
// Target selector
// ──────────────────────────────────────────────

/// Structured reference to operation recipients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<DataValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DataValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<DataValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_id: Option<DataValue>,
}

impl Target {
    /// True when no recipient key is set.
    pub fn is_empty(&self) -> bool {
        self.entity_id.is_none()
            && self.device_id.is_none()
            && self.area_id.is_none()
            && self.label_id.is_none()
    }
}

// ──────────────────────────────────────────────
// Confirmation policy
// ──────────────────────────────────────────────

/// A per-user exemption from interactive confirmation. The user id may be
/// a template expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemption {
    pub user: String,
}

/// Per-action confirmation policy.
///
/// Absent means approve immediately. `false` approves; `true` requires an
/// interactive prompt. A template string is expanded and coerced to bool at
/// dispatch time. The structured form may carry custom prompt text and a
/// list of exempt users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confirmation {
    Flag(bool),
    Expr(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exemptions: Option<Vec<Exemption>>,
    },
}

// ──────────────────────────────────────────────
// Action
// ──────────────────────────────────────────────

/// The kind-specific payload of an action, tagged by the `action` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ActionKind {
    Navigate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_path: Option<String>,
        /// May be a template string, so it stays a scalar until rendered.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_replace: Option<Scalar>,
    },
    Url {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url_path: Option<String>,
    },
    Assist {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pipeline_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_listening: Option<bool>,
    },
    MoreInfo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<DataMap>,
    },
    CallService {
        /// Dotted `domain.service` identifier, possibly templated.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<DataMap>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
    },
    Source {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Key {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    FireDomEvent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_type: Option<String>,
    },
    Textbox {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<DataMap>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<String>,
    },
    Search {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<DataMap>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<String>,
    },
    Keyboard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<DataMap>,
    },
    Repeat,
}

impl ActionKind {
    /// The configuration-facing kind name, used in the default
    /// confirmation prompt.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::Url { .. } => "url",
            ActionKind::Assist { .. } => "assist",
            ActionKind::MoreInfo { .. } => "more-info",
            ActionKind::CallService { .. } => "call-service",
            ActionKind::Source { .. } => "source",
            ActionKind::Key { .. } => "key",
            ActionKind::FireDomEvent { .. } => "fire-dom-event",
            ActionKind::Textbox { .. } => "textbox",
            ActionKind::Search { .. } => "search",
            ActionKind::Keyboard { .. } => "keyboard",
            ActionKind::Repeat => "repeat",
        }
    }
}

/// A configured action: kind payload plus confirmation policy. Immutable
/// once resolved for a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Action {
            kind,
            confirmation: None,
        }
    }

    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = Some(confirmation);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_service_deserializes_from_tagged_json() {
        let action: Action = serde_json::from_value(serde_json::json!({
            "action": "call-service",
            "service": "media_player.play_media",
            "data": { "media_content_id": "plex://1", "media_content_type": "movie" },
            "target": { "entity_id": "media_player.tv" },
        }))
        .unwrap();

        match &action.kind {
            ActionKind::CallService {
                service,
                data,
                target,
            } => {
                assert_eq!(service.as_deref(), Some("media_player.play_media"));
                assert_eq!(data.as_ref().unwrap().len(), 2);
                assert_eq!(
                    target.as_ref().unwrap().entity_id,
                    Some("media_player.tv".into())
                );
            }
            other => panic!("wrong kind: {:?}", other),
        }
        assert_eq!(action.confirmation, None);
    }

    #[test]
    fn key_action_roundtrip() {
        let action = Action::new(ActionKind::Key {
            key: Some("DPAD_UP".into()),
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "key");
        assert_eq!(json["key"], "DPAD_UP");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn confirmation_forms_deserialize_untagged() {
        let flag: Confirmation = serde_json::from_str("true").unwrap();
        assert_eq!(flag, Confirmation::Flag(true));

        let expr: Confirmation = serde_json::from_str("\"{{ value > 50 }}\"").unwrap();
        assert_eq!(expr, Confirmation::Expr("{{ value > 50 }}".into()));

        let detailed: Confirmation = serde_json::from_value(serde_json::json!({
            "text": "Really?",
            "exemptions": [{ "user": "abc123" }],
        }))
        .unwrap();
        match detailed {
            Confirmation::Detailed { text, exemptions } => {
                assert_eq!(text.as_deref(), Some("Really?"));
                assert_eq!(exemptions.unwrap()[0].user, "abc123");
            }
            other => panic!("wrong form: {:?}", other),
        }
    }

    #[test]
    fn data_values_accept_scalars_and_lists() {
        let data: DataMap = serde_json::from_value(serde_json::json!({
            "brightness": 128,
            "rgb_color": [255, 0, 0],
        }))
        .unwrap();
        assert_eq!(data["brightness"], DataValue::Single(Scalar::Number(128.0)));
        assert_eq!(
            data["rgb_color"],
            DataValue::List(vec![
                Scalar::Number(255.0),
                Scalar::Number(0.0),
                Scalar::Number(0.0)
            ])
        );
    }

    #[test]
    fn kind_names() {
        assert_eq!(
            ActionKind::FireDomEvent { event_type: None }.name(),
            "fire-dom-event"
        );
        assert_eq!(ActionKind::Repeat.name(), "repeat");
    }

    #[test]
    fn target_is_empty() {
        assert!(Target::default().is_empty());
        let target = Target {
            area_id: Some("living_room".into()),
            ..Target::default()
        };
        assert!(!target.is_empty());
    }
}
