//! Confirmation gate: decides whether a resolved action may dispatch.
//!
//! Policy semantics: absent approves immediately; an effective `false`
//! approves; anything else emits a warning haptic and requires interactive
//! approval, unless a structured exemption matches the current user. A
//! template-string policy is expanded and coerced to bool first.

use remotecard_model::{Action, Confirmation, Exemption, Scalar};

use crate::hosts::{Haptic, UiHost};
use crate::template::Renderer;

/// Run the confirmation gate for a resolved action. Returns whether the
/// dispatch may proceed.
pub async fn confirm_action(
    action: &Action,
    renderer: &Renderer<'_>,
    ui: &dyn UiHost,
    user_id: Option<&str>,
    haptics_enabled: bool,
) -> bool {
    let policy = match &action.confirmation {
        None => return true,
        Some(policy) => policy,
    };

    let (custom_text, exemptions): (Option<&str>, Option<&[Exemption]>) = match policy {
        Confirmation::Flag(false) => return true,
        Confirmation::Flag(true) => (None, None),
        Confirmation::Expr(expr) => {
            let effective = renderer.render_scalar(&Scalar::Text(expr.clone()));
            if !effective.is_truthy() {
                return true;
            }
            (None, None)
        }
        Confirmation::Detailed { text, exemptions } => (text.as_deref(), exemptions.as_deref()),
    };

    if haptics_enabled {
        ui.haptic(Haptic::Warning);
    }

    let text = match custom_text {
        Some(text) => renderer.render_text(text),
        None => format!(
            "Are you sure you want to run action '{}'?",
            renderer.render_text(action.kind.name())
        ),
    };

    // An exemption matching the current user bypasses the prompt entirely.
    if let (Some(exemptions), Some(user_id)) = (exemptions, user_id) {
        if exemptions
            .iter()
            .any(|exemption| renderer.render_text(&exemption.user) == user_id)
        {
            return true;
        }
    }

    ui.confirm(&text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::RecordingUi;
    use crate::template::{build_vars, IdentityEngine};
    use remotecard_model::{ActionKind, ElementConfig};

    fn renderer() -> Renderer<'static> {
        static IDENTITY: IdentityEngine = IdentityEngine;
        let vars = build_vars(None, 0.0, None, &ElementConfig::default(), None, None);
        Renderer::new(&IDENTITY, vars)
    }

    fn key_action(confirmation: Option<Confirmation>) -> Action {
        Action {
            kind: ActionKind::Key {
                key: Some("power".into()),
            },
            confirmation,
        }
    }

    #[tokio::test]
    async fn absent_policy_approves_without_prompt() {
        let ui = RecordingUi::new();
        assert!(confirm_action(&key_action(None), &renderer(), &ui, None, true).await);
        assert!(ui.prompts().is_empty());
        assert!(ui.haptics().is_empty());
    }

    #[tokio::test]
    async fn false_policy_approves_without_prompt() {
        let ui = RecordingUi::new();
        let action = key_action(Some(Confirmation::Flag(false)));
        assert!(confirm_action(&action, &renderer(), &ui, None, true).await);
        assert!(ui.prompts().is_empty());
    }

    #[tokio::test]
    async fn true_policy_prompts_with_default_text() {
        let ui = RecordingUi::new();
        let action = key_action(Some(Confirmation::Flag(true)));
        assert!(confirm_action(&action, &renderer(), &ui, None, true).await);
        assert_eq!(
            ui.prompts(),
            vec!["Are you sure you want to run action 'key'?".to_string()]
        );
        assert_eq!(ui.haptics(), vec![Haptic::Warning]);
    }

    #[tokio::test]
    async fn denial_blocks() {
        let ui = RecordingUi::new();
        ui.deny_confirmations();
        let action = key_action(Some(Confirmation::Flag(true)));
        assert!(!confirm_action(&action, &renderer(), &ui, None, true).await);
    }

    #[tokio::test]
    async fn expr_policy_coerces_to_bool() {
        let ui = RecordingUi::new();
        // Renders to itself; "false" coerces falsey, approves silently.
        let action = key_action(Some(Confirmation::Expr("false".into())));
        assert!(confirm_action(&action, &renderer(), &ui, None, true).await);
        assert!(ui.prompts().is_empty());

        let action = key_action(Some(Confirmation::Expr("true".into())));
        assert!(confirm_action(&action, &renderer(), &ui, None, true).await);
        assert_eq!(ui.prompts().len(), 1);
    }

    #[tokio::test]
    async fn detailed_policy_uses_custom_text() {
        let ui = RecordingUi::new();
        let action = key_action(Some(Confirmation::Detailed {
            text: Some("Power off the TV?".into()),
            exemptions: None,
        }));
        assert!(confirm_action(&action, &renderer(), &ui, None, true).await);
        assert_eq!(ui.prompts(), vec!["Power off the TV?".to_string()]);
    }

    #[tokio::test]
    async fn matching_exemption_bypasses_prompt() {
        let ui = RecordingUi::new();
        ui.deny_confirmations();
        let action = key_action(Some(Confirmation::Detailed {
            text: None,
            exemptions: Some(vec![Exemption {
                user: "user-123".into(),
            }]),
        }));
        // Even a denying UI never gets asked.
        assert!(confirm_action(&action, &renderer(), &ui, Some("user-123"), true).await);
        assert!(ui.prompts().is_empty());
        // The warning haptic still fired before the exemption check.
        assert_eq!(ui.haptics(), vec![Haptic::Warning]);
    }

    #[tokio::test]
    async fn non_matching_exemption_still_prompts() {
        let ui = RecordingUi::new();
        let action = key_action(Some(Confirmation::Detailed {
            text: None,
            exemptions: Some(vec![Exemption {
                user: "someone-else".into(),
            }]),
        }));
        assert!(confirm_action(&action, &renderer(), &ui, Some("user-123"), true).await);
        assert_eq!(ui.prompts().len(), 1);
    }

    #[tokio::test]
    async fn haptics_gate_suppresses_warning() {
        let ui = RecordingUi::new();
        let action = key_action(Some(Confirmation::Flag(true)));
        assert!(confirm_action(&action, &renderer(), &ui, None, false).await);
        assert!(ui.haptics().is_empty());
    }
}
