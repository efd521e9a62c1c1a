//! Template context building and expression rendering.
//!
//! The expression evaluator itself is an external collaborator behind
//! [`TemplateEngine`]; this module assembles the variable context it sees
//! (current value, hold duration, config snapshot) and layers the legacy
//! bare-token `VALUE` / `HOLD_SECS` substitution on top of it.
//!
//! The [`Renderer`] handle is the recursion point for nested expansion;
//! deep rendering of structured payloads calls back through it.

use remotecard_model::{ElementConfig, Scalar};

// ──────────────────────────────────────────────
// TemplateEngine contract
// ──────────────────────────────────────────────

/// External templating engine expanding `{{ }}`-style expressions against
/// a variable context.
///
/// `evaluate` returns `None` when the input contains no recognized
/// expression syntax; returning the input unchanged means the same thing.
/// Either way the caller falls back to legacy bare-token substitution.
pub trait TemplateEngine: Send + Sync {
    fn evaluate(&self, raw: &str, vars: &TemplateVars) -> Option<serde_json::Value>;
}

/// A template engine that expands nothing. Stands in for the external
/// evaluator in tests and the simulation CLI; legacy `VALUE` /
/// `HOLD_SECS` substitution still applies on top of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEngine;

impl TemplateEngine for IdentityEngine {
    fn evaluate(&self, _raw: &str, _vars: &TemplateVars) -> Option<serde_json::Value> {
        None
    }
}

/// The variable context handed to the expression evaluator.
pub type TemplateVars = serde_json::Map<String, serde_json::Value>;

/// Legacy bare-token aliases substituted outside the formal expression
/// syntax.
const LEGACY_TOKENS: [&str; 2] = ["VALUE", "HOLD_SECS"];

// ──────────────────────────────────────────────
// Context building
// ──────────────────────────────────────────────

/// Assemble the variable context for one evaluation.
///
/// Contains both upper-case legacy aliases and lower-case canonical keys,
/// plus a `config` snapshot augmented with the bound entity id. Caller
/// extras take precedence over the defaults. If `precision` is set and the
/// value is numeric, both value aliases carry the fixed-point string
/// instead.
pub fn build_vars(
    value: Option<&Scalar>,
    hold_secs: f64,
    precision: Option<u8>,
    config: &ElementConfig,
    entity_id: Option<&str>,
    extra: Option<&TemplateVars>,
) -> TemplateVars {
    let value_json = match (value, precision) {
        (Some(scalar), Some(digits)) => match scalar.as_number() {
            Some(n) => serde_json::Value::String(format!("{:.*}", digits as usize, n)),
            None => scalar.to_json(),
        },
        (Some(scalar), None) => scalar.to_json(),
        (None, _) => serde_json::Value::Null,
    };

    let mut config_snapshot =
        serde_json::to_value(config).unwrap_or(serde_json::Value::Object(Default::default()));
    if let Some(obj) = config_snapshot.as_object_mut() {
        obj.insert(
            "entity".to_string(),
            entity_id
                .map(|id| serde_json::Value::String(id.to_string()))
                .unwrap_or(serde_json::Value::Null),
        );
    }

    let mut vars = TemplateVars::new();
    vars.insert("VALUE".to_string(), value_json.clone());
    vars.insert("HOLD_SECS".to_string(), serde_json::json!(hold_secs));
    vars.insert("value".to_string(), value_json);
    vars.insert("hold_secs".to_string(), serde_json::json!(hold_secs));
    vars.insert("config".to_string(), config_snapshot);

    if let Some(extra) = extra {
        for (k, v) in extra {
            vars.insert(k.clone(), v.clone());
        }
    }

    vars
}

// ──────────────────────────────────────────────
// Renderer
// ──────────────────────────────────────────────

/// One evaluation's rendering handle: the external engine plus the
/// assembled variable context. Lifetime is a single render/dispatch call.
pub struct Renderer<'a> {
    engine: &'a dyn TemplateEngine,
    vars: TemplateVars,
}

impl<'a> Renderer<'a> {
    pub fn new(engine: &'a dyn TemplateEngine, vars: TemplateVars) -> Self {
        Renderer { engine, vars }
    }

    pub fn vars(&self) -> &TemplateVars {
        &self.vars
    }

    /// Expand a string through the evaluator, then apply legacy bare-token
    /// substitution.
    ///
    /// Precedence: if the evaluator changed the string its result wins and
    /// legacy substitution is skipped. Otherwise a whole-token match
    /// returns the context value with its type, and embedded tokens are
    /// string-substituted (absent context values substitute as empty).
    pub fn render_str(&self, raw: &str) -> serde_json::Value {
        if let Some(result) = self.engine.evaluate(raw, &self.vars) {
            if result != serde_json::Value::String(raw.to_string()) {
                return result;
            }
        }

        let mut s = raw.to_string();
        for token in LEGACY_TOKENS {
            if s == token {
                return self
                    .vars
                    .get(token)
                    .cloned()
                    .unwrap_or(serde_json::Value::String(String::new()));
            }
            if s.contains(token) {
                let substitution = self
                    .vars
                    .get(token)
                    .map(json_to_string)
                    .unwrap_or_default();
                s = s.replace(token, &substitution);
            }
        }
        serde_json::Value::String(s)
    }

    /// Render to plain text.
    pub fn render_text(&self, raw: &str) -> String {
        json_to_string(&self.render_str(raw))
    }

    /// Render an optional template, empty string when absent.
    pub fn render_opt(&self, raw: Option<&str>) -> String {
        self.render_text(raw.unwrap_or(""))
    }

    /// Render a scalar. Non-string scalars pass through unchanged
    /// (identity on non-expressions).
    pub fn render_scalar(&self, raw: &Scalar) -> Scalar {
        match raw {
            Scalar::Text(s) => {
                let rendered = self.render_str(s);
                Scalar::from_json(&rendered)
                    .unwrap_or_else(|| Scalar::Text(json_to_string(&rendered)))
            }
            other => other.clone(),
        }
    }

    /// Render an optional scalar and coerce to bool.
    pub fn render_truthy(&self, raw: Option<&Scalar>, default: bool) -> bool {
        match raw {
            Some(scalar) => self.render_scalar(scalar).is_truthy(),
            None => default,
        }
    }
}

/// Text form of a rendered value: strings as-is, null as empty, scalars
/// through their display form.
fn json_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => Scalar::from_json(other)
            .map(|s| s.to_string())
            .unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Engine that expands `{{ upper }}` to `"UPPER"` and nothing else,
    /// for exercising evaluator-wins precedence.
    struct StubEngine;

    impl TemplateEngine for StubEngine {
        fn evaluate(&self, raw: &str, _vars: &TemplateVars) -> Option<serde_json::Value> {
            if raw.contains("{{ upper }}") {
                Some(serde_json::Value::String(
                    raw.replace("{{ upper }}", "UPPER"),
                ))
            } else {
                Some(serde_json::Value::String(raw.to_string()))
            }
        }
    }

    fn renderer_with(value: Option<Scalar>, hold_secs: f64) -> Renderer<'static> {
        static IDENTITY: IdentityEngine = IdentityEngine;
        let vars = build_vars(
            value.as_ref(),
            hold_secs,
            None,
            &ElementConfig::default(),
            Some("media_player.tv"),
            None,
        );
        Renderer::new(&IDENTITY, vars)
    }

    #[test]
    fn expression_free_strings_roundtrip() {
        let r = renderer_with(Some(Scalar::Number(10.0)), 0.0);
        assert_eq!(r.render_text("volume_up"), "volume_up");
        assert_eq!(
            r.render_scalar(&Scalar::Bool(true)),
            Scalar::Bool(true)
        );
        assert_eq!(
            r.render_scalar(&Scalar::Number(3.5)),
            Scalar::Number(3.5)
        );
    }

    #[test]
    fn whole_token_returns_typed_value() {
        let r = renderer_with(Some(Scalar::Number(42.0)), 1.5);
        assert_eq!(r.render_str("VALUE"), serde_json::json!(42.0));
        assert_eq!(r.render_str("HOLD_SECS"), serde_json::json!(1.5));
    }

    #[test]
    fn embedded_tokens_string_substitute() {
        let r = renderer_with(Some(Scalar::Number(42.0)), 0.0);
        assert_eq!(r.render_text("position: VALUE s"), "position: 42 s");
    }

    #[test]
    fn absent_value_substitutes_empty() {
        let r = renderer_with(None, 0.0);
        assert_eq!(r.render_text("v=VALUE"), "v=");
    }

    #[test]
    fn evaluator_change_wins_over_legacy() {
        let vars = build_vars(
            Some(&Scalar::Number(7.0)),
            0.0,
            None,
            &ElementConfig::default(),
            None,
            None,
        );
        let r = Renderer::new(&StubEngine, vars);
        // Engine rewrote the string, so the embedded VALUE token survives.
        assert_eq!(r.render_text("{{ upper }} VALUE"), "UPPER VALUE");
        // Engine returned the input unchanged, so legacy substitution runs.
        assert_eq!(r.render_text("v=VALUE"), "v=7");
    }

    #[test]
    fn precision_formats_both_aliases() {
        let vars = build_vars(
            Some(&Scalar::Number(0.4567)),
            0.0,
            Some(2),
            &ElementConfig::default(),
            None,
            None,
        );
        assert_eq!(vars["VALUE"], serde_json::json!("0.46"));
        assert_eq!(vars["value"], serde_json::json!("0.46"));
    }

    #[test]
    fn config_snapshot_carries_entity() {
        let r = renderer_with(None, 0.0);
        assert_eq!(
            r.vars()["config"]["entity"],
            serde_json::json!("media_player.tv")
        );
    }

    #[test]
    fn extras_override_defaults() {
        let mut extra = TemplateVars::new();
        extra.insert("VALUE".to_string(), serde_json::json!("overridden"));
        let vars = build_vars(
            Some(&Scalar::Number(1.0)),
            0.0,
            None,
            &ElementConfig::default(),
            None,
            Some(&extra),
        );
        assert_eq!(vars["VALUE"], serde_json::json!("overridden"));
        assert_eq!(vars["value"], serde_json::json!(1.0));
    }
}
