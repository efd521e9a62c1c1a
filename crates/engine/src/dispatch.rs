//! The remote element: configuration, derived value, press tracking, and
//! action dispatch.
//!
//! A dispatch runs resolve, confirm, render, perform in that order. Press
//! tracking is cleared when the action completes, including when it fails;
//! the error still propagates to the caller.

use std::sync::Arc;
use std::time::Duration;

use remotecard_model::{
    Action, ActionKind, Bindings, DataMap, DataValue, ElementConfig, InteractionKind, Scalar,
    Target,
};

use crate::confirm::confirm_action;
use crate::hosts::{Haptic, InvokeError, ServiceInvoker, Signal, UiHost};
use crate::press::PressState;
use crate::state::{SharedClock, SharedStore, SystemClock};
use crate::template::{build_vars, Renderer, TemplateEngine, TemplateVars};
use crate::value::ValueTracker;

/// How long the keyboard action's diagnostic poll runs, one second apart.
const KEYBOARD_POLL_TICKS: u32 = 10;

/// Error raised by a dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A call-service action whose rendered service identifier is not of
    /// the `domain.service` form.
    #[error("malformed service identifier '{service}': expected 'domain.service'")]
    MalformedService { service: String },
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

// ──────────────────────────────────────────────
// RemoteElement
// ──────────────────────────────────────────────

/// One interactive element of the panel: its configuration, dashboard
/// bindings, derived value, and in-flight press state.
pub struct RemoteElement {
    config: ElementConfig,
    bindings: Bindings,
    precision: Option<u8>,
    entity_id: Option<String>,
    tracker: ValueTracker,
    press: PressState,

    store: SharedStore,
    clock: SharedClock,
    templates: Arc<dyn TemplateEngine>,
    invoker: Arc<dyn ServiceInvoker>,
    ui: Arc<dyn UiHost>,
}

impl RemoteElement {
    pub fn new(
        store: SharedStore,
        templates: Arc<dyn TemplateEngine>,
        invoker: Arc<dyn ServiceInvoker>,
        ui: Arc<dyn UiHost>,
    ) -> Self {
        RemoteElement {
            config: ElementConfig::default(),
            bindings: Bindings::default(),
            precision: None,
            entity_id: None,
            tracker: ValueTracker::new(),
            press: PressState::default(),
            store,
            clock: Arc::new(SystemClock),
            templates,
            invoker,
            ui,
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_bindings(&mut self, bindings: Bindings) {
        self.bindings = bindings;
    }

    pub fn set_precision(&mut self, precision: Option<u8>) {
        self.precision = precision;
    }

    /// Install a new configuration and rebind the tracked entity from the
    /// tap action, without touching the derived value.
    pub fn set_config(&mut self, config: ElementConfig) {
        self.config = config;
        self.bind_entity();
    }

    /// Install a new configuration, rebind the tracked entity from the
    /// tap action, and recompute the derived value.
    pub fn apply_config(&mut self, config: ElementConfig) {
        self.set_config(config);
        self.refresh_value();
    }

    pub fn config(&self) -> &ElementConfig {
        &self.config
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn value(&self) -> Option<Scalar> {
        self.tracker.value()
    }

    /// Override the derived value directly, e.g. while a slider drag is in
    /// flight.
    pub fn set_value(&self, value: Option<Scalar>) {
        self.tracker.set_value(value);
    }

    pub fn press(&self) -> &PressState {
        &self.press
    }

    pub fn press_started(&mut self) {
        let now = self.clock.now();
        self.press.start(now);
    }

    pub fn press_finished(&mut self) {
        let now = self.clock.now();
        self.press.finish(now);
    }

    pub fn begin_swipe(&mut self, x: f64, y: f64) {
        self.press.begin_swipe(x, y);
    }

    /// Cancel the in-flight gesture without dispatching anything.
    pub fn end_action(&mut self) {
        self.press.clear();
    }

    /// Pause value tracking for a while, e.g. during a slider drag whose
    /// backend echo lags behind.
    pub fn suspend_tracking(&mut self, duration: Duration) {
        self.tracker.suspend_tracking(duration);
    }

    /// Cancel the tracker's timers. Called on element removal.
    pub fn teardown(&mut self) {
        self.tracker.stop();
    }

    /// Recompute the derived value from fresh state, reinstalling the
    /// periodic refresh when the derivation asks for one.
    pub fn refresh_value(&mut self) {
        let attribute = {
            let renderer = self.renderer(None);
            let raw = self.config.value_attribute.as_deref().unwrap_or("state");
            renderer.render_text(raw)
        };
        self.tracker
            .apply(&self.store, &self.clock, self.entity_id.as_deref(), &attribute);
    }

    /// Build a rendering handle against the current value, hold duration,
    /// and configuration snapshot.
    pub fn renderer(&self, extra: Option<&TemplateVars>) -> Renderer<'_> {
        let value = self.tracker.value();
        let vars = build_vars(
            value.as_ref(),
            self.press.hold_secs(),
            self.precision,
            &self.config,
            self.entity_id.as_deref(),
            extra,
        );
        Renderer::new(self.templates.as_ref(), vars)
    }

    /// Fire a haptic, subject to the element's haptics gate.
    pub fn fire_haptic(&self, kind: Haptic) {
        let renderer = self.renderer(None);
        if renderer.render_truthy(self.config.haptics.as_ref(), true) {
            self.ui.haptic(kind);
        }
    }

    fn bind_entity(&mut self) {
        let raw = self.config.tap_action.as_ref().and_then(|action| {
            let (target, data) = action_target_data(&action.kind);
            configured_entity_id(target, data)
        });
        let rendered = raw.map(|raw| self.renderer(None).render_text(&raw));
        self.entity_id = rendered.filter(|id| !id.is_empty());
    }

    // ──────────────────────────────────────────────
    // Dispatch
    // ──────────────────────────────────────────────

    /// Resolve an interaction through the fallback chain and dispatch the
    /// resulting action. An interaction with no configured action is a
    /// no-op.
    pub async fn dispatch(&mut self, kind: InteractionKind) -> Result<(), DispatchError> {
        let action = match self.config.resolve(kind) {
            Some(action) => action.clone(),
            None => return Ok(()),
        };
        self.dispatch_action(kind, &action).await
    }

    /// Dispatch an already-resolved action: confirmation gate, then the
    /// kind-specific effect. Press state is cleared on completion, error
    /// or not.
    pub async fn dispatch_action(
        &mut self,
        kind: InteractionKind,
        action: &Action,
    ) -> Result<(), DispatchError> {
        let approved = {
            let renderer = self.renderer(None);
            let haptics = renderer.render_truthy(self.config.haptics.as_ref(), true);
            confirm_action(
                action,
                &renderer,
                self.ui.as_ref(),
                self.bindings.user_id.as_deref(),
                haptics,
            )
            .await
        };
        if !approved {
            return Ok(());
        }

        let result = self.perform(kind, action).await;
        self.press.clear();
        result
    }

    async fn perform(&self, kind: InteractionKind, action: &Action) -> Result<(), DispatchError> {
        match &action.kind {
            ActionKind::Key { key } => self.send_command(key.as_deref(), kind).await,
            ActionKind::Source { source } => self.change_source(source.as_deref()).await,
            ActionKind::CallService {
                service,
                data,
                target,
            } => {
                self.call_service(service.as_deref(), data.as_ref(), target.as_ref())
                    .await
            }
            ActionKind::Navigate {
                navigation_path,
                navigation_replace,
            } => {
                self.navigate(navigation_path.as_deref(), navigation_replace.as_ref());
                Ok(())
            }
            ActionKind::Url { url_path } => {
                self.to_url(url_path.as_deref());
                Ok(())
            }
            ActionKind::Assist {
                pipeline_id,
                start_listening,
            } => {
                self.assist(pipeline_id.as_deref(), *start_listening);
                Ok(())
            }
            ActionKind::MoreInfo { target, data } => {
                self.more_info(target.as_ref(), data.as_ref());
                Ok(())
            }
            ActionKind::FireDomEvent { event_type } => {
                self.fire_dom_event(event_type.as_deref(), action);
                Ok(())
            }
            ActionKind::Textbox {
                target,
                data,
                platform,
            } => {
                self.textbox(target.as_ref(), data.as_ref(), platform.as_deref())
                    .await
            }
            ActionKind::Search {
                target,
                data,
                platform,
            } => {
                self.search(target.as_ref(), data.as_ref(), platform.as_deref())
                    .await
            }
            ActionKind::Keyboard { .. } => {
                self.keyboard(action);
                Ok(())
            }
            ActionKind::Repeat => Ok(()),
        }
    }

    // ──────────────────────────────────────────────
    // Action handlers
    // ──────────────────────────────────────────────

    /// `key`: a command through the bound remote. A hold that fell back to
    /// the tap action repeats the key server-side instead.
    async fn send_command(
        &self,
        key: Option<&str>,
        kind: InteractionKind,
    ) -> Result<(), DispatchError> {
        let renderer = self.renderer(None);
        let mut data = DataMap::new();
        data.insert(
            "entity_id".to_string(),
            Scalar::Text(renderer.render_opt(self.bindings.remote_id.as_deref())).into(),
        );
        data.insert(
            "command".to_string(),
            Scalar::Text(renderer.render_opt(key)).into(),
        );
        if kind == InteractionKind::Hold && self.config.hold_action.is_none() {
            data.insert("hold_secs".to_string(), Scalar::Number(0.5).into());
        }
        self.invoker.invoke("remote", "send_command", data, None).await?;
        Ok(())
    }

    /// `source`: switch the bound remote to another activity.
    async fn change_source(&self, source: Option<&str>) -> Result<(), DispatchError> {
        let renderer = self.renderer(None);
        let mut data = DataMap::new();
        data.insert(
            "entity_id".to_string(),
            Scalar::Text(renderer.render_opt(self.bindings.remote_id.as_deref())).into(),
        );
        data.insert(
            "activity".to_string(),
            Scalar::Text(renderer.render_opt(source)).into(),
        );
        self.invoker.invoke("remote", "turn_on", data, None).await?;
        Ok(())
    }

    /// `call-service`: an arbitrary backend operation, deep-rendered, with
    /// opt-in autofill of the bound entity when no target is given.
    async fn call_service(
        &self,
        service: Option<&str>,
        data: Option<&DataMap>,
        target: Option<&Target>,
    ) -> Result<(), DispatchError> {
        let renderer = self.renderer(None);
        let service = renderer.render_opt(service);
        let (domain, operation) =
            service
                .split_once('.')
                .ok_or_else(|| DispatchError::MalformedService {
                    service: service.clone(),
                })?;

        let mut data = data.cloned().unwrap_or_default();
        for value in data.values_mut() {
            render_data_value(&renderer, value);
        }
        let mut target = target.cloned().unwrap_or_default();
        for slot in [
            &mut target.entity_id,
            &mut target.device_id,
            &mut target.area_id,
            &mut target.label_id,
        ] {
            if let Some(value) = slot {
                render_data_value(&renderer, value);
            }
        }

        // Autofill injects the raw bound id, templates and all; the next
        // render pass expands it.
        if renderer.render_truthy(self.bindings.autofill_entity_id.as_ref(), false) {
            let bound = match domain {
                "remote" => self.bindings.remote_id.as_deref(),
                "media_player" | "kodi" | "denonavr" => self.bindings.media_player_id.as_deref(),
                _ => None,
            };
            if let Some(bound) = bound {
                let data_has_target = ["entity_id", "device_id", "area_id", "label_id"]
                    .iter()
                    .any(|key| data.contains_key(*key));
                if !data_has_target && target.is_empty() {
                    target.entity_id = Some(bound.into());
                }
            }
        }

        let target = if target.is_empty() { None } else { Some(target) };
        self.invoker.invoke(domain, operation, data, target).await?;
        Ok(())
    }

    /// `navigate`: an in-dashboard path change. Anything with a protocol
    /// separator is refused; external navigation goes through `url`.
    fn navigate(&self, path: Option<&str>, replace: Option<&Scalar>) {
        let renderer = self.renderer(None);
        let path = renderer.render_opt(path);
        let replace = renderer.render_truthy(replace, false);
        if path.contains("//") {
            log::warn!(
                "protocol detected in navigation path '{path}'; use a url action for external navigation"
            );
            return;
        }
        if replace {
            self.ui.replace_history(&path);
        } else {
            self.ui.push_history(&path);
        }
        self.ui.emit(Signal::LocationChanged { replace });
    }

    /// `url`: open an external URL, defaulting the scheme to https.
    fn to_url(&self, url_path: Option<&str>) {
        let renderer = self.renderer(None);
        let mut url = renderer.render_opt(url_path);
        if !url.contains("//") {
            url = format!("https://{url}");
        }
        self.ui.open_url(&url);
    }

    /// `assist`: show the voice assistant, falling back to the standalone
    /// conversation view when no host bridge is available.
    fn assist(&self, pipeline_id: Option<&str>, start_listening: Option<bool>) {
        if self.ui.has_assist_bridge() {
            self.ui.show_assist(pipeline_id, start_listening);
        } else {
            let location = self.ui.current_location();
            self.ui.open_in_place(&format!("{location}?conversation=1"));
        }
    }

    /// `more-info`: ask the UI to open the detail dialog for an entity.
    fn more_info(&self, target: Option<&Target>, data: Option<&DataMap>) {
        let renderer = self.renderer(None);
        let entity_id = configured_entity_id(target, data).unwrap_or_default();
        self.ui.emit(Signal::MoreInfo {
            entity_id: renderer.render_text(&entity_id),
        });
    }

    /// `fire-dom-event`: a custom UI event carrying the whole action.
    fn fire_dom_event(&self, event_type: Option<&str>, action: &Action) {
        let renderer = self.renderer(None);
        let name = match event_type {
            Some(raw) => renderer.render_text(raw),
            None => "ll-custom".to_string(),
        };
        self.ui.emit(Signal::Custom {
            name,
            action: action.clone(),
        });
    }

    /// `textbox`: prompt for a line of text and type it on the target
    /// platform.
    async fn textbox(
        &self,
        target: Option<&Target>,
        data: Option<&DataMap>,
        platform: Option<&str>,
    ) -> Result<(), DispatchError> {
        let entity_id = match configured_entity_id(target, data) {
            Some(id) => id,
            None => return Ok(()),
        };
        let renderer = self.renderer(None);
        let platform = renderer.render_opt(platform).to_uppercase();

        let text = match self.ui.prompt_text("Text Input: ").await {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(()),
        };

        match platform.as_str() {
            "KODI" => {
                let mut data = DataMap::new();
                data.insert("entity_id".to_string(), entity_id.as_str().into());
                data.insert("method".to_string(), "Input.SendText".into());
                data.insert("text".to_string(), text.as_str().into());
                data.insert("done".to_string(), Scalar::Bool(false).into());
                self.invoker.invoke("kodi", "call_method", data, None).await?;
            }
            "ROKU" => {
                let mut data = DataMap::new();
                data.insert(
                    "entity_id".to_string(),
                    self.platform_entity_id(&renderer, &entity_id, "remote").into(),
                );
                data.insert("command".to_string(), format!("Lit_{text}").into());
                self.invoker.invoke("remote", "send_command", data, None).await?;
            }
            // FIRE TV, ANDROID TV, and everything else type over adb.
            _ => {
                let mut data = DataMap::new();
                data.insert("entity_id".to_string(), entity_id.as_str().into());
                data.insert(
                    "command".to_string(),
                    format!("input text \"{text}\"").into(),
                );
                self.invoker
                    .invoke("androidtv", "adb_command", data, None)
                    .await?;
            }
        }
        Ok(())
    }

    /// `search`: prompt for a query and run the platform's global search.
    async fn search(
        &self,
        target: Option<&Target>,
        data: Option<&DataMap>,
        platform: Option<&str>,
    ) -> Result<(), DispatchError> {
        let entity_id = match configured_entity_id(target, data) {
            Some(id) => id,
            None => return Ok(()),
        };
        let renderer = self.renderer(None);
        let platform = renderer.render_opt(platform).to_uppercase();

        // Kodi's global search addon has to be open before it accepts the
        // query text.
        if platform == "KODI" {
            let mut data = DataMap::new();
            data.insert("entity_id".to_string(), entity_id.as_str().into());
            data.insert("method".to_string(), "Addons.ExecuteAddon".into());
            data.insert("addonid".to_string(), "script.globalsearch".into());
            self.invoker.invoke("kodi", "call_method", data, None).await?;
        }

        let prompt = match platform.as_str() {
            "KODI" | "ROKU" | "FIRE TV" => "Global Search: ",
            _ => "Google Assistant Search: ",
        };
        let text = match self.ui.prompt_text(prompt).await {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(()),
        };

        match platform.as_str() {
            "KODI" => {
                let mut data = DataMap::new();
                data.insert("entity_id".to_string(), entity_id.as_str().into());
                data.insert("method".to_string(), "Input.SendText".into());
                data.insert("text".to_string(), text.as_str().into());
                data.insert("done".to_string(), Scalar::Bool(true).into());
                self.invoker.invoke("kodi", "call_method", data, None).await?;
            }
            "ROKU" => {
                let mut data = DataMap::new();
                data.insert(
                    "entity_id".to_string(),
                    self.platform_entity_id(&renderer, &entity_id, "media_player")
                        .into(),
                );
                data.insert("keyword".to_string(), text.as_str().into());
                self.invoker.invoke("roku", "search", data, None).await?;
            }
            _ => {
                let mut data = DataMap::new();
                data.insert("entity_id".to_string(), entity_id.as_str().into());
                data.insert(
                    "command".to_string(),
                    format!(
                        "am start -a \"android.search.action.GLOBAL_SEARCH\" --es query \"{text}\""
                    )
                    .into(),
                );
                self.invoker
                    .invoke("androidtv", "adb_command", data, None)
                    .await?;
            }
        }
        Ok(())
    }

    /// `keyboard`: open the live-typing dialog and poll its buffer for a
    /// bounded while, for diagnostics. The dialog-open signal is the
    /// contract; the poll only logs.
    fn keyboard(&self, action: &Action) {
        self.ui.emit(Signal::DialogOpen {
            action: action.clone(),
        });
        let ui = Arc::clone(&self.ui);
        tokio::spawn(async move {
            for _ in 0..KEYBOARD_POLL_TICKS {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if let Some(text) = ui.keyboard_text() {
                    log::debug!("keyboard buffer: {text}");
                }
            }
        });
    }

    /// The configured entity when its domain matches, else the rendered
    /// bound id for that domain. Roku splits its commands across a remote
    /// and a media player entity.
    fn platform_entity_id(&self, renderer: &Renderer<'_>, entity_id: &str, domain: &str) -> String {
        if entity_id.split('.').next() == Some(domain) {
            return entity_id.to_string();
        }
        let bound = match domain {
            "media_player" => self.bindings.media_player_id.as_deref(),
            _ => self.bindings.remote_id.as_deref(),
        };
        renderer.render_opt(bound)
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// The entity id an action addresses: target first, then data.
fn configured_entity_id(target: Option<&Target>, data: Option<&DataMap>) -> Option<String> {
    target
        .and_then(|t| t.entity_id.as_ref())
        .and_then(DataValue::as_text)
        .or_else(|| {
            data.and_then(|d| d.get("entity_id"))
                .and_then(DataValue::as_text)
        })
}

fn action_target_data(kind: &ActionKind) -> (Option<&Target>, Option<&DataMap>) {
    match kind {
        ActionKind::MoreInfo { target, data }
        | ActionKind::CallService { target, data, .. }
        | ActionKind::Textbox { target, data, .. }
        | ActionKind::Search { target, data, .. }
        | ActionKind::Keyboard { target, data } => (target.as_ref(), data.as_ref()),
        _ => (None, None),
    }
}

/// Render every scalar in a data value in place.
fn render_data_value(renderer: &Renderer<'_>, value: &mut DataValue) {
    match value {
        DataValue::Single(scalar) => *scalar = renderer.render_scalar(scalar),
        DataValue::List(items) => {
            for item in items.iter_mut() {
                *item = renderer.render_scalar(item);
            }
        }
    }
}
