//! Host traits: the narrow interfaces through which the engine reaches the
//! backend and the surrounding UI.
//!
//! Service invocation is fire-and-forget; the engine never observes a
//! return value. UI signals are likewise fire-and-forget. `confirm` and
//! `prompt` are async suspension points: the host resolves them with a
//! decision/value or a cancellation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use remotecard_model::{Action, DataMap, Target};

// ──────────────────────────────────────────────
// ServiceInvoker
// ──────────────────────────────────────────────

/// Error raised by a service invoker implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("service invocation failed: {0}")]
pub struct InvokeError(pub String);

/// Fire-and-forget dispatch of a named backend operation.
#[async_trait]
pub trait ServiceInvoker: Send + Sync {
    async fn invoke(
        &self,
        domain: &str,
        service: &str,
        data: DataMap,
        target: Option<Target>,
    ) -> Result<(), InvokeError>;
}

// ──────────────────────────────────────────────
// Signals and haptics
// ──────────────────────────────────────────────

/// Haptic feedback classes understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Haptic {
    Success,
    Warning,
    Failure,
    Light,
    Medium,
    Heavy,
    Selection,
}

/// Fire-and-forget signals emitted toward the surrounding UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    LocationChanged { replace: bool },
    MoreInfo { entity_id: String },
    DialogOpen { action: Action },
    Custom { name: String, action: Action },
}

// ──────────────────────────────────────────────
// UiHost
// ──────────────────────────────────────────────

/// Browser-level side effects, UI signals, and interactive prompts.
#[async_trait]
pub trait UiHost: Send + Sync {
    fn haptic(&self, kind: Haptic);
    fn emit(&self, signal: Signal);

    fn push_history(&self, path: &str);
    fn replace_history(&self, path: &str);
    fn current_location(&self) -> String;

    /// Open a URL in a new context.
    fn open_url(&self, url: &str);
    /// Open a URL in the current context.
    fn open_in_place(&self, url: &str);

    /// Whether a voice-assistant host bridge is available.
    fn has_assist_bridge(&self) -> bool {
        false
    }
    fn show_assist(&self, pipeline_id: Option<&str>, start_listening: Option<bool>);

    /// Ask the user to approve an action. `false` blocks the dispatch.
    async fn confirm(&self, text: &str) -> bool;
    /// Ask the user for a line of text; `None` means cancelled.
    async fn prompt_text(&self, text: &str) -> Option<String>;

    /// Current content of an on-screen text input, if any. Diagnostic
    /// only; used by the keyboard action's bounded poll.
    fn keyboard_text(&self) -> Option<String> {
        None
    }
}

// ──────────────────────────────────────────────
// Recording implementations
// ──────────────────────────────────────────────

/// One recorded service invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: DataMap,
    pub target: Option<Target>,
}

/// A service invoker that records every call. Used by tests and the
/// simulation CLI.
#[derive(Debug, Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<ServiceCall>>,
    fail: AtomicBool,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        RecordingInvoker::default()
    }

    /// Make every subsequent invocation fail, for exercising error paths.
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        domain: &str,
        service: &str,
        data: DataMap,
        target: Option<Target>,
    ) -> Result<(), InvokeError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(InvokeError("invoker configured to fail".to_string()));
        }
        self.calls.lock().unwrap().push(ServiceCall {
            domain: domain.to_string(),
            service: service.to_string(),
            data,
            target,
        });
        Ok(())
    }
}

/// A recorded history mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    Push(String),
    Replace(String),
}

/// A UI host that records signals and side effects and answers prompts
/// from scripted responses. Used by tests and the simulation CLI.
#[derive(Debug)]
pub struct RecordingUi {
    pub location: String,
    confirm_response: AtomicBool,
    text_response: Mutex<Option<String>>,
    keyboard_buffer: Mutex<Option<String>>,
    assist_bridge: AtomicBool,

    signals: Mutex<Vec<Signal>>,
    haptics: Mutex<Vec<Haptic>>,
    history: Mutex<Vec<HistoryEntry>>,
    opened: Mutex<Vec<String>>,
    opened_in_place: Mutex<Vec<String>>,
    assist_shown: Mutex<Vec<(Option<String>, Option<bool>)>>,
    prompts: Mutex<Vec<String>>,
}

impl Default for RecordingUi {
    fn default() -> Self {
        RecordingUi {
            location: "https://dashboard.local/lovelace/remote".to_string(),
            confirm_response: AtomicBool::new(true),
            text_response: Mutex::new(None),
            keyboard_buffer: Mutex::new(None),
            assist_bridge: AtomicBool::new(false),
            signals: Mutex::new(Vec::new()),
            haptics: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            opened_in_place: Mutex::new(Vec::new()),
            assist_shown: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingUi {
    pub fn new() -> Self {
        RecordingUi::default()
    }

    pub fn deny_confirmations(&self) {
        self.confirm_response.store(false, Ordering::Relaxed);
    }

    pub fn respond_with_text(&self, text: &str) {
        *self.text_response.lock().unwrap() = Some(text.to_string());
    }

    pub fn set_keyboard_buffer(&self, text: &str) {
        *self.keyboard_buffer.lock().unwrap() = Some(text.to_string());
    }

    pub fn enable_assist_bridge(&self) {
        self.assist_bridge.store(true, Ordering::Relaxed);
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }

    pub fn haptics(&self) -> Vec<Haptic> {
        self.haptics.lock().unwrap().clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap().clone()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn opened_in_place(&self) -> Vec<String> {
        self.opened_in_place.lock().unwrap().clone()
    }

    pub fn assist_invocations(&self) -> Vec<(Option<String>, Option<bool>)> {
        self.assist_shown.lock().unwrap().clone()
    }

    /// Prompt texts shown, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl UiHost for RecordingUi {
    fn haptic(&self, kind: Haptic) {
        self.haptics.lock().unwrap().push(kind);
    }

    fn emit(&self, signal: Signal) {
        self.signals.lock().unwrap().push(signal);
    }

    fn push_history(&self, path: &str) {
        self.history
            .lock()
            .unwrap()
            .push(HistoryEntry::Push(path.to_string()));
    }

    fn replace_history(&self, path: &str) {
        self.history
            .lock()
            .unwrap()
            .push(HistoryEntry::Replace(path.to_string()));
    }

    fn current_location(&self) -> String {
        self.location.clone()
    }

    fn open_url(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_string());
    }

    fn open_in_place(&self, url: &str) {
        self.opened_in_place.lock().unwrap().push(url.to_string());
    }

    fn has_assist_bridge(&self) -> bool {
        self.assist_bridge.load(Ordering::Relaxed)
    }

    fn show_assist(&self, pipeline_id: Option<&str>, start_listening: Option<bool>) {
        self.assist_shown
            .lock()
            .unwrap()
            .push((pipeline_id.map(str::to_string), start_listening));
    }

    async fn confirm(&self, text: &str) -> bool {
        self.prompts.lock().unwrap().push(text.to_string());
        self.confirm_response.load(Ordering::Relaxed)
    }

    async fn prompt_text(&self, text: &str) -> Option<String> {
        self.prompts.lock().unwrap().push(text.to_string());
        self.text_response.lock().unwrap().clone()
    }

    fn keyboard_text(&self) -> Option<String> {
        self.keyboard_buffer.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_invoker_captures_calls_in_order() {
        let invoker = RecordingInvoker::new();
        invoker
            .invoke("remote", "send_command", DataMap::new(), None)
            .await
            .unwrap();
        invoker
            .invoke("media_player", "volume_up", DataMap::new(), None)
            .await
            .unwrap();

        let calls = invoker.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].domain, "remote");
        assert_eq!(calls[1].service, "volume_up");
    }

    #[tokio::test]
    async fn failing_invoker_returns_error() {
        let invoker = RecordingInvoker::new();
        invoker.fail_all();
        let result = invoker
            .invoke("remote", "send_command", DataMap::new(), None)
            .await;
        assert!(result.is_err());
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn recording_ui_scripts_prompts() {
        let ui = RecordingUi::new();
        assert!(ui.confirm("sure?").await);
        ui.deny_confirmations();
        assert!(!ui.confirm("sure?").await);

        assert_eq!(ui.prompt_text("Text Input: ").await, None);
        ui.respond_with_text("hello");
        assert_eq!(ui.prompt_text("Text Input: ").await.as_deref(), Some("hello"));

        assert_eq!(ui.prompts().len(), 4);
    }
}
