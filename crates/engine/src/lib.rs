//! Action resolution and template-rendering engine for a remote-control
//! panel.
//!
//! A gesture produces an [`InteractionKind`](remotecard_model::InteractionKind);
//! the element configuration resolves it to an action definition through a
//! fixed fallback chain; the confirmation gate approves or blocks; the
//! dispatcher expands every embedded template expression against the
//! element's derived value and invokes the effect through the host traits.
//!
//! The backend is consumed through narrow interfaces: a read-only
//! [`StateStore`], a fire-and-forget [`ServiceInvoker`], an external
//! [`TemplateEngine`], and a [`UiHost`] for signals, prompts, and
//! browser-level side effects.

pub mod confirm;
pub mod dispatch;
pub mod hosts;
pub mod press;
pub mod state;
pub mod template;
pub mod value;

pub use confirm::confirm_action;
pub use dispatch::{DispatchError, RemoteElement};
pub use hosts::{
    Haptic, HistoryEntry, InvokeError, RecordingInvoker, RecordingUi, ServiceCall, ServiceInvoker,
    Signal, UiHost,
};
pub use state::{
    Clock, EntityState, FixedClock, SharedClock, SharedStore, StateStore, StaticStateStore,
    SystemClock,
};
pub use template::{build_vars, IdentityEngine, Renderer, TemplateEngine, TemplateVars};
pub use value::{derive_value, Derivation, Refresh, RefreshTimer, ValueTracker, REFRESH_PERIOD};
