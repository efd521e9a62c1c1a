//! Data model for the remote-control panel engine.
//!
//! These types mirror the element configuration a dashboard card carries:
//! scalar values, per-gesture action definitions, confirmation policy, and
//! the fallback chain that maps a gesture to a configured action. They are
//! pure data -- all runtime behavior (template expansion, value derivation,
//! dispatch) lives in `remotecard-engine`.

pub mod action;
pub mod config;
pub mod interaction;
pub mod scalar;

pub use action::{Action, ActionKind, Confirmation, DataMap, DataValue, Exemption, Target};
pub use config::{Bindings, ElementConfig};
pub use interaction::InteractionKind;
pub use scalar::Scalar;
