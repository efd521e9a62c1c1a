//! Value derivation: computing an element's live scalar from backend state.
//!
//! Derivation itself is a pure function of (store, clock, entity,
//! attribute) so the time-extrapolated paths are testable without timers.
//! Two attribute kinds carry temporal semantics: `media_position` is
//! extrapolated from its last-updated timestamp while the media is
//! playing, and `elapsed` counts a timer entity up against its
//! `finishes_at` deadline while active. Both request a 500 ms periodic
//! recompute, owned by [`ValueTracker`] through a cancellable
//! [`RefreshTimer`] -- at most one live timer per element, cancelled
//! before every new derivation and on teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remotecard_model::Scalar;

use crate::state::{parse_timestamp, Clock, EntityState, SharedClock, SharedStore, StateStore};

/// Recompute period for extrapolating derivations.
pub const REFRESH_PERIOD: Duration = Duration::from_millis(500);

// ──────────────────────────────────────────────
// Derivation
// ──────────────────────────────────────────────

/// Whether a derived value needs periodic recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    None,
    Periodic(Duration),
}

/// Result of one derivation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub value: Option<Scalar>,
    pub refresh: Refresh,
}

impl Derivation {
    fn none() -> Self {
        Derivation {
            value: None,
            refresh: Refresh::None,
        }
    }

    fn steady(value: Option<Scalar>) -> Self {
        Derivation {
            value,
            refresh: Refresh::None,
        }
    }
}

/// Failures inside a temporal derivation. Never escape [`derive_value`];
/// they degrade to the raw value or zero and are logged.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("attribute '{attribute}' is missing")]
    Missing { attribute: &'static str },
    #[error("attribute '{attribute}' is not numeric")]
    NotNumeric { attribute: &'static str },
    #[error("attribute '{attribute}' is not a parseable timestamp")]
    BadTimestamp { attribute: &'static str },
    #[error("attribute '{attribute}' is not an H:M:S duration")]
    BadDuration { attribute: &'static str },
}

// ──────────────────────────────────────────────
// Derivation logic
// ──────────────────────────────────────────────

/// Compute the element's current observable value.
///
/// Resolution order: no bound entity or unknown entity means undefined;
/// attribute `state` reads the state string; otherwise the named attribute
/// is read, with an optional `[n]` index suffix selecting from a
/// list-typed attribute; per-attribute post-processing then applies.
pub fn derive_value(
    store: &dyn StateStore,
    clock: &dyn Clock,
    entity_id: Option<&str>,
    attribute: &str,
) -> Derivation {
    let entity_id = match entity_id {
        Some(id) if !id.is_empty() => id,
        _ => return Derivation::none(),
    };
    let snapshot = match store.get(entity_id) {
        Some(snapshot) => snapshot,
        None => return Derivation::none(),
    };

    let attribute = attribute.to_lowercase();
    if attribute == "state" {
        return Derivation::steady(Some(Scalar::Text(snapshot.state.clone())));
    }

    let (name, index) = split_index(&attribute);
    let raw = match (snapshot.attribute(name), index) {
        (Some(serde_json::Value::Array(items)), Some(i)) => items.get(i).cloned(),
        (Some(value), None) => Some(value.clone()),
        // Index suffix on a non-list attribute, or attribute absent.
        _ => None,
    };

    // A missing attribute is undefined, except `elapsed` which derives
    // from the timer's duration/finishes_at attributes instead.
    if raw.is_none() && name != "elapsed" {
        return Derivation::none();
    }

    match name {
        "brightness" => brightness(raw),
        "media_position" => media_position(&snapshot, raw, clock),
        "elapsed" if entity_id.starts_with("timer.") => timer_elapsed(&snapshot, clock),
        _ => Derivation::steady(raw.as_ref().and_then(Scalar::from_json)),
    }
}

/// Split a trailing `[n]` index suffix off an attribute name.
fn split_index(attribute: &str) -> (&str, Option<usize>) {
    if let Some(stripped) = attribute.strip_suffix(']') {
        if let Some(open) = stripped.rfind('[') {
            if let Ok(index) = stripped[open + 1..].parse::<usize>() {
                return (&attribute[..open], Some(index));
            }
        }
    }
    (attribute, None)
}

/// Scale 0-255 brightness to 0-100, rounded. Non-numeric values pass
/// through unmodified.
fn brightness(raw: Option<serde_json::Value>) -> Derivation {
    let scalar = raw.as_ref().and_then(Scalar::from_json);
    match scalar.as_ref().and_then(Scalar::as_number) {
        Some(n) => Derivation::steady(Some(Scalar::Number((100.0 * n / 255.0).round()))),
        None => Derivation::steady(scalar),
    }
}

/// Playback position with wall-clock extrapolation while playing.
fn media_position(snapshot: &EntityState, raw: Option<serde_json::Value>, clock: &dyn Clock) -> Derivation {
    let raw_scalar = raw.as_ref().and_then(Scalar::from_json);
    if snapshot.state != "playing" {
        return Derivation::steady(raw_scalar);
    }
    match extrapolate_position(snapshot, raw_scalar.as_ref(), clock) {
        Ok(position) => Derivation {
            value: Some(Scalar::Number(position)),
            refresh: Refresh::Periodic(REFRESH_PERIOD),
        },
        Err(err) => {
            log::error!("media position extrapolation failed: {}", err);
            Derivation::steady(raw_scalar)
        }
    }
}

fn extrapolate_position(
    snapshot: &EntityState,
    raw: Option<&Scalar>,
    clock: &dyn Clock,
) -> Result<f64, ValueError> {
    let base = raw
        .and_then(Scalar::as_number)
        .ok_or(ValueError::NotNumeric {
            attribute: "media_position",
        })?;
    let updated_at = snapshot
        .attribute("media_position_updated_at")
        .and_then(|v| v.as_str())
        .ok_or(ValueError::Missing {
            attribute: "media_position_updated_at",
        })
        .and_then(|s| {
            parse_timestamp(s).ok_or(ValueError::BadTimestamp {
                attribute: "media_position_updated_at",
            })
        })?;
    let duration = snapshot
        .attribute("media_duration")
        .and_then(Scalar::from_json)
        .as_ref()
        .and_then(Scalar::as_number)
        .ok_or(ValueError::NotNumeric {
            attribute: "media_duration",
        })?;

    let elapsed = (clock.now() - updated_at).as_seconds_f64();
    Ok((base.floor() + elapsed).floor().min(duration.floor()))
}

/// Elapsed time of a timer entity, counted against its configured
/// duration. Idle timers read 0; active timers extrapolate from
/// `finishes_at`; paused timers derive from the `remaining` attribute with
/// no periodic refresh; any failure degrades to 0.
fn timer_elapsed(snapshot: &EntityState, clock: &dyn Clock) -> Derivation {
    if snapshot.state == "idle" {
        return Derivation::steady(Some(Scalar::Number(0.0)));
    }
    match timer_elapsed_inner(snapshot, clock) {
        Ok((value, refresh)) => Derivation {
            value: Some(Scalar::Number(value)),
            refresh,
        },
        Err(err) => {
            log::error!("timer elapsed derivation failed: {}", err);
            Derivation::steady(Some(Scalar::Number(0.0)))
        }
    }
}

fn timer_elapsed_inner(
    snapshot: &EntityState,
    clock: &dyn Clock,
) -> Result<(f64, Refresh), ValueError> {
    let duration = hms_attribute(snapshot, "duration")?;

    if snapshot.state == "active" {
        let finishes_at = snapshot
            .attribute("finishes_at")
            .and_then(|v| v.as_str())
            .ok_or(ValueError::Missing {
                attribute: "finishes_at",
            })
            .and_then(|s| {
                parse_timestamp(s).ok_or(ValueError::BadTimestamp {
                    attribute: "finishes_at",
                })
            })?;
        let remaining = (finishes_at - clock.now()).as_seconds_f64();
        let value = (duration as f64 - remaining).floor().min(duration as f64);
        Ok((value, Refresh::Periodic(REFRESH_PERIOD)))
    } else {
        let remaining = hms_attribute(snapshot, "remaining")?;
        Ok(((duration - remaining) as f64, Refresh::None))
    }
}

fn hms_attribute(snapshot: &EntityState, attribute: &'static str) -> Result<i64, ValueError> {
    let raw = snapshot
        .attribute(attribute)
        .and_then(|v| v.as_str())
        .ok_or(ValueError::Missing { attribute })?;
    parse_hms(raw).ok_or(ValueError::BadDuration { attribute })
}

/// Parse an `H:M:S` duration string to seconds.
fn parse_hms(s: &str) -> Option<i64> {
    let mut parts = s.split(':');
    let hours = parts.next()?.trim().parse::<i64>().ok()?;
    let minutes = parts.next()?.trim().parse::<i64>().ok()?;
    let seconds = parts.next()?.trim().parse::<i64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

// ──────────────────────────────────────────────
// RefreshTimer
// ──────────────────────────────────────────────

/// A cancellable periodic task handle. Starting cancels any previous task;
/// dropping cancels the current one. Never more than one live task per
/// timer.
#[derive(Debug, Default)]
pub struct RefreshTimer {
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl RefreshTimer {
    /// Start a periodic task, cancelling any previous one. The tick
    /// callback returns whether to keep going; returning `false` ends the
    /// task.
    pub fn start<F>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.stop();
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of a tokio interval completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if !tick() {
                    break;
                }
            }
        }));
    }

    /// Run a one-shot callback after a delay, cancelling any previous
    /// task.
    pub fn start_once<F>(&mut self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }));
    }

    /// Abort the current task, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ──────────────────────────────────────────────
// ValueTracker
// ──────────────────────────────────────────────

/// Owns an element's derived value and its single refresh timer.
///
/// `apply` cancels any previous timer before deriving (at most one timer
/// alive per element), stores the new value, and installs a periodic
/// recompute when the derivation asks for one. The periodic task re-reads
/// the store on every tick and stops itself as soon as a recompute no
/// longer requests a refresh (entity left the active state).
#[derive(Debug)]
pub struct ValueTracker {
    value: Arc<Mutex<Option<Scalar>>>,
    tracking: Arc<AtomicBool>,
    refresh: RefreshTimer,
    resume: RefreshTimer,
}

impl Default for ValueTracker {
    fn default() -> Self {
        ValueTracker {
            value: Arc::new(Mutex::new(None)),
            tracking: Arc::new(AtomicBool::new(true)),
            refresh: RefreshTimer::default(),
            resume: RefreshTimer::default(),
        }
    }
}

impl ValueTracker {
    pub fn new() -> Self {
        ValueTracker::default()
    }

    pub fn value(&self) -> Option<Scalar> {
        self.value.lock().unwrap().clone()
    }

    /// Override the value directly, e.g. while a slider drag is in flight.
    pub fn set_value(&self, value: Option<Scalar>) {
        *self.value.lock().unwrap() = value;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Relaxed)
    }

    /// True while a periodic recompute task is alive.
    pub fn has_live_refresh(&self) -> bool {
        self.refresh.is_running()
    }

    /// Recompute the derived value from fresh state. No-op while tracking
    /// is suspended.
    pub fn apply(
        &mut self,
        store: &SharedStore,
        clock: &SharedClock,
        entity_id: Option<&str>,
        attribute: &str,
    ) {
        self.refresh.stop();
        if !self.tracking.load(Ordering::Relaxed) {
            return;
        }

        let derivation = derive_value(store.as_ref(), clock.as_ref(), entity_id, attribute);
        *self.value.lock().unwrap() = derivation.value;

        if let Refresh::Periodic(period) = derivation.refresh {
            let entity = match entity_id {
                Some(id) => id.to_string(),
                None => return,
            };
            let attribute = attribute.to_string();
            let store = Arc::clone(store);
            let clock = Arc::clone(clock);
            let slot = Arc::clone(&self.value);
            let tracking = Arc::clone(&self.tracking);
            self.refresh.start(period, move || {
                if !tracking.load(Ordering::Relaxed) {
                    return false;
                }
                let derivation =
                    derive_value(store.as_ref(), clock.as_ref(), Some(&entity), &attribute);
                *slot.lock().unwrap() = derivation.value;
                matches!(derivation.refresh, Refresh::Periodic(_))
            });
        }
    }

    /// Pause store-driven recomputation for a while, re-enabling it after
    /// the delay. A second suspension resets the delay.
    pub fn suspend_tracking(&mut self, duration: Duration) {
        self.tracking.store(false, Ordering::Relaxed);
        self.refresh.stop();
        let tracking = Arc::clone(&self.tracking);
        self.resume
            .start_once(duration, move || tracking.store(true, Ordering::Relaxed));
    }

    /// Cancel all timers. Called on teardown.
    pub fn stop(&mut self) {
        self.refresh.stop();
        self.resume.stop();
    }
}
