//! Toast notifications.
//!
//! One error slot and one success slot. Showing a toast mounts it at once,
//! makes it visible after a short enter delay, and hides it again after its
//! duration; hiding keeps it mounted for the leave transition before
//! unmounting. Time comes from the injected [`Clock`]; hosts call
//! [`Toasts::tick`] from their event loop to apply due transitions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::config::NotificationsConfig;

pub const DEFAULT_ERROR_DURATION: Duration = Duration::from_millis(5000);
pub const DEFAULT_SUCCESS_DURATION: Duration = Duration::from_millis(3000);
/// Delay between mounting and the enter transition.
pub const ENTER_DELAY: Duration = Duration::from_millis(10);
/// Length of the leave transition before unmount.
pub const LEAVE_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    Error,
    Success,
}

/// What a renderer needs to draw one toast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    /// Mounted in the view.
    pub shown: bool,
    /// Entered (drives the CSS transition).
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Transition {
    Reveal,
    Hide,
    Unmount,
}

#[derive(Debug, Default)]
struct Slot {
    toast: Toast,
    reveal_at: Option<DateTime<Utc>>,
    hide_at: Option<DateTime<Utc>>,
    unmount_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn show(&mut self, message: String, now: DateTime<Utc>, duration: Duration) {
        self.toast.message = message;
        self.toast.shown = true;
        self.reveal_at = Some(after(now, ENTER_DELAY));
        self.hide_at = Some(after(now, duration));
        // A re-shown toast must not be unmounted by an earlier hide.
        self.unmount_at = None;
    }

    fn hide(&mut self, now: DateTime<Utc>) {
        self.toast.visible = false;
        self.unmount_at = Some(after(now, LEAVE_DURATION));
        self.hide_at = None;
    }

    fn deadlines(&self) -> impl Iterator<Item = (DateTime<Utc>, Transition)> {
        [
            self.reveal_at.map(|at| (at, Transition::Reveal)),
            self.hide_at.map(|at| (at, Transition::Hide)),
            self.unmount_at.map(|at| (at, Transition::Unmount)),
        ]
        .into_iter()
        .flatten()
    }

    fn next_due(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, Transition)> {
        self.deadlines().filter(|(at, _)| *at <= now).min()
    }

    fn tick(&mut self, now: DateTime<Utc>) {
        while let Some((at, transition)) = self.next_due(now) {
            match transition {
                Transition::Reveal => {
                    self.reveal_at = None;
                    self.toast.visible = true;
                }
                Transition::Hide => self.hide(at),
                Transition::Unmount => {
                    self.unmount_at = None;
                    self.toast.shown = false;
                }
            }
        }
    }
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Toast state for the whole app. Construct once and pass by reference.
pub struct Toasts {
    clock: Arc<dyn Clock>,
    error: Slot,
    success: Slot,
    error_duration: Duration,
    success_duration: Duration,
}

impl Toasts {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            error: Slot::default(),
            success: Slot::default(),
            error_duration: DEFAULT_ERROR_DURATION,
            success_duration: DEFAULT_SUCCESS_DURATION,
        }
    }

    /// Uses the durations from the `[notifications]` config section.
    pub fn from_config(clock: Arc<dyn Clock>, config: &NotificationsConfig) -> Self {
        Self::new(clock).with_durations(config.error_duration(), config.success_duration())
    }

    /// Overrides the default display durations.
    #[must_use]
    pub fn with_durations(mut self, error: Duration, success: Duration) -> Self {
        self.error_duration = error;
        self.success_duration = success;
        self
    }

    pub fn show(&mut self, kind: ToastKind, message: impl Into<String>, duration: Duration) {
        let now = self.clock.now();
        debug!(?kind, ?duration, "Showing toast");
        self.slot_mut(kind).show(message.into(), now, duration);
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.show(ToastKind::Error, message, self.error_duration);
    }

    pub fn show_success(&mut self, message: impl Into<String>) {
        self.show(ToastKind::Success, message, self.success_duration);
    }

    /// Starts the leave transition and cancels the auto-hide.
    pub fn hide(&mut self, kind: ToastKind) {
        let now = self.clock.now();
        self.slot_mut(kind).hide(now);
    }

    pub fn hide_error(&mut self) {
        self.hide(ToastKind::Error);
    }

    pub fn hide_success(&mut self) {
        self.hide(ToastKind::Success);
    }

    pub fn clear_all(&mut self) {
        self.hide_error();
        self.hide_success();
    }

    /// Cancels pending auto-hides (on unmount of the owning view).
    pub fn cleanup(&mut self) {
        self.error.hide_at = None;
        self.success.hide_at = None;
    }

    /// Applies every transition due at the clock's current time.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.error.tick(now);
        self.success.tick(now);
    }

    /// When the next transition is due, if any. Hosts can sleep until then.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.error
            .deadlines()
            .chain(self.success.deadlines())
            .map(|(at, _)| at)
            .min()
    }

    pub fn toast(&self, kind: ToastKind) -> &Toast {
        match kind {
            ToastKind::Error => &self.error.toast,
            ToastKind::Success => &self.success.toast,
        }
    }

    pub fn error(&self) -> &Toast {
        self.toast(ToastKind::Error)
    }

    pub fn success(&self) -> &Toast {
        self.toast(ToastKind::Success)
    }

    fn slot_mut(&mut self, kind: ToastKind) -> &mut Slot {
        match kind {
            ToastKind::Error => &mut self.error,
            ToastKind::Success => &mut self.success,
        }
    }
}
