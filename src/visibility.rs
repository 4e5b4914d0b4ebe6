//! Foreground/background notifications for the host page or process.
//!
//! Callbacks only tell the display layer when to redraw. Elapsed time is
//! always recomputed from timestamps, so a missed or duplicated notification
//! cannot change any tracked duration.

use serde::{Deserialize, Serialize};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Foreground,
    Background,
}

type Callback = Box<dyn FnMut() + Send>;

#[derive(Default)]
pub struct VisibilityTracker {
    current: Visibility,
    on_foreground: Vec<Callback>,
    on_background: Vec<Callback>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Visibility {
        self.current
    }

    pub fn on_foreground<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_foreground.push(Box::new(callback));
    }

    pub fn on_background<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_background.push(Box::new(callback));
    }

    /// Feeds a visibility change from the host. Repeated reports of the same
    /// visibility are ignored. Returns whether callbacks ran.
    pub fn set_visibility(&mut self, next: Visibility) -> bool {
        if next == self.current {
            return false;
        }

        log_debug!("visibility changed {:?} -> {:?}", self.current, next);
        self.current = next;

        let callbacks = match next {
            Visibility::Foreground => &mut self.on_foreground,
            Visibility::Background => &mut self.on_background,
        };
        for callback in callbacks.iter_mut() {
            callback();
        }
        true
    }
}

impl std::fmt::Debug for VisibilityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityTracker")
            .field("current", &self.current)
            .field("on_foreground", &self.on_foreground.len())
            .field("on_background", &self.on_background.len())
            .finish()
    }
}
