//! Fader touch debounce
//!
//! Prevents the motorized fader from fighting the user's hand. A local move
//! stamps the timer; while the window is open remote-driven fader renders
//! are suppressed. The first poll after the window closes reports
//! [`TouchStatus::JustExpired`] exactly once so the caller can send one
//! reconciling position.

use std::time::{Duration, Instant};

/// Window after a local fader move during which remote renders are held back
pub const FADER_TOUCH_WINDOW: Duration = Duration::from_millis(800);

/// Debounce state reported by [`FaderTouch::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchStatus {
    /// Never touched, or the last touch has already been reconciled
    Idle,
    /// Touched less than the window ago
    Busy,
    /// The window closed since the last poll (edge, reported once)
    JustExpired,
}

/// Edge-triggered fader touch timer
#[derive(Debug, Clone, Default)]
pub struct FaderTouch {
    touched_at: Option<Instant>,
}

impl FaderTouch {
    /// Create an untouched timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local fader move
    pub fn touch(&mut self, now: Instant) {
        self.touched_at = Some(now);
    }

    /// Forget any pending touch
    pub fn clear(&mut self) {
        self.touched_at = None;
    }

    /// Poll the timer
    ///
    /// Clears the stored timestamp the first time the window is seen closed.
    pub fn status(&mut self, now: Instant) -> TouchStatus {
        let Some(touched_at) = self.touched_at else {
            return TouchStatus::Idle;
        };

        if now.saturating_duration_since(touched_at) < FADER_TOUCH_WINDOW {
            TouchStatus::Busy
        } else {
            self.touched_at = None;
            TouchStatus::JustExpired
        }
    }

    /// Whether a touch is waiting for reconciliation (does not consume the edge)
    pub fn is_pending(&self) -> bool {
        self.touched_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_is_idle() {
        let mut touch = FaderTouch::new();
        assert_eq!(touch.status(Instant::now()), TouchStatus::Idle);
    }

    #[test]
    fn test_busy_inside_window() {
        let t0 = Instant::now();
        let mut touch = FaderTouch::new();
        touch.touch(t0);

        assert_eq!(touch.status(t0), TouchStatus::Busy);
        assert_eq!(touch.status(t0 + Duration::from_millis(799)), TouchStatus::Busy);
    }

    #[test]
    fn test_expiry_fires_once() {
        let t0 = Instant::now();
        let mut touch = FaderTouch::new();
        touch.touch(t0);

        assert_eq!(touch.status(t0 + FADER_TOUCH_WINDOW), TouchStatus::JustExpired);
        assert_eq!(touch.status(t0 + Duration::from_secs(2)), TouchStatus::Idle);
        assert!(!touch.is_pending());
    }

    #[test]
    fn test_new_touch_extends_window() {
        let t0 = Instant::now();
        let mut touch = FaderTouch::new();
        touch.touch(t0);
        touch.touch(t0 + Duration::from_millis(500));

        assert_eq!(touch.status(t0 + Duration::from_millis(900)), TouchStatus::Busy);
        assert_eq!(
            touch.status(t0 + Duration::from_millis(1300)),
            TouchStatus::JustExpired
        );
    }
}
