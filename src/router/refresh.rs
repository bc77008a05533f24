//! Fader reconciliation and full redraws

use std::time::Instant;
use tracing::{debug, trace};

use super::Router;
use crate::strip::render_neutral;

impl Router {
    /// Reconciliation tick
    ///
    /// Every strip whose touch window just closed gets one fader render
    /// with the latest known volume.
    pub fn reconcile(&mut self, now: Instant) {
        for strip in &mut self.strips {
            if strip.reconcile(now, &mut self.surface, &self.catalog) {
                trace!("Strip {} fader reconciled", strip.num());
            }
        }
    }

    /// Redraw every strip from its state
    pub fn render_all(&mut self) {
        for strip in &self.strips {
            strip.render(&mut self.surface, &self.catalog);
        }
    }

    /// Neutral hardware on every strip; strip states are kept
    pub fn teardown(&mut self) {
        debug!("Resetting surface to neutral");
        for num in 0..self.strips.len() as u8 {
            render_neutral(num, &mut self.surface);
        }
    }
}
