//! Surface input dispatch

use std::time::Instant;
use tracing::{debug, trace};

use super::Router;
use crate::midi::{self, Button, SurfaceEvent};
use crate::obs::Request;
use crate::strip::SelectOutcome;

impl Router {
    /// Handle one raw message from the surface
    ///
    /// Returns the OBS request the action needs, if any. Bindings are
    /// settled before this returns.
    pub fn handle_midi(&mut self, data: &[u8], now: Instant) -> Option<Request> {
        let event = match midi::decode(data) {
            Ok(event) => event,
            Err(e) => {
                debug!("Discarding surface message {}: {}", midi::format_hex(data), e);
                return None;
            }
        };

        let num = event.strip();
        if num as usize >= self.strips.len() {
            debug!("Discarding {}: only {} strips configured", event, self.strips.len());
            return None;
        }
        trace!("← {}", event);

        let idx = num as usize;
        let request = match event {
            SurfaceEvent::Button {
                button: Button::Select,
                pressed,
                ..
            } => {
                if pressed {
                    self.handle_select(num);
                }
                None
            }
            SurfaceEvent::Button { button, pressed, .. } => {
                self.strips[idx].handle_button(button, pressed, &mut self.surface, &self.catalog)
            }
            SurfaceEvent::Encoder { direction, .. } => {
                self.strips[idx].handle_encoder(direction, &mut self.surface, &self.catalog)
            }
            SurfaceEvent::Fader { position, .. } => {
                self.strips[idx].handle_fader(position, now, &mut self.surface, &self.catalog)
            }
        };

        self.reindex_strip(num);
        self.publish_layout();
        request
    }

    /// SELECT on strip `num`
    fn handle_select(&mut self, num: u8) {
        if !self.strips[num as usize].is_config() {
            // Only one menu open at a time
            for other in 0..self.strips.len() as u8 {
                if other != num && self.strips[other as usize].is_config() {
                    debug!("Closing menu of strip {}", other);
                    self.strips[other as usize].restore(&mut self.surface, &self.catalog, None);
                    self.reindex_strip(other);
                }
            }
        }

        let outcome = self.strips[num as usize].press_select(&mut self.surface, &self.catalog);
        if let SelectOutcome::Bind { uuid, lcd_color } = outcome {
            self.bind(num, &uuid, lcd_color);
        }
    }
}
