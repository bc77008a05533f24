//! Outbound surface rendering
//!
//! [`Surface`] turns strip-level drawing calls into wire frames and hands
//! them to a [`MidiSink`]. It keeps the backlight colour of every cell,
//! because the colour SysEx always carries all eight strips.

use std::sync::Arc;

use tracing::trace;

use crate::midi::{self, Button, STRIPS_PER_BANK};

/// Backlight colour of an unbound cell (white)
pub const IDLE_LCD_COLOR: u8 = 7;

/// Destination for encoded frames
///
/// Implementations must not block the caller; the hardware writer queues
/// frames for a background thread.
pub trait MidiSink: Send + Sync {
    fn send(&self, data: Vec<u8>);
}

/// Renderer for one extender
pub struct Surface {
    sink: Arc<dyn MidiSink>,
    lcd_colors: [u8; STRIPS_PER_BANK as usize],
}

impl Surface {
    pub fn new(sink: Arc<dyn MidiSink>) -> Self {
        Self {
            sink,
            lcd_colors: [IDLE_LCD_COLOR; STRIPS_PER_BANK as usize],
        }
    }

    fn send(&self, data: Vec<u8>) {
        trace!("→ surface: {}", midi::format_hex(&data));
        self.sink.send(data);
    }

    /// Current backlight colour of a cell
    pub fn lcd_color(&self, strip: u8) -> u8 {
        self.lcd_colors
            .get(strip as usize)
            .copied()
            .unwrap_or(IDLE_LCD_COLOR)
    }

    /// Change one backlight colour and retransmit the whole row
    pub fn set_lcd_color(&mut self, strip: u8, color: u8) {
        if let Some(slot) = self.lcd_colors.get_mut(strip as usize) {
            *slot = color;
        }
        self.send(midi::encode_lcd_colors(&self.lcd_colors));
    }

    /// Write one LCD line of a strip (0 = upper, 1 = lower)
    pub fn write_text(&self, strip: u8, line: u8, text: &str) {
        let [blank, text] = midi::encode_lcd_text(strip, line.min(1), text);
        self.send(blank);
        self.send(text);
    }

    pub fn set_ring(&self, strip: u8, mode: usize, offset: i32) {
        self.send(midi::encode_ring(strip, mode, offset));
    }

    pub fn ring_off(&self, strip: u8) {
        self.send(midi::encode_ring_off(strip));
    }

    pub fn set_button_led(&self, strip: u8, button: Button, on: bool) {
        if let Some(frame) = midi::encode_button_led(strip, button, on) {
            self.send(frame);
        }
    }

    pub fn set_fader(&self, strip: u8, position: u8) {
        self.send(midi::encode_fader(strip, position));
    }

    pub fn set_meter(&self, strip: u8, db: f64) {
        self.send(midi::encode_meter(strip, db));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that keeps every frame for inspection
    #[derive(Default)]
    pub struct RecordingSink {
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Take all frames recorded so far
        pub fn take(&self) -> Vec<Vec<u8>> {
            std::mem::take(&mut *self.frames.lock())
        }

        /// Fader frames recorded so far, without consuming anything
        pub fn fader_frames(&self) -> Vec<Vec<u8>> {
            self.frames
                .lock()
                .iter()
                .filter(|f| (0xE0..=0xE7).contains(&f[0]))
                .cloned()
                .collect()
        }
    }

    impl MidiSink for RecordingSink {
        fn send(&self, data: Vec<u8>) {
            self.frames.lock().push(data);
        }
    }

    pub fn recording_surface() -> (Surface, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        (Surface::new(sink.clone()), sink)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::recording_surface;
    use super::*;

    #[test]
    fn test_color_change_resends_all_cells() {
        let (mut surface, sink) = recording_surface();
        surface.set_lcd_color(2, 4);
        surface.set_lcd_color(5, 1);

        let frames = sink.take();
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[1][6..14], &[7, 7, 4, 7, 7, 1, 7, 7]);
        assert_eq!(surface.lcd_color(2), 4);
        assert_eq!(surface.lcd_color(9), IDLE_LCD_COLOR);
    }

    #[test]
    fn test_text_is_blanked_first() {
        let (surface, sink) = recording_surface();
        surface.write_text(0, 0, "Mic");

        let frames = sink.take();
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][7..14], &[b' '; 7]);
        assert_eq!(&frames[1][7..10], b"Mic");
    }
}
