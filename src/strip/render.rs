//! Surface rendering of a strip

use super::menu::{self, Menu};
use super::{ChannelStrip, StripState, REC_TRACK};
use crate::midi::Button;
use crate::obs::{InputCatalog, MonitorType, RemoteInput};
use crate::xtouch::fader_curve::db_to_position;
use crate::xtouch::{Surface, IDLE_LCD_COLOR};

impl ChannelStrip {
    /// Redraw everything the strip owns on the surface
    ///
    /// The fader is left alone while a local touch is pending; the
    /// reconciliation tick moves it once the window closes.
    pub fn render(&self, surface: &mut Surface, catalog: &InputCatalog) {
        match &self.state {
            StripState::Idle => render_neutral(self.num, surface),
            StripState::Active(data) => {
                let Some(input) = catalog.get(&data.input_uuid) else {
                    render_neutral(self.num, surface);
                    return;
                };
                surface.set_lcd_color(self.num, data.lcd_color);
                surface.write_text(self.num, 0, &input.name);
                surface.write_text(self.num, 1, "");
                surface.set_button_led(self.num, Button::Rec, input.track(REC_TRACK));
                surface.set_button_led(
                    self.num,
                    Button::Solo,
                    input.monitor_type == MonitorType::MonitorAndOutput,
                );
                surface.set_button_led(self.num, Button::Mute, input.muted);
                surface.set_button_led(self.num, Button::Select, false);
                self.render_ring(surface, input);
                if !self.fader.is_pending() {
                    self.render_fader(surface, input);
                }
            }
            StripState::Config(config) => {
                surface.set_lcd_color(self.num, config.lcd_color);
                surface.write_text(self.num, 0, config.menu.title());
                let detail = match config.menu {
                    Menu::Source => config
                        .candidates
                        .get(config.cursor)
                        .map(|c| c.label())
                        .unwrap_or(""),
                    Menu::Color => menu::color_name(config.lcd_color),
                };
                surface.write_text(self.num, 1, detail);
                surface.set_button_led(self.num, Button::Rec, false);
                surface.set_button_led(self.num, Button::Solo, false);
                surface.set_button_led(self.num, Button::Mute, false);
                surface.set_button_led(self.num, Button::Select, true);
                surface.ring_off(self.num);
            }
        }
    }

    /// Balance on the encoder ring, 0..=10 steps in the current mode
    pub(super) fn render_ring(&self, surface: &mut Surface, input: &RemoteInput) {
        let offset = (input.balance * 10.0).round() as i32;
        surface.set_ring(self.num, self.ring_mode, offset);
    }

    pub(super) fn render_fader(&self, surface: &mut Surface, input: &RemoteInput) {
        surface.set_fader(self.num, db_to_position(input.volume_db));
    }
}

/// LEDs off, fader down, LCD blank and white
pub fn render_neutral(strip: u8, surface: &mut Surface) {
    surface.set_lcd_color(strip, IDLE_LCD_COLOR);
    surface.write_text(strip, 0, "");
    surface.write_text(strip, 1, "");
    for button in [Button::Rec, Button::Solo, Button::Mute, Button::Select] {
        surface.set_button_led(strip, button, false);
    }
    surface.ring_off(strip);
    surface.set_fader(strip, 0);
}
