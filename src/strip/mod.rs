//! Channel strip state machine
//!
//! Each physical strip is either unbound ([`StripState::Idle`]), bound to
//! an OBS input ([`StripState::Active`]) or showing its config menu
//! ([`StripState::Config`]). The menu carries the state it was opened
//! from so it can always be cancelled.
//!
//! Handlers never await. A local action that needs the remote side
//! returns the [`Request`] to send; the router fires it without holding
//! the strip.

pub mod menu;
mod render;

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::midi::{Button, Direction, RING_MODES};
use crate::obs::{InputCatalog, MixerEvent, MonitorType, RemoteInput, Request};
use crate::state::StripConfig;
use crate::xtouch::fader_curve::position_to_db;
use crate::xtouch::fader_touch::{FaderTouch, TouchStatus};
use crate::xtouch::{Surface, IDLE_LCD_COLOR};

pub use menu::{Candidate, Menu};
pub use render::render_neutral;

/// Ring mode of a freshly created strip
pub const DEFAULT_RING_MODE: usize = 1;

/// Track toggled by the REC button
pub const REC_TRACK: &str = "2";

/// Balance change per encoder detent
const BALANCE_STEP: f64 = 0.1;

/// Binding of an active strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveData {
    pub input_uuid: String,
    pub lcd_color: u8,
}

/// State a config menu returns to when cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedState {
    Idle,
    Active(ActiveData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigData {
    pub menu: Menu,
    pub candidates: Vec<Candidate>,
    pub cursor: usize,
    /// Colour applied when the menu is confirmed
    pub lcd_color: u8,
    pub saved: SavedState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripState {
    Idle,
    Active(ActiveData),
    Config(ConfigData),
}

/// Result of a SELECT press, carried out by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The menu opened
    EnteredConfig,
    /// The strip went back to the state the menu was opened from
    Restored,
    /// The strip was unbound
    Reset,
    /// Bind to this input once any other owner has been evicted
    Bind { uuid: String, lcd_color: u8 },
}

/// One physical strip
#[derive(Debug)]
pub struct ChannelStrip {
    num: u8,
    state: StripState,
    ring_mode: usize,
    fader: FaderTouch,
}

impl ChannelStrip {
    pub fn new(num: u8) -> Self {
        Self {
            num,
            state: StripState::Idle,
            ring_mode: DEFAULT_RING_MODE,
            fader: FaderTouch::new(),
        }
    }

    pub fn num(&self) -> u8 {
        self.num
    }

    pub fn state(&self) -> &StripState {
        &self.state
    }

    pub fn ring_mode(&self) -> usize {
        self.ring_mode
    }

    pub fn is_config(&self) -> bool {
        matches!(self.state, StripState::Config(_))
    }

    /// Input this strip currently owns (Config strips own nothing)
    pub fn bound_uuid(&self) -> Option<&str> {
        match &self.state {
            StripState::Active(data) => Some(&data.input_uuid),
            _ => None,
        }
    }

    /// Persistable view of the strip
    ///
    /// An open menu reports the binding it was opened from, with the
    /// colour currently being picked.
    pub fn layout(&self) -> StripConfig {
        match &self.state {
            StripState::Idle => StripConfig::default(),
            StripState::Active(data) => StripConfig {
                input_uuid: Some(data.input_uuid.clone()),
                lcd_color: data.lcd_color,
            },
            StripState::Config(config) => StripConfig {
                input_uuid: match &config.saved {
                    SavedState::Active(data) => Some(data.input_uuid.clone()),
                    SavedState::Idle => None,
                },
                lcd_color: config.lcd_color,
            },
        }
    }

    /// Unbind and zero the hardware
    pub fn reset(&mut self, surface: &mut Surface) {
        if let StripState::Active(data) = &self.state {
            info!("Strip {} released '{}'", self.num, data.input_uuid);
        }
        self.state = StripState::Idle;
        self.ring_mode = DEFAULT_RING_MODE;
        self.fader.clear();
        self.render(surface, &InputCatalog::new());
    }

    /// Bind to an input (the caller guarantees nobody else owns it)
    pub fn bind(
        &mut self,
        uuid: &str,
        lcd_color: u8,
        surface: &mut Surface,
        catalog: &InputCatalog,
    ) {
        info!("Strip {} bound to '{}'", self.num, uuid);
        self.state = StripState::Active(ActiveData {
            input_uuid: uuid.to_string(),
            lcd_color,
        });
        self.fader.clear();
        self.render(surface, catalog);
    }

    /// Leave the menu for the state it was opened from
    ///
    /// `lcd_color` overrides the saved colour when the saved state is bound.
    /// A saved binding whose input has disappeared ends up Idle.
    pub fn restore(&mut self, surface: &mut Surface, catalog: &InputCatalog, lcd_color: Option<u8>) {
        let StripState::Config(config) = &self.state else {
            return;
        };

        self.state = match &config.saved {
            SavedState::Active(data) if catalog.contains(&data.input_uuid) => {
                StripState::Active(ActiveData {
                    input_uuid: data.input_uuid.clone(),
                    lcd_color: lcd_color.unwrap_or(data.lcd_color),
                })
            }
            SavedState::Active(data) => {
                warn!(
                    "Strip {}: '{}' disappeared while configuring",
                    self.num, data.input_uuid
                );
                StripState::Idle
            }
            SavedState::Idle => StripState::Idle,
        };
        debug!("Strip {} left config", self.num);
        self.render(surface, catalog);
    }

    /// SELECT pressed
    pub fn press_select(&mut self, surface: &mut Surface, catalog: &InputCatalog) -> SelectOutcome {
        let config = match &self.state {
            StripState::Config(config) => config,
            StripState::Idle | StripState::Active(_) => {
                self.enter_config(surface, catalog);
                return SelectOutcome::EnteredConfig;
            }
        };

        let choice = config.candidates.get(config.cursor).cloned();
        let pending_color = config.lcd_color;
        let saved_uuid = match &config.saved {
            SavedState::Active(data) => Some(data.input_uuid.clone()),
            SavedState::Idle => None,
        };

        match choice {
            None | Some(Candidate::Cancel) => {
                self.restore(surface, catalog, None);
                SelectOutcome::Restored
            }
            Some(Candidate::Reset) => {
                self.reset(surface);
                SelectOutcome::Reset
            }
            Some(Candidate::Input { uuid, .. }) if saved_uuid.as_deref() == Some(uuid.as_str()) => {
                self.restore(surface, catalog, Some(pending_color));
                SelectOutcome::Restored
            }
            Some(Candidate::Input { uuid, name }) => {
                if catalog.contains(&uuid) {
                    SelectOutcome::Bind {
                        uuid,
                        lcd_color: pending_color,
                    }
                } else {
                    warn!("Strip {}: '{}' is no longer available", self.num, name);
                    self.reset(surface);
                    SelectOutcome::Reset
                }
            }
        }
    }

    fn enter_config(&mut self, surface: &mut Surface, catalog: &InputCatalog) {
        let (saved, lcd_color) = match &self.state {
            StripState::Active(data) => (SavedState::Active(data.clone()), data.lcd_color),
            _ => (SavedState::Idle, IDLE_LCD_COLOR),
        };

        self.state = StripState::Config(ConfigData {
            menu: Menu::Source,
            candidates: menu::candidates(catalog),
            cursor: 0,
            lcd_color,
            saved,
        });
        debug!("Strip {} entered config", self.num);
        self.render(surface, catalog);
    }

    /// Resolve the bound input, resetting the strip if it vanished
    fn bound_input<'a>(
        &mut self,
        surface: &mut Surface,
        catalog: &'a InputCatalog,
    ) -> Option<&'a RemoteInput> {
        let uuid = self.bound_uuid()?;
        match catalog.get(uuid) {
            Some(input) => Some(input),
            None => {
                warn!("Strip {}: bound input '{}' is gone, resetting", self.num, uuid);
                self.reset(surface);
                None
            }
        }
    }

    /// REC, SOLO, MUTE or encoder push (SELECT goes through [`press_select`](Self::press_select))
    pub fn handle_button(
        &mut self,
        button: Button,
        pressed: bool,
        surface: &mut Surface,
        catalog: &InputCatalog,
    ) -> Option<Request> {
        if !pressed {
            return None;
        }

        if let StripState::Config(config) = &mut self.state {
            if button == Button::Encoder {
                config.menu = config.menu.toggled();
                self.render(surface, catalog);
            }
            return None;
        }

        let input = self.bound_input(surface, catalog)?;

        match button {
            Button::Rec => {
                let mut tracks = std::collections::HashMap::new();
                tracks.insert(REC_TRACK.to_string(), !input.track(REC_TRACK));
                Some(Request::set_input_audio_tracks(&input.uuid, tracks))
            }
            Button::Solo => {
                // Any monitoring at all switches it off
                let next = if input.monitor_type == MonitorType::None {
                    MonitorType::MonitorAndOutput
                } else {
                    MonitorType::None
                };
                Some(Request::set_input_audio_monitor_type(&input.uuid, next))
            }
            Button::Mute => Some(Request::set_input_mute(&input.uuid, !input.muted)),
            Button::Encoder => {
                self.ring_mode = (self.ring_mode + 1) % RING_MODES.len();
                self.render_ring(surface, input);
                None
            }
            Button::Select => None,
        }
    }

    pub fn handle_encoder(
        &mut self,
        direction: Direction,
        surface: &mut Surface,
        catalog: &InputCatalog,
    ) -> Option<Request> {
        if let StripState::Config(config) = &mut self.state {
            match config.menu {
                Menu::Source => {
                    config.cursor =
                        menu::step_cursor(config.cursor, config.candidates.len(), direction.step());
                }
                Menu::Color => {
                    config.lcd_color = menu::step_color(config.lcd_color, direction.step());
                }
            }
            self.render(surface, catalog);
            return None;
        }

        let input = self.bound_input(surface, catalog)?;
        let balance = step_balance(input.balance, direction);
        Some(Request::set_input_audio_balance(&input.uuid, balance))
    }

    pub fn handle_fader(
        &mut self,
        position: u8,
        now: Instant,
        surface: &mut Surface,
        catalog: &InputCatalog,
    ) -> Option<Request> {
        if self.is_config() {
            return None;
        }
        let input = self.bound_input(surface, catalog)?;

        self.fader.touch(now);
        Some(Request::set_input_volume(&input.uuid, position_to_db(position)))
    }

    /// Apply a remote change to the bound input (catalog already updated)
    pub fn apply_remote(
        &mut self,
        event: &MixerEvent,
        now: Instant,
        surface: &mut Surface,
        catalog: &InputCatalog,
    ) {
        let Some(uuid) = self.bound_uuid() else {
            return;
        };
        if event.uuid() != Some(uuid) {
            return;
        }

        if let MixerEvent::Removed { .. } = event {
            info!("Strip {}: bound input removed", self.num);
            self.reset(surface);
            return;
        }

        let Some(input) = catalog.get(uuid) else {
            return;
        };

        match event {
            MixerEvent::BalanceChanged { .. } => self.render_ring(surface, input),
            MixerEvent::TracksChanged { .. } => {
                surface.set_button_led(self.num, Button::Rec, input.track(REC_TRACK))
            }
            MixerEvent::MonitorTypeChanged { .. } => surface.set_button_led(
                self.num,
                Button::Solo,
                input.monitor_type == MonitorType::MonitorAndOutput,
            ),
            MixerEvent::MuteChanged { .. } => {
                surface.set_button_led(self.num, Button::Mute, input.muted)
            }
            MixerEvent::VolumeChanged { .. } => {
                if self.fader.status(now) == TouchStatus::Busy {
                    debug!("Strip {}: fader busy, deferring volume render", self.num);
                } else {
                    self.render_fader(surface, input);
                }
            }
            MixerEvent::NameChanged { .. } => surface.write_text(self.num, 0, &input.name),
            MixerEvent::VolumeMeters(_) | MixerEvent::Created { .. } | MixerEvent::Removed { .. } => {}
        }
    }

    /// Reconciliation tick: one fader render when the touch window closes
    pub fn reconcile(&mut self, now: Instant, surface: &mut Surface, catalog: &InputCatalog) -> bool {
        if self.fader.status(now) != TouchStatus::JustExpired {
            return false;
        }
        let Some(input) = self.bound_uuid().and_then(|uuid| catalog.get(uuid)) else {
            return false;
        };
        self.render_fader(surface, input);
        true
    }
}

/// Balance after one encoder detent, kept on a 0.1 grid inside 0..=1
fn step_balance(balance: f64, direction: Direction) -> f64 {
    let next = balance + BALANCE_STEP * f64::from(direction.step());
    ((next * 10.0).round() / 10.0).clamp(0.0, 1.0)
}
