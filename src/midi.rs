//! Mackie Control wire codec
//!
//! Decodes the 3-byte messages an X-Touch Extender sends into
//! [`SurfaceEvent`]s and encodes every frame we send back (LEDs, encoder
//! rings, motor faders, meters, LCD text and LCD backlight colours).
//! Nothing outside this module should know a status byte.

use std::fmt;
use thiserror::Error;

/// Note On: buttons in, button LEDs out
pub const STATUS_NOTE_ON: u8 = 0x90;
/// Control Change: encoders in, encoder rings out
pub const STATUS_CONTROL_CHANGE: u8 = 0xB0;
/// Channel Pressure: meter levels out
pub const STATUS_CHANNEL_PRESSURE: u8 = 0xD0;
/// Pitch Bend on channel 0..7: one fader per channel
pub const STATUS_PITCH_BEND: u8 = 0xE0;
/// Last pitch bend status used by a strip fader
pub const STATUS_PITCH_BEND_LAST: u8 = 0xE7;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Mackie header followed by the X-Touch Extender device id
pub const MCU_EXTENDER_HEADER: [u8; 4] = [0x00, 0x00, 0x66, 0x15];
/// SysEx command: write LCD characters at an offset
pub const CMD_LCD_TEXT: u8 = 0x12;
/// SysEx command: set every scribble strip backlight colour
pub const CMD_LCD_COLOR: u8 = 0x72;

/// Number of strips addressed by one extender
pub const STRIPS_PER_BANK: u8 = 8;
/// Characters per LCD cell
pub const LCD_CELL_WIDTH: usize = 7;
/// Offset of the lower LCD line
pub const LCD_LINE_STRIDE: u8 = 56;
/// First CC number of the encoder LED rings
pub const RING_CC_BASE: u8 = 48;
/// Encoder raw value with no defined direction
pub const ENCODER_DEAD_VALUE: u8 = 50;
/// Velocity of a pressed button / lit LED
pub const VELOCITY_ON: u8 = 127;

/// Meter scale: dB floor and highest level index
pub const METER_FLOOR_DB: f64 = -60.0;
pub const METER_MAX_LEVEL: u8 = 14;
/// Anything louder than this lights the whole meter
pub const METER_CLIP_DB: f64 = -4.0;

/// Encoder ring display styles as (lowest, highest) CC value
pub const RING_MODES: [(u8, u8); 4] = [(1, 11), (17, 27), (65, 75), (81, 91)];

/// Strip button function, derived from `note / 8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Rec,
    Solo,
    Mute,
    Select,
    /// Push on the rotary encoder
    Encoder,
}

impl Button {
    /// Resolve the function bank of a note number
    pub fn from_bank(bank: u8) -> Option<Self> {
        match bank {
            0 => Some(Button::Rec),
            1 => Some(Button::Solo),
            2 => Some(Button::Mute),
            3 => Some(Button::Select),
            4 => Some(Button::Encoder),
            _ => None,
        }
    }

    /// Note offset of the button LED (the encoder push has no LED)
    pub fn led_offset(self) -> Option<u8> {
        match self {
            Button::Rec => Some(0),
            Button::Solo => Some(8),
            Button::Mute => Some(16),
            Button::Select => Some(24),
            Button::Encoder => None,
        }
    }
}

/// Encoder rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Raw values below 50
    Clockwise,
    /// Raw values above 50
    CounterClockwise,
}

impl Direction {
    /// Step applied to cursors and values
    pub fn step(self) -> i32 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }
}

/// Semantic event decoded from a surface message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Button {
        strip: u8,
        button: Button,
        pressed: bool,
    },
    Encoder {
        strip: u8,
        direction: Direction,
        magnitude: u8,
    },
    Fader {
        strip: u8,
        position: u8,
    },
}

impl SurfaceEvent {
    /// Strip index the event belongs to
    pub fn strip(&self) -> u8 {
        match *self {
            SurfaceEvent::Button { strip, .. }
            | SurfaceEvent::Encoder { strip, .. }
            | SurfaceEvent::Fader { strip, .. } => strip,
        }
    }
}

impl fmt::Display for SurfaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SurfaceEvent::Button { strip, button, pressed } => write!(
                f,
                "strip {} {:?} {}",
                strip,
                button,
                if pressed { "pressed" } else { "released" }
            ),
            SurfaceEvent::Encoder { strip, direction, magnitude } => {
                write!(f, "strip {} encoder {:?} x{}", strip, direction, magnitude)
            }
            SurfaceEvent::Fader { strip, position } => {
                write!(f, "strip {} fader {}", strip, position)
            }
        }
    }
}

/// Reasons an inbound message is discarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("message too short ({0} bytes)")]
    TooShort(usize),
    #[error("unrecognized status byte 0x{0:02X}")]
    UnknownStatus(u8),
    #[error("note {0} is not a strip button")]
    UnknownButton(u8),
    #[error("button velocity {0} is neither press nor release")]
    InvalidVelocity(u8),
    #[error("encoder value 50 has no direction")]
    UndefinedDirection,
}

/// Decode a raw surface message
pub fn decode(data: &[u8]) -> Result<SurfaceEvent, DecodeError> {
    if data.len() < 3 {
        return Err(DecodeError::TooShort(data.len()));
    }
    let (status, data1, data2) = (data[0], data[1], data[2]);

    match status {
        STATUS_NOTE_ON => {
            let button =
                Button::from_bank(data1 / STRIPS_PER_BANK).ok_or(DecodeError::UnknownButton(data1))?;
            let pressed = match data2 {
                VELOCITY_ON => true,
                0 => false,
                other => return Err(DecodeError::InvalidVelocity(other)),
            };
            Ok(SurfaceEvent::Button {
                strip: data1 % STRIPS_PER_BANK,
                button,
                pressed,
            })
        }
        STATUS_CONTROL_CHANGE => {
            let (direction, magnitude) = match data2 {
                raw if raw < ENCODER_DEAD_VALUE => (Direction::Clockwise, raw),
                raw if raw > ENCODER_DEAD_VALUE => (Direction::CounterClockwise, 127u8.saturating_sub(raw)),
                _ => return Err(DecodeError::UndefinedDirection),
            };
            Ok(SurfaceEvent::Encoder {
                strip: data1 % STRIPS_PER_BANK,
                direction,
                magnitude,
            })
        }
        STATUS_PITCH_BEND..=STATUS_PITCH_BEND_LAST => Ok(SurfaceEvent::Fader {
            strip: status - STATUS_PITCH_BEND,
            position: data2 & 0x7F,
        }),
        other => Err(DecodeError::UnknownStatus(other)),
    }
}

/// Encoder LED ring at `offset` within `mode`
pub fn encode_ring(strip: u8, mode: usize, offset: i32) -> Vec<u8> {
    let (low, high) = RING_MODES[mode % RING_MODES.len()];
    let offset = offset.clamp(0, i32::from(high - low)) as u8;
    vec![STATUS_CONTROL_CHANGE, RING_CC_BASE + strip, low + offset]
}

/// Encoder LED ring fully dark
pub fn encode_ring_off(strip: u8) -> Vec<u8> {
    vec![STATUS_CONTROL_CHANGE, RING_CC_BASE + strip, 0]
}

/// Button LED on or off (`None` for buttons without an LED)
pub fn encode_button_led(strip: u8, button: Button, on: bool) -> Option<Vec<u8>> {
    let offset = button.led_offset()?;
    Some(vec![STATUS_NOTE_ON, strip + offset, if on { VELOCITY_ON } else { 0 }])
}

/// Motor fader position
pub fn encode_fader(strip: u8, position: u8) -> Vec<u8> {
    vec![STATUS_PITCH_BEND + strip, 1, position.min(127)]
}

/// Meter level index (0-14) for a gain in dB
pub fn meter_level(db: f64) -> u8 {
    let db = if db > METER_CLIP_DB {
        0.0
    } else {
        db.clamp(METER_FLOOR_DB, 0.0)
    };
    let scaled = (db - METER_FLOOR_DB) * f64::from(METER_MAX_LEVEL) / -METER_FLOOR_DB;
    scaled.round() as u8
}

/// VU meter frame for a gain in dB
pub fn encode_meter(strip: u8, db: f64) -> Vec<u8> {
    vec![STATUS_CHANNEL_PRESSURE, strip * 16 + meter_level(db), 0]
}

/// Average peak of a set of channel levels (`[magnitude, peak, input_peak]`
/// multipliers per channel) in dB, or `None` when silent
pub fn average_peak_db(levels: &[Vec<f64>]) -> Option<f64> {
    let peaks: Vec<f64> = levels.iter().filter_map(|channel| channel.get(1).copied()).collect();
    if peaks.is_empty() {
        return None;
    }
    let average = peaks.iter().sum::<f64>() / peaks.len() as f64;
    if average > 0.0 {
        Some(20.0 * average.log10())
    } else {
        None
    }
}

/// Backlight colour frame carrying one colour per strip, in strip order
pub fn encode_lcd_colors(colors: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(colors.len() + 7);
    frame.push(SYSEX_START);
    frame.extend_from_slice(&MCU_EXTENDER_HEADER);
    frame.push(CMD_LCD_COLOR);
    frame.extend(colors.iter().map(|c| c & 0x7F));
    frame.push(SYSEX_END);
    frame
}

/// LCD cell offset for a strip and line (0 = upper, 1 = lower)
pub fn lcd_offset(strip: u8, line: u8) -> u8 {
    LCD_CELL_WIDTH as u8 * strip + LCD_LINE_STRIDE * line
}

fn lcd_frame(offset: u8, chars: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(chars.len() + 8);
    frame.push(SYSEX_START);
    frame.extend_from_slice(&MCU_EXTENDER_HEADER);
    frame.push(CMD_LCD_TEXT);
    frame.push(offset);
    frame.extend_from_slice(chars);
    frame.push(SYSEX_END);
    frame
}

/// LCD text write for one cell: a blanking frame followed by the text frame
///
/// Some firmware ignores an empty write, so empty text is sent as spaces.
pub fn encode_lcd_text(strip: u8, line: u8, text: &str) -> [Vec<u8>; 2] {
    let offset = lcd_offset(strip, line);
    let blank = [b' '; LCD_CELL_WIDTH];

    let mut chars: Vec<u8> = text
        .chars()
        .take(LCD_CELL_WIDTH)
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    if chars.is_empty() {
        chars.extend_from_slice(&blank);
    }

    [lcd_frame(offset, &blank), lcd_frame(offset, &chars)]
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
