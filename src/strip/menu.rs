//! Config menu of a strip: source picker and backlight colour picker

use crate::obs::InputCatalog;

/// Backlight colours selectable from the menu (index 1..=8)
const COLOR_NAMES: [&str; 8] = [
    "RED", "GREEN", "YELLOW", "BLUE", "MAGENTA", "CYAN", "WHITE", "BLACK",
];

pub const MIN_COLOR: u8 = 1;
pub const MAX_COLOR: u8 = 8;

/// Page of the config menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Source,
    Color,
}

impl Menu {
    pub fn toggled(self) -> Self {
        match self {
            Menu::Source => Menu::Color,
            Menu::Color => Menu::Source,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Menu::Source => "SOURCE",
            Menu::Color => "COLOR",
        }
    }
}

/// Entry of the source list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Cancel,
    Reset,
    Input { uuid: String, name: String },
}

impl Candidate {
    pub fn label(&self) -> &str {
        match self {
            Candidate::Cancel => "CANCEL",
            Candidate::Reset => "RESET",
            Candidate::Input { name, .. } => name,
        }
    }
}

/// Source list frozen when the menu opens
pub fn candidates(catalog: &InputCatalog) -> Vec<Candidate> {
    let mut list = vec![Candidate::Cancel, Candidate::Reset];
    list.extend(catalog.audio_inputs().into_iter().map(|input| Candidate::Input {
        uuid: input.uuid.clone(),
        name: input.name.clone(),
    }));
    list
}

/// Move a cursor over `len` entries with wraparound
pub fn step_cursor(cursor: usize, len: usize, step: i32) -> usize {
    if len == 0 {
        return 0;
    }
    (cursor as i64 + i64::from(step)).rem_euclid(len as i64) as usize
}

/// Next colour index, cycling through 1..=8
pub fn step_color(color: u8, step: i32) -> u8 {
    let span = i32::from(MAX_COLOR - MIN_COLOR + 1);
    let zero_based = i32::from(color.clamp(MIN_COLOR, MAX_COLOR) - MIN_COLOR);
    (zero_based + step).rem_euclid(span) as u8 + MIN_COLOR
}

pub fn color_name(color: u8) -> &'static str {
    color
        .checked_sub(MIN_COLOR)
        .and_then(|i| COLOR_NAMES.get(i as usize))
        .copied()
        .unwrap_or("?")
}
