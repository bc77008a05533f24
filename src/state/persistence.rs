//! Persisted strip layout
//!
//! Only the binding and backlight colour of every strip survive a
//! restart; the audio state itself always comes from OBS.

use serde::{Deserialize, Serialize};

use crate::xtouch::IDLE_LCD_COLOR;

fn default_lcd_color() -> u8 {
    IDLE_LCD_COLOR
}

/// Saved configuration of one strip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripConfig {
    /// uuid of the bound OBS input, `None` when the strip is idle
    #[serde(default)]
    pub input_uuid: Option<String>,
    #[serde(default = "default_lcd_color")]
    pub lcd_color: u8,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            input_uuid: None,
            lcd_color: IDLE_LCD_COLOR,
        }
    }
}

/// Layout snapshot for JSON serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    /// Version of the snapshot format
    pub version: String,
    /// Timestamp of snapshot creation (milliseconds since epoch)
    pub timestamp: u64,
    /// One entry per strip, in strip order
    #[serde(default)]
    pub strips: Vec<StripConfig>,
}

impl LayoutSnapshot {
    /// Current snapshot format version
    pub const VERSION: &'static str = "1.0.0";

    pub fn new(strips: Vec<StripConfig>) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
            strips,
        }
    }

    /// Layout with every strip idle
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Entry for a strip, idle when the snapshot has none
    pub fn strip(&self, num: usize) -> StripConfig {
        self.strips.get(num).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let snapshot: LayoutSnapshot = serde_json::from_str(
            r#"{"version":"1.0.0","timestamp":1,"strips":[{"input_uuid":"u1"},{}]}"#,
        )
        .unwrap();

        assert_eq!(snapshot.strips[0].input_uuid.as_deref(), Some("u1"));
        assert_eq!(snapshot.strips[0].lcd_color, IDLE_LCD_COLOR);
        assert_eq!(snapshot.strips[1], StripConfig::default());
        assert_eq!(snapshot.strip(7), StripConfig::default());
    }

    #[test]
    fn test_new_snapshot_is_stamped() {
        let snapshot = LayoutSnapshot::new(vec![StripConfig::default()]);
        assert_eq!(snapshot.version, LayoutSnapshot::VERSION);
        assert!(snapshot.timestamp > 0);
    }
}
