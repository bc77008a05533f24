//! Fader taper - position <-> dB conversion
//!
//! Maps the 7-bit motor fader position onto gain in dB using the piecewise
//! taper of a Behringer X32 channel fader. Both directions share the same
//! constants so that OBS and the surface agree on what a position means.
//!
//! ```text
//!   +10 dB ┤                        ___  (saturates)
//!     0 dB ┤                 ___---
//!   -10 dB ┤          ___---          2.5 dB / section
//!   -30 dB ┤    ___---                5 dB / section
//!   -60 dB ┤ _--                      10 dB / section
//!  -100 dB ┤|                         silence
//!          0 ........................ 127
//! ```

/// Full travel of the fader in MIDI units
pub const FADER_RANGE: f64 = 127.0;

/// Physical middle of the fader travel
const FADER_MID: f64 = FADER_RANGE / 2.0;

/// The X32 faders don't quite register the limits of their physical travel
const FADER_SCALE: f64 = 0.90;

/// Three quarters of the travel sit below 0 dB
const UNITY_POINT: f64 = FADER_RANGE * 0.75;

/// The travel is split into 16 sections
const SECTION: f64 = FADER_RANGE / 16.0;

/// Highest reachable gain
pub const MAX_DB: f64 = 10.0;

/// Anything at or below this is reported as silence
const FLOOR_DB: f64 = -60.0;

/// Gain value OBS treats as -inf
pub const SILENCE_DB: f64 = -100.0;

/// Highest fader position
pub const MAX_POSITION: u8 = 127;

/// Convert a fader position (0-127) to a gain in dB
pub fn position_to_db(position: u8) -> f64 {
    let deflection = (f64::from(position.min(MAX_POSITION)) - FADER_MID) * FADER_SCALE + FADER_MID;
    let section = (deflection - UNITY_POINT) / SECTION;

    if section >= 4.0 {
        MAX_DB
    } else if section >= -4.0 {
        section * 2.5
    } else if section >= -8.0 {
        (section + 4.0) * 5.0 - 10.0
    } else {
        let db = (section + 8.0) * 10.0 - 30.0;
        if db <= FLOOR_DB {
            SILENCE_DB
        } else {
            db
        }
    }
}

/// Convert a gain in dB back to a fader position (0-127)
///
/// Exact inverse of [`position_to_db`] before truncation. Values below the
/// bottom of the travel land on 0, values above it on 127.
pub fn db_to_position(db: f64) -> u8 {
    if db.is_nan() {
        return 0;
    }
    if db >= MAX_DB {
        return MAX_POSITION;
    }

    let section = if db >= -10.0 {
        db / 2.5
    } else if db >= -30.0 {
        (db + 10.0) / 5.0 - 4.0
    } else {
        (db + 30.0) / 10.0 - 8.0
    };

    let value = section * SECTION + UNITY_POINT;
    let deflection = (value - FADER_MID) / FADER_SCALE + FADER_MID;

    if deflection > 0.0 {
        (deflection as u64).min(u64::from(MAX_POSITION)) as u8
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_points() {
        // Bottom of the travel is silence
        assert_eq!(position_to_db(0), SILENCE_DB);
        assert_eq!(position_to_db(1), SILENCE_DB);

        // Just above the -10 dB knee
        assert!((position_to_db(64) - (-9.858)).abs() < 0.01);

        // Top of the travel never reaches +10 because of the scale factor
        assert!((position_to_db(127) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_reference_points_round_trip() {
        for position in [0u8, 64, 127] {
            let back = db_to_position(position_to_db(position));
            assert!(
                (i16::from(back) - i16::from(position)).abs() <= 1,
                "position {} came back as {}",
                position,
                back
            );
        }
    }

    #[test]
    fn test_round_trip_full_travel() {
        for position in 0..=MAX_POSITION {
            let back = db_to_position(position_to_db(position));
            assert!(
                (i16::from(back) - i16::from(position)).abs() <= 1,
                "position {} -> {} dB -> {}",
                position,
                position_to_db(position),
                back
            );
        }
    }

    #[test]
    fn test_monotonic_over_travel() {
        let mut previous = f64::NEG_INFINITY;
        for position in 0..=MAX_POSITION {
            let db = position_to_db(position);
            assert!(db >= previous, "taper decreases at {}", position);
            previous = db;
        }
    }

    #[test]
    fn test_db_limits() {
        assert_eq!(db_to_position(MAX_DB), 127);
        assert_eq!(db_to_position(25.0), 127);
        assert_eq!(db_to_position(9.9), 127);
        assert_eq!(db_to_position(SILENCE_DB), 0);
        assert_eq!(db_to_position(f64::NEG_INFINITY), 0);
        assert_eq!(db_to_position(f64::NAN), 0);
        assert_eq!(db_to_position(0.0), 98);
    }

    proptest! {
        #[test]
        fn prop_db_to_position_is_monotonic(a in -120.0f64..20.0, b in -120.0f64..20.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(db_to_position(lo) <= db_to_position(hi));
        }

        #[test]
        fn prop_position_to_db_stays_in_range(position in 0u8..=127) {
            let db = position_to_db(position);
            prop_assert!(db == SILENCE_DB || (FLOOR_DB..=MAX_DB).contains(&db));
        }
    }
}
