//! X-Touch OBS Mixer library
//!
//! Drives the eight channel strips of a Behringer X-Touch Extender from the
//! OBS Studio audio mixer, and the OBS mixer from the strips.

pub mod config;
pub mod midi;
pub mod obs;
pub mod paths;
pub mod router;
pub mod state;
pub mod strip;
pub mod xtouch;
