//! Value normalization for encoder and fader data
//!
//! The surface's encoders send relative values:
//! - 64 (and 0): no movement
//! - 1-63: clockwise, magnitude = value (1 = slowest)
//! - 65-127: counter-clockwise, magnitude = value - 64
//!
//! DAW feedback carries absolute 0-127 values which are rendered on the
//! display as percentages (volume) or left/right positions (pan).

/// Raw value meaning "no movement"
pub const ENCODER_CENTER: u8 = 64;

/// Predefined control value ranges
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRange {
    /// Unit range: 0.0 to 1.0 (volume, parameter values)
    Unit,
    /// Bipolar range: -1.0 to 1.0 (pan)
    Bipolar,
}

impl ControlRange {
    /// Get min value for this range
    pub fn min(&self) -> f32 {
        match self {
            Self::Unit => 0.0,
            Self::Bipolar => -1.0,
        }
    }

    /// Get max value for this range
    pub fn max(&self) -> f32 {
        match self {
            Self::Unit | Self::Bipolar => 1.0,
        }
    }
}

/// Decode a relative encoder value into a signed delta clamped to `±cap`
///
/// A `cap` of 0 is treated as 1 so a turn is never swallowed.
pub fn decode_delta(raw: u8, cap: u8) -> i32 {
    let cap = cap.max(1) as i32;
    let delta = match raw {
        1..=63 => raw as i32,
        65..=127 => -(raw as i32 - 64),
        _ => 0,
    };
    delta.clamp(-cap, cap)
}

/// Re-encode a delta for forwarding to another consumer (`64 + delta`, clamped to 1-127)
pub fn encode_delta(delta: i32) -> u8 {
    (ENCODER_CENTER as i32 + delta).clamp(1, 127) as u8
}

/// Normalize a MIDI value (0-127) to the target range
pub fn normalize_cc_value(midi_value: u8, range: ControlRange) -> f32 {
    let normalized = midi_value.min(127) as f32 / 127.0;
    let min = range.min();
    let max = range.max();
    min + normalized * (max - min)
}

/// Render a 0-127 volume as a percentage label ("0%".."100%")
pub fn volume_label(midi_value: u8) -> String {
    let percent = (normalize_cc_value(midi_value, ControlRange::Unit) * 100.0).round() as i32;
    format!("{}%", percent)
}

/// Render a 0-127 pan value as "L50" / "C" / "R50"
pub fn pan_label(midi_value: u8) -> String {
    let pan = normalize_cc_value(midi_value, ControlRange::Bipolar);
    let amount = (pan.abs() * 50.0).round() as i32;
    if amount == 0 {
        "C".to_string()
    } else if pan < 0.0 {
        format!("L{}", amount)
    } else {
        format!("R{}", amount)
    }
}
