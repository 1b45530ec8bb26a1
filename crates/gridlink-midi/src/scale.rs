//! Scale catalogue and note naming

/// Pitch-class names (0 = C)
pub const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Name of a pitch class (wraps modulo 12)
pub fn note_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES[(pitch_class % 12) as usize]
}

/// Note name with octave, where note 36 is "C2"
pub fn note_label(note: u8) -> String {
    format!("{}{}", note_name(note), note as i32 / 12 - 1)
}

/// Named scale as semitone offsets from the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub name: &'static str,
    pub intervals: &'static [u8],
}

/// Built-in scales, in the order they are browsed on the surface
pub const SCALES: &[Scale] = &[
    Scale { name: "Major", intervals: &[0, 2, 4, 5, 7, 9, 11] },
    Scale { name: "Minor", intervals: &[0, 2, 3, 5, 7, 8, 10] },
    Scale { name: "Dorian", intervals: &[0, 2, 3, 5, 7, 9, 10] },
    Scale { name: "Mixolydian", intervals: &[0, 2, 4, 5, 7, 9, 10] },
    Scale { name: "Lydian", intervals: &[0, 2, 4, 6, 7, 9, 11] },
    Scale { name: "Phrygian", intervals: &[0, 1, 3, 5, 7, 8, 10] },
    Scale { name: "Locrian", intervals: &[0, 1, 3, 5, 6, 8, 10] },
    Scale { name: "Harmonic Minor", intervals: &[0, 2, 3, 5, 7, 8, 11] },
    Scale { name: "Melodic Minor", intervals: &[0, 2, 3, 5, 7, 9, 11] },
    Scale { name: "Whole Tone", intervals: &[0, 2, 4, 6, 8, 10] },
    Scale { name: "Major Pentatonic", intervals: &[0, 2, 4, 7, 9] },
    Scale { name: "Minor Pentatonic", intervals: &[0, 3, 5, 7, 10] },
    Scale { name: "Blues", intervals: &[0, 3, 5, 6, 7, 10] },
    Scale { name: "Chromatic", intervals: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11] },
];

/// Look up a scale by index, falling back to Major
pub fn scale(index: usize) -> &'static Scale {
    SCALES.get(index).unwrap_or(&SCALES[0])
}

/// Find a scale index by name (case-insensitive)
pub fn scale_index(name: &str) -> Option<usize> {
    SCALES.iter().position(|s| s.name.eq_ignore_ascii_case(name.trim()))
}

/// Check that intervals form a usable scale: non-empty, starting at 0,
/// strictly ascending and below 12
pub fn is_valid_scale(intervals: &[u8]) -> bool {
    intervals.first() == Some(&0)
        && intervals.iter().all(|i| *i < 12)
        && intervals.windows(2).all(|w| w[0] < w[1])
}
