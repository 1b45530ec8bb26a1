//! Isomorphic note layout for the pad grid
//!
//! Maps (row, col) grid coordinates to MIDI notes. Rows go up by a fixed
//! interval (a fourth by default) and columns by a semitone, so every chord
//! and scale shape is the same wherever it is played.
//!
//! In-key mode skips out-of-scale notes: columns walk scale degrees and each
//! row starts as many degrees higher as there are scale notes below the row
//! interval.

use crate::scale::{self, is_valid_scale};
use crate::surface::{pad_position, PAD_COLS, PAD_COUNT, PAD_ROWS};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

pub const DEFAULT_ROOT_NOTE: u8 = 36;
/// Highest root that still leaves room for the grid
pub const MAX_ROOT_NOTE: u8 = 96;

/// Row/column interval presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutScheme {
    #[default]
    Fourths,
    Thirds,
    Sequential,
}

impl LayoutScheme {
    pub const ALL: [LayoutScheme; 3] = [Self::Fourths, Self::Thirds, Self::Sequential];

    /// (row step, column step) in semitones
    pub fn intervals(self) -> (u8, u8) {
        match self {
            Self::Fourths => (5, 1),
            Self::Thirds => (4, 1),
            Self::Sequential => (8, 1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fourths => "4ths",
            Self::Thirds => "3rds",
            Self::Sequential => "Sequent",
        }
    }

    /// Next scheme, wrapping around
    pub fn next(self) -> Self {
        match self {
            Self::Fourths => Self::Thirds,
            Self::Thirds => Self::Sequential,
            Self::Sequential => Self::Fourths,
        }
    }

    pub fn from_intervals(row_step: u8, col_step: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.intervals() == (row_step, col_step))
    }
}

/// Layout parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutConfig {
    pub root_note: u8,
    pub row_step: u8,
    pub col_step: u8,
    pub scale: Vec<u8>,
    pub in_key: bool,
    pub root_pitch_class: u8,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let (row_step, col_step) = LayoutScheme::default().intervals();
        Self {
            root_note: DEFAULT_ROOT_NOTE,
            row_step,
            col_step,
            scale: scale::SCALES[0].intervals.to_vec(),
            in_key: false,
            root_pitch_class: 0,
        }
    }
}

impl LayoutConfig {
    /// Scale degrees per row in in-key mode (at least 1)
    pub fn row_degrees(&self) -> usize {
        self.scale
            .iter()
            .filter(|interval| **interval < self.row_step)
            .count()
            .max(1)
    }

    /// Note at a grid position, or None if outside 0..=127
    fn compute_note(&self, row: usize, col: usize) -> Option<u8> {
        let note = if self.in_key && !self.scale.is_empty() {
            let len = self.scale.len();
            let degree = row * self.row_degrees() + col;
            let octave = (degree / len) as i32;
            let interval = self.scale[degree % len] as i32;
            self.root_note as i32 + self.root_pitch_class as i32 + octave * 12 + interval
        } else {
            self.root_note as i32 + (row as i32) * self.row_step as i32 + (col as i32) * self.col_step as i32
        };
        u8::try_from(note).ok().filter(|n| *n <= 127)
    }
}

type NoteMap = [Option<u8>; PAD_COUNT];

/// Layout engine with a lazily rebuilt note map
#[derive(Debug, Clone, Default)]
pub struct IsomorphicLayout {
    config: LayoutConfig,
    note_map: OnceCell<NoteMap>,
}

impl IsomorphicLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            note_map: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    fn note_map(&self) -> &NoteMap {
        self.note_map.get_or_init(|| {
            let mut map = [None; PAD_COUNT];
            for (i, slot) in map.iter_mut().enumerate() {
                *slot = self.config.compute_note(i / PAD_COLS, i % PAD_COLS);
            }
            map
        })
    }

    fn changed(&mut self) {
        self.note_map = OnceCell::new();
    }

    /// Note at a grid position (row 0 = bottom)
    pub fn note_at(&self, row: usize, col: usize) -> Option<u8> {
        if row >= PAD_ROWS || col >= PAD_COLS {
            return None;
        }
        self.note_map()[row * PAD_COLS + col]
    }

    /// Note played by a pad
    pub fn note_for_pad(&self, pad: u8) -> Option<u8> {
        let (row, col) = pad_position(pad)?;
        self.note_at(row, col)
    }

    pub fn set_intervals(&mut self, row_step: u8, col_step: u8) {
        if (row_step, col_step) == (self.config.row_step, self.config.col_step) {
            return;
        }
        self.config.row_step = row_step;
        self.config.col_step = col_step;
        self.changed();
    }

    pub fn set_scheme(&mut self, scheme: LayoutScheme) {
        let (row_step, col_step) = scheme.intervals();
        self.set_intervals(row_step, col_step);
    }

    /// Current scheme if the intervals match a preset
    pub fn scheme(&self) -> Option<LayoutScheme> {
        LayoutScheme::from_intervals(self.config.row_step, self.config.col_step)
    }

    /// Set the bottom-left note (clamped to the usable range)
    pub fn set_root(&mut self, note: u8) {
        let note = note.min(MAX_ROOT_NOTE);
        if note != self.config.root_note {
            self.config.root_note = note;
            self.changed();
        }
    }

    pub fn root(&self) -> u8 {
        self.config.root_note
    }

    /// Octave number of the root (36 → 2)
    pub fn octave(&self) -> i32 {
        self.config.root_note as i32 / 12 - 1
    }

    /// Move the root by whole octaves
    ///
    /// Returns the resulting octave number. A shift that would leave the
    /// usable range does nothing.
    pub fn shift_octave(&mut self, direction: i32) -> i32 {
        let target = self.config.root_note as i32 + direction.signum() * 12;
        if (0..=MAX_ROOT_NOTE as i32).contains(&target) {
            self.config.root_note = target as u8;
            self.changed();
        } else {
            log::debug!("Layout: octave shift {} out of range, ignoring", direction);
        }
        self.octave()
    }

    /// Set key and scale. Invalid interval tables are ignored.
    pub fn set_scale(&mut self, root_pitch_class: u8, intervals: &[u8]) {
        if !is_valid_scale(intervals) {
            log::warn!("Layout: rejecting invalid scale {:?}", intervals);
            return;
        }
        self.config.root_pitch_class = root_pitch_class % 12;
        self.config.scale = intervals.to_vec();
        self.changed();
    }

    pub fn set_in_key(&mut self, enabled: bool) {
        if self.config.in_key != enabled {
            self.config.in_key = enabled;
            self.changed();
        }
    }

    pub fn in_key(&self) -> bool {
        self.config.in_key
    }

    fn relative_pitch_class(&self, pad: u8) -> Option<u8> {
        let note = self.note_for_pad(pad)?;
        Some((note + 12 - self.config.root_pitch_class) % 12)
    }

    /// Whether a pad plays the key's root
    pub fn is_root(&self, pad: u8) -> bool {
        self.relative_pitch_class(pad) == Some(0)
    }

    /// Whether a pad plays a note of the current scale
    pub fn is_in_scale(&self, pad: u8) -> bool {
        self.relative_pitch_class(pad)
            .is_some_and(|pc| self.config.scale.contains(&pc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromatic_fourths() {
        let layout = IsomorphicLayout::default();
        assert_eq!(layout.note_at(0, 0), Some(36));
        assert_eq!(layout.note_at(0, 1), Some(37));
        assert_eq!(layout.note_at(1, 0), Some(41));
        assert_eq!(layout.note_at(7, 7), Some(36 + 35 + 7));
        assert_eq!(layout.note_for_pad(44), Some(41));
        assert_eq!(layout.note_at(8, 0), None);
    }

    #[test]
    fn test_in_key_major_starts_on_root() {
        let mut layout = IsomorphicLayout::default();
        layout.set_in_key(true);
        assert_eq!(layout.config().row_degrees(), 3);
        assert_eq!(layout.note_at(0, 0).unwrap() % 12, 0);
        // C D E F G A B C
        let row: Vec<_> = (0..8).map(|c| layout.note_at(0, c).unwrap()).collect();
        assert_eq!(row, vec![36, 38, 40, 41, 43, 45, 47, 48]);
        // Next row starts 3 degrees up (F)
        assert_eq!(layout.note_at(1, 0), Some(41));
    }

    #[test]
    fn test_in_key_with_root_pitch_class() {
        let mut layout = IsomorphicLayout::default();
        layout.set_scale(7, scale::SCALES[0].intervals);
        layout.set_in_key(true);
        assert_eq!(layout.note_at(0, 0), Some(43));
        assert!(layout.is_root(36));
    }

    #[test]
    fn test_octave_shift_round_trip() {
        let mut layout = IsomorphicLayout::default();
        assert_eq!(layout.octave(), 2);
        assert_eq!(layout.shift_octave(1), 3);
        assert_eq!(layout.note_at(0, 0), Some(48));
        assert_eq!(layout.shift_octave(-1), 2);
        assert_eq!(layout.root(), 36);
    }

    #[test]
    fn test_octave_shift_clamped() {
        let mut layout = IsomorphicLayout::default();
        layout.set_root(MAX_ROOT_NOTE);
        assert_eq!(layout.shift_octave(1), 7);
        assert_eq!(layout.root(), MAX_ROOT_NOTE);

        layout.set_root(0);
        assert_eq!(layout.shift_octave(-1), -1);
        assert_eq!(layout.root(), 0);
    }

    #[test]
    fn test_set_root_clamps() {
        let mut layout = IsomorphicLayout::default();
        layout.set_root(120);
        assert_eq!(layout.root(), MAX_ROOT_NOTE);
    }

    #[test]
    fn test_notes_above_127_are_none() {
        let mut layout = IsomorphicLayout::default();
        layout.set_root(MAX_ROOT_NOTE);
        assert_eq!(layout.note_at(0, 0), Some(96));
        assert_eq!(layout.note_at(7, 7), None);
    }

    #[test]
    fn test_root_and_scale_membership() {
        let layout = IsomorphicLayout::default();
        assert!(layout.is_root(36));
        assert!(!layout.is_root(37));
        assert!(layout.is_in_scale(38)); // D
        assert!(!layout.is_in_scale(37)); // C#
        // Pad 44 is F at (1, 0)
        assert!(layout.is_in_scale(44));
        assert!(!layout.is_root(100));
    }

    #[test]
    fn test_scheme_changes_rebuild_map() {
        let mut layout = IsomorphicLayout::default();
        assert_eq!(layout.scheme(), Some(LayoutScheme::Fourths));
        layout.set_scheme(LayoutScheme::Sequential);
        assert_eq!(layout.note_at(1, 0), Some(44));
        layout.set_intervals(7, 2);
        assert_eq!(layout.scheme(), None);
        assert_eq!(layout.note_at(1, 1), Some(45));
    }

    #[test]
    fn test_invalid_scale_ignored() {
        let mut layout = IsomorphicLayout::default();
        layout.set_scale(3, &[0, 5, 5]);
        assert_eq!(layout.config().root_pitch_class, 0);
        assert_eq!(layout.config().scale.len(), 7);
    }

    #[test]
    fn test_scheme_cycle() {
        let mut scheme = LayoutScheme::Fourths;
        for _ in 0..3 {
            scheme = scheme.next();
        }
        assert_eq!(scheme, LayoutScheme::Fourths);
    }
}
