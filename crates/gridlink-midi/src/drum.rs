//! Drum pad profiles
//!
//! Each profile is a fixed coordinate → trigger-note table matching the pad
//! layout of a drum device on the DAW side. Pads without an entry are silent
//! and unlit.

use crate::surface::{pad_position, PAD_COLS, PAD_ROWS};
use serde::{Deserialize, Serialize};

/// General MIDI kit in the bottom two rows: kick/snare/hats below, toms and
/// cymbals above
const GM_KIT: [[(u8, &str); PAD_COLS]; 2] = [
    [
        (36, "Kick"),
        (38, "Snare"),
        (37, "Rim"),
        (39, "Clap"),
        (42, "ClHat"),
        (44, "PdHat"),
        (46, "OpHat"),
        (49, "Crash"),
    ],
    [
        (41, "FlTom L"),
        (43, "FlTom H"),
        (45, "Tom L"),
        (47, "Tom LM"),
        (48, "Tom HM"),
        (50, "Tom H"),
        (51, "Ride"),
        (53, "Bell"),
    ],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumProfile {
    /// 16 pads in the bottom-left 4×4 block, notes 36-51
    #[default]
    DrumRack,
    /// Two 4×4 blocks side by side, notes 36-51 and 52-67
    DrumRackWide,
    /// General MIDI kit spread over the bottom two rows
    GeneralMidi,
}

impl DrumProfile {
    pub const ALL: [DrumProfile; 3] = [Self::DrumRack, Self::DrumRackWide, Self::GeneralMidi];

    pub fn name(self) -> &'static str {
        match self {
            Self::DrumRack => "Drum Rack",
            Self::DrumRackWide => "Rack 32",
            Self::GeneralMidi => "GM Kit",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::DrumRack => Self::DrumRackWide,
            Self::DrumRackWide => Self::GeneralMidi,
            Self::GeneralMidi => Self::DrumRack,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Self::DrumRack => Self::GeneralMidi,
            Self::DrumRackWide => Self::DrumRack,
            Self::GeneralMidi => Self::DrumRackWide,
        }
    }

    /// Trigger note at a grid position
    pub fn note_at(self, row: usize, col: usize) -> Option<u8> {
        if row >= PAD_ROWS || col >= PAD_COLS {
            return None;
        }
        match self {
            Self::DrumRack => (row < 4 && col < 4).then(|| 36 + (row * 4 + col) as u8),
            Self::DrumRackWide => {
                if row >= 4 {
                    None
                } else if col < 4 {
                    Some(36 + (row * 4 + col) as u8)
                } else {
                    Some(52 + (row * 4 + col - 4) as u8)
                }
            }
            Self::GeneralMidi => GM_KIT.get(row).map(|r| r[col].0),
        }
    }

    pub fn note_for_pad(self, pad: u8) -> Option<u8> {
        let (row, col) = pad_position(pad)?;
        self.note_at(row, col)
    }

    /// Short label for a trigger note, for the display
    pub fn label(self, note: u8) -> String {
        if self == Self::GeneralMidi {
            if let Some((_, name)) = GM_KIT.iter().flatten().find(|(n, _)| *n == note) {
                return (*name).to_string();
            }
        }
        format!("Pad {}", note.saturating_sub(35))
    }
}
