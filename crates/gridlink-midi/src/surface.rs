//! Physical surface layout
//!
//! Fixed control map of the grid controller: an 8×8 pad grid (notes 36-99,
//! row 0 at the bottom), 8 track encoders plus tempo/swing/master encoders,
//! two rows of 8 buttons below the display, and dedicated function buttons.
//!
//! Raw bytes from the surface are parsed with midly and turned into
//! [`SurfaceEvent`]s. Anything we don't know about is dropped.

use midly::live::LiveEvent;
use midly::MidiMessage as RawMessage;

pub const PAD_ROWS: usize = 8;
pub const PAD_COLS: usize = 8;
pub const PAD_COUNT: usize = PAD_ROWS * PAD_COLS;
pub const FIRST_PAD_NOTE: u8 = 36;
pub const LAST_PAD_NOTE: u8 = FIRST_PAD_NOTE + PAD_COUNT as u8 - 1;

pub const TRACK_ENCODER_BASE_CC: u8 = 71;
pub const TEMPO_ENCODER_CC: u8 = 14;
pub const SWING_ENCODER_CC: u8 = 15;
pub const MASTER_ENCODER_CC: u8 = 79;

/// Buttons directly below the display
pub const UPPER_ROW_BASE_CC: u8 = 20;
/// Second row of buttons below the display
pub const LOWER_ROW_BASE_CC: u8 = 102;
pub const ROW_BUTTONS: usize = 8;

/// Row/column of a pad note, or None if it isn't a pad
pub fn pad_position(pad: u8) -> Option<(usize, usize)> {
    if !(FIRST_PAD_NOTE..=LAST_PAD_NOTE).contains(&pad) {
        return None;
    }
    let index = (pad - FIRST_PAD_NOTE) as usize;
    Some((index / PAD_COLS, index % PAD_COLS))
}

/// Pad note at a row/column (row 0 = bottom)
pub fn pad_id(row: usize, col: usize) -> Option<u8> {
    if row >= PAD_ROWS || col >= PAD_COLS {
        return None;
    }
    Some(FIRST_PAD_NOTE + (row * PAD_COLS + col) as u8)
}

/// Iterate over all pad notes
pub fn pads() -> impl Iterator<Item = u8> {
    FIRST_PAD_NOTE..=LAST_PAD_NOTE
}

/// Dedicated function button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    // Transport
    Play,
    Record,
    Stop,
    Metronome,
    TapTempo,
    Loop,

    // Modifiers
    Shift,
    Accent,

    // Navigation
    OctaveUp,
    OctaveDown,
    Left,
    Right,
    Up,
    Down,

    // Mode selection
    Note,
    Session,
    Scale,
    User,
    Track,
    Device,
    Volume,
    PanSend,
}

impl Button {
    pub const ALL: [Button; 22] = [
        Self::Play,
        Self::Record,
        Self::Stop,
        Self::Metronome,
        Self::TapTempo,
        Self::Loop,
        Self::Shift,
        Self::Accent,
        Self::OctaveUp,
        Self::OctaveDown,
        Self::Left,
        Self::Right,
        Self::Up,
        Self::Down,
        Self::Note,
        Self::Session,
        Self::Scale,
        Self::User,
        Self::Track,
        Self::Device,
        Self::Volume,
        Self::PanSend,
    ];

    /// CC number the button sends and whose LED it owns
    pub fn cc(self) -> u8 {
        match self {
            Self::Play => 85,
            Self::Record => 86,
            Self::Stop => 29,
            Self::Metronome => 9,
            Self::TapTempo => 3,
            Self::Loop => 90,
            Self::Shift => 49,
            Self::Accent => 57,
            Self::OctaveUp => 55,
            Self::OctaveDown => 54,
            Self::Left => 44,
            Self::Right => 45,
            Self::Up => 46,
            Self::Down => 47,
            Self::Note => 50,
            Self::Session => 51,
            Self::Scale => 58,
            Self::User => 59,
            Self::Track => 112,
            Self::Device => 110,
            Self::Volume => 114,
            Self::PanSend => 115,
        }
    }

    pub fn from_cc(cc: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.cc() == cc)
    }
}

/// Rotary encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    /// One of the 8 encoders above the display (0-7)
    Track(usize),
    Tempo,
    Swing,
    Master,
}

impl Encoder {
    pub fn from_cc(cc: u8) -> Option<Self> {
        match cc {
            TEMPO_ENCODER_CC => Some(Self::Tempo),
            SWING_ENCODER_CC => Some(Self::Swing),
            MASTER_ENCODER_CC => Some(Self::Master),
            c if (TRACK_ENCODER_BASE_CC..TRACK_ENCODER_BASE_CC + 8).contains(&c) => {
                Some(Self::Track((c - TRACK_ENCODER_BASE_CC) as usize))
            }
            _ => None,
        }
    }
}

/// Which button row below the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Upper,
    Lower,
}

impl Row {
    /// CC of the button at `index` in this row
    pub fn cc(self, index: usize) -> u8 {
        let base = match self {
            Self::Upper => UPPER_ROW_BASE_CC,
            Self::Lower => LOWER_ROW_BASE_CC,
        };
        base + index.min(ROW_BUTTONS - 1) as u8
    }
}

/// Parsed hardware event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    PadPressed { pad: u8, velocity: u8 },
    PadReleased { pad: u8 },
    ButtonPressed(Button),
    ButtonReleased(Button),
    RowButton { row: Row, index: usize, pressed: bool },
    EncoderTurned { encoder: Encoder, raw: u8 },
}

impl SurfaceEvent {
    /// Parse one raw MIDI message from the surface
    pub fn parse(data: &[u8]) -> Option<Self> {
        let event = match LiveEvent::parse(data) {
            Ok(event) => event,
            Err(e) => {
                log::trace!("[HW IN] unparseable {:02X?}: {}", data, e);
                return None;
            }
        };

        let LiveEvent::Midi { message, .. } = event else {
            return None;
        };

        match message {
            RawMessage::NoteOn { key, vel } => {
                let pad = key.as_int();
                pad_position(pad)?;
                if vel.as_int() == 0 {
                    Some(Self::PadReleased { pad })
                } else {
                    Some(Self::PadPressed {
                        pad,
                        velocity: vel.as_int(),
                    })
                }
            }
            RawMessage::NoteOff { key, .. } => {
                let pad = key.as_int();
                pad_position(pad)?;
                Some(Self::PadReleased { pad })
            }
            RawMessage::Controller { controller, value } => {
                Self::from_cc(controller.as_int(), value.as_int())
            }
            _ => None,
        }
    }

    fn from_cc(cc: u8, value: u8) -> Option<Self> {
        if let Some(encoder) = Encoder::from_cc(cc) {
            return Some(Self::EncoderTurned { encoder, raw: value });
        }
        let pressed = value > 0;
        if (UPPER_ROW_BASE_CC..UPPER_ROW_BASE_CC + ROW_BUTTONS as u8).contains(&cc) {
            return Some(Self::RowButton {
                row: Row::Upper,
                index: (cc - UPPER_ROW_BASE_CC) as usize,
                pressed,
            });
        }
        if (LOWER_ROW_BASE_CC..LOWER_ROW_BASE_CC + ROW_BUTTONS as u8).contains(&cc) {
            return Some(Self::RowButton {
                row: Row::Lower,
                index: (cc - LOWER_ROW_BASE_CC) as usize,
                pressed,
            });
        }
        let button = Button::from_cc(cc)?;
        if pressed {
            Some(Self::ButtonPressed(button))
        } else {
            Some(Self::ButtonReleased(button))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_geometry() {
        assert_eq!(pad_position(36), Some((0, 0)));
        assert_eq!(pad_position(37), Some((0, 1)));
        assert_eq!(pad_position(44), Some((1, 0)));
        assert_eq!(pad_position(99), Some((7, 7)));
        assert_eq!(pad_position(35), None);
        assert_eq!(pad_position(100), None);
        assert_eq!(pad_id(7, 7), Some(99));
        assert_eq!(pad_id(8, 0), None);
        assert_eq!(pads().count(), PAD_COUNT);
    }

    #[test]
    fn test_button_ccs_unique() {
        let mut seen = std::collections::HashSet::new();
        for button in Button::ALL {
            assert!(seen.insert(button.cc()), "{:?} shares a CC", button);
            assert_eq!(Button::from_cc(button.cc()), Some(button));
            assert!(Encoder::from_cc(button.cc()).is_none());
        }
    }

    #[test]
    fn test_parse_pads() {
        assert_eq!(
            SurfaceEvent::parse(&[0x90, 36, 100]),
            Some(SurfaceEvent::PadPressed { pad: 36, velocity: 100 })
        );
        assert_eq!(SurfaceEvent::parse(&[0x90, 36, 0]), Some(SurfaceEvent::PadReleased { pad: 36 }));
        assert_eq!(SurfaceEvent::parse(&[0x80, 50, 64]), Some(SurfaceEvent::PadReleased { pad: 50 }));
        // Encoder touch notes are not pads
        assert_eq!(SurfaceEvent::parse(&[0x90, 0, 127]), None);
    }

    #[test]
    fn test_parse_controls() {
        assert_eq!(
            SurfaceEvent::parse(&[0xB0, 71, 1]),
            Some(SurfaceEvent::EncoderTurned { encoder: Encoder::Track(0), raw: 1 })
        );
        assert_eq!(
            SurfaceEvent::parse(&[0xB0, 14, 127]),
            Some(SurfaceEvent::EncoderTurned { encoder: Encoder::Tempo, raw: 127 })
        );
        assert_eq!(
            SurfaceEvent::parse(&[0xB0, 105, 127]),
            Some(SurfaceEvent::RowButton { row: Row::Lower, index: 3, pressed: true })
        );
        assert_eq!(SurfaceEvent::parse(&[0xB0, 85, 127]), Some(SurfaceEvent::ButtonPressed(Button::Play)));
        assert_eq!(SurfaceEvent::parse(&[0xB0, 85, 0]), Some(SurfaceEvent::ButtonReleased(Button::Play)));
        assert_eq!(SurfaceEvent::parse(&[0xB0, 127, 1]), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(SurfaceEvent::parse(&[]), None);
        assert_eq!(SurfaceEvent::parse(&[0x42]), None);
        assert_eq!(SurfaceEvent::parse(&[0xF0, 0x47, 0xF7]), None);
    }
}
