//! Bridge state mirrored from the DAW and the surface

use super::mode::Mode;
use crate::config::BridgeConfig;
use crate::drum::DrumProfile;
use crate::layout::LayoutScheme;
use crate::scale;

/// Tracks per bank on the surface
pub const TRACK_COUNT: usize = 8;
/// Device parameters per page
pub const PARAM_COUNT: usize = 8;

/// What the pad grid plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PadMode {
    #[default]
    Note,
    Drum,
}

/// Mirrored state of one DAW track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackState {
    pub name: String,
    pub volume: u8,
    pub pan: u8,
    pub mute: bool,
    pub solo: bool,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            name: String::new(),
            volume: 0,
            pan: 64,
            mute: false,
            solo: false,
        }
    }
}

/// Name and display value of one device parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamState {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportFlags {
    pub playing: bool,
    pub recording: bool,
    pub looping: bool,
    pub metronome: bool,
}

impl TransportFlags {
    /// Decode the packed TransportState byte
    /// (bit 0 play, bit 1 record, bit 2 loop, bit 3 metronome)
    pub fn from_bits(bits: u8) -> Self {
        Self {
            playing: bits & 0x01 != 0,
            recording: bits & 0x02 != 0,
            looping: bits & 0x04 != 0,
            metronome: bits & 0x08 != 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        self.playing as u8
            | (self.recording as u8) << 1
            | (self.looping as u8) << 2
            | (self.metronome as u8) << 3
    }
}

/// Everything the bridge knows, owned and mutated by the event loop only
#[derive(Debug, Clone)]
pub struct BridgeState {
    pub mode: Mode,
    /// Last non-transient mode, restored when a transient mode exits
    pub previous_mode: Mode,
    pub pad_mode: PadMode,

    pub transport: TransportFlags,
    pub tempo_text: String,

    pub tracks: [TrackState; TRACK_COUNT],
    pub selected_track: Option<usize>,

    pub device_name: String,
    pub params: [ParamState; PARAM_COUNT],
    pub param_page: u8,

    pub scale_index: usize,
    pub root_pitch_class: u8,
    pub in_key: bool,
    pub scheme: LayoutScheme,

    pub accent: bool,
    pub shift_held: bool,
    pub drum_profile: DrumProfile,
}

impl BridgeState {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            mode: Mode::Welcome,
            previous_mode: Mode::Welcome,
            pad_mode: PadMode::default(),
            transport: TransportFlags::default(),
            tempo_text: String::new(),
            tracks: Default::default(),
            selected_track: None,
            device_name: String::new(),
            params: Default::default(),
            param_page: 0,
            scale_index: scale::scale_index(&config.layout.scale).unwrap_or(0),
            root_pitch_class: config.layout.root_pitch_class % 12,
            in_key: config.layout.in_key,
            scheme: config.layout.scheme,
            accent: false,
            shift_held: false,
            drum_profile: config.layout.drum_profile,
        }
    }

    /// Switch mode, remembering where we came from
    ///
    /// Returns false if already in that mode.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        if mode == self.mode {
            return false;
        }
        if !self.mode.is_transient() {
            self.previous_mode = self.mode;
        }
        self.mode = mode;
        true
    }

    pub fn scale(&self) -> &'static scale::Scale {
        scale::scale(self.scale_index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut TrackState> {
        self.tracks.get_mut(index)
    }

    pub fn param_mut(&mut self, index: usize) -> Option<&mut ParamState> {
        self.params.get_mut(index)
    }

    /// First track of the bank containing the selected track
    pub fn bank_start(&self) -> usize {
        self.selected_track.unwrap_or(0) / 4 * 4
    }

    /// Forget everything mirrored from the DAW
    pub fn reset_daw_state(&mut self) {
        self.transport = TransportFlags::default();
        self.tempo_text.clear();
        self.tracks = Default::default();
        self.selected_track = None;
        self.device_name.clear();
        self.params = Default::default();
        self.param_page = 0;
    }
}
