//! Surface modes and their display pages
//!
//! Each mode owns its own render function; the bridge never builds display
//! content outside of [`Mode::render`].

use super::state::{BridgeState, PadMode};
use crate::codec::ChannelId;
use crate::display::{Align, DisplayBuffer, FIELD_COUNT};
use crate::layout::IsomorphicLayout;
use crate::normalize::{pan_label, volume_label};
use crate::scale::{note_name, SCALES};
use crate::surface::Button;

/// Top-level surface mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Shown until the first mode button is pressed
    Welcome,
    Note,
    Track,
    Device,
    Mixer,
    MixerPan,
    Scale,
    Drum,
    Transport,
}

/// What the pad grid does in a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grid {
    Off,
    Notes,
    Drums,
}

impl Mode {
    /// Modes with a button on the surface
    pub const SELECTABLE: [Mode; 8] = [
        Self::Note,
        Self::Drum,
        Self::Track,
        Self::Device,
        Self::Mixer,
        Self::MixerPan,
        Self::Scale,
        Self::Transport,
    ];

    /// Transient modes are exited back to the previous mode
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Scale)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::Note => "Note",
            Self::Track => "Track",
            Self::Device => "Device",
            Self::Mixer => "Volume",
            Self::MixerPan => "Pan",
            Self::Scale => "Scale",
            Self::Drum => "Drum",
            Self::Transport => "Transport",
        }
    }

    /// Button that selects this mode (and shows it lit)
    pub fn button(self) -> Option<Button> {
        match self {
            Self::Welcome => None,
            Self::Note => Some(Button::Note),
            Self::Track => Some(Button::Track),
            Self::Device => Some(Button::Device),
            Self::Mixer => Some(Button::Volume),
            Self::MixerPan => Some(Button::PanSend),
            Self::Scale => Some(Button::Scale),
            Self::Drum => Some(Button::Session),
            Self::Transport => Some(Button::User),
        }
    }

    pub fn for_button(button: Button) -> Option<Self> {
        Self::SELECTABLE
            .into_iter()
            .find(|mode| mode.button() == Some(button))
    }

    /// Pad mode a mode switches the grid to, if any
    pub fn pad_mode(self) -> Option<PadMode> {
        match self {
            Self::Note => Some(PadMode::Note),
            Self::Drum => Some(PadMode::Drum),
            _ => None,
        }
    }

    /// Grid behavior in this mode given the persistent pad mode
    pub fn grid(self, pad_mode: PadMode) -> Grid {
        match (self, pad_mode) {
            (Self::Welcome, _) => Grid::Off,
            // Scale selection previews the note layout
            (Self::Scale, _) => Grid::Notes,
            (_, PadMode::Note) => Grid::Notes,
            (_, PadMode::Drum) => Grid::Drums,
        }
    }

    /// DAW channel and MIDI channel for raw CC pass-through, for forwarding modes
    pub fn forward_target(self) -> Option<(ChannelId, u8)> {
        match self {
            Self::Device => Some((ChannelId::Devices, 0)),
            Self::Mixer => Some((ChannelId::Mixer, 0)),
            Self::MixerPan => Some((ChannelId::Mixer, 1)),
            _ => None,
        }
    }

    /// Redraw the whole display for this mode
    pub fn render(self, state: &BridgeState, layout: &IsomorphicLayout, display: &mut DisplayBuffer) {
        display.clear();
        match self {
            Self::Welcome => render_welcome(display),
            Self::Note => render_note(state, layout, display),
            Self::Track => render_track(state, display),
            Self::Device => render_device(state, display),
            Self::Mixer => render_mixer(state, display, false),
            Self::MixerPan => render_mixer(state, display, true),
            Self::Scale => render_scale(state, layout, display),
            Self::Drum => render_drum(state, display),
            Self::Transport => render_transport(state, display),
        }
    }
}

fn fields<F>(f: F) -> [String; FIELD_COUNT]
where
    F: FnMut(usize) -> String,
{
    std::array::from_fn(f)
}

fn on_off(on: bool) -> &'static str {
    if on {
        "On"
    } else {
        "Off"
    }
}

/// Bottom line shared by the playing modes
fn render_status_line(state: &BridgeState, display: &mut DisplayBuffer) {
    let transport = if state.transport.recording {
        "Recording"
    } else if state.transport.playing {
        "Playing"
    } else {
        "Stopped"
    };
    let tempo = if state.tempo_text.is_empty() {
        String::new()
    } else {
        format!("{} BPM", state.tempo_text)
    };
    let track = state
        .selected_track
        .and_then(|i| state.tracks.get(i))
        .map(|t| t.name.clone())
        .unwrap_or_default();
    display.set_segments(3, &[tempo, transport.to_string(), track, state.device_name.clone()], Align::Left);
}

fn render_welcome(display: &mut DisplayBuffer) {
    display.set_segments(1, &["", "gridlink", "", ""], Align::Center);
    display.set_segments(2, &["", "Select a mode", "", ""], Align::Center);
}

fn render_note(state: &BridgeState, layout: &IsomorphicLayout, display: &mut DisplayBuffer) {
    let scheme = layout.scheme().map(|s| s.name()).unwrap_or("Custom");
    display.set_fields(
        0,
        &["Mode", "Key", "Scale", "", "Layout", "Octave", "Notes", "Accent"],
        Align::Left,
    );
    display.set_fields(
        1,
        &[
            "Note".to_string(),
            note_name(state.root_pitch_class).to_string(),
            String::new(),
            String::new(),
            scheme.to_string(),
            layout.octave().to_string(),
            (if layout.in_key() { "In Key" } else { "Chromat" }).to_string(),
            on_off(state.accent).to_string(),
        ],
        Align::Left,
    );
    // Scale names are longer than a field
    display.set_segment(1, 1, state.scale().name, Align::Left);
    render_status_line(state, display);
}

fn render_track(state: &BridgeState, display: &mut DisplayBuffer) {
    let bank = state.bank_start();
    display.set_fields(
        0,
        &fields(|i| match i {
            0 => "Track".to_string(),
            1 => "Device".to_string(),
            2 => "Tempo".to_string(),
            3 => "Scrub".to_string(),
            _ => {
                let track = &state.tracks[bank + i - 4];
                if track.name.is_empty() {
                    format!("Vol {}", bank + i - 3)
                } else {
                    track.name.clone()
                }
            }
        }),
        Align::Left,
    );
    let selected = state
        .selected_track
        .map(|i| state.tracks[i].name.clone())
        .unwrap_or_default();
    display.set_fields(
        1,
        &fields(|i| match i {
            0 => selected.clone(),
            1 => state.device_name.clone(),
            2 => state.tempo_text.clone(),
            3 => String::new(),
            _ => volume_label(state.tracks[bank + i - 4].volume),
        }),
        Align::Left,
    );
    render_status_line(state, display);
}

fn render_device(state: &BridgeState, display: &mut DisplayBuffer) {
    display.set_fields(0, &fields(|i| state.params[i].name.clone()), Align::Center);
    display.set_fields(1, &fields(|i| state.params[i].value.clone()), Align::Center);
    let page = format!("Page {}", state.param_page as u16 + 1);
    display.set_segments(2, &[state.device_name.as_str(), "", "", page.as_str()], Align::Left);
    render_status_line(state, display);
}

fn render_mixer(state: &BridgeState, display: &mut DisplayBuffer, pan: bool) {
    display.set_fields(
        0,
        &fields(|i| {
            let name = &state.tracks[i].name;
            let marker = if state.selected_track == Some(i) { ">" } else { "" };
            if name.is_empty() {
                format!("{}Track {}", marker, i + 1)
            } else {
                format!("{}{}", marker, name)
            }
        }),
        Align::Left,
    );
    display.set_fields(
        1,
        &fields(|i| {
            let track = &state.tracks[i];
            if pan {
                pan_label(track.pan)
            } else {
                volume_label(track.volume)
            }
        }),
        Align::Center,
    );
    display.set_fields(
        2,
        &fields(|i| {
            let track = &state.tracks[i];
            match (track.mute, track.solo) {
                (true, true) => "M S",
                (true, false) => "M",
                (false, true) => "S",
                (false, false) => "",
            }
            .to_string()
        }),
        Align::Center,
    );
    render_status_line(state, display);
}

fn render_scale(state: &BridgeState, layout: &IsomorphicLayout, display: &mut DisplayBuffer) {
    let scheme = layout.scheme().map(|s| s.name()).unwrap_or("Custom");
    display.set_segments(
        0,
        &[
            format!("Key {}", note_name(state.root_pitch_class)),
            state.scale().name.to_string(),
            format!("Octave {}", layout.octave()),
            scheme.to_string(),
        ],
        Align::Left,
    );

    // Neighbouring scales, current one marked
    let index = state.scale_index;
    display.set_segments(
        1,
        &std::array::from_fn::<String, 4, _>(|i| {
            let Some(scale_index) = (index + i).checked_sub(1) else {
                return String::new();
            };
            match SCALES.get(scale_index) {
                Some(s) if scale_index == index => format!(">{}", s.name),
                Some(s) => s.name.to_string(),
                None => String::new(),
            }
        }),
        Align::Left,
    );

    // Labels above the two button rows
    let marked = |pc: u8| {
        let name = note_name(pc);
        if pc == state.root_pitch_class {
            format!(">{}", name)
        } else {
            name.to_string()
        }
    };
    display.set_fields(2, &fields(|i| marked(i as u8)), Align::Center);
    display.set_fields(
        3,
        &fields(|i| match i {
            0..=3 => marked(8 + i as u8),
            4 => (if layout.in_key() { "In Key" } else { "Chromat" }).to_string(),
            5 => scheme.to_string(),
            6 => "<Scale".to_string(),
            _ => "Scale>".to_string(),
        }),
        Align::Center,
    );
}

fn render_drum(state: &BridgeState, display: &mut DisplayBuffer) {
    display.set_fields(0, &["Mode", "", "Kit", "", "", "", "", "Accent"], Align::Left);
    display.set_fields(
        1,
        &fields(|i| match i {
            0 => "Drum".to_string(),
            7 => on_off(state.accent).to_string(),
            _ => String::new(),
        }),
        Align::Left,
    );
    display.set_segment(1, 1, state.drum_profile.name(), Align::Left);
    render_status_line(state, display);
}

fn render_transport(state: &BridgeState, display: &mut DisplayBuffer) {
    let flags = state.transport;
    display.set_fields(
        0,
        &["Tempo", "Fine", "Scrub", "", "", "", "", ""],
        Align::Left,
    );
    display.set_fields(
        1,
        &fields(|i| match i {
            0 => state.tempo_text.clone(),
            _ => String::new(),
        }),
        Align::Left,
    );
    display.set_fields(
        2,
        &fields(|i| match i {
            0 => on_off(flags.playing).to_string(),
            2 => on_off(flags.recording).to_string(),
            3 => on_off(flags.looping).to_string(),
            4 => on_off(flags.metronome).to_string(),
            _ => String::new(),
        }),
        Align::Center,
    );
    display.set_fields(3, &["Play", "Stop", "Record", "Loop", "Click", "Tap", "", ""], Align::Center);
}
