//! Pad and button lighting
//!
//! LED values are derived from the state on every refresh; the LED writer
//! drops anything that didn't change.

use super::{Bridge, Grid, Mode};
use crate::layout::MAX_ROOT_NOTE;
use crate::output::LedAddress;
use crate::surface::{pads, Button, Row, ROW_BUTTONS};

impl Bridge {
    pub(super) fn update_leds(&mut self) {
        for pad in pads() {
            let value = self.pad_color(pad);
            self.leds.set(self.surface.output.as_mut(), LedAddress::Pad(pad), value);
        }

        for button in Button::ALL {
            let value = self.button_brightness(button);
            self.leds.set(self.surface.output.as_mut(), LedAddress::Button(button.cc()), value);
        }

        for row in [Row::Upper, Row::Lower] {
            for index in 0..ROW_BUTTONS {
                let value = self.row_brightness(row, index);
                self.leds.set(self.surface.output.as_mut(), LedAddress::Button(row.cc(index)), value);
            }
        }
    }

    /// Pad color for the current grid
    pub fn pad_color(&self, pad: u8) -> u8 {
        let palette = &self.config.palette;
        let held = self.active_pads.contains_key(&pad);
        match self.state.mode.grid(self.state.pad_mode) {
            Grid::Off => 0,
            Grid::Notes => {
                if self.layout.note_for_pad(pad).is_none() {
                    0
                } else if held {
                    palette.pad_playing
                } else if self.layout.is_root(pad) {
                    palette.pad_root
                } else if self.layout.is_in_scale(pad) {
                    palette.pad_in_scale
                } else {
                    palette.pad_out_of_scale
                }
            }
            Grid::Drums => {
                if self.state.drum_profile.note_for_pad(pad).is_none() {
                    0
                } else if held {
                    palette.drum_playing
                } else {
                    palette.drum_pad
                }
            }
        }
    }

    fn button_brightness(&self, button: Button) -> u8 {
        let palette = &self.config.palette;
        let lit = |on: bool| if on { palette.button_on } else { palette.button_dim };
        let flags = self.state.transport;

        if let Some(mode) = Mode::for_button(button) {
            return lit(self.state.mode == mode);
        }
        match button {
            Button::Play => lit(flags.playing),
            Button::Record => lit(flags.recording),
            Button::Loop => lit(flags.looping),
            Button::Metronome => lit(flags.metronome),
            Button::Shift => lit(self.state.shift_held),
            Button::Accent => lit(self.state.accent),
            Button::OctaveUp | Button::OctaveDown => {
                let playing_notes = self.state.mode.grid(self.state.pad_mode) == Grid::Notes;
                let root = self.layout.root();
                let can_move = if button == Button::OctaveUp {
                    root + 12 <= MAX_ROOT_NOTE
                } else {
                    root >= 12
                };
                if playing_notes && can_move {
                    palette.button_dim
                } else {
                    palette.button_off
                }
            }
            _ => palette.button_dim,
        }
    }

    fn row_brightness(&self, row: Row, index: usize) -> u8 {
        let palette = &self.config.palette;
        let (on, dim) = match row {
            Row::Upper => (palette.upper_on, palette.upper_dim),
            Row::Lower => (palette.lower_on, palette.lower_dim),
        };
        let lit = |selected: bool| if selected { on } else { dim };

        match self.state.mode {
            Mode::Scale => {
                let root = self.state.root_pitch_class as usize;
                match (row, index) {
                    (Row::Upper, i) => lit(root == i),
                    (Row::Lower, i @ 0..=3) => lit(root == 8 + i),
                    (Row::Lower, 4) => lit(self.state.in_key),
                    (Row::Lower, _) => dim,
                }
            }
            Mode::Device | Mode::Mixer | Mode::MixerPan => dim,
            Mode::Transport if row == Row::Upper => {
                let flags = self.state.transport;
                match index {
                    0 => lit(flags.playing),
                    2 => lit(flags.recording),
                    3 => lit(flags.looping),
                    4 => lit(flags.metronome),
                    1 | 5 => dim,
                    _ => palette.button_off,
                }
            }
            _ => palette.button_off,
        }
    }
}
