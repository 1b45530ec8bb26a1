//! Surface event routing
//!
//! Priority, highest first:
//! 1. scale mode owns the two button rows and encoder 0
//! 2. track mode remaps each encoder to a DAW message
//! 3. device and mixer modes pass encoders and row buttons through as raw CC
//! 4. pads play the layout (note pad mode) or drum triggers (drum pad mode)
//! 5. transport buttons toggle flags locally, then forward

use super::{ActivePad, Bridge, Grid, Mode, PadTarget};
use crate::codec::{ChannelId, Envelope, MessageType};
use crate::normalize::{decode_delta, encode_delta};
use crate::output::cc_message;
use crate::scale::SCALES;
use crate::surface::{Button, Encoder, Row, SurfaceEvent};

/// Pass-through CC of track encoder 0; the others follow
const ENCODER_FORWARD_BASE_CC: u8 = 16;
/// Pass-through CC of upper row button 0
const UPPER_FORWARD_BASE_CC: u8 = 102;
/// Pass-through CC of lower row button 0
const LOWER_FORWARD_BASE_CC: u8 = 110;

const SELECT_CAP: u8 = 1;
const TEMPO_CAP: u8 = 8;
const TEMPO_FINE_CAP: u8 = 1;
const SCRUB_CAP: u8 = 4;
const VOLUME_CAP: u8 = 8;

impl Bridge {
    pub(super) fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::PadPressed { pad, velocity } => self.pad_pressed(pad, velocity),
            SurfaceEvent::PadReleased { pad } => self.pad_released(pad),
            SurfaceEvent::ButtonPressed(button) => self.button_pressed(button),
            SurfaceEvent::ButtonReleased(button) => self.button_released(button),
            SurfaceEvent::RowButton { row, index, pressed } => self.row_button(row, index, pressed),
            SurfaceEvent::EncoderTurned { encoder, raw } => self.encoder_turned(encoder, raw),
        }
    }

    fn send(&mut self, envelope: Envelope) {
        let _ = self.channels.send(&envelope);
    }

    /// Send a single-step/capped relative message, skipping zero deltas
    fn send_delta(&mut self, channel: ChannelId, kind: MessageType, raw: u8, cap: u8) {
        let delta = decode_delta(raw, cap);
        if delta != 0 {
            self.send(Envelope::delta(channel, kind, delta));
        }
    }

    // Pads

    fn pad_pressed(&mut self, pad: u8, velocity: u8) {
        let active = match self.state.mode.grid(self.state.pad_mode) {
            Grid::Off => None,
            Grid::Notes => self.layout.note_for_pad(pad).map(|note| ActivePad {
                note,
                target: PadTarget::Notes,
            }),
            Grid::Drums => self.state.drum_profile.note_for_pad(pad).map(|note| ActivePad {
                note,
                target: PadTarget::Drums,
            }),
        };
        let Some(active) = active else {
            log::trace!("Bridge: pad {} has nothing to play", pad);
            return;
        };

        let velocity = if self.state.accent {
            127
        } else {
            velocity.max(self.config.min_velocity)
        };

        // Retrigger without leaving the old note hanging
        if let Some(previous) = self.active_pads.remove(&pad) {
            self.send_pad_note(previous, 0);
        }
        self.send_pad_note(active, velocity);
        self.active_pads.insert(pad, active);
    }

    fn pad_released(&mut self, pad: u8) {
        if let Some(active) = self.active_pads.remove(&pad) {
            self.send_pad_note(active, 0);
        }
    }

    // Buttons

    fn button_pressed(&mut self, button: Button) {
        if let Some(mode) = Mode::for_button(button) {
            self.mode_button(mode);
            return;
        }

        let flags = &mut self.state.transport;
        match button {
            Button::Play => {
                flags.playing = !flags.playing;
                let on = flags.playing;
                self.send(Envelope::flag(ChannelId::Transport, MessageType::Play, on));
            }
            Button::Stop => {
                flags.playing = false;
                flags.recording = false;
                self.send(Envelope::empty(ChannelId::Transport, MessageType::Stop));
            }
            Button::Record => {
                flags.recording = !flags.recording;
                let on = flags.recording;
                self.send(Envelope::flag(ChannelId::Transport, MessageType::Record, on));
            }
            Button::Loop => {
                flags.looping = !flags.looping;
                let on = flags.looping;
                self.send(Envelope::flag(ChannelId::Transport, MessageType::Loop, on));
            }
            Button::Metronome => {
                flags.metronome = !flags.metronome;
                let on = flags.metronome;
                self.send(Envelope::flag(ChannelId::Transport, MessageType::Metronome, on));
            }
            Button::TapTempo => {
                self.send(Envelope::empty(ChannelId::Transport, MessageType::TapTempo));
            }
            Button::Shift => self.state.shift_held = true,
            Button::Accent => self.state.accent = !self.state.accent,
            Button::OctaveUp => {
                self.layout.shift_octave(1);
            }
            Button::OctaveDown => {
                self.layout.shift_octave(-1);
            }
            Button::Left => self.send(Envelope::delta(ChannelId::Mixer, MessageType::TrackSelect, -1)),
            Button::Right => self.send(Envelope::delta(ChannelId::Mixer, MessageType::TrackSelect, 1)),
            Button::Up => self.send(Envelope::delta(ChannelId::Devices, MessageType::ParamPage, 1)),
            Button::Down => self.send(Envelope::delta(ChannelId::Devices, MessageType::ParamPage, -1)),
            Button::Note
            | Button::Session
            | Button::Scale
            | Button::User
            | Button::Track
            | Button::Device
            | Button::Volume
            | Button::PanSend => {}
        }
        self.needs_render = true;
    }

    fn button_released(&mut self, button: Button) {
        if button == Button::Shift {
            self.state.shift_held = false;
        }
    }

    fn mode_button(&mut self, mode: Mode) {
        match mode {
            Mode::Scale if self.state.mode == Mode::Scale => self.exit_transient_mode(),
            // Pressing drum again steps through the kits
            Mode::Drum if self.state.mode == Mode::Drum => {
                self.release_all_pads();
                self.state.drum_profile = if self.state.shift_held {
                    self.state.drum_profile.previous()
                } else {
                    self.state.drum_profile.next()
                };
                log::info!("Bridge: drum profile {}", self.state.drum_profile.name());
                self.needs_render = true;
            }
            _ => self.enter_mode(mode),
        }
    }

    fn row_button(&mut self, row: Row, index: usize, pressed: bool) {
        if self.state.mode == Mode::Scale {
            if pressed {
                self.scale_button(row, index);
            }
            return;
        }

        if let Some((channel, midi_channel)) = self.state.mode.forward_target() {
            let base = match row {
                Row::Upper => UPPER_FORWARD_BASE_CC,
                Row::Lower => LOWER_FORWARD_BASE_CC,
            };
            let value = if pressed { 127 } else { 0 };
            let message = cc_message(midi_channel, base + index as u8, value);
            let _ = self.channels.send_raw(channel, &message);
            return;
        }

        if self.state.mode == Mode::Transport && pressed && row == Row::Upper {
            let button = match index {
                0 => Button::Play,
                1 => Button::Stop,
                2 => Button::Record,
                3 => Button::Loop,
                4 => Button::Metronome,
                5 => Button::TapTempo,
                _ => return,
            };
            self.button_pressed(button);
        }
    }

    // Encoders

    fn encoder_turned(&mut self, encoder: Encoder, raw: u8) {
        match (self.state.mode, encoder) {
            (Mode::Scale, Encoder::Track(0)) => {
                let delta = decode_delta(raw, SELECT_CAP);
                self.select_scale(delta);
            }
            (_, Encoder::Tempo) => self.tempo_encoder(raw),
            (Mode::Track, Encoder::Track(index)) => self.track_encoder(index, raw),
            (Mode::Transport, Encoder::Track(index)) => match index {
                0 => self.send_delta(ChannelId::Transport, MessageType::Tempo, raw, TEMPO_CAP),
                1 => self.send_delta(ChannelId::Transport, MessageType::TempoFine, raw, TEMPO_FINE_CAP),
                2 => self.send_delta(ChannelId::Transport, MessageType::Scrub, raw, SCRUB_CAP),
                _ => {}
            },
            (mode, Encoder::Track(index)) => {
                if let Some((channel, midi_channel)) = mode.forward_target() {
                    let message = cc_message(midi_channel, ENCODER_FORWARD_BASE_CC + index as u8, raw);
                    let _ = self.channels.send_raw(channel, &message);
                }
            }
            (_, Encoder::Swing | Encoder::Master) => {
                log::trace!("Bridge: {:?} encoder not mapped", encoder);
            }
        }
    }

    /// Tempo, or fine tempo with shift held
    fn tempo_encoder(&mut self, raw: u8) {
        if self.state.shift_held {
            self.send_delta(ChannelId::Transport, MessageType::TempoFine, raw, TEMPO_FINE_CAP);
        } else {
            self.send_delta(ChannelId::Transport, MessageType::Tempo, raw, TEMPO_CAP);
        }
    }

    fn track_encoder(&mut self, index: usize, raw: u8) {
        match index {
            0 => self.send_delta(ChannelId::Mixer, MessageType::TrackSelect, raw, SELECT_CAP),
            1 => self.send_delta(ChannelId::Devices, MessageType::DeviceSelect, raw, SELECT_CAP),
            2 => self.tempo_encoder(raw),
            3 => self.send_delta(ChannelId::Transport, MessageType::Scrub, raw, SCRUB_CAP),
            _ => {
                let delta = decode_delta(raw, VOLUME_CAP);
                if delta != 0 {
                    let track = (self.state.bank_start() + index - 4) as u8;
                    self.send(Envelope::indexed_value(
                        ChannelId::Mixer,
                        MessageType::TrackVolume,
                        track,
                        encode_delta(delta),
                    ));
                }
            }
        }
    }

    // Scale mode

    fn scale_button(&mut self, row: Row, index: usize) {
        match (row, index) {
            (Row::Upper, i) => self.state.root_pitch_class = i as u8,
            (Row::Lower, i @ 0..=3) => self.state.root_pitch_class = 8 + i as u8,
            (Row::Lower, 4) => self.state.in_key = !self.state.in_key,
            (Row::Lower, 5) => self.state.scheme = self.state.scheme.next(),
            (Row::Lower, 6) => return self.select_scale(-1),
            (Row::Lower, _) => return self.select_scale(1),
        }
        self.apply_scale();
    }

    /// Step through the scale catalogue (clamped at both ends)
    fn select_scale(&mut self, delta: i32) {
        if delta == 0 {
            return;
        }
        let last = SCALES.len() as i32 - 1;
        let index = (self.state.scale_index as i32 + delta).clamp(0, last) as usize;
        if index != self.state.scale_index {
            self.state.scale_index = index;
            self.apply_scale();
        }
    }
}
