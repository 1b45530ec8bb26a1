//! DAW feedback
//!
//! Applies envelopes and raw CC from the DAW to the mirrored state. Indices
//! the surface doesn't have (tracks or parameters past 8, lines past 4) are
//! ignored.

use super::state::{TransportFlags, TRACK_COUNT};
use super::{Bridge, Mode};
use crate::channels::Inbound;
use crate::codec::{ChannelId, Envelope, MessageType};
use crate::display::LINE_COUNT;
use crate::surface::Button;
use midly::live::LiveEvent;
use midly::MidiMessage as RawMessage;

impl Bridge {
    /// Handle one message received on a DAW channel
    pub fn handle_inbound(&mut self, channel: ChannelId, message: Inbound) {
        match message {
            Inbound::Envelope(envelope) => self.apply_envelope(&envelope),
            Inbound::Raw(bytes) => self.apply_raw(channel, &bytes),
        }
        self.refresh_surface();
    }

    fn apply_envelope(&mut self, envelope: &Envelope) {
        let state = &mut self.state;
        match envelope.kind {
            MessageType::Play => {
                if let Some(on) = envelope.as_flag() {
                    state.transport.playing = on;
                }
            }
            MessageType::Record => {
                if let Some(on) = envelope.as_flag() {
                    state.transport.recording = on;
                }
            }
            MessageType::Loop => {
                if let Some(on) = envelope.as_flag() {
                    state.transport.looping = on;
                }
            }
            MessageType::Metronome => {
                if let Some(on) = envelope.as_flag() {
                    state.transport.metronome = on;
                }
            }
            MessageType::Stop => {
                state.transport.playing = false;
                state.transport.recording = false;
            }
            MessageType::TransportState => {
                if let Some(bits) = envelope.payload.first() {
                    state.transport = TransportFlags::from_bits(*bits);
                }
            }
            MessageType::TempoText => state.tempo_text = envelope.text_from(0).trim().to_string(),

            MessageType::DeviceName => state.device_name = envelope.text_from(0),
            MessageType::ParamName => match envelope.index().and_then(|i| state.param_mut(i)) {
                Some(param) => param.name = envelope.text_from(1),
                None => {
                    log::debug!("[DAW IN] ParamName index out of range");
                    return;
                }
            },
            MessageType::ParamValue => match envelope.index().and_then(|i| state.param_mut(i)) {
                Some(param) => param.value = envelope.text_from(1),
                None => {
                    log::debug!("[DAW IN] ParamValue index out of range");
                    return;
                }
            },
            MessageType::ParamPage => {
                if let Some(page) = envelope.payload.first() {
                    state.param_page = *page;
                }
            }

            MessageType::TrackName => match envelope.index().and_then(|i| state.track_mut(i)) {
                Some(track) => track.name = envelope.text_from(1),
                None => {
                    log::debug!("[DAW IN] TrackName index out of range");
                    return;
                }
            },
            MessageType::TrackVolume
            | MessageType::TrackPan
            | MessageType::TrackMute
            | MessageType::TrackSolo => {
                let (Some(index), Some(value)) = (envelope.index(), envelope.value()) else {
                    return;
                };
                let Some(track) = state.track_mut(index) else {
                    log::debug!("[DAW IN] {:?} for unknown track {}", envelope.kind, index);
                    return;
                };
                match envelope.kind {
                    MessageType::TrackVolume => track.volume = value,
                    MessageType::TrackPan => track.pan = value,
                    MessageType::TrackMute => track.mute = value != 0,
                    _ => track.solo = value != 0,
                }
            }
            MessageType::TrackSelected => {
                state.selected_track = envelope.index().filter(|i| *i < TRACK_COUNT);
            }

            // The DAW writes the display directly except while we own it
            MessageType::DisplayLine => {
                if state.mode == Mode::Scale {
                    return;
                }
                let Some(line) = envelope.index().filter(|line| *line < LINE_COUNT) else {
                    log::debug!("[DAW IN] DisplayLine index out of range");
                    return;
                };
                let text = envelope.text_from(1);
                self.display.set_line(line, &text);
                self.daw_lines[line] = Some(text);
                return;
            }
            MessageType::DisplayClear => {
                if state.mode != Mode::Scale {
                    self.daw_lines = Default::default();
                    self.display.clear();
                }
                return;
            }

            MessageType::Hello => {
                log::info!("[DAW IN] {} connected on {:?}", envelope.text_from(0), envelope.channel);
                self.resync_surface();
            }
            MessageType::RefreshRequest => self.resync_surface(),
            MessageType::Goodbye => {
                log::info!("[DAW IN] DAW left on {:?}", envelope.channel);
                state.reset_daw_state();
                self.daw_lines = Default::default();
            }

            MessageType::Tempo
            | MessageType::TempoFine
            | MessageType::Scrub
            | MessageType::TapTempo
            | MessageType::DeviceSelect
            | MessageType::TrackSelect => {
                log::debug!("[DAW IN] {:?} is surface-to-DAW only, ignoring", envelope.kind);
                return;
            }
        }
        self.needs_render = true;
    }

    /// Resend every LED and display line on the next refresh
    fn resync_surface(&mut self) {
        self.leds.invalidate();
        self.display.invalidate();
    }

    /// Raw CC feedback for the transport buttons
    fn apply_raw(&mut self, channel: ChannelId, bytes: &[u8]) {
        let Ok(LiveEvent::Midi {
            message: RawMessage::Controller { controller, value },
            ..
        }) = LiveEvent::parse(bytes)
        else {
            log::trace!("[DAW IN] {:?} raw {:02X?} ignored", channel, bytes);
            return;
        };

        let on = value.as_int() > 0;
        let flags = &mut self.state.transport;
        match Button::from_cc(controller.as_int()) {
            Some(Button::Play) => flags.playing = on,
            Some(Button::Record) => flags.recording = on,
            Some(Button::Loop) => flags.looping = on,
            Some(Button::Metronome) => flags.metronome = on,
            _ => {
                log::trace!("[DAW IN] {:?} CC {} ignored", channel, controller.as_int());
                return;
            }
        }
        self.needs_render = true;
    }
}
