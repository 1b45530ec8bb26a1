//! Bridge core
//!
//! Owns the surface mode, the mirrored DAW state, the display buffer and the
//! LED state, and routes every event between the surface and the DAW.
//!
//! # Event loop
//!
//! ```text
//! surface → flume queue ─┐
//!                        ├→ Bridge::run_once → handlers → ChannelManager → DAW
//! DAW → ChannelManager ──┘                             → LEDs / display → surface
//! ```
//!
//! All state is mutated from [`Bridge::run_once`] only. Port callbacks just
//! queue bytes.

mod feedback;
mod leds;
mod mode;
mod routing;
mod state;

pub use mode::{Grid, Mode};
pub use state::{BridgeState, PadMode, ParamState, TrackState, TransportFlags, PARAM_COUNT, TRACK_COUNT};

use crate::channels::ChannelManager;
use crate::codec::{ChannelId, Envelope, MessageType};
use crate::config::BridgeConfig;
use crate::display::{DisplayBuffer, LINE_COUNT};
use crate::layout::{IsomorphicLayout, LayoutConfig};
use crate::midi::connection::InputGuard;
use crate::midi::{open_note_output, MidirBackend, SurfaceConnection};
use crate::output::{note_message, LedWriter, MidiSink, NullSink};
use crate::scale;
use crate::surface::SurfaceEvent;
use crate::BridgeError;
use flume::Receiver;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Where a held pad's note went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadTarget {
    /// Note output port
    Notes,
    /// Drum trigger on the devices channel
    Drums,
}

/// A pad currently held down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePad {
    pub note: u8,
    pub target: PadTarget,
}

/// Surface-side I/O handed to the bridge
pub struct SurfaceIo {
    /// Raw messages from the surface
    pub inbound: Receiver<Vec<u8>>,
    /// LEDs and display
    pub output: Box<dyn MidiSink>,
    /// Note output port
    pub notes: Box<dyn MidiSink>,
    /// Keeps the surface input connection alive
    pub guard: Option<InputGuard>,
}

pub struct Bridge {
    config: BridgeConfig,
    channels: ChannelManager,
    surface: SurfaceIo,
    state: BridgeState,
    layout: IsomorphicLayout,
    display: DisplayBuffer,
    /// Lines written by the DAW, kept over local renders until the mode changes
    daw_lines: [Option<String>; LINE_COUNT],
    leds: LedWriter,
    /// Held pads by pad note, with the note they are sounding
    active_pads: HashMap<u8, ActivePad>,
    /// Mode display needs redrawing before the next flush
    needs_render: bool,
    last_refresh: Option<Instant>,
    shut_down: bool,
}

impl Bridge {
    pub fn new(config: BridgeConfig, channels: ChannelManager, surface: SurfaceIo) -> Self {
        let state = BridgeState::new(&config);
        let (row_step, col_step) = config.layout.scheme.intervals();
        let layout = IsomorphicLayout::new(LayoutConfig {
            root_note: config.layout.root_note,
            row_step,
            col_step,
            scale: state.scale().intervals.to_vec(),
            in_key: state.in_key,
            root_pitch_class: state.root_pitch_class,
        });

        Self {
            config,
            channels,
            surface,
            state,
            layout,
            display: DisplayBuffer::new(),
            daw_lines: Default::default(),
            leds: LedWriter::new(),
            active_pads: HashMap::new(),
            needs_render: true,
            last_refresh: None,
            shut_down: false,
        }
    }

    /// Connect the surface, create the DAW ports and build a bridge
    ///
    /// The surface is required. The note port and individual channels may
    /// fail; at least one channel must open.
    pub fn connect(config: BridgeConfig) -> Result<Self, BridgeError> {
        let client = config.ports.client_name.clone();
        let (surface_tx, surface_rx) = flume::unbounded();
        let surface = SurfaceConnection::connect(&client, &config.ports.surface_match, surface_tx)?;

        let notes: Box<dyn MidiSink> = match open_note_output(&client, &config.ports.notes) {
            Ok(connection) => Box::new(connection),
            Err(e) => {
                log::warn!("Bridge: note output unavailable, pads will be silent: {}", e);
                Box::new(NullSink)
            }
        };

        let mut channels = ChannelManager::new(Box::new(MidirBackend::new(&client)));
        if !channels.open_all(&config.ports.channel_names()) {
            if !ChannelId::ALL.iter().any(|c| channels.is_open(*c)) {
                return Err(BridgeError::NoChannels);
            }
            log::warn!("Bridge: running with some DAW channels missing");
        }

        let SurfaceConnection { input, output, .. } = surface;
        Ok(Self::new(
            config,
            channels,
            SurfaceIo {
                inbound: surface_rx,
                output: Box::new(output),
                notes,
                guard: Some(input),
            },
        ))
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn layout(&self) -> &IsomorphicLayout {
        &self.layout
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }

    pub fn active_pads(&self) -> &HashMap<u8, ActivePad> {
        &self.active_pads
    }

    pub fn channels_mut(&mut self) -> &mut ChannelManager {
        &mut self.channels
    }

    /// Greet the DAW and draw the welcome page
    pub fn start(&mut self) {
        let hello = concat!("gridlink ", env!("CARGO_PKG_VERSION"));
        for channel in ChannelId::ALL {
            let _ = self.channels.send(&Envelope::text(channel, MessageType::Hello, hello));
        }
        self.leds.invalidate();
        self.display.invalidate();
        self.needs_render = true;
        self.refresh_surface();
        log::info!("Bridge: started in {} mode", self.state.mode.name());
    }

    /// One pass of the event loop
    ///
    /// Drains the surface queue, then every DAW channel, then runs the
    /// refresh timer. Returns the number of messages handled.
    pub fn run_once(&mut self, now: Instant) -> usize {
        let hardware: Vec<Vec<u8>> = self.surface.inbound.try_iter().collect();
        let inbound = self.channels.drain();
        let handled = hardware.len() + inbound.len();

        for bytes in &hardware {
            self.handle_hardware(bytes);
        }
        for (channel, message) in inbound {
            self.handle_inbound(channel, message);
        }
        self.tick(now);
        handled
    }

    /// Handle one raw message from the surface
    pub fn handle_hardware(&mut self, bytes: &[u8]) {
        match SurfaceEvent::parse(bytes) {
            Some(event) => {
                log::debug!("[HW IN] {:?}", event);
                self.handle_surface_event(event);
            }
            None => log::trace!("[HW IN] ignored {:02X?}", bytes),
        }
        self.refresh_surface();
    }

    /// Send a RefreshRequest on every channel when the interval has passed
    ///
    /// Skipped while the bridge owns the display (scale mode). Returns true
    /// if requests were sent.
    pub fn tick(&mut self, now: Instant) -> bool {
        let interval = Duration::from_millis(self.config.refresh_interval_ms);
        let Some(last) = self.last_refresh else {
            self.last_refresh = Some(now);
            return false;
        };
        if now.saturating_duration_since(last) < interval {
            return false;
        }
        self.last_refresh = Some(now);
        if self.state.mode == Mode::Scale {
            return false;
        }
        for channel in ChannelId::ALL {
            let _ = self
                .channels
                .send(&Envelope::empty(channel, MessageType::RefreshRequest));
        }
        true
    }

    /// Switch mode: release pads, then redraw pads, display and mode LEDs
    pub fn enter_mode(&mut self, mode: Mode) {
        if mode == self.state.mode {
            return;
        }
        self.release_all_pads();
        let from = self.state.mode;
        self.state.set_mode(mode);
        self.daw_lines = Default::default();
        if let Some(pad_mode) = mode.pad_mode() {
            self.state.pad_mode = pad_mode;
        }
        self.needs_render = true;
        log::info!("Bridge: {} → {}", from.name(), mode.name());
    }

    /// Leave a transient mode for the mode it was entered from
    pub fn exit_transient_mode(&mut self) {
        if self.state.mode.is_transient() {
            let previous = self.state.previous_mode;
            self.enter_mode(previous);
        }
    }

    /// Apply the key and scale in the state to the layout
    fn apply_scale(&mut self) {
        let intervals = scale::scale(self.state.scale_index).intervals;
        self.layout.set_scale(self.state.root_pitch_class, intervals);
        self.layout.set_in_key(self.state.in_key);
        self.layout.set_scheme(self.state.scheme);
        self.needs_render = true;
    }

    fn send_pad_note(&mut self, pad: ActivePad, velocity: u8) {
        match pad.target {
            PadTarget::Notes => {
                let message = note_message(self.config.note_channel, pad.note, velocity);
                match self.surface.notes.send_bytes(&message) {
                    Ok(()) => log::debug!("[NOTE OUT] {:02X?}", message),
                    Err(e) => log::warn!("[NOTE OUT] dropped {:02X?}: {}", message, e),
                }
            }
            PadTarget::Drums => {
                let message = note_message(self.config.drum_channel, pad.note, velocity);
                let _ = self.channels.send_raw(ChannelId::Devices, &message);
            }
        }
    }

    /// Note-off for every held pad
    fn release_all_pads(&mut self) {
        let held: Vec<ActivePad> = self.active_pads.drain().map(|(_, pad)| pad).collect();
        for pad in held {
            self.send_pad_note(pad, 0);
        }
    }

    /// Redraw what changed and push it to the surface
    fn refresh_surface(&mut self) {
        if self.needs_render {
            self.state.mode.render(&self.state, &self.layout, &mut self.display);
            if self.state.mode != Mode::Scale {
                for (line, text) in self.daw_lines.iter().enumerate() {
                    if let Some(text) = text {
                        self.display.set_line(line, text);
                    }
                }
            }
            self.needs_render = false;
        }
        self.update_leds();
        self.display.flush(self.surface.output.as_mut());
    }

    /// Clear the surface, say goodbye and close every channel
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        log::info!("Bridge: shutting down");

        self.release_all_pads();
        self.leds.clear_all(self.surface.output.as_mut());
        self.display.clear();
        self.display.flush(self.surface.output.as_mut());

        for channel in ChannelId::ALL {
            let _ = self.channels.send(&Envelope::empty(channel, MessageType::Goodbye));
        }
        self.channels.close_all();
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MemoryBackend;
    use crate::drum::DrumProfile;
    use crate::layout::LayoutScheme;
    use crate::output::LedAddress;
    use crate::scale::SCALES;
    use flume::Sender;

    struct Harness {
        bridge: Bridge,
        backend: MemoryBackend,
        surface_in: Sender<Vec<u8>>,
        surface_out: Receiver<Vec<u8>>,
        notes_out: Receiver<Vec<u8>>,
    }

    impl Harness {
        fn new() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let config = BridgeConfig::default();
            let backend = MemoryBackend::new();
            let mut channels = ChannelManager::new(Box::new(backend.clone()));
            assert!(channels.open_all(&config.ports.channel_names()));

            let (surface_in, inbound) = flume::unbounded();
            let (output, surface_out) = flume::unbounded::<Vec<u8>>();
            let (notes, notes_out) = flume::unbounded::<Vec<u8>>();
            let mut bridge = Bridge::new(
                config,
                channels,
                SurfaceIo {
                    inbound,
                    output: Box::new(output),
                    notes: Box::new(notes),
                    guard: None,
                },
            );
            bridge.start();
            backend.take_sent();

            let harness = Self {
                bridge,
                backend,
                surface_in,
                surface_out,
                notes_out,
            };
            harness.surface_messages();
            harness
        }

        fn press(&mut self, cc: u8) {
            self.bridge.handle_hardware(&[0xB0, cc, 127]);
        }

        fn release(&mut self, cc: u8) {
            self.bridge.handle_hardware(&[0xB0, cc, 0]);
        }

        fn turn(&mut self, cc: u8, raw: u8) {
            self.bridge.handle_hardware(&[0xB0, cc, raw]);
        }

        fn pad_on(&mut self, pad: u8, velocity: u8) {
            self.bridge.handle_hardware(&[0x90, pad, velocity]);
        }

        fn pad_off(&mut self, pad: u8) {
            self.bridge.handle_hardware(&[0x80, pad, 0]);
        }

        fn inject(&mut self, envelope: Envelope) {
            assert!(self.backend.inject_envelope(&envelope));
            self.bridge.run_once(Instant::now());
        }

        fn surface_messages(&self) -> Vec<Vec<u8>> {
            self.surface_out.try_iter().collect()
        }

        /// LED messages only (display SysEx filtered out)
        fn led_messages(&self) -> Vec<Vec<u8>> {
            self.surface_messages()
                .into_iter()
                .filter(|m| m.len() == 3)
                .collect()
        }

        fn notes(&self) -> Vec<Vec<u8>> {
            self.notes_out.try_iter().collect()
        }

        fn led(&self, address: LedAddress) -> Option<u8> {
            self.bridge.leds.value(address)
        }
    }

    const NOTE_BUTTON: u8 = 50;
    const SESSION_BUTTON: u8 = 51;
    const SCALE_BUTTON: u8 = 58;
    const USER_BUTTON: u8 = 59;
    const TRACK_BUTTON: u8 = 112;
    const DEVICE_BUTTON: u8 = 110;
    const VOLUME_BUTTON: u8 = 114;
    const PAN_BUTTON: u8 = 115;
    const PLAY_BUTTON: u8 = 85;
    const SHIFT_BUTTON: u8 = 49;
    const OCTAVE_UP_BUTTON: u8 = 55;

    #[test]
    fn test_start_greets_every_channel() {
        let backend = MemoryBackend::new();
        let config = BridgeConfig::default();
        let mut channels = ChannelManager::new(Box::new(backend.clone()));
        channels.open_all(&config.ports.channel_names());
        let (_tx, inbound) = flume::unbounded();
        let (output, surface_out) = flume::unbounded::<Vec<u8>>();
        let mut bridge = Bridge::new(
            config,
            channels,
            SurfaceIo {
                inbound,
                output: Box::new(output),
                notes: Box::new(NullSink),
                guard: None,
            },
        );
        bridge.start();

        let sent = backend.take_envelopes();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|e| e.kind == MessageType::Hello));
        assert!(sent[0].text_from(0).starts_with("gridlink "));

        // Every line of the welcome page goes out
        let sysex = surface_out.try_iter().filter(|m| m[0] == 0xF0).count();
        assert_eq!(sysex, 4);
        assert_eq!(bridge.state().mode, Mode::Welcome);
    }

    #[test]
    fn test_welcome_mode_pads_are_silent() {
        let mut h = Harness::new();
        h.pad_on(36, 100);
        assert!(h.notes().is_empty());
        assert!(h.bridge.active_pads().is_empty());
    }

    #[test]
    fn test_pad_plays_note_and_lights() {
        let mut h = Harness::new();
        h.press(NOTE_BUTTON);
        assert_eq!(h.bridge.state().mode, Mode::Note);
        assert_eq!(h.led(LedAddress::Pad(36)), Some(45));
        h.surface_messages();

        h.pad_on(36, 100);
        assert_eq!(h.notes(), vec![vec![0x90, 36, 100]]);
        assert_eq!(h.led_messages(), vec![vec![0x90, 36, 21]]);
        assert_eq!(
            h.bridge.active_pads().get(&36),
            Some(&ActivePad {
                note: 36,
                target: PadTarget::Notes
            })
        );

        h.pad_off(36);
        assert_eq!(h.notes(), vec![vec![0x80, 36, 0]]);
        assert_eq!(h.led_messages(), vec![vec![0x90, 36, 45]]);
        assert!(h.bridge.active_pads().is_empty());
    }

    #[test]
    fn test_soft_pad_raised_to_floor_and_accent() {
        let mut h = Harness::new();
        h.press(NOTE_BUTTON);
        h.pad_on(36, 5);
        assert_eq!(h.notes(), vec![vec![0x90, 36, 40]]);
        h.pad_off(36);
        h.notes();

        h.press(57);
        assert!(h.bridge.state().accent);
        h.pad_on(36, 5);
        assert_eq!(h.notes(), vec![vec![0x90, 36, 127]]);
    }

    #[test]
    fn test_held_note_survives_octave_shift() {
        let mut h = Harness::new();
        h.press(NOTE_BUTTON);
        h.pad_on(36, 100);
        h.press(OCTAVE_UP_BUTTON);
        assert_eq!(h.bridge.layout().root(), 48);

        h.notes();
        h.pad_off(36);
        // Release goes to the note that was sounding, not the new one
        assert_eq!(h.notes(), vec![vec![0x80, 36, 0]]);
    }

    #[test]
    fn test_mode_change_releases_held_pads() {
        let mut h = Harness::new();
        h.press(NOTE_BUTTON);
        h.pad_on(37, 90);
        h.pad_on(44, 90);
        let held: Vec<u8> = h.bridge.active_pads().values().map(|p| p.note).collect();
        assert_eq!(held.len(), 2);
        h.notes();

        h.press(TRACK_BUTTON);
        assert_eq!(h.bridge.state().mode, Mode::Track);
        assert!(h.bridge.active_pads().is_empty());
        let notes = h.notes();
        assert!(notes.iter().all(|m| m[0] == 0x80));
        let mut released: Vec<u8> = notes.iter().map(|m| m[1]).collect();
        let mut expected = held;
        released.sort();
        expected.sort();
        assert_eq!(released, expected);
    }

    #[test]
    fn test_note_pads_keep_playing_in_menu_modes() {
        let mut h = Harness::new();
        h.press(NOTE_BUTTON);
        h.press(VOLUME_BUTTON);
        h.pad_on(36, 100);
        assert_eq!(h.notes(), vec![vec![0x90, 36, 100]]);
    }

    #[test]
    fn test_scale_mode_selects_root() {
        let mut h = Harness::new();
        h.press(NOTE_BUTTON);
        h.press(SCALE_BUTTON);
        assert_eq!(h.bridge.state().mode, Mode::Scale);
        assert_eq!(h.led(LedAddress::Button(20)), Some(10));
        // C major: pad 36 plays C, pad 38 plays D
        assert_eq!(h.led(LedAddress::Pad(36)), Some(45));
        assert_eq!(h.led(LedAddress::Pad(38)), Some(3));

        // Upper row button 2 picks D
        h.press(22);
        assert_eq!(h.bridge.state().root_pitch_class, 2);
        assert_eq!(h.bridge.state().mode, Mode::Scale);
        assert_eq!(h.bridge.layout().config().root_pitch_class, 2);
        assert_eq!(h.led(LedAddress::Button(22)), Some(10));
        assert_eq!(h.led(LedAddress::Button(20)), Some(7));
        // D major: D is the root and C falls outside the scale
        assert_eq!(h.led(LedAddress::Pad(38)), Some(45));
        assert_eq!(h.led(LedAddress::Pad(36)), Some(1));
        assert_eq!(h.led(LedAddress::Pad(37)), Some(3));
        assert!(h.bridge.display().field_text(2, 2).unwrap_or_default().contains(">D"));

        // Row presses in scale mode never reach the DAW
        assert!(h.backend.take_sent().is_empty());

        h.press(SCALE_BUTTON);
        assert_eq!(h.bridge.state().mode, Mode::Note);
    }

    #[test]
    fn test_scale_encoder_and_buttons() {
        let mut h = Harness::new();
        h.press(SCALE_BUTTON);

        h.turn(71, 3);
        assert_eq!(h.bridge.state().scale_index, 1);
        assert_eq!(h.bridge.layout().config().scale, SCALES[1].intervals.to_vec());

        // Clamped at the start of the catalogue
        h.turn(71, 70);
        h.turn(71, 70);
        assert_eq!(h.bridge.state().scale_index, 0);

        // Lower row 4 toggles in-key, 5 cycles the layout scheme
        h.press(106);
        assert!(h.bridge.state().in_key);
        assert!(h.bridge.layout().in_key());
        h.press(107);
        assert_eq!(h.bridge.layout().scheme(), Some(LayoutScheme::Thirds));
        assert!(h.backend.take_sent().is_empty());
    }

    #[test]
    fn test_track_mode_encoders() {
        let mut h = Harness::new();
        h.press(TRACK_BUTTON);

        // Fast turn still moves one track
        h.turn(71, 3);
        h.turn(72, 70);
        let sent = h.backend.take_envelopes();
        assert_eq!(sent.len(), 2);
        assert_eq!((sent[0].channel, sent[0].kind), (ChannelId::Mixer, MessageType::TrackSelect));
        assert_eq!(sent[0].as_delta(), Some(1));
        assert_eq!((sent[1].channel, sent[1].kind), (ChannelId::Devices, MessageType::DeviceSelect));
        assert_eq!(sent[1].as_delta(), Some(-1));

        // Shift turns the tempo encoder into fine tempo
        h.turn(73, 2);
        h.press(SHIFT_BUTTON);
        h.turn(73, 2);
        h.release(SHIFT_BUTTON);
        let sent = h.backend.take_envelopes();
        assert_eq!(sent[0].kind, MessageType::Tempo);
        assert_eq!(sent[0].as_delta(), Some(2));
        assert_eq!(sent[1].kind, MessageType::TempoFine);
        assert_eq!(sent[1].as_delta(), Some(1));

        // Encoders 4-7 drive track volumes of the selected bank
        h.inject(Envelope::new(ChannelId::Mixer, MessageType::TrackSelected, vec![5]));
        h.backend.take_sent();
        h.turn(77, 2);
        let sent = h.backend.take_envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageType::TrackVolume);
        assert_eq!(sent[0].payload, vec![6, 66]);

        // Zero turns send nothing
        h.turn(71, 64);
        assert!(h.backend.take_sent().is_empty());
    }

    #[test]
    fn test_device_and_mixer_modes_forward_raw_cc() {
        let mut h = Harness::new();
        h.press(DEVICE_BUTTON);
        h.turn(73, 5);
        h.press(103);
        h.release(103);
        assert_eq!(
            h.backend.take_sent(),
            vec![
                (ChannelId::Devices, vec![0xB0, 18, 5]),
                (ChannelId::Devices, vec![0xB0, 111, 127]),
                (ChannelId::Devices, vec![0xB0, 111, 0]),
            ]
        );

        h.press(VOLUME_BUTTON);
        h.press(21);
        assert_eq!(h.backend.take_sent(), vec![(ChannelId::Mixer, vec![0xB0, 103, 127])]);

        h.press(PAN_BUTTON);
        h.turn(71, 65);
        assert_eq!(h.backend.take_sent(), vec![(ChannelId::Mixer, vec![0xB1, 16, 65])]);
    }

    #[test]
    fn test_transport_is_optimistic_then_corrected() {
        let mut h = Harness::new();
        h.press(PLAY_BUTTON);
        assert!(h.bridge.state().transport.playing);
        assert_eq!(h.led(LedAddress::Button(PLAY_BUTTON)), Some(4));
        let sent = h.backend.take_envelopes();
        assert_eq!(sent, vec![Envelope::flag(ChannelId::Transport, MessageType::Play, true)]);

        // The DAW disagrees
        h.inject(Envelope::flag(ChannelId::Transport, MessageType::Play, false));
        assert!(!h.bridge.state().transport.playing);
        assert_eq!(h.led(LedAddress::Button(PLAY_BUTTON)), Some(1));

        h.inject(Envelope::new(ChannelId::Transport, MessageType::TransportState, vec![0b1010]));
        let flags = h.bridge.state().transport;
        assert!(flags.recording && flags.metronome);
        assert!(!flags.playing && !flags.looping);
    }

    #[test]
    fn test_raw_transport_feedback() {
        let mut h = Harness::new();
        assert!(h.backend.inject(ChannelId::Transport, vec![0xB0, 90, 127]));
        h.bridge.run_once(Instant::now());
        assert!(h.bridge.state().transport.looping);
    }

    #[test]
    fn test_transport_mode_rows_and_encoders() {
        let mut h = Harness::new();
        h.press(USER_BUTTON);
        assert_eq!(h.bridge.state().mode, Mode::Transport);

        h.press(20);
        h.turn(73, 66);
        let sent = h.backend.take_envelopes();
        assert_eq!(sent[0], Envelope::flag(ChannelId::Transport, MessageType::Play, true));
        assert_eq!(sent[1].kind, MessageType::Scrub);
        assert_eq!(sent[1].as_delta(), Some(-2));
    }

    #[test]
    fn test_mixer_feedback_updates_state_and_display() {
        let mut h = Harness::new();
        h.press(VOLUME_BUTTON);
        h.inject(Envelope::indexed_text(ChannelId::Mixer, MessageType::TrackName, 2, "Bass"));
        h.inject(Envelope::indexed_value(ChannelId::Mixer, MessageType::TrackVolume, 2, 127));
        h.inject(Envelope::indexed_value(ChannelId::Mixer, MessageType::TrackMute, 2, 1));

        let track = &h.bridge.state().tracks[2];
        assert_eq!(track.name, "Bass");
        assert_eq!(track.volume, 127);
        assert!(track.mute);
        assert!(h.bridge.display().field_text(0, 2).unwrap_or_default().starts_with("Bass"));
        assert!(h.bridge.display().field_text(1, 2).unwrap_or_default().contains("100%"));
    }

    #[test]
    fn test_out_of_range_feedback_ignored() {
        let mut h = Harness::new();
        h.inject(Envelope::indexed_text(ChannelId::Mixer, MessageType::TrackName, 9, "Nope"));
        h.inject(Envelope::indexed_text(ChannelId::Devices, MessageType::ParamName, 12, "Nope"));
        h.inject(Envelope::new(ChannelId::Mixer, MessageType::TrackSelected, vec![20]));
        assert!(h.bridge.state().tracks.iter().all(|t| t.name.is_empty()));
        assert!(h.bridge.state().params.iter().all(|p| p.name.is_empty()));
        assert_eq!(h.bridge.state().selected_track, None);
    }

    #[test]
    fn test_device_feedback() {
        let mut h = Harness::new();
        h.press(DEVICE_BUTTON);
        h.inject(Envelope::text(ChannelId::Devices, MessageType::DeviceName, "Wavetable"));
        h.inject(Envelope::indexed_text(ChannelId::Devices, MessageType::ParamName, 0, "Cutoff"));
        h.inject(Envelope::indexed_text(ChannelId::Devices, MessageType::ParamValue, 0, "1.2 kHz"));

        let state = h.bridge.state();
        assert_eq!(state.device_name, "Wavetable");
        assert_eq!(state.params[0].name, "Cutoff");
        assert_eq!(state.params[0].value, "1.2 kHz");
    }

    #[test]
    fn test_display_line_from_daw() {
        let mut h = Harness::new();
        h.press(USER_BUTTON);
        h.inject(Envelope::indexed_text(ChannelId::Transport, MessageType::DisplayLine, 0, "Hello DAW"));
        assert!(h.bridge.display().line_text(0).unwrap_or_default().starts_with("Hello DAW"));

        // Out-of-range lines are dropped
        h.inject(Envelope::indexed_text(ChannelId::Transport, MessageType::DisplayLine, 7, "Nope"));
        assert!(h.bridge.display().line_text(0).unwrap_or_default().starts_with("Hello DAW"));

        // Scale mode owns the display
        h.press(SCALE_BUTTON);
        h.inject(Envelope::indexed_text(ChannelId::Transport, MessageType::DisplayLine, 0, "Other"));
        assert!(!h.bridge.display().line_text(0).unwrap_or_default().starts_with("Other"));
    }

    #[test]
    fn test_daw_display_line_survives_state_updates() {
        let mut h = Harness::new();
        h.press(VOLUME_BUTTON);
        h.inject(Envelope::indexed_text(ChannelId::Transport, MessageType::DisplayLine, 0, "Hello DAW"));
        h.inject(Envelope::indexed_text(ChannelId::Mixer, MessageType::TrackName, 2, "Bass"));
        h.inject(Envelope::text(ChannelId::Transport, MessageType::TempoText, "120.00"));

        assert_eq!(h.bridge.state().tracks[2].name, "Bass");
        assert!(h.bridge.display().line_text(0).unwrap_or_default().starts_with("Hello DAW"));
        // Lines the DAW didn't write still follow the mode page
        assert!(h.bridge.display().field_text(1, 2).unwrap_or_default().contains("%"));

        // A mode change hands the display back to the local page
        h.press(PAN_BUTTON);
        assert!(!h.bridge.display().line_text(0).unwrap_or_default().starts_with("Hello DAW"));
    }

    #[test]
    fn test_daw_display_clear_drops_daw_lines() {
        let mut h = Harness::new();
        h.press(USER_BUTTON);
        h.inject(Envelope::indexed_text(ChannelId::Transport, MessageType::DisplayLine, 1, "From DAW"));
        h.inject(Envelope::empty(ChannelId::Transport, MessageType::DisplayClear));
        h.inject(Envelope::text(ChannelId::Transport, MessageType::TempoText, "98.00"));
        assert!(!h.bridge.display().line_text(1).unwrap_or_default().contains("From DAW"));
    }

    #[test]
    fn test_refresh_tick() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        assert!(!h.bridge.tick(t0));
        assert!(!h.bridge.tick(t0 + Duration::from_millis(500)));
        assert!(h.bridge.tick(t0 + Duration::from_millis(1000)));
        let sent = h.backend.take_envelopes();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|e| e.kind == MessageType::RefreshRequest));

        // No refresh requests while scale mode owns the display
        h.press(SCALE_BUTTON);
        assert!(!h.bridge.tick(t0 + Duration::from_millis(2000)));
        assert!(h.backend.take_sent().is_empty());
    }

    #[test]
    fn test_hello_resyncs_surface() {
        let mut h = Harness::new();
        h.inject(Envelope::text(ChannelId::Transport, MessageType::Hello, "DAW"));
        let messages = h.surface_messages();
        assert_eq!(messages.iter().filter(|m| m[0] == 0xF0).count(), 4);
        assert!(messages.iter().filter(|m| m.len() == 3).count() > 64);
    }

    #[test]
    fn test_goodbye_forgets_daw_state() {
        let mut h = Harness::new();
        h.inject(Envelope::text(ChannelId::Devices, MessageType::DeviceName, "Operator"));
        h.inject(Envelope::flag(ChannelId::Transport, MessageType::Play, true));
        h.inject(Envelope::empty(ChannelId::Transport, MessageType::Goodbye));
        assert!(h.bridge.state().device_name.is_empty());
        assert!(!h.bridge.state().transport.playing);
    }

    #[test]
    fn test_drum_mode_triggers_on_devices_channel() {
        let mut h = Harness::new();
        h.press(SESSION_BUTTON);
        assert_eq!(h.bridge.state().pad_mode, PadMode::Drum);
        assert_eq!(h.led(LedAddress::Pad(36)), Some(13));
        assert_eq!(h.led(LedAddress::Pad(99)), Some(0));

        h.pad_on(36, 100);
        h.pad_off(36);
        assert_eq!(
            h.backend.take_sent(),
            vec![
                (ChannelId::Devices, vec![0x90, 36, 100]),
                (ChannelId::Devices, vec![0x80, 36, 0]),
            ]
        );
        assert!(h.notes().is_empty());

        // Pressing again steps to the next kit
        h.press(SESSION_BUTTON);
        assert_eq!(h.bridge.state().drum_profile, DrumProfile::DrumRack.next());
    }

    #[test]
    fn test_hardware_queue_is_drained_by_run_once() {
        let mut h = Harness::new();
        h.surface_in.send(vec![0xB0, NOTE_BUTTON, 127]).unwrap();
        h.surface_in.send(vec![0x90, 36, 100]).unwrap();
        assert_eq!(h.bridge.run_once(Instant::now()), 2);
        assert_eq!(h.notes(), vec![vec![0x90, 36, 100]]);
    }

    #[test]
    fn test_shutdown_clears_surface_and_says_goodbye() {
        let mut h = Harness::new();
        h.press(NOTE_BUTTON);
        h.pad_on(36, 100);
        h.notes();
        h.surface_messages();

        h.bridge.shutdown();
        assert_eq!(h.notes(), vec![vec![0x80, 36, 0]]);
        let leds = h.led_messages();
        assert!(!leds.is_empty());
        assert!(leds.iter().all(|m| m[2] == 0));

        let sent = h.backend.take_envelopes();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|e| e.kind == MessageType::Goodbye));
        assert!(ChannelId::ALL.iter().all(|c| !h.bridge.channels_mut().is_open(*c)));

        // Second call is a no-op
        h.bridge.shutdown();
        assert!(h.backend.take_sent().is_empty());
        assert!(h.surface_messages().is_empty());
    }
}
