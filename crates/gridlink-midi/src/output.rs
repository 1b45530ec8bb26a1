//! Byte sinks and change-tracked LED output
//!
//! Everything the bridge writes (surface LEDs, display SysEx, notes, DAW
//! channel traffic) goes through a [`MidiSink`]. LED writes are tracked so
//! only changed values reach the hardware.

use midir::MidiOutputConnection;
use std::collections::HashMap;

/// Error returned by a failed send
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("MIDI send failed: {0}")]
pub struct SendError(pub String);

/// Fire-and-forget byte message sink
pub trait MidiSink {
    /// Send one complete MIDI message
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), SendError>;
}

impl MidiSink for MidiOutputConnection {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        self.send(bytes).map_err(|e| SendError(e.to_string()))
    }
}

/// Queue-backed sink (used by the loopback backend and in tests)
impl MidiSink for flume::Sender<Vec<u8>> {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        self.try_send(bytes.to_vec())
            .map_err(|e| SendError(e.to_string()))
    }
}

/// Sink that discards everything (used when a port could not be opened)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MidiSink for NullSink {
    fn send_bytes(&mut self, _bytes: &[u8]) -> Result<(), SendError> {
        Ok(())
    }
}

/// Build a note-on message (velocity 0 is sent as note-off)
pub fn note_message(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    if velocity > 0 {
        [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
    } else {
        [0x80 | (channel & 0x0F), note & 0x7F, 0]
    }
}

/// Build a control-change message
pub fn cc_message(channel: u8, cc: u8, value: u8) -> [u8; 3] {
    [0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
}

/// Addressable LED on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedAddress {
    /// Pad LED, addressed by the pad's note number
    Pad(u8),
    /// Button LED, addressed by the button's CC number
    Button(u8),
}

impl LedAddress {
    fn message(&self, value: u8) -> [u8; 3] {
        match self {
            Self::Pad(note) => note_message(0, *note, value),
            Self::Button(cc) => cc_message(0, *cc, value),
        }
    }
}

/// LED writer with change detection
#[derive(Debug, Default)]
pub struct LedWriter {
    /// Last sent values (to avoid redundant sends)
    last_values: HashMap<LedAddress, u8>,
}

impl LedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send an LED value if it differs from the last sent one
    ///
    /// Returns true if a message was sent.
    pub fn set(&mut self, sink: &mut dyn MidiSink, address: LedAddress, value: u8) -> bool {
        if self.last_values.get(&address) == Some(&value) {
            return false;
        }
        self.force(sink, address, value)
    }

    /// Send an LED value regardless of the tracked state
    pub fn force(&mut self, sink: &mut dyn MidiSink, address: LedAddress, value: u8) -> bool {
        log::trace!("[HW OUT] LED {:?} = {}", address, value);
        if let Err(e) = sink.send_bytes(&address.message(value)) {
            log::warn!("LED output: Failed to send {:?}: {}", address, e);
            return false;
        }
        self.last_values.insert(address, value);
        true
    }

    /// Last value sent to an LED
    pub fn value(&self, address: LedAddress) -> Option<u8> {
        self.last_values.get(&address).copied()
    }

    /// Forget tracked values so the next writes are all sent
    pub fn invalidate(&mut self) {
        self.last_values.clear();
    }

    /// Turn off every LED that was lit
    pub fn clear_all(&mut self, sink: &mut dyn MidiSink) {
        let lit: Vec<_> = self
            .last_values
            .iter()
            .filter(|(_, value)| **value != 0)
            .map(|(address, _)| *address)
            .collect();
        for address in lit {
            self.force(sink, address, 0);
        }
        self.last_values.clear();
    }
}
