//! Virtual channel manager
//!
//! Owns one bidirectional byte channel per [`ChannelId`]. Port callbacks push
//! raw bytes into a flume queue; the event loop drains the queues with
//! [`ChannelManager::poll`] / [`ChannelManager::drain`], so nothing is ever
//! delivered from inside a driver thread.
//!
//! ```text
//! DAW port → backend callback → flume queue → poll() → Bridge
//! Bridge → send() → codec::encode_frame → ChannelPort → DAW port
//! ```

use crate::codec::{self, ChannelId, CodecError, Envelope, SYSEX_START};
use crate::output::{MidiSink, SendError};
use flume::{Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Error type for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to open {channel:?} channel port '{name}': {reason}")]
    OpenFailed {
        channel: ChannelId,
        name: String,
        reason: String,
    },

    #[error("Channel {0:?} is not open")]
    NotOpen(ChannelId),

    #[error("Encode error: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Send(#[from] SendError),
}

/// An open port pair behind a channel
pub trait ChannelPort: MidiSink {
    /// Release the underlying port(s)
    fn close(self: Box<Self>) {}
}

/// Opens the port pair for a channel
///
/// `inbound` receives every complete message arriving on the port.
pub trait PortBackend {
    fn open(
        &mut self,
        channel: ChannelId,
        name: &str,
        inbound: Sender<Vec<u8>>,
    ) -> Result<Box<dyn ChannelPort>, ChannelError>;
}

/// Message received on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Decoded protocol envelope
    Envelope(Envelope),
    /// Raw channel message (e.g. CC pass-through for LED state)
    Raw(Vec<u8>),
}

type ChannelCallback = Box<dyn FnMut(ChannelId, &Inbound)>;

struct ChannelSlot {
    name: String,
    port: Option<Box<dyn ChannelPort>>,
    inbound_tx: Sender<Vec<u8>>,
    inbound_rx: Receiver<Vec<u8>>,
    callback: Option<ChannelCallback>,
}

impl ChannelSlot {
    fn new() -> Self {
        let (inbound_tx, inbound_rx) = flume::unbounded();
        Self {
            name: String::new(),
            port: None,
            inbound_tx,
            inbound_rx,
            callback: None,
        }
    }
}

/// Manager for the three DAW channels
pub struct ChannelManager {
    backend: Box<dyn PortBackend>,
    slots: [ChannelSlot; 3],
}

impl ChannelManager {
    pub fn new(backend: Box<dyn PortBackend>) -> Self {
        Self {
            backend,
            slots: [ChannelSlot::new(), ChannelSlot::new(), ChannelSlot::new()],
        }
    }

    fn slot(&self, channel: ChannelId) -> &ChannelSlot {
        &self.slots[channel.index()]
    }

    fn slot_mut(&mut self, channel: ChannelId) -> &mut ChannelSlot {
        &mut self.slots[channel.index()]
    }

    /// Open a single channel
    ///
    /// An already-open channel is closed and reopened.
    pub fn open(&mut self, channel: ChannelId, name: &str) -> Result<(), ChannelError> {
        if self.is_open(channel) {
            log::debug!("Channel {}: reopening", channel.name());
            self.close(channel);
        }

        let inbound = self.slot(channel).inbound_tx.clone();
        let port = self.backend.open(channel, name, inbound)?;

        let slot = self.slot_mut(channel);
        slot.name = name.to_string();
        slot.port = Some(port);
        log::info!("Channel {}: opened '{}'", channel.name(), name);
        Ok(())
    }

    /// Open every channel, continuing past failures
    ///
    /// Returns true only if all channels opened.
    pub fn open_all(&mut self, names: &[(ChannelId, String)]) -> bool {
        let mut all_ok = true;
        for (channel, name) in names {
            if let Err(e) = self.open(*channel, name) {
                log::warn!("Channel {}: {}", channel.name(), e);
                all_ok = false;
            }
        }
        all_ok
    }

    /// Close a channel (no-op if not open)
    ///
    /// Anything still queued from the closed session is discarded.
    pub fn close(&mut self, channel: ChannelId) {
        let slot = self.slot_mut(channel);
        if let Some(port) = slot.port.take() {
            port.close();
            let dropped = slot.inbound_rx.drain().count();
            if dropped > 0 {
                log::debug!("Channel {}: discarded {} queued messages", channel.name(), dropped);
            }
            log::info!("Channel {}: closed '{}'", channel.name(), slot.name);
        }
    }

    /// Close every open channel
    pub fn close_all(&mut self) {
        for channel in ChannelId::ALL {
            self.close(channel);
        }
    }

    /// Check if a channel has an open port
    pub fn is_open(&self, channel: ChannelId) -> bool {
        self.slot(channel).port.is_some()
    }

    /// Send an envelope on its channel (fire-and-forget)
    ///
    /// Failures are logged and swallowed; the result is returned for callers
    /// that want to count them.
    pub fn send(&mut self, envelope: &Envelope) -> Result<(), ChannelError> {
        let result = codec::encode_frame(envelope)
            .map_err(ChannelError::from)
            .and_then(|bytes| self.write(envelope.channel, &bytes));
        match &result {
            Ok(()) => log::debug!("[DAW OUT] {:?} {:?} {:?}", envelope.channel, envelope.kind, envelope.payload),
            Err(e) => log::warn!("[DAW OUT] {:?} {:?} dropped: {}", envelope.channel, envelope.kind, e),
        }
        result
    }

    /// Send raw bytes (e.g. a CC) on a channel
    pub fn send_raw(&mut self, channel: ChannelId, bytes: &[u8]) -> Result<(), ChannelError> {
        let result = self.write(channel, bytes);
        match &result {
            Ok(()) => log::debug!("[DAW OUT] {:?} raw {:02X?}", channel, bytes),
            Err(e) => log::warn!("[DAW OUT] {:?} raw dropped: {}", channel, e),
        }
        result
    }

    fn write(&mut self, channel: ChannelId, bytes: &[u8]) -> Result<(), ChannelError> {
        let port = self
            .slot_mut(channel)
            .port
            .as_mut()
            .ok_or(ChannelError::NotOpen(channel))?;
        port.send_bytes(bytes)?;
        Ok(())
    }

    /// Register the handler run by [`ChannelManager::dispatch`] for a channel
    pub fn set_callback<F>(&mut self, channel: ChannelId, callback: F)
    where
        F: FnMut(ChannelId, &Inbound) + 'static,
    {
        self.slot_mut(channel).callback = Some(Box::new(callback));
    }

    /// Messages received on a channel since the last poll, in arrival order
    pub fn poll(&mut self, channel: ChannelId) -> Vec<Inbound> {
        let slot = self.slot(channel);
        slot.inbound_rx
            .try_iter()
            .filter_map(|bytes| classify(channel, bytes))
            .collect()
    }

    /// Poll all channels in channel order
    pub fn drain(&mut self) -> Vec<(ChannelId, Inbound)> {
        let mut pending = Vec::new();
        for channel in ChannelId::ALL {
            pending.extend(self.poll(channel).into_iter().map(|msg| (channel, msg)));
        }
        pending
    }

    /// Poll all channels and hand each message to the registered callback
    ///
    /// Messages on channels without a callback are dropped. Returns the
    /// number of messages delivered.
    pub fn dispatch(&mut self) -> usize {
        let mut delivered = 0;
        for channel in ChannelId::ALL {
            let messages = self.poll(channel);
            if let Some(callback) = self.slot_mut(channel).callback.as_mut() {
                for message in &messages {
                    callback(channel, message);
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Turn raw port bytes into an inbound message, dropping foreign traffic
fn classify(channel: ChannelId, bytes: Vec<u8>) -> Option<Inbound> {
    if bytes.first() == Some(&SYSEX_START) {
        match codec::decode_frame(&bytes) {
            Ok(envelope) if envelope.channel == channel => {
                log::debug!("[DAW IN] {:?} {:?} {:?}", channel, envelope.kind, envelope.payload);
                Some(Inbound::Envelope(envelope))
            }
            Ok(envelope) => {
                log::debug!(
                    "[DAW IN] {:?}: envelope addressed to {:?}, ignoring",
                    channel,
                    envelope.channel
                );
                None
            }
            Err(e) => {
                log::debug!("[DAW IN] {:?}: not recognized ({})", channel, e);
                None
            }
        }
    } else if bytes.is_empty() {
        None
    } else {
        log::trace!("[DAW IN] {:?} raw {:02X?}", channel, bytes);
        Some(Inbound::Raw(bytes))
    }
}

/// In-memory backend: sends are recorded, inbound traffic is injected
///
/// Used for tests and for running the bridge without a DAW.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
    fail_sends: Arc<AtomicBool>,
}

#[derive(Default)]
struct MemoryState {
    inbound: HashMap<ChannelId, Sender<Vec<u8>>>,
    sent: Vec<(ChannelId, Vec<u8>)>,
    refuse: HashSet<ChannelId>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make opening this channel fail
    pub fn refuse(&self, channel: ChannelId) {
        if let Ok(mut state) = self.inner.lock() {
            state.refuse.insert(channel);
        }
    }

    /// Make every send fail (or succeed again)
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// Deliver bytes as if the DAW had sent them. Returns false if the channel isn't open.
    pub fn inject(&self, channel: ChannelId, bytes: Vec<u8>) -> bool {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.inbound.get(&channel).map(|tx| tx.send(bytes).is_ok()))
            .unwrap_or(false)
    }

    /// Deliver an envelope as if the DAW had sent it
    pub fn inject_envelope(&self, envelope: &Envelope) -> bool {
        match codec::encode_frame(envelope) {
            Ok(bytes) => self.inject(envelope.channel, bytes),
            Err(_) => false,
        }
    }

    /// Take everything sent so far
    pub fn take_sent(&self) -> Vec<(ChannelId, Vec<u8>)> {
        self.inner
            .lock()
            .map(|mut state| std::mem::take(&mut state.sent))
            .unwrap_or_default()
    }

    /// Take everything sent so far, decoding envelopes and skipping raw messages
    pub fn take_envelopes(&self) -> Vec<Envelope> {
        self.take_sent()
            .into_iter()
            .filter_map(|(_, bytes)| codec::decode_frame(&bytes).ok())
            .collect()
    }
}

struct MemoryPort {
    channel: ChannelId,
    backend: MemoryBackend,
}

impl MidiSink for MemoryPort {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        if self.backend.fail_sends.load(Ordering::Relaxed) {
            return Err(SendError("memory port refusing sends".to_string()));
        }
        self.backend
            .inner
            .lock()
            .map(|mut state| state.sent.push((self.channel, bytes.to_vec())))
            .map_err(|e| SendError(e.to_string()))
    }
}

impl ChannelPort for MemoryPort {
    fn close(self: Box<Self>) {
        if let Ok(mut state) = self.backend.inner.lock() {
            state.inbound.remove(&self.channel);
        }
    }
}

impl PortBackend for MemoryBackend {
    fn open(
        &mut self,
        channel: ChannelId,
        name: &str,
        inbound: Sender<Vec<u8>>,
    ) -> Result<Box<dyn ChannelPort>, ChannelError> {
        let mut state = self.inner.lock().map_err(|e| ChannelError::OpenFailed {
            channel,
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if state.refuse.contains(&channel) {
            return Err(ChannelError::OpenFailed {
                channel,
                name: name.to_string(),
                reason: "port unavailable".to_string(),
            });
        }
        state.inbound.insert(channel, inbound);
        drop(state);

        Ok(Box::new(MemoryPort {
            channel,
            backend: self.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MessageType;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn names() -> Vec<(ChannelId, String)> {
        ChannelId::ALL
            .iter()
            .map(|c| (*c, format!("test {}", c.name())))
            .collect()
    }

    #[test]
    fn test_open_all_reports_partial_failure() {
        let backend = MemoryBackend::new();
        backend.refuse(ChannelId::Devices);
        let mut manager = ChannelManager::new(Box::new(backend.clone()));

        assert!(!manager.open_all(&names()));
        assert!(manager.is_open(ChannelId::Transport));
        assert!(!manager.is_open(ChannelId::Devices));
        assert!(manager.is_open(ChannelId::Mixer));
    }

    #[test]
    fn test_open_all_success() {
        let mut manager = ChannelManager::new(Box::new(MemoryBackend::new()));
        assert!(manager.open_all(&names()));
    }

    #[test]
    fn test_send_frames_envelope() {
        let backend = MemoryBackend::new();
        let mut manager = ChannelManager::new(Box::new(backend.clone()));
        manager.open_all(&names());

        let envelope = Envelope::flag(ChannelId::Transport, MessageType::Play, true);
        manager.send(&envelope).unwrap();

        let sent = backend.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChannelId::Transport);
        assert_eq!(codec::decode_frame(&sent[0].1).unwrap(), envelope);
    }

    #[test]
    fn test_send_failures_are_swallowed() {
        let backend = MemoryBackend::new();
        let mut manager = ChannelManager::new(Box::new(backend.clone()));

        // Not open yet
        let envelope = Envelope::empty(ChannelId::Mixer, MessageType::RefreshRequest);
        assert!(matches!(manager.send(&envelope), Err(ChannelError::NotOpen(ChannelId::Mixer))));

        manager.open_all(&names());
        backend.set_fail_sends(true);
        assert!(matches!(manager.send(&envelope), Err(ChannelError::Send(_))));
        assert!(backend.take_sent().is_empty());
    }

    #[test]
    fn test_poll_is_fifo_and_once() {
        let backend = MemoryBackend::new();
        let mut manager = ChannelManager::new(Box::new(backend.clone()));
        manager.open_all(&names());

        for i in 0..3 {
            let envelope = Envelope::indexed_value(ChannelId::Mixer, MessageType::TrackVolume, i, 100);
            assert!(backend.inject_envelope(&envelope));
        }
        backend.inject(ChannelId::Mixer, vec![0xB0, 85, 127]);

        let messages = manager.poll(ChannelId::Mixer);
        assert_eq!(messages.len(), 4);
        for (i, message) in messages.iter().take(3).enumerate() {
            match message {
                Inbound::Envelope(envelope) => assert_eq!(envelope.index(), Some(i)),
                other => panic!("Expected envelope, got {:?}", other),
            }
        }
        assert_eq!(messages[3], Inbound::Raw(vec![0xB0, 85, 127]));
        assert!(manager.poll(ChannelId::Mixer).is_empty());
    }

    #[test]
    fn test_foreign_sysex_ignored() {
        let backend = MemoryBackend::new();
        let mut manager = ChannelManager::new(Box::new(backend.clone()));
        manager.open_all(&names());

        backend.inject(ChannelId::Transport, vec![0xF0, 0x47, 0x7F, 0x15, 0x01, 0xF7]);
        // Envelope tagged for another channel
        let stray = Envelope::empty(ChannelId::Mixer, MessageType::RefreshRequest);
        backend.inject(ChannelId::Transport, codec::encode_frame(&stray).unwrap());

        assert!(manager.poll(ChannelId::Transport).is_empty());
    }

    #[test]
    fn test_dispatch_runs_callbacks() {
        let backend = MemoryBackend::new();
        let mut manager = ChannelManager::new(Box::new(backend.clone()));
        manager.open_all(&names());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        manager.set_callback(ChannelId::Devices, move |channel, message| {
            seen_clone.borrow_mut().push((channel, message.clone()));
        });

        backend.inject_envelope(&Envelope::text(ChannelId::Devices, MessageType::DeviceName, "Filter"));
        backend.inject_envelope(&Envelope::text(ChannelId::Transport, MessageType::TempoText, "120"));

        assert_eq!(manager.dispatch(), 1);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].0, ChannelId::Devices);
    }

    #[test]
    fn test_close_stops_inbound() {
        let backend = MemoryBackend::new();
        let mut manager = ChannelManager::new(Box::new(backend.clone()));
        manager.open_all(&names());
        manager.close(ChannelId::Transport);

        assert!(!manager.is_open(ChannelId::Transport));
        assert!(!backend.inject(ChannelId::Transport, vec![0xB0, 1, 1]));
    }

    #[test]
    fn test_reopen_starts_with_empty_queue() {
        let backend = MemoryBackend::new();
        let mut manager = ChannelManager::new(Box::new(backend.clone()));
        manager.open_all(&names());

        // Queued but never polled before the close
        assert!(backend.inject(ChannelId::Mixer, vec![0xB0, 7, 100]));
        manager.close(ChannelId::Mixer);
        assert!(manager.poll(ChannelId::Mixer).is_empty());

        manager.open(ChannelId::Mixer, "test mixer").unwrap();
        assert!(manager.poll(ChannelId::Mixer).is_empty());
        assert!(backend.inject(ChannelId::Mixer, vec![0xB0, 7, 90]));
        assert_eq!(
            manager.poll(ChannelId::Mixer),
            vec![Inbound::Raw(vec![0xB0, 7, 90])]
        );
    }
}
