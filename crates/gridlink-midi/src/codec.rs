//! Envelope codec for the DAW remote-control protocol
//!
//! Every message exchanged with the DAW on a virtual channel is an envelope:
//!
//! ```text
//! [tag0 tag1 tag2] [channel] [type] [payload ...]
//! ```
//!
//! The 3-byte domain tag identifies our traffic; anything else arriving on a
//! channel is "not ours" and is ignored by the caller. All bytes are 7-bit
//! clean so the envelope can travel inside a SysEx frame (`F0 … F7`).

use crate::normalize::{encode_delta, ENCODER_CENTER};

/// Domain tag preceding every envelope
pub const DOMAIN_TAG: [u8; 3] = [0x00, 0x21, 0x47];

/// Tag + channel + type
pub const HEADER_LEN: usize = 5;

/// Longest text payload (one display line)
pub const MAX_TEXT_LEN: usize = 68;

/// SysEx start / end bytes
pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Logical DAW channel
///
/// The DAW treats each channel as an independent control surface with its
/// own virtual port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    /// Transport, tempo and DAW-driven display text
    Transport,
    /// Device selection and parameters
    Devices,
    /// Track volumes, pans, mutes, solos
    Mixer,
}

impl ChannelId {
    /// All channels in wire order
    pub const ALL: [ChannelId; 3] = [ChannelId::Transport, ChannelId::Devices, ChannelId::Mixer];

    /// Wire value
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Transport => 0x00,
            Self::Devices => 0x01,
            Self::Mixer => 0x02,
        }
    }

    /// Parse a wire value
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Transport),
            0x01 => Some(Self::Devices),
            0x02 => Some(Self::Mixer),
            _ => None,
        }
    }

    /// Array index (0-2)
    pub fn index(self) -> usize {
        self.as_byte() as usize
    }

    /// Short lowercase name for logs and port names
    pub fn name(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Devices => "devices",
            Self::Mixer => "mixer",
        }
    }
}

/// Logical domain of a message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Transport,
    Device,
    Mixer,
    Display,
    System,
}

/// Envelope message type
///
/// Values are grouped by domain in blocks of 0x10 and never exceed 0x7F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // Transport
    Play,
    Stop,
    Record,
    Loop,
    Metronome,
    Tempo,
    TempoFine,
    Scrub,
    TapTempo,
    TransportState,
    TempoText,

    // Device
    DeviceSelect,
    DeviceName,
    ParamName,
    ParamValue,
    ParamPage,

    // Mixer
    TrackSelect,
    TrackName,
    TrackVolume,
    TrackPan,
    TrackMute,
    TrackSolo,
    TrackSelected,

    // Display
    DisplayLine,
    DisplayClear,

    // System
    Hello,
    RefreshRequest,
    Goodbye,
}

impl MessageType {
    /// Every message type, in wire-value order
    pub const ALL: [MessageType; 28] = [
        Self::Play,
        Self::Stop,
        Self::Record,
        Self::Loop,
        Self::Metronome,
        Self::Tempo,
        Self::TempoFine,
        Self::Scrub,
        Self::TapTempo,
        Self::TransportState,
        Self::TempoText,
        Self::DeviceSelect,
        Self::DeviceName,
        Self::ParamName,
        Self::ParamValue,
        Self::ParamPage,
        Self::TrackSelect,
        Self::TrackName,
        Self::TrackVolume,
        Self::TrackPan,
        Self::TrackMute,
        Self::TrackSolo,
        Self::TrackSelected,
        Self::DisplayLine,
        Self::DisplayClear,
        Self::Hello,
        Self::RefreshRequest,
        Self::Goodbye,
    ];

    /// Wire value
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Play => 0x01,
            Self::Stop => 0x02,
            Self::Record => 0x03,
            Self::Loop => 0x04,
            Self::Metronome => 0x05,
            Self::Tempo => 0x06,
            Self::TempoFine => 0x07,
            Self::Scrub => 0x08,
            Self::TapTempo => 0x09,
            Self::TransportState => 0x0A,
            Self::TempoText => 0x0B,
            Self::DeviceSelect => 0x10,
            Self::DeviceName => 0x11,
            Self::ParamName => 0x12,
            Self::ParamValue => 0x13,
            Self::ParamPage => 0x14,
            Self::TrackSelect => 0x20,
            Self::TrackName => 0x21,
            Self::TrackVolume => 0x22,
            Self::TrackPan => 0x23,
            Self::TrackMute => 0x24,
            Self::TrackSolo => 0x25,
            Self::TrackSelected => 0x26,
            Self::DisplayLine => 0x30,
            Self::DisplayClear => 0x31,
            Self::Hello => 0x40,
            Self::RefreshRequest => 0x41,
            Self::Goodbye => 0x42,
        }
    }

    /// Parse a wire value
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_byte() == byte)
    }

    /// Domain this type belongs to
    pub fn domain(self) -> Domain {
        match self.as_byte() >> 4 {
            0x0 => Domain::Transport,
            0x1 => Domain::Device,
            0x2 => Domain::Mixer,
            0x3 => Domain::Display,
            _ => Domain::System,
        }
    }

    /// Inclusive payload length bounds
    pub fn payload_bounds(self) -> (usize, usize) {
        match self {
            Self::Stop | Self::TapTempo | Self::DisplayClear | Self::RefreshRequest | Self::Goodbye => {
                (0, 0)
            }
            Self::Play | Self::Record | Self::Loop | Self::Metronome => (1, 1),
            Self::Tempo | Self::TempoFine | Self::Scrub => (1, 1),
            Self::TransportState => (1, 1),
            Self::DeviceSelect | Self::ParamPage | Self::TrackSelect => (1, 1),
            Self::TrackSelected => (1, 1),
            Self::TrackVolume | Self::TrackPan | Self::TrackMute | Self::TrackSolo => (2, 2),
            Self::TempoText | Self::DeviceName | Self::Hello => (0, MAX_TEXT_LEN),
            Self::ParamName | Self::TrackName | Self::DisplayLine => (1, 1 + MAX_TEXT_LEN),
            Self::ParamValue => (2, 2 + MAX_TEXT_LEN),
        }
    }
}

/// Error type for envelope encoding/decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Envelope too short: {0} bytes")]
    TooShort(usize),

    #[error("Domain tag mismatch (not ours)")]
    ForeignTag,

    #[error("Unknown channel id {0:#04x}")]
    UnknownChannel(u8),

    #[error("Unknown message type {0:#04x}")]
    UnknownMessageType(u8),

    #[error("Payload length {len} out of bounds for {kind:?} ({min}..={max})")]
    PayloadLength {
        kind: MessageType,
        len: usize,
        min: usize,
        max: usize,
    },

    #[error("Byte {0:#04x} is not 7-bit clean")]
    NotSevenBit(u8),

    #[error("Not a SysEx frame")]
    NotSysEx,
}

/// Protocol envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Channel the message belongs to
    pub channel: ChannelId,
    /// Message type
    pub kind: MessageType,
    /// Type-specific payload (7-bit bytes)
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Create an envelope with a raw payload
    pub fn new(channel: ChannelId, kind: MessageType, payload: Vec<u8>) -> Self {
        Self {
            channel,
            kind,
            payload,
        }
    }

    /// Envelope without payload
    pub fn empty(channel: ChannelId, kind: MessageType) -> Self {
        Self::new(channel, kind, Vec::new())
    }

    /// Single boolean flag payload
    pub fn flag(channel: ChannelId, kind: MessageType, on: bool) -> Self {
        Self::new(channel, kind, vec![on as u8])
    }

    /// Relative delta payload (re-encoded around 64)
    pub fn delta(channel: ChannelId, kind: MessageType, delta: i32) -> Self {
        Self::new(channel, kind, vec![encode_delta(delta)])
    }

    /// Text payload (ASCII, truncated to one display line)
    pub fn text(channel: ChannelId, kind: MessageType, text: &str) -> Self {
        Self::new(channel, kind, ascii_bytes(text, MAX_TEXT_LEN))
    }

    /// Index followed by text
    pub fn indexed_text(channel: ChannelId, kind: MessageType, index: u8, text: &str) -> Self {
        let mut payload = vec![index & 0x7F];
        payload.extend(ascii_bytes(text, MAX_TEXT_LEN));
        Self::new(channel, kind, payload)
    }

    /// Index followed by a 0-127 value
    pub fn indexed_value(channel: ChannelId, kind: MessageType, index: u8, value: u8) -> Self {
        Self::new(channel, kind, vec![index & 0x7F, value & 0x7F])
    }

    /// First payload byte as a boolean
    pub fn as_flag(&self) -> Option<bool> {
        self.payload.first().map(|b| *b != 0)
    }

    /// First payload byte as a delta around 64
    pub fn as_delta(&self) -> Option<i32> {
        self.payload.first().map(|b| *b as i32 - ENCODER_CENTER as i32)
    }

    /// First payload byte as an index
    pub fn index(&self) -> Option<usize> {
        self.payload.first().map(|b| *b as usize)
    }

    /// Second payload byte as a value
    pub fn value(&self) -> Option<u8> {
        self.payload.get(1).copied()
    }

    /// Payload bytes from `offset` as text
    pub fn text_from(&self, offset: usize) -> String {
        self.payload
            .get(offset..)
            .map(|bytes| bytes.iter().map(|b| *b as char).collect())
            .unwrap_or_default()
    }
}

/// Convert text to printable ASCII bytes, replacing anything else with `?`
pub fn ascii_bytes(text: &str, max_len: usize) -> Vec<u8> {
    text.chars()
        .take(max_len)
        .map(|c| if (' '..='~').contains(&c) { c as u8 } else { b'?' })
        .collect()
}

fn check_payload(kind: MessageType, payload: &[u8]) -> Result<(), CodecError> {
    let (min, max) = kind.payload_bounds();
    if payload.len() < min || payload.len() > max {
        return Err(CodecError::PayloadLength {
            kind,
            len: payload.len(),
            min,
            max,
        });
    }
    if let Some(b) = payload.iter().find(|b| **b > 0x7F) {
        return Err(CodecError::NotSevenBit(*b));
    }
    Ok(())
}

/// Encode an envelope to bytes
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    check_payload(envelope.kind, &envelope.payload)?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + envelope.payload.len());
    bytes.extend_from_slice(&DOMAIN_TAG);
    bytes.push(envelope.channel.as_byte());
    bytes.push(envelope.kind.as_byte());
    bytes.extend_from_slice(&envelope.payload);
    Ok(bytes)
}

/// Decode bytes into an envelope
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::TooShort(bytes.len()));
    }
    if bytes[..3] != DOMAIN_TAG {
        return Err(CodecError::ForeignTag);
    }
    let channel = ChannelId::from_byte(bytes[3]).ok_or(CodecError::UnknownChannel(bytes[3]))?;
    let kind = MessageType::from_byte(bytes[4]).ok_or(CodecError::UnknownMessageType(bytes[4]))?;
    let payload = &bytes[HEADER_LEN..];
    check_payload(kind, payload)?;

    Ok(Envelope {
        channel,
        kind,
        payload: payload.to_vec(),
    })
}

/// Wrap envelope bytes in a SysEx frame
pub fn frame(bytes: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(bytes.len() + 2);
    framed.push(SYSEX_START);
    framed.extend_from_slice(bytes);
    framed.push(SYSEX_END);
    framed
}

/// Strip the SysEx frame, returning the body
pub fn unframe(bytes: &[u8]) -> Result<&[u8], CodecError> {
    match bytes {
        [SYSEX_START, body @ .., SYSEX_END] => Ok(body),
        _ => Err(CodecError::NotSysEx),
    }
}

/// Encode an envelope and wrap it in a SysEx frame
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    encode(envelope).map(|bytes| frame(&bytes))
}

/// Unwrap a SysEx frame and decode the envelope inside
pub fn decode_frame(bytes: &[u8]) -> Result<Envelope, CodecError> {
    decode(unframe(bytes)?)
}
