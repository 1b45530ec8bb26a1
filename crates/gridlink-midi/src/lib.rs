//! Control-surface to DAW bridge
//!
//! This crate provides:
//! - The envelope codec for the DAW remote-control protocol
//! - A channel manager multiplexing transport, device and mixer traffic
//! - Relative encoder decoding
//! - A segmented, change-tracked display buffer
//! - An isomorphic note layout for the pad grid
//! - The bridge core: modes, routing, DAW feedback and LED output
//! - midir-backed port adapters and YAML configuration
//!
//! # Architecture
//!
//! ```text
//! Surface → midir callback → flume queue ─┐
//!                                          ├→ Bridge::run_once → DAW channels / note port
//! DAW ports → midir callback → flume queue ┘                  → surface LEDs / display
//! ```
//!
//! midir callbacks only queue bytes; all state lives on the thread that
//! calls [`Bridge::run_once`].

mod bridge;
mod channels;
mod codec;
mod config;
mod display;
mod drum;
mod layout;
mod midi;
mod normalize;
mod output;
mod scale;
mod surface;

pub use bridge::{
    ActivePad, Bridge, BridgeState, Grid, Mode, PadMode, PadTarget, ParamState, SurfaceIo,
    TrackState, TransportFlags, PARAM_COUNT, TRACK_COUNT,
};
pub use channels::{ChannelError, ChannelManager, ChannelPort, Inbound, MemoryBackend, PortBackend};
pub use codec::{
    decode, decode_frame, encode, encode_frame, ChannelId, CodecError, Domain, Envelope, MessageType,
};
pub use config::{
    default_config_path, load_bridge_config, normalize_port_name, port_matches, BridgeConfig,
    LayoutDefaults, LedPalette, PortConfig,
};
pub use display::{Align, DisplayBuffer, FIELD_COUNT, LINE_COUNT, LINE_WIDTH, SEGMENT_COUNT};
pub use drum::DrumProfile;
pub use layout::{IsomorphicLayout, LayoutConfig, LayoutScheme};
pub use midi::{
    list_input_ports, list_output_ports, open_note_output, ConnectionError, InputGuard,
    MidirBackend, SurfaceConnection,
};
pub use normalize::{decode_delta, encode_delta, normalize_cc_value, ControlRange};
pub use output::{LedAddress, LedWriter, MidiSink, NullSink, SendError};
pub use scale::{note_label, note_name, Scale, SCALES};
pub use surface::{Button, Encoder, Row, SurfaceEvent};

/// Error type for bridge startup
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("MIDI connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("No DAW channel could be opened")]
    NoChannels,
}
