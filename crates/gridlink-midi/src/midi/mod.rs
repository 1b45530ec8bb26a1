//! MIDI port backend
//!
//! Connects the physical surface and creates the DAW-facing ports via midir.

pub mod connection;
pub mod ports;

pub use connection::{
    list_input_ports, list_output_ports, open_note_output, ConnectionError, InputGuard,
    SurfaceConnection,
};
pub use ports::MidirBackend;
