//! MIDI port discovery and connection
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on macOS, WinMM on Windows).

use crate::config::port_matches;
use flume::Sender;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

/// Error type for MIDI connection operations
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInitError(String),

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to create virtual port '{0}': {1}")]
    VirtualPortError(String, String),
}

/// Push every incoming message into a queue; the event loop drains it
pub(crate) fn queue_callback(_timestamp: u64, message: &[u8], tx: &mut Sender<Vec<u8>>) {
    if message.is_empty() {
        return;
    }
    if let Err(e) = tx.try_send(message.to_vec()) {
        log::warn!("[MIDI IN] Queue full or closed, dropping message: {}", e);
    }
}

pub(crate) fn new_input(client_name: &str) -> Result<MidiInput, ConnectionError> {
    let mut midi_in =
        MidiInput::new(client_name).map_err(|e| ConnectionError::InputInitError(e.to_string()))?;
    // Channel envelopes travel as SysEx
    midi_in.ignore(Ignore::None);
    Ok(midi_in)
}

pub(crate) fn new_output(client_name: &str) -> Result<MidiOutput, ConnectionError> {
    MidiOutput::new(client_name).map_err(|e| ConnectionError::OutputInitError(e.to_string()))
}

/// Connect an input port whose name matches `pattern`, queueing messages into `inbound`
pub(crate) fn connect_input(
    client_name: &str,
    pattern: &str,
    inbound: Sender<Vec<u8>>,
) -> Result<(MidiInputConnection<Sender<Vec<u8>>>, String), ConnectionError> {
    let midi_in = new_input(client_name)?;
    let port = midi_in
        .ports()
        .into_iter()
        .find(|port| {
            midi_in
                .port_name(port)
                .map(|name| port_matches(&name, pattern))
                .unwrap_or(false)
        })
        .ok_or_else(|| ConnectionError::PortNotFound(pattern.to_string()))?;

    let port_name = midi_in
        .port_name(&port)
        .map_err(|e| ConnectionError::ConnectionError(e.to_string()))?;
    log::info!("MIDI: Found input port: {}", port_name);

    let connection = midi_in
        .connect(&port, &format!("{} in", client_name), queue_callback, inbound)
        .map_err(|e| ConnectionError::ConnectionError(e.to_string()))?;
    Ok((connection, port_name))
}

/// Connect an output port whose name matches `pattern`
pub(crate) fn connect_output(
    client_name: &str,
    pattern: &str,
) -> Result<(MidiOutputConnection, String), ConnectionError> {
    let midi_out = new_output(client_name)?;
    let port = midi_out
        .ports()
        .into_iter()
        .find(|port| {
            midi_out
                .port_name(port)
                .map(|name| port_matches(&name, pattern))
                .unwrap_or(false)
        })
        .ok_or_else(|| ConnectionError::PortNotFound(pattern.to_string()))?;

    let port_name = midi_out
        .port_name(&port)
        .map_err(|e| ConnectionError::ConnectionError(e.to_string()))?;
    log::info!("MIDI: Found output port: {}", port_name);

    let connection = midi_out
        .connect(&port, &format!("{} out", client_name))
        .map_err(|e| ConnectionError::ConnectionError(e.to_string()))?;
    Ok((connection, port_name))
}

/// Keeps an input connection open until dropped
pub struct InputGuard {
    _connection: MidiInputConnection<Sender<Vec<u8>>>,
}

/// Connection to the physical surface
pub struct SurfaceConnection {
    /// Input connection (kept alive for the duration)
    pub input: InputGuard,
    /// Output connection for LEDs and the display
    pub output: MidiOutputConnection,
    /// Name of the matched input port
    pub port_name: String,
}

impl SurfaceConnection {
    /// Find and connect to the surface
    ///
    /// Both directions must be available. Incoming messages are queued into
    /// `inbound`.
    pub fn connect(
        client_name: &str,
        port_match: &str,
        inbound: Sender<Vec<u8>>,
    ) -> Result<Self, ConnectionError> {
        let (input, port_name) = connect_input(client_name, port_match, inbound)?;
        let (output, _) = connect_output(client_name, port_match)?;
        log::info!("MIDI: Surface connected on '{}'", port_name);
        Ok(Self {
            input: InputGuard { _connection: input },
            output,
            port_name,
        })
    }
}

/// Open the port the pads play notes on
///
/// A virtual port where the platform supports it, otherwise an existing port
/// with a matching name.
pub fn open_note_output(client_name: &str, port_name: &str) -> Result<MidiOutputConnection, ConnectionError> {
    let midi_out = new_output(client_name)?;

    #[cfg(unix)]
    {
        use midir::os::unix::VirtualOutput;
        let connection = midi_out
            .create_virtual(port_name)
            .map_err(|e| ConnectionError::VirtualPortError(port_name.to_string(), e.to_string()))?;
        log::info!("MIDI: Created note output '{}'", port_name);
        Ok(connection)
    }

    #[cfg(not(unix))]
    {
        drop(midi_out);
        connect_output(client_name, port_name).map(|(connection, _)| connection)
    }
}

/// List all available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>, ConnectionError> {
    let midi_in = MidiInput::new("gridlink-list")
        .map_err(|e| ConnectionError::InputInitError(e.to_string()))?;

    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}

/// List all available MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>, ConnectionError> {
    let midi_out = MidiOutput::new("gridlink-list")
        .map_err(|e| ConnectionError::OutputInitError(e.to_string()))?;

    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}
