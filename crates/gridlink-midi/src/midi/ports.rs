//! midir-backed DAW channel ports
//!
//! Each channel is a duplex pair of virtual ports the DAW connects to. On
//! platforms without virtual ports, existing ports with the configured name
//! are used instead.

use super::connection::{self, queue_callback};
use crate::channels::{ChannelError, ChannelPort, PortBackend};
use crate::codec::ChannelId;
use crate::output::{MidiSink, SendError};
use flume::Sender;
use midir::{MidiInputConnection, MidiOutputConnection};

/// Duplex port pair behind one channel
pub struct MidirPort {
    input: MidiInputConnection<Sender<Vec<u8>>>,
    output: MidiOutputConnection,
}

impl MidiSink for MidirPort {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        self.output.send_bytes(bytes)
    }
}

impl ChannelPort for MidirPort {
    fn close(self: Box<Self>) {
        let MidirPort { input, output } = *self;
        input.close();
        output.close();
    }
}

/// Opens channel ports through midir
pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
        }
    }

    #[cfg(unix)]
    fn open_pair(
        &self,
        name: &str,
        inbound: Sender<Vec<u8>>,
    ) -> Result<MidirPort, connection::ConnectionError> {
        use midir::os::unix::{VirtualInput, VirtualOutput};

        let input = connection::new_input(&self.client_name)?
            .create_virtual(name, queue_callback, inbound)
            .map_err(|e| connection::ConnectionError::VirtualPortError(name.to_string(), e.to_string()))?;
        let output = connection::new_output(&self.client_name)?
            .create_virtual(name)
            .map_err(|e| connection::ConnectionError::VirtualPortError(name.to_string(), e.to_string()))?;
        Ok(MidirPort { input, output })
    }

    #[cfg(not(unix))]
    fn open_pair(
        &self,
        name: &str,
        inbound: Sender<Vec<u8>>,
    ) -> Result<MidirPort, connection::ConnectionError> {
        let (input, _) = connection::connect_input(&self.client_name, name, inbound)?;
        let (output, _) = connection::connect_output(&self.client_name, name)?;
        Ok(MidirPort { input, output })
    }
}

impl PortBackend for MidirBackend {
    fn open(
        &mut self,
        channel: ChannelId,
        name: &str,
        inbound: Sender<Vec<u8>>,
    ) -> Result<Box<dyn ChannelPort>, ChannelError> {
        let port = self
            .open_pair(name, inbound)
            .map_err(|e| ChannelError::OpenFailed {
                channel,
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(port))
    }
}
