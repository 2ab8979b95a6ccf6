//! ISO 15765-2 transport layer.
//!
//! - [`packet`] holds payload buffers and the read cursor used for segmentation
//! - [`pci`] encodes and decodes the frame headers
//! - [`isotp`] is the engine running the send and receive state machines

pub mod isotp;
pub mod packet;
pub mod pci;


use crate::error::Result;
use packet::Packet;

/// Transport layer trait implemented by the ISO-TP engine
pub trait TransportLayer {
    /// Sends one complete payload.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Waits for one complete payload from the peer.
    fn receive(&mut self) -> Result<Packet>;

    /// Sends a request and waits for the response.
    ///
    /// Nothing correlates the two beyond the configured identifiers, so no
    /// other traffic may use them while the exchange runs.
    fn request(&mut self, data: &[u8]) -> Result<Packet> {
        self.send(data)?;
        self.receive()
    }
}
