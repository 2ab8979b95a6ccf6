//! ISO 15765-2 (ISO-TP) transport layer over classic CAN.
//!
//! Layers, bottom up:
//! - [`physical`]: the raw CAN transport seam and its implementations
//! - [`transport`]: packet buffers, PCI codec and the ISO-TP engine
//!
//! ```rust
//! use libisotp::physical::mock::MockTransport;
//! use libisotp::transport::isotp::{IsoTp, IsoTpOptions};
//! use libisotp::transport::TransportLayer;
//! use libisotp::types::Frame;
//!
//! let mut can = MockTransport::new();
//! can.push_incoming(Frame::new(0x7E8, &[0x02, 0x50, 0x03]));
//!
//! let mut isotp = IsoTp::new(can, IsoTpOptions::default()).unwrap();
//! let response = isotp.request(&[0x10, 0x03]).unwrap();
//! assert_eq!(response.as_slice(), &[0x50, 0x03]);
//! assert_eq!(isotp.transport().sent()[0].data, vec![0x02, 0x10, 0x03]);
//! ```

pub mod physical; // Raw CAN transports
pub mod transport; // ISO-TP implementation

// Re-exports for convenience
pub use physical::CanTransport;
pub use transport::isotp::{AddressMode, IsoTp, IsoTpOptions};
pub use transport::packet::{Packet, PacketReader};
pub use transport::TransportLayer;

// Common types and traits
pub mod error;
pub mod types;

pub use error::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
