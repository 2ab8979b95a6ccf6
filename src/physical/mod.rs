//! Raw CAN access used by the ISO-TP engine.
//!
//! The engine never talks to hardware directly. It drives a [`CanTransport`],
//! which only has to do two things:
//! - transmit one frame
//! - hand back the next frame carrying a given arbitration identifier, or
//!   give up with [`Error::Timeout`](crate::error::Error::Timeout)
//!
//! Implementations provided here:
//! - [`can::Can`] wraps a platform [`Port`](crate::types::Port) (an unfiltered
//!   frame source such as a SocketCAN socket or a J2534 channel) and filters
//!   incoming frames by identifier
//! - [`mock`] holds simulated transports for tests and examples
//!
//! # Examples
//!
//! ```rust
//! use libisotp::physical::mock::MockTransport;
//! use libisotp::physical::CanTransport;
//! use libisotp::types::Frame;
//!
//! let mut can = MockTransport::new();
//! can.push_incoming(Frame::new(0x7E8, &[0x02, 0x50, 0x01]));
//!
//! can.send_frame(&Frame::new(0x7E0, &[0x02, 0x10, 0x01])).unwrap();
//! let reply = can.receive_matching(0x7E8, std::time::Duration::from_millis(10)).unwrap();
//! assert_eq!(reply.data, vec![0x02, 0x50, 0x01]);
//! ```

pub mod can;
pub mod mock;

#[cfg(test)]
mod tests;

use std::time::Duration;

use crate::error::Result;
use crate::types::{CanId, Frame};

/// Raw CAN transport the ISO-TP engine is generic over
pub trait CanTransport {
    fn send_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Returns the next frame whose identifier equals `id`, waiting at most
    /// `timeout`. Frames for other identifiers may be dropped.
    fn receive_matching(&mut self, id: CanId, timeout: Duration) -> Result<Frame>;
}

impl<T: CanTransport + ?Sized> CanTransport for Box<T> {
    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).send_frame(frame)
    }

    fn receive_matching(&mut self, id: CanId, timeout: Duration) -> Result<Frame> {
        (**self).receive_matching(id, timeout)
    }
}

impl<T: CanTransport + ?Sized> CanTransport for &mut T {
    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).send_frame(frame)
    }

    fn receive_matching(&mut self, id: CanId, timeout: Duration) -> Result<Frame> {
        (**self).receive_matching(id, timeout)
    }
}
