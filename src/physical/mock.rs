//! Simulated CAN transports.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use super::CanTransport;
use crate::error::{Error, Result};
use crate::types::{CanId, Frame, Port};

/// Mock responder function type: gets every transmitted frame and returns
/// the frames the simulated peer answers with
pub type MockResponder = Box<dyn FnMut(&Frame) -> Vec<Frame> + Send>;

/// Scripted peer for single-threaded tests.
///
/// Every transmitted frame is recorded. Replies come from the inbound queue,
/// filled up front with [`MockTransport::push_incoming`] or on the fly by the
/// responder. An empty queue times out immediately.
#[derive(Default)]
pub struct MockTransport {
    sent: Vec<Frame>,
    incoming: VecDeque<Frame>,
    responder: Option<MockResponder>,
    fail_sends: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock whose peer answers each transmitted frame via `responder`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&Frame) -> Vec<Frame> + Send + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Creates a mock whose every transmission fails with a transport error
    pub fn new_error() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn set_responder(&mut self, responder: Option<MockResponder>) {
        self.responder = responder;
    }

    pub fn push_incoming(&mut self, frame: Frame) {
        self.incoming.push_back(frame);
    }

    /// Frames transmitted so far, oldest first
    pub fn sent(&self) -> &[Frame] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.sent)
    }

    /// Frames queued but not yet received
    pub fn pending(&self) -> usize {
        self.incoming.len()
    }
}

impl CanTransport for MockTransport {
    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.fail_sends {
            return Err(Error::transport("mock bus is down"));
        }
        self.sent.push(frame.clone());
        if let Some(responder) = self.responder.as_mut() {
            self.incoming.extend(responder(frame));
        }
        Ok(())
    }

    fn receive_matching(&mut self, id: CanId, _timeout: Duration) -> Result<Frame> {
        let index = self
            .incoming
            .iter()
            .position(|frame| frame.id == id)
            .ok_or(Error::Timeout)?;
        self.incoming.remove(index).ok_or(Error::Timeout)
    }
}

/// Unfiltered frame source for exercising [`super::can::Can`]
#[derive(Debug, Default)]
pub struct MockPort {
    pub sent: Vec<Frame>,
    pub incoming: VecDeque<Frame>,
}

impl MockPort {
    pub fn new(incoming: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            sent: Vec::new(),
            incoming: incoming.into_iter().collect(),
        }
    }
}

impl Port for MockPort {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        self.sent.push(frame.clone());
        Ok(())
    }

    fn receive(&mut self, _timeout: Duration) -> Result<Frame> {
        self.incoming.pop_front().ok_or(Error::Timeout)
    }
}

/// One end of a simulated point-to-point bus, see [`channel_pair`]
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

/// Creates two connected endpoints: whatever one sends, the other receives.
///
/// Waits use real time, so the endpoints can live on separate threads.
pub fn channel_pair() -> (ChannelTransport, ChannelTransport) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        ChannelTransport { tx: a_tx, rx: a_rx },
        ChannelTransport { tx: b_tx, rx: b_rx },
    )
}

impl CanTransport for ChannelTransport {
    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.tx
            .send(frame.clone())
            .map_err(|_| Error::transport("peer endpoint dropped"))
    }

    fn receive_matching(&mut self, id: CanId, timeout: Duration) -> Result<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(frame) if frame.id == id => return Ok(frame),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(Error::Timeout),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::transport("peer endpoint dropped"))
                }
            }
        }
    }
}
