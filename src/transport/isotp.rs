use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::packet::{Packet, PacketReader};
use super::pci::{
    self, consecutive_frame_capacity, first_frame_capacity, single_frame_capacity, FlowStatus,
    Pdu, MAX_FF_DL, MAX_ST_MIN,
};
use super::TransportLayer;
use crate::error::{Error, Result};
use crate::physical::CanTransport;
use crate::types::{CanId, Config, Frame, MAX_EXTENDED_ID, MAX_STANDARD_ID};

/// ISO-TP Address Modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// PCI in the first data byte
    Normal,
    /// First data byte carries `address_extension`, PCI follows
    Extended,
}

/// ISO-TP configuration
#[derive(Debug, Clone)]
pub struct IsoTpOptions {
    /// Identifier this node transmits on
    pub source_id: CanId,
    /// Identifier this node listens on
    pub dest_id: CanId,
    /// Transmit 29-bit identifiers
    pub extended_id: bool,
    /// Limit for every individual frame wait
    pub timeout: Duration,
    /// Block size advertised to the peer when receiving (0 = unlimited)
    pub block_size: u8,
    /// Separation time advertised to the peer when receiving
    pub st_min: Duration,
    /// Consecutive FC(Wait) frames tolerated while sending
    pub max_wait_frames: u8,
    /// Fill transmitted frames up to 8 bytes with this value
    pub padding: Option<u8>,
    pub address_mode: AddressMode,
    pub address_extension: u8,
    /// Largest payload accepted when receiving
    pub max_payload_len: usize,
}

impl Default for IsoTpOptions {
    fn default() -> Self {
        Self {
            source_id: 0x7E0,
            dest_id: 0x7E8,
            extended_id: false,
            timeout: Duration::from_secs(10),
            block_size: 0,
            st_min: Duration::ZERO,
            max_wait_frames: 10,
            padding: None,
            address_mode: AddressMode::Normal,
            address_extension: 0,
            max_payload_len: MAX_FF_DL,
        }
    }
}

impl Config for IsoTpOptions {
    fn validate(&self) -> Result<()> {
        let max_id = if self.extended_id {
            MAX_EXTENDED_ID
        } else {
            MAX_STANDARD_ID
        };
        if self.source_id > max_id || self.dest_id > max_id {
            return Err(Error::InvalidConfig(format!(
                "identifiers {:#X}/{:#X} exceed {:#X}",
                self.source_id, self.dest_id, max_id
            )));
        }
        if self.source_id == self.dest_id {
            return Err(Error::InvalidConfig(
                "source and destination identifiers must differ".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be non-zero".into()));
        }
        if self.st_min > MAX_ST_MIN {
            return Err(Error::InvalidConfig(format!(
                "separation time {:?} exceeds {:?}",
                self.st_min, MAX_ST_MIN
            )));
        }
        if self.max_payload_len == 0 || self.max_payload_len > MAX_FF_DL {
            return Err(Error::InvalidConfig(format!(
                "max payload length must be within 1..={}",
                MAX_FF_DL
            )));
        }
        Ok(())
    }
}

/// Sender progress through one multi-frame transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    AwaitingFlowControl,
    /// `block_left` is None when the peer granted an unlimited block
    SendingConsecutive {
        block_left: Option<u8>,
        st_min: Duration,
    },
    Done,
}

/// Receiver progress through one multi-frame transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    AwaitingConsecutive,
    Done,
}

/// ISO 15765-2 engine bound to one source/destination identifier pair.
///
/// The engine owns its transport: nothing else may use the bus identifiers
/// while an exchange is running.
pub struct IsoTp<T: CanTransport> {
    options: IsoTpOptions,
    transport: T,
}

impl<T: CanTransport> IsoTp<T> {
    /// Creates a new ISO-TP instance owning `transport`
    pub fn new(transport: T, options: IsoTpOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options, transport })
    }

    pub fn options(&self) -> &IsoTpOptions {
        &self.options
    }

    /// Replaces the configuration used by subsequent exchanges
    pub fn set_options(&mut self, options: IsoTpOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn set_transport(&mut self, transport: T) {
        self.transport = transport;
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn pci_offset(&self) -> usize {
        match self.options.address_mode {
            AddressMode::Normal => 0,
            AddressMode::Extended => 1,
        }
    }

    fn prefix(&self) -> Option<u8> {
        match self.options.address_mode {
            AddressMode::Normal => None,
            AddressMode::Extended => Some(self.options.address_extension),
        }
    }

    fn write_pdu(&mut self, pdu: &Pdu<'_>) -> Result<()> {
        let frame = Frame {
            id: self.options.source_id,
            data: pci::encode(pdu, self.prefix(), self.options.padding)?,
            is_extended: self.options.extended_id,
        };
        trace!(id = frame.id, data = ?frame.data, "tx {}", pdu.kind());
        self.transport.send_frame(&frame)
    }

    /// Waits until `deadline` for the next frame addressed to this node
    fn read_frame(&mut self, deadline: Instant) -> Result<Frame> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }

            let frame = self
                .transport
                .receive_matching(self.options.dest_id, remaining)?;
            if let Some(address) = self.prefix() {
                if frame.data.first() != Some(&address) {
                    warn!(
                        id = frame.id,
                        data = ?frame.data,
                        "skipping frame for another extended address"
                    );
                    continue;
                }
            }
            trace!(id = frame.id, data = ?frame.data, "rx");
            return Ok(frame);
        }
    }

    fn frame_deadline(&self) -> Instant {
        Instant::now() + self.options.timeout
    }

    fn send_flow_control(&mut self, status: FlowStatus) -> Result<()> {
        // Validated against MAX_ST_MIN, so this always encodes
        let st_min = pci::st_min_from_duration(self.options.st_min).unwrap_or(0x7F);
        self.write_pdu(&Pdu::FlowControl {
            status,
            block_size: self.options.block_size,
            st_min,
        })
    }

    /// Waits for a usable flow control frame and returns the granted block
    /// size (None = unlimited) and separation time.
    fn await_flow_control(&mut self) -> Result<(Option<u8>, Duration)> {
        let offset = self.pci_offset();
        let mut waits: u8 = 0;
        let mut deadline = self.frame_deadline();

        loop {
            let frame = self.read_frame(deadline)?;
            match pci::decode(&frame.data, offset)? {
                Pdu::FlowControl {
                    status: FlowStatus::ContinueToSend,
                    block_size,
                    st_min,
                } => {
                    let st_min = pci::st_min_to_duration(st_min);
                    debug!(block_size, ?st_min, "peer is clear to receive");
                    let block_left = if block_size == 0 {
                        None
                    } else {
                        Some(block_size)
                    };
                    return Ok((block_left, st_min));
                }
                Pdu::FlowControl {
                    status: FlowStatus::Wait,
                    ..
                } => {
                    if waits >= self.options.max_wait_frames {
                        warn!(waits, "peer keeps asking to wait, giving up");
                        return Err(Error::WaitLimitExceeded(self.options.max_wait_frames));
                    }
                    waits += 1;
                    debug!(waits, "peer asked to wait");
                    deadline = self.frame_deadline();
                }
                Pdu::FlowControl {
                    status: FlowStatus::Overflow,
                    ..
                } => {
                    warn!("peer cannot accept the payload");
                    return Err(Error::Overflow);
                }
                other => {
                    warn!("ignoring {} frame while awaiting flow control", other.kind());
                }
            }
        }
    }

    fn send_multi_frame(&mut self, data: &[u8]) -> Result<()> {
        let offset = self.pci_offset();
        let mut reader = PacketReader::from_slice(data);

        let first = reader.next(first_frame_capacity(offset));
        self.write_pdu(&Pdu::FirstFrame {
            len: data.len() as u16,
            data: first,
        })?;

        let mut sn: u8 = 1;
        let mut last_cf: Option<Instant> = None;
        let mut state = TxState::AwaitingFlowControl;
        loop {
            trace!(?state, remaining = reader.remaining(), "send");
            state = match state {
                TxState::AwaitingFlowControl => {
                    let (block_left, st_min) = self.await_flow_control()?;
                    TxState::SendingConsecutive { block_left, st_min }
                }
                TxState::SendingConsecutive { block_left, st_min } => {
                    // STmin also spans the flow control exchange between blocks
                    if let Some(sent_at) = last_cf {
                        let gap = st_min.saturating_sub(sent_at.elapsed());
                        if !gap.is_zero() {
                            thread::sleep(gap);
                        }
                    }

                    let chunk = reader.next(consecutive_frame_capacity(offset));
                    self.write_pdu(&Pdu::ConsecutiveFrame { sn, data: chunk })?;
                    last_cf = Some(Instant::now());
                    sn = (sn + 1) & 0x0F;

                    if reader.remaining() == 0 {
                        TxState::Done
                    } else if block_left == Some(1) {
                        TxState::AwaitingFlowControl
                    } else {
                        TxState::SendingConsecutive {
                            block_left: block_left.map(|left| left - 1),
                            st_min,
                        }
                    }
                }
                TxState::Done => return Ok(()),
            };
        }
    }

    fn receive_multi_frame(&mut self, len: usize, first: &[u8]) -> Result<Packet> {
        if len > self.options.max_payload_len {
            warn!(len, max = self.options.max_payload_len, "refusing oversized payload");
            self.send_flow_control(FlowStatus::Overflow)?;
            return Err(Error::PayloadTooLarge {
                len,
                max: self.options.max_payload_len,
            });
        }

        let offset = self.pci_offset();
        let block_size = self.options.block_size;
        let mut packet = Packet::with_capacity(len);
        packet.append(&first[..first.len().min(len)]);
        self.send_flow_control(FlowStatus::ContinueToSend)?;

        let mut sn: u8 = 1;
        let mut in_block: u8 = 0;
        let mut state = RxState::AwaitingConsecutive;
        while state != RxState::Done {
            trace!(?state, received = packet.len(), len, "receive");
            let frame = self.read_frame(self.frame_deadline())?;
            match pci::decode(&frame.data, offset)? {
                Pdu::ConsecutiveFrame { sn: actual, data } => {
                    if actual != sn {
                        return Err(Error::SequenceError {
                            expected: sn,
                            actual,
                        });
                    }
                    // The last frame may be padded past the payload end
                    let take = data.len().min(len - packet.len());
                    packet.append(&data[..take]);
                    sn = (sn + 1) & 0x0F;

                    if packet.len() == len {
                        state = RxState::Done;
                    } else if block_size != 0 {
                        in_block += 1;
                        if in_block == block_size {
                            in_block = 0;
                            self.send_flow_control(FlowStatus::ContinueToSend)?;
                        }
                    }
                }
                other => return Err(Error::UnexpectedFrame(other.kind())),
            }
        }

        Ok(packet)
    }
}

impl<T: CanTransport> TransportLayer for IsoTp<T> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > MAX_FF_DL {
            return Err(Error::PayloadTooLarge {
                len: data.len(),
                max: MAX_FF_DL,
            });
        }

        debug!(
            id = self.options.source_id,
            len = data.len(),
            "sending ISO-TP payload"
        );
        if data.len() <= single_frame_capacity(self.pci_offset()) {
            self.write_pdu(&Pdu::SingleFrame { data })
        } else {
            self.send_multi_frame(data)
        }
    }

    fn receive(&mut self) -> Result<Packet> {
        let frame = self.read_frame(self.frame_deadline())?;
        let packet = match pci::decode(&frame.data, self.pci_offset())? {
            Pdu::SingleFrame { data } => Packet::from_slice(data),
            Pdu::FirstFrame { len, data } => self.receive_multi_frame(len as usize, data)?,
            other => return Err(Error::UnexpectedFrame(other.kind())),
        };

        debug!(
            id = self.options.dest_id,
            len = packet.len(),
            "received ISO-TP payload"
        );
        Ok(packet)
    }
}
