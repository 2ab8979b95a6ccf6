//! Encode and decode ISO-TP protocol control information (PCI).

use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::CAN_MAX_DLEN;

pub const SF_PCI: u8 = 0x00; // Single Frame
pub const FF_PCI: u8 = 0x10; // First Frame
pub const CF_PCI: u8 = 0x20; // Consecutive Frame
pub const FC_PCI: u8 = 0x30; // Flow Control

/// Largest payload a First Frame can announce (12-bit FF_DL)
pub const MAX_FF_DL: usize = 0x0FFF;

/// Flow control status sent by the receiving side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    ContinueToSend,
    Wait,
    Overflow,
}

impl FlowStatus {
    fn nibble(self) -> u8 {
        match self {
            FlowStatus::ContinueToSend => 0x0,
            FlowStatus::Wait => 0x1,
            FlowStatus::Overflow => 0x2,
        }
    }

    fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x0 => Some(FlowStatus::ContinueToSend),
            0x1 => Some(FlowStatus::Wait),
            0x2 => Some(FlowStatus::Overflow),
            _ => None,
        }
    }
}

/// Parsed ISO-TP protocol data unit, borrowing its payload from the CAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pdu<'a> {
    SingleFrame {
        data: &'a [u8],
    },
    /// `data` may run past `len` when the frame is padded.
    FirstFrame {
        len: u16,
        data: &'a [u8],
    },
    /// `data` may include padding after the last payload byte.
    ConsecutiveFrame {
        sn: u8,
        data: &'a [u8],
    },
    FlowControl {
        status: FlowStatus,
        block_size: u8,
        /// STmin in its encoded byte form, see [`st_min_to_duration`]
        st_min: u8,
    },
}

impl Pdu<'_> {
    /// Human readable frame type, used in errors and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Pdu::SingleFrame { .. } => "single",
            Pdu::FirstFrame { .. } => "first",
            Pdu::ConsecutiveFrame { .. } => "consecutive",
            Pdu::FlowControl { .. } => "flow control",
        }
    }
}

/// Max payload bytes in a Single Frame when the PCI sits at `pci_offset`
pub fn single_frame_capacity(pci_offset: usize) -> usize {
    CAN_MAX_DLEN - 1 - pci_offset
}

/// Payload bytes carried by a First Frame when the PCI sits at `pci_offset`
pub fn first_frame_capacity(pci_offset: usize) -> usize {
    CAN_MAX_DLEN - 2 - pci_offset
}

/// Max payload bytes in a Consecutive Frame when the PCI sits at `pci_offset`
pub fn consecutive_frame_capacity(pci_offset: usize) -> usize {
    CAN_MAX_DLEN - 1 - pci_offset
}

/// Builds the CAN data bytes for `pdu`.
///
/// `prefix` is the extended addressing byte placed before the PCI, if any.
/// With `padding` set the frame is filled up to 8 bytes.
pub fn encode(pdu: &Pdu<'_>, prefix: Option<u8>, padding: Option<u8>) -> Result<Vec<u8>> {
    let offset = usize::from(prefix.is_some());
    let mut buf = Vec::with_capacity(CAN_MAX_DLEN);
    if let Some(address) = prefix {
        buf.push(address);
    }

    match *pdu {
        Pdu::SingleFrame { data } => {
            if data.len() > single_frame_capacity(offset) {
                return Err(Error::MalformedFrame(format!(
                    "{} bytes do not fit a single frame",
                    data.len()
                )));
            }
            buf.push(SF_PCI | data.len() as u8);
            buf.extend_from_slice(data);
        }
        Pdu::FirstFrame { len, data } => {
            let len = len as usize;
            if len <= single_frame_capacity(offset) || len > MAX_FF_DL {
                return Err(Error::MalformedFrame(format!(
                    "first frame length {} out of range",
                    len
                )));
            }
            if data.len() != first_frame_capacity(offset) {
                return Err(Error::MalformedFrame(format!(
                    "first frame needs exactly {} bytes, got {}",
                    first_frame_capacity(offset),
                    data.len()
                )));
            }
            buf.push(FF_PCI | ((len >> 8) as u8 & 0x0F));
            buf.push(len as u8);
            buf.extend_from_slice(data);
        }
        Pdu::ConsecutiveFrame { sn, data } => {
            if data.is_empty() || data.len() > consecutive_frame_capacity(offset) {
                return Err(Error::MalformedFrame(format!(
                    "{} bytes do not fit a consecutive frame",
                    data.len()
                )));
            }
            buf.push(CF_PCI | (sn & 0x0F));
            buf.extend_from_slice(data);
        }
        Pdu::FlowControl {
            status,
            block_size,
            st_min,
        } => {
            buf.push(FC_PCI | status.nibble());
            buf.push(block_size);
            buf.push(st_min);
        }
    }

    if let Some(pad) = padding {
        buf.resize(CAN_MAX_DLEN, pad);
    }
    Ok(buf)
}

/// Decodes CAN data bytes into a [`Pdu`], reading the PCI at `pci_offset`
/// (0 for normal addressing, 1 for extended addressing).
pub fn decode(data: &[u8], pci_offset: usize) -> Result<Pdu<'_>> {
    if data.len() > CAN_MAX_DLEN {
        return Err(Error::MalformedFrame(format!(
            "{} data bytes exceed a classic CAN frame",
            data.len()
        )));
    }
    if data.len() <= pci_offset {
        return Err(Error::MalformedFrame("frame carries no PCI".into()));
    }

    let pci = data[pci_offset];
    match pci & 0xF0 {
        SF_PCI => {
            let len = (pci & 0x0F) as usize;
            let start = pci_offset + 1;
            if len > single_frame_capacity(pci_offset) || data.len() < start + len {
                return Err(Error::MalformedFrame(format!(
                    "single frame declares {} bytes in a {} byte frame",
                    len,
                    data.len()
                )));
            }
            Ok(Pdu::SingleFrame {
                data: &data[start..start + len],
            })
        }
        FF_PCI => {
            // A First Frame always fills the whole CAN frame
            if data.len() < CAN_MAX_DLEN {
                return Err(Error::MalformedFrame(format!(
                    "first frame of {} bytes is truncated",
                    data.len()
                )));
            }
            let len = (((pci & 0x0F) as u16) << 8) | data[pci_offset + 1] as u16;
            if (len as usize) <= single_frame_capacity(pci_offset) {
                return Err(Error::MalformedFrame(format!(
                    "first frame declares only {} bytes",
                    len
                )));
            }
            Ok(Pdu::FirstFrame {
                len,
                data: &data[pci_offset + 2..],
            })
        }
        CF_PCI => {
            let payload = &data[pci_offset + 1..];
            if payload.is_empty() {
                return Err(Error::MalformedFrame("empty consecutive frame".into()));
            }
            Ok(Pdu::ConsecutiveFrame {
                sn: pci & 0x0F,
                data: payload,
            })
        }
        FC_PCI => {
            if data.len() < pci_offset + 3 {
                return Err(Error::MalformedFrame("truncated flow control".into()));
            }
            let status = FlowStatus::from_nibble(pci & 0x0F).ok_or_else(|| {
                Error::MalformedFrame(format!("reserved flow status {:#X}", pci & 0x0F))
            })?;
            Ok(Pdu::FlowControl {
                status,
                block_size: data[pci_offset + 1],
                st_min: data[pci_offset + 2],
            })
        }
        other => Err(Error::MalformedFrame(format!(
            "unknown PCI type {:#04X}",
            other
        ))),
    }
}

/// Longest separation time the STmin byte can express
pub const MAX_ST_MIN: Duration = Duration::from_millis(127);

/// Interprets a received STmin byte.
///
/// 0x00-0x7F are milliseconds, 0xF1-0xF9 are 100-900 microseconds. Reserved
/// values must be treated as the longest valid separation time.
pub fn st_min_to_duration(raw: u8) -> Duration {
    match raw {
        0x00..=0x7F => Duration::from_millis(raw as u64),
        0xF1..=0xF9 => Duration::from_micros((raw - 0xF0) as u64 * 100),
        _ => MAX_ST_MIN,
    }
}

/// Encodes a separation time as an STmin byte.
///
/// Sub-millisecond multiples of 100µs use the microsecond range, anything
/// else is rounded up to whole milliseconds. Returns `None` above 127 ms.
pub fn st_min_from_duration(st_min: Duration) -> Option<u8> {
    if st_min > MAX_ST_MIN {
        return None;
    }
    let micros = st_min.as_micros();
    if (100..=900).contains(&micros) && micros % 100 == 0 {
        return Some(0xF0 + (micros / 100) as u8);
    }
    Some(micros.div_ceil(1000) as u8)
}
