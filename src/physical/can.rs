use std::time::{Duration, Instant};

use super::CanTransport;
use crate::error::{Error, Result};
use crate::types::{CanId, Config, Frame, Port};
use bitflags::bitflags;
use tracing::{debug, trace};

/// CAN configuration
#[derive(Debug, Clone)]
pub struct CanConfig {
    pub bitrate: u32,
    pub options: CanOptions,
}

/// CAN bitrate configurations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanBitrate {
    Rate1M,       // 1Mbit/sec
    Rate500K,     // 500kbit/sec, the usual diagnostic bus rate
    Rate250K,     // 250kbit/sec
    Rate125K,     // 125kbit/sec
    Custom(u32),  // Custom bitrate
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CanOptions: u32 {
        const NONE = 0;
        const LOOPBACK = 1;
        const LISTEN_ONLY = 2;
        const ONE_SHOT = 4;
    }
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            bitrate: 500_000,
            options: CanOptions::NONE,
        }
    }
}

impl Config for CanConfig {
    fn validate(&self) -> Result<()> {
        if self.bitrate == 0 {
            return Err(Error::InvalidConfig("bitrate must be non-zero".into()));
        }
        if self
            .options
            .contains(CanOptions::LISTEN_ONLY | CanOptions::ONE_SHOT)
        {
            return Err(Error::InvalidConfig(
                "one-shot transmission makes no sense in listen-only mode".into(),
            ));
        }
        Ok(())
    }
}

/// Identifier-filtering CAN interface over a platform [`Port`]
pub struct Can<P: Port> {
    config: CanConfig,
    port: P,
    is_open: bool,
    tx_count: u64,
    rx_count: u64,
    filtered_count: u64,
}

impl<P: Port> Can<P> {
    /// Creates a new CAN instance with the given port
    pub fn with_port(config: CanConfig, port: P) -> Self {
        Self {
            config,
            port,
            is_open: false,
            tx_count: 0,
            rx_count: 0,
            filtered_count: 0,
        }
    }

    /// Configure CAN controller with standard bitrate profile
    pub fn with_bitrate(port: P, bitrate: CanBitrate, options: CanOptions) -> Self {
        let rate = match bitrate {
            CanBitrate::Rate1M => 1_000_000,
            CanBitrate::Rate500K => 500_000,
            CanBitrate::Rate250K => 250_000,
            CanBitrate::Rate125K => 125_000,
            CanBitrate::Custom(rate) => rate,
        };

        Self::with_port(
            CanConfig {
                bitrate: rate,
                options,
            },
            port,
        )
    }

    pub fn open(&mut self) -> Result<()> {
        if self.is_open {
            return Ok(());
        }

        self.config.validate()?;
        debug!(
            bitrate = self.config.bitrate,
            options = ?self.config.options,
            "CAN interface opened"
        );
        self.is_open = true;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if self.is_open {
            debug!(
                tx = self.tx_count,
                rx = self.rx_count,
                filtered = self.filtered_count,
                "CAN interface closed"
            );
        }
        self.is_open = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn config(&self) -> &CanConfig {
        &self.config
    }

    /// Frames transmitted since creation
    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    /// Frames handed out by [`CanTransport::receive_matching`]
    pub fn rx_count(&self) -> u64 {
        self.rx_count
    }

    /// Frames discarded because their identifier did not match
    pub fn filtered_count(&self) -> u64 {
        self.filtered_count
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }
}

impl<P: Port> CanTransport for Can<P> {
    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }
        if self.config.options.contains(CanOptions::LISTEN_ONLY) {
            return Err(Error::InvalidConfig(
                "cannot transmit in listen-only mode".into(),
            ));
        }
        if !frame.is_valid() {
            return Err(Error::MalformedFrame(format!(
                "id {:#X} with {} data bytes is not a classic CAN frame",
                frame.id,
                frame.data.len()
            )));
        }

        self.port.send(frame)?;
        self.tx_count += 1;
        Ok(())
    }

    fn receive_matching(&mut self, id: CanId, timeout: Duration) -> Result<Frame> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }

            let frame = self.port.receive(remaining)?;
            if frame.id == id {
                self.rx_count += 1;
                return Ok(frame);
            }
            trace!(id = frame.id, wanted = id, "dropping frame for another identifier");
            self.filtered_count += 1;
        }
    }
}
