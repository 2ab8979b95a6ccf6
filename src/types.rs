/// CAN ID type
pub type CanId = u32;

/// Generic frame data type
pub type FrameData = Vec<u8>;

/// Largest 11-bit arbitration identifier
pub const MAX_STANDARD_ID: CanId = 0x7FF;

/// Largest 29-bit arbitration identifier
pub const MAX_EXTENDED_ID: CanId = 0x1FFF_FFFF;

/// Payload capacity of a classic CAN frame
pub const CAN_MAX_DLEN: usize = 8;

/// A single classic CAN data frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub id: CanId,
    pub data: FrameData,
    pub is_extended: bool,
}

impl Frame {
    /// Creates a frame with an 11-bit identifier
    pub fn new(id: CanId, data: &[u8]) -> Self {
        Self {
            id,
            data: data.to_vec(),
            is_extended: false,
        }
    }

    /// Creates a frame with a 29-bit identifier
    pub fn extended(id: CanId, data: &[u8]) -> Self {
        Self {
            id,
            data: data.to_vec(),
            is_extended: true,
        }
    }

    /// Checks the identifier range and data length against classic CAN limits
    pub fn is_valid(&self) -> bool {
        let max_id = if self.is_extended {
            MAX_EXTENDED_ID
        } else {
            MAX_STANDARD_ID
        };
        self.id <= max_id && self.data.len() <= CAN_MAX_DLEN
    }
}

/// Configuration trait that must be implemented by all protocol configurations
pub trait Config {
    fn validate(&self) -> crate::error::Result<()>;
}

/// Port trait that must be implemented by platform-specific code.
///
/// A port hands out every frame seen on the bus; identifier filtering is done
/// by [`crate::physical::can::Can`].
pub trait Port {
    fn send(&mut self, frame: &Frame) -> crate::error::Result<()>;
    /// Returns the next frame on the bus, or [`crate::error::Error::Timeout`]
    /// if none arrives within `timeout`.
    fn receive(&mut self, timeout: std::time::Duration) -> crate::error::Result<Frame>;
}
