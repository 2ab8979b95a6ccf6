//! Payload buffers for ISO-TP exchanges.
//!
//! A [`Packet`] holds one complete ISO-TP payload: the caller's data before
//! segmentation on send, or the reassembled data on receive. [`PacketReader`]
//! walks a packet in bounded chunks so the segmenter can carve consecutive
//! frames without splitting the whole buffer up front.

use std::ops::{Deref, Index, IndexMut};

/// One logical ISO-TP payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Replaces the packet contents with `data`
    pub fn set_data(&mut self, data: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(data);
    }

    /// Appends `data` to the end of the packet
    pub fn append(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Moves the packet storage into `dest`, leaving the packet empty.
    ///
    /// Whatever `dest` held before is dropped.
    pub fn move_into(&mut self, dest: &mut Vec<u8>) {
        *dest = std::mem::take(&mut self.data);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::new(self)
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for Packet {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl From<Packet> for Vec<u8> {
    fn from(packet: Packet) -> Self {
        packet.data
    }
}

impl Deref for Packet {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Index<usize> for Packet {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.data[index]
    }
}

impl IndexMut<usize> for Packet {
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.data[index]
    }
}

impl<'a> IntoIterator for &'a Packet {
    type Item = &'a u8;
    type IntoIter = std::slice::Iter<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// Read cursor over a [`Packet`] (or any borrowed byte slice)
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(packet: &'a Packet) -> Self {
        Self::from_slice(packet.as_slice())
    }

    pub fn from_slice(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Number of bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the next bytes in the packet, stopping at `max` bytes
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self, max: usize) -> &'a [u8] {
        let count = max.min(self.remaining());
        let data: &'a [u8] = self.data;
        let chunk = &data[self.position..self.position + count];
        self.position += count;
        chunk
    }

    /// Copies the next bytes into `dest`, returning how many were copied
    pub fn next_into(&mut self, dest: &mut [u8]) -> usize {
        let chunk = self.next(dest.len());
        dest[..chunk.len()].copy_from_slice(chunk);
        chunk.len()
    }

    pub fn read_remaining(&mut self) -> &'a [u8] {
        self.next(self.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_set_data() {
        let mut packet = Packet::new();
        packet.append(&[1, 2]);
        packet.append(&[3]);
        assert_eq!(packet.as_slice(), &[1, 2, 3]);

        packet.set_data(&[9]);
        assert_eq!(packet.as_slice(), &[9]);
        assert_eq!(packet[0], 9);

        packet[0] = 7;
        assert_eq!(packet.as_slice(), &[7]);
    }

    #[test]
    fn move_into_leaves_packet_empty() {
        let mut packet = Packet::from_slice(&[1, 2, 3]);
        let mut dest = vec![0xFF; 10];
        packet.move_into(&mut dest);
        assert_eq!(dest, vec![1, 2, 3]);
        assert!(packet.is_empty());
    }

    #[test]
    #[should_panic]
    fn index_out_of_range_panics() {
        let packet = Packet::from_slice(&[1, 2]);
        let _ = packet[2];
    }

    #[test]
    fn reader_yields_bounded_chunks() {
        let packet = Packet::from((0u8..20).collect::<Vec<_>>());
        let mut reader = packet.reader();

        assert_eq!(reader.remaining(), 20);
        assert_eq!(reader.next(6), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(reader.next(7), &[6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(reader.position(), 13);
        assert_eq!(reader.next(10), &[13, 14, 15, 16, 17, 18, 19]);
        assert_eq!(reader.remaining(), 0);
        assert!(reader.next(7).is_empty());
        assert_eq!(packet.len(), 20);
    }

    #[test]
    fn reader_copies_into_slice() {
        let packet = Packet::from_slice(&[1, 2, 3, 4, 5]);
        let mut reader = PacketReader::new(&packet);

        let mut buf = [0u8; 3];
        assert_eq!(reader.next_into(&mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(reader.next_into(&mut buf), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[test]
    fn read_remaining_drains() {
        let packet = Packet::from_slice(&[1, 2, 3, 4]);
        let mut reader = packet.reader();
        reader.next(1);
        assert_eq!(reader.read_remaining(), &[2, 3, 4]);
        assert_eq!(reader.remaining(), 0);
    }
}
