//! Fixed-capacity receive cursor buffer.
//!
//! Bytes land in `buf[write..capacity]` via [`RecvBuffer::spare_capacity_mut`],
//! then `advance_write` makes them visible through `unread()`. A reader
//! consumes from the front with `advance_read`, which slides the remaining
//! bytes back to offset zero once `read` crosses `compact_threshold` rather
//! than on every call, so a steady trickle of small frames doesn't memmove
//! on every single one.

use mesh_util::safe_assert;

pub struct RecvBuffer {
    buf: Vec<u8>,
    read: usize,
    write: usize,
    compact_threshold: usize,
}

impl RecvBuffer {
    pub fn new(capacity: usize, compact_threshold: usize) -> Self {
        safe_assert!(compact_threshold <= capacity, "compact threshold must fit within capacity");
        Self { buf: vec![0u8; capacity], read: 0, write: 0, compact_threshold }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes available to read, oldest first.
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.read..self.write]
    }

    pub fn len(&self) -> usize {
        self.write - self.read
    }

    pub fn is_empty(&self) -> bool {
        self.write == self.read
    }

    /// Room left in the tail of the backing array. Zero does not necessarily
    /// mean the buffer is logically full: call [`Self::compact`] first.
    pub fn spare_capacity_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.write..]
    }

    pub fn advance_write(&mut self, n: usize) {
        safe_assert!(self.write + n <= self.buf.len(), "write advance overruns capacity");
        self.write += n;
    }

    /// Drops `n` consumed bytes from the front, compacting if the read
    /// cursor has drifted past `compact_threshold`.
    pub fn advance_read(&mut self, n: usize) {
        safe_assert!(self.read + n <= self.write, "read advance overruns unread data");
        self.read += n;
        if self.read >= self.compact_threshold {
            self.compact();
        }
    }

    /// Slides unread bytes down to offset zero.
    pub fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        self.buf.copy_within(self.read..self.write, 0);
        self.write -= self.read;
        self.read = 0;
    }

    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = RecvBuffer::new(64, 48);
        buf.spare_capacity_mut()[..5].copy_from_slice(b"hello");
        buf.advance_write(5);
        assert_eq!(buf.unread(), b"hello");
        buf.advance_read(5);
        assert!(buf.is_empty());
    }

    #[test]
    fn compacts_only_past_threshold() {
        let mut buf = RecvBuffer::new(16, 10);
        buf.spare_capacity_mut()[..12].copy_from_slice(&[1u8; 12]);
        buf.advance_write(12);
        buf.advance_read(8);
        // below threshold: no compaction, tail still has 4 bytes of room left
        assert_eq!(buf.spare_capacity_mut().len(), 4);

        buf.spare_capacity_mut()[..4].copy_from_slice(&[2u8; 4]);
        buf.advance_write(4);
        buf.advance_read(2);
        // read cursor (10) now at threshold: compacted, full capacity minus unread restored
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.spare_capacity_mut().len(), 10);
    }

    #[test]
    fn preserves_unread_suffix_across_compaction() {
        let mut buf = RecvBuffer::new(16, 4);
        buf.spare_capacity_mut()[..10].copy_from_slice(&[9u8; 10]);
        buf.advance_write(10);
        buf.spare_capacity_mut()[..1].copy_from_slice(b"Z");
        buf.advance_write(1);
        buf.advance_read(10);
        assert_eq!(buf.unread(), b"Z");
    }
}
