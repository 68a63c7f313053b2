//! The byte region behind a [`BufferedStream`](super::BufferedStream).
use crate::error::{buffer_too_small, Result};

/// A contiguous byte region with a read cursor and an insert cursor.
///
/// `read <= insert <= capacity` always holds. The bytes in `read..insert` are
/// unread; everything past `insert` is scratch. One extra byte past the
/// capacity boundary keeps a `0` sentinel at `insert` so text scans over the
/// raw storage always terminate.
#[derive(Debug)]
pub(crate) struct Buffer {
    data: Vec<u8>,
    read: usize,
    insert: usize,
}

impl Buffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity + 1],
            read: 0,
            insert: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.data.len() - 1
    }

    /// Number of unread bytes.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.insert - self.read
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.read == self.insert
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    #[inline]
    pub(crate) fn unread(&self) -> &[u8] {
        &self.data[self.read..self.insert]
    }

    /// Free space past the insert cursor. Call [`Buffer::compact`] first to
    /// make all of the free space contiguous.
    #[inline]
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] {
        let end = self.capacity();
        &mut self.data[self.insert..end]
    }

    /// Mark `amt` bytes written into [`Buffer::spare_mut`] as unread.
    #[inline]
    pub(crate) fn commit(&mut self, amt: usize) {
        debug_assert!(self.insert + amt <= self.capacity());
        self.insert += amt;
        self.data[self.insert] = 0;
    }

    /// Advance the read cursor past `amt` unread bytes.
    #[inline]
    pub(crate) fn consume(&mut self, amt: usize) {
        debug_assert!(amt <= self.len());
        self.read += amt;
        // Reset the cursors if we've consumed all the bytes.
        if self.read == self.insert {
            self.read = 0;
            self.insert = 0;
            self.data[0] = 0;
        }
    }

    /// Shift the unread bytes to the start of the region.
    pub(crate) fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        self.data.copy_within(self.read..self.insert, 0);
        self.insert -= self.read;
        self.read = 0;
        self.data[self.insert] = 0;
    }

    /// Change the capacity, keeping unread bytes.
    ///
    /// Growing keeps both cursors where they are. Shrinking below the insert
    /// cursor compacts first and fails if the unread bytes still do not fit.
    pub(crate) fn resize(&mut self, capacity: usize) -> Result<()> {
        if capacity < self.len() {
            return Err(buffer_too_small(capacity, self.len()));
        }
        if capacity < self.insert {
            self.compact();
        }
        self.data.resize(capacity + 1, 0);
        self.data[self.insert] = 0;
        Ok(())
    }

    #[cfg(test)]
    fn sentinel(&self) -> u8 {
        self.data[self.insert]
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    fn filled(bytes: &[u8], capacity: usize) -> Buffer {
        let mut buffer = Buffer::new(capacity);
        let n = bytes.len().min(capacity);
        buffer.spare_mut()[..n].copy_from_slice(&bytes[..n]);
        buffer.commit(n);
        buffer
    }

    #[test]
    fn consume_all_resets_cursors() {
        let mut buffer = filled(b"abcdef", 8);
        buffer.consume(6);
        assert!(buffer.is_empty());
        assert_eq!(buffer.spare_mut().len(), 8);
    }

    #[test]
    fn shrinking_below_unread_fails() {
        let mut buffer = filled(b"abcdef", 8);
        assert!(buffer.resize(5).is_err());
        assert_eq!(buffer.unread(), b"abcdef");
    }

    #[test]
    fn shrinking_compacts_first() {
        let mut buffer = filled(b"abcdef", 8);
        buffer.consume(4);
        buffer.resize(2).unwrap();
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.unread(), b"ef");
        assert!(buffer.is_full());
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn compaction_preserves_unread(
            bytes in proptest::collection::vec(any::<u8>(), 1..64),
            consume in any::<prop::sample::Index>(),
        ) {
            let mut buffer = filled(&bytes, 64);
            let amt = consume.index(bytes.len());
            buffer.consume(amt);
            let expected = buffer.unread().to_vec();
            buffer.compact();
            prop_assert_eq!(buffer.unread(), expected.as_slice());
            prop_assert_eq!(buffer.spare_mut().len(), 64 - expected.len());
            prop_assert_eq!(buffer.sentinel(), 0);
        }

        #[test]
        fn growth_preserves_cursors(
            bytes in proptest::collection::vec(any::<u8>(), 1..32),
            extra in 0usize..64,
        ) {
            let mut buffer = filled(&bytes, 32);
            buffer.consume(bytes.len() / 2);
            let expected = buffer.unread().to_vec();
            buffer.resize(32 + extra).unwrap();
            prop_assert_eq!(buffer.capacity(), 32 + extra);
            prop_assert_eq!(buffer.unread(), expected.as_slice());
            prop_assert_eq!(buffer.sentinel(), 0);
        }
    }
}
