//! Growable input buffer for streaming sessions.
//!
//! Logically a single byte stream with three watermarks: the stream offset
//! of the first retained byte (`base`), the parse cursor, and the end of
//! committed data. The caller grows the writable tail with `reserve`,
//! fills it through `write_target`, and publishes bytes with `commit`;
//! the parser only ever reads between cursor and end and never revisits
//! consumed bytes.
//!
//! The consumed prefix is reclaimed by copying the unconsumed tail down,
//! but only while no zero-copy payload references pin the retained bytes -
//! the same rewind condition the buffer applies before growing.

use log::trace;

pub(crate) const INIT_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub(crate) struct InputBuffer {
    data: Vec<u8>,
    /// Committed bytes: `data[..valid]` is real input.
    valid: usize,
    /// Parse position within `data`; always <= `valid`.
    cursor: usize,
    /// Stream offset of `data[0]`.
    base: u64,
    /// Set while zero-copy payload references may point into `data`.
    referenced: bool,
    initial_size: usize,
}

impl InputBuffer {
    pub(crate) fn with_capacity(initial_size: usize) -> Self {
        InputBuffer {
            data: vec![0; initial_size.max(1)],
            valid: 0,
            cursor: 0,
            base: 0,
            referenced: false,
            initial_size: initial_size.max(1),
        }
    }

    /// Bytes currently writable without growing.
    #[inline]
    pub(crate) fn writable(&self) -> usize {
        self.data.len() - self.valid
    }

    /// Ensure at least `n` writable bytes, reclaiming consumed space when
    /// nothing pins it, doubling otherwise.
    pub(crate) fn reserve(&mut self, n: usize) {
        if self.writable() >= n {
            return;
        }
        if !self.referenced && self.cursor > 0 {
            self.rewind();
            if self.writable() >= n {
                return;
            }
        }
        let mut next = self.data.len().max(self.initial_size);
        while next < self.valid + n {
            next = next.saturating_mul(2);
        }
        trace!("buffer: grow {} -> {}", self.data.len(), next);
        self.data.resize(next, 0);
    }

    /// The writable tail. Fill some prefix of it, then `commit`.
    #[inline]
    pub(crate) fn write_target(&mut self) -> &mut [u8] {
        &mut self.data[self.valid..]
    }

    /// Publish `n` freshly written bytes as input.
    ///
    /// # Panics
    /// If `n` exceeds the writable tail.
    pub(crate) fn commit(&mut self, n: usize) {
        assert!(n <= self.writable(), "commit of {} bytes exceeds writable tail", n);
        self.valid += n;
    }

    /// Copy bytes in: reserve + write + commit.
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.data[self.valid..self.valid + bytes.len()].copy_from_slice(bytes);
        self.valid += bytes.len();
    }

    /// Unconsumed committed bytes.
    #[inline]
    pub(crate) fn pending(&self) -> &[u8] {
        &self.data[self.cursor..self.valid]
    }

    #[inline]
    pub(crate) fn pending_len(&self) -> usize {
        self.valid - self.cursor
    }

    /// Stream offset of the parse cursor; equals total bytes consumed.
    #[inline]
    pub(crate) fn cursor_offset(&self) -> u64 {
        self.base + self.cursor as u64
    }

    /// Advance the cursor over `n` consumed bytes.
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(self.cursor + n <= self.valid);
        self.cursor += n;
    }

    /// The retained window: its starting stream offset and bytes.
    pub(crate) fn retained(&self) -> (u64, &[u8]) {
        (self.base, &self.data[..self.valid])
    }

    /// Resolve an absolute stream range against the retained bytes.
    /// `None` once the range has been reclaimed.
    pub(crate) fn resolve(&self, offset: u64, len: u32) -> Option<&[u8]> {
        let start = usize::try_from(offset.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(len as usize)?;
        if end > self.valid {
            return None;
        }
        Some(&self.data[start..end])
    }

    #[inline]
    pub(crate) fn set_referenced(&mut self, referenced: bool) {
        self.referenced = referenced;
    }

    #[inline]
    pub(crate) fn referenced(&self) -> bool {
        self.referenced
    }

    /// Reclaim the consumed prefix unless zero-copy references pin it.
    /// Returns whether anything moved.
    pub(crate) fn compact(&mut self) -> bool {
        if self.referenced || self.cursor == 0 {
            return false;
        }
        self.rewind();
        true
    }

    /// Drop committed-but-unconsumed bytes (the pending tail).
    pub(crate) fn discard_pending(&mut self) {
        self.valid = self.cursor;
    }

    fn rewind(&mut self) {
        trace!("buffer: reclaim {} consumed bytes", self.cursor);
        self.data.copy_within(self.cursor..self.valid, 0);
        self.base += self.cursor as u64;
        self.valid -= self.cursor;
        self.cursor = 0;
    }
}
