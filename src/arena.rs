//! The string arena and the spans that point into it.
//!
//! Scalars, tags and anchors are stored as [`Span`]s. A span either borrows
//! from storage the caller owns (typically the source buffer a parser was
//! given) or names a range of the tree's own string arena. Arena spans are
//! stored as base-relative offsets, so growing the arena — which copies the
//! bytes to a larger buffer — cannot invalidate them; there are no interior
//! pointers to relocate.

use log::trace;
use text_size::{TextRange, TextSize};

/// A view of scalar bytes.
///
/// Note that `==` compares the *representation* (same source slice, or same
/// arena range), not byte contents. Byte-level comparisons go through the
/// tree, which can resolve arena spans against its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span<'s> {
    /// Borrowed from externally-owned storage.
    Source(&'s [u8]),
    /// Resident in the tree's string arena.
    Arena(TextRange),
}

impl<'s> Span<'s> {
    /// The empty span.
    #[inline]
    pub const fn empty() -> Self {
        Span::Source(&[])
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Span::Source(bytes) => bytes.len(),
            Span::Arena(range) => u32::from(range.len()) as usize,
        }
    }

    /// Is this span empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is this span resident in a string arena?
    #[inline]
    pub fn is_arena(&self) -> bool {
        matches!(self, Span::Arena(_))
    }
}

impl<'s> Default for Span<'s> {
    #[inline]
    fn default() -> Self {
        Span::empty()
    }
}

impl<'s> From<&'s [u8]> for Span<'s> {
    #[inline]
    fn from(bytes: &'s [u8]) -> Self {
        Span::Source(bytes)
    }
}

impl<'s, const N: usize> From<&'s [u8; N]> for Span<'s> {
    #[inline]
    fn from(bytes: &'s [u8; N]) -> Self {
        Span::Source(bytes)
    }
}

impl<'s> From<&'s str> for Span<'s> {
    #[inline]
    fn from(text: &'s str) -> Self {
        Span::Source(text.as_bytes())
    }
}

/// Append-only byte storage for scalars the tree owns itself.
///
/// Growth is geometric (at least doubling) and preserves the appended prefix
/// byte for byte, so previously handed-out ranges stay valid.
#[derive(Debug, Clone, Default)]
pub(crate) struct StringArena {
    buf: Vec<u8>,
}

impl StringArena {
    pub(crate) fn new() -> Self {
        StringArena { buf: Vec::new() }
    }

    /// Number of bytes appended so far.
    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Grows the buffer to hold at least `new_cap` bytes. Shrinking is not
    /// supported; a smaller `new_cap` is a no-op.
    pub(crate) fn reserve(&mut self, new_cap: usize) {
        if new_cap > self.buf.capacity() {
            trace!("growing string arena from {} to {} bytes", self.buf.capacity(), new_cap);
            self.buf.reserve_exact(new_cap - self.buf.len());
        }
    }

    /// Copies `bytes` into the arena, growing it if needed, and returns the
    /// range they now occupy.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> TextRange {
        let pos = self.buf.len();
        let required = pos + bytes.len();
        if required > self.buf.capacity() {
            self.reserve(required.max(2 * self.buf.capacity()));
        }
        self.buf.extend_from_slice(bytes);
        let start = TextSize::try_from(pos).expect("string arena exceeds 4 GiB");
        let len = TextSize::try_from(bytes.len()).expect("string arena exceeds 4 GiB");
        TextRange::at(start, len)
    }

    /// The bytes a previously appended range refers to.
    #[inline]
    pub(crate) fn get(&self, range: TextRange) -> &[u8] {
        &self.buf[u32::from(range.start()) as usize..u32::from(range.end()) as usize]
    }

    /// Does `span` point into this arena?
    pub(crate) fn contains(&self, span: &Span<'_>) -> bool {
        match span {
            Span::Source(_) => false,
            Span::Arena(range) => {
                debug_assert!(u32::from(range.end()) as usize <= self.buf.len());
                true
            }
        }
    }

    /// Forgets all appended bytes, keeping the allocation.
    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }
}
