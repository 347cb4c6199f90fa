//! Layout segment algebra.
//!
//! A segment is an `(iomode, offset, length)` triple over a file's byte
//! range. A length of [`NFS4_UINT64_MAX`] means "to the end of the file",
//! and a zero length is empty and overlaps nothing.
//!
//! Range ends are computed in `u128`, so every operation is total for any
//! pair of `u64` inputs.

use crate::nfs::Layoutiomode4;
use serde::{Deserialize, Serialize};

/// Length value meaning "unbounded".
pub const NFS4_UINT64_MAX: u64 = u64::MAX;

/// A byte range of a file together with the I/O mode it authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub io_mode: Layoutiomode4,
    pub offset: u64,
    pub length: u64,
}

impl Segment {
    pub const fn new(io_mode: Layoutiomode4, offset: u64, length: u64) -> Self {
        Self {
            io_mode,
            offset,
            length,
        }
    }

    /// The segment covering the entire file.
    pub const fn whole_file(io_mode: Layoutiomode4) -> Self {
        Self::new(io_mode, 0, NFS4_UINT64_MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_infinite(&self) -> bool {
        self.length == NFS4_UINT64_MAX
    }

    /// True for `offset == 0, length == NFS4_UINT64_MAX`.
    pub fn is_whole_file(&self) -> bool {
        self.offset == 0 && self.is_infinite()
    }

    /// Exclusive end of the range. Infinite segments end past every offset.
    fn end(&self) -> u128 {
        if self.is_infinite() {
            u64::MAX as u128 + 1
        } else {
            self.offset as u128 + self.length as u128
        }
    }

    pub fn overlaps(&self, other: &Segment) -> bool {
        overlaps(self, other)
    }

    pub fn contains(&self, inner: &Segment) -> bool {
        contains(self, inner)
    }

    pub fn difference(&self, subtrahend: &Segment) -> Segment {
        difference(self, subtrahend)
    }
}

/// True if the segments share an I/O mode bit and a byte.
///
/// Touching ranges (`a.offset + a.length == b.offset`) do not overlap.
pub fn overlaps(a: &Segment, b: &Segment) -> bool {
    if !a.io_mode.intersects(b.io_mode) || a.is_empty() || b.is_empty() {
        return false;
    }
    (a.offset as u128) < b.end() && (b.offset as u128) < a.end()
}

/// True if `inner` lies entirely within `outer` and their modes intersect.
pub fn contains(outer: &Segment, inner: &Segment) -> bool {
    if !outer.io_mode.intersects(inner.io_mode) || outer.is_empty() {
        return false;
    }
    if outer.offset > inner.offset {
        return false;
    }
    if outer.is_infinite() {
        return true;
    }
    if inner.is_infinite() {
        return false;
    }
    inner.end() <= outer.end()
}

/// Remove `subtrahend` from `minuend`.
///
/// Returns the minuend untouched when the modes differ or the ranges are
/// disjoint, and an empty segment when the subtrahend covers it. A
/// subtrahend strictly inside the minuend would leave two pieces; that
/// split is not represented and the minuend is returned unchanged.
pub fn difference(minuend: &Segment, subtrahend: &Segment) -> Segment {
    if !minuend.io_mode.intersects(subtrahend.io_mode) || !overlaps(minuend, subtrahend) {
        return *minuend;
    }

    let empty = Segment::new(minuend.io_mode, 0, 0);

    if contains(subtrahend, minuend) {
        return empty;
    }

    if minuend.offset < subtrahend.offset {
        if subtrahend.end() < minuend.end() {
            // Interior subtrahend.
            return *minuend;
        }
        return Segment::new(
            minuend.io_mode,
            minuend.offset,
            subtrahend.offset - minuend.offset,
        );
    }

    // The subtrahend covers the head of the minuend; keep the tail.
    let tail_start = subtrahend.end();
    if tail_start > u64::MAX as u128 {
        return empty;
    }
    let tail_start = tail_start as u64;
    let length = if minuend.is_infinite() {
        NFS4_UINT64_MAX
    } else {
        (minuend.end() - tail_start as u128) as u64
    };
    Segment::new(minuend.io_mode, tail_start, length)
}
