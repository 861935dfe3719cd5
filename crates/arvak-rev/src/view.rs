//! Index views over allocated registers.
//!
//! A [`View`] is a register identity plus an ordered list of indices relative
//! to the start of that register. Views are cheap to slice and compose; they
//! are turned into absolute wire addresses with [`View::resolve`] against the
//! allocator that owns the register.

use std::ops::{Bound, RangeBounds};

use serde::{Deserialize, Serialize};

use crate::allocator::{Allocator, ChunkId};
use crate::config::IndexMode;
use crate::error::{RevError, RevResult};

/// One key of a selection expression.
///
/// A selection concatenates the positions produced by each of its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A single position; negative positions count from the end.
    Index(isize),
    /// An end-exclusive range of positions with a step.
    Range {
        /// First position, defaulting to 0.
        start: Option<isize>,
        /// End position (exclusive), defaulting to the length.
        stop: Option<isize>,
        /// Stride between positions.
        step: usize,
    },
    /// An explicit list of positions.
    List(Vec<usize>),
    /// Every index of another view over the same register.
    View(View),
}

impl Key {
    /// A unit-step range.
    pub fn range(start: Option<isize>, stop: Option<isize>) -> Self {
        Key::Range {
            start,
            stop,
            step: 1,
        }
    }
}

/// An ordered selection of wires within one register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct View {
    /// The register this view indexes into.
    chunk: ChunkId,
    /// Indices relative to the register start.
    indices: Vec<usize>,
}

impl View {
    /// Create a view from a register and relative indices.
    pub fn new(chunk: ChunkId, indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            chunk,
            indices: indices.into_iter().collect(),
        }
    }

    /// The register this view belongs to.
    pub fn chunk(&self) -> ChunkId {
        self.chunk
    }

    /// Relative indices held by this view.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of wires in the view.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if the view selects no wires.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Select the wire at `position`.
    pub fn at(&self, position: usize) -> RevResult<View> {
        self.idx(&[position])
    }

    /// Select a contiguous run of positions.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> RevResult<View> {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e + 1,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        };
        if end > len {
            return Err(RevError::IndexOutOfRange { index: end, len });
        }
        if start > end {
            return Err(RevError::InvalidSlice(format!("start {start} is past end {end}")));
        }
        Ok(Self::new(self.chunk, self.indices[start..end].iter().copied()))
    }

    /// Select positions of this view, in the given order.
    pub fn idx(&self, positions: &[usize]) -> RevResult<View> {
        let indices = positions
            .iter()
            .map(|&p| {
                self.indices.get(p).copied().ok_or(RevError::IndexOutOfRange {
                    index: p,
                    len: self.len(),
                })
            })
            .collect::<RevResult<Vec<_>>>()?;
        Ok(Self::new(self.chunk, indices))
    }

    /// Evaluate a selection expression against this view.
    pub fn select(&self, keys: &[Key], mode: IndexMode) -> RevResult<View> {
        let len = self.len();
        let mut indices = Vec::new();

        for key in keys {
            match key {
                Key::Index(i) => {
                    let position = normalize_index(*i, len)?;
                    indices.extend_from_slice(self.idx(&[position])?.indices());
                }
                Key::Range { start, stop, step } => {
                    if *step == 0 {
                        return Err(RevError::InvalidSlice("slice step cannot be zero".into()));
                    }
                    let (lo, hi) = slice_bounds(*start, *stop, len, mode);
                    let positions: Vec<_> = (lo..hi).step_by(*step).collect();
                    indices.extend_from_slice(self.idx(&positions)?.indices());
                }
                Key::List(list) => indices.extend_from_slice(self.idx(list)?.indices()),
                Key::View(other) => {
                    if other.chunk != self.chunk {
                        return Err(RevError::UnsupportedJoin {
                            left: self.chunk,
                            right: other.chunk,
                        });
                    }
                    indices.extend_from_slice(&other.indices);
                }
            }
        }

        Ok(Self::new(self.chunk, indices))
    }

    /// Concatenate with another view over the same register.
    pub fn join(&self, other: &View) -> RevResult<View> {
        if other.chunk != self.chunk {
            return Err(RevError::UnsupportedJoin {
                left: self.chunk,
                right: other.chunk,
            });
        }
        let mut indices = self.indices.clone();
        indices.extend(other.indices.iter().copied());
        Ok(Self::new(self.chunk, indices))
    }

    /// Translate to absolute wire addresses.
    ///
    /// Fails if the register has been released or has shrunk below one of
    /// the held indices.
    pub fn resolve(&self, allocator: &Allocator) -> RevResult<Vec<usize>> {
        let chunk = allocator.live_chunk(self.chunk)?;
        self.indices
            .iter()
            .map(|&i| {
                if i < chunk.size() {
                    Ok(chunk.start() + i)
                } else {
                    Err(RevError::IndexOutOfRange {
                        index: i,
                        len: chunk.size(),
                    })
                }
            })
            .collect()
    }
}

/// Normalize a single (possibly negative) position.
///
/// A negative index that reaches before the start is reported by its
/// magnitude.
fn normalize_index(index: isize, len: usize) -> RevResult<usize> {
    let magnitude = index.unsigned_abs();
    let resolved = if index < 0 {
        len.checked_sub(magnitude)
    } else {
        Some(magnitude)
    };
    match resolved {
        Some(i) if i < len => Ok(i),
        _ => Err(RevError::IndexOutOfRange {
            index: magnitude,
            len,
        }),
    }
}

fn slice_bounds(
    start: Option<isize>,
    stop: Option<isize>,
    len: usize,
    mode: IndexMode,
) -> (usize, usize) {
    let bound = |value: isize| -> usize {
        match (mode, value < 0) {
            (_, false) => value.unsigned_abs(),
            (IndexMode::Conventional, true) => len.saturating_sub(value.unsigned_abs()),
            (IndexMode::Compat, true) => len + value.unsigned_abs(),
        }
    };
    let lo = start.map_or(0, bound);
    let hi = stop.map_or(len, bound);
    match mode {
        IndexMode::Conventional => {
            let hi = hi.min(len);
            (lo.min(hi), hi)
        }
        IndexMode::Compat => (lo, hi.max(lo)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(n: usize) -> View {
        View::new(ChunkId(1), 0..n)
    }

    #[test]
    fn test_slice_and_at() {
        let v = view(6);
        assert_eq!(v.slice(2..5).unwrap().indices(), &[2, 3, 4]);
        assert_eq!(v.slice(..2).unwrap().indices(), &[0, 1]);
        assert_eq!(v.slice(4..).unwrap().indices(), &[4, 5]);
        assert_eq!(v.at(3).unwrap().indices(), &[3]);
        assert!(v.at(6).is_err());
        assert!(v.slice(3..7).is_err());
    }

    #[test]
    fn test_composed_views() {
        let v = view(8);
        let inner = v.slice(2..7).unwrap();
        let picked = inner.idx(&[4, 0, 2]).unwrap();
        assert_eq!(picked.indices(), &[6, 2, 4]);
    }

    #[test]
    fn test_select_concatenates_keys() {
        let v = view(8);
        let sel = v
            .select(
                &[Key::Index(-1), Key::range(Some(1), Some(3)), Key::List(vec![5])],
                IndexMode::Conventional,
            )
            .unwrap();
        assert_eq!(sel.indices(), &[7, 1, 2, 5]);
    }

    #[test]
    fn test_select_index_out_of_range() {
        let v = view(6);
        assert!(matches!(
            v.select(&[Key::Index(8)], IndexMode::Conventional),
            Err(RevError::IndexOutOfRange { index: 8, len: 6 })
        ));
        assert!(matches!(
            v.select(&[Key::Index(-7)], IndexMode::Conventional),
            Err(RevError::IndexOutOfRange { index: 7, len: 6 })
        ));
        assert_eq!(
            v.select(&[Key::Index(-6)], IndexMode::Conventional)
                .unwrap()
                .indices(),
            &[0]
        );
    }

    #[test]
    fn test_negative_bounds_conventional() {
        let v = view(6);
        let tail = v
            .select(&[Key::range(Some(-2), None)], IndexMode::Conventional)
            .unwrap();
        assert_eq!(tail.indices(), &[4, 5]);
        let head = v
            .select(&[Key::range(None, Some(-4))], IndexMode::Conventional)
            .unwrap();
        assert_eq!(head.indices(), &[0, 1]);
    }

    #[test]
    fn test_negative_bounds_compat() {
        let v = view(6);
        // len - (-2) = 8: past the end, so the range is empty.
        let tail = v
            .select(&[Key::range(Some(-2), None)], IndexMode::Compat)
            .unwrap();
        assert!(tail.is_empty());
        // Literal stop of 8 selects positions that do not exist.
        let over = v.select(&[Key::range(Some(4), Some(-2))], IndexMode::Compat);
        assert!(matches!(over, Err(RevError::IndexOutOfRange { index: 6, .. })));
    }

    #[test]
    fn test_stepped_range() {
        let v = view(7);
        let sel = v
            .select(
                &[Key::Range {
                    start: Some(1),
                    stop: None,
                    step: 2,
                }],
                IndexMode::Conventional,
            )
            .unwrap();
        assert_eq!(sel.indices(), &[1, 3, 5]);
    }

    #[test]
    fn test_join_same_register() {
        let v = view(6);
        let low = v.slice(..2).unwrap();
        let high = v.slice(4..).unwrap();
        assert_eq!(low.join(&high).unwrap().indices(), &[0, 1, 4, 5]);

        let sel = v.select(&[Key::Index(3), Key::View(low)], IndexMode::Conventional);
        assert_eq!(sel.unwrap().indices(), &[3, 0, 1]);
    }

    #[test]
    fn test_join_across_registers_fails() {
        let a = View::new(ChunkId(1), 0..2);
        let b = View::new(ChunkId(2), 0..2);
        assert!(matches!(a.join(&b), Err(RevError::UnsupportedJoin { .. })));
        assert!(matches!(
            a.select(&[Key::View(b)], IndexMode::Conventional),
            Err(RevError::UnsupportedJoin { .. })
        ));
    }

    #[test]
    fn test_resolve() {
        let mut alloc = Allocator::new();
        let _pad = alloc.alloc(3, None, 0);
        let reg = alloc.alloc(4, Some("r"), 0);
        let v = alloc.view(reg).unwrap();
        assert_eq!(v.resolve(&alloc).unwrap(), vec![3, 4, 5, 6]);
        assert_eq!(v.idx(&[3, 1]).unwrap().resolve(&alloc).unwrap(), vec![6, 4]);

        alloc.partial_free_end(reg, 2).unwrap();
        assert!(matches!(
            v.resolve(&alloc),
            Err(RevError::IndexOutOfRange { index: 2, len: 2 })
        ));

        alloc.free(reg).unwrap();
        assert!(matches!(v.resolve(&alloc), Err(RevError::StaleView(_))));
    }
}
