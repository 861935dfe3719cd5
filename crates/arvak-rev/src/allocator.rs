//! Address-space allocator for registers and ancillae.
//!
//! The address space is a one-dimensional, unbounded run of wires. Live
//! allocations are [`Chunk`]s kept in address order; the untracked gap that
//! follows a chunk is its `trailing_free`. A zero-size head sentinel at
//! address 0 owns the gap before the first real chunk and is never freed.
//!
//! Chunk records live in an arena addressed by [`ChunkId`]. Released records
//! stay in the arena (marked dead) so ids are never reused and stale views
//! can be detected.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{RevError, RevResult};
use crate::view::View;

/// Identifier of a chunk record in the allocator arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub u32);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Token identifying the scope that owns an ancilla chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerToken(pub u64);

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

/// A contiguous allocation `[start, start + size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    start: usize,
    size: usize,
    trailing_free: usize,
    name: Option<String>,
    ancilla_owner: Option<OwnerToken>,
    live: bool,
}

impl Chunk {
    /// First address of the chunk.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of wires in the chunk.
    pub fn size(&self) -> usize {
        self.size
    }

    /// One past the last address of the chunk.
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    /// Size of the untracked gap following this chunk.
    pub fn trailing_free(&self) -> usize {
        self.trailing_free
    }

    /// Register name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Owning scope if this chunk is an ancilla.
    pub fn ancilla_owner(&self) -> Option<OwnerToken> {
        self.ancilla_owner
    }

    /// Whether the chunk is still tracked.
    pub fn is_live(&self) -> bool {
        self.live
    }
}

/// Manages chunk lifetimes over a growable address space.
#[derive(Debug, Clone)]
pub struct Allocator {
    /// Arena of every chunk record ever created.
    records: Vec<Chunk>,
    /// Live chunks sorted by start address; `order[0]` is the head.
    order: Vec<ChunkId>,
    /// Current address-space ceiling.
    high_water_mark: usize,
}

impl Allocator {
    /// The head sentinel.
    pub const HEAD: ChunkId = ChunkId(0);

    /// Create an allocator holding only the head sentinel.
    pub fn new() -> Self {
        Self {
            records: vec![Chunk {
                start: 0,
                size: 0,
                trailing_free: 0,
                name: Some("HEAD".into()),
                ancilla_owner: None,
                live: true,
            }],
            order: vec![Self::HEAD],
            high_water_mark: 0,
        }
    }

    /// Allocate `size + padding` wires.
    ///
    /// First fit: the earliest gap that can hold the request is split,
    /// otherwise the address space grows at the tail.
    pub fn alloc(&mut self, size: usize, name: Option<&str>, padding: usize) -> ChunkId {
        self.alloc_tagged(size + padding, name, None)
    }

    /// Allocate an ancilla chunk owned by `owner`.
    pub fn anc_alloc(&mut self, owner: OwnerToken, size: usize, name: Option<&str>) -> ChunkId {
        self.alloc_tagged(size, name, Some(owner))
    }

    fn alloc_tagged(
        &mut self,
        size: usize,
        name: Option<&str>,
        ancilla_owner: Option<OwnerToken>,
    ) -> ChunkId {
        let id = ChunkId(self.records.len() as u32);
        let hit = self
            .order
            .iter()
            .position(|&c| self.records[c.0 as usize].trailing_free >= size);

        let (position, start, trailing_free) = match hit {
            Some(position) => {
                let donor = &mut self.records[self.order[position].0 as usize];
                let start = donor.end();
                let remaining = donor.trailing_free - size;
                donor.trailing_free = 0;
                (position + 1, start, remaining)
            }
            None => {
                let tail = &mut self.records[self.order[self.order.len() - 1].0 as usize];
                let gap = tail.trailing_free;
                tail.trailing_free = 0;
                let start = self.high_water_mark - gap;
                self.high_water_mark += size - gap;
                (self.order.len(), start, 0)
            }
        };

        self.records.push(Chunk {
            start,
            size,
            trailing_free,
            name: name.map(str::to_owned),
            ancilla_owner,
            live: true,
        });
        self.order.insert(position, id);

        trace!(
            chunk = %id,
            start,
            size,
            ancilla = ancilla_owner.is_some(),
            high_water_mark = self.high_water_mark,
            "allocated chunk"
        );
        id
    }

    /// Release a register chunk.
    ///
    /// Its wires and trailing gap are merged into the predecessor's gap.
    pub fn free(&mut self, id: ChunkId) -> RevResult<()> {
        let chunk = self.chunk(id)?;
        if let Some(owner) = chunk.ancilla_owner {
            return Err(RevError::InvalidFree {
                chunk: id,
                reason: format!("ancilla owned by {owner} must be released with anc_free"),
            });
        }
        self.release(id)
    }

    /// Release an ancilla chunk if `owner` owns it.
    ///
    /// Returns whether the chunk was released. A mismatched owner is not an
    /// error: the caller borrowed the chunk and must leave it alone.
    pub fn anc_free(&mut self, id: ChunkId, owner: OwnerToken) -> RevResult<bool> {
        if self.chunk(id)?.ancilla_owner != Some(owner) {
            trace!(chunk = %id, %owner, "ancilla not owned by scope, keeping it");
            return Ok(false);
        }
        self.release(id)?;
        self.records[id.0 as usize].ancilla_owner = None;
        Ok(true)
    }

    fn release(&mut self, id: ChunkId) -> RevResult<()> {
        let position = self.position(id)?;
        if position == 0 {
            return Err(RevError::InvalidFree {
                chunk: id,
                reason: "the head sentinel cannot be freed".into(),
            });
        }

        let chunk = &mut self.records[id.0 as usize];
        chunk.live = false;
        let reclaimed = chunk.size + chunk.trailing_free;
        let prev = self.order[position - 1];
        self.records[prev.0 as usize].trailing_free += reclaimed;
        self.order.remove(position);

        trace!(chunk = %id, reclaimed, "freed chunk");
        Ok(())
    }

    /// Shrink a chunk from its low edge by `size` wires.
    ///
    /// The released wires join the predecessor's gap and the chunk's start
    /// moves up, so relative index 0 now names the first surviving wire.
    pub fn partial_free_start(&mut self, id: ChunkId, size: usize) -> RevResult<()> {
        let position = self.shrinkable(id, size)?;
        let prev = self.order[position - 1];
        self.records[prev.0 as usize].trailing_free += size;
        let chunk = &mut self.records[id.0 as usize];
        chunk.start += size;
        chunk.size -= size;
        trace!(chunk = %id, size, "partially freed chunk start");
        Ok(())
    }

    /// Shrink a chunk from its high edge by `size` wires.
    pub fn partial_free_end(&mut self, id: ChunkId, size: usize) -> RevResult<()> {
        self.shrinkable(id, size)?;
        let chunk = &mut self.records[id.0 as usize];
        chunk.size -= size;
        chunk.trailing_free += size;
        trace!(chunk = %id, size, "partially freed chunk end");
        Ok(())
    }

    fn shrinkable(&self, id: ChunkId, size: usize) -> RevResult<usize> {
        let position = self.position(id)?;
        if position == 0 {
            return Err(RevError::InvalidFree {
                chunk: id,
                reason: "the head sentinel cannot be shrunk".into(),
            });
        }
        let chunk = &self.records[id.0 as usize];
        if size > chunk.size {
            return Err(RevError::PartialFreeOverflow {
                chunk: id,
                requested: size,
                size: chunk.size,
            });
        }
        Ok(position)
    }

    /// Whether `address` lies inside a live chunk.
    pub fn is_allocated(&self, address: usize) -> bool {
        if address >= self.high_water_mark {
            return false;
        }
        for chunk in self.chunks() {
            if chunk.start > address {
                return false;
            }
            if address < chunk.end() {
                return true;
            }
        }
        false
    }

    /// Look up a chunk record, live or released.
    pub fn chunk(&self, id: ChunkId) -> RevResult<&Chunk> {
        self.records
            .get(id.0 as usize)
            .ok_or(RevError::UnknownChunk(id))
    }

    /// Look up a live chunk.
    pub fn live_chunk(&self, id: ChunkId) -> RevResult<&Chunk> {
        let chunk = self.chunk(id)?;
        if !chunk.live {
            return Err(RevError::StaleView(id));
        }
        Ok(chunk)
    }

    fn position(&self, id: ChunkId) -> RevResult<usize> {
        let chunk = self.chunk(id)?;
        if !chunk.live {
            return Err(RevError::DoubleFree {
                chunk: id,
                name: chunk.name.clone(),
            });
        }
        self.order
            .iter()
            .position(|&c| c == id)
            .ok_or_else(|| RevError::AllocatorInvariant(format!("live chunk {id} is not linked")))
    }

    /// Live chunks in address order, head first.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.order.iter().map(|&id| &self.records[id.0 as usize])
    }

    /// Ids of live chunks in address order, head first.
    pub fn chunk_ids(&self) -> &[ChunkId] {
        &self.order
    }

    /// The live chunk immediately before `id`.
    pub fn prev(&self, id: ChunkId) -> RevResult<Option<ChunkId>> {
        let position = self.position(id)?;
        Ok(position.checked_sub(1).map(|p| self.order[p]))
    }

    /// The live chunk immediately after `id`.
    pub fn next(&self, id: ChunkId) -> RevResult<Option<ChunkId>> {
        let position = self.position(id)?;
        Ok(self.order.get(position + 1).copied())
    }

    /// Number of live chunks, excluding the head.
    pub fn num_chunks(&self) -> usize {
        self.order.len() - 1
    }

    /// Current address-space ceiling.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// A view over every wire of a live chunk.
    pub fn view(&self, id: ChunkId) -> RevResult<View> {
        let chunk = self.live_chunk(id)?;
        Ok(View::new(id, 0..chunk.size))
    }

    /// Verify ordering, contiguity and the high-water accounting.
    pub fn check_invariants(&self) -> RevResult<()> {
        let head = &self.records[Self::HEAD.0 as usize];
        if self.order.first() != Some(&Self::HEAD) || head.start != 0 || head.size != 0 {
            return Err(RevError::AllocatorInvariant("head sentinel displaced".into()));
        }

        let mut expected_start = 0;
        let mut total = 0;
        for &id in &self.order {
            let chunk = &self.records[id.0 as usize];
            if !chunk.live {
                return Err(RevError::AllocatorInvariant(format!("dead chunk {id} is linked")));
            }
            if chunk.start != expected_start {
                return Err(RevError::AllocatorInvariant(format!(
                    "chunk {id} starts at {} but the previous gap ends at {expected_start}",
                    chunk.start
                )));
            }
            expected_start = chunk.end() + chunk.trailing_free;
            total += chunk.size + chunk.trailing_free;
        }

        if total != self.high_water_mark {
            return Err(RevError::AllocatorInvariant(format!(
                "sizes and gaps cover {total} wires but the high-water mark is {}",
                self.high_water_mark
            )));
        }
        Ok(())
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : ", self.high_water_mark)?;
        for chunk in self.chunks() {
            write!(f, "[{} {}]", chunk.name().unwrap_or("?"), chunk.size)?;
            if chunk.trailing_free > 0 {
                write!(f, "[FREE : {}]", chunk.trailing_free)?;
            }
        }
        Ok(())
    }
}
