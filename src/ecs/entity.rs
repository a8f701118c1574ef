// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity identity and the directory mapping an entity's index to its
//! current storage location.

use crate::arena::{AllocTag, Allocator, ArenaVec};
use crate::error::Result;

/// Embedded into every [`EntityId`]; `0` means "single-world".
pub type WorldId = u16;

/// A packed 64-bit entity identity: `index:32` (low bits), `generation:16`,
/// `world:16` (high bits). `0` is the invalid sentinel — it can never be a
/// valid id because generation is never 0 for a live entity.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

impl std::fmt::Debug for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityId")
            .field("index", &self.index())
            .field("generation", &self.generation())
            .field("world", &self.world())
            .finish()
    }
}

impl EntityId {
    pub const INVALID: EntityId = EntityId(0);

    pub fn new(index: u32, generation: u16, world: WorldId) -> Self {
        EntityId((index as u64) | ((generation as u64) << 32) | ((world as u64) << 48))
    }

    pub fn index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn generation(self) -> u16 {
        ((self.0 >> 32) & 0xFFFF) as u16
    }

    pub fn world(self) -> WorldId {
        ((self.0 >> 48) & 0xFFFF) as u16
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub fn to_bits(self) -> u64 {
        self.0
    }

    pub fn from_bits(bits: u64) -> Self {
        EntityId(bits)
    }
}

/// Index into `World::archetypes`. `u32::MAX` marks an unused directory slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchetypeId(pub u32);

impl ArchetypeId {
    pub const NONE: ArchetypeId = ArchetypeId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a live entity's row currently lives: `(archetype, chunk_index,
/// slot)`, a handle triple rather than the pointer chain the original
/// pointer-rich archetype graph used (see the owned-memory redesign notes).
#[derive(Clone, Copy, Debug)]
pub struct EntityRecord {
    pub archetype: ArchetypeId,
    pub chunk_index: u32,
    pub slot: u32,
}

impl EntityRecord {
    pub const EMPTY: EntityRecord = EntityRecord {
        archetype: ArchetypeId::NONE,
        chunk_index: 0,
        slot: 0,
    };
}

/// Per-world table mapping entity index to `(record, generation)`, plus a
/// stack of indices free for reuse.
///
/// All three backing arrays are [`ArenaVec`]s so directory growth shows up
/// in the world's [`crate::arena::TagStats`] under [`AllocTag::Directory`],
/// the same way chunk buffers show up under `AllocTag::Chunk`.
pub struct EntityDirectory {
    records: ArenaVec<EntityRecord>,
    generations: ArenaVec<u16>,
    free_indices: ArenaVec<u32>,
    living: u32,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self {
            records: ArenaVec::new(AllocTag::Directory),
            generations: ArenaVec::new(AllocTag::Directory),
            free_indices: ArenaVec::new(AllocTag::Directory),
            living: 0,
        }
    }

    pub fn living(&self) -> u32 {
        self.living
    }

    pub fn reserve(&mut self, alloc: &mut dyn Allocator, capacity: usize) -> Result<()> {
        self.records.reserve(alloc, capacity)?;
        self.generations.reserve(alloc, capacity)?;
        self.free_indices.reserve(alloc, capacity)?;
        Ok(())
    }

    /// Allocate a fresh index: pop the free stack if non-empty, otherwise
    /// grow the directory by bumping `living`. Generation is pre-incremented
    /// (skipping 0) before the new id is minted.
    pub fn allocate_index(&mut self, alloc: &mut dyn Allocator) -> Result<(u32, u16)> {
        if let Some(index) = self.free_indices.pop() {
            let gen = bump_generation(self.generations.as_slice()[index as usize]);
            self.generations.set(index as usize, gen);
            return Ok((index, gen));
        }
        let index = self.living;
        self.records.push(alloc, EntityRecord::EMPTY)?;
        self.generations.push(alloc, 0)?;
        self.living += 1;
        let gen = bump_generation(0);
        self.generations.set(index as usize, gen);
        Ok((index, gen))
    }

    pub fn set_record(&mut self, index: u32, record: EntityRecord) {
        self.records.set(index as usize, record);
    }

    pub fn record(&self, index: u32) -> Option<EntityRecord> {
        self.records.get(index as usize).copied()
    }

    pub fn generation(&self, index: u32) -> Option<u16> {
        self.generations.get(index as usize).copied()
    }

    /// True iff `id` names a currently-live entity: non-zero, index within
    /// range, and its stored generation matches.
    pub fn is_alive(&self, id: EntityId) -> bool {
        if !id.is_valid() {
            return false;
        }
        let index = id.index();
        match self.generations.get(index as usize) {
            Some(&gen) => gen != 0 && gen == id.generation(),
            None => false,
        }
    }

    /// Bump the index's generation (skipping 0 on wrap), clear its record,
    /// and push it onto the free stack.
    pub fn recycle(&mut self, alloc: &mut dyn Allocator, index: u32) -> Result<()> {
        let gen = bump_generation(self.generations.as_slice()[index as usize]);
        self.generations.set(index as usize, gen);
        self.records.set(index as usize, EntityRecord::EMPTY);
        self.free_indices.push(alloc, index)?;
        Ok(())
    }
}

impl Default for EntityDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn bump_generation(gen: u16) -> u16 {
    let next = gen.wrapping_add(1);
    if next == 0 {
        1
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaAllocator;

    #[test]
    fn packing_round_trips_all_fields() {
        let id = EntityId::new(123, 45, 6);
        assert_eq!(id.index(), 123);
        assert_eq!(id.generation(), 45);
        assert_eq!(id.world(), 6);
        assert!(id.is_valid());
    }

    #[test]
    fn invalid_is_zero() {
        assert_eq!(EntityId::INVALID.to_bits(), 0);
        assert!(!EntityId::INVALID.is_valid());
    }

    #[test]
    fn allocate_index_skips_generation_zero() {
        let mut alloc = ArenaAllocator::new(4096, false).unwrap();
        let mut dir = EntityDirectory::new();
        let (index, gen) = dir.allocate_index(&mut alloc).unwrap();
        assert_eq!(index, 0);
        assert_eq!(gen, 1);
    }

    #[test]
    fn recycle_then_allocate_bumps_generation_and_reuses_index() {
        let mut alloc = ArenaAllocator::new(4096, false).unwrap();
        let mut dir = EntityDirectory::new();
        let (index0, _) = dir.allocate_index(&mut alloc).unwrap();
        dir.recycle(&mut alloc, index0).unwrap();
        let (index1, gen1) = dir.allocate_index(&mut alloc).unwrap();
        assert_eq!(index0, index1);
        assert_eq!(gen1, 2);
    }

    #[test]
    fn is_alive_false_for_stale_generation() {
        let mut alloc = ArenaAllocator::new(4096, false).unwrap();
        let mut dir = EntityDirectory::new();
        let (index, gen) = dir.allocate_index(&mut alloc).unwrap();
        let id = EntityId::new(index, gen, 0);
        assert!(dir.is_alive(id));
        dir.recycle(&mut alloc, index).unwrap();
        assert!(!dir.is_alive(id));
    }
}
