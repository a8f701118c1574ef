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

//! An archetype: the equivalence class of entities sharing an exact
//! component set, with a precomputed SoA chunk layout.

use std::fmt::Write as _;

use crate::arena::{AllocTag, Allocator, ArenaVec};
use crate::error::{EcsError, Result};

use super::chunk::Chunk;
use super::component::{ComponentTypeId, MAX_COMPONENTS};
use super::entity::EntityId;
use super::signature::Signature;

/// Size of every chunk's backing byte buffer. Tunable, but must stay a page
/// multiple for the arena's commit granularity to divide it evenly.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// An archetype's own bookkeeping (its sorted type list, layout tables and
/// chunk list) is itself [`ArenaVec`]-backed and tagged [`AllocTag::Archetype`],
/// so that creating archetypes shows up in a world's tag statistics the same
/// way chunk buffers and the entity directory do. Only `key`, which must live
/// as an ordinary `String` to serve as an owned `AHashMap` key (see
/// [`super::registry::ArchetypeRegistry`]), stays on the global allocator.
pub struct Archetype {
    types: ArenaVec<ComponentTypeId>,
    sizes: ArenaVec<usize>,
    aligns: ArenaVec<usize>,
    col_offsets: ArenaVec<usize>,
    /// `type_to_col[id] = column index + 1`, or 0 if `id` is absent from
    /// this archetype. Offsetting by one keeps the array `u16`-sized (0 can
    /// double as "not present") without a separate sentinel constant spread
    /// through call sites.
    type_to_col: ArenaVec<u16>,
    chunk_capacity: usize,
    ents_offset: usize,
    signature: Signature,
    chunks: ArenaVec<Chunk>,
    key: String,
}

impl Archetype {
    /// Build a new archetype for the given sorted, deduplicated `types` with
    /// parallel `sizes`/`aligns`, computing its chunk layout and recording
    /// `key` as its canonical string key.
    pub fn new(
        alloc: &mut dyn Allocator,
        types: Vec<ComponentTypeId>,
        sizes: Vec<usize>,
        aligns: Vec<usize>,
        key: String,
    ) -> Result<Self> {
        debug_assert!(types.windows(2).all(|w| w[0] < w[1]), "types must be sorted and deduplicated");
        debug_assert_eq!(types.len(), sizes.len());
        debug_assert_eq!(types.len(), aligns.len());

        let (chunk_capacity, ents_offset, col_offsets) = compute_layout(&sizes, &aligns)?;

        let mut types_av = ArenaVec::new(AllocTag::Archetype);
        for &t in &types {
            types_av.push(alloc, t)?;
        }
        let mut sizes_av = ArenaVec::new(AllocTag::Archetype);
        for &s in &sizes {
            sizes_av.push(alloc, s)?;
        }
        let mut aligns_av = ArenaVec::new(AllocTag::Archetype);
        for &a in &aligns {
            aligns_av.push(alloc, a)?;
        }
        let mut col_offsets_av = ArenaVec::new(AllocTag::Archetype);
        for &o in &col_offsets {
            col_offsets_av.push(alloc, o)?;
        }

        let mut type_to_col = ArenaVec::new(AllocTag::Archetype);
        type_to_col.reserve(alloc, MAX_COMPONENTS)?;
        for _ in 0..MAX_COMPONENTS {
            type_to_col.push(alloc, 0u16)?;
        }
        for (col, &ty) in types.iter().enumerate() {
            type_to_col.set(ty as usize, (col + 1) as u16);
        }

        let signature = Signature::from_types(&types);

        Ok(Self {
            types: types_av,
            sizes: sizes_av,
            aligns: aligns_av,
            col_offsets: col_offsets_av,
            type_to_col,
            chunk_capacity,
            ents_offset,
            signature,
            chunks: ArenaVec::new(AllocTag::Archetype),
            key,
        })
    }

    pub fn types(&self) -> &[ComponentTypeId] {
        self.types.as_slice()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn ents_offset(&self) -> usize {
        self.ents_offset
    }

    pub fn col_offset(&self, col: usize) -> usize {
        self.col_offsets.as_slice()[col]
    }

    pub fn size_of(&self, col: usize) -> usize {
        self.sizes.as_slice()[col]
    }

    pub fn align_of(&self, col: usize) -> usize {
        self.aligns.as_slice()[col]
    }

    /// Column index for `comp`, or `None` if this archetype does not
    /// include it. Backed by the `type_to_col[256]` reverse table.
    pub fn column_index(&self, comp: ComponentTypeId) -> Option<usize> {
        let slot = *self.type_to_col.get(comp as usize)?;
        if slot == 0 {
            None
        } else {
            Some((slot - 1) as usize)
        }
    }

    pub fn has_type(&self, comp: ComponentTypeId) -> bool {
        self.column_index(comp).is_some()
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.chunks.as_slice()
    }

    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        self.chunks.as_mut_slice()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn push_chunk(&mut self, alloc: &mut dyn Allocator, chunk: Chunk) -> Result<usize> {
        self.chunks.push(alloc, chunk)?;
        Ok(self.chunks.len() - 1)
    }

    /// Index of the first chunk with room for another row, allocating a
    /// fresh chunk if none of the existing ones have space.
    ///
    /// Chunks are scanned left-to-right (oldest first) and a fresh chunk is
    /// always appended at the end: this is the "stable but unspecified"
    /// chunk order spec leaves open, fixed here as insertion order.
    pub fn acquire_chunk_for_write(&mut self, alloc: &mut dyn Allocator) -> Result<usize> {
        let capacity = self.chunk_capacity;
        for (i, chunk) in self.chunks.as_slice().iter().enumerate() {
            if chunk.has_space(capacity) {
                return Ok(i);
            }
        }
        let chunk = self.alloc_chunk(alloc)?;
        self.push_chunk(alloc, chunk)
    }

    /// Allocate a fresh, empty chunk-sized buffer from `alloc`. Does not
    /// insert it into `self.chunks` — callers that want it tracked must call
    /// [`Archetype::push_chunk`].
    pub fn alloc_chunk(&self, alloc: &mut dyn Allocator) -> Result<Chunk> {
        let align = self
            .aligns
            .as_slice()
            .iter()
            .copied()
            .chain(std::iter::once(std::mem::align_of::<EntityId>()))
            .max()
            .unwrap_or(std::mem::align_of::<EntityId>());
        let ptr = alloc
            .alloc_aligned(CHUNK_SIZE, align, AllocTag::Chunk)
            .ok_or_else(|| EcsError::AllocationFailed("failed to allocate chunk buffer".into()))?;
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, CHUNK_SIZE);
        }
        Ok(Chunk::new(ptr))
    }

    pub fn chunk_entities(&self, chunk_idx: usize) -> &[EntityId] {
        self.chunks.as_slice()[chunk_idx].entities(self.ents_offset)
    }

    pub fn chunk_column(&self, chunk_idx: usize, comp: ComponentTypeId) -> Option<*const u8> {
        let col = self.column_index(comp)?;
        Some(self.chunks.as_slice()[chunk_idx].column_ptr(self.col_offsets.as_slice()[col]))
    }

    pub fn chunk_column_mut(&mut self, chunk_idx: usize, comp: ComponentTypeId) -> Option<*mut u8> {
        let col = self.column_index(comp)?;
        let offset = self.col_offsets.as_slice()[col];
        Some(self.chunks.as_mut_slice()[chunk_idx].column_ptr_mut(offset))
    }

    /// Base pointer of row `slot` within `comp`'s column in `chunk_idx`, or
    /// `None` if this archetype does not include `comp`.
    pub fn chunk_column_row(&self, chunk_idx: usize, comp: ComponentTypeId, slot: usize) -> Option<*const u8> {
        let col = self.column_index(comp)?;
        let size = self.sizes.as_slice()[col];
        let offset = self.col_offsets.as_slice()[col];
        Some(self.chunks.as_slice()[chunk_idx].column_ptr(offset).wrapping_add(slot * size))
    }

    pub fn chunk_column_row_mut(&mut self, chunk_idx: usize, comp: ComponentTypeId, slot: usize) -> Option<*mut u8> {
        let col = self.column_index(comp)?;
        let size = self.sizes.as_slice()[col];
        let offset = self.col_offsets.as_slice()[col];
        Some(self.chunks.as_mut_slice()[chunk_idx].column_ptr_mut(offset).wrapping_add(slot * size))
    }

    /// Append `entity` as a new row in `chunk_idx`, filling every destination
    /// column via `fill`. `fill(col_index, type, dst_ptr, size)` must write
    /// exactly `size` bytes to `dst_ptr`. Returns the new row's slot.
    ///
    /// Accesses `self.chunks` and the layout fields as disjoint fields of the
    /// same struct (rather than through two separate method calls), which is
    /// what lets this compile without the caller juggling a second borrow of
    /// `self`.
    pub(crate) fn write_row(
        &mut self,
        chunk_idx: usize,
        entity: EntityId,
        mut fill: impl FnMut(usize, ComponentTypeId, *mut u8, usize),
    ) -> usize {
        let ents_offset = self.ents_offset;
        let types = self.types.as_slice();
        let sizes = self.sizes.as_slice();
        let col_offsets = self.col_offsets.as_slice();
        let chunk = &mut self.chunks.as_mut_slice()[chunk_idx];
        let slot = chunk.count();

        unsafe {
            let ent_ptr = chunk.raw_ptr().add(ents_offset) as *mut EntityId;
            *ent_ptr.add(slot) = entity;
        }
        for (col_idx, &ty) in types.iter().enumerate() {
            let size = sizes[col_idx];
            let offset = col_offsets[col_idx];
            let dst = unsafe { chunk.raw_ptr().add(offset).add(slot * size) };
            fill(col_idx, ty, dst, size);
        }
        chunk.set_count((slot + 1) as u32);
        slot
    }

    /// Swap-remove `slot` from `chunk_idx`: move the last row's entity id
    /// and every column over it, then shrink the row count. Returns the
    /// entity id that used to occupy the last row, if one was moved.
    pub(crate) fn swap_remove_row(&mut self, chunk_idx: usize, slot: usize) -> Option<EntityId> {
        let ents_offset = self.ents_offset;
        let sizes = self.sizes.as_slice();
        let col_offsets = self.col_offsets.as_slice();
        let col_count = self.types.len();
        let chunk = &mut self.chunks.as_mut_slice()[chunk_idx];
        let last = chunk.count() - 1;

        let moved = if slot != last {
            unsafe {
                let ent_ptr = chunk.raw_ptr().add(ents_offset) as *mut EntityId;
                let moved_id = *ent_ptr.add(last);
                *ent_ptr.add(slot) = moved_id;
                for col_idx in 0..col_count {
                    let size = sizes[col_idx];
                    let offset = col_offsets[col_idx];
                    let base = chunk.raw_ptr().add(offset);
                    std::ptr::copy_nonoverlapping(base.add(last * size), base.add(slot * size), size);
                }
                Some(moved_id)
            }
        } else {
            None
        };
        chunk.set_count(last as u32);
        moved
    }

}

/// Compute `(chunk_capacity, ents_offset, col_offsets)` per spec's iterative
/// shrink algorithm: start from a pessimistic row estimate and decrease
/// until the exact aligned layout fits in [`CHUNK_SIZE`].
fn compute_layout(sizes: &[usize], aligns: &[usize]) -> Result<(usize, usize, Vec<usize>)> {
    let ent_size = std::mem::size_of::<EntityId>();
    let ent_align = std::mem::align_of::<EntityId>();
    let row_size: usize = ent_size + sizes.iter().sum::<usize>();
    let mut cap = (CHUNK_SIZE / row_size.max(1)).max(1);

    loop {
        let ents_offset = align_up(0, ent_align);
        let mut used = ents_offset + cap * ent_size;
        let mut col_offsets = Vec::with_capacity(sizes.len());
        for i in 0..sizes.len() {
            used = align_up(used, aligns[i]);
            col_offsets.push(used);
            used += cap * sizes[i];
        }
        if used <= CHUNK_SIZE {
            return Ok((cap, ents_offset, col_offsets));
        }
        if cap == 1 {
            return Err(EcsError::InvalidArgument(format!(
                "component layout does not fit in a single row of CHUNK_SIZE ({CHUNK_SIZE} bytes)"
            )));
        }
        cap -= 1;
    }
}

fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Build the canonical key string for a sorted type list: `"N:
/// t0,t1,...,tn-1"` for `N > 0`, `"0:"` for the empty set.
pub fn canonical_key(types: &[ComponentTypeId]) -> String {
    let mut out = String::new();
    write!(out, "{}:", types.len()).expect("String write cannot fail");
    for (i, t) in types.iter().enumerate() {
        if i == 0 {
            write!(out, " {t}").expect("String write cannot fail");
        } else {
            write!(out, ",{t}").expect("String write cannot fail");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaAllocator;

    #[test]
    fn canonical_key_matches_spec_format() {
        assert_eq!(canonical_key(&[]), "0:");
        assert_eq!(canonical_key(&[0, 2, 3]), "3: 0,2,3");
    }

    #[test]
    fn layout_is_aligned_and_nonoverlapping() {
        let mut alloc = ArenaAllocator::new(1 << 20, true).unwrap();
        let arch = Archetype::new(
            &mut alloc,
            vec![0, 1],
            vec![4, 8],
            vec![4, 8],
            "2: 0,1".to_string(),
        )
        .unwrap();
        assert_eq!(arch.ents_offset() % std::mem::align_of::<EntityId>(), 0);
        for col in 0..2 {
            assert_eq!(arch.col_offset(col) % arch.align_of(col), 0);
        }
        let end = arch.col_offset(1) + arch.chunk_capacity() * arch.size_of(1);
        assert!(end <= CHUNK_SIZE);
    }

    #[test]
    fn single_small_component_yields_large_capacity() {
        let mut alloc = ArenaAllocator::new(1 << 20, true).unwrap();
        let arch = Archetype::new(&mut alloc, vec![0], vec![16], vec![16], "1: 0".to_string()).unwrap();
        assert!(arch.chunk_capacity() >= 800);
    }

    #[test]
    fn type_to_col_reflects_membership() {
        let mut alloc = ArenaAllocator::new(1 << 20, true).unwrap();
        let arch = Archetype::new(&mut alloc, vec![5], vec![4], vec![4], "1: 5".to_string()).unwrap();
        assert_eq!(arch.column_index(5), Some(0));
        assert_eq!(arch.column_index(6), None);
    }

    #[test]
    fn write_row_then_swap_remove_preserves_other_rows() {
        let mut alloc = ArenaAllocator::new(1 << 20, true).unwrap();
        let mut arch = Archetype::new(&mut alloc, vec![0], vec![4], vec![4], "1: 0".to_string()).unwrap();
        let chunk_idx = arch.acquire_chunk_for_write(&mut alloc).unwrap();

        for i in 0..3u32 {
            arch.write_row(chunk_idx, EntityId::new(i, 1, 0), |_, _, ptr, size| unsafe {
                std::ptr::copy_nonoverlapping((&i as *const u32) as *const u8, ptr, size);
            });
        }
        assert_eq!(arch.chunks()[chunk_idx].count(), 3);
        arch.swap_remove_row(chunk_idx, 0);
        assert_eq!(arch.chunks()[chunk_idx].count(), 2);
        assert_eq!(arch.chunk_entities(chunk_idx)[0].index(), 2);
    }
}
