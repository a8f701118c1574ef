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

//! The top-level container: owns the allocators, the component and
//! archetype registries, and the entity directory, and exposes every
//! structural and query operation.

use std::marker::PhantomData;

use crate::arena::Allocator;
use crate::error::{EcsError, Result};

use super::archetype::Archetype;
use super::chunk::Chunk;
use super::component::{ComponentRegistry, ComponentTypeId};
use super::entity::{ArchetypeId, EntityDirectory, EntityId, EntityRecord, WorldId};
use super::query::{query_compile, query_compiled_each_chunk, query_each_chunk, CompiledQuery, Query};
use super::registry::ArchetypeRegistry;

const DEFAULT_INITIAL_ENTITIES: usize = 1024;
const DEFAULT_INITIAL_COMPONENTS: usize = 64;
const DEFAULT_INITIAL_ARCHETYPES: usize = 64;

/// Construction parameters for a [`World`]. The persistent allocator is
/// mandatory — there is deliberately no `World::default()` — since a world
/// cannot exist without somewhere to put its entities.
pub struct WorldCreateInfo {
    pub persistent: Box<dyn Allocator>,
    pub scratch: Option<Box<dyn Allocator>>,
    pub world_id: WorldId,
    /// `0` means "use the default" (1024).
    pub initial_entities: usize,
    /// `0` means "use the default" (64).
    pub initial_components: usize,
    /// `0` means "use the default" (64).
    pub initial_archetypes: usize,
}

impl WorldCreateInfo {
    pub fn new(persistent: Box<dyn Allocator>) -> Self {
        Self {
            persistent,
            scratch: None,
            world_id: 0,
            initial_entities: 0,
            initial_components: 0,
            initial_archetypes: 0,
        }
    }

    pub fn with_scratch(mut self, scratch: Box<dyn Allocator>) -> Self {
        self.scratch = Some(scratch);
        self
    }

    pub fn with_world_id(mut self, world_id: WorldId) -> Self {
        self.world_id = world_id;
        self
    }

    pub fn with_initial_entities(mut self, n: usize) -> Self {
        self.initial_entities = n;
        self
    }

    pub fn with_initial_components(mut self, n: usize) -> Self {
        self.initial_components = n;
        self
    }

    pub fn with_initial_archetypes(mut self, n: usize) -> Self {
        self.initial_archetypes = n;
        self
    }
}

/// A single-writer, multi-reader ECS world.
///
/// `World` holds raw pointers into arena-owned chunk buffers and is neither
/// `Send` nor `Sync`: structural operations on it must all happen from the
/// thread that created it. The `PhantomData<*mut ()>` field enforces this at
/// the type level rather than only in documentation.
pub struct World {
    persistent: Box<dyn Allocator>,
    scratch: Option<Box<dyn Allocator>>,
    world_id: WorldId,
    components: ComponentRegistry,
    archetypes: ArchetypeRegistry,
    directory: EntityDirectory,
    empty_archetype: ArchetypeId,
    _not_send_sync: PhantomData<*mut ()>,
}

impl World {
    pub fn new(info: WorldCreateInfo) -> Result<Self> {
        let mut persistent = info.persistent;
        let initial_entities = if info.initial_entities == 0 {
            DEFAULT_INITIAL_ENTITIES
        } else {
            info.initial_entities
        };
        let initial_components = if info.initial_components == 0 {
            DEFAULT_INITIAL_COMPONENTS
        } else {
            info.initial_components
        };
        let initial_archetypes = if info.initial_archetypes == 0 {
            DEFAULT_INITIAL_ARCHETYPES
        } else {
            info.initial_archetypes
        };

        let mut directory = EntityDirectory::new();
        directory.reserve(persistent.as_mut(), initial_entities)?;

        let components = ComponentRegistry::with_capacity(initial_components);
        let mut archetypes = ArchetypeRegistry::with_capacity(initial_archetypes);

        let mut empty_types = Vec::new();
        let empty_archetype =
            archetypes.get_or_create(persistent.as_mut(), None, &mut empty_types, &components)?;

        Ok(Self {
            persistent,
            scratch: info.scratch,
            world_id: info.world_id,
            components,
            archetypes,
            directory,
            empty_archetype,
            _not_send_sync: PhantomData,
        })
    }

    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn living_entity_count(&self) -> u32 {
        self.directory.living()
    }

    pub fn register_component(&mut self, name: &str, size: usize, align: usize) -> Result<ComponentTypeId> {
        self.components.register(name, size, align)
    }

    pub fn register_component_once(
        &mut self,
        name: &str,
        size: usize,
        align: usize,
    ) -> Result<ComponentTypeId> {
        self.components.register_once(name, size, align)
    }

    pub fn find_component(&self, name: &str) -> ComponentTypeId {
        self.components.find(name)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        id.is_valid() && id.world() == self.world_id && self.directory.is_alive(id)
    }

    pub fn create_entity(&mut self) -> Result<EntityId> {
        let (index, gen) = self.directory.allocate_index(self.persistent.as_mut())?;
        let id = EntityId::new(index, gen, self.world_id);
        let empty = self.empty_archetype;
        let chunk_idx = self
            .archetypes
            .get_mut(empty)
            .acquire_chunk_for_write(self.persistent.as_mut())?;
        let slot = self.archetypes.get_mut(empty).write_row(chunk_idx, id, |_, _, _, _| {
            unreachable!("the empty archetype has no columns to fill")
        });
        self.directory.set_record(
            index,
            EntityRecord {
                archetype: empty,
                chunk_index: chunk_idx as u32,
                slot: slot as u32,
            },
        );
        Ok(id)
    }

    /// Create an entity directly in the archetype for `types`, initializing
    /// each column from the matching entry of `init_data` (or zero-filling
    /// when that entry is `None`).
    ///
    /// `types` and `init_data` must be the same length; a component type
    /// repeated in `types` is a caller bug tolerated per spec: duplicates
    /// are coalesced, keeping the first (leftmost, pre-sort) non-null data
    /// for that type, and logged via `tracing::warn!`.
    pub fn create_entity_with_components(
        &mut self,
        types: &[ComponentTypeId],
        init_data: &[Option<&[u8]>],
    ) -> Result<EntityId> {
        if types.len() != init_data.len() {
            return Err(EcsError::InvalidArgument(
                "types and init_data must have the same length".into(),
            ));
        }
        for &ty in types {
            if !self.components.is_valid(ty) {
                tracing::error!(ty, "create_entity_with_components: invalid component type");
                return Err(EcsError::InvalidArgument(format!("invalid component type id {ty}")));
            }
        }

        let mut pairs: Vec<(ComponentTypeId, Option<&[u8]>)> =
            types.iter().copied().zip(init_data.iter().copied()).collect();
        // Stable sort: ties keep their pre-sort relative order, so the
        // coalescing pass below sees duplicates in original left-to-right
        // order and can keep the first non-null pointer per spec.
        pairs.sort_by_key(|(ty, _)| *ty);

        let mut final_types: Vec<ComponentTypeId> = Vec::with_capacity(pairs.len());
        let mut final_data: Vec<Option<&[u8]>> = Vec::with_capacity(pairs.len());
        let mut i = 0;
        while i < pairs.len() {
            let ty = pairs[i].0;
            let mut j = i;
            let mut chosen = None;
            let mut duplicate = false;
            while j < pairs.len() && pairs[j].0 == ty {
                if chosen.is_none() {
                    chosen = pairs[j].1;
                }
                if j > i {
                    duplicate = true;
                }
                j += 1;
            }
            if duplicate {
                tracing::warn!(ty, "create_entity_with_components: duplicate component type coalesced");
                debug_assert!(false, "duplicate component type {ty} passed to create_entity_with_components");
            }
            final_types.push(ty);
            final_data.push(chosen);
            i = j;
        }

        let archetype_id = self.archetypes.get_or_create(
            self.persistent.as_mut(),
            self.scratch.as_deref_mut(),
            &mut final_types,
            &self.components,
        )?;

        let (index, gen) = self.directory.allocate_index(self.persistent.as_mut())?;
        let id = EntityId::new(index, gen, self.world_id);

        let chunk_idx = self
            .archetypes
            .get_mut(archetype_id)
            .acquire_chunk_for_write(self.persistent.as_mut())?;
        let slot = self
            .archetypes
            .get_mut(archetype_id)
            .write_row(chunk_idx, id, |col_idx, _ty, dst, size| {
                match final_data.get(col_idx).copied().flatten() {
                    Some(bytes) => unsafe {
                        debug_assert!(bytes.len() >= size);
                        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, size);
                    },
                    None => unsafe {
                        std::ptr::write_bytes(dst, 0, size);
                    },
                }
            });

        self.directory.set_record(
            index,
            EntityRecord {
                archetype: archetype_id,
                chunk_index: chunk_idx as u32,
                slot: slot as u32,
            },
        );
        Ok(id)
    }

    pub fn destroy_entity(&mut self, id: EntityId) -> Result<()> {
        if !self.is_alive(id) {
            tracing::warn!(?id, "destroy_entity: invalid or stale entity id");
            return Err(EcsError::InvalidArgument("entity is not alive".into()));
        }
        let index = id.index();
        let record = self
            .directory
            .record(index)
            .expect("is_alive() == true implies a directory record exists");

        let archetype = self.archetypes.get_mut(record.archetype);
        let moved = archetype.swap_remove_row(record.chunk_index as usize, record.slot as usize);
        if let Some(moved_id) = moved {
            self.directory.set_record(
                moved_id.index(),
                EntityRecord {
                    archetype: record.archetype,
                    chunk_index: record.chunk_index,
                    slot: record.slot,
                },
            );
        }
        self.directory.recycle(self.persistent.as_mut(), index)?;
        Ok(())
    }

    pub fn has_component(&self, id: EntityId, comp: ComponentTypeId) -> bool {
        if !self.is_alive(id) || !self.components.is_valid(comp) {
            return false;
        }
        let record = self
            .directory
            .record(id.index())
            .expect("is_alive() == true implies a directory record exists");
        self.archetypes.get(record.archetype).has_type(comp)
    }

    pub fn get_component(&self, id: EntityId, comp: ComponentTypeId) -> Option<*const u8> {
        if !self.is_alive(id) || !self.components.is_valid(comp) {
            return None;
        }
        let record = self.directory.record(id.index())?;
        self.archetypes
            .get(record.archetype)
            .chunk_column_row(record.chunk_index as usize, comp, record.slot as usize)
    }

    pub fn get_component_mut(&mut self, id: EntityId, comp: ComponentTypeId) -> Option<*mut u8> {
        if !self.is_alive(id) || !self.components.is_valid(comp) {
            return None;
        }
        let record = self.directory.record(id.index())?;
        self.archetypes
            .get_mut(record.archetype)
            .chunk_column_row_mut(record.chunk_index as usize, comp, record.slot as usize)
    }

    /// Add `comp` to `id`, migrating it to the archetype `src_types ∪
    /// {comp}`. A no-op success if the entity already has the component.
    pub fn add_component(&mut self, id: EntityId, comp: ComponentTypeId, init_data: Option<&[u8]>) -> Result<()> {
        if !self.is_alive(id) {
            return Err(EcsError::InvalidArgument("entity is not alive".into()));
        }
        if !self.components.is_valid(comp) {
            return Err(EcsError::InvalidArgument(format!("invalid component type id {comp}")));
        }
        let record = self
            .directory
            .record(id.index())
            .expect("is_alive() == true implies a directory record exists");
        if self.archetypes.get(record.archetype).has_type(comp) {
            return Ok(());
        }
        let mut dst_types: Vec<ComponentTypeId> = self.archetypes.get(record.archetype).types().to_vec();
        dst_types.push(comp);
        let dst_archetype_id = self.archetypes.get_or_create(
            self.persistent.as_mut(),
            self.scratch.as_deref_mut(),
            &mut dst_types,
            &self.components,
        )?;
        self.migrate(id, record, dst_archetype_id, Some((comp, init_data)))
    }

    /// Remove `comp` from `id`, migrating it to the archetype `src_types \
    /// {comp}`. A no-op success if the entity does not have the component.
    pub fn remove_component(&mut self, id: EntityId, comp: ComponentTypeId) -> Result<()> {
        if !self.is_alive(id) {
            return Err(EcsError::InvalidArgument("entity is not alive".into()));
        }
        if !self.components.is_valid(comp) {
            return Err(EcsError::InvalidArgument(format!("invalid component type id {comp}")));
        }
        let record = self
            .directory
            .record(id.index())
            .expect("is_alive() == true implies a directory record exists");
        let src_archetype = self.archetypes.get(record.archetype);
        if !src_archetype.has_type(comp) {
            return Ok(());
        }
        let mut dst_types: Vec<ComponentTypeId> =
            src_archetype.types().iter().copied().filter(|&t| t != comp).collect();
        let dst_archetype_id = self.archetypes.get_or_create(
            self.persistent.as_mut(),
            self.scratch.as_deref_mut(),
            &mut dst_types,
            &self.components,
        )?;
        self.migrate(id, record, dst_archetype_id, None)
    }

    /// Move `id`'s row from its current archetype/chunk/slot into a fresh
    /// row of `dst_archetype_id`. `added` names the single newly-introduced
    /// column (and its init data) for an `add_component` migration; `None`
    /// for a `remove_component` migration, where every destination column is
    /// already present in the source.
    fn migrate(
        &mut self,
        id: EntityId,
        src_record: EntityRecord,
        dst_archetype_id: ArchetypeId,
        added: Option<(ComponentTypeId, Option<&[u8]>)>,
    ) -> Result<()> {
        let dst_chunk_idx = self
            .archetypes
            .get_mut(dst_archetype_id)
            .acquire_chunk_for_write(self.persistent.as_mut())?;

        let src_archetype_id = src_record.archetype;
        let src_chunk_idx = src_record.chunk_index as usize;
        let src_slot = src_record.slot as usize;

        let (src_arch, dst_arch) = self.archetypes.get_two_mut(src_archetype_id, dst_archetype_id);
        let dst_slot = dst_arch.write_row(dst_chunk_idx, id, |_col_idx, ty, dst_ptr, size| {
            if let Some(src_ptr) = src_arch.chunk_column_row(src_chunk_idx, ty, src_slot) {
                unsafe { std::ptr::copy_nonoverlapping(src_ptr, dst_ptr, size) };
                return;
            }
            match added {
                Some((added_ty, Some(bytes))) if added_ty == ty => unsafe {
                    debug_assert!(bytes.len() >= size);
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst_ptr, size);
                },
                _ => unsafe { std::ptr::write_bytes(dst_ptr, 0, size) },
            }
        });

        let moved = src_arch.swap_remove_row(src_chunk_idx, src_slot);
        if let Some(moved_id) = moved {
            self.directory.set_record(
                moved_id.index(),
                EntityRecord {
                    archetype: src_archetype_id,
                    chunk_index: src_record.chunk_index,
                    slot: src_record.slot,
                },
            );
        }
        self.directory.set_record(
            id.index(),
            EntityRecord {
                archetype: dst_archetype_id,
                chunk_index: dst_chunk_idx as u32,
                slot: dst_slot as u32,
            },
        );
        Ok(())
    }

    pub fn query_each_chunk(&self, query: &Query, f: impl FnMut(&Archetype, &Chunk)) {
        query_each_chunk(&self.archetypes, query, f)
    }

    pub fn query_compile(&self, query: &Query) -> CompiledQuery {
        query_compile(&self.archetypes, query)
    }

    pub fn query_compiled_each_chunk(&self, compiled: &CompiledQuery, f: impl FnMut(&Archetype, &Chunk)) {
        query_compiled_each_chunk(compiled, &self.archetypes, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaAllocator;

    fn new_world() -> World {
        let persistent = Box::new(ArenaAllocator::new(1 << 20, true).unwrap());
        World::new(WorldCreateInfo::new(persistent)).unwrap()
    }

    #[test]
    fn create_entity_lands_in_empty_archetype() {
        let mut world = new_world();
        let e = world.create_entity().unwrap();
        assert!(world.is_alive(e));
        assert_eq!(world.archetype_count(), 1);
    }

    #[test]
    fn destroy_then_create_reuses_index_with_bumped_generation() {
        let mut world = new_world();
        let e = world.create_entity().unwrap();
        let index = e.index();
        world.destroy_entity(e).unwrap();
        assert!(!world.is_alive(e));
        let e2 = world.create_entity().unwrap();
        assert_eq!(e2.index(), index);
        assert_eq!(e2.generation(), e.generation() + 1);
    }

    #[test]
    fn add_then_remove_component_round_trips_other_columns() {
        let mut world = new_world();
        let a = world.register_component("a", 4, 4).unwrap();
        let b = world.register_component("b", 8, 8).unwrap();
        let e = world.create_entity().unwrap();

        let a_bytes = 0x1111_1111u32.to_ne_bytes();
        world.add_component(e, a, Some(&a_bytes)).unwrap();
        let b_bytes = [0x22u8; 8];
        world.add_component(e, b, Some(&b_bytes)).unwrap();

        unsafe {
            let ptr = world.get_component(e, a).unwrap() as *const u32;
            assert_eq!(*ptr, 0x1111_1111);
        }

        world.remove_component(e, a).unwrap();
        assert!(!world.has_component(e, a));
        unsafe {
            let ptr = world.get_component(e, b).unwrap();
            assert_eq!(std::slice::from_raw_parts(ptr, 8), &b_bytes);
        }
    }

    #[test]
    fn add_component_is_idempotent() {
        let mut world = new_world();
        let a = world.register_component("a", 4, 4).unwrap();
        let e = world.create_entity().unwrap();
        world.add_component(e, a, None).unwrap();
        let archetype_count = world.archetype_count();
        world.add_component(e, a, None).unwrap();
        assert_eq!(world.archetype_count(), archetype_count);
    }
}
