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

//! A fixed-size SoA byte block: one entity-id column plus one column per
//! component type. A chunk carries only its buffer pointer and row count —
//! column offsets, sizes and capacity live on the owning
//! [`super::archetype::Archetype`], which performs all row-level mutation
//! (see `Archetype::write_row`/`swap_remove_row`) so it can borrow its own
//! layout fields and its `chunks` vector disjointly.

use std::ptr::NonNull;

use super::entity::EntityId;

#[derive(Clone, Copy)]
pub struct Chunk {
    buffer: NonNull<u8>,
    count: u32,
}

impl Chunk {
    pub(crate) fn new(buffer: NonNull<u8>) -> Self {
        Self { buffer, count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn has_space(&self, capacity: usize) -> bool {
        (self.count as usize) < capacity
    }

    pub(crate) fn raw_ptr(&self) -> *mut u8 {
        self.buffer.as_ptr()
    }

    pub(crate) fn set_count(&mut self, count: u32) {
        self.count = count;
    }

    pub fn entities(&self, ents_offset: usize) -> &[EntityId] {
        unsafe {
            let ptr = self.buffer.as_ptr().add(ents_offset) as *const EntityId;
            std::slice::from_raw_parts(ptr, self.count as usize)
        }
    }

    pub fn column_ptr(&self, col_offset: usize) -> *const u8 {
        unsafe { self.buffer.as_ptr().add(col_offset) }
    }

    pub fn column_ptr_mut(&mut self, col_offset: usize) -> *mut u8 {
        unsafe { self.buffer.as_ptr().add(col_offset) }
    }
}
