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

//! The default `Allocator` backend: a tagged arena chain. `free` and
//! shrinking `realloc` are no-ops (the chain only reclaims via
//! `scope_end`/`clear`); `scope_begin` is O(1).

use std::ptr::NonNull;

use crate::error::{EcsError, Result};

use super::block::BlockFlags;
use super::chain::ArenaChain;
use super::scope::Scope;
use super::tag::{AllocTag, TagStats};
use super::Allocator;

pub struct ArenaAllocator {
    chain: ArenaChain,
    stats: TagStats,
    /// Persistent arenas refuse `scope_begin` (see spec §4.3): a scope on
    /// the world's permanent allocator could reclaim archetype/chunk storage
    /// unrelated code still depends on.
    is_persistent: bool,
}

impl ArenaAllocator {
    pub fn new(default_block_size: usize, is_persistent: bool) -> Result<Self> {
        let chain = ArenaChain::new(default_block_size, BlockFlags::NONE).ok_or_else(|| {
            EcsError::AllocationFailed("failed to reserve initial arena block".into())
        })?;
        Ok(Self {
            chain,
            stats: TagStats::new(),
            is_persistent,
        })
    }

    pub fn stats(&self) -> &TagStats {
        &self.stats
    }

    pub fn format_statistics(&self) -> String {
        self.stats.format_statistics()
    }
}

impl Allocator for ArenaAllocator {
    fn alloc(&mut self, size: usize, tag: AllocTag) -> Option<NonNull<u8>> {
        let align = std::mem::align_of::<usize>();
        let ptr = self.chain.alloc(size.max(1), align)?;
        self.stats.add(tag, size);
        Some(ptr)
    }

    fn alloc_aligned(&mut self, size: usize, align: usize, tag: AllocTag) -> Option<NonNull<u8>> {
        let ptr = self.chain.alloc(size.max(1), align)?;
        self.stats.add(tag, size);
        Some(ptr)
    }

    fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        tag: AllocTag,
    ) -> Option<NonNull<u8>> {
        if new_size <= old_size {
            // Shrinking in place is a no-op for an arena backend; the tail
            // bytes simply become unreachable until the next scope reset.
            return Some(ptr);
        }
        let new_ptr = self.alloc(new_size, tag)?;
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size);
        }
        Some(new_ptr)
    }

    fn free(&mut self, _ptr: NonNull<u8>, _size: usize, _tag: AllocTag) {
        // No-op: arena allocations are reclaimed in bulk via scope_end/clear.
    }

    fn scope_begin(&mut self) -> Result<Scope> {
        if self.is_persistent {
            return Err(EcsError::InvalidArgument(
                "cannot open a scratch scope on a persistent allocator".into(),
            ));
        }
        Ok(Scope {
            saved_pos: self.chain.arena_pos(),
        })
    }

    fn scope_end(&mut self, scope: Scope, tag: AllocTag) {
        let freed = self.chain.reset_to(scope.saved_pos);
        self.stats.sub(tag, freed);
    }

    fn supports_scopes(&self) -> bool {
        !self.is_persistent
    }

    fn clear(&mut self, tag: AllocTag) {
        let freed = self.chain.reset_to(self.chain.initial_pos());
        self.stats.sub(tag, freed);
    }
}
