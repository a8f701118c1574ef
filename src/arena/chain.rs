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

//! Links blocks head-to-tail and grows the chain on overflow, keeping a
//! free list of reclaimed blocks keyed by reservation size so `reset_to` can
//! hand a future allocation the same address range back.

use std::ptr::NonNull;

use ahash::AHashMap;

use super::block::{ArenaBlock, BlockFlags};

/// Default size (bytes, header included) for a freshly grown block.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

pub struct ArenaChain {
    current: Box<ArenaBlock>,
    free_list: AHashMap<usize, Vec<Box<ArenaBlock>>>,
    default_chunk_size: usize,
    flags: BlockFlags,
    /// `arena_pos()` immediately after construction; `clear` resets here
    /// rather than to 0, since 0 falls before the first block's header.
    initial_pos: usize,
}

impl ArenaChain {
    pub fn new(default_chunk_size: usize, flags: BlockFlags) -> Option<Self> {
        let current = Box::new(ArenaBlock::new(
            default_chunk_size,
            default_chunk_size,
            0,
            flags,
        )?);
        let initial_pos = current.base_pos() + current.pos();
        Some(Self {
            current,
            free_list: AHashMap::new(),
            default_chunk_size,
            flags,
            initial_pos,
        })
    }

    pub fn initial_pos(&self) -> usize {
        self.initial_pos
    }

    /// Global monotonic cursor: the current block's `base_pos + pos`.
    pub fn arena_pos(&self) -> usize {
        self.current.base_pos() + self.current.pos()
    }

    /// Bump-allocate `size` bytes aligned to `align`, growing the chain if
    /// the head block cannot satisfy the request.
    pub fn alloc(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if let Some((ptr, _)) = self.current.try_alloc(size, align) {
            return Some(ptr);
        }
        self.grow(size)?;
        self.current.try_alloc(size, align).map(|(ptr, _)| ptr)
    }

    fn grow(&mut self, requested: usize) -> Option<()> {
        let rsv_needed = requested + super::block::BLOCK_HEADER_SIZE;
        let reused = self.take_free_block_at_least(rsv_needed);
        let base_pos = self.current.base_pos() + self.current.rsv_size();

        let mut new_block = match reused {
            Some(mut block) => {
                // Reused blocks keep their original reservation; just rewind
                // and re-home them at the new base_pos.
                block.rewind(super::block::BLOCK_HEADER_SIZE);
                block
            }
            None => Box::new(ArenaBlock::new(
                requested,
                self.default_chunk_size.max(DEFAULT_BLOCK_SIZE),
                base_pos,
                self.flags,
            )?),
        };
        // Re-home base_pos for both fresh and reused blocks.
        self.reset_base_pos(&mut new_block, base_pos);

        let old_current = std::mem::replace(&mut self.current, new_block);
        self.current.set_prev(Some(old_current));
        Some(())
    }

    fn reset_base_pos(&self, block: &mut ArenaBlock, base_pos: usize) {
        // `ArenaBlock` doesn't expose a public setter for `base_pos` because
        // it's normally fixed at construction; the chain is the one place
        // allowed to re-home a reused block, so it pokes the field through a
        // small helper on the block itself.
        block.rehome(base_pos);
    }

    fn take_free_block_at_least(&mut self, min_rsv: usize) -> Option<Box<ArenaBlock>> {
        let key = self
            .free_list
            .keys()
            .copied()
            .filter(|&k| k >= min_rsv)
            .min()?;
        let bucket = self.free_list.get_mut(&key)?;
        let block = bucket.pop();
        if bucket.is_empty() {
            self.free_list.remove(&key);
        }
        block
    }

    /// Pop blocks newer than `pos` onto the free list (keyed by reservation
    /// size), then rewind the (possibly new) current block's cursor to the
    /// in-block remainder of `pos`. Returns the number of bytes the global
    /// cursor rewound by.
    pub fn reset_to(&mut self, pos: usize) -> usize {
        let start = self.arena_pos();
        debug_assert!(pos <= start, "reset_to cannot advance the arena");

        while self.current.base_pos() > pos {
            let rsv = self.current.rsv_size();
            let mut popped = match self.current.take_prev() {
                Some(prev) => std::mem::replace(&mut *self.current, *prev),
                None => {
                    // No older block: clamp to the start of this (first)
                    // block rather than underflow past it.
                    break;
                }
            };
            popped.rewind(super::block::BLOCK_HEADER_SIZE);
            self.free_list.entry(rsv).or_default().push(Box::new(popped));
        }

        let in_block_pos = pos.saturating_sub(self.current.base_pos());
        let clamped = in_block_pos.max(super::block::BLOCK_HEADER_SIZE);
        self.current.rewind(clamped.min(self.current.pos()));

        start.saturating_sub(self.arena_pos())
    }
}
