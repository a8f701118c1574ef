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

//! The "dynamic" `Allocator` backend: each allocation carries its own
//! metadata via the global allocator, `realloc` may move, and scopes are
//! implemented via a freelist-stamped high-watermark over an allocation log
//! rather than a single bump cursor.

use std::alloc::{alloc, dealloc, realloc as sys_realloc, Layout};
use std::ptr::NonNull;

use ahash::AHashMap;

use crate::error::Result;

use super::scope::Scope;
use super::tag::{AllocTag, TagStats};
use super::Allocator;

const DEFAULT_ALIGN: usize = std::mem::align_of::<usize>();

struct LiveAlloc {
    layout: Layout,
    tag: AllocTag,
}

pub struct DynamicAllocator {
    live: AHashMap<usize, LiveAlloc>,
    /// Order in which allocations happened, used as the high-watermark log
    /// that `scope_begin`/`scope_end` replay against.
    log: Vec<usize>,
    stats: TagStats,
}

impl DynamicAllocator {
    pub fn new() -> Self {
        Self {
            live: AHashMap::new(),
            log: Vec::new(),
            stats: TagStats::new(),
        }
    }

    pub fn stats(&self) -> &TagStats {
        &self.stats
    }
}

impl Default for DynamicAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for DynamicAllocator {
    fn alloc(&mut self, size: usize, tag: AllocTag) -> Option<NonNull<u8>> {
        self.alloc_aligned(size, DEFAULT_ALIGN, tag)
    }

    fn alloc_aligned(&mut self, size: usize, align: usize, tag: AllocTag) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(size.max(1), align.max(1)).ok()?;
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr)?;
        self.live.insert(ptr.as_ptr() as usize, LiveAlloc { layout, tag });
        self.log.push(ptr.as_ptr() as usize);
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
        let key = ptr.as_ptr() as usize;
        let old = self.live.remove(&key)?;
        let new_layout = Layout::from_size_align(new_size.max(1), old.layout.align()).ok()?;
        let new_ptr = unsafe { sys_realloc(ptr.as_ptr(), old.layout, new_layout.size()) };
        let new_ptr = NonNull::new(new_ptr)?;
        self.live.insert(
            new_ptr.as_ptr() as usize,
            LiveAlloc {
                layout: new_layout,
                tag,
            },
        );
        if let Some(slot) = self.log.iter_mut().find(|p| **p == key) {
            *slot = new_ptr.as_ptr() as usize;
        }
        self.stats.sub(tag, old_size);
        self.stats.add(tag, new_size);
        Some(new_ptr)
    }

    fn free(&mut self, ptr: NonNull<u8>, _size: usize, tag: AllocTag) {
        let key = ptr.as_ptr() as usize;
        if let Some(entry) = self.live.remove(&key) {
            self.stats.sub(tag, entry.layout.size());
            unsafe { dealloc(ptr.as_ptr(), entry.layout) };
            self.log.retain(|p| *p != key);
        }
    }

    fn scope_begin(&mut self) -> Result<Scope> {
        Ok(Scope {
            saved_pos: self.log.len(),
        })
    }

    fn scope_end(&mut self, scope: Scope, tag: AllocTag) {
        while self.log.len() > scope.saved_pos {
            let key = self.log.pop().expect("log.len() > saved_pos implies pop succeeds");
            if let Some(entry) = self.live.remove(&key) {
                self.stats.sub(tag, entry.layout.size());
                unsafe { dealloc(key as *mut u8, entry.layout) };
            }
        }
    }

    fn supports_scopes(&self) -> bool {
        true
    }

    fn clear(&mut self, tag: AllocTag) {
        for key in self.log.drain(..) {
            if let Some(entry) = self.live.remove(&key) {
                self.stats.sub(tag, entry.layout.size());
                unsafe { dealloc(key as *mut u8, entry.layout) };
            }
        }
    }
}

impl Drop for DynamicAllocator {
    fn drop(&mut self) {
        for (key, entry) in self.live.drain() {
            unsafe { dealloc(key as *mut u8, entry.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_free_round_trip() {
        let mut dyn_alloc = DynamicAllocator::new();
        let ptr = dyn_alloc.alloc(64, AllocTag::Struct).unwrap();
        assert_eq!(dyn_alloc.stats().get(AllocTag::Struct), 64);
        dyn_alloc.free(ptr, 64, AllocTag::Struct);
        assert_eq!(dyn_alloc.stats().get(AllocTag::Struct), 0);
    }

    #[test]
    fn nested_scopes_roll_back() {
        let mut dyn_alloc = DynamicAllocator::new();
        let outer = dyn_alloc.scope_begin().unwrap();
        dyn_alloc.alloc(1024, AllocTag::Array).unwrap();
        let inner = dyn_alloc.scope_begin().unwrap();
        dyn_alloc.alloc(2048, AllocTag::Struct).unwrap();
        dyn_alloc.scope_end(inner, AllocTag::Struct);
        assert_eq!(dyn_alloc.stats().get(AllocTag::Struct), 0);
        assert_eq!(dyn_alloc.stats().get(AllocTag::Array), 1024);
        dyn_alloc.scope_end(outer, AllocTag::Array);
        assert_eq!(dyn_alloc.stats().get(AllocTag::Array), 0);
    }
}
