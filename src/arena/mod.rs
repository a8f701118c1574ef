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

//! Tagged region allocators.
//!
//! [`Allocator`] is the capability every ECS storage layer allocates through,
//! so that live-byte accounting and scratch-scope rollback are uniform
//! regardless of which backend a world was built with. [`ArenaAllocator`] is
//! the default, OS-arena-backed implementation; [`DynamicAllocator`] trades
//! bump-allocator throughput for global-allocator interop (handy under Miri,
//! or when embedding the ECS inside a host that already owns its own memory
//! budget).

mod arena_allocator;
mod arena_vec;
mod block;
mod chain;
mod dynamic_allocator;
mod os_mem;
mod scope;
mod tag;

pub use arena_allocator::ArenaAllocator;
pub use arena_vec::ArenaVec;
pub use dynamic_allocator::DynamicAllocator;
pub use scope::Scope;
pub use tag::{AllocTag, TagStats, TAG_COUNT};

use std::ptr::NonNull;

use crate::error::Result;

/// A tagged allocator a `World` can be built over.
///
/// Every method takes an [`AllocTag`] so an implementation can maintain
/// per-purpose live-byte counters. Scopes are LIFO: a `Scope` returned by
/// `scope_begin` must be closed via `scope_end` before an older scope on the
/// same allocator, and closing it frees everything allocated since it
/// opened.
pub trait Allocator {
    /// Allocate `size` bytes tagged as `tag`, aligned to the platform's
    /// pointer size. Returns `None` on exhaustion.
    fn alloc(&mut self, size: usize, tag: AllocTag) -> Option<NonNull<u8>>;

    /// Allocate `size` bytes aligned to `align` (must be a power of two),
    /// tagged as `tag`.
    fn alloc_aligned(&mut self, size: usize, align: usize, tag: AllocTag) -> Option<NonNull<u8>>;

    /// Resize a prior allocation of `old_size` bytes to `new_size`, possibly
    /// moving it. Callers must not use `ptr` again if the returned pointer
    /// differs from it.
    fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        tag: AllocTag,
    ) -> Option<NonNull<u8>>;

    /// Release a single allocation. Arena backends treat this as a no-op;
    /// dynamic backends reclaim immediately.
    fn free(&mut self, ptr: NonNull<u8>, size: usize, tag: AllocTag);

    /// Open a LIFO scratch scope. Fails if this allocator is persistent (see
    /// `ArenaAllocator::new`'s `is_persistent` flag) or otherwise cannot
    /// support scopes.
    fn scope_begin(&mut self) -> Result<Scope>;

    /// Close a scope, freeing everything allocated since it opened and
    /// crediting the freed bytes to `tag`.
    fn scope_end(&mut self, scope: Scope, tag: AllocTag);

    /// Whether `scope_begin`/`scope_end` are usable on this allocator.
    fn supports_scopes(&self) -> bool;

    /// Free everything this allocator has ever handed out, crediting freed
    /// bytes to `tag`. Leaves the allocator usable for further allocation.
    fn clear(&mut self, tag: AllocTag);
}
