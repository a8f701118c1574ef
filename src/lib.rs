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

//! Archetype-oriented ECS with chunked structure-of-arrays storage, backed
//! by a tagged region/arena allocator.
//!
//! Entities are grouped into [`ecs::Archetype`]s by their exact component
//! set; each archetype stores its entities in fixed-size [`ecs::Chunk`]s
//! laid out column-major, so a query over a handful of component types
//! touches only the bytes it needs. All long-lived memory — chunk buffers,
//! the entity directory, archetype keys — is carved out of an
//! [`arena::Allocator`] rather than scattered across individual heap
//! allocations.

pub mod arena;
pub mod ecs;
pub mod error;

pub use arena::{AllocTag, Allocator, ArenaAllocator, ArenaVec, DynamicAllocator, Scope, TagStats};
pub use ecs::{
    Archetype, ArchetypeId, Chunk, ComponentInfo, ComponentRegistry, ComponentTypeId, CompiledQuery,
    EntityId, EntityRecord, Query, Signature, WorldId, World, WorldCreateInfo, CHUNK_SIZE,
    INVALID_COMPONENT_ID, MAX_COMPONENTS, SIG_WORDS,
};
pub use error::{EcsError, Result};
