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

//! Archetype-oriented ECS: entities are grouped into archetypes by their
//! exact component signature, each archetype stores its rows in fixed-size
//! chunked SoA columns, and structural changes (add/remove component) are
//! implemented as a row migration between archetypes rather than in-place
//! mutation.

pub mod archetype;
pub mod chunk;
pub mod component;
pub mod entity;
pub mod query;
pub mod registry;
pub mod signature;
pub mod world;

pub use archetype::{Archetype, CHUNK_SIZE};
pub use chunk::Chunk;
pub use component::{ComponentInfo, ComponentRegistry, ComponentTypeId, INVALID_COMPONENT_ID, MAX_COMPONENTS};
pub use entity::{ArchetypeId, EntityId, EntityRecord, WorldId};
pub use query::{CompiledQuery, Query};
pub use registry::ArchetypeRegistry;
pub use signature::{Signature, SIG_WORDS};
pub use world::{World, WorldCreateInfo};
