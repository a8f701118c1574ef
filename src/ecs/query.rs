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

//! Include/exclude signature queries, in eager and compiled (snapshot) form.

use super::archetype::Archetype;
use super::chunk::Chunk;
use super::entity::ArchetypeId;
use super::registry::ArchetypeRegistry;
use super::signature::Signature;

/// A chunk with archetype `A` matches iff `A.sig ⊇ include` and
/// `A.sig ∩ exclude == ∅`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Query {
    pub include: Signature,
    pub exclude: Signature,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include(mut self, include: Signature) -> Self {
        self.include = include;
        self
    }

    pub fn with_exclude(mut self, exclude: Signature) -> Self {
        self.exclude = exclude;
        self
    }

    fn matches(&self, archetype: &Archetype) -> bool {
        archetype.signature().contains(&self.include) && !archetype.signature().intersects(&self.exclude)
    }
}

/// Walk the archetype list in insertion order; for each matching archetype,
/// walk its chunks in insertion order and invoke `f` on every non-empty one.
pub fn query_each_chunk(registry: &ArchetypeRegistry, query: &Query, mut f: impl FnMut(&Archetype, &Chunk)) {
    for (_, archetype) in registry.iter() {
        if !query.matches(archetype) {
            continue;
        }
        for chunk in archetype.chunks() {
            if chunk.is_empty() {
                continue;
            }
            f(archetype, chunk);
        }
    }
}

/// A snapshot of the archetypes matching a [`Query`] at compile time.
///
/// Becomes stale if archetypes are subsequently added to the world;
/// `each_chunk` asserts (debug builds only) that the world's archetype count
/// has not grown since compilation.
pub struct CompiledQuery {
    archetype_ids: Vec<ArchetypeId>,
    compiled_at_count: usize,
}

pub fn query_compile(registry: &ArchetypeRegistry, query: &Query) -> CompiledQuery {
    let archetype_ids = registry
        .iter()
        .filter(|(_, archetype)| query.matches(archetype))
        .map(|(id, _)| id)
        .collect();
    CompiledQuery {
        archetype_ids,
        compiled_at_count: registry.len(),
    }
}

pub fn query_compiled_each_chunk(
    compiled: &CompiledQuery,
    registry: &ArchetypeRegistry,
    mut f: impl FnMut(&Archetype, &Chunk),
) {
    debug_assert_eq!(
        compiled.compiled_at_count,
        registry.len(),
        "compiled query is stale: archetypes were added to the world after compilation"
    );
    for &id in &compiled.archetype_ids {
        let archetype = registry.get(id);
        for chunk in archetype.chunks() {
            if chunk.is_empty() {
                continue;
            }
            f(archetype, chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaAllocator;
    use crate::ecs::component::ComponentRegistry;

    #[test]
    fn eager_query_filters_by_include_and_exclude() {
        let mut alloc = ArenaAllocator::new(1 << 20, true).unwrap();
        let mut components = ComponentRegistry::new();
        let a = components.register("a", 4, 4).unwrap();
        let b = components.register("b", 4, 4).unwrap();
        let c = components.register("c", 4, 4).unwrap();

        let mut registry = ArchetypeRegistry::new();
        let mut ab = vec![a, b];
        let id_ab = registry
            .get_or_create(&mut alloc, None, &mut ab, &components)
            .unwrap();
        let mut ac = vec![a, c];
        let id_ac = registry
            .get_or_create(&mut alloc, None, &mut ac, &components)
            .unwrap();

        let chunk_ab = registry.get(id_ab).alloc_chunk(&mut alloc).unwrap();
        registry.get_mut(id_ab).push_chunk(&mut alloc, chunk_ab).unwrap();
        let chunk_ac = registry.get(id_ac).alloc_chunk(&mut alloc).unwrap();
        registry.get_mut(id_ac).push_chunk(&mut alloc, chunk_ac).unwrap();

        let query = Query::new()
            .with_include(Signature::from_types(&[a]))
            .with_exclude(Signature::from_types(&[c]));

        // Both chunks are empty, so the eager walk should yield nothing even
        // though `ab` matches the signature filter.
        let mut seen = 0;
        query_each_chunk(&registry, &query, |_, _| seen += 1);
        assert_eq!(seen, 0);
    }

    #[test]
    fn compiled_query_matches_eager_query() {
        let mut alloc = ArenaAllocator::new(1 << 20, true).unwrap();
        let mut components = ComponentRegistry::new();
        let a = components.register("a", 4, 4).unwrap();
        let mut registry = ArchetypeRegistry::new();
        let mut only_a = vec![a];
        registry
            .get_or_create(&mut alloc, None, &mut only_a, &components)
            .unwrap();

        let query = Query::new().with_include(Signature::from_types(&[a]));
        let compiled = query_compile(&registry, &query);
        assert_eq!(compiled.archetype_ids.len(), 1);
    }
}
