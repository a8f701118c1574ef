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

//! String-key → archetype map, plus the ordered, append-only archetype list
//! queries walk.

use ahash::AHashMap;

use crate::arena::{AllocTag, Allocator};
use crate::error::{EcsError, Result};

use super::archetype::{canonical_key, Archetype};
use super::component::{ComponentRegistry, ComponentTypeId};
use super::entity::ArchetypeId;

/// Formats into a caller-supplied byte slice instead of a `String`, so the
/// lookup-hit path in [`ArchetypeRegistry::get_or_create`] can probe the map
/// without a heap allocation.
struct ByteWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl std::fmt::Write for ByteWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        let end = self.len + bytes.len();
        if end > self.buf.len() {
            return Err(std::fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }
}

/// Write [`canonical_key`]'s format directly into `w`, without allocating a
/// `String`.
fn write_canonical_key(types: &[ComponentTypeId], w: &mut impl std::fmt::Write) -> std::fmt::Result {
    write!(w, "{}:", types.len())?;
    for (i, t) in types.iter().enumerate() {
        if i == 0 {
            write!(w, " {t}")?;
        } else {
            write!(w, ",{t}")?;
        }
    }
    Ok(())
}

#[derive(Default)]
pub struct ArchetypeRegistry {
    archetypes: Vec<Archetype>,
    by_key: AHashMap<String, ArchetypeId>,
}

impl ArchetypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            archetypes: Vec::with_capacity(capacity),
            by_key: AHashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }

    pub fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }

    /// Borrow two distinct archetypes mutably at once, as migration needs
    /// (read the source row while writing the destination row). Panics if
    /// `a == b` — migration always changes signature, so this should never
    /// be called with equal ids.
    pub fn get_two_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        assert_ne!(a, b, "get_two_mut requires distinct archetypes");
        if a.index() < b.index() {
            let (left, right) = self.archetypes.split_at_mut(b.index());
            (&mut left[a.index()], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a.index());
            (&mut right[0], &mut left[b.index()])
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArchetypeId, &Archetype)> {
        self.archetypes
            .iter()
            .enumerate()
            .map(|(i, a)| (ArchetypeId(i as u32), a))
    }

    /// Look up or create the archetype for `types` (sorted and deduplicated
    /// in place by this call).
    ///
    /// When a scratch allocator is configured, the lookup key is formatted
    /// directly into a throwaway scratch buffer and the hash-map probe reads
    /// that buffer's bytes — no `String` is allocated unless the probe
    /// misses, matching spec's "throw-away copy... then released" lookup
    /// mechanic (the copy is the *only* representation of the key on the hit
    /// path, not a decoy built alongside a heap `String`). The permanent,
    /// plain heap `String` is built only once a new archetype must actually
    /// be created, and stored as both the map key and the archetype's own
    /// key. Giving the map key an arena-tied lifetime would make the map
    /// self-referential, which the owned-memory redesign steers away from,
    /// so the *stored* key is never arena-backed.
    pub fn get_or_create(
        &mut self,
        persistent: &mut dyn Allocator,
        scratch: Option<&mut dyn Allocator>,
        types: &mut Vec<ComponentTypeId>,
        components: &ComponentRegistry,
    ) -> Result<ArchetypeId> {
        types.sort_unstable();
        types.dedup();

        let probe_key = match scratch {
            Some(scratch) => {
                let scope = scratch.scope_begin()?;
                // Generous upper bound: 3 digits for the count prefix plus a
                // colon/space, and each `u16` type entry needs at most 5
                // digits plus a separator.
                let cap = 8 + types.len().saturating_mul(7);
                let ptr = scratch.alloc_aligned(cap, 1, AllocTag::String).ok_or_else(|| {
                    EcsError::AllocationFailed("scratch allocator exhausted while building archetype key".into())
                })?;
                let raw = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), cap) };
                let mut writer = ByteWriter { buf: raw, len: 0 };
                write_canonical_key(types, &mut writer)
                    .expect("scratch buffer is sized to fit the canonical key");
                let written = writer.len;
                let key_str = std::str::from_utf8(&writer.buf[..written])
                    .expect("canonical key is pure ASCII");
                let found = self.by_key.get(key_str).copied();
                scratch.scope_end(scope, AllocTag::String);
                if let Some(id) = found {
                    return Ok(id);
                }
                canonical_key(types)
            }
            None => {
                let formatted = canonical_key(types);
                if let Some(&id) = self.by_key.get(&formatted) {
                    return Ok(id);
                }
                formatted
            }
        };

        let sizes: Vec<usize> = types
            .iter()
            .map(|&t| components.get(t).expect("type validated before get_or_create").size)
            .collect();
        let aligns: Vec<usize> = types
            .iter()
            .map(|&t| components.get(t).expect("type validated before get_or_create").align)
            .collect();

        let archetype = Archetype::new(persistent, types.clone(), sizes, aligns, probe_key.clone())?;
        let id = ArchetypeId(self.archetypes.len() as u32);
        self.archetypes.push(archetype);
        self.by_key.insert(probe_key, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaAllocator;

    #[test]
    fn get_or_create_dedups_by_sorted_types() {
        let mut alloc = ArenaAllocator::new(1 << 20, true).unwrap();
        let mut components = ComponentRegistry::new();
        for i in 0..4u16 {
            components.register(&format!("t{i}"), 4, 4).unwrap();
        }
        let mut reg = ArchetypeRegistry::new();

        let mut a = vec![2u16, 0, 3];
        let id_a = reg.get_or_create(&mut alloc, None, &mut a, &components).unwrap();
        let mut b = vec![0u16, 3, 2];
        let id_b = reg.get_or_create(&mut alloc, None, &mut b, &components).unwrap();

        assert_eq!(id_a, id_b);
        assert_eq!(reg.get(id_a).key(), "3: 0,2,3");
        assert_eq!(reg.len(), 1);
    }
}
