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

//! Runtime component type registry: name/size/align metadata, looked up by
//! name or by the id returned at registration time.

use ahash::AHashMap;

use crate::error::{EcsError, Result};

/// Identifies a registered component type. `0xFFFF` is the invalid sentinel.
pub type ComponentTypeId = u16;

pub const INVALID_COMPONENT_ID: ComponentTypeId = 0xFFFF;

/// Hard cap on distinct component types per world; also the size of
/// [`super::archetype::Archetype`]'s `type_to_col` reverse-lookup array.
pub const MAX_COMPONENTS: usize = 256;

/// Immutable metadata recorded at registration time.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub name: String,
    pub size: usize,
    pub align: usize,
}

/// Name → id map plus per-id layout metadata, capped at [`MAX_COMPONENTS`].
///
/// Component identity is set once at registration and never revoked (no
/// deregistration API), matching spec's "deletion of component types after
/// registration" non-goal.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    name_to_id: AHashMap<String, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            infos: Vec::with_capacity(capacity),
            name_to_id: AHashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Register a new component type. Fails if `name` is already registered,
    /// if `size == 0`, if `align` is not a power of two, or if the registry
    /// is already at [`MAX_COMPONENTS`].
    pub fn register(&mut self, name: &str, size: usize, align: usize) -> Result<ComponentTypeId> {
        if size == 0 || align == 0 || !align.is_power_of_two() {
            return Err(EcsError::InvalidArgument(format!(
                "component '{name}' requires size > 0 and a power-of-two align (got size={size}, align={align})"
            )));
        }
        if self.name_to_id.contains_key(name) {
            tracing::warn!(name, "register_component: name already registered");
            return Err(EcsError::AlreadyRegistered(name.to_string()));
        }
        if self.infos.len() >= MAX_COMPONENTS {
            tracing::error!(name, "register_component: MAX_COMPONENTS exhausted");
            return Err(EcsError::CapacityExhausted(format!(
                "cannot register '{name}': {MAX_COMPONENTS} component types already registered"
            )));
        }
        let id = self.infos.len() as ComponentTypeId;
        self.infos.push(ComponentInfo {
            name: name.to_string(),
            size,
            align,
        });
        self.name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register `name` if absent, or return its existing id if the stored
    /// layout matches exactly. Fails with [`EcsError::LayoutMismatch`] if a
    /// component of that name exists with a different size or align.
    pub fn register_once(
        &mut self,
        name: &str,
        size: usize,
        align: usize,
    ) -> Result<ComponentTypeId> {
        if let Some(&id) = self.name_to_id.get(name) {
            let info = &self.infos[id as usize];
            if info.size == size && info.align == align {
                return Ok(id);
            }
            tracing::error!(
                name,
                expected_size = info.size,
                expected_align = info.align,
                got_size = size,
                got_align = align,
                "register_component_once: layout mismatch"
            );
            return Err(EcsError::LayoutMismatch {
                name: name.to_string(),
                expected_size: info.size,
                expected_align: info.align,
                got_size: size,
                got_align: align,
            });
        }
        self.register(name, size, align)
    }

    pub fn find(&self, name: &str) -> ComponentTypeId {
        self.name_to_id
            .get(name)
            .copied()
            .unwrap_or(INVALID_COMPONENT_ID)
    }

    pub fn get(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id as usize)
    }

    pub fn is_valid(&self, id: ComponentTypeId) -> bool {
        id != INVALID_COMPONENT_ID && (id as usize) < self.infos.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_sequential_ids() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register("a", 4, 4).unwrap();
        let b = reg.register("b", 8, 8).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn register_duplicate_name_rejected() {
        let mut reg = ComponentRegistry::new();
        reg.register("pos", 12, 4).unwrap();
        let err = reg.register("pos", 12, 4).unwrap_err();
        assert!(matches!(err, EcsError::AlreadyRegistered(_)));
    }

    #[test]
    fn register_rejects_non_power_of_two_align() {
        let mut reg = ComponentRegistry::new();
        assert!(reg.register("bad", 4, 3).is_err());
    }

    #[test]
    fn register_once_matches_existing_layout() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register_once("pos", 12, 4).unwrap();
        let b = reg.register_once("pos", 12, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn register_once_rejects_layout_mismatch() {
        let mut reg = ComponentRegistry::new();
        reg.register_once("pos", 12, 4).unwrap();
        let err = reg.register_once("pos", 16, 4).unwrap_err();
        assert!(matches!(err, EcsError::LayoutMismatch { .. }));
    }

    #[test]
    fn find_returns_invalid_sentinel_for_unknown_name() {
        let reg = ComponentRegistry::new();
        assert_eq!(reg.find("nope"), INVALID_COMPONENT_ID);
    }
}
