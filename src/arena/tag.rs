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

//! Tag accounting: a closed set of allocation purposes and their live-byte
//! counters.

use std::fmt::Write as _;

/// Closed enum of allocation purposes. `alloc` adds to a tag's live byte
/// counter; `reset_to`/`clear`/`scope_end` subtract from it.
///
/// There is deliberately no `Component`/`Registry` tag: `ComponentRegistry`
/// and `ArchetypeRegistry` own a `Vec`/`AHashMap` whose `String` keys and
/// hash-table internals cannot be routed through an arbitrary `Allocator`
/// without the unstable `allocator_api`, so tagging them would be cosmetic —
/// bytes a caller could never actually reclaim via `scope_end`/`clear`. Every
/// tag below is fed by a real `alloc`/`alloc_aligned` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AllocTag {
    Unknown = 0,
    Array = 1,
    String = 2,
    Struct = 3,
    Buffer = 4,
    Vector = 5,
    Queue = 6,
    Chunk = 7,
    Archetype = 8,
    Directory = 9,
}

/// Number of distinct tags. Kept in sync with [`AllocTag`] manually since
/// Rust has no `enum::COUNT`.
pub const TAG_COUNT: usize = 10;

impl AllocTag {
    const ALL: [AllocTag; TAG_COUNT] = [
        AllocTag::Unknown,
        AllocTag::Array,
        AllocTag::String,
        AllocTag::Struct,
        AllocTag::Buffer,
        AllocTag::Vector,
        AllocTag::Queue,
        AllocTag::Chunk,
        AllocTag::Archetype,
        AllocTag::Directory,
    ];

    fn name(self) -> &'static str {
        match self {
            AllocTag::Unknown => "UNKNOWN",
            AllocTag::Array => "ARRAY",
            AllocTag::String => "STRING",
            AllocTag::Struct => "STRUCT",
            AllocTag::Buffer => "BUFFER",
            AllocTag::Vector => "VECTOR",
            AllocTag::Queue => "QUEUE",
            AllocTag::Chunk => "CHUNK",
            AllocTag::Archetype => "ARCHETYPE",
            AllocTag::Directory => "DIRECTORY",
        }
    }
}

/// Per-tag live byte counters for a single arena.
#[derive(Debug, Clone, Default)]
pub struct TagStats {
    bytes: [usize; TAG_COUNT],
}

impl TagStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: AllocTag, size: usize) {
        self.bytes[tag as usize] += size;
    }

    /// Subtract `size` from `tag`, saturating at 0 (reclaiming more than was
    /// ever recorded for a tag is a caller bug, not a panic).
    pub fn sub(&mut self, tag: AllocTag, size: usize) {
        self.bytes[tag as usize] = self.bytes[tag as usize].saturating_sub(size);
    }

    pub fn get(&self, tag: AllocTag) -> usize {
        self.bytes[tag as usize]
    }

    pub fn reset_all(&mut self) {
        self.bytes = [0; TAG_COUNT];
    }

    /// Emit one line per tag: `"<NAME>: <n> Bytes\n"` below 1024, `"%.2f
    /// KB\n"` below 1 MiB, `"%.2f MB\n"` below 1 GiB, `"%.2f GB\n"` above.
    pub fn format_statistics(&self) -> String {
        let mut out = String::new();
        for tag in AllocTag::ALL {
            let n = self.bytes[tag as usize];
            let _ = if n < 1024 {
                writeln!(out, "{}: {n} Bytes", tag.name())
            } else if n < 1024 * 1024 {
                writeln!(out, "{}: {:.2} KB", tag.name(), n as f64 / 1024.0)
            } else if n < 1024 * 1024 * 1024 {
                writeln!(out, "{}: {:.2} MB", tag.name(), n as f64 / (1024.0 * 1024.0))
            } else {
                writeln!(
                    out,
                    "{}: {:.2} GB",
                    tag.name(),
                    n as f64 / (1024.0 * 1024.0 * 1024.0)
                )
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_round_trip() {
        let mut stats = TagStats::new();
        stats.add(AllocTag::Buffer, 1024);
        assert_eq!(stats.get(AllocTag::Buffer), 1024);
        stats.sub(AllocTag::Buffer, 1024);
        assert_eq!(stats.get(AllocTag::Buffer), 0);
    }

    #[test]
    fn sub_saturates_at_zero() {
        let mut stats = TagStats::new();
        stats.sub(AllocTag::Struct, 10);
        assert_eq!(stats.get(AllocTag::Struct), 0);
    }

    #[test]
    fn format_statistics_picks_unit_by_magnitude() {
        let mut stats = TagStats::new();
        stats.add(AllocTag::Array, 1023);
        stats.add(AllocTag::String, 1024);
        let text = stats.format_statistics();
        assert!(text.contains("ARRAY: 1023 Bytes"));
        assert!(text.contains("STRING: 1.00 KB"));
    }
}
