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

//! LIFO scratch scopes: a marker pairing an arena position with the tag that
//! should be debited when the scope closes.

/// A scope opened by `Allocator::scope_begin`. Must be closed by passing it
/// to `Allocator::scope_end`; there is no `Drop`-based auto-close because
/// spec requires the caller to name the tag to debit at close time, and
/// because forgetting to close a scope should be visible (a leaked arena
/// position), not silently patched over by a destructor running in the
/// wrong order during unwinding.
#[derive(Debug)]
pub struct Scope {
    pub(crate) saved_pos: usize,
}

impl Scope {
    pub fn saved_pos(&self) -> usize {
        self.saved_pos
    }
}
