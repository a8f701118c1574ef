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

//! Error types

use std::fmt;

/// Arena/ECS error type
#[derive(Debug, Clone)]
pub enum EcsError {
    /// Null/missing world, invalid entity id, invalid component id, invalid
    /// type list, or any other caller-supplied argument that fails validation.
    InvalidArgument(String),

    /// `register_component` called with a name that is already registered.
    AlreadyRegistered(String),

    /// `register_component_once` called with a name whose stored
    /// size/align disagree with the caller's.
    LayoutMismatch {
        name: String,
        expected_size: usize,
        expected_align: usize,
        got_size: usize,
        got_align: usize,
    },

    /// More than 256 component types, or a directory/archetype-list/free-stack
    /// growth that cannot proceed.
    CapacityExhausted(String),

    /// OS reservation/commit failure, or hash table insertion failure.
    AllocationFailed(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            EcsError::AlreadyRegistered(name) => {
                write!(f, "component '{name}' is already registered")
            }
            EcsError::LayoutMismatch {
                name,
                expected_size,
                expected_align,
                got_size,
                got_align,
            } => write!(
                f,
                "component '{name}' layout mismatch: registered as (size={expected_size}, align={expected_align}), requested (size={got_size}, align={got_align})"
            ),
            EcsError::CapacityExhausted(msg) => write!(f, "capacity exhausted: {msg}"),
            EcsError::AllocationFailed(msg) => write!(f, "allocation failed: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
