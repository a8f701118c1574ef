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

//! Platform virtual-memory primitives: reserve an address range without
//! backing it with physical pages, commit pages on demand, release the whole
//! range on teardown. Mirrors the per-OS dispatch idiom used elsewhere in
//! this codebase for platform queries, but targets address-space reservation
//! instead of topology detection.

use std::ptr::NonNull;

/// Round `size` up to a multiple of the platform page size.
pub fn page_align(size: usize) -> usize {
    let page = page_size();
    (size + page - 1) & !(page - 1)
}

#[cfg(unix)]
pub fn page_size() -> usize {
    // SAFETY: sysconf with _SC_PAGESIZE never fails on a real POSIX target.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(windows)]
pub fn page_size() -> usize {
    use windows_sys::Win32::System::SystemInformation::GetSystemInfo;
    use windows_sys::Win32::System::SystemInformation::SYSTEM_INFO;
    unsafe {
        let mut info: SYSTEM_INFO = std::mem::zeroed();
        GetSystemInfo(&mut info);
        info.dwPageSize as usize
    }
}

#[cfg(not(any(unix, windows)))]
pub fn page_size() -> usize {
    4096
}

/// Reserve `size` bytes of address space without committing physical pages.
/// Returns `None` on OS failure.
#[cfg(unix)]
pub fn reserve(size: usize) -> Option<NonNull<u8>> {
    use libc::{mmap, MAP_ANON, MAP_PRIVATE, PROT_NONE};
    let ptr = unsafe {
        mmap(
            std::ptr::null_mut(),
            size,
            PROT_NONE,
            MAP_PRIVATE | MAP_ANON,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        None
    } else {
        NonNull::new(ptr as *mut u8)
    }
}

#[cfg(unix)]
pub fn commit(ptr: NonNull<u8>, size: usize) -> bool {
    use libc::{mprotect, PROT_READ, PROT_WRITE};
    let rc = unsafe { mprotect(ptr.as_ptr() as *mut _, size, PROT_READ | PROT_WRITE) };
    rc == 0
}

#[cfg(unix)]
pub fn release(ptr: NonNull<u8>, size: usize) {
    unsafe {
        libc::munmap(ptr.as_ptr() as *mut _, size);
    }
}

#[cfg(windows)]
pub fn reserve(size: usize) -> Option<NonNull<u8>> {
    use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_RESERVE, PAGE_NOACCESS};
    let ptr = unsafe { VirtualAlloc(std::ptr::null(), size, MEM_RESERVE, PAGE_NOACCESS) };
    NonNull::new(ptr as *mut u8)
}

#[cfg(windows)]
pub fn commit(ptr: NonNull<u8>, size: usize) -> bool {
    use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_COMMIT, PAGE_READWRITE};
    let ptr = unsafe { VirtualAlloc(ptr.as_ptr() as *const _, size, MEM_COMMIT, PAGE_READWRITE) };
    !ptr.is_null()
}

#[cfg(windows)]
pub fn release(ptr: NonNull<u8>, _size: usize) {
    use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};
    unsafe {
        VirtualFree(ptr.as_ptr() as *mut _, 0, MEM_RELEASE);
    }
}

// Fallback for targets without a virtual-memory API (wasm, miri): collapse
// reserve+commit into a single eager allocation via the global allocator.
#[cfg(not(any(unix, windows)))]
pub fn reserve(size: usize) -> Option<NonNull<u8>> {
    let layout = std::alloc::Layout::from_size_align(size.max(1), page_size()).ok()?;
    let ptr = unsafe { std::alloc::alloc(layout) };
    NonNull::new(ptr)
}

#[cfg(not(any(unix, windows)))]
pub fn commit(_ptr: NonNull<u8>, _size: usize) -> bool {
    // Already committed eagerly by `reserve` on this fallback path.
    true
}

#[cfg(not(any(unix, windows)))]
pub fn release(ptr: NonNull<u8>, size: usize) {
    if let Ok(layout) = std::alloc::Layout::from_size_align(size.max(1), page_size()) {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_commit_release_round_trip() {
        let size = page_align(1);
        let ptr = reserve(size).expect("reserve should succeed");
        assert!(commit(ptr, size));
        unsafe {
            // Touch every committed byte to prove the pages are writable.
            std::ptr::write_bytes(ptr.as_ptr(), 0xAB, size);
            assert_eq!(*ptr.as_ptr(), 0xAB);
        }
        release(ptr, size);
    }

    #[test]
    fn page_align_rounds_up() {
        let page = page_size();
        assert_eq!(page_align(1), page);
        assert_eq!(page_align(page), page);
        assert_eq!(page_align(page + 1), page * 2);
    }
}
