//! Frame Target Allocator
//!
//! Keeps one backing texture per logical target name and reallocates it only
//! when the requested descriptor differs, by value, from the one it was
//! allocated with. Requesting an unchanged descriptor every frame costs a map
//! lookup and nothing else.

use std::collections::BTreeMap;

use crate::backend::RenderBackend;
use crate::error::{PassError, Result};
use crate::property::PropertyId;
use crate::resource::{TargetDescriptor, TextureHandle};

/// A named render target owned by one pass.
///
/// The name doubles as the shader-visible global binding name.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagedTarget {
    name: String,
    property: PropertyId,
    descriptor: TargetDescriptor,
    handle: TextureHandle,
}

impl ManagedTarget {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global binding id for this target's name
    pub fn property(&self) -> PropertyId {
        self.property
    }

    pub fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }
}

/// Allocation counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// First-time allocations
    pub allocations: u64,
    /// Free + allocate because the descriptor changed
    pub reallocations: u64,
    /// Targets released
    pub releases: u64,
    /// Degenerate requests refused
    pub skipped: u64,
}

/// Per-name texture allocator
#[derive(Debug, Default)]
pub struct FrameTargetAllocator {
    targets: BTreeMap<String, ManagedTarget>,
    stats: AllocatorStats,
}

impl FrameTargetAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a texture for `name` matching `desc`.
    ///
    /// Allocates on first use and frees + reallocates when `desc` differs
    /// from the stored descriptor. A degenerate descriptor (zero width or
    /// height) is refused with [`PassError::AllocationFailed`] and leaves any
    /// existing allocation untouched.
    pub fn ensure(
        &mut self,
        backend: &mut dyn RenderBackend,
        name: &str,
        desc: &TargetDescriptor,
    ) -> Result<TextureHandle> {
        if desc.is_degenerate() {
            self.stats.skipped += 1;
            log::debug!(
                "skipping allocation of '{}' for degenerate size {}x{}",
                name,
                desc.width,
                desc.height
            );
            return Err(PassError::AllocationFailed {
                name: name.to_string(),
                width: desc.width,
                height: desc.height,
            });
        }

        if let Some(target) = self.targets.get(name) {
            if target.descriptor == *desc {
                return Ok(target.handle);
            }
        }

        match self.targets.remove(name) {
            Some(old) => {
                backend.release_texture(old.handle);
                let handle = backend.allocate_texture(name, desc)?;
                log::debug!(
                    "reallocated '{}': {}x{} -> {}x{}",
                    name,
                    old.descriptor.width,
                    old.descriptor.height,
                    desc.width,
                    desc.height
                );
                self.stats.reallocations += 1;
                self.insert(name, *desc, handle);
                Ok(handle)
            }
            None => {
                let handle = backend.allocate_texture(name, desc)?;
                log::debug!("allocated '{}' at {}x{}", name, desc.width, desc.height);
                self.stats.allocations += 1;
                self.insert(name, *desc, handle);
                Ok(handle)
            }
        }
    }

    fn insert(&mut self, name: &str, descriptor: TargetDescriptor, handle: TextureHandle) {
        self.targets.insert(
            name.to_string(),
            ManagedTarget {
                name: name.to_string(),
                property: PropertyId::of(name),
                descriptor,
                handle,
            },
        );
    }

    /// Look up a target by name
    pub fn get(&self, name: &str) -> Option<&ManagedTarget> {
        self.targets.get(name)
    }

    /// Current handle for `name`, if allocated
    pub fn handle(&self, name: &str) -> Option<TextureHandle> {
        self.targets.get(name).map(|t| t.handle)
    }

    /// Release one target. Returns whether it existed.
    pub fn release(&mut self, backend: &mut dyn RenderBackend, name: &str) -> bool {
        match self.targets.remove(name) {
            Some(target) => {
                backend.release_texture(target.handle);
                self.stats.releases += 1;
                true
            }
            None => false,
        }
    }

    /// Release every target. Safe to call repeatedly.
    pub fn release_all(&mut self, backend: &mut dyn RenderBackend) {
        for (_, target) in std::mem::take(&mut self.targets) {
            backend.release_texture(target.handle);
            self.stats.releases += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedTarget> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }
}
