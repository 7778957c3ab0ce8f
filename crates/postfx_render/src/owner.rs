//! Pass Resource Owner
//!
//! Owns every material instance and managed target a feature creates and
//! releases them exactly once. How a material is destroyed depends on
//! whether the host is editing or running; that choice is made once, when
//! the owner is created, through [`ExecutionContext`].

use serde::{Deserialize, Serialize};

use crate::backend::{DestroyMode, RenderBackend};
use crate::error::{PassError, Result};
use crate::resource::{MaterialHandle, ShaderRef};
use crate::target::FrameTargetAllocator;

/// Whether the host is in an interactive edit session or a live run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionContext {
    /// Editor, not playing
    Edit,
    /// Player or editor play mode
    #[default]
    Play,
}

impl ExecutionContext {
    /// Destruction primitive for this context
    pub fn destroy_mode(self) -> DestroyMode {
        match self {
            Self::Edit => DestroyMode::Immediate,
            Self::Play => DestroyMode::Deferred,
        }
    }
}

/// Destroys materials with the primitive chosen for its context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceReleaser {
    mode: DestroyMode,
}

impl ResourceReleaser {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            mode: context.destroy_mode(),
        }
    }

    pub fn mode(&self) -> DestroyMode {
        self.mode
    }

    pub fn release(&self, backend: &mut dyn RenderBackend, material: MaterialHandle) {
        backend.destroy_material(material, self.mode);
    }
}

/// A material instance created for a feature
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedMaterial {
    pub handle: MaterialHandle,
    pub shader: ShaderRef,
}

/// Materials and render targets owned by one feature
#[derive(Debug)]
pub struct PassResourceOwner {
    releaser: ResourceReleaser,
    materials: Vec<OwnedMaterial>,
    targets: FrameTargetAllocator,
}

impl PassResourceOwner {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            releaser: ResourceReleaser::new(context),
            materials: Vec::new(),
            targets: FrameTargetAllocator::new(),
        }
    }

    /// Instantiate and take ownership of a material for `shader`
    pub fn acquire(&mut self, backend: &mut dyn RenderBackend, shader: &ShaderRef) -> Result<MaterialHandle> {
        let handle = backend.create_material(shader)?;
        log::debug!("acquired material {:?} for shader '{}'", handle, shader.name());
        self.materials.push(OwnedMaterial {
            handle,
            shader: shader.clone(),
        });
        Ok(handle)
    }

    /// Look up a shader by name and acquire a material for it
    pub fn acquire_named(&mut self, backend: &mut dyn RenderBackend, shader: &str) -> Result<MaterialHandle> {
        let shader = backend
            .find_shader(shader)
            .ok_or_else(|| PassError::MissingResource(format!("shader '{}' not found", shader)))?;
        self.acquire(backend, &shader)
    }

    /// Acquire a material if a shader is configured
    pub fn acquire_optional(
        &mut self,
        backend: &mut dyn RenderBackend,
        shader: Option<&ShaderRef>,
    ) -> Result<Option<MaterialHandle>> {
        shader.map(|s| self.acquire(backend, s)).transpose()
    }

    /// Run a group of acquisitions; if any fails, release everything this
    /// owner holds before returning the error.
    pub fn acquire_all<T>(
        &mut self,
        backend: &mut dyn RenderBackend,
        acquire: impl FnOnce(&mut Self, &mut dyn RenderBackend) -> Result<T>,
    ) -> Result<T> {
        match acquire(self, &mut *backend) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.release_all(backend);
                Err(e)
            }
        }
    }

    pub fn materials(&self) -> &[OwnedMaterial] {
        &self.materials
    }

    pub fn targets(&self) -> &FrameTargetAllocator {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut FrameTargetAllocator {
        &mut self.targets
    }

    /// Nothing is held
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty() && self.targets.is_empty()
    }

    /// Release every material and target.
    ///
    /// Each resource is released once; a second call, or a call on an owner
    /// that never acquired anything, does nothing.
    pub fn release_all(&mut self, backend: &mut dyn RenderBackend) {
        if self.is_empty() {
            return;
        }
        let count = self.materials.len();
        for material in self.materials.drain(..) {
            self.releaser.release(backend, material.handle);
        }
        self.targets.release_all(backend);
        log::debug!("released {} materials ({:?})", count, self.releaser.mode());
    }
}
