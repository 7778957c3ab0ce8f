//! Headless backend
//!
//! A [`RenderBackend`] with no GPU behind it. It keeps the bookkeeping a real
//! host would (live textures, material instances and their uniforms) and
//! records every submitted command buffer, which makes it the backend of
//! choice for tests and offline tooling.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::backend::{DestroyMode, RenderBackend};
use crate::command::{Command, CommandBuffer};
use crate::error::{PassError, Result};
use crate::filter::{collect_visible, CullResults, DrawList, DrawingSettings, FilteringSettings};
use crate::id::{Id, IdGenerator};
use crate::property::PropertyId;
use crate::resource::{Color, MaterialHandle, ShaderRef, TargetDescriptor, TextureHandle};

/// A uniform value stored on a material
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Color(Color),
}

/// A live texture
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessTexture {
    pub name: String,
    pub descriptor: TargetDescriptor,
}

/// A live material instance
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeadlessMaterial {
    pub shader: String,
    pub uniforms: HashMap<PropertyId, UniformValue>,
}

/// Allocation and destruction counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub textures_allocated: u64,
    pub textures_released: u64,
    pub materials_created: u64,
    pub materials_destroyed: u64,
    pub immediate_destroys: u64,
    pub deferred_destroys: u64,
    pub buffers_submitted: u64,
}

/// Backend that records instead of rendering
pub struct HeadlessBackend {
    ids: IdGenerator,
    shaders: HashSet<String>,
    textures: BTreeMap<TextureHandle, HeadlessTexture>,
    unbound: HashSet<TextureHandle>,
    materials: BTreeMap<MaterialHandle, HeadlessMaterial>,
    submitted: Vec<CommandBuffer>,
    stats: HeadlessStats,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Create a backend with no shaders registered
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new(),
            shaders: HashSet::new(),
            textures: BTreeMap::new(),
            unbound: HashSet::new(),
            materials: BTreeMap::new(),
            submitted: Vec::new(),
            stats: HeadlessStats::default(),
        }
    }

    /// Create a backend that knows the given shaders
    pub fn with_shaders<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut backend = Self::new();
        for name in names {
            backend.register_shader(name);
        }
        backend
    }

    /// Make a shader findable by name
    pub fn register_shader(&mut self, name: &str) -> ShaderRef {
        self.shaders.insert(name.to_string());
        ShaderRef::new(name)
    }

    /// Allocate a texture standing in for a camera attachment
    pub fn create_camera_target(&mut self, name: &str, desc: &TargetDescriptor) -> Result<TextureHandle> {
        self.allocate_texture(name, desc)
    }

    /// Simulate the host dropping a texture binding for a frame
    pub fn unbind(&mut self, texture: TextureHandle) {
        self.unbound.insert(texture);
    }

    /// Restore a binding removed with [`unbind`](Self::unbind)
    pub fn rebind(&mut self, texture: TextureHandle) {
        self.unbound.remove(&texture);
    }

    /// Look up a live texture
    pub fn texture(&self, texture: TextureHandle) -> Option<&HeadlessTexture> {
        self.textures.get(&texture)
    }

    /// Find a live texture by the name it was allocated under
    pub fn find_texture(&self, name: &str) -> Option<(TextureHandle, &HeadlessTexture)> {
        self.textures
            .iter()
            .find(|(_, t)| t.name == name)
            .map(|(&handle, texture)| (handle, texture))
    }

    /// Number of live textures
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Look up a live material
    pub fn material(&self, material: MaterialHandle) -> Option<&HeadlessMaterial> {
        self.materials.get(&material)
    }

    /// Number of live materials
    pub fn live_materials(&self) -> usize {
        self.materials.len()
    }

    /// Read back a uniform by name
    pub fn uniform(&self, material: MaterialHandle, name: &str) -> Option<UniformValue> {
        self.materials
            .get(&material)
            .and_then(|m| m.uniforms.get(&PropertyId::of(name)).copied())
    }

    /// Every buffer submitted so far
    pub fn submitted(&self) -> &[CommandBuffer] {
        &self.submitted
    }

    /// Every command submitted so far, flattened in submission order
    pub fn submitted_commands(&self) -> impl Iterator<Item = &Command> {
        self.submitted.iter().flat_map(|b| b.commands().iter())
    }

    /// Forget submitted buffers (between frames in tests)
    pub fn clear_submitted(&mut self) {
        self.submitted.clear();
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    fn next_id(&self) -> Id {
        self.ids.next()
    }
}

impl RenderBackend for HeadlessBackend {
    fn allocate_texture(&mut self, name: &str, desc: &TargetDescriptor) -> Result<TextureHandle> {
        if desc.is_degenerate() {
            return Err(PassError::AllocationFailed {
                name: name.to_string(),
                width: desc.width,
                height: desc.height,
            });
        }

        let handle = TextureHandle(self.next_id());
        self.textures.insert(
            handle,
            HeadlessTexture {
                name: name.to_string(),
                descriptor: *desc,
            },
        );
        self.stats.textures_allocated += 1;
        Ok(handle)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.unbound.remove(&texture);
            self.stats.textures_released += 1;
        }
    }

    fn is_texture_bound(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture) && !self.unbound.contains(&texture)
    }

    fn find_shader(&self, name: &str) -> Option<ShaderRef> {
        self.shaders.get(name).map(|s| ShaderRef::new(s.clone()))
    }

    fn create_material(&mut self, shader: &ShaderRef) -> Result<MaterialHandle> {
        if !self.shaders.contains(shader.name()) {
            return Err(PassError::MissingResource(format!("shader '{}'", shader.name())));
        }

        let handle = MaterialHandle(self.next_id());
        self.materials.insert(
            handle,
            HeadlessMaterial {
                shader: shader.name().to_string(),
                uniforms: HashMap::new(),
            },
        );
        self.stats.materials_created += 1;
        Ok(handle)
    }

    fn destroy_material(&mut self, material: MaterialHandle, mode: DestroyMode) {
        if self.materials.remove(&material).is_none() {
            log::warn!("destroy of unknown material {:?}", material);
            return;
        }
        self.stats.materials_destroyed += 1;
        match mode {
            DestroyMode::Immediate => self.stats.immediate_destroys += 1,
            DestroyMode::Deferred => self.stats.deferred_destroys += 1,
        }
    }

    fn set_float(&mut self, material: MaterialHandle, property: PropertyId, value: f32) {
        if let Some(m) = self.materials.get_mut(&material) {
            m.uniforms.insert(property, UniformValue::Float(value));
        }
    }

    fn set_color(&mut self, material: MaterialHandle, property: PropertyId, value: Color) {
        if let Some(m) = self.materials.get_mut(&material) {
            m.uniforms.insert(property, UniformValue::Color(value));
        }
    }

    fn create_renderer_list(
        &mut self,
        cull: &CullResults,
        drawing: &DrawingSettings,
        filtering: &FilteringSettings,
    ) -> DrawList {
        collect_visible(cull, drawing, filtering)
    }

    fn execute_command_buffer(&mut self, cmd: &CommandBuffer) {
        if cmd.is_empty() {
            return;
        }
        self.stats.buffers_submitted += 1;
        self.submitted.push(cmd.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_allocation_fails() {
        let mut backend = HeadlessBackend::new();
        let err = backend
            .allocate_texture("_BlurTexture", &TargetDescriptor::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, PassError::AllocationFailed { width: 0, height: 0, .. }));
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn test_unbind_and_rebind() {
        let mut backend = HeadlessBackend::new();
        let tex = backend
            .create_camera_target("camera", &TargetDescriptor::new(64, 64))
            .unwrap();
        assert!(backend.is_texture_bound(tex));

        backend.unbind(tex);
        assert!(!backend.is_texture_bound(tex));

        backend.rebind(tex);
        assert!(backend.is_texture_bound(tex));
    }

    #[test]
    fn test_material_requires_known_shader() {
        let mut backend = HeadlessBackend::with_shaders(["Hidden/Blur"]);
        assert!(backend.create_material(&ShaderRef::new("Hidden/Blur")).is_ok());
        assert!(matches!(
            backend.create_material(&ShaderRef::new("Hidden/Missing")),
            Err(PassError::MissingResource(_))
        ));
    }

    #[test]
    fn test_uniform_readback() {
        let mut backend = HeadlessBackend::with_shaders(["Hidden/Blur"]);
        let mat = backend.create_material(&ShaderRef::new("Hidden/Blur")).unwrap();
        backend.set_float(mat, PropertyId::of("_HorizontalBlur"), 0.2);
        assert_eq!(backend.uniform(mat, "_HorizontalBlur"), Some(UniformValue::Float(0.2)));
        assert_eq!(backend.uniform(mat, "_VerticalBlur"), None);
    }

    #[test]
    fn test_destroy_counts_by_mode() {
        let mut backend = HeadlessBackend::with_shaders(["s"]);
        let a = backend.create_material(&ShaderRef::new("s")).unwrap();
        let b = backend.create_material(&ShaderRef::new("s")).unwrap();
        backend.destroy_material(a, DestroyMode::Immediate);
        backend.destroy_material(b, DestroyMode::Deferred);
        backend.destroy_material(b, DestroyMode::Deferred);

        let stats = backend.stats();
        assert_eq!(stats.materials_destroyed, 2);
        assert_eq!(stats.immediate_destroys, 1);
        assert_eq!(stats.deferred_destroys, 1);
        assert_eq!(backend.live_materials(), 0);
    }
}
