//! Backend abstraction for the host renderer
//!
//! Everything a pass needs from the engine goes through [`RenderBackend`]:
//! texture allocation, material instances and their uniforms, shader lookup,
//! scene collection and command submission. Passes hold only handles.

use crate::command::CommandBuffer;
use crate::error::Result;
use crate::filter::{CullResults, DrawList, DrawingSettings, FilteringSettings};
use crate::property::PropertyId;
use crate::resource::{Color, MaterialHandle, ShaderRef, TargetDescriptor, TextureHandle};

/// How the host destroys an engine object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DestroyMode {
    /// Destroy now (edit mode, no frame in flight to protect)
    Immediate,
    /// Destroy at the end of the current frame (play mode)
    Deferred,
}

/// Services the host engine provides to passes
pub trait RenderBackend {
    /// Allocate a texture for `desc`, labelled `name`.
    ///
    /// Fails with [`PassError::AllocationFailed`](crate::PassError::AllocationFailed)
    /// for degenerate descriptors.
    fn allocate_texture(&mut self, name: &str, desc: &TargetDescriptor) -> Result<TextureHandle>;

    /// Free a texture. Unknown handles are ignored.
    fn release_texture(&mut self, texture: TextureHandle);

    /// Whether the handle currently has a GPU texture behind it
    fn is_texture_bound(&self, texture: TextureHandle) -> bool;

    /// Look up a shader by name
    fn find_shader(&self, name: &str) -> Option<ShaderRef>;

    /// Instantiate a material for `shader`
    fn create_material(&mut self, shader: &ShaderRef) -> Result<MaterialHandle>;

    /// Destroy a material instance
    fn destroy_material(&mut self, material: MaterialHandle, mode: DestroyMode);

    /// Set a float uniform on a material
    fn set_float(&mut self, material: MaterialHandle, property: PropertyId, value: f32);

    /// Set a color uniform on a material
    fn set_color(&mut self, material: MaterialHandle, property: PropertyId, value: Color);

    /// Collect visible renderers matching the settings, in the order
    /// `drawing.sorting` asks for
    fn create_renderer_list(
        &mut self,
        cull: &CullResults,
        drawing: &DrawingSettings,
        filtering: &FilteringSettings,
    ) -> DrawList;

    /// Submit recorded commands for execution
    fn execute_command_buffer(&mut self, cmd: &CommandBuffer);
}
