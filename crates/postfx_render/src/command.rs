//! Command Buffer
//!
//! Passes record GPU work as plain data; the host backend replays a submitted
//! buffer in order. Recording never touches the GPU, so a pass can build a
//! buffer and still decide not to submit it.

use crate::filter::DrawList;
use crate::property::PropertyId;
use crate::resource::{ClearFlag, Color, MaterialHandle, TextureHandle};

/// A single recorded GPU command
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Open a named profiling scope
    BeginSample(String),

    /// Close a named profiling scope
    EndSample(String),

    /// Bind color (and optionally depth) attachments and clear them
    SetRenderTarget {
        color: TextureHandle,
        depth: Option<TextureHandle>,
        clear: ClearFlag,
        clear_color: Color,
    },

    /// Draw a filtered list of scene renderers
    DrawRendererList(DrawList),

    /// Publish a texture under a shader-visible global name
    SetGlobalTexture {
        property: PropertyId,
        name: String,
        texture: TextureHandle,
    },

    /// Full-screen draw from `source` into `destination`.
    ///
    /// With no material the blit is a plain copy.
    Blit {
        source: TextureHandle,
        destination: TextureHandle,
        material: Option<MaterialHandle>,
        pass: u32,
    },
}

/// Attachments a pass binds before drawing, chosen during setup
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetBinding {
    pub color: TextureHandle,
    pub depth: Option<TextureHandle>,
    pub clear: ClearFlag,
    pub clear_color: Color,
}

impl TargetBinding {
    /// Bind `color` alone, cleared to `clear_color`
    pub fn cleared(color: TextureHandle, clear_color: Color) -> Self {
        Self {
            color,
            depth: None,
            clear: ClearFlag::Color,
            clear_color,
        }
    }

    /// Also bind a depth attachment
    pub fn with_depth(mut self, depth: TextureHandle) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// An ordered list of commands for one submission
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandBuffer {
    name: String,
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create an empty buffer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a command
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Record `body` inside a named profiling scope
    pub fn profiling_scope<R>(&mut self, name: &str, body: impl FnOnce(&mut Self) -> R) -> R {
        self.push(Command::BeginSample(name.to_string()));
        let result = body(self);
        self.push(Command::EndSample(name.to_string()));
        result
    }

    pub fn set_render_target(
        &mut self,
        color: TextureHandle,
        depth: Option<TextureHandle>,
        clear: ClearFlag,
        clear_color: Color,
    ) {
        self.push(Command::SetRenderTarget {
            color,
            depth,
            clear,
            clear_color,
        });
    }

    pub fn bind(&mut self, binding: &TargetBinding) {
        self.set_render_target(binding.color, binding.depth, binding.clear, binding.clear_color);
    }

    pub fn draw_renderer_list(&mut self, list: DrawList) {
        self.push(Command::DrawRendererList(list));
    }

    pub fn set_global_texture(&mut self, name: &str, texture: TextureHandle) {
        self.push(Command::SetGlobalTexture {
            property: PropertyId::of(name),
            name: name.to_string(),
            texture,
        });
    }

    pub fn blit(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
        material: Option<MaterialHandle>,
        pass: u32,
    ) {
        self.push(Command::Blit {
            source,
            destination,
            material,
            pass,
        });
    }

    /// Recorded commands in order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of full-screen draws recorded
    pub fn blit_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Blit { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Drop all recorded commands, keeping the name
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Take the recorded commands, leaving the buffer empty
    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;

    #[test]
    fn test_profiling_scope_wraps_body() {
        let mut cmd = CommandBuffer::new("test");
        let src = TextureHandle(Id::new(1, 0));
        let dst = TextureHandle(Id::new(2, 0));

        cmd.profiling_scope("BlurRenderPass", |cmd| cmd.blit(src, dst, None, 0));

        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd.commands()[0], Command::BeginSample("BlurRenderPass".into()));
        assert_eq!(cmd.commands()[2], Command::EndSample("BlurRenderPass".into()));
        assert_eq!(cmd.blit_count(), 1);
    }

    #[test]
    fn test_global_texture_resolves_property() {
        let mut cmd = CommandBuffer::new("test");
        cmd.set_global_texture("_FilterTexture", TextureHandle(Id::new(3, 0)));

        match &cmd.commands()[0] {
            Command::SetGlobalTexture { property, name, .. } => {
                assert_eq!(*property, PropertyId::of("_FilterTexture"));
                assert_eq!(name, "_FilterTexture");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bind_records_render_target() {
        let mut cmd = CommandBuffer::new("test");
        let color = TextureHandle(Id::new(4, 0));
        let depth = TextureHandle(Id::new(5, 0));
        let binding = TargetBinding::cleared(color, Color::TRANSPARENT).with_depth(depth);

        cmd.bind(&binding);

        assert_eq!(
            cmd.commands()[0],
            Command::SetRenderTarget {
                color,
                depth: Some(depth),
                clear: ClearFlag::Color,
                clear_color: Color::TRANSPARENT,
            }
        );
    }

    #[test]
    fn test_take_empties_buffer() {
        let mut cmd = CommandBuffer::new("test");
        cmd.push(Command::BeginSample("a".into()));
        let taken = cmd.take();
        assert_eq!(taken.len(), 1);
        assert!(cmd.is_empty());
        assert_eq!(cmd.name(), "test");
    }
}
