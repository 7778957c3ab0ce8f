//! Composite Pass
//!
//! Applies a full-screen effect to a live target in two ordered draws:
//!
//! 1. `source -> scratch` with the effect material at a chosen sub-pass
//! 2. `scratch -> destination`, either a plain copy or a second effect
//!    sub-pass (ping-pong, e.g. a separable blur)
//!
//! A texture cannot be sampled and rendered to by the same draw, so the
//! scratch target must differ from both ends. Auxiliary buffers are published
//! as named global textures before the draws so the effect shader can sample
//! them alongside the source.

use crate::backend::RenderBackend;
use crate::command::CommandBuffer;
use crate::error::{PassError, Result};
use crate::resource::{MaterialHandle, TextureHandle};
use crate::target::ManagedTarget;

/// Effect material and the sub-pass used for the first draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectMaterial {
    pub material: MaterialHandle,
    pub pass: u32,
}

impl EffectMaterial {
    pub fn new(material: MaterialHandle, pass: u32) -> Self {
        Self { material, pass }
    }
}

/// How the second draw writes scratch back to the destination
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolve {
    /// Pass-through copy
    Copy,
    /// Effect material again, at this sub-pass
    Effect(u32),
}

/// A texture published under a global name for the effect shader
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuxiliaryTexture<'a> {
    pub name: &'a str,
    pub texture: TextureHandle,
}

impl<'a> From<&'a ManagedTarget> for AuxiliaryTexture<'a> {
    fn from(target: &'a ManagedTarget) -> Self {
        Self {
            name: target.name(),
            texture: target.handle(),
        }
    }
}

/// Result of a composite call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeOutcome {
    /// Both draws were recorded
    Drawn,
    /// A handle was unbound this frame; nothing was drawn
    Skipped,
}

/// Two-draw full-screen compositor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositePass {
    effect: EffectMaterial,
    resolve: Resolve,
}

impl CompositePass {
    /// Effect into scratch, then copy back
    pub fn new(effect: EffectMaterial) -> Self {
        Self {
            effect,
            resolve: Resolve::Copy,
        }
    }

    /// Effect sub-pass `first` into scratch, then sub-pass `second` back
    pub fn ping_pong(material: MaterialHandle, first: u32, second: u32) -> Self {
        Self {
            effect: EffectMaterial::new(material, first),
            resolve: Resolve::Effect(second),
        }
    }

    pub fn effect(&self) -> EffectMaterial {
        self.effect
    }

    pub fn resolve(&self) -> Resolve {
        self.resolve
    }

    /// Record the composite into `cmd`.
    ///
    /// Auxiliary textures are always published. The two draws are recorded
    /// only if `source` and `scratch` are both bound; otherwise the frame is
    /// a no-op and [`CompositeOutcome::Skipped`] is returned.
    pub fn composite(
        &self,
        cmd: &mut CommandBuffer,
        backend: &dyn RenderBackend,
        source: TextureHandle,
        scratch: TextureHandle,
        destination: TextureHandle,
        auxiliary: &[AuxiliaryTexture<'_>],
    ) -> Result<CompositeOutcome> {
        if scratch == source || scratch == destination {
            return Err(PassError::AliasedTarget(scratch));
        }

        for aux in auxiliary {
            cmd.set_global_texture(aux.name, aux.texture);
        }

        if !backend.is_texture_bound(source) || !backend.is_texture_bound(scratch) {
            log::trace!("composite skipped: source {:?} or scratch {:?} unbound", source, scratch);
            return Ok(CompositeOutcome::Skipped);
        }

        cmd.blit(source, scratch, Some(self.effect.material), self.effect.pass);
        match self.resolve {
            Resolve::Copy => cmd.blit(scratch, destination, None, 0),
            Resolve::Effect(pass) => cmd.blit(scratch, destination, Some(self.effect.material), pass),
        }
        Ok(CompositeOutcome::Drawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RenderBackend;
    use crate::command::Command;
    use crate::headless::HeadlessBackend;
    use crate::resource::{ShaderRef, TargetDescriptor};

    struct Fixture {
        backend: HeadlessBackend,
        camera: TextureHandle,
        scratch: TextureHandle,
        aux: Vec<TextureHandle>,
        material: MaterialHandle,
    }

    fn fixture(aux_count: usize) -> Fixture {
        let mut backend = HeadlessBackend::with_shaders(["fx"]);
        let desc = TargetDescriptor::new(320, 240);
        let camera = backend.create_camera_target("camera", &desc).unwrap();
        let scratch = backend.allocate_texture("_TemporaryColor", &desc).unwrap();
        let aux = (0..aux_count)
            .map(|i| backend.allocate_texture(&format!("_Aux{}", i), &desc).unwrap())
            .collect();
        let material = backend.create_material(&ShaderRef::new("fx")).unwrap();
        Fixture {
            backend,
            camera,
            scratch,
            aux,
            material,
        }
    }

    fn aux_refs<'a>(names: &'a [String], handles: &[TextureHandle]) -> Vec<AuxiliaryTexture<'a>> {
        names
            .iter()
            .zip(handles)
            .map(|(name, &texture)| AuxiliaryTexture {
                name: name.as_str(),
                texture,
            })
            .collect()
    }

    #[test]
    fn test_two_draws_for_any_aux_count() {
        for n in 0..4 {
            let f = fixture(n);
            let names: Vec<String> = (0..n).map(|i| format!("_Aux{}", i)).collect();
            let aux = aux_refs(&names, &f.aux);
            let mut cmd = CommandBuffer::new("test");

            let outcome = CompositePass::new(EffectMaterial::new(f.material, 0))
                .composite(&mut cmd, &f.backend, f.camera, f.scratch, f.camera, &aux)
                .unwrap();

            assert_eq!(outcome, CompositeOutcome::Drawn);
            assert_eq!(cmd.blit_count(), 2, "aux count {}", n);
        }
    }

    #[test]
    fn test_zero_draws_when_source_unbound() {
        for n in 0..4 {
            let mut f = fixture(n);
            f.backend.unbind(f.camera);
            let names: Vec<String> = (0..n).map(|i| format!("_Aux{}", i)).collect();
            let aux = aux_refs(&names, &f.aux);
            let mut cmd = CommandBuffer::new("test");

            let outcome = CompositePass::new(EffectMaterial::new(f.material, 0))
                .composite(&mut cmd, &f.backend, f.camera, f.scratch, f.camera, &aux)
                .unwrap();

            assert_eq!(outcome, CompositeOutcome::Skipped);
            assert_eq!(cmd.blit_count(), 0);
        }
    }

    #[test]
    fn test_zero_draws_when_scratch_unbound() {
        let mut f = fixture(1);
        f.backend.unbind(f.scratch);
        let mut cmd = CommandBuffer::new("test");

        let outcome = CompositePass::new(EffectMaterial::new(f.material, 0))
            .composite(&mut cmd, &f.backend, f.camera, f.scratch, f.camera, &[])
            .unwrap();

        assert_eq!(outcome, CompositeOutcome::Skipped);
        assert_eq!(cmd.blit_count(), 0);
    }

    #[test]
    fn test_copy_resolve_order() {
        let f = fixture(0);
        let mut cmd = CommandBuffer::new("test");
        CompositePass::new(EffectMaterial::new(f.material, 0))
            .composite(&mut cmd, &f.backend, f.camera, f.scratch, f.camera, &[])
            .unwrap();

        assert_eq!(
            cmd.commands(),
            &[
                Command::Blit {
                    source: f.camera,
                    destination: f.scratch,
                    material: Some(f.material),
                    pass: 0,
                },
                Command::Blit {
                    source: f.scratch,
                    destination: f.camera,
                    material: None,
                    pass: 0,
                },
            ]
        );
    }

    #[test]
    fn test_ping_pong_uses_both_sub_passes() {
        let f = fixture(0);
        let mut cmd = CommandBuffer::new("test");
        CompositePass::ping_pong(f.material, 0, 1)
            .composite(&mut cmd, &f.backend, f.camera, f.scratch, f.camera, &[])
            .unwrap();

        match (&cmd.commands()[0], &cmd.commands()[1]) {
            (
                Command::Blit { pass: 0, destination, .. },
                Command::Blit { pass: 1, source, material, .. },
            ) => {
                assert_eq!(*destination, f.scratch);
                assert_eq!(*source, f.scratch);
                assert_eq!(*material, Some(f.material));
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn test_globals_published_before_draws_even_when_skipped() {
        let mut f = fixture(1);
        let names = vec!["_FilterTexture".to_string()];
        let aux = aux_refs(&names, &f.aux);

        let mut cmd = CommandBuffer::new("drawn");
        CompositePass::new(EffectMaterial::new(f.material, 0))
            .composite(&mut cmd, &f.backend, f.camera, f.scratch, f.camera, &aux)
            .unwrap();
        assert!(matches!(cmd.commands()[0], Command::SetGlobalTexture { .. }));

        f.backend.unbind(f.camera);
        let mut cmd = CommandBuffer::new("skipped");
        CompositePass::new(EffectMaterial::new(f.material, 0))
            .composite(&mut cmd, &f.backend, f.camera, f.scratch, f.camera, &aux)
            .unwrap();
        assert_eq!(cmd.len(), 1);
    }

    #[test]
    fn test_scratch_aliasing_rejected() {
        let f = fixture(0);
        let mut cmd = CommandBuffer::new("test");
        let err = CompositePass::new(EffectMaterial::new(f.material, 0))
            .composite(&mut cmd, &f.backend, f.camera, f.camera, f.camera, &[])
            .unwrap_err();
        assert_eq!(err, PassError::AliasedTarget(f.camera));
        assert!(cmd.is_empty());
    }
}
