//! Separable blur
//!
//! Blurs the whole camera image after the skybox: horizontal sub-pass into
//! `_BlurTexture`, vertical sub-pass back into the camera target. Only game
//! cameras are blurred.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use postfx_render::{
    share, CameraData, CameraType, CommandBuffer, CompositePass, ExecutionContext, FrameExecute,
    FrameSetup, MaterialHandle, PassConfigData, PassError, PassLifecycle, PassQueue,
    PassResourceOwner, PassSlot, PassStage, PassState, PropertyTable, RenderBackend, RenderPass,
    RendererFeature, Result, ShaderRef, TargetDescriptor, TextureHandle,
};

/// Largest blur offset the shader supports
pub const MAX_BLUR: f32 = 0.4;

const HORIZONTAL_BLUR: &str = "_HorizontalBlur";
const VERTICAL_BLUR: &str = "_VerticalBlur";
const BLUR_TEXTURE: &str = "_BlurTexture";
const PROFILING_NAME: &str = "BlurRenderPass";

lazy_static! {
    static ref BLUR_PROPERTIES: PropertyTable = PropertyTable::new(&[HORIZONTAL_BLUR, VERTICAL_BLUR]);
}

/// Blur configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    /// Horizontal offset, `0..=0.4`
    pub horizontal_blur: f32,
    /// Vertical offset, `0..=0.4`
    pub vertical_blur: f32,
    /// Two-pass blur shader; the feature stays inactive without one
    pub shader: Option<ShaderRef>,
}

impl BlurSettings {
    pub fn new(horizontal_blur: f32, vertical_blur: f32) -> Self {
        Self {
            horizontal_blur,
            vertical_blur,
            shader: None,
        }
        .clamped()
    }

    pub fn with_shader(mut self, shader: impl Into<String>) -> Self {
        self.shader = Some(ShaderRef::new(shader));
        self
    }

    /// Offsets clamped to the supported range
    pub fn clamped(mut self) -> Self {
        self.horizontal_blur = clamp_blur(self.horizontal_blur);
        self.vertical_blur = clamp_blur(self.vertical_blur);
        self
    }
}

fn clamp_blur(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_BLUR)
    }
}

/// Per-frame blur pass
pub struct BlurPass {
    settings: Arc<RwLock<BlurSettings>>,
    owner: PassResourceOwner,
    material: MaterialHandle,
    composite: CompositePass,
    /// Own format and depth; only the size follows the camera
    descriptor: TargetDescriptor,
    lifecycle: PassLifecycle,
}

impl BlurPass {
    pub fn new(owner: PassResourceOwner, material: MaterialHandle, settings: Arc<RwLock<BlurSettings>>) -> Self {
        Self {
            settings,
            owner,
            material,
            composite: CompositePass::ping_pong(material, 0, 1),
            descriptor: TargetDescriptor::default(),
            lifecycle: PassLifecycle::new(),
        }
    }

    fn push_uniforms(&self, backend: &mut dyn RenderBackend, settings: &BlurSettings) {
        backend.set_float(self.material, BLUR_PROPERTIES.id(HORIZONTAL_BLUR), settings.horizontal_blur);
        backend.set_float(self.material, BLUR_PROPERTIES.id(VERTICAL_BLUR), settings.vertical_blur);
    }
}

impl RenderPass for BlurPass {
    fn name(&self) -> &str {
        PROFILING_NAME
    }

    fn stage(&self) -> PassStage {
        PassStage::AfterRenderingSkybox
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn setup(&mut self, backend: &mut dyn RenderBackend, frame: &FrameSetup) -> Result<()> {
        if self.lifecycle.is_disposed() {
            return Err(PassError::Disposed(PROFILING_NAME.into()));
        }
        self.descriptor = self.descriptor.with_size_of(&frame.descriptor);
        self.owner.targets_mut().ensure(backend, BLUR_TEXTURE, &self.descriptor)?;
        self.lifecycle.configure(PROFILING_NAME)
    }

    fn execute(&mut self, backend: &mut dyn RenderBackend, frame: &FrameExecute<'_>) -> Result<()> {
        if !self.lifecycle.begin_execute(PROFILING_NAME)? {
            return Ok(());
        }
        let settings = self.settings.read().clone().clamped();
        self.push_uniforms(backend, &settings);

        let scratch = self
            .owner
            .targets()
            .handle(BLUR_TEXTURE)
            .ok_or(PassError::InvalidHandle(TextureHandle::NONE))?;

        let mut cmd = CommandBuffer::new(PROFILING_NAME);
        cmd.profiling_scope(PROFILING_NAME, |cmd| {
            self.composite
                .composite(cmd, &*backend, frame.color_target, scratch, frame.color_target, &[])
        })?;
        backend.execute_command_buffer(&cmd);
        Ok(())
    }

    fn dispose(&mut self, backend: &mut dyn RenderBackend) {
        self.owner.release_all(backend);
        self.lifecycle.dispose();
    }
}

/// Blur feature: owns the material and the pass
pub struct BlurFeature {
    name: String,
    enabled: bool,
    settings: Arc<RwLock<BlurSettings>>,
    slot: PassSlot,
}

impl BlurFeature {
    pub fn new(name: impl Into<String>, settings: BlurSettings) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            settings: Arc::new(RwLock::new(settings.clamped())),
            slot: PassSlot::new(),
        }
    }

    /// Settings shared with the pass; edits apply from the next frame
    pub fn settings(&self) -> Arc<RwLock<BlurSettings>> {
        self.settings.clone()
    }

    pub fn pass_state(&self) -> Option<PassState> {
        self.slot.state()
    }
}

impl RendererFeature for BlurFeature {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&mut self, backend: &mut dyn RenderBackend, context: ExecutionContext) -> Result<()> {
        self.slot.dispose(backend);

        let shader = self
            .settings
            .read()
            .shader
            .clone()
            .ok_or_else(|| PassError::MissingResource(format!("'{}' has no blur shader", self.name)))?;

        let mut owner = PassResourceOwner::new(context);
        let material = owner.acquire_all(backend, |owner, backend| owner.acquire(backend, &shader))?;
        let pass = BlurPass::new(owner, material, self.settings.clone());
        self.slot.install(backend, share(pass));
        Ok(())
    }

    fn add_render_passes(&self, queue: &mut PassQueue, camera: &CameraData) {
        if camera.camera_type == CameraType::Game {
            self.slot.enqueue(queue);
        }
    }

    fn dispose(&mut self, backend: &mut dyn RenderBackend) {
        self.slot.dispose(backend);
    }

    fn is_active(&self) -> bool {
        self.slot.is_installed()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn get_config(&self) -> Option<PassConfigData> {
        Some(PassConfigData {
            name: self.name.clone(),
            enabled: self.enabled,
            stage: PassStage::AfterRenderingSkybox,
            config: serde_json::to_value(&*self.settings.read()).ok()?,
        })
    }

    /// The blur always runs after the skybox; any other stage is rejected.
    fn apply_config(&mut self, config: &PassConfigData) -> Result<()> {
        if config.stage != PassStage::AfterRenderingSkybox {
            return Err(PassError::InvalidConfig {
                name: self.name.clone(),
                reason: format!("blur runs at {:?}, not {:?}", PassStage::AfterRenderingSkybox, config.stage),
            });
        }
        let settings: BlurSettings =
            serde_json::from_value(config.config.clone()).map_err(|e| PassError::InvalidConfig {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        *self.settings.write() = settings.clamped();
        self.enabled = config.enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postfx_render::{Command, CullResults, HeadlessBackend, SortingCriteria, UniformValue};

    const SHADER: &str = "Hidden/Blur";

    fn camera(backend: &mut HeadlessBackend, width: u32, height: u32, camera_type: CameraType) -> CameraData {
        let descriptor = TargetDescriptor::new(width, height);
        CameraData {
            camera_type,
            descriptor,
            color_target: backend.create_camera_target("camera", &descriptor).unwrap(),
            depth_target: backend.create_camera_target("depth", &descriptor).unwrap(),
            opaque_sorting: SortingCriteria::CommonOpaque,
        }
    }

    #[test]
    fn test_settings_are_clamped() {
        let s = BlurSettings::new(1.0, -0.5);
        assert_eq!(s.horizontal_blur, MAX_BLUR);
        assert_eq!(s.vertical_blur, 0.0);
        assert_eq!(BlurSettings::new(f32::NAN, 0.1).horizontal_blur, 0.0);
    }

    #[test]
    fn test_create_without_shader_stays_inactive() {
        let mut backend = HeadlessBackend::with_shaders([SHADER]);
        let mut feature = BlurFeature::new("Blur", BlurSettings::new(0.2, 0.1));

        let err = feature.create(&mut backend, ExecutionContext::Play).unwrap_err();
        assert!(matches!(err, PassError::MissingResource(_)));
        assert!(!feature.is_active());

        feature.dispose(&mut backend);
        feature.dispose(&mut backend);
        assert_eq!(backend.stats().materials_destroyed, 0);
    }

    #[test]
    fn test_blur_frame() {
        let mut backend = HeadlessBackend::with_shaders([SHADER]);
        let mut feature = BlurFeature::new("Blur", BlurSettings::new(0.2, 0.1).with_shader(SHADER));
        feature.create(&mut backend, ExecutionContext::Play).unwrap();

        let cam = camera(&mut backend, 640, 360, CameraType::Game);
        let mut queue = PassQueue::new();
        feature.add_render_passes(&mut queue, &cam);
        let passes = queue.into_sorted();
        assert_eq!(passes.len(), 1);

        let cull = CullResults::default();
        let mut pass = passes[0].lock();
        pass.setup(&mut backend, &FrameSetup::for_camera(0, &cam)).unwrap();
        pass.execute(&mut backend, &FrameExecute::for_camera(0, &cam, &cull)).unwrap();

        let material = backend.submitted_commands().find_map(|c| match c {
            Command::Blit { material, .. } => *material,
            _ => None,
        });
        let material = material.unwrap();
        assert_eq!(backend.uniform(material, HORIZONTAL_BLUR), Some(UniformValue::Float(0.2)));
        assert_eq!(backend.uniform(material, VERTICAL_BLUR), Some(UniformValue::Float(0.1)));

        let blits: Vec<_> = backend
            .submitted_commands()
            .filter_map(|c| match c {
                Command::Blit {
                    source,
                    destination,
                    pass,
                    ..
                } => Some((*source, *destination, *pass)),
                _ => None,
            })
            .collect();
        assert_eq!(blits.len(), 2);
        assert_eq!(blits[0].0, cam.color_target);
        assert_eq!(blits[0].2, 0);
        assert_eq!(blits[1].1, cam.color_target);
        assert_eq!(blits[1].2, 1);
        assert_eq!(blits[0].1, blits[1].0);
        assert_eq!(backend.submitted()[0].name(), "BlurRenderPass");
    }

    #[test]
    fn test_only_game_cameras() {
        let mut backend = HeadlessBackend::with_shaders([SHADER]);
        let mut feature = BlurFeature::new("Blur", BlurSettings::new(0.1, 0.1).with_shader(SHADER));
        feature.create(&mut backend, ExecutionContext::Play).unwrap();

        for camera_type in [CameraType::SceneView, CameraType::Preview, CameraType::Reflection] {
            let cam = camera(&mut backend, 64, 64, camera_type);
            let mut queue = PassQueue::new();
            feature.add_render_passes(&mut queue, &cam);
            assert!(queue.is_empty(), "{:?}", camera_type);
        }
    }

    #[test]
    fn test_blur_texture_tracks_camera_size_only() {
        let mut backend = HeadlessBackend::with_shaders([SHADER]);
        let mut feature = BlurFeature::new("Blur", BlurSettings::new(0.1, 0.1).with_shader(SHADER));
        feature.create(&mut backend, ExecutionContext::Play).unwrap();

        let mut cam = camera(&mut backend, 320, 200, CameraType::Game);
        cam.descriptor = cam.descriptor.with_format(postfx_render::TextureFormat::DefaultHdr);

        let mut queue = PassQueue::new();
        feature.add_render_passes(&mut queue, &cam);
        let pass = queue.into_sorted().remove(0);
        pass.lock().setup(&mut backend, &FrameSetup::for_camera(0, &cam)).unwrap();

        let (_, blur) = backend.find_texture(BLUR_TEXTURE).unwrap();
        assert_eq!(blur.descriptor.width, 320);
        assert_eq!(blur.descriptor.height, 200);
        assert_eq!(blur.descriptor.format, postfx_render::TextureFormat::Default);
        assert_eq!(blur.descriptor.depth_bits, postfx_render::DepthBits::None);
    }

    #[test]
    fn test_config_roundtrip_clamps() {
        let mut feature = BlurFeature::new("Blur", BlurSettings::new(0.1, 0.1));
        let mut config = feature.get_config().unwrap();
        assert_eq!(config.stage, PassStage::AfterRenderingSkybox);

        config.config = serde_json::json!({ "horizontal_blur": 3.0, "vertical_blur": 0.25 });
        feature.apply_config(&config).unwrap();

        let settings = feature.settings();
        let settings = settings.read();
        assert_eq!(settings.horizontal_blur, MAX_BLUR);
        assert_eq!(settings.vertical_blur, 0.25);
    }

    #[test]
    fn test_config_with_other_stage_is_rejected() {
        let mut feature = BlurFeature::new("Blur", BlurSettings::new(0.1, 0.1));
        let mut config = feature.get_config().unwrap();
        config.stage = PassStage::AfterRenderingOpaques;
        config.config = serde_json::json!({ "horizontal_blur": 0.3 });
        config.enabled = false;

        let err = feature.apply_config(&config).unwrap_err();
        assert!(matches!(err, PassError::InvalidConfig { .. }));
        assert_eq!(feature.settings().read().horizontal_blur, 0.1);
        assert!(feature.is_enabled());
    }

    #[test]
    fn test_dispose_in_edit_destroys_immediately() {
        let mut backend = HeadlessBackend::with_shaders([SHADER]);
        let mut feature = BlurFeature::new("Blur", BlurSettings::new(0.1, 0.1).with_shader(SHADER));
        feature.create(&mut backend, ExecutionContext::Edit).unwrap();
        let cam = camera(&mut backend, 32, 32, CameraType::Game);
        let mut queue = PassQueue::new();
        feature.add_render_passes(&mut queue, &cam);
        queue.into_sorted()[0]
            .lock()
            .setup(&mut backend, &FrameSetup::for_camera(0, &cam))
            .unwrap();

        feature.dispose(&mut backend);

        assert_eq!(feature.pass_state(), None);
        assert_eq!(backend.stats().immediate_destroys, 1);
        // Only the two camera attachments remain.
        assert_eq!(backend.live_textures(), 2);
    }
}
