//! Selective desaturation
//!
//! Draws the selected objects into `_FilterTexture` (optionally with an
//! override material), publishes it as a global, and runs a full-screen
//! material over the camera image that uses it as a mask.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use postfx_render::property::FILTER_TEXTURE;
use postfx_render::{
    share, AuxiliaryTexture, CameraData, CameraType, Color, CommandBuffer, CompositePass, DepthBits,
    EffectMaterial, ExecutionContext, FilterCriteria, FilterPass, FrameExecute, FrameSetup, LayerMask,
    MaterialHandle, PassConfigData, PassError, PassLifecycle, PassQueue, PassResourceOwner, PassSlot,
    PassStage, PassState, PropertyTable, RenderBackend, RenderPass, RendererFeature, Result, ShaderRef,
    TargetBinding, TextureFormat, TextureHandle,
};

const SATURATION: &str = "_Saturation";
const TEMPORARY_COLOR: &str = "_TemporaryColor";
const PROFILING_NAME: &str = "DesaturationPass";

lazy_static! {
    static ref DESATURATION_PROPERTIES: PropertyTable = PropertyTable::new(&[SATURATION]);
}

/// Desaturation configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesaturationSettings {
    /// `0` is fully grey, `1` leaves colors untouched
    pub saturation: f32,
    /// Injection stage
    pub stage: PassStage,
    /// Color format of the filter and scratch targets
    pub format: TextureFormat,
    /// Object layers to include; empty selects nothing
    pub layer_mask: LayerMask,
    /// Index of the single rendering layer to include
    pub render_layer_mask: i32,
    /// Material the selected objects are drawn with, if any
    pub override_shader: Option<ShaderRef>,
    /// Full-screen effect shader; the feature stays inactive without one
    pub fullscreen_shader: Option<ShaderRef>,
}

impl DesaturationSettings {
    /// Saturation clamped to `0..=1`
    pub fn clamped(mut self) -> Self {
        self.saturation = if self.saturation.is_nan() {
            0.0
        } else {
            self.saturation.clamp(0.0, 1.0)
        };
        self
    }
}

/// Per-frame desaturation pass
pub struct DesaturationPass {
    settings: Arc<RwLock<DesaturationSettings>>,
    owner: PassResourceOwner,
    fullscreen: MaterialHandle,
    filter: FilterPass,
    composite: CompositePass,
    stage: PassStage,
    binding: Option<TargetBinding>,
    lifecycle: PassLifecycle,
}

impl DesaturationPass {
    pub fn new(
        owner: PassResourceOwner,
        fullscreen: MaterialHandle,
        override_material: Option<MaterialHandle>,
        settings: Arc<RwLock<DesaturationSettings>>,
    ) -> Self {
        let (stage, criteria) = {
            let s = settings.read();
            (
                s.stage,
                FilterCriteria::opaque(s.layer_mask, s.render_layer_mask).with_override_material(override_material),
            )
        };
        Self {
            settings,
            owner,
            fullscreen,
            filter: FilterPass::new(criteria),
            composite: CompositePass::new(EffectMaterial::new(fullscreen, 0)),
            stage,
            binding: None,
            lifecycle: PassLifecycle::new(),
        }
    }
}

impl RenderPass for DesaturationPass {
    fn name(&self) -> &str {
        PROFILING_NAME
    }

    fn stage(&self) -> PassStage {
        self.stage
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn setup(&mut self, backend: &mut dyn RenderBackend, frame: &FrameSetup) -> Result<()> {
        if self.lifecycle.is_disposed() {
            return Err(PassError::Disposed(PROFILING_NAME.into()));
        }
        let format = self.settings.read().format;
        let desc = frame.descriptor.with_format(format).with_depth_bits(DepthBits::None);

        let targets = self.owner.targets_mut();
        let filter = targets.ensure(backend, FILTER_TEXTURE, &desc)?;
        targets.ensure(backend, TEMPORARY_COLOR, &desc)?;

        self.binding = Some(TargetBinding::cleared(filter, Color::TRANSPARENT).with_depth(frame.depth_target));
        self.lifecycle.configure(PROFILING_NAME)
    }

    fn execute(&mut self, backend: &mut dyn RenderBackend, frame: &FrameExecute<'_>) -> Result<()> {
        if !self.lifecycle.begin_execute(PROFILING_NAME)? {
            return Ok(());
        }
        let settings = self.settings.read().clone().clamped();
        backend.set_float(self.fullscreen, DESATURATION_PROPERTIES.id(SATURATION), settings.saturation);

        let binding = self.binding.ok_or(PassError::InvalidHandle(TextureHandle::NONE))?;
        let targets = self.owner.targets();
        let filter_target = targets
            .get(FILTER_TEXTURE)
            .ok_or(PassError::InvalidHandle(TextureHandle::NONE))?;
        let scratch = targets
            .handle(TEMPORARY_COLOR)
            .ok_or(PassError::InvalidHandle(TextureHandle::NONE))?;

        let mut cmd = CommandBuffer::new(PROFILING_NAME);
        cmd.profiling_scope(PROFILING_NAME, |cmd| {
            cmd.bind(&binding);
            self.filter.record(cmd, &mut *backend, frame.cull, frame.opaque_sorting);
            self.composite.composite(
                cmd,
                &*backend,
                frame.color_target,
                scratch,
                frame.color_target,
                &[AuxiliaryTexture::from(filter_target)],
            )
        })?;
        backend.execute_command_buffer(&cmd);
        Ok(())
    }

    fn dispose(&mut self, backend: &mut dyn RenderBackend) {
        self.owner.release_all(backend);
        self.binding = None;
        self.lifecycle.dispose();
    }
}

/// Desaturation feature
pub struct DesaturationFeature {
    name: String,
    enabled: bool,
    settings: Arc<RwLock<DesaturationSettings>>,
    slot: PassSlot,
}

impl DesaturationFeature {
    pub fn new(name: impl Into<String>, settings: DesaturationSettings) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            settings: Arc::new(RwLock::new(settings.clamped())),
            slot: PassSlot::new(),
        }
    }

    /// Settings shared with the pass. Saturation and format apply from the
    /// next frame; shaders, stage and filtering apply on the next `create`.
    pub fn settings(&self) -> Arc<RwLock<DesaturationSettings>> {
        self.settings.clone()
    }

    pub fn pass_state(&self) -> Option<PassState> {
        self.slot.state()
    }
}

impl RendererFeature for DesaturationFeature {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&mut self, backend: &mut dyn RenderBackend, context: ExecutionContext) -> Result<()> {
        self.slot.dispose(backend);

        let settings = self.settings.read().clone();
        let fullscreen_shader = settings.fullscreen_shader.clone().ok_or_else(|| {
            PassError::MissingResource(format!("'{}' has no fullscreen shader", self.name))
        })?;

        let mut owner = PassResourceOwner::new(context);
        let (fullscreen, override_material) = owner.acquire_all(backend, |owner, backend| {
            let fullscreen = owner.acquire(backend, &fullscreen_shader)?;
            let override_material = owner.acquire_optional(backend, settings.override_shader.as_ref())?;
            Ok((fullscreen, override_material))
        })?;

        let pass = DesaturationPass::new(owner, fullscreen, override_material, self.settings.clone());
        self.slot.install(backend, share(pass));
        Ok(())
    }

    fn add_render_passes(&self, queue: &mut PassQueue, camera: &CameraData) {
        // Previews and reflection probes are left alone.
        if camera.camera_type <= CameraType::SceneView {
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
        let settings = self.settings.read();
        Some(PassConfigData {
            name: self.name.clone(),
            enabled: self.enabled,
            stage: settings.stage,
            config: serde_json::to_value(&*settings).ok()?,
        })
    }

    fn apply_config(&mut self, config: &PassConfigData) -> Result<()> {
        let mut settings: DesaturationSettings =
            serde_json::from_value(config.config.clone()).map_err(|e| PassError::InvalidConfig {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        settings.stage = config.stage;
        *self.settings.write() = settings.clamped();
        self.enabled = config.enabled;
        Ok(())
    }
}
