//! Screen-space outlines
//!
//! Renders view-space normals of the selected objects into
//! `_NormalsTexture`, then runs an edge-detection material (Roberts cross on
//! depth and normals) over the camera image.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use postfx_render::property::NORMALS_TEXTURE;
use postfx_render::{
    share, AuxiliaryTexture, CameraData, Color, CommandBuffer, CompositePass, DepthBits, EffectMaterial,
    ExecutionContext, FilterCriteria, FilterPass, FrameExecute, FrameSetup, LayerMask, MaterialHandle,
    PassConfigData, PassError, PassLifecycle, PassQueue, PassResourceOwner, PassSlot, PassStage, PassState,
    PropertyTable, RenderBackend, RenderPass, RendererFeature, Result, SortingCriteria, TargetBinding,
    TextureFormat, TextureHandle,
};

/// Shader that writes view-space normals
pub const NORMALS_SHADER: &str = "Hidden/ViewSpaceNormals";
/// Edge-detection shader
pub const OUTLINES_SHADER: &str = "Hidden/Outlines";

const TEMP_COLOR_TEXTURE: &str = "_TempColorTexture";
const PROFILING_NAME: &str = "OutlinePass";

const OUTLINE_SCALE: &str = "_OutlineScale";
const OUTLINE_COLOR: &str = "_OutlineColor";
const ROBERTS_CROSS_MULTIPLIER: &str = "_RobertsCrossMultiplier";
const DEPTH_THRESHOLD: &str = "_DepthThreshold";
const NORMAL_THRESHOLD: &str = "_NormalThreshold";
const STEEP_ANGLE_THRESHOLD: &str = "_SteepAngleThreshold";
const STEEP_ANGLE_MULTIPLIER: &str = "_SteepAngleMultiplier";

lazy_static! {
    static ref OUTLINE_PROPERTIES: PropertyTable = PropertyTable::new(&[
        OUTLINE_SCALE,
        OUTLINE_COLOR,
        ROBERTS_CROSS_MULTIPLIER,
        DEPTH_THRESHOLD,
        NORMAL_THRESHOLD,
        STEEP_ANGLE_THRESHOLD,
        STEEP_ANGLE_MULTIPLIER,
    ]);
}

/// Normals buffer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalsTextureSettings {
    pub format: TextureFormat,
    pub depth_bits: DepthBits,
    /// Clear color; alpha is always forced to zero
    pub background_color: Color,
    /// Draw normals without testing against the camera's depth
    pub ignore_scene_objects: bool,
}

impl Default for NormalsTextureSettings {
    fn default() -> Self {
        Self {
            format: TextureFormat::Default,
            depth_bits: DepthBits::Depth16,
            background_color: Color::BLACK,
            ignore_scene_objects: false,
        }
    }
}

/// Outline configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSettings {
    pub stage: PassStage,
    pub layer_mask: LayerMask,
    /// Index of the single rendering layer to include
    pub render_layer_mask: i32,
    pub outline_scale: f32,
    /// Passed to the shader as-is
    pub outline_color: Color,
    pub roberts_cross_multiplier: f32,
    pub depth_threshold: f32,
    pub normal_threshold: f32,
    pub steep_angle_threshold: f32,
    pub steep_angle_multiplier: f32,
    pub normals: NormalsTextureSettings,
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self {
            stage: PassStage::BeforeRenderingTransparents,
            layer_mask: LayerMask::NOTHING,
            render_layer_mask: 1,
            outline_scale: 1.0,
            outline_color: Color::new(0.0, 22.0, 255.0, 1.0),
            roberts_cross_multiplier: 500.0,
            depth_threshold: 10.0,
            normal_threshold: 0.6,
            steep_angle_threshold: 0.0,
            steep_angle_multiplier: 100.0,
            normals: NormalsTextureSettings::default(),
        }
    }
}

/// Per-frame outline pass
pub struct OutlinePass {
    settings: Arc<RwLock<OutlineSettings>>,
    owner: PassResourceOwner,
    outline: MaterialHandle,
    filter: FilterPass,
    composite: CompositePass,
    stage: PassStage,
    binding: Option<TargetBinding>,
    lifecycle: PassLifecycle,
}

impl OutlinePass {
    pub fn new(
        owner: PassResourceOwner,
        normals: MaterialHandle,
        outline: MaterialHandle,
        settings: Arc<RwLock<OutlineSettings>>,
    ) -> Self {
        let (stage, criteria) = {
            let s = settings.read();
            (
                s.stage,
                FilterCriteria::opaque(s.layer_mask, s.render_layer_mask).with_override_material(Some(normals)),
            )
        };
        Self {
            settings,
            owner,
            outline,
            filter: FilterPass::new(criteria),
            composite: CompositePass::new(EffectMaterial::new(outline, 0)),
            stage,
            binding: None,
            lifecycle: PassLifecycle::new(),
        }
    }

    fn push_uniforms(&self, backend: &mut dyn RenderBackend, s: &OutlineSettings) {
        let id = |name: &str| OUTLINE_PROPERTIES.id(name);
        backend.set_float(self.outline, id(OUTLINE_SCALE), s.outline_scale);
        backend.set_color(self.outline, id(OUTLINE_COLOR), s.outline_color);
        backend.set_float(self.outline, id(ROBERTS_CROSS_MULTIPLIER), s.roberts_cross_multiplier);
        backend.set_float(self.outline, id(DEPTH_THRESHOLD), s.depth_threshold);
        backend.set_float(self.outline, id(NORMAL_THRESHOLD), s.normal_threshold);
        backend.set_float(self.outline, id(STEEP_ANGLE_THRESHOLD), s.steep_angle_threshold);
        backend.set_float(self.outline, id(STEEP_ANGLE_MULTIPLIER), s.steep_angle_multiplier);
    }
}

impl RenderPass for OutlinePass {
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
        let normals = self.settings.read().normals.clone();
        let desc = frame
            .descriptor
            .with_format(normals.format)
            .with_depth_bits(normals.depth_bits);

        let targets = self.owner.targets_mut();
        let normals_target = targets.ensure(backend, NORMALS_TEXTURE, &desc)?;
        targets.ensure(backend, TEMP_COLOR_TEXTURE, &desc)?;

        let binding = TargetBinding::cleared(normals_target, normals.background_color.with_alpha(0.0));
        self.binding = Some(if normals.ignore_scene_objects {
            binding
        } else {
            binding.with_depth(frame.depth_target)
        });
        self.lifecycle.configure(PROFILING_NAME)
    }

    fn execute(&mut self, backend: &mut dyn RenderBackend, frame: &FrameExecute<'_>) -> Result<()> {
        if !self.lifecycle.begin_execute(PROFILING_NAME)? {
            return Ok(());
        }
        let settings = self.settings.read().clone();
        self.push_uniforms(backend, &settings);

        let binding = self.binding.ok_or(PassError::InvalidHandle(TextureHandle::NONE))?;
        let targets = self.owner.targets();
        let normals_target = targets
            .get(NORMALS_TEXTURE)
            .ok_or(PassError::InvalidHandle(TextureHandle::NONE))?;
        let scratch = targets
            .handle(TEMP_COLOR_TEXTURE)
            .ok_or(PassError::InvalidHandle(TextureHandle::NONE))?;

        let mut cmd = CommandBuffer::new(PROFILING_NAME);
        cmd.profiling_scope(PROFILING_NAME, |cmd| {
            cmd.bind(&binding);
            self.filter.record(cmd, &mut *backend, frame.cull, SortingCriteria::BackToFront);
            self.composite.composite(
                cmd,
                &*backend,
                frame.color_target,
                scratch,
                frame.color_target,
                &[AuxiliaryTexture::from(normals_target)],
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

/// Outline feature
pub struct OutlineFeature {
    name: String,
    enabled: bool,
    settings: Arc<RwLock<OutlineSettings>>,
    slot: PassSlot,
}

impl OutlineFeature {
    pub fn new(name: impl Into<String>, settings: OutlineSettings) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            settings: Arc::new(RwLock::new(settings)),
            slot: PassSlot::new(),
        }
    }

    /// Settings shared with the pass. Uniforms and the normals buffer apply
    /// from the next frame; stage and filtering apply on the next `create`.
    pub fn settings(&self) -> Arc<RwLock<OutlineSettings>> {
        self.settings.clone()
    }

    pub fn pass_state(&self) -> Option<PassState> {
        self.slot.state()
    }
}

impl RendererFeature for OutlineFeature {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&mut self, backend: &mut dyn RenderBackend, context: ExecutionContext) -> Result<()> {
        self.slot.dispose(backend);

        let mut owner = PassResourceOwner::new(context);
        let (normals, outline) = owner.acquire_all(backend, |owner, backend| {
            let normals = owner.acquire_named(backend, NORMALS_SHADER)?;
            let outline = owner.acquire_named(backend, OUTLINES_SHADER)?;
            Ok((normals, outline))
        })?;

        let pass = OutlinePass::new(owner, normals, outline, self.settings.clone());
        self.slot.install(backend, share(pass));
        Ok(())
    }

    fn add_render_passes(&self, queue: &mut PassQueue, _camera: &CameraData) {
        self.slot.enqueue(queue);
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
        let mut settings: OutlineSettings =
            serde_json::from_value(config.config.clone()).map_err(|e| PassError::InvalidConfig {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        settings.stage = config.stage;
        *self.settings.write() = settings;
        self.enabled = config.enabled;
        Ok(())
    }
}
