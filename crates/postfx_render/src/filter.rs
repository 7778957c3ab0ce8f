//! Filter Pass
//!
//! Selects a subset of the camera's visible renderers by render queue,
//! layer, rendering layer and shader tag, optionally replacing every
//! renderer's material with a single override material. The result is an
//! ordered [`DrawList`] recorded into an intermediate target (normals,
//! masked color, ...).
//!
//! Collection is delegated to the host through
//! [`RenderBackend::create_renderer_list`]; this module only builds the
//! criteria and enforces the override contract on the returned list.
//! [`collect_visible`] is the reference collector used by headless backends.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::backend::RenderBackend;
use crate::command::CommandBuffer;
use crate::resource::MaterialHandle;

/// Inclusive range of render queue values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderQueueRange {
    pub lower_bound: i32,
    pub upper_bound: i32,
}

impl RenderQueueRange {
    /// Opaque and alpha-tested geometry
    pub const OPAQUE: Self = Self::new(0, 2500);
    /// Transparent geometry
    pub const TRANSPARENT: Self = Self::new(2501, 5000);
    /// Every queue
    pub const ALL: Self = Self::new(0, 5000);

    pub const fn new(lower_bound: i32, upper_bound: i32) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    pub fn contains(&self, queue: i32) -> bool {
        queue >= self.lower_bound && queue <= self.upper_bound
    }
}

impl Default for RenderQueueRange {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// Bitmask over object layers (0..32). Empty selects nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NOTHING: Self = Self(0);
    pub const EVERYTHING: Self = Self(u32::MAX);

    /// Mask containing exactly the given layers. Layers past 31 are ignored.
    pub fn from_layers(layers: &[u8]) -> Self {
        Self(
            layers
                .iter()
                .filter(|&&l| l < 32)
                .fold(0u32, |mask, &l| mask | 1 << l),
        )
    }

    pub fn contains_layer(&self, layer: u8) -> bool {
        layer < 32 && self.0 & (1 << layer) != 0
    }
}

/// Bitmask over rendering layers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderingLayerMask(pub u32);

impl RenderingLayerMask {
    pub const ALL: Self = Self(u32::MAX);

    /// Mask selecting the single rendering layer `index`.
    ///
    /// Settings store a rendering-layer *index* and the mask is always
    /// `1 << index`: an index of 3 selects layer 3 (mask 8), never layers 0
    /// and 1. The shift count is taken modulo 32, as the host does for
    /// 32-bit shifts, so out-of-range or negative indices wrap.
    pub fn from_layer_index(index: i32) -> Self {
        Self(1u32.wrapping_shl(index as u32))
    }

    pub fn intersects(&self, renderer_mask: u32) -> bool {
        self.0 & renderer_mask != 0
    }
}

impl Default for RenderingLayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Shader pass tag a renderer must expose to be drawn
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShaderTagId(pub String);

impl ShaderTagId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Tags of the host's unlit and forward shader passes
    pub fn forward_tags() -> Vec<ShaderTagId> {
        vec![
            Self::new("SRPDefaultUnlit"),
            Self::new("UniversalForward"),
            Self::new("UniversalForwardOnly"),
        ]
    }
}

/// Ordering the collector applies to a draw list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortingCriteria {
    /// Keep cull order
    None,
    /// Render queue, then front to back
    #[default]
    CommonOpaque,
    /// Render queue, then back to front
    CommonTransparent,
    /// Back to front only
    BackToFront,
    /// Front to back only
    QuantizedFrontToBack,
}

/// A renderer the camera can see this frame
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleRenderer {
    pub id: u64,
    pub layer: u8,
    pub rendering_layer_mask: u32,
    pub render_queue: i32,
    pub shader_tags: Vec<ShaderTagId>,
    pub material: MaterialHandle,
    /// Distance from the camera
    pub distance: f32,
}

/// Host-supplied visibility set for one camera and frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CullResults {
    pub renderers: Vec<VisibleRenderer>,
}

impl CullResults {
    pub fn new(renderers: Vec<VisibleRenderer>) -> Self {
        Self { renderers }
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

/// Which renderers are considered at all
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilteringSettings {
    pub render_queue_range: RenderQueueRange,
    pub layer_mask: LayerMask,
    pub rendering_layer_mask: RenderingLayerMask,
}

impl FilteringSettings {
    pub fn matches(&self, renderer: &VisibleRenderer) -> bool {
        self.render_queue_range.contains(renderer.render_queue)
            && self.layer_mask.contains_layer(renderer.layer)
            && self.rendering_layer_mask.intersects(renderer.rendering_layer_mask)
    }
}

/// How the selected renderers are drawn
#[derive(Clone, Debug, PartialEq)]
pub struct DrawingSettings {
    pub shader_tags: Vec<ShaderTagId>,
    pub sorting: SortingCriteria,
    pub override_material: Option<MaterialHandle>,
    pub override_material_pass: u32,
}

impl DrawingSettings {
    /// Whether the renderer exposes one of the accepted shader passes
    pub fn accepts(&self, renderer: &VisibleRenderer) -> bool {
        renderer.shader_tags.iter().any(|t| self.shader_tags.contains(t))
    }

    /// Material and pass a renderer is drawn with
    pub fn material_for(&self, renderer: &VisibleRenderer) -> (MaterialHandle, u32) {
        match self.override_material {
            Some(material) => (material, self.override_material_pass),
            None => (renderer.material, 0),
        }
    }
}

/// One scene draw
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub renderer: u64,
    pub material: MaterialHandle,
    pub pass: u32,
}

/// Ordered scene draws produced by a collector
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawList {
    pub calls: Vec<DrawCall>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter()
    }
}

/// Selection criteria for a filter pass
#[derive(Clone, Debug, PartialEq)]
pub struct FilterCriteria {
    pub render_queue_range: RenderQueueRange,
    pub layer_mask: LayerMask,
    pub rendering_layer_mask: RenderingLayerMask,
    pub shader_tags: Vec<ShaderTagId>,
    /// Material replacing every renderer's own, drawn with pass 0
    pub override_material: Option<MaterialHandle>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            render_queue_range: RenderQueueRange::OPAQUE,
            layer_mask: LayerMask::NOTHING,
            rendering_layer_mask: RenderingLayerMask::ALL,
            shader_tags: ShaderTagId::forward_tags(),
            override_material: None,
        }
    }
}

impl FilterCriteria {
    /// Opaque forward renderers on `layer_mask` and the single rendering
    /// layer `rendering_layer_index`
    pub fn opaque(layer_mask: LayerMask, rendering_layer_index: i32) -> Self {
        Self {
            layer_mask,
            rendering_layer_mask: RenderingLayerMask::from_layer_index(rendering_layer_index),
            ..Default::default()
        }
    }

    pub fn with_override_material(mut self, material: Option<MaterialHandle>) -> Self {
        self.override_material = material;
        self
    }

    pub fn filtering(&self) -> FilteringSettings {
        FilteringSettings {
            render_queue_range: self.render_queue_range,
            layer_mask: self.layer_mask,
            rendering_layer_mask: self.rendering_layer_mask,
        }
    }

    pub fn drawing(&self, sorting: SortingCriteria) -> DrawingSettings {
        DrawingSettings {
            shader_tags: self.shader_tags.clone(),
            sorting,
            override_material: self.override_material,
            override_material_pass: 0,
        }
    }
}

/// Renders a filtered subset of the scene into the currently bound target
#[derive(Clone, Debug)]
pub struct FilterPass {
    criteria: FilterCriteria,
}

impl FilterPass {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Ask the host for the matching draws, in the host's order for `sorting`.
    ///
    /// An empty visible set, or one where nothing matches, yields an empty
    /// list.
    pub fn collect(
        &self,
        backend: &mut dyn RenderBackend,
        cull: &CullResults,
        sorting: SortingCriteria,
    ) -> DrawList {
        let drawing = self.criteria.drawing(sorting);
        let filtering = self.criteria.filtering();
        let mut list = backend.create_renderer_list(cull, &drawing, &filtering);

        if let Some(material) = self.criteria.override_material {
            for call in &mut list.calls {
                call.material = material;
                call.pass = 0;
            }
        }
        list
    }

    /// Collect and record the draws. Returns the number of draws recorded.
    pub fn record(
        &self,
        cmd: &mut CommandBuffer,
        backend: &mut dyn RenderBackend,
        cull: &CullResults,
        sorting: SortingCriteria,
    ) -> usize {
        let list = self.collect(backend, cull, sorting);
        let count = list.len();
        log::trace!("filter pass recorded {} draws", count);
        cmd.draw_renderer_list(list);
        count
    }
}

/// Reference collector: filter the visible set and order it per `drawing.sorting`.
///
/// Sorting is stable, so renderers that compare equal keep cull order.
pub fn collect_visible(
    cull: &CullResults,
    drawing: &DrawingSettings,
    filtering: &FilteringSettings,
) -> DrawList {
    let mut selected: Vec<&VisibleRenderer> = cull
        .renderers
        .iter()
        .filter(|r| filtering.matches(r) && drawing.accepts(r))
        .collect();

    let by_distance = |a: &VisibleRenderer, b: &VisibleRenderer| {
        a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal)
    };

    match drawing.sorting {
        SortingCriteria::None => {}
        SortingCriteria::CommonOpaque => selected.sort_by(|a, b| {
            a.render_queue.cmp(&b.render_queue).then_with(|| by_distance(a, b))
        }),
        SortingCriteria::CommonTransparent => selected.sort_by(|a, b| {
            a.render_queue.cmp(&b.render_queue).then_with(|| by_distance(b, a))
        }),
        SortingCriteria::BackToFront => selected.sort_by(|a, b| by_distance(b, a)),
        SortingCriteria::QuantizedFrontToBack => selected.sort_by(|a, b| by_distance(a, b)),
    }

    DrawList {
        calls: selected
            .into_iter()
            .map(|r| {
                let (material, pass) = drawing.material_for(r);
                DrawCall {
                    renderer: r.id,
                    material,
                    pass,
                }
            })
            .collect(),
    }
}
