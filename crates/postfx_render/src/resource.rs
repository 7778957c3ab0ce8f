//! Render Resources - GPU resource abstractions
//!
//! Abstract representations of the GPU objects a pass owns or borrows.
//! The host backend maps handles to its own textures and materials.

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// Handle to a host texture (render target)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub Id);

impl TextureHandle {
    /// A handle that never refers to a live texture
    pub const NONE: Self = Self(Id::null());

    /// Check if this handle was never assigned
    pub fn is_none(&self) -> bool {
        self.0.is_null()
    }
}

/// Handle to a host material instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialHandle(pub Id);

/// Reference to a shader program by its host-visible name
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShaderRef(pub String);

impl ShaderRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Color format of a render target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// Host default color format
    #[default]
    Default,
    /// Host default HDR color format
    DefaultHdr,
    Rgba8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Rg16Float,
    R16Float,
    R8Unorm,
}

/// Depth buffer precision of a render target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthBits {
    #[default]
    None,
    Depth8,
    Depth16,
    Depth24,
    Depth32,
}

/// Sampler filter mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    Point,
    #[default]
    Bilinear,
    Trilinear,
}

/// Linear RGBA color
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with a different alpha
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Texture descriptor
///
/// Equality is by value: two descriptors that compare equal describe
/// interchangeable backing textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color format
    pub format: TextureFormat,
    /// Depth precision
    pub depth_bits: DepthBits,
    /// MSAA sample count
    pub msaa_samples: u32,
    /// Sampler filter mode
    pub filter_mode: FilterMode,
}

impl Default for TargetDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Default,
            depth_bits: DepthBits::None,
            msaa_samples: 1,
            filter_mode: FilterMode::Bilinear,
        }
    }
}

impl TargetDescriptor {
    /// Create a descriptor of the given size with default format
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Replace the color format
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the depth precision
    pub fn with_depth_bits(mut self, depth_bits: DepthBits) -> Self {
        self.depth_bits = depth_bits;
        self
    }

    /// Copy width and height from another descriptor, keeping everything else
    pub fn with_size_of(mut self, other: &TargetDescriptor) -> Self {
        self.width = other.width;
        self.height = other.height;
        self
    }

    /// A descriptor with a zero dimension cannot back a texture
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

}

/// Which attachments to clear when a target is bound
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearFlag {
    #[default]
    None,
    Color,
}

/// Kind of camera a frame is rendered for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CameraType {
    /// In-game camera
    #[default]
    Game = 1,
    /// Editor scene view
    SceneView = 2,
    /// Asset preview thumbnails
    Preview = 4,
    /// XR camera
    Vr = 8,
    /// Reflection probe capture
    Reflection = 16,
}
