//! # postfx_features - Post-Processing Renderer Features
//!
//! Three full-screen effects built on `postfx_render`:
//! - [`blur`]: two-pass separable blur of game cameras
//! - [`desaturation`]: desaturates the image, masked by selected objects
//! - [`outline`]: edge detection on depth and view-space normals
//!
//! Features are constructed directly or from a JSON [`RendererConfig`], then
//! handed to a [`postfx_render::FrameScheduler`].

pub mod blur;
pub mod config;
pub mod desaturation;
pub mod outline;

pub use blur::{BlurFeature, BlurPass, BlurSettings, MAX_BLUR};
pub use config::{ConfigError, ConfigResult, FeatureConfig, FeatureKind, RendererConfig};
pub use desaturation::{DesaturationFeature, DesaturationPass, DesaturationSettings};
pub use outline::{
    NormalsTextureSettings, OutlineFeature, OutlinePass, OutlineSettings, NORMALS_SHADER, OUTLINES_SHADER,
};
