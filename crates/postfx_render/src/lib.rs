//! # postfx_render - Render Pass Resources and Compositing
//!
//! Backend-agnostic core for full-screen post-processing features:
//! - Per-frame render target reuse keyed by descriptor value
//! - Filtered scene draws with an optional override material
//! - Two-draw full-screen compositing through a scratch target
//! - Ownership and context-aware release of materials and targets
//! - A frame scheduler that drives setup and execute per camera
//!
//! ## Architecture
//!
//! A [`RendererFeature`] is created once, owns one [`RenderPass`] and enqueues
//! it for the cameras it applies to. Each frame the [`FrameScheduler`] calls
//! `setup` on every enqueued pass (sizing targets for the camera) and then
//! `execute` (recording and submitting a [`CommandBuffer`]). Everything the
//! host engine provides is reached through [`RenderBackend`];
//! [`HeadlessBackend`] implements it without a GPU.
//!
//! ## Example
//!
//! ```ignore
//! use postfx_render::prelude::*;
//!
//! let mut backend = HeadlessBackend::with_shaders(["Hidden/Blur"]);
//! let mut scheduler = FrameScheduler::new(ExecutionContext::Play);
//! scheduler.add_feature(&mut backend, Box::new(my_feature));
//!
//! // Every frame, per camera
//! let frame = scheduler.setup_camera(&mut backend, &camera);
//! frame.execute(&mut backend, &cull_results);
//!
//! scheduler.shutdown(&mut backend);
//! ```

pub mod backend;
pub mod command;
pub mod composite;
pub mod error;
pub mod feature;
pub mod filter;
pub mod headless;
pub mod id;
pub mod owner;
pub mod pass;
pub mod property;
pub mod resource;
pub mod scheduler;
pub mod target;

pub use backend::{DestroyMode, RenderBackend};
pub use command::{Command, CommandBuffer, TargetBinding};
pub use composite::{AuxiliaryTexture, CompositeOutcome, CompositePass, EffectMaterial, Resolve};
pub use error::{PassError, Result};
pub use feature::{PassConfigData, PassSlot, RendererFeature};
pub use filter::{
    collect_visible, CullResults, DrawCall, DrawList, DrawingSettings, FilterCriteria, FilterPass,
    FilteringSettings, LayerMask, RenderQueueRange, RenderingLayerMask, ShaderTagId, SortingCriteria,
    VisibleRenderer,
};
pub use headless::{HeadlessBackend, HeadlessStats, UniformValue};
pub use id::{Id, IdGenerator};
pub use owner::{ExecutionContext, OwnedMaterial, PassResourceOwner, ResourceReleaser};
pub use pass::{
    share, CameraData, FrameExecute, FrameSetup, PassLifecycle, PassStage, PassState, RenderPass,
    SharedPass,
};
pub use property::{PropertyId, PropertyTable};
pub use resource::{
    CameraType, ClearFlag, Color, DepthBits, FilterMode, MaterialHandle, ShaderRef, TargetDescriptor,
    TextureFormat, TextureHandle,
};
pub use scheduler::{FrameScheduler, FrameStats, PassQueue, PreparedFrame, QueuedPass};
pub use target::{AllocatorStats, FrameTargetAllocator, ManagedTarget};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::{DestroyMode, RenderBackend};
    pub use crate::command::CommandBuffer;
    pub use crate::composite::{AuxiliaryTexture, CompositePass};
    pub use crate::error::{PassError, Result};
    pub use crate::feature::{PassConfigData, PassSlot, RendererFeature};
    pub use crate::filter::{CullResults, FilterCriteria, FilterPass, SortingCriteria};
    pub use crate::headless::HeadlessBackend;
    pub use crate::owner::{ExecutionContext, PassResourceOwner};
    pub use crate::pass::{CameraData, FrameExecute, FrameSetup, PassStage, PassState, RenderPass};
    pub use crate::resource::{CameraType, Color, TargetDescriptor, TextureHandle};
    pub use crate::scheduler::{FrameScheduler, PassQueue};
}
