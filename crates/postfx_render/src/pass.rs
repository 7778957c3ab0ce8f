//! Render Pass Trait
//!
//! Defines the per-frame interface the scheduler drives: `setup` sizes and
//! binds targets for the current camera, `execute` records and submits GPU
//! work, `dispose` releases everything the pass owns.
//!
//! # Example
//!
//! ```ignore
//! use postfx_render::pass::*;
//!
//! struct Invert { lifecycle: PassLifecycle }
//!
//! impl RenderPass for Invert {
//!     fn name(&self) -> &str { "invert" }
//!     fn stage(&self) -> PassStage { PassStage::BeforeRenderingPostProcessing }
//!     fn state(&self) -> PassState { self.lifecycle.state() }
//!
//!     fn setup(&mut self, backend: &mut dyn RenderBackend, frame: &FrameSetup) -> Result<()> {
//!         self.lifecycle.configure("invert")
//!     }
//!
//!     fn execute(&mut self, backend: &mut dyn RenderBackend, frame: &FrameExecute<'_>) -> Result<()> {
//!         if !self.lifecycle.begin_execute("invert")? { return Ok(()); }
//!         // record and submit...
//!         Ok(())
//!     }
//!
//!     fn dispose(&mut self, _backend: &mut dyn RenderBackend) { self.lifecycle.dispose(); }
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::RenderBackend;
use crate::error::{PassError, Result};
use crate::filter::{CullResults, SortingCriteria};
use crate::resource::{CameraType, TargetDescriptor, TextureHandle};

/// Point in the host's frame at which a pass is injected
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum PassStage {
    BeforeRendering = 0,
    BeforeRenderingShadows = 50,
    AfterRenderingShadows = 100,
    BeforeRenderingPrePasses = 150,
    AfterRenderingPrePasses = 200,
    BeforeRenderingGbuffer = 210,
    AfterRenderingGbuffer = 220,
    BeforeRenderingDeferredLights = 230,
    AfterRenderingDeferredLights = 240,
    BeforeRenderingOpaques = 250,
    #[default]
    AfterRenderingOpaques = 300,
    BeforeRenderingSkybox = 350,
    AfterRenderingSkybox = 400,
    BeforeRenderingTransparents = 450,
    AfterRenderingTransparents = 500,
    BeforeRenderingPostProcessing = 550,
    AfterRenderingPostProcessing = 600,
    AfterRendering = 1000,
}

impl PassStage {
    /// Numeric order; lower runs earlier
    pub fn order(self) -> u16 {
        self as u16
    }
}

/// Lifecycle state of a pass instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PassState {
    /// Constructed, never successfully set up
    #[default]
    Uninitialized,
    /// Set up with a valid descriptor at least once
    Configured,
    /// Has executed; re-entered every frame
    Executing,
    /// Terminal
    Disposed,
}

/// Tracks [`PassState`] transitions for a pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassLifecycle {
    state: PassState,
}

impl PassLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.state == PassState::Disposed
    }

    /// Record a successful setup
    pub fn configure(&mut self, name: &str) -> Result<()> {
        match self.state {
            PassState::Disposed => Err(PassError::Disposed(name.to_string())),
            PassState::Uninitialized => {
                self.state = PassState::Configured;
                Ok(())
            }
            PassState::Configured | PassState::Executing => Ok(()),
        }
    }

    /// Enter execution. Returns `false` if the pass was never configured,
    /// in which case the frame's work is skipped.
    pub fn begin_execute(&mut self, name: &str) -> Result<bool> {
        match self.state {
            PassState::Disposed => Err(PassError::Disposed(name.to_string())),
            PassState::Uninitialized => Ok(false),
            PassState::Configured | PassState::Executing => {
                self.state = PassState::Executing;
                Ok(true)
            }
        }
    }

    /// Move to the terminal state. Legal from every state.
    pub fn dispose(&mut self) {
        self.state = PassState::Disposed;
    }
}

/// Camera being rendered, as the host describes it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraData {
    pub camera_type: CameraType,
    /// Descriptor of the camera's color target this frame
    pub descriptor: TargetDescriptor,
    pub color_target: TextureHandle,
    pub depth_target: TextureHandle,
    /// Sort flags the host uses for opaque geometry
    pub opaque_sorting: SortingCriteria,
}

/// Arguments of the per-frame setup callback
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSetup {
    pub frame: u64,
    /// Camera target descriptor, possibly resized since last frame
    pub descriptor: TargetDescriptor,
    pub depth_target: TextureHandle,
}

impl FrameSetup {
    pub fn for_camera(frame: u64, camera: &CameraData) -> Self {
        Self {
            frame,
            descriptor: camera.descriptor,
            depth_target: camera.depth_target,
        }
    }
}

/// Arguments of the per-frame execute callback
#[derive(Clone, Copy, Debug)]
pub struct FrameExecute<'a> {
    pub frame: u64,
    pub cull: &'a CullResults,
    pub color_target: TextureHandle,
    pub depth_target: TextureHandle,
    pub opaque_sorting: SortingCriteria,
}

impl<'a> FrameExecute<'a> {
    pub fn for_camera(frame: u64, camera: &CameraData, cull: &'a CullResults) -> Self {
        Self {
            frame,
            cull,
            color_target: camera.color_target,
            depth_target: camera.depth_target,
            opaque_sorting: camera.opaque_sorting,
        }
    }
}

/// A unit of per-frame GPU work injected into the host's frame
pub trait RenderPass: Send {
    /// Name used for profiling scopes and logs
    fn name(&self) -> &str;

    /// Injection stage
    fn stage(&self) -> PassStage;

    /// Current lifecycle state
    fn state(&self) -> PassState;

    /// Size and bind targets for this frame's camera
    fn setup(&mut self, backend: &mut dyn RenderBackend, frame: &FrameSetup) -> Result<()>;

    /// Record and submit this frame's work
    fn execute(&mut self, backend: &mut dyn RenderBackend, frame: &FrameExecute<'_>) -> Result<()>;

    /// Release everything the pass owns. Safe in every state, and repeatable.
    fn dispose(&mut self, backend: &mut dyn RenderBackend);
}

/// A pass owned by its feature and enqueued by reference each frame
pub type SharedPass = Arc<Mutex<dyn RenderPass>>;

/// Wrap a pass for sharing between its feature and the frame queue
pub fn share<P: RenderPass + 'static>(pass: P) -> SharedPass {
    Arc::new(Mutex::new(pass))
}
