//! Renderer Features
//!
//! A feature is the long-lived, user-configured half of an effect. It owns
//! one pass instance, creates it on activation and decides per camera whether
//! to enqueue it.
//!
//! Activation order is fixed: acquire resources, construct the pass, register
//! it. Teardown runs the reverse: deregister, then release.

use serde::{Deserialize, Serialize};

use crate::backend::RenderBackend;
use crate::error::Result;
use crate::owner::ExecutionContext;
use crate::pass::{CameraData, PassStage, PassState, SharedPass};
use crate::scheduler::PassQueue;

/// Serializable feature configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassConfigData {
    /// Feature name
    pub name: String,
    /// Enabled state
    pub enabled: bool,
    /// Injection stage
    pub stage: PassStage,
    /// Feature-specific settings as JSON
    pub config: serde_json::Value,
}

/// A post-processing feature attached to a renderer
pub trait RendererFeature: Send {
    /// Unique name of this feature
    fn name(&self) -> &str;

    /// Acquire resources and construct the pass.
    ///
    /// On error the feature stays inactive and holds nothing; `dispose` is
    /// still safe to call.
    fn create(&mut self, backend: &mut dyn RenderBackend, context: ExecutionContext) -> Result<()>;

    /// Enqueue this feature's pass for `camera`, if it applies
    fn add_render_passes(&self, queue: &mut PassQueue, camera: &CameraData);

    /// Deregister and release the pass. Safe in every state.
    fn dispose(&mut self, backend: &mut dyn RenderBackend);

    /// Whether `create` succeeded and the feature has not been disposed
    fn is_active(&self) -> bool;

    /// Whether the user has the feature switched on
    fn is_enabled(&self) -> bool {
        true
    }

    /// Switch the feature on or off without releasing resources
    fn set_enabled(&mut self, _enabled: bool) {}

    /// Get configuration for serialization
    fn get_config(&self) -> Option<PassConfigData> {
        None
    }

    /// Apply configuration from deserialization
    fn apply_config(&mut self, _config: &PassConfigData) -> Result<()> {
        Ok(())
    }
}

/// Holds the pass a feature registered, if any
#[derive(Default)]
pub struct PassSlot {
    pass: Option<SharedPass>,
}

impl PassSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructed pass, disposing any previous one
    pub fn install(&mut self, backend: &mut dyn RenderBackend, pass: SharedPass) {
        self.dispose(backend);
        self.pass = Some(pass);
    }

    pub fn get(&self) -> Option<&SharedPass> {
        self.pass.as_ref()
    }

    pub fn is_installed(&self) -> bool {
        self.pass.is_some()
    }

    /// Lifecycle state of the installed pass
    pub fn state(&self) -> Option<PassState> {
        self.pass.as_ref().map(|p| p.lock().state())
    }

    /// Enqueue the installed pass
    pub fn enqueue(&self, queue: &mut PassQueue) {
        if let Some(pass) = &self.pass {
            queue.enqueue(pass.clone());
        }
    }

    /// Deregister, then release the pass's resources
    pub fn dispose(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(pass) = self.pass.take() {
            let mut pass = pass.lock();
            log::info!("disposing pass '{}'", pass.name());
            pass.dispose(backend);
        }
    }
}

impl std::fmt::Debug for PassSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassSlot")
            .field("installed", &self.is_installed())
            .field("state", &self.state())
            .finish()
    }
}
