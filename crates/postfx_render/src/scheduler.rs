//! Frame Scheduler
//!
//! Owns the renderer's features and drives one camera at a time through
//! setup and execute. The two halves are split so the host can prepare a
//! frame and then drop it without executing (a cancelled frame); such frames
//! are counted but otherwise harmless, since the next setup starts clean.
//!
//! # Example
//!
//! ```ignore
//! use postfx_render::scheduler::FrameScheduler;
//!
//! let mut scheduler = FrameScheduler::new(ExecutionContext::Play);
//! scheduler.add_feature(&mut backend, Box::new(blur));
//!
//! let frame = scheduler.setup_camera(&mut backend, &camera);
//! frame.execute(&mut backend, &cull);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::backend::RenderBackend;
use crate::error::{PassError, Result};
use crate::feature::{PassConfigData, RendererFeature};
use crate::filter::CullResults;
use crate::owner::ExecutionContext;
use crate::pass::{CameraData, FrameExecute, FrameSetup, SharedPass};

/// A pass together with the feature that enqueued it
pub struct QueuedPass {
    pub feature: String,
    pub pass: SharedPass,
}

/// Passes enqueued for one camera
#[derive(Default)]
pub struct PassQueue {
    feature: String,
    passes: Vec<QueuedPass>,
}

impl PassQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute subsequent enqueues to `feature`
    pub fn begin_feature(&mut self, feature: &str) {
        self.feature.clear();
        self.feature.push_str(feature);
    }

    pub fn enqueue(&mut self, pass: SharedPass) {
        self.passes.push(QueuedPass {
            feature: self.feature.clone(),
            pass,
        });
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Queued passes in execution order: by stage, then by enqueue order
    pub fn into_entries(mut self) -> Vec<QueuedPass> {
        self.passes.sort_by_key(|queued| queued.pass.lock().stage());
        self.passes
    }

    /// Passes in execution order
    pub fn into_sorted(self) -> Vec<SharedPass> {
        self.into_entries().into_iter().map(|queued| queued.pass).collect()
    }
}

/// Frame counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames that went through setup
    pub frames_prepared: u64,
    /// Frames that were executed
    pub frames_rendered: u64,
    /// Prepared frames dropped without executing
    pub frames_abandoned: u64,
    /// Successful pass executions
    pub passes_executed: u64,
    /// Pass-frames skipped for a zero-sized target
    pub zero_size_skips: u64,
    /// Pass-frames skipped for a handle that was not bound
    pub invalid_handle_skips: u64,
    /// Setup calls that failed for a non-frame-local reason
    pub setup_failures: u64,
    /// Execute calls that failed for a non-frame-local reason
    pub execute_failures: u64,
    /// Features whose activation failed
    pub activation_failures: u64,
}

impl FrameStats {
    fn record_skip(&mut self, error: &PassError) {
        match error {
            PassError::AllocationFailed { .. } => self.zero_size_skips += 1,
            PassError::InvalidHandle(_) => self.invalid_handle_skips += 1,
            _ => {}
        }
    }
}

/// Features attached to a renderer and the per-frame driver for their passes
pub struct FrameScheduler {
    context: ExecutionContext,
    features: Vec<Box<dyn RendererFeature>>,
    /// Features whose pass was disabled after repeated failures
    disabled_features: BTreeSet<String>,
    /// Consecutive failures, keyed by feature name
    failure_counts: BTreeMap<String, u32>,
    max_failures: u32,
    frame: u64,
    stats: FrameStats,
}

impl FrameScheduler {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            features: Vec::new(),
            disabled_features: BTreeSet::new(),
            failure_counts: BTreeMap::new(),
            max_failures: 3,
            frame: 0,
            stats: FrameStats::default(),
        }
    }

    /// Consecutive failures before a pass is disabled
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Attach and activate a feature.
    ///
    /// Returns whether activation succeeded. A feature that fails to activate
    /// is kept, inactive, so it can still be configured and disposed.
    pub fn add_feature(&mut self, backend: &mut dyn RenderBackend, mut feature: Box<dyn RendererFeature>) -> bool {
        let active = match feature.create(backend, self.context) {
            Ok(()) => {
                log::info!("activated feature '{}'", feature.name());
                true
            }
            Err(e) => {
                log::warn!("feature '{}' disabled: {}", feature.name(), e);
                self.stats.activation_failures += 1;
                false
            }
        };
        self.features.push(feature);
        active
    }

    /// Deregister and dispose a feature. Returns whether it was attached.
    pub fn remove_feature(&mut self, backend: &mut dyn RenderBackend, name: &str) -> bool {
        match self.features.iter().position(|f| f.name() == name) {
            Some(index) => {
                let mut feature = self.features.remove(index);
                feature.dispose(backend);
                self.reset_failure_state(name);
                true
            }
            None => false,
        }
    }

    /// Dispose every feature
    pub fn shutdown(&mut self, backend: &mut dyn RenderBackend) {
        for mut feature in self.features.drain(..) {
            feature.dispose(backend);
        }
        self.disabled_features.clear();
        self.failure_counts.clear();
        log::info!("scheduler shut down after {} frames", self.frame);
    }

    pub fn feature(&self, name: &str) -> Option<&dyn RendererFeature> {
        match self.features.iter().find(|f| f.name() == name) {
            Some(feature) => Some(feature.as_ref()),
            None => None,
        }
    }

    pub fn feature_mut(&mut self, name: &str) -> Option<&mut dyn RendererFeature> {
        match self.features.iter_mut().find(|f| f.name() == name) {
            Some(feature) => Some(feature.as_mut()),
            None => None,
        }
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    pub fn set_feature_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(feature) = self.feature_mut(name) {
            feature.set_enabled(enabled);
        }
    }

    /// Current configuration of every feature that exposes one
    pub fn configs(&self) -> Vec<PassConfigData> {
        self.features.iter().filter_map(|f| f.get_config()).collect()
    }

    /// Apply configuration to the feature it names
    pub fn apply_config(&mut self, config: &PassConfigData) -> Result<()> {
        match self.feature_mut(&config.name) {
            Some(feature) => feature.apply_config(config),
            None => Err(PassError::MissingResource(format!("feature '{}'", config.name))),
        }
    }

    /// Whether the named feature's pass was disabled after repeated failures
    pub fn is_feature_disabled(&self, feature: &str) -> bool {
        self.disabled_features.contains(feature)
    }

    /// Clear failure tracking for a feature
    pub fn reset_failure_state(&mut self, feature: &str) {
        self.failure_counts.remove(feature);
        self.disabled_features.remove(feature);
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Index of the next frame to prepare
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Enqueue every applicable pass for `camera` and run their setup.
    ///
    /// Passes whose setup fails are left out of this frame only.
    pub fn setup_camera(&mut self, backend: &mut dyn RenderBackend, camera: &CameraData) -> PreparedFrame<'_> {
        let frame = self.frame;
        self.frame += 1;
        self.stats.frames_prepared += 1;

        let mut queue = PassQueue::new();
        for feature in &self.features {
            if feature.is_active() && feature.is_enabled() && !self.disabled_features.contains(feature.name()) {
                queue.begin_feature(feature.name());
                feature.add_render_passes(&mut queue, camera);
            }
        }

        let setup = FrameSetup::for_camera(frame, camera);
        let mut passes = Vec::with_capacity(queue.len());
        for queued in queue.into_entries() {
            let result = queued.pass.lock().setup(backend, &setup);
            match result {
                Ok(()) => passes.push(queued),
                Err(e) if e.is_frame_local() => {
                    log::debug!("frame {}: '{}' skipped: {}", frame, queued.feature, e);
                    self.stats.record_skip(&e);
                }
                Err(e) => {
                    log::warn!("frame {}: setup of '{}' failed: {}", frame, queued.feature, e);
                    self.stats.setup_failures += 1;
                    self.handle_pass_failure(&queued.feature);
                }
            }
        }

        PreparedFrame {
            scheduler: self,
            frame,
            camera: *camera,
            passes,
            finished: false,
        }
    }

    /// Set up and execute `camera` in one call. Returns passes executed.
    pub fn render_camera(
        &mut self,
        backend: &mut dyn RenderBackend,
        camera: &CameraData,
        cull: &CullResults,
    ) -> usize {
        self.setup_camera(backend, camera).execute(backend, cull)
    }

    fn handle_pass_failure(&mut self, feature: &str) {
        let count = self
            .failure_counts
            .entry(feature.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);

        if *count >= self.max_failures && self.disabled_features.insert(feature.to_string()) {
            log::warn!("feature '{}' disabled after {} failures", feature, count);
        }
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("context", &self.context)
            .field("features", &self.feature_names())
            .field("disabled_features", &self.disabled_features)
            .field("frame", &self.frame)
            .field("stats", &self.stats)
            .finish()
    }
}

/// A camera frame whose passes have been set up but not executed
pub struct PreparedFrame<'s> {
    scheduler: &'s mut FrameScheduler,
    frame: u64,
    camera: CameraData,
    passes: Vec<QueuedPass>,
    finished: bool,
}

impl PreparedFrame<'_> {
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Names of the passes that will execute, in order
    pub fn pass_names(&self) -> Vec<String> {
        self.passes
            .iter()
            .map(|queued| queued.pass.lock().name().to_string())
            .collect()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Execute the prepared passes in order. Returns passes executed.
    pub fn execute(mut self, backend: &mut dyn RenderBackend, cull: &CullResults) -> usize {
        self.finished = true;
        let passes = std::mem::take(&mut self.passes);
        let execute = FrameExecute::for_camera(self.frame, &self.camera, cull);
        let scheduler = &mut *self.scheduler;

        let mut executed = 0;
        for queued in passes {
            let result = queued.pass.lock().execute(backend, &execute);
            match result {
                Ok(()) => {
                    executed += 1;
                    scheduler.failure_counts.remove(&queued.feature);
                }
                Err(e) if e.is_frame_local() => {
                    log::debug!("frame {}: '{}' skipped: {}", self.frame, queued.feature, e);
                    scheduler.stats.record_skip(&e);
                }
                Err(e) => {
                    log::warn!("frame {}: '{}' failed: {}", self.frame, queued.feature, e);
                    scheduler.stats.execute_failures += 1;
                    scheduler.handle_pass_failure(&queued.feature);
                }
            }
        }

        scheduler.stats.frames_rendered += 1;
        scheduler.stats.passes_executed += executed as u64;
        executed
    }
}

impl Drop for PreparedFrame<'_> {
    fn drop(&mut self) {
        if !self.finished {
            log::debug!("frame {} abandoned before execute", self.frame);
            self.scheduler.stats.frames_abandoned += 1;
        }
    }
}
