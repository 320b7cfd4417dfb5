//! The costmap node: lifecycle, background updates, queries and reconfiguration.
//!
//! Two lock domains protect the shared state:
//!
//! - the grid lock, a `RwLock` around the master grid ([`SharedGrid`]). Queries
//!   read-lock it for one lookup; the update loop write-locks it for one
//!   layer's contribution at a time.
//! - the reconfiguration lock, a `Mutex` owning the layered costmap, the
//!   parameters, the publishers and the cycle flags. The update loop holds it
//!   for a whole cycle; parameter changes hold it while they apply.
//!
//! Locks are always taken in the order reconfiguration, then footprint or
//! frames, then grid. Queries never touch the reconfiguration lock.

pub mod cycle;
mod query;
mod reconfigure;
mod scheduler;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use glam::Vec2;
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::config::{CostmapConfig, PluginConfig};
use crate::costmap::{LayerKind, LayeredCostmap, PluginRegistry, SharedGrid};
use crate::footprint::FootprintManager;
use crate::publisher::{CostmapPublisher, PublisherFactory};
use crate::transform::TransformProvider;
use crate::types::{CostmapError, Footprint, PoseStamped};

pub use cycle::{LifecycleState, RunState, publish_due};
pub use query::{CostRequest, CostResponse};
pub use reconfigure::{Parameter, ParameterValue, SetParametersResult};

use cycle::CycleState;

/// Interval between transform checks while activating.
const ACTIVATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What [`CostmapNode::clear_costmap`] resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// The master grid and every layer and filter.
    Entirely,
    /// Clearable layers and filters only; the rest repaint on the next update.
    ExceptStatic,
}

/// Frames used to localize the robot.
#[derive(Debug, Clone)]
pub(crate) struct FrameConfig {
    pub global_frame: String,
    pub robot_base_frame: String,
    pub transform_tolerance: Duration,
}

impl FrameConfig {
    fn from_config(config: &CostmapConfig) -> Self {
        Self {
            global_frame: config.global_frame.clone(),
            robot_base_frame: config.robot_base_frame.clone(),
            transform_tolerance: config.transform_tolerance(),
        }
    }
}

/// Everything guarded by the reconfiguration lock. Exists between configure
/// and cleanup.
pub(crate) struct Engine {
    pub config: CostmapConfig,
    pub layered: LayeredCostmap,
    pub composite: Option<Box<dyn CostmapPublisher>>,
    /// Publishers of layers that keep their own grid, keyed by layer name.
    pub layer_publishers: Vec<(String, Box<dyn CostmapPublisher>)>,
    pub cycle: CycleState,
}

/// State shared between the node handle and the update thread.
pub(crate) struct Shared {
    pub name: String,
    pub transforms: Arc<dyn TransformProvider>,
    pub clock: Arc<dyn Clock>,
    /// The reconfiguration lock.
    pub engine: Mutex<Option<Engine>>,
    /// Signalled with `engine` held at the end of every update cycle.
    pub cycle_done: Condvar,
    /// Handle to the master grid, for queries that must not wait on `engine`.
    pub grid: RwLock<Option<SharedGrid>>,
    pub footprint: RwLock<FootprintManager>,
    pub frames: RwLock<FrameConfig>,
    pub shutdown: Mutex<bool>,
    pub shutdown_signal: Condvar,
}

impl Shared {
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.lock()
    }

    /// Ask the update loop to exit and wake anyone waiting on a cycle.
    fn signal_shutdown(&self) {
        *self.shutdown.lock() = true;
        self.shutdown_signal.notify_all();
        // Take the engine lock so a waiter between its check and its wait
        // cannot miss the wakeup.
        let _engine = self.engine.lock();
        self.cycle_done.notify_all();
    }

    /// Sleep up to `timeout`; returns true if shutdown was requested.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stop = self.shutdown.lock();
        while !*stop {
            if self.shutdown_signal.wait_until(&mut stop, deadline).timed_out() {
                break;
            }
        }
        *stop
    }

    /// Block until an update cycle completed, the engine went away or
    /// shutdown was requested.
    fn wait_initialized(&self, engine: &mut MutexGuard<'_, Option<Engine>>) {
        while engine.as_ref().is_some_and(|e| !e.cycle.initialized) && !self.is_shutdown() {
            self.cycle_done.wait(engine);
        }
    }

    pub fn robot_pose(&self) -> Result<PoseStamped, CostmapError> {
        let frames = self.frames.read().clone();
        let pose = self.transforms.lookup_pose(
            &frames.global_frame,
            &frames.robot_base_frame,
            frames.transform_tolerance,
        )?;
        Ok(PoseStamped::new(frames.global_frame, pose))
    }

    pub fn transform_pose_to_global_frame(
        &self,
        pose: &PoseStamped,
    ) -> Result<PoseStamped, CostmapError> {
        let frames = self.frames.read().clone();
        self.transforms
            .transform_pose(pose, &frames.global_frame, frames.transform_tolerance)
    }
}

/// A live layered costmap.
///
/// All methods take `&self`, so the node can be shared across threads with an
/// `Arc`: the update loop runs on its own thread while queries and parameter
/// changes arrive from others.
pub struct CostmapNode {
    shared: Arc<Shared>,
    config: Mutex<CostmapConfig>,
    plugins: PluginRegistry,
    publisher_factory: Option<PublisherFactory>,
    lifecycle: Mutex<LifecycleState>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CostmapNode {
    pub fn new(
        name: impl Into<String>,
        config: CostmapConfig,
        transforms: Arc<dyn TransformProvider>,
        plugins: PluginRegistry,
    ) -> Self {
        let footprint = FootprintManager::from_radius(
            config.robot_radius as f32,
            config.footprint_padding as f32,
        );
        let shared = Shared {
            name: name.into(),
            transforms,
            clock: Arc::new(SystemClock),
            engine: Mutex::new(None),
            cycle_done: Condvar::new(),
            grid: RwLock::new(None),
            footprint: RwLock::new(footprint),
            frames: RwLock::new(FrameConfig::from_config(&config)),
            shutdown: Mutex::new(false),
            shutdown_signal: Condvar::new(),
        };
        Self {
            shared: Arc::new(shared),
            config: Mutex::new(config),
            plugins,
            publisher_factory: None,
            lifecycle: Mutex::new(LifecycleState::Unconfigured),
            thread: Mutex::new(None),
        }
    }

    /// Use `clock` for publish scheduling instead of wall time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.clock = clock;
        }
        self
    }

    /// Create publishers with `factory` at configure time.
    pub fn with_publishers(mut self, factory: PublisherFactory) -> Self {
        self.publisher_factory = Some(factory);
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> LifecycleState {
        *self.lifecycle.lock()
    }

    /// Current parameters.
    pub fn config(&self) -> CostmapConfig {
        match self.shared.engine.lock().as_ref() {
            Some(engine) => engine.config.clone(),
            None => self.config.lock().clone(),
        }
    }

    // ---- lifecycle ----

    /// Build the grid, load layers and filters, set the footprint and create
    /// the publishers.
    pub fn configure(&self) -> Result<(), CostmapError> {
        let mut lifecycle = self.lifecycle.lock();
        expect_state(*lifecycle, LifecycleState::Unconfigured, "configure")?;
        let name = &self.shared.name;
        log::info!("{name}: configuring");

        let config = self.config.lock().clone();
        for problem in config.validate() {
            log::error!("{name}: {problem}");
        }

        let mut layered = LayeredCostmap::new(
            config.global_frame.clone(),
            config.map_info(),
            config.rolling_window,
            config.track_unknown_space,
        );

        let footprint = FootprintManager::from_params(
            config.robot_radius as f32,
            &config.footprint,
            config.footprint_padding as f32,
        );
        layered.set_footprint(footprint.padded().clone());

        for plugin in &config.plugins {
            self.load_plugin(&mut layered, LayerKind::Layer, plugin)?;
        }
        for filter in &config.filters {
            self.load_plugin(&mut layered, LayerKind::Filter, filter)?;
        }

        let (composite, layer_publishers) = match &self.publisher_factory {
            Some(factory) => {
                let composite = factory(&format!("{name}/costmap"), &config.global_frame);
                let per_layer = layered
                    .registry()
                    .iter()
                    .filter(|entry| entry.layer.costmap().is_some())
                    .map(|entry| {
                        let topic = format!("{name}/{}", entry.name);
                        (entry.name.clone(), factory(&topic, &config.global_frame))
                    })
                    .collect();
                (Some(composite), per_layer)
            }
            None => (None, Vec::new()),
        };

        let mut engine = self.shared.engine.lock();
        *self.shared.footprint.write() = footprint;
        *self.shared.frames.write() = FrameConfig::from_config(&config);
        *self.shared.grid.write() = Some(Arc::clone(layered.grid()));
        *engine = Some(Engine {
            cycle: CycleState::new(config.publish_period()),
            config,
            layered,
            composite,
            layer_publishers,
        });
        drop(engine);

        *lifecycle = LifecycleState::Inactive;
        log::info!("{name}: configured");
        Ok(())
    }

    fn load_plugin(
        &self,
        layered: &mut LayeredCostmap,
        kind: LayerKind,
        plugin: &PluginConfig,
    ) -> Result<(), CostmapError> {
        log::info!(
            "{}: using {} \"{}\" of type {}",
            self.shared.name,
            if kind == LayerKind::Filter { "filter" } else { "plugin" },
            plugin.name,
            plugin.plugin
        );
        let layer = self.plugins.create(&plugin.plugin)?;
        layered.add_plugin(
            kind,
            &plugin.name,
            layer,
            Arc::clone(&self.shared.transforms),
            &plugin.params,
        )?;
        log::info!("{}: initialized {}", self.shared.name, plugin.name);
        Ok(())
    }

    /// Wait for the robot to be localizable, start the update loop and block
    /// until the first update completed.
    pub fn activate(&self) -> Result<(), CostmapError> {
        let mut lifecycle = self.lifecycle.lock();
        expect_state(*lifecycle, LifecycleState::Inactive, "activate")?;
        let name = &self.shared.name;
        log::info!("{name}: activating");

        let (timeout, update_period) = {
            let engine = self.shared.engine.lock();
            let config = &engine.as_ref().ok_or(CostmapError::NotConfigured)?.config;
            if config.update_frequency < 0.0 {
                log::warn!(
                    "{name}: update_frequency {} is negative, the update loop is disabled",
                    config.update_frequency
                );
            }
            (config.initial_transform_timeout(), config.update_period())
        };
        self.wait_for_transform(timeout)?;

        {
            let mut engine = self.shared.engine.lock();
            if let Some(engine) = engine.as_mut() {
                if let Some(publisher) = engine.composite.as_mut() {
                    publisher.on_activate();
                }
                for (_, publisher) in &mut engine.layer_publishers {
                    publisher.on_activate();
                }
            }
        }

        *self.shared.shutdown.lock() = false;
        match update_period {
            Some(period) => {
                let handle = scheduler::spawn(Arc::clone(&self.shared), period)?;
                *self.thread.lock() = Some(handle);
            }
            None => log::info!("{name}: update_frequency is 0, no background updates"),
        }

        self.start();
        *lifecycle = LifecycleState::Active;
        log::info!("{name}: active");
        Ok(())
    }

    fn wait_for_transform(&self, timeout: Duration) -> Result<(), CostmapError> {
        let frames = self.shared.frames.read().clone();
        let started = Instant::now();
        loop {
            if self.shared.transforms.can_transform(
                &frames.global_frame,
                &frames.robot_base_frame,
                Duration::ZERO,
            ) {
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                log::error!(
                    "{}: transform from {} to {} did not become available within {:?}",
                    self.shared.name,
                    frames.robot_base_frame,
                    frames.global_frame,
                    timeout
                );
                return Err(CostmapError::TransformTimeout {
                    global_frame: frames.global_frame,
                    robot_base_frame: frames.robot_base_frame,
                    timeout,
                });
            }
            log::info!(
                "{}: waiting for transform from {} to {}",
                self.shared.name,
                frames.robot_base_frame,
                frames.global_frame
            );
            thread::sleep(ACTIVATION_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    /// Stop updates and join the update loop.
    pub fn deactivate(&self) -> Result<(), CostmapError> {
        let mut lifecycle = self.lifecycle.lock();
        expect_state(*lifecycle, LifecycleState::Active, "deactivate")?;
        log::info!("{}: deactivating", self.shared.name);

        self.stop();
        self.join_update_loop();

        if let Some(engine) = self.shared.engine.lock().as_mut() {
            if let Some(publisher) = engine.composite.as_mut() {
                publisher.on_deactivate();
            }
            for (_, publisher) in &mut engine.layer_publishers {
                publisher.on_deactivate();
            }
        }

        *lifecycle = LifecycleState::Inactive;
        Ok(())
    }

    /// Drop layers, publishers and the grid.
    pub fn cleanup(&self) -> Result<(), CostmapError> {
        let mut lifecycle = self.lifecycle.lock();
        expect_state(*lifecycle, LifecycleState::Inactive, "cleanup")?;
        log::info!("{}: cleaning up", self.shared.name);

        if let Some(engine) = self.shared.engine.lock().take() {
            // Parameters outlive the configuration.
            *self.config.lock() = engine.config;
        }
        *self.shared.grid.write() = None;

        *lifecycle = LifecycleState::Unconfigured;
        Ok(())
    }

    /// Tear down from any state. Further transitions are rejected.
    pub fn shutdown(&self) -> Result<(), CostmapError> {
        if self.state() == LifecycleState::Active {
            self.deactivate()?;
        }
        if self.state() == LifecycleState::Inactive {
            self.cleanup()?;
        }
        let mut lifecycle = self.lifecycle.lock();
        expect_not_finalized(*lifecycle, "shutdown")?;
        log::info!("{}: shutting down", self.shared.name);
        *lifecycle = LifecycleState::Finalized;
        Ok(())
    }

    fn join_update_loop(&self) {
        self.shared.signal_shutdown();
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("{}: update loop panicked", self.shared.name);
            }
        }
    }

    fn update_loop_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ---- run control ----

    /// Activate layers if stopped, resume updates and block until one update
    /// cycle has completed.
    pub fn start(&self) {
        let wait = self.update_loop_running();
        let mut guard = self.shared.engine.lock();
        let Some(engine) = guard.as_mut() else {
            log::warn!("{}: start requested before configure", self.shared.name);
            return;
        };
        log::info!("{}: start", self.shared.name);
        if engine.cycle.stopped {
            engine.layered.registry_mut().activate_all();
            engine.cycle.stopped = false;
        }
        engine.cycle.stop_updates = false;
        engine.cycle.initialized = false;
        if wait {
            self.shared.wait_initialized(&mut guard);
        }
    }

    /// Stop updates and deactivate every layer. A no-op before configure.
    pub fn stop(&self) {
        let mut guard = self.shared.engine.lock();
        let Some(engine) = guard.as_mut() else {
            return;
        };
        log::info!("{}: stop", self.shared.name);
        engine.cycle.stop_updates = true;
        engine.layered.registry_mut().deactivate_all();
        engine.cycle.initialized = false;
        engine.cycle.stopped = true;
    }

    /// Keep layers active but skip all grid writes.
    pub fn pause(&self) {
        if let Some(engine) = self.shared.engine.lock().as_mut() {
            log::info!("{}: pause", self.shared.name);
            engine.cycle.stop_updates = true;
            engine.cycle.initialized = false;
        }
    }

    /// Undo [`pause`](Self::pause) and block until one update cycle has completed.
    ///
    /// Does nothing once stopped: layers are inactive until [`start`](Self::start).
    pub fn resume(&self) {
        let wait = self.update_loop_running();
        let mut guard = self.shared.engine.lock();
        let Some(engine) = guard.as_mut() else {
            return;
        };
        if engine.cycle.stopped {
            log::warn!("{}: resume requested while stopped, call start", self.shared.name);
            return;
        }
        log::info!("{}: resume", self.shared.name);
        engine.cycle.stop_updates = false;
        engine.cycle.initialized = false;
        if wait {
            self.shared.wait_initialized(&mut guard);
        }
    }

    pub fn run_state(&self) -> RunState {
        self.shared
            .engine
            .lock()
            .as_ref()
            .map_or(RunState::Stopped, |e| e.cycle.run_state())
    }

    /// True once an update completed since the last start or resume.
    pub fn is_initialized(&self) -> bool {
        self.shared
            .engine
            .lock()
            .as_ref()
            .is_some_and(|e| e.cycle.initialized)
    }

    /// Run one update pass now, outside the loop. Returns whether the grid
    /// was updated (false while paused or when the robot pose is unavailable).
    pub fn update_map(&self) -> Result<bool, CostmapError> {
        let mut guard = self.shared.engine.lock();
        let engine = guard.as_mut().ok_or(CostmapError::NotConfigured)?;
        let updated = self.shared.update_map(engine);
        self.shared.cycle_done.notify_all();
        Ok(updated)
    }

    /// Block until an update has completed and every layer reports current.
    pub fn wait_until_current(&self, timeout: Duration) -> Result<(), CostmapError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.engine.lock();
        loop {
            let engine = guard.as_ref().ok_or(CostmapError::NotConfigured)?;
            if engine.cycle.initialized && engine.layered.is_current() {
                return Ok(());
            }
            if self.shared.is_shutdown()
                || self
                    .shared
                    .cycle_done
                    .wait_until(&mut guard, deadline)
                    .timed_out()
            {
                return Err(CostmapError::NotCurrent(timeout));
            }
        }
    }

    // ---- grid access ----

    /// The master grid and its lock, once configured.
    pub fn costmap(&self) -> Option<SharedGrid> {
        self.shared.grid.read().clone()
    }

    /// Run `f` on the layered costmap under the reconfiguration lock.
    pub fn with_layered<R>(&self, f: impl FnOnce(&LayeredCostmap) -> R) -> Option<R> {
        self.shared.engine.lock().as_ref().map(|e| f(&e.layered))
    }

    /// Reset the master grid and layers.
    pub fn clear_costmap(&self, mode: ClearMode) -> Result<(), CostmapError> {
        let mut guard = self.shared.engine.lock();
        let engine = guard.as_mut().ok_or(CostmapError::NotConfigured)?;
        log::info!("{}: clearing costmap ({mode:?})", self.shared.name);
        match mode {
            ClearMode::Entirely => engine.layered.reset_layers(),
            ClearMode::ExceptStatic => engine.layered.reset_clearable_layers(),
        }
        Ok(())
    }

    // ---- poses and footprint ----

    pub fn global_frame(&self) -> String {
        self.shared.frames.read().global_frame.clone()
    }

    pub fn robot_base_frame(&self) -> String {
        self.shared.frames.read().robot_base_frame.clone()
    }

    /// Robot pose in the global frame.
    pub fn robot_pose(&self) -> Result<PoseStamped, CostmapError> {
        self.shared.robot_pose()
    }

    /// Re-express `pose` in the global frame. Poses already in it are
    /// returned unchanged.
    pub fn transform_pose_to_global_frame(
        &self,
        pose: &PoseStamped,
    ) -> Result<PoseStamped, CostmapError> {
        self.shared.transform_pose_to_global_frame(pose)
    }

    pub fn padded_footprint(&self) -> Footprint {
        self.shared.footprint.read().padded().clone()
    }

    pub fn unpadded_footprint(&self) -> Footprint {
        self.shared.footprint.read().unpadded().clone()
    }

    /// The padded footprint at the current robot pose, or `None` when the
    /// pose is unavailable.
    pub fn oriented_footprint(&self) -> Option<Vec<Vec2>> {
        let pose = self.shared.robot_pose().ok()?;
        Some(self.shared.footprint.read().oriented(pose.pose))
    }

    /// Replace the footprint with an explicit polygon (robot frame).
    pub fn set_footprint_polygon(&self, points: Vec<Vec2>) -> Result<(), CostmapError> {
        let footprint = Footprint::new(points);
        if !footprint.is_valid() {
            return Err(CostmapError::InvalidFootprint(format!(
                "need at least 3 points, got {}",
                footprint.points.len()
            )));
        }
        let mut guard = self.shared.engine.lock();
        let engine = guard.as_mut().ok_or(CostmapError::NotConfigured)?;
        let padded = {
            let mut manager = self.shared.footprint.write();
            manager.set_footprint(footprint);
            manager.padded().clone()
        };
        engine.layered.set_footprint(padded);
        Ok(())
    }
}

impl Drop for CostmapNode {
    fn drop(&mut self) {
        self.stop();
        self.join_update_loop();
    }
}

fn expect_state(
    current: LifecycleState,
    expected: LifecycleState,
    transition: &str,
) -> Result<(), CostmapError> {
    if current == expected {
        Ok(())
    } else {
        Err(CostmapError::InvalidTransition(format!(
            "cannot {transition} from {current:?}, expected {expected:?}"
        )))
    }
}

fn expect_not_finalized(current: LifecycleState, transition: &str) -> Result<(), CostmapError> {
    if current == LifecycleState::Finalized {
        Err(CostmapError::InvalidTransition(format!(
            "cannot {transition} from {current:?}"
        )))
    } else {
        Ok(())
    }
}
