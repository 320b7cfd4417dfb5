//! The background update loop.
//!
//! One thread per active node. Each cycle takes the reconfiguration lock,
//! updates the layered costmap at the current robot pose, and publishes when
//! the publish period has elapsed. The rest of the period is spent waiting on
//! the shutdown signal, so deactivation never waits longer than one cycle.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::cycle::publish_due;
use super::{Engine, Shared};

pub(crate) fn spawn(shared: Arc<Shared>, period: Duration) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{}-update", shared.name))
        .spawn(move || update_loop(&shared, period))
}

fn update_loop(shared: &Shared, period: Duration) {
    log::debug!(
        "{}: update loop running every {:.3}s",
        shared.name,
        period.as_secs_f64()
    );

    while !shared.is_shutdown() {
        let started = Instant::now();
        shared.run_cycle();
        let elapsed = started.elapsed();

        if elapsed > period {
            log::warn!(
                "{}: map update loop missed its desired rate of {:.4}Hz, the loop actually took {:.4} seconds",
                shared.name,
                1.0 / period.as_secs_f64(),
                elapsed.as_secs_f64()
            );
            continue;
        }
        if shared.wait_for_shutdown(period - elapsed) {
            break;
        }
    }

    log::info!("{}: update loop exiting", shared.name);
}

impl Shared {
    /// One update-and-publish transaction under the reconfiguration lock.
    pub(crate) fn run_cycle(&self) {
        let mut guard = self.engine.lock();
        let Some(engine) = guard.as_mut() else {
            return;
        };
        if engine.cycle.stopped {
            return;
        }

        let started = Instant::now();
        self.update_map(engine);
        log::debug!(
            "{}: map update time: {:.6}s",
            self.name,
            started.elapsed().as_secs_f64()
        );

        if engine.cycle.publish_period.is_some() && engine.layered.is_initialized() {
            self.publish(engine, false);
        }

        self.cycle_done.notify_all();
    }

    /// Update the grid at the current robot pose. Skipped while paused or
    /// when the pose cannot be looked up, leaving the previous grid in place.
    pub(crate) fn update_map(&self, engine: &mut Engine) -> bool {
        if engine.cycle.stop_updates {
            return false;
        }

        let pose = match self.robot_pose() {
            Ok(pose) => pose,
            Err(e) => {
                log::warn!("{}: skipping update, no robot pose: {e}", self.name);
                return false;
            }
        };

        engine.layered.update_map(pose.pose);

        let footprint = self.footprint.read().oriented(pose.pose);
        if let Some(publisher) = engine.composite.as_mut() {
            publisher.publish_footprint(&footprint, self.clock.now());
        }

        engine.cycle.initialized = true;
        true
    }

    /// Hand the last update region to every publisher and publish when due,
    /// or unconditionally with `force`.
    pub(crate) fn publish(&self, engine: &mut Engine, force: bool) {
        let region = engine.layered.updated_region();
        if let Some(publisher) = engine.composite.as_mut() {
            publisher.update_bounds(region);
        }
        for (_, publisher) in &mut engine.layer_publishers {
            publisher.update_bounds(region);
        }

        let now = self.clock.now();
        if !force && !publish_due(now, engine.cycle.last_publish, engine.cycle.publish_period) {
            return;
        }

        log::debug!("{}: publishing costmap", self.name);
        if let Some(publisher) = engine.composite.as_mut() {
            let master = engine.layered.grid().read();
            publisher.publish(&master, now);
        }
        for (name, publisher) in &mut engine.layer_publishers {
            let costmap = engine
                .layered
                .registry()
                .iter()
                .find(|entry| entry.name == *name)
                .and_then(|entry| entry.layer.costmap());
            if let Some(costmap) = costmap {
                publisher.publish(costmap, now);
            }
        }
        engine.cycle.last_publish = now;
    }
}
