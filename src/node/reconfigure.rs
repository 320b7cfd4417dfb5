//! Runtime parameter changes.
//!
//! A batch is first applied to a staged copy of the parameters, one handler
//! per parameter name. Any rejection leaves the live state untouched. Once
//! every change passed, the batch is committed under the reconfiguration
//! lock: frames, publish rate and footprint first, then a resize of the grid
//! followed by an immediate update and publish.

use std::time::Duration;

use crate::config::CostmapConfig;

use super::{CostmapNode, Engine, FrameConfig};

/// How long a new `robot_base_frame` may take to become reachable.
const BASE_FRAME_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, ParameterValue::Double(value))
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, ParameterValue::Integer(value))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, ParameterValue::String(value.into()))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, ParameterValue::Bool(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetParametersResult {
    pub successful: bool,
    /// Why the batch was rejected, or non-fatal problems of an accepted batch.
    pub reason: String,
}

impl SetParametersResult {
    fn accepted(notes: Vec<String>) -> Self {
        Self {
            successful: true,
            reason: notes.join("; "),
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            successful: false,
            reason: reason.into(),
        }
    }
}

/// Parameters as they will be once the batch commits.
#[derive(Debug)]
struct Staged {
    config: CostmapConfig,
    resize: bool,
    radius_changed: bool,
    padding_changed: bool,
    footprint: Option<String>,
    base_frame_changed: bool,
}

impl Staged {
    fn new(config: CostmapConfig) -> Self {
        Self {
            config,
            resize: false,
            radius_changed: false,
            padding_changed: false,
            footprint: None,
            base_frame_changed: false,
        }
    }
}

type Handler = fn(&mut Staged, &ParameterValue) -> Result<(), String>;

/// Parameters that may change at runtime. Anything else is ignored.
const HANDLERS: &[(&str, Handler)] = &[
    ("robot_radius", set_robot_radius),
    ("footprint_padding", set_footprint_padding),
    ("transform_tolerance", set_transform_tolerance),
    ("publish_frequency", set_publish_frequency),
    ("resolution", set_resolution),
    ("origin_x", set_origin_x),
    ("origin_y", set_origin_y),
    ("width", set_width),
    ("height", set_height),
    ("footprint", set_footprint),
    ("robot_base_frame", set_robot_base_frame),
];

fn as_double(value: &ParameterValue) -> Result<f64, String> {
    match value {
        ParameterValue::Double(v) => Ok(*v),
        ParameterValue::Integer(v) => Ok(*v as f64),
        other => Err(format!("expected a number, got {other:?}")),
    }
}

fn as_positive(value: &ParameterValue) -> Result<f64, String> {
    let v = as_double(value)?;
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(format!("must be positive, got {v}"))
    }
}

fn as_string(value: &ParameterValue) -> Result<&str, String> {
    match value {
        ParameterValue::String(s) => Ok(s),
        other => Err(format!("expected a string, got {other:?}")),
    }
}

fn as_finite(value: &ParameterValue) -> Result<f64, String> {
    let v = as_double(value)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("must be finite, got {v}"))
    }
}

fn set_robot_radius(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.robot_radius = as_finite(value)?;
    staged.radius_changed = true;
    Ok(())
}

fn set_footprint_padding(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.footprint_padding = as_finite(value)?;
    staged.padding_changed = true;
    Ok(())
}

fn set_transform_tolerance(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    let v = as_finite(value)?;
    if v < 0.0 {
        return Err(format!("must not be negative, got {v}"));
    }
    staged.config.transform_tolerance = v;
    Ok(())
}

fn set_publish_frequency(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.publish_frequency = as_finite(value)?;
    Ok(())
}

fn set_resolution(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.resolution = as_positive(value)?;
    staged.resize = true;
    Ok(())
}

fn set_origin_x(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.origin_x = as_finite(value)?;
    staged.resize = true;
    Ok(())
}

fn set_origin_y(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.origin_y = as_finite(value)?;
    staged.resize = true;
    Ok(())
}

fn set_width(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.width = as_positive(value)?;
    staged.resize = true;
    Ok(())
}

fn set_height(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    staged.config.height = as_positive(value)?;
    staged.resize = true;
    Ok(())
}

fn set_footprint(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    let footprint = as_string(value)?.to_string();
    staged.config.footprint = footprint.clone();
    staged.footprint = Some(footprint);
    Ok(())
}

fn set_robot_base_frame(staged: &mut Staged, value: &ParameterValue) -> Result<(), String> {
    let frame = as_string(value)?;
    if frame.is_empty() {
        return Err("must not be empty".to_string());
    }
    staged.config.robot_base_frame = frame.to_string();
    staged.base_frame_changed = true;
    Ok(())
}

impl CostmapNode {
    /// Apply a batch of parameter changes atomically.
    pub fn set_parameters(&self, parameters: &[Parameter]) -> SetParametersResult {
        let name = self.name();
        let mut guard = self.shared.engine.lock();
        let Some(engine) = guard.as_mut() else {
            return SetParametersResult::rejected("costmap is not configured");
        };

        let mut staged = Staged::new(engine.config.clone());
        for parameter in parameters {
            // Dotted names belong to plugins.
            if parameter.name.contains('.') {
                continue;
            }
            let Some((_, handler)) = HANDLERS.iter().find(|(n, _)| *n == parameter.name) else {
                log::debug!("{name}: ignoring parameter {}", parameter.name);
                continue;
            };
            if let Err(reason) = handler(&mut staged, &parameter.value) {
                let reason = format!("{}: {reason}", parameter.name);
                log::warn!("{name}: rejecting parameter change, {reason}");
                return SetParametersResult::rejected(reason);
            }
        }

        if let Err(reason) = self.validate(engine, &staged) {
            log::warn!("{name}: rejecting parameter change, {reason}");
            return SetParametersResult::rejected(reason);
        }

        let notes = self.commit(engine, staged);
        SetParametersResult::accepted(notes)
    }

    /// Checks that need live state: the size lock and frame availability.
    fn validate(&self, engine: &Engine, staged: &Staged) -> Result<(), String> {
        if staged.resize {
            if engine.layered.is_size_locked() {
                return Err("the costmap size is locked, geometry cannot change".to_string());
            }
            let info = staged.config.map_info();
            if info.width == 0 || info.height == 0 {
                return Err(format!(
                    "{} x {} m at {} m/cell gives an empty grid",
                    staged.config.width, staged.config.height, staged.config.resolution
                ));
            }
        }

        if staged.base_frame_changed {
            let global_frame = &staged.config.global_frame;
            let base_frame = &staged.config.robot_base_frame;
            log::info!("{}: checking transform from {base_frame} to {global_frame}", self.name());
            if !self
                .shared
                .transforms
                .can_transform(global_frame, base_frame, BASE_FRAME_CHECK_TIMEOUT)
            {
                let previous = self.shared.frames.read().robot_base_frame.clone();
                return Err(format!(
                    "transform from {base_frame} to {global_frame} is not available, keeping robot_base_frame {previous}"
                ));
            }
        }
        Ok(())
    }

    /// Apply a validated batch. Returns non-fatal problems.
    fn commit(&self, engine: &mut Engine, staged: Staged) -> Vec<String> {
        let mut notes = Vec::new();
        let config = staged.config;

        *self.shared.frames.write() = FrameConfig::from_config(&config);
        engine.cycle.publish_period = config.publish_period();

        if staged.footprint.is_some() || staged.radius_changed || staged.padding_changed {
            let padded = {
                let mut manager = self.shared.footprint.write();
                let radius = config.robot_radius as f32;
                if let Some(footprint) = &staged.footprint {
                    if let Err(e) = manager.set_footprint_string(footprint, radius) {
                        log::error!("{}: {e}, keeping the previous footprint", self.name());
                        notes.push(e.to_string());
                    }
                }
                if staged.radius_changed {
                    manager.set_radius(radius);
                }
                if staged.padding_changed {
                    manager.set_padding(config.footprint_padding as f32);
                }
                manager.padded().clone()
            };
            engine.layered.set_footprint(padded);
        }

        let resize = staged.resize.then(|| config.map_info());
        engine.config = config;

        if let Some(info) = resize {
            log::info!(
                "{}: resizing costmap to {}x{} at {} m/cell",
                self.name(),
                info.width,
                info.height,
                info.resolution
            );
            // Pose first: the frames lock is never taken under the grid lock.
            let pose = self.shared.robot_pose().ok();
            let grid = std::sync::Arc::clone(engine.layered.grid());
            {
                // Queries wait until the new geometry is populated.
                let mut master = grid.write();
                engine.layered.resize_map_locked(&mut master, info, false);
                if let Some(pose) = pose.filter(|_| !engine.cycle.stop_updates) {
                    engine.layered.update_map_locked(&mut master, pose.pose);
                }
            }
            if engine.cycle.publish_period.is_some() {
                self.shared.publish(engine, true);
            }
        }

        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged() -> Staged {
        Staged::new(CostmapConfig::default())
    }

    #[test]
    fn integers_are_accepted_for_doubles() {
        let mut s = staged();
        set_width(&mut s, &ParameterValue::Integer(8)).unwrap();
        assert_eq!(s.config.width, 8.0);
        assert!(s.resize);
    }

    #[test]
    fn non_positive_geometry_is_rejected() {
        let mut s = staged();
        assert!(set_width(&mut s, &ParameterValue::Integer(0)).is_err());
        assert!(set_height(&mut s, &ParameterValue::Double(-1.0)).is_err());
        assert!(set_resolution(&mut s, &ParameterValue::Double(0.0)).is_err());
        assert_eq!(s.config.width, CostmapConfig::default().width);
        assert!(!s.resize);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let mut s = staged();
        assert!(set_robot_radius(&mut s, &ParameterValue::String("big".into())).is_err());
        assert!(set_footprint(&mut s, &ParameterValue::Double(1.0)).is_err());
        assert!(set_robot_base_frame(&mut s, &ParameterValue::Bool(true)).is_err());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut s = staged();
        let nan = ParameterValue::Double(f64::NAN);
        assert!(set_robot_radius(&mut s, &nan).is_err());
        assert!(set_footprint_padding(&mut s, &nan).is_err());
        assert!(set_origin_x(&mut s, &ParameterValue::Double(f64::INFINITY)).is_err());
        assert!(set_transform_tolerance(&mut s, &nan).is_err());
        assert!(!s.radius_changed && !s.padding_changed && !s.resize);
        assert_eq!(s.config.robot_radius, CostmapConfig::default().robot_radius);
    }

    #[test]
    fn footprint_is_staged_verbatim() {
        let mut s = staged();
        set_footprint(&mut s, &ParameterValue::String("[[1, 1], [1, -1], [-1, 0]]".into()))
            .unwrap();
        assert_eq!(s.footprint.as_deref(), Some("[[1, 1], [1, -1], [-1, 0]]"));
    }

    #[test]
    fn every_handler_name_is_unique() {
        let mut names: Vec<_> = HANDLERS.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), HANDLERS.len());
    }
}
