use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostmapError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
    #[error("invalid footprint: {0}")]
    InvalidFootprint(String),
    #[error("unknown plugin type \"{0}\"")]
    UnknownPluginType(String),
    #[error("failed to initialize plugin \"{name}\": {reason}")]
    PluginInit { name: String, reason: String },
    #[error("transform from {source_frame} to {target_frame} failed: {reason}")]
    Transform {
        target_frame: String,
        source_frame: String,
        reason: String,
    },
    #[error(
        "transform from {robot_base_frame} to {global_frame} did not become available within {timeout:?}"
    )]
    TransformTimeout {
        global_frame: String,
        robot_base_frame: String,
        timeout: Duration,
    },
    #[error("costmap has not been configured")]
    NotConfigured,
    #[error("invalid lifecycle transition: {0}")]
    InvalidTransition(String),
    #[error("invalid parameter \"{name}\": {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("timed out after {0:?} waiting for the costmap to become current")]
    NotCurrent(Duration),
}
