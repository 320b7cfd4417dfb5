//! Outbound costmap updates.
//!
//! The update loop feeds each publisher the merged dirty region of every cycle
//! through [`CostmapPublisher::update_bounds`] and calls
//! [`CostmapPublisher::publish`] whenever the publish period has elapsed. How
//! the data leaves the process is up to the implementation;
//! [`ChannelPublisher`] forwards it over a `crossbeam-channel`.

use crossbeam_channel::{Receiver, Sender};
use glam::Vec2;

use crate::costmap::Costmap;
use crate::types::{CellRegion, MapInfo};

/// Publishes one costmap (the composite or a single layer's private grid).
pub trait CostmapPublisher: Send {
    /// Name of the published stream, e.g. `"costmap"` or a layer name.
    fn topic(&self) -> &str;

    fn on_activate(&mut self) {}

    fn on_deactivate(&mut self) {}

    /// Accumulate a cell region that changed since the last publish.
    fn update_bounds(&mut self, region: CellRegion);

    /// Send the accumulated changes of `costmap`. `stamp` is clock seconds.
    fn publish(&mut self, costmap: &Costmap, stamp: f64);

    /// Send the robot footprint placed at the current pose (world coordinates).
    fn publish_footprint(&mut self, _footprint: &[Vec2], _stamp: f64) {}
}

/// Builds a publisher for a topic name in a frame.
pub type PublisherFactory = Box<dyn Fn(&str, &str) -> Box<dyn CostmapPublisher> + Send + Sync>;

/// A message emitted by [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub enum CostmapMessage {
    /// The whole grid.
    Full {
        topic: String,
        frame_id: String,
        stamp: f64,
        info: MapInfo,
        data: Vec<u8>,
    },
    /// Only the cells inside `region`, row-major.
    Partial {
        topic: String,
        frame_id: String,
        stamp: f64,
        region: CellRegion,
        data: Vec<u8>,
    },
    Footprint {
        topic: String,
        frame_id: String,
        stamp: f64,
        points: Vec<Vec2>,
    },
}

impl CostmapMessage {
    pub fn topic(&self) -> &str {
        match self {
            Self::Full { topic, .. }
            | Self::Partial { topic, .. }
            | Self::Footprint { topic, .. } => topic,
        }
    }
}

/// Sends full or partial costmap updates over a channel.
///
/// The first publish after activation and any publish after the grid geometry
/// changed send the full grid; otherwise only the accumulated dirty region is
/// sent, unless `always_send_full` is set.
#[derive(Debug)]
pub struct ChannelPublisher {
    topic: String,
    frame_id: String,
    always_send_full: bool,
    active: bool,
    dirty: CellRegion,
    last_info: Option<MapInfo>,
    sender: Sender<CostmapMessage>,
}

impl ChannelPublisher {
    pub fn new(
        topic: impl Into<String>,
        frame_id: impl Into<String>,
        always_send_full: bool,
        sender: Sender<CostmapMessage>,
    ) -> Self {
        Self {
            topic: topic.into(),
            frame_id: frame_id.into(),
            always_send_full,
            active: false,
            dirty: CellRegion::empty(),
            last_info: None,
            sender,
        }
    }

    /// A factory whose publishers all feed one channel, and its receiving end.
    pub fn factory(always_send_full: bool) -> (PublisherFactory, Receiver<CostmapMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let factory: PublisherFactory = Box::new(move |topic, frame_id| {
            Box::new(ChannelPublisher::new(
                topic,
                frame_id,
                always_send_full,
                tx.clone(),
            ))
        });
        (factory, rx)
    }

    fn send(&self, message: CostmapMessage) {
        if self.sender.send(message).is_err() {
            log::debug!("{}: no receiver for costmap updates", self.topic);
        }
    }
}

impl CostmapPublisher for ChannelPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn on_activate(&mut self) {
        self.active = true;
        self.last_info = None;
    }

    fn on_deactivate(&mut self) {
        self.active = false;
    }

    fn update_bounds(&mut self, region: CellRegion) {
        self.dirty = self.dirty.union(&region);
    }

    fn publish(&mut self, costmap: &Costmap, stamp: f64) {
        if !self.active {
            return;
        }

        let info = *costmap.info();
        let needs_full = self.always_send_full || self.last_info != Some(info);
        let message = if needs_full {
            self.last_info = Some(info);
            CostmapMessage::Full {
                topic: self.topic.clone(),
                frame_id: self.frame_id.clone(),
                stamp,
                info,
                data: costmap.data().to_vec(),
            }
        } else {
            let region = CellRegion::new(
                self.dirty.min,
                self.dirty.max.min(glam::UVec2::new(info.width, info.height)),
            );
            if region.is_empty() {
                return;
            }
            let width = info.width as usize;
            let mut data = Vec::with_capacity((region.width() * region.height()) as usize);
            for y in region.min.y..region.max.y {
                let row = y as usize * width;
                data.extend_from_slice(
                    &costmap.data()[row + region.min.x as usize..row + region.max.x as usize],
                );
            }
            CostmapMessage::Partial {
                topic: self.topic.clone(),
                frame_id: self.frame_id.clone(),
                stamp,
                region,
                data,
            }
        };

        self.dirty = CellRegion::empty();
        self.send(message);
    }

    fn publish_footprint(&mut self, footprint: &[Vec2], stamp: f64) {
        if !self.active {
            return;
        }
        self.send(CostmapMessage::Footprint {
            topic: format!("{}/footprint", self.topic),
            frame_id: self.frame_id.clone(),
            stamp,
            points: footprint.to_vec(),
        });
    }
}
