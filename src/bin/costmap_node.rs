use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use costmap_runtime::types::COST_LETHAL;
use costmap_runtime::{
    ChannelPublisher, CostmapConfig, CostmapMessage, CostmapNode, PluginRegistry, Pose2,
    StaticTransformTree,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let mut args = std::env::args();
    let _binary = args.next();
    let Some(config_path) = args.next() else {
        eprintln!("usage: costmap_node <costmap.yaml> [seconds]");
        return Ok(());
    };
    let run_for = match args.next() {
        Some(seconds) => Duration::from_secs_f64(seconds.parse()?),
        None => Duration::from_secs(5),
    };

    let config = CostmapConfig::from_file(&config_path)?;
    let always_send_full = config.always_send_full_costmap;

    // The robot sits still at the centre of the configured window.
    let transforms = Arc::new(StaticTransformTree::new());
    let center = config.map_info().world_center();
    transforms.set_transform(
        config.global_frame.clone(),
        config.robot_base_frame.clone(),
        Pose2::new(center, 0.0),
    );

    let (factory, updates) = ChannelPublisher::factory(always_send_full);
    let node = CostmapNode::new(
        "costmap",
        config,
        transforms,
        PluginRegistry::with_builtin(),
    )
    .with_publishers(factory);

    node.configure()?;
    node.activate()?;

    let deadline = Instant::now() + run_for;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match updates.recv_timeout(remaining) {
            Ok(CostmapMessage::Full {
                topic, info, data, ..
            }) => {
                let lethal = data.iter().filter(|&&c| c == COST_LETHAL).count();
                log::info!(
                    "{topic}: full {}x{} grid, {lethal} lethal cells",
                    info.width,
                    info.height
                );
            }
            Ok(CostmapMessage::Partial { topic, region, .. }) => {
                log::info!(
                    "{topic}: partial update {}x{} at ({}, {})",
                    region.width(),
                    region.height(),
                    region.min.x,
                    region.min.y
                );
            }
            Ok(CostmapMessage::Footprint { .. }) => {}
            Err(_) => break,
        }
    }

    node.shutdown()?;
    Ok(())
}
