mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use costmap_runtime::types::{COST_FREE, COST_LETHAL, NO_INFORMATION};
use costmap_runtime::{CostRequest, CostmapConfig, CostmapNode, Parameter, Pose2, PoseStamped};

use common::{keepout_config, node_with, transforms_at};

fn pose(frame: &str, x: f32, y: f32) -> PoseStamped {
    PoseStamped::new(frame, Pose2::from_xy_yaw(x, y, 0.0))
}

fn painted_node() -> CostmapNode {
    let node = node_with(keepout_config(), transforms_at(2.5, 2.5));
    node.configure().expect("configure");
    node.activate().expect("activate");
    node.update_map().expect("configured");
    node
}

#[test]
fn unconfigured_node_reports_no_information() {
    let node = node_with(CostmapConfig::default(), transforms_at(1.0, 1.0));
    let response = node.get_costs(&CostRequest::points(vec![
        pose("map", 1.0, 1.0),
        pose("map", 2.0, 2.0),
    ]));
    assert!(!response.success);
    assert_eq!(response.costs, vec![f32::from(NO_INFORMATION); 2]);
}

#[test]
fn point_costs_in_request_order() {
    let node = painted_node();
    let response = node.get_costs(&CostRequest::points(vec![
        pose("map", 1.25, 1.25),
        pose("map", 4.0, 4.0),
    ]));
    assert!(response.success);
    assert_eq!(
        response.costs,
        vec![f32::from(COST_LETHAL), f32::from(COST_FREE)]
    );
}

#[test]
fn failures_are_marked_per_entry() {
    let node = painted_node();
    let response = node.get_costs(&CostRequest::points(vec![
        pose("map", 3.0, 3.0),
        pose("map", 7.0, 1.0),
        pose("unknown_frame", 1.0, 1.0),
    ]));
    assert!(!response.success);
    assert_eq!(
        response.costs,
        vec![
            f32::from(COST_FREE),
            f32::from(COST_LETHAL),
            f32::from(NO_INFORMATION)
        ]
    );
}

#[test]
fn poses_in_other_frames_are_transformed() {
    let node = painted_node();
    // Robot sits at (2.5, 2.5); the keep-out zone is 1.25 m behind and to the right.
    let response = node.get_costs(&CostRequest::points(vec![pose("base_link", -1.25, -1.25)]));
    assert!(response.success);
    assert_eq!(response.costs, vec![f32::from(COST_LETHAL)]);
}

#[test]
fn footprint_queries_see_nearby_obstacles() {
    let node = painted_node();
    // The robot's 0.31 m footprint at (1.7, 1.25) overlaps the zone edge at 1.5 m.
    let response = node.get_costs(&CostRequest::footprints(vec![
        pose("map", 1.7, 1.25),
        pose("map", 3.5, 3.5),
    ]));
    assert!(response.success);
    assert_eq!(
        response.costs,
        vec![f32::from(COST_LETHAL), f32::from(COST_FREE)]
    );

    // Single-cell lookups at the same pose miss it.
    let response = node.get_costs(&CostRequest::points(vec![pose("map", 1.7, 1.25)]));
    assert_eq!(response.costs, vec![f32::from(COST_FREE)]);
}

#[test]
fn footprint_partly_off_grid_is_lethal() {
    let node = painted_node();
    let response = node.get_costs(&CostRequest::footprints(vec![pose("map", 0.1, 2.5)]));
    assert!(!response.success);
    assert_eq!(response.costs, vec![f32::from(COST_LETHAL)]);
}

#[test]
fn queries_run_alongside_the_update_loop() {
    let mut config = keepout_config();
    config.update_frequency = 100.0;
    let node = Arc::new(node_with(config, transforms_at(2.5, 2.5)));
    node.configure().expect("configure");
    node.activate().expect("activate");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let node = Arc::clone(&node);
            thread::spawn(move || {
                for _ in 0..200 {
                    let response =
                        node.get_costs(&CostRequest::points(vec![pose("map", 1.25, 1.25)]));
                    assert!(response.success);
                    assert_eq!(response.costs, vec![f32::from(COST_LETHAL)]);
                }
            })
        })
        .collect();
    for reader in readers {
        reader.join().expect("reader thread");
    }
    node.deactivate().expect("deactivate");
}

#[test]
fn non_finite_poses_are_off_the_grid() {
    let node = painted_node();
    let nan = PoseStamped::new("map", Pose2::from_xy_yaw(f32::NAN, f32::NAN, 0.0));

    let response = node.get_costs(&CostRequest::points(vec![nan.clone()]));
    assert!(!response.success);
    assert_eq!(response.costs, vec![f32::from(COST_LETHAL)]);

    let response = node.get_costs(&CostRequest::footprints(vec![nan]));
    assert!(!response.success);
    assert_eq!(response.costs, vec![f32::from(COST_LETHAL)]);
}

#[test]
fn nan_padding_is_rejected() {
    let node = painted_node();
    let before = node.padded_footprint();
    let result = node.set_parameters(&[Parameter::double("footprint_padding", f64::NAN)]);
    assert!(!result.successful);
    assert_eq!(node.padded_footprint(), before);
}

#[test]
fn queries_do_not_wait_for_a_reconfiguration() {
    let node = Arc::new(painted_node());

    // Validating an unreachable frame holds the reconfiguration lock for about a second.
    let reconfiguring = {
        let node = Arc::clone(&node);
        thread::spawn(move || {
            node.set_parameters(&[Parameter::string("robot_base_frame", "nowhere")])
        })
    };
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    let response = node.get_costs(&CostRequest::points(vec![pose("map", 1.25, 1.25)]));
    let elapsed = started.elapsed();
    assert!(!reconfiguring.is_finished(), "the reconfiguration is still running");
    assert!(elapsed < Duration::from_millis(300), "query took {elapsed:?}");
    assert_eq!(response.costs, vec![f32::from(COST_LETHAL)]);

    assert!(!reconfiguring.join().expect("reconfigure thread").successful);
}
