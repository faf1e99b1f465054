use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use lane_signal::{
    default_detectors, Alert, AlertPolicy, FileFrameResolver, LaneSet, LaneStatus, Pipeline, Point,
    VehicleClass,
};

fn write_frame(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::new(200, 200).save(path).expect("write frame");
}

fn write_detections(frame: &Path, detections: Value) {
    let mut sidecar = frame.as_os_str().to_owned();
    sidecar.push(".detections.json");
    std::fs::write(sidecar, serde_json::to_vec(&detections).unwrap()).unwrap();
}

/// Lane 1: boxed region with cars, a truck, an outside car and a dog.
/// Lane 2: no region, thirty buses (half spelled "buss"), behind a service prefix.
/// Lane 3: missing frame. Lane 4: frame without detections file. Lane 5: empty road.
fn junction(dir: &Path) -> LaneSet {
    let frames = dir.join("frames");

    let lane1 = frames.join("lane1.png");
    write_frame(&lane1);
    write_detections(
        &lane1,
        json!([
            {"class": "car", "bbox": [10, 10, 30, 30]},
            {"class": "Car", "bbox": [40, 40, 60, 60]},
            {"class": "car", "bbox": [70, 10, 90, 30], "confidence": 0.91},
            {"class": "truck", "bbox": [20, 60, 60, 95]},
            {"class": "car", "bbox": [140, 140, 160, 160]},
            {"class": "dog", "bbox": [45, 45, 55, 55]}
        ]),
    );

    let lane2 = frames.join("lane2.png");
    write_frame(&lane2);
    let buses: Vec<Value> = (0..30)
        .map(|i| {
            let label = if i % 2 == 0 { "bus" } else { "buss" };
            json!({"class": label, "bbox": [i, 0, i + 5, 5]})
        })
        .collect();
    write_detections(&lane2, Value::Array(buses));

    write_frame(&frames.join("lane4.png"));

    let lane5 = frames.join("lane5.png");
    write_frame(&lane5);
    write_detections(&lane5, json!([]));

    let lanes = json!([
        {"lane_id": 1, "path": "frames/lane1.png",
         "region": {"type": "bbox", "bbox": [0, 0, 100, 100]}},
        {"lane_id": 2, "path": "yolo_cam/lane2.png"},
        {"lane_id": 3, "path": "frames/missing.png",
         "polygon": [{"x": 0, "y": 0}, {"x": 100, "y": 0}, {"x": 100, "y": 100}]},
        {"lane_id": 4, "path": "frames/lane4.png"},
        {"lane_id": 5, "path": "frames/lane5.png"}
    ]);
    let lane_file = dir.join("lanes.json");
    std::fs::write(&lane_file, serde_json::to_vec(&lanes).unwrap()).unwrap();
    LaneSet::load(&lane_file).expect("load lanes")
}

fn pipeline(dir: &Path, workers: usize) -> Pipeline {
    let resolver = FileFrameResolver::new(vec![dir.join("frames")]).with_cwd(dir);
    let detector = default_detectors().select(Some("sidecar")).unwrap();
    Pipeline::new(Arc::new(resolver), detector)
        .with_workers(workers)
        .unwrap()
}

#[test]
fn junction_run_counts_and_times_each_lane() {
    let dir = tempfile::tempdir().unwrap();
    let lanes = junction(dir.path());

    let result = pipeline(dir.path(), 1).run(lanes.lanes()).unwrap();
    let ids: Vec<_> = result.lanes.iter().map(|l| l.lane_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

    let lane1 = result.lane("1").unwrap();
    assert_eq!(lane1.status, LaneStatus::Processed);
    assert_eq!(lane1.counts.get(VehicleClass::Car), 3);
    assert_eq!(lane1.counts.get(VehicleClass::Truck), 1);
    assert_eq!(lane1.total, 4);
    assert_eq!(lane1.green_time, 12);
    assert_eq!(lane1.detections.len(), 4);

    let lane2 = result.lane("2").unwrap();
    assert_eq!(lane2.status, LaneStatus::Processed);
    assert_eq!(lane2.counts.get(VehicleClass::Bus), 30);
    assert_eq!(lane2.total, 30);
    assert_eq!(lane2.green_time, 60);
    let resolved = lane2.image_resolved.as_deref().unwrap();
    assert!(resolved.ends_with("lane2.png"), "{resolved}");
    assert!(!resolved.contains("yolo_cam"), "{resolved}");

    let lane3 = result.lane("3").unwrap();
    assert_eq!(lane3.status, LaneStatus::FrameUnavailable);
    assert_eq!(lane3.image.as_deref(), Some("frames/missing.png"));

    let lane4 = result.lane("4").unwrap();
    assert_eq!(lane4.status, LaneStatus::DetectorFailed);

    for lane in [lane3, lane4, result.lane("5").unwrap()] {
        assert_eq!(lane.total, 0);
        assert!(lane.counts.is_empty());
        assert_eq!(lane.green_time, 10);
    }
    assert_eq!(result.lane("5").unwrap().status, LaneStatus::Processed);

    let summary = result.summary();
    assert_eq!(summary.lanes, 5);
    assert_eq!(summary.vehicles, 34);
    assert_eq!(summary.busiest_lane.as_deref(), Some("2"));
    assert_eq!(summary.degraded_lanes, 2);

    assert_eq!(
        AlertPolicy::default().alerts_for(&result),
        vec![Alert::heavy_traffic("2", 30)]
    );
}

#[test]
fn written_result_has_expected_shape() {
    let dir = tempfile::tempdir().unwrap();
    let lanes = junction(dir.path());
    let result = pipeline(dir.path(), 2).run(lanes.lanes()).unwrap();

    let out = dir.path().join("out").join("processed_result.json");
    result.write_json(&out).unwrap();
    let written: Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();

    assert!(written["timestamp"].as_f64().unwrap() > 0.0);
    let lanes = written["lanes"].as_array().unwrap();
    assert_eq!(lanes.len(), 5);
    assert_eq!(lanes[0]["laneId"], "1");
    assert_eq!(lanes[0]["counts"], json!({"car": 3, "truck": 1}));
    assert_eq!(lanes[0]["green_time"], 12);
    assert_eq!(lanes[1]["counts"], json!({"bus": 30}));
    assert_eq!(lanes[2]["status"], "frame_unavailable");
    assert_eq!(lanes[2]["counts"], json!({}));
    assert_eq!(lanes[3]["status"], "detector_failed");

    for lane in lanes {
        let counts = lane["counts"].as_object().unwrap();
        assert!(!counts.contains_key("dog"));
        assert!(!counts.contains_key("buss"));
    }
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let dir = tempfile::tempdir().unwrap();
    let lanes = junction(dir.path());

    let sequential = pipeline(dir.path(), 1).run(lanes.lanes()).unwrap();
    let parallel = pipeline(dir.path(), 4).run(lanes.lanes()).unwrap();
    assert_eq!(sequential.lanes, parallel.lanes);
}

#[test]
fn points_map_to_lane_regions() {
    let dir = tempfile::tempdir().unwrap();
    let lanes = junction(dir.path());

    assert_eq!(lanes.lane_for_point(Point::new(50.0, 50.0)), Some("1"));
    assert_eq!(lanes.lane_for_point(Point::new(150.0, 150.0)), None);
}
