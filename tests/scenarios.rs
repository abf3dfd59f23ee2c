//! End-to-end scenarios driving the full engine epoch by epoch.

use clap::Parser;
use nav_fusion_rs::{Args, Config, Engine};

fn engine(extra: &[&str]) -> Engine {
    let mut argv = vec![
        "nav_fusion",
        "-I",
        "unused.csv",
        "-O",
        "unused",
        "-K",
        "0,0,0,1,1,1,1,1,1,1,1,1,1,1,1",
        "-A",
        "3,4,5",
        "-W",
        "6,7,8",
        "-C",
        "0,1",
        "-H",
        "2",
        "-Y",
        "9",
    ];
    argv.extend_from_slice(extra);
    let cfg = Config::from_args(Args::parse_from(argv)).unwrap();
    Engine::new(cfg).unwrap()
}

/// lat,lon in degrees; the row layout matches the column flags above.
fn row(lat: f64, lon: f64, height: f64) -> Vec<f64> {
    vec![lat, lon, height, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
}

const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;

#[test]
fn static_receiver_all_tracks_hold_position() {
    let mut engine = engine(&[]);
    // GPS fixed at (1.0 rad, -0.5 rad, 100 m), IMU silent.
    let fix = row(1.0 * RAD2DEG, -0.5 * RAD2DEG, 100.0);

    for _ in 0..1000 {
        engine.process_epoch(&fix).unwrap();
    }

    assert!(engine.gnss().data.enu.norm() < 1e-6);
    assert!(engine.ins().data.frame.enu.norm() < 1e-3);
    assert!(engine.fusion().data.frame.enu.norm() < 1e-3);

    // The recovered latitudes agree with the input fix.
    assert!((engine.gnss().data.llh.x - 1.0).abs() < 1e-9);
    assert!((engine.fusion().data.frame.llh.x - 1.0).abs() < 1e-6);
}

#[test]
fn gps_outage_gates_updates_then_resnaps() {
    let mut engine = engine(&[]);

    // A slowly drifting fix so every epoch carries a fresh measurement.
    let lat_at = |epoch: usize| 45.0 + epoch as f64 * 1e-7;

    for epoch in 1..=500 {
        engine
            .process_epoch(&row(lat_at(epoch), 9.0, 100.0))
            .unwrap();
    }
    let gap_before_outage =
        (engine.fusion().data.frame.enu - engine.gnss().data.enu).norm();

    // Epochs 501..700: receiver lost, the filter must coast on prediction.
    let cov_at_start = engine.fusion().kf().covariance().norm();
    for _ in 501..=700 {
        engine
            .process_epoch(&row(f64::NAN, f64::NAN, 100.0))
            .unwrap();
    }
    assert!(
        engine.fusion().kf().covariance().norm() > cov_at_start,
        "outage must leave the filter in prediction-only growth"
    );
    assert!(engine
        .fusion()
        .data
        .frame
        .enu
        .iter()
        .all(|v| v.is_finite()));

    // Recovery: within three samples the fused track closes most of the
    // gap it accumulated against the (moving) GPS position.
    engine
        .process_epoch(&row(lat_at(701), 9.0, 100.0))
        .unwrap();
    let gap_at_recovery =
        (engine.fusion().data.frame.enu - engine.gnss().data.enu).norm();

    for epoch in 702..=704 {
        engine
            .process_epoch(&row(lat_at(epoch), 9.0, 100.0))
            .unwrap();
    }
    let gap_after = (engine.fusion().data.frame.enu - engine.gnss().data.enu).norm();

    assert!(
        gap_after < gap_at_recovery,
        "fused track must re-snap toward GPS ({gap_after} !< {gap_at_recovery})"
    );
    // The outage opened a real gap relative to steady tracking.
    assert!(gap_at_recovery > gap_before_outage);
}

#[test]
fn heading_column_integrates_into_track_yaw() {
    // Yaw read from the file every epoch (-y 0), advancing 0.1 rad/s.
    let mut engine = engine(&["-y", "0"]);
    for epoch in 1..=1000usize {
        let yaw = 0.1 * epoch as f64 / 100.0;
        let mut r = row(45.0, 9.0, 100.0);
        r[9] = yaw;
        engine.process_epoch(&r).unwrap();
    }
    assert!((engine.ins().data.rpy.z - 1.0).abs() < 1e-6);
    assert!(engine.ins().data.frame.enu.norm() < 1e-9);
    assert!((engine.fusion().data.rpy.z - 1.0).abs() < 1e-3);
}
