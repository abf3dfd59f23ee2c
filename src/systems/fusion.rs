//! Fusion pipeline: seeds from the INS solution, runs the error-state EKF
//! against the GPS position, and applies the estimated errors as corrections.

use nalgebra::Matrix3;

use crate::config::Config;
use crate::error::NavError;
use crate::filters::ErrorStateEkf;
use crate::frames;
use crate::monitor::Monitor;
use crate::navdata::NavData;
use crate::types::linalg::{BLOCK_ATT, BLOCK_POS, BLOCK_VEL};
use crate::types::{has_nan, GeoFrame, InsSolution};

pub struct FusionSystem {
    pub data: InsSolution,
    kf: ErrorStateEkf,
}

impl FusionSystem {
    pub fn new(cfg: &Config) -> Result<Self, NavError> {
        Ok(Self {
            data: InsSolution::default(),
            kf: ErrorStateEkf::new(cfg)?,
        })
    }

    pub fn kf(&self) -> &ErrorStateEkf {
        &self.kf
    }

    pub fn process(
        &mut self,
        nav: &NavData,
        cfg: &Config,
        monitor: &Monitor,
        ins: &InsSolution,
        gps: &GeoFrame,
    ) -> Result<(), NavError> {
        // The update gate: a fresh, valid fix outside the configured
        // GPS-off window.
        let gps_usable = nav.is_gps_valid() && !cfg.gps_off_covers(nav.epoch());
        let updatable = nav.is_gps_new() && gps_usable;

        if monitor.ecef_ref_set && has_nan(&self.data.frame.ecef_ref) {
            self.data.frame.ecef_ref = gps.ecef_ref;
            self.data.frame.llh = gps.llh;
        }

        // Seed this epoch's prediction from the INS solution.
        self.data.frame.enu = ins.frame.enu;
        self.data.rpy = ins.rpy;
        self.data.rpy_dot = ins.rpy_dot;
        self.data.v = ins.v;

        self.kf.process(&self.data, &gps.enu, nav, cfg, updatable)?;

        self.apply_corrections(cfg);
        self.update_geodetic();
        Ok(())
    }

    /// Add the estimated error state onto the seeded solution.
    fn apply_corrections(&mut self, cfg: &Config) {
        let r = if cfg.mechanics_local {
            Matrix3::identity()
        } else {
            frames::body_to_enu(&self.data.rpy.component_mul(&cfg.attitude_selector))
        };
        let x = self.kf.state();

        self.data.frame.enu += x.fixed_rows::<3>(BLOCK_POS).into_owned();
        self.data.v += r * x.fixed_rows::<3>(BLOCK_VEL).into_owned();
        self.data.rpy += x.fixed_rows::<3>(BLOCK_ATT).into_owned();

        self.data.rpy.x = frames::clamp_roll_pitch(self.data.rpy.x);
        self.data.rpy.y = frames::clamp_roll_pitch(self.data.rpy.y);
        self.data.rpy.z = frames::wrap_yaw(self.data.rpy.z);
    }

    fn update_geodetic(&mut self) {
        let frame = &mut self.data.frame;
        frame.ecef = frames::enu_to_ecef(&frame.llh, &frame.enu, &frame.ecef_ref);
        frame.llh = frames::ecef_to_llh(&frame.ecef);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Args, Config};
    use crate::systems::{GnssSystem, InsSystem};
    use clap::Parser;

    fn config(extra: &[&str]) -> Config {
        let mut argv = vec![
            "nav_fusion",
            "-I",
            "i.csv",
            "-O",
            "o",
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
        Config::from_args(Args::parse_from(argv)).unwrap()
    }

    struct Rig {
        cfg: Config,
        nav: NavData,
        monitor: Monitor,
        gnss: GnssSystem,
        ins: InsSystem,
        fusion: FusionSystem,
    }

    impl Rig {
        fn new(cfg: Config) -> Self {
            let nav = NavData::new(&cfg);
            let fusion = FusionSystem::new(&cfg).unwrap();
            Self {
                cfg,
                nav,
                monitor: Monitor::default(),
                gnss: GnssSystem::default(),
                ins: InsSystem::default(),
                fusion,
            }
        }

        fn step(&mut self, row: &[f64]) {
            let rpy = self.ins.data.rpy;
            let bias = self
                .cfg
                .feedback_bias
                .then(|| (self.fusion.kf.acc_bias(), self.fusion.kf.gyr_bias()));
            self.monitor.update(self.nav.epoch());
            self.nav.update(row, &self.cfg, &rpy, bias).unwrap();
            self.gnss.process(&self.nav, &mut self.monitor);
            self.ins
                .process(&self.nav, &self.cfg, &self.monitor, &self.gnss.data);
            self.fusion
                .process(
                    &self.nav,
                    &self.cfg,
                    &self.monitor,
                    &self.ins.data,
                    &self.gnss.data,
                )
                .unwrap();
        }
    }

    #[test]
    fn static_receiver_stays_at_origin() {
        let mut rig = Rig::new(config(&[]));
        let row = [45.0, 9.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        for _ in 0..1000 {
            rig.step(&row);
        }
        assert!(rig.gnss.data.enu.norm() < 1e-6);
        assert!(rig.ins.data.frame.enu.norm() < 1e-3);
        assert!(rig.fusion.data.frame.enu.norm() < 1e-3);
    }

    #[test]
    fn nan_outage_skips_updates_and_recovers() {
        let mut rig = Rig::new(config(&[]));
        let good = [45.0, 9.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let lost = [f64::NAN, f64::NAN, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        for _ in 0..500 {
            rig.step(&good);
        }
        let cov_before = rig.fusion.kf.covariance().norm();
        for _ in 0..200 {
            rig.step(&lost);
        }
        // Prediction-only through the outage: uncertainty must have grown
        // and the fused track must stay finite.
        assert!(rig.fusion.kf.covariance().norm() > cov_before);
        assert!(rig.fusion.data.frame.enu.iter().all(|v| v.is_finite()));

        for _ in 0..3 {
            rig.step(&good);
        }
        assert!(rig.fusion.data.frame.enu.norm() < 1e-3);
    }

    #[test]
    fn gps_off_interval_gates_update() {
        // 100 Hz: epochs 100..=200 fall inside the 1..2 s window.
        let mut rig = Rig::new(config(&["-T", "1,2"]));
        let mut lat = 45.0;
        let cov_at = |rig: &Rig| rig.fusion.kf.covariance().norm();

        let mut inside_growth = true;
        let mut last = 0.0;
        for epoch in 1..=300 {
            // Wiggle the fix so it is "new" every epoch.
            lat += 1e-9;
            let row = [lat, 9.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            rig.step(&row);
            if epoch == 99 {
                last = cov_at(&rig);
            }
            if (100..=200).contains(&epoch) && cov_at(&rig) < last {
                inside_growth = false;
            }
            if (100..=200).contains(&epoch) {
                last = cov_at(&rig);
            }
        }
        // Inside the window the filter only predicts, so the covariance
        // never shrinks there.
        assert!(inside_growth);
    }

    #[test]
    fn ecef_ref_stable_for_whole_run() {
        let mut rig = Rig::new(config(&[]));
        let mut anchor = None;
        for epoch in 1..=300 {
            let lat = 45.0 + epoch as f64 * 1e-7;
            let row = [lat, 9.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            rig.step(&row);
            match anchor {
                None => anchor = Some(rig.gnss.data.ecef_ref),
                Some(a) => {
                    assert_eq!(rig.gnss.data.ecef_ref, a);
                    assert_eq!(rig.ins.data.frame.ecef_ref, a);
                    assert_eq!(rig.fusion.data.frame.ecef_ref, a);
                }
            }
        }
    }

    #[test]
    fn bias_feedback_keeps_fused_track_bounded() {
        // A constant accelerometer bias on body X with feedback enabled:
        // the INS track alone diverges quadratically, while the fused track
        // stays within meters of the static truth.
        let mut rig = Rig::new(config(&["-f", "1"]));
        let mut lat = 45.0;
        for _ in 0..6000 {
            lat += 1e-9;
            let row = [lat, 9.0, 100.0, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            rig.step(&row);
        }
        let ins_err = rig.ins.data.frame.enu.norm();
        let fus_err = rig.fusion.data.frame.enu.norm();
        assert!(fus_err < ins_err, "fusion must beat raw INS ({fus_err} vs {ins_err})");
        assert!(fus_err < 5.0, "fused drift must stay bounded, got {fus_err}");
        // Only the body-X bias slot is observable under the default body
        // selector; the masked slots stay exactly zero.
        assert_eq!(rig.fusion.kf.state()[10], 0.0);
        assert_eq!(rig.fusion.kf.state()[11], 0.0);
    }
}
