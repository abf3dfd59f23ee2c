//! Attitude angle estimation.
//!
//! Reconciles provided roll/pitch/yaw with accelerometer-derived roll/pitch
//! and magnetometer-derived yaw, and optionally switches to gyro-driven
//! Euler-rate propagation once an initial attitude exists.

use nalgebra::Vector3;

use crate::config::Config;
use crate::frames;
use crate::navdata::NavData;

const ROLL: usize = 0;
const PITCH: usize = 1;
const YAW: usize = 2;

/// Per-axis availability bookkeeping plus the persistent previous rate used
/// by the trapezoidal integrator.
#[derive(Debug, Default)]
pub struct AttitudeEstimator {
    available: [bool; 3],
    computable: [bool; 3],
    rpy_rate_prev: Vector3<f64>,
}

impl AttitudeEstimator {
    /// Run one attitude epoch.
    ///
    /// With `progress_angles` set, the first epoch reads or derives the
    /// angles and every later epoch integrates the gyro-driven Euler rates.
    /// Without it, the angles are read or derived every epoch.
    pub fn process(
        &mut self,
        nav: &NavData,
        cfg: &Config,
        rpy: &mut Vector3<f64>,
        rpy_dot: &mut Vector3<f64>,
        is_rpy_set: &mut bool,
    ) {
        self.check_sources(nav);

        if cfg.progress_angles {
            if *is_rpy_set {
                self.propagate(nav, cfg, rpy, rpy_dot);
            } else {
                self.read_or_derive(nav, cfg, rpy);
                *is_rpy_set = true;
            }
        } else {
            self.read_or_derive(nav, cfg, rpy);
        }
    }

    /// True when every angle is either provided or derivable this epoch.
    pub fn angles_resolvable(&self) -> bool {
        (0..3).all(|i| self.available[i] || self.computable[i])
    }

    /// An angle is AVAILABLE when its column exists and the value is non-NaN;
    /// COMPUTABLE when the accelerometer (roll, pitch) or magnetometer (yaw)
    /// samples it depends on are present and non-NaN.
    fn check_sources(&mut self, nav: &NavData) {
        for axis in 0..3 {
            self.available[axis] =
                nav.rpy.ids[axis].is_some() && !nav.rpy.values[axis].is_nan();
        }

        self.computable[ROLL] = [1, 2]
            .iter()
            .all(|&i| nav.acc.ids[i].is_some() && !nav.acc.values[i].is_nan());
        self.computable[PITCH] = [0, 2]
            .iter()
            .all(|&i| nav.acc.ids[i].is_some() && !nav.acc.values[i].is_nan());
        self.computable[YAW] = (0..3)
            .all(|i| nav.mag.ids[i].is_some() && !nav.mag.values[i].is_nan());
    }

    /// Gyro-driven Euler dynamics, trapezoidal over the previous rate.
    fn propagate(
        &mut self,
        nav: &NavData,
        cfg: &Config,
        rpy: &mut Vector3<f64>,
        rpy_dot: &mut Vector3<f64>,
    ) {
        let gyr = nav.gyr.values.component_mul(&cfg.attitude_selector);

        self.rpy_rate_prev = *rpy_dot;
        *rpy_dot = frames::euler_rate_matrix(rpy) * gyr;
        *rpy_dot = rpy_dot.component_mul(&cfg.attitude_selector);
        *rpy += (*rpy_dot + self.rpy_rate_prev) / 2.0 * cfg.dt_imu();
    }

    /// Assign provided angles, or derive them from the accelerometer and
    /// magnetometer where the input is missing.
    fn read_or_derive(&self, nav: &NavData, cfg: &Config, rpy: &mut Vector3<f64>) {
        let acc = &nav.acc.values;
        let mag = &nav.mag.values;

        rpy.x = if !self.available[ROLL] && self.computable[ROLL] {
            // Roll is zero when the body Y axis lies in the horizontal plane.
            (-acc.y / acc.z).atan()
        } else {
            nav.rpy.values.x
        };

        rpy.y = if !self.available[PITCH] && self.computable[PITCH] {
            (-acc.x / acc.z).atan()
        } else {
            nav.rpy.values.y
        };

        *rpy = nan_to_zero(rpy).component_mul(&cfg.attitude_selector);

        rpy.z = if !self.available[YAW] && self.computable[YAW] {
            // Tilt-compensated magnetic heading.
            (mag.y * rpy.x.cos() + mag.z * rpy.x.sin()).atan2(
                mag.x * rpy.y.cos() + mag.y * rpy.y.sin() * rpy.x.sin()
                    - mag.z * rpy.x.cos() * rpy.x.sin(),
            )
        } else {
            nav.rpy.values.z
        };

        *rpy = nan_to_zero(rpy).component_mul(&cfg.attitude_selector);
    }
}

fn nan_to_zero(v: &Vector3<f64>) -> Vector3<f64> {
    v.map(|x| if x.is_nan() { 0.0 } else { x })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Args, Config};
    use approx::assert_abs_diff_eq;
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
            "-M",
            "9,10,11",
            "-z",
            "1,1,1",
            "-x",
            "1,1,1",
        ];
        argv.extend_from_slice(extra);
        Config::from_args(Args::parse_from(argv)).unwrap()
    }

    fn navdata(cfg: &Config, acc: [f64; 3], gyr: [f64; 3], mag: [f64; 3]) -> NavData {
        let mut nav = NavData::new(cfg);
        let mut row = vec![0.0, 0.0, 100.0];
        row.extend_from_slice(&acc);
        row.extend_from_slice(&gyr);
        row.extend_from_slice(&mag);
        nav.update(&row, cfg, &Vector3::zeros(), None).unwrap();
        nav
    }

    #[test]
    fn roll_pitch_derived_from_accelerometer() {
        let cfg = config(&[]);
        // Level platform measuring -1 g along body Z.
        let nav = navdata(&cfg, [0.0, 0.0, -1.0], [0.0; 3], [1.0, 0.0, 0.0]);
        let mut est = AttitudeEstimator::default();
        let mut rpy = Vector3::zeros();
        let mut rpy_dot = Vector3::zeros();
        let mut set = false;
        est.process(&nav, &cfg, &mut rpy, &mut rpy_dot, &mut set);
        assert!(set);
        assert_abs_diff_eq!(rpy.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rpy.y, 0.0, epsilon = 1e-12);
        assert!(est.angles_resolvable());
    }

    #[test]
    fn yaw_from_magnetometer_when_level() {
        let cfg = config(&[]);
        // Field along body Y: heading = atan2(mag_y, mag_x) = pi/2.
        let nav = navdata(&cfg, [0.0, 0.0, -1.0], [0.0; 3], [0.0, 1.0, 0.0]);
        let mut est = AttitudeEstimator::default();
        let mut rpy = Vector3::zeros();
        let mut rpy_dot = Vector3::zeros();
        let mut set = false;
        est.process(&nav, &cfg, &mut rpy, &mut rpy_dot, &mut set);
        assert_abs_diff_eq!(rpy.z, std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn gyro_propagation_after_initialization() {
        let cfg = config(&[]);
        let nav = navdata(&cfg, [0.0, 0.0, -1.0], [0.0, 0.0, 0.1], [1.0, 0.0, 0.0]);
        let mut est = AttitudeEstimator::default();
        let mut rpy = Vector3::zeros();
        let mut rpy_dot = Vector3::zeros();
        let mut set = false;

        est.process(&nav, &cfg, &mut rpy, &mut rpy_dot, &mut set);
        let yaw0 = rpy.z;

        // 100 propagation epochs at 0.1 rad/s and fs 100 Hz: one second.
        for _ in 0..100 {
            est.process(&nav, &cfg, &mut rpy, &mut rpy_dot, &mut set);
        }
        // Trapezoid ramps in over the first sample; allow half a sample slack.
        assert_abs_diff_eq!(rpy.z - yaw0, 0.1, epsilon = 1e-3);
    }

    #[test]
    fn provided_angles_win_over_derivation() {
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
            "-R",
            "9",
            "-P",
            "10",
            "-Y",
            "11",
            "-z",
            "1,1,1",
            "-y",
            "0",
        ];
        let cfg = Config::from_args(Args::parse_from(argv)).unwrap();
        let mut nav = NavData::new(&cfg);
        nav.update(
            &[0.0, 0.0, 100.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.3, -0.2, 1.1],
            &cfg,
            &Vector3::zeros(),
            None,
        )
        .unwrap();

        let mut est = AttitudeEstimator::default();
        let mut rpy = Vector3::zeros();
        let mut rpy_dot = Vector3::zeros();
        let mut set = false;
        est.process(&nav, &cfg, &mut rpy, &mut rpy_dot, &mut set);
        assert_abs_diff_eq!(rpy.x, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(rpy.y, -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(rpy.z, 1.1, epsilon = 1e-12);
    }
}
