//! INS dead-reckoning pipeline.
//!
//! Integrates specific force into velocity and position in either the local
//! (ENU) or the body frame, accounting for the Earth-rotation Coriolis term,
//! and drives the attitude estimator. Gravity compensation, when enabled,
//! has already happened during sensor conditioning.

use crate::attitude::AttitudeEstimator;
use crate::config::Config;
use crate::frames;
use crate::monitor::Monitor;
use crate::navdata::NavData;
use crate::types::{has_nan, GeoFrame, InsSolution};

#[derive(Debug, Default)]
pub struct InsSystem {
    pub data: InsSolution,
    attitude: AttitudeEstimator,
    is_rpy_set: bool,
}

impl InsSystem {
    pub fn process(&mut self, nav: &NavData, cfg: &Config, monitor: &Monitor, gps: &GeoFrame) {
        // Adopt the shared anchor the first time it exists.
        if monitor.ecef_ref_set && has_nan(&self.data.frame.ecef_ref) {
            self.data.frame.ecef_ref = gps.ecef_ref;
            self.data.frame.llh = gps.llh;
        }

        self.attitude.process(
            nav,
            cfg,
            &mut self.data.rpy,
            &mut self.data.rpy_dot,
            &mut self.is_rpy_set,
        );
        self.data.rpy.x = frames::clamp_roll_pitch(self.data.rpy.x);
        self.data.rpy.y = frames::clamp_roll_pitch(self.data.rpy.y);
        self.data.rpy.z = frames::wrap_yaw(self.data.rpy.z);

        self.integrate_local(nav, cfg);
        self.update_geodetic();
    }

    /// Trapezoidal velocity integration over the previous rate, then
    /// position integration in ENU.
    fn integrate_local(&mut self, nav: &NavData, cfg: &Config) {
        let acc = &nav.acc.values;
        let rb2n = frames::body_to_enu(&self.data.rpy.component_mul(&cfg.attitude_selector));
        let skew_ie = frames::skew_inertial_earth(self.data.frame.llh.x);
        let dt = cfg.dt_imu();

        let coriolis = -(skew_ie * self.data.v) * 2.0;
        let v_dot_prev = self.data.v_dot;
        if cfg.mechanics_local {
            // Velocity rate in the local frame.
            self.data.v_dot = rb2n * acc + coriolis;
            self.data.v += (self.data.v_dot + v_dot_prev) / 2.0 * dt;
        } else {
            // Velocity rate accumulated in the body frame.
            self.data.v_dot += acc + rb2n.transpose() * coriolis;
            self.data.v = rb2n * (self.data.v_dot + v_dot_prev) / 2.0 * dt;
        }

        self.data.frame.enu += self.data.v * dt;
    }

    fn update_geodetic(&mut self) {
        let frame = &mut self.data.frame;
        frame.ecef = frames::enu_to_ecef(&frame.llh, &frame.enu, &frame.ecef_ref);
        frame.llh = frames::ecef_to_llh(&frame.ecef);
    }
}
