//! 15-state error-state extended Kalman filter.
//!
//! State vector (all error quantities):
//! [0-2]:   position error (ENU) [m]
//! [3-5]:   velocity error [m/s]
//! [6-8]:   attitude error (roll, pitch, yaw) [rad]
//! [9-11]:  accelerometer bias [m/s²]
//! [12-14]: gyroscope bias [rad/s]
//!
//! The observation is the 3-vector GPS ENU minus INS ENU. Prediction runs
//! every IMU epoch; the update runs only when a fresh, valid GPS fix exists
//! and the configured GPS-off interval does not cover the epoch.

use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

use crate::config::Config;
use crate::error::NavError;
use crate::frames;
use crate::navdata::NavData;
use crate::types::linalg::{
    KalmanGain, MeasureMat, MeasureVec, ObsMat, StateMat, StateVec, BLOCK_ACC_BIAS, BLOCK_ATT,
    BLOCK_GYR_BIAS, BLOCK_POS, BLOCK_VEL, MEASURE_DIM, STATE_DIM,
};
use crate::types::InsSolution;

/// Number of comma-separated values expected by `-K`.
pub const KF_STD_LENGTH: usize = 15;

/// Serializable snapshot of the filter for reporting.
#[derive(Clone, Debug, Serialize)]
pub struct KfSnapshot {
    pub position_error: (f64, f64, f64),
    pub velocity_error: (f64, f64, f64),
    pub attitude_error: (f64, f64, f64),
    pub accel_bias: (f64, f64, f64),
    pub gyro_bias: (f64, f64, f64),
    pub covariance_trace: f64,
}

pub struct ErrorStateEkf {
    /// Continuous-time state transition matrix.
    f: StateMat,
    /// Process noise gain.
    g: StateMat,
    /// Discretized transition matrix.
    fk: StateMat,
    /// Continuous process noise.
    q: StateMat,
    /// Discretized process noise.
    qk: StateMat,
    /// State covariance.
    s: StateMat,
    /// Kalman gain.
    k: KalmanGain,
    /// Observation matrix [I₃ | 0].
    h: ObsMat,
    /// Measurement noise.
    r: MeasureMat,
    /// Innovation covariance.
    v_inn: MeasureMat,
    /// Error state.
    x: StateVec,
    /// Last observation.
    y: MeasureVec,
    /// Last innovation.
    innovation: MeasureVec,
    /// Per-state process noise standard deviations.
    u: StateVec,
    /// Per-measurement variances.
    w: MeasureVec,
}

impl ErrorStateEkf {
    /// Build the filter from the 15 comma-separated standard deviations of
    /// `-K`: 3 leading slots, then acc bias, acc noise, gyro bias, gyro
    /// noise (into `u[3..15]`), then 3 GPS DOPs (squared into `w`).
    pub fn new(cfg: &Config) -> Result<Self, NavError> {
        if cfg.kf_std.matches(',').count() != KF_STD_LENGTH - 1 {
            return Err(NavError::KfStdLengthMismatch);
        }
        let fields: Vec<f64> = cfg
            .kf_std
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| NavError::KfStdLengthMismatch)?;

        let mut u = StateVec::zeros();
        for (i, value) in fields[..STATE_DIM - MEASURE_DIM].iter().enumerate() {
            u[MEASURE_DIM + i] = *value;
        }
        let mut w = MeasureVec::zeros();
        for (i, value) in fields[STATE_DIM - MEASURE_DIM..].iter().enumerate() {
            w[i] = value * value;
        }

        let mut h = ObsMat::zeros();
        for i in 0..MEASURE_DIM {
            h[(i, i)] = 1.0;
        }

        // Masked-out axes carry no process noise.
        for i in 0..3 {
            u[BLOCK_ATT + i] *= cfg.attitude_selector[i];
            u[BLOCK_ACC_BIAS + i] *= cfg.body_selector[i];
            u[BLOCK_GYR_BIAS + i] *= cfg.attitude_selector[i];
        }

        Ok(Self {
            f: StateMat::zeros(),
            g: StateMat::identity(),
            fk: StateMat::zeros(),
            q: StateMat::zeros(),
            qk: StateMat::zeros(),
            s: StateMat::identity() * 0.1,
            k: KalmanGain::zeros(),
            h,
            r: MeasureMat::zeros(),
            v_inn: MeasureMat::zeros(),
            x: StateVec::zeros(),
            y: MeasureVec::zeros(),
            innovation: MeasureVec::zeros(),
            u,
            w,
        })
    }

    /// One filter epoch: form F and G, discretize, select components,
    /// predict, and update against GPS ENU − INS ENU when allowed.
    pub fn process(
        &mut self,
        prediction: &InsSolution,
        gps_enu: &Vector3<f64>,
        nav: &NavData,
        cfg: &Config,
        updatable: bool,
    ) -> Result<(), NavError> {
        self.build_transition(prediction, nav, cfg);
        self.discretize(cfg);
        self.select_components(cfg);

        self.predict();
        self.mask_state(cfg);

        if updatable {
            self.update(gps_enu - prediction.frame.enu)?;
            self.mask_state(cfg);
        }
        Ok(())
    }

    pub fn state(&self) -> &StateVec {
        &self.x
    }

    pub fn covariance(&self) -> &StateMat {
        &self.s
    }

    pub fn acc_bias(&self) -> Vector3<f64> {
        Vector3::new(
            self.x[BLOCK_ACC_BIAS],
            self.x[BLOCK_ACC_BIAS + 1],
            self.x[BLOCK_ACC_BIAS + 2],
        )
    }

    pub fn gyr_bias(&self) -> Vector3<f64> {
        Vector3::new(
            self.x[BLOCK_GYR_BIAS],
            self.x[BLOCK_GYR_BIAS + 1],
            self.x[BLOCK_GYR_BIAS + 2],
        )
    }

    pub fn snapshot(&self) -> KfSnapshot {
        KfSnapshot {
            position_error: (self.x[0], self.x[1], self.x[2]),
            velocity_error: (self.x[3], self.x[4], self.x[5]),
            attitude_error: (self.x[6], self.x[7], self.x[8]),
            accel_bias: (self.x[9], self.x[10], self.x[11]),
            gyro_bias: (self.x[12], self.x[13], self.x[14]),
            covariance_trace: self.s.trace(),
        }
    }

    /// Continuous-time F and G from the current prediction carrier.
    fn build_transition(&mut self, pred: &InsSolution, nav: &NavData, cfg: &Config) {
        let att = &cfg.attitude_selector;
        let body = &cfg.body_selector;

        let rb2n = frames::body_to_enu(&pred.rpy.component_mul(att));
        let r_mech = if cfg.mechanics_local {
            Matrix3::identity()
        } else {
            rb2n
        };

        let acc = nav.acc.values.component_mul(body);
        let skew_rf = frames::skew(&(rb2n * acc));
        let skew_ie = frames::skew_inertial_earth(pred.frame.llh.x);
        let m = frames::euler_rate_matrix(&pred.rpy.component_mul(att));
        let skew_rpy = frames::skew(&pred.rpy_dot.component_mul(att));

        self.f = StateMat::zeros();

        // Position error rate.
        set_block(&mut self.f, BLOCK_POS, BLOCK_VEL, &r_mech);

        // Velocity error rate.
        self.f[(5, 2)] = 2.0 * frames::G_EQUATOR / frames::SEMI_MAJOR_A;
        set_block(&mut self.f, BLOCK_VEL, BLOCK_VEL, &(-r_mech.transpose() * skew_ie * 2.0));
        set_block(&mut self.f, BLOCK_VEL, BLOCK_ATT, &(-r_mech.transpose() * skew_rf));
        set_block(&mut self.f, BLOCK_VEL, BLOCK_ACC_BIAS, &(r_mech.transpose() * rb2n));

        // Attitude error rate.
        set_block(&mut self.f, BLOCK_ATT, BLOCK_ATT, &skew_rpy);
        set_block(&mut self.f, BLOCK_ATT, BLOCK_GYR_BIAS, &m);

        // First-order Markov bias drift.
        let markov = -Matrix3::identity() / cfg.tau;
        set_block(&mut self.f, BLOCK_ACC_BIAS, BLOCK_ACC_BIAS, &markov);
        set_block(&mut self.f, BLOCK_GYR_BIAS, BLOCK_GYR_BIAS, &markov);

        // Noise gain and noise matrices.
        self.g = StateMat::identity();
        set_block(&mut self.g, BLOCK_VEL, BLOCK_VEL, &(r_mech.transpose() * rb2n));
        set_block(&mut self.g, BLOCK_ATT, BLOCK_ATT, &m);

        self.q = StateMat::from_diagonal(&self.u.component_mul(&self.u));
        self.r = MeasureMat::from_diagonal(&self.w);
    }

    /// Fk = I + F·Δt, Qk = G·Q·Gᵀ·Δt with Δt = 1/fs_imu.
    fn discretize(&mut self, cfg: &Config) {
        let dt = cfg.dt_imu();
        self.fk = StateMat::identity() + self.f * dt;
        self.qk = self.g * self.q * self.g.transpose() * dt;
    }

    /// Zero the Fk and Qk columns of masked-out attitude and body axes.
    fn select_components(&mut self, cfg: &Config) {
        let att = &cfg.attitude_selector;
        let body = &cfg.body_selector;
        for i in 0..3 {
            scale_column(&mut self.fk, BLOCK_ATT + i, att[i]);
            scale_column(&mut self.fk, BLOCK_ACC_BIAS + i, body[i]);
            scale_column(&mut self.fk, BLOCK_GYR_BIAS + i, att[i]);
            scale_column(&mut self.qk, BLOCK_ATT + i, att[i]);
            scale_column(&mut self.qk, BLOCK_ACC_BIAS + i, body[i]);
            scale_column(&mut self.qk, BLOCK_GYR_BIAS + i, att[i]);
        }
    }

    fn predict(&mut self) {
        self.x = self.fk * self.x;
        self.s = self.fk * self.s * self.fk.transpose() + self.qk;
    }

    fn mask_state(&mut self, cfg: &Config) {
        for i in 0..3 {
            self.x[BLOCK_ATT + i] *= cfg.attitude_selector[i];
            self.x[BLOCK_ACC_BIAS + i] *= cfg.body_selector[i];
            self.x[BLOCK_GYR_BIAS + i] *= cfg.attitude_selector[i];
        }
    }

    fn update(&mut self, diffs: MeasureVec) -> Result<(), NavError> {
        self.y = diffs;
        self.innovation = self.y - self.h * self.x;

        self.v_inn = self.h * self.s * self.h.transpose() + self.r;

        let v_inv = self
            .v_inn
            .try_inverse()
            .ok_or(NavError::KfUpdateNonInvertible)?;
        self.k = self.s * self.h.transpose() * v_inv;

        self.x += self.k * self.innovation;
        self.s = (StateMat::identity() - self.k * self.h) * self.s;
        Ok(())
    }
}

fn set_block(m: &mut StateMat, row: usize, col: usize, block: &Matrix3<f64>) {
    m.fixed_view_mut::<3, 3>(row, col).copy_from(block);
}

fn scale_column(m: &mut StateMat, col: usize, factor: f64) {
    for row in 0..STATE_DIM {
        m[(row, col)] *= factor;
    }
}
