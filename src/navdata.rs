//! Per-epoch sensor conditioning.
//!
//! Each CSV row passes through a fixed sequence before any pipeline sees it:
//! column lookup, height substitution, rest-bias subtraction, quantization,
//! platform-to-body rotation (accelerometer only), optional bias feedback,
//! unit conversion, freshness/validity detection, axis masking, optional
//! horizontal alignment and optional gravity compensation.

use nalgebra::Vector3;

use crate::config::Config;
use crate::error::NavError;
use crate::frames;
use crate::types::has_nan;

const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// One input category: the configured CSV column per axis and the current
/// conditioned value.
#[derive(Clone, Debug)]
pub struct InputChannel {
    pub ids: [Option<usize>; 3],
    pub values: Vector3<f64>,
}

impl InputChannel {
    fn new(ids: [Option<usize>; 3]) -> Self {
        Self {
            ids,
            values: Vector3::zeros(),
        }
    }

    fn fill(&mut self, row: &[f64]) -> Result<(), NavError> {
        for (axis, id) in self.ids.iter().enumerate() {
            if let Some(col) = id {
                self.values[axis] = *row.get(*col).ok_or_else(|| {
                    NavError::OutOfRange(format!(
                        "CSV column {col} not present in row of {} fields",
                        row.len()
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Holder of the current epoch's conditioned sensor vector.
#[derive(Debug)]
pub struct NavData {
    pub gps: InputChannel, // lat, lon, height
    pub acc: InputChannel,
    pub gyr: InputChannel,
    pub mag: InputChannel,
    pub rpy: InputChannel,
    pub hdop: InputChannel,
    epoch: usize,
    is_gps_new: bool,
    is_gps_valid: bool,
}

impl NavData {
    pub fn new(cfg: &Config) -> Self {
        Self {
            gps: InputChannel::new(cfg.cols.gps),
            acc: InputChannel::new(cfg.cols.acc),
            gyr: InputChannel::new(cfg.cols.gyr),
            mag: InputChannel::new(cfg.cols.mag),
            rpy: InputChannel::new(cfg.cols.rpy),
            hdop: InputChannel::new(cfg.cols.hdop),
            epoch: 0,
            is_gps_new: false,
            is_gps_valid: false,
        }
    }

    /// Condition one CSV row.
    ///
    /// `ins_rpy` is the INS attitude of the previous epoch; `kf_bias` carries
    /// the accelerometer/gyroscope bias blocks of the previous epoch's filter
    /// state when feedback is enabled.
    pub fn update(
        &mut self,
        row: &[f64],
        cfg: &Config,
        ins_rpy: &Vector3<f64>,
        kf_bias: Option<(Vector3<f64>, Vector3<f64>)>,
    ) -> Result<(), NavError> {
        let old_gps = self.gps.values;

        self.epoch += 1;

        self.gps.fill(row)?;
        self.acc.fill(row)?;
        self.gyr.fill(row)?;
        self.mag.fill(row)?;
        self.rpy.fill(row)?;
        self.hdop.fill(row)?;

        // Height column absent: use the configured scalar instead.
        if self.gps.ids[2].is_none() {
            self.gps.values.z = cfg.height_val;
        }

        // Rest bias removal happens in the platform frame.
        self.acc.values -= cfg.acc_rest;
        self.gyr.values -= cfg.gyr_rest;

        let q = cfg.quant_factor;
        self.acc.values = quantize(&self.acc.values, q);
        self.gyr.values = quantize(&self.gyr.values, q);
        self.mag.values = quantize(&self.mag.values, q);
        self.rpy.values = quantize(&self.rpy.values, q);

        // Platform-to-body applies to the accelerometer only; the gyroscope
        // keeps its platform axes.
        self.acc.values = cfg.plat2body * self.acc.values;

        if cfg.feedback_bias {
            if let Some((acc_bias, gyr_bias)) = kf_bias {
                self.acc.values += acc_bias;
                self.gyr.values += gyr_bias;
            }
        }

        if !cfg.angles_in_radians {
            self.rpy.values *= DEG2RAD;
        }
        self.gps.values.x *= DEG2RAD;
        self.gps.values.y *= DEG2RAD;

        self.is_gps_new = (old_gps - self.gps.values).abs().sum() > 0.0;
        self.is_gps_valid = !has_nan(&self.gps.values);

        self.acc.values = self.acc.values.component_mul(&cfg.body_selector);
        self.gyr.values = self.gyr.values.component_mul(&cfg.attitude_selector);
        self.mag.values = self.mag.values.component_mul(&cfg.body_selector);

        if cfg.horizontal_alignment {
            let b2h = frames::body_to_horizontal(ins_rpy);
            self.acc.values = b2h * self.acc.values;
            self.gyr.values = b2h * self.gyr.values;
        }

        if cfg.gravity_correction {
            // Argument order mirrors the call site this conditioning was
            // lifted from: the GPS height lands in the latitude slot.
            let gz = frames::gravity_correction_z(self.gps.values.z, self.gps.values.x);
            let gl = Vector3::new(0.0, 0.0, gz);
            self.acc.values -= frames::body_to_enu(ins_rpy) * gl;
        }

        Ok(())
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// True when the GPS input vector changed since the previous epoch.
    pub fn is_gps_new(&self) -> bool {
        self.is_gps_new
    }

    /// True when the GPS input vector contains no NaN.
    pub fn is_gps_valid(&self) -> bool {
        self.is_gps_valid
    }
}

/// Truncating quantization: x -> trunc(x·q)/q.
fn quantize(v: &Vector3<f64>, q: f64) -> Vector3<f64> {
    v.map(|x| (x * q).trunc() / q)
}
