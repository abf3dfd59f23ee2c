//! Navigation solution records shared by the GNSS, INS and fusion pipelines.

pub mod linalg;

use nalgebra::Vector3;

/// Geodetic frame block common to every pipeline: the same point expressed in
/// ECEF, in the local ENU tangent plane, and as geodetic LLH, together with
/// the ENU anchor.
///
/// `llh` and `ecef_ref` start as NaN; the anchor is written once, by the first
/// valid GPS fix, and never changes for the rest of the run.
#[derive(Clone, Debug)]
pub struct GeoFrame {
    pub ecef: Vector3<f64>,
    pub enu: Vector3<f64>,
    pub llh: Vector3<f64>,
    pub ecef_ref: Vector3<f64>,
}

impl Default for GeoFrame {
    fn default() -> Self {
        Self {
            ecef: Vector3::zeros(),
            enu: Vector3::zeros(),
            llh: Vector3::repeat(f64::NAN),
            ecef_ref: Vector3::repeat(f64::NAN),
        }
    }
}

/// Inertial navigation solution: the geodetic block plus velocity and
/// attitude, with the last integrated rates kept for trapezoidal integration.
///
/// The fused solution has the same shape, so the fusion pipeline reuses this
/// record.
#[derive(Clone, Debug, Default)]
pub struct InsSolution {
    pub frame: GeoFrame,
    pub v: Vector3<f64>,
    pub v_dot: Vector3<f64>,
    pub rpy: Vector3<f64>,
    pub rpy_dot: Vector3<f64>,
}

/// True when any component of the vector is NaN.
pub fn has_nan(v: &Vector3<f64>) -> bool {
    v.iter().any(|x| x.is_nan())
}
