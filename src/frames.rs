//! Coordinate frame conversions and rotation helpers.
//!
//! Pure functions over 3-vectors and 3×3 matrices:
//! - LLH ↔ ECEF (WGS-84)
//! - ECEF ↔ ENU around a caller-supplied anchor
//! - Body ↔ ENU and body ↔ local-horizontal rotations
//! - Euler-rate dynamics matrix, skew matrices, Earth-rotation skew
//! - Local gravity model and attitude angle wrapping

use nalgebra::{Matrix3, Vector3};

// WGS-84 and gravity model constants
pub const SEMI_MAJOR_A: f64 = 6378137.0;
pub const SEMI_MINOR_B: f64 = 6356752.3142;
pub const ECC: f64 = 0.08181919084261345;
pub const ECC_SECOND: f64 = 0.0820944379497174;
pub const G_EQUATOR: f64 = 9.78032677;
pub const G_POLES: f64 = 9.83218636;
pub const EARTH_ROTATION: f64 = 7.2921150e-5;

/// Snap band for yaw wrapping, in radians.
pub const ADJUST_ANGLE_MARGIN: f64 = 0.001;

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;
const HALF_PI: f64 = std::f64::consts::FRAC_PI_2;

/// Geodetic LLH (rad, rad, m) to ECEF (m).
pub fn llh_to_ecef(llh: &Vector3<f64>) -> Vector3<f64> {
    let (phi, lambda, h) = (llh.x, llh.y, llh.z);

    let n = SEMI_MAJOR_A / (1.0 + (1.0 - ECC.powi(2)) * phi.tan().powi(2)).sqrt();
    let x = lambda.cos() * n + h * lambda.cos() * phi.cos();
    let y = lambda.sin() * n + h * lambda.sin() * phi.cos();
    let mut z = SEMI_MAJOR_A * (1.0 - ECC.powi(2)) * phi.sin()
        / (1.0 - ECC.powi(2) * phi.sin().powi(2)).sqrt();
    z += h * phi.sin();

    Vector3::new(x, y, z)
}

/// ECEF (m) to geodetic LLH (rad, rad, m), Bowring-style fixed point on
/// tan(u) with termination when |Δ tan u| < 1e-12.
///
/// NaN input falls through: the iteration terminates on its first pass and
/// the result is NaN, which downstream validity gates absorb.
pub fn ecef_to_llh(ecef: &Vector3<f64>) -> Vector3<f64> {
    let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
    let mut tan_u = if p > 0.0 {
        (ecef.z / p) * SEMI_MAJOR_A / SEMI_MINOR_B
    } else {
        0.0
    };

    let mut tan_phi = 0.0;
    let mut diff_tan_u: f64 = 1.0;
    while diff_tan_u.abs() > 1e-12 {
        let cos2u = if p > 0.0 { 1.0 / (1.0 + tan_u * tan_u) } else { 0.0 };
        let sin2u = 1.0 - cos2u;
        tan_phi = (ecef.z + ECC_SECOND.powi(2) * SEMI_MINOR_B * sin2u.sqrt().powi(3))
            / (p - ECC.powi(2) * SEMI_MAJOR_A * cos2u.sqrt().powi(3));
        diff_tan_u = tan_u;
        tan_u = SEMI_MINOR_B / SEMI_MAJOR_A * tan_phi;
        diff_tan_u -= tan_u;
    }
    let phi = tan_phi.atan();
    let n = SEMI_MAJOR_A / (1.0 - ECC.powi(2) * phi.sin().powi(2)).sqrt();

    // Height formula switches near the poles, where p/cos(phi) degenerates.
    let mut h = 0.0;
    if (phi.abs() * 256.0) as i64 != (HALF_PI * 256.0) as i64 {
        h = p / phi.cos() - n;
    } else if (phi.abs() * 256.0) as i64 != 0 {
        h = ecef.z / phi.sin() - n + ECC.powi(2) * n;
    }

    // Longitude by quadrant of (x, y).
    let lambda = if (ecef.x * 256.0) as i64 >= 0 {
        (ecef.y / ecef.x).atan()
    } else if (ecef.y * 256.0) as i64 >= 0 {
        std::f64::consts::PI + (ecef.y / ecef.x).atan()
    } else {
        -std::f64::consts::PI + (ecef.y / ecef.x).atan()
    };

    Vector3::new(phi, lambda, h)
}

/// Rotation taking ECEF deltas into the ENU tangent plane at `llh`.
pub fn matrix_ecef_to_enu(llh: &Vector3<f64>) -> Matrix3<f64> {
    let (cos_lat, sin_lat) = (llh.x.cos(), llh.x.sin());
    let (cos_lon, sin_lon) = (llh.y.cos(), llh.y.sin());

    Matrix3::new(
        -sin_lon,
        cos_lon,
        0.0,
        -sin_lat * cos_lon,
        -sin_lat * sin_lon,
        cos_lat,
        cos_lat * cos_lon,
        cos_lat * sin_lon,
        sin_lat,
    )
}

/// ECEF to ENU relative to the anchor `xyz0`.
pub fn ecef_to_enu(llh: &Vector3<f64>, ecef: &Vector3<f64>, xyz0: &Vector3<f64>) -> Vector3<f64> {
    matrix_ecef_to_enu(llh) * (ecef - xyz0)
}

/// ENU back to ECEF around the anchor `xyz0`.
pub fn enu_to_ecef(llh: &Vector3<f64>, enu: &Vector3<f64>, xyz0: &Vector3<f64>) -> Vector3<f64> {
    matrix_ecef_to_enu(llh).transpose() * enu + xyz0
}

/// Rotation about the X axis. The Y and Z rotations are the cyclic
/// row-and-column shifts of this one template.
pub fn rot_rx(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c)
}

/// Rotation about the Y axis: `rot_rx` shifted by +1.
pub fn rot_ry(angle: f64) -> Matrix3<f64> {
    shift_rows_cols(&rot_rx(angle), 1)
}

/// Rotation about the Z axis: `rot_rx` shifted by −1.
pub fn rot_rz(angle: f64) -> Matrix3<f64> {
    shift_rows_cols(&rot_rx(angle), -1)
}

/// Cyclic shift of rows and columns by `by` (positive shifts down/right).
fn shift_rows_cols(m: &Matrix3<f64>, by: i32) -> Matrix3<f64> {
    let mut out = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            let rr = (r as i32 + by).rem_euclid(3) as usize;
            let cc = (c as i32 + by).rem_euclid(3) as usize;
            out[(rr, cc)] = m[(r, c)];
        }
    }
    out
}

/// Body-to-ENU rotation from roll, pitch, yaw (yaw measured from North).
/// Any NaN entry is replaced by 0.
pub fn body_to_enu(rpy: &Vector3<f64>) -> Matrix3<f64> {
    let (roll, pitch, yaw) = (rpy.x, rpy.y, rpy.z);
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();

    let m = Matrix3::new(
        sy * cp,
        cy * cr + sy * sp * sr,
        -cy * sr + sy * sp * cr,
        cy * cp,
        -sy * cr + cy * sp * sr,
        cy * sp * cr + sy * sr,
        sp,
        -cp * sr,
        -cp * cr,
    );
    nan_to_zero(&m)
}

/// Projection of body-frame vectors onto the local horizontal plane.
pub fn body_to_horizontal(rpy: &Vector3<f64>) -> Matrix3<f64> {
    rot_rx(-rpy.x) * rot_ry(-rpy.y)
}

/// Reshape a row-major 9-vector into the platform-to-body matrix.
pub fn platform_to_body(rows: &[f64; 9]) -> Matrix3<f64> {
    Matrix3::from_row_slice(rows)
}

/// Euler-rate transformation M with RPY_dot = M · ω_body. NaN entries
/// (gimbal lock at pitch = ±π/2) are replaced by 0.
pub fn euler_rate_matrix(rpy: &Vector3<f64>) -> Matrix3<f64> {
    let (sr, cr) = rpy.x.sin_cos();
    let (tp, cp) = (rpy.y.tan(), rpy.y.cos());

    let m = Matrix3::new(
        1.0,
        sr * tp,
        cr * tp,
        0.0,
        cr,
        -sr,
        0.0,
        sr / cp,
        cr / cp,
    );
    nan_to_zero(&m)
}

/// Skew-symmetric matrix with `skew(v) * w == v × w`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Skew matrix of the Earth rotation rate resolved in the local frame.
pub fn skew_inertial_earth(lat: f64) -> Matrix3<f64> {
    let w = Vector3::new(0.0, EARTH_ROTATION * lat.cos(), EARTH_ROTATION * lat.sin());
    skew(&w)
}

/// Somigliana surface gravity scaled by (a/(a+h))², as a positive scalar
/// along local Down.
pub fn gravity_correction_z(lat: f64, height: f64) -> f64 {
    let k = (SEMI_MINOR_B * G_POLES) / (SEMI_MAJOR_A * G_EQUATOR) - 1.0;
    let g0 = G_EQUATOR * (1.0 + k * lat.sin().powi(2))
        / (1.0 - ECC.powi(2) * lat.sin().powi(2)).sqrt();
    let b = (SEMI_MAJOR_A / (SEMI_MAJOR_A + height)).powi(2);
    g0 * b
}

/// Clamp roll/pitch overflow. Both overflow branches land on −π/2; the sign
/// bias on the positive side is inherited behavior and relied upon elsewhere.
pub fn clamp_roll_pitch(x: f64) -> f64 {
    if x > HALF_PI || x < -HALF_PI {
        -HALF_PI
    } else {
        x
    }
}

/// Wrap yaw into [0, 2π], snapping values within `ADJUST_ANGLE_MARGIN` of
/// either endpoint onto the endpoint itself.
pub fn wrap_yaw(yaw: f64) -> f64 {
    if yaw > TWO_PI {
        if (yaw - TWO_PI).abs() < ADJUST_ANGLE_MARGIN {
            TWO_PI
        } else {
            yaw.rem_euclid(TWO_PI)
        }
    } else if yaw < 0.0 {
        if yaw.abs() < ADJUST_ANGLE_MARGIN {
            0.0
        } else {
            yaw.rem_euclid(TWO_PI)
        }
    } else {
        yaw
    }
}

fn nan_to_zero(m: &Matrix3<f64>) -> Matrix3<f64> {
    m.map(|v| if v.is_nan() { 0.0 } else { v })
}
