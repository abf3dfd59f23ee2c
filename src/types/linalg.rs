//! Linear algebra type system for the navigation engine.
//!
//! Provides compile-time dimension checking and clean type aliases
//! for the error-state Kalman filter.

use nalgebra::{SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM: usize = 15;

// ===== Measurement Dimensions =====
pub const MEASURE_DIM: usize = 3; // GPS position difference (E, N, U)

// ===== 15-State Filter Types =====
pub type StateVec = SVector<f64, STATE_DIM>;
pub type StateMat = SMatrix<f64, STATE_DIM, STATE_DIM>;

// Measurement types
pub type MeasureVec = SVector<f64, MEASURE_DIM>;
pub type MeasureMat = SMatrix<f64, MEASURE_DIM, MEASURE_DIM>;

// Kalman gain type
pub type KalmanGain = SMatrix<f64, STATE_DIM, MEASURE_DIM>; // 15×3

// Observation matrix type
pub type ObsMat = SMatrix<f64, MEASURE_DIM, STATE_DIM>; // 3×15

// ===== State vector block offsets =====
pub const BLOCK_POS: usize = 0; // position error (ENU)
pub const BLOCK_VEL: usize = 3; // velocity error
pub const BLOCK_ATT: usize = 6; // attitude error (roll, pitch, yaw)
pub const BLOCK_ACC_BIAS: usize = 9; // accelerometer bias
pub const BLOCK_GYR_BIAS: usize = 12; // gyroscope bias
