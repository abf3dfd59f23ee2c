//! Estimation filters.

pub mod error_state;

pub use error_state::ErrorStateEkf;
