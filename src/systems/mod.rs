//! The three navigation pipelines, processed strictly in order each epoch:
//! GNSS frame conversion, INS dead reckoning, then the fusion filter.

pub mod fusion;
pub mod gnss;
pub mod ins;

pub use fusion::FusionSystem;
pub use gnss::GnssSystem;
pub use ins::InsSystem;
