pub mod calibration;
pub mod config;

pub use self::calibration::*;
pub use self::config::*;
