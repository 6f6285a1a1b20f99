// Core types for multi-run SMAC orchestration.

pub mod errors;
pub mod params;

pub use errors::*;
pub use params::*;
