//! Utility modules

pub mod progress;
pub mod validation;

pub use progress::*;
pub use validation::*;
