// Utility functions

pub mod logger;
pub mod signal;

pub use logger::*;
pub use signal::*;
