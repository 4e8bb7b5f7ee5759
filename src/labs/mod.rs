//! Bench-specific analyses that work on tabulated measurements rather than
//! a raw capture.

pub mod distance;
pub mod flow;
pub mod thermistor;
