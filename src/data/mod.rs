//! Data sources that are not real captures.

pub mod synth;

pub use synth::{synth_capture, write_capture};
