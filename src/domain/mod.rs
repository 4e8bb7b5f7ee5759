//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the channel container produced by ingest (`ChannelSet`)
//! - model, bounds and subset descriptions (`ModelKind`, `Bounds`, `Subset`)
//! - fit outputs (`FitResult`, `FitQuality`)
//! - dataset and job configuration (`DatasetConfig`, `FitJob`, `LabConfig`)

pub mod channels;
pub mod types;

pub use channels::*;
pub use types::*;
