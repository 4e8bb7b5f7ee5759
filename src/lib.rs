//! `lab-curves` library crate.
//!
//! The binary (`labfit`) is a thin wrapper around this library so that:
//!
//! - the parse/fit pipeline is testable without spawning processes
//! - bench analyses and the fitter can be reused from other tools

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod labs;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
