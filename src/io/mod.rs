//! Input/output helpers.
//!
//! - delimited-text tokenizer + dataset ingest (`ingest`)
//! - record layouts and de-interleaving (`layout`)
//! - snapshot JSON read/write (`snapshot`)
//! - fit exports (JSON/CSV) (`export`)

pub mod export;
pub mod ingest;
pub mod layout;
pub mod snapshot;

pub use export::*;
pub use ingest::*;
pub use layout::*;
pub use snapshot::*;
