//! Snapshot files: one JSON document per dataset.
//!
//! A snapshot is the persisted form of a [`ChannelSet`]:
//! - a format tag (`labfit-snapshot`)
//! - when it was written and how many records each channel holds
//! - the channels themselves, by name
//!
//! Saving goes through a temporary file in the destination directory that is
//! synced and then renamed over the target, so readers never observe a
//! half-written snapshot.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ChannelSet;
use crate::error::{LabError, Result};

pub const SNAPSHOT_FORMAT: &str = "labfit-snapshot";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDoc<C> {
    format: String,
    written_at: DateTime<Utc>,
    record_count: usize,
    channels: C,
}

/// Atomically write `channels` to `path`.
pub fn save_snapshot(path: &Path, channels: &ChannelSet) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| LabError::io(format!("failed to create '{}'", parent.display()), e))?;

    let doc = SnapshotDoc {
        format: SNAPSHOT_FORMAT.to_string(),
        written_at: Utc::now(),
        record_count: channels.len(),
        channels: channels.iter().collect::<BTreeMap<&str, &[f64]>>(),
    };

    let tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| LabError::io(format!("failed to create temporary file in '{}'", parent.display()), e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, &doc)
            .map_err(|e| LabError::io(format!("failed to encode snapshot '{}'", path.display()), e.into()))?;
        writer
            .flush()
            .map_err(|e| LabError::io(format!("failed to write snapshot '{}'", path.display()), e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| LabError::io(format!("failed to sync snapshot '{}'", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| LabError::io(format!("failed to replace snapshot '{}'", path.display()), e.error))?;

    log::info!(
        "snapshot written: {} ({} record(s), {} channel(s))",
        path.display(),
        channels.len(),
        channels.channel_count()
    );
    Ok(())
}

/// Read a snapshot written by [`save_snapshot`].
pub fn load_snapshot(path: &Path) -> Result<ChannelSet> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LabError::NotFound {
            path: path.to_path_buf(),
        },
        _ => LabError::io(format!("failed to open snapshot '{}'", path.display()), e),
    })?;

    let corrupt = |reason: String| LabError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let doc: SnapshotDoc<BTreeMap<String, Vec<f64>>> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;

    if doc.format != SNAPSHOT_FORMAT {
        return Err(corrupt(format!(
            "format tag is `{}`, expected `{SNAPSHOT_FORMAT}`",
            doc.format
        )));
    }
    if let Some((name, samples)) = doc.channels.iter().find(|(_, v)| v.len() != doc.record_count) {
        return Err(corrupt(format!(
            "channel `{name}` has {} sample(s), header says {}",
            samples.len(),
            doc.record_count
        )));
    }

    let channels = ChannelSet::from_channels(doc.channels).map_err(|e| corrupt(e.to_string()))?;
    log::info!(
        "snapshot loaded: {} ({} record(s), written {})",
        path.display(),
        channels.len(),
        doc.written_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(channels)
}
