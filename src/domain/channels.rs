//! Named, equal-length sample channels.

use std::collections::BTreeMap;

use crate::error::{LabError, Result};

/// Channel name → ordered samples. All channels have the same length.
///
/// A `ChannelSet` is built once (by the de-interleaver or the snapshot
/// loader) and never mutated afterwards; reordering produces a new set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSet {
    channels: BTreeMap<String, Vec<f64>>,
    records: usize,
}

impl ChannelSet {
    /// Build a set from `(name, samples)` pairs.
    ///
    /// Fails if a name is empty or repeated, or if lengths differ.
    pub fn from_channels<I>(channels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f64>)>,
    {
        let mut map = BTreeMap::new();
        let mut records: Option<usize> = None;

        for (name, samples) in channels {
            if name.trim().is_empty() {
                return Err(LabError::InvalidInput("channel name must not be empty".to_string()));
            }
            match records {
                None => records = Some(samples.len()),
                Some(n) if n != samples.len() => {
                    return Err(LabError::InvalidInput(format!(
                        "channel `{name}` has {} sample(s), expected {n}",
                        samples.len()
                    )));
                }
                Some(_) => {}
            }
            if map.insert(name.clone(), samples).is_some() {
                return Err(LabError::InvalidInput(format!("duplicate channel `{name}`")));
            }
        }

        Ok(Self {
            channels: map,
            records: records.unwrap_or(0),
        })
    }

    /// Number of records (the common channel length).
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }

    /// Like [`get`](Self::get), but a missing channel is a configuration error.
    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            LabError::Config(format!(
                "unknown channel `{name}` (available: {})",
                known.join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Reorder every channel by ascending value of `key`.
    ///
    /// The sort is stable, so equal keys keep their capture order.
    pub fn sorted_by(&self, key: &str) -> Result<Self> {
        let key_values = self.require(key)?;
        let mut order: Vec<usize> = (0..self.records).collect();
        order.sort_by(|&i, &j| key_values[i].total_cmp(&key_values[j]));

        let channels = self
            .channels
            .iter()
            .map(|(name, samples)| (name.clone(), order.iter().map(|&i| samples[i]).collect()))
            .collect();

        Ok(Self {
            channels,
            records: self.records,
        })
    }
}
