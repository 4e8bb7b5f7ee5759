//! Fixed-width record layouts and de-interleaving.
//!
//! A capture stores records back to back: token `i*w + j` is column `j` of
//! record `i`. A layout names the columns we care about; the rest are skipped.

use std::collections::HashSet;

use crate::domain::{ChannelSet, ColumnBinding, DatasetConfig};
use crate::error::{LabError, Result};

/// A validated record width plus column → channel bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    width: usize,
    bindings: Vec<ColumnBinding>,
}

impl RecordLayout {
    /// Validate a layout.
    ///
    /// Requires `width >= 1`, at least one binding, every bound column
    /// `< width`, and unique, non-empty channel names and columns.
    pub fn new(width: usize, bindings: &[ColumnBinding]) -> Result<Self> {
        if width == 0 {
            return Err(LabError::Config("record width must be at least 1".to_string()));
        }
        if bindings.is_empty() {
            return Err(LabError::Config("layout binds no columns".to_string()));
        }

        let mut names = HashSet::new();
        let mut columns = HashSet::new();
        for binding in bindings {
            if binding.channel.trim().is_empty() {
                return Err(LabError::Config(format!(
                    "column {} is bound to an empty channel name",
                    binding.index
                )));
            }
            if binding.index >= width {
                return Err(LabError::Config(format!(
                    "channel `{}` is bound to column {}, but records are {width} wide",
                    binding.channel, binding.index
                )));
            }
            if !names.insert(binding.channel.as_str()) {
                return Err(LabError::Config(format!("channel `{}` is bound twice", binding.channel)));
            }
            if !columns.insert(binding.index) {
                return Err(LabError::Config(format!("column {} is bound twice", binding.index)));
            }
        }

        Ok(Self {
            width,
            bindings: bindings.to_vec(),
        })
    }

    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        Self::new(config.record_width, &config.columns)
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// Split a flat token stream into named channels.
///
/// Only whole records are kept: a trailing partial record is dropped (and
/// logged), so every channel has exactly `tokens.len() / width` samples.
pub fn deinterleave(tokens: &[f64], layout: &RecordLayout) -> Result<ChannelSet> {
    let width = layout.width;
    let records = tokens.len() / width;
    let remainder = tokens.len() % width;
    if remainder != 0 {
        log::warn!(
            "dropping {remainder} trailing token(s) that do not fill a {width}-column record"
        );
    }

    let whole = &tokens[..records * width];
    let channels = layout.bindings.iter().map(|binding| {
        let samples: Vec<f64> = whole
            .chunks_exact(width)
            .map(|record| record[binding.index])
            .collect();
        (binding.channel.clone(), samples)
    });

    ChannelSet::from_channels(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lab3_layout() -> RecordLayout {
        RecordLayout::new(
            5,
            &[
                ColumnBinding::new(0, "time"),
                ColumnBinding::new(1, "b"),
                ColumnBinding::new(2, "a"),
                ColumnBinding::new(3, "egr"),
                ColumnBinding::new(4, "pt"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn two_records_of_five() {
        let tokens: Vec<f64> = (1..=10).map(f64::from).collect();
        let set = deinterleave(&tokens, &lab3_layout()).unwrap();
        assert_eq!(set.get("time"), Some(&[1.0, 6.0][..]));
        assert_eq!(set.get("b"), Some(&[2.0, 7.0][..]));
        assert_eq!(set.get("a"), Some(&[3.0, 8.0][..]));
        assert_eq!(set.get("egr"), Some(&[4.0, 9.0][..]));
        assert_eq!(set.get("pt"), Some(&[5.0, 10.0][..]));
    }

    #[test]
    fn partial_record_is_dropped() {
        let layout = RecordLayout::new(4, &[ColumnBinding::new(0, "t"), ColumnBinding::new(2, "lidar")]).unwrap();
        let tokens: Vec<f64> = (1..=7).map(f64::from).collect();
        let set = deinterleave(&tokens, &layout).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("t"), Some(&[1.0][..]));
        assert_eq!(set.get("lidar"), Some(&[3.0][..]));
    }

    #[test]
    fn unbound_columns_are_ignored() {
        let layout = RecordLayout::new(3, &[ColumnBinding::new(1, "mid")]).unwrap();
        let set = deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &layout).unwrap();
        assert_eq!(set.channel_count(), 1);
        assert_eq!(set.get("mid"), Some(&[2.0, 5.0][..]));
    }

    #[test]
    fn fewer_tokens_than_width_gives_empty_channels() {
        let set = deinterleave(&[1.0, 2.0], &lab3_layout()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.channel_count(), 5);
    }

    #[test]
    fn rejects_invalid_layouts() {
        assert!(RecordLayout::new(0, &[ColumnBinding::new(0, "x")]).is_err());
        assert!(RecordLayout::new(2, &[]).is_err());
        assert!(RecordLayout::new(2, &[ColumnBinding::new(2, "x")]).is_err());
        assert!(RecordLayout::new(2, &[ColumnBinding::new(0, "x"), ColumnBinding::new(1, "x")]).is_err());
        assert!(RecordLayout::new(2, &[ColumnBinding::new(0, "x"), ColumnBinding::new(0, "y")]).is_err());
        assert!(RecordLayout::new(2, &[ColumnBinding::new(0, " ")]).is_err());
    }

    proptest! {
        #[test]
        fn channel_lengths_follow_integer_division(
            width in 1usize..8,
            records in 0usize..40,
            extra in 0usize..8,
        ) {
            let remainder = extra % width;
            let total = records * width + remainder;
            let tokens: Vec<f64> = (0..total).map(|i| i as f64).collect();
            let bindings: Vec<ColumnBinding> =
                (0..width).map(|j| ColumnBinding::new(j, format!("c{j}"))).collect();
            let layout = RecordLayout::new(width, &bindings).unwrap();

            let set = deinterleave(&tokens, &layout).unwrap();
            prop_assert_eq!(set.len(), records);
            for (j, binding) in bindings.iter().enumerate() {
                let samples = set.get(&binding.channel).unwrap();
                for (i, &v) in samples.iter().enumerate() {
                    prop_assert_eq!(v, (i * width + j) as f64);
                }
                // Remainder tokens never reach a channel.
                prop_assert!(samples.iter().all(|&v| (v as usize) < records * width));
            }
        }
    }
}
