//! Error taxonomy for the whole pipeline.
//!
//! Every stage reports failures through [`LabError`]. Nothing is recovered
//! locally: the binary prints the message and exits with [`LabError::exit_code`].

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = LabError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LabError {
    /// A token in the input text is not a finite numeric literal.
    #[error("parse error at {source_name}:{line}:{field}: `{token}` is not a finite number")]
    Parse {
        source_name: String,
        line: usize,
        field: usize,
        token: String,
    },

    /// Independent and dependent series differ in length (or are empty).
    #[error("shape mismatch: x has {x_len} value(s), y has {y_len}")]
    ShapeMismatch { x_len: usize, y_len: usize },

    /// Too few points remain for the model's parameter count.
    #[error("insufficient data: {kept} point(s) available, at least {required} required")]
    InsufficientData { kept: usize, required: usize },

    /// The nonlinear solver gave up.
    #[error("{model} fit did not converge after {iterations} iteration(s): {reason}")]
    Convergence {
        model: String,
        iterations: usize,
        reason: String,
    },

    /// A required file (input capture or snapshot) does not exist.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("corrupt snapshot {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Values that no model can accept (non-finite, below absolute zero, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("render error: {0}")]
    Render(String),
}

impl LabError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this failure.
    ///
    /// - 2: input or configuration problems
    /// - 3: data that cannot be analysed
    /// - 4: numerical failure
    /// - 5: output could not be written
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Parse { .. } | Self::NotFound { .. } | Self::Config(_) => 2,
            Self::ShapeMismatch { .. }
            | Self::InsufficientData { .. }
            | Self::Corrupt { .. }
            | Self::InvalidInput(_) => 3,
            Self::Convergence { .. } => 4,
            Self::Io { .. } | Self::Render(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_stage() {
        let parse = LabError::Parse {
            source_name: "m.txt".to_string(),
            line: 3,
            field: 2,
            token: "x".to_string(),
        };
        assert_eq!(parse.exit_code(), 2);
        assert_eq!(LabError::ShapeMismatch { x_len: 1, y_len: 2 }.exit_code(), 3);
        let conv = LabError::Convergence {
            model: "exponential".to_string(),
            iterations: 200,
            reason: "budget".to_string(),
        };
        assert_eq!(conv.exit_code(), 4);
    }

    #[test]
    fn parse_message_names_location_and_token() {
        let err = LabError::Parse {
            source_name: "measurements.txt".to_string(),
            line: 7,
            field: 3,
            token: "12,5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parse error at measurements.txt:7:3: `12,5` is not a finite number"
        );
    }
}
