//! Error type shared by every prmsopt operation.
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not a parameter of the base parameter set")]
    UnknownParameter(String),

    #[error("{0} has no registered resampling bounds; add its min and max to the range registry")]
    UnknownParameterBounds(String),

    #[error("{name} should not be resampled: dimension {dimension} is cascade or routing topology")]
    NonResamplableParameter { name: String, dimension: String },

    #[error("{name} has dimensions {dimnames:?} that no resampling case supports")]
    UnsupportedDimensions { name: String, dimnames: Vec<String> },

    #[error("{name}: base values span [{base_min}, {base_max}], wider than [{min}, {max}]")]
    BaseExceedsBounds {
        name: String,
        base_min: f64,
        base_max: f64,
        min: f64,
        max: f64,
    },

    #[error("noise factor must be positive and finite, got {0}")]
    InvalidNoiseFactor(f64),

    #[error("{name}: no normal draw fell within [{min}, {max}] after {attempts} attempts")]
    RejectionLimit {
        name: String,
        min: f64,
        max: f64,
        attempts: usize,
    },

    #[error("no optimization records for stage {stage} in {}", working_dir.display())]
    MissingOptimizationArtifacts { stage: String, working_dir: PathBuf },

    #[error("variable {variable} not found in {}", path.display())]
    MissingVariable { variable: String, path: PathBuf },

    #[error("record {} has no {key} entry", path.display())]
    MissingReference { key: String, path: PathBuf },

    #[error("{}:{line}: {message}", path.display())]
    ParameterFile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: {message}", path.display())]
    Statvar {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: {message}", path.display())]
    Reference {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("simulation in {} failed: {message}", dir.display())]
    Simulation { dir: PathBuf, message: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors raised before any draw or file write
    /// because the request itself is malformed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownParameter(_)
                | Error::UnknownParameterBounds(_)
                | Error::NonResamplableParameter { .. }
                | Error::UnsupportedDimensions { .. }
                | Error::BaseExceedsBounds { .. }
                | Error::InvalidNoiseFactor(_)
                | Error::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_parameter() {
        let err = Error::UnknownParameterBounds("snow_adj".to_string());
        assert!(err.to_string().contains("snow_adj"));

        let err = Error::NonResamplableParameter {
            name: "hru_segment".to_string(),
            dimension: "nsegment".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("hru_segment"));
        assert!(msg.contains("nsegment"));
    }

    #[test]
    fn missing_artifacts_names_stage_and_dir() {
        let err = Error::MissingOptimizationArtifacts {
            stage: "swrad".to_string(),
            working_dir: PathBuf::from("/tmp/opt"),
        };
        let msg = err.to_string();
        assert!(msg.contains("swrad"));
        assert!(msg.contains("/tmp/opt"));
    }

    #[test]
    fn configuration_classification() {
        assert!(Error::InvalidNoiseFactor(0.0).is_configuration());
        assert!(Error::UnknownParameter("x".to_string()).is_configuration());
        assert!(!Error::io("a", std::io::Error::other("boom")).is_configuration());
    }
}
