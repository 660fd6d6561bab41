//! Optimizer configuration and per-run options.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_NOISE_FACTOR, DEFAULT_N_SIMS};
use crate::error::{Error, Result};
use crate::resample::{ResampleMethod, ResampleOptions};
use crate::traits::default_worker_count;

/// Where an optimization works and how it is labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Directory trial directories and metadata records are written to.
    pub working_dir: PathBuf,
    /// Control file of the base model; its directory is the input directory.
    pub control_file: PathBuf,
    /// Climate data file handed to every trial.
    pub data_file: PathBuf,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Seed for the shared random source. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Default for [`RunOptions::worker_count`].
    #[serde(default)]
    pub worker_count: Option<usize>,
    #[serde(default)]
    pub resample: ResampleOptions,
}

impl OptimizerConfig {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        control_file: impl Into<PathBuf>,
        data_file: impl Into<PathBuf>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            control_file: control_file.into(),
            data_file: data_file.into(),
            title: title.into(),
            description: None,
            seed: None,
            worker_count: None,
            resample: ResampleOptions::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidConfig("title must not be empty".to_string()));
        }
        if self.title.contains(['/', '\\']) {
            return Err(Error::InvalidConfig(format!(
                "title {:?} must not contain path separators",
                self.title
            )));
        }
        if self.worker_count == Some(0) {
            return Err(Error::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.resample.max_rejections == 0 {
            return Err(Error::InvalidConfig(
                "resample.max_rejections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the control file (and the baseline output).
    pub fn input_dir(&self) -> PathBuf {
        self.control_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Baseline output of the unmodified model.
    pub fn baseline_statvar(&self) -> PathBuf {
        self.input_dir().join("statvar.dat")
    }
}

/// Options for one orchestration call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub n_sims: usize,
    pub method: ResampleMethod,
    pub noise_factor: f64,
    /// Trials run concurrently. `None` uses half the host's parallelism.
    pub worker_count: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            n_sims: DEFAULT_N_SIMS,
            method: ResampleMethod::Uniform,
            noise_factor: DEFAULT_NOISE_FACTOR,
            worker_count: None,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> Result<()> {
        if self.n_sims == 0 {
            return Err(Error::InvalidConfig("n_sims must be at least 1".to_string()));
        }
        if !(self.noise_factor.is_finite() && self.noise_factor > 0.0) {
            return Err(Error::InvalidNoiseFactor(self.noise_factor));
        }
        if self.worker_count == Some(0) {
            return Err(Error::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(default_worker_count)
    }

    /// Fill an unset worker count from the optimizer configuration.
    pub fn or_config(mut self, config: &OptimizerConfig) -> Self {
        self.worker_count = self.worker_count.or(config.worker_count);
        self
    }
}
