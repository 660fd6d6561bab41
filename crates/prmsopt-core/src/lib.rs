//! prmsopt: parameter resampling, trial orchestration and result ranking
//! for PRMS model calibration.
//!
//! An [`optimizer::Optimizer`] draws perturbed copies of selected parameters,
//! hands each trial to a [`traits::SimulationRunner`] and records what it did.
//! [`results::OptimizationResult`] later scores those trials against a
//! reference series and ranks them.
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod parameters;
pub mod ranges;
pub mod resample;
pub mod results;
pub mod runner;
pub mod statvar;
pub mod timeseries;
pub mod traits;

pub use config::{OptimizerConfig, RunOptions};
pub use error::{Error, Result};
pub use optimizer::{OptimizationRecord, Optimizer, Stage, StageConfig, StageRun};
pub use parameters::{Parameter, ParameterOverlay, ParameterSet};
pub use ranges::RangeRegistry;
pub use resample::{ResampleMethod, ResampleSpec};
pub use results::{OptimizationResult, ResultTable, TopRanked};
