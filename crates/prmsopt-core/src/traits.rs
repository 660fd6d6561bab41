//! Seams to the external simulation program.
//!
//! The engine never runs the model itself: it hands [`SimulationJob`]s to a
//! [`SimulationRunner`] and reads results back through an [`OutputLoader`].
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parameters::ParameterOverlay;
use crate::timeseries::TimeSeries;

/// Output variables of one run, keyed by column name (e.g. `basin_swrad_1`).
pub type Statvar = BTreeMap<String, TimeSeries>;

/// One trial: a parameter set to run in its own directory.
#[derive(Debug, Clone)]
pub struct SimulationJob {
    pub parameters: ParameterOverlay,
    pub control_file: PathBuf,
    pub data_file: PathBuf,
    pub simulation_dir: PathBuf,
}

/// Where a finished run left its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub simulation_dir: PathBuf,
    pub statvar_file: PathBuf,
}

impl SimulationOutput {
    /// Conventional layout: `{dir}/outputs/statvar.dat`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let simulation_dir = dir.into();
        let statvar_file = simulation_dir.join("outputs").join("statvar.dat");
        Self {
            simulation_dir,
            statvar_file,
        }
    }

    /// `{dir}/inputs/parameters`.
    pub fn parameter_file(&self) -> PathBuf {
        self.simulation_dir.join("inputs").join("parameters")
    }

    /// Last path component of the simulation directory.
    pub fn name(&self) -> String {
        self.simulation_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.simulation_dir.display().to_string())
    }
}

/// Executes simulation runs.
pub trait SimulationRunner: Sync {
    /// Run one trial and report where its output went.
    fn run(&self, job: &SimulationJob) -> Result<SimulationOutput>;

    /// Run the unmodified model described by `control_file` in place, so its
    /// input directory gains a baseline `statvar.dat`.
    fn run_baseline(&self, control_file: &Path) -> Result<()>;

    /// Run all jobs on `worker_count` threads.
    ///
    /// Outputs come back in submission order. The first failure aborts the
    /// batch and is returned.
    fn run_series(
        &self,
        jobs: &[SimulationJob],
        worker_count: usize,
    ) -> Result<Vec<SimulationOutput>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count.max(1))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot start worker pool: {}", e)))?;
        pool.install(|| jobs.par_iter().map(|job| self.run(job)).collect())
    }
}

/// Reads a run's output table.
pub trait OutputLoader: Sync {
    fn load(&self, statvar_file: &Path) -> Result<Statvar>;

    /// Load a single variable, failing if it is absent.
    fn load_variable(&self, statvar_file: &Path, variable: &str) -> Result<TimeSeries> {
        let mut all = self.load(statvar_file)?;
        all.remove(variable).ok_or_else(|| Error::MissingVariable {
            variable: variable.to_string(),
            path: statvar_file.to_path_buf(),
        })
    }
}

/// Half the host's parallelism, at least one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct EchoRunner {
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    impl SimulationRunner for EchoRunner {
        fn run(&self, job: &SimulationJob) -> Result<SimulationOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let out = SimulationOutput::from_dir(&job.simulation_dir);
            if self.fail_on.as_deref() == Some(out.name().as_str()) {
                return Err(Error::Simulation {
                    dir: job.simulation_dir.clone(),
                    message: "exit status 1".to_string(),
                });
            }
            Ok(out)
        }

        fn run_baseline(&self, _control_file: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn jobs(n: usize) -> Vec<SimulationJob> {
        let base = Arc::new(ParameterSet::default());
        (0..n)
            .map(|i| SimulationJob {
                parameters: ParameterOverlay::new(base.clone()),
                control_file: PathBuf::from("control"),
                data_file: PathBuf::from("data"),
                simulation_dir: PathBuf::from(format!("work/trial{}", i)),
            })
            .collect()
    }

    #[test]
    fn run_series_preserves_order() {
        let runner = EchoRunner {
            calls: AtomicUsize::new(0),
            fail_on: None,
        };
        let outputs = runner.run_series(&jobs(20), 4).unwrap();
        let names: Vec<String> = outputs.iter().map(|o| o.name()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("trial{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn run_series_surfaces_failure() {
        let runner = EchoRunner {
            calls: AtomicUsize::new(0),
            fail_on: Some("trial3".to_string()),
        };
        let err = runner.run_series(&jobs(8), 2).unwrap_err();
        assert!(matches!(err, Error::Simulation { .. }));
    }

    #[test]
    fn output_layout() {
        let out = SimulationOutput::from_dir("work/dday_intcp:-20.000000");
        assert_eq!(
            out.statvar_file,
            PathBuf::from("work/dday_intcp:-20.000000/outputs/statvar.dat")
        );
        assert_eq!(
            out.parameter_file(),
            PathBuf::from("work/dday_intcp:-20.000000/inputs/parameters")
        );
        assert_eq!(out.name(), "dday_intcp:-20.000000");
    }

    #[test]
    fn worker_default_is_positive() {
        assert!(default_worker_count() >= 1);
    }
}
