use std::path::PathBuf;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::convert::{parse_method, py_err};
use prmsopt_core::constants::{DEFAULT_NOISE_FACTOR, DEFAULT_N_SIMS};
use prmsopt_core::optimizer::{
    self, OptimizationRecord, PetModule, Stage, StageRun, StationHru,
};
use prmsopt_core::parameters::read_parameter_file;
use prmsopt_core::runner::PrmsRunner;
use prmsopt_core::{Optimizer, OptimizerConfig, RunOptions};

fn station(station_hru: Option<usize>) -> StationHru {
    station_hru.map_or(StationHru::Basin, StationHru::Hru)
}

fn run_options(
    n_sims: usize,
    method: &str,
    noise_factor: f64,
    nproc: Option<usize>,
) -> PyResult<RunOptions> {
    Ok(RunOptions {
        n_sims,
        method: parse_method(method)?,
        noise_factor,
        worker_count: nproc,
    })
}

fn record_to_dict<'py>(py: Python<'py>, run: &StageRun) -> PyResult<Bound<'py, PyDict>> {
    let r: &OptimizationRecord = &run.record;
    let dict = PyDict::new(py);
    dict.set_item("stage", r.stage.as_str())?;
    dict.set_item("optimization_title", &r.title)?;
    dict.set_item("optimization_description", &r.description)?;
    dict.set_item("params_adjusted", &r.params_adjusted)?;
    dict.set_item(r.stage.statvar_key(), &r.statvar_name)?;
    dict.set_item(r.stage.measured_key(), &r.measured)?;
    dict.set_item("resample", r.resample.as_str())?;
    dict.set_item("start_time", r.start_time.to_string())?;
    dict.set_item("end_time", r.end_time.to_string())?;
    dict.set_item("original_params", &r.original_params)?;
    dict.set_item("nproc", r.nproc)?;
    dict.set_item("n_sims", r.n_sims)?;
    dict.set_item("sim_dirs", &r.sim_dirs)?;
    dict.set_item("record_path", &run.record_path)?;
    Ok(dict)
}

/// Runs calibration stages of a PRMS model through the `prms` executable.
#[pyclass(name = "Optimizer")]
struct PyOptimizer {
    inner: Optimizer<PrmsRunner>,
}

#[pymethods]
impl PyOptimizer {
    #[new]
    #[pyo3(signature = (
        parameter_file,
        working_dir,
        control_file,
        data_file,
        title,
        description=None,
        seed=None,
        prms_exe=PathBuf::from("prms"),
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        py: Python<'_>,
        parameter_file: PathBuf,
        working_dir: PathBuf,
        control_file: PathBuf,
        data_file: PathBuf,
        title: String,
        description: Option<String>,
        seed: Option<u64>,
        prms_exe: PathBuf,
    ) -> PyResult<Self> {
        let mut config = OptimizerConfig::new(working_dir, control_file, data_file, title);
        config.description = description;
        config.seed = seed;
        let params = read_parameter_file(&parameter_file).map_err(py_err)?;
        let runner = PrmsRunner::new(prms_exe);
        let inner = py
            .allow_threads(|| Optimizer::new(config, params, runner))
            .map_err(py_err)?;
        Ok(Self { inner })
    }

    /// Solar radiation stage (ddsolrad).
    #[pyo3(signature = (
        reference,
        station_hru=None,
        n_sims=DEFAULT_N_SIMS,
        method="uniform",
        noise_factor=DEFAULT_NOISE_FACTOR,
        nproc=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn srad<'py>(
        &mut self,
        py: Python<'py>,
        reference: PathBuf,
        station_hru: Option<usize>,
        n_sims: usize,
        method: &str,
        noise_factor: f64,
        nproc: Option<usize>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let options = run_options(n_sims, method, noise_factor, nproc)?;
        let inner = &mut self.inner;
        let run = py
            .allow_threads(|| inner.srad(reference, station(station_hru), &options))
            .map_err(py_err)?;
        record_to_dict(py, &run)
    }

    /// PET stage; `module` is `"potet_pt"` or `"potet_jh"`.
    #[pyo3(signature = (
        reference,
        station_hru=None,
        module="potet_pt",
        n_sims=DEFAULT_N_SIMS,
        method="uniform",
        noise_factor=DEFAULT_NOISE_FACTOR,
        nproc=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn pet<'py>(
        &mut self,
        py: Python<'py>,
        reference: PathBuf,
        station_hru: Option<usize>,
        module: &str,
        n_sims: usize,
        method: &str,
        noise_factor: f64,
        nproc: Option<usize>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let module = match module {
            "potet_pt" => PetModule::PotetPt,
            "potet_jh" => PetModule::PotetJh,
            other => {
                return Err(PyValueError::new_err(format!(
                    "module must be 'potet_pt' or 'potet_jh', got {:?}",
                    other
                )))
            }
        };
        let options = run_options(n_sims, method, noise_factor, nproc)?;
        let inner = &mut self.inner;
        let run = py
            .allow_threads(|| inner.pet(reference, station(station_hru), module, &options))
            .map_err(py_err)?;
        record_to_dict(py, &run)
    }

    /// Free-form Monte Carlo stage over `params`.
    #[pyo3(signature = (
        reference,
        params,
        statvar_name,
        stage="custom",
        n_sims=DEFAULT_N_SIMS,
        method="uniform",
        noise_factor=DEFAULT_NOISE_FACTOR,
        nproc=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn monte_carlo<'py>(
        &mut self,
        py: Python<'py>,
        reference: PathBuf,
        params: Vec<String>,
        statvar_name: &str,
        stage: &str,
        n_sims: usize,
        method: &str,
        noise_factor: f64,
        nproc: Option<usize>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let options = run_options(n_sims, method, noise_factor, nproc)?;
        let stage = Stage::from(stage);
        let statvar_name = statvar_name.to_string();
        let inner = &mut self.inner;
        let run = py
            .allow_threads(|| inner.monte_carlo(reference, params, &statvar_name, stage, &options))
            .map_err(py_err)?;
        record_to_dict(py, &run)
    }

    #[getter]
    fn working_dir(&self) -> PathBuf {
        self.inner.config().working_dir.clone()
    }

    #[getter]
    fn title(&self) -> String {
        self.inner.config().title.clone()
    }
}

/// File name the next metadata record for `title` and `stage` would take.
#[pyfunction]
fn next_record_name(working_dir: PathBuf, title: &str, stage: &str) -> PyResult<String> {
    optimizer::next_record_name(&working_dir, title, &Stage::from(stage)).map_err(py_err)
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let m = PyModule::new(parent.py(), "optimizer")?;
    m.add_function(wrap_pyfunction!(next_record_name, &m)?)?;
    m.add_class::<PyOptimizer>()?;
    parent.add_submodule(&m)?;
    Ok(())
}
