use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::convert::{parse_frequency, py_err};
use prmsopt_core::optimizer::Stage;
use prmsopt_core::results::OptimizationResult;

define_columns_result! {
    /// Ranked trial scores with typed numpy array attributes.
    pub struct ScoreTable from prmsopt_core::metrics::ScoreColumns {
        nse, rmse, pbias, r_squared, abs_pbias,
    }
}

/// Ranked trials of one stage: directory names plus score columns, best first.
#[pyclass(frozen)]
struct ResultTable {
    #[pyo3(get)]
    stage: String,
    #[pyo3(get)]
    names: Vec<String>,
    #[pyo3(get)]
    sim_dirs: Vec<PathBuf>,
    #[pyo3(get)]
    scores: Py<ScoreTable>,
    text: String,
}

#[pymethods]
impl ResultTable {
    fn __len__(&self) -> usize {
        self.names.len()
    }

    fn __str__(&self) -> String {
        self.text.clone()
    }
}

/// Scores and ranks the trials recorded in a working directory.
#[pyclass(name = "OptimizationResult", frozen)]
struct PyOptimizationResult {
    inner: OptimizationResult,
}

#[pymethods]
impl PyOptimizationResult {
    #[new]
    #[pyo3(signature = (working_dir, stage=None))]
    fn new(working_dir: PathBuf, stage: Option<&str>) -> PyResult<Self> {
        let stage = stage.map(Stage::from);
        let inner = OptimizationResult::open(working_dir, stage.as_ref()).map_err(py_err)?;
        Ok(Self { inner })
    }

    /// Stages with at least one record.
    fn stages(&self) -> PyResult<Vec<String>> {
        let stages = self.inner.stages().map_err(py_err)?;
        Ok(stages.iter().map(|s| s.to_string()).collect())
    }

    fn sim_dirs(&self, stage: &str) -> PyResult<Vec<PathBuf>> {
        self.inner.sim_dirs(&Stage::from(stage)).map_err(py_err)
    }

    fn statvar_name(&self, stage: &str) -> PyResult<String> {
        self.inner.statvar_name(&Stage::from(stage)).map_err(py_err)
    }

    #[pyo3(signature = (stage, freq="daily", top_n=5))]
    fn result_table(
        &self,
        py: Python<'_>,
        stage: &str,
        freq: &str,
        top_n: usize,
    ) -> PyResult<ResultTable> {
        let frequency = parse_frequency(freq)?;
        let stage = Stage::from(stage);
        let inner = &self.inner;
        let table = py
            .allow_threads(|| inner.result_table(&stage, frequency, top_n))
            .map_err(py_err)?;
        let scores = Py::new(py, ScoreTable::from_columns(py, table.to_columns()))?;
        Ok(ResultTable {
            stage: table.stage.to_string(),
            names: table.rows.iter().map(|r| r.name.clone()).collect(),
            sim_dirs: table.rows.iter().map(|r| r.simulation_dir.clone()).collect(),
            scores,
            text: table.to_string(),
        })
    }

    /// `[{dir_name, param_path, statvar_path}]` for the best `top_n` trials.
    #[pyo3(signature = (stage, freq="daily", top_n=5))]
    fn top_ranked<'py>(
        &self,
        py: Python<'py>,
        stage: &str,
        freq: &str,
        top_n: usize,
    ) -> PyResult<Bound<'py, PyList>> {
        let frequency = parse_frequency(freq)?;
        let table = self
            .inner
            .result_table(&Stage::from(stage), frequency, top_n)
            .map_err(py_err)?;
        let list = PyList::empty(py);
        for top in self.inner.top_ranked(&table) {
            let dict = PyDict::new(py);
            dict.set_item("dir_name", top.dir_name)?;
            dict.set_item("param_path", top.param_path)?;
            dict.set_item("statvar_path", top.statvar_path)?;
            list.append(dict)?;
        }
        Ok(list)
    }

    /// Scores of the unmodified model output against the stage's reference.
    #[pyo3(signature = (stage, baseline_statvar, freq="daily"))]
    fn baseline_scores<'py>(
        &self,
        py: Python<'py>,
        stage: &str,
        baseline_statvar: PathBuf,
        freq: &str,
    ) -> PyResult<Bound<'py, PyDict>> {
        let frequency = parse_frequency(freq)?;
        let s = self
            .inner
            .baseline_scores(&Stage::from(stage), frequency, &baseline_statvar)
            .map_err(py_err)?;
        Ok(scores_to_dict!(py, s, nse, rmse, pbias, r_squared, abs_pbias))
    }
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let m = PyModule::new(parent.py(), "results")?;
    m.add_class::<PyOptimizationResult>()?;
    m.add_class::<ResultTable>()?;
    m.add_class::<ScoreTable>()?;
    parent.add_submodule(&m)?;
    Ok(())
}
