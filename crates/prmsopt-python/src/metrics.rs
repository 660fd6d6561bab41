use numpy::PyReadonlyArray1;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use prmsopt_core::metrics::{self, ScoreRecord};

use crate::convert::contiguous_slice;

#[pyfunction]
fn nse(
    observed: PyReadonlyArray1<'_, f64>,
    simulated: PyReadonlyArray1<'_, f64>,
) -> PyResult<f64> {
    Ok(metrics::nse(contiguous_slice(&observed)?, contiguous_slice(&simulated)?))
}

#[pyfunction]
fn rmse(
    observed: PyReadonlyArray1<'_, f64>,
    simulated: PyReadonlyArray1<'_, f64>,
) -> PyResult<f64> {
    Ok(metrics::rmse(contiguous_slice(&observed)?, contiguous_slice(&simulated)?))
}

#[pyfunction]
fn pbias(
    observed: PyReadonlyArray1<'_, f64>,
    simulated: PyReadonlyArray1<'_, f64>,
) -> PyResult<f64> {
    Ok(metrics::pbias(contiguous_slice(&observed)?, contiguous_slice(&simulated)?))
}

#[pyfunction]
fn r_squared(
    observed: PyReadonlyArray1<'_, f64>,
    simulated: PyReadonlyArray1<'_, f64>,
) -> PyResult<f64> {
    Ok(metrics::r_squared(contiguous_slice(&observed)?, contiguous_slice(&simulated)?))
}

/// All measures at once, keyed by name.
#[pyfunction]
fn scores<'py>(
    py: Python<'py>,
    observed: PyReadonlyArray1<'py, f64>,
    simulated: PyReadonlyArray1<'py, f64>,
) -> PyResult<Bound<'py, PyDict>> {
    let s = ScoreRecord::compute(contiguous_slice(&observed)?, contiguous_slice(&simulated)?);
    Ok(scores_to_dict!(py, s, nse, rmse, pbias, r_squared, abs_pbias))
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let m = PyModule::new(parent.py(), "metrics")?;
    m.add_function(wrap_pyfunction!(nse, &m)?)?;
    m.add_function(wrap_pyfunction!(rmse, &m)?)?;
    m.add_function(wrap_pyfunction!(pbias, &m)?)?;
    m.add_function(wrap_pyfunction!(r_squared, &m)?)?;
    m.add_function(wrap_pyfunction!(scores, &m)?)?;
    parent.add_submodule(&m)?;
    Ok(())
}
