use std::path::PathBuf;

use numpy::PyArray1;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::convert::{parse_fallback, parse_method, py_err};
use prmsopt_core::constants::{DEFAULT_MAX_REJECTIONS, DEFAULT_NOISE_FACTOR};
use prmsopt_core::parameters::read_parameter_file;
use prmsopt_core::ranges::RangeRegistry;
use prmsopt_core::resample::{self as core_resample, ResampleOptions};

/// Draw one perturbed copy of a parameter from a PRMS parameter file.
///
/// Values come back flat, first dimension fastest.
#[pyfunction]
#[pyo3(signature = (
    parameter_file,
    name,
    method="uniform",
    noise_factor=DEFAULT_NOISE_FACTOR,
    seed=None,
    max_rejections=DEFAULT_MAX_REJECTIONS,
    fallback="uniform",
))]
#[allow(clippy::too_many_arguments)]
fn resample<'py>(
    py: Python<'py>,
    parameter_file: PathBuf,
    name: &str,
    method: &str,
    noise_factor: f64,
    seed: Option<u64>,
    max_rejections: usize,
    fallback: &str,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let method = parse_method(method)?;
    let options = ResampleOptions {
        max_rejections,
        fallback: parse_fallback(fallback)?,
    };
    let params = read_parameter_file(&parameter_file).map_err(py_err)?;
    let registry = RangeRegistry::default();
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(rand::random));

    let values = core_resample::resample(
        &params,
        name,
        &registry,
        method,
        noise_factor,
        &options,
        &mut rng,
    )
    .map_err(py_err)?;
    Ok(PyArray1::from_vec(py, values))
}

/// Built-in allowable ranges as `{name: (min, max)}`.
#[pyfunction]
fn param_ranges(py: Python<'_>) -> PyResult<Bound<'_, PyDict>> {
    let registry = RangeRegistry::default();
    let dict = PyDict::new(py);
    for name in registry.names() {
        let bounds = registry.lookup(name).map_err(py_err)?;
        dict.set_item(name, (bounds.min, bounds.max))?;
    }
    Ok(dict)
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let m = PyModule::new(parent.py(), "resample")?;
    m.add_function(wrap_pyfunction!(resample, &m)?)?;
    m.add_function(wrap_pyfunction!(param_ranges, &m)?)?;
    parent.add_submodule(&m)?;
    Ok(())
}
