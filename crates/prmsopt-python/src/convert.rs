use numpy::PyReadonlyArray1;
use pyo3::exceptions::{PyFileNotFoundError, PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use prmsopt_core::resample::{RejectionFallback, ResampleMethod};
use prmsopt_core::timeseries::Frequency;
use prmsopt_core::Error;

/// Map a core error onto the closest Python exception.
pub fn py_err(err: Error) -> PyErr {
    let message = err.to_string();
    if err.is_configuration() {
        return PyValueError::new_err(message);
    }
    match err {
        Error::MissingOptimizationArtifacts { .. } => PyFileNotFoundError::new_err(message),
        Error::Io { .. } => PyOSError::new_err(message),
        Error::MissingVariable { .. }
        | Error::MissingReference { .. }
        | Error::ParameterFile { .. }
        | Error::Statvar { .. }
        | Error::Reference { .. }
        | Error::Json { .. } => PyValueError::new_err(message),
        _ => PyRuntimeError::new_err(message),
    }
}

/// Validate that a numpy array is C-contiguous and return its slice.
pub fn contiguous_slice<'py>(arr: &'py PyReadonlyArray1<'py, f64>) -> PyResult<&'py [f64]> {
    arr.as_slice()
        .map_err(|_| PyValueError::new_err("array must be C-contiguous"))
}

pub fn parse_method(method: &str) -> PyResult<ResampleMethod> {
    method.parse().map_err(py_err)
}

pub fn parse_frequency(freq: &str) -> PyResult<Frequency> {
    freq.parse().map_err(py_err)
}

pub fn parse_fallback(fallback: &str) -> PyResult<RejectionFallback> {
    match fallback {
        "uniform" => Ok(RejectionFallback::Uniform),
        "fail" => Ok(RejectionFallback::Fail),
        other => Err(PyValueError::new_err(format!(
            "fallback must be 'uniform' or 'fail', got {:?}",
            other
        ))),
    }
}
