//! Stochastic parameter resampling.
//!
//! A parameter's shape metadata selects exactly one [`DimensionCase`]; the
//! case and the [`ResampleMethod`] together decide how one perturbed copy of
//! the parameter is drawn. Uniform draws keep results inside the registered
//! bounds by construction, normal draws by rejection.
use std::fmt;
use std::str::FromStr;

use log::warn;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::constants::{
    Bounds, DEFAULT_MAX_REJECTIONS, FORBIDDEN_DIMENSIONS, MAX_PER_ELEMENT_LENGTH,
    MONTH_DIMENSION, N_MONTHS,
};
use crate::error::{Error, Result};
use crate::parameters::{Parameter, ParameterSet};
use crate::ranges::RangeRegistry;

/// Distribution used for per-element perturbations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    #[default]
    Uniform,
    Normal,
}

impl ResampleMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ResampleMethod::Uniform => "uniform",
            ResampleMethod::Normal => "normal",
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResampleMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(ResampleMethod::Uniform),
            "normal" => Ok(ResampleMethod::Normal),
            other => Err(Error::InvalidConfig(format!(
                "unknown resample method {:?} (expected uniform or normal)",
                other
            ))),
        }
    }
}

/// What to do when the normal-method redraw cap is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionFallback {
    /// Draw the element with the uniform method instead.
    #[default]
    Uniform,
    /// Return [`Error::RejectionLimit`].
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleOptions {
    /// Normal draws attempted per element before `fallback` applies.
    pub max_rejections: usize,
    pub fallback: RejectionFallback,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            max_rejections: DEFAULT_MAX_REJECTIONS,
            fallback: RejectionFallback::Uniform,
        }
    }
}

/// How a parameter's array is perturbed, derived from its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionCase {
    /// 1-D, at most 366 values: every element drawn independently.
    PerElement,
    /// 1-D, more than 366 values: the whole array shifted by one draw.
    SingleShift,
    /// 2-D `(group, nmonths)` with `group` sized like `nhru`: one draw per
    /// month, shared by every group member.
    MonthlyByGroup { groups: usize },
}

impl DimensionCase {
    /// Derive the case for `param`, using `params` for dimension sizes.
    pub fn classify(param: &Parameter, params: &ParameterSet) -> Result<Self> {
        if let Some(dim) = param
            .dimnames
            .iter()
            .find(|d| FORBIDDEN_DIMENSIONS.contains(&d.as_str()))
        {
            return Err(Error::NonResamplableParameter {
                name: param.name.clone(),
                dimension: dim.clone(),
            });
        }

        match param.ndims() {
            1 if param.length() <= MAX_PER_ELEMENT_LENGTH => Ok(DimensionCase::PerElement),
            1 => Ok(DimensionCase::SingleShift),
            2 if param.dimnames[1] == MONTH_DIMENSION => {
                let groups = params.dimension(&param.dimnames[0]);
                match (groups, params.nhru()) {
                    (Some(groups), Some(nhru)) if groups == nhru => {
                        Ok(DimensionCase::MonthlyByGroup { groups })
                    }
                    _ => Err(unsupported(param)),
                }
            }
            _ => Err(unsupported(param)),
        }
    }
}

fn unsupported(param: &Parameter) -> Error {
    Error::UnsupportedDimensions {
        name: param.name.clone(),
        dimnames: param.dimnames.to_vec(),
    }
}

/// Everything needed to draw perturbed copies of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleSpec {
    pub name: String,
    pub bounds: Bounds,
    pub case: DimensionCase,
    pub method: ResampleMethod,
    pub noise_factor: f64,
}

impl ResampleSpec {
    /// Validate a resample request. Fails before any draw is made.
    pub fn new(
        params: &ParameterSet,
        name: &str,
        registry: &RangeRegistry,
        method: ResampleMethod,
        noise_factor: f64,
    ) -> Result<Self> {
        let param = params.require(name)?;
        let bounds = registry.lookup(name)?;
        let case = DimensionCase::classify(param, params)?;
        if !(noise_factor.is_finite() && noise_factor > 0.0) {
            return Err(Error::InvalidNoiseFactor(noise_factor));
        }
        let spec = Self {
            name: name.to_string(),
            bounds,
            case,
            method,
            noise_factor,
        };
        if spec.case != DimensionCase::PerElement {
            spec.check_span(&param.values)?;
        }
        Ok(spec)
    }

    /// Standard deviation of normal-method draws.
    pub fn sigma(&self) -> f64 {
        self.bounds.span() * self.noise_factor
    }

    /// Draw one perturbed copy of `values`.
    pub fn resample<R: Rng + ?Sized>(
        &self,
        values: &[f64],
        options: &ResampleOptions,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        match self.case {
            DimensionCase::SingleShift => self.single_shift(values, rng),
            DimensionCase::PerElement => match self.method {
                ResampleMethod::Uniform => Ok(values
                    .iter()
                    .map(|&v| self.uniform_element(v, rng))
                    .collect()),
                ResampleMethod::Normal => self.normal_elements(values, options, rng),
            },
            DimensionCase::MonthlyByGroup { groups } => self.monthly_shift(values, groups, rng),
        }
    }

    /// A shared shift can only keep `values` in bounds if their spread fits
    /// inside the registered range.
    fn check_span(&self, values: &[f64]) -> Result<()> {
        let (low, high) = shift_window(&self.bounds, values);
        if low > high {
            return Err(Error::BaseExceedsBounds {
                name: self.name.clone(),
                base_min: self.bounds.min - low,
                base_max: self.bounds.max - high,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        Ok(())
    }

    fn single_shift<R: Rng + ?Sized>(&self, values: &[f64], rng: &mut R) -> Result<Vec<f64>> {
        self.check_span(values)?;
        let (low, high) = shift_window(&self.bounds, values);
        let delta = uniform_shift(rng, low, high);
        Ok(values.iter().map(|v| self.clamp(v + delta)).collect())
    }

    fn uniform_element<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        let (low, high) = shift_window(&self.bounds, &[value]);
        self.clamp(value + uniform_shift(rng, low, high))
    }

    fn normal_elements<R: Rng + ?Sized>(
        &self,
        values: &[f64],
        options: &ResampleOptions,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let normal = Normal::new(0.0, self.sigma()).map_err(|e| {
            Error::InvalidConfig(format!("{}: bad normal distribution: {}", self.name, e))
        })?;

        let mut out = Vec::with_capacity(values.len());
        for &v in values {
            let accepted = (0..options.max_rejections)
                .map(|_| v + normal.sample(rng))
                .find(|candidate| self.bounds.contains(*candidate));
            match accepted {
                Some(x) => out.push(x),
                None => match options.fallback {
                    RejectionFallback::Uniform => {
                        warn!(
                            "{}: no normal draw in [{}, {}] after {} attempts, drawing uniform",
                            self.name, self.bounds.min, self.bounds.max, options.max_rejections
                        );
                        out.push(self.uniform_element(v, rng));
                    }
                    RejectionFallback::Fail => {
                        return Err(Error::RejectionLimit {
                            name: self.name.clone(),
                            min: self.bounds.min,
                            max: self.bounds.max,
                            attempts: options.max_rejections,
                        });
                    }
                },
            }
        }
        Ok(out)
    }

    fn monthly_shift<R: Rng + ?Sized>(
        &self,
        values: &[f64],
        groups: usize,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        if groups == 0 || values.len() != groups * N_MONTHS {
            return Err(Error::InvalidConfig(format!(
                "{}: expected {} x {} values, got {}",
                self.name,
                groups,
                N_MONTHS,
                values.len()
            )));
        }
        self.check_span(values)?;
        let (low, high) = shift_window(&self.bounds, values);
        let shifts: [f64; N_MONTHS] = std::array::from_fn(|_| uniform_shift(rng, low, high));

        Ok(values
            .chunks(groups)
            .zip(shifts)
            .flat_map(|(month, shift)| month.iter().map(move |v| v + shift))
            .map(|v| self.clamp(v))
            .collect())
    }

    // Absorbs rounding in `v + (max - v)`.
    fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.bounds.min, self.bounds.max)
    }
}

/// Resample parameter `name` of `params` once.
pub fn resample<R: Rng + ?Sized>(
    params: &ParameterSet,
    name: &str,
    registry: &RangeRegistry,
    method: ResampleMethod,
    noise_factor: f64,
    options: &ResampleOptions,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let spec = ResampleSpec::new(params, name, registry, method, noise_factor)?;
    let param = params.require(name)?;
    spec.resample(&param.values, options, rng)
}

/// Range of shifts that keeps `values`' extremes inside `bounds`.
fn shift_window(bounds: &Bounds, values: &[f64]) -> (f64, f64) {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (bounds.min - lo, bounds.max - hi)
}

/// Callers guarantee `low <= high` through `check_span`.
fn uniform_shift<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if !(low.is_finite() && high.is_finite()) || low >= high {
        return if low.is_finite() { low } else { 0.0 };
    }
    rng.random_range(low..=high)
}
