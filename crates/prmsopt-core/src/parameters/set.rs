use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::constants::HRU_DIMENSION;
use crate::error::{Error, Result};

/// Storage type code of a parameter in the PRMS file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Float,
    Double,
}

impl ValueType {
    pub fn code(self) -> u8 {
        match self {
            ValueType::Integer => 1,
            ValueType::Float => 2,
            ValueType::Double => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ValueType::Integer),
            2 => Some(ValueType::Float),
            3 => Some(ValueType::Double),
            _ => None,
        }
    }
}

/// One named parameter array.
///
/// Values are flat in file order: the first dimension varies fastest, so a
/// `(nhru, nmonths)` parameter stores month `m` at `values[m*nhru..(m+1)*nhru]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub dimnames: SmallVec<[String; 2]>,
    pub value_type: ValueType,
    pub values: Vec<f64>,
}

impl Parameter {
    pub fn new<I, S>(name: &str, dimnames: I, value_type: ValueType, values: Vec<f64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            dimnames: dimnames.into_iter().map(Into::into).collect(),
            value_type,
            values,
        }
    }

    pub fn ndims(&self) -> usize {
        self.dimnames.len()
    }

    pub fn length(&self) -> usize {
        self.values.len()
    }

    /// Same metadata, new values.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.values.len() {
            return Err(Error::InvalidConfig(format!(
                "{} expects {} values, got {}",
                self.name,
                self.values.len(),
                values.len()
            )));
        }
        Ok(Self {
            name: self.name.clone(),
            dimnames: self.dimnames.clone(),
            value_type: self.value_type,
            values,
        })
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// Immutable base parameter set as read from a parameter file.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    header: Vec<String>,
    dimensions: Vec<(String, usize)>,
    parameters: Vec<Parameter>,
    base_file: Option<PathBuf>,
}

impl ParameterSet {
    /// Assemble a parameter set, checking every parameter against the
    /// declared dimension sizes.
    pub fn new(
        header: Vec<String>,
        dimensions: Vec<(String, usize)>,
        parameters: Vec<Parameter>,
    ) -> Result<Self> {
        let set = Self {
            header,
            dimensions,
            parameters,
            base_file: None,
        };
        for p in &set.parameters {
            let mut expected = 1usize;
            for d in &p.dimnames {
                let size = set.dimension(d).ok_or_else(|| {
                    Error::InvalidConfig(format!("{} uses undeclared dimension {}", p.name, d))
                })?;
                expected *= size;
            }
            if expected != p.length() {
                return Err(Error::InvalidConfig(format!(
                    "{} has {} values but its dimensions {:?} imply {}",
                    p.name,
                    p.length(),
                    p.dimnames,
                    expected
                )));
            }
        }
        Ok(set)
    }

    pub fn with_base_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_file = Some(path.into());
        self
    }

    pub fn base_file(&self) -> Option<&Path> {
        self.base_file.as_deref()
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn dimensions(&self) -> &[(String, usize)] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .find(|(d, _)| d == name)
            .map(|(_, size)| *size)
    }

    pub fn nhru(&self) -> Option<usize> {
        self.dimension(HRU_DIMENSION)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Like `get`, but a missing name is an `UnknownParameter` error.
    pub fn require(&self, name: &str) -> Result<&Parameter> {
        self.get(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// A shared base set plus a small map of replaced parameters.
///
/// Reads go through the replacements first. Cloning is cheap: the base is
/// shared and only replaced arrays are owned.
#[derive(Debug, Clone)]
pub struct ParameterOverlay {
    base: Arc<ParameterSet>,
    replaced: BTreeMap<String, Parameter>,
}

impl ParameterOverlay {
    pub fn new(base: Arc<ParameterSet>) -> Self {
        Self {
            base,
            replaced: BTreeMap::new(),
        }
    }

    /// Replace the values of an existing base parameter.
    pub fn with_values(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        let replacement = self.base.require(name)?.with_values(values)?;
        self.replaced.insert(name.to_string(), replacement);
        Ok(self)
    }

    pub fn base(&self) -> &Arc<ParameterSet> {
        &self.base
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.replaced.get(name).or_else(|| self.base.get(name))
    }

    pub fn is_replaced(&self, name: &str) -> bool {
        self.replaced.contains_key(name)
    }

    pub fn replaced_names(&self) -> impl Iterator<Item = &str> {
        self.replaced.keys().map(String::as_str)
    }

    /// All parameters in base order, replacements applied.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.base
            .iter()
            .map(|p| self.replaced.get(&p.name).unwrap_or(p))
    }
}

impl From<Arc<ParameterSet>> for ParameterOverlay {
    fn from(base: Arc<ParameterSet>) -> Self {
        Self::new(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_set() -> ParameterSet {
        ParameterSet::new(
            vec!["test basin".to_string()],
            vec![
                ("nhru".to_string(), 2),
                ("nmonths".to_string(), 12),
                ("one".to_string(), 1),
            ],
            vec![
                Parameter::new(
                    "dday_intcp",
                    ["nhru", "nmonths"],
                    ValueType::Float,
                    vec![-20.0; 24],
                ),
                Parameter::new("jh_coef", ["nmonths"], ValueType::Float, vec![0.014; 12]),
                Parameter::new("elev_units", ["one"], ValueType::Integer, vec![0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn metadata() {
        let set = test_set();
        let p = set.get("dday_intcp").unwrap();
        assert_eq!(p.ndims(), 2);
        assert_eq!(p.length(), 24);
        assert_eq!(set.nhru(), Some(2));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn rejects_length_mismatch() {
        let res = ParameterSet::new(
            vec![],
            vec![("nhru".to_string(), 3)],
            vec![Parameter::new("x", ["nhru"], ValueType::Float, vec![1.0, 2.0])],
        );
        assert!(res.is_err());
    }

    #[test]
    fn rejects_undeclared_dimension() {
        let res = ParameterSet::new(
            vec![],
            vec![],
            vec![Parameter::new("x", ["nhru"], ValueType::Float, vec![1.0])],
        );
        assert!(res.is_err());
    }

    #[test]
    fn require_unknown_parameter() {
        let set = test_set();
        assert!(matches!(
            set.require("nope"),
            Err(Error::UnknownParameter(name)) if name == "nope"
        ));
    }

    #[test]
    fn overlay_reads_replacement_first() {
        let base = Arc::new(test_set());
        let overlay = ParameterOverlay::new(base.clone())
            .with_values("jh_coef", vec![0.02; 12])
            .unwrap();
        assert_eq!(overlay.get("jh_coef").unwrap().values, vec![0.02; 12]);
        assert_eq!(base.get("jh_coef").unwrap().values, vec![0.014; 12]);
        assert!(overlay.is_replaced("jh_coef"));
        assert!(!overlay.is_replaced("dday_intcp"));
    }

    #[test]
    fn overlay_shares_unmodified_parameters() {
        let base = Arc::new(test_set());
        let overlay = ParameterOverlay::new(base.clone())
            .with_values("jh_coef", vec![0.02; 12])
            .unwrap();
        let from_overlay = overlay.get("dday_intcp").unwrap() as *const Parameter;
        let from_base = base.get("dday_intcp").unwrap() as *const Parameter;
        assert_eq!(from_overlay, from_base);
    }

    #[test]
    fn overlay_iter_keeps_base_order() {
        let base = Arc::new(test_set());
        let overlay = ParameterOverlay::new(base)
            .with_values("jh_coef", vec![0.03; 12])
            .unwrap();
        let names: Vec<&str> = overlay.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dday_intcp", "jh_coef", "elev_units"]);
        assert_eq!(overlay.iter().nth(1).unwrap().values[0], 0.03);
    }

    #[test]
    fn overlay_rejects_wrong_length_and_unknown_names() {
        let base = Arc::new(test_set());
        assert!(ParameterOverlay::new(base.clone())
            .with_values("jh_coef", vec![0.02; 3])
            .is_err());
        assert!(ParameterOverlay::new(base)
            .with_values("missing", vec![1.0])
            .is_err());
    }

    #[test]
    fn value_type_codes() {
        for vt in [ValueType::Integer, ValueType::Float, ValueType::Double] {
            assert_eq!(ValueType::from_code(vt.code()), Some(vt));
        }
        assert_eq!(ValueType::from_code(4), None);
    }
}
