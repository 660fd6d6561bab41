//! Calibration stages and their presets.
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// A named calibration target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Shortwave solar radiation.
    Swrad,
    /// Potential evapotranspiration.
    Pet,
    Flow,
    /// Any other statistical variable.
    Custom(String),
}

impl Stage {
    /// The default name of a free-form stage.
    pub fn custom() -> Self {
        Stage::Custom("custom".to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Swrad => "swrad",
            Stage::Pet => "pet",
            Stage::Flow => "flow",
            Stage::Custom(name) => name,
        }
    }

    /// Key holding the compared model variable in a metadata record.
    pub fn statvar_key(&self) -> String {
        format!("{}_statvar_name", self.as_str())
    }

    /// Key holding the reference series path in a metadata record.
    pub fn measured_key(&self) -> String {
        format!("measured_{}", self.as_str())
    }
}

impl From<&str> for Stage {
    fn from(s: &str) -> Self {
        match s {
            "swrad" => Stage::Swrad,
            "pet" => Stage::Pet,
            "flow" => Stage::Flow,
            other => Stage::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a reference station sits in the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationHru {
    /// Area-weighted basin value, e.g. `basin_swrad_1`.
    Basin,
    /// A single HRU, e.g. `swrad_2490`.
    Hru(usize),
}

impl StationHru {
    pub fn statvar_name(self, variable: &str) -> String {
        match self {
            StationHru::Basin => format!("basin_{}_1", variable),
            StationHru::Hru(n) => format!("{}_{}", variable, n),
        }
    }
}

/// PET module whose coefficients the `pet` stage adjusts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PetModule {
    #[default]
    PotetPt,
    PotetJh,
}

impl PetModule {
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            PetModule::PotetPt => &["potet_coef_hru_mo"],
            PetModule::PotetJh => &["jh_coef"],
        }
    }
}

/// Degree-day radiation parameters, perturbed jointly by the `swrad` stage.
pub const DDSOLRAD_PARAMETERS: &[&str] = &["dday_intcp", "dday_slope"];

/// What one orchestration call perturbs and compares against.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub stage: Stage,
    /// Parameters perturbed together in every trial. The first one names
    /// the trial directories.
    pub param_names: Vec<String>,
    pub reference_path: PathBuf,
    /// Model output column compared with the reference.
    pub statvar_name: String,
}

impl StageConfig {
    /// Solar radiation stage for the ddsolrad module.
    pub fn srad(reference_path: impl Into<PathBuf>, station: StationHru) -> Self {
        Self {
            stage: Stage::Swrad,
            param_names: DDSOLRAD_PARAMETERS.iter().map(|s| s.to_string()).collect(),
            reference_path: reference_path.into(),
            statvar_name: station.statvar_name("swrad"),
        }
    }

    pub fn pet(reference_path: impl Into<PathBuf>, station: StationHru, module: PetModule) -> Self {
        Self {
            stage: Stage::Pet,
            param_names: module.parameters().iter().map(|s| s.to_string()).collect(),
            reference_path: reference_path.into(),
            statvar_name: station.statvar_name("potet"),
        }
    }

    /// Free-form Monte Carlo stage.
    pub fn custom<I, S>(
        reference_path: impl Into<PathBuf>,
        param_names: I,
        statvar_name: impl Into<String>,
        stage: Stage,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stage,
            param_names: param_names.into_iter().map(Into::into).collect(),
            reference_path: reference_path.into(),
            statvar_name: statvar_name.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.param_names.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "stage {} names no parameters to resample",
                self.stage
            )));
        }
        for (i, name) in self.param_names.iter().enumerate() {
            if self.param_names[..i].contains(name) {
                return Err(Error::InvalidConfig(format!(
                    "stage {} lists {} more than once",
                    self.stage, name
                )));
            }
        }
        let stage = self.stage.as_str();
        if stage.is_empty() || stage.contains(['/', '\\']) {
            return Err(Error::InvalidConfig(format!("invalid stage name {:?}", stage)));
        }
        if self.statvar_name.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "stage {} has no statvar variable to compare",
                self.stage
            )));
        }
        Ok(())
    }
}
