/// Resampling constants and allowable parameter ranges.
///
/// Centralises the fixed values the resampler and orchestrator rely on.

// -- Dimension cases --

/// 1-D parameters up to this length are perturbed element by element.
pub const MAX_PER_ELEMENT_LENGTH: usize = 366;

/// Name and size of the month axis of 2-D parameters.
pub const MONTH_DIMENSION: &str = "nmonths";
pub const N_MONTHS: usize = 12;

/// Spatial dimension the monthly case is broadcast over.
pub const HRU_DIMENSION: &str = "nhru";

/// Dimensions tied to cascade and stream routing topology. Parameters using
/// any of these are never resampled.
pub const FORBIDDEN_DIMENSIONS: &[&str] = &["ncascade", "ncascdgw", "nreach", "nsegment"];

// -- Parameter ranges --

/// Allowable range for a resampled parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Width of the allowable range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Degree-day solar radiation intercept [F].
pub const DDAY_INTCP_BOUNDS: Bounds = Bounds::new(-60.0, 10.0);

/// Degree-day solar radiation slope [dday/F].
pub const DDAY_SLOPE_BOUNDS: Bounds = Bounds::new(0.2, 0.9);

/// Jensen-Haise PET coefficient [per F].
pub const JH_COEF_BOUNDS: Bounds = Bounds::new(0.005, 0.06);

/// Priestley-Taylor alpha [-].
pub const PT_ALPHA_BOUNDS: Bounds = Bounds::new(1.0, 2.0);

/// Monthly per-HRU PET adjustment coefficient [-].
pub const POTET_COEF_HRU_MO_BOUNDS: Bounds = Bounds::new(1.0, 1.6);

/// Maximum temperature index for radiation adjustment [F].
pub const TMAX_INDEX_BOUNDS: Bounds = Bounds::new(-10.0, 110.0);

/// All registered ranges, keyed by parameter name.
pub const PARAM_RANGES: &[(&str, Bounds)] = &[
    ("dday_intcp", DDAY_INTCP_BOUNDS),
    ("dday_slope", DDAY_SLOPE_BOUNDS),
    ("jh_coef", JH_COEF_BOUNDS),
    ("pt_alpha", PT_ALPHA_BOUNDS),
    ("potet_coef_hru_mo", POTET_COEF_HRU_MO_BOUNDS),
    ("tmax_index", TMAX_INDEX_BOUNDS),
];

// -- Run defaults --

pub const DEFAULT_N_SIMS: usize = 10;
pub const DEFAULT_NOISE_FACTOR: f64 = 0.1;

/// Per-element cap on normal-method redraws.
pub const DEFAULT_MAX_REJECTIONS: usize = 10_000;

/// Retries when a concurrently written metadata record claims our name.
pub const MAX_RECORD_NAME_ATTEMPTS: usize = 16;

/// Stages scanned when aggregating "all" stages.
pub const KNOWN_STAGES: &[&str] = &["swrad", "pet", "flow", "custom"];
