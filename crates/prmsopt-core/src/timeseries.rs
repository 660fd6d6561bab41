//! Time-indexed series, index alignment and monthly aggregation.
//!
//! Also reads the two-column reference observation files.
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Temporal resolution results are scored at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    /// Mean per calendar month, pooled over all years.
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Daily => "daily",
            Frequency::Monthly => "monthly",
        })
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(Error::InvalidConfig(format!(
                "unknown frequency {:?} (expected daily or monthly)",
                other
            ))),
        }
    }
}

/// A numeric series indexed by timestamp, unique and sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: BTreeMap<NaiveDateTime, f64>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later duplicates of a timestamp replace earlier ones.
    pub fn insert(&mut self, at: NaiveDateTime, value: f64) {
        self.points.insert(at, value);
    }

    pub fn get(&self, at: &NaiveDateTime) -> Option<f64> {
        self.points.get(at).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &f64)> {
        self.points.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }

    /// Restrict `self` and `other` to the timestamps both contain.
    ///
    /// Returns `(self_values, other_values)` aligned by timestamp.
    pub fn align(&self, other: &TimeSeries) -> (Vec<f64>, Vec<f64>) {
        self.points
            .iter()
            .filter_map(|(t, a)| other.points.get(t).map(|b| (*a, *b)))
            .unzip()
    }

    /// Timestamps shared with `other`.
    pub fn common_index(&self, other: &TimeSeries) -> Vec<NaiveDateTime> {
        self.points
            .keys()
            .filter(|t| other.points.contains_key(t))
            .copied()
            .collect()
    }

    /// Keep only the given timestamps.
    pub fn select(&self, index: &[NaiveDateTime]) -> TimeSeries {
        index
            .iter()
            .filter_map(|t| self.points.get(t).map(|v| (*t, *v)))
            .collect()
    }

    /// Mean per calendar month (1-12) over all years present.
    pub fn monthly_means(&self) -> BTreeMap<u32, f64> {
        let mut acc: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for (t, v) in &self.points {
            let e = acc.entry(t.month()).or_insert((0.0, 0));
            e.0 += v;
            e.1 += 1;
        }
        acc.into_iter()
            .map(|(m, (sum, n))| (m, sum / n as f64))
            .collect()
    }
}

impl FromIterator<(NaiveDateTime, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDateTime, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Align two series for scoring at `frequency`.
///
/// Both are first restricted to their common timestamps; monthly scoring then
/// compares per-calendar-month means. Returns `(observed, simulated)`.
pub fn aligned_pair(
    observed: &TimeSeries,
    simulated: &TimeSeries,
    frequency: Frequency,
) -> (Vec<f64>, Vec<f64>) {
    match frequency {
        Frequency::Daily => observed.align(simulated),
        Frequency::Monthly => {
            let index = observed.common_index(simulated);
            let obs = observed.select(&index).monthly_means();
            let sim = simulated.select(&index).monthly_means();
            obs.iter()
                .filter_map(|(m, o)| sim.get(m).map(|s| (*o, *s)))
                .unzip()
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse `YYYY-MM-DD`, or a date followed by `HH:MM` or `HH:MM:SS` (space or `T`).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Read a two-column `timestamp,value` reference series.
///
/// A first line whose timestamp does not parse is treated as a header.
/// Blank and `NaN` values are dropped.
pub fn read_reference(path: &Path) -> Result<TimeSeries> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_reference(path, &text)
}

fn parse_reference(path: &Path, text: &str) -> Result<TimeSeries> {
    let err = |line: usize, message: String| Error::Reference {
        path: path.to_path_buf(),
        line,
        message,
    };

    let header_line = first_content_line(text);
    let mut series = TimeSeries::new();
    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(2, ',');
        let ts_field = fields.next().unwrap_or("");
        let Some(at) = parse_timestamp(ts_field) else {
            if i == header_line {
                continue;
            }
            return Err(err(line_no, format!("invalid timestamp {:?}", ts_field)));
        };
        let value_field = fields
            .next()
            .ok_or_else(|| err(line_no, "missing value column".to_string()))?
            .trim();
        if value_field.is_empty() || value_field.eq_ignore_ascii_case("nan") {
            continue;
        }
        let value: f64 = value_field
            .parse()
            .map_err(|_| err(line_no, format!("invalid value {:?}", value_field)))?;
        series.insert(at, value);
    }
    Ok(series)
}

fn first_content_line(text: &str) -> usize {
    text.lines()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(0)
}
