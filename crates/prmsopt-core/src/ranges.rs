/// Parameter range registry.
///
/// Maps parameter names to the physically meaningful `[min, max]` window a
/// resampled value must stay in. A name without an entry is a hard error.
use std::collections::BTreeMap;

use crate::constants::{Bounds, PARAM_RANGES};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RangeRegistry {
    ranges: BTreeMap<String, Bounds>,
}

impl RangeRegistry {
    /// Build a registry from explicit entries, rejecting inverted ranges.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Bounds)>,
        S: Into<String>,
    {
        let mut ranges = BTreeMap::new();
        for (name, bounds) in entries {
            let name = name.into();
            if !(bounds.min.is_finite() && bounds.max.is_finite()) || bounds.min > bounds.max {
                return Err(Error::InvalidConfig(format!(
                    "range for {} is invalid: [{}, {}]",
                    name, bounds.min, bounds.max
                )));
            }
            ranges.insert(name, bounds);
        }
        Ok(Self { ranges })
    }

    /// Allowable bounds for `name`.
    pub fn lookup(&self, name: &str) -> Result<Bounds> {
        self.ranges
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownParameterBounds(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ranges.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }
}

impl Default for RangeRegistry {
    fn default() -> Self {
        Self {
            ranges: PARAM_RANGES
                .iter()
                .map(|(name, bounds)| (name.to_string(), *bounds))
                .collect(),
        }
    }
}
