/// PRMS `statvar.dat` reader.
///
/// Layout: variable count N, then N lines `name index`, then one row per
/// timestep: `step year month day hour minute second v1 .. vN`.
use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::timeseries::TimeSeries;
use crate::traits::{OutputLoader, Statvar};

const DATE_FIELDS: usize = 7;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatvarLoader;

impl OutputLoader for StatvarLoader {
    fn load(&self, statvar_file: &Path) -> Result<Statvar> {
        let text = fs::read_to_string(statvar_file).map_err(|e| Error::io(statvar_file, e))?;
        parse_statvar(statvar_file, &text)
    }
}

pub fn parse_statvar(path: &Path, text: &str) -> Result<Statvar> {
    let err = |line: usize, message: String| Error::Statvar {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let (n, first) = lines
        .next()
        .ok_or_else(|| err(0, "empty statvar file".to_string()))?;
    let n_vars: usize = first
        .parse()
        .map_err(|_| err(n, format!("expected variable count, found {:?}", first)))?;

    let mut names = Vec::with_capacity(n_vars);
    for _ in 0..n_vars {
        let (n, l) = lines
            .next()
            .ok_or_else(|| err(n, "file ends inside the variable list".to_string()))?;
        let mut parts = l.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(name), Some(index)) => names.push(format!("{}_{}", name, index)),
            _ => return Err(err(n, format!("expected `name index`, found {:?}", l))),
        }
    }

    let mut columns: Vec<TimeSeries> = vec![TimeSeries::new(); n_vars];
    for (n, l) in lines {
        let fields: Vec<&str> = l.split_whitespace().collect();
        if fields.len() != DATE_FIELDS + n_vars {
            return Err(err(
                n,
                format!(
                    "expected {} fields, found {}",
                    DATE_FIELDS + n_vars,
                    fields.len()
                ),
            ));
        }
        let int = |i: usize| -> Result<u32> {
            fields[i]
                .parse()
                .map_err(|_| err(n, format!("invalid date field {:?}", fields[i])))
        };
        let year = int(1)? as i32;
        let at = NaiveDate::from_ymd_opt(year, int(2)?, int(3)?)
            .and_then(|d| d.and_hms_opt(int(4).ok()?, int(5).ok()?, int(6).ok()?))
            .ok_or_else(|| err(n, "invalid date".to_string()))?;
        for (col, raw) in columns.iter_mut().zip(&fields[DATE_FIELDS..]) {
            let v: f64 = raw
                .parse()
                .map_err(|_| err(n, format!("invalid value {:?}", raw)))?;
            col.insert(at, v);
        }
    }

    Ok(names.into_iter().zip(columns).collect())
}
