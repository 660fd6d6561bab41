//! Per-run metadata records and their versioned file names.
//!
//! Every orchestration call leaves one JSON record named
//! `{title}_{stage}_opt[N].json` in the working directory. The first one for a
//! title and stage carries no number; later ones take one more than the
//! highest number present.
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stage::Stage;
use crate::constants::MAX_RECORD_NAME_ATTEMPTS;
use crate::error::{Error, Result};
use crate::resample::ResampleMethod;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RECORD_EXTENSION: &str = ".json";
const VERSION_MARKER: &str = "_opt";

/// What one orchestration call did.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRecord {
    pub stage: Stage,
    pub title: String,
    pub description: Option<String>,
    pub params_adjusted: Vec<String>,
    /// Model output column compared with the reference.
    pub statvar_name: String,
    /// Reference series the trials are scored against.
    pub measured: PathBuf,
    pub resample: ResampleMethod,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Base parameter file the trials were drawn from, if it came from disk.
    pub original_params: Option<PathBuf>,
    pub nproc: usize,
    pub n_sims: usize,
    pub sim_dirs: Vec<PathBuf>,
}

/// On-disk layout. The statvar and reference keys are named after the stage.
#[derive(Serialize, Deserialize)]
struct RecordFile {
    stage: String,
    optimization_title: String,
    optimization_description: Option<String>,
    params_adjusted: Vec<String>,
    resample: ResampleMethod,
    start_time: String,
    end_time: String,
    original_params: Option<PathBuf>,
    nproc: usize,
    n_sims: usize,
    sim_dirs: Vec<PathBuf>,
    #[serde(flatten)]
    stage_keys: BTreeMap<String, Value>,
}

impl OptimizationRecord {
    /// Serialize with sorted keys and four-space indentation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut stage_keys = BTreeMap::new();
        stage_keys.insert(
            self.stage.statvar_key(),
            Value::String(self.statvar_name.clone()),
        );
        stage_keys.insert(
            self.stage.measured_key(),
            Value::String(self.measured.display().to_string()),
        );
        let file = RecordFile {
            stage: self.stage.as_str().to_string(),
            optimization_title: self.title.clone(),
            optimization_description: self.description.clone(),
            params_adjusted: self.params_adjusted.clone(),
            resample: self.resample,
            start_time: self.start_time.format(TIME_FORMAT).to_string(),
            end_time: self.end_time.format(TIME_FORMAT).to_string(),
            original_params: self.original_params.clone(),
            nproc: self.nproc,
            n_sims: self.n_sims,
            sim_dirs: self.sim_dirs.clone(),
            stage_keys,
        };
        // Going through Value sorts the keys.
        let value = serde_json::to_value(file)?;
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn from_file(path: &Path, file: RecordFile) -> Result<Self> {
        let stage = Stage::from(file.stage.as_str());
        let string_key = |key: String| -> Result<String> {
            match file.stage_keys.get(&key) {
                Some(Value::String(s)) => Ok(s.clone()),
                _ => Err(Error::MissingReference {
                    key,
                    path: path.to_path_buf(),
                }),
            }
        };
        let statvar_name = string_key(stage.statvar_key())?;
        let measured = PathBuf::from(string_key(stage.measured_key())?);
        let time = |s: &str| {
            NaiveDateTime::parse_from_str(s, TIME_FORMAT).map_err(|e| Error::Json {
                path: path.to_path_buf(),
                source: serde::de::Error::custom(format!("invalid record time {:?}: {}", s, e)),
            })
        };
        Ok(Self {
            start_time: time(&file.start_time)?,
            end_time: time(&file.end_time)?,
            stage,
            title: file.optimization_title,
            description: file.optimization_description,
            params_adjusted: file.params_adjusted,
            statvar_name,
            measured,
            resample: file.resample,
            original_params: file.original_params,
            nproc: file.nproc,
            n_sims: file.n_sims,
            sim_dirs: file.sim_dirs,
        })
    }
}

/// Local wall-clock time truncated to the minute.
pub fn now_to_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// `{title}_{stage}_opt.json` for `index == 0`, else `{title}_{stage}_opt{index}.json`.
pub fn record_file_name(title: &str, stage: &Stage, index: usize) -> String {
    if index == 0 {
        format!("{}_{}{}{}", title, stage, VERSION_MARKER, RECORD_EXTENSION)
    } else {
        format!(
            "{}_{}{}{}{}",
            title, stage, VERSION_MARKER, index, RECORD_EXTENSION
        )
    }
}

/// Version number of `file_name` if it is a record for exactly this title and stage.
fn versioned_index(file_name: &str, title: &str, stage: &Stage) -> Option<usize> {
    let rest = file_name
        .strip_prefix(title)?
        .strip_prefix('_')?
        .strip_prefix(stage.as_str())?
        .strip_prefix(VERSION_MARKER)?
        .strip_suffix(RECORD_EXTENSION)?;
    parse_version(rest)
}

fn parse_version(digits: &str) -> Option<usize> {
    if digits.is_empty() {
        Some(0)
    } else if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// For any title: `(title, version)` if `file_name` is a record of `stage`.
fn stage_record_key(file_name: &str, stage: &Stage) -> Option<(String, usize)> {
    let stem = file_name.strip_suffix(RECORD_EXTENSION)?;
    let digits_start = stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (head, digits) = stem.split_at(digits_start);
    let marker = format!("_{}{}", stage, VERSION_MARKER);
    let title = head.strip_suffix(marker.as_str())?;
    Some((title.to_string(), parse_version(digits)?))
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Name the next record for `title` and `stage` would take in `dir`.
pub fn next_record_name(dir: &Path, title: &str, stage: &Stage) -> Result<String> {
    let highest = file_names(dir)?
        .iter()
        .filter_map(|name| versioned_index(name, title, stage))
        .max();
    Ok(record_file_name(title, stage, highest.map_or(0, |n| n + 1)))
}

/// Write `record` under the next free versioned name and return its path.
///
/// Files are created exclusively; if a concurrent writer takes the name
/// first, the name is recomputed.
pub fn write_record(dir: &Path, record: &OptimizationRecord) -> Result<PathBuf> {
    let json = record.to_json().map_err(|source| Error::Json {
        path: dir.to_path_buf(),
        source,
    })?;
    for _ in 0..MAX_RECORD_NAME_ATTEMPTS {
        let path = dir.join(next_record_name(dir, &record.title, &record.stage)?);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                fill_claimed(&path, file, json.as_bytes())?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::io(&path, e)),
        }
    }
    Err(Error::io(
        dir,
        std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!(
                "no free record name for {} after {} attempts",
                record_file_name(&record.title, &record.stage, 0),
                MAX_RECORD_NAME_ATTEMPTS
            ),
        ),
    ))
}

/// Write `contents` to a freshly claimed record file. On failure the file is
/// removed again so no partial record is left for discovery.
fn fill_claimed<W: Write>(path: &Path, mut file: W, contents: &[u8]) -> Result<()> {
    let written = file.write_all(contents).and_then(|()| file.flush());
    drop(file);
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path) {
            warn!("could not remove partial record {}: {}", path.display(), cleanup);
        }
        return Err(Error::io(path, e));
    }
    Ok(())
}

pub fn read_record(path: &Path) -> Result<OptimizationRecord> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let file: RecordFile = serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    OptimizationRecord::from_file(path, file)
}

/// All records of `stage` in `dir`, whatever their title, ordered by title
/// then version.
pub fn record_paths(dir: &Path, stage: &Stage) -> Result<Vec<PathBuf>> {
    let mut found: Vec<((String, usize), String)> = file_names(dir)?
        .into_iter()
        .filter_map(|name| stage_record_key(&name, stage).map(|key| (key, name)))
        .collect();
    found.sort();
    Ok(found.into_iter().map(|(_, name)| dir.join(name)).collect())
}
