//! Scoring and ranking of finished optimization stages.
//!
//! Works from what an [`Optimizer`](crate::optimizer::Optimizer) leaves on
//! disk: metadata records in the working directory and one output file per
//! trial directory.
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use rayon::prelude::*;

use crate::constants::KNOWN_STAGES;
use crate::error::{Error, Result};
use crate::metrics::{ScoreColumns, ScoreRecord};
use crate::optimizer::{read_record, record_paths, OptimizationRecord, Stage};
use crate::statvar::StatvarLoader;
use crate::timeseries::{aligned_pair, read_reference, Frequency, TimeSeries};
use crate::traits::{OutputLoader, SimulationOutput};

/// One scored trial.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    /// Trial directory name.
    pub name: String,
    pub simulation_dir: PathBuf,
    pub scores: ScoreRecord,
}

/// Trials of one stage, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub stage: Stage,
    pub frequency: Frequency,
    pub rows: Vec<ScoreRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.name.as_str()).collect()
    }

    /// Columnar copy of the scores, in rank order.
    pub fn to_columns(&self) -> ScoreColumns {
        let mut columns = ScoreColumns::with_capacity(self.rows.len());
        for row in &self.rows {
            columns.push(&row.scores);
        }
        columns
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
        write!(f, "{:<width$}", "name")?;
        for label in ScoreRecord::column_labels() {
            write!(f, " {label:>10}")?;
        }
        writeln!(f)?;
        for row in &self.rows {
            write!(f, "{:<width$}", row.name)?;
            for value in row.scores.values() {
                write!(f, " {value:>10.4}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// File locations of a ranked trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopRanked {
    pub dir_name: String,
    pub param_path: PathBuf,
    pub statvar_path: PathBuf,
}

/// Best first: NSE descending, then RMSE, then |PBIAS|, then R² descending.
/// NaN scores sort last.
pub fn rank_order(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    a.rank_cmp(b)
}

/// Sort rows best first. Full ties keep their input order.
pub fn rank(rows: &mut [ScoreRow]) {
    rows.sort_by(|a, b| rank_order(&a.scores, &b.scores));
}

/// Scores the trials recorded in a working directory.
pub struct OptimizationResult<L: OutputLoader = StatvarLoader> {
    working_dir: PathBuf,
    loader: L,
}

impl OptimizationResult<StatvarLoader> {
    /// Read results from `working_dir`, failing if it holds no record for
    /// `stage` (or, with `None`, for any known stage).
    pub fn open(working_dir: impl Into<PathBuf>, stage: Option<&Stage>) -> Result<Self> {
        Self::with_loader(working_dir, stage, StatvarLoader)
    }
}

impl<L: OutputLoader> OptimizationResult<L> {
    pub fn with_loader(
        working_dir: impl Into<PathBuf>,
        stage: Option<&Stage>,
        loader: L,
    ) -> Result<Self> {
        let result = Self {
            working_dir: working_dir.into(),
            loader,
        };
        match stage {
            Some(stage) => {
                result.record_paths(stage)?;
            }
            None => {
                if result.stages()?.is_empty() {
                    return Err(Error::MissingOptimizationArtifacts {
                        stage: KNOWN_STAGES.join("|"),
                        working_dir: result.working_dir.clone(),
                    });
                }
            }
        }
        Ok(result)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Known stages that have at least one record.
    pub fn stages(&self) -> Result<Vec<Stage>> {
        let mut found = Vec::new();
        for name in KNOWN_STAGES {
            let stage = Stage::from(*name);
            if !record_paths(&self.working_dir, &stage)?.is_empty() {
                found.push(stage);
            }
        }
        Ok(found)
    }

    /// Record files of `stage`; an error if there are none.
    pub fn record_paths(&self, stage: &Stage) -> Result<Vec<PathBuf>> {
        let paths = record_paths(&self.working_dir, stage)?;
        if paths.is_empty() {
            return Err(Error::MissingOptimizationArtifacts {
                stage: stage.to_string(),
                working_dir: self.working_dir.clone(),
            });
        }
        Ok(paths)
    }

    pub fn records(&self, stage: &Stage) -> Result<Vec<OptimizationRecord>> {
        self.record_paths(stage)?
            .iter()
            .map(|p| read_record(p))
            .collect()
    }

    /// Trial directories of every record of `stage`, in record order.
    pub fn sim_dirs(&self, stage: &Stage) -> Result<Vec<PathBuf>> {
        Ok(self
            .records(stage)?
            .into_iter()
            .flat_map(|r| r.sim_dirs)
            .collect())
    }

    /// Reference series named by the first record of `stage`.
    pub fn measured(&self, stage: &Stage) -> Result<TimeSeries> {
        let first = self.first_record(stage)?;
        read_reference(&first.measured)
    }

    /// Compared model variable named by the first record of `stage`.
    pub fn statvar_name(&self, stage: &Stage) -> Result<String> {
        Ok(self.first_record(stage)?.statvar_name)
    }

    fn first_record(&self, stage: &Stage) -> Result<OptimizationRecord> {
        let paths = self.record_paths(stage)?;
        read_record(&paths[0])
    }

    /// Score every trial of `stage` and keep the best `top_n`.
    ///
    /// Each trial is compared with the reference over the timestamps they
    /// share. A `top_n` above the number of trials returns them all.
    pub fn result_table(
        &self,
        stage: &Stage,
        frequency: Frequency,
        top_n: usize,
    ) -> Result<ResultTable> {
        let records = self.records(stage)?;
        let first = &records[0];
        let reference = read_reference(&first.measured)?;
        let variable = first.statvar_name.as_str();
        let dirs: Vec<&PathBuf> = records.iter().flat_map(|r| &r.sim_dirs).collect();
        debug!("scoring {} trials of stage {} on {}", dirs.len(), stage, variable);

        let mut rows = dirs
            .par_iter()
            .map(|dir| {
                let output = SimulationOutput::from_dir(*dir);
                let simulated = self.loader.load_variable(&output.statvar_file, variable)?;
                let (obs, sim) = aligned_pair(&reference, &simulated, frequency);
                Ok(ScoreRow {
                    name: output.name(),
                    simulation_dir: output.simulation_dir,
                    scores: ScoreRecord::compute(&obs, &sim),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rank(&mut rows);
        rows.truncate(top_n);
        Ok(ResultTable {
            stage: stage.clone(),
            frequency,
            rows,
        })
    }

    /// Parameter and output files of each row, in rank order.
    pub fn top_ranked(&self, table: &ResultTable) -> Vec<TopRanked> {
        table
            .rows
            .iter()
            .map(|row| {
                let output = SimulationOutput::from_dir(&row.simulation_dir);
                TopRanked {
                    dir_name: row.name.clone(),
                    param_path: output.parameter_file(),
                    statvar_path: output.statvar_file,
                }
            })
            .collect()
    }

    /// Scores of the unmodified model's output against the same reference.
    pub fn baseline_scores(
        &self,
        stage: &Stage,
        frequency: Frequency,
        baseline_statvar: &Path,
    ) -> Result<ScoreRecord> {
        let first = self.first_record(stage)?;
        let reference = read_reference(&first.measured)?;
        let simulated = self
            .loader
            .load_variable(baseline_statvar, &first.statvar_name)?;
        let (obs, sim) = aligned_pair(&reference, &simulated, frequency);
        Ok(ScoreRecord::compute(&obs, &sim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, nse: f64, rmse: f64, pbias: f64, r_squared: f64) -> ScoreRow {
        ScoreRow {
            name: name.to_string(),
            simulation_dir: PathBuf::from(name),
            scores: ScoreRecord {
                nse,
                rmse,
                pbias,
                r_squared,
                abs_pbias: pbias.abs(),
            },
        }
    }

    fn names(rows: &[ScoreRow]) -> Vec<&str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn nse_decides_first() {
        let mut rows = vec![
            row("trial-1", 0.8, 1.0, 1.0, 0.9),
            row("trial-2", 0.9, 2.0, 5.0, 0.5),
            row("trial-3", 0.85, 1.5, 2.0, 0.7),
        ];
        rank(&mut rows);
        assert_eq!(names(&rows), ["trial-2", "trial-3", "trial-1"]);
    }

    #[test]
    fn ties_fall_through_to_later_measures() {
        let mut rows = vec![
            row("a", 0.9, 2.0, 1.0, 0.8),
            row("b", 0.9, 1.0, 3.0, 0.8),
            row("c", 0.9, 1.0, -2.0, 0.8),
            row("d", 0.9, 1.0, 2.0, 0.9),
        ];
        rank(&mut rows);
        assert_eq!(names(&rows), ["d", "c", "b", "a"]);
    }

    #[test]
    fn nan_sorts_last() {
        let mut rows = vec![
            row("nan", f64::NAN, 1.0, 1.0, 1.0),
            row("bad", -3.0, 9.0, 50.0, 0.1),
            row("nan-rmse", -3.0, f64::NAN, 50.0, 0.1),
        ];
        rank(&mut rows);
        assert_eq!(names(&rows), ["bad", "nan-rmse", "nan"]);
    }

    #[test]
    fn columns_follow_rank_order() {
        let table = ResultTable {
            stage: Stage::Swrad,
            frequency: Frequency::Daily,
            rows: vec![row("x", 0.9, 1.0, 2.0, 0.8), row("y", 0.5, 2.0, -4.0, 0.6)],
        };
        let cols = table.to_columns();
        assert_eq!(cols.nse, vec![0.9, 0.5]);
        assert_eq!(cols.abs_pbias, vec![2.0, 4.0]);
        let text = table.to_string();
        let header: Vec<&str> = text.lines().next().unwrap().split_whitespace().collect();
        assert_eq!(header, ["name", "NSE", "RMSE", "PBIAS", "COEF_DET", "ABS(PBIAS)"]);
        let first: Vec<&str> = text.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(first, ["x", "0.9000", "1.0000", "2.0000", "0.8000", "2.0000"]);
    }

    #[test]
    fn open_without_records_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = OptimizationResult::open(dir.path(), Some(&Stage::Swrad))
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingOptimizationArtifacts { .. }));
        assert!(OptimizationResult::open(dir.path(), None).is_err());
    }
}
