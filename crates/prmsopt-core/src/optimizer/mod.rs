//! Stage orchestration: draw trials, run them, record what was done.
mod record;
mod stage;

pub use record::{
    next_record_name, now_to_minute, read_record, record_file_name, record_paths, write_record,
    OptimizationRecord,
};
pub use stage::{PetModule, Stage, StageConfig, StationHru, DDSOLRAD_PARAMETERS};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{OptimizerConfig, RunOptions};
use crate::error::{Error, Result};
use crate::parameters::{ParameterOverlay, ParameterSet};
use crate::ranges::RangeRegistry;
use crate::resample::ResampleSpec;
use crate::timeseries::read_reference;
use crate::traits::{SimulationJob, SimulationOutput, SimulationRunner};

/// A finished orchestration call and where its record was written.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun {
    pub record: OptimizationRecord,
    pub record_path: PathBuf,
    pub outputs: Vec<SimulationOutput>,
}

/// Drives calibration stages against one base parameter set.
///
/// The base set is shared by every trial and never modified; trials carry
/// only the parameters they replace.
pub struct Optimizer<R: SimulationRunner> {
    config: OptimizerConfig,
    parameters: Arc<ParameterSet>,
    registry: RangeRegistry,
    runner: R,
    rng: StdRng,
    outputs: BTreeMap<Stage, Vec<SimulationOutput>>,
}

impl<R: SimulationRunner> Optimizer<R> {
    /// Validate the configuration, prepare the working directory and make
    /// sure the unmodified model has a baseline output next to its control file.
    pub fn new(
        config: OptimizerConfig,
        parameters: impl Into<Arc<ParameterSet>>,
        runner: R,
    ) -> Result<Self> {
        config.validate()?;
        let baseline = config.baseline_statvar();
        if !baseline.is_file() {
            warn!(
                "{} not found; running the unmodified model in {} for later comparison",
                baseline.display(),
                config.input_dir().display()
            );
            runner.run_baseline(&config.control_file)?;
        }
        fs::create_dir_all(&config.working_dir).map_err(|e| Error::io(&config.working_dir, e))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random()),
        };
        Ok(Self {
            config,
            parameters: parameters.into(),
            registry: RangeRegistry::default(),
            runner,
            rng,
            outputs: BTreeMap::new(),
        })
    }

    /// Replace the built-in allowable ranges.
    pub fn with_registry(mut self, registry: RangeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        &self.parameters
    }

    pub fn registry(&self) -> &RangeRegistry {
        &self.registry
    }

    /// Outputs of every trial run so far for `stage`, in this session.
    pub fn outputs(&self, stage: &Stage) -> &[SimulationOutput] {
        self.outputs.get(stage).map_or(&[], Vec::as_slice)
    }

    /// Solar radiation stage: perturb the ddsolrad parameters jointly.
    pub fn srad(
        &mut self,
        reference_path: impl Into<PathBuf>,
        station: StationHru,
        options: &RunOptions,
    ) -> Result<StageRun> {
        self.run_stage(&StageConfig::srad(reference_path, station), options)
    }

    /// PET stage: perturb the coefficient of the chosen PET module.
    pub fn pet(
        &mut self,
        reference_path: impl Into<PathBuf>,
        station: StationHru,
        module: PetModule,
        options: &RunOptions,
    ) -> Result<StageRun> {
        self.run_stage(&StageConfig::pet(reference_path, station, module), options)
    }

    /// Free-form Monte Carlo stage over any registered parameters.
    pub fn monte_carlo<I, S>(
        &mut self,
        reference_path: impl Into<PathBuf>,
        param_names: I,
        statvar_name: &str,
        stage: Stage,
        options: &RunOptions,
    ) -> Result<StageRun>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = StageConfig::custom(reference_path, param_names, statvar_name, stage);
        self.run_stage(&config, options)
    }

    /// Run `options.n_sims` perturbed trials for one stage.
    ///
    /// Every parameter is validated before the first draw, so a bad request
    /// leaves no trial directories behind. Draws are parameter-major: all
    /// trials of the first parameter, then all trials of the next.
    pub fn run_stage(&mut self, stage: &StageConfig, options: &RunOptions) -> Result<StageRun> {
        options.validate()?;
        stage.validate()?;
        let specs = stage
            .param_names
            .iter()
            .map(|name| {
                ResampleSpec::new(
                    &self.parameters,
                    name,
                    &self.registry,
                    options.method,
                    options.noise_factor,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        // A missing or malformed reference should fail before any run.
        read_reference(&stage.reference_path)?;

        let start_time = now_to_minute();
        let n_sims = options.n_sims;
        info!(
            "{} stage: {} trials perturbing {} ({})",
            stage.stage,
            n_sims,
            stage.param_names.join(", "),
            options.method
        );

        let mut draws: Vec<Vec<Vec<f64>>> = Vec::with_capacity(specs.len());
        for spec in &specs {
            let base = &self.parameters.require(&spec.name)?.values;
            let mut trials = Vec::with_capacity(n_sims);
            for _ in 0..n_sims {
                trials.push(spec.resample(base, &self.config.resample, &mut self.rng)?);
            }
            draws.push(trials);
        }

        let data_file = self.stage_data_file(&stage.stage)?;
        let mut taken = BTreeSet::new();
        let mut jobs = Vec::with_capacity(n_sims);
        for trial in 0..n_sims {
            let mut overlay = ParameterOverlay::new(Arc::clone(&self.parameters));
            for (spec, trials) in specs.iter().zip(&draws) {
                overlay = overlay.with_values(&spec.name, trials[trial].clone())?;
            }
            let mut name = trial_dir_name(&specs[0].name, &draws[0][trial]);
            if !taken.insert(name.clone()) {
                name = format!("{}_{}", name, trial);
                taken.insert(name.clone());
            }
            debug!("trial {} -> {}", trial, name);
            jobs.push(SimulationJob {
                parameters: overlay,
                control_file: self.config.control_file.clone(),
                data_file: data_file.clone(),
                simulation_dir: self.config.working_dir.join(name),
            });
        }

        let nproc = options.or_config(&self.config).resolved_worker_count();
        let outputs = self.runner.run_series(&jobs, nproc)?;
        let end_time = now_to_minute();

        let record = OptimizationRecord {
            stage: stage.stage.clone(),
            title: self.config.title.clone(),
            description: self.config.description.clone(),
            params_adjusted: stage.param_names.clone(),
            statvar_name: stage.statvar_name.clone(),
            measured: stage.reference_path.clone(),
            resample: options.method,
            start_time,
            end_time,
            original_params: self.parameters.base_file().map(Path::to_path_buf),
            nproc,
            n_sims,
            sim_dirs: outputs.iter().map(|o| o.simulation_dir.clone()).collect(),
        };
        let record_path = write_record(&self.config.working_dir, &record)?;
        info!("Output information sent to {}", record_path.display());

        self.outputs
            .entry(stage.stage.clone())
            .or_default()
            .extend(outputs.iter().cloned());
        Ok(StageRun {
            record,
            record_path,
            outputs,
        })
    }

    /// The solar radiation stage keeps a copy of the climate data in the
    /// working directory and runs every trial from it.
    fn stage_data_file(&self, stage: &Stage) -> Result<PathBuf> {
        if *stage != Stage::Swrad {
            return Ok(self.config.data_file.clone());
        }
        let staged = self.config.working_dir.join("data");
        if same_file(&self.config.data_file, &staged) {
            debug!("{} is already staged", staged.display());
            return Ok(staged);
        }
        fs::copy(&self.config.data_file, &staged)
            .map_err(|e| Error::io(&self.config.data_file, e))?;
        Ok(staged)
    }
}

/// Both paths exist and resolve to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `{first parameter}:{mean of its drawn values}`.
fn trial_dir_name(name: &str, values: &[f64]) -> String {
    let mean = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };
    format!("{}:{:.6}", name, mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{Parameter, ValueType};
    use crate::resample::ResampleMethod;
    use std::sync::Mutex;

    /// Records jobs instead of running them.
    #[derive(Default)]
    struct RecordingRunner {
        jobs: Mutex<Vec<SimulationJob>>,
        baselines: Mutex<usize>,
    }

    impl SimulationRunner for RecordingRunner {
        fn run(&self, job: &SimulationJob) -> Result<SimulationOutput> {
            self.jobs.lock().unwrap().push(job.clone());
            Ok(SimulationOutput::from_dir(&job.simulation_dir))
        }

        fn run_baseline(&self, control_file: &Path) -> Result<()> {
            *self.baselines.lock().unwrap() += 1;
            let dir = control_file.parent().unwrap();
            fs::write(dir.join("statvar.dat"), "").unwrap();
            Ok(())
        }
    }

    fn base_set() -> ParameterSet {
        ParameterSet::new(
            vec!["Written by test".to_string()],
            vec![("one".to_string(), 1), ("nhru".to_string(), 2), ("nmonths".to_string(), 12)],
            vec![
                Parameter::new("dday_intcp", ["nhru"], ValueType::Float, vec![-20.0, -25.0]),
                Parameter::new("dday_slope", ["nhru"], ValueType::Float, vec![0.4, 0.5]),
                Parameter::new(
                    "potet_coef_hru_mo",
                    ["nhru", "nmonths"],
                    ValueType::Float,
                    vec![1.2; 24],
                ),
                Parameter::new("snow_adj", ["one"], ValueType::Float, vec![1.0]),
            ],
        )
        .unwrap()
    }

    struct Fixture {
        _root: tempfile::TempDir,
        config: OptimizerConfig,
        reference: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let model = root.path().join("model");
        fs::create_dir_all(&model).unwrap();
        fs::write(model.join("control"), "control").unwrap();
        fs::write(model.join("data"), "data").unwrap();
        let reference = root.path().join("swrad.csv");
        fs::write(&reference, "date,swrad\n2000-01-01,100.0\n2000-01-02,120.0\n").unwrap();
        let config = OptimizerConfig::new(
            root.path().join("work"),
            model.join("control"),
            model.join("data"),
            "test",
        )
        .with_seed(7);
        Fixture {
            _root: root,
            config,
            reference,
        }
    }

    fn options(n_sims: usize) -> RunOptions {
        RunOptions {
            n_sims,
            worker_count: Some(2),
            ..RunOptions::default()
        }
    }

    #[test]
    fn baseline_runs_once_when_missing() {
        let fx = fixture();
        let opt =
            Optimizer::new(fx.config.clone(), base_set(), RecordingRunner::default()).unwrap();
        assert_eq!(*opt.runner.baselines.lock().unwrap(), 1);
        assert!(fx.config.working_dir.is_dir());

        let again =
            Optimizer::new(fx.config.clone(), base_set(), RecordingRunner::default()).unwrap();
        assert_eq!(*again.runner.baselines.lock().unwrap(), 0);
    }

    #[test]
    fn srad_stage_writes_trials_and_record() {
        let fx = fixture();
        let mut opt =
            Optimizer::new(fx.config.clone(), base_set(), RecordingRunner::default()).unwrap();
        let run = opt
            .srad(&fx.reference, StationHru::Basin, &options(4))
            .unwrap();

        assert_eq!(run.outputs.len(), 4);
        assert_eq!(run.record.sim_dirs.len(), 4);
        assert_eq!(run.record.statvar_name, "basin_swrad_1");
        assert_eq!(run.record.params_adjusted, vec!["dday_intcp", "dday_slope"]);
        assert_eq!(run.record.nproc, 2);
        assert!(run.record_path.ends_with("test_swrad_opt.json"));
        assert!(fx.config.working_dir.join("data").is_file());

        for job in opt.runner.jobs.lock().unwrap().iter() {
            let name = job.simulation_dir.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("dday_intcp:"));
            assert!(job.parameters.is_replaced("dday_intcp"));
            assert!(job.parameters.is_replaced("dday_slope"));
            assert!(!job.parameters.is_replaced("snow_adj"));
            for v in &job.parameters.get("dday_slope").unwrap().values {
                assert!((0.2..=0.9).contains(v));
            }
            assert_eq!(job.data_file, fx.config.working_dir.join("data"));
        }
        assert_eq!(opt.outputs(&Stage::Swrad).len(), 4);
        // base set untouched
        assert_eq!(opt.parameters().get("dday_intcp").unwrap().values, vec![-20.0, -25.0]);
    }

    #[test]
    fn srad_keeps_data_file_already_in_working_dir() {
        let fx = fixture();
        let work = fx.config.working_dir.clone();
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join("data"), "CLIMATE DATA").unwrap();
        let mut config = fx.config.clone();
        // Same file reached through a different spelling.
        config.data_file = work.join(".").join("data");

        let mut opt = Optimizer::new(config, base_set(), RecordingRunner::default()).unwrap();
        opt.srad(&fx.reference, StationHru::Basin, &options(2)).unwrap();
        assert_eq!(fs::read_to_string(work.join("data")).unwrap(), "CLIMATE DATA");
        opt.srad(&fx.reference, StationHru::Basin, &options(2)).unwrap();
        assert_eq!(fs::read_to_string(work.join("data")).unwrap(), "CLIMATE DATA");
    }

    #[test]
    fn second_run_gets_next_record_version() {
        let fx = fixture();
        let mut opt =
            Optimizer::new(fx.config.clone(), base_set(), RecordingRunner::default()).unwrap();
        opt.pet(&fx.reference, StationHru::Hru(1), PetModule::PotetPt, &options(2))
            .unwrap();
        let second = opt
            .pet(&fx.reference, StationHru::Hru(1), PetModule::PotetPt, &options(2))
            .unwrap();
        assert!(second.record_path.ends_with("test_pet_opt1.json"));
        assert_eq!(read_record(&second.record_path).unwrap(), second.record);
    }

    #[test]
    fn invalid_requests_fail_before_running() {
        let fx = fixture();
        let mut opt =
            Optimizer::new(fx.config.clone(), base_set(), RecordingRunner::default()).unwrap();

        let err = opt
            .monte_carlo(&fx.reference, ["snow_adj"], "basin_snow", Stage::custom(), &options(2))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameterBounds(_)));

        let err = opt
            .monte_carlo(&fx.reference, ["dday_intcp", "nope"], "x", Stage::custom(), &options(2))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameter(_)));

        let bad = RunOptions {
            noise_factor: -1.0,
            method: ResampleMethod::Normal,
            ..options(2)
        };
        assert!(opt.srad(&fx.reference, StationHru::Basin, &bad).is_err());

        assert!(opt.runner.jobs.lock().unwrap().is_empty());
        assert!(record_paths(&fx.config.working_dir, &Stage::custom()).unwrap().is_empty());
    }

    #[test]
    fn seeded_runs_repeat() {
        let draw = || {
            let fx = fixture();
            let mut opt =
                Optimizer::new(fx.config.clone(), base_set(), RecordingRunner::default()).unwrap();
            let run = opt.srad(&fx.reference, StationHru::Basin, &options(3)).unwrap();
            run.record
                .sim_dirs
                .iter()
                .map(|d| d.file_name().unwrap().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(), draw());
    }

    #[test]
    fn trial_names_use_mean_of_first_parameter() {
        assert_eq!(trial_dir_name("jh_coef", &[0.01, 0.03]), "jh_coef:0.020000");
        assert_eq!(trial_dir_name("x", &[]), "x:0.000000");
    }
}
