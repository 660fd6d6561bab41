/// Runner that shells out to the PRMS executable.
///
/// Each trial directory gets `inputs/{parameters,control,data}` and an
/// `outputs/` directory that PRMS is pointed at with `-set` overrides.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};
use crate::parameters::write_parameter_file;
use crate::traits::{SimulationJob, SimulationOutput, SimulationRunner};

#[derive(Debug, Clone)]
pub struct PrmsRunner {
    executable: PathBuf,
}

impl PrmsRunner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn execute(&self, mut cmd: Command, dir: &Path) -> Result<()> {
        debug!("running {:?} in {}", cmd, dir.display());
        let output = cmd.current_dir(dir).output().map_err(|e| Error::Simulation {
            dir: dir.to_path_buf(),
            message: format!("cannot start {}: {}", self.executable.display(), e),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Simulation {
                dir: dir.to_path_buf(),
                message: format!("{} ({})", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

impl Default for PrmsRunner {
    fn default() -> Self {
        Self::new("prms")
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map(|_| ()).map_err(|e| Error::io(from, e))
}

impl SimulationRunner for PrmsRunner {
    fn run(&self, job: &SimulationJob) -> Result<SimulationOutput> {
        let dir = &job.simulation_dir;
        let inputs = dir.join("inputs");
        let outputs = dir.join("outputs");
        create_dir(&inputs)?;
        create_dir(&outputs)?;

        let output = SimulationOutput::from_dir(dir);
        write_parameter_file(&job.parameters, &output.parameter_file())?;
        copy_file(&job.control_file, &inputs.join("control"))?;
        copy_file(&job.data_file, &inputs.join("data"))?;

        let mut cmd = Command::new(&self.executable);
        cmd.arg(Path::new("inputs").join("control"))
            .args(["-set", "param_file"])
            .arg(Path::new("inputs").join("parameters"))
            .args(["-set", "data_file"])
            .arg(Path::new("inputs").join("data"))
            .args(["-set", "stat_var_file"])
            .arg(Path::new("outputs").join("statvar.dat"))
            .args(["-set", "model_output_file"])
            .arg(Path::new("outputs").join("prms.out"));
        self.execute(cmd, dir)?;

        if !output.statvar_file.is_file() {
            return Err(Error::Simulation {
                dir: dir.clone(),
                message: format!("no output at {}", output.statvar_file.display()),
            });
        }
        Ok(output)
    }

    fn run_baseline(&self, control_file: &Path) -> Result<()> {
        let dir = control_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut cmd = Command::new(&self.executable);
        cmd.arg(control_file.file_name().unwrap_or(control_file.as_os_str()));
        self.execute(cmd, dir)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::parameters::{Parameter, ParameterOverlay, ParameterSet, ValueType};
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    fn job(root: &Path) -> SimulationJob {
        let control = root.join("control");
        let data = root.join("data");
        fs::write(&control, "control").unwrap();
        fs::write(&data, "data").unwrap();
        let base = ParameterSet::new(
            vec!["h".to_string()],
            vec![("nmonths".to_string(), 12)],
            vec![Parameter::new("jh_coef", ["nmonths"], ValueType::Float, vec![0.01; 12])],
        )
        .unwrap();
        SimulationJob {
            parameters: ParameterOverlay::new(Arc::new(base)),
            control_file: control,
            data_file: data,
            simulation_dir: root.join("work").join("jh_coef:0.010000"),
        }
    }

    fn script(root: &Path, body: &str) -> PathBuf {
        let path = root.join("fake_prms.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn lays_out_inputs_and_collects_output() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo '0' > outputs/statvar.dat");
        let job = job(dir.path());
        let out = PrmsRunner::new(exe).run(&job).unwrap();

        assert!(out.statvar_file.is_file());
        assert!(job.simulation_dir.join("inputs/control").is_file());
        assert!(job.simulation_dir.join("inputs/data").is_file());
        let params = crate::parameters::read_parameter_file(&out.parameter_file()).unwrap();
        assert_eq!(params.get("jh_coef").unwrap().values, vec![0.01; 12]);
    }

    #[test]
    fn missing_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exit 0");
        let err = PrmsRunner::new(exe).run(&job(dir.path())).unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo boom >&2; exit 3");
        let err = PrmsRunner::new(exe).run(&job(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Simulation { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn baseline_runs_in_control_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo '0' > statvar.dat");
        let input = dir.path().join("input");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("control"), "c").unwrap();
        PrmsRunner::new(exe).run_baseline(&input.join("control")).unwrap();
        assert!(input.join("statvar.dat").is_file());
    }
}
