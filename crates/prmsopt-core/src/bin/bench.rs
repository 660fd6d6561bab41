/// Pure Rust core benchmarks for resampling and scoring.
///
/// Uses std::time::Instant for timing, a seeded StdRng for data generation,
/// and std::hint::black_box to prevent dead-code elimination.
use std::hint::black_box;
use std::time::{Duration, Instant};

use prmsopt_core::metrics::ScoreRecord;
use prmsopt_core::parameters::{Parameter, ParameterSet, ValueType};
use prmsopt_core::ranges::RangeRegistry;
use prmsopt_core::resample::{ResampleMethod, ResampleOptions, ResampleSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const REPEATS: usize = 7;

fn make_series(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let obs: Vec<f64> = (0..n).map(|_| rng.random_range(50.0..350.0)).collect();
    let sim: Vec<f64> = obs.iter().map(|o| o + rng.random_range(-30.0..30.0)).collect();
    (obs, sim)
}

fn make_parameters(nhru: usize) -> ParameterSet {
    ParameterSet::new(
        Vec::new(),
        vec![("nhru".to_string(), nhru), ("nmonths".to_string(), 12)],
        vec![
            Parameter::new("dday_slope", ["nhru"], ValueType::Float, vec![0.4; nhru]),
            Parameter::new(
                "potet_coef_hru_mo",
                ["nhru", "nmonths"],
                ValueType::Float,
                vec![1.2; nhru * 12],
            ),
        ],
    )
    .expect("benchmark parameter set is consistent")
}

/// Run a closure `REPEATS` times, return the median duration.
fn median_time<F: FnMut()>(mut f: F) -> Duration {
    let mut times: Vec<Duration> = (0..REPEATS)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .collect();
    times.sort();
    times[REPEATS / 2]
}

fn bench_resample(
    label: &'static str,
    name: &str,
    method: ResampleMethod,
    sizes: &[usize],
) -> Vec<(&'static str, usize, Duration)> {
    let registry = RangeRegistry::default();
    let options = ResampleOptions::default();
    let mut results = Vec::new();

    for &n in sizes {
        let params = make_parameters(n);
        let spec = ResampleSpec::new(&params, name, &registry, method, 0.1)
            .expect("benchmark parameter is resamplable");
        let values = &params.get(name).expect("parameter present").values;
        let mut rng = StdRng::seed_from_u64(42);

        // Warmup
        black_box(spec.resample(values, &options, &mut rng).ok());

        let dur = median_time(|| {
            black_box(spec.resample(values, &options, &mut rng).ok());
        });
        results.push((label, n, dur));
    }
    results
}

fn bench_scores(sizes: &[usize]) -> Vec<(&'static str, usize, Duration)> {
    let mut results = Vec::new();

    for &n in sizes {
        let (obs, sim) = make_series(n, 42);

        // Warmup
        black_box(ScoreRecord::compute(&obs, &sim));

        let dur = median_time(|| {
            black_box(ScoreRecord::compute(&obs, &sim));
        });
        results.push(("scores", n, dur));
    }
    results
}

fn main() {
    println!("Pure Rust Core Benchmarks");
    println!("============================================================");
    println!("{:<18} {:>6}   {:>12}", "Operation", "N", "Median (ms)");
    println!("--------------------------------------------");

    let mut all_results: Vec<(&str, usize, Duration)> = Vec::new();

    all_results.extend(bench_resample(
        "uniform/element",
        "dday_slope",
        ResampleMethod::Uniform,
        &[100, 366],
    ));
    all_results.extend(bench_resample(
        "normal/element",
        "dday_slope",
        ResampleMethod::Normal,
        &[100, 366],
    ));
    all_results.extend(bench_resample(
        "uniform/shift",
        "dday_slope",
        ResampleMethod::Uniform,
        &[3650, 36500],
    ));
    all_results.extend(bench_resample(
        "monthly",
        "potet_coef_hru_mo",
        ResampleMethod::Uniform,
        &[100, 3650],
    ));
    all_results.extend(bench_scores(&[3650, 36500]));

    for (op, n, dur) in &all_results {
        let ms = dur.as_secs_f64() * 1000.0;
        println!("{:<18} {:>6}      {:>8.2}", op, n, ms);
    }

    println!("============================================================");
}
