//! Headless battle prediction runner.
//!
//! # Usage
//!
//! ```bash
//! # Predict a battle and print the result as JSON
//! cargo run -p combat_headless -- predict --scenario assets/scenarios/marines_vs_zerglings.ron --json
//!
//! # Record health over time
//! cargo run -p combat_headless -- predict --scenario s.ron --record health.csv
//!
//! # Search for the best composition against owner 1's army
//! cargo run -p combat_headless -- optimize --scenario assets/scenarios/counter_roach_ling.ron --output best.json
//!
//! # Run 1000 seeded predictions
//! cargo run -p combat_headless -- batch --scenario s.ron --count 1000 --output results/
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use combat_core::build_time::IncomeBuildTimePredictor;
use combat_core::optimizer::{find_best_composition_genetic, SearchSetup};
use combat_core::predictor::CombatPredictor;
use combat_core::random::SeededRng;
use combat_core::recording::CombatRecording;
use combat_core::unit::Owner;
use combat_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    catalog_loader::load_catalog,
    metrics::{BattleMetrics, OptimizationReport},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "combat_headless")]
#[command(about = "Battle outcome prediction and army composition search")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Unit catalog (defaults to $COMBAT_CATALOG_PATH or assets/data/catalog.ron)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict one battle
    Predict {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write a health-over-time CSV
        #[arg(long)]
        record: Option<PathBuf>,

        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Search for the army that best counters owner 1
    Optimize {
        /// Scenario file with a search section
        #[arg(short, long)]
        scenario: PathBuf,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Override the number of generations
        #[arg(short, long)]
        generations: Option<usize>,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict one scenario under many seeds
    Batch {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of battles to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Run battles in parallel
        #[arg(short, long)]
        parallel: bool,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long)]
        scenario: PathBuf,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Time repeated predictions
    Benchmark {
        /// Scenario to benchmark
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of predictions to run
        #[arg(short, long, default_value = "1000")]
        iterations: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for results
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let predictor = load_predictor(cli.catalog.as_deref());

    match cli.command {
        Commands::Predict {
            scenario,
            seed,
            record,
            json,
        } => cmd_predict(&predictor, &scenario, seed, record, json),
        Commands::Optimize {
            scenario,
            seed,
            generations,
            output,
        } => cmd_optimize(&predictor, &scenario, seed, generations, output),
        Commands::Batch {
            scenario,
            count,
            seed,
            parallel,
            output,
        } => cmd_batch(&predictor, &scenario, count, seed, parallel, output),
        Commands::Verify {
            scenario,
            seed,
            runs,
        } => cmd_verify(&predictor, &scenario, seed, runs),
        Commands::Benchmark {
            scenario,
            iterations,
        } => cmd_benchmark(&predictor, &scenario, iterations),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    tracing::error!("{}", message);
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

fn load_predictor(catalog: Option<&Path>) -> CombatPredictor {
    match load_catalog(catalog) {
        Ok(catalog) => CombatPredictor::new(catalog),
        Err(e) => fail(e),
    }
}

fn load_scenario(path: &Path) -> Scenario {
    tracing::info!("Loading scenario: {}", path.display());
    Scenario::load(path).unwrap_or_else(|e| fail(e))
}

/// Predict one battle
fn cmd_predict(
    predictor: &CombatPredictor,
    path: &Path,
    seed: u64,
    record: Option<PathBuf>,
    json: bool,
) {
    let scenario = load_scenario(path);
    let state = scenario.build_state(predictor).unwrap_or_else(|e| fail(e));
    let mut rng = SeededRng::new(seed);

    let result = if let Some(record_path) = &record {
        let mut recording = CombatRecording::new();
        let result = predictor.predict_engage_recorded(
            state,
            &scenario.settings,
            scenario.defender,
            &mut rng,
            &mut recording,
        );
        let file = std::fs::File::create(record_path).unwrap_or_else(|e| fail(e));
        if let Err(e) = recording.write_csv(predictor.catalog(), std::io::BufWriter::new(file)) {
            fail(e);
        }
        eprintln!("Recording saved to: {}", record_path.display());
        result
    } else {
        predictor.predict_engage(state, &scenario.settings, scenario.defender, &mut rng)
    };

    let metrics = BattleMetrics::from_result(predictor.catalog(), 0, seed, &result);
    if json {
        match serde_json::to_string_pretty(&metrics) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(e),
        }
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("PREDICTION: {}", scenario.name);
    eprintln!("{}", "=".repeat(50));
    match result.winner() {
        Some(owner) => eprintln!("Winner: owner {}", owner.id()),
        None => eprintln!("Winner: none (draw)"),
    }
    eprintln!("Battle time: {:.1}s", result.time);
    for owner in Owner::BOTH {
        let i = owner.index();
        eprintln!(
            "Owner {}: {} survivors, {:.0} value left, health-time {:.2}",
            owner.id(),
            metrics.survivors[i],
            metrics.remaining_value[i],
            metrics.average_health_time[i]
        );
    }
}

/// Search for a counter composition
fn cmd_optimize(
    predictor: &CombatPredictor,
    path: &Path,
    seed: u64,
    generations: Option<usize>,
    output: Option<PathBuf>,
) {
    let scenario = load_scenario(path);
    let catalog = predictor.catalog();
    let search = scenario.search().unwrap_or_else(|e| fail(e));
    let mut settings = search.settings.clone();
    if let Some(generations) = generations {
        settings.generations = generations;
    }

    let opponent = scenario.opponent_state(predictor).unwrap_or_else(|e| fail(e));
    let available = scenario.available(catalog).unwrap_or_else(|e| fail(e));
    let seed_composition = scenario.seed_composition(catalog).unwrap_or_else(|e| fail(e));
    let starting = scenario.starting_build_state(catalog).unwrap_or_else(|e| fail(e));
    let income = search
        .income
        .map(|model| IncomeBuildTimePredictor::with_model(predictor.shared_catalog(), model));

    let mut setup = SearchSetup::new();
    if let Some(income) = &income {
        setup = setup.with_build_predictor(&starting, income);
    }
    if let Some(composition) = &seed_composition {
        setup = setup.with_seed(composition);
    }

    tracing::info!(
        scenario = %scenario.name,
        slots = available.len(),
        population = settings.population,
        generations = settings.generations,
        seed,
        "Starting composition search"
    );

    let start = Instant::now();
    let outcome = find_best_composition_genetic(
        predictor,
        &opponent,
        &available,
        setup,
        &settings,
        &mut SeededRng::new(seed),
    )
    .unwrap_or_else(|e| fail(e));
    let elapsed = start.elapsed();

    let report = OptimizationReport::new(catalog, &scenario.name, seed, &outcome);
    if let Some(output) = &output {
        let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| fail(e));
        if let Err(e) = std::fs::write(output, json) {
            fail(e);
        }
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("SEARCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Duration: {:.1}s", elapsed.as_secs_f64());
    eprintln!("Fitness: {:.1}", report.fitness);
    if income.is_some() {
        eprintln!("Build time: {:.0}s", report.build_time);
    }
    eprintln!("\nArmy:");
    for line in &report.units {
        eprintln!("  {:>3} x {}", line.count, line.unit);
    }
    for upgrade in &report.upgrades {
        eprintln!("  + {}", upgrade);
    }
    if let Some(output) = &output {
        eprintln!("\nReport saved to: {}", output.display());
    }
}

/// Run a seeded batch
fn cmd_batch(
    predictor: &CombatPredictor,
    path: &Path,
    count: u32,
    seed: u64,
    parallel: bool,
    output: PathBuf,
) {
    let scenario = load_scenario(path);

    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        scenario = %scenario.name,
        count,
        seed,
        parallel,
        cpus_available = num_cpus,
        output = %output.display(),
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        fail(format!(
            "Cannot create output directory '{}': {}",
            output.display(),
            e
        ));
    }

    let config = BatchConfig::new(&path.display().to_string(), count)
        .with_seed(seed)
        .with_parallel(parallel)
        .with_output(output.clone());
    let results = run_batch(predictor, &scenario, config).unwrap_or_else(|e| fail(e));

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        fail(format!("Failed to save results: {}", e));
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Battles: {}", summary.total_battles);
    eprintln!("Duration: {:.2}s", results.duration_seconds);
    eprintln!(
        "Throughput: {:.1} battles/sec",
        f64::from(summary.total_battles) / results.duration_seconds.max(0.001)
    );
    eprintln!("Average battle time: {:.1}s", summary.avg_time);
    eprintln!("Distinct outcomes: {}", summary.distinct_outcomes);
    eprintln!("\nWin Rates:");
    for (owner, rate) in &summary.win_rates {
        eprintln!("  {}: {:.1}%", owner, rate * 100.0);
    }
    if summary.draws > 0 {
        eprintln!("  draws: {}", summary.draws);
    }
    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(predictor: &CombatPredictor, path: &Path, seed: u64, runs: u32) {
    let scenario = load_scenario(path);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    let report = verify_determinism(predictor, &scenario, seed, runs).unwrap_or_else(|e| fail(e));
    if report.is_deterministic {
        eprintln!("PASS: All {} runs produced identical results", runs);
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (i, hash) in report.hashes.iter().enumerate() {
            eprintln!("  run {}: {:016x}", i, hash);
        }
        std::process::exit(1);
    }
}

/// Run benchmark
fn cmd_benchmark(predictor: &CombatPredictor, path: &Path, iterations: u32) {
    let scenario = load_scenario(path);
    let state = scenario.build_state(predictor).unwrap_or_else(|e| fail(e));

    eprintln!("Starting benchmark with {} units", state.units.len());
    eprintln!("Running {} predictions...", iterations);

    // Warmup
    for seed in 0..10 {
        std::hint::black_box(predictor.predict_engage(
            state.clone(),
            &scenario.settings,
            scenario.defender,
            &mut SeededRng::new(seed),
        ));
    }

    let start = Instant::now();
    let mut total_time = 0.0_f64;
    for seed in 0..u64::from(iterations) {
        let result = predictor.predict_engage(
            state.clone(),
            &scenario.settings,
            scenario.defender,
            &mut SeededRng::new(seed),
        );
        total_time += f64::from(result.time);
    }
    let elapsed = start.elapsed();
    let per_second = f64::from(iterations) / elapsed.as_secs_f64().max(1e-9);

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Predictions: {}", iterations);
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Predictions/second: {:.1}", per_second);
    eprintln!(
        "us/prediction: {:.2}",
        elapsed.as_micros() as f64 / f64::from(iterations.max(1))
    );
    eprintln!(
        "Average simulated time: {:.1}s",
        total_time / f64::from(iterations.max(1))
    );
}
