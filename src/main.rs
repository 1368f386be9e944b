//! spheregcm CLI - toy general-circulation model on a sphere.
//!
//! Runs the model for a number of epochs and writes the per-epoch grids as
//! JSON for plotting.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use spheregcm::atmosphere::{ModelConfig, RegularGrid};
use spheregcm::export::write_snapshots_json;
use spheregcm::geometry::fibonacci_sphere;
use spheregcm::simulation::Simulation;

/// Toy general-circulation model on a Fibonacci-sampled sphere.
#[derive(Parser)]
#[command(name = "spheregcm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation and export snapshots.
    Run {
        /// Number of epochs (timesteps) to simulate.
        #[arg(short, long, default_value = "80")]
        epochs: usize,

        /// Where to write the snapshot JSON.
        #[arg(short, long, default_value = "./output/snapshots.json")]
        output: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Print the sampling and grid layout for a configuration.
    Info {
        #[command(flatten)]
        model: ModelArgs,
    },
}

/// Overrides applied on top of the defaults or a `--config` file.
#[derive(Args)]
struct ModelArgs {
    /// JSON file with `planet` and `simulation` sections.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sample points requested before polar exclusion.
    #[arg(short, long)]
    points: Option<usize>,

    /// Output grid resolution (colatitude rows).
    #[arg(short, long)]
    resolution: Option<usize>,

    /// Timestep in seconds.
    #[arg(long)]
    timestep: Option<f64>,

    /// Day length in seconds.
    #[arg(long)]
    day_length: Option<f64>,

    /// Spline smoothing factor.
    #[arg(long)]
    smoothing: Option<f64>,

    /// Solar constant in W/m².
    #[arg(long)]
    solar: Option<f64>,

    /// Planetary albedo (0-1).
    #[arg(long)]
    albedo: Option<f64>,
}

impl ModelArgs {
    fn resolve(&self) -> ModelConfig {
        let mut model = match &self.config {
            Some(path) => load_config(path),
            None => ModelConfig::default(),
        };

        let sim = &mut model.simulation;
        if let Some(points) = self.points {
            sim.point_count = points;
        }
        if let Some(resolution) = self.resolution {
            sim.grid_resolution = resolution;
        }
        if let Some(timestep) = self.timestep {
            sim.timestep = timestep;
        }
        if let Some(day_length) = self.day_length {
            sim.day_length = day_length;
        }
        if let Some(smoothing) = self.smoothing {
            sim.smoothing = smoothing;
        }
        if let Some(solar) = self.solar {
            model.planet.solar_constant = solar;
        }
        if let Some(albedo) = self.albedo {
            model.planet.albedo = albedo;
        }

        if let Err(e) = model.validate() {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        model
    }
}

fn load_config(path: &Path) -> ModelConfig {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config {}: {}", path.display(), e);
        std::process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing config {}: {}", path.display(), e);
        std::process::exit(1);
    })
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error installing logger: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Commands::Run { epochs, output, model } => run_model(epochs, &output, &model.resolve()),
        Commands::Info { model } => run_info(&model.resolve()),
    }
}

fn run_model(epochs: usize, output: &Path, model: &ModelConfig) {
    let planet = &model.planet;
    let sim = &model.simulation;

    println!("spheregcm - Toy General-Circulation Model");
    println!("=========================================");
    println!("Points requested: {}", sim.point_count);
    println!("Grid: {}x{}", sim.grid_resolution, 2 * sim.grid_resolution);
    println!("Timestep: {} s ({} steps/day)", sim.timestep, sim.steps_per_day());
    println!("Solar constant: {} W/m², albedo {}", planet.solar_constant, planet.albedo);
    println!("Epochs: {}", epochs);
    println!("Output: {}", output.display());

    println!("\nFitting initial state...");
    let start = Instant::now();
    let mut simulation = Simulation::new(planet, sim).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    println!(
        "  {} sample points, mean temperature {:.2} K",
        simulation.state().samples().len(),
        simulation.state().mean_temperature()
    );

    println!("\nRunning simulation...");
    let report_every = (epochs / 10).max(1);
    let mut snapshots = Vec::with_capacity(epochs);
    let result = simulation.run_with_callback(epochs, |snapshot| {
        let done = snapshot.epoch_index + 1;
        if done % report_every == 0 || done == epochs {
            let (t_min, t_max) = snapshot.temperature.range().unwrap_or((f64::NAN, f64::NAN));
            println!(
                "  [{}/{}] {}  T grid [{:.1}, {:.1}] K",
                done, epochs, snapshot.time_label, t_min, t_max
            );
        }
        snapshots.push(snapshot.clone());
    });
    if let Err(e) = result {
        eprintln!("Error during simulation: {}", e);
        std::process::exit(1);
    }

    let sim_time = start.elapsed();
    println!("Simulation completed in {:.2?}", sim_time);

    println!("\nExporting snapshots...");
    let export_start = Instant::now();
    write_snapshots_json(output, &snapshots).unwrap_or_else(|e| {
        eprintln!("Error exporting snapshots: {}", e);
        std::process::exit(1);
    });
    println!("  Wrote {} snapshots to {}", snapshots.len(), output.display());
    println!("Export completed in {:.2?}", export_start.elapsed());

    println!("\nTotal time: {:.2?}", start.elapsed());
    println!("Done!");
}

fn run_info(model: &ModelConfig) {
    let sim = &model.simulation;
    let kept = fibonacci_sphere(sim.point_count).len();
    let grid = RegularGrid::new(sim.grid_resolution).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let (rows, cols) = grid.shape();

    println!("spheregcm - Configuration Info");
    println!("==============================");
    println!();
    println!("Sampling:");
    println!("  Requested points: {:>8}", sim.point_count);
    println!("  After polar caps: {:>8}", kept);
    println!("  Dropped:          {:>8}", sim.point_count - kept);
    println!();
    println!("Output grid:");
    println!("  Shape:            {:>4} x {}", rows, cols);
    println!("  Nodes:            {:>8}", rows * cols);
    println!();
    println!("Time:");
    println!("  Timestep:         {:>8} s", sim.timestep);
    println!("  Day length:       {:>8} s", sim.day_length);
    println!("  Steps per day:    {:>8}", sim.steps_per_day());
    println!("  Year length:      {:>8.1} days", sim.year_length() / sim.day_length);
    println!();
    println!("Planet:");
    println!("  Radius:           {:>8.3e} m", model.planet.radius);
    println!("  Heat capacity:    {:>8.3e} J/(m²·K)", model.planet.heat_capacity);
    println!("  Albedo:           {:>8}", model.planet.albedo);
    println!("  Solar constant:   {:>8} W/m²", model.planet.solar_constant);
}
