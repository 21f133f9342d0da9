use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use vessel_o_mat::catalogue::{CatalogueClient, PasswordAuthenticator};
use vessel_o_mat::config::Config;
use vessel_o_mat::detect::CommandDetector;
use vessel_o_mat::geodesy::{BoundingBox, GeoPoint};
use vessel_o_mat::pipeline::{BatchRunner, PassPipeline};
use vessel_o_mat::predict::{closest_passes, orbit_track};
use vessel_o_mat::store::{FileStore, PassStore};

#[derive(Parser)]
#[command(name = "vessel-o-mat")]
#[command(about = "Match vessels to imaging satellite passes and fetch imagery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file
    Validate {
        #[arg(short, long)]
        config: String,
    },
    /// Run one acquisition cycle over every vessel
    Run {
        #[arg(short, long)]
        config: String,
    },
    /// List the closest satellite passes over a position
    Passes {
        #[arg(short, long)]
        config: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Search start (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the area-of-interest polygon around a position
    Aoi {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, default_value_t = 10.0)]
        radius: f64,
    },
    /// Print one day of a satellite's ground track
    Orbit {
        #[arg(short, long)]
        config: String,
        #[arg(short, long)]
        satellite: String,
        #[arg(long)]
        at: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Run { config } => run(&config),
        Commands::Passes {
            config,
            lat,
            lon,
            at,
            json,
        } => passes(&config, lat, lon, at.as_deref(), json),
        Commands::Aoi { lat, lon, radius } => {
            println!("{}", BoundingBox::around(GeoPoint::new(lat, lon), radius));
            ExitCode::SUCCESS
        }
        Commands::Orbit {
            config,
            satellite,
            at,
        } => orbit(&config, &satellite, at.as_deref()),
    }
}

fn load_config(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("Error loading config {}: {}", path, e);
            None
        }
    }
}

fn parse_time(at: Option<&str>) -> Option<DateTime<Utc>> {
    match at {
        None => Some(Utc::now()),
        Some(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                eprintln!("Invalid time {}: {}", s, e);
                None
            }
        },
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    println!("Configuration is valid");
    println!("  store:     {}", config.store.base_folder.display());
    println!("  catalogue: {}", config.catalogue.catalogue_url);
    println!("  work dir:  {}", config.pipeline.work_dir.display());
    println!(
        "  policy:    {}, {} workers",
        config.pipeline.policy, config.pipeline.workers
    );
    if config.credentials.username.is_empty() {
        println!("  warning: no catalogue username configured");
    }
    ExitCode::SUCCESS
}

fn run(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let settings = match config.pipeline_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let http = match CatalogueClient::http_client(config.catalogue.timeout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(FileStore::new(config.store.base_folder.clone()));
    let detector = Arc::new(CommandDetector::new(
        config.detector.command.clone(),
        config.detector.results_dir.clone(),
    ));
    let pipeline =
        PassPipeline::new(settings, store, detector).with_transcoder(config.transcoder.clone());
    let client = CatalogueClient::new(http.clone(), config.catalogue.catalogue_url.clone())
        .with_max_redirects(config.catalogue.max_redirects)
        .with_band_extension(config.catalogue.band_extension.clone());
    let authenticator = Arc::new(PasswordAuthenticator::new(
        http,
        config.catalogue.auth_url.clone(),
        config.catalogue.client_id.clone(),
        config.credentials.username.clone(),
        config.credentials.password.clone(),
    ));
    let runner = BatchRunner::new(pipeline, client, authenticator, config.pipeline.workers);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(runner.run());
    drop(runtime);

    match result {
        Ok(report) => {
            println!(
                "Run {} completed: {} vessels, {} passes recorded",
                report.run_id,
                report.vessels.len(),
                report.passes_created()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Run aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn passes(path: &str, lat: f64, lon: f64, at: Option<&str>, json: bool) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let Some(at) = parse_time(at) else {
        return ExitCode::FAILURE;
    };
    let settings = match config.matcher_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let tles = match FileStore::new(config.store.base_folder).tles() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error loading TLEs: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let candidates = closest_passes(GeoPoint::new(lat, lon), at, &tles, &settings);
    if json {
        return match serde_json::to_string_pretty(&candidates) {
            Ok(out) => {
                println!("{}", out);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing passes: {}", e);
                ExitCode::FAILURE
            }
        };
    }
    if candidates.is_empty() {
        println!("No passes found");
    }
    for (i, c) in candidates.iter().enumerate() {
        println!(
            "{:2}. {:<24} {}  {:9.4} {:10.4}  {:8.1} km",
            i + 1,
            c.satellite,
            c.timestamp.format("%Y-%m-%d %H:%M:%S"),
            c.point.latitude_deg,
            c.point.longitude_deg,
            c.distance_km
        );
    }
    ExitCode::SUCCESS
}

fn orbit(path: &str, satellite: &str, at: Option<&str>) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let Some(at) = parse_time(at) else {
        return ExitCode::FAILURE;
    };
    let tles = match FileStore::new(config.store.base_folder).tles() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error loading TLEs: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let wanted = satellite.to_lowercase();
    let Some(tle) = tles
        .iter()
        .find(|t| t.satellite.to_lowercase().contains(&wanted))
    else {
        eprintln!("No TLE for satellite {}", satellite);
        return ExitCode::FAILURE;
    };

    match orbit_track(tle, at) {
        Ok(points) => {
            println!("{} from {}", tle.satellite, at);
            for p in points {
                println!("  {:9.4} {:10.4}", p.latitude_deg, p.longitude_deg);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Propagation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
