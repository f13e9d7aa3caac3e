use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{warn, LevelFilter};
use tokio::runtime::Runtime;

use waypath::export_data::{self, ExportError};
use waypath::geocoder::NominatimGeocoder;
use waypath::logs;
use waypath::map_server::{MapError, MapServer};
use waypath::map_view::MapView;
use waypath::pipeline::TrackingPipeline;
use waypath::position::{Fix, FixRequest, PositionError};
use waypath::sources::{CsvReplaySource, PositionSource, SimulatedSource, Subscription};

// Bengaluru, the simulated walk has to start somewhere.
const SIMULATED_START: (f64, f64) = (12.9716, 77.5946);

#[derive(Parser)]
#[command(name = "waypath", version, about = "Personal location tracker")]
struct Cli {
    /// Host the local map server binds to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port for the local map server (0 picks a free one).
    #[arg(long, default_value_t = 0)]
    port: u16,
    /// Where position fixes come from.
    #[arg(long, value_enum, default_value = "simulated")]
    source: SourceKind,
    /// Fix log to replay with `--source replay`.
    #[arg(long)]
    replay_file: Option<PathBuf>,
    /// Interval between simulated/replayed fixes, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    /// Directory export files are written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Directory the rotating log files are written to.
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,
    /// Show debug logging on the terminal.
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Simulated,
    Replay,
}

enum CliSource {
    Simulated(SimulatedSource),
    Replay(CsvReplaySource),
}

impl PositionSource for CliSource {
    async fn current_position(&self, request: &FixRequest) -> Result<Fix, PositionError> {
        match self {
            CliSource::Simulated(source) => source.current_position(request).await,
            CliSource::Replay(source) => source.current_position(request).await,
        }
    }

    fn subscribe(&self, request: &FixRequest) -> Subscription {
        match self {
            CliSource::Simulated(source) => source.subscribe(request),
            CliSource::Replay(source) => source.subscribe(request),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let terminal_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    logs::init(&cli.log_dir, terminal_level)?;

    let runtime = Runtime::new()?;

    let interval = Duration::from_millis(cli.interval_ms);
    let source = Arc::new(match cli.source {
        SourceKind::Simulated => CliSource::Simulated(SimulatedSource::new(
            SIMULATED_START.0,
            SIMULATED_START.1,
            interval,
        )),
        SourceKind::Replay => {
            let path = cli
                .replay_file
                .as_deref()
                .context("--replay-file is required with --source replay")?;
            CliSource::Replay(CsvReplaySource::open(path, Some(interval))?)
        }
    });
    let geocoder = Arc::new(NominatimGeocoder::new()?);
    let map_view = Arc::new(Mutex::new(MapView::new()));
    // The pipeline spawns its driver task, so it needs the runtime context;
    // the guard must not outlive this block or later block_on calls panic.
    let pipeline = {
        let _guard = runtime.enter();
        Arc::new(TrackingPipeline::new(
            source.clone(),
            geocoder,
            map_view.clone(),
        ))
    };

    // The map view is unusable without the server, but the rest of the menu
    // still works, so a bind failure is not fatal.
    let map_server = match MapServer::create_and_start(&cli.host, cli.port, map_view) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("[waypath] map server failed to start: {e}");
            None
        }
    };

    {
        let pipeline = pipeline.clone();
        ctrlc::set_handler(move || {
            println!("\nShutting down...");
            pipeline.stop();
            std::process::exit(0);
        })?;
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print_menu();
        let Some(choice) = read_line(&mut lines) else {
            break;
        };
        match choice.as_str() {
            "1" => live_location(&runtime, &pipeline),
            "2" => export(&pipeline, &cli.out_dir),
            "3" => track_in_map(&runtime, &pipeline, map_server.as_ref(), &mut lines),
            "q" | "quit" | "exit" => break,
            "" => {}
            other => println!("Unknown option: {other}"),
        }
    }

    pipeline.stop();
    if let Some(mut server) = map_server {
        server.stop();
    }
    Ok(())
}

fn print_menu() {
    println!();
    println!("=== Location Tracker ===");
    println!("  1) Live Location    - show your current coordinates");
    println!("  2) Export to Excel  - write recorded data to a CSV file");
    println!("  3) Track in Map     - follow and record your position on a map");
    println!("  q) Quit");
    prompt("> ");
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = io::stdout().flush();
}

fn read_line(lines: &mut impl Iterator<Item = io::Result<String>>) -> Option<String> {
    lines.next()?.ok().map(|line| line.trim().to_lowercase())
}

fn live_location(runtime: &Runtime, pipeline: &TrackingPipeline<CliSource>) {
    match runtime.block_on(pipeline.read_once()) {
        Ok(fix) => {
            println!("Your Current Location:");
            println!("  Latitude:  {:.6}", fix.latitude);
            println!("  Longitude: {:.6}", fix.longitude);
            match fix.accuracy_m {
                Some(accuracy) => println!("  Accuracy:  {accuracy:.0} meters"),
                None => println!("  Accuracy:  unknown"),
            }
        }
        Err(e) => {
            println!("Unable to retrieve your location. Please allow location permission.");
            println!("Error: {e}");
        }
    }
}

fn export(pipeline: &TrackingPipeline<CliSource>, out_dir: &std::path::Path) {
    match export_data::export_records(&pipeline.records(), out_dir) {
        Ok(exported) => {
            println!("Export complete!");
            println!("  File: {}", exported.path.display());
            println!("  Total records: {}", exported.records);
        }
        Err(ExportError::NoRecords) => {
            println!("No tracking data available!");
            println!("Please:");
            println!("  1. Choose \"Track in Map\"");
            println!("  2. Start recording");
            println!("  3. Move around to record your location");
            println!("  4. Come back and export");
        }
        Err(e) => println!("Export failed: {e}"),
    }
}

fn track_in_map(
    runtime: &Runtime,
    pipeline: &TrackingPipeline<CliSource>,
    map_server: Option<&MapServer>,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) {
    let Some(server) = map_server else {
        println!("{}", MapError::NotReady);
        return;
    };

    // Permission check and first fix before the stream starts, so the map
    // opens centered on the user.
    match runtime.block_on(pipeline.read_once()) {
        Ok(fix) => {
            println!(
                "Starting at {:.6}, {:.6} - view the map at: {}",
                fix.latitude,
                fix.longitude,
                server.http_url()
            );
        }
        Err(e) => {
            println!("Location permission denied or error occurred: {e}");
            return;
        }
    }
    {
        // start() spawns the stream-forwarding task
        let _guard = runtime.enter();
        pipeline.start();
    }

    loop {
        println!();
        println!("[map] commands: record | stop | back");
        prompt("map> ");
        let Some(command) = read_line(lines) else {
            break;
        };
        match command.as_str() {
            "record" | "stop" => {
                if pipeline.toggle_recording() {
                    println!("Recording started! Your path will be tracked in orange.");
                } else {
                    println!("Recording stopped!");
                    println!("  Total points recorded: {}", pipeline.path_len());
                    println!("  Go back to the menu and choose \"Export to Excel\" to download your data.");
                }
            }
            "back" => break,
            "" => {}
            other => println!("Unknown command: {other}"),
        }
    }

    pipeline.stop();
}
