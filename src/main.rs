//! Sideheat CLI - build position heatmaps from match recordings
//!
//! Usage:
//!   sideheat combined match.json --side CT --rounds 1,2,3
//!   sideheat rounds match.json --grid-size 64 --time-window 0,30
//!   sideheat aggregate match.json --round-heatmaps round_heatmaps_de_mirage.json
//!   sideheat pipeline match.json --output-dir out
//!   sideheat batch a.json b.json c.json --threads 4 --output-dir out
//!   sideheat store save match.json
//!   sideheat store list
//!   sideheat rounds --demo-id <id>
//!
//! Logging goes to stderr (`RUST_LOG=debug` for per-round detail); summaries
//! go to stdout.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use sideheat::analytics::TeamSideHeatmaps;
use sideheat::batch::run_batch;
use sideheat::heatmap::DensityGrid;
use sideheat::pipeline::{run_aggregate, run_combined, run_full, run_rounds};
use sideheat::{
    DEFAULT_STORE_DIR, HeatmapConfig, JsonDirStore, MatchMetadata, MatchSource, MatchStore,
    PipelineSettings, PositionSelector, RoundHeatmapDocument, RoundSelection, Side, SideFilter,
    TEAM_SIDE_OUTPUT_FILE, TimeWindow, write_document,
};
use sideheat::match_data::match_from_value;

#[derive(Parser)]
#[command(name = "sideheat")]
#[command(about = "Positional heatmaps per round, side and team", long_about = None)]
struct Cli {
    /// TOML config file (default: config/sideheat.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Whole-match heatmap per side
    Combined {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        grid: GridArgs,
        /// Side to build: both, CT or T
        #[arg(long, default_value = "both", value_parser = parse_side)]
        side: SideFilter,
    },

    /// CT and T heatmaps for every round
    Rounds {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        grid: GridArgs,
    },

    /// Aggregate a per-round document by team and side
    Aggregate {
        #[command(flatten)]
        input: InputArgs,
        /// Per-round heatmap document from the `rounds` stage
        #[arg(long)]
        round_heatmaps: PathBuf,
        /// Output file
        #[arg(short, long, default_value = TEAM_SIDE_OUTPUT_FILE)]
        output: PathBuf,
        #[command(flatten)]
        teams: TeamArgs,
    },

    /// Per-round heatmaps and team+side aggregation in one run
    Pipeline {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        teams: TeamArgs,
    },

    /// Run the full pipeline for many match files in parallel
    Batch {
        /// Match files; each writes into <output-dir>/<file stem>/
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        teams: TeamArgs,
        /// Worker threads (0 = one per core)
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Manage saved matches
    Store {
        /// Store directory
        #[arg(long, default_value = DEFAULT_STORE_DIR)]
        store_dir: PathBuf,
        #[command(subcommand)]
        command: StoreCommands,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Save a match file, printing its new id
    Save {
        file: PathBuf,
        /// Name recorded in metadata (default: file name)
        #[arg(long)]
        demo_name: Option<String>,
    },
    /// List saved matches, newest first
    List,
    /// Print or export a saved match
    Get {
        demo_id: String,
        /// Write the `{demo_id, metadata, data}` document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a saved match
    Delete { demo_id: String },
}

#[derive(Args)]
struct InputArgs {
    /// Match JSON file
    #[arg(required_unless_present = "demo_id")]
    match_file: Option<PathBuf>,
    /// Read the match from the store instead of a file
    #[arg(long, conflicts_with = "match_file")]
    demo_id: Option<String>,
    /// Store directory used with --demo-id
    #[arg(long, default_value = DEFAULT_STORE_DIR)]
    store_dir: PathBuf,
}

impl InputArgs {
    fn source(&self) -> Result<MatchSource> {
        match (&self.demo_id, &self.match_file) {
            (Some(demo_id), _) => Ok(MatchSource::Stored {
                store_dir: self.store_dir.clone(),
                demo_id: demo_id.clone(),
            }),
            (None, Some(path)) => Ok(MatchSource::File(path.clone())),
            (None, None) => bail!("either a match file or --demo-id is required"),
        }
    }
}

#[derive(Args)]
struct GridArgs {
    /// Bins per axis (default from config, 50)
    #[arg(long)]
    grid_size: Option<usize>,
    /// Keep samples of dead players
    #[arg(long)]
    include_dead: bool,
    /// Seconds after freeze time ends, e.g. 0,30
    #[arg(long, value_parser = parse_time_window)]
    time_window: Option<TimeWindow>,
    /// "all" or a comma-separated round list
    #[arg(long, default_value = "all", value_parser = parse_rounds)]
    rounds: RoundSelection,
    /// Directory for output documents
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Args)]
struct TeamArgs {
    /// Override the first team name
    #[arg(long)]
    team_a: Option<String>,
    /// Override the second team name
    #[arg(long)]
    team_b: Option<String>,
    /// Side-resolution window in raw ticks (default from config, 100)
    #[arg(long)]
    resolution_window: Option<i64>,
}

fn parse_side(s: &str) -> std::result::Result<SideFilter, String> {
    SideFilter::parse(s).map_err(|e| e.to_string())
}

fn parse_time_window(s: &str) -> std::result::Result<TimeWindow, String> {
    TimeWindow::parse(s).map_err(|e| e.to_string())
}

fn parse_rounds(s: &str) -> std::result::Result<RoundSelection, String> {
    RoundSelection::parse(s).map_err(|e| e.to_string())
}

fn settings_from(
    config: &HeatmapConfig,
    grid: &GridArgs,
    teams: Option<&TeamArgs>,
) -> PipelineSettings {
    let mut settings = PipelineSettings::from_config(config);
    if let Some(size) = grid.grid_size {
        settings.grid.grid_size = size;
    }
    if grid.include_dead {
        settings.grid.alive_only = false;
    }
    settings.grid.time_window = grid.time_window;
    settings.rounds = grid.rounds.clone();

    if let Some(teams) = teams {
        settings.team_a = teams.team_a.clone();
        settings.team_b = teams.team_b.clone();
        if let Some(window) = teams.resolution_window {
            settings.resolution_window_ticks = window;
        }
    }
    settings
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = HeatmapConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    let registry = config.map_registry()?;

    match cli.command {
        Commands::Combined { input, grid, side } => {
            let record = load_source(&input)?;
            let settings = settings_from(&config, &grid, None);
            let selector = PositionSelector::default()
                .with_rounds(settings.rounds.clone())
                .with_side(side)
                .with_alive_only(settings.grid.alive_only)
                .with_time_window(settings.grid.time_window);

            let (grids, path) = run_combined(
                &record,
                &registry,
                &selector,
                settings.grid.grid_size,
                &grid.output_dir,
            )?;

            println!("\nCombined heatmap ({})", side.label());
            for (grid_side, side_grid) in [(Side::Ct, &grids.ct), (Side::T, &grids.t)] {
                if let Some(side_grid) = side_grid {
                    print_grid_line(grid_side.label(), side_grid);
                }
            }
            println!("Saved: {}", path.display());
        }

        Commands::Rounds { input, grid } => {
            let record = load_source(&input)?;
            let settings = settings_from(&config, &grid, None);
            let (stage, path) = run_rounds(&record, &registry, &settings, &grid.output_dir)?;

            println!("\nPer-round heatmaps: {} rounds on {}", stage.grids.len(), stage.map.name);
            for (round, grids) in &stage.grids {
                println!(
                    "  Round {:>2}: CT {:>6} samples, T {:>6} samples",
                    round, grids.ct.sample_count, grids.t.sample_count
                );
            }
            println!("Saved: {}", path.display());
        }

        Commands::Aggregate {
            input,
            round_heatmaps,
            output,
            teams,
        } => {
            let record = load_source(&input)?;
            let document = RoundHeatmapDocument::load(&round_heatmaps).with_context(|| {
                format!("failed to read per-round heatmaps {}", round_heatmaps.display())
            })?;

            let mut settings = PipelineSettings::from_config(&config);
            settings.team_a = teams.team_a;
            settings.team_b = teams.team_b;
            if let Some(window) = teams.resolution_window {
                settings.resolution_window_ticks = window;
            }

            let heatmaps = run_aggregate(&record, &document, &settings, &output)?;
            print_team_side_summary(&heatmaps);
            println!("Saved: {}", output.display());
        }

        Commands::Pipeline { input, grid, teams } => {
            let record = load_source(&input)?;
            let settings = settings_from(&config, &grid, Some(&teams));
            let report = run_full(
                &record,
                &registry,
                &settings,
                &grid.output_dir,
                TEAM_SIDE_OUTPUT_FILE,
            )?;

            println!("\nProcessed {} rounds on {}", report.round_count, report.map.name);
            print_team_side_summary(&report.heatmaps);
            println!("Saved: {}", report.rounds_path.display());
            println!("Saved: {}", report.team_side_path.display());
        }

        Commands::Batch {
            files,
            grid,
            teams,
            threads,
        } => {
            let settings = settings_from(&config, &grid, Some(&teams));
            let sources: Vec<MatchSource> = files.into_iter().map(MatchSource::File).collect();
            let report = run_batch(
                &sources,
                &registry,
                &settings,
                &grid.output_dir,
                TEAM_SIDE_OUTPUT_FILE,
                threads,
            )?;

            println!("\n========================================");
            println!(
                "  BATCH: {} ok, {} failed",
                report.succeeded(),
                report.items.len() - report.succeeded()
            );
            println!("========================================");
            for item in &report.items {
                match &item.result {
                    Ok(r) => println!(
                        "  [OK]   {} -> {} ({} rounds)",
                        item.source.label(),
                        item.output_dir.display(),
                        r.round_count
                    ),
                    Err(e) => println!("  [FAIL] {}: {}", item.source.label(), e),
                }
            }

            if report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Store { store_dir, command } => run_store(&store_dir, command)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn load_source(input: &InputArgs) -> Result<sideheat::MatchRecord> {
    let source = input.source()?;
    source
        .load()
        .with_context(|| format!("failed to load match '{}'", source.label()))
}

fn run_store(store_dir: &Path, command: StoreCommands) -> Result<()> {
    let store = JsonDirStore::open(store_dir)
        .with_context(|| format!("failed to open store {}", store_dir.display()))?;

    match command {
        StoreCommands::Save { file, demo_name } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let data: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let record = match_from_value(data.clone())
                .with_context(|| format!("{} is not a match record", file.display()))?;

            let name = demo_name.or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            });
            let metadata = MatchMetadata::from_record(&record, name.as_deref());
            let demo_id = store.save(&metadata, &data)?;
            println!("{}", demo_id);
        }

        StoreCommands::List => {
            let matches = store.list()?;
            println!("{} saved matches", matches.len());
            for m in &matches {
                let teams = match (&m.metadata.team_ct, &m.metadata.team_t) {
                    (Some(ct), Some(t)) => format!("{} (CT) vs {} (T)", ct, t),
                    _ => "-".to_string(),
                };
                println!(
                    "  {}  {:<12} {}  {}  {:.1} MB  {}",
                    m.demo_id,
                    m.metadata.map_name,
                    m.metadata.date,
                    teams,
                    m.file_size as f64 / (1024.0 * 1024.0),
                    m.metadata.demo_name.as_deref().unwrap_or("")
                );
            }
        }

        StoreCommands::Get { demo_id, output } => {
            let stored = store.get(&demo_id)?;
            match output {
                Some(path) => {
                    write_document(&path, &stored)?;
                    println!("Saved: {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&stored)?),
            }
        }

        StoreCommands::Delete { demo_id } => {
            store.delete(&demo_id)?;
            println!("Deleted {}", demo_id);
        }
    }

    Ok(())
}

fn print_grid_line(label: &str, grid: &DensityGrid) {
    let hot = grid.values().iter().filter(|v| **v > 0.0).count();
    println!(
        "  {:<3} {:>7} samples, {:>5} of {} cells occupied",
        label,
        grid.sample_count,
        hot,
        grid.values().len()
    );
}

fn print_team_side_summary(heatmaps: &TeamSideHeatmaps) {
    println!(
        "\nTeams: {} vs {}",
        heatmaps.teams.team_a, heatmaps.teams.team_b
    );
    println!("{:<32} {:>7} {:>9}", "Bucket", "Rounds", "Samples");
    println!("{}", "-".repeat(50));
    for (key, bucket) in &heatmaps.buckets {
        println!("{:<32} {:>7} {:>9}", key, bucket.num_rounds(), bucket.samples);
    }
    if !heatmaps.skipped_rounds.is_empty() {
        println!("Skipped rounds: {:?}", heatmaps.skipped_rounds);
    }
}
