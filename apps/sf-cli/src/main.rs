use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::DateTime;
use sf_app::{AppError, AppResult, LoaderConfig, ResultSet, open_surface, surface_series};
use sf_core::{LoadMetrics, ManualId, MetricsSnapshot};
use sf_graph::{BuildType, CapacityKind, EntityFamily};
use sf_results::Quantity;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(about = "SewerFlow CLI - Inspect sewer simulation result stores", long_about = None)]
struct Cli {
    /// Loader configuration (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Print load counters after the command
    #[arg(long, global = true)]
    metrics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Family {
    Pipe,
    Manhole,
}

impl From<Family> for EntityFamily {
    fn from(f: Family) -> Self {
        match f {
            Family::Pipe => EntityFamily::Edges,
            Family::Manhole => EntityFamily::Nodes,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a result store's network and time axis
    Info {
        /// Path to the result store
        store: PathBuf,
    },
    /// Print one entity's timeline as CSV
    Series {
        /// Path to the result store
        store: PathBuf,
        /// Edge (pipe) or node (manhole) family
        #[arg(value_enum)]
        family: Family,
        /// Manual id of the edge or node
        id: i64,
        /// velocity, discharge, waterlevel, spill, massflux:N or concentration:N
        #[arg(short, long)]
        quantity: Option<Quantity>,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a node's stored inflow hydrograph as CSV
    Hydrograph {
        /// Path to the result store
        store: PathBuf,
        /// Manual id of the node
        node: i64,
    },
    /// Print one triangle's 2D surface series
    Surface {
        /// Path to the geodata file
        geodata: PathBuf,
        /// Triangle id to look up
        triangle: i64,
        /// Highest triangle id stored in the table
        #[arg(long)]
        max_id: i64,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LoaderConfig::load(path)?,
        None => LoaderConfig::default(),
    };
    debug!(?config, "loader configuration");
    let metrics = Arc::new(LoadMetrics::new());
    let started = Instant::now();

    match cli.command {
        Commands::Info { store } => cmd_info(&store, &config, metrics.clone())?,
        Commands::Series {
            store,
            family,
            id,
            quantity,
            output,
        } => {
            let family: EntityFamily = family.into();
            let quantity = quantity.unwrap_or(match family {
                EntityFamily::Edges => Quantity::Discharge,
                EntityFamily::Nodes => Quantity::WaterLevel,
            });
            cmd_series(
                &store,
                &config,
                metrics.clone(),
                family,
                ManualId(id),
                quantity,
                output.as_deref(),
            )?
        }
        Commands::Hydrograph { store, node } => {
            cmd_hydrograph(&store, &config, metrics.clone(), ManualId(node))?
        }
        Commands::Surface {
            geodata,
            triangle,
            max_id,
        } => cmd_surface(&geodata, &config, metrics.clone(), triangle, max_id)?,
    }

    if cli.metrics {
        print_metrics(&metrics.snapshot(), started.elapsed().as_secs_f64());
    }
    Ok(())
}

fn cmd_info(store: &Path, config: &LoaderConfig, metrics: Arc<LoadMetrics>) -> AppResult<()> {
    let set = ResultSet::open(store, config, metrics)?;

    println!("Store: {} ({:?} schema)", store.display(), set.variant());
    println!("Nodes:");
    for kind in [
        CapacityKind::Manhole,
        CapacityKind::StorageNode,
        CapacityKind::InfiltrationNode,
        CapacityKind::Outlet,
    ] {
        println!("  {:?}: {}", kind, set.entities_by_kind(kind).len());
    }
    println!("Edges:");
    for build_type in BuildType::ALL {
        println!("  {:?}: {}", build_type, set.edges_by_type(build_type).len());
    }
    println!("Profiles: {}", set.network().profiles().len());

    let axis = set.time_axis(EntityFamily::Edges);
    match axis.span() {
        Some((first, last)) => println!(
            "Time steps: {} ({} .. {})",
            axis.len(),
            format_time(first),
            format_time(last)
        ),
        None => println!("Time steps: 0"),
    }

    let report = set.report();
    if !report.missing_tables.is_empty() {
        println!("Missing tables: {}", report.missing_tables.join(", "));
    }
    if !report.skipped.is_empty() {
        println!("Skipped entities:");
        for s in &report.skipped {
            println!("  {:?} {}: {}", s.family, s.manual_id, s.reason);
        }
    }
    set.close()
}

fn cmd_series(
    store: &Path,
    config: &LoaderConfig,
    metrics: Arc<LoadMetrics>,
    family: EntityFamily,
    id: ManualId,
    quantity: Quantity,
    output: Option<&Path>,
) -> AppResult<()> {
    let set = ResultSet::open(store, &config.on_demand(), metrics)?;
    let values = set.timeline_for(family, id, quantity)?;
    let axis = set.time_axis(family);

    let mut csv = format!("time_ms,{quantity}\n");
    for (t, v) in axis.as_slice().iter().zip(&values) {
        csv.push_str(&format!("{t},{v}\n"));
    }
    write_output(&csv, output)?;
    set.close()
}

fn cmd_hydrograph(
    store: &Path,
    config: &LoaderConfig,
    metrics: Arc<LoadMetrics>,
    node: ManualId,
) -> AppResult<()> {
    let set = ResultSet::open(store, &config.on_demand(), metrics)?;
    match set.hydrograph(node)? {
        Some(series) => {
            println!("time,inflow");
            for tv in series {
                println!("{},{}", format_time(tv.timestamp_ms), tv.value);
            }
        }
        None => println!("Node {node} has no hydrograph"),
    }
    set.close()
}

fn cmd_surface(
    geodata: &Path,
    config: &LoaderConfig,
    metrics: Arc<LoadMetrics>,
    triangle: i64,
    max_id: i64,
) -> AppResult<()> {
    let store = open_surface(geodata, config, max_id, metrics)?;
    let series = surface_series(&store, triangle)?;
    if !series.found {
        eprintln!("Triangle {triangle} not found, reporting zeros");
    }
    println!("column,value");
    for (column, value) in config.surface.value_columns.iter().zip(&series.values) {
        println!("{column},{value}");
    }
    store.close()?;
    Ok(())
}

fn format_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn write_output(content: &str, output: Option<&Path>) -> AppResult<()> {
    let result = match output {
        Some(path) => std::fs::write(path, content),
        None => io::stdout().write_all(content.as_bytes()),
    };
    result.map_err(|e| AppError::InvalidInput(format!("Failed to write output: {e}")))
}

fn print_metrics(m: &MetricsSnapshot, wall_s: f64) {
    println!("\nLoad summary:");
    println!("  Queries:          {}", m.queries);
    println!("  Rows scanned:     {}", m.rows_scanned);
    println!("  Rows skipped:     {}", m.rows_skipped);
    println!("  Entities skipped: {}", m.entities_skipped);
    println!("  Handles created:  {}", m.handles_created);
    if m.search_probes > 0 {
        println!("  Search probes:    {}", m.search_probes);
    }
    println!("  Query time:       {:.3}s", m.query_time_s);
    println!("  Total:            {:.3}s", wall_s);
}
