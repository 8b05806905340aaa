// Entry point and high-level flow.
//
// One invocation is one refresh cycle:
// - discover the monthly extracts in the input directory,
// - load and normalize them, merge, enrich with catalog names,
// - compute the dashboard tables and write every JSON artifact,
// - print a short console summary with previews of the key tables.
mod catalog;
mod enrich;
mod error;
mod loader;
mod output;
mod reports;
mod types;
mod util;

use chrono::Utc;
use clap::Parser;
use error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::LastUpdate;
use util::format_int;

/// Generate the dispensing-dashboard JSON tables from monthly CSV extracts.
#[derive(Debug, Parser)]
#[command(name = "recetas_report", version, about)]
struct Args {
    /// Directory containing the monthly extracts (*.csv)
    #[arg(long, default_value = "data/meses")]
    input_dir: PathBuf,

    /// Directory containing the catalog CSVs; omit to run with placeholders
    #[arg(long)]
    catalogos_dir: Option<PathBuf>,

    /// Directory the JSON artifacts are written to
    #[arg(long, default_value = "docs/data")]
    out_dir: PathBuf,

    /// Field delimiter of the monthly extracts
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// How many physicians to keep in top_medicos.json
    #[arg(long, default_value_t = 50)]
    top_medicos: usize,

    /// Cap for the medication filter list
    #[arg(long, default_value_t = 1000)]
    max_filtro_medicamentos: usize,
}

/// Collect the candidate source files. An unreadable input directory is the
/// same as an empty one: no input, which `load_all` escalates as fatal.
fn discover_sources(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    // Deterministic load order regardless of directory enumeration order.
    paths.sort();
    paths
}

fn run(args: &Args) -> Result<()> {
    let delimiter = u8::try_from(args.delimiter).unwrap_or_else(|_| {
        warn!("non-ASCII delimiter {:?}, falling back to ','", args.delimiter);
        b','
    });

    let sources = discover_sources(&args.input_dir);
    let (tables, load_report) = loader::load_all(&args.input_dir, &sources, delimiter)?;
    let merged = loader::merge_months(tables);

    let catalogs = match &args.catalogos_dir {
        Some(dir) => catalog::Catalogs::load(dir),
        None => catalog::Catalogs::empty(),
    };
    let enriched = enrich::enrich(merged, &catalogs);

    let now = Utc::now();
    let outputs = output::DashboardOutputs {
        resumen_mensual: reports::generate_monthly_summary(&enriched),
        top_medicamentos: reports::generate_top_medications(&enriched),
        top_farmacias: reports::generate_top_pharmacies(&enriched),
        top_medicos: reports::generate_top_physicians(&enriched, args.top_medicos),
        alertas: reports::generate_alerts(&enriched),
        metadata: reports::generate_metadata(&enriched, now),
        last_update: LastUpdate { last_updated: now },
        filtros: reports::generate_filters(&enriched, args.max_filtro_medicamentos),
    };
    output::write_all(&args.out_dir, &outputs)?;
    info!("run complete, artifacts in {}", args.out_dir.display());

    println!(
        "Processed {} rows from {} sources ({} skipped).",
        format_int(load_report.total_rows),
        format_int(load_report.sources_read),
        format_int(load_report.sources_skipped)
    );
    if load_report.coerced_cells > 0 || load_report.malformed_rows > 0 {
        println!(
            "Note: {} cells coerced to null, {} malformed rows dropped.",
            format_int(load_report.coerced_cells),
            format_int(load_report.malformed_rows)
        );
    }
    if load_report.undated_rows > 0 {
        println!(
            "Info: {} rows without a parseable need date (kept out of the monthly tables).",
            format_int(load_report.undated_rows)
        );
    }
    println!("\nMonthly summary:\n");
    output::preview_table_rows(&outputs.resumen_mensual, 3);
    println!("Top pharmacies:\n");
    output::preview_table_rows(&outputs.top_farmacias, 5);
    println!("Dashboard data written to {}", args.out_dir.display());
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("pipeline failed: {e}");
            ExitCode::FAILURE
        }
    }
}
