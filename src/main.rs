use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use log::info;
use revenue_calculator::projections::{default_base_year, project};
use revenue_calculator::{
    CapacityTables, DataLoader, Market, RevenueAssumptions, RevenueCalculator, StorageDuration,
};
use std::path::PathBuf;

mod bess_visualization;
mod config;
mod data_quality;
mod dataset_catalog;
mod entsoe_document;
mod entsoe_fetcher;
mod html_report;
mod market_statistics;
mod report;
mod workbook_report;

use config::OutputPaths;
use dataset_catalog::Area;
use entsoe_fetcher::{print_fetch_summary, EntsoeClient, FetchSettings, Fetcher};
use report::{write_reports, ReportContext};

#[derive(Parser)]
#[command(name = "lt_bess_pipeline")]
#[command(about = "Lithuanian BESS revenue pipeline: ENTSO-E fetch, revenue model, reports")]
struct Cli {
    /// Directory holding `<dataset>/<dataset>_<year>.csv` partitions
    #[arg(long, global = true, env = "LT_BESS_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Directory for the workbook, HTML report, charts and statistics
    #[arg(long, global = true, env = "LT_BESS_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// JSON assumptions file overriding the built-in calibration
    #[arg(long, global = true)]
    assumptions: Option<PathBuf>,

    /// Installed capacity CSV replacing the shipped table
    #[arg(long, global = true)]
    installed_capacity: Option<PathBuf>,

    /// Capacity pipeline CSV replacing the shipped table
    #[arg(long, global = true)]
    capacity_pipeline: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download datasets from the ENTSO-E Transparency Platform
    Fetch(FetchArgs),
    /// Check the downloaded CSVs for gaps, duplicates and malformed rows
    Verify,
    /// Print the revenue grid and projections
    Revenue(ModelArgs),
    /// Write the workbook, HTML report, charts and statistics
    Report(ModelArgs),
    /// Fetch, verify and report in one run
    All {
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Clone)]
struct FetchArgs {
    #[arg(long, env = config::API_KEY_VAR, hide_env_values = true)]
    api_key: Option<String>,

    /// First day to fetch
    #[arg(long, default_value = "2021-01-01")]
    start: NaiveDate,

    /// Day after the last day to fetch (defaults to today)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Datasets to fetch (defaults to the whole catalogue)
    #[arg(long, value_delimiter = ',')]
    datasets: Vec<String>,
}

#[derive(Args, Clone)]
struct ModelArgs {
    /// Years to calculate (defaults to every year found)
    #[arg(long, value_delimiter = ',')]
    years: Vec<i32>,

    /// Base year for projections (defaults to the latest data year)
    #[arg(long)]
    base_year: Option<i32>,
}

impl ModelArgs {
    fn years(&self) -> Option<&[i32]> {
        (!self.years.is_empty()).then_some(self.years.as_slice())
    }
}

fn load_assumptions(cli: &Cli) -> Result<RevenueAssumptions> {
    match &cli.assumptions {
        Some(path) => Ok(RevenueAssumptions::from_json_file(path)?),
        None => Ok(RevenueAssumptions::default()),
    }
}

fn run_fetch(cli: &Cli, args: &FetchArgs) -> Result<()> {
    let api_key = args
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .with_context(|| format!("{} is not set (environment, .env or --api-key)", config::API_KEY_VAR))?;
    let end = args.end.unwrap_or_else(|| Utc::now().date_naive());
    if end <= args.start {
        anyhow::bail!("--end {} must be after --start {}", end, args.start);
    }

    let (specs, unknown) = dataset_catalog::select(Area::Lithuania, &args.datasets);
    if !unknown.is_empty() {
        anyhow::bail!("Unknown datasets: {}", unknown.join(", "));
    }

    println!("🚀 ENTSO-E Fetch: {} datasets, {} .. {}", specs.len(), args.start, end);
    println!("{}", "=".repeat(60));

    let fetcher = Fetcher::new(EntsoeClient::new()?, api_key, FetchSettings::default());
    let outcomes = fetcher.fetch_all(&specs, args.start, end, &cli.data_dir)?;
    print_fetch_summary(&outcomes);
    Ok(())
}

fn run_revenue(cli: &Cli, args: &ModelArgs) -> Result<()> {
    let loader = DataLoader::new(cli.data_dir.clone());
    let (data, reports) = loader
        .load_market_data(args.years())
        .with_context(|| format!("Failed to load data from {}", cli.data_dir.display()))?;
    for report in &reports {
        info!(
            "{}: {} rows, {} malformed, {} duplicates",
            report.dataset, report.rows, report.malformed_rows, report.duplicate_rows
        );
    }

    let years = args.years().map(<[i32]>::to_vec).unwrap_or_else(|| data.years());
    if years.is_empty() {
        anyhow::bail!("No market data found under {}", cli.data_dir.display());
    }

    let calculator = RevenueCalculator::new(load_assumptions(cli)?);
    let table = calculator.calculate_all(&data, &years);

    println!("\n💰 BESS Revenue (EUR/MW/yr)");
    println!("{}", "=".repeat(100));
    print!("{:<6} {:<9}", "Year", "Duration");
    for market in Market::ALL {
        print!(" {:>12}", market.label());
    }
    println!(" {:>12}", "Blended");
    for row in &table.rows {
        print!("{:<6} {:<9}", row.year, row.duration.label());
        for market in Market::ALL {
            print!(" {:>12.0}", row.revenue(market));
        }
        println!(" {:>12.0}", row.blended);
        for gap in &row.gaps {
            println!("{:>17} {}", "⚠️", gap);
        }
    }

    if let Some(base) = args.base_year.or_else(|| default_base_year(&table)) {
        let projected = project(&calculator, &table, base);
        println!("\n📈 Projections from {base}");
        for duration in StorageDuration::ALL {
            let line: Vec<String> = projected
                .iter()
                .filter(|p| p.duration == duration)
                .map(|p| format!("{}: {:.0}", p.year, p.blended))
                .collect();
            println!("  {:<9} {}", duration.label(), line.join("  "));
        }
    }
    Ok(())
}

fn run_report(cli: &Cli, args: &ModelArgs) -> Result<()> {
    let loader = DataLoader::new(cli.data_dir.clone());
    let capacity = CapacityTables::load(cli.installed_capacity.as_deref(), cli.capacity_pipeline.as_deref())?;
    let ctx = ReportContext::build(&loader, args.years(), load_assumptions(cli)?, capacity, args.base_year)?;

    let malformed: usize = ctx.load_reports.iter().map(|r| r.malformed_rows).sum();
    if malformed > 0 {
        println!("⚠️  Skipped {malformed} malformed CSV rows (see ENTSO-E Raw Data sheet)");
    }

    let artifacts = write_reports(&ctx, &OutputPaths::new(&cli.output_dir))?;
    println!("\n✅ Reports written");
    println!("  Workbook:   {}", artifacts.workbook.display());
    println!("  HTML:       {}", artifacts.html.display());
    println!("  Summary:    {}", artifacts.summary.display());
    println!("  Charts:     {} files", artifacts.charts.len());
    println!("  Statistics: {} files", artifacts.statistics.len());
    Ok(())
}

fn main() -> Result<()> {
    config::load_dotenv();
    env_logger::init();
    let cli = Cli::parse();

    println!("🚀 Lithuania BESS Pipeline");
    println!("Rayon thread pool configured with {} threads", rayon::current_num_threads());
    println!("{}", "=".repeat(60));

    match &cli.command {
        Command::Fetch(args) => run_fetch(&cli, args)?,
        Command::Verify => {
            data_quality::verify_data_quality(&cli.data_dir)?;
        }
        Command::Revenue(args) => run_revenue(&cli, args)?,
        Command::Report(args) => run_report(&cli, args)?,
        Command::All { fetch, model } => {
            run_fetch(&cli, fetch)?;
            data_quality::verify_data_quality(&cli.data_dir)?;
            run_report(&cli, model)?;
        }
    }

    Ok(())
}
