use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use revenue_calculator::projections::{default_base_year, project};
use revenue_calculator::{
    DataLoader, Market, ProjectedRevenue, RevenueAssumptions, RevenueCalculator, RevenueTable,
    StorageDuration,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "revenue_calculator")]
#[command(about = "Annual BESS revenue per MW from Lithuanian market data")]
struct Args {
    /// Directory holding `<dataset>/<dataset>_<year>.csv` partitions
    #[arg(short, long, env = "LT_BESS_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Years to calculate (defaults to every year found)
    #[arg(short, long, value_delimiter = ',')]
    years: Vec<i32>,

    /// JSON assumptions file overriding the built-in calibration
    #[arg(short, long)]
    assumptions: Option<PathBuf>,

    /// Base year for forward projections (defaults to the latest data year)
    #[arg(long)]
    base_year: Option<i32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let assumptions = match &args.assumptions {
        Some(path) => RevenueAssumptions::from_json_file(path)?,
        None => RevenueAssumptions::default(),
    };

    let loader = DataLoader::new(args.data_dir.clone());
    let years = (!args.years.is_empty()).then_some(args.years.as_slice());
    let (data, reports) = loader
        .load_market_data(years)
        .with_context(|| format!("Failed to load data from {}", args.data_dir.display()))?;

    for report in &reports {
        info!(
            "{}: {} rows from {} files, {} malformed, {} duplicates",
            report.dataset, report.rows, report.files, report.malformed_rows, report.duplicate_rows
        );
    }

    let years = if args.years.is_empty() {
        data.years()
    } else {
        args.years.clone()
    };
    if years.is_empty() {
        anyhow::bail!("No market data found under {}", args.data_dir.display());
    }

    let calculator = RevenueCalculator::new(assumptions);
    let table = calculator.calculate_all(&data, &years);
    let projected = match args.base_year.or_else(|| default_base_year(&table)) {
        Some(base) => project(&calculator, &table, base),
        None => Vec::new(),
    };

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "revenues": table,
                "projections": projected,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Csv => print_csv(&table, &projected)?,
        OutputFormat::Summary => print_summary(&calculator, &table, &projected),
    }

    Ok(())
}

fn print_csv(table: &RevenueTable, projected: &[ProjectedRevenue]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    let mut header = vec!["year".to_string(), "duration".to_string(), "kind".to_string()];
    header.extend(Market::ALL.iter().map(|m| m.label().to_string()));
    header.push("Blended".to_string());
    writer.write_record(&header)?;

    let rows = table
        .rows
        .iter()
        .map(|r| (r.year, r.duration, "historical", &r.markets, r.blended))
        .chain(
            projected
                .iter()
                .map(|p| (p.year, p.duration, "projected", &p.markets, p.blended)),
        );
    for (year, duration, kind, markets, blended) in rows {
        let mut record = vec![year.to_string(), duration.label().to_string(), kind.to_string()];
        record.extend(Market::ALL.iter().map(|m| format!("{:.2}", markets.get(*m))));
        record.push(format!("{blended:.2}"));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn print_summary(calculator: &RevenueCalculator, table: &RevenueTable, projected: &[ProjectedRevenue]) {
    let assumptions = calculator.assumptions();
    println!("BESS Revenue Summary (EUR/MW/yr)");
    println!("================================");
    println!(
        "Round-trip efficiency: {:.0}%, capture rate: {:.0}%",
        assumptions.round_trip_efficiency * 100.0,
        assumptions.capture_rate * 100.0
    );
    println!();

    print!("{:<6} {:<9}", "Year", "Duration");
    for market in Market::ALL {
        print!(" {:>12}", market.label());
    }
    println!(" {:>12}  Best single", "Blended");

    for row in &table.rows {
        print!("{:<6} {:<9}", row.year, row.duration.label());
        for market in Market::ALL {
            print!(" {:>12.0}", row.revenue(market));
        }
        let (best, best_value) = calculator.best_single_market(row);
        println!(" {:>12.0}  {} ({:.0})", row.blended, best.label(), best_value);
        for gap in &row.gaps {
            println!("{:>17} {}", "⚠️", gap);
        }
    }

    if projected.is_empty() {
        return;
    }

    println!();
    println!("Projections");
    println!("-----------");
    for duration in StorageDuration::ALL {
        let line: Vec<String> = projected
            .iter()
            .filter(|p| p.duration == duration)
            .map(|p| format!("{}: {:.0}", p.year, p.blended))
            .collect();
        println!("  {:<9} {}", duration.label(), line.join("  "));
    }
}
