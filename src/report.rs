use crate::bess_visualization::{render_charts, save_charts};
use crate::config::OutputPaths;
use crate::html_report::write_html_report;
use crate::market_statistics::{GridData, MarketStatistics};
use crate::workbook_report::write_workbook;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use revenue_calculator::capacity::DEFAULT_PEAK_LOAD_MW;
use revenue_calculator::projections::{default_base_year, project};
use revenue_calculator::{
    CapacityTables, DataLoader, LoadReport, MarketData, ProcurementVolumes, ProjectedRevenue,
    RevenueAssumptions, RevenueCalculator, RevenueTable, SaturationRow,
};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Everything the workbook and the HTML report render.
#[derive(Debug)]
pub struct ReportContext {
    pub generated_at: DateTime<Utc>,
    pub assumptions: RevenueAssumptions,
    pub revenues: RevenueTable,
    pub projected: Vec<ProjectedRevenue>,
    pub base_year: Option<i32>,
    pub capacity: CapacityTables,
    pub volumes: Option<ProcurementVolumes>,
    pub peak_load_mw: f64,
    pub saturation: Vec<SaturationRow>,
    pub statistics: MarketStatistics,
    pub load_reports: Vec<LoadReport>,
}

impl ReportContext {
    /// Load every dataset, run the revenue model and derive the report
    /// tables.
    pub fn build(
        loader: &DataLoader,
        years: Option<&[i32]>,
        assumptions: RevenueAssumptions,
        capacity: CapacityTables,
        base_year: Option<i32>,
    ) -> Result<Self> {
        let (market, mut load_reports) = loader
            .load_market_data(years)
            .with_context(|| format!("Failed to load market data from {}", loader.data_dir().display()))?;
        let (grid, grid_reports) = GridData::load(loader, years)?;
        load_reports.extend(grid_reports);

        let calculator = RevenueCalculator::new(assumptions);
        let years = match years {
            Some(ys) => ys.to_vec(),
            None => market.years(),
        };
        let revenues = calculator.calculate_all(&market, &years);
        let base_year = base_year.or_else(|| default_base_year(&revenues));
        let projected = match base_year {
            Some(base) => project(&calculator, &revenues, base),
            None => {
                warn!("No revenue data to project from");
                Vec::new()
            }
        };

        let statistics = MarketStatistics::compute(&market, &grid)?;
        let peak_load_mw = statistics
            .load_annual
            .column("Max (MW)")
            .into_iter()
            .flatten()
            .last()
            .unwrap_or(DEFAULT_PEAK_LOAD_MW);

        let assumptions = calculator.assumptions().clone();
        let volumes = reference_volumes(&market, assumptions.fcr_requirement_mw);
        let saturation = capacity.saturation(
            &volumes.unwrap_or(ProcurementVolumes {
                fcr_mw: assumptions.fcr_requirement_mw,
                ..Default::default()
            }),
            peak_load_mw,
        );

        Ok(Self {
            generated_at: Utc::now(),
            assumptions,
            revenues,
            projected,
            base_year,
            capacity,
            volumes,
            peak_load_mw,
            saturation,
            statistics,
            load_reports,
        })
    }
}

/// Procured volumes of the latest year with aFRR data.
fn reference_volumes(market: &MarketData, fcr_mw: f64) -> Option<ProcurementVolumes> {
    let year = market.afrr.as_ref()?.years().into_iter().max()?;
    Some(ProcurementVolumes::from_market_data(market, year, fcr_mw))
}

/// Machine-readable copy of the revenue tables.
#[derive(Serialize)]
struct RevenueSummary<'a> {
    generated_at: DateTime<Utc>,
    base_year: Option<i32>,
    historical: &'a RevenueTable,
    projected: &'a [ProjectedRevenue],
    saturation: &'a [SaturationRow],
}

fn write_summary(ctx: &ReportContext, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let summary = RevenueSummary {
        generated_at: ctx.generated_at,
        base_year: ctx.base_year,
        historical: &ctx.revenues,
        projected: &ctx.projected,
        saturation: &ctx.saturation,
    };
    serde_json::to_writer_pretty(BufWriter::new(file), &summary)?;
    Ok(())
}

#[derive(Debug)]
pub struct ReportArtifacts {
    pub workbook: PathBuf,
    pub html: PathBuf,
    pub summary: PathBuf,
    pub charts: Vec<PathBuf>,
    pub statistics: Vec<PathBuf>,
}

pub fn write_reports(ctx: &ReportContext, paths: &OutputPaths) -> Result<ReportArtifacts> {
    fs::create_dir_all(&paths.root)
        .with_context(|| format!("Failed to create {}", paths.root.display()))?;

    let charts = render_charts(&ctx.statistics, &ctx.revenues, &ctx.projected, &ctx.saturation)?;
    let chart_paths = save_charts(&charts, &paths.charts_dir)?;
    let statistics = ctx.statistics.save_csv(&paths.statistics_dir())?;

    write_workbook(ctx, &paths.workbook)?;
    info!("Wrote {}", paths.workbook.display());
    write_html_report(ctx, &charts, &paths.html)?;
    info!("Wrote {}", paths.html.display());
    write_summary(ctx, &paths.summary)?;

    Ok(ReportArtifacts {
        workbook: paths.workbook.clone(),
        html: paths.html.clone(),
        summary: paths.summary.clone(),
        charts: chart_paths,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use revenue_calculator::data_loader::write_partitioned;
    use revenue_calculator::{SeriesTable, StorageDuration};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn seed(dir: &std::path::Path) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut da = SeriesTable::new();
        let mut load = SeriesTable::new();
        for h in 0..72 {
            let ts = start + Duration::hours(h);
            da.insert(ts, "price", 40.0 + (h % 24) as f64 * 3.0);
            load.insert(ts, "load_mw", 1200.0 + (h % 24) as f64 * 20.0);
        }
        let mut afrr = SeriesTable::new();
        for q in 0..96 {
            let ts = start + Duration::minutes(15 * q);
            afrr.insert(ts, "up_price", 12.0);
            afrr.insert(ts, "down_price", 8.0);
            afrr.insert(ts, "up_quantity", 120.0);
            afrr.insert(ts, "down_quantity", 100.0);
        }
        write_partitioned(dir, "da_prices", &da).unwrap();
        write_partitioned(dir, "actual_load", &load).unwrap();
        write_partitioned(dir, "afrr_reserve_prices", &afrr).unwrap();
    }

    #[test]
    fn test_context_from_partitions() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let loader = DataLoader::new(dir.path());
        let ctx = ReportContext::build(
            &loader,
            None,
            RevenueAssumptions::default(),
            CapacityTables::embedded().unwrap(),
            None,
        )
        .unwrap();

        assert_eq!(ctx.base_year, Some(2024));
        assert!(ctx.revenues.get(2024, StorageDuration::TwoHour).unwrap().markets.afrr > 0.0);
        assert_eq!(ctx.projected.first().map(|p| p.year), Some(2025));
        assert_eq!(ctx.peak_load_mw, 1200.0 + 23.0 * 20.0);
        let volumes = ctx.volumes.unwrap();
        assert_eq!(volumes.afrr_up_mw, 120.0);
        assert!(ctx.saturation.iter().any(|r| r.vs_afrr_up_pct.is_some()));
        assert!(!ctx.statistics.load_annual.is_empty());
    }

    #[test]
    fn test_reports_are_written() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let out = TempDir::new().unwrap();
        let loader = DataLoader::new(dir.path());
        let ctx = ReportContext::build(
            &loader,
            None,
            RevenueAssumptions::default(),
            CapacityTables::embedded().unwrap(),
            None,
        )
        .unwrap();
        let artifacts = write_reports(&ctx, &OutputPaths::new(out.path())).unwrap();
        assert!(artifacts.workbook.exists());
        assert!(artifacts.html.exists());
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.summary).unwrap()).unwrap();
        assert_eq!(summary["base_year"], 2024);
        assert_eq!(summary["historical"]["rows"].as_array().unwrap().len(), 3);
        assert!(!artifacts.charts.is_empty());
        assert!(!artifacts.statistics.is_empty());
    }
}
