use crate::calculator::{DOWN_QUANTITY, UP_QUANTITY};
use crate::data_loader::MarketData;
use crate::series::SeriesTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

const INSTALLED_CAPACITY_CSV: &str = include_str!("../assumptions/installed_capacity.csv");
const CAPACITY_PIPELINE_CSV: &str = include_str!("../assumptions/capacity_pipeline.csv");

/// Peak system load used when no load data is available, MW.
pub const DEFAULT_PEAK_LOAD_MW: f64 = 2100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    High,
    Base,
    Low,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::High, Scenario::Base, Scenario::Low];
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::High => "High",
            Scenario::Base => "Base",
            Scenario::Low => "Low",
        };
        write!(f, "{name}")
    }
}

/// Installed generation and storage fleet for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledCapacity {
    pub year: i32,
    pub wind_mw: f64,
    pub solar_mw: f64,
    pub bess_mw: f64,
    pub bess_mwh: f64,
    pub fossil_mw: f64,
    pub forecast: bool,
}

impl InstalledCapacity {
    pub fn renewables_mw(&self) -> f64 {
        self.wind_mw + self.solar_mw
    }

    pub fn bess_duration_hours(&self) -> Option<f64> {
        (self.bess_mw > 0.0).then(|| self.bess_mwh / self.bess_mw)
    }
}

/// Installed BESS under one build-out scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub year: i32,
    pub scenario: Scenario,
    pub power_mw: f64,
    pub energy_mwh: f64,
}

/// Mean procured balancing capacity in a reference year, MW.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcurementVolumes {
    pub year: i32,
    pub afrr_up_mw: f64,
    pub afrr_down_mw: f64,
    pub mfrr_up_mw: f64,
    pub mfrr_down_mw: f64,
    pub fcr_mw: f64,
}

impl ProcurementVolumes {
    pub fn from_market_data(data: &MarketData, year: i32, fcr_mw: f64) -> Self {
        let mean = |table: &Option<SeriesTable>, column: &str| {
            table
                .as_ref()
                .and_then(|t| t.column(column))
                .and_then(|s| s.mean_in_year(year))
                .unwrap_or(0.0)
        };
        Self {
            year,
            afrr_up_mw: mean(&data.afrr, UP_QUANTITY),
            afrr_down_mw: mean(&data.afrr, DOWN_QUANTITY),
            mfrr_up_mw: mean(&data.mfrr, UP_QUANTITY),
            mfrr_down_mw: mean(&data.mfrr, DOWN_QUANTITY),
            fcr_mw,
        }
    }

    /// aFRR and mFRR in both directions plus the FCR estimate.
    pub fn total_balancing_mw(&self) -> f64 {
        self.afrr_up_mw + self.afrr_down_mw + self.mfrr_up_mw + self.mfrr_down_mw + self.fcr_mw
    }
}

/// How far one scenario's fleet exceeds the markets it competes in.
/// Ratios are in percent and `None` when the reference volume is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaturationRow {
    pub year: i32,
    pub scenario: Scenario,
    pub bess_mw: f64,
    pub vs_afrr_up_pct: Option<f64>,
    pub vs_balancing_pct: Option<f64>,
    pub vs_peak_load_pct: Option<f64>,
}

fn percent(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator * 100.0)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CapacityTables {
    pub installed: Vec<InstalledCapacity>,
    pub pipeline: Vec<PipelineRecord>,
}

impl CapacityTables {
    /// Tables shipped with the crate.
    pub fn embedded() -> Result<Self> {
        Ok(Self {
            installed: read_records(INSTALLED_CAPACITY_CSV.as_bytes())
                .context("embedded installed capacity table")?,
            pipeline: read_records(CAPACITY_PIPELINE_CSV.as_bytes())
                .context("embedded capacity pipeline table")?,
        })
    }

    /// Shipped tables, each replaced by the file at its path when given.
    pub fn load(installed: Option<&Path>, pipeline: Option<&Path>) -> Result<Self> {
        let mut tables = Self::embedded()?;
        if let Some(path) = installed {
            tables.installed = read_records_from(path)?;
        }
        if let Some(path) = pipeline {
            tables.pipeline = read_records_from(path)?;
        }
        Ok(tables)
    }

    pub fn installed_in(&self, year: i32) -> Option<&InstalledCapacity> {
        self.installed.iter().find(|r| r.year == year)
    }

    pub fn pipeline_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.pipeline.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn scenario_mw(&self, scenario: Scenario, year: i32) -> Option<f64> {
        self.pipeline
            .iter()
            .find(|r| r.scenario == scenario && r.year == year)
            .map(|r| r.power_mw)
    }

    /// Energy-weighted average duration of a scenario's fleet in its last year.
    pub fn pipeline_average_duration(&self, scenario: Scenario) -> Option<f64> {
        self.pipeline
            .iter()
            .filter(|r| r.scenario == scenario)
            .max_by_key(|r| r.year)
            .and_then(|r| (r.power_mw > 0.0).then(|| r.energy_mwh / r.power_mw))
    }

    /// Saturation ratios of every scenario and year against the reference
    /// procurement volumes and peak load.
    pub fn saturation(&self, volumes: &ProcurementVolumes, peak_load_mw: f64) -> Vec<SaturationRow> {
        let mut rows: Vec<SaturationRow> = self
            .pipeline
            .iter()
            .map(|r| SaturationRow {
                year: r.year,
                scenario: r.scenario,
                bess_mw: r.power_mw,
                vs_afrr_up_pct: percent(r.power_mw, volumes.afrr_up_mw),
                vs_balancing_pct: percent(r.power_mw, volumes.total_balancing_mw()),
                vs_peak_load_pct: percent(r.power_mw, peak_load_mw),
            })
            .collect();
        rows.sort_by_key(|r| (r.year, r.scenario));
        rows
    }
}

fn read_records<T: for<'de> Deserialize<'de>>(reader: impl Read) -> Result<Vec<T>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (line, record) in csv_reader.deserialize().enumerate() {
        records.push(record.with_context(|| format!("record {}", line + 1))?);
    }
    Ok(records)
}

fn read_records_from<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_records(file).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_embedded_tables_parse() {
        let tables = CapacityTables::embedded().unwrap();
        assert_eq!(tables.installed.len(), 11);
        assert_eq!(tables.pipeline_years(), (2025..=2030).collect::<Vec<_>>());

        let y2025 = tables.installed_in(2025).unwrap();
        assert!(!y2025.forecast);
        assert_eq!(y2025.bess_mw, 535.0);
        assert!(tables.installed_in(2026).unwrap().forecast);
    }

    #[test]
    fn test_scenarios_share_the_installed_base() {
        let tables = CapacityTables::embedded().unwrap();
        for scenario in Scenario::ALL {
            assert_eq!(tables.scenario_mw(scenario, 2025), Some(454.0));
        }
        assert_eq!(tables.scenario_mw(Scenario::High, 2030), Some(1700.0));
        assert_eq!(tables.scenario_mw(Scenario::Base, 2030), Some(1500.0));
        assert_eq!(tables.scenario_mw(Scenario::Low, 2030), Some(1100.0));
        assert_relative_eq!(
            tables.pipeline_average_duration(Scenario::High).unwrap(),
            4000.0 / 1700.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_saturation_ratios() {
        let tables = CapacityTables::embedded().unwrap();
        let volumes = ProcurementVolumes {
            year: 2025,
            afrr_up_mw: 100.0,
            afrr_down_mw: 100.0,
            mfrr_up_mw: 300.0,
            mfrr_down_mw: 260.0,
            fcr_mw: 40.0,
        };

        let rows = tables.saturation(&volumes, DEFAULT_PEAK_LOAD_MW);
        let high_2030 = rows
            .iter()
            .find(|r| r.year == 2030 && r.scenario == Scenario::High)
            .unwrap();
        assert_relative_eq!(high_2030.vs_afrr_up_pct.unwrap(), 1700.0);
        assert_relative_eq!(high_2030.vs_balancing_pct.unwrap(), 212.5);
        assert_relative_eq!(high_2030.vs_peak_load_pct.unwrap(), 1700.0 / 2100.0 * 100.0);

        let no_data = tables.saturation(&ProcurementVolumes::default(), DEFAULT_PEAK_LOAD_MW);
        assert!(no_data.iter().all(|r| r.vs_afrr_up_pct.is_none()));
    }

    #[test]
    fn test_pipeline_override_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "year,scenario,power_mw,energy_mwh").unwrap();
        writeln!(file, "2027,base,999,1998").unwrap();

        let tables = CapacityTables::load(None, Some(file.path())).unwrap();
        assert_eq!(tables.pipeline.len(), 1);
        assert_eq!(tables.scenario_mw(Scenario::Base, 2027), Some(999.0));
        assert_eq!(tables.installed.len(), 11);
    }
}
