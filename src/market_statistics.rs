use anyhow::{Context, Result};
use chrono::{Datelike, Timelike};
use glob::glob;
use log::{info, warn};
use polars::prelude::*;
use revenue_calculator::{DataLoader, LoadReport, MarketData, SeriesTable, TimeSeries};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ACTUAL_LOAD: &str = "actual_load";
pub const GENERATION: &str = "generation_by_type";
pub const INSTALLED_CAPACITY: &str = "installed_capacity";
pub const ACTIVATED_BALANCING: &str = "activated_balancing_prices";
pub const IMBALANCE_VOLUMES: &str = "imbalance_volumes";

const HIGH_PRICE_EUR_MWH: f64 = 200.0;

/// Grid-side datasets used only for reporting.
#[derive(Debug, Default)]
pub struct GridData {
    pub load: Option<SeriesTable>,
    pub generation: Option<SeriesTable>,
    pub installed_capacity: Option<SeriesTable>,
    pub activated_balancing: Option<SeriesTable>,
    pub imbalance_volumes: Option<SeriesTable>,
    pub flows: Vec<(String, SeriesTable)>,
}

impl GridData {
    pub fn load(loader: &DataLoader, years: Option<&[i32]>) -> Result<(Self, Vec<LoadReport>)> {
        let mut reports = Vec::new();
        let mut take = |dataset: &str| -> Result<Option<SeriesTable>> {
            Ok(loader.load_dataset(dataset, years)?.map(|(table, report)| {
                reports.push(report);
                table
            }))
        };

        let mut grid = GridData {
            load: take(ACTUAL_LOAD)?,
            generation: take(GENERATION)?,
            installed_capacity: take(INSTALLED_CAPACITY)?,
            activated_balancing: take(ACTIVATED_BALANCING)?,
            imbalance_volumes: take(IMBALANCE_VOLUMES)?,
            flows: Vec::new(),
        };

        for name in flow_datasets(loader.data_dir())? {
            if let Some(table) = take(&name)? {
                grid.flows.push((name, table));
            }
        }
        Ok((grid, reports))
    }
}

/// Names of the cross-border flow datasets present on disk.
pub fn flow_datasets(data_dir: &Path) -> Result<Vec<String>> {
    let pattern = data_dir.join("flow_*");
    let pattern = pattern.to_string_lossy();
    let mut names: Vec<String> = glob(&pattern)
        .with_context(|| format!("Bad glob pattern {pattern}"))?
        .filter_map(Result::ok)
        .filter(|p| p.is_dir())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    Ok(names)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Empty,
}

impl Cell {
    fn from_any(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Cell::Empty,
            AnyValue::Int32(v) => Cell::Int(i64::from(v)),
            AnyValue::Int64(v) => Cell::Int(v),
            AnyValue::UInt32(v) => Cell::Int(i64::from(v)),
            AnyValue::Float32(v) => Cell::Float(f64::from(v)),
            AnyValue::Float64(v) if v.is_finite() => Cell::Float(v),
            AnyValue::Float64(_) => Cell::Empty,
            AnyValue::String(s) => Cell::Text(s.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn sort_key(&self) -> (i64, String) {
        match self {
            Cell::Int(v) => (*v, String::new()),
            Cell::Text(s) => (i64::MAX, s.clone()),
            _ => (i64::MAX, String::new()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v:.2}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Empty => Ok(()),
        }
    }
}

/// A rendered statistics table shared by the workbook and the HTML report.
#[derive(Debug, Clone, PartialEq)]
pub struct StatTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl StatTable {
    pub fn empty(title: &str, headers: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Copy a collected frame, relabelling its columns with `headers`.
    fn from_frame(title: &str, frame: &DataFrame, headers: &[&str]) -> Result<Self> {
        let mut table = Self::empty(title, headers);
        let columns = frame.get_columns();
        for i in 0..frame.height() {
            let mut row = Vec::with_capacity(columns.len());
            for series in columns {
                row.push(Cell::from_any(series.get(i)?));
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Numeric values of one column, in row order.
    pub fn column(&self, header: &str) -> Vec<Option<f64>> {
        match self.headers.iter().position(|h| h == header) {
            Some(idx) => self.rows.iter().map(|r| r.get(idx).and_then(Cell::as_f64)).collect(),
            None => Vec::new(),
        }
    }

    pub fn file_stem(&self) -> String {
        self.title
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>()
            .split('_')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|c| c.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn step_hours(series: &TimeSeries) -> f64 {
    series
        .dominant_step()
        .map(|d| d.num_seconds() as f64 / 3600.0)
        .unwrap_or(1.0)
}

/// One row per sample with calendar keys and the energy of the interval.
fn calendar_frame(series: &TimeSeries) -> PolarsResult<DataFrame> {
    let samples = series.samples();
    let hours = step_hours(series);
    df!(
        "year" => samples.iter().map(|s| s.timestamp.year()).collect::<Vec<i32>>(),
        "month" => samples.iter().map(|s| s.timestamp.month() as i32).collect::<Vec<i32>>(),
        "day" => samples.iter().map(|s| s.timestamp.ordinal() as i32).collect::<Vec<i32>>(),
        "hour" => samples.iter().map(|s| s.timestamp.hour() as i32).collect::<Vec<i32>>(),
        "value" => samples.iter().map(|s| s.value).collect::<Vec<f64>>(),
        "mwh" => samples.iter().map(|s| s.value * hours).collect::<Vec<f64>>(),
    )
}

/// Every column of every table stacked, labelled by `series`.
fn long_frame<'a>(tables: impl IntoIterator<Item = (&'a str, &'a SeriesTable)>) -> PolarsResult<DataFrame> {
    let mut labels = Vec::new();
    let mut years = Vec::new();
    let mut values = Vec::new();
    let mut energy = Vec::new();

    for (prefix, table) in tables {
        for column in table.columns() {
            let Some(series) = table.column(column) else { continue };
            let hours = step_hours(&series);
            let label = if prefix.is_empty() {
                column.clone()
            } else {
                format!("{prefix} {column}")
            };
            for sample in series.samples() {
                labels.push(label.clone());
                years.push(sample.timestamp.year());
                values.push(sample.value);
                energy.push(sample.value * hours);
            }
        }
    }

    df!(
        "series" => labels,
        "year" => years,
        "value" => values,
        "mwh" => energy,
    )
}

fn twh() -> Expr {
    (col("mwh").sum() / lit(1_000_000.0)).alias("twh")
}

fn price_stats() -> Vec<Expr> {
    vec![
        col("value").mean().alias("mean"),
        col("value").min().alias("min"),
        col("value").max().alias("max"),
        col("value").std(1).alias("std"),
        col("value").count().cast(DataType::Int64).alias("count"),
        col("value").lt(lit(0.0)).sum().cast(DataType::Int64).alias("negative"),
        col("value").gt(lit(HIGH_PRICE_EUR_MWH)).sum().cast(DataType::Int64).alias("above_200"),
    ]
}

fn series_stats() -> Vec<Expr> {
    vec![
        col("value").mean().alias("mean"),
        col("value").min().alias("min"),
        col("value").max().alias("max"),
        col("value").std(1).alias("std"),
        col("value").count().cast(DataType::Int64).alias("count"),
    ]
}

const PRICE_HEADERS: [&str; 7] = [
    "Mean (EUR/MWh)",
    "Min",
    "Max",
    "Std",
    "Intervals",
    "Negative",
    "Above 200",
];

fn with_keys(keys: &[&'static str], rest: &[&'static str]) -> Vec<&'static str> {
    keys.iter().chain(rest).copied().collect()
}

pub fn day_ahead_monthly(series: &TimeSeries) -> Result<StatTable> {
    let title = "Day-Ahead Monthly Statistics";
    let headers = with_keys(&["Year", "Month"], &PRICE_HEADERS);
    if series.is_empty() {
        return Ok(StatTable::empty(title, &headers));
    }
    let frame = calendar_frame(series)?
        .lazy()
        .group_by([col("year"), col("month")])
        .agg(price_stats())
        .sort(["year", "month"], SortMultipleOptions::default())
        .collect()?;
    StatTable::from_frame(title, &frame, &headers)
}

pub fn day_ahead_annual(series: &TimeSeries) -> Result<StatTable> {
    let title = "Day-Ahead Annual Statistics";
    let headers = with_keys(&["Year"], &PRICE_HEADERS);
    if series.is_empty() {
        return Ok(StatTable::empty(title, &headers));
    }
    let frame = calendar_frame(series)?
        .lazy()
        .group_by([col("year")])
        .agg(price_stats())
        .sort(["year"], SortMultipleOptions::default())
        .collect()?;
    StatTable::from_frame(title, &frame, &headers)
}

/// Mean and max of the daily max-min price spread, per year.
pub fn daily_spread(series: &TimeSeries) -> Result<StatTable> {
    let title = "Day-Ahead Daily Spread";
    let headers = ["Year", "Mean spread (EUR/MWh)", "Max spread", "Days"];
    if series.is_empty() {
        return Ok(StatTable::empty(title, &headers));
    }
    let frame = calendar_frame(series)?
        .lazy()
        .group_by([col("year"), col("day")])
        .agg([(col("value").max() - col("value").min()).alias("spread")])
        .group_by([col("year")])
        .agg([
            col("spread").mean().alias("mean_spread"),
            col("spread").max().alias("max_spread"),
            col("spread").count().cast(DataType::Int64).alias("days"),
        ])
        .sort(["year"], SortMultipleOptions::default())
        .collect()?;
    StatTable::from_frame(title, &frame, &headers)
}

/// Mean price by hour of day (UTC), one row per year.
pub fn hourly_profile(series: &TimeSeries) -> Result<StatTable> {
    let title = "Day-Ahead Hourly Profile";
    if series.is_empty() {
        return Ok(StatTable::empty(title, &["Year"]));
    }
    let frame = calendar_frame(series)?
        .lazy()
        .group_by([col("year"), col("hour")])
        .agg([col("value").mean().alias("mean")])
        .collect()?;
    pivot(title, &frame, ("year", "Year"), "hour", "mean", |h| match h {
        Cell::Int(hour) => format!("h{hour:02}"),
        other => other.to_string(),
    })
}

/// Reshape a long `(row, column, value)` frame into a wide table.
fn pivot(
    title: &str,
    frame: &DataFrame,
    (row_key, row_header): (&str, &str),
    column_key: &str,
    value: &str,
    column_label: impl Fn(&Cell) -> String,
) -> Result<StatTable> {
    let rows = frame.column(row_key)?;
    let columns = frame.column(column_key)?;
    let values = frame.column(value)?;

    let mut triples = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        triples.push((
            Cell::from_any(rows.get(i)?),
            Cell::from_any(columns.get(i)?),
            Cell::from_any(values.get(i)?),
        ));
    }

    let mut row_keys: Vec<Cell> = Vec::new();
    let mut column_keys: Vec<Cell> = Vec::new();
    for (r, c, _) in &triples {
        if !row_keys.contains(r) {
            row_keys.push(r.clone());
        }
        if !column_keys.contains(c) {
            column_keys.push(c.clone());
        }
    }
    row_keys.sort_by_key(Cell::sort_key);
    column_keys.sort_by_key(Cell::sort_key);

    let mut headers = vec![row_header.to_string()];
    headers.extend(column_keys.iter().map(&column_label));
    let mut table = StatTable {
        title: title.to_string(),
        headers,
        rows: Vec::with_capacity(row_keys.len()),
    };
    for row_key in row_keys {
        let mut row = vec![row_key.clone()];
        for column_key in &column_keys {
            let cell = triples
                .iter()
                .find(|(r, c, _)| *r == row_key && c == column_key)
                .map(|(_, _, v)| v.clone())
                .unwrap_or(Cell::Empty);
            row.push(cell);
        }
        table.rows.push(row);
    }
    Ok(table)
}

/// Annual statistics per column of one or more tables.
pub fn annual_series_stats(title: &str, tables: &[(&str, &SeriesTable)]) -> Result<StatTable> {
    let headers = ["Series", "Year", "Mean", "Min", "Max", "Std", "Intervals"];
    let frame = long_frame(tables.iter().copied())?;
    if frame.height() == 0 {
        return Ok(StatTable::empty(title, &headers));
    }
    let frame = frame
        .lazy()
        .group_by([col("series"), col("year")])
        .agg(series_stats())
        .sort(["series", "year"], SortMultipleOptions::default())
        .collect()?;
    StatTable::from_frame(title, &frame, &headers)
}

/// Annual energy per column in TWh, one row per year.
pub fn annual_energy(title: &str, tables: &[(&str, &SeriesTable)]) -> Result<StatTable> {
    let frame = long_frame(tables.iter().copied())?;
    if frame.height() == 0 {
        return Ok(StatTable::empty(title, &["Year"]));
    }
    let frame = frame
        .lazy()
        .group_by([col("series"), col("year")])
        .agg([twh()])
        .collect()?;
    pivot(title, &frame, ("year", "Year"), "series", "twh", |c| format!("{c} (TWh)"))
}

pub fn load_annual(load: &TimeSeries) -> Result<StatTable> {
    let title = "Electricity Load Annual";
    let headers = ["Year", "Consumption (TWh)", "Mean (MW)", "Min (MW)", "Max (MW)"];
    if load.is_empty() {
        return Ok(StatTable::empty(title, &headers));
    }
    let frame = calendar_frame(load)?
        .lazy()
        .group_by([col("year")])
        .agg([
            twh(),
            col("value").mean().alias("mean"),
            col("value").min().alias("min"),
            col("value").max().alias("max"),
        ])
        .sort(["year"], SortMultipleOptions::default())
        .collect()?;
    StatTable::from_frame(title, &frame, &headers)
}

pub fn load_monthly(load: &TimeSeries) -> Result<StatTable> {
    let title = "Electricity Load Monthly";
    let headers = ["Year", "Month", "Consumption (TWh)", "Mean (MW)", "Peak (MW)"];
    if load.is_empty() {
        return Ok(StatTable::empty(title, &headers));
    }
    let frame = calendar_frame(load)?
        .lazy()
        .group_by([col("year"), col("month")])
        .agg([
            twh(),
            col("value").mean().alias("mean"),
            col("value").max().alias("max"),
        ])
        .sort(["year", "month"], SortMultipleOptions::default())
        .collect()?;
    StatTable::from_frame(title, &frame, &headers)
}

/// Mean declared capacity per production type and year.
pub fn installed_by_type(table: &SeriesTable) -> Result<StatTable> {
    let title = "ENTSO-E Installed Capacity";
    let frame = long_frame([("", table)])?;
    if frame.height() == 0 {
        return Ok(StatTable::empty(title, &["Year"]));
    }
    let frame = frame
        .lazy()
        .group_by([col("series"), col("year")])
        .agg([col("value").mean().alias("mw")])
        .collect()?;
    pivot(title, &frame, ("year", "Year"), "series", "mw", |c| format!("{c} (MW)"))
}

/// All statistics tables of the report.
#[derive(Debug, Clone)]
pub struct MarketStatistics {
    pub da_monthly: StatTable,
    pub da_annual: StatTable,
    pub daily_spread: StatTable,
    pub hourly_profile: StatTable,
    pub imbalance_annual: StatTable,
    pub reserve_annual: StatTable,
    pub activated_balancing_annual: StatTable,
    pub imbalance_volume_annual: StatTable,
    pub load_annual: StatTable,
    pub load_monthly: StatTable,
    pub generation_annual: StatTable,
    pub installed_capacity: StatTable,
    pub flows_annual: StatTable,
}

impl MarketStatistics {
    pub fn compute(market: &MarketData, grid: &GridData) -> Result<Self> {
        let empty_series = TimeSeries::empty("empty");
        let empty_table = SeriesTable::new();

        let da = market.day_ahead.as_ref().unwrap_or(&empty_series);
        if da.is_empty() {
            warn!("No day-ahead prices; price statistics will be empty");
        }
        let load = grid
            .load
            .as_ref()
            .and_then(|t| t.column("load_mw"))
            .unwrap_or_else(|| TimeSeries::empty("load_mw"));

        let mut reserves: Vec<(&str, &SeriesTable)> = Vec::new();
        if let Some(afrr) = &market.afrr {
            reserves.push(("aFRR", afrr));
        }
        if let Some(mfrr) = &market.mfrr {
            reserves.push(("mFRR", mfrr));
        }
        if let Some(fcr) = &market.fcr {
            reserves.push(("FCR", fcr));
        }

        let flows: Vec<(&str, &SeriesTable)> = grid
            .flows
            .iter()
            .map(|(name, table)| (name.as_str(), table))
            .collect();
        let generation = grid.generation.as_ref().unwrap_or(&empty_table);

        let stats = Self {
            da_monthly: day_ahead_monthly(da)?,
            da_annual: day_ahead_annual(da)?,
            daily_spread: daily_spread(da)?,
            hourly_profile: hourly_profile(da)?,
            imbalance_annual: annual_series_stats(
                "Imbalance Price Annual Statistics",
                &[("", market.imbalance.as_ref().unwrap_or(&empty_table))],
            )?,
            reserve_annual: annual_series_stats("Reserve Capacity Annual Statistics", &reserves)?,
            activated_balancing_annual: annual_series_stats(
                "Activated Balancing Energy Prices",
                &[("", grid.activated_balancing.as_ref().unwrap_or(&empty_table))],
            )?,
            imbalance_volume_annual: annual_series_stats(
                "Imbalance Volumes",
                &[("", grid.imbalance_volumes.as_ref().unwrap_or(&empty_table))],
            )?,
            load_annual: load_annual(&load)?,
            load_monthly: load_monthly(&load)?,
            generation_annual: annual_energy("Generation by Type", &[("", generation)])?,
            installed_capacity: installed_by_type(
                grid.installed_capacity.as_ref().unwrap_or(&empty_table),
            )?,
            flows_annual: annual_energy("Cross-Border Flows", &flows)?,
        };
        info!("Computed {} statistics tables", stats.tables().len());
        Ok(stats)
    }

    pub fn tables(&self) -> Vec<&StatTable> {
        vec![
            &self.da_annual,
            &self.da_monthly,
            &self.daily_spread,
            &self.hourly_profile,
            &self.imbalance_annual,
            &self.reserve_annual,
            &self.activated_balancing_annual,
            &self.imbalance_volume_annual,
            &self.load_annual,
            &self.load_monthly,
            &self.generation_annual,
            &self.installed_capacity,
            &self.flows_annual,
        ]
    }

    /// Write every non-empty table as `<dir>/<title>.csv`.
    pub fn save_csv(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let mut written = Vec::new();
        for table in self.tables().into_iter().filter(|t| !t.is_empty()) {
            let path = dir.join(format!("{}.csv", table.file_stem()));
            table.write_csv(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use revenue_calculator::Sample;
    use tempfile::TempDir;

    fn hourly(values: &[f64]) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeSeries::new(
            "price",
            values.iter().enumerate().map(|(i, v)| Sample {
                timestamp: start + Duration::hours(i as i64),
                value: *v,
            }),
        )
    }

    #[test]
    fn test_annual_price_stats() {
        let series = hourly(&[-5.0, 10.0, 250.0, 25.0]);
        let table = day_ahead_annual(&series).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], Cell::Int(2024));
        assert_relative_eq!(table.column("Mean (EUR/MWh)")[0].unwrap(), 70.0);
        assert_eq!(table.column("Negative")[0], Some(1.0));
        assert_eq!(table.column("Above 200")[0], Some(1.0));
        assert_eq!(table.column("Intervals")[0], Some(4.0));
    }

    #[test]
    fn test_daily_spread_over_two_days() {
        let mut values = vec![50.0; 48];
        values[3] = 10.0;
        values[20] = 90.0;
        values[30] = 40.0;
        values[40] = 70.0;
        let table = daily_spread(&hourly(&values)).unwrap();
        assert_relative_eq!(table.column("Mean spread (EUR/MWh)")[0].unwrap(), (80.0 + 30.0) / 2.0);
        assert_eq!(table.column("Days")[0], Some(2.0));
    }

    #[test]
    fn test_hourly_profile_has_24_columns() {
        let values: Vec<f64> = (0..48).map(|i| (i % 24) as f64).collect();
        let table = hourly_profile(&hourly(&values)).unwrap();
        assert_eq!(table.headers.len(), 25);
        assert_eq!(table.headers[1], "h00");
        assert_eq!(table.column("h13")[0], Some(13.0));
    }

    #[test]
    fn test_load_energy_in_twh() {
        let load = hourly(&vec![1_000.0; 24]);
        let table = load_annual(&load).unwrap();
        assert_relative_eq!(table.column("Consumption (TWh)")[0].unwrap(), 0.024);
        assert_eq!(table.column("Max (MW)")[0], Some(1000.0));
    }

    #[test]
    fn test_energy_pivot_by_series() {
        let mut generation = SeriesTable::new();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        for h in 0..10 {
            let ts = start + Duration::hours(h);
            generation.insert(ts, "wind_onshore", 500.0);
            generation.insert(ts, "solar", 100.0);
        }
        let table = annual_energy("Generation by Type", &[("", &generation)]).unwrap();
        assert_eq!(table.headers, vec!["Year", "solar (TWh)", "wind_onshore (TWh)"]);
        assert_relative_eq!(table.column("wind_onshore (TWh)")[0].unwrap(), 0.005);
    }

    #[test]
    fn test_empty_inputs_give_empty_tables() {
        let stats = MarketStatistics::compute(&MarketData::default(), &GridData::default()).unwrap();
        assert!(stats.tables().iter().all(|t| t.is_empty()));
        let dir = TempDir::new().unwrap();
        assert!(stats.save_csv(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_save_csv_uses_title_as_file_name() {
        let dir = TempDir::new().unwrap();
        let table = day_ahead_annual(&hourly(&[1.0, 2.0])).unwrap();
        let path = dir.path().join(format!("{}.csv", table.file_stem()));
        table.write_csv(&path).unwrap();
        assert!(dir.path().join("day_ahead_annual_statistics.csv").exists());
    }

    #[test]
    fn test_flow_datasets_are_discovered() {
        let dir = TempDir::new().unwrap();
        for name in ["flow_LT_to_PL", "flow_SE_4_to_LT", "da_prices"] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        assert_eq!(
            flow_datasets(dir.path()).unwrap(),
            vec!["flow_LT_to_PL".to_string(), "flow_SE_4_to_LT".to_string()]
        );
    }
}
