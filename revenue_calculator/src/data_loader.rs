use crate::series::{SeriesTable, TimeSeries};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DA_PRICES: &str = "da_prices";
pub const AFRR_PRICES: &str = "afrr_reserve_prices";
pub const MFRR_PRICES: &str = "mfrr_reserve_prices";
pub const FCR_PRICES: &str = "fcr_reserve_prices";
pub const IMBALANCE_PRICES: &str = "imbalance_prices";

/// Accepted names of the day-ahead price column, in preference order.
pub const DA_PRICE_COLUMNS: [&str; 3] = ["price", "da_price", "value"];

/// Rows read from one dataset, with the rows that had to be skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub dataset: String,
    pub files: usize,
    pub rows: usize,
    pub malformed_rows: usize,
    pub duplicate_rows: usize,
}

impl LoadReport {
    fn absorb(&mut self, other: &LoadReport) {
        self.files += other.files;
        self.rows += other.rows;
        self.malformed_rows += other.malformed_rows;
        self.duplicate_rows += other.duplicate_rows;
    }
}

/// Every series the revenue model reads. A `None` dataset is absent on disk.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub day_ahead: Option<TimeSeries>,
    pub afrr: Option<SeriesTable>,
    pub mfrr: Option<SeriesTable>,
    pub fcr: Option<SeriesTable>,
    pub imbalance: Option<SeriesTable>,
}

impl MarketData {
    /// Years present in any dataset, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .day_ahead
            .iter()
            .flat_map(|s| s.years())
            .chain(
                [&self.afrr, &self.mfrr, &self.fcr, &self.imbalance]
                    .into_iter()
                    .flatten()
                    .flat_map(|t| t.years()),
            )
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}

pub struct DataLoader {
    data_dir: PathBuf,
}

impl DataLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Year partitions of a dataset: `<data_dir>/<dataset>/<dataset>_<year>.csv`.
    pub fn discover_years(&self, dataset: &str) -> Result<BTreeMap<i32, PathBuf>> {
        let pattern = self
            .data_dir
            .join(dataset)
            .join(format!("{dataset}_*.csv"));
        let pattern = pattern.to_string_lossy().to_string();
        let year_re = Regex::new(&format!(r"^{}_(\d{{4}})\.csv$", regex::escape(dataset)))?;

        let mut partitions = BTreeMap::new();
        for entry in glob::glob(&pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
            let path = entry?;
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(year) = year_re
                .captures(file_name)
                .and_then(|c| c[1].parse::<i32>().ok())
            {
                partitions.insert(year, path);
            }
        }
        Ok(partitions)
    }

    /// Read every partition of `dataset`, optionally restricted to `years`.
    /// Returns `None` when no partition exists.
    pub fn load_dataset(
        &self,
        dataset: &str,
        years: Option<&[i32]>,
    ) -> Result<Option<(SeriesTable, LoadReport)>> {
        let partitions = self.discover_years(dataset)?;
        let selected: Vec<(&i32, &PathBuf)> = partitions
            .iter()
            .filter(|(year, _)| years.map_or(true, |ys| ys.contains(*year)))
            .collect();

        if selected.is_empty() {
            debug!("No partitions for {} under {}", dataset, self.data_dir.display());
            return Ok(None);
        }

        let mut table = SeriesTable::new();
        let mut report = LoadReport {
            dataset: dataset.to_string(),
            ..Default::default()
        };

        for (year, path) in selected {
            let (part, part_report) = read_csv(path)?;
            debug!("{} {}: {} rows", dataset, year, part_report.rows);
            table.merge(&part);
            report.absorb(&part_report);
        }

        if report.malformed_rows > 0 {
            warn!(
                "{}: skipped {} malformed rows out of {}",
                dataset,
                report.malformed_rows,
                report.rows + report.malformed_rows
            );
        }
        Ok(Some((table, report)))
    }

    /// Load the series the revenue model needs. Absent datasets stay `None`.
    pub fn load_market_data(&self, years: Option<&[i32]>) -> Result<(MarketData, Vec<LoadReport>)> {
        let mut reports = Vec::new();
        let mut load = |dataset: &str| -> Result<Option<SeriesTable>> {
            Ok(self.load_dataset(dataset, years)?.map(|(table, report)| {
                reports.push(report);
                table
            }))
        };

        let day_ahead = load(DA_PRICES)?.and_then(|table| day_ahead_series(&table));
        let afrr = load(AFRR_PRICES)?;
        let mfrr = load(MFRR_PRICES)?;
        let fcr = load(FCR_PRICES)?;
        let imbalance = load(IMBALANCE_PRICES)?;

        let data = MarketData {
            day_ahead,
            afrr,
            mfrr,
            fcr,
            imbalance,
        };
        info!(
            "Loaded market data for years {:?} from {}",
            data.years(),
            self.data_dir.display()
        );
        Ok((data, reports))
    }
}

/// The day-ahead price column of a `da_prices` table.
pub fn day_ahead_series(table: &SeriesTable) -> Option<TimeSeries> {
    table.column_any(&DA_PRICE_COLUMNS).or_else(|| {
        table
            .columns()
            .first()
            .and_then(|first| table.column(first))
    })
}

/// Lower-case a header, replace spaces with underscores and map known
/// aliases onto their canonical name.
pub fn normalize_header(header: &str) -> String {
    let normalized = header.trim().to_lowercase().replace(' ', "_");
    match normalized.as_str() {
        "up_prices" => "up_price".to_string(),
        "down_prices" => "down_price".to_string(),
        _ => normalized,
    }
}

/// Parse RFC 3339 and the `YYYY-MM-DD HH:MM:SS+HH:MM` form pandas writes.
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }
    None
}

enum Cell {
    Missing,
    Value(f64),
    Invalid,
}

fn parse_cell(raw: &str) -> Cell {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Cell::Missing;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Value(v),
        Ok(_) => Cell::Missing,
        Err(_) => Cell::Invalid,
    }
}

/// Read one `timestamp,<value columns...>` CSV. Rows with an unparseable
/// timestamp, a non-numeric value or the wrong field count are skipped and
/// counted.
pub fn read_csv(path: &Path) -> Result<(SeriesTable, LoadReport)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(normalize_header)
        .collect();

    let ts_idx = headers
        .iter()
        .position(|h| h == "timestamp")
        .with_context(|| format!("{} has no timestamp column", path.display()))?;
    let value_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_idx)
        .map(|(i, h)| (i, h.clone()))
        .collect();

    let column_names: Vec<String> = value_columns.iter().map(|(_, h)| h.clone()).collect();
    let mut table = SeriesTable::with_columns(column_names.iter().cloned());
    let mut report = LoadReport {
        dataset: path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        files: 1,
        ..Default::default()
    };

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!("{}: unreadable record: {}", path.display(), e);
                report.malformed_rows += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            report.malformed_rows += 1;
            continue;
        }
        let Some(timestamp) = record.get(ts_idx).and_then(parse_timestamp) else {
            report.malformed_rows += 1;
            continue;
        };

        let mut cells = Vec::with_capacity(value_columns.len());
        let mut malformed = false;
        for (idx, _) in &value_columns {
            match parse_cell(record.get(*idx).unwrap_or_default()) {
                Cell::Missing => cells.push(None),
                Cell::Value(v) => cells.push(Some(v)),
                Cell::Invalid => {
                    malformed = true;
                    break;
                }
            }
        }
        if malformed {
            report.malformed_rows += 1;
            continue;
        }

        if table.rows().contains_key(&timestamp) {
            report.duplicate_rows += 1;
        } else {
            report.rows += 1;
        }
        table.insert_row(timestamp, &column_names, &cells);
    }

    Ok((table, report))
}

/// Write a table as `timestamp,<columns...>` with RFC 3339 UTC timestamps.
pub fn write_csv(path: &Path, table: &SeriesTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec!["timestamp".to_string()];
    header.extend(table.columns().iter().cloned());
    writer.write_record(&header)?;

    for (timestamp, row) in table.rows() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(timestamp.to_rfc3339_opts(SecondsFormat::Secs, true));
        record.extend(row.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Split a table by calendar year and write each partition, merged with the
/// rows already on disk. New values win where timestamps overlap. Returns the
/// files written in year order.
pub fn write_partitioned(data_dir: &Path, dataset: &str, table: &SeriesTable) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for year in table.years() {
        let path = partition_path(data_dir, dataset, year);
        let mut partition = table.year_slice(year);
        if path.exists() {
            let (existing, _) = read_csv(&path)?;
            let fetched = partition.len();
            partition.merge(&existing.year_slice(year));
            debug!(
                "{}: merged {} new rows into {} existing ({} total)",
                path.display(),
                fetched,
                existing.len(),
                partition.len()
            );
        }
        write_csv(&path, &partition)?;
        written.push(path);
    }
    Ok(written)
}

pub fn partition_path(data_dir: &Path, dataset: &str, year: i32) -> PathBuf {
    data_dir.join(dataset).join(format!("{dataset}_{year}.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_partitioned_write_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut history = SeriesTable::new();
        for day in 0..300 {
            history.insert(start + chrono::Duration::days(day), "price", 40.0);
        }
        write_partitioned(dir.path(), DA_PRICES, &history).unwrap();

        let mut update = SeriesTable::new();
        update.insert(start + chrono::Duration::days(10), "price", 99.0);
        let paths = write_partitioned(dir.path(), DA_PRICES, &update).unwrap();
        assert_eq!(paths, vec![partition_path(dir.path(), DA_PRICES, 2026)]);

        let (table, _) = read_csv(&paths[0]).unwrap();
        assert_eq!(table.len(), 300);
        let price = table.column("price").unwrap();
        let values: Vec<f64> = price.samples().iter().map(|s| s.value).collect();
        assert_eq!(values[10], 99.0);
        assert_eq!(values[11], 40.0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 02:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_normalize_header_aliases() {
        assert_eq!(normalize_header("Up Prices"), "up_price");
        assert_eq!(normalize_header("down_prices"), "down_price");
        assert_eq!(normalize_header(" Timestamp "), "timestamp");
    }

    #[test]
    fn test_read_csv_counts_malformed_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "da_prices/da_prices_2024.csv",
            "timestamp,price\n\
             2024-01-01T00:00:00Z,50.5\n\
             not-a-date,10\n\
             2024-01-01T01:00:00Z,abc\n\
             2024-01-01T02:00:00Z,NaN\n\
             2024-01-01T03:00:00Z,42,extra\n\
             2024-01-01T00:00:00Z,99\n",
        );

        let (table, report) = read_csv(&path).unwrap();
        assert_eq!(report.malformed_rows, 3);
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.rows, 2);

        let prices = table.column("price").unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.samples()[0].value, 50.5);
    }

    #[test]
    fn test_discover_years_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "da_prices/da_prices_2023.csv", "timestamp,price\n");
        write(dir.path(), "da_prices/da_prices_2024.csv", "timestamp,price\n");
        write(dir.path(), "da_prices/da_prices_backup.csv", "timestamp,price\n");

        let loader = DataLoader::new(dir.path());
        let years: Vec<i32> = loader.discover_years(DA_PRICES).unwrap().into_keys().collect();
        assert_eq!(years, vec![2023, 2024]);
    }

    #[test]
    fn test_partitioned_write_then_load() {
        let dir = TempDir::new().unwrap();
        let mut table = SeriesTable::new();
        let dec = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let jan = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        table.insert(dec, "up_price", 12.0);
        table.insert(jan, "up_price", 14.0);
        table.insert(jan, "down_price", 3.0);

        let written = write_partitioned(dir.path(), AFRR_PRICES, &table).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[1].ends_with("afrr_reserve_prices/afrr_reserve_prices_2024.csv"));

        let loader = DataLoader::new(dir.path());
        let (loaded, report) = loader.load_dataset(AFRR_PRICES, Some(&[2024])).unwrap().unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.column("down_price").unwrap().samples()[0].value, 3.0);
    }

    #[test]
    fn test_missing_dataset_is_absent() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "da_prices/da_prices_2024.csv",
            "timestamp,price\n2024-05-01T00:00:00Z,10\n",
        );

        let loader = DataLoader::new(dir.path());
        let (data, reports) = loader.load_market_data(None).unwrap();
        assert!(data.day_ahead.is_some());
        assert!(data.imbalance.is_none());
        assert_eq!(reports.len(), 1);
        assert_eq!(data.years(), vec![2024]);
    }
}
