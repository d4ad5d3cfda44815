use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One measurement interval of a market time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A single-valued series, sorted by timestamp with unique timestamps.
///
/// NaN values never enter a series: they are treated as missing at
/// construction time, so every consumer can assume finite values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, samples: impl IntoIterator<Item = Sample>) -> Self {
        let mut by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        for sample in samples {
            if sample.value.is_finite() {
                // first value wins on duplicate timestamps
                by_time.entry(sample.timestamp).or_insert(sample.value);
            }
        }

        Self {
            name: name.into(),
            samples: by_time
                .into_iter()
                .map(|(timestamp, value)| Sample { timestamp, value })
                .collect(),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Vec::new(),
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    pub fn in_year(&self, year: i32) -> impl Iterator<Item = &Sample> + '_ {
        self.samples
            .iter()
            .filter(move |s| s.timestamp.year() == year)
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.samples.iter().map(|s| s.timestamp.year()).collect();
        years.dedup();
        years
    }

    /// Samples of one year grouped by UTC calendar day.
    pub fn days_in_year(&self, year: i32) -> BTreeMap<NaiveDate, Vec<Sample>> {
        let mut days: BTreeMap<NaiveDate, Vec<Sample>> = BTreeMap::new();
        for sample in self.in_year(year) {
            days.entry(sample.timestamp.date_naive())
                .or_default()
                .push(*sample);
        }
        days
    }

    pub fn mean_in_year(&self, year: i32) -> Option<f64> {
        let (sum, count) = self
            .in_year(year)
            .fold((0.0, 0usize), |(sum, count), s| (sum + s.value, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Value of the sample whose interval `[timestamp, timestamp + step)`
    /// contains `at`.
    pub fn value_covering(&self, at: DateTime<Utc>, step: Duration) -> Option<f64> {
        let idx = self.samples.partition_point(|s| s.timestamp <= at);
        if idx == 0 {
            return None;
        }
        let candidate = self.samples[idx - 1];
        if at < candidate.timestamp + step {
            Some(candidate.value)
        } else {
            None
        }
    }

    /// Most common spacing between consecutive samples.
    pub fn dominant_step(&self) -> Option<Duration> {
        dominant_step(self.samples.iter().map(|s| s.timestamp))
    }
}

/// Most common positive gap between consecutive timestamps, ties broken
/// toward the shorter step.
pub fn dominant_step(timestamps: impl IntoIterator<Item = DateTime<Utc>>) -> Option<Duration> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    let mut previous: Option<DateTime<Utc>> = None;
    for ts in timestamps {
        if let Some(prev) = previous {
            let gap = (ts - prev).num_seconds();
            if gap > 0 {
                *counts.entry(gap).or_insert(0) += 1;
            }
        }
        previous = Some(ts);
    }

    counts
        .into_iter()
        .fold(None, |best: Option<(i64, usize)>, (gap, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((gap, count)),
        })
        .map(|(gap, _)| Duration::seconds(gap))
}

/// A wide table keyed by timestamp: the on-disk CSV shape of every dataset.
///
/// Cells are `None` where a column has no value for a timestamp.
#[derive(Debug, Clone, Default)]
pub struct SeriesTable {
    columns: Vec<String>,
    rows: BTreeMap<DateTime<Utc>, Vec<Option<f64>>>,
}

impl SeriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &BTreeMap<DateTime<Utc>, Vec<Option<f64>>> {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in self.rows.values_mut() {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// Set a cell unless it already holds a value. Returns `false` when the
    /// cell was already filled (a duplicate).
    pub fn insert(&mut self, timestamp: DateTime<Utc>, column: &str, value: f64) -> bool {
        let idx = self.ensure_column(column);
        let width = self.columns.len();
        let row = self
            .rows
            .entry(timestamp)
            .or_insert_with(|| vec![None; width]);
        match row[idx] {
            Some(_) => false,
            None => {
                row[idx] = Some(value);
                true
            }
        }
    }

    /// Insert a full row laid out as `columns`, keeping existing cells.
    pub fn insert_row(&mut self, timestamp: DateTime<Utc>, columns: &[String], values: &[Option<f64>]) {
        for (column, value) in columns.iter().zip(values) {
            if let Some(v) = value {
                self.insert(timestamp, column, *v);
            } else {
                self.ensure_column(column);
            }
        }
    }

    pub fn merge(&mut self, other: &SeriesTable) {
        for (timestamp, values) in &other.rows {
            self.insert_row(*timestamp, &other.columns, values);
        }
    }

    pub fn column(&self, name: &str) -> Option<TimeSeries> {
        let idx = self.column_index(name)?;
        Some(TimeSeries::new(
            name,
            self.rows.iter().filter_map(|(timestamp, row)| {
                row[idx].map(|value| Sample {
                    timestamp: *timestamp,
                    value,
                })
            }),
        ))
    }

    /// First of `names` present in the table.
    pub fn column_any(&self, names: &[&str]) -> Option<TimeSeries> {
        names.iter().find_map(|name| self.column(name))
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.rows.keys().map(|ts| ts.year()).collect();
        years.dedup();
        years
    }

    /// Rows of one calendar year as a new table with the same columns.
    pub fn year_slice(&self, year: i32) -> SeriesTable {
        SeriesTable {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|(ts, _)| ts.year() == year)
                .map(|(ts, row)| (*ts, row.clone()))
                .collect(),
        }
    }

    /// Combine the cells of two columns row by row. Rows where `combine`
    /// returns `None` are left out.
    pub fn combine_columns(
        &self,
        name: &str,
        left: &str,
        right: &str,
        combine: impl Fn(Option<f64>, Option<f64>) -> Option<f64>,
    ) -> TimeSeries {
        let left_idx = self.column_index(left);
        let right_idx = self.column_index(right);
        TimeSeries::new(
            name,
            self.rows.iter().filter_map(|(timestamp, row)| {
                let l = left_idx.and_then(|i| row[i]);
                let r = right_idx.and_then(|i| row[i]);
                combine(l, r).map(|value| Sample {
                    timestamp: *timestamp,
                    value,
                })
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_series_drops_nan_and_keeps_first_duplicate() {
        let series = TimeSeries::new(
            "price",
            vec![
                Sample { timestamp: ts(1, 0), value: 5.0 },
                Sample { timestamp: ts(0, 0), value: f64::NAN },
                Sample { timestamp: ts(1, 0), value: 9.0 },
                Sample { timestamp: ts(2, 0), value: 7.0 },
            ],
        );

        assert_eq!(series.len(), 2);
        assert_eq!(series.samples()[0].value, 5.0);
        assert_eq!(series.first_timestamp(), Some(ts(1, 0)));
    }

    #[test]
    fn test_dominant_step_prefers_most_common_gap() {
        let stamps = vec![ts(0, 0), ts(0, 15), ts(0, 30), ts(0, 45), ts(2, 0)];
        assert_eq!(dominant_step(stamps), Some(Duration::minutes(15)));
        assert_eq!(dominant_step(vec![ts(0, 0)]), None);
    }

    #[test]
    fn test_value_covering_respects_interval_end() {
        let series = TimeSeries::new(
            "da",
            vec![
                Sample { timestamp: ts(0, 0), value: 10.0 },
                Sample { timestamp: ts(1, 0), value: 20.0 },
            ],
        );

        assert_eq!(series.value_covering(ts(0, 45), Duration::hours(1)), Some(10.0));
        assert_eq!(series.value_covering(ts(1, 15), Duration::hours(1)), Some(20.0));
        assert_eq!(series.value_covering(ts(2, 15), Duration::hours(1)), None);
    }

    #[test]
    fn test_table_insert_reports_duplicates_and_extracts_columns() {
        let mut table = SeriesTable::new();
        assert!(table.insert(ts(0, 0), "up_price", 4.0));
        assert!(table.insert(ts(0, 0), "down_price", 2.0));
        assert!(!table.insert(ts(0, 0), "up_price", 8.0));
        assert!(table.insert(ts(0, 15), "up_price", 6.0));

        assert_eq!(table.columns(), &["up_price".to_string(), "down_price".to_string()]);
        let up = table.column("up_price").unwrap();
        assert_eq!(up.len(), 2);
        assert_eq!(up.samples()[0].value, 4.0);

        let down = table.column("down_price").unwrap();
        assert_eq!(down.len(), 1);

        let blended = table.combine_columns("mid", "up_price", "down_price", |u, d| match (u, d) {
            (Some(u), Some(d)) => Some((u + d) / 2.0),
            _ => None,
        });
        assert_eq!(blended.len(), 1);
        assert_eq!(blended.samples()[0].value, 3.0);
    }
}
