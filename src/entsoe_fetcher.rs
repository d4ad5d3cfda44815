use crate::dataset_catalog::{DatasetSpec, ENTSOE_API_URL};
use crate::entsoe_document::{parse_document, DocumentError, ParsedDocument};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use revenue_calculator::data_loader::write_partitioned;
use revenue_calculator::SeriesTable;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API key rejected (HTTP 401)")]
    Unauthorized,

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited | FetchError::Transport(_) => true,
            FetchError::Http { status, .. } => *status >= 500,
            FetchError::Unauthorized | FetchError::Decode(_) => false,
        }
    }
}

impl From<DocumentError> for FetchError {
    fn from(err: DocumentError) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Anything that can answer a query with an XML document.
pub trait DocumentSource {
    fn fetch_document(&self, query: &[(String, String)]) -> Result<String, FetchError>;
}

pub struct EntsoeClient {
    client: Client,
    base_url: String,
}

impl EntsoeClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(ENTSOE_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl DocumentSource for EntsoeClient {
    fn fetch_document(&self, query: &[(String, String)]) -> Result<String, FetchError> {
        let response = self.client.get(&self.base_url).query(query).send()?;
        let status = response.status();
        let body = response.text()?;

        match status {
            s if s.is_success() => Ok(body),
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
            // "no matching data" comes back as a 400 carrying an acknowledgement
            StatusCode::BAD_REQUEST if body.contains("Acknowledgement_MarketDocument") => Ok(body),
            s => Err(FetchError::Http {
                status: s.as_u16(),
                body: body.chars().take(300).collect(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub attempts: u32,
    pub retry_pause: Duration,
    pub request_pacing: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_pause: Duration::from_secs(2),
            request_pacing: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    Written(Vec<PathBuf>),
    Empty,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub dataset: String,
    pub rows: usize,
    pub duplicates: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub status: FetchStatus,
}

impl FetchOutcome {
    fn failed(dataset: &str, message: String) -> Self {
        Self {
            dataset: dataset.to_string(),
            rows: 0,
            duplicates: 0,
            first: None,
            last: None,
            status: FetchStatus::Failed(message),
        }
    }
}

pub struct Fetcher<S: DocumentSource> {
    source: S,
    api_key: String,
    settings: FetchSettings,
}

impl<S: DocumentSource> Fetcher<S> {
    pub fn new(source: S, api_key: impl Into<String>, settings: FetchSettings) -> Self {
        Self {
            source,
            api_key: api_key.into(),
            settings,
        }
    }

    fn fetch_with_retry(&self, query: &[(String, String)]) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            match self.source.fetch_document(query) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.settings.attempts => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.settings.attempts, err);
                    thread::sleep(self.settings.retry_pause);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Request every window of `[start, end)` and merge the documents.
    pub fn fetch_dataset(
        &self,
        spec: &DatasetSpec,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ParsedDocument, FetchError> {
        let mut merged = ParsedDocument::default();
        for (i, (from, to)) in spec.request_windows(start, end).into_iter().enumerate() {
            if i > 0 {
                thread::sleep(self.settings.request_pacing);
            }
            debug!("{}: requesting {} .. {}", spec.name, from, to);
            let body = self.fetch_with_retry(&spec.query(&self.api_key, from, to))?;
            let parsed = parse_document(&body, spec.columns)?;
            merged.duplicates += parsed.duplicates + merge_counting(&mut merged.table, &parsed.table);
        }
        Ok(merged)
    }

    /// Fetch each dataset in turn and write its yearly partitions. A failed
    /// dataset is reported and skipped; only a rejected API key stops the run.
    pub fn fetch_all(
        &self,
        specs: &[DatasetSpec],
        start: NaiveDate,
        end: NaiveDate,
        data_dir: &Path,
    ) -> Result<Vec<FetchOutcome>> {
        let pb = ProgressBar::new(specs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} - {msg}")?,
        );

        let mut outcomes = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.settings.request_pacing);
            }
            pb.set_message(spec.name.clone());
            info!("Fetching {} ({})", spec.name, spec.description);

            let outcome = match self.fetch_dataset(spec, start, end) {
                Ok(parsed) => self.persist(spec, parsed, data_dir)?,
                Err(FetchError::Unauthorized) => {
                    pb.finish_and_clear();
                    anyhow::bail!("ENTSO-E rejected the API key (HTTP 401)");
                }
                Err(err) => {
                    warn!("Skipping {}: {}", spec.name, err);
                    FetchOutcome::failed(&spec.name, err.to_string())
                }
            };
            outcomes.push(outcome);
            pb.inc(1);
        }
        pb.finish_with_message("done");
        Ok(outcomes)
    }

    fn persist(&self, spec: &DatasetSpec, parsed: ParsedDocument, data_dir: &Path) -> Result<FetchOutcome> {
        let table = parsed.table;
        if parsed.duplicates > 0 {
            warn!("{}: dropped {} duplicate points", spec.name, parsed.duplicates);
        }
        let status = if table.is_empty() {
            info!("{}: no data published for the requested period", spec.name);
            FetchStatus::Empty
        } else {
            let paths = write_partitioned(data_dir, &spec.name, &table)
                .with_context(|| format!("Failed to write {}", spec.name))?;
            FetchStatus::Written(paths)
        };
        Ok(FetchOutcome {
            dataset: spec.name.clone(),
            rows: table.len(),
            duplicates: parsed.duplicates,
            first: table.rows().keys().next().copied(),
            last: table.rows().keys().next_back().copied(),
            status,
        })
    }
}

/// Merge `other` into `table`, returning the number of cells that were
/// already present.
fn merge_counting(table: &mut SeriesTable, other: &SeriesTable) -> usize {
    let mut duplicates = 0;
    for (timestamp, row) in other.rows() {
        for (column, value) in other.columns().iter().zip(row) {
            if let Some(value) = value {
                if !table.insert(*timestamp, column, *value) {
                    duplicates += 1;
                }
            }
        }
    }
    duplicates
}

pub fn print_fetch_summary(outcomes: &[FetchOutcome]) {
    let fmt_ts = |ts: Option<DateTime<Utc>>| {
        ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "-".to_string())
    };

    println!("\n📊 Fetch Summary");
    println!("{}", "=".repeat(100));
    println!(
        "{:<32} {:>8} {:>22} {:>22}  Status",
        "Dataset", "Rows", "First", "Last"
    );
    println!("{}", "-".repeat(100));
    for outcome in outcomes {
        let status = match &outcome.status {
            FetchStatus::Written(paths) => format!("✅ {} files", paths.len()),
            FetchStatus::Empty => "⚠️  no data".to_string(),
            FetchStatus::Failed(msg) => format!("❌ {msg}"),
        };
        println!(
            "{:<32} {:>8} {:>22} {:>22}  {}",
            outcome.dataset,
            outcome.rows,
            fmt_ts(outcome.first),
            fmt_ts(outcome.last),
            status
        );
    }

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.status, FetchStatus::Failed(_)))
        .count();
    println!("{}", "=".repeat(100));
    println!("{} datasets, {} failed", outcomes.len(), failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset_catalog::{catalog, Area};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct ScriptedSource {
        responses: RefCell<VecDeque<Result<String, FetchError>>>,
        calls: RefCell<usize>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String, FetchError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(0),
            }
        }
    }

    impl DocumentSource for &ScriptedSource {
        fn fetch_document(&self, _query: &[(String, String)]) -> Result<String, FetchError> {
            *self.calls.borrow_mut() += 1;
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(EMPTY_ACK.to_string()))
        }
    }

    const EMPTY_ACK: &str = "<Acknowledgement_MarketDocument><Reason><code>999</code><text>No matching data found</text></Reason></Acknowledgement_MarketDocument>";

    fn da_doc(day: u32, price: f64) -> String {
        format!(
            "<Publication_MarketDocument><TimeSeries><Period>\
             <timeInterval><start>2024-01-{day:02}T00:00Z</start><end>2024-01-{day:02}T01:00Z</end></timeInterval>\
             <resolution>PT60M</resolution>\
             <Point><position>1</position><price.amount>{price}</price.amount></Point>\
             </Period></TimeSeries></Publication_MarketDocument>"
        )
    }

    fn quick() -> FetchSettings {
        FetchSettings {
            attempts: 3,
            retry_pause: Duration::ZERO,
            request_pacing: Duration::ZERO,
        }
    }

    fn spec(name: &str) -> DatasetSpec {
        catalog(Area::Lithuania)
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_rate_limit_is_retried() {
        let source = ScriptedSource::new(vec![Err(FetchError::RateLimited), Ok(da_doc(1, 50.0))]);
        let fetcher = Fetcher::new(&source, "key", quick());
        let parsed = fetcher.fetch_dataset(&spec("da_prices"), jan(1), jan(2)).unwrap();
        assert_eq!(parsed.table.len(), 1);
        assert_eq!(*source.calls.borrow(), 2);
    }

    #[test]
    fn test_unauthorized_is_not_retried() {
        let source = ScriptedSource::new(vec![Err(FetchError::Unauthorized)]);
        let fetcher = Fetcher::new(&source, "key", quick());
        let result = fetcher.fetch_dataset(&spec("da_prices"), jan(1), jan(2));
        assert!(matches!(result, Err(FetchError::Unauthorized)));
        assert_eq!(*source.calls.borrow(), 1);
    }

    #[test]
    fn test_server_errors_give_up_after_three_attempts() {
        let source = ScriptedSource::new(
            (0..3)
                .map(|_| Err(FetchError::Http { status: 503, body: String::new() }))
                .collect(),
        );
        let fetcher = Fetcher::new(&source, "key", quick());
        let result = fetcher.fetch_dataset(&spec("da_prices"), jan(1), jan(2));
        assert!(matches!(result, Err(FetchError::Http { status: 503, .. })));
        assert_eq!(*source.calls.borrow(), 3);
    }

    #[test]
    fn test_fetch_all_skips_failed_datasets_and_writes_the_rest() {
        let dir = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![
            Ok(da_doc(1, 42.0)),
            Err(FetchError::Http { status: 404, body: "not found".to_string() }),
            Ok(EMPTY_ACK.to_string()),
        ]);
        let fetcher = Fetcher::new(&source, "key", quick());
        let specs = vec![spec("da_prices"), spec("actual_load"), spec("imbalance_prices")];
        let outcomes = fetcher.fetch_all(&specs, jan(1), jan(2), dir.path()).unwrap();

        assert!(matches!(outcomes[0].status, FetchStatus::Written(ref p) if p.len() == 1));
        assert!(matches!(outcomes[1].status, FetchStatus::Failed(_)));
        assert_eq!(outcomes[2].status, FetchStatus::Empty);
        assert!(dir.path().join("da_prices").join("da_prices_2024.csv").exists());
        assert!(!dir.path().join("imbalance_prices").exists());
    }

    #[test]
    fn test_fetch_all_stops_on_unauthorized() {
        let dir = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![Err(FetchError::Unauthorized)]);
        let fetcher = Fetcher::new(&source, "bad", quick());
        let specs = vec![spec("da_prices"), spec("actual_load")];
        assert!(fetcher.fetch_all(&specs, jan(1), jan(2), dir.path()).is_err());
    }

    #[test]
    fn test_overlapping_windows_keep_first_value() {
        let mut table = SeriesTable::new();
        let first = parse_document(&da_doc(1, 10.0), crate::dataset_catalog::ColumnScheme::Single("price")).unwrap();
        let second = parse_document(&da_doc(1, 99.0), crate::dataset_catalog::ColumnScheme::Single("price")).unwrap();
        assert_eq!(merge_counting(&mut table, &first.table), 0);
        assert_eq!(merge_counting(&mut table, &second.table), 1);
        assert_eq!(table.column("price").unwrap().samples()[0].value, 10.0);
    }
}
