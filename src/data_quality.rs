use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use revenue_calculator::data_loader::parse_timestamp;
use revenue_calculator::series::dominant_step;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Quality findings for one CSV partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileQuality {
    pub path: PathBuf,
    pub rows: usize,
    pub malformed_rows: usize,
    pub duplicate_timestamps: usize,
    pub gaps: usize,
    pub unsorted_rows: usize,
    pub step_minutes: Option<i64>,
}

impl FileQuality {
    pub fn issues(&self) -> usize {
        self.malformed_rows + self.duplicate_timestamps + self.gaps + self.unsorted_rows
    }
}

pub fn find_csv_files(data_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    files.sort();
    files
}

pub fn check_file(path: &Path) -> Result<FileQuality> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let width = reader.headers()?.len();

    let mut quality = FileQuality {
        path: path.to_path_buf(),
        ..Default::default()
    };
    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();

    for record in reader.records() {
        let Ok(record) = record else {
            quality.malformed_rows += 1;
            continue;
        };
        quality.rows += 1;
        let parsed = record.get(0).and_then(parse_timestamp);
        match parsed {
            Some(ts) if record.len() == width => timestamps.push(ts),
            _ => quality.malformed_rows += 1,
        }
    }

    quality.unsorted_rows = timestamps.windows(2).filter(|w| w[1] < w[0]).count();

    let mut seen = HashSet::with_capacity(timestamps.len());
    quality.duplicate_timestamps = timestamps.iter().filter(|ts| !seen.insert(**ts)).count();

    let mut sorted = timestamps;
    sorted.sort_unstable();
    sorted.dedup();
    if let Some(step) = dominant_step(sorted.iter().copied()) {
        quality.step_minutes = Some(step.num_minutes());
        quality.gaps = sorted.windows(2).filter(|w| w[1] - w[0] > step).count();
    }

    Ok(quality)
}

/// Check every CSV under `data_dir` and print a per-file report. Returns the
/// total number of issues found.
pub fn verify_data_quality(data_dir: &Path) -> Result<usize> {
    println!("\n🔍 Data Quality Verification");
    println!("{}", "=".repeat(60));

    let files = find_csv_files(data_dir);
    if files.is_empty() {
        println!("\n⚠️  No CSV files found under {}", data_dir.display());
        return Ok(0);
    }
    println!("\n📁 Checking {} files in {}", files.len(), data_dir.display());

    let results: Vec<Result<FileQuality>> = files.par_iter().map(|f| check_file(f)).collect();

    let mut total_issues = 0;
    for result in results {
        let quality = result?;
        let name = quality
            .path
            .strip_prefix(data_dir)
            .unwrap_or(&quality.path)
            .display()
            .to_string();
        let step = quality
            .step_minutes
            .map(|m| format!("{m} min"))
            .unwrap_or_else(|| "?".to_string());
        println!("\n  Verifying: {} ({} rows, {} step)", name, quality.rows, step);

        if quality.issues() == 0 {
            println!("    ✅ No issues found");
            continue;
        }
        if quality.malformed_rows > 0 {
            println!("    ❌ {} malformed rows", quality.malformed_rows);
        }
        if quality.duplicate_timestamps > 0 {
            println!("    ❌ {} duplicate timestamps", quality.duplicate_timestamps);
        }
        if quality.gaps > 0 {
            println!("    ⚠️  {} gaps larger than {}", quality.gaps, step);
        }
        if quality.unsorted_rows > 0 {
            println!("    ⚠️  {} rows out of order", quality.unsorted_rows);
        }
        total_issues += quality.issues();
    }

    println!("\n{}", "=".repeat(60));
    if total_issues == 0 {
        println!("✅ Data quality verification passed!");
    } else {
        println!("⚠️  Found {} total issues", total_issues);
    }
    Ok(total_issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_clean_file_has_no_issues() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("da_prices_2024.csv");
        fs::write(
            &path,
            "timestamp,price\n2024-01-01T00:00:00Z,10\n2024-01-01T01:00:00Z,11\n2024-01-01T02:00:00Z,12\n",
        )
        .unwrap();
        let quality = check_file(&path).unwrap();
        assert_eq!(quality.rows, 3);
        assert_eq!(quality.step_minutes, Some(60));
        assert_eq!(quality.issues(), 0);
    }

    #[test]
    fn test_detects_each_kind_of_issue() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("imbalance_prices_2024.csv");
        fs::write(
            &path,
            "timestamp,long,short\n\
             2024-01-01T00:00:00Z,1,2\n\
             2024-01-01T00:15:00Z,1,2\n\
             2024-01-01T00:30:00Z,1,2\n\
             2024-01-01T00:15:00Z,1,2\n\
             2024-01-01T02:00:00Z,1,2\n\
             not-a-time,1,2\n",
        )
        .unwrap();
        let quality = check_file(&path).unwrap();
        assert_eq!(quality.malformed_rows, 1);
        assert_eq!(quality.duplicate_timestamps, 1);
        assert_eq!(quality.unsorted_rows, 1);
        assert_eq!(quality.gaps, 1);
        assert_eq!(quality.step_minutes, Some(15));
    }

    #[test]
    fn test_walks_nested_dataset_dirs() {
        let dir = TempDir::new().unwrap();
        for dataset in ["da_prices", "actual_load"] {
            let sub = dir.path().join(dataset);
            fs::create_dir_all(&sub).unwrap();
            fs::write(sub.join(format!("{dataset}_2024.csv")), "timestamp,v\n").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert_eq!(find_csv_files(dir.path()).len(), 2);
        assert_eq!(verify_data_quality(dir.path()).unwrap(), 0);
    }
}
