//! Data loader for per-asset daily CSV tables.
//!
//! Each `<ticker>_data.csv` file in the data directory holds one asset with
//! at least the following columns:
//! - Date (YYYY-MM-DD), Close, Risk-free Rate
//!
//! Optional precomputed columns are used when present:
//! - 50_day_MA, 100_day_MA, Log_return

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

use super::types::{AssetHistory, RawBar};
use crate::error::PreconditionError;

/// Required columns in every asset file.
pub const REQUIRED_COLUMNS: &[&str] = &["Date", "Close", "Risk-free Rate"];

/// Optional precomputed columns.
pub const OPTIONAL_COLUMNS: &[&str] = &["50_day_MA", "100_day_MA", "Log_return"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Missing column {column} in {path}")]
    MissingColumn { path: String, column: String },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid history: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV loader for asset histories.
pub struct HistoryLoader {
    data_dir: PathBuf,
}

impl HistoryLoader {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Asset identifier for a file: stem without a trailing `_data`, upper-cased.
    pub fn asset_id(path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_string_lossy();
        let stem = stem.strip_suffix("_data").unwrap_or(&stem);
        Some(stem.to_uppercase())
    }

    /// List CSV files in the data directory, sorted by name.
    pub fn available_files(&self) -> Result<Vec<PathBuf>, LoaderError> {
        if !self.data_dir.exists() {
            return Err(LoaderError::FileNotFound(
                self.data_dir.display().to_string(),
            ));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "csv").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load every asset in the data directory.
    pub fn load_all(&self) -> Result<Vec<AssetHistory>, LoaderError> {
        let files = self.available_files()?;
        if files.is_empty() {
            return Err(LoaderError::InvalidData(format!(
                "No CSV files in {}",
                self.data_dir.display()
            )));
        }
        files.iter().map(|path| self.load_file(path)).collect()
    }

    /// Load a single asset file.
    pub fn load_file(&self, path: &Path) -> Result<AssetHistory, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }
        let asset = Self::asset_id(path)
            .ok_or_else(|| LoaderError::InvalidData(format!("Bad file name: {}", path.display())))?;

        let mut lf = LazyCsvReader::new(path).with_has_header(true).finish()?;
        let schema = lf.collect_schema()?;

        for column in REQUIRED_COLUMNS {
            if !schema.contains(column) {
                return Err(LoaderError::MissingColumn {
                    path: path.display().to_string(),
                    column: column.to_string(),
                });
            }
        }

        let mut exprs = vec![
            col("Date").cast(DataType::String),
            col("Close").cast(DataType::Float64),
            col("Risk-free Rate").cast(DataType::Float64),
        ];
        let present: Vec<&str> = OPTIONAL_COLUMNS
            .iter()
            .copied()
            .filter(|c| schema.contains(c))
            .collect();
        exprs.extend(present.iter().map(|c| col(*c).cast(DataType::Float64)));

        let df = lf.select(exprs).collect()?;
        let rows = dataframe_to_rows(&df, &present)?;
        Ok(AssetHistory::from_rows(&asset, rows)?)
    }
}

/// Convert a loaded frame into raw rows, sorted by date.
fn dataframe_to_rows(df: &DataFrame, optional: &[&str]) -> Result<Vec<RawBar>, LoaderError> {
    let dates = df.column("Date")?.str()?;
    let closes = df.column("Close")?.f64()?;
    let rates = df.column("Risk-free Rate")?.f64()?;

    let optional_values = |name: &str| -> Result<Vec<Option<f64>>, LoaderError> {
        if optional.contains(&name) {
            Ok(df.column(name)?.f64()?.into_iter().collect())
        } else {
            Ok(vec![None; df.height()])
        }
    };
    let ma_50 = optional_values("50_day_MA")?;
    let ma_100 = optional_values("100_day_MA")?;
    let log_return = optional_values("Log_return")?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let date_str = dates
            .get(i)
            .ok_or_else(|| LoaderError::InvalidData(format!("Missing Date at row {}", i)))?;
        let date = parse_date(date_str)?;
        let close = closes
            .get(i)
            .ok_or_else(|| LoaderError::InvalidData(format!("Missing Close on {}", date)))?;
        // Treasury rates are not posted on holidays; carry the last one forward.
        let risk_free_rate = match rates.get(i) {
            Some(r) => r,
            None => rows
                .last()
                .map(|r: &RawBar| r.risk_free_rate)
                .ok_or_else(|| LoaderError::InvalidData(format!("Missing Risk-free Rate on {}", date)))?,
        };

        rows.push(RawBar {
            date,
            close,
            risk_free_rate,
            ma_50: ma_50[i],
            ma_100: ma_100[i],
            log_return: log_return[i],
        });
    }

    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

/// Parse a date, ignoring any time-of-day suffix.
fn parse_date(raw: &str) -> Result<NaiveDate, LoaderError> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| LoaderError::InvalidData(format!("Invalid date {}: {}", raw, e)))
}

/// Verify that every history covers exactly the same dates.
pub fn check_aligned(histories: &[AssetHistory]) -> Result<(), PreconditionError> {
    let Some(reference) = histories.first() else {
        return Ok(());
    };
    for history in &histories[1..] {
        for bar in &reference.bars {
            if history.index_of(bar.date).is_none() {
                return Err(PreconditionError::MisalignedDates {
                    asset: history.asset.clone(),
                    date: bar.date,
                });
            }
        }
        for bar in &history.bars {
            if reference.index_of(bar.date).is_none() {
                return Err(PreconditionError::MisalignedDates {
                    asset: reference.asset.clone(),
                    date: bar.date,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cds_risk_loader_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_asset_id() {
        assert_eq!(
            HistoryLoader::asset_id(Path::new("/tmp/spy_data.csv")),
            Some("SPY".to_string())
        );
        assert_eq!(
            HistoryLoader::asset_id(Path::new("qqq.csv")),
            Some("QQQ".to_string())
        );
    }

    #[test]
    fn test_load_file_with_required_columns() {
        let dir = temp_dir("required");
        let path = write_csv(
            &dir,
            "spy_data.csv",
            "Date,Close,Risk-free Rate\n\
             2024-01-03,101.0,0.04\n\
             2024-01-02,100.0,0.04\n\
             2024-01-04,102.0,\n",
        );

        let history = HistoryLoader::new(&dir).load_file(&path).unwrap();
        assert_eq!(history.asset, "SPY");
        assert_eq!(history.len(), 3);
        assert_eq!(history.bars[0].close, 100.0);
        assert_eq!(history.bars[2].risk_free_rate, 0.04);
        assert!(history.bars[1].log_return.is_some());
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = temp_dir("missing");
        let path = write_csv(&dir, "iwm.csv", "Date,Close\n2024-01-02,100.0\n");

        let err = HistoryLoader::new(&dir).load_file(&path).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn { ref column, .. } if column == "Risk-free Rate"));
    }

    #[test]
    fn test_load_all_reads_directory() {
        let dir = temp_dir("all");
        write_csv(&dir, "a_data.csv", "Date,Close,Risk-free Rate,50_day_MA\n2024-01-02,10,0.03,9.5\n");
        write_csv(&dir, "b_data.csv", "Date,Close,Risk-free Rate\n2024-01-02,20,0.03\n");
        write_csv(&dir, "notes.txt", "ignored");

        let histories = HistoryLoader::new(&dir).load_all().unwrap();
        assert_eq!(histories.len(), 2);
        assert_eq!(histories[0].asset, "A");
        assert_eq!(histories[0].bars[0].ma_50, Some(9.5));
        assert_eq!(histories[1].asset, "B");
    }

    #[test]
    fn test_check_aligned() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let a = AssetHistory::from_closes("A", &[(d1, 1.0), (d2, 1.0)], 0.0).unwrap();
        let b = AssetHistory::from_closes("B", &[(d1, 1.0), (d2, 1.0)], 0.0).unwrap();
        let c = AssetHistory::from_closes("C", &[(d1, 1.0)], 0.0).unwrap();

        assert!(check_aligned(&[a.clone(), b]).is_ok());
        assert_eq!(
            check_aligned(&[a, c]),
            Err(PreconditionError::MisalignedDates {
                asset: "C".to_string(),
                date: d2
            })
        );
    }
}
