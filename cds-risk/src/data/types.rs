//! Core data types for asset price histories.
//!
//! An asset history is an ordered daily series of closes plus the columns the
//! strategy reads from it: 50/100-step moving averages, log-returns, a
//! rolling realized volatility and the risk-free rate on that date.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;

/// Window of the rolling realized volatility column.
pub const ROLLING_VOL_WINDOW: usize = 20;

/// Trading days used to annualize the rolling volatility column.
pub const ROLLING_VOL_ANNUALIZATION: f64 = 252.0;

/// One observation of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Observation date.
    pub date: NaiveDate,
    /// Closing price.
    pub close: f64,
    /// 50-step trailing moving average (None until the window fills).
    pub ma_50: Option<f64>,
    /// 100-step trailing moving average (None until the window fills).
    pub ma_100: Option<f64>,
    /// Log-return from the previous close (None for the first row).
    pub log_return: Option<f64>,
    /// Annualized 20-step rolling volatility of log-returns.
    pub volatility: Option<f64>,
    /// Risk-free rate as a fraction (0.04 = 4%).
    pub risk_free_rate: f64,
}

/// Raw input row before derived columns are computed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub date: NaiveDate,
    pub close: f64,
    pub risk_free_rate: f64,
    pub ma_50: Option<f64>,
    pub ma_100: Option<f64>,
    pub log_return: Option<f64>,
}

impl RawBar {
    pub fn new(date: NaiveDate, close: f64, risk_free_rate: f64) -> Self {
        Self {
            date,
            close,
            risk_free_rate,
            ma_50: None,
            ma_100: None,
            log_return: None,
        }
    }
}

/// Price history of a single asset, sorted ascending by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetHistory {
    /// Asset identifier (e.g., "SPY").
    pub asset: String,
    /// Observations in ascending date order.
    pub bars: Vec<PriceBar>,
}

impl AssetHistory {
    /// Build a history from raw rows, deriving every missing column.
    ///
    /// Moving averages and log-returns supplied on the rows are kept; absent
    /// ones are computed from the closes. Fails if dates are not strictly
    /// ascending or a close is not positive.
    pub fn from_rows(asset: &str, rows: Vec<RawBar>) -> Result<Self, PreconditionError> {
        for (i, row) in rows.iter().enumerate() {
            if !(row.close > 0.0) || !row.close.is_finite() {
                return Err(PreconditionError::NonPositivePrice(row.close));
            }
            if i > 0 && rows[i - 1].date >= row.date {
                return Err(PreconditionError::UnsortedHistory {
                    asset: asset.to_string(),
                    row: i,
                });
            }
        }

        let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
        let ma_50 = trailing_mean(&closes, 50);
        let ma_100 = trailing_mean(&closes, 100);
        let log_returns = log_returns(&closes);
        let volatility = rolling_volatility(&log_returns, ROLLING_VOL_WINDOW);

        let bars = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| PriceBar {
                date: row.date,
                close: row.close,
                ma_50: row.ma_50.or(ma_50[i]),
                ma_100: row.ma_100.or(ma_100[i]),
                log_return: row.log_return.or(log_returns[i]),
                volatility: volatility[i],
                risk_free_rate: row.risk_free_rate,
            })
            .collect();

        Ok(Self {
            asset: asset.to_string(),
            bars,
        })
    }

    /// Convenience constructor from (date, close) pairs and a flat risk-free rate.
    pub fn from_closes(
        asset: &str,
        closes: &[(NaiveDate, f64)],
        risk_free_rate: f64,
    ) -> Result<Self, PreconditionError> {
        let rows = closes
            .iter()
            .map(|&(date, close)| RawBar::new(date, close, risk_free_rate))
            .collect();
        Self::from_rows(asset, rows)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Last known close.
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Risk-free rate of the most recent observation.
    pub fn last_risk_free_rate(&self) -> Option<f64> {
        self.bars.last().map(|b| b.risk_free_rate)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Index of the bar on `date`, if present.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// Bars dated within the trailing `days` calendar days of `as_of` (inclusive).
    pub fn trailing_window(&self, as_of: NaiveDate, days: i64) -> &[PriceBar] {
        let start = as_of - Duration::days(days);
        let lo = self.bars.partition_point(|b| b.date < start);
        let hi = self.bars.partition_point(|b| b.date <= as_of);
        &self.bars[lo..hi.max(lo)]
    }

    /// Calendar days covered by the history.
    pub fn span_days(&self) -> i64 {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => (last - first).num_days(),
            _ => 0,
        }
    }
}

/// Trailing arithmetic mean. The first `window - 1` entries are None.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out[i] = Some(sum / window as f64);
    }
    out
}

/// Log-returns of consecutive values. The first entry is None.
pub fn log_returns(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(values.windows(2).map(|w| Some((w[1] / w[0]).ln())));
    out
}

/// Rolling sample standard deviation of log-returns, annualized by sqrt(252).
fn rolling_volatility(returns: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; returns.len()];
    if window < 2 {
        return out;
    }
    for i in 0..returns.len() {
        if i + 1 < window {
            continue;
        }
        let slice: Option<Vec<f64>> = returns[i + 1 - window..=i].iter().copied().collect();
        if let Some(slice) = slice {
            let mean = slice.iter().sum::<f64>() / window as f64;
            let var = slice.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
            out[i] = Some((var * ROLLING_VOL_ANNUALIZATION).sqrt());
        }
    }
    out
}
