use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::series::{Interval, PricePoint, QueryKey, Range};

/// Historical payload as served by the data backend: parallel arrays of
/// epoch-second timestamps and closing prices, plus an optional server-side
/// regression projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub timestamps: Vec<i64>,
    pub prices: Vec<f64>,
    #[serde(default)]
    pub regression_data: Option<Vec<f64>>,
}

impl HistoricalSeries {
    /// Pair the arrays up into points. Mismatched lengths are truncated to
    /// the shorter side rather than rejected.
    pub fn into_points(self) -> (Vec<PricePoint>, Option<Vec<f64>>) {
        if self.timestamps.len() != self.prices.len() {
            warn!(
                "History payload has {} timestamps but {} prices, truncating",
                self.timestamps.len(),
                self.prices.len()
            );
        }
        let points = self
            .timestamps
            .into_iter()
            .zip(self.prices)
            .map(|(timestamp, price)| PricePoint { timestamp, price })
            .collect();
        (points, self.regression_data)
    }
}

/// One live quote: epoch seconds plus the latest price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LivePoint {
    pub time: i64,
    pub price: f64,
}

/// Where price data comes from. The engine only ever talks to this trait,
/// so tests can substitute a scripted source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_history(&self, query: &QueryKey) -> Result<HistoricalSeries>;
    async fn fetch_live(&self, ticker: &str) -> Result<LivePoint>;
}

/// HTTP-backed source hitting the market data service.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpSource {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MarketDataSource for HttpSource {
    async fn fetch_history(&self, query: &QueryKey) -> Result<HistoricalSeries> {
        let url = format!("{}/stock-data", self.base_url);
        debug!("Fetching history for {} from {}", query, url);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("ticker", query.ticker.clone()),
                ("range", query.range.to_string()),
                ("interval", query.interval.to_string()),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::DataUnavailable(format!("no data for {}", query)));
        }

        let series = resp
            .error_for_status()?
            .json::<HistoricalSeries>()
            .await
            .map_err(|e| AppError::DataUnavailable(format!("bad history payload: {}", e)))?;
        if series.prices.is_empty() {
            return Err(AppError::DataUnavailable(format!(
                "empty series for {}",
                query
            )));
        }
        Ok(series)
    }

    async fn fetch_live(&self, ticker: &str) -> Result<LivePoint> {
        let url = format!("{}/stock/{}/live", self.base_url, ticker);
        let point = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<LivePoint>()
            .await
            .map_err(|e| AppError::DataUnavailable(format!("bad live payload: {}", e)))?;

        if !point.price.is_finite() {
            return Err(AppError::DataUnavailable(format!(
                "live quote for {} has no finite price",
                ticker
            )));
        }
        Ok(point)
    }
}

/// Random-walk source for development without a data backend. Each ticker
/// keeps its last price so live quotes continue where history left off.
#[derive(Debug, Default)]
pub struct SimulatedSource {
    last_price: Mutex<HashMap<String, f64>>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        SimulatedSource::default()
    }

    /// Bars a query would cover, assuming a 6.5 hour session and 21 trading
    /// days per month.
    fn bar_count(range: Range, interval: Interval) -> usize {
        if interval == Interval::OneDay {
            return match range {
                Range::OneDay => 2,
                Range::FiveDays => 5,
                Range::OneMonth => 21,
                Range::SixMonths => 126,
                Range::OneYear => 252,
            };
        }
        let session_minutes = match range {
            Range::OneDay => 390,
            Range::FiveDays => 1_950,
            Range::OneMonth => 8_190,
            Range::SixMonths => 49_140,
            Range::OneYear => 98_280,
        };
        (session_minutes * 60 / interval.step_secs() as usize).max(2)
    }

    fn walk(&self, ticker: &str, steps: usize) -> Vec<f64> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut guard = match self.last_price.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut price = *guard.entry(ticker.to_string()).or_insert(100.0);
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            price = (price + rng.gen_range(-0.5..0.5)).max(1.0);
            out.push(price);
        }
        guard.insert(ticker.to_string(), price);
        out
    }
}

#[async_trait]
impl MarketDataSource for SimulatedSource {
    async fn fetch_history(&self, query: &QueryKey) -> Result<HistoricalSeries> {
        let count = SimulatedSource::bar_count(query.range, query.interval);
        let step = query.interval.step_secs();
        let end = chrono::Utc::now().timestamp();
        let timestamps: Vec<i64> = (0..count)
            .map(|k| end - step * (count - 1 - k) as i64)
            .collect();
        let prices = self.walk(&query.ticker, count);
        debug!("Simulated {} bars for {}", count, query);
        Ok(HistoricalSeries {
            timestamps,
            prices,
            regression_data: None,
        })
    }

    async fn fetch_live(&self, ticker: &str) -> Result<LivePoint> {
        let price = self.walk(ticker, 1)[0];
        Ok(LivePoint {
            time: chrono::Utc::now().timestamp(),
            price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_points_zips_and_truncates_to_the_shorter_side() {
        let series = HistoricalSeries {
            timestamps: vec![100, 160, 220, 280],
            prices: vec![1.0, 2.0, 3.0],
            regression_data: Some(vec![4.0]),
        };
        let (points, regression) = series.into_points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], PricePoint { timestamp: 220, price: 3.0 });
        assert_eq!(regression, Some(vec![4.0]));
    }

    #[test]
    fn bar_counts_follow_the_trading_calendar() {
        assert_eq!(
            SimulatedSource::bar_count(Range::OneDay, Interval::OneMinute),
            390
        );
        assert_eq!(
            SimulatedSource::bar_count(Range::FiveDays, Interval::FiveMinutes),
            390
        );
        assert_eq!(
            SimulatedSource::bar_count(Range::OneMonth, Interval::OneHour),
            136
        );
        assert_eq!(
            SimulatedSource::bar_count(Range::OneYear, Interval::OneDay),
            252
        );
    }

    #[tokio::test]
    async fn simulated_history_is_sized_and_time_ordered() {
        let source = SimulatedSource::new();
        let query = QueryKey::new("TEST", Range::OneDay, Interval::FiveMinutes);
        let series = source.fetch_history(&query).await.unwrap();
        assert_eq!(series.prices.len(), 78);
        assert_eq!(series.timestamps.len(), 78);
        assert!(series.timestamps.windows(2).all(|w| w[0] < w[1]));
        assert!(series.prices.iter().all(|p| p.is_finite() && *p >= 1.0));
    }

    #[tokio::test]
    async fn simulated_live_quote_continues_the_walk() {
        let source = SimulatedSource::new();
        let query = QueryKey::new("TEST", Range::OneDay, Interval::OneMinute);
        let series = source.fetch_history(&query).await.unwrap();
        let last = *series.prices.last().unwrap();

        let quote = source.fetch_live("TEST").await.unwrap();
        assert!((quote.price - last).abs() <= 0.5 + 1e-9);
        assert!(quote.time > 0);
    }
}
