use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: String,
    pub price: f64,
    pub time: String,
    pub status: TradeStatus,
    pub percentage: f64,
    /// Server-side timestamp stamped when the trade was logged.
    pub logged_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrade {
    pub ticker: String,
    pub price: f64,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub status: TradeStatus,
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradePatch {
    pub price: Option<f64>,
    pub time: Option<String>,
    pub status: Option<TradeStatus>,
    pub percentage: Option<f64>,
}

/// Append-style trade journal. Entries are addressed by list position, so
/// removing one shifts the ids of everything logged after it.
#[derive(Debug, Default)]
pub struct TradeLog {
    entries: RwLock<Vec<TradeRecord>>,
}

impl TradeLog {
    pub fn new() -> Self {
        TradeLog::default()
    }

    pub async fn log(&self, new: NewTrade) -> TradeRecord {
        let logged_at = Utc::now().to_rfc3339();
        let record = TradeRecord {
            ticker: new.ticker,
            price: new.price,
            time: new.time.unwrap_or_else(|| logged_at.clone()),
            status: new.status,
            percentage: new.percentage,
            logged_at,
        };
        let mut entries = self.entries.write().await;
        entries.push(record.clone());
        info!("Logged trade #{} for {}", entries.len() - 1, record.ticker);
        record
    }

    pub async fn update(&self, id: usize, patch: TradePatch) -> Result<TradeRecord> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("Trade not found".into()))?;
        if let Some(price) = patch.price {
            entry.price = price;
        }
        if let Some(time) = patch.time {
            entry.time = time;
        }
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(percentage) = patch.percentage {
            entry.percentage = percentage;
        }
        Ok(entry.clone())
    }

    pub async fn remove(&self, id: usize) -> Result<TradeRecord> {
        let mut entries = self.entries.write().await;
        if id >= entries.len() {
            return Err(AppError::NotFound("Trade not found".into()));
        }
        let removed = entries.remove(id);
        info!("Removed trade #{} for {}", id, removed.ticker);
        Ok(removed)
    }

    pub async fn list(&self) -> Vec<TradeRecord> {
        self.entries.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(ticker: &str, price: f64) -> NewTrade {
        NewTrade {
            ticker: ticker.to_string(),
            price,
            time: None,
            status: TradeStatus::Open,
            percentage: 0.0,
        }
    }

    #[test]
    fn logging_stamps_and_lists_in_order() {
        tokio_test::block_on(async {
            let log = TradeLog::new();
            log.log(trade("AAPL", 150.0)).await;
            log.log(trade("MSFT", 300.0)).await;

            let entries = log.list().await;
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].ticker, "AAPL");
            assert_eq!(entries[1].ticker, "MSFT");
            assert!(!entries[0].logged_at.is_empty());
            // With no client time the server stamp doubles as the trade time.
            assert_eq!(entries[0].time, entries[0].logged_at);
        });
    }

    #[test]
    fn update_touches_only_the_supplied_fields() {
        tokio_test::block_on(async {
            let log = TradeLog::new();
            log.log(trade("AAPL", 150.0)).await;

            let patch = TradePatch {
                status: Some(TradeStatus::Closed),
                percentage: Some(2.5),
                ..TradePatch::default()
            };
            let updated = log.update(0, patch).await.unwrap();
            assert_eq!(updated.status, TradeStatus::Closed);
            assert_eq!(updated.percentage, 2.5);
            assert_eq!(updated.price, 150.0);
            assert_eq!(updated.ticker, "AAPL");
        });
    }

    #[test]
    fn removal_shifts_later_ids_down() {
        tokio_test::block_on(async {
            let log = TradeLog::new();
            log.log(trade("AAPL", 150.0)).await;
            log.log(trade("MSFT", 300.0)).await;
            log.log(trade("NVDA", 700.0)).await;

            let removed = log.remove(1).await.unwrap();
            assert_eq!(removed.ticker, "MSFT");

            let entries = log.list().await;
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[1].ticker, "NVDA");
        });
    }

    #[test]
    fn unknown_ids_are_not_found() {
        tokio_test::block_on(async {
            let log = TradeLog::new();
            assert!(matches!(
                log.update(0, TradePatch::default()).await,
                Err(AppError::NotFound(_))
            ));
            assert!(matches!(log.remove(3).await, Err(AppError::NotFound(_))));
        });
    }
}
