// src/app.rs
use crate::data_fetch::MarketDataSource;
use crate::error::{AppError, Result};
use crate::pipeline::{
    IndicatorParams, IndicatorSnapshot, Overlay, ParamsPatch, PipelineState, ToggleSet, Trigger,
    compute_snapshot,
};
use crate::scheduler::LiveUpdateScheduler;
use crate::series::{Interval, PricePoint, QueryKey, Range, SeriesStore};

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct EngineView {
    pub query: Option<QueryKey>,
    pub state: PipelineState,
    pub params: IndicatorParams,
    pub toggles: ToggleSet,
    pub series: Vec<PricePoint>,
    pub snapshot: Option<IndicatorSnapshot>,
}

#[derive(Debug)]
struct Published {
    state: PipelineState,
    snapshot: Option<Arc<IndicatorSnapshot>>,
}

/// Core orchestrator: owns the price series, the indicator inputs, and the
/// published snapshot. Every input change bumps a generation counter, and a
/// finished computation may only publish while its generation is still the
/// newest, so overlapping recomputes resolve to last-write-wins.
pub struct ChartEngine {
    source: Arc<dyn MarketDataSource>,
    store: RwLock<SeriesStore>,
    params: RwLock<IndicatorParams>,
    toggles: RwLock<ToggleSet>,
    server_regression: RwLock<Option<Vec<f64>>>,
    published: RwLock<Published>,
    generation: AtomicU64,
    scheduler: Mutex<Option<LiveUpdateScheduler>>,
}

impl ChartEngine {
    pub fn new(
        params: IndicatorParams,
        toggles: ToggleSet,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        ChartEngine {
            source,
            store: RwLock::new(SeriesStore::new()),
            params: RwLock::new(params),
            toggles: RwLock::new(toggles),
            server_regression: RwLock::new(None),
            published: RwLock::new(Published {
                state: PipelineState::Idle,
                snapshot: None,
            }),
            generation: AtomicU64::new(0),
            scheduler: Mutex::new(None),
        }
    }

    /// Point the chart at a new (ticker, range, interval) combination. The
    /// previous live timer is cancelled up front, the series is refetched
    /// and replaced wholesale, and a fresh timer is armed once the new
    /// series is in place. Returns the coerced query actually in effect.
    #[instrument(skip(self))]
    pub async fn set_query(
        self: Arc<Self>,
        ticker: String,
        range: Range,
        interval: Interval,
    ) -> Result<QueryKey> {
        let query = QueryKey::new(ticker, range, interval);
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Switching query to {} (generation {})", query, my_gen);

        self.scheduler.lock().await.take();
        self.published.write().await.state = PipelineState::Computing;

        let fetched = self.source.fetch_history(&query).await;
        if self.generation.load(Ordering::SeqCst) != my_gen {
            debug!("Query {} superseded mid-fetch, discarding", query);
            return Ok(query);
        }
        let series = match fetched {
            Ok(series) => series,
            Err(e) => {
                warn!("History fetch for {} failed: {}", query, e);
                let mut published = self.published.write().await;
                if self.generation.load(Ordering::SeqCst) == my_gen {
                    published.state = PipelineState::Failed;
                }
                return Err(e);
            }
        };

        let (points, regression) = series.into_points();
        self.store.write().await.replace(query.clone(), points);
        *self.server_regression.write().await = regression;

        let computed = self.recompute(my_gen, Trigger::SeriesReplaced).await;

        // The timer is armed even if the first computation failed; live
        // appends keep triggering recomputes against the loaded series.
        if self.generation.load(Ordering::SeqCst) == my_gen {
            let timer = LiveUpdateScheduler::start(self.clone(), query.clone());
            *self.scheduler.lock().await = Some(timer);
        }

        computed.map(|_| query)
    }

    /// Apply a partial parameter update. An invalid merge is rejected with
    /// the active parameters untouched; a valid one is applied and followed
    /// by a recompute whose failure is visible as the FAILED state rather
    /// than as an error here.
    #[instrument(skip(self))]
    pub async fn set_params(&self, patch: ParamsPatch) -> Result<IndicatorParams> {
        let merged = self.params.read().await.merged(&patch);
        merged.validate()?;
        *self.params.write().await = merged;
        info!("Indicator parameters updated: {:?}", merged);
        let _ = self.on_inputs_changed(Trigger::ParamsChanged).await;
        Ok(merged)
    }

    /// Flip one overlay on or off and recompute.
    #[instrument(skip(self))]
    pub async fn set_toggle(&self, overlay: Overlay, enabled: bool) -> Result<ToggleSet> {
        let updated = {
            let mut toggles = self.toggles.write().await;
            toggles.set(overlay, enabled);
            *toggles
        };
        info!("Overlay {:?} set to {}", overlay, enabled);
        let _ = self.on_inputs_changed(Trigger::ToggleFlipped).await;
        Ok(updated)
    }

    /// Append one live point and recompute. A point that does not advance
    /// the series tail is dropped without touching the published snapshot.
    #[instrument(skip(self))]
    pub async fn live_tick(&self, point: PricePoint) -> Result<()> {
        {
            let mut store = self.store.write().await;
            if let Err(e) = store.append(point) {
                debug!("Ignoring stale live point: {}", e);
                return Ok(());
            }
        }
        self.on_inputs_changed(Trigger::LiveTick).await
    }

    /// Fetch one live quote for the active query and feed it in. Called by
    /// the scheduler on every timer tick.
    #[instrument(skip(self))]
    pub async fn poll_live_once(&self) -> Result<()> {
        let Some(query) = self.store.read().await.query().cloned() else {
            return Err(AppError::DataUnavailable("no active query to poll".into()));
        };
        let quote = self.source.fetch_live(&query.ticker).await?;
        self.live_tick(PricePoint {
            timestamp: quote.time,
            price: quote.price,
        })
        .await
    }

    async fn on_inputs_changed(&self, trigger: Trigger) -> Result<()> {
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.recompute(my_gen, trigger).await
    }

    /// Run one compute pass for `my_gen`. The pass copies its inputs out of
    /// the locks, computes without holding any of them, and then publishes
    /// only if no newer generation has started in the meantime.
    async fn recompute(&self, my_gen: u64, trigger: Trigger) -> Result<()> {
        if self.generation.load(Ordering::SeqCst) != my_gen {
            debug!("Recompute for generation {} superseded before start", my_gen);
            return Ok(());
        }
        self.published.write().await.state = PipelineState::Computing;

        let (points, step_secs) = {
            let store = self.store.read().await;
            let step = store.query().map(|q| q.interval.step_secs()).unwrap_or(60);
            (store.points().to_vec(), step)
        };
        let params = *self.params.read().await;
        let toggles = *self.toggles.read().await;
        let server_regression = self.server_regression.read().await.clone();

        debug!(
            "Recomputing {} points after {:?} (generation {})",
            points.len(),
            trigger,
            my_gen
        );
        let result = compute_snapshot(
            &points,
            &params,
            &toggles,
            step_secs,
            server_regression.as_deref(),
        );

        let mut published = self.published.write().await;
        if self.generation.load(Ordering::SeqCst) != my_gen {
            debug!("Discarding superseded snapshot for generation {}", my_gen);
            return Ok(());
        }
        match result {
            Ok(snapshot) => {
                info!(
                    "Published snapshot of {} slots (generation {})",
                    snapshot.len, my_gen
                );
                published.state = PipelineState::Ready;
                published.snapshot = Some(Arc::new(snapshot));
                Ok(())
            }
            Err(e) => {
                warn!("Recompute after {:?} failed: {}", trigger, e);
                published.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    pub async fn view(&self) -> EngineView {
        let (query, series) = {
            let store = self.store.read().await;
            (store.query().cloned(), store.points().to_vec())
        };
        let published = self.published.read().await;
        EngineView {
            query,
            state: published.state,
            params: *self.params.read().await,
            toggles: *self.toggles.read().await,
            series,
            snapshot: published.snapshot.as_ref().map(|s| s.as_ref().clone()),
        }
    }

    pub async fn price_at(&self, index: usize) -> Option<PricePoint> {
        self.store.read().await.price_at(index)
    }
}
