// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::ChartEngine;
use crate::series::QueryKey;

/// Owns the polling task that feeds live points into the active series.
/// The engine holds at most one of these at a time; replacing it drops the
/// old one, which aborts its task before the new timer starts.
#[derive(Debug)]
pub struct LiveUpdateScheduler {
    query: QueryKey,
    handle: JoinHandle<()>,
}

impl LiveUpdateScheduler {
    pub fn start(engine: Arc<ChartEngine>, query: QueryKey) -> Self {
        let poll = Duration::from_millis(query.interval.poll_millis());
        debug!("Arming live timer for {} every {:?}", query, poll);

        let task_query = query.clone();
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(poll);
            // An interval's first tick completes immediately; consume it so
            // polling starts one full period after arming.
            timer.tick().await;
            loop {
                timer.tick().await;
                if let Err(e) = engine.poll_live_once().await {
                    // Leave the displayed series alone and try again on the
                    // next tick.
                    warn!("Live update for {} failed: {}", task_query, e);
                }
            }
        });

        LiveUpdateScheduler { query, handle }
    }
}

impl Drop for LiveUpdateScheduler {
    fn drop(&mut self) {
        debug!("Cancelling live timer for {}", self.query);
        self.handle.abort();
    }
}
