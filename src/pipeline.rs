// src/pipeline.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::align::{pad_front, scrub};
use crate::error::{AppError, Result};
use crate::indicators;
use crate::normalize::{normalize, rescale};
use crate::series::PricePoint;

/// Indicator tuning knobs. One instance drives every overlay computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub sma_period: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub regression_points: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            sma_period: 14,
            ema_period: 14,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            regression_points: 10,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<()> {
        if self.sma_period < 1
            || self.ema_period < 1
            || self.rsi_period < 1
            || self.macd_fast < 1
            || self.macd_slow < 1
            || self.macd_signal < 1
            || self.regression_points < 1
        {
            return Err(AppError::InvalidParameter(
                "indicator periods must be at least 1".into(),
            ));
        }
        if self.macd_slow <= self.macd_fast {
            return Err(AppError::InvalidParameter(format!(
                "MACD slow period {} must exceed fast period {}",
                self.macd_slow, self.macd_fast
            )));
        }
        Ok(())
    }

    /// Apply a partial update, leaving omitted fields as they were.
    pub fn merged(&self, patch: &ParamsPatch) -> IndicatorParams {
        IndicatorParams {
            sma_period: patch.sma_period.unwrap_or(self.sma_period),
            ema_period: patch.ema_period.unwrap_or(self.ema_period),
            rsi_period: patch.rsi_period.unwrap_or(self.rsi_period),
            macd_fast: patch.macd_fast.unwrap_or(self.macd_fast),
            macd_slow: patch.macd_slow.unwrap_or(self.macd_slow),
            macd_signal: patch.macd_signal.unwrap_or(self.macd_signal),
            regression_points: patch.regression_points.unwrap_or(self.regression_points),
        }
    }
}

/// Partial parameter update as received from the API.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ParamsPatch {
    pub sma_period: Option<usize>,
    pub ema_period: Option<usize>,
    pub rsi_period: Option<usize>,
    pub macd_fast: Option<usize>,
    pub macd_slow: Option<usize>,
    pub macd_signal: Option<usize>,
    pub regression_points: Option<usize>,
}

/// One switchable overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overlay {
    Sma,
    Ema,
    Macd,
    Rsi,
    Regression,
}

/// Which overlays are currently computed. Disabled overlays publish as
/// all-null rows so the snapshot shape never changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleSet {
    pub sma: bool,
    pub ema: bool,
    pub macd: bool,
    pub rsi: bool,
    pub regression: bool,
}

impl ToggleSet {
    pub fn set(&mut self, overlay: Overlay, enabled: bool) {
        match overlay {
            Overlay::Sma => self.sma = enabled,
            Overlay::Ema => self.ema = enabled,
            Overlay::Macd => self.macd = enabled,
            Overlay::Rsi => self.rsi = enabled,
            Overlay::Regression => self.regression = enabled,
        }
    }

    pub fn get(&self, overlay: Overlay) -> bool {
        match overlay {
            Overlay::Sma => self.sma,
            Overlay::Ema => self.ema,
            Overlay::Macd => self.macd,
            Overlay::Rsi => self.rsi,
            Overlay::Regression => self.regression,
        }
    }
}

/// Where the recompute pipeline currently stands. FAILED keeps the previous
/// snapshot on display; it only reports that the latest pass went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Computing,
    Ready,
    Failed,
}

/// What caused a recompute pass. Carried for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    SeriesReplaced,
    ParamsChanged,
    ToggleFlipped,
    LiveTick,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MACDOverlay {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// One published result set. Every row spans exactly `len` slots so a
/// renderer can index all of them with the same cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub len: usize,
    pub sma: Vec<Option<f64>>,
    pub ema: Vec<Option<f64>>,
    pub macd: MACDOverlay,
    pub rsi: Vec<Option<f64>>,
    pub regression: Vec<Option<f64>>,
}

fn null_row(len: usize) -> Vec<Option<f64>> {
    vec![None; len]
}

/// Run every enabled computation against the series and assemble a snapshot.
/// Pure with respect to its inputs; the engine decides whether the result
/// may actually be published.
pub fn compute_snapshot(
    points: &[PricePoint],
    params: &IndicatorParams,
    toggles: &ToggleSet,
    step_secs: i64,
    server_regression: Option<&[f64]>,
) -> Result<IndicatorSnapshot> {
    if points.is_empty() {
        return Err(AppError::DataUnavailable(
            "no price series loaded".into(),
        ));
    }
    let n = points.len();
    let prices: Vec<f64> = points.iter().map(|p| p.price).collect();

    let sma_row = if toggles.sma {
        scrub(pad_front(indicators::sma(&prices, params.sma_period)?, n)?)
    } else {
        null_row(n)
    };

    let ema_row = if toggles.ema {
        scrub(pad_front(indicators::ema(&prices, params.ema_period)?, n)?)
    } else {
        null_row(n)
    };

    let macd_rows = if toggles.macd {
        let series =
            indicators::macd(&prices, params.macd_fast, params.macd_slow, params.macd_signal)?;
        MACDOverlay {
            line: scrub(normalize(&pad_front(series.line, n)?, -1.0, 1.0)),
            signal: scrub(normalize(&pad_front(series.signal, n)?, -1.0, 1.0)),
        }
    } else {
        MACDOverlay {
            line: null_row(n),
            signal: null_row(n),
        }
    };

    let rsi_row = if toggles.rsi {
        let raw = indicators::rsi(&prices, params.rsi_period)?;
        scrub(rescale(&pad_front(raw, n)?, 0.0, 100.0, -1.0, 1.0))
    } else {
        null_row(n)
    };

    let regression_row = if toggles.regression {
        let raw = match server_regression {
            Some(given) if !given.is_empty() => {
                // An upstream projection wins over the local one. Oversized
                // payloads keep their newest values.
                if given.len() > n {
                    debug!(
                        "Server regression has {} values for {} slots, keeping the tail",
                        given.len(),
                        n
                    );
                    given[given.len() - n..].to_vec()
                } else {
                    given.to_vec()
                }
            }
            _ => {
                let count = params.regression_points.min(n);
                indicators::linear_regression(points, count, step_secs)?
            }
        };
        scrub(pad_front(raw, n)?)
    } else {
        null_row(n)
    };

    Ok(IndicatorSnapshot {
        len: n,
        sma: sma_row,
        ema: ema_row,
        macd: macd_rows,
        rsi: rsi_row,
        regression: regression_row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint {
                timestamp: 1_700_000_000 + 60 * i as i64,
                price: *p,
            })
            .collect()
    }

    fn all_on() -> ToggleSet {
        ToggleSet {
            sma: true,
            ema: true,
            macd: true,
            rsi: true,
            regression: true,
        }
    }

    fn small_params() -> IndicatorParams {
        IndicatorParams {
            sma_period: 3,
            ema_period: 3,
            rsi_period: 3,
            macd_fast: 2,
            macd_slow: 4,
            macd_signal: 2,
            regression_points: 3,
        }
    }

    #[test]
    fn every_row_spans_the_series_length() {
        let pts = points(&[10.0, 11.0, 12.0, 11.5, 11.0, 12.5, 13.0, 12.0, 11.0, 12.0]);
        let snap = compute_snapshot(&pts, &small_params(), &all_on(), 60, None).unwrap();
        assert_eq!(snap.len, 10);
        assert_eq!(snap.sma.len(), 10);
        assert_eq!(snap.ema.len(), 10);
        assert_eq!(snap.macd.line.len(), 10);
        assert_eq!(snap.macd.signal.len(), 10);
        assert_eq!(snap.rsi.len(), 10);
        assert_eq!(snap.regression.len(), 10);
    }

    #[test]
    fn warm_up_prefixes_are_null() {
        let pts = points(&[10.0, 11.0, 12.0, 11.5, 11.0, 12.5, 13.0, 12.0, 11.0, 12.0]);
        let snap = compute_snapshot(&pts, &small_params(), &all_on(), 60, None).unwrap();
        // SMA warm-up covers period - 1 slots.
        assert_eq!(snap.sma[0], None);
        assert_eq!(snap.sma[1], None);
        assert!(snap.sma[2].is_some());
        // EMA has no warm-up.
        assert!(snap.ema[0].is_some());
        // MACD warm-up covers slow - 1 slots.
        assert_eq!(snap.macd.line[2], None);
        assert!(snap.macd.line[3].is_some());
        // RSI warm-up covers period slots.
        assert_eq!(snap.rsi[2], None);
        assert!(snap.rsi[3].is_some());
    }

    #[test]
    fn disabled_overlays_publish_null_rows_without_computing() {
        let pts = points(&[10.0, 11.0, 12.0]);
        // Periods far beyond the series length would fail if evaluated.
        let params = IndicatorParams {
            sma_period: 99,
            ema_period: 99,
            rsi_period: 99,
            macd_fast: 50,
            macd_slow: 99,
            macd_signal: 99,
            regression_points: 99,
        };
        let snap = compute_snapshot(&pts, &params, &ToggleSet::default(), 60, None).unwrap();
        assert_eq!(snap.sma, vec![None, None, None]);
        assert_eq!(snap.macd.line, vec![None, None, None]);
        assert_eq!(snap.rsi, vec![None, None, None]);
        assert_eq!(snap.regression, vec![None, None, None]);
    }

    #[test]
    fn enabled_overlay_with_oversized_period_fails() {
        let pts = points(&[10.0, 11.0, 12.0]);
        let params = IndicatorParams {
            sma_period: 5,
            ..small_params()
        };
        let toggles = ToggleSet {
            sma: true,
            ..ToggleSet::default()
        };
        let err = compute_snapshot(&pts, &params, &toggles, 60, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn empty_series_is_reported_unavailable() {
        let err =
            compute_snapshot(&[], &small_params(), &all_on(), 60, None).unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[test]
    fn macd_rows_stay_inside_the_unit_band() {
        let pts = points(&[
            10.0, 10.5, 11.2, 10.8, 11.5, 12.0, 11.7, 12.4, 12.1, 12.9, 13.3, 12.8,
        ]);
        let params = small_params();
        let toggles = ToggleSet {
            macd: true,
            ..ToggleSet::default()
        };
        let snap = compute_snapshot(&pts, &params, &toggles, 60, None).unwrap();
        for v in snap.macd.line.iter().chain(snap.macd.signal.iter()).flatten() {
            assert!(*v >= -1.0 - 1e-12 && *v <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn server_regression_takes_precedence_over_local_projection() {
        let pts = points(&[10.0, 20.0, 30.0, 40.0]);
        let toggles = ToggleSet {
            regression: true,
            ..ToggleSet::default()
        };
        let server = vec![1.0, 2.0];
        let snap =
            compute_snapshot(&pts, &small_params(), &toggles, 60, Some(&server)).unwrap();
        assert_eq!(snap.regression, vec![None, None, Some(1.0), Some(2.0)]);
    }

    #[test]
    fn local_regression_projects_from_the_last_two_points() {
        // Tail slope is (40 - 30) / 60 per second, so each 60s step adds 10.
        let pts = points(&[10.0, 20.0, 30.0, 40.0]);
        let toggles = ToggleSet {
            regression: true,
            ..ToggleSet::default()
        };
        let params = IndicatorParams {
            regression_points: 2,
            ..small_params()
        };
        let snap = compute_snapshot(&pts, &params, &toggles, 60, None).unwrap();
        assert_eq!(snap.regression[0], None);
        assert_eq!(snap.regression[1], None);
        assert!((snap.regression[2].unwrap() - 50.0).abs() < 1e-9);
        assert!((snap.regression[3].unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn params_patch_merges_field_by_field() {
        let base = IndicatorParams::default();
        let patch = ParamsPatch {
            sma_period: Some(20),
            macd_fast: Some(8),
            ..ParamsPatch::default()
        };
        let merged = base.merged(&patch);
        assert_eq!(merged.sma_period, 20);
        assert_eq!(merged.macd_fast, 8);
        assert_eq!(merged.ema_period, base.ema_period);
        assert_eq!(merged.macd_slow, base.macd_slow);
    }

    #[test]
    fn params_validation_rejects_inverted_macd_periods() {
        let params = IndicatorParams {
            macd_fast: 26,
            macd_slow: 12,
            ..IndicatorParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(AppError::InvalidParameter(_))
        ));

        let params = IndicatorParams {
            sma_period: 0,
            ..IndicatorParams::default()
        };
        assert!(params.validate().is_err());
        assert!(IndicatorParams::default().validate().is_ok());
    }

    #[test]
    fn toggle_set_flips_one_overlay_at_a_time() {
        let mut toggles = ToggleSet::default();
        toggles.set(Overlay::Macd, true);
        assert!(toggles.get(Overlay::Macd));
        assert!(!toggles.get(Overlay::Sma));
        toggles.set(Overlay::Macd, false);
        assert!(!toggles.get(Overlay::Macd));
    }
}
