// src/indicators.rs
use crate::error::{AppError, Result};
use crate::series::PricePoint;

/// Indicator math over a closed price series. Batch functions validate their
/// parameters and return raw (unpadded) values; callers align the output to
/// the source series afterwards.

#[derive(Debug)]
pub struct EMA {
    mult: f64,
    current: Option<f64>,
}

impl EMA {
    pub fn new(period: usize) -> Self {
        let mult = 2.0 / (period as f64 + 1.0);
        EMA {
            mult,
            current: None,
        }
    }

    /// Feed one value. The first value seeds the average; afterwards the
    /// standard recurrence ema = (value - prev) * k + prev applies.
    pub fn next(&mut self, value: f64) -> f64 {
        match self.current {
            None => {
                self.current = Some(value);
                value
            }
            Some(prev) => {
                let v = (value - prev) * self.mult + prev;
                self.current = Some(v);
                v
            }
        }
    }
}

/// Simple moving average. Produces one value per full window, so the output
/// holds `len - period + 1` entries.
pub fn sma(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    if period < 1 {
        return Err(AppError::InvalidParameter(
            "SMA period must be at least 1".into(),
        ));
    }
    if period > prices.len() {
        return Err(AppError::InvalidParameter(format!(
            "SMA period {} exceeds series length {}",
            period,
            prices.len()
        )));
    }
    Ok(prices
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect())
}

/// Exponential moving average seeded from the first price. Output has the
/// same length as the input; an empty input yields an empty output.
pub fn ema(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    if period < 1 {
        return Err(AppError::InvalidParameter(
            "EMA period must be at least 1".into(),
        ));
    }
    let mut calc = EMA::new(period);
    Ok(prices.iter().map(|p| calc.next(*p)).collect())
}

#[derive(Debug, Clone)]
pub struct MACDSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

/// MACD line and signal line. Both EMAs are read from the same index once
/// the slow EMA has a full period behind it, so line[i] pairs
/// emaFast[i + slow - 1] with emaSlow[i + slow - 1] and the output holds
/// `len - (slow - 1)` entries. The signal line is an EMA of the MACD line
/// and shares its length.
pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Result<MACDSeries> {
    if fast < 1 || slow < 1 || signal < 1 {
        return Err(AppError::InvalidParameter(
            "MACD periods must be at least 1".into(),
        ));
    }
    if slow <= fast {
        return Err(AppError::InvalidParameter(format!(
            "MACD slow period {} must exceed fast period {}",
            slow, fast
        )));
    }
    if prices.len() < slow {
        return Err(AppError::InvalidParameter(format!(
            "MACD needs at least {} prices, got {}",
            slow,
            prices.len()
        )));
    }

    let ema_fast = ema(prices, fast)?;
    let ema_slow = ema(prices, slow)?;
    let offset = slow - 1;
    let line: Vec<f64> = (offset..prices.len())
        .map(|i| ema_fast[i] - ema_slow[i])
        .collect();
    let signal_line = ema(&line, signal)?;

    Ok(MACDSeries {
        line,
        signal: signal_line,
    })
}

/// Relative strength index on the 0..100 scale. The first value is seeded
/// from the gain/loss totals of the first `period` deltas; each later value
/// rebuilds the running averages from the current delta alone. Output holds
/// `len - period` entries.
pub fn rsi(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    if period < 1 {
        return Err(AppError::InvalidParameter(
            "RSI period must be at least 1".into(),
        ));
    }
    if prices.len() < period + 1 {
        return Err(AppError::InvalidParameter(format!(
            "RSI needs at least {} prices, got {}",
            period + 1,
            prices.len()
        )));
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let mut out = Vec::with_capacity(prices.len() - period);
    out.push(rsi_value(gains, losses));

    for i in (period + 1)..prices.len() {
        let change = prices[i] - prices[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        let avg_gain = (gain + gain * (period as f64 - 1.0)) / period as f64;
        let avg_loss = (loss + loss * (period as f64 - 1.0)) / period as f64;
        out.push(rsi_value(avg_gain, avg_loss));
    }

    Ok(out)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    // Zero average loss saturates at 100 instead of dividing by zero.
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Extrapolate future prices from the slope of the last two points. Returns
/// `count` projected values spaced `step_secs` apart beyond the series tail.
pub fn linear_regression(points: &[PricePoint], count: usize, step_secs: i64) -> Result<Vec<f64>> {
    if points.len() < 2 {
        return Err(AppError::InvalidParameter(format!(
            "regression needs at least 2 points, got {}",
            points.len()
        )));
    }
    let prev = points[points.len() - 2];
    let last = points[points.len() - 1];
    let dt = (last.timestamp - prev.timestamp) as f64;
    if dt == 0.0 {
        return Err(AppError::InvalidParameter(
            "regression needs distinct timestamps".into(),
        ));
    }
    let slope = (last.price - prev.price) / dt;

    Ok((1..=count)
        .map(|k| last.price + slope * (step_secs as f64) * (k as f64))
        .collect())
}
