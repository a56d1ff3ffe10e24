use serde::Serialize;

use crate::pipeline::IndicatorSnapshot;
use crate::series::PricePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossDirection {
    Bullish,
    Bearish,
}

/// One MACD line/signal crossover, located on the displayed series.
#[derive(Debug, Clone, Serialize)]
pub struct CrossoverEvent {
    pub index: usize,
    pub timestamp: i64,
    pub price: f64,
    pub direction: CrossDirection,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossoverSummary {
    pub events: Vec<CrossoverEvent>,
    pub bullish: usize,
    pub bearish: usize,
}

/// Walk the snapshot's MACD rows and collect the points where the line
/// crosses its signal. Slots still inside the warm-up padding carry nulls
/// and are skipped.
pub fn analyze_crossovers(points: &[PricePoint], snapshot: &IndicatorSnapshot) -> CrossoverSummary {
    let mut events = Vec::new();
    let line = &snapshot.macd.line;
    let signal = &snapshot.macd.signal;
    let upper = snapshot.len.min(points.len());

    for i in 1..upper {
        let (Some(l_prev), Some(s_prev), Some(l), Some(s)) =
            (line[i - 1], signal[i - 1], line[i], signal[i])
        else {
            continue;
        };
        let prev_diff = l_prev - s_prev;
        let diff = l - s;

        let direction = if prev_diff <= 0.0 && diff > 0.0 {
            Some(CrossDirection::Bullish)
        } else if prev_diff >= 0.0 && diff < 0.0 {
            Some(CrossDirection::Bearish)
        } else {
            None
        };

        if let Some(direction) = direction {
            events.push(CrossoverEvent {
                index: i,
                timestamp: points[i].timestamp,
                price: points[i].price,
                direction,
            });
        }
    }

    let bullish = events
        .iter()
        .filter(|e| e.direction == CrossDirection::Bullish)
        .count();
    let bearish = events.len() - bullish;

    CrossoverSummary {
        events,
        bullish,
        bearish,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MACDOverlay;

    fn snapshot(line: Vec<Option<f64>>, signal: Vec<Option<f64>>) -> IndicatorSnapshot {
        let len = line.len();
        IndicatorSnapshot {
            len,
            sma: vec![None; len],
            ema: vec![None; len],
            macd: MACDOverlay { line, signal },
            rsi: vec![None; len],
            regression: vec![None; len],
        }
    }

    fn points(n: usize) -> Vec<PricePoint> {
        (0..n)
            .map(|i| PricePoint {
                timestamp: 1_700_000_000 + 60 * i as i64,
                price: 100.0 + i as f64,
            })
            .collect()
    }

    #[test]
    fn detects_crossings_in_both_directions() {
        // diff runs -0.2, +0.1, +0.3, -0.1: one bullish then one bearish.
        let line = vec![Some(0.1), Some(0.3), Some(0.5), Some(0.1)];
        let signal = vec![Some(0.3), Some(0.2), Some(0.2), Some(0.2)];
        let summary = analyze_crossovers(&points(4), &snapshot(line, signal));

        assert_eq!(summary.bullish, 1);
        assert_eq!(summary.bearish, 1);
        assert_eq!(summary.events.len(), 2);
        assert_eq!(summary.events[0].index, 1);
        assert_eq!(summary.events[0].direction, CrossDirection::Bullish);
        assert_eq!(summary.events[1].index, 3);
        assert_eq!(summary.events[1].direction, CrossDirection::Bearish);
        assert_eq!(summary.events[0].timestamp, 1_700_000_060);
    }

    #[test]
    fn warm_up_nulls_are_skipped() {
        let line = vec![None, None, Some(-0.1), Some(0.2)];
        let signal = vec![None, None, Some(0.1), Some(0.1)];
        let summary = analyze_crossovers(&points(4), &snapshot(line, signal));

        assert_eq!(summary.bullish, 1);
        assert_eq!(summary.bearish, 0);
        assert_eq!(summary.events[0].index, 3);
    }

    #[test]
    fn flat_rows_produce_no_events() {
        let line = vec![Some(0.2); 5];
        let signal = vec![Some(0.1); 5];
        let summary = analyze_crossovers(&points(5), &snapshot(line, signal));
        assert!(summary.events.is_empty());
    }
}
