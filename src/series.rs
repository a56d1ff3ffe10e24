// src/series.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, warn};

use crate::error::{AppError, Result};

/// One observed price at a UTC timestamp (epoch seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

/// How far back the chart looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Range {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Range {
    /// Snap a requested sampling interval to one the range actually supports.
    /// Long ranges force daily bars; short ranges reject anything coarser
    /// than their widest intraday step.
    pub fn coerce_interval(self, requested: Interval) -> Interval {
        match self {
            Range::OneDay => match requested {
                Interval::OneMinute | Interval::FiveMinutes | Interval::FifteenMinutes => requested,
                _ => Interval::OneMinute,
            },
            Range::FiveDays => match requested {
                Interval::FiveMinutes | Interval::FifteenMinutes | Interval::OneHour => requested,
                _ => Interval::FiveMinutes,
            },
            Range::OneMonth => match requested {
                Interval::FifteenMinutes | Interval::OneHour => requested,
                _ => Interval::OneHour,
            },
            Range::SixMonths | Range::OneYear => Interval::OneDay,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Range::OneDay => "1d",
            Range::FiveDays => "5d",
            Range::OneMonth => "1mo",
            Range::SixMonths => "6mo",
            Range::OneYear => "1y",
        };
        write!(f, "{}", s)
    }
}

/// Sampling step between consecutive points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Live polling cadence for this interval. Coarse intervals fall back to
    /// a one-minute poll rather than going silent for an hour.
    pub fn poll_millis(self) -> u64 {
        match self {
            Interval::OneMinute => 60_000,
            Interval::FiveMinutes => 300_000,
            Interval::FifteenMinutes => 900_000,
            _ => 60_000,
        }
    }

    /// Nominal spacing of points sampled at this interval, in seconds.
    pub fn step_secs(self) -> i64 {
        match self {
            Interval::OneMinute => 60,
            Interval::FiveMinutes => 300,
            Interval::FifteenMinutes => 900,
            Interval::OneHour => 3_600,
            Interval::OneDay => 86_400,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::OneHour => "1h",
            Interval::OneDay => "1d",
        };
        write!(f, "{}", s)
    }
}

/// Identity of the series currently on display. Constructing one applies
/// interval coercion, so a stored key is always self-consistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub ticker: String,
    pub range: Range,
    pub interval: Interval,
}

impl QueryKey {
    pub fn new(ticker: impl Into<String>, range: Range, interval: Interval) -> Self {
        QueryKey {
            ticker: ticker.into(),
            range,
            interval: range.coerce_interval(interval),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.ticker, self.range, self.interval)
    }
}

/// In-memory holder for the single active price series. Exactly one query is
/// loaded at a time; switching queries replaces the whole series.
#[derive(Debug, Default)]
pub struct SeriesStore {
    query: Option<QueryKey>,
    points: Vec<PricePoint>,
}

impl SeriesStore {
    pub fn new() -> Self {
        SeriesStore::default()
    }

    /// Load a freshly fetched series, dropping whatever was loaded before.
    /// Points whose timestamps do not strictly increase are discarded so the
    /// stored series always satisfies the ordering invariant.
    #[instrument(skip(self, points))]
    pub fn replace(&mut self, query: QueryKey, points: Vec<PricePoint>) {
        let mut kept: Vec<PricePoint> = Vec::with_capacity(points.len());
        let mut dropped = 0usize;
        for p in points {
            match kept.last() {
                Some(prev) if p.timestamp <= prev.timestamp => dropped += 1,
                _ => kept.push(p),
            }
        }
        if dropped > 0 {
            warn!(
                "Dropped {} out-of-order points while loading series for {}",
                dropped, query
            );
        }
        debug!("Loaded {} points for {}", kept.len(), query);
        self.query = Some(query);
        self.points = kept;
    }

    /// Append one live point. The timestamp must exceed the current tail;
    /// stale or duplicate ticks are rejected without mutating the series.
    #[instrument(skip(self))]
    pub fn append(&mut self, point: PricePoint) -> Result<()> {
        if let Some(last) = self.points.last() {
            if point.timestamp <= last.timestamp {
                return Err(AppError::InvalidParameter(format!(
                    "live point at {} does not advance series tail at {}",
                    point.timestamp, last.timestamp
                )));
            }
        }
        self.points.push(point);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.query = None;
        self.points.clear();
    }

    pub fn query(&self) -> Option<&QueryKey> {
        self.query.as_ref()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn price_at(&self, index: usize) -> Option<PricePoint> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
