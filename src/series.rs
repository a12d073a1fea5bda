//! Chart-ready series derived from the candle set.
//!
//! A [`SeriesSnapshot`] is immutable. [`derive`] compares the previous
//! snapshot with the new inputs and either returns it unchanged, prepends
//! points for candles appended as older history, or rebuilds from scratch.
//! All three paths yield the same points as a rebuild over the same input.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    AssetId, BarPoint, Candle, CandleFingerprint, HistogramPoint, LinePoint, SeriesPoint,
    Timeframe,
};

pub const VOLUME_UP_COLOR: &str = "rgba(38, 166, 154, 0.5)";
pub const VOLUME_DOWN_COLOR: &str = "rgba(239, 83, 80, 0.5)";
pub const VOLUME_NEUTRAL_COLOR: &str = "rgba(120, 123, 134, 0.5)";

/// Segments kept before a prepend flattens them into one.
const MAX_SEGMENTS: usize = 32;

/// Shape of the main price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesType {
    /// Bars carrying open/high/low/close.
    #[default]
    Ohlc,
    /// Line of closes.
    Price,
    /// Line of traded volume.
    Volume,
}

/// Volume bar coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Up color when close >= previous close, down color otherwise.
    #[default]
    Directional,
    /// One color for every bar.
    Neutral,
}

impl ColorMode {
    fn volume_color(self, close: f64, previous_close: Option<f64>) -> &'static str {
        match self {
            Self::Neutral => VOLUME_NEUTRAL_COLOR,
            Self::Directional if close >= previous_close.unwrap_or(close) => VOLUME_UP_COLOR,
            Self::Directional => VOLUME_DOWN_COLOR,
        }
    }
}

/// Which validity branch produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivePath {
    Hit,
    Prepend { added: usize },
    Rebuild,
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesInput<'a> {
    /// Chart target the candles belong to.
    pub asset_id: Option<AssetId>,
    pub timeframe: Option<Timeframe>,
    /// Newest-first, as held by the ingestion pipeline.
    pub candles: &'a [Candle],
    pub series_type: SeriesType,
    pub color_mode: ColorMode,
}

#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    asset_id: Option<AssetId>,
    timeframe: Option<Timeframe>,
    count: usize,
    oldest: Option<DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
    newest_fingerprint: Option<CandleFingerprint>,
    series_type: SeriesType,
    color_mode: ColorMode,
}

impl CacheKey {
    fn of(input: &SeriesInput<'_>) -> Self {
        let newest = input.candles.first();
        Self {
            asset_id: input.asset_id,
            timeframe: input.timeframe,
            count: input.candles.len(),
            oldest: input.candles.last().map(|c| c.timestamp),
            newest: newest.map(|c| c.timestamp),
            newest_fingerprint: newest.map(Candle::fingerprint),
            series_type: input.series_type,
            color_mode: input.color_mode,
        }
    }
}

/// Immutable run of points, shared between snapshots.
#[derive(Debug, Clone)]
struct Segment<T> {
    data: Arc<[T]>,
    range: Range<usize>,
}

impl<T> Segment<T> {
    fn new(points: Vec<T>) -> Self {
        let range = 0..points.len();
        Self {
            data: Arc::from(points),
            range,
        }
    }

    fn as_slice(&self) -> &[T] {
        &self.data[self.range.clone()]
    }
}

/// Chronological points stored as a list of shared segments, so prepending
/// costs the size of the new points plus one pointer per segment.
#[derive(Debug, Clone)]
struct Chunked<T> {
    segments: Vec<Segment<T>>,
    len: usize,
}

impl<T: Clone> Chunked<T> {
    fn from_vec(points: Vec<T>) -> Self {
        let len = points.len();
        let segments = if points.is_empty() {
            Vec::new()
        } else {
            vec![Segment::new(points)]
        };
        Self { segments, len }
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.segments.iter().flat_map(Segment::as_slice)
    }

    fn first(&self) -> Option<&T> {
        self.iter().next()
    }

    fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// `front` followed by the current points, with the current first point
    /// swapped for `head` when given.
    fn prepend(&self, mut front: Vec<T>, head: Option<T>) -> Self {
        let mut rest = self.segments.clone();
        if let Some(head) = head {
            front.push(head);
            if let Some(first) = rest.first_mut() {
                first.range.start += 1;
                if first.range.is_empty() {
                    rest.remove(0);
                }
            }
        }

        let len = front.len() + rest.iter().map(|s| s.range.len()).sum::<usize>();
        let mut segments = Vec::with_capacity(rest.len() + 1);
        if !front.is_empty() {
            segments.push(Segment::new(front));
        }
        segments.extend(rest);

        let chunked = Self { segments, len };
        if chunked.segments.len() > MAX_SEGMENTS {
            return Self::from_vec(chunked.to_vec());
        }
        chunked
    }
}

/// Series and volume points for one candle set.
#[derive(Debug, Clone)]
pub struct SeriesSnapshot {
    key: CacheKey,
    series: Chunked<SeriesPoint>,
    volume: Chunked<HistogramPoint>,
    has_valid_volume: bool,
    /// Close of the oldest emitted candle; its volume color depends on
    /// whatever gets prepended before it.
    oldest_close: Option<f64>,
}

impl SeriesSnapshot {
    pub fn series_type(&self) -> SeriesType {
        self.key.series_type
    }

    pub fn color_mode(&self) -> ColorMode {
        self.key.color_mode
    }

    /// Number of emitted points (after timestamp dedup).
    pub fn len(&self) -> usize {
        self.series.len
    }

    pub fn is_empty(&self) -> bool {
        self.series.len == 0
    }

    pub fn series(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.series.iter()
    }

    pub fn volume(&self) -> impl Iterator<Item = &HistogramPoint> {
        self.volume.iter()
    }

    pub fn series_data(&self) -> Vec<SeriesPoint> {
        self.series.to_vec()
    }

    pub fn volume_data(&self) -> Vec<HistogramPoint> {
        self.volume.to_vec()
    }

    /// Whether any candle carries a positive volume.
    pub fn has_valid_volume(&self) -> bool {
        self.has_valid_volume
    }
}

/// Points built from one chronological pass.
struct Built {
    series: Vec<SeriesPoint>,
    volume: Vec<HistogramPoint>,
    has_valid_volume: bool,
    first_close: Option<f64>,
    last_close: Option<f64>,
}

/// Convert `chronological` candles, skipping timestamps already emitted.
fn build<'a>(
    chronological: impl Iterator<Item = &'a Candle>,
    series_type: SeriesType,
    color_mode: ColorMode,
    capacity: usize,
) -> Built {
    let mut seen = HashSet::with_capacity(capacity);
    let mut built = Built {
        series: Vec::with_capacity(capacity),
        volume: Vec::with_capacity(capacity),
        has_valid_volume: false,
        first_close: None,
        last_close: None,
    };

    for candle in chronological {
        if !seen.insert(candle.timestamp) {
            continue;
        }
        let time = candle.chart_time();
        built.series.push(series_point(candle, series_type));
        built.volume.push(HistogramPoint {
            time,
            value: candle.volume,
            color: color_mode.volume_color(candle.close, built.last_close).to_owned(),
        });
        built.has_valid_volume |= candle.volume > 0.0;
        built.first_close.get_or_insert(candle.close);
        built.last_close = Some(candle.close);
    }
    built
}

fn series_point(candle: &Candle, series_type: SeriesType) -> SeriesPoint {
    let time = candle.chart_time();
    match series_type {
        SeriesType::Ohlc => SeriesPoint::Bar(BarPoint {
            time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
        }),
        SeriesType::Price => SeriesPoint::Line(LinePoint {
            time,
            value: candle.close,
        }),
        SeriesType::Volume => SeriesPoint::Line(LinePoint {
            time,
            value: candle.volume,
        }),
    }
}

/// Number of candles appended as older history since `prev`, if the new
/// input is exactly `prev`'s input plus those candles.
fn appended_count(prev: &CacheKey, key: &CacheKey, candles: &[Candle]) -> Option<usize> {
    if key.asset_id != prev.asset_id
        || key.timeframe != prev.timeframe
        || key.series_type != prev.series_type
        || key.color_mode != prev.color_mode
        || key.newest.is_none()
        || key.newest != prev.newest
        || key.newest_fingerprint != prev.newest_fingerprint
        || key.oldest == prev.oldest
    {
        return None;
    }

    let prev_oldest = prev.oldest?;
    let added = candles
        .iter()
        .rev()
        .take_while(|c| c.timestamp < prev_oldest)
        .count();
    let boundary = candles.len().checked_sub(added + 1)?;
    let contiguous = candles[boundary].timestamp == prev_oldest;
    (added > 0 && contiguous && key.count == prev.count + added).then_some(added)
}

fn rebuild(key: CacheKey, input: &SeriesInput<'_>) -> SeriesSnapshot {
    let built = build(
        input.candles.iter().rev(),
        input.series_type,
        input.color_mode,
        input.candles.len(),
    );
    SeriesSnapshot {
        key,
        series: Chunked::from_vec(built.series),
        volume: Chunked::from_vec(built.volume),
        has_valid_volume: built.has_valid_volume,
        oldest_close: built.first_close,
    }
}

fn prepend(prev: &SeriesSnapshot, key: CacheKey, older: &[Candle]) -> SeriesSnapshot {
    let built = build(older.iter().rev(), key.series_type, key.color_mode, older.len());

    // The previous oldest bar now has a predecessor to compare against.
    let head = prev
        .volume
        .first()
        .zip(prev.oldest_close)
        .map(|(bar, close)| HistogramPoint {
            color: key.color_mode.volume_color(close, built.last_close).to_owned(),
            ..bar.clone()
        })
        .filter(|bar| Some(bar) != prev.volume.first());

    SeriesSnapshot {
        series: prev.series.prepend(built.series, None),
        volume: prev.volume.prepend(built.volume, head),
        has_valid_volume: prev.has_valid_volume || built.has_valid_volume,
        oldest_close: built.first_close.or(prev.oldest_close),
        key,
    }
}

/// Next snapshot for `input`, reusing `prev` where the cache-validity test
/// allows.
///
/// * same asset and timeframe, unchanged count, oldest and newest
///   timestamps, newest fingerprint, series type and color mode: `prev`
///   itself;
/// * same target, newest candle unchanged and only older candles appended: `prev`'s
///   points with the new ones prepended;
/// * anything else: a full chronological rebuild.
pub fn derive(
    prev: Option<&Arc<SeriesSnapshot>>,
    input: &SeriesInput<'_>,
) -> (Arc<SeriesSnapshot>, DerivePath) {
    let key = CacheKey::of(input);
    if let Some(prev) = prev {
        if prev.key == key {
            return (Arc::clone(prev), DerivePath::Hit);
        }
        if let Some(added) = appended_count(&prev.key, &key, input.candles) {
            let older = &input.candles[input.candles.len() - added..];
            let snapshot = prepend(prev, key, older);
            return (Arc::new(snapshot), DerivePath::Prepend { added });
        }
    }
    (Arc::new(rebuild(key, input)), DerivePath::Rebuild)
}
