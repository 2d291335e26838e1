//! Volume histogram
//!
//! Pure bucketing of records over a time range. Widths come from a fixed
//! staircase keyed on the range duration. Buckets sit on a grid aligned to
//! the Unix epoch; the range end is inclusive, so an aligned one-hour range
//! with one-minute buckets produces 61 buckets.

use chrono::{DateTime, Duration, Utc};

use crate::model::{HistogramBucket, LogRecord};

/// (max range seconds, bucket width seconds), checked in order
const STAIRCASE: &[(i64, i64)] = &[
    (5 * 60, 10),
    (15 * 60, 30),
    (60 * 60, 60),
    (6 * 60 * 60, 5 * 60),
    (24 * 60 * 60, 15 * 60),
    (7 * 24 * 60 * 60, 60 * 60),
];
const WIDEST_BUCKET_SECS: i64 = 4 * 60 * 60;

pub fn bucket_width(range: Duration) -> Duration {
    let secs = range.num_seconds();
    let width = STAIRCASE
        .iter()
        .find(|(max, _)| secs <= *max)
        .map(|(_, width)| *width)
        .unwrap_or(WIDEST_BUCKET_SECS);
    Duration::seconds(width)
}

/// Round down to the bucket grid line at or before `ts`
pub fn truncate_to_bucket(ts: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    let width_ms = width.num_milliseconds().max(1);
    let ms = ts.timestamp_millis();
    let aligned = ms - ms.rem_euclid(width_ms);
    DateTime::from_timestamp_millis(aligned).unwrap_or(ts)
}

/// Count records per bucket across `[start, end]`, zero-filling empty buckets
pub fn bucketize(
    records: &[LogRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<HistogramBucket> {
    if end < start {
        return Vec::new();
    }
    let width = bucket_width(end - start);
    let width_ms = width.num_milliseconds();
    let first = truncate_to_bucket(start, width);

    let span_ms = (end - first).num_milliseconds();
    let bucket_count = (span_ms.div_euclid(width_ms) + 1) as usize;

    let mut buckets: Vec<HistogramBucket> = (0..bucket_count)
        .map(|i| HistogramBucket {
            bucket_start: first + Duration::milliseconds(width_ms * i as i64),
            count: 0,
        })
        .collect();

    for record in records {
        if record.timestamp < first || record.timestamp > end {
            continue;
        }
        let offset = (record.timestamp - first).num_milliseconds();
        let index = offset.div_euclid(width_ms) as usize;
        if let Some(bucket) = buckets.get_mut(index) {
            bucket.count += 1;
        }
    }

    buckets
}
