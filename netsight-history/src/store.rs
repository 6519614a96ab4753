use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use netsight_core::{HistoricalDataPoint, TrafficSnapshot};

use crate::error::HistoryError;

const BUCKET_FORMAT: &str = "%Y-%m-%d_%H";
const BUCKET_PREFIX: &str = "traffic_";
const BUCKET_SUFFIX: &str = ".json";

/// Local wall-clock hour a timestamp belongs to, e.g. `2024-03-01_14`.
pub fn bucket_name(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format(BUCKET_FORMAT).to_string()
}

pub struct HistoryStore {
    dir: PathBuf,
    // Serializes every read-modify-write and range scan over the bucket files.
    lock: Mutex<()>,
}

impl HistoryStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "History store opened");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bucket_path(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.path_for(&bucket_name(timestamp))
    }

    fn path_for(&self, bucket: &str) -> PathBuf {
        self.dir
            .join(format!("{BUCKET_PREFIX}{bucket}{BUCKET_SUFFIX}"))
    }

    /// Appends `snapshot` to its hour bucket. A missing or unreadable
    /// bucket is started afresh.
    pub fn save_snapshot(&self, snapshot: &TrafficSnapshot) -> Result<(), HistoryError> {
        let _guard = self.lock.lock();
        let path = self.bucket_path(snapshot.timestamp);

        let mut snapshots = match read_bucket(&path) {
            Ok(Some(existing)) => existing,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable history bucket");
                Vec::new()
            }
        };
        snapshots.push(snapshot.clone());

        let data = serde_json::to_vec(&snapshots)?;
        write_atomic(&path, &data)?;
        debug!(path = %path.display(), entries = snapshots.len(), "Snapshot saved");
        Ok(())
    }

    /// Interface data points with timestamps in `[start, end]`, oldest
    /// first. Missing or unparsable buckets are skipped.
    pub fn historical_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<HistoricalDataPoint> {
        if start > end {
            return Vec::new();
        }

        let _guard = self.lock.lock();
        let buckets = match self.buckets_between(start, end) {
            Ok(buckets) => buckets,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot list history buckets");
                return Vec::new();
            }
        };

        let mut points: Vec<HistoricalDataPoint> = buckets
            .into_iter()
            .filter_map(|bucket| {
                let path = self.path_for(&bucket);
                match read_bucket(&path) {
                    Ok(snapshots) => snapshots,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping history bucket");
                        None
                    }
                }
            })
            .flatten()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .filter_map(|s| HistoricalDataPoint::from_snapshot(&s))
            .collect();

        points.sort_by_key(|p| p.timestamp);
        points
    }

    /// Existing buckets from the hour before `start` to the hour after
    /// `end`. Cost follows the number of files on disk, not the range width.
    fn buckets_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, HistoryError> {
        let slack = Duration::hours(1);
        let first = start.checked_sub_signed(slack).unwrap_or(start);
        let last = end.checked_add_signed(slack).unwrap_or(end);
        let first = first.with_timezone(&Local).naive_local();
        let last = last.with_timezone(&Local).naive_local();

        let mut buckets = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let file_name = entry?.file_name();
            let Some((bucket, hour)) = file_name.to_str().and_then(parse_bucket_file) else {
                continue;
            };
            // `hour` is the start of the bucket's local hour.
            if hour + slack > first && hour <= last {
                buckets.insert(bucket.to_string());
            }
        }
        Ok(buckets)
    }
}

/// Bucket name and local start hour of a `traffic_<YYYY-MM-DD_HH>.json`
/// file, if it is one.
fn parse_bucket_file(file_name: &str) -> Option<(&str, NaiveDateTime)> {
    let bucket = file_name
        .strip_prefix(BUCKET_PREFIX)?
        .strip_suffix(BUCKET_SUFFIX)?;
    let hour = NaiveDateTime::parse_from_str(&format!("{bucket}:00"), "%Y-%m-%d_%H:%M").ok()?;
    Some((bucket, hour))
}

/// `Ok(None)` when the bucket does not exist.
fn read_bucket(path: &Path) -> Result<Option<Vec<TrafficSnapshot>>, HistoryError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&data)?))
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), HistoryError> {
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, data)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
