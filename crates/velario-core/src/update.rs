//! Download session state: staged temp file, progress smoothing, and
//! the shared cancel/progress cells crossing the worker/UI threads.
//!
//! The network read loop itself is platform-specific; it feeds bytes
//! into an [`UpdateSession`] and timestamps into a [`ProgressMeter`],
//! publishing samples through [`DownloadShared`].

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::version::Release;

/// Wall-clock cadence between published progress samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// EWMA weight on the prior smoothed rate (0.3 on the new sample).
const RATE_SMOOTHING_PRIOR: f64 = 0.7;

/// Where the update flow currently is. Only one session exists at a
/// time; the controller refuses new checks while not `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking { user_initiated: bool },
    /// A newer release was found; the confirmation prompt is open.
    AwaitingConfirm(Release),
    Downloading,
    /// Download complete, handing off to the replace script.
    Relaunching,
}

/// How a download ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The staged file is complete at the given path.
    Completed(PathBuf),
    Cancelled,
    Failed(String),
}

/// State shared between the download thread and the progress window:
/// the cancellation flag plus plain counters. Nothing else crosses
/// those threads.
#[derive(Debug, Default)]
pub struct DownloadShared {
    cancelled: AtomicBool,
    /// 0 means the total size is unknown.
    total: AtomicU64,
    transferred: AtomicU64,
    /// Whole percent, or -1 while indeterminate.
    percent: AtomicI32,
    rate_bps: AtomicU64,
}

/// A read-side copy of the shared progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub percent: Option<u32>,
    pub rate_bps: u64,
    pub transferred: u64,
    pub total: Option<u64>,
}

impl DownloadShared {
    pub fn new() -> Self {
        Self {
            percent: AtomicI32::new(-1),
            ..Self::default()
        }
    }

    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn set_total(&self, total: Option<u64>) {
        self.total.store(total.unwrap_or(0), Ordering::Relaxed);
    }

    /// Publishes a progress sample for the UI side to read.
    pub fn publish(&self, sample: &ProgressSample) {
        self.transferred.store(sample.transferred, Ordering::Relaxed);
        self.rate_bps.store(sample.rate_bps, Ordering::Relaxed);
        self.percent.store(
            sample.percent.map_or(-1, |p| p as i32),
            Ordering::Relaxed,
        );
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let percent = self.percent.load(Ordering::Relaxed);
        ProgressSnapshot {
            percent: (percent >= 0).then_some(percent as u32),
            rate_bps: self.rate_bps.load(Ordering::Relaxed),
            transferred: self.transferred.load(Ordering::Relaxed),
            total: (total > 0).then_some(total),
        }
    }
}

/// A published progress sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Whole percent complete, `None` when the total is unknown.
    pub percent: Option<u32>,
    /// Smoothed transfer rate in bytes per second.
    pub rate_bps: u64,
    pub transferred: u64,
}

/// Accumulates transferred bytes and emits one sample per
/// [`SAMPLE_INTERVAL`] of elapsed wall-clock time, with the displayed
/// rate smoothed by an exponentially weighted moving average so it
/// doesn't jitter with individual reads.
pub struct ProgressMeter {
    total: Option<u64>,
    transferred: u64,
    sampled_at: Instant,
    sampled_bytes: u64,
    smoothed_rate: Option<f64>,
    last_percent: u32,
}

impl ProgressMeter {
    pub fn new(total: Option<u64>, now: Instant) -> Self {
        Self {
            total,
            transferred: 0,
            sampled_at: now,
            sampled_bytes: 0,
            smoothed_rate: None,
            last_percent: 0,
        }
    }

    /// Records `bytes` more transferred. Returns a sample when at
    /// least one sample interval has elapsed since the previous one.
    pub fn record(&mut self, bytes: u64, now: Instant) -> Option<ProgressSample> {
        self.transferred += bytes;

        let elapsed = now.duration_since(self.sampled_at);
        if elapsed < SAMPLE_INTERVAL {
            return None;
        }

        let instant_rate = (self.transferred - self.sampled_bytes) as f64 / elapsed.as_secs_f64();
        let smoothed = match self.smoothed_rate {
            Some(prev) => RATE_SMOOTHING_PRIOR * prev + (1.0 - RATE_SMOOTHING_PRIOR) * instant_rate,
            None => instant_rate,
        };
        self.smoothed_rate = Some(smoothed);
        self.sampled_at = now;
        self.sampled_bytes = self.transferred;

        Some(ProgressSample {
            percent: self.percent(),
            rate_bps: smoothed as u64,
            transferred: self.transferred,
        })
    }

    /// Whole percent complete. `None` while the total is unknown;
    /// never decreases and reaches 100 only at `transferred == total`.
    pub fn percent(&mut self) -> Option<u32> {
        let total = self.total?;
        if total == 0 {
            return None;
        }
        let current = ((self.transferred.min(total) * 100) / total) as u32;
        self.last_percent = self.last_percent.max(current);
        Some(self.last_percent)
    }
}

/// A download in flight: the staged temp file next to the destination.
///
/// The staged path is always the destination path with a `.new`
/// suffix appended, so it can never overlap the live binary. Dropping
/// a session without [`finish`](Self::finish) removes the staged file,
/// which covers both cancellation and failure.
pub struct UpdateSession {
    staged: PathBuf,
    file: Option<File>,
}

impl UpdateSession {
    /// Opens the staged file for writing. `destination` is the path
    /// the finished binary will eventually replace.
    pub fn begin(destination: &Path) -> io::Result<Self> {
        let staged = staged_path(destination);
        let file = File::create(&staged)?;
        Ok(Self {
            staged,
            file: Some(file),
        })
    }

    pub fn staged_path(&self) -> &Path {
        &self.staged
    }

    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.write_all(chunk),
            None => Err(io::Error::other("session already closed")),
        }
    }

    /// Flushes and keeps the staged file, returning its path.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        if let Some(mut f) = self.file.take() {
            f.flush()?;
        }
        Ok(std::mem::take(&mut self.staged))
    }

    /// Deletes the staged file. Equivalent to dropping the session.
    pub fn discard(self) {}
}

impl Drop for UpdateSession {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.staged);
        }
    }
}

/// Returns `destination` with `.new` appended to the file name.
pub fn staged_path(destination: &Path) -> PathBuf {
    let mut s = destination.as_os_str().to_os_string();
    s.push(".new");
    PathBuf::from(s)
}

/// Splits an `https://host/path` URL into host and path. Any other
/// scheme is rejected; the descriptor is treated as malformed.
pub fn split_https_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("https://")?;
    let (host, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn no_sample_before_interval_elapses() {
        let start = Instant::now();
        let mut meter = ProgressMeter::new(Some(1000), start);

        assert_eq!(meter.record(100, at(start, 100)), None);
        assert_eq!(meter.record(100, at(start, 400)), None);
        assert!(meter.record(100, at(start, 600)).is_some());
    }

    #[test]
    fn first_sample_uses_instant_rate() {
        let start = Instant::now();
        let mut meter = ProgressMeter::new(Some(10_000), start);

        // 500 bytes over 500ms = 1000 B/s.
        let sample = meter.record(500, at(start, 500)).unwrap();

        assert_eq!(sample.rate_bps, 1000);
        assert_eq!(sample.transferred, 500);
    }

    #[test]
    fn rate_is_smoothed_toward_prior() {
        let start = Instant::now();
        let mut meter = ProgressMeter::new(None, start);

        // 1000 B/s, then an instantaneous 2000 B/s.
        let first = meter.record(500, at(start, 500)).unwrap();
        let second = meter.record(1000, at(start, 1000)).unwrap();

        assert_eq!(first.rate_bps, 1000);
        // 0.7 * 1000 + 0.3 * 2000 = 1300
        assert_eq!(second.rate_bps, 1300);
    }

    #[test]
    fn percent_is_monotone_and_tops_out_at_completion() {
        let start = Instant::now();
        let mut meter = ProgressMeter::new(Some(1000), start);

        let mut last = 0;
        for i in 1..=10 {
            if let Some(sample) = meter.record(100, at(start, i * 500)) {
                let p = sample.percent.unwrap();
                assert!(p >= last, "percent went backwards: {p} < {last}");
                last = p;
                assert_eq!(p == 100, sample.transferred == 1000);
            }
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn unknown_total_reports_indeterminate() {
        let start = Instant::now();
        let mut meter = ProgressMeter::new(None, start);

        let sample = meter.record(500, at(start, 500)).unwrap();

        assert_eq!(sample.percent, None);
    }

    #[test]
    fn shared_roundtrips_samples() {
        let shared = DownloadShared::new();
        shared.set_total(Some(1000));
        shared.publish(&ProgressSample {
            percent: Some(50),
            rate_bps: 2048,
            transferred: 500,
        });

        let snap = shared.snapshot();

        assert_eq!(snap.percent, Some(50));
        assert_eq!(snap.rate_bps, 2048);
        assert_eq!(snap.transferred, 500);
        assert_eq!(snap.total, Some(1000));
        assert!(!shared.is_cancelled());
    }

    #[test]
    fn shared_defaults_to_indeterminate() {
        let snap = DownloadShared::new().snapshot();

        assert_eq!(snap.percent, None);
        assert_eq!(snap.total, None);
    }

    #[test]
    fn cancel_flag_is_sticky() {
        let shared = DownloadShared::new();
        shared.request_cancel();
        assert!(shared.is_cancelled());
    }

    fn temp_dest(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("velario-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn staged_path_never_overlaps_destination() {
        let dest = PathBuf::from(r"C:\apps\velario.exe");
        let staged = staged_path(&dest);

        assert_ne!(staged, dest);
        assert_eq!(staged, PathBuf::from(r"C:\apps\velario.exe.new"));
    }

    #[test]
    fn finished_session_keeps_the_staged_file() {
        let dest = temp_dest("finish");
        let mut session = UpdateSession::begin(&dest).unwrap();
        session.write(b"binary bytes").unwrap();

        let staged = session.finish().unwrap();

        assert_eq!(fs::read(&staged).unwrap(), b"binary bytes");
        let _ = fs::remove_file(&staged);
    }

    #[test]
    fn discard_removes_the_staged_file() {
        let dest = temp_dest("discard");
        let mut session = UpdateSession::begin(&dest).unwrap();
        session.write(b"partial").unwrap();
        let staged = session.staged_path().to_path_buf();
        assert!(staged.exists());

        session.discard();

        assert!(!staged.exists());
    }

    #[test]
    fn dropped_session_removes_the_staged_file() {
        let dest = temp_dest("drop");
        let staged;
        {
            let mut session = UpdateSession::begin(&dest).unwrap();
            session.write(b"partial").unwrap();
            staged = session.staged_path().to_path_buf();
        }
        assert!(!staged.exists());
    }

    #[test]
    fn splits_host_and_path() {
        assert_eq!(
            split_https_url("https://github.com/velario-app/velario/releases/download/v1.0.4/velario.exe"),
            Some((
                "github.com".to_string(),
                "/velario-app/velario/releases/download/v1.0.4/velario.exe".to_string()
            ))
        );
        assert_eq!(
            split_https_url("https://example.com"),
            Some(("example.com".to_string(), "/".to_string()))
        );
    }

    #[test]
    fn rejects_non_https_urls() {
        assert_eq!(split_https_url("http://example.com/x"), None);
        assert_eq!(split_https_url("ftp://example.com/x"), None);
        assert_eq!(split_https_url("https://"), None);
    }
}
