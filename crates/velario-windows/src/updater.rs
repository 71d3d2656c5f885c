//! Update worker threads.
//!
//! The check and the download each run on their own thread, report
//! back through the controller channel, and wake the main-thread pump
//! with a thread message. The download thread shares nothing with the
//! UI except the cancel flag and progress counters in
//! [`DownloadShared`].

use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use velario_core::controller::Event;
use velario_core::update::{
    DownloadOutcome, DownloadShared, ProgressMeter, UpdateSession, split_https_url,
};
use velario_core::version::Release;
use velario_core::{log_debug, log_info};

use crate::app::Waker;
use crate::http::{self, DownloadEnd, DownloadSink};
use crate::version_check;

const DOWNLOAD_TIMEOUT_MS: i32 = 60_000;

/// Spawns a release check; the result arrives as `Event::CheckFinished`.
pub(crate) fn spawn_check(tx: Sender<Event>, waker: Waker) {
    thread::spawn(move || {
        let result = version_check::check_for_update();
        let _ = tx.send(Event::CheckFinished(result));
        waker.wake();
    });
}

/// Spawns the asset download; the outcome arrives as
/// `Event::DownloadFinished`.
pub(crate) fn spawn_download(
    release: Release,
    shared: Arc<DownloadShared>,
    tx: Sender<Event>,
    waker: Waker,
) {
    thread::spawn(move || {
        log_info!("downloading {} from {}", release.tag, release.download_url);
        let outcome = run_download(&release, &shared);
        let _ = tx.send(Event::DownloadFinished(outcome));
        waker.wake();
    });
}

/// Streams the release asset into a staged file next to the current
/// executable. Cancellation and failure both leave no staged file
/// behind (the session deletes it on drop).
fn run_download(release: &Release, shared: &DownloadShared) -> DownloadOutcome {
    let Some((host, path)) = split_https_url(&release.download_url) else {
        return DownloadOutcome::Failed(format!(
            "unsupported download URL: {}",
            release.download_url
        ));
    };

    let destination = match std::env::current_exe() {
        Ok(p) => p,
        Err(e) => return DownloadOutcome::Failed(format!("cannot determine executable path: {e}")),
    };

    let mut session = match UpdateSession::begin(&destination) {
        Ok(s) => s,
        Err(e) => return DownloadOutcome::Failed(format!("cannot create staging file: {e}")),
    };

    let end = {
        let mut sink = SessionSink {
            session: &mut session,
            shared,
            meter: ProgressMeter::new(None, Instant::now()),
        };
        http::download(&host, &path, DOWNLOAD_TIMEOUT_MS, &mut sink)
    };

    match end {
        Ok(DownloadEnd::Complete) => match session.finish() {
            Ok(staged) => {
                log_info!("download complete: {}", staged.display());
                DownloadOutcome::Completed(staged)
            }
            Err(e) => DownloadOutcome::Failed(format!("cannot finalize staging file: {e}")),
        },
        Ok(DownloadEnd::Cancelled) => {
            session.discard();
            DownloadOutcome::Cancelled
        }
        Err(e) => {
            session.discard();
            DownloadOutcome::Failed(e)
        }
    }
}

/// Wires the HTTP stream into the session file and the shared
/// progress counters, checking the cancel flag between reads.
struct SessionSink<'a> {
    session: &'a mut UpdateSession,
    shared: &'a DownloadShared,
    meter: ProgressMeter,
}

impl DownloadSink for SessionSink<'_> {
    fn on_length(&mut self, total: Option<u64>) {
        log_debug!("download size: {total:?}");
        self.shared.set_total(total);
        self.meter = ProgressMeter::new(total, Instant::now());
    }

    fn on_chunk(&mut self, chunk: &[u8]) -> Result<bool, String> {
        if self.shared.is_cancelled() {
            return Ok(false);
        }

        self.session
            .write(chunk)
            .map_err(|e| format!("cannot write staging file: {e}"))?;

        if let Some(sample) = self.meter.record(chunk.len() as u64, Instant::now()) {
            self.shared.publish(&sample);
        }
        Ok(true)
    }
}
