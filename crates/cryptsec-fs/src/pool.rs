//! Directory worker pool
//!
//! Files are enumerated once up front, then fed through a single bounded
//! queue to at most `min(workers, files)` scoped threads. Each worker runs
//! one file to completion before taking the next. A failed file is logged
//! and recorded; it never stops the other workers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use cryptsec_core::{CryptsecResult, DirectoryReport, Mode, TransformOutcome};
use cryptsec_crypto::SymmetricKey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use crate::transform::transform_file;
use crate::walk::collect_files;

/// Progress callback: (files done, total files, path just finished)
pub type ProgressFn = Box<dyn Fn(u64, u64, &Path) + Send + Sync>;

#[derive(Default)]
pub struct PoolOptions {
    /// Glob patterns for names skipped during enumeration
    pub exclude_patterns: Vec<String>,
    pub progress: Option<ProgressFn>,
    /// Checked between files; files already in flight run to completion
    pub cancel: Option<CancellationToken>,
}

impl PoolOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}

/// Transform every regular file under `root`.
pub fn process_directory(
    root: &Path,
    key: &SymmetricKey,
    mode: Mode,
    workers: usize,
    passes: u32,
) -> CryptsecResult<DirectoryReport> {
    process_directory_with(root, key, mode, workers, passes, &PoolOptions::default())
}

pub fn process_directory_with(
    root: &Path,
    key: &SymmetricKey,
    mode: Mode,
    workers: usize,
    passes: u32,
    options: &PoolOptions,
) -> CryptsecResult<DirectoryReport> {
    let files = collect_files(root, &options.exclude_patterns)?;
    info!(
        root = %root.display(),
        %mode,
        files = files.len(),
        passes,
        "processing directory"
    );
    Ok(run_pool(files, workers, options, |path| {
        transform_file(path, key, mode, passes)
    }))
}

/// Single file or directory, chosen by what `path` is.
pub fn process_path(
    path: &Path,
    key: &SymmetricKey,
    mode: Mode,
    workers: usize,
    passes: u32,
    options: &PoolOptions,
) -> CryptsecResult<DirectoryReport> {
    let meta = std::fs::metadata(path).map_err(|e| cryptsec_core::CryptsecError::io(path, e))?;
    if meta.is_dir() {
        return process_directory_with(path, key, mode, workers, passes, options);
    }
    Ok(run_pool(vec![path.to_path_buf()], 1, options, |p| {
        transform_file(p, key, mode, passes)
    }))
}

/// Threads actually spawned for `total` files: never more than there are files.
pub fn effective_workers(requested: usize, total: usize) -> usize {
    requested.min(total)
}

/// Drive `transform` over `files` with at most `workers` concurrent threads.
///
/// With one worker (or no files) everything runs on the calling thread.
pub fn run_pool<F>(
    files: Vec<PathBuf>,
    workers: usize,
    options: &PoolOptions,
    transform: F,
) -> DirectoryReport
where
    F: Fn(&Path) -> CryptsecResult<TransformOutcome> + Sync,
{
    let total = files.len();
    let workers = effective_workers(workers, total);
    let done = AtomicU64::new(0);
    let mut report = DirectoryReport {
        total,
        ..Default::default()
    };

    let run_one = |path: &Path| {
        let result = transform(path);
        log_result(path, &result);
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(cb) = &options.progress {
            cb(finished, total as u64, path);
        }
        result
    };

    if workers <= 1 {
        for path in files {
            if options.is_cancelled() {
                warn!("cancelled; remaining files not started");
                break;
            }
            let result = run_one(&path);
            report.record(path, result);
        }
        return report;
    }

    debug!(workers, total, "starting worker pool");
    let (tx, rx) = crossbeam_channel::bounded::<PathBuf>(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let rx = rx.clone();
                let run_one = &run_one;
                scope.spawn(move || {
                    let _span = info_span!("worker", id).entered();
                    let mut local = DirectoryReport::default();
                    for path in rx.iter() {
                        if options.is_cancelled() {
                            continue;
                        }
                        let result = run_one(&path);
                        local.record(path, result);
                    }
                    local
                })
            })
            .collect();
        drop(rx);

        for path in files {
            if options.is_cancelled() {
                warn!("cancelled; remaining files not queued");
                break;
            }
            if tx.send(path).is_err() {
                error!("all workers exited early; remaining files not queued");
                break;
            }
        }
        drop(tx);

        for handle in handles {
            match handle.join() {
                Ok(local) => report.merge(local),
                Err(_) => error!("worker thread panicked"),
            }
        }
    });

    report
}

fn log_result(path: &Path, result: &CryptsecResult<TransformOutcome>) {
    match result {
        Ok(TransformOutcome::Skipped { reason }) => {
            debug!(path = %path.display(), %reason, "skipped")
        }
        Ok(_) => {}
        Err(e) if e.is_fatal_for_run() => error!(path = %path.display(), error = %e, "file failed"),
        Err(e) => warn!(path = %path.display(), error = %e, "file failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptsec_core::{CryptsecError, FormatError};
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("file-{i}"))).collect()
    }

    fn ok() -> CryptsecResult<TransformOutcome> {
        Ok(TransformOutcome::Encrypted { bytes: 0, chunks: 1 })
    }

    #[test]
    fn test_every_file_visited_exactly_once() {
        for workers in [0, 1, 2, 8, 100] {
            let seen = Mutex::new(Vec::new());
            let report = run_pool(paths(37), workers, &PoolOptions::default(), |p| {
                seen.lock().unwrap().push(p.to_path_buf());
                ok()
            });

            let seen = seen.into_inner().unwrap();
            assert_eq!(seen.len(), 37, "workers={workers}");
            let unique: HashSet<_> = seen.iter().collect();
            assert_eq!(unique.len(), 37);
            assert_eq!(report.total, 37);
            assert_eq!(report.processed, 37);
            assert_eq!(report.succeeded, 37);
        }
    }

    #[test]
    fn test_worker_count_clamped_to_file_count() {
        assert_eq!(effective_workers(64, 3), 3);
        assert_eq!(effective_workers(30, 30), 30);
        assert_eq!(effective_workers(2, 10), 2);
        assert_eq!(effective_workers(8, 0), 0);
        assert_eq!(effective_workers(0, 5), 0);
    }

    #[test]
    fn test_oversubscribed_pool_gives_each_file_its_own_thread() {
        let threads = Mutex::new(HashSet::new());
        let barrier = std::sync::Barrier::new(3);
        run_pool(paths(3), 64, &PoolOptions::default(), |_| {
            threads.lock().unwrap().insert(std::thread::current().id());
            barrier.wait();
            ok()
        });
        assert_eq!(threads.into_inner().unwrap().len(), 3);
    }

    #[test]
    fn test_single_worker_runs_on_caller_thread() {
        let caller = std::thread::current().id();
        run_pool(paths(4), 1, &PoolOptions::default(), |_| {
            assert_eq!(std::thread::current().id(), caller);
            ok()
        });
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let report = run_pool(paths(10), 4, &PoolOptions::default(), |p| {
            if p == Path::new("file-3") || p == Path::new("file-7") {
                Err(FormatError::NotEncrypted(p.to_path_buf()).into())
            } else {
                ok()
            }
        });

        assert_eq!(report.processed, 10);
        assert_eq!(report.succeeded, 8);
        let mut failed: Vec<_> = report.failures.iter().map(|f| f.path.clone()).collect();
        failed.sort();
        assert_eq!(failed, vec![PathBuf::from("file-3"), PathBuf::from("file-7")]);
        assert!(matches!(report.failures[0].error, CryptsecError::Format(_)));
    }

    #[test]
    fn test_empty_file_list() {
        let report = run_pool(Vec::new(), 8, &PoolOptions::default(), |_| {
            panic!("no file should be transformed")
        });
        assert_eq!(report.total, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_progress_reports_every_file() {
        let calls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let options = PoolOptions {
            progress: Some(Box::new(move |done: u64, total: u64, _: &Path| {
                sink.lock().unwrap().push((done, total));
            })),
            ..Default::default()
        };
        run_pool(paths(5), 3, &options, |_| ok());

        let mut calls = calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, (1..=5).map(|d| (d, 5)).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancelled_before_start_processes_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let options = PoolOptions {
            cancel: Some(token),
            ..Default::default()
        };
        for workers in [1, 4] {
            let report = run_pool(paths(6), workers, &options, |_| ok());
            assert_eq!(report.processed, 0);
            assert_eq!(report.total, 6);
            assert!(!report.is_clean());
        }
    }

    #[test]
    fn test_cancel_mid_run_stops_remaining_files() {
        let token = CancellationToken::new();
        let options = PoolOptions {
            cancel: Some(token.clone()),
            ..Default::default()
        };
        let report = run_pool(paths(20), 1, &options, |p| {
            if p == Path::new("file-4") {
                token.cancel();
            }
            ok()
        });
        assert_eq!(report.processed, 5);
    }
}
