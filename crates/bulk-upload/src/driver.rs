//! Windowed batch upload driver.
//!
//! The driver scans a [`RecordSource`] and uploads one synthetic payload per
//! record through a [`Sink`], at most one window of uploads at a time.
//!
//! ```text
//!          ┌──────────────────────────────────────────────┐
//!          ▼                                              │
//!   open source ──► RUNNING ──(wave full)──► AWAITING_WAVE │
//!                     │  ▲                       │    │    │
//!                     │  └──────(success)────────┘    │    │
//!       (cap reached  │                          (failure) │
//!        or exhausted)│                               ▼    │
//!                     ▼                           BACKOFF ─┘
//!                   DONE                     (sleep, rescan)
//! ```
//!
//! A wave is all-or-nothing: one failed upload fails the wave, the driver sleeps
//! for the configured backoff and rescans the source from the beginning, skipping
//! every record below the checkpoint. Records of the failed wave that did succeed
//! are uploaded again, so sinks must accept idempotent re-submission.

use crate::checkpoint::Checkpoint;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::metrics::UploadMetrics;
use crate::progress::ProgressReporter;
use crate::record::RecordSource;
use crate::sink::Sink;
use crate::task::UploadTask;
use crate::wave::{Wave, WaveOutcome};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    /// Records completed, including any skipped because they were completed earlier in the run.
    pub checkpoint: Checkpoint,
    pub metrics: UploadMetrics,
}

/// How one scan over the source ended.
enum ScanEnd {
    /// Cap reached or source exhausted, all waves succeeded.
    Done,
    /// A wave failed; the run must back off and rescan.
    WaveFailed(WaveOutcome),
}

/// Uploads records in bounded concurrent waves with checkpointed retries.
pub struct WindowedBatchDriver {
    config: DriverConfig,
    sink: Arc<dyn Sink>,
    reporter: Arc<dyn ProgressReporter>,
}

impl WindowedBatchDriver {
    /// Create a driver. The configuration is validated here, before any upload.
    pub fn new(
        config: DriverConfig,
        sink: Arc<dyn Sink>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            reporter,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Upload until the processing cap is reached or the source is exhausted.
    ///
    /// Failed waves are retried after the backoff. With no `max_wave_retries`
    /// configured this loops until it succeeds or the process is killed.
    pub async fn run(&self, source: &dyn RecordSource) -> Result<DriverReport, DriverError> {
        let start = Instant::now();
        let mut checkpoint = Checkpoint::new();
        let mut metrics = UploadMetrics::default();
        let mut consecutive_failures: u32 = 0;

        info!(
            "Starting upload: window {}, cap {}, payload {} MB",
            self.config.window_size, self.config.processing_cap, self.config.payload_size_mb
        );

        loop {
            metrics.scans += 1;
            let waves_before = metrics.waves_completed;

            match self.scan(source, &mut checkpoint, &mut metrics).await? {
                ScanEnd::Done => break,
                ScanEnd::WaveFailed(outcome) => {
                    metrics.waves_failed += 1;
                    if metrics.waves_completed > waves_before {
                        consecutive_failures = 0;
                    }
                    consecutive_failures += 1;

                    let cause = outcome.cause.unwrap_or_default();
                    self.reporter.report(&format!(
                        "Wave failed {} ({} of {} uploads failed): {} - checkpoint {}",
                        Utc::now().to_rfc3339(),
                        outcome.failed,
                        outcome.failed + outcome.succeeded,
                        cause,
                        checkpoint
                    ));

                    if let Some(max) = self.config.max_wave_retries {
                        if consecutive_failures > max {
                            return Err(DriverError::RetriesExhausted {
                                attempts: consecutive_failures,
                                cause,
                            });
                        }
                    }

                    warn!(
                        "Backing off for {:?} before rescanning from checkpoint {}",
                        self.config.backoff, checkpoint
                    );
                    tokio::time::sleep(self.config.backoff).await;
                }
            }
        }

        metrics.total_duration = start.elapsed();
        self.reporter.report(&format!(
            "Done! uploaded {} payloads - checkpoint {}",
            metrics.records_uploaded, checkpoint
        ));
        info!(
            "Upload complete: {} payloads in {:?} ({:.2} records/sec, {} scans, {} failed waves)",
            metrics.records_uploaded,
            metrics.total_duration,
            metrics.records_per_second(),
            metrics.scans,
            metrics.waves_failed
        );

        Ok(DriverReport {
            checkpoint,
            metrics,
        })
    }

    /// One pass over the source, from its first record.
    async fn scan(
        &self,
        source: &dyn RecordSource,
        checkpoint: &mut Checkpoint,
        metrics: &mut UploadMetrics,
    ) -> Result<ScanEnd, DriverError> {
        let cap = self.config.processing_cap;
        let mut wave = Wave::new(self.config.window_size, Arc::clone(&self.sink));
        let mut processed: u64 = 0;

        let records = source.open().map_err(DriverError::Source)?;
        debug!("Scanning records from the start, checkpoint {}", checkpoint);

        for record in records {
            if processed >= cap {
                break;
            }
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    self.drain(&mut wave).await;
                    return Err(DriverError::Source(e));
                }
            };
            let index = processed;
            processed += 1;

            if checkpoint.covers(index) {
                metrics.records_skipped += 1;
                continue;
            }
            if record.placeholder {
                debug!("No payload for placeholder {} (index {index})", record.id);
                metrics.placeholders += 1;
                continue;
            }

            let destination = self.config.routing.route(index, cap);
            let task =
                match UploadTask::new(index, record, self.config.payload_size_mb, destination) {
                    Ok(task) => task,
                    Err(e) => {
                        self.drain(&mut wave).await;
                        return Err(e.into());
                    }
                };
            wave.push(task);
            metrics.uploads_attempted += 1;

            if wave.is_full() {
                if let Some(failed) = self
                    .finish_wave(&mut wave, processed, checkpoint, metrics)
                    .await
                {
                    return Ok(ScanEnd::WaveFailed(failed));
                }
            }

            if processed % self.config.report_every == 0 {
                self.reporter.report(&format!(
                    "Saved {processed} attachments... checkpoint {checkpoint}"
                ));
            }
        }

        if !wave.is_empty() {
            if let Some(failed) = self
                .finish_wave(&mut wave, processed, checkpoint, metrics)
                .await
            {
                return Ok(ScanEnd::WaveFailed(failed));
            }
        } else {
            // Only placeholders followed the last completed wave.
            checkpoint.advance_to(processed);
        }

        Ok(ScanEnd::Done)
    }

    /// Let in-flight uploads run to completion before an error aborts the run.
    /// Dropping the wave would cancel them midway through a sink write.
    async fn drain(&self, wave: &mut Wave) {
        if wave.is_empty() {
            return;
        }
        let outcome = wave.await_all().await;
        warn!(
            "Drained {} in-flight uploads before aborting ({} failed)",
            outcome.succeeded + outcome.failed,
            outcome.failed
        );
    }

    /// Await the wave; on success move the checkpoint to `processed`.
    /// Returns the outcome only when the wave failed.
    async fn finish_wave(
        &self,
        wave: &mut Wave,
        processed: u64,
        checkpoint: &mut Checkpoint,
        metrics: &mut UploadMetrics,
    ) -> Option<WaveOutcome> {
        let range = wave.index_range();
        let outcome = wave.await_all().await;

        if outcome.is_failure() {
            warn!(
                "Wave {:?} failed: {} of {} uploads failed",
                range,
                outcome.failed,
                outcome.failed + outcome.succeeded
            );
            return Some(outcome);
        }

        metrics.waves_completed += 1;
        metrics.records_uploaded += outcome.succeeded as u64;
        checkpoint.advance_to(processed);
        debug!("Wave {:?} complete, checkpoint {}", range, checkpoint);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{UploadRecord, VecRecordSource};
    use crate::sink::RemoteTier;
    use async_trait::async_trait;
    use payload_generator::SyntheticStream;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every successful put; fails the keys in `fail_keys` once each.
    #[derive(Default)]
    struct MemorySink {
        fail_once: Mutex<Vec<String>>,
        fail_always: Vec<String>,
        stored: Mutex<HashMap<String, (String, bool)>>,
        attempts: Mutex<u64>,
    }

    #[async_trait]
    impl Sink for MemorySink {
        async fn put(
            &self,
            destination_key: &str,
            payload_name: &str,
            _payload: SyntheticStream,
            remote: Option<&RemoteTier>,
        ) -> anyhow::Result<()> {
            *self.attempts.lock().unwrap() += 1;
            if self.fail_always.iter().any(|k| k == destination_key) {
                anyhow::bail!("permanent failure for {destination_key}");
            }
            {
                let mut fail_once = self.fail_once.lock().unwrap();
                if let Some(pos) = fail_once.iter().position(|k| k == destination_key) {
                    fail_once.remove(pos);
                    anyhow::bail!("transient failure for {destination_key}");
                }
            }
            self.stored.lock().unwrap().insert(
                destination_key.to_string(),
                (payload_name.to_string(), remote.is_some()),
            );
            Ok(())
        }
    }

    fn config(window: usize, cap: u64) -> DriverConfig {
        DriverConfig {
            window_size: window,
            processing_cap: cap,
            payload_size_mb: 1,
            backoff: Duration::from_secs(15),
            report_every: 5,
            ..Default::default()
        }
    }

    fn collecting_reporter() -> (Arc<Mutex<Vec<String>>>, Arc<dyn ProgressReporter>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = Arc::clone(&lines);
        let reporter: Arc<dyn ProgressReporter> =
            Arc::new(move |text: &str| sink_lines.lock().unwrap().push(text.to_string()));
        (lines, reporter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_uploads_until_cap() {
        let sink = Arc::new(MemorySink::default());
        let (_, reporter) = collecting_reporter();
        let driver = WindowedBatchDriver::new(config(4, 10), sink.clone(), reporter).unwrap();

        let report = driver
            .run(&VecRecordSource::sequential("r", 25))
            .await
            .unwrap();

        assert_eq!(report.checkpoint.completed(), 10);
        assert_eq!(report.metrics.records_uploaded, 10);
        // Two full waves of 4 and a partial wave of 2.
        assert_eq!(report.metrics.waves_completed, 3);
        assert_eq!(report.metrics.scans, 1);
        assert_eq!(sink.stored.lock().unwrap().len(), 10);
        assert!(!sink.stored.lock().unwrap().contains_key("r/10"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_exhausted_before_cap() {
        let sink = Arc::new(MemorySink::default());
        let (lines, reporter) = collecting_reporter();
        let driver = WindowedBatchDriver::new(config(4, 100), sink.clone(), reporter).unwrap();

        let report = driver
            .run(&VecRecordSource::sequential("r", 7))
            .await
            .unwrap();

        assert_eq!(report.checkpoint.completed(), 7);
        assert_eq!(sink.stored.lock().unwrap().len(), 7);
        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.starts_with("Saved 5 attachments")));
        assert!(lines.last().unwrap().starts_with("Done!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_wave_is_retried_from_checkpoint() {
        let sink = Arc::new(MemorySink {
            fail_once: Mutex::new(vec!["r/5".to_string()]),
            ..Default::default()
        });
        let (lines, reporter) = collecting_reporter();
        let driver = WindowedBatchDriver::new(config(4, 12), sink.clone(), reporter).unwrap();

        let started = tokio::time::Instant::now();
        let report = driver
            .run(&VecRecordSource::sequential("r", 12))
            .await
            .unwrap();

        assert_eq!(report.checkpoint.completed(), 12);
        assert_eq!(report.metrics.waves_failed, 1);
        assert_eq!(report.metrics.scans, 2);
        // Second scan skips the first wave.
        assert_eq!(report.metrics.records_skipped, 4);
        // 12 first-time uploads plus the 4 of the retried wave.
        assert_eq!(*sink.attempts.lock().unwrap(), 16);
        assert_eq!(report.metrics.records_uploaded, 12);
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(lines
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.starts_with("Wave failed") && l.contains("transient failure for r/5")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retries_give_up() {
        let sink = Arc::new(MemorySink {
            fail_always: vec!["r/2".to_string()],
            ..Default::default()
        });
        let (_, reporter) = collecting_reporter();
        let mut cfg = config(4, 8);
        cfg.max_wave_retries = Some(2);
        let driver = WindowedBatchDriver::new(cfg, sink.clone(), reporter).unwrap();

        let err = driver
            .run(&VecRecordSource::sequential("r", 8))
            .await
            .unwrap_err();

        match err {
            DriverError::RetriesExhausted { attempts, cause } => {
                assert_eq!(attempts, 3);
                assert!(cause.contains("permanent failure for r/2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*sink.attempts.lock().unwrap(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_routing_applied_per_index() {
        let sink = Arc::new(MemorySink::default());
        let (_, reporter) = collecting_reporter();
        let driver = WindowedBatchDriver::new(config(10, 20), sink.clone(), reporter).unwrap();

        driver
            .run(&VecRecordSource::sequential("r", 20))
            .await
            .unwrap();

        let stored = sink.stored.lock().unwrap();
        assert_eq!(stored["r/17"], ("cover2.png".to_string(), true));
        assert_eq!(stored["r/18"], ("cover1.png".to_string(), false));
        assert_eq!(stored["r/19"], ("cover1.png".to_string(), false));
    }

    #[tokio::test]
    async fn test_source_error_aborts() {
        struct BrokenSource;
        impl RecordSource for BrokenSource {
            fn open(&self) -> anyhow::Result<crate::record::RecordIter<'_>> {
                Ok(Box::new(
                    vec![
                        Ok(UploadRecord::new("r/0", "ok")),
                        Err(anyhow::anyhow!("disk on fire")),
                    ]
                    .into_iter(),
                ))
            }
        }

        let sink = Arc::new(MemorySink::default());
        let (_, reporter) = collecting_reporter();
        let driver = WindowedBatchDriver::new(config(4, 10), sink, reporter).unwrap();

        let err = driver.run(&BrokenSource).await.unwrap_err();
        assert!(matches!(err, DriverError::Source(_)));
        assert!(err.to_string().contains("disk on fire"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_waits_for_in_flight_uploads() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct FailingAfterTwo;
        impl RecordSource for FailingAfterTwo {
            fn open(&self) -> anyhow::Result<crate::record::RecordIter<'_>> {
                Ok(Box::new(
                    vec![
                        Ok(UploadRecord::new("r/0", "first")),
                        Ok(UploadRecord::new("r/1", "second")),
                        Err(anyhow::anyhow!("truncated file")),
                    ]
                    .into_iter(),
                ))
            }
        }

        #[derive(Default)]
        struct SlowSink {
            started: AtomicUsize,
            finished: AtomicUsize,
        }

        #[async_trait]
        impl Sink for SlowSink {
            async fn put(
                &self,
                _destination_key: &str,
                _payload_name: &str,
                _payload: SyntheticStream,
                _remote: Option<&RemoteTier>,
            ) -> anyhow::Result<()> {
                self.started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                self.finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let sink = Arc::new(SlowSink::default());
        let (_, reporter) = collecting_reporter();
        let driver = WindowedBatchDriver::new(config(4, 10), sink.clone(), reporter).unwrap();

        let err = driver.run(&FailingAfterTwo).await.unwrap_err();
        assert!(matches!(err, DriverError::Source(_)));
        assert_eq!(sink.started.load(Ordering::SeqCst), 2);
        assert_eq!(sink.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholders_keep_their_index() {
        let records = (0..10)
            .map(|i| {
                if i % 3 == 0 {
                    UploadRecord::placeholder(format!("r/{i}"), "no payload")
                } else {
                    UploadRecord::new(format!("r/{i}"), "record")
                }
            })
            .collect();
        let sink = Arc::new(MemorySink::default());
        let (_, reporter) = collecting_reporter();
        let driver = WindowedBatchDriver::new(config(4, 10), sink.clone(), reporter).unwrap();

        let report = driver.run(&VecRecordSource::new(records)).await.unwrap();

        assert_eq!(report.checkpoint.completed(), 10);
        assert_eq!(report.metrics.records_uploaded, 6);
        assert_eq!(report.metrics.placeholders, 4);
        let stored = sink.stored.lock().unwrap();
        assert_eq!(stored.len(), 6);
        assert!(!stored.contains_key("r/0"));
        assert!(!stored.contains_key("r/9"));
        // The only primary-only index (9) is a placeholder, so every upload is tiered.
        assert!(stored.values().all(|(name, remote)| name == "cover2.png" && *remote));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let sink = Arc::new(MemorySink::default());
        let (_, reporter) = collecting_reporter();
        let result = WindowedBatchDriver::new(config(0, 10), sink, reporter);
        assert!(matches!(result, Err(DriverError::Config(_))));
    }
}
