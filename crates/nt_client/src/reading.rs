use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use nt_core::logging::Logger;
use nt_core::reading::{ReadingClock, REPORT_INTERVAL};
use nt_core::{ArticleApi, ArticleId};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Ticks a [`ReadingClock`] every second on a background task and sends the
/// unreported seconds to the server periodically. Stopping flushes what is left.
pub struct ReadingReporter {
    clock: Arc<Mutex<ReadingClock>>,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ReadingReporter {
    pub fn spawn(api: Arc<dyn ArticleApi>, article_id: ArticleId, clock: ReadingClock) -> Self {
        Self::spawn_with_interval(api, article_id, clock, REPORT_INTERVAL)
    }

    pub fn spawn_with_interval(
        api: Arc<dyn ArticleApi>,
        article_id: ArticleId,
        clock: ReadingClock,
        report_every: Duration,
    ) -> Self {
        let clock = Arc::new(Mutex::new(clock));
        let (stop, stopped) = oneshot::channel();
        let task = ReportTask {
            api,
            article_id,
            clock: clock.clone(),
            logger: Logger::new().with_prefix("⏱").with_prefix(format!("article {}", article_id)),
        };
        let handle = tokio::spawn(task.run(report_every, stopped));

        Self {
            clock,
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// A snapshot of the clock.
    pub fn clock(&self) -> ReadingClock {
        self.with_clock(|clock| clock.clone())
    }

    /// Runs `f` on the live clock, e.g. to start, stop or pause it.
    pub fn with_clock<R>(&self, f: impl FnOnce(&mut ReadingClock) -> R) -> R {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *clock)
    }

    /// Stops ticking and waits for the final report.
    pub async fn shutdown(mut self) -> ReadingClock {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        self.clock()
    }
}

impl Drop for ReadingReporter {
    fn drop(&mut self) {
        // The task still flushes on its own.
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

struct ReportTask {
    api: Arc<dyn ArticleApi>,
    article_id: ArticleId,
    clock: Arc<Mutex<ReadingClock>>,
    logger: Logger,
}

impl ReportTask {
    async fn run(self, report_every: Duration, mut stopped: oneshot::Receiver<()>) {
        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        let mut since_report = Duration::ZERO;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.with_clock(ReadingClock::tick);
                    since_report += TICK;
                    if since_report >= report_every {
                        since_report = Duration::ZERO;
                        self.report().await;
                    }
                }
                _ = &mut stopped => {
                    self.with_clock(ReadingClock::stop);
                    self.report().await;
                    break;
                }
            }
        }
    }

    fn with_clock<R>(&self, f: impl FnOnce(&mut ReadingClock) -> R) -> R {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *clock)
    }

    async fn report(&self) {
        let Some(delta) = self.with_clock(ReadingClock::take_delta) else {
            return;
        };
        match self.api.add_reading_time(self.article_id, delta).await {
            Ok(()) => self.logger.debug(&format!("reported {}s", delta)),
            Err(e) => {
                self.logger.warn(&format!("failed to report {}s: {}", delta, e));
                self.with_clock(|clock| clock.restore(delta));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryApi;
    use nt_core::reading::TimerStatus;
    use tokio::time::sleep;

    fn running(initial: u64) -> ReadingClock {
        let mut clock = ReadingClock::new(initial);
        clock.start();
        clock
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_every_interval_and_flushes_on_shutdown() {
        let api = Arc::new(InMemoryApi::with_generated(1, &[]));
        let reporter = ReadingReporter::spawn(api.clone(), 1, running(0));

        sleep(Duration::from_millis(10_500)).await;
        assert_eq!(api.article_snapshot(1).await.unwrap().time_spent, 10);

        sleep(Duration::from_secs(3)).await;
        let clock = reporter.shutdown().await;

        assert_eq!(clock.session_seconds(), 13);
        assert_eq!(clock.status(), TimerStatus::Stopped);
        assert_eq!(api.article_snapshot(1).await.unwrap().time_spent, 13);
        assert_eq!(api.request_count("reading-time"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_reports_nothing() {
        let api = Arc::new(InMemoryApi::with_generated(1, &[]));
        let reporter = ReadingReporter::spawn(api.clone(), 1, running(0));
        reporter.with_clock(ReadingClock::pause);

        sleep(Duration::from_millis(20_500)).await;
        reporter.shutdown().await;
        assert_eq!(api.request_count("reading-time"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_report_is_sent_again() {
        let api = Arc::new(InMemoryApi::with_generated(1, &[]));
        api.fail_on("reading-time");
        let reporter = ReadingReporter::spawn_with_interval(api.clone(), 1, running(0), Duration::from_secs(5));

        sleep(Duration::from_millis(5_500)).await;
        assert_eq!(api.article_snapshot(1).await.unwrap().time_spent, 0);

        api.recover("reading-time");
        sleep(Duration::from_secs(5)).await;
        assert_eq!(api.article_snapshot(1).await.unwrap().time_spent, 10);

        reporter.shutdown().await;
    }
}
