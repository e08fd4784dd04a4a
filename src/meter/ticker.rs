//! Periodic cost ticker.
//!
//! A run is one emitter task plus one task per registered stop watch. All of
//! them share one stop signal. The first watch to fire sets it, the emitter
//! stops its interval and marks the run finished, and every other watch is
//! abandoned at its next suspension point.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufRead;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cost::{cost, display_cost};
use super::error::TickerError;
use super::status::{TickerPhase, TickerStatusHandle};
use super::stop_watch::{DeadlineWatch, StopStrategy, StopWatch};

/// One-shot stop signal shared by every task of a run. Remembers when it
/// first fired so ticks due after that instant are never emitted.
#[derive(Clone, Default)]
struct StopSignal {
    token: CancellationToken,
    fired_at: Arc<OnceCell<Instant>>,
}

impl StopSignal {
    /// Returns true for the call that actually stopped the run.
    fn fire(&self) -> bool {
        let first = self.fired_at.set(Instant::now()).is_ok();
        self.token.cancel();
        first
    }

    fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    fn fired_at(&self) -> Option<Instant> {
        self.fired_at.get().copied()
    }

    async fn fired(&self) {
        self.token.cancelled().await
    }
}

/// Builds a validated [`Ticker`].
pub struct TickerBuilder<W> {
    hourly_rate: f64,
    interval: Duration,
    output: W,
    watches: Vec<Box<dyn StopWatch>>,
}

impl<W> TickerBuilder<W>
where
    W: Write + Send + 'static,
{
    /// Stop once `after` has passed since start.
    pub fn stop_after(self, after: Duration) -> Self {
        self.watch(Box::new(DeadlineWatch::new(after)))
    }

    /// Stop when `token` is read as a line from `reader`.
    pub fn stop_on_token<R>(self, reader: R, token: impl Into<String>) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        self.strategy(StopStrategy::Sentinel {
            reader,
            token: token.into(),
        })
    }

    pub fn strategy<R>(self, strategy: StopStrategy<R>) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        self.watch(strategy.into_watch())
    }

    /// Registers an additional stop watch. Whichever fires first ends the run.
    pub fn watch(mut self, watch: Box<dyn StopWatch>) -> Self {
        self.watches.push(watch);
        self
    }

    pub fn build(self) -> Result<Ticker<W>, TickerError> {
        if self.interval.is_zero() {
            return Err(TickerError::InvalidInterval);
        }
        if !self.hourly_rate.is_finite() || self.hourly_rate < 0.0 {
            return Err(TickerError::InvalidRate(self.hourly_rate));
        }
        if self.watches.is_empty() {
            return Err(TickerError::NoStopCondition);
        }

        Ok(Ticker {
            hourly_rate: self.hourly_rate,
            interval: self.interval,
            output: self.output,
            watches: self.watches,
            status: TickerStatusHandle::default(),
        })
    }
}

/// A configured, not yet started ticker. Starting consumes it, so every run
/// needs a fresh instance.
pub struct Ticker<W> {
    hourly_rate: f64,
    interval: Duration,
    output: W,
    watches: Vec<Box<dyn StopWatch>>,
    status: TickerStatusHandle,
}

impl<W> Ticker<W>
where
    W: Write + Send + 'static,
{
    pub fn builder(hourly_rate: f64, interval: Duration, output: W) -> TickerBuilder<W> {
        TickerBuilder {
            hourly_rate,
            interval,
            output,
            watches: Vec::new(),
        }
    }

    pub fn status(&self) -> TickerStatusHandle {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Starts emitting. Must be called from within a tokio runtime.
    pub fn start(self) -> Result<TickerHandle<W>, TickerError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(TickerError::NoRuntime);
        }

        let Ticker {
            hourly_rate,
            interval,
            output,
            watches,
            status,
        } = self;

        status.mark_running();
        let started_at = Instant::now();
        let stop = StopSignal::default();

        info!(
            "Meter started: rate={}/h, interval={:?}, stop watches={}",
            hourly_rate,
            interval,
            watches.len()
        );

        let watch_tasks = watches
            .into_iter()
            .map(|watch| spawn_watch(watch, started_at, stop.clone()))
            .collect();

        let emitter = Emitter {
            hourly_rate,
            interval,
            started_at,
            output,
        };
        let emitter_task = tokio::spawn(emitter.run(stop.clone(), status.clone()));

        Ok(TickerHandle {
            status,
            stop,
            emitter: emitter_task,
            watches: watch_tasks,
        })
    }

    /// Starts and waits for the run to finish, returning the output sink.
    pub async fn run(self) -> Result<W, TickerError> {
        self.start()?.wait().await
    }
}

/// Handle to a running ticker.
pub struct TickerHandle<W> {
    status: TickerStatusHandle,
    stop: StopSignal,
    emitter: JoinHandle<W>,
    watches: Vec<JoinHandle<()>>,
}

impl<W> TickerHandle<W> {
    pub fn status(&self) -> TickerStatusHandle {
        self.status.clone()
    }

    pub fn phase(&self) -> TickerPhase {
        self.status.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Ends the run as if a stop watch had fired. Calling it again, or after
    /// a watch fired, has no effect.
    pub fn stop(&self) {
        if self.stop.fire() {
            info!("Meter stopped by its handle");
        }
    }

    /// Suspends until the run is finished.
    pub async fn finished(&self) {
        self.status.finished().await
    }

    /// Waits for every task of the run and hands back the output sink.
    pub async fn wait(self) -> Result<W, TickerError> {
        let output = self.emitter.await?;
        for watch in self.watches {
            if let Err(e) = watch.await {
                warn!("Stop watch task failed: {}", e);
            }
        }
        Ok(output)
    }
}

fn spawn_watch(
    mut watch: Box<dyn StopWatch>,
    started_at: Instant,
    stop: StopSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = watch.name();
        tokio::select! {
            _ = stop.fired() => {
                debug!("Stop watch '{}' abandoned", name);
            }
            _ = watch.wait(started_at) => {
                if stop.fire() {
                    info!("Stop watch '{}' fired, stopping meter", name);
                } else {
                    debug!("Stop watch '{}' fired after the meter stopped", name);
                }
            }
        }
    })
}

struct Emitter<W> {
    hourly_rate: f64,
    interval: Duration,
    started_at: Instant,
    output: W,
}

impl<W: Write> Emitter<W> {
    async fn run(mut self, stop: StopSignal, status: TickerStatusHandle) -> W {
        let mut ticks = time::interval_at(self.started_at + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut emitted: u64 = 0;

        loop {
            // A tick due at or before the stop instant is still emitted.
            tokio::select! {
                biased;
                due = ticks.tick() => {
                    if matches!(stop.fired_at(), Some(stopped_at) if due > stopped_at) {
                        break;
                    }
                    self.emit();
                    emitted += 1;
                    if stop.is_fired() {
                        break;
                    }
                }
                _ = stop.fired() => break,
            }
        }
        drop(ticks);

        if let Err(e) = self.output.flush() {
            warn!("Failed to flush meter output: {}", e);
        }
        if status.mark_finished() {
            info!("Meter finished after {} emission(s)", emitted);
        }
        self.output
    }

    fn emit(&mut self) {
        let elapsed = Instant::now().saturating_duration_since(self.started_at);
        let amount = cost(self.hourly_rate, elapsed);
        debug!("Tick at {:?}: {:.4}", elapsed, amount);
        if let Err(e) = display_cost(&mut self.output, amount) {
            warn!("Failed to write running cost: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn lines(output: Vec<u8>) -> Vec<String> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    fn amounts(output: Vec<u8>) -> Vec<f64> {
        lines(output)
            .iter()
            .map(|line| {
                line.rsplit('$')
                    .next()
                    .and_then(|amount| amount.parse::<f64>().ok())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_build_rejects_zero_interval() {
        let result = Ticker::builder(100.0, Duration::ZERO, Vec::new())
            .stop_after(Duration::from_secs(1))
            .build();
        assert!(matches!(result, Err(TickerError::InvalidInterval)));
    }

    #[test]
    fn test_build_rejects_invalid_rate() {
        for rate in [-1.0, f64::NAN, f64::INFINITY] {
            let result = Ticker::builder(rate, Duration::from_secs(1), Vec::new())
                .stop_after(Duration::from_secs(1))
                .build();
            assert!(matches!(result, Err(TickerError::InvalidRate(_))), "rate {rate}");
        }
    }

    #[test]
    fn test_build_requires_a_stop_condition() {
        let result = Ticker::builder(100.0, Duration::from_secs(1), Vec::new()).build();
        assert!(matches!(result, Err(TickerError::NoStopCondition)));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let ticker = Ticker::builder(100.0, Duration::from_secs(1), Vec::new())
            .stop_after(Duration::from_secs(1))
            .build()
            .unwrap();
        assert!(matches!(ticker.start(), Err(TickerError::NoRuntime)));
    }

    #[test]
    fn test_unstarted_ticker_is_not_finished() {
        let ticker = Ticker::builder(100.0, Duration::from_secs(1), Vec::new())
            .stop_after(Duration::from_secs(1))
            .build()
            .unwrap();
        assert!(!ticker.is_finished());
        assert_eq!(ticker.status().phase(), TickerPhase::NotStarted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_second_meeting_with_one_second_ticks() {
        let ticker = Ticker::builder(10_000.0, Duration::from_secs(1), Vec::new())
            .stop_after(Duration::from_secs(3))
            .build()
            .unwrap();
        let status = ticker.status();

        let output = ticker.run().await.unwrap();

        assert!(status.is_finished());
        let amounts = amounts(output);
        assert_eq!(amounts.len(), 3, "got {amounts:?}");
        for (got, want) in amounts.iter().zip([2.78, 5.56, 8.34]) {
            assert!((got - want).abs() <= 0.011, "got {got}, want {want}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_shorter_than_interval_emits_nothing() {
        let output = Ticker::builder(100.0, Duration::from_secs(5), Vec::new())
            .stop_after(Duration::from_secs(2))
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_until_token_arrives() {
        let (mut input, reader) = tokio::io::duplex(64);
        let handle = Ticker::builder(100_000_000.0, Duration::from_secs(1), Vec::new())
            .stop_on_token(BufReader::new(reader), "q")
            .build()
            .unwrap()
            .start()
            .unwrap();
        assert_eq!(handle.phase(), TickerPhase::Running);

        time::sleep(Duration::from_millis(5500)).await;
        assert!(!handle.is_finished(), "must not finish before the token");

        input.write_all(b"not yet\nq\n").await.unwrap();
        time::timeout(Duration::from_secs(1), handle.finished())
            .await
            .expect("should finish within one tick interval");
        assert!(handle.is_finished());

        let output = handle.wait().await.unwrap();
        assert_eq!(lines(output).len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_output_after_finish() {
        let handle = Ticker::builder(3600.0, Duration::from_secs(1), Vec::new())
            .stop_after(Duration::from_millis(2500))
            .build()
            .unwrap()
            .start()
            .unwrap();
        let status = handle.status();
        let output = handle.wait().await.unwrap();
        assert!(status.is_finished());
        assert_eq!(lines(output.clone()).len(), 2);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(lines(output).len(), 2);
        assert!(status.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_costs_never_decrease() {
        let output = Ticker::builder(1234.5, Duration::from_millis(250), Vec::new())
            .stop_after(Duration::from_secs(10))
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();
        let amounts = amounts(output);
        assert_eq!(amounts.len(), 40);
        assert!(amounts.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_of_two_watches_wins() {
        let (_input, reader) = tokio::io::duplex(64);
        let handle = Ticker::builder(3600.0, Duration::from_secs(1), Vec::new())
            .stop_on_token(BufReader::new(reader), "q")
            .stop_after(Duration::from_secs(2))
            .build()
            .unwrap()
            .start()
            .unwrap();

        // The sentinel watch never fires; it must be abandoned, not awaited forever.
        let output = time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("losing watch must not block")
            .unwrap();
        assert_eq!(
            lines(output),
            vec![
                "The total current cost of this meeting is $1.00",
                "The total current cost of this meeting is $2.00",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_handle_ends_run() {
        let (_input, reader) = tokio::io::duplex(64);
        let handle = Ticker::builder(100.0, Duration::from_secs(1), Vec::new())
            .stop_on_token(BufReader::new(reader), "q")
            .build()
            .unwrap()
            .start()
            .unwrap();

        time::sleep(Duration::from_millis(1500)).await;
        handle.stop();
        handle.stop();
        handle.finished().await;

        let output = handle.wait().await.unwrap();
        assert_eq!(lines(output).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_input_does_not_finish_run() {
        let handle = Ticker::builder(100.0, Duration::from_secs(1), Vec::new())
            .stop_on_token(BufReader::new(tokio::io::empty()), "!")
            .build()
            .unwrap()
            .start()
            .unwrap();

        time::sleep(Duration::from_millis(3500)).await;
        assert!(!handle.is_finished(), "finished without reading the stop token");

        handle.stop();
        let output = handle.wait().await.unwrap();
        assert_eq!(lines(output).len(), 3);
    }

    fn late_emitter(started_at: Instant) -> Emitter<Vec<u8>> {
        Emitter {
            hourly_rate: 3600.0,
            interval: Duration::from_secs(1),
            started_at,
            output: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_emitter_skips_ticks_due_after_stop() {
        let started_at = Instant::now();
        let stop = StopSignal::default();
        time::advance(Duration::from_millis(500)).await;
        assert!(stop.fire());

        // The emitter only runs once the 1s and 2s ticks are already overdue.
        time::advance(Duration::from_secs(2)).await;
        let status = TickerStatusHandle::default();
        status.mark_running();

        let output = late_emitter(started_at).run(stop, status.clone()).await;
        assert!(output.is_empty(), "got {:?}", lines(output));
        assert!(status.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_emitter_keeps_tick_due_before_stop() {
        let started_at = Instant::now();
        let stop = StopSignal::default();
        time::advance(Duration::from_millis(1500)).await;
        stop.fire();
        assert!(!stop.fire());

        time::advance(Duration::from_secs(1)).await;
        let status = TickerStatusHandle::default();
        status.mark_running();

        let output = late_emitter(started_at).run(stop, status).await;
        assert_eq!(lines(output).len(), 1);
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failures_do_not_prevent_finishing() {
        let ticker = Ticker::builder(100.0, Duration::from_secs(1), BrokenSink)
            .stop_after(Duration::from_secs(3))
            .build()
            .unwrap();
        let status = ticker.status();
        ticker.run().await.unwrap();
        assert!(status.is_finished());
    }
}
