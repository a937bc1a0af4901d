//! Timed send schedulers.
//!
//! A session runs at most one scheduler at a time. [`SchedulerMode`] is the
//! single tagged slot holding the active one together with its timer; the
//! session actor polls [`SchedulerMode::next_tick`] alongside its other
//! inputs.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::{Result, ValidationError};
use crate::waveform::{WaveformSpec, generate};

/// Shortest accepted tick period.
pub const MIN_INTERVAL_MS: u32 = 10;

/// Interval used when the configured one cannot be parsed.
pub const DEFAULT_INTERVAL_MS: u32 = 100;

/// Produces the payload for each periodic tick.
pub type PayloadProvider = Box<dyn FnMut() -> Result<Bytes> + Send>;

/// The two scheduler kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerKind {
    /// Repeats a payload at a fixed interval.
    Periodic,
    /// Sends generated samples one per tick.
    PointStream,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Periodic => f.write_str("periodic"),
            Self::PointStream => f.write_str("point stream"),
        }
    }
}

/// Parses an interval in milliseconds.
///
/// Text that is not an integer yields [`DEFAULT_INTERVAL_MS`]. Any integer
/// below [`MIN_INTERVAL_MS`], negative ones included, is raised to it.
#[must_use]
pub fn parse_interval_ms(text: &str) -> u32 {
    text.trim().parse::<i64>().map_or(DEFAULT_INTERVAL_MS, |ms| {
        u32::try_from(ms.max(i64::from(MIN_INTERVAL_MS))).unwrap_or(u32::MAX)
    })
}

fn ticker(interval_ms: u32) -> Interval {
    let period = Duration::from_millis(u64::from(interval_ms));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Repeating send of a provided payload.
pub struct PeriodicTask {
    interval_ms: u32,
    provider: PayloadProvider,
}

impl PeriodicTask {
    /// Creates a task; intervals below [`MIN_INTERVAL_MS`] are rejected.
    pub fn new(interval_ms: u32, provider: PayloadProvider) -> Result<Self, ValidationError> {
        if interval_ms < MIN_INTERVAL_MS {
            return Err(ValidationError::IntervalTooShort {
                got: interval_ms,
                min: MIN_INTERVAL_MS,
            });
        }
        Ok(Self {
            interval_ms,
            provider,
        })
    }

    /// Tick period.
    #[must_use]
    pub const fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Fetches the payload for the current tick.
    pub fn payload(&mut self) -> Result<Bytes> {
        (self.provider)()
    }
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("interval_ms", &self.interval_ms)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a point stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    /// Never started.
    #[default]
    Idle,
    /// Sending samples.
    Running,
    /// Every sample was attempted.
    Completed,
    /// Stopped before the end.
    Cancelled,
}

/// What a point-stream tick should do.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStep {
    /// Write `payload`, then report `current` of `total`.
    Send {
        /// Encoded sample.
        payload: Bytes,
        /// One-based index of this sample.
        current: usize,
        /// Number of samples.
        total: usize,
    },
    /// Nothing left to send.
    Completed,
}

/// Sequential send of generated sample values.
#[derive(Debug, Clone)]
pub struct PointStream {
    values: Vec<f64>,
    cursor: usize,
    interval_ms: u32,
}

impl PointStream {
    /// Generates the samples for `spec`.
    ///
    /// The interval is floored at [`MIN_INTERVAL_MS`]. An empty generation is
    /// refused with [`ValidationError::NoSamples`].
    pub fn new(spec: &WaveformSpec, interval_ms: u32) -> Result<Self, ValidationError> {
        let samples = generate(spec)?;
        if samples.is_empty() {
            return Err(ValidationError::NoSamples);
        }
        Ok(Self {
            values: samples.into_iter().map(|s| s.y).collect(),
            cursor: 0,
            interval_ms: interval_ms.max(MIN_INTERVAL_MS),
        })
    }

    /// Tick period.
    #[must_use]
    pub const fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Number of samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.values.len()
    }

    /// Samples attempted so far.
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.cursor
    }

    /// Moves to the next sample.
    ///
    /// The cursor advances whether or not the caller's write succeeds.
    pub fn advance(&mut self) -> StreamStep {
        let Some(y) = self.values.get(self.cursor) else {
            return StreamStep::Completed;
        };
        let payload = Bytes::from(format!("{y:.6}\n"));
        self.cursor += 1;
        StreamStep::Send {
            payload,
            current: self.cursor,
            total: self.values.len(),
        }
    }
}

/// Percentage of `current` over `total`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent(current: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    current as f64 / total as f64 * 100.0
}

/// Snapshot of the scheduler slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStatus {
    /// Kind currently running, if any.
    pub active: Option<SchedulerKind>,
    /// Phase of the most recent point stream.
    pub stream_phase: StreamPhase,
    /// Samples attempted and total for the running point stream.
    pub stream_progress: Option<(usize, usize)>,
}

/// The session's single scheduler slot.
#[derive(Debug, Default)]
pub enum SchedulerMode {
    /// Nothing scheduled.
    #[default]
    Idle,
    /// Periodic send running.
    Periodic {
        /// The task.
        task: PeriodicTask,
        /// Its timer.
        ticker: Interval,
    },
    /// Point stream running.
    PointStream {
        /// The stream.
        stream: PointStream,
        /// Its timer.
        ticker: Interval,
    },
}

impl SchedulerMode {
    /// Arms a periodic task. The first tick fires one period from now.
    #[must_use]
    pub fn periodic(task: PeriodicTask) -> Self {
        let ticker = ticker(task.interval_ms());
        Self::Periodic { task, ticker }
    }

    /// Arms a point stream. The first tick fires one period from now.
    #[must_use]
    pub fn point_stream(stream: PointStream) -> Self {
        let ticker = ticker(stream.interval_ms());
        Self::PointStream { stream, ticker }
    }

    /// Kind of the running scheduler.
    #[must_use]
    pub const fn kind(&self) -> Option<SchedulerKind> {
        match self {
            Self::Idle => None,
            Self::Periodic { .. } => Some(SchedulerKind::Periodic),
            Self::PointStream { .. } => Some(SchedulerKind::PointStream),
        }
    }

    /// Returns true if nothing is scheduled.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Replaces the slot with [`SchedulerMode::Idle`], dropping the timer.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Waits for the next tick of the running scheduler.
    ///
    /// Never resolves while idle.
    pub async fn next_tick(&mut self) -> SchedulerKind {
        match self {
            Self::Idle => std::future::pending().await,
            Self::Periodic { ticker, .. } => {
                ticker.tick().await;
                SchedulerKind::Periodic
            }
            Self::PointStream { ticker, .. } => {
                ticker.tick().await;
                SchedulerKind::PointStream
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::WaveformKind;

    fn spec(samples: u32) -> WaveformSpec {
        WaveformSpec::new(WaveformKind::Sine)
            .range(0.0, f64::from(samples - 1))
            .step(1.0)
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval_ms("250"), 250);
        assert_eq!(parse_interval_ms(" 20 "), 20);
        assert_eq!(parse_interval_ms("5"), MIN_INTERVAL_MS);
        assert_eq!(parse_interval_ms("fast"), DEFAULT_INTERVAL_MS);
        assert_eq!(parse_interval_ms(""), DEFAULT_INTERVAL_MS);
        assert_eq!(parse_interval_ms("2.5"), DEFAULT_INTERVAL_MS);
        assert_eq!(parse_interval_ms("-3"), MIN_INTERVAL_MS);
        assert_eq!(parse_interval_ms("0"), MIN_INTERVAL_MS);
        assert_eq!(parse_interval_ms("99999999999"), u32::MAX);
    }

    #[test]
    fn test_periodic_interval_floor() {
        let provider = || -> PayloadProvider { Box::new(|| Ok(Bytes::from_static(b"x"))) };
        assert_eq!(
            PeriodicTask::new(5, provider()).unwrap_err(),
            ValidationError::IntervalTooShort { got: 5, min: 10 }
        );
        let mut task = PeriodicTask::new(10, provider()).unwrap();
        assert_eq!(task.interval_ms(), 10);
        assert_eq!(task.payload().unwrap(), Bytes::from_static(b"x"));
    }

    #[test]
    fn test_point_stream_advance() {
        let mut stream = PointStream::new(&spec(3), 1).unwrap();
        assert_eq!(stream.interval_ms(), MIN_INTERVAL_MS);
        assert_eq!(stream.total(), 3);

        assert_eq!(
            stream.advance(),
            StreamStep::Send {
                payload: Bytes::from_static(b"0.000000\n"),
                current: 1,
                total: 3,
            }
        );
        assert!(matches!(stream.advance(), StreamStep::Send { current: 2, .. }));
        assert!(matches!(stream.advance(), StreamStep::Send { current: 3, .. }));
        assert_eq!(stream.sent(), 3);
        assert_eq!(stream.advance(), StreamStep::Completed);
        assert_eq!(stream.advance(), StreamStep::Completed);
    }

    #[test]
    fn test_point_stream_validation() {
        let bad = WaveformSpec::new(WaveformKind::Sine).step(0.0);
        assert_eq!(
            PointStream::new(&bad, 100).unwrap_err(),
            ValidationError::BadStep(0.0)
        );

        let empty = WaveformSpec::new(WaveformKind::Sine).amplitude(f64::INFINITY);
        assert_eq!(
            PointStream::new(&empty, 100).unwrap_err(),
            ValidationError::NoSamples
        );
    }

    #[test]
    fn test_percent() {
        assert!((percent(1, 4) - 25.0).abs() < f64::EPSILON);
        assert!((percent(5, 5) - 100.0).abs() < f64::EPSILON);
        assert!(percent(0, 0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let stream = PointStream::new(&spec(2), 50).unwrap();
        let mut mode = SchedulerMode::point_stream(stream);
        assert_eq!(mode.kind(), Some(SchedulerKind::PointStream));

        let start = Instant::now();
        assert_eq!(mode.next_tick().await, SchedulerKind::PointStream);
        assert_eq!(start.elapsed(), Duration::from_millis(50));

        let taken = mode.take();
        assert!(mode.is_idle());
        assert!(matches!(taken, SchedulerMode::PointStream { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_never_ticks() {
        let mut mode = SchedulerMode::Idle;
        let result = tokio::time::timeout(Duration::from_secs(60), mode.next_tick()).await;
        assert!(result.is_err());
    }
}
