//! The time sender loop.
//!
//! Polls the clock roughly every millisecond and, each time a whole second has
//! elapsed, writes one encoded update to the sink. Stops when the cancellation
//! latch is set or the first send fails.

use crate::cancel::CancellationToken;
use crate::clock::{Clock, SecondEdge, SystemClock, wall_time};
use crate::codec::{self, CodecError, OverflowPolicy};
use crate::config::Config;
use crate::serial::{ConnectionError, SerialLink, TimeSink};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SenderError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Encode(#[from] CodecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderSettings {
    pub utc_offset_hours: i32,
    pub overflow: OverflowPolicy,
    pub poll_interval: Duration,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SenderSettings {
    fn from(config: &Config) -> Self {
        Self {
            utc_offset_hours: config.clock.utc_offset_hours,
            overflow: config.clock.overflow,
            poll_interval: config.sender.poll_interval(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub messages_sent: u64,
    /// Pre-adjustment value of the last update written.
    pub last_sent: Option<i64>,
}

pub struct TimeSender<C, S> {
    clock: C,
    sink: S,
    settings: SenderSettings,
}

impl<C: Clock, S: TimeSink> TimeSender<C, S> {
    pub fn new(clock: C, sink: S, settings: SenderSettings) -> Self {
        Self { clock, sink, settings }
    }

    #[cfg(test)]
    fn sink(&self) -> &S {
        &self.sink
    }

    #[cfg(test)]
    fn into_sink(self) -> S {
        self.sink
    }

    /// Run until `token` is cancelled. A failed send is logged once, sets the
    /// latch and is returned.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<SendReport, SenderError> {
        let mut report = SendReport::default();
        match self.send_loop(token, &mut report).await {
            Ok(()) => Ok(report),
            Err(e) => {
                tracing::error!("Error {}", e);
                token.cancel();
                Err(e)
            }
        }
    }

    async fn send_loop(
        &mut self,
        token: &CancellationToken,
        report: &mut SendReport,
    ) -> Result<(), SenderError> {
        let mut edge = SecondEdge::new(self.clock.now_unix());
        while !token.is_cancelled() {
            if let Some(timestamp) = edge.observe(self.clock.now_unix()) {
                self.send_one(timestamp).await?;
                report.messages_sent += 1;
                report.last_sent = Some(timestamp);
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
        Ok(())
    }

    async fn send_one(&mut self, timestamp: i64) -> Result<(), SenderError> {
        let adjusted = codec::apply_offset(timestamp, self.settings.utc_offset_hours);
        let payload = codec::encode_timestamp(adjusted, self.settings.overflow)?;
        self.sink.send(&payload).await?;
        match wall_time(adjusted) {
            Some(local) => tracing::info!("Sent Unix time: {} ({})", timestamp, local.format("%Y-%m-%d %H:%M:%S")),
            None => tracing::info!("Sent Unix time: {}", timestamp),
        }
        Ok(())
    }
}

/// Open the configured port and send from the system clock until `token` is
/// cancelled. An open failure is logged once and sets the latch; the loop never runs.
pub async fn run_serial(config: &Config, token: &CancellationToken) -> Result<SendReport, SenderError> {
    let link = match SerialLink::open(&config.serial) {
        Ok(link) => link,
        Err(e) => {
            tracing::error!("Error {}", e);
            token.cancel();
            return Err(e.into());
        }
    };
    tracing::info!("Connected to {}", link.name());
    TimeSender::new(SystemClock, link, SenderSettings::from(config)).run(token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Payload;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed list of readings, then cancels.
    struct Scripted {
        readings: Mutex<Vec<i64>>,
        token: CancellationToken,
    }

    impl Scripted {
        fn new(mut readings: Vec<i64>, token: &CancellationToken) -> Self {
            readings.reverse();
            Self { readings: Mutex::new(readings), token: token.clone() }
        }
    }

    impl Clock for Scripted {
        fn now_unix(&self) -> i64 {
            let mut readings = self.readings.lock().unwrap();
            match readings.len() {
                0 => unreachable!("clock read after script ended"),
                1 => {
                    self.token.cancel();
                    readings[0]
                }
                _ => readings.pop().unwrap(),
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<Payload>);

    #[async_trait]
    impl TimeSink for Recorder {
        async fn send(&mut self, payload: &Payload) -> Result<(), ConnectionError> {
            self.0.push(*payload);
            Ok(())
        }
    }

    fn settings(offset: i32) -> SenderSettings {
        SenderSettings {
            utc_offset_hours: offset,
            overflow: OverflowPolicy::Reject,
            poll_interval: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_one_update_per_second() {
        let token = CancellationToken::new();
        let clock = Scripted::new(vec![100, 100, 100, 101, 101, 102, 102], &token);
        let mut sender = TimeSender::new(clock, Recorder::default(), settings(0));
        let report = sender.run(&token).await.unwrap();
        assert_eq!(report.messages_sent, 2);
        assert_eq!(report.last_sent, Some(101));
        assert_eq!(sender.sink().0, vec![100u32.to_be_bytes(), 101u32.to_be_bytes()]);
    }

    #[tokio::test]
    async fn test_offset_is_applied_to_the_wire_value() {
        let token = CancellationToken::new();
        let clock = Scripted::new(vec![1_700_000_000, 1_700_000_001, 1_700_000_001], &token);
        let mut sender = TimeSender::new(clock, Recorder::default(), settings(-3));
        sender.run(&token).await.unwrap();
        let sent = sender.into_sink().0;
        assert_eq!(sent.len(), 1);
        assert_eq!(i64::from(codec::decode_timestamp(&sent[0])), 1_700_000_000 - 3 * 3600);
    }

    #[tokio::test]
    async fn test_overflow_stops_the_sender() {
        let token = CancellationToken::new();
        let start = i64::from(u32::MAX);
        let clock = Scripted::new(vec![start, start + 1, start + 2, start + 2], &token);
        let mut sender = TimeSender::new(clock, Recorder::default(), settings(1));
        let result = sender.run(&token).await;
        assert!(matches!(result, Err(SenderError::Encode(CodecError::OutOfRange(_)))));
        assert!(token.is_cancelled());
        assert!(sender.sink().0.is_empty());
    }
}
