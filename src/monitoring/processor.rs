//! Drivers for the two operating modes
//!
//! - `WatchProcessor`: polls the log root, tails changed files and sends one
//!   message per event
//! - `ReportRunner`: one-shot aggregate report over a time window

use crate::config::AppConfig;
use crate::event::{Channel, Classifier, ReportPreset};
use crate::monitoring::aggregator::{build_report, AggregateSummary};
use crate::monitoring::formatter::{
    format_event, format_parse_failure_alert, format_report, format_startup_notice,
    MessageContext,
};
use crate::monitoring::log_reader::{LogReader, RawLogLine, TailState, TimeWindow};
use crate::monitoring::slack_alert::NotificationSink;
use crate::utils::AppError;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

/// Concrete channel ids for each logical channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRoutes {
    pub default: String,
    pub admin: String,
    pub log: String,
}

impl ChannelRoutes {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default: config.slack_channel.clone(),
            admin: config.slack_admin_channel.clone(),
            log: config.slack_log_channel.clone(),
        }
    }

    pub fn resolve(&self, channel: Channel) -> &str {
        match channel {
            Channel::Default => &self.default,
            Channel::Admin => &self.admin,
            Channel::Log => &self.log,
        }
    }
}

/// Continuous tail-and-notify loop
pub struct WatchProcessor<S: NotificationSink + ?Sized> {
    reader: LogReader,
    classifier: Classifier,
    context: MessageContext,
    routes: ChannelRoutes,
    sink: Arc<S>,
    /// Owned by this loop only
    state: TailState,
    poll_interval_ms: u64,
}

impl<S: NotificationSink + ?Sized> WatchProcessor<S> {
    pub fn new(config: &AppConfig, sink: Arc<S>) -> Self {
        Self {
            reader: LogReader::new(config.log_root.clone()),
            classifier: Classifier::notifications(config.notify_ticket_consumed),
            context: MessageContext::from_config(config),
            routes: ChannelRoutes::from_config(config),
            sink,
            state: TailState::new(),
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    /// Move every existing log file to its end and announce the watcher
    ///
    /// Returns the number of primed files.
    #[instrument(skip(self), level = "info")]
    pub async fn start(&mut self, now: DateTime<Utc>) -> usize {
        let mut primed = 0;
        for path in self.reader.discover_log_files() {
            match self.reader.prime(&path, &mut self.state) {
                Ok(lines) => {
                    debug!(path = %path.display(), lines, "Primed log file");
                    primed += 1;
                }
                Err(e) => warn!(
                    error = %e,
                    code = e.error_code(),
                    "Failed to prime log file, skipping"
                ),
            }
        }

        info!(
            log_root = %self.reader.log_root().display(),
            files = primed,
            "Watcher started"
        );

        let notice = format_startup_notice(&self.context, now);
        self.dispatch(Channel::Log, &notice).await;
        primed
    }

    /// Re-read every file whose modification time or size changed since the last poll
    ///
    /// Returns the number of messages handed to the sink.
    pub async fn process_once(&mut self, now: DateTime<Utc>) -> usize {
        let mut sent = 0;
        for path in self.reader.changed_files(&self.state) {
            match self.process_file(&path, now).await {
                Ok(count) => sent += count,
                // 파일 단위 오류는 건너뛰고 다음 poll에서 재시도
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, code = e.error_code(), "Failed to read log file, skipping");
                }
                Err(e) => {
                    error!(error = %e, code = e.error_code(), "Failed to process log file");
                }
            }
        }
        sent
    }

    /// Handle the lines appended to one file since its cursor
    #[instrument(skip(self, path, now), fields(path = %path.display()), level = "debug")]
    pub async fn process_file(&mut self, path: &Path, now: DateTime<Utc>) -> Result<usize, AppError> {
        let lines = self.reader.read_appended(path, &mut self.state)?;

        let mut sent = 0;
        for line in &lines {
            if self.handle_line(line, now).await {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Classify, parse, format and deliver one line
    ///
    /// A matched line that fails to parse raises an alert on the log channel.
    async fn handle_line(&self, line: &RawLogLine, now: DateTime<Utc>) -> bool {
        let Some(classified) = self.classifier.classify(&line.text) else {
            return false;
        };

        match classified.parse() {
            Ok(event) => match format_event(&event, &self.context, now) {
                Some(text) => {
                    info!(
                        path = %line.source.display(),
                        line = line.line_number,
                        kind = %event.kind(),
                        "Event detected"
                    );
                    self.dispatch(event.channel(), &text).await
                }
                None => {
                    debug!(kind = %event.kind(), "Event produces no message");
                    false
                }
            },
            Err(e) => {
                warn!(
                    path = %line.source.display(),
                    line = line.line_number,
                    kind = %classified.kind,
                    error = %e,
                    "Failed to parse matched line"
                );
                let alert = format_parse_failure_alert(&self.context, &line.text);
                self.dispatch(Channel::Log, &alert).await
            }
        }
    }

    async fn dispatch(&self, channel: Channel, text: &str) -> bool {
        let channel_id = self.routes.resolve(channel);
        match self.sink.deliver(channel_id, text).await {
            Ok(receipt) => receipt.delivered,
            Err(e) => {
                error!(
                    error = %e,
                    code = e.error_code(),
                    channel = ?channel,
                    "Notification delivery failed"
                );
                false
            }
        }
    }

    /// Poll until `shutdown` completes
    #[instrument(skip(self, shutdown), level = "info")]
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start(Utc::now()).await;

        info!(
            poll_interval_ms = self.poll_interval_ms,
            "Starting watch loop"
        );

        let mut ticker = tokio::time::interval(Duration::from_millis(self.poll_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(files = self.state.len(), "Watch loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let sent = self.process_once(Utc::now()).await;
                    if sent > 0 {
                        debug!(sent, "Poll finished");
                    }
                }
            }
        }
    }
}

/// One-shot aggregate report
pub struct ReportRunner<S: NotificationSink + ?Sized> {
    reader: LogReader,
    classifier: Classifier,
    preset: ReportPreset,
    channel: String,
    sink: Arc<S>,
}

impl<S: NotificationSink + ?Sized> ReportRunner<S> {
    pub fn new(config: &AppConfig, sink: Arc<S>) -> Self {
        Self {
            reader: LogReader::new(config.log_root.clone()),
            classifier: Classifier::report(config.report_preset, config.profile_detection),
            preset: config.report_preset,
            channel: config.slack_channel.clone(),
            sink,
        }
    }

    /// Count events and visitors inside `window` without sending anything
    pub fn summarize(&self, window: TimeWindow) -> AggregateSummary {
        let lines = self.reader.read_window(&window);
        debug!(lines = lines.len(), "Collected lines for report");
        build_report(&lines, &self.classifier, window)
    }

    /// Build the report and deliver it to the default channel
    ///
    /// A delivery failure is logged; the computed summary is returned either way.
    #[instrument(skip(self), level = "info")]
    pub async fn run(&self, window: TimeWindow) -> AggregateSummary {
        let summary = self.summarize(window);
        info!(
            visitors = summary.visitors,
            profiles = summary.profiles,
            issued_tickets = summary.issued_tickets,
            consumed_tickets = summary.consumed_tickets,
            "Report built"
        );

        let message = format_report(&summary, self.preset);
        if let Err(e) = self.sink.deliver(&self.channel, &message).await {
            error!(error = %e, code = e.error_code(), "Failed to deliver report");
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::slack_alert::DeliveryReceipt;
    use async_trait::async_trait;
    use chrono::{NaiveDateTime, TimeZone};
    use std::env::temp_dir;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use uuid::Uuid;

    const N: &str = "INFO com.yourssu.signal.infrastructure.Notification - ";

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<(String, String)> {
            self.messages.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, channel_id: &str, text: &str) -> Result<DeliveryReceipt, AppError> {
            self.messages
                .lock()
                .expect("lock poisoned")
                .push((channel_id.to_string(), text.to_string()));
            Ok(DeliveryReceipt {
                channel: channel_id.to_string(),
                delivered: true,
                response: None,
            })
        }
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _channel_id: &str, _text: &str) -> Result<DeliveryReceipt, AppError> {
            Err(AppError::delivery("connection refused"))
        }
    }

    fn create_test_config(name: &str) -> AppConfig {
        let root = temp_dir().join(format!("test_processor_{}_{}", name, Uuid::new_v4()));
        fs::create_dir_all(root.join("2025-05-18")).expect("Failed to create log root");

        let mut config = AppConfig::from_lookup(|_| None).expect("default config");
        config.log_root = root;
        config.slack_channel = "C-DEFAULT".to_string();
        config.slack_admin_channel = "C-ADMIN".to_string();
        config.slack_log_channel = "C-LOG".to_string();
        config.environment = "test".to_string();
        config
    }

    fn log_path(config: &AppConfig) -> PathBuf {
        config.log_root.join("2025-05-18").join("app.log")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 18, 1, 0, 0).single().expect("valid instant")
    }

    #[test]
    fn should_resolve_channel_routes() {
        let routes = ChannelRoutes {
            default: "A".to_string(),
            admin: "B".to_string(),
            log: "C".to_string(),
        };
        assert_eq!(routes.resolve(Channel::Default), "A");
        assert_eq!(routes.resolve(Channel::Admin), "B");
        assert_eq!(routes.resolve(Channel::Log), "C");
    }

    #[tokio::test]
    async fn should_send_startup_notice_and_skip_history() {
        // Arrange
        let config = create_test_config("startup");
        fs::write(
            log_path(&config),
            format!("2025-05-18 09:00:00.000000 {}Issued ticket&0042 user-1 2 5\n", N),
        )
        .expect("Failed to write log");
        let sink = Arc::new(RecordingSink::default());
        let mut processor = WatchProcessor::new(&config, sink.clone());

        // Act
        let primed = processor.start(now()).await;
        let sent = processor.process_once(now()).await;

        // Assert
        assert_eq!(primed, 1);
        assert_eq!(sent, 0);
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "C-LOG");
        assert!(messages[0].1.contains("Observer started"));
    }

    #[tokio::test]
    async fn should_notify_appended_events_on_their_channels() {
        // Arrange
        let config = create_test_config("append");
        let path = log_path(&config);
        fs::write(&path, "2025-05-18 09:00:00.000000 INFO boot\n").expect("Failed to write log");
        let sink = Arc::new(RecordingSink::default());
        let mut processor = WatchProcessor::new(&config, sink.clone());
        processor.start(now()).await;

        fs::write(
            &path,
            format!(
                "2025-05-18 09:00:00.000000 INFO boot\n\
                 2025-05-18 10:00:00.000000 {n}Issued ticket&42 user-1 2 5\n\
                 2025-05-18 10:00:01.000000 {n}CreateProfile&7&컴퓨터학부&010&별빛&안녕\n\
                 2025-05-18 10:00:02.000000 {n}ContactExceedsLimitWarning&2\n\
                 2025-05-18 10:00:03.000000 INFO unrelated line\n",
                n = N
            ),
        )
        .expect("Failed to append log");

        // Act
        let sent = processor.process_file(&path, now()).await.expect("Failed to process");

        // Assert
        assert_eq!(sent, 3);
        let messages = sink.messages();
        assert_eq!(messages[1].0, "C-DEFAULT");
        assert!(messages[1].1.contains("0042"));
        assert_eq!(messages[2].0, "C-ADMIN");
        assert_eq!(messages[3].0, "C-LOG");
    }

    #[tokio::test]
    async fn should_alert_log_channel_on_parse_failure() {
        // Arrange
        let config = create_test_config("parse_failure");
        let path = log_path(&config);
        let sink = Arc::new(RecordingSink::default());
        let mut processor = WatchProcessor::new(&config, sink.clone());
        let broken = format!("2025-05-18 10:00:00.000000 {}Issued ticket&42 user-1", N);
        fs::write(&path, format!("{}\n", broken)).expect("Failed to write log");

        // Act
        let sent = processor.process_file(&path, now()).await.expect("Failed to process");

        // Assert
        assert_eq!(sent, 1);
        let messages = sink.messages();
        assert_eq!(messages[0].0, "C-LOG");
        assert_eq!(
            messages[0].1,
            format!("🚨ALERT ERROR - TEST SERVER🚨\nlogging: {}", broken)
        );
    }

    #[tokio::test]
    async fn should_ignore_consumed_ticket_unless_enabled() {
        // Arrange
        let config = create_test_config("consumed");
        let path = log_path(&config);
        fs::write(&path, format!("2025-05-18 10:00:00.000000 {}Consumed ticket&별빛 1\n", N))
            .expect("Failed to write log");
        let sink = Arc::new(RecordingSink::default());
        let mut processor = WatchProcessor::new(&config, sink.clone());

        // Act
        let sent = processor.process_file(&path, now()).await.expect("Failed to process");

        // Assert
        assert_eq!(sent, 0);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn should_advance_cursor_even_when_delivery_fails() {
        // Arrange
        let config = create_test_config("delivery_failure");
        let path = log_path(&config);
        fs::write(&path, format!("2025-05-18 10:00:00.000000 {}Issued ticket&42 user-1 2 5\n", N))
            .expect("Failed to write log");
        let mut processor = WatchProcessor::new(&config, Arc::new(FailingSink));

        // Act
        let sent = processor.process_file(&path, now()).await.expect("Failed to process");

        // Assert
        assert_eq!(sent, 0);
        assert_eq!(processor.state().cursor(&path).map(|c| c.lines), Some(1));
    }

    #[tokio::test]
    async fn should_notify_issuance_once_when_line_arrives_in_two_writes() {
        // Arrange
        let config = create_test_config("split_write");
        let path = log_path(&config);
        let sink = Arc::new(RecordingSink::default());
        let mut processor = WatchProcessor::new(&config, sink.clone());
        let head = format!("2025-05-18 10:00:00.000000 {}Issued ticket&0042 user-1 2", N);
        fs::write(&path, &head).expect("Failed to write log");

        // Act
        let first = processor.process_file(&path, now()).await.expect("Failed to process");
        fs::write(&path, format!("{} 5\n", head)).expect("Failed to finish line");
        let second = processor.process_file(&path, now()).await.expect("Failed to process");

        // Assert
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "C-DEFAULT");
        assert!(messages[0].1.starts_with("🩷 *이용권 발급 완료* 🩷"));
        assert!(messages[0].1.contains("- 💝 *보유 이용권*: 5장"));
    }

    #[tokio::test]
    async fn should_return_report_summary_even_when_delivery_fails() {
        // Arrange
        let config = create_test_config("report_delivery_failure");
        fs::write(
            log_path(&config),
            format!(
                "2025-05-18 10:00:00.000000 {n}Issued ticket&0042 user-1 2 5\n\
                 2025-05-18 10:05:00.000000 {n}Issued ticket&0043 user-2 3 3\n",
                n = N
            ),
        )
        .expect("Failed to write log");
        let runner = ReportRunner::new(&config, Arc::new(FailingSink));
        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("valid");
        let window = TimeWindow::new(at("2025-05-18 09:30"), at("2025-05-18 10:30"));

        // Act
        let summary = runner.run(window).await;

        // Assert
        assert_eq!(summary, runner.summarize(window));
        assert_eq!(summary.issued_tickets, 5);
    }

    #[tokio::test]
    async fn should_deliver_report_to_default_channel() {
        // Arrange
        let config = create_test_config("report");
        fs::write(
            log_path(&config),
            format!("2025-05-18 10:00:00.000000 {}Issued ticket&0042 user-1 2 5\n", N),
        )
        .expect("Failed to write log");
        let sink = Arc::new(RecordingSink::default());
        let runner = ReportRunner::new(&config, sink.clone());
        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("valid");
        let window = TimeWindow::new(at("2025-05-18 09:30"), at("2025-05-18 10:30"));

        // Act
        let summary = runner.run(window).await;

        // Assert
        assert_eq!(summary.issued_tickets, 2);
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "C-DEFAULT");
        assert!(messages[0].1.contains("- *🎁 발급한 이용권* : 2 개"));
    }
}
