//! Log monitoring and notification
//!
//! - Log line reading (time window or tail)
//! - Report aggregation
//! - Message formatting
//! - Slack delivery
//! - Watch and report drivers

pub mod aggregator;
pub mod formatter;
pub mod log_reader;
pub mod processor;
pub mod slack_alert;

pub use aggregator::{build_report, AggregateSummary, Aggregator, VisitorCounter};
pub use formatter::{format_event, format_report, MessageContext};
pub use log_reader::{LogReader, RawLogLine, TailCursor, TailState, TimeWindow};
pub use processor::{ChannelRoutes, ReportRunner, WatchProcessor};
pub use slack_alert::{ConsoleSink, DeliveryReceipt, NotificationSink, SlackNotifier};
