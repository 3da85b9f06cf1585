//! Batch aggregation for the periodic report
//!
//! 이벤트 카운트와 방문자 수를 한 번의 실행 동안 누적합니다.

use crate::event::{Classifier, ParsedEvent};
use crate::monitoring::log_reader::{RawLogLine, TimeWindow};
use std::collections::HashSet;
use tracing::debug;

/// Header carrying the client address behind the reverse proxy
pub const CLIENT_ADDRESS_HEADER: &str = "x-real-ip";

/// Counts collected over one report window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSummary {
    pub window: TimeWindow,
    /// Distinct client addresses seen in request logs
    pub visitors: usize,
    pub profiles: u64,
    /// Sum of issued counts, including deposit-retry issuances
    pub issued_tickets: u64,
    /// Consumption lines, excluding zero-ticket ones
    pub consumed_tickets: u64,
}

/// Distinct client address counter
#[derive(Debug, Clone, Default)]
pub struct VisitorCounter {
    addresses: HashSet<String>,
}

impl VisitorCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the client address of a request log line, if it has one
    pub fn observe(&mut self, line: &str) {
        if let Some(address) = extract_client_address(line) {
            self.addresses.insert(address);
        }
    }

    pub fn count(&self) -> usize {
        self.addresses.len()
    }
}

/// `Request.Headers["x-real-ip"]` of the JSON following the first ` - `
pub fn extract_client_address(line: &str) -> Option<String> {
    let (_, json) = line.split_once(" - ")?;
    let value: serde_json::Value = serde_json::from_str(json.trim()).ok()?;

    value
        .get("Request")?
        .get("Headers")?
        .get(CLIENT_ADDRESS_HEADER)?
        .as_str()
        .filter(|address| !address.is_empty())
        .map(str::to_string)
}

/// 이벤트 카운터
#[derive(Debug, Clone)]
pub struct Aggregator {
    window: TimeWindow,
    visitors: VisitorCounter,
    profiles: u64,
    issued_tickets: u64,
    consumed_tickets: u64,
}

impl Aggregator {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            visitors: VisitorCounter::new(),
            profiles: 0,
            issued_tickets: 0,
            consumed_tickets: 0,
        }
    }

    pub fn add(&mut self, event: &ParsedEvent) {
        match event {
            ParsedEvent::ProfileCreated { .. } => self.profiles += 1,
            ParsedEvent::TicketIssued(issuance)
            | ParsedEvent::TicketIssuedByDeposit { issuance, .. } => {
                self.issued_tickets += u64::from(issuance.issued);
            }
            ParsedEvent::TicketConsumed(consumption) if !consumption.is_noop() => {
                self.consumed_tickets += 1;
            }
            _ => {}
        }
    }

    /// Feed a raw line to the visitor counter
    pub fn observe_line(&mut self, line: &str) {
        self.visitors.observe(line);
    }

    pub fn snapshot(&self) -> AggregateSummary {
        AggregateSummary {
            window: self.window,
            visitors: self.visitors.count(),
            profiles: self.profiles,
            issued_tickets: self.issued_tickets,
            consumed_tickets: self.consumed_tickets,
        }
    }
}

/// Classify and count every line of a report window
///
/// Lines whose payload fails to parse are skipped.
pub fn build_report(
    lines: &[RawLogLine],
    classifier: &Classifier,
    window: TimeWindow,
) -> AggregateSummary {
    let mut aggregator = Aggregator::new(window);

    for line in lines {
        aggregator.observe_line(&line.text);

        let Some(classified) = classifier.classify(&line.text) else {
            continue;
        };

        match classified.parse() {
            Ok(event) => aggregator.add(&event),
            Err(e) => {
                debug!(
                    path = %line.source.display(),
                    line = line.line_number,
                    kind = %classified.kind,
                    error = %e,
                    "Skipping unparseable line"
                );
            }
        }
    }

    aggregator.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ProfileDetection, ReportPreset, TicketConsumption, TicketIssuance};
    use chrono::NaiveDateTime;
    use std::path::PathBuf;

    const N: &str = "INFO com.yourssu.signal.infrastructure.Notification - ";

    fn window() -> TimeWindow {
        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("valid");
        TimeWindow::new(at("2025-05-18 10:00"), at("2025-05-18 11:00"))
    }

    fn raw(text: &str) -> RawLogLine {
        RawLogLine {
            text: text.to_string(),
            source: PathBuf::from("logs/2025-05-18/app.log"),
            line_number: 1,
            timestamp: None,
        }
    }

    fn request_line(ip: &str) -> String {
        format!(
            "2025-05-18 10:00:00.000000 INFO RequestLogger - {{\"Request\":{{\"Method\":\"GET\",\"Headers\":{{\"x-real-ip\":\"{}\"}}}}}}",
            ip
        )
    }

    fn issuance(issued: u32) -> TicketIssuance {
        TicketIssuance {
            verification_code: "42".to_string(),
            user_id: "user-1".to_string(),
            issued,
            remaining: 0,
        }
    }

    #[test]
    fn should_extract_client_address_from_request_headers() {
        assert_eq!(
            extract_client_address(&request_line("1.2.3.4")),
            Some("1.2.3.4".to_string())
        );
    }

    #[test]
    fn should_ignore_lines_without_request_headers() {
        assert_eq!(extract_client_address("plain text line"), None);
        assert_eq!(extract_client_address("x - not json"), None);
        assert_eq!(extract_client_address("x - {\"Request\":{}}"), None);
        assert_eq!(
            extract_client_address("x - {\"Request\":{\"Headers\":{\"x-real-ip\":\"\"}}}"),
            None
        );
    }

    #[test]
    fn should_count_distinct_visitors() {
        // Arrange
        let mut counter = VisitorCounter::new();

        // Act
        counter.observe(&request_line("1.2.3.4"));
        counter.observe(&request_line("1.2.3.4"));
        counter.observe(&request_line("5.6.7.8"));

        // Assert
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn should_sum_issued_counts_across_issue_kinds() {
        // Arrange
        let mut aggregator = Aggregator::new(window());

        // Act
        aggregator.add(&ParsedEvent::TicketIssued(issuance(2)));
        aggregator.add(&ParsedEvent::TicketIssuedByDeposit {
            issuance: issuance(3),
            depositor: "홍길동".to_string(),
        });

        // Assert
        assert_eq!(aggregator.snapshot().issued_tickets, 5);
    }

    #[test]
    fn should_not_count_zero_consumption() {
        // Arrange
        let mut aggregator = Aggregator::new(window());
        let consumption = |consumed| {
            ParsedEvent::TicketConsumed(TicketConsumption {
                nickname: "별빛".to_string(),
                consumed,
            })
        };

        // Act
        aggregator.add(&consumption(0));
        aggregator.add(&consumption(1));
        aggregator.add(&consumption(2));

        // Assert
        assert_eq!(aggregator.snapshot().consumed_tickets, 2);
    }

    #[test]
    fn should_ignore_non_report_events() {
        // Arrange
        let mut aggregator = Aggregator::new(window());

        // Act
        aggregator.add(&ParsedEvent::ServerRestarted);
        aggregator.add(&ParsedEvent::FailedDuplicateContact { limit: 3 });

        // Assert
        let summary = aggregator.snapshot();
        assert_eq!(summary.profiles, 0);
        assert_eq!(summary.issued_tickets, 0);
        assert_eq!(summary.consumed_tickets, 0);
    }

    #[test]
    fn should_build_report_from_raw_lines() {
        // Arrange
        let classifier = Classifier::report(ReportPreset::Full, ProfileDetection::StatusMarker);
        let lines = vec![
            raw(&format!("2025-05-18 10:00:00.000000 {}Issued ticket&0042 user-1 2 5", N)),
            raw(&format!("2025-05-18 10:01:00.000000 {}Issued ticket&0043 user-2 3 3", N)),
            raw(&format!("2025-05-18 10:02:00.000000 {}Issued ticket&broken", N)),
            raw(&format!("2025-05-18 10:03:00.000000 {}Consumed ticket&별빛 1", N)),
            raw(&format!("2025-05-18 10:04:00.000000 {}Consumed ticket&달빛 0", N)),
            raw("2025-05-18 10:05:00.000000 INFO ReplyLogger - {\"Reply\":{\"Method\":\"POST /api/profiles - 201\",\"Status\":201}}"),
            raw(&request_line("1.2.3.4")),
            raw(&request_line("1.2.3.4")),
        ];

        // Act
        let summary = build_report(&lines, &classifier, window());

        // Assert
        assert_eq!(summary.issued_tickets, 5);
        assert_eq!(summary.consumed_tickets, 1);
        assert_eq!(summary.profiles, 1);
        assert_eq!(summary.visitors, 1);
        assert_eq!(summary.window, window());
    }

    #[test]
    fn should_skip_profiles_for_tickets_preset() {
        // Arrange
        let classifier = Classifier::report(ReportPreset::Tickets, ProfileDetection::StatusMarker);
        let lines = vec![raw(
            "2025-05-18 10:05:00.000000 INFO ReplyLogger - {\"Reply\":{\"Method\":\"POST /api/profiles - 201\",\"Status\":201}}",
        )];

        // Act
        let summary = build_report(&lines, &classifier, window());

        // Assert
        assert_eq!(summary.profiles, 0);
    }
}
