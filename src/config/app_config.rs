use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::event::{ProfileDetection, ReportPreset};

const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";
const DEFAULT_LOG_ROOT: &str = "logs";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// 애플리케이션 설정
///
/// 어떤 값도 로그 파싱 로직에는 영향을 주지 않습니다.
/// 메시지 렌더링, 채널 라우팅, 드라이버 동작에만 사용됩니다.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Slack
    pub slack_token: String,
    pub slack_api_url: String,
    pub slack_channel: String,
    pub slack_admin_channel: String,
    pub slack_log_channel: String,

    /// 서버 환경 라벨 (예: prod, dev)
    pub environment: String,

    // 이용권 가격 정책 (`1000n1.2500n3` 형식)
    pub ticket_price_policy: String,
    pub ticket_price_registered_policy: String,
    pub deposit_account: Option<String>,

    // Drivers
    pub log_root: PathBuf,
    pub poll_interval_ms: u64,
    pub report_preset: ReportPreset,
    pub profile_detection: ProfileDetection,
    pub notify_ticket_consumed: bool,
}

impl AppConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 로드 (테스트에서 프로세스 환경을 건드리지 않기 위함)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).unwrap_or_else(|| {
                tracing::warn!(key = key, "환경변수가 설정되지 않았습니다. 빈 값으로 진행합니다.");
                String::new()
            })
        };

        let slack_token = required("SLACK_TOKEN");
        let slack_channel = required("SLACK_CHANNEL");
        let slack_admin_channel = required("SLACK_ADMIN_CHANNEL");
        let slack_log_channel = required("SLACK_LOG_CHANNEL");
        let ticket_price_policy = required("TICKET_PRICE_POLICY");
        let ticket_price_registered_policy = required("TICKET_PRICE_REGISTERED_POLICY");

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "local".to_string());
        let slack_api_url =
            lookup("SLACK_API_URL").unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string());
        let log_root = lookup("LOG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_ROOT));
        let deposit_account = lookup("DEPOSIT_ACCOUNT").filter(|v| !v.trim().is_empty());

        let poll_interval_ms = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(ConfigError::InvalidPollInterval(raw)),
            },
            None => DEFAULT_POLL_INTERVAL_MS,
        };

        let report_preset = match lookup("REPORT_PRESET") {
            Some(raw) => ReportPreset::from_str(&raw)
                .map_err(|_| ConfigError::InvalidReportPreset(raw))?,
            None => ReportPreset::Full,
        };

        let profile_detection = match lookup("PROFILE_DETECTION") {
            Some(raw) => ProfileDetection::from_str(&raw)
                .map_err(|_| ConfigError::InvalidProfileDetection(raw))?,
            None => ProfileDetection::StatusMarker,
        };

        let notify_ticket_consumed = match lookup("NOTIFY_TICKET_CONSUMED") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidFlag {
                key: "NOTIFY_TICKET_CONSUMED",
                value: raw,
            })?,
            None => false,
        };

        Ok(Self {
            slack_token,
            slack_api_url,
            slack_channel,
            slack_admin_channel,
            slack_log_channel,
            environment,
            ticket_price_policy,
            ticket_price_registered_policy,
            deposit_account,
            log_root,
            poll_interval_ms,
            report_preset,
            profile_detection,
            notify_ticket_consumed,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid POLL_INTERVAL_MS: {0}")]
    InvalidPollInterval(String),
    #[error("Invalid REPORT_PRESET: {0} (expected 'full' or 'tickets')")]
    InvalidReportPreset(String),
    #[error("Invalid PROFILE_DETECTION: {0} (expected 'marker' or 'status-field')")]
    InvalidProfileDetection(String),
    #[error("Invalid boolean for {key}: {value}")]
    InvalidFlag { key: &'static str, value: String },
    #[error("Invalid --since value: {0} (expected 'YYYY-MM-DD HH:MM')")]
    InvalidSince(String),
    #[error("Invalid --hours value: {0} (expected 1..={max})", max = crate::config::cli::MAX_REPORT_HOURS)]
    InvalidHours(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn should_apply_defaults_when_optional_keys_missing() {
        // Arrange
        let lookup = lookup_from(&[("SLACK_TOKEN", "xoxb-test"), ("SLACK_CHANNEL", "C001")]);

        // Act
        let config = AppConfig::from_lookup(lookup).expect("config should load");

        // Assert
        assert_eq!(config.slack_token, "xoxb-test");
        assert_eq!(config.slack_channel, "C001");
        assert_eq!(config.slack_api_url, DEFAULT_SLACK_API_URL);
        assert_eq!(config.log_root, PathBuf::from("logs"));
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.report_preset, ReportPreset::Full);
        assert_eq!(config.profile_detection, ProfileDetection::StatusMarker);
        assert!(!config.notify_ticket_consumed);
        assert!(config.deposit_account.is_none());
    }

    #[test]
    fn should_read_all_recognized_keys() {
        // Arrange
        let lookup = lookup_from(&[
            ("SLACK_TOKEN", "xoxb-test"),
            ("SLACK_CHANNEL", "C001"),
            ("SLACK_ADMIN_CHANNEL", "C002"),
            ("SLACK_LOG_CHANNEL", "C003"),
            ("ENVIRONMENT", "prod"),
            ("TICKET_PRICE_POLICY", "1000n1.2500n3"),
            ("TICKET_PRICE_REGISTERED_POLICY", "500n1"),
            ("LOG_ROOT", "/var/log/signal"),
            ("POLL_INTERVAL_MS", "250"),
            ("REPORT_PRESET", "tickets"),
            ("PROFILE_DETECTION", "status-field"),
            ("NOTIFY_TICKET_CONSUMED", "true"),
            ("DEPOSIT_ACCOUNT", "카카오뱅크 0000"),
        ]);

        // Act
        let config = AppConfig::from_lookup(lookup).expect("config should load");

        // Assert
        assert_eq!(config.slack_admin_channel, "C002");
        assert_eq!(config.slack_log_channel, "C003");
        assert_eq!(config.environment, "prod");
        assert_eq!(config.ticket_price_policy, "1000n1.2500n3");
        assert_eq!(config.ticket_price_registered_policy, "500n1");
        assert_eq!(config.log_root, PathBuf::from("/var/log/signal"));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.report_preset, ReportPreset::Tickets);
        assert_eq!(config.profile_detection, ProfileDetection::StatusField);
        assert!(config.notify_ticket_consumed);
        assert_eq!(config.deposit_account.as_deref(), Some("카카오뱅크 0000"));
    }

    #[test]
    fn should_reject_invalid_poll_interval() {
        // Arrange
        let lookup = lookup_from(&[("POLL_INTERVAL_MS", "soon")]);

        // Act
        let result = AppConfig::from_lookup(lookup);

        // Assert
        assert!(matches!(result, Err(ConfigError::InvalidPollInterval(_))));
    }

    #[test]
    fn should_reject_zero_poll_interval() {
        let result = AppConfig::from_lookup(lookup_from(&[("POLL_INTERVAL_MS", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidPollInterval(_))));
    }

    #[test]
    fn should_reject_unknown_report_preset() {
        // Arrange
        let lookup = lookup_from(&[("REPORT_PRESET", "everything")]);

        // Act
        let result = AppConfig::from_lookup(lookup);

        // Assert
        assert!(matches!(result, Err(ConfigError::InvalidReportPreset(_))));
    }

    #[test]
    fn should_reject_malformed_flag() {
        let result = AppConfig::from_lookup(lookup_from(&[("NOTIFY_TICKET_CONSUMED", "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidFlag { .. })));
    }
}
