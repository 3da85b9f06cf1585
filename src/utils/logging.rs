//! 로깅 초기화 모듈
//!
//! JSON 형식의 구조화된 로깅을 제공합니다.
//! stderr와 일별 로그 파일에 동시 출력합니다. (stdout은 dry-run 메시지 출력용)

use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 로깅 시스템을 초기화합니다.
///
/// 환경 변수 `RUST_LOG`를 통해 로그 레벨을 설정할 수 있으며,
/// 기본값은 `info,log_notifier=debug`입니다.
///
/// 파일 로그는 `NOTIFIER_LOG_DIR`(기본 `notifier-logs`) 아래에 `notifier.log.YYYY-MM-DD`
/// 형식으로 기록됩니다. 파일명이 `.log`로 끝나지 않으므로 watch 모드가 자기 로그를 읽지 않습니다.
///
/// 반환되는 `WorkerGuard`를 main에서 유지해야 종료 시 버퍼링된 로그가 손실되지 않습니다.
pub fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = std::env::var("NOTIFIER_LOG_DIR").unwrap_or_else(|_| "notifier-logs".to_string());

    let file_appender = rolling::daily(&log_dir, "notifier.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .flatten_event(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .flatten_event(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,log_notifier=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .or_else(|err| {
            // Detect "already initialized" via source downcasting
            use std::error::Error;
            if err
                .source()
                .and_then(|s| s.downcast_ref::<tracing::dispatcher::SetGlobalDefaultError>())
                .is_some()
            {
                return Ok(());
            }
            eprintln!("Failed to initialize tracing: {}", err);
            Err(err)
        })
        .ok();

    guard
}
