use chrono::Local;
use clap::Parser;
use log_notifier::config::{cli::report_window, AppConfig, Cli, Command};
use log_notifier::monitoring::{
    ConsoleSink, NotificationSink, ReportRunner, SlackNotifier, WatchProcessor,
};
use log_notifier::shutdown::shutdown_signal;
use log_notifier::utils::{init_logging, AppError};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. 환경변수 로드
    dotenvy::dotenv().ok();

    // 2. 로깅 초기화 (guard는 종료 시까지 유지)
    let _guard = init_logging();

    let cli = Cli::parse();

    // 3. 설정 로드
    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        AppError::from(e)
    })?;

    // 4. 알림 대상 선택
    let sink: Arc<dyn NotificationSink> = if cli.dry_run {
        tracing::info!("Dry run: messages are printed to stdout");
        Arc::new(ConsoleSink)
    } else {
        Arc::new(SlackNotifier::from_config(&config))
    };

    // 5. 실행
    match cli.command {
        Command::Report { since, hours } => {
            let window = report_window(since.as_deref(), hours, Local::now().naive_local())?;
            tracing::info!(start = %window.start, end = %window.end, "Running report");
            ReportRunner::new(&config, sink).run(window).await;
        }
        Command::Watch => {
            tracing::info!(log_root = %config.log_root.display(), "Watching log root");
            WatchProcessor::new(&config, sink)
                .run(shutdown_signal())
                .await;
        }
    }

    Ok(())
}
