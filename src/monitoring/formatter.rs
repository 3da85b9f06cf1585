//! Slack message templates
//!
//! 이벤트 한 건 또는 집계 결과를 사람이 읽을 수 있는 메시지로 변환합니다.
//! 현재 시각은 호출자가 넘겨주며, 이 모듈은 시계를 읽지 않습니다.

use crate::config::AppConfig;
use crate::event::{Deposit, ParsedEvent, ProfileDetails, ReportPreset, TicketIssuance};
use crate::monitoring::aggregator::AggregateSummary;
use chrono::{DateTime, FixedOffset, Utc};

/// 한국 표준시 오프셋 (UTC+09:00)
const KST_OFFSET_SECS: i32 = 9 * 3600;

const KST_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const REPORT_PERIOD_FORMAT: &str = "%Y년 %m월 %d일 %H시 %M분";

/// Rendering inputs that come from configuration, never from the log line
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    /// 서버 환경 라벨 (메시지에는 대문자로 표시)
    pub environment: String,
    pub price_policy: String,
    pub registered_price_policy: String,
    pub deposit_account: Option<String>,
}

impl MessageContext {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            price_policy: config.ticket_price_policy.clone(),
            registered_price_policy: config.ticket_price_registered_policy.clone(),
            deposit_account: config.deposit_account.clone(),
        }
    }

    fn env_label(&self) -> String {
        self.environment.to_uppercase()
    }

    fn price_policy_line(&self) -> String {
        format!("- 💰 현재 가격 정책: {}", format_price_policy(&self.price_policy))
    }

    fn registered_price_policy_line(&self) -> String {
        format!(
            "- 🌱 프로필 등록 완료 첫 구매 고객: {}",
            format_price_policy(&self.registered_price_policy)
        )
    }
}

/// `1000n1.2500n3` → `1000원/1장 2500원/3장`
pub fn format_price_policy(policy: &str) -> String {
    format!("{}장", policy.replace('n', "원/").replace('.', "장 "))
}

/// Left-pad a verification code with zeros to four characters
pub fn pad_verification_code(code: &str) -> String {
    format!("{:0>4}", code)
}

/// `YYYY-MM-DD HH:MM:SS KST`
pub fn kst_timestamp(now: DateTime<Utc>) -> String {
    format!("{} KST", to_kst(now).format(KST_TIMESTAMP_FORMAT))
}

fn to_kst(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(KST_OFFSET_SECS) {
        Some(kst) => now.with_timezone(&kst),
        None => now.fixed_offset(),
    }
}

/// Render one event; `None` when the event produces no message
pub fn format_event(
    event: &ParsedEvent,
    ctx: &MessageContext,
    now: DateTime<Utc>,
) -> Option<String> {
    let at = kst_timestamp(now);

    let message = match event {
        ParsedEvent::ServerRestarted => format!(
            "🟢 {} SERVER RESTARTED - 시그널 API\n\n{}\n{}",
            ctx.env_label(),
            ctx.price_policy_line(),
            ctx.registered_price_policy_line()
        ),
        ParsedEvent::InternalError { detail } => {
            format!("🚨ALERT ERROR - {} SERVER🚨\n{}", ctx.env_label(), detail)
        }
        ParsedEvent::ProfileCreated { details } => profile_message(details.as_ref()),
        ParsedEvent::TicketIssued(issuance) => {
            let mut lines = vec!["🩷 *이용권 발급 완료* 🩷".to_string()];
            lines.extend(issuance_fields(issuance, &at));
            lines.extend(issuance_guide(issuance, ctx));
            lines.join("\n")
        }
        ParsedEvent::TicketIssuedByDeposit {
            issuance,
            depositor,
        } => {
            let mut lines = vec![
                "💌 *결제 확인 요청 이용권 발급 완료* 💌".to_string(),
                format!("- 💌 *받는 분 통장 표시*: {}", depositor),
            ];
            lines.extend(issuance_fields(issuance, &at));
            lines.extend(issuance_guide(issuance, ctx));
            lines.join("\n")
        }
        ParsedEvent::TicketConsumed(consumption) => {
            if consumption.is_noop() {
                return None;
            }
            format!(
                "🩷 *누군가 {}님께 시그널을 보냈어요.* 🩷\n- 💌 *보낸 시간*: {}",
                consumption.nickname, at
            )
        }
        ParsedEvent::FailedDuplicateContact { limit } => format!(
            "🚨🚨 같은 연락처 등록 실패 - {} SERVER 🚨🚨\n- ⚔️ 중복 연락처 제한 기준: {} 개",
            ctx.env_label(),
            limit
        ),
        ParsedEvent::ContactExceedsWarning { limit } => format!(
            "🚨 같은 연락처 등록 경고 - {} SERVER 🚨\n- ⚔️ 중복 연락처 경고 기준: {} 개",
            ctx.env_label(),
            limit
        ),
        ParsedEvent::DepositConfirmed(deposit) => {
            deposit_message("💰 *입금 확인 완료* 💰", None, deposit, &at)
        }
        ParsedEvent::DepositAmountUnmatched(deposit) => {
            let mut message = deposit_message(
                "🚨 *이용권 발급 실패* 🚨",
                Some("💌 입금금액에 해당하는 티켓 가격 정보가 없습니다."),
                deposit,
                &at,
            );
            message.push('\n');
            message.push_str(&ctx.price_policy_line());
            message.push('\n');
            message.push_str(&ctx.registered_price_policy_line());
            message
        }
        ParsedEvent::DepositVerificationUnmatched(deposit) => deposit_message(
            "🚨 *이용권 발급 실패* 🚨",
            Some("💌 받는 분 통장 표시에 해당하는 인증번호가 없습니다."),
            deposit,
            &at,
        ),
        ParsedEvent::PaymentRequested {
            depositor,
            verification_code,
        } => format!(
            "🚨🚨 *결제 확인 요청이 접수되었습니다.* 🚨🚨\n- 💌 *받는 분 통장 표시*: {}\n- 💖 *인증 번호*: {}\n- ⏰ *시간*: {}",
            depositor, verification_code, at
        ),
        ParsedEvent::NoFirstPurchase(deposit) => deposit_message(
            "🚨 *현장 확인 필요! 프로필을 등록하지 않거나 첫번째 구매가 아닌 사용자입니다.* 🚨",
            None,
            deposit,
            &at,
        ),
    };

    Some(message)
}

fn profile_message(details: Option<&ProfileDetails>) -> String {
    match details {
        Some(profile) => format!(
            "🩷 *프로필 등록 완료* 🩷\n- 💖 *식별 번호*: {}\n- 🏢 *학과*: {}\n- 📞 *연락처*: {}\n- 👤 *닉네임*: {}\n- 📝 *자기소개*: {}",
            profile.id, profile.department, profile.contact, profile.nickname, profile.introduction
        ),
        None => "🩷 *프로필 등록 완료* 🩷".to_string(),
    }
}

fn issuance_fields(issuance: &TicketIssuance, at: &str) -> Vec<String> {
    vec![
        format!(
            "- 💖 *인증 번호*: {}",
            pad_verification_code(&issuance.verification_code)
        ),
        format!("- 😀 *식별 번호*: {}", issuance.user_id),
        format!("- 🎁 *발급한 이용권*: {}장", issuance.issued),
        format!("- 💝 *보유 이용권*: {}장", issuance.remaining),
        format!("- 💌 *발급 시간*: {}", at),
    ]
}

/// 자동/수동 발급 안내
fn issuance_guide(issuance: &TicketIssuance, ctx: &MessageContext) -> Vec<String> {
    let code = pad_verification_code(&issuance.verification_code);

    let mut lines = vec![String::new(), "*이용권 발급 방법 안내*".to_string(), "*자동 발급*".to_string()];
    if let Some(account) = &ctx.deposit_account {
        lines.push(format!("- 🎁 계좌번호: {}", account));
    }
    lines.push(format!("- 💌 받는 분 통장 표시: {}", code));
    lines.push(ctx.price_policy_line());
    lines.push(ctx.registered_price_policy_line());
    lines.push(String::new());
    lines.push("*수동 발급*".to_string());
    lines.push(format!("`/t {} <개수>`", code));
    lines.push("입금 확인 후 이용권을 발급해주세요!".to_string());
    lines
}

fn deposit_message(title: &str, reason: Option<&str>, deposit: &Deposit, at: &str) -> String {
    let mut lines = vec![title.to_string()];
    if let Some(reason) = reason {
        lines.push(reason.to_string());
    }
    lines.push(format!("- 💌 *받는 분 통장 표시*: {}", deposit.depositor));
    lines.push(format!("- 💰 *금액*: {}원", deposit.amount));
    lines.push(format!("- ⏰ *시간*: {}", at));
    lines.join("\n")
}

/// Aggregate report; the profile row is present only for the full preset
pub fn format_report(summary: &AggregateSummary, preset: ReportPreset) -> String {
    let window = &summary.window;

    let mut lines = vec![
        format!(
            "*💌 시그널 최근 {} 시간 분석 보고서 💌*",
            window.hours_ceil()
        ),
        format!(
            "- *📅 분석 기간* : {} ~ {}",
            window.start.format(REPORT_PERIOD_FORMAT),
            window.end.format(REPORT_PERIOD_FORMAT)
        ),
        format!("- *👥 방문자 수* : {} 명", summary.visitors),
    ];
    if preset.includes_profiles() {
        lines.push(format!("- *👤 등록한 프로필* : {} 개", summary.profiles));
    }
    lines.push(format!("- *🎁 발급한 이용권* : {} 개", summary.issued_tickets));
    lines.push(format!("- *💌 사용한 이용권* : {} 개", summary.consumed_tickets));

    lines.join("\n")
}

/// Alert for a matched line whose payload could not be parsed
pub fn format_parse_failure_alert(ctx: &MessageContext, line: &str) -> String {
    format!(
        "🚨ALERT ERROR - {} SERVER🚨\nlogging: {}",
        ctx.env_label(),
        line.trim_end()
    )
}

/// Sent to the log channel when the watcher starts
pub fn format_startup_notice(ctx: &MessageContext, now: DateTime<Utc>) -> String {
    format!(
        "👀 Observer started - {} SERVER: {}",
        ctx.env_label(),
        kst_timestamp(now)
    )
}
