//! Event kinds and typed event records extracted from log lines

use serde::Serialize;
use std::fmt;

/// Closed set of event kinds recognized in the application logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProfileCreated,
    TicketIssued,
    TicketIssuedByDeposit,
    TicketConsumed,
    FailedDuplicateContact,
    ContactExceedsWarning,
    ServerRestarted,
    InternalError,
    DepositConfirmed,
    DepositAmountUnmatched,
    DepositVerificationUnmatched,
    PaymentRequested,
    NoFirstPurchase,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProfileCreated => "profile_created",
            EventKind::TicketIssued => "ticket_issued",
            EventKind::TicketIssuedByDeposit => "ticket_issued_by_deposit",
            EventKind::TicketConsumed => "ticket_consumed",
            EventKind::FailedDuplicateContact => "failed_duplicate_contact",
            EventKind::ContactExceedsWarning => "contact_exceeds_warning",
            EventKind::ServerRestarted => "server_restarted",
            EventKind::InternalError => "internal_error",
            EventKind::DepositConfirmed => "deposit_confirmed",
            EventKind::DepositAmountUnmatched => "deposit_amount_unmatched",
            EventKind::DepositVerificationUnmatched => "deposit_verification_unmatched",
            EventKind::PaymentRequested => "payment_requested",
            EventKind::NoFirstPurchase => "no_first_purchase",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification channel a message is routed to
///
/// Resolved to a concrete channel id by the driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Operations channel (tickets, deposits, reports)
    Default,
    /// Profile registrations
    Admin,
    /// Server errors and watcher diagnostics
    Log,
}

/// Fields of a `CreateProfile` notification line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileDetails {
    pub id: String,
    pub department: String,
    pub contact: String,
    pub nickname: String,
    pub introduction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketIssuance {
    /// Raw verification code as logged; rendered zero-padded to 4 digits
    pub verification_code: String,
    pub user_id: String,
    pub issued: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketConsumption {
    pub nickname: String,
    pub consumed: u32,
}

impl TicketConsumption {
    /// A zero-ticket consumption is logged by the backend but means nothing happened
    pub fn is_noop(&self) -> bool {
        self.consumed == 0
    }
}

/// Bank deposit reference: depositor display name plus amount in KRW
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deposit {
    pub depositor: String,
    pub amount: u64,
}

/// Typed record produced from one classified log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedEvent {
    /// `details` is `None` when the creation was detected from an HTTP reply
    /// marker rather than parsed from a notification line.
    ProfileCreated { details: Option<ProfileDetails> },
    TicketIssued(TicketIssuance),
    TicketIssuedByDeposit {
        issuance: TicketIssuance,
        depositor: String,
    },
    TicketConsumed(TicketConsumption),
    FailedDuplicateContact { limit: u32 },
    ContactExceedsWarning { limit: u32 },
    ServerRestarted,
    InternalError { detail: String },
    DepositConfirmed(Deposit),
    DepositAmountUnmatched(Deposit),
    DepositVerificationUnmatched(Deposit),
    PaymentRequested {
        depositor: String,
        verification_code: String,
    },
    NoFirstPurchase(Deposit),
}

impl ParsedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ParsedEvent::ProfileCreated { .. } => EventKind::ProfileCreated,
            ParsedEvent::TicketIssued(_) => EventKind::TicketIssued,
            ParsedEvent::TicketIssuedByDeposit { .. } => EventKind::TicketIssuedByDeposit,
            ParsedEvent::TicketConsumed(_) => EventKind::TicketConsumed,
            ParsedEvent::FailedDuplicateContact { .. } => EventKind::FailedDuplicateContact,
            ParsedEvent::ContactExceedsWarning { .. } => EventKind::ContactExceedsWarning,
            ParsedEvent::ServerRestarted => EventKind::ServerRestarted,
            ParsedEvent::InternalError { .. } => EventKind::InternalError,
            ParsedEvent::DepositConfirmed(_) => EventKind::DepositConfirmed,
            ParsedEvent::DepositAmountUnmatched(_) => EventKind::DepositAmountUnmatched,
            ParsedEvent::DepositVerificationUnmatched(_) => EventKind::DepositVerificationUnmatched,
            ParsedEvent::PaymentRequested { .. } => EventKind::PaymentRequested,
            ParsedEvent::NoFirstPurchase(_) => EventKind::NoFirstPurchase,
        }
    }

    /// Channel the single-event notification is delivered to
    pub fn channel(&self) -> Channel {
        match self.kind() {
            EventKind::InternalError
            | EventKind::FailedDuplicateContact
            | EventKind::ContactExceedsWarning => Channel::Log,
            EventKind::ProfileCreated => Channel::Admin,
            _ => Channel::Default,
        }
    }
}
