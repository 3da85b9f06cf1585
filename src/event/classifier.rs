//! Prefix classifier
//!
//! Lines are tested against an ordered list of literal prefixes. The first rule
//! whose prefix occurs anywhere in the line wins; a line matching nothing is
//! unclassified and ignored by every pipeline.

use std::fmt;
use std::str::FromStr;

use crate::event::event_types::EventKind;
use crate::event::parser::{self, ParseResult};

pub const SERVER_RESTART_PREFIX: &str =
    "INFO org.springframework.boot.web.embedded.tomcat.TomcatWebServer - Tomcat started on port";
pub const INTERNAL_ERROR_PREFIX: &str =
    "ERROR com.yourssu.signal.handler.InternalServerErrorControllerAdvice -";

pub const CREATE_PROFILE_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - CreateProfile";
pub const FAILED_PROFILE_CONTACT_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - FailedProfileContactExceedsLimit";
pub const CONTACT_EXCEEDS_WARNING_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - ContactExceedsLimitWarning";
pub const ISSUE_TICKET_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - Issued ticket";
pub const RETRY_ISSUE_TICKET_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - RetryIssuedTicket";
pub const CONSUME_TICKET_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - Consumed ticket";
pub const DEPOSIT_CONFIRMED_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - IssueTicketByBankDepositSms";
pub const DEPOSIT_AMOUNT_UNMATCHED_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - IssueFailedTicketByDepositAmount";
pub const DEPOSIT_VERIFICATION_UNMATCHED_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - IssueFailedTicketByUnMatchedVerification";
pub const PAYMENT_REQUESTED_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - PayNotification";
pub const NO_FIRST_PURCHASE_PREFIX: &str =
    "INFO com.yourssu.signal.infrastructure.Notification - NoFirstPurchasedTicket";

/// HTTP reply log emitted for profile registration requests
pub const PROFILE_REPLY_PREFIX: &str = "{\"Reply\":{\"Method\":\"POST /api/profiles - ";

/// Parser invoked on the full line once its rule matched
pub type LineParser = fn(&str) -> ParseResult;

/// One (prefix, kind, parser) entry of a classifier table
#[derive(Clone, Copy)]
pub struct Rule {
    pub prefix: &'static str,
    pub kind: EventKind,
    pub parser: LineParser,
}

impl Rule {
    pub fn new(prefix: &'static str, kind: EventKind, parser: LineParser) -> Self {
        Self {
            prefix,
            kind,
            parser,
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        line.contains(self.prefix)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("prefix", &self.prefix)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A line that matched a rule, not yet parsed
#[derive(Clone, Copy)]
pub struct Classified<'a> {
    pub kind: EventKind,
    pub line: &'a str,
    parser: LineParser,
}

impl<'a> Classified<'a> {
    /// Text after the first `&`, if any
    pub fn payload(&self) -> Option<&'a str> {
        parser::payload(self.line).ok()
    }

    pub fn parse(&self) -> ParseResult {
        (self.parser)(self.line)
    }
}

impl fmt::Debug for Classified<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classified")
            .field("kind", &self.kind)
            .field("line", &self.line)
            .finish()
    }
}

/// First-match classification against an ordered rule list
pub fn classify<'a>(rules: &[Rule], line: &'a str) -> Option<Classified<'a>> {
    rules.iter().find(|rule| rule.matches(line)).map(|rule| Classified {
        kind: rule.kind,
        line,
        parser: rule.parser,
    })
}

/// How a profile registration is recognized in the reply log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileDetection {
    /// Line contains `"Status":201`
    #[default]
    StatusMarker,
    /// JSON after ` - ` has status 201
    StatusField,
}

impl FromStr for ProfileDetection {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "marker" | "status-marker" => Ok(ProfileDetection::StatusMarker),
            "status-field" | "field" => Ok(ProfileDetection::StatusField),
            _ => Err("invalid profile detection: expected 'marker' or 'status-field'"),
        }
    }
}

/// Named aggregate report configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPreset {
    /// Profiles, issued and consumed tickets
    #[default]
    Full,
    /// Issued and consumed tickets only
    Tickets,
}

impl ReportPreset {
    pub fn includes_profiles(&self) -> bool {
        matches!(self, ReportPreset::Full)
    }
}

impl FromStr for ReportPreset {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(ReportPreset::Full),
            "tickets" => Ok(ReportPreset::Tickets),
            _ => Err("invalid report preset: expected 'full' or 'tickets'"),
        }
    }
}

/// Ordered rule table
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Table used by the continuous watch mode
    pub fn notifications(include_consumed: bool) -> Self {
        let mut rules = vec![
            Rule::new(
                SERVER_RESTART_PREFIX,
                EventKind::ServerRestarted,
                parser::parse_server_restarted,
            ),
            Rule::new(
                INTERNAL_ERROR_PREFIX,
                EventKind::InternalError,
                parser::parse_internal_error,
            ),
            Rule::new(
                CREATE_PROFILE_PREFIX,
                EventKind::ProfileCreated,
                parser::parse_profile_created,
            ),
            Rule::new(
                ISSUE_TICKET_PREFIX,
                EventKind::TicketIssued,
                parser::parse_ticket_issued,
            ),
            Rule::new(
                RETRY_ISSUE_TICKET_PREFIX,
                EventKind::TicketIssuedByDeposit,
                parser::parse_ticket_issued_by_deposit,
            ),
        ];

        if include_consumed {
            rules.push(Rule::new(
                CONSUME_TICKET_PREFIX,
                EventKind::TicketConsumed,
                parser::parse_ticket_consumed,
            ));
        }

        rules.extend([
            Rule::new(
                FAILED_PROFILE_CONTACT_PREFIX,
                EventKind::FailedDuplicateContact,
                parser::parse_failed_duplicate_contact,
            ),
            Rule::new(
                CONTACT_EXCEEDS_WARNING_PREFIX,
                EventKind::ContactExceedsWarning,
                parser::parse_contact_exceeds_warning,
            ),
            Rule::new(
                DEPOSIT_CONFIRMED_PREFIX,
                EventKind::DepositConfirmed,
                parser::parse_deposit_confirmed,
            ),
            Rule::new(
                DEPOSIT_AMOUNT_UNMATCHED_PREFIX,
                EventKind::DepositAmountUnmatched,
                parser::parse_deposit_amount_unmatched,
            ),
            Rule::new(
                DEPOSIT_VERIFICATION_UNMATCHED_PREFIX,
                EventKind::DepositVerificationUnmatched,
                parser::parse_deposit_verification_unmatched,
            ),
            Rule::new(
                PAYMENT_REQUESTED_PREFIX,
                EventKind::PaymentRequested,
                parser::parse_payment_requested,
            ),
            Rule::new(
                NO_FIRST_PURCHASE_PREFIX,
                EventKind::NoFirstPurchase,
                parser::parse_no_first_purchase,
            ),
        ]);

        Self::new(rules)
    }

    /// Table used by the aggregate report
    pub fn report(preset: ReportPreset, detection: ProfileDetection) -> Self {
        let mut rules = Vec::with_capacity(4);

        if preset.includes_profiles() {
            let profile_parser: LineParser = match detection {
                ProfileDetection::StatusMarker => parser::parse_profile_reply_marker,
                ProfileDetection::StatusField => parser::parse_profile_reply_status,
            };
            rules.push(Rule::new(
                PROFILE_REPLY_PREFIX,
                EventKind::ProfileCreated,
                profile_parser,
            ));
        }

        rules.extend([
            Rule::new(
                ISSUE_TICKET_PREFIX,
                EventKind::TicketIssued,
                parser::parse_ticket_issued,
            ),
            Rule::new(
                RETRY_ISSUE_TICKET_PREFIX,
                EventKind::TicketIssuedByDeposit,
                parser::parse_ticket_issued_by_deposit,
            ),
            Rule::new(
                CONSUME_TICKET_PREFIX,
                EventKind::TicketConsumed,
                parser::parse_ticket_consumed,
            ),
        ]);

        Self::new(rules)
    }

    pub fn classify<'a>(&self, line: &'a str) -> Option<Classified<'a>> {
        classify(&self.rules, line)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.rules.iter().map(|rule| rule.kind).collect()
    }
}
