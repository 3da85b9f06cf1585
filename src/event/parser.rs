//! Field parsers, one per event kind
//!
//! Every parser receives the full matched line. Payload-based parsers read the
//! segment after the first `&` and split it positionally; a wrong field count
//! or a non-numeric count is a `ParseError` and the caller skips the line.

use crate::event::classifier::INTERNAL_ERROR_PREFIX;
use crate::event::event_types::{
    Deposit, ParsedEvent, ProfileDetails, TicketConsumption, TicketIssuance,
};

/// Marks the start of the structured payload in a notification line
pub const PAYLOAD_DELIMITER: char = '&';

/// Success marker of the profile creation HTTP reply log
pub const CREATED_STATUS_MARKER: &str = "\"Status\":201";

/// Reason a matched line could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("payload delimiter '&' not found")]
    MissingDelimiter,
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("field '{field}' is not a number: {value}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("success marker not present")]
    MissingMarker,
    #[error("leading timestamp is malformed")]
    InvalidTimestamp,
}

pub type ParseResult = Result<ParsedEvent, ParseError>;

/// Segment after the first `&`, trailing whitespace (newline) removed
pub fn payload(line: &str) -> Result<&str, ParseError> {
    line.find(PAYLOAD_DELIMITER)
        .map(|idx| line[idx + PAYLOAD_DELIMITER.len_utf8()..].trim_end())
        .ok_or(ParseError::MissingDelimiter)
}

fn split_exact<const N: usize>(segment: &str, separator: char) -> Result<[&str; N], ParseError> {
    let fields: Vec<&str> = segment.split(separator).collect();
    let found = fields.len();
    fields
        .try_into()
        .map_err(|_| ParseError::FieldCount { expected: N, found })
}

fn number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn deposit(line: &str) -> Result<Deposit, ParseError> {
    let [depositor, amount] = split_exact::<2>(payload(line)?, ' ')?;
    Ok(Deposit {
        depositor: depositor.to_string(),
        amount: number("amount", amount)?,
    })
}

fn issuance(
    verification: &str,
    user: &str,
    issued: &str,
    remaining: &str,
) -> Result<TicketIssuance, ParseError> {
    Ok(TicketIssuance {
        verification_code: verification.to_string(),
        user_id: user.to_string(),
        issued: number("issued", issued)?,
        remaining: number("remaining", remaining)?,
    })
}

/// `{id}&{department}&{contact}&{nickname}&{introduction}`
pub fn parse_profile_created(line: &str) -> ParseResult {
    let [id, department, contact, nickname, introduction] = split_exact::<5>(payload(line)?, '&')?;
    Ok(ParsedEvent::ProfileCreated {
        details: Some(ProfileDetails {
            id: id.to_string(),
            department: department.to_string(),
            contact: contact.to_string(),
            nickname: nickname.to_string(),
            introduction: introduction.to_string(),
        }),
    })
}

/// Reply-log detection: the line only has to carry the `"Status":201` marker
pub fn parse_profile_reply_marker(line: &str) -> ParseResult {
    if line.contains(CREATED_STATUS_MARKER) {
        Ok(ParsedEvent::ProfileCreated { details: None })
    } else {
        Err(ParseError::MissingMarker)
    }
}

/// Reply-log detection through the JSON status field (`Reply.Status` or `Status`)
pub fn parse_profile_reply_status(line: &str) -> ParseResult {
    let json = line
        .split_once(" - ")
        .map(|(_, rest)| rest.trim())
        .ok_or(ParseError::MissingMarker)?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|_| ParseError::MissingMarker)?;

    let status = value
        .get("Reply")
        .and_then(|reply| reply.get("Status"))
        .or_else(|| value.get("Status"))
        .and_then(|status| status.as_u64());

    match status {
        Some(201) => Ok(ParsedEvent::ProfileCreated { details: None }),
        _ => Err(ParseError::MissingMarker),
    }
}

/// `{verification} {user_id} {issued} {remaining}`
pub fn parse_ticket_issued(line: &str) -> ParseResult {
    let [verification, user, issued, remaining] = split_exact::<4>(payload(line)?, ' ')?;
    Ok(ParsedEvent::TicketIssued(issuance(
        verification,
        user,
        issued,
        remaining,
    )?))
}

/// `{verification} {user_id} {issued} {remaining} {depositor}`
pub fn parse_ticket_issued_by_deposit(line: &str) -> ParseResult {
    let [verification, user, issued, remaining, depositor] =
        split_exact::<5>(payload(line)?, ' ')?;
    Ok(ParsedEvent::TicketIssuedByDeposit {
        issuance: issuance(verification, user, issued, remaining)?,
        depositor: depositor.to_string(),
    })
}

/// `{nickname} {consumed}`
pub fn parse_ticket_consumed(line: &str) -> ParseResult {
    let [nickname, consumed] = split_exact::<2>(payload(line)?, ' ')?;
    Ok(ParsedEvent::TicketConsumed(TicketConsumption {
        nickname: nickname.to_string(),
        consumed: number("consumed", consumed)?,
    }))
}

pub fn parse_failed_duplicate_contact(line: &str) -> ParseResult {
    Ok(ParsedEvent::FailedDuplicateContact {
        limit: number("limit", payload(line)?)?,
    })
}

pub fn parse_contact_exceeds_warning(line: &str) -> ParseResult {
    Ok(ParsedEvent::ContactExceedsWarning {
        limit: number("limit", payload(line)?)?,
    })
}

pub fn parse_server_restarted(_line: &str) -> ParseResult {
    Ok(ParsedEvent::ServerRestarted)
}

/// Keeps the whole line minus the logger prefix so the alert shows timestamp and cause
pub fn parse_internal_error(line: &str) -> ParseResult {
    Ok(ParsedEvent::InternalError {
        detail: line
            .replacen(INTERNAL_ERROR_PREFIX, "", 1)
            .trim_end()
            .to_string(),
    })
}

pub fn parse_deposit_confirmed(line: &str) -> ParseResult {
    deposit(line).map(ParsedEvent::DepositConfirmed)
}

pub fn parse_deposit_amount_unmatched(line: &str) -> ParseResult {
    deposit(line).map(ParsedEvent::DepositAmountUnmatched)
}

pub fn parse_deposit_verification_unmatched(line: &str) -> ParseResult {
    deposit(line).map(ParsedEvent::DepositVerificationUnmatched)
}

/// `{depositor} {verification}`
pub fn parse_payment_requested(line: &str) -> ParseResult {
    let [depositor, verification] = split_exact::<2>(payload(line)?, ' ')?;
    Ok(ParsedEvent::PaymentRequested {
        depositor: depositor.to_string(),
        verification_code: verification.to_string(),
    })
}

pub fn parse_no_first_purchase(line: &str) -> ParseResult {
    deposit(line).map(ParsedEvent::NoFirstPurchase)
}
