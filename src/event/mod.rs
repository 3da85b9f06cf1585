//! Event extraction core
//!
//! - Event kinds and typed records
//! - Per-kind field parsers
//! - Ordered prefix classifier tables

pub mod classifier;
pub mod parser;

mod event_types;

pub use classifier::{classify, Classified, Classifier, ProfileDetection, ReportPreset, Rule};
pub use event_types::{
    Channel, Deposit, EventKind, ParsedEvent, ProfileDetails, TicketConsumption, TicketIssuance,
};
pub use parser::{ParseError, ParseResult};
