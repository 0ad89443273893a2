//! Action contract parsing for actloop.
//!
//! Models answer in loosely formatted text. This crate digs the JSON contract
//! out of it ([`parse_contract`]) and validates each action independently
//! ([`validate_action`]), so one malformed action never costs the others.

pub mod parser;
pub mod validate;

pub use parser::{ContractSource, ParsedContract, parse_contract};
pub use validate::{ValidationError, validate_action};
