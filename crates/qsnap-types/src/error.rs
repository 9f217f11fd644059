use thiserror::Error;

use crate::value::{BaseType, Cardinality};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration: {0:?}")]
pub struct DurationParseError(pub String);

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("duplicate {kind} identifier: {identifier}")]
    DuplicateIdentifier {
        kind: &'static str,
        identifier: String,
    },

    #[error("declaration {identifier}: {cardinality} cardinality {reason}")]
    InvalidDeclaration {
        identifier: String,
        cardinality: Cardinality,
        reason: &'static str,
    },

    #[error("declaration {identifier}: default value does not conform to its declaration")]
    InvalidDefault { identifier: String },

    #[error("test must contain at least one test part")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("value for {identifier} does not conform to {cardinality}/{base_type:?}")]
    TypeMismatch {
        identifier: String,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    },

    #[error("attempt limit reached ({0})")]
    AttemptLimit(u8),

    #[error("reference instant {now} is earlier than {reference}")]
    ClockSkew { now: i32, reference: i32 },

    #[error("no item session at route position {0}")]
    RouteEnded(usize),
}

pub type Result<T> = std::result::Result<T, SessionError>;
