//! Runtime data model for assessment sessions: values, declarations, the test definition
//! tree and the live sessions whose state is persisted.

#![forbid(unsafe_code)]

mod declaration;
mod definition;
mod duration;
mod error;
mod session;
mod value;

pub use crate::declaration::{VariableDeclaration, VariableKind};
pub use crate::definition::{
    qualify, AssessmentItemRef, AssessmentSection, AssessmentTest, Component, ComponentKind,
    SectionPart, TestPart,
};
pub use crate::duration::Duration;
pub use crate::error::{DefinitionError, DurationParseError, Result, SessionError};
pub use crate::session::{
    CompletionStatus, ItemSession, ItemSessionState, TestSession, TestSessionState, Variable,
};
pub use crate::value::{
    BaseType, Cardinality, DirectedPair, Pair, Point, Record, RecordEntry, Scalar, Value,
};
