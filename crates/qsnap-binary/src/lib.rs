//! Binary snapshot codec for assessment sessions.
//!
//! [`BinaryStream`] carries little-endian primitives, [`write_value`]/[`read_value`]
//! encode runtime values, [`AssessmentTestSeeker`] maps definition components to dense
//! positions, and the session functions put the three together.

#![forbid(unsafe_code)]

mod error;
mod seeker;
mod session;
mod stream;
mod value;

pub use crate::error::{BinaryError, Result, SeekError};
pub use crate::seeker::{AssessmentTestSeeker, IndexedComponent, IndexedDeclaration};
pub use crate::session::{
    decode_item_session, decode_test_session, encode_item_session, encode_test_session,
    read_item_session, read_test_session, write_item_session, write_test_session,
};
pub use crate::stream::BinaryStream;
pub use crate::value::{read_value, write_value};
