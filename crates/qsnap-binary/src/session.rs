//! Session snapshot codec.
//!
//! Item session:
//!
//! ```text
//! item ref position u16
//! state u8, attempts u8
//! duration          value (single / duration)
//! completion status value (single / string)
//! reference instant i32
//! variable count u8
//! count x { kind u8 (0 response, 1 outcome), declaration position u16, value }
//! ```
//!
//! Test session:
//!
//! ```text
//! state u8, route position u16
//! variable count u16, count x { outcome declaration position u16, value }
//! item session count u16, count x item session
//! ```
//!
//! Cardinality and base type are never written; they come from the declaration the
//! position resolves to.

use qsnap_types::{
    qualify, BaseType, Cardinality, CompletionStatus, ComponentKind, ItemSession,
    ItemSessionState, Scalar, TestSession, TestSessionState, Value, Variable, VariableKind,
};

use crate::error::{BinaryError, Result, SeekError};
use crate::seeker::{AssessmentTestSeeker, IndexedDeclaration};
use crate::stream::BinaryStream;
use crate::value::{read_value, write_value};

/// A position read from the wire that the loaded definition cannot resolve means the
/// snapshot was taken against a different definition.
fn mismatch(err: SeekError) -> BinaryError {
    match err {
        SeekError::OutOfRange { kind, position, .. } => {
            BinaryError::IndexMismatch { kind, position }
        }
        other => BinaryError::Seek(other),
    }
}

fn u8_count(len: usize) -> Result<u8> {
    u8::try_from(len).map_err(|_| BinaryError::Truncation { len })
}

fn u16_count(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| BinaryError::Truncation { len })
}

fn atomic_write<F>(stream: &mut BinaryStream, f: F) -> Result<()>
where
    F: FnOnce(&mut BinaryStream) -> Result<()>,
{
    let mark = stream.len();
    let res = f(stream);
    if res.is_err() {
        stream.truncate(mark);
    }
    res
}

fn atomic_read<T, F>(stream: &mut BinaryStream, f: F) -> Result<T>
where
    F: FnOnce(&mut BinaryStream) -> Result<T>,
{
    let mark = stream.position();
    let res = f(stream);
    if res.is_err() {
        stream.seek_to(mark);
    }
    res
}

fn write_variable_value(
    stream: &mut BinaryStream,
    resolved: IndexedDeclaration<'_>,
    variable: &Variable,
) -> Result<()> {
    let decl = resolved.declaration;
    write_value(stream, decl.cardinality, decl.base_type, variable.value.as_ref())
}

fn read_variable(
    stream: &mut BinaryStream,
    kind: VariableKind,
    resolved: IndexedDeclaration<'_>,
) -> Result<Variable> {
    let decl = resolved.declaration;
    Ok(Variable {
        identifier: decl.identifier.clone(),
        kind,
        cardinality: decl.cardinality,
        base_type: decl.base_type,
        value: read_value(stream, decl.cardinality, decl.base_type)?,
    })
}

pub fn write_item_session(
    stream: &mut BinaryStream,
    seeker: &AssessmentTestSeeker,
    session: &ItemSession,
) -> Result<()> {
    atomic_write(stream, |stream| {
        let item = &session.item_identifier;
        stream.write_u16(seeker.position_of(ComponentKind::AssessmentItemRef, item)?);
        stream.write_u8(session.state.to_u8());
        stream.write_u8(session.attempts);
        write_value(
            stream,
            Cardinality::Single,
            Some(BaseType::Duration),
            Some(&Value::Single(Scalar::Duration(session.duration))),
        )?;
        write_value(
            stream,
            Cardinality::Single,
            Some(BaseType::String),
            Some(&Value::Single(Scalar::String(
                session.completion_status.as_str().to_string(),
            ))),
        )?;
        stream.write_i32(session.reference_instant);

        stream.write_u8(u8_count(session.variables.len())?);
        for variable in &session.variables {
            let kind = ComponentKind::for_variable(variable.kind);
            let qualified = qualify(Some(item.as_str()), &variable.identifier);
            let position = seeker.position_of(kind, &qualified)?;
            stream.write_u8(variable.kind.to_u8());
            stream.write_u16(position);
            write_variable_value(stream, seeker.declaration_at(kind, position)?, variable)?;
        }
        Ok(())
    })
}

pub fn read_item_session(
    stream: &mut BinaryStream,
    seeker: &AssessmentTestSeeker,
) -> Result<ItemSession> {
    atomic_read(stream, |stream| {
        let item = seeker.item_ref_at(stream.read_u16()?).map_err(mismatch)?;
        let mut session = ItemSession::new(item);

        session.state = ItemSessionState::from_u8(stream.read_u8()?)
            .ok_or(BinaryError::Corrupt("unknown item session state"))?;
        session.attempts = stream.read_u8()?;
        session.duration =
            match read_value(stream, Cardinality::Single, Some(BaseType::Duration))? {
                Some(Value::Single(Scalar::Duration(d))) => d,
                _ => return Err(BinaryError::Corrupt("item session duration is absent")),
            };
        session.completion_status =
            match read_value(stream, Cardinality::Single, Some(BaseType::String))? {
                Some(Value::Single(Scalar::String(s))) => CompletionStatus::parse(&s)
                    .ok_or(BinaryError::Corrupt("unknown completion status"))?,
                _ => return Err(BinaryError::Corrupt("completion status is absent")),
            };
        session.reference_instant = stream.read_i32()?;

        let count = stream.read_u8()?;
        let mut variables: Vec<Variable> = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let kind = VariableKind::from_u8(stream.read_u8()?)
                .ok_or(BinaryError::Corrupt("unknown variable kind"))?;
            let category = ComponentKind::for_variable(kind);
            let position = stream.read_u16()?;
            let resolved = seeker.declaration_at(category, position).map_err(mismatch)?;
            if resolved.owner != Some(item.identifier.as_str()) {
                return Err(BinaryError::IndexMismatch {
                    kind: category,
                    position,
                });
            }
            let variable = read_variable(stream, kind, resolved)?;
            if variables.iter().any(|v| v.identifier == variable.identifier) {
                return Err(BinaryError::Corrupt("variable encoded twice"));
            }
            variables.push(variable);
        }
        session.variables = variables;
        Ok(session)
    })
}

pub fn write_test_session(
    stream: &mut BinaryStream,
    seeker: &AssessmentTestSeeker,
    session: &TestSession,
) -> Result<()> {
    atomic_write(stream, |stream| {
        stream.write_u8(session.state.to_u8());
        stream.write_u16(u16_count(session.route_position)?);

        stream.write_u16(u16_count(session.variables.len())?);
        for variable in &session.variables {
            let kind = ComponentKind::OutcomeDeclaration;
            let position = seeker.position_of(kind, &variable.identifier)?;
            stream.write_u16(position);
            write_variable_value(stream, seeker.declaration_at(kind, position)?, variable)?;
        }

        stream.write_u16(u16_count(session.item_sessions.len())?);
        for item in &session.item_sessions {
            write_item_session(stream, seeker, item)?;
        }
        Ok(())
    })
}

pub fn read_test_session(
    stream: &mut BinaryStream,
    seeker: &AssessmentTestSeeker,
    session_id: &str,
) -> Result<TestSession> {
    atomic_read(stream, |stream| {
        let state = TestSessionState::from_u8(stream.read_u8()?)
            .ok_or(BinaryError::Corrupt("unknown test session state"))?;
        let route_position = usize::from(stream.read_u16()?);

        let count = stream.read_u16()?;
        let mut variables: Vec<Variable> = Vec::new();
        for _ in 0..count {
            let kind = ComponentKind::OutcomeDeclaration;
            let position = stream.read_u16()?;
            let resolved = seeker.declaration_at(kind, position).map_err(mismatch)?;
            if resolved.owner.is_some() {
                return Err(BinaryError::IndexMismatch { kind, position });
            }
            let variable = read_variable(stream, VariableKind::Outcome, resolved)?;
            if variables.iter().any(|v| v.identifier == variable.identifier) {
                return Err(BinaryError::Corrupt("variable encoded twice"));
            }
            variables.push(variable);
        }

        let count = stream.read_u16()?;
        let mut item_sessions = Vec::new();
        for _ in 0..count {
            item_sessions.push(read_item_session(stream, seeker)?);
        }
        let route_is_empty = item_sessions.is_empty() && route_position == 0;
        if route_position >= item_sessions.len() && !route_is_empty {
            return Err(BinaryError::Corrupt("route position past the last item session"));
        }

        Ok(TestSession {
            session_id: session_id.to_string(),
            test_identifier: seeker.test_identifier().to_string(),
            state,
            route_position,
            variables,
            item_sessions,
        })
    })
}

fn finish<T>(stream: &BinaryStream, value: T) -> Result<T> {
    match stream.remaining() {
        0 => Ok(value),
        n => Err(BinaryError::TrailingBytes(n)),
    }
}

pub fn encode_item_session(
    seeker: &AssessmentTestSeeker,
    session: &ItemSession,
) -> Result<Vec<u8>> {
    let mut stream = BinaryStream::new();
    write_item_session(&mut stream, seeker, session)?;
    Ok(stream.into_inner())
}

pub fn decode_item_session(seeker: &AssessmentTestSeeker, bytes: &[u8]) -> Result<ItemSession> {
    let mut stream = BinaryStream::from_bytes(bytes);
    let session = read_item_session(&mut stream, seeker)?;
    finish(&stream, session)
}

pub fn encode_test_session(
    seeker: &AssessmentTestSeeker,
    session: &TestSession,
) -> Result<Vec<u8>> {
    let mut stream = BinaryStream::new();
    write_test_session(&mut stream, seeker, session)?;
    Ok(stream.into_inner())
}

pub fn decode_test_session(
    seeker: &AssessmentTestSeeker,
    session_id: &str,
    bytes: &[u8],
) -> Result<TestSession> {
    let mut stream = BinaryStream::from_bytes(bytes);
    let session = read_test_session(&mut stream, seeker, session_id)?;
    finish(&stream, session)
}
