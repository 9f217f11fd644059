//! Live item and test sessions.
//!
//! Sessions own their variables and lifecycle fields. Time is supplied by the caller as
//! seconds since the epoch; every time update adds `now - reference_instant` to the
//! session's elapsed duration and moves the reference instant forward.

use serde::{Deserialize, Serialize};

use crate::declaration::{VariableDeclaration, VariableKind};
use crate::definition::{AssessmentItemRef, AssessmentTest};
use crate::duration::Duration;
use crate::error::{Result, SessionError};
use crate::value::{BaseType, Cardinality, Value};

/// A declared variable together with its current runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub identifier: String,
    pub kind: VariableKind,
    pub cardinality: Cardinality,
    pub base_type: Option<BaseType>,
    pub value: Option<Value>,
}

impl Variable {
    pub fn from_declaration(kind: VariableKind, decl: &VariableDeclaration) -> Self {
        Self {
            identifier: decl.identifier.clone(),
            kind,
            cardinality: decl.cardinality,
            base_type: decl.base_type,
            value: decl.initial_value(kind),
        }
    }

    pub fn set(&mut self, value: Option<Value>) -> Result<()> {
        if let Some(v) = &value {
            if !v.conforms_to(self.cardinality, self.base_type) {
                return Err(SessionError::TypeMismatch {
                    identifier: self.identifier.clone(),
                    cardinality: self.cardinality,
                    base_type: self.base_type,
                });
            }
        }
        self.value = value;
        Ok(())
    }
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $byte:literal => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn to_u8(self) -> u8 {
                match self {
                    $($name::$variant => $byte),+
                }
            }

            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $($byte => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }
    };
}

wire_enum!(
    /// Lifecycle state of an item session.
    ItemSessionState {
        Initial = 0 => "initial",
        Interacting = 1 => "interacting",
        ModalFeedback = 2 => "modal_feedback",
        Suspended = 3 => "suspended",
        Closed = 4 => "closed",
        Solution = 5 => "solution",
        Review = 6 => "review",
        NotSelected = 255 => "not_selected",
    }
);

wire_enum!(
    /// Lifecycle state of a test session.
    TestSessionState {
        Initial = 0 => "initial",
        Interacting = 1 => "interacting",
        ModalFeedback = 2 => "modal_feedback",
        Suspended = 3 => "suspended",
        Closed = 4 => "closed",
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    Incomplete,
    NotAttempted,
    Unknown,
}

impl CompletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionStatus::Completed => "completed",
            CompletionStatus::Incomplete => "incomplete",
            CompletionStatus::NotAttempted => "not_attempted",
            CompletionStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "completed" => CompletionStatus::Completed,
            "incomplete" => CompletionStatus::Incomplete,
            "not_attempted" => CompletionStatus::NotAttempted,
            "unknown" => CompletionStatus::Unknown,
            _ => return None,
        })
    }
}

fn find<'a>(variables: &'a [Variable], identifier: &str) -> Option<&'a Variable> {
    variables.iter().find(|v| v.identifier == identifier)
}

fn set_in(variables: &mut [Variable], identifier: &str, value: Option<Value>) -> Result<()> {
    variables
        .iter_mut()
        .find(|v| v.identifier == identifier)
        .ok_or_else(|| SessionError::UnknownVariable(identifier.to_string()))?
        .set(value)
}

/// Runtime state of one candidate's interaction with one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSession {
    pub item_identifier: String,
    /// Attempt limit taken from the item reference; 0 is unlimited.
    pub max_attempts: u8,
    pub state: ItemSessionState,
    pub attempts: u8,
    pub duration: Duration,
    pub completion_status: CompletionStatus,
    pub reference_instant: i32,
    /// Response variables then outcome variables, in declaration order.
    pub variables: Vec<Variable>,
}

impl ItemSession {
    pub fn new(item: &AssessmentItemRef) -> Self {
        Self {
            item_identifier: item.identifier.clone(),
            max_attempts: item.max_attempts.unwrap_or(0),
            state: ItemSessionState::Initial,
            attempts: 0,
            duration: Duration::ZERO,
            completion_status: CompletionStatus::NotAttempted,
            reference_instant: 0,
            variables: item
                .declarations()
                .map(|(kind, decl)| Variable::from_declaration(kind, decl))
                .collect(),
        }
    }

    fn transition_error(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }

    fn tick(&mut self, now: i32) -> Result<()> {
        if now < self.reference_instant {
            return Err(SessionError::ClockSkew {
                now,
                reference: self.reference_instant,
            });
        }
        self.duration
            .add_seconds(u64::from(now.abs_diff(self.reference_instant)));
        self.reference_instant = now;
        Ok(())
    }

    pub fn attempts_remaining(&self) -> bool {
        self.attempts < u8::MAX && (self.max_attempts == 0 || self.attempts < self.max_attempts)
    }

    pub fn begin_attempt(&mut self, now: i32) -> Result<()> {
        if !matches!(
            self.state,
            ItemSessionState::Initial | ItemSessionState::Suspended
        ) {
            return Err(self.transition_error("begin an attempt"));
        }
        if !self.attempts_remaining() {
            return Err(SessionError::AttemptLimit(self.attempts));
        }
        if self.state == ItemSessionState::Initial {
            self.completion_status = CompletionStatus::Unknown;
        }
        self.attempts += 1;
        self.state = ItemSessionState::Interacting;
        self.reference_instant = now;
        Ok(())
    }

    pub fn suspend(&mut self, now: i32) -> Result<()> {
        if self.state != ItemSessionState::Interacting {
            return Err(self.transition_error("suspend"));
        }
        self.tick(now)?;
        self.state = ItemSessionState::Suspended;
        Ok(())
    }

    pub fn resume(&mut self, now: i32) -> Result<()> {
        if self.state != ItemSessionState::Suspended {
            return Err(self.transition_error("resume"));
        }
        self.state = ItemSessionState::Interacting;
        self.reference_instant = now;
        Ok(())
    }

    /// Close the current attempt, recording the submitted responses.
    ///
    /// The session is suspended awaiting another attempt, or closed once the attempt
    /// limit is reached. Responses are validated before any of them is applied.
    pub fn end_attempt<I>(&mut self, now: i32, responses: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Option<Value>)>,
    {
        if self.state != ItemSessionState::Interacting {
            return Err(self.transition_error("end an attempt"));
        }
        let mut staged = self.variables.clone();
        for (identifier, value) in responses {
            let var = staged
                .iter_mut()
                .find(|v| v.identifier == identifier && v.kind == VariableKind::Response)
                .ok_or_else(|| SessionError::UnknownVariable(identifier.clone()))?;
            var.set(value)?;
        }
        self.tick(now)?;
        self.variables = staged;
        self.completion_status = CompletionStatus::Completed;
        self.state = if self.attempts_remaining() {
            ItemSessionState::Suspended
        } else {
            ItemSessionState::Closed
        };
        Ok(())
    }

    pub fn end(&mut self, now: i32) -> Result<()> {
        match self.state {
            ItemSessionState::Closed | ItemSessionState::NotSelected => {
                return Err(self.transition_error("end"))
            }
            ItemSessionState::Interacting => self.tick(now)?,
            _ => {}
        }
        self.state = ItemSessionState::Closed;
        Ok(())
    }

    pub fn set_value(&mut self, identifier: &str, value: Option<Value>) -> Result<()> {
        set_in(&mut self.variables, identifier, value)
    }

    pub fn variable(&self, identifier: &str) -> Option<&Variable> {
        find(&self.variables, identifier)
    }

    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.variable(identifier).and_then(|v| v.value.as_ref())
    }
}

/// Runtime state of one candidate's pass through a whole test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSession {
    pub session_id: String,
    pub test_identifier: String,
    pub state: TestSessionState,
    /// Index into `item_sessions` of the item being presented.
    pub route_position: usize,
    /// Test-level outcome variables.
    pub variables: Vec<Variable>,
    /// One session per item reference, in document order.
    pub item_sessions: Vec<ItemSession>,
}

impl TestSession {
    pub fn new(session_id: impl Into<String>, test: &AssessmentTest) -> Self {
        Self {
            session_id: session_id.into(),
            test_identifier: test.identifier.clone(),
            state: TestSessionState::Initial,
            route_position: 0,
            variables: test
                .outcome_declarations
                .iter()
                .map(|decl| Variable::from_declaration(VariableKind::Outcome, decl))
                .collect(),
            item_sessions: test.item_refs().into_iter().map(ItemSession::new).collect(),
        }
    }

    fn transition_error(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }

    pub fn begin(&mut self, now: i32) -> Result<()> {
        if self.state != TestSessionState::Initial {
            return Err(self.transition_error("begin"));
        }
        let first = self
            .item_sessions
            .first_mut()
            .ok_or(SessionError::RouteEnded(0))?;
        first.begin_attempt(now)?;
        self.route_position = 0;
        self.state = TestSessionState::Interacting;
        Ok(())
    }

    /// Close the current item and present the next one. Moving past the last item
    /// closes the test.
    pub fn move_next(&mut self, now: i32) -> Result<()> {
        if self.state != TestSessionState::Interacting {
            return Err(self.transition_error("move to the next item"));
        }
        let pos = self.route_position;
        let current = self
            .item_sessions
            .get_mut(pos)
            .ok_or(SessionError::RouteEnded(pos))?;
        if current.state != ItemSessionState::Closed {
            current.end(now)?;
        }
        match self.item_sessions.get_mut(pos + 1) {
            Some(next) => {
                next.begin_attempt(now)?;
                self.route_position = pos + 1;
            }
            None => self.state = TestSessionState::Closed,
        }
        Ok(())
    }

    pub fn suspend(&mut self, now: i32) -> Result<()> {
        if self.state != TestSessionState::Interacting {
            return Err(self.transition_error("suspend"));
        }
        if let Some(item) = self.current_item_session_mut() {
            if item.state == ItemSessionState::Interacting {
                item.suspend(now)?;
            }
        }
        self.state = TestSessionState::Suspended;
        Ok(())
    }

    pub fn resume(&mut self, now: i32) -> Result<()> {
        if self.state != TestSessionState::Suspended {
            return Err(self.transition_error("resume"));
        }
        if let Some(item) = self.current_item_session_mut() {
            if item.state == ItemSessionState::Suspended {
                item.resume(now)?;
            }
        }
        self.state = TestSessionState::Interacting;
        Ok(())
    }

    pub fn end(&mut self, now: i32) -> Result<()> {
        if self.state == TestSessionState::Closed {
            return Err(self.transition_error("end"));
        }
        for item in &mut self.item_sessions {
            if !matches!(
                item.state,
                ItemSessionState::Closed | ItemSessionState::NotSelected
            ) {
                item.end(now)?;
            }
        }
        self.state = TestSessionState::Closed;
        Ok(())
    }

    pub fn current_item_session(&self) -> Option<&ItemSession> {
        self.item_sessions.get(self.route_position)
    }

    pub fn current_item_session_mut(&mut self) -> Option<&mut ItemSession> {
        self.item_sessions.get_mut(self.route_position)
    }

    pub fn item_session(&self, item_identifier: &str) -> Option<&ItemSession> {
        self.item_sessions
            .iter()
            .find(|s| s.item_identifier == item_identifier)
    }

    pub fn set_value(&mut self, identifier: &str, value: Option<Value>) -> Result<()> {
        set_in(&mut self.variables, identifier, value)
    }

    pub fn variable(&self, identifier: &str) -> Option<&Variable> {
        find(&self.variables, identifier)
    }
}
