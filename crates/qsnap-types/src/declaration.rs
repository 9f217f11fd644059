use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;
use crate::value::{BaseType, Cardinality, Scalar, Value};

/// Whether a variable holds candidate input or a computed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Response,
    Outcome,
}

impl VariableKind {
    pub fn to_u8(self) -> u8 {
        match self {
            VariableKind::Response => 0,
            VariableKind::Outcome => 1,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(VariableKind::Response),
            1 => Some(VariableKind::Outcome),
            _ => None,
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VariableKind::Response => "response",
            VariableKind::Outcome => "outcome",
        })
    }
}

/// Definition-time description of a variable. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub identifier: String,
    pub cardinality: Cardinality,
    /// `None` for record cardinality, required otherwise.
    #[serde(default)]
    pub base_type: Option<BaseType>,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl VariableDeclaration {
    pub fn new(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            cardinality,
            base_type,
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        validate_identifier(&self.identifier)?;
        let invalid = |reason| DefinitionError::InvalidDeclaration {
            identifier: self.identifier.clone(),
            cardinality: self.cardinality,
            reason,
        };
        match (self.cardinality, self.base_type) {
            (Cardinality::Record, Some(_)) => return Err(invalid("must not carry a base type")),
            (Cardinality::Record, None) => {}
            (_, None) => return Err(invalid("requires a base type")),
            (_, Some(_)) => {}
        }
        if let Some(default) = &self.default_value {
            if !default.conforms_to(self.cardinality, self.base_type) {
                return Err(DefinitionError::InvalidDefault {
                    identifier: self.identifier.clone(),
                });
            }
        }
        Ok(())
    }

    /// Value a freshly initialised variable holds.
    ///
    /// The declared default wins. Outcome variables of single numeric type start at zero;
    /// everything else starts absent.
    pub fn initial_value(&self, kind: VariableKind) -> Option<Value> {
        if let Some(default) = &self.default_value {
            return Some(default.clone());
        }
        match (kind, self.cardinality, self.base_type) {
            (VariableKind::Outcome, Cardinality::Single, Some(BaseType::Integer)) => {
                Some(Value::Single(Scalar::Integer(0)))
            }
            (VariableKind::Outcome, Cardinality::Single, Some(BaseType::Float)) => {
                Some(Value::Single(Scalar::Float(0.0)))
            }
            _ => None,
        }
    }
}

/// Identifiers are non-empty and made of ASCII alphanumerics, `_` and `-`, starting with a
/// letter or `_`. `.` is reserved for qualified `ITEM.VARIABLE` names.
pub(crate) fn validate_identifier(identifier: &str) -> Result<(), DefinitionError> {
    let mut chars = identifier.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DefinitionError::InvalidIdentifier(identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_declarations_reject_base_type() {
        let decl = VariableDeclaration::new("R", Cardinality::Record, Some(BaseType::Integer));
        assert!(matches!(
            decl.validate(),
            Err(DefinitionError::InvalidDeclaration { .. })
        ));
        let decl = VariableDeclaration::new("R", Cardinality::Record, None);
        assert!(decl.validate().is_ok());
    }

    #[test]
    fn non_record_declarations_require_base_type() {
        let decl = VariableDeclaration::new("M", Cardinality::Multiple, None);
        assert!(decl.validate().is_err());
    }

    #[test]
    fn default_must_conform() {
        let decl = VariableDeclaration::new("S", Cardinality::Single, Some(BaseType::Integer))
            .with_default(Value::Single(Scalar::Float(1.0)));
        assert!(matches!(
            decl.validate(),
            Err(DefinitionError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn numeric_outcomes_start_at_zero() {
        let score = VariableDeclaration::new("SCORE", Cardinality::Single, Some(BaseType::Float));
        assert_eq!(
            score.initial_value(VariableKind::Outcome),
            Some(Value::Single(Scalar::Float(0.0)))
        );
        assert_eq!(score.initial_value(VariableKind::Response), None);

        let list = VariableDeclaration::new("L", Cardinality::Multiple, Some(BaseType::Integer));
        assert_eq!(list.initial_value(VariableKind::Outcome), None);
    }

    #[test]
    fn identifier_rules() {
        for ok in ["Q01", "_x", "SCORE-1"] {
            assert!(validate_identifier(ok).is_ok(), "{ok}");
        }
        for bad in ["", "1abc", "a b", "a.b", "é"] {
            assert!(validate_identifier(bad).is_err(), "{bad}");
        }
    }
}
