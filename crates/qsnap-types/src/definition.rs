//! Test definition tree.
//!
//! Only the parts of a test definition that runtime state depends on are modelled: the
//! nesting of test parts, sections and item references, and the variable declarations
//! owned by the test and by each item. Definitions are loaded from JSON and validated
//! before use.

use core::fmt;
use core::str::FromStr;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::declaration::{validate_identifier, VariableDeclaration, VariableKind};
use crate::error::DefinitionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentTest {
    pub identifier: String,
    #[serde(default)]
    pub outcome_declarations: Vec<VariableDeclaration>,
    pub test_parts: Vec<TestPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPart {
    pub identifier: String,
    pub sections: Vec<AssessmentSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSection {
    pub identifier: String,
    #[serde(default)]
    pub parts: Vec<SectionPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionPart {
    Section(AssessmentSection),
    ItemRef(AssessmentItemRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentItemRef {
    pub identifier: String,
    #[serde(default)]
    pub href: Option<String>,
    /// Attempt limit for the item; absent or 0 is unlimited.
    #[serde(default)]
    pub max_attempts: Option<u8>,
    #[serde(default)]
    pub response_declarations: Vec<VariableDeclaration>,
    #[serde(default)]
    pub outcome_declarations: Vec<VariableDeclaration>,
}

impl AssessmentItemRef {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            href: None,
            max_attempts: None,
            response_declarations: Vec::new(),
            outcome_declarations: Vec::new(),
        }
    }

    pub fn with_response(mut self, decl: VariableDeclaration) -> Self {
        self.response_declarations.push(decl);
        self
    }

    pub fn with_outcome(mut self, decl: VariableDeclaration) -> Self {
        self.outcome_declarations.push(decl);
        self
    }

    /// Declarations in document order: responses first, then outcomes.
    pub fn declarations(&self) -> impl Iterator<Item = (VariableKind, &VariableDeclaration)> {
        self.response_declarations
            .iter()
            .map(|d| (VariableKind::Response, d))
            .chain(
                self.outcome_declarations
                    .iter()
                    .map(|d| (VariableKind::Outcome, d)),
            )
    }

    pub fn declaration(&self, identifier: &str) -> Option<(VariableKind, &VariableDeclaration)> {
        self.declarations().find(|(_, d)| d.identifier == identifier)
    }
}

/// Kinds of definition components a structural index can be built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    TestPart,
    AssessmentSection,
    AssessmentItemRef,
    OutcomeDeclaration,
    ResponseDeclaration,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::TestPart,
        ComponentKind::AssessmentSection,
        ComponentKind::AssessmentItemRef,
        ComponentKind::OutcomeDeclaration,
        ComponentKind::ResponseDeclaration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::TestPart => "testPart",
            ComponentKind::AssessmentSection => "assessmentSection",
            ComponentKind::AssessmentItemRef => "assessmentItemRef",
            ComponentKind::OutcomeDeclaration => "outcomeDeclaration",
            ComponentKind::ResponseDeclaration => "responseDeclaration",
        }
    }

    pub fn for_variable(kind: VariableKind) -> Self {
        match kind {
            VariableKind::Response => ComponentKind::ResponseDeclaration,
            VariableKind::Outcome => ComponentKind::OutcomeDeclaration,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown component kind: {s}"))
    }
}

/// A borrowed node of the definition tree, as yielded by [`AssessmentTest::walk`].
#[derive(Debug, Clone, Copy)]
pub enum Component<'a> {
    TestPart(&'a TestPart),
    AssessmentSection(&'a AssessmentSection),
    AssessmentItemRef(&'a AssessmentItemRef),
    OutcomeDeclaration {
        owner: Option<&'a AssessmentItemRef>,
        declaration: &'a VariableDeclaration,
    },
    ResponseDeclaration {
        owner: Option<&'a AssessmentItemRef>,
        declaration: &'a VariableDeclaration,
    },
}

impl<'a> Component<'a> {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::TestPart(_) => ComponentKind::TestPart,
            Component::AssessmentSection(_) => ComponentKind::AssessmentSection,
            Component::AssessmentItemRef(_) => ComponentKind::AssessmentItemRef,
            Component::OutcomeDeclaration { .. } => ComponentKind::OutcomeDeclaration,
            Component::ResponseDeclaration { .. } => ComponentKind::ResponseDeclaration,
        }
    }

    /// Identifier under which this component is indexed. Item-owned declarations are
    /// qualified by their item: `Q01.SCORE`.
    pub fn qualified_identifier(&self) -> String {
        match self {
            Component::TestPart(p) => p.identifier.clone(),
            Component::AssessmentSection(s) => s.identifier.clone(),
            Component::AssessmentItemRef(i) => i.identifier.clone(),
            Component::OutcomeDeclaration { owner, declaration }
            | Component::ResponseDeclaration { owner, declaration } => {
                qualify(owner.map(|o| o.identifier.as_str()), &declaration.identifier)
            }
        }
    }
}

pub fn qualify(owner: Option<&str>, identifier: &str) -> String {
    match owner {
        Some(owner) => format!("{owner}.{identifier}"),
        None => identifier.to_string(),
    }
}

impl AssessmentTest {
    /// Parse and validate a JSON test definition.
    pub fn parse_str(json: &str) -> Result<Self, DefinitionError> {
        let test: AssessmentTest = serde_json::from_str(json)?;
        test.validate()?;
        Ok(test)
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        validate_identifier(&self.identifier)?;
        if self.test_parts.is_empty() {
            return Err(DefinitionError::Empty);
        }
        check_declarations(&self.outcome_declarations)?;

        let mut parts = HashSet::new();
        let mut sections = HashSet::new();
        let mut items = HashSet::new();
        for component in self.walk() {
            let (kind, identifier, seen) = match component {
                Component::TestPart(p) => ("testPart", &p.identifier, &mut parts),
                Component::AssessmentSection(s) => {
                    ("assessmentSection", &s.identifier, &mut sections)
                }
                Component::AssessmentItemRef(i) => {
                    let all: Vec<_> = i.declarations().map(|(_, d)| d.clone()).collect();
                    check_declarations(&all)?;
                    ("assessmentItemRef", &i.identifier, &mut items)
                }
                _ => continue,
            };
            validate_identifier(identifier)?;
            if !seen.insert(identifier.as_str()) {
                return Err(DefinitionError::DuplicateIdentifier {
                    kind,
                    identifier: identifier.clone(),
                });
            }
        }
        Ok(())
    }

    /// Pre-order walk of the definition in document order.
    ///
    /// Test-level outcome declarations come first, then each test part and its sections.
    /// Each item reference is followed by its response then outcome declarations.
    pub fn walk(&self) -> Vec<Component<'_>> {
        let mut out = Vec::new();
        for declaration in &self.outcome_declarations {
            out.push(Component::OutcomeDeclaration {
                owner: None,
                declaration,
            });
        }
        for part in &self.test_parts {
            out.push(Component::TestPart(part));
            for section in &part.sections {
                walk_section(section, &mut out);
            }
        }
        out
    }

    /// Item references in document order.
    pub fn item_refs(&self) -> Vec<&AssessmentItemRef> {
        self.walk()
            .into_iter()
            .filter_map(|c| match c {
                Component::AssessmentItemRef(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    pub fn item_ref(&self, identifier: &str) -> Option<&AssessmentItemRef> {
        self.item_refs()
            .into_iter()
            .find(|item| item.identifier == identifier)
    }
}

fn walk_section<'a>(section: &'a AssessmentSection, out: &mut Vec<Component<'a>>) {
    out.push(Component::AssessmentSection(section));
    for part in &section.parts {
        match part {
            SectionPart::Section(inner) => walk_section(inner, out),
            SectionPart::ItemRef(item) => {
                out.push(Component::AssessmentItemRef(item));
                for declaration in &item.response_declarations {
                    out.push(Component::ResponseDeclaration {
                        owner: Some(item),
                        declaration,
                    });
                }
                for declaration in &item.outcome_declarations {
                    out.push(Component::OutcomeDeclaration {
                        owner: Some(item),
                        declaration,
                    });
                }
            }
        }
    }
}

fn check_declarations(declarations: &[VariableDeclaration]) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    for decl in declarations {
        decl.validate()?;
        if !seen.insert(decl.identifier.as_str()) {
            return Err(DefinitionError::DuplicateIdentifier {
                kind: "variable",
                identifier: decl.identifier.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{BaseType, Cardinality};

    const TWO_ITEMS: &str = r#"{
        "identifier": "T",
        "outcome_declarations": [
            { "identifier": "TOTAL", "cardinality": "single", "base_type": "float" }
        ],
        "test_parts": [{
            "identifier": "P01",
            "sections": [{
                "identifier": "S01",
                "parts": [
                    { "item_ref": {
                        "identifier": "Q01",
                        "response_declarations": [
                            { "identifier": "RESPONSE", "cardinality": "single", "base_type": "identifier" }
                        ],
                        "outcome_declarations": [
                            { "identifier": "SCORE", "cardinality": "single", "base_type": "float" }
                        ]
                    } },
                    { "section": {
                        "identifier": "S02",
                        "parts": [ { "item_ref": { "identifier": "Q02" } } ]
                    } }
                ]
            }]
        }]
    }"#;

    #[test]
    fn walk_is_preorder_in_document_order() {
        let test = AssessmentTest::parse_str(TWO_ITEMS).unwrap();
        let walked: Vec<_> = test
            .walk()
            .iter()
            .map(|c| format!("{}:{}", c.kind(), c.qualified_identifier()))
            .collect();
        assert_eq!(
            walked,
            [
                "outcomeDeclaration:TOTAL",
                "testPart:P01",
                "assessmentSection:S01",
                "assessmentItemRef:Q01",
                "responseDeclaration:Q01.RESPONSE",
                "outcomeDeclaration:Q01.SCORE",
                "assessmentSection:S02",
                "assessmentItemRef:Q02",
            ]
        );
        let ids: Vec<_> = test.item_refs().iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, ["Q01", "Q02"]);
    }

    #[test]
    fn duplicate_item_identifiers_are_rejected() {
        let json = TWO_ITEMS.replace("\"Q02\"", "\"Q01\"");
        let err = AssessmentTest::parse_str(&json).unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::DuplicateIdentifier { kind: "assessmentItemRef", .. }
        ));
    }

    #[test]
    fn duplicate_variables_within_an_item_are_rejected() {
        let x = |bt| VariableDeclaration::new("X", Cardinality::Single, Some(bt));
        let item = AssessmentItemRef::new("Q01")
            .with_response(x(BaseType::Integer))
            .with_outcome(x(BaseType::Float));
        let test = AssessmentTest {
            identifier: "T".into(),
            outcome_declarations: Vec::new(),
            test_parts: vec![TestPart {
                identifier: "P".into(),
                sections: vec![AssessmentSection {
                    identifier: "S".into(),
                    parts: vec![SectionPart::ItemRef(item)],
                }],
            }],
        };
        assert!(matches!(
            test.validate(),
            Err(DefinitionError::DuplicateIdentifier { kind: "variable", .. })
        ));
    }

    #[test]
    fn component_kind_names_round_trip() {
        for kind in ComponentKind::ALL {
            assert_eq!(kind.name().parse::<ComponentKind>(), Ok(kind));
        }
        assert!("itemRef".parse::<ComponentKind>().is_err());
    }
}
