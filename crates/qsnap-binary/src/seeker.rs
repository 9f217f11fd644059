//! Structural index ("seeker") over a test definition.
//!
//! Positions are assigned per category in pre-order document order, so two builds over
//! the same definition with the same category list always agree. The index owns a flat
//! arena per category and is immutable once built.

use std::collections::HashMap;

use qsnap_types::{
    AssessmentItemRef, AssessmentTest, Component, ComponentKind, VariableDeclaration,
};
use xxhash_rust::xxh3::Xxh3;

use crate::error::SeekError;

/// An indexed component, detached from the definition it was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexedComponent {
    TestPart {
        identifier: String,
    },
    AssessmentSection {
        identifier: String,
    },
    AssessmentItemRef(AssessmentItemRef),
    OutcomeDeclaration {
        owner: Option<String>,
        declaration: VariableDeclaration,
    },
    ResponseDeclaration {
        owner: Option<String>,
        declaration: VariableDeclaration,
    },
}

impl IndexedComponent {
    fn from_component(component: &Component<'_>) -> Self {
        match *component {
            Component::TestPart(p) => IndexedComponent::TestPart {
                identifier: p.identifier.clone(),
            },
            Component::AssessmentSection(s) => IndexedComponent::AssessmentSection {
                identifier: s.identifier.clone(),
            },
            Component::AssessmentItemRef(item) => IndexedComponent::AssessmentItemRef(item.clone()),
            Component::OutcomeDeclaration { owner, declaration } => {
                IndexedComponent::OutcomeDeclaration {
                    owner: owner.map(|o| o.identifier.clone()),
                    declaration: declaration.clone(),
                }
            }
            Component::ResponseDeclaration { owner, declaration } => {
                IndexedComponent::ResponseDeclaration {
                    owner: owner.map(|o| o.identifier.clone()),
                    declaration: declaration.clone(),
                }
            }
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            IndexedComponent::TestPart { .. } => ComponentKind::TestPart,
            IndexedComponent::AssessmentSection { .. } => ComponentKind::AssessmentSection,
            IndexedComponent::AssessmentItemRef(_) => ComponentKind::AssessmentItemRef,
            IndexedComponent::OutcomeDeclaration { .. } => ComponentKind::OutcomeDeclaration,
            IndexedComponent::ResponseDeclaration { .. } => ComponentKind::ResponseDeclaration,
        }
    }

    /// Identifier the component is looked up by (`ITEM.VARIABLE` for item-owned
    /// declarations).
    pub fn identifier(&self) -> String {
        match self {
            IndexedComponent::TestPart { identifier }
            | IndexedComponent::AssessmentSection { identifier } => identifier.clone(),
            IndexedComponent::AssessmentItemRef(item) => item.identifier.clone(),
            IndexedComponent::OutcomeDeclaration { owner, declaration }
            | IndexedComponent::ResponseDeclaration { owner, declaration } => {
                qsnap_types::qualify(owner.as_deref(), &declaration.identifier)
            }
        }
    }

    pub fn as_declaration(&self) -> Option<IndexedDeclaration<'_>> {
        match self {
            IndexedComponent::OutcomeDeclaration { owner, declaration }
            | IndexedComponent::ResponseDeclaration { owner, declaration } => {
                Some(IndexedDeclaration {
                    owner: owner.as_deref(),
                    declaration,
                })
            }
            _ => None,
        }
    }
}

/// A declaration resolved through the index, with the item that owns it (if any).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedDeclaration<'a> {
    pub owner: Option<&'a str>,
    pub declaration: &'a VariableDeclaration,
}

#[derive(Debug, Clone)]
pub struct AssessmentTestSeeker {
    test_identifier: String,
    categories: Vec<ComponentKind>,
    arenas: HashMap<ComponentKind, Vec<IndexedComponent>>,
    positions: HashMap<(ComponentKind, String), u16>,
    fingerprint: u64,
}

impl AssessmentTestSeeker {
    /// Index every component of `test` whose kind is listed in `categories`.
    pub fn build(test: &AssessmentTest, categories: &[ComponentKind]) -> Result<Self, SeekError> {
        let mut seeker = Self {
            test_identifier: test.identifier.clone(),
            categories: Vec::new(),
            arenas: HashMap::new(),
            positions: HashMap::new(),
            fingerprint: 0,
        };
        for &kind in categories {
            if !seeker.categories.contains(&kind) {
                seeker.categories.push(kind);
                seeker.arenas.insert(kind, Vec::new());
            }
        }

        for component in test.walk() {
            let kind = component.kind();
            let Some(arena) = seeker.arenas.get_mut(&kind) else {
                continue;
            };
            let position =
                u16::try_from(arena.len()).map_err(|_| SeekError::CategoryOverflow(kind))?;
            // The first occurrence wins if a definition repeats an identifier.
            seeker
                .positions
                .entry((kind, component.qualified_identifier()))
                .or_insert(position);
            arena.push(IndexedComponent::from_component(&component));
        }
        seeker.fingerprint = seeker.compute_fingerprint();

        tracing::debug!(
            test = %seeker.test_identifier,
            categories = ?seeker.categories,
            entries = seeker.positions.len(),
            fingerprint = seeker.fingerprint,
            "built structural index"
        );
        Ok(seeker)
    }

    /// Digest of every indexed entry: kind, position, qualified identifier and, for
    /// declarations, cardinality and base type.
    ///
    /// Indexes that resolve every position identically share a fingerprint.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    fn compute_fingerprint(&self) -> u64 {
        fn field(hasher: &mut Xxh3, bytes: &[u8]) {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }

        let mut hasher = Xxh3::new();
        field(&mut hasher, self.test_identifier.as_bytes());
        for &kind in &self.categories {
            let arena = self.arenas.get(&kind).map(Vec::as_slice).unwrap_or_default();
            field(&mut hasher, kind.name().as_bytes());
            hasher.update(&(arena.len() as u64).to_le_bytes());
            for component in arena {
                field(&mut hasher, component.identifier().as_bytes());
                if let Some(resolved) = component.as_declaration() {
                    let decl = resolved.declaration;
                    field(&mut hasher, decl.cardinality.to_string().as_bytes());
                    hasher.update(&[decl.base_type.map_or(u8::MAX, |bt| bt.tag())]);
                }
            }
        }
        hasher.digest()
    }

    pub fn test_identifier(&self) -> &str {
        &self.test_identifier
    }

    pub fn categories(&self) -> &[ComponentKind] {
        &self.categories
    }

    fn arena(&self, kind: ComponentKind) -> Result<&[IndexedComponent], SeekError> {
        self.arenas
            .get(&kind)
            .map(Vec::as_slice)
            .ok_or(SeekError::NotIndexed(kind))
    }

    /// Number of entries in `kind`, or 0 if it is not indexed.
    pub fn len(&self, kind: ComponentKind) -> usize {
        self.arena(kind).map_or(0, <[_]>::len)
    }

    pub fn position_of(&self, kind: ComponentKind, identifier: &str) -> Result<u16, SeekError> {
        self.arena(kind)?;
        self.positions
            .get(&(kind, identifier.to_string()))
            .copied()
            .ok_or_else(|| SeekError::NotFound {
                kind,
                identifier: identifier.to_string(),
            })
    }

    pub fn component_at(
        &self,
        kind: ComponentKind,
        position: u16,
    ) -> Result<&IndexedComponent, SeekError> {
        let arena = self.arena(kind)?;
        arena
            .get(usize::from(position))
            .ok_or(SeekError::OutOfRange {
                kind,
                position,
                len: arena.len(),
            })
    }

    /// Resolve a declaration position. `kind` must be one of the declaration kinds.
    pub fn declaration_at(
        &self,
        kind: ComponentKind,
        position: u16,
    ) -> Result<IndexedDeclaration<'_>, SeekError> {
        self.component_at(kind, position)?
            .as_declaration()
            .ok_or(SeekError::NotIndexed(kind))
    }

    pub fn item_ref_at(&self, position: u16) -> Result<&AssessmentItemRef, SeekError> {
        match self.component_at(ComponentKind::AssessmentItemRef, position)? {
            IndexedComponent::AssessmentItemRef(item) => Ok(item),
            _ => Err(SeekError::NotIndexed(ComponentKind::AssessmentItemRef)),
        }
    }

    /// Entries of `kind` in position order.
    pub fn entries(
        &self,
        kind: ComponentKind,
    ) -> Result<impl Iterator<Item = (u16, &IndexedComponent)> + '_, SeekError> {
        // Positions fit in u16: `build` rejects larger categories.
        Ok(self
            .arena(kind)?
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u16, c)))
    }
}
