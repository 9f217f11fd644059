use qsnap_types::ComponentKind;

use crate::envelope::Compression;

/// Categories the session codec needs resolved through the structural index.
pub const REQUIRED_CATEGORIES: [ComponentKind; 3] = [
    ComponentKind::AssessmentItemRef,
    ComponentKind::OutcomeDeclaration,
    ComponentKind::ResponseDeclaration,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub compression: Compression,
    /// Categories indexed when the service builds its structural index. Must include
    /// [`REQUIRED_CATEGORIES`].
    pub categories: Vec<ComponentKind>,
    /// Prefix of generated session ids (`{prefix}-{n}`).
    pub id_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Lz4,
            categories: REQUIRED_CATEGORIES.to_vec(),
            id_prefix: "session".to_string(),
        }
    }
}
