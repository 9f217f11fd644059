use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use qsnap_binary::{decode_test_session, encode_test_session, AssessmentTestSeeker, SeekError};
use qsnap_types::{AssessmentTest, TestSession};

use crate::blob::{validate_session_id, BlobStore};
use crate::config::{StorageConfig, REQUIRED_CATEGORIES};
use crate::envelope;
use crate::error::{Result, StorageErrorKind, StorageStage};

/// Creates, saves and loads test sessions for one test definition.
pub trait StorageService {
    /// Create a fresh session with a new unique id. The session is not persisted.
    fn instantiate(&self) -> Result<TestSession>;

    /// Save `session`, replacing any previous snapshot with the same id.
    fn persist(&self, session: &TestSession) -> Result<()>;

    /// Load the session last persisted under `session_id`.
    fn retrieve(&self, session_id: &str) -> Result<TestSession>;
}

/// [`StorageService`] that stores binary snapshots in a [`BlobStore`].
pub struct BinaryStorage<B> {
    test: AssessmentTest,
    seeker: Arc<AssessmentTestSeeker>,
    store: B,
    config: StorageConfig,
    next_id: AtomicU64,
}

impl<B: BlobStore> BinaryStorage<B> {
    /// Bind a service to `test`, building its structural index.
    pub fn new(test: AssessmentTest, store: B, config: StorageConfig) -> Result<Self> {
        let stage = StorageStage::Instantiation;
        if let Some(kind) = REQUIRED_CATEGORIES
            .into_iter()
            .find(|kind| !config.categories.contains(kind))
        {
            return Err(StorageErrorKind::Seek(SeekError::NotIndexed(kind)).at(stage));
        }
        let seeker = AssessmentTestSeeker::build(&test, &config.categories)
            .map_err(|err| StorageErrorKind::from(err).at(stage))?;
        Ok(Self {
            test,
            seeker: Arc::new(seeker),
            store,
            config,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn definition(&self) -> &AssessmentTest {
        &self.test
    }

    pub fn seeker(&self) -> &Arc<AssessmentTestSeeker> {
        &self.seeker
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn fresh_id(&self) -> std::result::Result<String, StorageErrorKind> {
        loop {
            let n = self.next_id.fetch_add(1, Ordering::Relaxed);
            let id = format!("{}-{n}", self.config.id_prefix);
            validate_session_id(&id)?;
            if !self.store.exists(&id)? {
                return Ok(id);
            }
        }
    }

    fn load(&self, session_id: &str) -> std::result::Result<TestSession, StorageErrorKind> {
        validate_session_id(session_id)?;
        let sealed = self
            .store
            .get(session_id)?
            .ok_or_else(|| StorageErrorKind::NotFound(session_id.to_string()))?;
        let payload = envelope::open(&sealed, self.seeker.fingerprint())?;
        Ok(decode_test_session(&self.seeker, session_id, &payload)?)
    }
}

impl<B: BlobStore> StorageService for BinaryStorage<B> {
    fn instantiate(&self) -> Result<TestSession> {
        let id = self
            .fresh_id()
            .map_err(|err| err.at(StorageStage::Instantiation))?;
        tracing::debug!(session = %id, test = %self.test.identifier, "instantiated session");
        Ok(TestSession::new(id, &self.test))
    }

    fn persist(&self, session: &TestSession) -> Result<()> {
        let stage = StorageStage::Persistence;
        validate_session_id(&session.session_id).map_err(|err| err.at(stage))?;
        let payload = encode_test_session(&self.seeker, session)
            .map_err(|err| StorageErrorKind::from(err).at(stage))?;
        let sealed = envelope::seal(&payload, self.config.compression, self.seeker.fingerprint())
            .map_err(|err| err.at(stage))?;
        self.store
            .put(&session.session_id, &sealed)
            .map_err(|err| err.at(stage))?;
        tracing::debug!(
            session = %session.session_id,
            payload_len = payload.len(),
            stored_len = sealed.len(),
            "persisted session"
        );
        Ok(())
    }

    fn retrieve(&self, session_id: &str) -> Result<TestSession> {
        match self.load(session_id) {
            Ok(session) => {
                tracing::debug!(session = %session_id, "retrieved session");
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "failed to retrieve session");
                Err(err.at(StorageStage::Retrieval))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use qsnap_types::ComponentKind;

    const DEFINITION: &str = r#"{
        "identifier": "T",
        "test_parts": [{
            "identifier": "P01",
            "sections": [{
                "identifier": "S01",
                "parts": [ { "item_ref": { "identifier": "Q01" } } ]
            }]
        }]
    }"#;

    fn service() -> BinaryStorage<MemoryBlobStore> {
        let test = AssessmentTest::parse_str(DEFINITION).unwrap();
        BinaryStorage::new(test, MemoryBlobStore::new(), StorageConfig::default()).unwrap()
    }

    #[test]
    fn ids_skip_existing_blobs() {
        let storage = service();
        storage.store().put("session-0", b"taken").unwrap();
        let session = storage.instantiate().unwrap();
        assert_eq!(session.session_id, "session-1");
        assert_eq!(storage.instantiate().unwrap().session_id, "session-2");
    }

    #[test]
    fn missing_categories_fail_instantiation() {
        let test = AssessmentTest::parse_str(DEFINITION).unwrap();
        let config = StorageConfig {
            categories: vec![ComponentKind::AssessmentItemRef],
            ..StorageConfig::default()
        };
        let err = BinaryStorage::new(test, MemoryBlobStore::new(), config)
            .err()
            .unwrap();
        assert_eq!(err.stage, StorageStage::Instantiation);
        assert!(matches!(
            err.kind(),
            StorageErrorKind::Seek(SeekError::NotIndexed(ComponentKind::OutcomeDeclaration))
        ));
    }

    #[test]
    fn stages_are_reported() {
        let storage = service();
        let err = storage.retrieve("session-9").unwrap_err();
        assert_eq!(err.stage, StorageStage::Retrieval);
        assert!(matches!(err.kind(), StorageErrorKind::NotFound(_)));

        let mut session = storage.instantiate().unwrap();
        session.session_id = "bad id".into();
        let err = storage.persist(&session).unwrap_err();
        assert_eq!(err.stage, StorageStage::Persistence);
        assert!(matches!(err.kind(), StorageErrorKind::InvalidSessionId(_)));
    }
}
