//! Versioned binary artifact for trained classifiers.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! +--------+---------+--------+--------+----------------+
//! | "RLFM" | version | crc32  | length | bincode payload |
//! | 4 B    | u32     | u32    | u64    | length bytes    |
//! +--------+---------+--------+--------+----------------+
//! ```
//!
//! The payload records the analyzer fingerprint. Loading fails with a schema
//! mismatch when the running analyzer would tokenize differently from the one
//! the model was trained with.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::message::MessageAnalyzer;
use crate::dataset::CategorySpec;
use crate::error::{ReliefError, Result};
use crate::ml::classifier::{ModelMetadata, MultiLabelClassifier};
use crate::ml::grid_search::{CvResult, ParamSet};
use crate::ml::stage::MultiOutputModel;
use crate::ml::tfidf::{TfIdfVectorizer, VectorizerConfig, Vocabulary};

/// Artifact magic bytes.
pub const MAGIC: &[u8; 4] = b"RLFM";

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Serialized form of a [`MultiLabelClassifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub fingerprint: u32,
    pub categories: CategorySpec,
    pub vectorizer_config: VectorizerConfig,
    pub vocabulary: Vocabulary,
    pub model: MultiOutputModel,
    pub params: ParamSet,
    pub cv_results: Vec<CvResult>,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    pub fn from_classifier(classifier: &MultiLabelClassifier) -> Result<Self> {
        let vocabulary = classifier
            .vectorizer()
            .vocabulary()
            .cloned()
            .ok_or_else(|| ReliefError::invalid_operation("vectorizer is not fitted"))?;
        Ok(ModelArtifact {
            fingerprint: classifier.fingerprint(),
            categories: classifier.spec().clone(),
            vectorizer_config: classifier.vectorizer().config().clone(),
            vocabulary,
            model: classifier.model().clone(),
            params: classifier.params(),
            cv_results: classifier.cv_results().to_vec(),
            metadata: classifier.metadata().clone(),
        })
    }

    /// Rebuild the classifier, checking it against the running analyzer.
    pub fn into_classifier(self, analyzer: MessageAnalyzer) -> Result<MultiLabelClassifier> {
        if self.fingerprint != analyzer.fingerprint() {
            return Err(ReliefError::schema_mismatch(format!(
                "artifact was trained with tokenizer {:08x}, running tokenizer is {:08x}",
                self.fingerprint,
                analyzer.fingerprint()
            )));
        }
        let vectorizer = TfIdfVectorizer::from_parts(self.vectorizer_config, self.vocabulary)?;
        MultiLabelClassifier::new(
            analyzer,
            self.categories,
            vectorizer,
            self.model,
            self.params,
            self.cv_results,
            self.metadata,
        )
    }
}

/// Reads and writes classifier artifacts.
pub struct ModelPersister;

impl ModelPersister {
    /// Encode a classifier into artifact bytes.
    pub fn encode(classifier: &MultiLabelClassifier) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&ModelArtifact::from_classifier(classifier)?)?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.write_all(MAGIC)?;
        bytes.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        bytes.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
        bytes.write_u64::<LittleEndian>(payload.len() as u64)?;
        bytes.write_all(&payload)?;
        Ok(bytes)
    }

    /// Decode artifact bytes, validating header, checksum and fingerprint.
    pub fn decode(bytes: &[u8], analyzer: MessageAnalyzer) -> Result<MultiLabelClassifier> {
        if bytes.len() < HEADER_LEN {
            return Err(ReliefError::serialization(format!(
                "artifact is {} bytes, shorter than its header",
                bytes.len()
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ReliefError::serialization("not a relief model artifact"));
        }

        let version = cursor.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(ReliefError::serialization(format!(
                "unsupported artifact version {version}, expected {FORMAT_VERSION}"
            )));
        }

        let checksum = cursor.read_u32::<LittleEndian>()?;
        let length = cursor.read_u64::<LittleEndian>()?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() as u64 != length {
            return Err(ReliefError::serialization(format!(
                "artifact payload is {} bytes, header says {length}",
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != checksum {
            return Err(ReliefError::serialization("artifact checksum mismatch"));
        }

        let artifact: ModelArtifact = bincode::deserialize(payload)?;
        artifact.into_classifier(analyzer)
    }

    /// Write the artifact to `path` through a temporary sibling file.
    ///
    /// Returns the number of bytes written.
    pub fn save<P: AsRef<Path>>(classifier: &MultiLabelClassifier, path: P) -> Result<usize> {
        let path = path.as_ref();
        let bytes = Self::encode(classifier)?;
        let tmp = temp_path(path);

        let written = (|| -> Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, path)?;
            Ok(())
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        log::info!("Saved model artifact ({} bytes) to {}", bytes.len(), path.display());
        Ok(bytes.len())
    }

    /// Load an artifact and check it against a freshly built analyzer.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MultiLabelClassifier> {
        Self::load_with_analyzer(path, MessageAnalyzer::new()?)
    }

    pub fn load_with_analyzer<P: AsRef<Path>>(path: P, analyzer: MessageAnalyzer) -> Result<MultiLabelClassifier> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let classifier = Self::decode(&bytes, analyzer)?;
        log::info!(
            "Loaded model {} trained at {} from {}",
            classifier.metadata().run_id,
            classifier.metadata().trained_at,
            path.display()
        );
        Ok(classifier)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::dataset::{Genre, LabelVector, LabeledDataset, LabeledRow, Message};
    use crate::ml::trainer::Trainer;

    fn trained() -> MultiLabelClassifier {
        let spec = CategorySpec::new(["water", "food"]).unwrap();
        let texts = [
            ("We need water", [1, 0]),
            ("Clean water please", [1, 0]),
            ("No drinking water here", [1, 0]),
            ("Water shortage in the camp", [1, 0]),
            ("Bottled water needed", [1, 0]),
            ("We need food", [0, 1]),
            ("Rice and food please", [0, 1]),
            ("Hungry, no food", [0, 1]),
            ("Food supplies needed", [0, 1]),
            ("Food for children", [0, 1]),
        ];
        let rows = texts
            .iter()
            .enumerate()
            .map(|(i, (t, l))| LabeledRow {
                message: Message::new(i as i64, *t, Genre::Direct),
                labels: LabelVector::new(l.to_vec()).unwrap(),
            })
            .collect();
        let dataset = LabeledDataset::new(spec, rows).unwrap();

        let config = TrainingConfig {
            cv_folds: 2,
            n_jobs: 1,
            ..TrainingConfig::default()
        };
        let mut trainer = Trainer::new(config).unwrap();
        trainer.fit(&dataset).unwrap();
        trainer.into_classifier().unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.bin");
        let classifier = trained();

        ModelPersister::save(&classifier, &path).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = ModelPersister::load(&path).unwrap();
        assert_eq!(loaded.spec(), classifier.spec());
        assert_eq!(loaded.model(), classifier.model());
        assert_eq!(loaded.metadata(), classifier.metadata());
        assert_eq!(
            loaded.predict("water for the camp").unwrap(),
            classifier.predict("water for the camp").unwrap()
        );
    }

    #[test]
    fn test_rejects_corruption() {
        let classifier = trained();
        let bytes = ModelPersister::encode(&classifier).unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(ModelPersister::decode(&bad_magic, MessageAnalyzer::new().unwrap()).is_err());

        let mut bad_version = bytes.clone();
        bad_version[4] = 99;
        assert!(ModelPersister::decode(&bad_version, MessageAnalyzer::new().unwrap()).is_err());

        let mut flipped = bytes.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xFF;
        assert!(matches!(
            ModelPersister::decode(&flipped, MessageAnalyzer::new().unwrap()),
            Err(ReliefError::Serialization(_))
        ));

        assert!(ModelPersister::decode(&bytes[..10], MessageAnalyzer::new().unwrap()).is_err());
    }

    #[test]
    fn test_rejects_fingerprint_mismatch() {
        let classifier = trained();
        let mut artifact = ModelArtifact::from_classifier(&classifier).unwrap();
        artifact.fingerprint ^= 1;
        assert!(matches!(
            artifact.into_classifier(MessageAnalyzer::new().unwrap()),
            Err(ReliefError::SchemaMismatch(_))
        ));
    }
}
