use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::api::Utterance;

pub const DEFAULT_DATASET: &str = "dataset/dataset-v1.json";

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("failed to read training corpus {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("training corpus is not a JSON array of samples")]
    Parse(#[from] serde_json::Error),

    #[error("sample {index} ({text:?}) has no entity naming its intent")]
    MissingLabel { index: usize, text: String },
}

/// One labelled example of the training dataset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingSample {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<SampleEntity>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleEntity {
    pub value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrainingSample {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: vec![SampleEntity {
                value: label.into(),
                extra: Map::new(),
            }],
        }
    }

    /// The intent this sample trains: its first entity value, lower-cased.
    pub fn intent(&self) -> Option<String> {
        self.entities.first().map(|entity| entity.value.to_lowercase())
    }
}

/// A validated training dataset. Every sample names an intent.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    samples: Vec<TrainingSample>,
}

impl Corpus {
    pub fn new(samples: Vec<TrainingSample>) -> Result<Self, CorpusError> {
        if let Some((index, sample)) = samples
            .iter()
            .enumerate()
            .find(|(_, sample)| sample.entities.is_empty())
        {
            return Err(CorpusError::MissingLabel {
                index,
                text: sample.text.clone(),
            });
        }
        Ok(Self { samples })
    }

    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    /// Distinct intent names in order of first appearance.
    pub fn intent_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.samples
            .iter()
            .filter_map(TrainingSample::intent)
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// One intent-only utterance per sample, in corpus order.
    pub fn utterances(&self) -> Vec<Utterance> {
        self.samples
            .iter()
            .filter_map(|sample| Some(Utterance::new(sample.text.clone(), sample.intent()?)))
            .collect()
    }
}
