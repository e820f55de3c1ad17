use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WitResult;

/// An intent as the API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

/// How an entity's values are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lookup {
    FreeText,
    Keywords,
}

/// One value of a keywords entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    pub synonyms: Vec<String>,
}

impl Keyword {
    pub fn new<S: Into<String>>(keyword: impl Into<String>, synonyms: impl IntoIterator<Item = S>) -> Self {
        Self {
            keyword: keyword.into(),
            synonyms: synonyms.into_iter().map(Into::into).collect(),
        }
    }
}

/// Body of an entity create or update. Empty collections are left off the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lookups: Vec<Lookup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<Keyword>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn lookup(mut self, lookup: Lookup) -> Self {
        if !self.lookups.contains(&lookup) {
            self.lookups.push(lookup);
        }
        self
    }

    pub fn keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.push(keyword);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewApp {
    pub name: String,
    pub lang: String,
    pub private: bool,
    #[serde(skip_serializing_if = "is_blank")]
    pub timezone: Option<String>,
}

/// Partial app update; only the fields that are set get sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppUpdate {
    #[serde(skip_serializing_if = "is_blank")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "is_blank")]
    pub timezone: Option<String>,
}

/// A training example as uploaded to `/utterances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub intent: String,
    pub entities: Vec<UtteranceEntity>,
    pub traits: Vec<UtteranceTrait>,
}

impl Utterance {
    /// An utterance labelled only with an intent.
    pub fn new(text: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intent: intent.into(),
            entities: Vec::new(),
            traits: Vec::new(),
        }
    }
}

/// Span annotation inside an utterance. `entity` is `name:role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceEntity {
    pub entity: String,
    pub start: usize,
    pub end: usize,
    pub body: String,
    #[serde(default)]
    pub entities: Vec<UtteranceEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceTrait {
    #[serde(rename = "trait")]
    pub name: String,
    pub value: String,
}

/// An utterance as returned by `GET /utterances`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredUtterance {
    pub text: String,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub entities: Vec<Value>,
    #[serde(default)]
    pub traits: Vec<Value>,
}

/// Acknowledgement of a bulk utterance upload or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub sent: bool,
    pub n: usize,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self { sent: true, n: 0 }
    }
}

/// Optional parameters of `GET /message`.
#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    pub tag: Option<String>,
    pub n: Option<u32>,
    /// Sent as a JSON string in the query.
    pub context: Option<Value>,
    /// Dynamic entities, sent as a JSON string in the query.
    pub entities: Option<Value>,
}

/// Optional parameters of `POST /synthesize`.
#[derive(Debug, Clone, Default)]
pub struct SynthesizeOptions {
    pub style: Option<String>,
    pub speed: Option<u32>,
    pub pitch: Option<u32>,
    /// Value of the `Accept` header; `audio/raw` when unset.
    pub accept: Option<String>,
}

/// Paging for the list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Null, `{}` and `[]` count as "not provided".
pub(crate) fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// The calls the training workflows are built from.
#[async_trait]
pub trait TrainingApi: Send + Sync {
    async fn list_intents(&self) -> WitResult<Vec<Intent>>;

    async fn create_intent(&self, name: &str) -> WitResult<Intent>;

    async fn delete_intent(&self, name: &str) -> WitResult<Value>;

    async fn list_utterances(&self, page: Page) -> WitResult<Vec<StoredUtterance>>;

    async fn upload_utterances(&self, utterances: &[Utterance]) -> WitResult<BatchResult>;

    /// Deletes every remote utterance whose text matches one of `texts`.
    async fn delete_utterances(&self, texts: &[String]) -> WitResult<BatchResult>;
}
