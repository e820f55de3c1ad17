use std::path::Path;

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, Method, RequestBuilder, Response, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    api::*,
    config::WitConfig,
    error::{WitError, WitResult},
};

const JSON: &str = "application/json";
const DEFAULT_AUDIO_FORMAT: &str = "audio/raw";

/// A client for the Wit.ai HTTP API. Clones share the connection pool.
///
/// Each method issues exactly one request. Nothing is retried or cached.
#[derive(Clone)]
pub struct WitClient {
    http: Client,
    base_url: Url,
    token: String,
    api_version: String,
}

impl std::fmt::Debug for WitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WitClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct MessageQuery<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entities: Option<String>,
}

#[derive(Serialize)]
struct SynthesizeBody<'a> {
    q: &'a str,
    voice: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pitch: Option<u32>,
}

impl WitClient {
    pub fn new(config: WitConfig) -> WitResult<Self> {
        if config.token.trim().is_empty() {
            return Err(WitError::Config("access token is empty".into()));
        }
        if config.api_version.trim().is_empty() {
            return Err(WitError::Config("api version is empty".into()));
        }

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| WitError::Config(format!("invalid base url {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(WitError::Config(format!(
                "base url {} cannot hold a path",
                config.base_url
            )));
        }

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url,
            token: config.token,
            api_version: config.api_version,
        })
    }

    // --- understanding ---

    /// Returns the meaning the app extracts from `q`.
    pub async fn message(&self, q: &str, options: &MessageOptions) -> WitResult<Value> {
        let query = MessageQuery {
            q,
            tag: options.tag.as_deref().filter(|tag| !tag.is_empty()),
            n: options.n.filter(|n| *n > 0),
            context: json_param(options.context.as_ref()),
            entities: json_param(options.entities.as_ref()),
        };
        self.send_json(self.request(Method::GET, &["message"]).query(&query))
            .await
    }

    /// Transcribes an audio file.
    pub async fn transcribe(&self, audio: impl AsRef<Path>, content_type: &str) -> WitResult<Value> {
        let body = read_audio(audio.as_ref()).await?;
        self.send_json(
            self.request_as(Method::POST, &["speech"], content_type)
                .body(body),
        )
        .await
    }

    /// Returns the meaning of an audio file, optionally with a context object.
    pub async fn speech(
        &self,
        audio: impl AsRef<Path>,
        content_type: &str,
        context: Option<&Value>,
    ) -> WitResult<Value> {
        let body = read_audio(audio.as_ref()).await?;
        let mut builder = self.request_as(Method::POST, &["speech"], content_type);
        if let Some(context) = json_param(context) {
            builder = builder.query(&[("context", context)]);
        }
        self.send_json(builder.body(body)).await
    }

    /// Synthesizes `q` with `voice` and returns the raw audio bytes.
    pub async fn synthesize(
        &self,
        q: &str,
        voice: &str,
        options: &SynthesizeOptions,
    ) -> WitResult<Vec<u8>> {
        let body = SynthesizeBody {
            q,
            voice,
            style: options.style.as_deref().filter(|style| !style.is_empty()),
            speed: options.speed,
            pitch: options.pitch,
        };
        let accept = options
            .accept
            .as_deref()
            .filter(|accept| !accept.is_empty())
            .unwrap_or(DEFAULT_AUDIO_FORMAT);

        let response = self
            .send(
                self.request(Method::POST, &["synthesize"])
                    .header(ACCEPT, accept)
                    .json(&body),
            )
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn detect_language(&self, q: &str, n: Option<u32>) -> WitResult<Value> {
        let mut builder = self.request(Method::GET, &["language"]).query(&[("q", q)]);
        if let Some(n) = n.filter(|n| *n > 0) {
            builder = builder.query(&[("n", n)]);
        }
        self.send_json(builder).await
    }

    // --- intents ---

    pub async fn list_intents(&self) -> WitResult<Vec<Intent>> {
        self.send_json(self.request(Method::GET, &["intents"])).await
    }

    pub async fn create_intent(&self, name: &str) -> WitResult<Intent> {
        self.send_json(
            self.request(Method::POST, &["intents"])
                .json(&json!({ "name": name })),
        )
        .await
    }

    pub async fn get_intent(&self, name: &str) -> WitResult<Value> {
        self.send_json(self.request(Method::GET, &["intents", name]))
            .await
    }

    pub async fn delete_intent(&self, name: &str) -> WitResult<Value> {
        self.send_json(self.request(Method::DELETE, &["intents", name]))
            .await
    }

    // --- entities ---

    pub async fn list_entities(&self) -> WitResult<Vec<Value>> {
        self.send_json(self.request(Method::GET, &["entities"])).await
    }

    pub async fn create_entity(&self, entity: &EntityDefinition) -> WitResult<Value> {
        self.send_json(self.request(Method::POST, &["entities"]).json(entity))
            .await
    }

    pub async fn get_entity(&self, name: &str) -> WitResult<Value> {
        self.send_json(self.request(Method::GET, &["entities", name]))
            .await
    }

    /// Replaces entity `name` with `entity`, which may carry a new name.
    pub async fn update_entity(&self, name: &str, entity: &EntityDefinition) -> WitResult<Value> {
        self.send_json(
            self.request(Method::PUT, &["entities", name])
                .json(entity),
        )
        .await
    }

    pub async fn delete_entity(&self, name: &str) -> WitResult<Value> {
        self.send_json(self.request(Method::DELETE, &["entities", name]))
            .await
    }

    pub async fn add_keyword(&self, entity: &str, keyword: &Keyword) -> WitResult<Value> {
        self.send_json(
            self.request(Method::POST, &["entities", entity, "keywords"])
                .json(keyword),
        )
        .await
    }

    pub async fn delete_keyword(&self, entity: &str, keyword: &str) -> WitResult<Value> {
        self.send_json(self.request(
            Method::DELETE,
            &["entities", entity, "keywords", keyword],
        ))
        .await
    }

    // --- apps ---

    pub async fn list_apps(&self, page: Page) -> WitResult<Vec<Value>> {
        self.send_json(
            self.request(Method::GET, &["apps"])
                .query(&[("limit", page.limit), ("offset", page.offset)]),
        )
        .await
    }

    pub async fn create_app(&self, app: &NewApp) -> WitResult<Value> {
        self.send_json(self.request(Method::POST, &["apps"]).json(app))
            .await
    }

    pub async fn get_app(&self, app_id: &str) -> WitResult<Value> {
        self.send_json(self.request(Method::GET, &["apps", app_id]))
            .await
    }

    pub async fn update_app(&self, app_id: &str, update: &AppUpdate) -> WitResult<Value> {
        self.send_json(self.request(Method::PUT, &["apps", app_id]).json(update))
            .await
    }

    pub async fn delete_app(&self, app_id: &str) -> WitResult<Value> {
        self.send_json(self.request(Method::DELETE, &["apps", app_id]))
            .await
    }

    // --- training ---

    pub async fn upload_utterances(&self, utterances: &[Utterance]) -> WitResult<BatchResult> {
        self.send_json(
            self.request(Method::POST, &["utterances"])
                .json(utterances),
        )
        .await
    }

    /// Lists stored utterances, restricted to `intents` when it is non-empty.
    pub async fn list_utterances(
        &self,
        page: Page,
        intents: &[String],
    ) -> WitResult<Vec<StoredUtterance>> {
        let mut builder = self
            .request(Method::GET, &["utterances"])
            .query(&[("limit", page.limit), ("offset", page.offset)]);
        if !intents.is_empty() {
            builder = builder.query(&[("intents", intents.join(","))]);
        }
        self.send_json(builder).await
    }

    /// Deletes utterances by text. Every stored utterance with a matching text
    /// is removed, whatever its intent.
    pub async fn delete_utterances(&self, texts: &[String]) -> WitResult<BatchResult> {
        let body: Vec<Value> = texts.iter().map(|text| json!({ "text": text })).collect();
        self.send_json(self.request(Method::DELETE, &["utterances"]).json(&body))
            .await
    }

    // --- plumbing ---

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot-be-a-base urls are rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.request_as(method, segments, JSON)
    }

    fn request_as(&self, method: Method, segments: &[&str], content_type: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(segments))
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, content_type)
            .query(&[("v", self.api_version.as_str())])
    }

    async fn send(&self, builder: RequestBuilder) -> WitResult<Response> {
        let request = builder.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        debug!(%method, %path, "sending wit.ai request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        debug!(%method, %path, %status, "received wit.ai response");

        if !status.is_success() {
            let body = response.text().await?;
            return Err(WitError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> WitResult<T> {
        let response = self.send(builder).await?;
        let endpoint = response.url().path().to_string();
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| WitError::InvalidResponse { endpoint, source })
    }
}

#[async_trait]
impl TrainingApi for WitClient {
    async fn list_intents(&self) -> WitResult<Vec<Intent>> {
        WitClient::list_intents(self).await
    }

    async fn create_intent(&self, name: &str) -> WitResult<Intent> {
        WitClient::create_intent(self, name).await
    }

    async fn delete_intent(&self, name: &str) -> WitResult<Value> {
        WitClient::delete_intent(self, name).await
    }

    async fn list_utterances(&self, page: Page) -> WitResult<Vec<StoredUtterance>> {
        WitClient::list_utterances(self, page, &[]).await
    }

    async fn upload_utterances(&self, utterances: &[Utterance]) -> WitResult<BatchResult> {
        WitClient::upload_utterances(self, utterances).await
    }

    async fn delete_utterances(&self, texts: &[String]) -> WitResult<BatchResult> {
        WitClient::delete_utterances(self, texts).await
    }
}

/// JSON-valued query parameters travel as serialized strings.
fn json_param(value: Option<&Value>) -> Option<String> {
    value.filter(|value| !is_empty_json(value)).map(Value::to_string)
}

async fn read_audio(path: &Path) -> WitResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|source| WitError::LocalFile {
            path: path.to_path_buf(),
            source,
        })
}
