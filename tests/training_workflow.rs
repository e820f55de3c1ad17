use std::time::Duration;

use serde_json::{json, Value};
use witai::{
    corpus::TrainingSample, delete_all_utterances, Corpus, OnError, Pacing, Trainer,
    TrainingPolicy, WitClient, WitConfig,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client(server: &MockServer) -> WitClient {
    WitClient::new(
        WitConfig::new("server-token")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5)),
    )
    .expect("client")
}

fn trainer() -> Trainer {
    Trainer::new()
        .intent_pacing(Pacing::None)
        .batch_pacing(Pacing::None)
}

fn corpus() -> Corpus {
    let labels = ["Play_Music", "play_music", "STOP", "Weather", "weather", "greet"];
    Corpus::new(
        (0..23)
            .map(|i| TrainingSample::new(format!("utterance {i}"), labels[i % labels.len()]))
            .collect(),
    )
    .unwrap()
}

async fn requests_to(server: &MockServer, verb: &str, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == route)
        .collect()
}

fn json_body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}

async fn mount_empty_app(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/utterances"))
        .and(query_param("limit", "10000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn retrains_app_from_corpus() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/utterances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"text": "old one", "intent": {"id": "1", "name": "legacy"}, "entities": [], "traits": []},
            {"text": "old two", "intent": {"id": "1", "name": "legacy"}, "entities": [], "traits": []}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/utterances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sent": true, "n": 2})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/intents"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "1", "name": "legacy"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/intents/legacy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": "legacy"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/intents"))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            ResponseTemplate::new(200).set_body_json(json!({"id": "2", "name": body["name"]}))
        })
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/utterances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sent": true, "n": 10})))
        .expect(3)
        .mount(&server)
        .await;

    let report = trainer().run(&client(&server), &corpus()).await.unwrap();

    assert_eq!(report.utterances_purged, 2);
    assert_eq!(report.intents_deleted, ["legacy"]);
    assert_eq!(report.intents_created, ["play_music", "stop", "weather", "greet"]);
    assert_eq!(report.batches_uploaded, [10, 10, 3]);

    let deletions = requests_to(&server, "DELETE", "/utterances").await;
    assert_eq!(
        json_body(&deletions[0]),
        json!([{"text": "old one"}, {"text": "old two"}])
    );

    let uploads = requests_to(&server, "POST", "/utterances").await;
    let sizes: Vec<usize> = uploads
        .iter()
        .map(|r| json_body(r).as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, [10, 10, 3]);

    let first = &json_body(&uploads[0])[0];
    assert_eq!(
        first,
        &json!({"text": "utterance 0", "intent": "play_music", "entities": [], "traits": []})
    );
    let last = &json_body(&uploads[2])[2];
    assert_eq!(last["text"], "utterance 22");
}

#[tokio::test]
async fn existing_intents_do_not_fail_the_run() {
    let server = MockServer::start().await;
    mount_empty_app(&server).await;
    Mock::given(method("POST"))
        .and(path("/intents"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "Intent already exists", "code": "bad-request"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/utterances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sent": true, "n": 10})))
        .mount(&server)
        .await;

    let report = trainer().run(&client(&server), &corpus()).await.unwrap();

    assert!(report.intents_created.is_empty());
    assert_eq!(report.intents_existing.len(), 4);
    assert!(report.failures.is_empty());
    assert_eq!(report.utterances_uploaded(), 23);
}

#[tokio::test]
async fn second_batch_failure_aborts_upload() {
    let server = MockServer::start().await;
    mount_empty_app(&server).await;
    Mock::given(method("POST"))
        .and(path("/intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1", "name": "x"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/utterances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sent": true, "n": 10})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/utterances"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
        .mount(&server)
        .await;

    let err = trainer().run(&client(&server), &corpus()).await.unwrap_err();

    assert_eq!(err.cause.to_string(), "batch 2 of 3 failed to upload");
    assert_eq!(err.report.batches_uploaded, [10]);
    assert_eq!(requests_to(&server, "POST", "/utterances").await.len(), 2);
}

#[tokio::test]
async fn intent_creation_errors_can_abort() {
    let server = MockServer::start().await;
    mount_empty_app(&server).await;
    Mock::given(method("POST"))
        .and(path("/intents"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = trainer()
        .policy(TrainingPolicy {
            create_intents: OnError::Abort,
            ..Default::default()
        })
        .run(&client(&server), &corpus())
        .await;

    assert!(result.is_err());
    assert_eq!(requests_to(&server, "POST", "/intents").await.len(), 1);
    assert!(requests_to(&server, "POST", "/utterances").await.is_empty());
}

#[tokio::test]
async fn delete_all_on_empty_app_issues_no_delete() {
    let server = MockServer::start().await;
    mount_empty_app(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/utterances"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = delete_all_utterances(&client(&server)).await.unwrap();
    assert!(result.sent);
    assert_eq!(result.n, 0);
}
