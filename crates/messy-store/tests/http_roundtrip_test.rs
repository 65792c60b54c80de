//! Note service over the real HTTP client against a mock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use messy_client::{ClientConfig, HttpNotesClient};
use messy_core::{NoteDraft, NoteId, NoteKey, NoteStatus};
use messy_store::{Conversation, NoteService, Resolution};

fn client(server: &MockServer) -> Arc<HttpNotesClient> {
    let config = ClientConfig {
        base_url: server.uri(),
        token: Some("secret".to_string()),
        timeout_seconds: 5,
        max_retries: 0,
        retry_base_ms: 1,
    };
    Arc::new(HttpNotesClient::new(config).unwrap())
}

#[tokio::test]
async fn test_create_echo_reconciles_placeholder() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": "p1", "title": "Gig", "content": "friday", "tags": ["Events/Posters"], "type": "text"},
            {"_id": "w1", "title": "Standup", "content": "notes", "tags": ["work"], "type": "text"}
        ])))
        .mount(&server)
        .await;

    // Echo the request's tempId back, as the real service does.
    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = req.body_json().unwrap();
            ResponseTemplate::new(201).set_body_json(json!({
                "_id": "srv-42",
                "tempId": body["tempId"],
                "title": "Milk",
                "content": body["content"],
                "tags": body["tags"],
                "type": "text",
                "summary": "Buy milk on the way home"
            }))
        })
        .expect(1)
        .mount(&server)
        .await;

    let service = NoteService::new(client(&server));
    assert_eq!(service.refresh().await.unwrap(), 2);

    let (temp_id, resolution) = service
        .create(NoteDraft::text("buy milk").with_tags(["errand"]))
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::Reconciled);

    let notes = service.snapshot();
    assert_eq!(notes.len(), 3);
    assert_eq!(notes[0].id, Some(NoteId::new("srv-42")));
    assert_eq!(notes[0].temp_id, Some(temp_id));
    assert_eq!(notes[0].title, "Milk");
    assert_eq!(notes[0].status, NoteStatus::Ready);

    let events = service.list_filtered("Events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, Some(NoteId::new("p1")));
    assert_eq!(service.list_filtered("All").len(), 3);
}

#[tokio::test]
async fn test_server_error_leaves_failed_placeholder() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = NoteService::new(client(&server));
    let (_, resolution) = service.create(NoteDraft::text("lost")).await.unwrap();

    assert_eq!(resolution, Resolution::Failed);
    assert!(service.snapshot()[0].is_failed());
}

/// Server reply to a create, echoing the request's tempId.
fn created(id: &'static str) -> impl Fn(&Request) -> ResponseTemplate {
    move |req: &Request| {
        let body: serde_json::Value = req.body_json().unwrap();
        ResponseTemplate::new(201).set_body_json(json!({
            "_id": id,
            "tempId": body["tempId"],
            "content": body["content"],
            "type": "text"
        }))
    }
}

#[tokio::test]
async fn test_timed_out_create_yields_one_note() {
    let server = MockServer::start().await;

    // The first create is stored but answered after the client gave up.
    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(move |req: &Request| created("s1")(req).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(created("s2"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        base_url: server.uri(),
        token: Some("secret".to_string()),
        timeout_seconds: 1,
        max_retries: 2,
        retry_base_ms: 1,
    };
    let service = NoteService::new(Arc::new(HttpNotesClient::new(config).unwrap()));

    let (temp_id, resolution) = service.create(NoteDraft::text("once")).await.unwrap();
    assert_eq!(resolution, Resolution::Failed);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    assert_eq!(service.retry(temp_id).await.unwrap(), Resolution::Reconciled);
    assert_eq!(service.len(), 1);

    // Both stored copies echo the same tempId.
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": "s1", "tempId": temp_id.to_string(), "content": "once", "type": "text"},
            {"_id": "s2", "tempId": temp_id.to_string(), "content": "once", "type": "text"}
        ])))
        .mount(&server)
        .await;

    assert_eq!(service.refresh().await.unwrap(), 2);

    let notes = service.snapshot();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].temp_id, Some(temp_id));
    assert_eq!(notes[0].status, NoteStatus::Ready);
    assert!(service.find(&NoteKey::Server(NoteId::new("s1"))).is_some());
}

#[tokio::test]
async fn test_conversation_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Your gig is on Friday",
            "relevantNotes": ["p1"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let mut conversation = Conversation::new();
    let reply = conversation.send(api.as_ref(), "when is the gig?").await;

    assert_eq!(reply.text, "Your gig is on Friday");
    assert_eq!(reply.relevant_notes, vec![NoteId::new("p1")]);
    assert_eq!(conversation.len(), 3);
}
